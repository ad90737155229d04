use crate::transport::{tool_declaration, AgentConfig};

pub const DEFAULT_AGENT_MODEL: &str = "models/gemini-2.0-flash-exp";
pub const DEFAULT_SUMMARY_MODEL: &str = "gemini-1.5-flash-latest";
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const SYSTEM_INSTRUCTION: &str = "You are a conversational video-analysis assistant. \
Work through each scene with the user: answer their questions and draw out the people, \
place, activity, mood, weather, time of day, colors and sounds that the scene shows, \
then record them in scene_description. Hold a real conversation per scene: set \
should_move to true only once the user is ready to move on, and never treat \
is_analysis_complete as a reason to move by itself. When the user navigates away from \
a scene that is not mid-analysis, that scene counts as resolved from its visible content.";

/// Session-level configuration. API credentials come from the environment;
/// everything else has a sane default.
#[derive(Debug, Clone)]
pub struct Config {
    pub agent_model: String,
    pub system_instruction: String,
    pub summary_model: String,
    pub api_base_url: String,
    pub api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            agent_model: DEFAULT_AGENT_MODEL.to_string(),
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            summary_model: DEFAULT_SUMMARY_MODEL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_key: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("GEMINI_API_KEY").ok(),
            ..Self::default()
        }
    }

    /// Connection parameters the supervisor replays on every reconnect.
    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            model: self.agent_model.clone(),
            system_instruction: self.system_instruction.clone(),
            tools: tool_declaration(),
        }
    }
}
