use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;

pub mod stub;
pub mod supervisor;

/// Mime convention for outbound audio.
pub const AUDIO_MIME: &str = "audio/pcm;rate=16000";
pub const AUDIO_SAMPLE_RATE: u32 = 16_000;

/// Name of the structured function the agent answers with.
pub const TOOL_NAME: &str = "analyze_scene";

/// Last-known connection parameters. The supervisor replays these verbatim
/// when it cycles a stale connection.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub model: String,
    pub system_instruction: String,
    pub tools: Value,
}

/// Outbound half of the conversational agent. Concrete implementations own
/// the wire protocol; the core only sees this surface.
#[async_trait]
pub trait AgentTransport: Send + Sync {
    async fn connect(&self, config: &AgentConfig) -> anyhow::Result<()>;
    async fn disconnect(&self) -> anyhow::Result<()>;

    /// Cheap readiness probe. `false` means the channel is closed or stale.
    fn is_ready(&self) -> bool;

    async fn send_text(&self, prompt: &str) -> anyhow::Result<()>;
    async fn send_audio_chunk(&self, pcm: &[i16], sample_rate: u32) -> anyhow::Result<()>;
    async fn send_tool_response(&self, id: &str, success: bool) -> anyhow::Result<()>;

    /// One-shot handover of the inbound event stream. `None` once taken.
    fn take_events(&self) -> Option<mpsc::Receiver<TransportEvent>>;
}

/// Inbound events a transport implementation emits.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    ToolCall(ToolCallEvent),
    ConnectionState(bool),
}

/// Structured tool-call arguments. Field names are the wire contract; a
/// payload that does not deserialize exactly is rejected before it can reach
/// the state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolCallArgs {
    pub scene_index: u32,
    pub scene_description: String,
    pub should_move: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_scene_index: Option<u32>,
    pub is_analysis_complete: bool,
}

#[derive(Debug, Clone)]
pub struct ToolCallEvent {
    pub id: String,
    pub name: String,
    pub args: ToolCallArgs,
}

impl ToolCallEvent {
    /// Validate a raw argument payload into a typed event.
    pub fn parse(id: String, name: String, raw: Value) -> Result<Self, serde_json::Error> {
        let args: ToolCallArgs = serde_json::from_value(raw)?;
        Ok(Self { id, name, args })
    }
}

/// Declaration of the `analyze_scene` function, sent to the agent at connect
/// time. All fields except `target_scene_index` are required.
pub fn tool_declaration() -> Value {
    json!({
        "name": TOOL_NAME,
        "description": "Analyze a video scene through conversation with the user.",
        "parameters": {
            "type": "object",
            "properties": {
                "scene_index": {
                    "type": "number",
                    "description": "Zero-based index of the scene currently under analysis. Informational only; never used as a movement target."
                },
                "scene_description": {
                    "type": "string",
                    "description": "Description of the scene built up through the conversation: people, place, activity, mood, weather, time of day, color, and sound."
                },
                "should_move": {
                    "type": "boolean",
                    "description": "Whether to move to another scene. Return true only once the user is ready to move on; otherwise always return false."
                },
                "target_scene_index": {
                    "type": "number",
                    "description": "Zero-based destination index. Used only when should_move is true; when omitted the next scene is chosen."
                },
                "is_analysis_complete": {
                    "type": "boolean",
                    "description": "Whether the current scene's analysis is finished. Completion by itself never moves the session to another scene; movement is governed by should_move alone."
                }
            },
            "required": ["scene_index", "scene_description", "should_move", "is_analysis_complete"]
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_minimal_payload() {
        let raw = json!({
            "scene_index": 1,
            "scene_description": "a beach at dusk",
            "should_move": false,
            "is_analysis_complete": true
        });
        let ev = ToolCallEvent::parse("call-1".into(), TOOL_NAME.into(), raw).unwrap();
        assert_eq!(ev.args.scene_index, 1);
        assert_eq!(ev.args.target_scene_index, None);
        assert!(ev.args.is_analysis_complete);
    }

    #[test]
    fn parse_rejects_missing_required_field() {
        let raw = json!({
            "scene_index": 0,
            "should_move": true,
            "is_analysis_complete": false
        });
        assert!(ToolCallEvent::parse("call-2".into(), TOOL_NAME.into(), raw).is_err());
    }

    #[test]
    fn parse_rejects_negative_index() {
        let raw = json!({
            "scene_index": -1,
            "scene_description": "",
            "should_move": false,
            "is_analysis_complete": false
        });
        assert!(ToolCallEvent::parse("call-3".into(), TOOL_NAME.into(), raw).is_err());
    }
}
