use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::error::Error;
use crate::segment::Segmentation;
use crate::transport::ToolCallEvent;

mod actor;
pub use actor::SessionActor;

/// A contiguous time-bounded clip of the source video, the unit of analysis.
///
/// `description` and `is_analyzed` are mutated only by [`SessionState::apply`].
#[derive(Debug, Clone)]
pub struct Scene {
    pub bytes: Vec<u8>,
    pub start_time: f64,
    pub end_time: f64,
    pub description: Option<String>,
    pub is_analyzed: bool,
}

impl Scene {
    pub fn new(bytes: Vec<u8>, start_time: f64, end_time: f64) -> Self {
        Self {
            bytes,
            start_time,
            end_time,
            description: None,
            is_analyzed: false,
        }
    }
}

/// Derived view over the scene list; never stored, always recomputed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisStatus {
    pub analyzed: BTreeSet<usize>,
    pub total: usize,
}

/// Inputs into the state machine. Every producer (UI navigation, transport
/// events, the supervisor, ingestion) funnels through this one type.
#[derive(Debug)]
pub enum SessionEvent {
    /// A freshly segmented video replaces the current session content.
    Ingest {
        segmentation: Segmentation,
        source: Vec<u8>,
    },
    /// User-driven navigation to a scene index.
    Select(usize),
    /// Structured response from the agent.
    ToolCall(ToolCallEvent),
    /// Health verdict from the transport supervisor.
    TransportHealth(bool),
    /// Request a whole-video summary from the analyzed scene descriptions.
    GenerateSummary,
}

/// Work the transition function wants performed against the outside world.
/// The actor executes these after the state update has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    SendPrompt(String),
    SendToolAck { id: String, success: bool },
    ComposeSummary(String),
}

/// The single mutable aggregate of the session. All transitions go through
/// [`SessionState::apply`]; nothing else writes these fields.
#[derive(Debug, Default)]
pub struct SessionState {
    scenes: Vec<Scene>,
    current_index: usize,
    is_analyzing: bool,
    transport_healthy: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn is_analyzing(&self) -> bool {
        self.is_analyzing
    }

    pub fn transport_healthy(&self) -> bool {
        self.transport_healthy
    }

    pub fn analysis_status(&self) -> AnalysisStatus {
        AnalysisStatus {
            analyzed: self
                .scenes
                .iter()
                .enumerate()
                .filter(|(_, s)| s.is_analyzed)
                .map(|(i, _)| i)
                .collect(),
            total: self.scenes.len(),
        }
    }

    /// Derived predicate, not a transition target.
    pub fn all_analyzed(&self) -> bool {
        !self.scenes.is_empty() && self.scenes.iter().all(|s| s.is_analyzed)
    }

    /// Apply one event and return the side effects it produced.
    ///
    /// This is the only mutation point. Transitions are all-or-nothing: a
    /// rejected event returns with the state untouched (an acknowledgement is
    /// still emitted for tool calls, since the agent blocks on it).
    pub fn apply(&mut self, event: SessionEvent) -> Vec<SideEffect> {
        match event {
            SessionEvent::Ingest {
                segmentation,
                source,
            } => self.ingest(segmentation, source),
            SessionEvent::Select(index) => self.select(index),
            SessionEvent::ToolCall(ev) => self.receive_tool_call(ev),
            SessionEvent::TransportHealth(healthy) => {
                // Only the flag changes; per-scene status and the Analyzing
                // marker survive a reconnect untouched.
                self.transport_healthy = healthy;
                info!(healthy, "transport health updated");
                Vec::new()
            }
            SessionEvent::GenerateSummary => self.generate_summary(),
        }
    }

    fn ingest(&mut self, segmentation: Segmentation, source: Vec<u8>) -> Vec<SideEffect> {
        let Segmentation {
            mut scenes,
            duration,
        } = segmentation;

        if scenes.is_empty() {
            // Recoverable empty result: fall back to the whole input as one
            // unanalyzed scene when we at least know how long it is.
            if duration > 0.0 && !source.is_empty() {
                info!("no scene boundaries survived extraction; using the whole video as one scene");
                scenes.push(Scene::new(source, 0.0, duration));
            } else {
                warn!("ingestion produced no usable scenes");
            }
        }

        info!(scenes = scenes.len(), duration, "session content replaced");
        self.scenes = scenes;
        self.current_index = 0;
        self.is_analyzing = false;

        let mut effects = Vec::new();
        if let Some(first) = self.scenes.first() {
            if !first.is_analyzed && self.transport_healthy {
                self.is_analyzing = true;
                effects.push(SideEffect::SendPrompt(scene_prompt(0, self.scenes.len())));
            }
        }
        effects
    }

    fn select(&mut self, index: usize) -> Vec<SideEffect> {
        if index >= self.scenes.len() {
            let err = Error::InvalidIndex {
                index,
                total: self.scenes.len(),
            };
            warn!("select rejected: {err}");
            return Vec::new();
        }
        if index == self.current_index {
            // Re-selecting the current scene is a complete no-op: no status
            // change and no duplicate prompt.
            return Vec::new();
        }

        // The user moved on, so treat the scene they left as implicitly
        // resolved - unless it was mid-analysis, which must not be masked.
        let prev = self.current_index;
        if !self.scenes[prev].is_analyzed && !self.is_analyzing {
            info!(scene = prev, "auto-completing scene left behind by navigation");
            let scene = &mut self.scenes[prev];
            scene.is_analyzed = true;
            if scene.description.is_none() {
                scene.description = Some(format!(
                    "Scene {} auto-completed from its visible content",
                    prev + 1
                ));
            }
        }

        self.current_index = index;
        let mut effects = Vec::new();
        if !self.scenes[index].is_analyzed && self.transport_healthy {
            self.is_analyzing = true;
            effects.push(SideEffect::SendPrompt(scene_prompt(index, self.scenes.len())));
        } else {
            self.is_analyzing = false;
        }
        effects
    }

    fn receive_tool_call(&mut self, ev: ToolCallEvent) -> Vec<SideEffect> {
        let total = self.scenes.len();
        let reported = ev.args.scene_index as usize;
        if reported >= total {
            let err = Error::InvalidIndex {
                index: reported,
                total,
            };
            warn!(id = %ev.id, "tool call rejected: {err}");
            // The agent blocks on the acknowledgement even for rejects.
            return vec![SideEffect::SendToolAck {
                id: ev.id,
                success: false,
            }];
        }
        if reported != self.current_index {
            debug!(
                reported,
                current = self.current_index,
                "tool call reports a stale scene index; applying to the current scene"
            );
        }

        // Clear the in-flight marker before anything else.
        self.is_analyzing = false;

        let idx = self.current_index;
        {
            let scene = &mut self.scenes[idx];
            if !ev.args.scene_description.is_empty() {
                scene.description = Some(ev.args.scene_description.clone());
            }
            if ev.args.is_analysis_complete {
                // Monotonic: an analyzed scene never regresses.
                scene.is_analyzed = true;
            }
        }

        // Auto-advance fires on should_move alone. Analysis completion and
        // readiness to move are different judgments made by the agent.
        if ev.args.should_move {
            let last = total - 1;
            let dest = match ev.args.target_scene_index {
                Some(t) if (t as usize) <= last => t as usize,
                _ => (idx + 1).min(last),
            };
            if dest != idx {
                info!(from = idx, to = dest, "auto-advancing scene");
                self.current_index = dest;
                self.is_analyzing = !self.scenes[dest].is_analyzed && self.transport_healthy;
            }
        }

        vec![SideEffect::SendToolAck {
            id: ev.id,
            success: true,
        }]
    }

    fn generate_summary(&mut self) -> Vec<SideEffect> {
        if !self.all_analyzed() {
            let status = self.analysis_status();
            warn!(
                analyzed = status.analyzed.len(),
                total = status.total,
                "summary requested before every scene was analyzed"
            );
            return Vec::new();
        }
        vec![SideEffect::ComposeSummary(crate::summary::compose_digest(
            &self.scenes,
        ))]
    }
}

/// Opening prompt for a scene, naming its ordinal position and the total.
fn scene_prompt(index: usize, total: usize) -> String {
    format!(
        "Describe this scene. It is scene {} of {}. Analyze the content in detail, \
         walk the user through the important elements, and deepen the analysis through \
         conversation. Do not move to the next scene until the discussion has run its course.",
        index + 1,
        total
    )
}
