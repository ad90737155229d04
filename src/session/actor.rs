use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::summary::SummaryClient;
use crate::transport::AgentTransport;

use super::{SessionEvent, SessionState, SideEffect};

/// Single consumer of [`SessionEvent`]s.
///
/// Capture callbacks, the dispatch cadence, the supervisor, and UI navigation
/// all produce into one channel; the actor applies exactly one transition at
/// a time and then executes the resulting effects. The acknowledgement for a
/// tool call is therefore always sent after its state update has landed.
pub struct SessionActor {
    state: SessionState,
    rx: mpsc::Receiver<SessionEvent>,
    transport: Arc<dyn AgentTransport>,
    summarizer: Option<SummaryClient>,
}

impl SessionActor {
    pub fn new(
        rx: mpsc::Receiver<SessionEvent>,
        transport: Arc<dyn AgentTransport>,
        summarizer: Option<SummaryClient>,
    ) -> Self {
        Self {
            state: SessionState::new(),
            rx,
            transport,
            summarizer,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub async fn run(mut self) {
        info!("session actor started");
        while let Some(event) = self.rx.recv().await {
            let effects = self.state.apply(event);
            self.execute(effects).await;
        }
        info!("session channel closed, actor stopping");
    }

    async fn execute(&self, effects: Vec<SideEffect>) {
        for effect in effects {
            match effect {
                SideEffect::SendPrompt(text) => {
                    // A failed prompt is not retried here; the supervisor
                    // notices the dead transport and cycles it.
                    if let Err(e) = self.transport.send_text(&text).await {
                        warn!("prompt dispatch failed: {e:#}");
                    }
                }
                SideEffect::SendToolAck { id, success } => {
                    if let Err(e) = self.transport.send_tool_response(&id, success).await {
                        warn!(%id, "tool response dispatch failed: {e:#}");
                    }
                }
                SideEffect::ComposeSummary(digest) => {
                    let Some(client) = self.summarizer.clone() else {
                        warn!("summary requested but no summary client is configured");
                        continue;
                    };
                    tokio::spawn(async move {
                        match client.summarize(&digest).await {
                            Ok(text) => info!("video summary:\n{text}"),
                            Err(e) => warn!("summary generation failed: {e:#}"),
                        }
                    });
                }
            }
        }
    }
}
