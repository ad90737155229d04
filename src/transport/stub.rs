//! Scripted in-process transport for driving the session without a live
//! agent connection. Each prompt is answered, after a short delay, with a
//! canned `analyze_scene` tool call that completes the scene and asks to
//! move on.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    AgentConfig, AgentTransport, ToolCallArgs, ToolCallEvent, TransportEvent, AUDIO_MIME,
    TOOL_NAME,
};

const REPLY_DELAY: Duration = Duration::from_millis(250);

pub struct ScriptedTransport {
    connected: AtomicBool,
    prompts_seen: AtomicU32,
    event_tx: mpsc::Sender<TransportEvent>,
    event_rx: Mutex<Option<mpsc::Receiver<TransportEvent>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        let (event_tx, event_rx) = mpsc::channel(32);
        Self {
            connected: AtomicBool::new(false),
            prompts_seen: AtomicU32::new(0),
            event_tx,
            event_rx: Mutex::new(Some(event_rx)),
        }
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentTransport for ScriptedTransport {
    async fn connect(&self, config: &AgentConfig) -> anyhow::Result<()> {
        info!(model = %config.model, "scripted transport connected");
        self.connected.store(true, Ordering::SeqCst);
        let _ = self.event_tx.send(TransportEvent::ConnectionState(true)).await;
        Ok(())
    }

    async fn disconnect(&self) -> anyhow::Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        let _ = self
            .event_tx
            .send(TransportEvent::ConnectionState(false))
            .await;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send_text(&self, prompt: &str) -> anyhow::Result<()> {
        anyhow::ensure!(self.is_ready(), "not connected");
        let ordinal = self.prompts_seen.fetch_add(1, Ordering::SeqCst);
        debug!(ordinal, "prompt received: {prompt}");

        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(REPLY_DELAY).await;
            let event = ToolCallEvent {
                id: Uuid::new_v4().to_string(),
                name: TOOL_NAME.to_string(),
                args: ToolCallArgs {
                    scene_index: ordinal,
                    scene_description: format!(
                        "Scripted walkthrough of scene {}: setting, subjects and activity noted.",
                        ordinal + 1
                    ),
                    should_move: true,
                    target_scene_index: None,
                    is_analysis_complete: true,
                },
            };
            let _ = tx.send(TransportEvent::ToolCall(event)).await;
        });
        Ok(())
    }

    async fn send_audio_chunk(&self, pcm: &[i16], sample_rate: u32) -> anyhow::Result<()> {
        anyhow::ensure!(self.is_ready(), "not connected");
        debug!(
            samples = pcm.len(),
            sample_rate,
            mime = AUDIO_MIME,
            "audio chunk discarded by stub"
        );
        Ok(())
    }

    async fn send_tool_response(&self, id: &str, success: bool) -> anyhow::Result<()> {
        debug!(%id, success, "tool response acknowledged");
        Ok(())
    }

    fn take_events(&self) -> Option<mpsc::Receiver<TransportEvent>> {
        self.event_rx.lock().ok()?.take()
    }
}
