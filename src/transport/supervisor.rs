//! Liveness supervision for the agent transport.
//!
//! The connection can die silently; the supervisor probes it on a fixed
//! interval and, when it finds a corpse, cycles it: disconnect, short delay,
//! reconnect with the last-known configuration, then restart audio capture
//! so the stream resumes from a clean buffer. Scene state is never touched
//! here; the state machine only hears a health boolean.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::audio::AudioHandle;
use crate::error::Error;
use crate::session::SessionEvent;

use super::{AgentConfig, AgentTransport};

pub const PROBE_INTERVAL: Duration = Duration::from_secs(5);
pub const RECONNECT_DELAY: Duration = Duration::from_secs(1);

pub struct HealthSupervisor {
    transport: Arc<dyn AgentTransport>,
    config: AgentConfig,
    audio: AudioHandle,
    session_tx: mpsc::Sender<SessionEvent>,
    cancel: CancellationToken,
}

impl HealthSupervisor {
    pub fn new(
        transport: Arc<dyn AgentTransport>,
        config: AgentConfig,
        audio: AudioHandle,
        session_tx: mpsc::Sender<SessionEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            config,
            audio,
            session_tx,
            cancel,
        }
    }

    pub async fn run(self) {
        let mut probe = tokio::time::interval(PROBE_INTERVAL);
        probe.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!("transport supervisor started");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = probe.tick() => {}
            }

            if self.transport.is_ready() {
                continue;
            }

            warn!("{}; cycling connection", Error::TransportUnhealthy);
            let _ = self
                .session_tx
                .send(SessionEvent::TransportHealth(false))
                .await;

            if let Err(e) = self.transport.disconnect().await {
                warn!("disconnect of stale transport failed: {e:#}");
            }
            tokio::time::sleep(RECONNECT_DELAY).await;

            match self.transport.connect(&self.config).await {
                Ok(()) => {
                    info!("transport reconnected");
                    // Clean buffer state beats resuming in place.
                    self.audio.restart();
                    let _ = self
                        .session_tx
                        .send(SessionEvent::TransportHealth(true))
                        .await;
                }
                Err(e) => {
                    // Stay unhealthy; the next probe retries. No inline
                    // retry storm.
                    warn!("reconnect failed, retrying on next probe: {e:#}");
                }
            }
        }
        info!("transport supervisor stopped");
    }
}
