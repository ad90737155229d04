//! Live audio capture and streaming.

use std::sync::mpsc as std_mpsc;
use std::sync::Arc;

use ringbuf::traits::Split;
use ringbuf::HeapRb;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::transport::AgentTransport;

pub mod capture;
pub mod pipeline;

/// Headroom for capture jitter: half a second at 16 kHz.
const CAPTURE_RING_CAPACITY: usize = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureCommand {
    Start,
    Stop,
    Restart,
}

/// Handle to the capture thread. Commands are fire-and-forget; stopping an
/// already-stopped capture is a no-op.
#[derive(Clone)]
pub struct AudioHandle {
    cmd_tx: std_mpsc::Sender<CaptureCommand>,
}

impl AudioHandle {
    pub fn new(cmd_tx: std_mpsc::Sender<CaptureCommand>) -> Self {
        Self { cmd_tx }
    }

    pub fn start(&self) {
        self.send(CaptureCommand::Start);
    }

    pub fn stop(&self) {
        self.send(CaptureCommand::Stop);
    }

    /// Stop-then-start, guaranteeing a clean buffer state. Queued chunks
    /// already handed to the dispatcher survive the cycle.
    pub fn restart(&self) {
        self.send(CaptureCommand::Restart);
    }

    fn send(&self, cmd: CaptureCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            warn!(?cmd, "capture thread is gone, command dropped");
        }
    }
}

/// Spawn the capture thread and the dispatch cadence task. The dispatch
/// queue outlives capture restarts, so a reconnect loses no queued work.
pub fn spawn(transport: Arc<dyn AgentTransport>, cancel: CancellationToken) -> AudioHandle {
    let (cmd_tx, cmd_rx) = std_mpsc::channel();
    let (chunk_tx, chunk_rx) = mpsc::channel(pipeline::MAX_QUEUED_CHUNKS);

    tokio::spawn(pipeline::run_dispatch_loop(
        chunk_rx,
        transport,
        cancel.clone(),
    ));
    std::thread::spawn(move || capture_thread(cmd_rx, chunk_tx, cancel));

    AudioHandle::new(cmd_tx)
}

struct ActiveCapture {
    // The cpal stream must stay alive (and on this thread) while capturing.
    _capture: capture::AudioCapture,
    cancel: CancellationToken,
    worker: std::thread::JoinHandle<()>,
}

fn capture_thread(
    cmd_rx: std_mpsc::Receiver<CaptureCommand>,
    chunk_tx: mpsc::Sender<Vec<i16>>,
    service_cancel: CancellationToken,
) {
    let mut active: Option<ActiveCapture> = None;

    while let Ok(cmd) = cmd_rx.recv() {
        if service_cancel.is_cancelled() {
            break;
        }
        match cmd {
            CaptureCommand::Start => {
                if active.is_none() {
                    active = start_capture(chunk_tx.clone());
                }
            }
            CaptureCommand::Stop => stop_capture(&mut active),
            CaptureCommand::Restart => {
                stop_capture(&mut active);
                active = start_capture(chunk_tx.clone());
            }
        }
    }
    stop_capture(&mut active);
    info!("capture thread exiting");
}

fn start_capture(chunk_tx: mpsc::Sender<Vec<i16>>) -> Option<ActiveCapture> {
    let rb = HeapRb::<f32>::new(CAPTURE_RING_CAPACITY);
    let (producer, consumer) = rb.split();

    match capture::AudioCapture::new(producer) {
        Ok(cap) => {
            let cancel = CancellationToken::new();
            let worker_cancel = cancel.clone();
            let worker = std::thread::spawn(move || {
                pipeline::run_accumulator(consumer, chunk_tx, worker_cancel)
            });
            info!("audio capture started at {} Hz", cap.sample_rate);
            Some(ActiveCapture {
                _capture: cap,
                cancel,
                worker,
            })
        }
        Err(e) => {
            warn!("audio capture unavailable: {e:#}");
            None
        }
    }
}

fn stop_capture(active: &mut Option<ActiveCapture>) {
    if let Some(a) = active.take() {
        a.cancel.cancel();
        if a.worker.join().is_err() {
            warn!("audio accumulator panicked");
        }
        info!("audio capture stopped");
    }
}
