//! Capture-to-transport audio plumbing.
//!
//! Samples flow: capture ring -> [`FrameBuffer`] (f32 to i16, threshold
//! flush) -> bounded dispatch queue -> cadence loop -> transport. Each stage
//! sheds rather than blocks: the queue caps memory, the cadence caps network
//! rate, and a flush that keeps failing gives the frame up after a small
//! retry budget.

use std::sync::Arc;
use std::time::Duration;

use ringbuf::traits::Consumer;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::transport::{AgentTransport, AUDIO_SAMPLE_RATE};

pub const FRAME_CAPACITY: usize = 4096;
pub const FLUSH_THRESHOLD: f32 = 0.75;
pub const MAX_FLUSH_RETRIES: u32 = 3;
pub const MAX_QUEUED_CHUNKS: usize = 50;
pub const SEND_INTERVAL_MS: u64 = 200;

/// Saturating float-to-PCM conversion. Out-of-range input clips to the rail
/// instead of wrapping.
pub fn pcm16_from_f32(sample: f32) -> i16 {
    (sample * 32768.0)
        .round()
        .clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// Destination of a frame flush. `false` means the handoff failed and the
/// frame stays buffered for a bounded retry.
pub trait FlushSink {
    fn accept(&mut self, chunk: Vec<i16>) -> bool;
}

/// Fixed-capacity sample frame with threshold-based flushing.
pub struct FrameBuffer {
    frame: Vec<i16>,
    write_index: usize,
    retry_count: u32,
    in_flight: bool,
}

impl FrameBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            frame: vec![0; capacity],
            write_index: 0,
            retry_count: 0,
            in_flight: false,
        }
    }

    pub fn write_index(&self) -> usize {
        self.write_index
    }

    /// Convert and append samples, flushing into `sink` whenever the frame
    /// fills or crosses the latency threshold.
    pub fn extend<S: FlushSink>(&mut self, samples: &[f32], sink: &mut S) {
        for &sample in samples {
            if self.write_index >= self.frame.len() {
                // A failed flush left the frame full; retry before taking
                // more input, shedding this sample if it still won't drain.
                self.flush(sink);
                if self.write_index >= self.frame.len() {
                    continue;
                }
            }
            self.frame[self.write_index] = pcm16_from_f32(sample);
            self.write_index += 1;
            if self.write_index >= self.frame.len() {
                self.flush(sink);
            }
        }
        // Partial frames still go out once they are mostly full, so latency
        // stays bounded without waiting for the last samples.
        if self.write_index as f32 >= self.frame.len() as f32 * FLUSH_THRESHOLD {
            self.flush(sink);
        }
    }

    /// Hand the populated part of the frame to the sink. Non-reentrant: a
    /// flush already in flight suppresses this request.
    pub fn flush<S: FlushSink>(&mut self, sink: &mut S) {
        if self.in_flight || self.write_index == 0 {
            return;
        }
        self.in_flight = true;
        let chunk = self.frame[..self.write_index].to_vec();
        if sink.accept(chunk) {
            self.write_index = 0;
            self.retry_count = 0;
        } else {
            self.retry_count += 1;
            if self.retry_count > MAX_FLUSH_RETRIES {
                // Audio loss beats unbounded growth or duplicate sends.
                warn!(
                    samples = self.write_index,
                    "flush retry budget exhausted, dropping frame"
                );
                self.write_index = 0;
                self.retry_count = 0;
            }
        }
        self.in_flight = false;
    }
}

/// [`FlushSink`] over the bounded dispatch queue. A full queue sheds the
/// chunk outright; only a closed queue counts as a dispatch failure.
pub struct QueueSink {
    tx: mpsc::Sender<Vec<i16>>,
    shed: u64,
}

impl QueueSink {
    pub fn new(tx: mpsc::Sender<Vec<i16>>) -> Self {
        Self { tx, shed: 0 }
    }

    pub fn shed(&self) -> u64 {
        self.shed
    }
}

impl FlushSink for QueueSink {
    fn accept(&mut self, chunk: Vec<i16>) -> bool {
        match self.tx.try_send(chunk) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.shed += 1;
                if self.shed % 50 == 1 {
                    warn!(dropped = self.shed, "dispatch queue full, shedding audio");
                }
                true
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// Blocking loop that drains the capture ring into the frame buffer.
/// Runs on its own thread; exits when `cancel` fires.
pub fn run_accumulator<C>(mut consumer: C, tx: mpsc::Sender<Vec<i16>>, cancel: CancellationToken)
where
    C: Consumer<Item = f32> + Send,
{
    let mut frame = FrameBuffer::new(FRAME_CAPACITY);
    let mut sink = QueueSink::new(tx);
    let mut scratch = vec![0.0f32; 1024];

    info!("audio accumulator started");
    while !cancel.is_cancelled() {
        let available = consumer.occupied_len();
        if available == 0 {
            std::thread::sleep(Duration::from_millis(10));
            continue;
        }
        let n = available.min(scratch.len());
        let read = consumer.pop_slice(&mut scratch[..n]);
        frame.extend(&scratch[..read], &mut sink);
    }
    // Do not strand a partial frame on stop.
    frame.flush(&mut sink);
    info!(shed = sink.shed(), "audio accumulator stopped");
}

/// Cadence loop: at most one network dispatch per interval, batching
/// whatever accumulated since the last send.
pub async fn run_dispatch_loop(
    mut rx: mpsc::Receiver<Vec<i16>>,
    transport: Arc<dyn AgentTransport>,
    cancel: CancellationToken,
) {
    let mut cadence = tokio::time::interval(Duration::from_millis(SEND_INTERVAL_MS));
    cadence.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = cadence.tick() => {}
        }

        let mut batch: Vec<i16> = Vec::new();
        while let Ok(chunk) = rx.try_recv() {
            batch.extend_from_slice(&chunk);
        }
        if batch.is_empty() {
            continue;
        }

        if let Err(e) = transport.send_audio_chunk(&batch, AUDIO_SAMPLE_RATE).await {
            let err = Error::Dispatch(format!("{e:#}"));
            warn!(samples = batch.len(), "{err}; batch dropped");
        }
    }
    debug!("audio dispatch loop stopped");
}
