//! Deterministic scene-boundary segmentation.
//!
//! The segmenter drives an external transcode engine through the
//! [`Transcoder`] trait: probe the container for its duration, run a
//! scene-change filter, and cut the input at the detected boundaries. Every
//! failure short of "cannot even hand the bytes to the transcoder" degrades
//! to reduced output instead of aborting.

use std::cmp::Ordering;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::session::Scene;

/// Name the input bytes are registered under inside the transcoder.
pub const INPUT_NAME: &str = "input.mp4";

/// Scene-change filter: emits a `pts_time:` log line per detected cut.
const SCENE_FILTER: &str = "select='gt(scene,0.4)',showinfo";

/// External decode/encode engine, specified only at this surface.
#[async_trait]
pub trait Transcoder: Send {
    async fn load(&mut self) -> anyhow::Result<()>;
    async fn write_input(&mut self, name: &str, bytes: &[u8]) -> anyhow::Result<()>;
    /// Run one command and return the engine's textual log output.
    async fn run(&mut self, args: &[String]) -> anyhow::Result<String>;
    async fn read_output(&mut self, name: &str) -> anyhow::Result<Vec<u8>>;
    async fn delete_output(&mut self, name: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Default)]
pub struct Segmentation {
    pub scenes: Vec<Scene>,
    pub duration: f64,
}

/// Owns the transcoder instance for the lifetime of the session.
pub struct Segmenter<T: Transcoder> {
    transcoder: T,
    loaded: bool,
}

impl<T: Transcoder> Segmenter<T> {
    pub fn new(transcoder: T) -> Self {
        Self {
            transcoder,
            loaded: false,
        }
    }

    /// Split `video` into an ordered list of scene clips.
    ///
    /// Returns `Err` only when the input could not be handed to the engine at
    /// all; a probe or filter failure degrades to a single `[0, duration]`
    /// interval, and a failed interval extraction is skipped. The result may
    /// therefore be empty, which callers treat as recoverable.
    pub async fn segment(&mut self, video: &[u8]) -> Result<Segmentation> {
        if !self.loaded {
            self.transcoder
                .load()
                .await
                .map_err(|e| Error::Segmentation(format!("engine load failed: {e:#}")))?;
            self.loaded = true;
        }
        self.transcoder
            .write_input(INPUT_NAME, video)
            .await
            .map_err(|e| Error::Segmentation(format!("input write failed: {e:#}")))?;

        // Probe. The bare `-i` run "fails" by design; the duration lives in
        // its log output. A missing match leaves duration at 0.
        let probe_log = match self.transcoder.run(&[s("-i"), s(INPUT_NAME)]).await {
            Ok(log) => log,
            Err(e) => {
                warn!("duration probe failed: {e:#}");
                String::new()
            }
        };
        let duration = parse_duration(&probe_log);
        info!(duration, "probed video duration");

        let filter_args = [
            s("-i"),
            s(INPUT_NAME),
            s("-vf"),
            s(SCENE_FILTER),
            s("-f"),
            s("null"),
            s("-"),
        ];
        let timestamps = match self.transcoder.run(&filter_args).await {
            Ok(log) => extract_timestamps(&log),
            Err(e) => {
                warn!("scene-change filter failed, falling back to a single interval: {e:#}");
                Vec::new()
            }
        };
        debug!(?timestamps, "detected scene boundaries");

        let mut boundaries = Vec::with_capacity(timestamps.len() + 2);
        boundaries.push(0.0);
        boundaries.extend(timestamps);
        boundaries.push(duration);

        let mut scenes = Vec::new();
        for i in 0..boundaries.len() - 1 {
            let (start, end) = (boundaries[i], boundaries[i + 1]);
            if end <= start {
                continue;
            }
            let out_name = format!("scene_{i}.mp4");
            let extracted = self.extract_clip(start, end, &out_name).await;
            // The temp artifact goes away whether or not the cut worked.
            if let Err(e) = self.transcoder.delete_output(&out_name).await {
                debug!("could not remove {out_name}: {e:#}");
            }
            match extracted {
                Ok(bytes) => scenes.push(Scene::new(bytes, start, end)),
                Err(e) => {
                    warn!("extraction of [{start:.2}, {end:.2}) failed, skipping interval: {e:#}")
                }
            }
        }

        info!(scenes = scenes.len(), "segmentation finished");
        Ok(Segmentation { scenes, duration })
    }

    async fn extract_clip(&mut self, start: f64, end: f64, out_name: &str) -> anyhow::Result<Vec<u8>> {
        let args = [
            s("-i"),
            s(INPUT_NAME),
            s("-ss"),
            start.to_string(),
            s("-to"),
            end.to_string(),
            s("-c"),
            s("copy"),
            s(out_name),
        ];
        self.transcoder.run(&args).await?;
        self.transcoder.read_output(out_name).await
    }
}

fn s(v: &str) -> String {
    v.to_string()
}

/// Pull the container duration out of the probe log. 0.0 when absent.
pub fn parse_duration(log: &str) -> f64 {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"Duration: (\d{2}):(\d{2}):(\d{2}\.\d{2})").expect("duration pattern")
    });
    let Some(caps) = re.captures(log) else {
        return 0.0;
    };
    let hours: f64 = caps[1].parse().unwrap_or(0.0);
    let minutes: f64 = caps[2].parse().unwrap_or(0.0);
    let seconds: f64 = caps[3].parse().unwrap_or(0.0);
    hours * 3600.0 + minutes * 60.0 + seconds
}

/// Collect the distinct `pts_time:` markers, ascending. The filter emits its
/// log repeatedly, so duplicates are expected and dropped.
pub fn extract_timestamps(log: &str) -> Vec<f64> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"pts_time:(\d+\.\d+)").expect("pts_time pattern"));

    let mut stamps: Vec<f64> = re
        .captures_iter(log)
        .filter_map(|caps| caps[1].parse().ok())
        .collect();
    stamps.sort_by(|a: &f64, b: &f64| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    stamps.dedup();
    stamps
}
