use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use sceneflow::segment::{Segmenter, Transcoder};

#[derive(Default)]
struct MockState {
    runs: Vec<Vec<String>>,
    deleted: Vec<String>,
}

/// Canned-log transcoder; records every command and deletion.
#[derive(Clone)]
struct MockTranscoder {
    probe_log: String,
    filter_log: String,
    fail_outputs: HashSet<String>,
    state: Arc<Mutex<MockState>>,
}

impl MockTranscoder {
    fn new(probe_log: &str, filter_log: &str) -> Self {
        Self {
            probe_log: probe_log.to_string(),
            filter_log: filter_log.to_string(),
            fail_outputs: HashSet::new(),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    fn failing_on(mut self, output: &str) -> Self {
        self.fail_outputs.insert(output.to_string());
        self
    }
}

#[async_trait]
impl Transcoder for MockTranscoder {
    async fn load(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn write_input(&mut self, _name: &str, _bytes: &[u8]) -> anyhow::Result<()> {
        Ok(())
    }

    async fn run(&mut self, args: &[String]) -> anyhow::Result<String> {
        self.state.lock().unwrap().runs.push(args.to_vec());
        if args.len() == 2 {
            // bare probe
            return Ok(self.probe_log.clone());
        }
        if args.iter().any(|a| a == "-vf") {
            return Ok(self.filter_log.clone());
        }
        // extraction; last arg is the output name
        let out = args.last().unwrap();
        if self.fail_outputs.contains(out) {
            anyhow::bail!("cut failed for {out}");
        }
        Ok(String::new())
    }

    async fn read_output(&mut self, name: &str) -> anyhow::Result<Vec<u8>> {
        Ok(name.as_bytes().to_vec())
    }

    async fn delete_output(&mut self, name: &str) -> anyhow::Result<()> {
        self.state.lock().unwrap().deleted.push(name.to_string());
        Ok(())
    }
}

const PROBE_8S: &str = "Input #0, mov\n  Duration: 00:00:08.00, start: 0.000000\n";

#[tokio::test]
async fn detected_boundaries_become_adjacent_intervals() {
    // Repeated log emission duplicates every marker; they must collapse.
    let filter_log = "\
[showinfo] pts_time:2.0 mean\n\
[showinfo] pts_time:5.5 mean\n\
[showinfo] pts_time:2.0 mean\n\
[showinfo] pts_time:5.5 mean\n";
    let mock = MockTranscoder::new(PROBE_8S, filter_log);
    let mut segmenter = Segmenter::new(mock);

    let result = segmenter.segment(&[0u8; 16]).await.unwrap();

    assert_eq!(result.duration, 8.0);
    let spans: Vec<(f64, f64)> = result
        .scenes
        .iter()
        .map(|s| (s.start_time, s.end_time))
        .collect();
    assert_eq!(spans, vec![(0.0, 2.0), (2.0, 5.5), (5.5, 8.0)]);
    assert!(result.scenes.iter().all(|s| !s.is_analyzed));
}

#[tokio::test]
async fn no_boundaries_yields_a_single_full_interval() {
    let mock = MockTranscoder::new(PROBE_8S, "no markers in this log");
    let mut segmenter = Segmenter::new(mock);

    let result = segmenter.segment(&[0u8; 16]).await.unwrap();

    assert_eq!(result.scenes.len(), 1);
    assert_eq!(result.scenes[0].start_time, 0.0);
    assert_eq!(result.scenes[0].end_time, 8.0);
}

#[tokio::test]
async fn unparseable_duration_degrades_instead_of_failing() {
    // Duration missing: the closing boundary is 0, so only the interval
    // before the first marker survives.
    let mock = MockTranscoder::new("garbled probe output", "x pts_time:2.0 y");
    let mut segmenter = Segmenter::new(mock);

    let result = segmenter.segment(&[0u8; 16]).await.unwrap();

    assert_eq!(result.duration, 0.0);
    let spans: Vec<(f64, f64)> = result
        .scenes
        .iter()
        .map(|s| (s.start_time, s.end_time))
        .collect();
    assert_eq!(spans, vec![(0.0, 2.0)], "empty trailing interval skipped");
}

#[tokio::test]
async fn a_failed_interval_is_skipped_not_fatal() {
    let filter_log = "pts_time:2.0\npts_time:5.5\n";
    let mock = MockTranscoder::new(PROBE_8S, filter_log).failing_on("scene_1.mp4");
    let state = mock.state.clone();
    let mut segmenter = Segmenter::new(mock);

    let result = segmenter.segment(&[0u8; 16]).await.unwrap();

    let spans: Vec<(f64, f64)> = result
        .scenes
        .iter()
        .map(|s| (s.start_time, s.end_time))
        .collect();
    assert_eq!(spans, vec![(0.0, 2.0), (5.5, 8.0)]);

    // Temp artifacts are removed for failed intervals too.
    let deleted = state.lock().unwrap().deleted.clone();
    assert_eq!(deleted, vec!["scene_0.mp4", "scene_1.mp4", "scene_2.mp4"]);
}

#[tokio::test]
async fn zero_scenes_is_a_recoverable_empty_result() {
    let mock = MockTranscoder::new("no duration here", "no markers either");
    let state = mock.state.clone();
    let mut segmenter = Segmenter::new(mock);

    let result = segmenter.segment(&[0u8; 16]).await.unwrap();

    assert!(result.scenes.is_empty());
    assert_eq!(result.duration, 0.0);
    // Probe + filter ran, but no extraction was attempted.
    assert_eq!(state.lock().unwrap().runs.len(), 2);
}
