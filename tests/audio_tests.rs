use sceneflow::audio::pipeline::{
    pcm16_from_f32, FlushSink, FrameBuffer, QueueSink, FLUSH_THRESHOLD, FRAME_CAPACITY,
    MAX_FLUSH_RETRIES,
};

struct RecordingSink {
    chunks: Vec<Vec<i16>>,
    accepting: bool,
}

impl RecordingSink {
    fn new(accepting: bool) -> Self {
        Self {
            chunks: Vec::new(),
            accepting,
        }
    }
}

impl FlushSink for RecordingSink {
    fn accept(&mut self, chunk: Vec<i16>) -> bool {
        if self.accepting {
            self.chunks.push(chunk);
        }
        self.accepting
    }
}

#[test]
fn crossing_the_threshold_flushes_once_with_everything() {
    let mut frame = FrameBuffer::new(FRAME_CAPACITY);
    let mut sink = RecordingSink::new(true);

    let fed = (FRAME_CAPACITY as f32 * 0.8) as usize;
    assert!(fed as f32 >= FRAME_CAPACITY as f32 * FLUSH_THRESHOLD);
    frame.extend(&vec![0.5; fed], &mut sink);

    assert_eq!(sink.chunks.len(), 1, "exactly one flush");
    assert_eq!(sink.chunks[0].len(), fed, "all buffered samples included");
    assert_eq!(frame.write_index(), 0, "frame reset after flush");
}

#[test]
fn below_the_threshold_keeps_buffering() {
    let mut frame = FrameBuffer::new(FRAME_CAPACITY);
    let mut sink = RecordingSink::new(true);

    frame.extend(&vec![0.1; 1000], &mut sink);

    assert!(sink.chunks.is_empty());
    assert_eq!(frame.write_index(), 1000);
}

#[test]
fn filling_past_capacity_flushes_a_full_frame() {
    let mut frame = FrameBuffer::new(FRAME_CAPACITY);
    let mut sink = RecordingSink::new(true);

    frame.extend(&vec![0.2; FRAME_CAPACITY + 100], &mut sink);

    assert_eq!(sink.chunks.len(), 1);
    assert_eq!(sink.chunks[0].len(), FRAME_CAPACITY);
    assert_eq!(frame.write_index(), 100, "remainder stays buffered");
}

#[test]
fn conversion_saturates_instead_of_wrapping() {
    assert_eq!(pcm16_from_f32(0.0), 0);
    assert_eq!(pcm16_from_f32(1.0), i16::MAX);
    assert_eq!(pcm16_from_f32(-1.0), i16::MIN);
    assert_eq!(pcm16_from_f32(2.0), i16::MAX, "overdrive clips to the rail");
    assert_eq!(pcm16_from_f32(-2.0), i16::MIN);
    assert_eq!(pcm16_from_f32(0.5), 16384);
}

#[test]
fn exhausted_retry_budget_drops_the_frame() {
    let mut frame = FrameBuffer::new(FRAME_CAPACITY);
    let mut failing = RecordingSink::new(false);

    let fed = (FRAME_CAPACITY as f32 * 0.8) as usize;
    frame.extend(&vec![0.3; fed], &mut failing); // attempt 1 fails
    assert_eq!(frame.write_index(), fed, "frame retained for retry");

    for _ in 0..MAX_FLUSH_RETRIES {
        frame.flush(&mut failing);
    }
    assert_eq!(frame.write_index(), 0, "dropped after the retry budget");

    // A later flush has nothing stale to resend.
    let mut ok = RecordingSink::new(true);
    frame.flush(&mut ok);
    assert!(ok.chunks.is_empty());
}

#[test]
fn queue_sink_sheds_when_the_queue_is_full() {
    let (tx, mut rx) = tokio::sync::mpsc::channel::<Vec<i16>>(2);
    let mut sink = QueueSink::new(tx);

    assert!(sink.accept(vec![1]));
    assert!(sink.accept(vec![2]));
    assert!(sink.accept(vec![3]), "shedding is not a dispatch failure");
    assert_eq!(sink.shed(), 1);

    assert_eq!(rx.try_recv().unwrap(), vec![1]);
    assert_eq!(rx.try_recv().unwrap(), vec![2]);
    assert!(rx.try_recv().is_err(), "third chunk was shed, not queued");
}

#[test]
fn queue_sink_reports_a_closed_queue_as_failure() {
    let (tx, rx) = tokio::sync::mpsc::channel::<Vec<i16>>(2);
    drop(rx);
    let mut sink = QueueSink::new(tx);
    assert!(!sink.accept(vec![1]));
}
