// Scheduling properties of the playback pipeline: gapless back-to-back
// playback and cursor reset on interruption.

use interview_live::audio::pcm::encode_frame;
use interview_live::audio::playback::{AudioSink, PlaybackPipeline, ScheduledSource};
use interview_live::error::Result;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct SinkState {
    clock: f64,
    played: Vec<ScheduledSource>,
    stop_calls: usize,
}

/// Sink double whose clock the test advances by hand.
#[derive(Clone)]
struct ManualSink {
    state: Arc<Mutex<SinkState>>,
}

impl ManualSink {
    fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SinkState::default())),
        }
    }

    fn advance_to(&self, t: f64) {
        self.state.lock().unwrap().clock = t;
    }
}

impl AudioSink for ManualSink {
    fn now(&self) -> f64 {
        self.state.lock().unwrap().clock
    }

    fn play(&mut self, source: ScheduledSource) -> Result<()> {
        self.state.lock().unwrap().played.push(source);
        Ok(())
    }

    fn stop_all(&mut self) {
        self.state.lock().unwrap().stop_calls += 1;
    }
}

/// PCM16 chunk with the given duration at 24 kHz mono.
fn chunk(duration_secs: f64) -> Vec<u8> {
    let samples = (duration_secs * 24000.0).round() as usize;
    encode_frame(&vec![2000i16; samples])
}

#[test]
fn test_chunks_play_back_to_back_without_gaps() {
    let sink = ManualSink::new();
    let mut pipeline = PlaybackPipeline::new(sink.clone());

    let durations = [0.25, 0.5, 0.125, 1.0];
    for d in durations {
        pipeline.enqueue(&chunk(d)).unwrap();
    }

    let state = sink.state.lock().unwrap();
    assert_eq!(state.played.len(), durations.len());
    for pair in state.played.windows(2) {
        let gap = pair[1].start - pair[0].end();
        assert!(
            gap.abs() < 1e-9,
            "gap of {}s between consecutive chunks",
            gap
        );
    }
}

#[test]
fn test_cursor_advances_by_sum_of_durations() {
    let sink = ManualSink::new();
    let mut pipeline = PlaybackPipeline::new(sink);

    pipeline.enqueue(&chunk(0.5)).unwrap();
    pipeline.enqueue(&chunk(0.25)).unwrap();

    assert!((pipeline.cursor() - 0.75).abs() < 1e-9);
}

#[test]
fn test_late_arrival_schedules_at_current_clock() {
    let sink = ManualSink::new();
    let mut pipeline = PlaybackPipeline::new(sink.clone());

    pipeline.enqueue(&chunk(0.1)).unwrap();
    // Output clock ran past the queued audio before the next chunk came in.
    sink.advance_to(3.0);
    pipeline.enqueue(&chunk(0.1)).unwrap();

    let state = sink.state.lock().unwrap();
    assert_eq!(state.played[1].start, 3.0);
}

#[test]
fn test_interruption_resets_cursor_and_silences_output() {
    let sink = ManualSink::new();
    let mut pipeline = PlaybackPipeline::new(sink.clone());

    pipeline.enqueue(&chunk(2.0)).unwrap();
    assert!(pipeline.is_speaking());

    pipeline.interrupt();

    assert_eq!(pipeline.cursor(), 0.0);
    assert!(!pipeline.is_speaking());
    assert_eq!(sink.state.lock().unwrap().stop_calls, 1);

    // Post-interruption audio starts a fresh timeline from the clock.
    pipeline.enqueue(&chunk(0.5)).unwrap();
    let state = sink.state.lock().unwrap();
    assert_eq!(state.played[1].start, 0.0);
}

#[test]
fn test_speaking_signal_follows_scheduled_tail() {
    let sink = ManualSink::new();
    let mut pipeline = PlaybackPipeline::new(sink.clone());

    pipeline.enqueue(&chunk(1.0)).unwrap();
    pipeline.enqueue(&chunk(1.0)).unwrap();

    sink.advance_to(1.5);
    assert!(pipeline.is_speaking(), "second chunk still playing");

    sink.advance_to(2.5);
    assert!(!pipeline.is_speaking(), "all chunks finished");
}
