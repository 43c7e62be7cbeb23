//! Model-speech playback pipeline.
//!
//! Inbound chunks are headerless PCM16 at 24 kHz mono. Each chunk is
//! decoded and scheduled to start at `max(cursor, now)`, after which the
//! cursor advances by the chunk's duration, so consecutive chunks play
//! back-to-back with no gaps or overlap. An interruption signal (barge-in)
//! discards everything scheduled and resets the cursor to zero.

use crate::audio::pcm;
use crate::error::{Result, SessionError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Sample rate the remote protocol uses on the output leg.
pub const PLAYBACK_SAMPLE_RATE: u32 = 24_000;

/// One decoded chunk with its computed start time on the output clock.
#[derive(Debug, Clone)]
pub struct ScheduledSource {
    /// Start time in seconds on the sink's clock
    pub start: f64,
    /// Normalized mono samples
    pub samples: Vec<f32>,
    /// Sample rate of the samples
    pub sample_rate: u32,
}

impl ScheduledSource {
    pub fn duration(&self) -> f64 {
        pcm::duration_secs(self.samples.len(), self.sample_rate)
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration()
    }
}

/// Audio output abstraction the pipeline schedules onto.
///
/// `now()` is the output clock in seconds; scheduling decisions are made
/// against it, so test sinks can drive it manually.
pub trait AudioSink: Send {
    /// Current output clock time in seconds.
    fn now(&self) -> f64;

    /// Queue a source for playback at its scheduled start time.
    fn play(&mut self, source: ScheduledSource) -> Result<()>;

    /// Stop and discard everything queued or playing.
    fn stop_all(&mut self);
}

/// Gapless playback scheduler for model speech.
pub struct PlaybackPipeline<S: AudioSink> {
    sink: S,
    /// Next start time for an incoming chunk; the single shared cursor.
    cursor: f64,
    /// End times of sources scheduled since the last interruption.
    active_ends: Vec<f64>,
    sample_rate: u32,
}

impl<S: AudioSink> PlaybackPipeline<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            cursor: 0.0,
            active_ends: Vec::new(),
            sample_rate: PLAYBACK_SAMPLE_RATE,
        }
    }

    /// Decode one inbound PCM chunk and schedule it after everything
    /// already queued. Empty or undecodable chunks are skipped, not fatal.
    pub fn enqueue(&mut self, pcm_bytes: &[u8]) -> Result<()> {
        let samples = pcm::decode_pcm16_mono(pcm_bytes);
        if samples.is_empty() {
            warn!("Skipping empty audio chunk ({} bytes)", pcm_bytes.len());
            return Ok(());
        }

        let start = self.cursor.max(self.sink.now());
        let source = ScheduledSource {
            start,
            samples,
            sample_rate: self.sample_rate,
        };
        self.cursor = source.end();
        self.active_ends.push(source.end());

        self.sink.play(source)
    }

    /// Barge-in: drop all scheduled output and rewind the cursor.
    pub fn interrupt(&mut self) {
        self.sink.stop_all();
        self.active_ends.clear();
        self.cursor = 0.0;
    }

    /// True while any scheduled source has not yet finished playing.
    pub fn is_speaking(&mut self) -> bool {
        let now = self.sink.now();
        self.active_ends.retain(|end| *end > now);
        !self.active_ends.is_empty()
    }

    /// Current cursor position in seconds.
    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    /// Session-end teardown; identical to an interruption.
    pub fn reset(&mut self) {
        self.interrupt();
    }
}

/// Shared state between the pipeline's thread and the cpal output callback.
struct SinkShared {
    /// Samples waiting to be written to the device, already gap-padded.
    queue: Mutex<VecDeque<f32>>,
    /// Total samples consumed by the device callback; drives the clock.
    consumed: AtomicU64,
}

/// Speaker output via cpal at the protocol's 24 kHz mono.
///
/// Scheduling is realized by padding: a source whose start time lies
/// beyond the current end of the queue gets silence inserted ahead of it,
/// so queue order alone reproduces the scheduled timeline.
pub struct CpalSink {
    shared: Arc<SinkShared>,
    _stream: SendableStream,
    sample_rate: u32,
    /// Samples written into the queue since creation, consumed or not.
    queued_total: u64,
}

struct SendableStream(cpal::Stream);

// Stream is only dropped from the owning thread; cpal invokes the data
// callback on its own thread but we never touch the handle from there.
unsafe impl Send for SendableStream {}

impl CpalSink {
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| SessionError::setup("No audio output device available"))?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        info!("Opening audio output on {}", device_name);

        let config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(PLAYBACK_SAMPLE_RATE),
            buffer_size: cpal::BufferSize::Default,
        };

        let shared = Arc::new(SinkShared {
            queue: Mutex::new(VecDeque::new()),
            consumed: AtomicU64::new(0),
        });

        let cb_shared = Arc::clone(&shared);
        let stream = device
            .build_output_stream(
                &config,
                move |out: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut queue = match cb_shared.queue.lock() {
                        Ok(q) => q,
                        Err(_) => return,
                    };
                    for slot in out.iter_mut() {
                        *slot = queue.pop_front().unwrap_or(0.0);
                    }
                    cb_shared
                        .consumed
                        .fetch_add(out.len() as u64, Ordering::Relaxed);
                },
                |err| {
                    warn!("Audio output stream error: {}", err);
                },
                None,
            )
            .map_err(|e| SessionError::setup(format!("Failed to open audio output: {}", e)))?;

        stream
            .play()
            .map_err(|e| SessionError::setup(format!("Failed to start audio output: {}", e)))?;

        Ok(Self {
            shared,
            _stream: SendableStream(stream),
            sample_rate: PLAYBACK_SAMPLE_RATE,
            queued_total: 0,
        })
    }
}

impl AudioSink for CpalSink {
    fn now(&self) -> f64 {
        self.shared.consumed.load(Ordering::Relaxed) as f64 / self.sample_rate as f64
    }

    fn play(&mut self, source: ScheduledSource) -> Result<()> {
        let start_sample = (source.start * self.sample_rate as f64).round() as u64;

        let mut queue = self
            .shared
            .queue
            .lock()
            .map_err(|_| SessionError::setup("Playback queue lock poisoned"))?;

        // Pad with silence up to the scheduled start; back-to-back chunks
        // produce zero padding here.
        if start_sample > self.queued_total {
            let pad = (start_sample - self.queued_total) as usize;
            queue.extend(std::iter::repeat(0.0).take(pad));
            self.queued_total = start_sample;
        }

        self.queued_total += source.samples.len() as u64;
        queue.extend(source.samples);

        Ok(())
    }

    fn stop_all(&mut self) {
        if let Ok(mut queue) = self.shared.queue.lock() {
            queue.clear();
        }
        // Restart the timeline at the consumed position so the next
        // schedule pads from "now", not from the discarded tail.
        self.queued_total = self.shared.consumed.load(Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sink double with a manually advanced clock.
    struct TestSink {
        clock: Arc<Mutex<f64>>,
        played: Vec<ScheduledSource>,
        stopped: usize,
    }

    impl TestSink {
        fn new(clock: Arc<Mutex<f64>>) -> Self {
            Self {
                clock,
                played: Vec::new(),
                stopped: 0,
            }
        }
    }

    impl AudioSink for TestSink {
        fn now(&self) -> f64 {
            *self.clock.lock().unwrap()
        }

        fn play(&mut self, source: ScheduledSource) -> Result<()> {
            self.played.push(source);
            Ok(())
        }

        fn stop_all(&mut self) {
            self.stopped += 1;
        }
    }

    fn chunk_of(samples: usize) -> Vec<u8> {
        pcm::encode_frame(&vec![1000i16; samples])
    }

    #[test]
    fn test_back_to_back_scheduling_is_gapless() {
        let clock = Arc::new(Mutex::new(0.0));
        let mut pipeline = PlaybackPipeline::new(TestSink::new(Arc::clone(&clock)));

        // Three chunks of 0.5s each at 24kHz.
        for _ in 0..3 {
            pipeline.enqueue(&chunk_of(12000)).unwrap();
        }

        let played = &pipeline.sink.played;
        assert_eq!(played.len(), 3);
        assert_eq!(played[0].start, 0.0);
        assert_eq!(played[1].start, played[0].end());
        assert_eq!(played[2].start, played[1].end());
        assert_eq!(pipeline.cursor(), 1.5);
    }

    #[test]
    fn test_schedule_never_starts_in_the_past() {
        let clock = Arc::new(Mutex::new(0.0));
        let mut pipeline = PlaybackPipeline::new(TestSink::new(Arc::clone(&clock)));

        pipeline.enqueue(&chunk_of(2400)).unwrap(); // 0.1s, ends at 0.1
        *clock.lock().unwrap() = 5.0;
        pipeline.enqueue(&chunk_of(2400)).unwrap();

        assert_eq!(pipeline.sink.played[1].start, 5.0);
        assert!((pipeline.cursor() - 5.1).abs() < 1e-9);
    }

    #[test]
    fn test_interrupt_resets_cursor_and_stops_sources() {
        let clock = Arc::new(Mutex::new(0.0));
        let mut pipeline = PlaybackPipeline::new(TestSink::new(Arc::clone(&clock)));

        pipeline.enqueue(&chunk_of(24000)).unwrap();
        assert!(pipeline.is_speaking());

        pipeline.interrupt();
        assert_eq!(pipeline.cursor(), 0.0);
        assert_eq!(pipeline.sink.stopped, 1);
        assert!(!pipeline.is_speaking());
    }

    #[test]
    fn test_is_speaking_flips_false_after_last_source_ends() {
        let clock = Arc::new(Mutex::new(0.0));
        let mut pipeline = PlaybackPipeline::new(TestSink::new(Arc::clone(&clock)));

        pipeline.enqueue(&chunk_of(24000)).unwrap(); // 1s
        assert!(pipeline.is_speaking());

        *clock.lock().unwrap() = 0.5;
        assert!(pipeline.is_speaking());

        *clock.lock().unwrap() = 1.01;
        assert!(!pipeline.is_speaking());
    }

    #[test]
    fn test_empty_chunk_is_skipped() {
        let clock = Arc::new(Mutex::new(0.0));
        let mut pipeline = PlaybackPipeline::new(TestSink::new(clock));

        pipeline.enqueue(&[]).unwrap();
        assert!(pipeline.sink.played.is_empty());
        assert_eq!(pipeline.cursor(), 0.0);
    }
}
