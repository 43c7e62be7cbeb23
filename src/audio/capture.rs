//! Microphone capture pipeline.
//!
//! Acquires an input stream, converts it to the protocol contract
//! (16 kHz mono PCM16) and slices it into fixed-size frames delivered
//! through a channel. There is no backlog: a frame is produced, handed
//! to the session, and forgotten.

use crate::error::{Result, SessionError};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Sample rate the remote protocol expects on the input leg.
pub const CAPTURE_SAMPLE_RATE: u32 = 16_000;

/// Fixed frame size in samples (mono).
pub const FRAME_SAMPLES: usize = 4096;

/// One outbound chunk of microphone audio (i16 PCM, mono).
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Configuration for a capture backend.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Target sample rate (will downsample if the device differs)
    pub sample_rate: u32,
    /// Target channel count (the protocol is mono)
    pub channels: u16,
    /// Samples per emitted frame
    pub frame_samples: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: CAPTURE_SAMPLE_RATE,
            channels: 1,
            frame_samples: FRAME_SAMPLES,
        }
    }
}

/// Microphone capture backend trait.
///
/// The cpal implementation below is the production path; tests drive the
/// session with scripted backends instead.
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive fixed-size audio frames
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Stop capturing audio
    async fn stop(&mut self) -> Result<()>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Accumulates samples and emits fixed-size frames.
///
/// Owns the frame clock: timestamps advance by exactly one frame duration
/// per emitted frame, independent of callback batching.
#[derive(Debug)]
pub struct FrameSlicer {
    pending: Vec<i16>,
    frame_samples: usize,
    sample_rate: u32,
    frames_emitted: u64,
}

impl FrameSlicer {
    pub fn new(frame_samples: usize, sample_rate: u32) -> Self {
        Self {
            pending: Vec::with_capacity(frame_samples * 2),
            frame_samples,
            sample_rate,
            frames_emitted: 0,
        }
    }

    /// Feed captured samples; returns every completed frame.
    pub fn push(&mut self, samples: &[i16]) -> Vec<AudioFrame> {
        self.pending.extend_from_slice(samples);

        let mut frames = Vec::new();
        while self.pending.len() >= self.frame_samples {
            let rest = self.pending.split_off(self.frame_samples);
            let chunk = std::mem::replace(&mut self.pending, rest);

            let timestamp_ms =
                self.frames_emitted * self.frame_samples as u64 * 1000 / self.sample_rate as u64;
            self.frames_emitted += 1;

            frames.push(AudioFrame {
                samples: chunk,
                sample_rate: self.sample_rate,
                channels: 1,
                timestamp_ms,
            });
        }

        frames
    }

    /// Samples currently waiting for a full frame.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Downsample by decimation: take every Nth sample.
///
/// Only integer ratios are handled; the preferred stream configs below
/// make non-integer ratios rare, and decimation is good enough for
/// speech input at 16 kHz.
pub fn downsample(samples: &[i16], source_rate: u32, target_rate: u32) -> Vec<i16> {
    if source_rate <= target_rate || target_rate == 0 {
        return samples.to_vec();
    }

    let ratio = (source_rate / target_rate).max(1);
    samples.iter().step_by(ratio as usize).copied().collect()
}

/// Convert interleaved stereo to mono by summing channels.
pub fn stereo_to_mono(samples: &[i16]) -> Vec<i16> {
    let mut mono = Vec::with_capacity(samples.len() / 2);
    for pair in samples.chunks_exact(2) {
        let sum = pair[0] as i32 + pair[1] as i32;
        mono.push(sum.clamp(i16::MIN as i32, i16::MAX as i32) as i16);
    }
    mono
}

/// Wrapper for cpal::Stream to make it Send.
///
/// The stream is only touched while holding the surrounding Mutex, so
/// access is serialized even though cpal does not mark it Send.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

/// Microphone capture via cpal.
///
/// Tries i16/16kHz/mono first (PipeWire/PulseAudio convert transparently),
/// then f32/16kHz/mono, then the device default config with software
/// conversion (stereo summing + decimation).
pub struct CpalCaptureBackend {
    config: CaptureConfig,
    stream: Arc<Mutex<Option<SendableStream>>>,
    capturing: Arc<AtomicBool>,
    drain_handle: Option<tokio::task::JoinHandle<()>>,
}

impl CpalCaptureBackend {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            stream: Arc::new(Mutex::new(None)),
            capturing: Arc::new(AtomicBool::new(false)),
            drain_handle: None,
        }
    }

    fn default_device() -> Result<cpal::Device> {
        let host = cpal::default_host();
        host.default_input_device().ok_or_else(|| {
            SessionError::setup("No microphone available (permission denied or no device)")
        })
    }

    /// Build the input stream, filling `buffer` with 16 kHz mono i16.
    fn build_stream(
        &self,
        device: &cpal::Device,
        buffer: Arc<Mutex<Vec<i16>>>,
    ) -> Result<cpal::Stream> {
        let target_rate = self.config.sample_rate;

        let preferred = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(target_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let err_callback = |err| {
            warn!("Audio input stream error: {}", err);
        };

        // i16 at the protocol rate: zero-conversion path.
        let buf = Arc::clone(&buffer);
        if let Ok(stream) = device.build_input_stream(
            &preferred,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                if let Ok(mut b) = buf.lock() {
                    b.extend_from_slice(data);
                }
            },
            err_callback,
            None,
        ) {
            return Ok(stream);
        }

        // f32 at the protocol rate.
        let buf = Arc::clone(&buffer);
        if let Ok(stream) = device.build_input_stream(
            &preferred,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if let Ok(mut b) = buf.lock() {
                    b.extend(
                        data.iter()
                            .map(|s| (s.clamp(-1.0, 1.0) * 32767.0) as i16),
                    );
                }
            },
            err_callback,
            None,
        ) {
            return Ok(stream);
        }

        // Device default config with software conversion. Some ALSA
        // compatibility layers accept non-native configs but never fire
        // the data callback, so this fallback is load-bearing.
        let default_config = device.default_input_config().map_err(|e| {
            SessionError::setup(format!("Failed to query input device config: {}", e))
        })?;
        let native_rate = default_config.sample_rate().0;
        let native_channels = default_config.channels();

        info!(
            "Falling back to native input config: {} Hz, {} ch",
            native_rate, native_channels
        );

        let buf = Arc::clone(&buffer);
        let stream = device
            .build_input_stream(
                &default_config.into(),
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let as_i16: Vec<i16> = data
                        .iter()
                        .map(|s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
                        .collect();
                    let mono = if native_channels == 2 {
                        stereo_to_mono(&as_i16)
                    } else {
                        as_i16
                    };
                    let resampled = downsample(&mono, native_rate, target_rate);
                    if let Ok(mut b) = buf.lock() {
                        b.extend_from_slice(&resampled);
                    }
                },
                err_callback,
                None,
            )
            .map_err(|e| SessionError::setup(format!("Failed to open microphone: {}", e)))?;

        Ok(stream)
    }
}

#[async_trait]
impl CaptureBackend for CpalCaptureBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.capturing.load(Ordering::SeqCst) {
            return Err(SessionError::setup("Capture already running"));
        }

        let device = Self::default_device()?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        info!("Starting microphone capture on {}", device_name);

        let buffer: Arc<Mutex<Vec<i16>>> = Arc::new(Mutex::new(Vec::new()));
        let stream = self.build_stream(&device, Arc::clone(&buffer))?;
        stream
            .play()
            .map_err(|e| SessionError::setup(format!("Failed to start microphone: {}", e)))?;

        {
            let mut slot = self
                .stream
                .lock()
                .map_err(|_| SessionError::setup("Capture stream lock poisoned"))?;
            *slot = Some(SendableStream(stream));
        }
        self.capturing.store(true, Ordering::SeqCst);

        let (tx, rx) = mpsc::channel(32);
        let capturing = Arc::clone(&self.capturing);
        let mut slicer = FrameSlicer::new(self.config.frame_samples, self.config.sample_rate);

        // Drain the callback buffer on a short tick and emit whole frames.
        let handle = tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_millis(50));
            while capturing.load(Ordering::SeqCst) {
                tick.tick().await;

                let drained: Vec<i16> = match buffer.lock() {
                    Ok(mut b) => b.drain(..).collect(),
                    Err(_) => break,
                };
                if drained.is_empty() {
                    continue;
                }

                for frame in slicer.push(&drained) {
                    if tx.send(frame).await.is_err() {
                        // Receiver dropped; session is gone.
                        return;
                    }
                }
            }
        });
        self.drain_handle = Some(handle);

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if !self.capturing.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        info!("Stopping microphone capture");

        if let Ok(mut slot) = self.stream.lock() {
            // Dropping the stream disconnects the device callback.
            slot.take();
        }

        if let Some(handle) = self.drain_handle.take() {
            let _ = handle.await;
        }

        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "cpal-microphone"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slicer_emits_fixed_frames() {
        let mut slicer = FrameSlicer::new(4, 16000);

        assert!(slicer.push(&[1, 2, 3]).is_empty());
        assert_eq!(slicer.pending_len(), 3);

        let frames = slicer.push(&[4, 5, 6, 7, 8, 9]);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].samples, vec![1, 2, 3, 4]);
        assert_eq!(frames[1].samples, vec![5, 6, 7, 8]);
        assert_eq!(slicer.pending_len(), 1);
    }

    #[test]
    fn test_slicer_timestamps_advance_by_frame_duration() {
        let mut slicer = FrameSlicer::new(16000, 16000); // 1s frames
        let frames = slicer.push(&vec![0i16; 48000]);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].timestamp_ms, 0);
        assert_eq!(frames[1].timestamp_ms, 1000);
        assert_eq!(frames[2].timestamp_ms, 2000);
    }

    #[test]
    fn test_downsample_by_decimation() {
        let samples: Vec<i16> = (0..12).collect();
        let out = downsample(&samples, 48000, 16000);
        assert_eq!(out, vec![0, 3, 6, 9]);
    }

    #[test]
    fn test_downsample_never_upsamples() {
        let samples = vec![1i16, 2, 3];
        assert_eq!(downsample(&samples, 16000, 48000), samples);
    }

    #[test]
    fn test_stereo_to_mono_sums_and_clamps() {
        let mono = stereo_to_mono(&[100, 200, i16::MAX, i16::MAX, -5, 5]);
        assert_eq!(mono, vec![300, i16::MAX, 0]);
    }
}
