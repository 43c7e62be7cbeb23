pub mod capture;
pub mod pcm;
pub mod playback;

pub use capture::{
    AudioFrame, CaptureBackend, CaptureConfig, CpalCaptureBackend, FrameSlicer,
    CAPTURE_SAMPLE_RATE, FRAME_SAMPLES,
};
pub use playback::{AudioSink, CpalSink, PlaybackPipeline, ScheduledSource, PLAYBACK_SAMPLE_RATE};
