pub mod audio;
pub mod config;
pub mod error;
pub mod live;
pub mod session;
pub mod transcript;

pub use audio::{
    AudioFrame, AudioSink, CaptureBackend, CaptureConfig, CpalCaptureBackend, CpalSink,
    FrameSlicer, PlaybackPipeline, ScheduledSource,
};
pub use config::Config;
pub use error::SessionError;
pub use live::{LiveClient, LiveCommand, LiveEvent, LiveHandle, ServerContent, SetupMessage};
pub use session::{
    FeedbackAnalyzer, FeedbackReport, GeminiFeedbackAnalyzer, InterviewConfig,
    InterviewController, LiveConnector, Phase, SessionStats, WsConnector,
};
pub use transcript::{InterviewTurn, Speaker, TranscriptAssembler};
