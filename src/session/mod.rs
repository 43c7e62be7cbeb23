//! Interview session control
//!
//! This module provides the session state machine and its collaborators:
//! - Phase transitions (idle → connecting → live → processing → report/error)
//! - Wiring between capture, playback, transcript and the connection actor
//! - The terminal feedback-analysis boundary
//! - Session statistics

mod config;
pub mod controller;
pub mod report;
mod stats;

pub use config::InterviewConfig;
pub use controller::{InterviewController, LiveConnector, Phase, WsConnector};
pub use report::{
    AnswerRevision, FeedbackAnalyzer, FeedbackReport, GeminiFeedbackAnalyzer, Sentiment,
};
pub use stats::SessionStats;
