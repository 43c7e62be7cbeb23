use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::controller::Phase;

/// Point-in-time snapshot of a running interview session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// Current phase of the session state machine
    pub phase: Phase,

    /// When the session started
    pub started_at: DateTime<Utc>,

    /// Total duration in seconds
    pub duration_secs: f64,

    /// Number of finalized transcript turns
    pub turn_count: usize,

    /// Whether the microphone is currently capturing
    pub is_capturing: bool,
}
