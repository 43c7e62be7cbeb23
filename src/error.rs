use thiserror::Error;

/// Fatal session failures, one variant per class the controller
/// distinguishes when reporting to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Microphone/device acquisition failed. The session never went live;
    /// the user must restart explicitly.
    #[error("Audio setup failed: {message}")]
    Setup { message: String },

    /// The duplex connection dropped or the remote service signaled a
    /// protocol-level failure mid-session.
    #[error("Connection error: {message}")]
    Transport { message: String },

    /// Nothing usable was recorded, so no analysis call was made.
    #[error("{message}")]
    EmptyTranscript { message: String },

    /// The terminal feedback call failed or returned unparseable output.
    #[error("Feedback analysis failed: {message}")]
    Analysis { message: String },
}

impl SessionError {
    pub fn setup(message: impl Into<String>) -> Self {
        Self::Setup {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn empty_transcript(message: impl Into<String>) -> Self {
        Self::EmptyTranscript {
            message: message.into(),
        }
    }

    pub fn analysis(message: impl Into<String>) -> Self {
        Self::Analysis {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_display() {
        let err = SessionError::transport("socket closed unexpectedly");
        assert_eq!(
            err.to_string(),
            "Connection error: socket closed unexpectedly"
        );
    }

    #[test]
    fn test_empty_transcript_display_is_verbatim() {
        let err = SessionError::empty_transcript("No conversation was recorded");
        assert_eq!(err.to_string(), "No conversation was recorded");
    }
}
