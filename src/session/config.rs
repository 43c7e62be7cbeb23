use crate::audio::capture::{CaptureConfig, CAPTURE_SAMPLE_RATE, FRAME_SAMPLES};
use serde::{Deserialize, Serialize};

/// Configuration for one interview session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewConfig {
    /// Unique session identifier
    pub session_id: String,

    /// Role the candidate is interviewing for (e.g., "Backend Engineer")
    pub role: String,

    /// Plain-text resume context folded into the system instruction
    pub resume_context: Option<String>,

    /// Prebuilt voice the model should speak with
    pub voice: String,

    /// Live-session endpoint (wss URL, API key already appended)
    pub ws_url: String,

    /// Model identifier for the live session
    pub model: String,

    /// Microphone sample rate (protocol contract: 16 kHz)
    pub capture_sample_rate: u32,

    /// Samples per outbound frame
    pub frame_samples: usize,
}

impl Default for InterviewConfig {
    fn default() -> Self {
        Self {
            session_id: format!("interview-{}", uuid::Uuid::new_v4()),
            role: "Software Engineer".to_string(),
            resume_context: None,
            voice: "Puck".to_string(),
            ws_url: String::new(),
            model: "models/gemini-2.0-flash-live-001".to_string(),
            capture_sample_rate: CAPTURE_SAMPLE_RATE,
            frame_samples: FRAME_SAMPLES,
        }
    }
}

impl InterviewConfig {
    /// System instruction for the interviewer persona.
    pub fn system_instruction(&self) -> String {
        let mut instruction = format!(
            "You are a professional job interviewer conducting a mock interview \
             for the role of {}. Ask one question at a time, listen to the answer, \
             and follow up naturally. Keep your questions concise and spoken aloud. \
             Start by greeting the candidate and asking them to introduce themselves.",
            self.role
        );

        if let Some(resume) = &self.resume_context {
            instruction.push_str("\n\nCandidate resume:\n");
            instruction.push_str(resume);
        }

        instruction
    }

    /// Capture settings for this session. The protocol is mono.
    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            sample_rate: self.capture_sample_rate,
            channels: 1,
            frame_samples: self.frame_samples,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = InterviewConfig::default();
        assert!(config.session_id.starts_with("interview-"));
        assert_eq!(config.capture_sample_rate, 16000);
        assert_eq!(config.frame_samples, 4096);
    }

    #[test]
    fn test_capture_config_follows_session_settings() {
        let config = InterviewConfig {
            capture_sample_rate: 8000,
            frame_samples: 2048,
            ..Default::default()
        };
        let capture = config.capture_config();
        assert_eq!(capture.sample_rate, 8000);
        assert_eq!(capture.channels, 1);
        assert_eq!(capture.frame_samples, 2048);
    }

    #[test]
    fn test_system_instruction_includes_role_and_resume() {
        let config = InterviewConfig {
            role: "Backend Engineer".to_string(),
            resume_context: Some("Ten years of Rust.".to_string()),
            ..Default::default()
        };
        let instruction = config.system_instruction();
        assert!(instruction.contains("Backend Engineer"));
        assert!(instruction.contains("Ten years of Rust."));
    }
}
