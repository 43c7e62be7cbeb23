use anyhow::{Context, Result};
use serde::Deserialize;

/// API key environment variable.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub api: ApiConfig,
    pub audio: AudioSettings,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    /// Live-session websocket endpoint, without the key
    pub ws_endpoint: String,
    /// generateContent endpoint for the feedback call, without the key
    pub analysis_endpoint: String,
    /// Live model identifier
    pub model: String,
    /// Prebuilt voice name
    pub voice: String,
}

#[derive(Debug, Deserialize)]
pub struct AudioSettings {
    pub capture_sample_rate: u32,
    pub playback_sample_rate: u32,
    pub frame_samples: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                name: "interview-live".to_string(),
            },
            api: ApiConfig {
                ws_endpoint: "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent".to_string(),
                analysis_endpoint: "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent".to_string(),
                model: "models/gemini-2.0-flash-live-001".to_string(),
                voice: "Puck".to_string(),
            },
            audio: AudioSettings {
                capture_sample_rate: 16000,
                playback_sample_rate: 24000,
                frame_samples: 4096,
            },
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Load from a file if one exists at `path`, defaults otherwise.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if std::path::Path::new(&format!("{}.toml", path)).exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    fn api_key() -> Result<String> {
        std::env::var(API_KEY_ENV)
            .with_context(|| format!("{} environment variable is not set", API_KEY_ENV))
    }

    /// Websocket URL with the API key appended.
    pub fn live_url(&self) -> Result<String> {
        Ok(format!("{}?key={}", self.api.ws_endpoint, Self::api_key()?))
    }

    /// Analysis URL with the API key appended.
    pub fn analysis_url(&self) -> Result<String> {
        Ok(format!(
            "{}?key={}",
            self.api.analysis_endpoint,
            Self::api_key()?
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_audio_settings_match_protocol() {
        let config = Config::default();
        assert_eq!(config.audio.capture_sample_rate, 16000);
        assert_eq!(config.audio.playback_sample_rate, 24000);
        assert_eq!(config.audio.frame_samples, 4096);
    }

    #[test]
    fn test_endpoints_have_no_embedded_key() {
        let config = Config::default();
        assert!(!config.api.ws_endpoint.contains("key="));
        assert!(!config.api.analysis_endpoint.contains("key="));
    }
}
