//! Wire types for the bidirectional live-audio protocol.
//!
//! Everything is camelCase JSON over the socket. Inbound `serverContent`
//! is a bag of optional fields, any combination of which can arrive in a
//! single message, so consumers must check all of them.

use serde::{Deserialize, Serialize};

/// Outbound session setup, sent once right after the socket opens.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupMessage {
    pub setup: Setup,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
    pub system_instruction: Content,
    /// Presence of these (even empty) asks the server to emit
    /// transcription events for the corresponding audio direction.
    pub input_audio_transcription: TranscriptionConfig,
    pub output_audio_transcription: TranscriptionConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
    pub speech_config: SpeechConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Content {
    pub parts: Vec<TextPart>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextPart {
    pub text: String,
}

/// Empty marker object; serialized as `{}`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TranscriptionConfig {}

impl SetupMessage {
    pub fn new(model: &str, voice: &str, system_instruction: &str) -> Self {
        Self {
            setup: Setup {
                model: model.to_string(),
                generation_config: GenerationConfig {
                    response_modalities: vec!["AUDIO".to_string()],
                    speech_config: SpeechConfig {
                        voice_config: VoiceConfig {
                            prebuilt_voice_config: PrebuiltVoiceConfig {
                                voice_name: voice.to_string(),
                            },
                        },
                    },
                },
                system_instruction: Content {
                    parts: vec![TextPart {
                        text: system_instruction.to_string(),
                    }],
                },
                input_audio_transcription: TranscriptionConfig::default(),
                output_audio_transcription: TranscriptionConfig::default(),
            },
        }
    }
}

/// Outbound audio frame: `{"realtimeInput": {"media": {...}}}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInputMessage {
    pub realtime_input: RealtimeInput,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    pub media: MediaBlob,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaBlob {
    /// Base64-encoded PCM bytes
    pub data: String,
    pub mime_type: String,
}

impl RealtimeInputMessage {
    /// Wrap raw PCM16 bytes as a 16 kHz input frame.
    pub fn audio(pcm_bytes: &[u8]) -> Self {
        use base64::Engine;
        Self {
            realtime_input: RealtimeInput {
                media: MediaBlob {
                    data: base64::engine::general_purpose::STANDARD.encode(pcm_bytes),
                    mime_type: "audio/pcm;rate=16000".to_string(),
                },
            },
        }
    }
}

/// Top-level inbound message.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default)]
    pub setup_complete: Option<serde_json::Value>,
    #[serde(default)]
    pub server_content: Option<ServerContent>,
}

/// Server-driven content; fields are not mutually exclusive.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    /// Transcription delta of the user's speech
    #[serde(default)]
    pub input_transcription: Option<Transcription>,
    /// Transcription delta of the model's speech
    #[serde(default)]
    pub output_transcription: Option<Transcription>,
    /// Synthesized model audio
    #[serde(default)]
    pub model_turn: Option<ModelTurn>,
    /// The model finished its conversational turn
    #[serde(default)]
    pub turn_complete: Option<bool>,
    /// The user barged in; discard pending playback
    #[serde(default)]
    pub interrupted: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Transcription {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelTurn {
    #[serde(default)]
    pub parts: Vec<ModelPart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelPart {
    #[serde(default)]
    pub inline_data: Option<InlineData>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    /// Base64-encoded PCM bytes (24 kHz mono)
    pub data: String,
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl ServerContent {
    pub fn is_turn_complete(&self) -> bool {
        self.turn_complete.unwrap_or(false)
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.unwrap_or(false)
    }

    /// Decode every audio part carried by this message, in order.
    pub fn audio_chunks(&self) -> Vec<Vec<u8>> {
        use base64::Engine;

        let Some(turn) = &self.model_turn else {
            return Vec::new();
        };

        turn.parts
            .iter()
            .filter_map(|part| part.inline_data.as_ref())
            .filter_map(|inline| {
                base64::engine::general_purpose::STANDARD
                    .decode(&inline.data)
                    .ok()
            })
            .collect()
    }
}
