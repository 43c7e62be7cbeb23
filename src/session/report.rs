//! Terminal feedback analysis: one structured call over the finished
//! transcript. The controller guards against empty transcripts before
//! this is ever invoked; the analyzer still refuses them at its own
//! boundary.

use crate::error::{Result, SessionError};
use crate::transcript::{InterviewTurn, Speaker};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

/// Overall sentiment of the candidate's performance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

/// An "original answer, improved answer" example pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRevision {
    pub original: String,
    pub improved: String,
}

/// Structured evaluation produced from one complete transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackReport {
    /// 0-100 sub-scores
    pub clarity: u8,
    pub relevance: u8,
    pub confidence: u8,
    pub star_method: u8,
    pub overall: u8,
    /// Count of filler words across all user turns
    pub filler_words: u32,
    pub sentiment: Sentiment,
    /// Matched role keywords, at most a handful
    #[serde(default)]
    pub keywords: Vec<String>,
    pub overall_feedback: String,
    #[serde(default)]
    pub examples: Vec<AnswerRevision>,
}

/// Collaborator boundary for the one-shot analysis call.
#[async_trait]
pub trait FeedbackAnalyzer: Send + Sync {
    async fn analyze(&self, role: &str, transcript: &[InterviewTurn]) -> Result<FeedbackReport>;
}

/// Renders the transcript as "Interviewer:"/"Candidate:" lines for the prompt.
pub fn format_transcript(transcript: &[InterviewTurn]) -> String {
    transcript
        .iter()
        .map(|turn| {
            let who = match turn.speaker {
                Speaker::Model => "Interviewer",
                Speaker::User => "Candidate",
            };
            format!("{}: {}", who, turn.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Pull a human-readable message out of an API failure payload, falling
/// back to the raw body when no nested message exists.
pub fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")?
                .get("message")?
                .as_str()
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| body.to_string())
}

/// Feedback analysis against the hosted generateContent endpoint with a
/// JSON response schema.
pub struct GeminiFeedbackAnalyzer {
    http: reqwest::Client,
    endpoint: String,
}

impl GeminiFeedbackAnalyzer {
    /// `endpoint` is the full generateContent URL, API key included.
    pub fn new(endpoint: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
        }
    }

    fn request_body(role: &str, transcript: &[InterviewTurn]) -> serde_json::Value {
        let prompt = format!(
            "You are an expert interview coach. Evaluate the following mock \
             interview for the role of {role}. Score clarity, relevance, \
             confidence, STAR-method adherence and overall from 0 to 100, count \
             filler words, classify sentiment, list up to 5 matched role \
             keywords, write short overall feedback, and give up to 3 \
             original/improved answer pairs.\n\nTranscript:\n{}",
            format_transcript(transcript),
        );

        json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "clarity": {"type": "INTEGER"},
                        "relevance": {"type": "INTEGER"},
                        "confidence": {"type": "INTEGER"},
                        "starMethod": {"type": "INTEGER"},
                        "overall": {"type": "INTEGER"},
                        "fillerWords": {"type": "INTEGER"},
                        "sentiment": {"type": "STRING", "enum": ["Positive", "Neutral", "Negative"]},
                        "keywords": {"type": "ARRAY", "items": {"type": "STRING"}},
                        "overallFeedback": {"type": "STRING"},
                        "examples": {
                            "type": "ARRAY",
                            "items": {
                                "type": "OBJECT",
                                "properties": {
                                    "original": {"type": "STRING"},
                                    "improved": {"type": "STRING"}
                                },
                                "required": ["original", "improved"]
                            }
                        }
                    },
                    "required": [
                        "clarity", "relevance", "confidence", "starMethod",
                        "overall", "fillerWords", "sentiment", "overallFeedback"
                    ]
                }
            }
        })
    }

    /// Parse the model's JSON text out of a generateContent response body.
    pub fn parse_response(body: &str) -> Result<FeedbackReport> {
        let value: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| SessionError::analysis(format!("Unparseable response: {}", e)))?;

        let text = value
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(|t| t.as_str())
            .ok_or_else(|| SessionError::analysis("Response carried no content"))?;

        serde_json::from_str(text)
            .map_err(|e| SessionError::analysis(format!("Malformed report payload: {}", e)))
    }
}

#[async_trait]
impl FeedbackAnalyzer for GeminiFeedbackAnalyzer {
    async fn analyze(&self, role: &str, transcript: &[InterviewTurn]) -> Result<FeedbackReport> {
        if transcript.is_empty() {
            return Err(SessionError::analysis(
                "Refusing to analyze an empty transcript",
            ));
        }

        info!("Requesting feedback analysis ({} turns)", transcript.len());

        let response = self
            .http
            .post(&self.endpoint)
            .json(&Self::request_body(role, transcript))
            .send()
            .await
            .map_err(|e| SessionError::analysis(format!("Request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SessionError::analysis(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(SessionError::analysis(extract_error_message(&body)));
        }

        Self::parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn turn(speaker: Speaker, text: &str) -> InterviewTurn {
        InterviewTurn {
            speaker,
            text: text.to_string(),
            at: Utc::now(),
        }
    }

    #[test]
    fn test_format_transcript_labels_speakers() {
        let transcript = vec![
            turn(Speaker::Model, "Tell me about yourself"),
            turn(Speaker::User, "I am a developer"),
        ];
        let rendered = format_transcript(&transcript);
        assert_eq!(
            rendered,
            "Interviewer: Tell me about yourself\nCandidate: I am a developer"
        );
    }

    #[test]
    fn test_extract_nested_error_message() {
        let body = r#"{"error": {"code": 429, "message": "Quota exceeded"}}"#;
        assert_eq!(extract_error_message(body), "Quota exceeded");
    }

    #[test]
    fn test_extract_error_falls_back_to_raw_body() {
        assert_eq!(extract_error_message("gateway timeout"), "gateway timeout");
    }

    #[test]
    fn test_parse_response_happy_path() {
        let report_json = serde_json::to_string(&json!({
            "clarity": 80, "relevance": 75, "confidence": 70, "starMethod": 60,
            "overall": 72, "fillerWords": 4, "sentiment": "Positive",
            "keywords": ["rust"], "overallFeedback": "Solid answers.",
            "examples": [{"original": "um, yes", "improved": "Yes, for example..."}]
        }))
        .unwrap();
        let body = serde_json::to_string(&json!({
            "candidates": [{"content": {"parts": [{"text": report_json}]}}]
        }))
        .unwrap();

        let report = GeminiFeedbackAnalyzer::parse_response(&body).unwrap();
        assert_eq!(report.overall, 72);
        assert_eq!(report.sentiment, Sentiment::Positive);
        assert_eq!(report.examples.len(), 1);
    }

    #[test]
    fn test_parse_response_missing_content_is_analysis_error() {
        let err = GeminiFeedbackAnalyzer::parse_response(r#"{"candidates": []}"#).unwrap_err();
        assert!(matches!(err, SessionError::Analysis { .. }));
    }
}
