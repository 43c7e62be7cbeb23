//! Transcript assembly from streamed transcription fragments.
//!
//! Fragments are cumulative deltas, one growing buffer per speaker. A
//! turn-completion signal finalizes both buffers into turns; the model's
//! turn is recorded before the user's regardless of which transcription
//! finished streaming last ("question then answer" ordering, not
//! wall-clock ordering).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who said a piece of the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The interviewer (model speech)
    Model,
    /// The candidate (microphone speech)
    User,
}

/// One finalized utterance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewTurn {
    pub speaker: Speaker,
    pub text: String,
    /// When the turn was finalized
    pub at: DateTime<Utc>,
}

/// Accumulates fragments and emits ordered turns.
#[derive(Debug, Default)]
pub struct TranscriptAssembler {
    model_buffer: String,
    user_buffer: String,
    turns: Vec<InterviewTurn>,
}

impl TranscriptAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one transcription delta in arrival order.
    pub fn push(&mut self, speaker: Speaker, delta: &str) {
        match speaker {
            Speaker::Model => self.model_buffer.push_str(delta),
            Speaker::User => self.user_buffer.push_str(delta),
        }
    }

    /// Server-signaled turn boundary: finalize both buffers, model first.
    pub fn turn_complete(&mut self) {
        self.flush();
    }

    /// Finalize whatever is buffered, model-then-user, skipping empty
    /// buffers. Also used when the session ends mid-utterance so partial
    /// speech is kept instead of discarded.
    pub fn flush(&mut self) {
        let now = Utc::now();

        let model_text = std::mem::take(&mut self.model_buffer);
        if !model_text.trim().is_empty() {
            self.turns.push(InterviewTurn {
                speaker: Speaker::Model,
                text: model_text,
                at: now,
            });
        }

        let user_text = std::mem::take(&mut self.user_buffer);
        if !user_text.trim().is_empty() {
            self.turns.push(InterviewTurn {
                speaker: Speaker::User,
                text: user_text,
                at: now,
            });
        }
    }

    /// Unflushed text for a speaker, for live display.
    pub fn in_progress(&self, speaker: Speaker) -> &str {
        match speaker {
            Speaker::Model => &self.model_buffer,
            Speaker::User => &self.user_buffer,
        }
    }

    /// Finalized turns in signaling order.
    pub fn turns(&self) -> &[InterviewTurn] {
        &self.turns
    }

    pub fn into_turns(self) -> Vec<InterviewTurn> {
        self.turns
    }

    /// True if any finalized turn belongs to the user.
    pub fn has_user_turn(&self) -> bool {
        self.turns.iter().any(|t| t.speaker == Speaker::User)
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragments_accumulate_per_speaker() {
        let mut assembler = TranscriptAssembler::new();
        assembler.push(Speaker::Model, "Tell ");
        assembler.push(Speaker::User, "I ");
        assembler.push(Speaker::Model, "me");
        assembler.push(Speaker::User, "will");

        assert_eq!(assembler.in_progress(Speaker::Model), "Tell me");
        assert_eq!(assembler.in_progress(Speaker::User), "I will");
        assert!(assembler.turns().is_empty());
    }

    #[test]
    fn test_turn_complete_emits_model_before_user() {
        let mut assembler = TranscriptAssembler::new();
        // User transcription finished streaming first; ordering policy
        // still puts the question before the answer.
        assembler.push(Speaker::User, "I am a developer");
        assembler.push(Speaker::Model, "Tell me about yourself");
        assembler.turn_complete();

        let turns = assembler.turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].speaker, Speaker::Model);
        assert_eq!(turns[0].text, "Tell me about yourself");
        assert_eq!(turns[1].speaker, Speaker::User);
        assert_eq!(turns[1].text, "I am a developer");
    }

    #[test]
    fn test_turn_complete_skips_empty_buffers() {
        let mut assembler = TranscriptAssembler::new();
        assembler.push(Speaker::Model, "Any questions for me?");
        assembler.turn_complete();

        assert_eq!(assembler.turns().len(), 1);
        assert_eq!(assembler.turns()[0].speaker, Speaker::Model);
        assert!(!assembler.has_user_turn());
    }

    #[test]
    fn test_turn_complete_clears_buffers() {
        let mut assembler = TranscriptAssembler::new();
        assembler.push(Speaker::Model, "First question");
        assembler.turn_complete();
        assembler.push(Speaker::Model, "Second question");
        assembler.turn_complete();

        assert_eq!(assembler.turns().len(), 2);
        assert_eq!(assembler.turns()[1].text, "Second question");
        assert_eq!(assembler.in_progress(Speaker::Model), "");
    }

    #[test]
    fn test_flush_keeps_partial_speech() {
        let mut assembler = TranscriptAssembler::new();
        assembler.push(Speaker::Model, "And what would you");
        assembler.push(Speaker::User, "Well, I was about to");
        assembler.flush();

        let turns = assembler.turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].speaker, Speaker::Model);
        assert_eq!(turns[1].speaker, Speaker::User);
        assert_eq!(turns[1].text, "Well, I was about to");
    }

    #[test]
    fn test_whitespace_only_buffer_is_not_a_turn() {
        let mut assembler = TranscriptAssembler::new();
        assembler.push(Speaker::User, "   \n");
        assembler.turn_complete();
        assert!(assembler.is_empty());
    }
}
