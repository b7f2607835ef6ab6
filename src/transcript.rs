//! Conversation transcript and the per-submission stream session state.
//!
//! One transcript holds the ordered conversation and enforces the rules
//! the chat surfaces rely on: submission is refused while a stream
//! session is open, fragments grow the trailing assistant message only,
//! and a message is sealed the moment its session ends.

use crate::types::{ChatMessage, Role};
use thiserror::Error;

/// Where the transcript is in its submission cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TurnState {
    #[default]
    Idle,
    /// A stream session is open; submission is refused.
    Streaming,
    /// The last session ended in an error. Whatever partial assistant
    /// text arrived is kept and submission is available again.
    Failed,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("a stream session is already open")]
    SessionOpen,
    #[error("message is empty")]
    EmptyMessage,
}

#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
    state: TurnState,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn can_submit(&self) -> bool {
        self.state != TurnState::Streaming
    }

    /// Append the user message optimistically and open a stream session.
    pub fn submit(&mut self, text: &str) -> Result<(), SubmitError> {
        if !self.can_submit() {
            return Err(SubmitError::SessionOpen);
        }
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(SubmitError::EmptyMessage);
        }
        self.messages.push(ChatMessage::user(trimmed));
        self.state = TurnState::Streaming;
        Ok(())
    }

    /// Merge one decoded fragment into the conversation: concatenate onto
    /// the trailing message iff its role is assistant, otherwise append a
    /// new assistant message. Empty fragments never create a message, and
    /// nothing is mutated outside an open session.
    pub fn merge_fragment(&mut self, fragment: &str) {
        if fragment.is_empty() || self.state != TurnState::Streaming {
            return;
        }
        match self.messages.last_mut() {
            Some(last) if last.role == Role::Assistant => last.content.push_str(fragment),
            _ => self.messages.push(ChatMessage::assistant(fragment)),
        }
    }

    /// Clean end of stream: seal the trailing assistant message and
    /// accept input again.
    pub fn finish(&mut self) {
        if self.state == TurnState::Streaming {
            self.state = TurnState::Idle;
        }
    }

    /// The session ended in an error. Partial text stays in place.
    pub fn fail(&mut self) {
        if self.state == TurnState::Streaming {
            self.state = TurnState::Failed;
        }
    }
}
