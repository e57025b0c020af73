//! Conversation store: the ordered, append-only record of a chat session.
//!
//! Every mutation builds a new [`ConversationState`] and publishes it on a
//! `watch` channel; the view renders whatever value it last received.

use crate::llm::CompletionResult;
use chrono::{DateTime, Local};
use thiserror::Error;
use tokio::sync::watch;

/// Text shown in place of any failed reply
pub const APOLOGY: &str = "Sorry, something went wrong. Please try again.";

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    pub fn display_name(&self) -> &'static str {
        match self {
            Sender::User => "You",
            Sender::Assistant => "Assistant",
        }
    }
}

/// A single entry in the conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub text: String,
    pub sender: Sender,
    pub sent_at: DateTime<Local>,
}

impl Message {
    fn new(text: impl Into<String>, sender: Sender) -> Self {
        Self {
            text: text.into(),
            sender,
            sent_at: Local::now(),
        }
    }
}

/// Snapshot of the conversation at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationState {
    pub messages: Vec<Message>,
    pub pending: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("no submission is awaiting a reply")]
    NotPending,
}

/// Owner of the conversation state
pub struct ConversationStore {
    state: watch::Sender<ConversationState>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ConversationState::default());
        Self { state }
    }

    /// Append a user message and mark the turn pending.
    ///
    /// Returns the trimmed prompt to send, or `None` when the text is blank or
    /// a reply is still outstanding.
    pub fn append_user_message(&self, text: &str) -> Option<String> {
        let prompt = text.trim();
        if prompt.is_empty() {
            return None;
        }

        let current = self.state.borrow();
        if current.pending {
            tracing::debug!("submission ignored while a reply is pending");
            return None;
        }

        let mut messages = current.messages.clone();
        drop(current);
        messages.push(Message::new(text, Sender::User));

        self.state.send_replace(ConversationState {
            messages,
            pending: true,
        });
        Some(prompt.to_string())
    }

    /// Append the assistant reply for the pending turn and clear `pending`.
    pub fn resolve(&self, result: CompletionResult) -> Result<(), StoreError> {
        let current = self.state.borrow();
        if !current.pending {
            return Err(StoreError::NotPending);
        }

        let text = match result {
            Ok(reply) => reply.trim().to_string(),
            Err(e) => {
                tracing::debug!(error = %e, "replacing failed reply with apology");
                APOLOGY.to_string()
            }
        };

        let mut messages = current.messages.clone();
        drop(current);
        messages.push(Message::new(text, Sender::Assistant));

        self.state.send_replace(ConversationState {
            messages,
            pending: false,
        });
        Ok(())
    }

    pub fn snapshot(&self) -> ConversationState {
        self.state.borrow().clone()
    }

    /// Receive every new state value
    pub fn subscribe(&self) -> watch::Receiver<ConversationState> {
        self.state.subscribe()
    }
}
