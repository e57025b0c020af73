//! Conversation UI components for chat interface

pub mod commands;
pub mod composer;
pub mod history;
pub mod indicator;
pub mod manager;

pub use commands::{get_help_text, SlashCommand};
pub use composer::{ComposerResult, ConversationComposer};
pub use history::HistoryView;
pub use indicator::TypingIndicator;
pub use manager::{ConversationAction, ConversationManager};
