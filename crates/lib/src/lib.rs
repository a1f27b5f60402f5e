//! # Conversational Sales Query Assistant
//!
//! This crate turns natural-language questions about sales data into read-only
//! SQL, runs it against a storage provider and proposes follow-up questions. A
//! [`ConversationController`] owns the pipeline; each conversation keeps its
//! own [`SessionState`].

pub mod conversation;
pub mod errors;
pub mod executor;
pub mod generator;
pub mod prompts;
pub mod providers;
pub mod schema;
pub mod suggester;
pub mod types;
pub mod validator;

pub use conversation::{
    ConversationController, ConversationControllerBuilder, Phase, SessionState, UserEvent,
};
pub use errors::{ErrorKind, PromptError};
pub use types::{ClarificationRequest, ResultSet, Role, Schema, Turn, TurnContent};
