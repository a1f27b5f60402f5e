use crate::{
    prompts::core::GREETING,
    types::{ClarificationRequest, ResultSet, Role, Turn, TurnContent},
};
use serde::Serialize;

/// Where a session is in the per-question pipeline.
///
/// Exactly one variant is active, so the pipeline can never be in two phases
/// at once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "request", rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    AwaitingClarification(ClarificationRequest),
    ReadyToGenerate,
    SqlGenerated,
    GeneratingSuggestions,
}

impl Phase {
    /// True while the pipeline still has deferred work to run.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Phase::ReadyToGenerate | Phase::SqlGenerated | Phase::GeneratingSuggestions
        )
    }

    pub fn clarification(&self) -> Option<&ClarificationRequest> {
        match self {
            Phase::AwaitingClarification(request) => Some(request),
            _ => None,
        }
    }
}

/// The question being worked on and what has been generated for it so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PendingQuery {
    pub question: String,
    pub sql: Option<String>,
    pub explanation: Option<String>,
}

impl PendingQuery {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Everything one conversation owns. One instance per active session; only the
/// controller mutates it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    /// The conversation log, replayed wholesale by the rendering surface.
    pub log: Vec<Turn>,
    pub phase: Phase,
    pub pending: PendingQuery,
    /// The last execution result, kept for the suggestion step and for display.
    pub result: Option<ResultSet>,
    pub suggestions: Vec<String>,
    /// A non-fatal problem to show once, e.g. failed suggestions.
    pub warning: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    /// A fresh session whose log opens with the greeting.
    pub fn new() -> Self {
        Self {
            log: vec![Turn::assistant(GREETING)],
            phase: Phase::Idle,
            pending: PendingQuery::default(),
            result: None,
            suggestions: Vec::new(),
            warning: None,
        }
    }

    /// Discards the whole conversation and starts over.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// The text of the most recent user turn.
    pub fn last_user_question(&self) -> Option<&str> {
        self.log
            .iter()
            .rev()
            .find(|turn| turn.role == Role::User)
            .and_then(Turn::text)
    }

    /// Rewrites the most recent turn in place if it is a user turn.
    pub(crate) fn amend_last_user_turn(&mut self, text: &str) {
        if let Some(last) = self.log.last_mut() {
            if last.role == Role::User {
                last.content = TurnContent::Text(text.to_string());
            }
        }
    }
}
