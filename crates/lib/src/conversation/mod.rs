//! # Conversation Controller
//!
//! Drives one session through validation, SQL generation, execution and
//! follow-up suggestions. Input events are applied with
//! [`ConversationController::handle_event`]; the pipeline itself is deferred
//! and advanced one phase at a time with [`ConversationController::step`], so
//! a front end can re-render the log between phases.

mod builder;
pub mod state;

pub use builder::{ConversationControllerBuilder, EMPTY_SCHEMA_MESSAGE};
pub use state::{PendingQuery, Phase, SessionState};

use crate::{
    executor::QueryExecutor,
    generator::SqlGenerator,
    prompts::core::{EXECUTION_EMPTY, EXECUTION_SUCCEEDED, NO_SQL_GENERATED, SQL_DETAILS_MARKER},
    suggester::FollowUpSuggester,
    types::{ClarificationRequest, ResultSet, Turn},
    validator::QuestionValidator,
};
use regex::{NoExpand, RegexBuilder};
use std::sync::Arc;
use tracing::{info, warn};

/// Phrases that mark a question as building on the previous one.
pub fn default_continuation_phrases() -> Vec<String> {
    ["for the same", "how about", "what about", "also"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Something the user did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserEvent {
    /// Free text typed into the chat.
    Input(String),
    /// One of the options offered for an ambiguous term.
    SelectOption(String),
    /// One of the proposed follow-up questions.
    SelectSuggestion(String),
    /// Start over with an empty conversation.
    NewChat,
}

/// Escapes text for embedding in the HTML details block.
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// The assistant turn announcing generated SQL: the explanation followed by
/// a collapsible block holding the query.
pub fn render_sql_turn(explanation: Option<&str>, sql: &str) -> String {
    format!(
        "{}{SQL_DETAILS_MARKER}\n<summary>View Generated SQL</summary>\n<pre><code class=\"language-sql\">{}</code></pre>\n</details>",
        explanation.unwrap_or_default(),
        escape_html(sql)
    )
}

/// Replaces every whole-word, case-insensitive occurrence of `term`.
fn substitute_term(question: &str, term: &str, replacement: &str) -> String {
    let pattern = format!(r"\b{}\b", regex::escape(term));
    match RegexBuilder::new(&pattern).case_insensitive(true).build() {
        Ok(re) => re.replace_all(question, NoExpand(replacement)).into_owned(),
        Err(e) => {
            warn!("Could not build substitution pattern for '{term}': {e}");
            question.replace(term, replacement)
        }
    }
}

/// Owns the pipeline components for one configured data store.
///
/// The controller holds no per-conversation data; every call takes the
/// session it works on, so one controller can serve several sessions.
#[derive(Debug, Clone)]
pub struct ConversationController {
    validator: QuestionValidator,
    generator: SqlGenerator,
    executor: QueryExecutor,
    suggester: FollowUpSuggester,
    continuation_phrases: Vec<String>,
    current_year: Option<i32>,
    formatted_schema: Arc<String>,
}

impl ConversationController {
    pub fn builder() -> ConversationControllerBuilder {
        ConversationControllerBuilder::new()
    }

    /// The schema text embedded in the system instruction.
    pub fn formatted_schema(&self) -> &str {
        &self.formatted_schema
    }

    pub fn system_prompt(&self) -> &str {
        self.generator.system_prompt()
    }

    /// Applies one user event to the session.
    ///
    /// Returns `false` when the event does not apply in the current phase and
    /// was ignored. Events are not accepted while deferred work is pending.
    pub fn handle_event(&self, session: &mut SessionState, event: UserEvent) -> bool {
        if event != UserEvent::NewChat && session.phase.is_busy() {
            warn!("Ignoring {event:?} while in phase {:?}", session.phase);
            return false;
        }
        match event {
            UserEvent::NewChat => {
                info!("Starting a new chat.");
                session.reset();
                true
            }
            UserEvent::Input(text) => self.accept_input(session, &text),
            UserEvent::SelectOption(choice) => self.resolve_ambiguity(session, &choice),
            UserEvent::SelectSuggestion(text) => self.accept_suggestion(session, &text),
        }
    }

    fn is_continuation(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.continuation_phrases
            .iter()
            .any(|phrase| lowered.contains(phrase.as_str()))
    }

    fn accept_input(&self, session: &mut SessionState, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        session.suggestions.clear();
        session.warning = None;

        if self.is_continuation(text) {
            info!("[input] continuation phrase found, skipping validation.");
            session.pending.clear();
            session.pending.question = text.to_string();
            session.log.push(Turn::user(text));
            session.phase = Phase::ReadyToGenerate;
            return true;
        }

        let awaiting_timeframe = matches!(
            session.phase,
            Phase::AwaitingClarification(ClarificationRequest::MissingTimeframe { .. })
        );
        if awaiting_timeframe {
            let merged = format!("{} {}", session.pending.question, text);
            info!("[input] merged clarification into question: {merged:?}");
            session.amend_last_user_turn(&merged);
            session.pending.question = merged;
        } else {
            session.pending.clear();
            session.pending.question = text.to_string();
            session.log.push(Turn::user(text));
        }
        self.revalidate(session);
        true
    }

    fn resolve_ambiguity(&self, session: &mut SessionState, choice: &str) -> bool {
        let Some(ClarificationRequest::Ambiguity { term, options }) = session.phase.clarification()
        else {
            warn!("[clarify] no ambiguity is pending; ignoring option {choice:?}");
            return false;
        };
        if !options.iter().any(|option| option == choice) {
            warn!("[clarify] {choice:?} is not an option for '{term}'");
            return false;
        }
        let resolved = substitute_term(&session.pending.question, term, choice);
        info!("[clarify] '{term}' resolved to {choice:?}: {resolved:?}");
        session.pending.question = resolved;
        session.phase = Phase::Idle;
        self.revalidate(session);
        true
    }

    fn accept_suggestion(&self, session: &mut SessionState, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        session.suggestions.clear();
        session.result = None;
        session.warning = None;
        session.pending.clear();
        session.pending.question = text.to_string();
        session.log.push(Turn::user(text));
        session.phase = Phase::ReadyToGenerate;
        true
    }

    /// Validates the pending question and moves to the matching phase.
    fn revalidate(&self, session: &mut SessionState) {
        let question = &session.pending.question;
        let issues = match self.current_year {
            Some(year) => self.validator.validate_at(question, year),
            None => self.validator.validate(question),
        };
        session.phase = match issues.into_iter().next() {
            Some(request) => {
                info!("[validate] clarification needed: {request:?}");
                Phase::AwaitingClarification(request)
            }
            None => Phase::ReadyToGenerate,
        };
    }

    /// Runs the next deferred phase, if any.
    ///
    /// Returns `false` when the session is idle or waiting for the user.
    pub async fn step(&self, session: &mut SessionState) -> bool {
        match session.phase {
            Phase::ReadyToGenerate => self.generate(session).await,
            Phase::SqlGenerated => self.execute(session).await,
            Phase::GeneratingSuggestions => self.suggest(session).await,
            Phase::Idle | Phase::AwaitingClarification(_) => return false,
        }
        true
    }

    /// Steps until no deferred work is left, calling `observer` after every
    /// transition. Returns the number of steps taken.
    pub async fn run_until_idle<F>(&self, session: &mut SessionState, mut observer: F) -> usize
    where
        F: FnMut(&SessionState),
    {
        let mut steps = 0;
        while self.step(session).await {
            steps += 1;
            observer(session);
        }
        steps
    }

    /// Applies an event and runs the pipeline it starts to completion.
    pub async fn submit(&self, session: &mut SessionState, event: UserEvent) -> bool {
        let accepted = self.handle_event(session, event);
        if accepted {
            self.run_until_idle(session, |_| {}).await;
        }
        accepted
    }

    fn finish(session: &mut SessionState) {
        session.pending.clear();
        session.phase = Phase::Idle;
    }

    async fn generate(&self, session: &mut SessionState) {
        let generation = self
            .generator
            .generate(&session.pending.question, &session.log)
            .await;

        match (generation.error, generation.sql) {
            (None, Some(sql)) => {
                session
                    .log
                    .push(Turn::assistant(render_sql_turn(generation.explanation.as_deref(), &sql)));
                session.pending.sql = Some(sql);
                session.pending.explanation = generation.explanation;
                session.phase = Phase::SqlGenerated;
            }
            (error, _) => {
                let message = error
                    .or(generation.explanation)
                    .unwrap_or_else(|| NO_SQL_GENERATED.to_string());
                warn!("[generate] no SQL to run: {message}");
                session.log.push(Turn::assistant(format!("❌ {message}")));
                Self::finish(session);
            }
        }
    }

    async fn execute(&self, session: &mut SessionState) {
        let Some(sql) = session.pending.sql.clone() else {
            warn!("[execute] no pending SQL; returning to idle.");
            Self::finish(session);
            return;
        };

        let execution = self.executor.execute(&sql).await;
        let outcome = match (execution.result, execution.error) {
            (Some(result), None) => Ok(result),
            (_, error) => Err(error.unwrap_or_else(|| "Query failed: no result".to_string())),
        };
        session.result = None;
        let rows: Option<ResultSet> = match outcome {
            Err(error) => {
                session
                    .log
                    .push(Turn::assistant(format!("❌ Query execution failed: {error}")));
                None
            }
            Ok(result) if result.is_empty() => {
                session.log.push(Turn::assistant(EXECUTION_EMPTY));
                None
            }
            Ok(result) => {
                session.log.push(Turn::assistant(EXECUTION_SUCCEEDED));
                Some(result)
            }
        };

        match rows {
            Some(result) => {
                session.log.push(Turn::result_table(result.clone()));
                session.result = Some(result);
                session.phase = Phase::GeneratingSuggestions;
            }
            None => Self::finish(session),
        }
    }

    async fn suggest(&self, session: &mut SessionState) {
        let question = session.last_user_question().unwrap_or_default().to_string();
        let sql = session.pending.sql.clone().unwrap_or_default();
        let columns = session
            .result
            .as_ref()
            .map(|result| result.columns.clone())
            .unwrap_or_default();

        let suggestions = self.suggester.suggest(&question, &sql, &columns).await;
        session.suggestions = suggestions.questions;
        session.warning = suggestions.warning;
        Self::finish(session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sql_turn_escapes_and_keeps_marker() {
        let turn = render_sql_turn(Some("Counts orders."), "SELECT a FROM t WHERE b < 'x'");
        assert!(turn.starts_with("Counts orders.\n\n<details>"));
        assert!(turn.contains("SELECT a FROM t WHERE b &lt; &#x27;x&#x27;"));
        assert!(turn.ends_with("</details>"));
    }

    #[test]
    fn sql_turn_without_explanation_starts_at_marker() {
        let turn = render_sql_turn(None, "SELECT 1");
        assert!(turn.starts_with(SQL_DETAILS_MARKER));
        assert!(!turn.contains("None"));
    }

    #[test]
    fn substitution_is_whole_word_and_case_insensitive() {
        assert_eq!(
            substitute_term("Show me Volume by year, volumes too", "volume", "Sold Quantity"),
            "Show me Sold Quantity by year, volumes too"
        );
        assert_eq!(
            substitute_term("top product 2024", "top product", "Highest $1 Quantity"),
            "Highest $1 Quantity 2024"
        );
    }
}
