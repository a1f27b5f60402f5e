//! # SQL Generation
//!
//! Sends the conversation so far plus the current question to the completion
//! service and splits the reply into an explanation and a SQL statement.

use crate::{
    prompts::core::SQL_DETAILS_MARKER,
    providers::ai::AiProvider,
    types::{ChatMessage, ChatRole, Role, SamplingParams, Turn},
};
use std::sync::Arc;
use tracing::{debug, error, info};

const SQL_FENCE: &str = "```sql";
const FENCE: &str = "```";

/// The outcome of one generation request. Never an `Err`: failures are
/// carried as text in `error`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Generation {
    pub explanation: Option<String>,
    pub sql: Option<String>,
    pub error: Option<String>,
}

impl Generation {
    fn failed(message: String) -> Self {
        Self {
            error: Some(message),
            ..Default::default()
        }
    }
}

/// A completion reply split into its explanation and SQL parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedReply {
    pub explanation: Option<String>,
    pub sql: Option<String>,
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Splits a completion reply into explanation and SQL.
///
/// - With a ```` ```sql ```` fence (matched case-insensitively), the text before
///   the fence is the explanation and the text up to the next ```` ``` ```` is
///   the SQL. An unterminated fence runs to the end of the reply.
/// - Without a fence, a reply that starts with `select` is taken as SQL with no
///   explanation.
/// - Anything else yields no SQL, and the whole reply becomes the explanation.
///
/// Both parts are trimmed, and empty parts become `None`.
pub fn parse_reply(reply: &str) -> ParsedReply {
    // ASCII lowering keeps byte offsets aligned with `reply`.
    let lowered = reply.to_ascii_lowercase();
    if let Some(start) = lowered.find(SQL_FENCE) {
        let body = &reply[start + SQL_FENCE.len()..];
        let sql = match body.find(FENCE) {
            Some(end) => &body[..end],
            None => body,
        };
        return ParsedReply {
            explanation: non_empty(&reply[..start]),
            sql: non_empty(sql),
        };
    }
    if lowered.trim_start().starts_with("select") {
        return ParsedReply {
            explanation: None,
            sql: non_empty(reply),
        };
    }
    ParsedReply {
        explanation: non_empty(reply),
        sql: None,
    }
}

/// Builds the role-mapped chat history from the conversation log.
///
/// Result tables are skipped, and assistant messages are cut at the embedded
/// SQL details block. A trailing user turn is the question about to be sent
/// and is therefore left out.
pub fn build_history(turns: &[Turn]) -> Vec<ChatMessage> {
    let prior = match turns.last() {
        Some(last) if last.role == Role::User => &turns[..turns.len() - 1],
        _ => turns,
    };
    prior
        .iter()
        .filter_map(|turn| {
            let text = turn.text()?;
            match turn.role {
                Role::User => Some(ChatMessage {
                    role: ChatRole::User,
                    content: text.to_string(),
                }),
                Role::Assistant => {
                    let visible = text.split(SQL_DETAILS_MARKER).next().unwrap_or(text);
                    // A turn that was only a SQL block has nothing left to send.
                    (!visible.trim().is_empty()).then(|| ChatMessage {
                        role: ChatRole::Model,
                        content: visible.to_string(),
                    })
                }
                Role::ResultTable => None,
            }
        })
        .collect()
}

/// Generates SQL for a question in the context of the conversation so far.
#[derive(Debug, Clone)]
pub struct SqlGenerator {
    provider: Box<dyn AiProvider>,
    system_prompt: Arc<String>,
    params: SamplingParams,
}

impl SqlGenerator {
    pub fn new(provider: Box<dyn AiProvider>, system_prompt: Arc<String>) -> Self {
        Self {
            provider,
            system_prompt,
            params: SamplingParams::GENERATION,
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub async fn generate(&self, question: &str, history: &[Turn]) -> Generation {
        let chat_history = build_history(history);
        info!(
            "[generate] question: {question:?}, {} history messages",
            chat_history.len()
        );

        let reply = match self
            .provider
            .chat(&self.system_prompt, &chat_history, question, &self.params)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                error!(kind = ?e.kind(), "[generate] completion service error: {e:?}");
                return Generation::failed(format!("Completion service failed: {e}"));
            }
        };
        debug!("<-- Reply from AI: {}", &reply);

        let parsed = parse_reply(&reply);
        Generation {
            explanation: parsed.explanation,
            sql: parsed.sql,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_reply_splits_explanation_and_sql() {
        let reply = "Totals sales per channel for 2024.\n\n```sql\n  SELECT channel, SUM(amount) FROM sales GROUP BY channel;\n```\nThanks";
        let parsed = parse_reply(reply);
        assert_eq!(
            parsed.explanation.as_deref(),
            Some("Totals sales per channel for 2024.")
        );
        assert_eq!(
            parsed.sql.as_deref(),
            Some("SELECT channel, SUM(amount) FROM sales GROUP BY channel;")
        );
    }

    #[test]
    fn unterminated_fence_runs_to_end() {
        let parsed = parse_reply("Here you go\n```SQL\nSELECT 1\n");
        assert_eq!(parsed.explanation.as_deref(), Some("Here you go"));
        assert_eq!(parsed.sql.as_deref(), Some("SELECT 1"));
    }

    #[test]
    fn empty_fence_yields_no_sql() {
        let parsed = parse_reply("Nothing to run\n```sql\n\n```");
        assert_eq!(parsed.sql, None);
        assert_eq!(parsed.explanation.as_deref(), Some("Nothing to run"));
    }

    #[test]
    fn bare_select_is_sql_without_explanation() {
        let parsed = parse_reply("select count(*) from orders\n");
        assert_eq!(parsed.sql.as_deref(), Some("select count(*) from orders"));
        assert_eq!(parsed.explanation, None);
    }

    #[test]
    fn prose_reply_has_no_sql() {
        let parsed = parse_reply("I can only answer sales questions.");
        assert_eq!(parsed.sql, None);
        assert_eq!(
            parsed.explanation.as_deref(),
            Some("I can only answer sales questions.")
        );
    }

    #[test]
    fn history_maps_roles_and_strips_details() {
        let turns = vec![
            Turn::assistant("Hello, How can I help you?"),
            Turn::user("sales 2024"),
            Turn::assistant(format!("Sums sales.{SQL_DETAILS_MARKER}\n<summary>View Generated SQL</summary></details>")),
            Turn::assistant("✅ Query executed successfully!"),
            Turn::result_table(Default::default()),
            Turn::user("what about 2023"),
        ];
        let history = build_history(&turns);
        assert_eq!(
            history,
            vec![
                ChatMessage { role: ChatRole::Model, content: "Hello, How can I help you?".into() },
                ChatMessage { role: ChatRole::User, content: "sales 2024".into() },
                ChatMessage { role: ChatRole::Model, content: "Sums sales.".into() },
                ChatMessage { role: ChatRole::Model, content: "✅ Query executed successfully!".into() },
            ]
        );
    }

    #[test]
    fn sql_only_assistant_turns_are_dropped() {
        let turns = vec![
            Turn::user("sales 2024"),
            Turn::assistant(format!("{SQL_DETAILS_MARKER}\n<summary>View Generated SQL</summary></details>")),
        ];
        assert_eq!(
            build_history(&turns),
            vec![ChatMessage { role: ChatRole::User, content: "sales 2024".into() }]
        );
    }
}
