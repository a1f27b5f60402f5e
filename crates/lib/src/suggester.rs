//! # Follow-up Suggestions
//!
//! Asks a cheaper model for follow-up questions once a query has produced rows.
//! This is a non-essential enhancement: any failure degrades to an empty list
//! plus a warning.

use crate::{
    prompts::core::{build_follow_up_prompt, FOLLOW_UP_PROMPT},
    providers::ai::AiProvider,
    types::SamplingParams,
};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{info, warn};

static QUOTED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""(.*?)""#).unwrap());

/// The most suggestions ever offered at once.
pub const MAX_SUGGESTIONS: usize = 3;

/// Suggested questions plus the warning raised when generating them failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Suggestions {
    pub questions: Vec<String>,
    pub warning: Option<String>,
}

/// Returns the first `max` double-quoted substrings of `reply`, in order.
pub fn extract_quoted(reply: &str, max: usize) -> Vec<String> {
    QUOTED
        .captures_iter(reply)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .take(max)
        .collect()
}

#[derive(Debug, Clone)]
pub struct FollowUpSuggester {
    provider: Box<dyn AiProvider>,
    prompt_template: String,
    params: SamplingParams,
}

impl FollowUpSuggester {
    pub fn new(provider: Box<dyn AiProvider>) -> Self {
        Self {
            provider,
            prompt_template: FOLLOW_UP_PROMPT.to_string(),
            params: SamplingParams::SUGGESTION,
        }
    }

    /// Replaces the default prompt template.
    pub fn with_prompt_template(mut self, template: impl Into<String>) -> Self {
        self.prompt_template = template.into();
        self
    }

    pub async fn suggest(
        &self,
        original_question: &str,
        sql: &str,
        result_columns: &[String],
    ) -> Suggestions {
        let prompt =
            build_follow_up_prompt(&self.prompt_template, original_question, sql, result_columns);

        match self.provider.complete(&prompt, &self.params).await {
            Ok(reply) => {
                let questions = extract_quoted(&reply, MAX_SUGGESTIONS);
                info!("[suggest] {} follow-up questions", questions.len());
                Suggestions {
                    questions,
                    warning: None,
                }
            }
            Err(e) => {
                warn!("Could not generate follow-up questions: {e}");
                Suggestions {
                    questions: Vec::new(),
                    warning: Some(format!("Could not generate follow-up questions: {e}")),
                }
            }
        }
    }
}
