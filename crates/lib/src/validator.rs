//! # Question Validation
//!
//! Inspects a raw question for ambiguous domain terms and a missing time period
//! before any completion request is made. Validation is fail-fast: at most one
//! clarification request is returned, and an ambiguous term short-circuits the
//! time-period check.

use crate::{prompts::core::MISSING_TIMEFRAME_MESSAGE, types::ClarificationRequest};
use chrono::{Datelike, Local};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Four digits, optionally glued to a fiscal-year prefix (`FY2024`).
static YEAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:fy)?(\d{4})\b").unwrap());

/// Years at or below this value are never accepted as a time period.
pub const EARLIEST_YEAR_EXCLUSIVE: i32 = 2019;

/// A domain term that must be disambiguated before generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbiguousTerm {
    pub term: String,
    pub options: Vec<String>,
}

impl AmbiguousTerm {
    pub fn new(term: &str, options: &[&str]) -> Self {
        Self {
            term: term.to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
        }
    }
}

/// The built-in ambiguous terms, in scan order.
pub fn default_ambiguous_terms() -> Vec<AmbiguousTerm> {
    vec![
        AmbiguousTerm::new("volume", &["Sold Quantity", "Cancelled Quantity", "Quantity"]),
        AmbiguousTerm::new(
            "date",
            &[
                "OrderDate",
                "DispatchDate",
                "DeliveryDate",
                "CancelDate",
                "CreatedDate",
            ],
        ),
        AmbiguousTerm::new("price", &["UnitPrice", "NetPrice", "PriceAfterDiscount"]),
        AmbiguousTerm::new("top product", &["Highest TotalNetAmount", "Highest Quantity"]),
    ]
}

/// Words whose presence counts as a time specification.
///
/// Only `year` is effective by default; `last` can be added through
/// configuration.
pub fn default_time_keywords() -> Vec<String> {
    vec!["year".to_string()]
}

/// Detects ambiguous terminology and missing time periods in a question.
#[derive(Debug, Clone)]
pub struct QuestionValidator {
    terms: Vec<AmbiguousTerm>,
    time_keywords: Vec<String>,
}

impl Default for QuestionValidator {
    fn default() -> Self {
        Self::new(default_ambiguous_terms(), default_time_keywords())
    }
}

impl QuestionValidator {
    pub fn new(terms: Vec<AmbiguousTerm>, time_keywords: Vec<String>) -> Self {
        let time_keywords = time_keywords
            .into_iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self {
            terms,
            time_keywords,
        }
    }

    /// Validates a question against the current calendar year.
    pub fn validate(&self, question: &str) -> Vec<ClarificationRequest> {
        self.validate_at(question, Local::now().year())
    }

    /// Validates a question as if `current_year` were the calendar year.
    pub fn validate_at(&self, question: &str, current_year: i32) -> Vec<ClarificationRequest> {
        if let Some(ambiguity) = self.find_ambiguity(question) {
            return vec![ambiguity];
        }
        if !self.has_time_spec(question, current_year) {
            return vec![ClarificationRequest::MissingTimeframe {
                message: MISSING_TIMEFRAME_MESSAGE.to_string(),
            }];
        }
        Vec::new()
    }

    /// Returns the first configured term found as a whole word in the question.
    fn find_ambiguity(&self, question: &str) -> Option<ClarificationRequest> {
        let padded = format!(" {} ", question.to_lowercase());
        self.terms.iter().find_map(|t| {
            let term = t.term.trim().to_lowercase();
            (!term.is_empty() && padded.contains(&format!(" {term} "))).then(|| {
                ClarificationRequest::Ambiguity {
                    term,
                    options: t.options.clone(),
                }
            })
        })
    }

    /// True when the question names a time keyword or a plausible year in
    /// `(2019, current_year + 1]`.
    ///
    /// Unlike a plain four-digit match, a fiscal-year prefix (`FY2024`) counts.
    pub fn has_time_spec(&self, question: &str, current_year: i32) -> bool {
        let lowered = question.to_lowercase();
        if self.time_keywords.iter().any(|k| lowered.contains(k.as_str())) {
            return true;
        }
        YEAR_PATTERN
            .captures_iter(question)
            .filter_map(|caps| caps.get(1)?.as_str().parse::<i32>().ok())
            .any(|year| year > EARLIEST_YEAR_EXCLUSIVE && year <= current_year + 1)
    }
}
