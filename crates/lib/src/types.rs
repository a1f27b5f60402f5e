use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Qualified table name mapped to its ordered column names.
///
/// A `BTreeMap` keeps iteration sorted by table name, which the prompt
/// formatter relies on for deterministic output.
pub type Schema = BTreeMap<String, Vec<String>>;

/// Who produced a turn in the conversation log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    User,
    Assistant,
    ResultTable,
}

/// The payload of a turn: either text or a tabular query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TurnContent {
    Text(String),
    Table(ResultSet),
}

/// One message or tabular result in the conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: TurnContent,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: TurnContent::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: TurnContent::Text(text.into()),
        }
    }

    pub fn result_table(result: ResultSet) -> Self {
        Self {
            role: Role::ResultTable,
            content: TurnContent::Table(result),
        }
    }

    /// Returns the text of the turn, or `None` for a result table.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            TurnContent::Text(text) => Some(text),
            TurnContent::Table(_) => None,
        }
    }
}

/// Rows and named columns produced by executing a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// A gate that requires explicit user input before generation can proceed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClarificationRequest {
    /// A domain term with several plausible meanings was found.
    Ambiguity { term: String, options: Vec<String> },
    /// The question has no recognisable time period.
    MissingTimeframe { message: String },
}

/// Decoding parameters passed to the completion service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
}

impl SamplingParams {
    /// Low temperature, nucleus-sampled decoding for SQL generation.
    pub const GENERATION: SamplingParams = SamplingParams {
        temperature: 0.2,
        top_p: Some(0.93),
        top_k: Some(40),
    };

    /// Looser decoding for follow-up suggestions.
    pub const SUGGESTION: SamplingParams = SamplingParams {
        temperature: 0.7,
        top_p: None,
        top_k: None,
    };
}

/// The role of a message in a completion-service chat history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

/// One prior message sent to the completion service as chat history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// A reusable configuration for a specific AI provider instance.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProviderConfig {
    /// The type of provider ("gemini" or "local").
    pub provider: String,
    /// The API URL. Optional for Gemini, where it is derived from the model name.
    #[serde(default)]
    pub api_url: Option<String>,
    /// The API key, which can be null for local providers.
    #[serde(default)]
    pub api_key: Option<String>,
    pub model_name: String,
}
