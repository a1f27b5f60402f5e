//! # Schema Formatting
//!
//! Turns the table → columns mapping read from the data store into the compact
//! text block embedded in the SQL generation prompt, and loads that mapping
//! from a `Storage` provider.

use crate::{providers::db::storage::Storage, types::Schema};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Derives a short alias from a table name: the lower-cased initials of the
/// underscore-separated segments of its unqualified name.
///
/// `sales.Sales_SalesOrderLines` becomes `ss`.
pub fn table_alias(table: &str) -> String {
    let base = table.rsplit('.').next().unwrap_or(table);
    base.split('_')
        .filter_map(|segment| segment.chars().next())
        .collect::<String>()
        .to_lowercase()
}

/// Formats a schema for inclusion in a prompt.
///
/// Tables are emitted sorted by name, each as a `Table:` line with its alias
/// followed by a line of backtick-quoted column names. A non-empty `hint` is
/// appended verbatim under its own heading.
pub fn format_schema_for_prompt(schema: &Schema, hint: Option<&str>) -> String {
    let mut formatted = Vec::with_capacity(schema.len() * 2 + 2);
    for (table, columns) in schema {
        formatted.push(format!("Table: {table} (alias: {})", table_alias(table)));
        let quoted: Vec<String> = columns.iter().map(|c| format!("`{c}`")).collect();
        formatted.push(format!("    Columns: ({})", quoted.join(", ")));
    }
    if let Some(hint) = hint.filter(|h| !h.trim().is_empty()) {
        formatted.push("\n### LLM Schema Summary:\n".to_string());
        formatted.push(hint.to_string());
    }
    formatted.join("\n")
}

/// The pseudo-table that separates two consecutive schemas.
pub fn schema_gap_marker(schema_name: &str) -> String {
    format!("--- GAP ({schema_name} done) ---")
}

/// Reads every table of the given schemas into a `Schema`.
///
/// Tables whose columns cannot be read are logged and skipped; a schema whose
/// table list cannot be read is skipped the same way. Table names are
/// qualified as `<schema>.<table>`.
pub async fn load_schema(storage: &dyn Storage, schema_names: &[String]) -> Schema {
    let mut schema = Schema::new();
    for (idx, schema_name) in schema_names.iter().enumerate() {
        match storage.list_tables(schema_name).await {
            Ok(tables) => {
                for table in tables {
                    let full_table_name = format!("{schema_name}.{table}");
                    match storage.list_columns(schema_name, &table).await {
                        Ok(columns) => {
                            schema.insert(full_table_name, columns);
                        }
                        Err(e) => {
                            warn!("Could not retrieve columns for {full_table_name}: {e}");
                        }
                    }
                }
            }
            Err(e) => warn!("Could not list tables of schema '{schema_name}': {e}"),
        }
        if idx + 1 < schema_names.len() {
            schema.insert(schema_gap_marker(schema_name), Vec::new());
        }
    }
    info!("Loaded schema with {} entries.", schema.len());
    schema
}

/// Memoizes formatted schema text keyed by the content it was built from.
#[derive(Debug, Default, Clone)]
pub struct PromptCache {
    entries: Arc<RwLock<HashMap<String, Arc<String>>>>,
}

impl PromptCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn cache_key(schema: &Schema, hint: Option<&str>) -> String {
        let mut material = String::new();
        for (table, columns) in schema {
            material.push_str(table);
            material.push('\u{1f}');
            material.push_str(&columns.join("\u{1e}"));
            material.push('\n');
        }
        material.push_str(hint.unwrap_or_default());
        format!("{:x}", md5::compute(material.as_bytes()))
    }

    /// Returns the formatted schema, computing it only on the first request
    /// for this schema and hint.
    pub async fn formatted(&self, schema: &Schema, hint: Option<&str>) -> Arc<String> {
        let key = Self::cache_key(schema, hint);
        if let Some(hit) = self.entries.read().await.get(&key) {
            return hit.clone();
        }
        let formatted = Arc::new(format_schema_for_prompt(schema, hint));
        self.entries
            .write()
            .await
            .entry(key)
            .or_insert(formatted)
            .clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
