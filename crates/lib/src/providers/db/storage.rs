use crate::errors::PromptError;
use crate::types::ResultSet;
use async_trait::async_trait;
use dyn_clone::DynClone;
use std::fmt::Debug;

/// A trait for interacting with a storage backend.
///
/// This trait defines a common interface for introspecting tables and executing
/// read-only queries against different database providers.
#[async_trait]
pub trait Storage: Send + Sync + DynClone + Debug {
    /// Returns the name of the storage provider (e.g., "SQLite").
    fn name(&self) -> &str;

    /// Returns the query dialect spoken by the provider (e.g., "SQL").
    fn language(&self) -> &str;

    /// Lists the table names of one database schema.
    async fn list_tables(&self, schema_name: &str) -> Result<Vec<String>, PromptError>;

    /// Lists the ordered column names of one table.
    async fn list_columns(
        &self,
        schema_name: &str,
        table_name: &str,
    ) -> Result<Vec<String>, PromptError>;

    /// Executes a query and returns every row it produced.
    async fn execute_query(&self, query: &str) -> Result<ResultSet, PromptError>;
}

dyn_clone::clone_trait_object!(Storage);
