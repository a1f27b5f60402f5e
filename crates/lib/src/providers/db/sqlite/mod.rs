use crate::{
    errors::PromptError, executor::is_read_only, providers::db::storage::Storage,
    types::ResultSet,
};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt::{self, Debug};
use tracing::{debug, info};
use turso::{Database, Value as TursoValue};

/// The schema name SQLite gives the primary database file.
pub const MAIN_SCHEMA: &str = "main";

/// A provider for interacting with a local SQLite database using Turso.
///
/// When cloned, it shares the same underlying database, so an in-memory
/// instance can be seeded once and handed to several consumers.
#[derive(Clone)]
pub struct SqliteProvider {
    /// The Turso database instance. It's cloneable and thread-safe.
    pub db: Database,
}

impl SqliteProvider {
    /// Creates a new `SqliteProvider` from a file path or in-memory.
    ///
    /// Use ":memory:" for a unique, isolated in-memory database.
    pub async fn new(db_path: &str) -> Result<Self, PromptError> {
        let db = turso::Builder::new_local(db_path)
            .build()
            .await
            .map_err(|e| PromptError::StorageConnection(e.to_string()))?;

        Ok(Self { db })
    }

    /// Executes multiple `;`-separated statements, e.g. to seed test data.
    pub async fn initialize_with_data(&self, init_sql: &str) -> Result<(), PromptError> {
        let conn = self
            .db
            .connect()
            .map_err(|e| PromptError::StorageConnection(e.to_string()))?;

        for statement in init_sql.split(';').filter(|s| !s.trim().is_empty()) {
            conn.execute(statement, ())
                .await
                .map_err(|e| PromptError::StorageOperationFailed(e.to_string()))?;
        }
        Ok(())
    }
}

impl Debug for SqliteProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteProvider").finish_non_exhaustive()
    }
}

/// Converts a Turso value to a serde_json::Value.
fn turso_value_to_json(v: TursoValue) -> Value {
    match v {
        TursoValue::Null => Value::Null,
        TursoValue::Integer(i) => Value::Number(i.into()),
        TursoValue::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        TursoValue::Text(s) => Value::String(s),
        TursoValue::Blob(_) => Value::String("<blob>".to_string()),
    }
}

/// Prefixes a catalog object with its schema unless it lives in `main`.
fn qualify(schema_name: &str, object: &str) -> String {
    if schema_name.is_empty() || schema_name == MAIN_SCHEMA {
        object.to_string()
    } else {
        format!("{schema_name}.{object}")
    }
}

#[async_trait]
impl Storage for SqliteProvider {
    fn name(&self) -> &str {
        "SQLite"
    }

    fn language(&self) -> &str {
        "SQL"
    }

    async fn list_tables(&self, schema_name: &str) -> Result<Vec<String>, PromptError> {
        info!(schema = %schema_name, "Listing tables in SQLite database.");
        let conn = self
            .db
            .connect()
            .map_err(|e| PromptError::StorageConnection(e.to_string()))?;

        let query = format!(
            "SELECT name FROM {} WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name;",
            qualify(schema_name, "sqlite_master")
        );
        let mut rows = conn
            .query(&query, ())
            .await
            .map_err(|e| PromptError::StorageOperationFailed(e.to_string()))?;

        let mut tables = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| PromptError::StorageOperationFailed(e.to_string()))?
        {
            if let Ok(TursoValue::Text(name)) = row.get_value(0) {
                tables.push(name);
            }
        }
        Ok(tables)
    }

    async fn list_columns(
        &self,
        schema_name: &str,
        table_name: &str,
    ) -> Result<Vec<String>, PromptError> {
        let conn = self
            .db
            .connect()
            .map_err(|e| PromptError::StorageConnection(e.to_string()))?;

        let query = format!(
            "PRAGMA {}({table_name});",
            qualify(schema_name, "table_info")
        );
        let mut rows = conn
            .query(&query, ())
            .await
            .map_err(|e| PromptError::StorageOperationFailed(e.to_string()))?;

        let mut columns = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| PromptError::StorageOperationFailed(e.to_string()))?
        {
            // PRAGMA table_info columns: cid, name, type, notnull, dflt_value, pk
            if let Ok(TursoValue::Text(name)) = row.get_value(1) {
                columns.push(name);
            }
        }

        if columns.is_empty() {
            return Err(PromptError::StorageOperationFailed(format!(
                "Table '{table_name}' not found or has no columns."
            )));
        }
        Ok(columns)
    }

    async fn execute_query(&self, query: &str) -> Result<ResultSet, PromptError> {
        debug!(query = %query, "--> Executing SQLite query");
        if !is_read_only(query) {
            return Err(PromptError::NotReadOnly(
                query.lines().next().unwrap_or_default().to_string(),
            ));
        }

        let conn = self
            .db
            .connect()
            .map_err(|e| PromptError::StorageConnection(e.to_string()))?;
        // Not every engine build knows this pragma; the statement check above still applies.
        if let Err(e) = conn.execute("PRAGMA query_only = 1;", ()).await {
            debug!("PRAGMA query_only not applied: {e}");
        }

        let mut stmt = conn
            .prepare(query)
            .await
            .map_err(|e| PromptError::StorageOperationFailed(e.to_string()))?;

        let columns: Vec<String> = stmt
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let mut rows = stmt
            .query(())
            .await
            .map_err(|e| PromptError::StorageOperationFailed(e.to_string()))?;

        let mut result_rows = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| PromptError::StorageOperationFailed(e.to_string()))?
        {
            let mut values = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                let value = row
                    .get_value(i)
                    .map_err(|e| PromptError::StorageOperationFailed(e.to_string()))?;
                values.push(turso_value_to_json(value));
            }
            result_rows.push(values);
        }

        Ok(ResultSet::new(columns, result_rows))
    }
}
