use anyhow::Result;
use salesbot::errors::PromptError;
use salesbot::providers::ai::AiProvider;
use salesbot::providers::db::sqlite::SqliteProvider;
use salesbot::providers::db::storage::Storage;
use salesbot::types::{ChatMessage, ResultSet, SamplingParams};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};

// --- Test Setup ---

/// Order lines for one sale in every month of 2024, plus two 2023 sales.
pub const SALES_FIXTURE_SQL: &str = "
    CREATE TABLE Sales_SalesOrderLines (
        OrderID INTEGER PRIMARY KEY,
        OrderDate TEXT NOT NULL,
        Channel TEXT NOT NULL,
        ProductName TEXT NOT NULL,
        Quantity INTEGER NOT NULL,
        NetAmount REAL NOT NULL
    );
    CREATE TABLE Customer (
        CustomerID INTEGER PRIMARY KEY,
        CustomerName TEXT NOT NULL,
        Region TEXT
    );
    INSERT INTO Sales_SalesOrderLines VALUES (1, '2023-11-03', 'Online', 'Widget', 4, 40.0);
    INSERT INTO Sales_SalesOrderLines VALUES (2, '2023-12-19', 'Retail', 'Gadget', 1, 99.5);
    INSERT INTO Sales_SalesOrderLines VALUES (3, '2024-01-08', 'Online', 'Widget', 2, 20.0);
    INSERT INTO Sales_SalesOrderLines VALUES (4, '2024-02-11', 'Retail', 'Gadget', 3, 298.5);
    INSERT INTO Sales_SalesOrderLines VALUES (5, '2024-03-15', 'Online', 'Widget', 10, 100.0);
    INSERT INTO Sales_SalesOrderLines VALUES (6, '2024-04-02', 'Retail', 'Gizmo', 1, 15.25);
    INSERT INTO Sales_SalesOrderLines VALUES (7, '2024-05-21', 'Online', 'Gizmo', 6, 91.5);
    INSERT INTO Sales_SalesOrderLines VALUES (8, '2024-06-30', 'Retail', 'Widget', 5, 50.0);
    INSERT INTO Sales_SalesOrderLines VALUES (9, '2024-07-04', 'Online', 'Gadget', 2, 199.0);
    INSERT INTO Sales_SalesOrderLines VALUES (10, '2024-08-17', 'Retail', 'Widget', 7, 70.0);
    INSERT INTO Sales_SalesOrderLines VALUES (11, '2024-09-09', 'Online', 'Gizmo', 3, 45.75);
    INSERT INTO Sales_SalesOrderLines VALUES (12, '2024-10-12', 'Retail', 'Gadget', 1, 99.5);
    INSERT INTO Sales_SalesOrderLines VALUES (13, '2024-11-25', 'Online', 'Widget', 8, 80.0);
    INSERT INTO Sales_SalesOrderLines VALUES (14, '2024-12-31', 'Retail', 'Gizmo', 2, 30.5);
    INSERT INTO Customer VALUES (1, 'Acme Stores', 'North');
    INSERT INTO Customer VALUES (2, 'Bolt Retail', 'South');
";

/// A helper struct holding an isolated, seeded in-memory sales database.
pub struct TestSetup {
    pub provider: SqliteProvider,
}

impl TestSetup {
    /// Creates a new in-memory database loaded with `SALES_FIXTURE_SQL`.
    pub async fn new() -> Result<Self> {
        let provider = SqliteProvider::new(":memory:").await?;
        provider.initialize_with_data(SALES_FIXTURE_SQL).await?;
        Ok(Self { provider })
    }

    /// A database without any tables.
    pub async fn empty() -> Result<Self> {
        Ok(Self {
            provider: SqliteProvider::new(":memory:").await?,
        })
    }
}

// --- Mock AI Provider ---

/// One request seen by `MockAiProvider`.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedCall {
    pub system_instruction: String,
    pub history: Vec<ChatMessage>,
    pub message: String,
    pub params: SamplingParams,
}

/// A completion service that answers from pre-programmed responses.
///
/// Each response is keyed by a substring of the message; the first key
/// (in insertion order) found in the message wins. Unmatched messages fail
/// with `PromptError::AiApi`.
#[derive(Clone, Debug, Default)]
pub struct MockAiProvider {
    responses: Arc<Mutex<Vec<(String, String)>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockAiProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-programs a response for every message containing `key`.
    pub fn add_response(&self, key: &str, response: &str) {
        let mut responses = self.responses.lock().unwrap();
        responses.push((key.to_string(), response.to_string()));
    }

    /// Retrieves the recorded calls for assertion.
    pub fn get_calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AiProvider for MockAiProvider {
    async fn chat(
        &self,
        system_instruction: &str,
        history: &[ChatMessage],
        message: &str,
        params: &SamplingParams,
    ) -> Result<String, PromptError> {
        self.calls.lock().unwrap().push(RecordedCall {
            system_instruction: system_instruction.to_string(),
            history: history.to_vec(),
            message: message.to_string(),
            params: *params,
        });

        let responses = self.responses.lock().unwrap();
        responses
            .iter()
            .find(|(key, _)| message.contains(key.as_str()))
            .map(|(_, response)| response.clone())
            .ok_or_else(|| {
                PromptError::AiApi(format!(
                    "MockAiProvider: No response programmed for message. Got: '{message}'"
                ))
            })
    }
}

// --- Mock Storage ---

/// An in-memory storage with scripted tables, columns and query results.
///
/// Schemas or tables without scripted entries fail, which lets tests exercise
/// partial schema loading. Executed queries are recorded.
#[derive(Clone, Debug, Default)]
pub struct MockStorage {
    tables: Arc<Mutex<HashMap<String, Vec<String>>>>,
    columns: Arc<Mutex<HashMap<String, Vec<String>>>>,
    results: Arc<Mutex<Vec<(String, ResultSet)>>>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table to a schema. `None` columns make `list_columns` fail for it.
    pub fn add_table(&self, schema_name: &str, table: &str, columns: Option<&[&str]>) {
        self.tables
            .lock()
            .unwrap()
            .entry(schema_name.to_string())
            .or_default()
            .push(table.to_string());
        if let Some(columns) = columns {
            self.columns.lock().unwrap().insert(
                format!("{schema_name}.{table}"),
                columns.iter().map(|c| c.to_string()).collect(),
            );
        }
    }

    /// Pre-programs the result of every query containing `key`.
    pub fn add_result(&self, key: &str, result: ResultSet) {
        self.results.lock().unwrap().push((key.to_string(), result));
    }

    /// The queries executed so far.
    pub fn get_queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Storage for MockStorage {
    fn name(&self) -> &str {
        "MockDB"
    }

    fn language(&self) -> &str {
        "SQL"
    }

    async fn list_tables(&self, schema_name: &str) -> Result<Vec<String>, PromptError> {
        self.tables
            .lock()
            .unwrap()
            .get(schema_name)
            .cloned()
            .ok_or_else(|| {
                PromptError::StorageOperationFailed(format!("unknown schema '{schema_name}'"))
            })
    }

    async fn list_columns(
        &self,
        schema_name: &str,
        table_name: &str,
    ) -> Result<Vec<String>, PromptError> {
        let key = format!("{schema_name}.{table_name}");
        self.columns
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| PromptError::StorageOperationFailed(format!("cannot read '{key}'")))
    }

    async fn execute_query(&self, query: &str) -> Result<ResultSet, PromptError> {
        self.queries.lock().unwrap().push(query.to_string());
        let results = self.results.lock().unwrap();
        results
            .iter()
            .find(|(key, _)| query.contains(key.as_str()))
            .map(|(_, result)| result.clone())
            .ok_or_else(|| {
                PromptError::StorageOperationFailed(format!("MockStorage: no result for '{query}'"))
            })
    }
}
