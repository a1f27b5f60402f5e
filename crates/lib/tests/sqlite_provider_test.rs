//! # SQLite Provider Tests
//!
//! Verifies schema introspection and query execution of the `SqliteProvider`
//! against in-memory databases.

mod common;

use crate::common::setup_tracing;
use salesbot::providers::db::{sqlite::SqliteProvider, sqlite::MAIN_SCHEMA, storage::Storage};
use salesbot::schema::{load_schema, schema_gap_marker};
use salesbot::PromptError;
use salesbot_test_utils::TestSetup;
use serde_json::json;

#[tokio::test]
async fn test_sqlite_provider_basic_query() {
    setup_tracing();

    let provider = SqliteProvider::new(":memory:")
        .await
        .expect("Failed to create SqliteProvider");
    let setup_sql = "
        CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, score REAL);
        INSERT INTO users (id, name, score) VALUES (1, 'Alice', 1.5);
        INSERT INTO users (id, name, score) VALUES (2, 'Bob', NULL);
    ";
    provider
        .initialize_with_data(setup_sql)
        .await
        .expect("Failed to initialize database with test data");

    let result = provider
        .execute_query("SELECT id, name, score FROM users ORDER BY id ASC")
        .await
        .expect("Failed to execute query");

    assert_eq!(result.columns, vec!["id", "name", "score"]);
    assert_eq!(
        result.rows,
        vec![
            vec![json!(1), json!("Alice"), json!(1.5)],
            vec![json!(2), json!("Bob"), json!(null)],
        ]
    );
}

/// Verifies that each in-memory provider instance is isolated from the others.
#[tokio::test]
async fn test_in_memory_databases_are_isolated() {
    setup_tracing();

    let provider1 = SqliteProvider::new(":memory:").await.unwrap();
    provider1
        .initialize_with_data("CREATE TABLE test (id INTEGER);")
        .await
        .unwrap();

    let provider2 = SqliteProvider::new(":memory:").await.unwrap();
    let result = provider2.execute_query("SELECT * FROM test").await;

    assert!(matches!(result, Err(PromptError::StorageOperationFailed(_))));
}

#[tokio::test]
async fn test_lists_tables_and_columns_in_order() {
    setup_tracing();
    let setup = TestSetup::new().await.unwrap();

    let tables = setup.provider.list_tables(MAIN_SCHEMA).await.unwrap();
    assert_eq!(tables, vec!["Customer", "Sales_SalesOrderLines"]);

    let columns = setup
        .provider
        .list_columns(MAIN_SCHEMA, "Sales_SalesOrderLines")
        .await
        .unwrap();
    assert_eq!(
        columns,
        vec!["OrderID", "OrderDate", "Channel", "ProductName", "Quantity", "NetAmount"]
    );
}

#[tokio::test]
async fn test_missing_table_has_no_columns() {
    setup_tracing();
    let setup = TestSetup::new().await.unwrap();

    let result = setup.provider.list_columns(MAIN_SCHEMA, "Nope").await;
    assert!(matches!(result, Err(PromptError::StorageOperationFailed(_))));
}

#[tokio::test]
async fn test_load_schema_qualifies_tables_and_skips_failing_schemas() {
    setup_tracing();
    let setup = TestSetup::new().await.unwrap();

    // The second schema does not exist: it is logged and skipped.
    let names = vec![MAIN_SCHEMA.to_string(), "archive".to_string()];
    let schema = load_schema(&setup.provider, &names).await;
    let gap = schema_gap_marker(MAIN_SCHEMA);

    let keys: Vec<&str> = schema.keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec![
            gap.as_str(),
            "main.Customer",
            "main.Sales_SalesOrderLines",
        ]
    );
    assert!(schema[&gap].is_empty());
    assert_eq!(schema["main.Customer"], vec!["CustomerID", "CustomerName", "Region"]);
}

#[tokio::test]
async fn test_sqlite_provider_refuses_writes() {
    setup_tracing();
    let setup = TestSetup::new().await.expect("Failed to seed database");

    for statement in [
        "DELETE FROM Customer",
        "WITH x AS (SELECT 1) DELETE FROM Customer",
        "SELECT 1; DELETE FROM Customer",
    ] {
        let result = setup.provider.execute_query(statement).await;
        assert!(
            matches!(result, Err(PromptError::NotReadOnly(_))),
            "{statement} should be refused, got {result:?}"
        );
    }

    let customers = setup
        .provider
        .execute_query("SELECT CustomerID FROM Customer")
        .await
        .expect("Select should still run");
    assert_eq!(customers.len(), 2);
}
