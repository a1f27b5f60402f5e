//! # Schema Loading Tests
//!
//! Exercises schema introspection and a full conversation against a scripted
//! storage, so that partial failures can be staged.

mod common;

use anyhow::Result;
use common::{setup_tracing, TEST_YEAR};
use salesbot::schema::{load_schema, schema_gap_marker, PromptCache};
use salesbot::{ConversationController, Phase, ResultSet, SessionState, UserEvent};
use salesbot_test_utils::{MockAiProvider, MockStorage};
use serde_json::json;

fn scripted_storage() -> MockStorage {
    let storage = MockStorage::new();
    storage.add_table(
        "sales",
        "Sales_SalesOrderLines",
        Some(&["OrderID", "Channel", "NetAmount"]),
    );
    storage.add_table("sales", "Broken_View", None);
    storage.add_table("dbo", "Customer", Some(&["CustomerID", "CustomerName"]));
    storage
}

#[tokio::test]
async fn test_unreadable_tables_and_schemas_are_skipped() {
    setup_tracing();
    let storage = scripted_storage();
    let names = vec!["sales".to_string(), "missing".to_string(), "dbo".to_string()];

    let schema = load_schema(&storage, &names).await;

    let keys: Vec<&String> = schema.keys().collect();
    assert_eq!(
        keys,
        vec![
            &schema_gap_marker("missing"),
            &schema_gap_marker("sales"),
            &"dbo.Customer".to_string(),
            &"sales.Sales_SalesOrderLines".to_string(),
        ]
    );
    assert_eq!(schema["dbo.Customer"], vec!["CustomerID", "CustomerName"]);
    assert!(schema[&schema_gap_marker("sales")].is_empty());
}

#[tokio::test]
async fn test_conversation_over_scripted_storage() -> Result<()> {
    setup_tracing();
    let storage = scripted_storage();
    storage.add_result(
        "GROUP BY Channel",
        ResultSet::new(
            vec!["Channel".into(), "Total".into()],
            vec![
                vec![json!("Online"), json!(536.25)],
                vec![json!("Retail"), json!(563.75)],
            ],
        ),
    );
    let ai = MockAiProvider::new();
    ai.add_response("follow-up questions", r#"["Which month sold most online?"]"#);
    ai.add_response(
        "by channel",
        "```sql\nSELECT Channel, SUM(NetAmount) AS Total FROM sales.Sales_SalesOrderLines GROUP BY Channel\n```",
    );

    let controller = ConversationController::builder()
        .generation_provider(Box::new(ai.clone()))
        .storage(Box::new(storage.clone()))
        .schema_names(vec!["sales".to_string(), "dbo".to_string()])
        .schema_hint(Some("NetAmount excludes tax.".to_string()))
        .current_year(TEST_YEAR)
        .build()
        .await?;

    assert!(controller.system_prompt().contains("for MockDB"));
    assert!(controller
        .formatted_schema()
        .contains("Table: sales.Sales_SalesOrderLines (alias: ss)"));
    assert!(controller.formatted_schema().ends_with("NetAmount excludes tax."));
    assert!(!controller.formatted_schema().contains("Broken_View"));

    let mut session = SessionState::new();
    assert!(
        controller
            .submit(
                &mut session,
                UserEvent::Input("Total sales by channel for year 2024".into()),
            )
            .await
    );

    assert_eq!(session.phase, Phase::Idle);
    let queries = storage.get_queries();
    assert_eq!(queries.len(), 1);
    assert!(queries[0].ends_with("GROUP BY Channel"));
    assert_eq!(session.result.as_ref().map(ResultSet::len), Some(2));
    assert_eq!(session.suggestions, vec!["Which month sold most online?"]);
    Ok(())
}

#[tokio::test]
async fn test_controllers_share_formatted_schema_through_cache() -> Result<()> {
    setup_tracing();
    let storage = scripted_storage();
    let names = vec!["sales".to_string()];
    let cache = PromptCache::new();
    assert!(cache.is_empty().await);

    let introspected = ConversationController::builder()
        .generation_provider(Box::new(MockAiProvider::new()))
        .storage(Box::new(storage.clone()))
        .schema_names(names.clone())
        .prompt_cache(cache.clone())
        .build()
        .await?;

    // A ready-made schema with the same content is formatted only once.
    let preloaded = ConversationController::builder()
        .generation_provider(Box::new(MockAiProvider::new()))
        .storage(Box::new(storage.clone()))
        .schema(load_schema(&storage, &names).await)
        .prompt_cache(cache.clone())
        .build()
        .await?;

    assert_eq!(cache.len().await, 1);
    assert_eq!(introspected.formatted_schema(), preloaded.formatted_schema());
    assert_eq!(introspected.system_prompt(), preloaded.system_prompt());
    Ok(())
}
