#![allow(dead_code)]
//! # Common Test Utilities
//!
//! Shared setup for the integration tests: tracing initialization and a
//! controller wired to the seeded sales database and a mock completion service.

use salesbot::ConversationController;
use salesbot_test_utils::{MockAiProvider, TestSetup};
use dotenvy::dotenv;
use std::sync::Once;

static INIT: Once = Once::new();

/// Initializes the tracing subscriber and loads .env for tests.
pub fn setup_tracing() {
    INIT.call_once(|| {
        dotenv().ok();
        tracing_subscriber::fmt::init();
    });
}

/// The calendar year the validator is pinned to in tests.
pub const TEST_YEAR: i32 = 2025;

/// Builds a controller over the seeded sales database.
pub async fn sales_controller(ai: &MockAiProvider) -> anyhow::Result<ConversationController> {
    let setup = TestSetup::new().await?;
    let controller = ConversationController::builder()
        .generation_provider(Box::new(ai.clone()))
        .storage(Box::new(setup.provider))
        .current_year(TEST_YEAR)
        .build()
        .await?;
    Ok(controller)
}
