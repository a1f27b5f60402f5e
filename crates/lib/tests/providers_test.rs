//! # Completion Provider Tests
//!
//! Checks the wire format of the Gemini and OpenAI-compatible providers against
//! a mock HTTP server.

mod common;

use anyhow::Result;
use common::setup_tracing;
use salesbot::providers::ai::{gemini::GeminiProvider, local::LocalAiProvider, AiProvider};
use salesbot::types::{ChatMessage, ChatRole, SamplingParams};
use salesbot::{ErrorKind, PromptError};
use serde_json::{json, Value};
use wiremock::{
    matchers::{body_partial_json, header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

fn history() -> Vec<ChatMessage> {
    vec![
        ChatMessage {
            role: ChatRole::User,
            content: "sales 2024".to_string(),
        },
        ChatMessage {
            role: ChatRole::Model,
            content: "Sums 2024 sales.".to_string(),
        },
    ]
}

#[tokio::test]
async fn test_gemini_chat_sends_history_and_joins_parts() -> Result<()> {
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/test-model:generateContent"))
        .and(query_param("key", "test-key"))
        .and(body_partial_json(json!({
            "systemInstruction": { "parts": [{ "text": "You write SQL." }] },
            "contents": [
                { "role": "user", "parts": [{ "text": "sales 2024" }] },
                { "role": "model", "parts": [{ "text": "Sums 2024 sales." }] },
                { "role": "user", "parts": [{ "text": "how about 2023" }] }
            ],
            "generationConfig": { "topK": 40 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Same for 2023.\n" }, { "text": "```sql\nSELECT 1\n```" }] }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = GeminiProvider::new(
        format!("{}/v1beta/models/test-model:generateContent", server.uri()),
        "test-key".to_string(),
    )?;
    let reply = provider
        .chat(
            "You write SQL.",
            &history(),
            "how about 2023",
            &SamplingParams::GENERATION,
        )
        .await?;

    assert_eq!(reply, "Same for 2023.\n```sql\nSELECT 1\n```");
    Ok(())
}

#[tokio::test]
async fn test_gemini_complete_omits_system_instruction() -> Result<()> {
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "[\"Next?\"]" }] } }]
        })))
        .mount(&server)
        .await;

    let provider = GeminiProvider::new(server.uri(), "test-key".to_string())?;
    let reply = provider
        .complete("Suggest follow-ups", &SamplingParams::SUGGESTION)
        .await?;
    assert_eq!(reply, "[\"Next?\"]");

    let requests = server.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 1);
    let body: Value = serde_json::from_slice(&requests[0].body)?;
    assert!(body.get("systemInstruction").is_none());
    assert_eq!(body["contents"].as_array().map(Vec::len), Some(1));
    assert!(body["generationConfig"].get("topK").is_none());
    Ok(())
}

#[tokio::test]
async fn test_gemini_error_status_is_a_connection_error() -> Result<()> {
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
        .mount(&server)
        .await;

    let provider = GeminiProvider::new(server.uri(), "test-key".to_string())?;
    let err = provider
        .complete("anything", &SamplingParams::SUGGESTION)
        .await
        .unwrap_err();

    assert!(matches!(&err, PromptError::AiApi(body) if body == "quota exceeded"));
    assert_eq!(err.kind(), ErrorKind::Connection);
    Ok(())
}

#[tokio::test]
async fn test_local_chat_uses_openai_messages() -> Result<()> {
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer local-key"))
        .and(body_partial_json(json!({
            "model": "sql-coder",
            "messages": [
                { "role": "system", "content": "You write SQL." },
                { "role": "user", "content": "sales 2024" },
                { "role": "assistant", "content": "Sums 2024 sales." },
                { "role": "user", "content": "how about 2023" }
            ],
            "top_k": 40,
            "stream": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "SELECT 1" } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = LocalAiProvider::new(
        format!("{}/v1/chat/completions", server.uri()),
        Some("local-key".to_string()),
        Some("sql-coder".to_string()),
    )?;
    let reply = provider
        .chat(
            "You write SQL.",
            &history(),
            "how about 2023",
            &SamplingParams::GENERATION,
        )
        .await?;

    assert_eq!(reply, "SELECT 1");
    Ok(())
}

#[tokio::test]
async fn test_local_malformed_body_is_a_generation_error() -> Result<()> {
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let provider = LocalAiProvider::new(server.uri(), None, None)?;
    let err = provider
        .complete("anything", &SamplingParams::SUGGESTION)
        .await
        .unwrap_err();

    assert!(matches!(err, PromptError::AiDeserialization(_)));
    assert_eq!(err.kind(), ErrorKind::Generation);
    Ok(())
}
