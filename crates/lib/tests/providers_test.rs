//! # Provider Client Tests
//!
//! The HTTP clients for text generation and embeddings, against a mock server.

mod common;

use anyhow::Result;
use common::setup_tracing;
use excelqa::{
    errors::PromptError,
    providers::ai::{
        embedding::RetryPolicy, gemini::GeminiProvider, local::LocalAiProvider, AiProvider,
        EmbeddingProvider, HttpEmbeddingProvider,
    },
};
use httpmock::{Method, MockServer};
use serde_json::json;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        initial_backoff: Duration::from_millis(5),
    }
}

#[tokio::test]
async fn test_gemini_generate_sends_key_and_reads_first_candidate() -> Result<()> {
    setup_tracing();
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(Method::POST)
                .path("/v1beta/models/test:generateContent")
                .query_param("key", "secret")
                .body_contains("SYSTEM\\n\\nUSER");
            then.status(200).json_body(json!({
                "candidates": [{ "content": { "parts": [{ "text": "ANSWER: 42" }] } }]
            }));
        })
        .await;

    let provider = GeminiProvider::new(
        server.url("/v1beta/models/test:generateContent"),
        "secret".into(),
        TIMEOUT,
    )?;
    let reply = provider.generate("SYSTEM", "USER").await?;

    mock.assert_async().await;
    assert_eq!(reply, "ANSWER: 42");
    Ok(())
}

#[tokio::test]
async fn test_gemini_without_candidates_is_an_empty_response() -> Result<()> {
    setup_tracing();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(Method::POST).path("/generate");
            then.status(200).json_body(json!({ "candidates": [] }));
        })
        .await;

    let provider = GeminiProvider::new(server.url("/generate"), "k".into(), TIMEOUT)?;
    let result = provider.generate("s", "u").await;

    assert!(matches!(result, Err(PromptError::EmptyResponse)));
    Ok(())
}

#[tokio::test]
async fn test_local_provider_sends_chat_messages_with_bearer_auth() -> Result<()> {
    setup_tracing();
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(Method::POST)
                .path("/v1/chat/completions")
                .header("authorization", "Bearer token")
                .body_contains("\"role\":\"system\"")
                .body_contains("\"model\":\"llama\"");
            then.status(200).json_body(json!({
                "choices": [{ "message": { "role": "assistant", "content": "Paris." } }]
            }));
        })
        .await;

    let provider = LocalAiProvider::new(
        server.url("/v1/chat/completions"),
        Some("token".into()),
        Some("llama".into()),
        TIMEOUT,
    )?;
    let reply = provider.generate("be brief", "capital of France?").await?;

    mock.assert_async().await;
    assert_eq!(reply, "Paris.");
    Ok(())
}

#[tokio::test]
async fn test_local_provider_surfaces_api_errors() -> Result<()> {
    setup_tracing();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(Method::POST).path("/v1/chat/completions");
            then.status(503).body("model loading");
        })
        .await;

    let provider =
        LocalAiProvider::new(server.url("/v1/chat/completions"), None, None, TIMEOUT)?;
    let result = provider.generate("s", "u").await;

    match result {
        Err(PromptError::AiApi(message)) => assert!(message.contains("model loading")),
        other => panic!("expected an API error, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_embedding_reads_openai_shape() -> Result<()> {
    setup_tracing();
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(Method::POST)
                .path("/v1/embeddings")
                .json_body(json!({ "model": "embed-small", "input": "Name: Alice" }));
            then.status(200)
                .json_body(json!({ "data": [{ "embedding": [0.25, 0.5, 0.75] }] }));
        })
        .await;

    let provider = HttpEmbeddingProvider::new(
        server.url("/v1/embeddings"),
        "embed-small".into(),
        None,
        TIMEOUT,
    )?
    .with_dimensions(Some(3));

    let vector = provider.embed("Name: Alice").await?;

    mock.assert_async().await;
    assert_eq!(vector, vec![0.25, 0.5, 0.75]);
    assert_eq!(provider.dimensions(), Some(3));
    Ok(())
}

#[tokio::test]
async fn test_embedding_retries_transient_failures() -> Result<()> {
    setup_tracing();
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(Method::POST).path("/v1/embeddings");
            then.status(500).body("overloaded");
        })
        .await;

    let provider =
        HttpEmbeddingProvider::new(server.url("/v1/embeddings"), "m".into(), None, TIMEOUT)?
            .with_retry(fast_retry(2));
    let result = provider.embed("row").await;

    assert!(matches!(result, Err(PromptError::AiApi(_))));
    assert_eq!(mock.hits_async().await, 3);
    Ok(())
}

#[tokio::test]
async fn test_embedding_does_not_retry_client_errors() -> Result<()> {
    setup_tracing();
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(Method::POST).path("/v1/embeddings");
            then.status(400).body("bad model");
        })
        .await;

    let provider =
        HttpEmbeddingProvider::new(server.url("/v1/embeddings"), "m".into(), None, TIMEOUT)?
            .with_retry(fast_retry(3));
    let result = provider.embed("row").await;

    assert!(matches!(result, Err(PromptError::AiApi(_))));
    assert_eq!(mock.hits_async().await, 1);
    Ok(())
}
