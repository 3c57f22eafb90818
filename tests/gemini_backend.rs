//! Gemini API backend tests against a mock server

mod common;

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::png_image;
use gemma_chat::config::GeminiConfig;
use gemma_chat::error::GemmaChatError;
use gemma_chat::providers::{GeminiProvider, ModelCapability, Provider};
use gemma_chat::session::{ConversationSession, Modality, SessionOptions};

const GENERATE_PATH: &str = "/v1beta/models/gemma-3-27b-it:generateContent";

fn provider_for(server: &MockServer) -> GeminiProvider {
    GeminiProvider::new(GeminiConfig {
        api_base: server.uri(),
        api_key: Some("test-key".to_string()),
        ..GeminiConfig::default()
    })
    .unwrap()
}

fn reply_body(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }],
        "usageMetadata": { "promptTokenCount": 12, "candidatesTokenCount": 9 }
    })
}

#[tokio::test]
async fn test_generate_content_carries_history_and_key() {
    let server = MockServer::start().await;

    // Arrays match by prefix, so the longer history is mounted first
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(body_partial_json(json!({
            "contents": [
                { "role": "user", "parts": [{ "text": "Tell me about Paris." }] },
                { "role": "model", "parts": [{ "text": "Paris is the capital of France." }] },
                { "role": "user", "parts": [{ "text": "What attractions?" }] }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply_body("The Louvre.")))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "contents": [
                { "role": "user", "parts": [{ "text": "Tell me about Paris." }] }
            ],
            "generationConfig": { "temperature": 0.0, "topK": 1 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply_body(
            "Paris is the capital of France.",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let session =
        ConversationSession::new(Arc::new(provider_for(&server)), SessionOptions::default())
            .unwrap();
    assert_eq!(
        session
            .send_message("Tell me about Paris.", Vec::new())
            .await
            .unwrap(),
        "Paris is the capital of France."
    );
    assert_eq!(
        session
            .send_message("What attractions?", Vec::new())
            .await
            .unwrap(),
        "The Louvre."
    );
}

#[tokio::test]
async fn test_image_is_sent_as_inline_data_before_text() {
    let server = MockServer::start().await;
    let image = png_image();

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(body_partial_json(json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "inline_data": { "mime_type": "image/png", "data": image.to_base64() } },
                    { "text": "What is this?" }
                ]
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply_body("A pixel.")))
        .expect(1)
        .mount(&server)
        .await;

    let options = SessionOptions {
        modality: Modality::Multimodal,
        ..SessionOptions::default()
    };
    let session = ConversationSession::new(Arc::new(provider_for(&server)), options).unwrap();
    let reply = session
        .send_message("What is this?", vec![image])
        .await
        .unwrap();
    assert_eq!(reply, "A pixel.");
}

#[tokio::test]
async fn test_missing_candidates_is_generation_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        })))
        .mount(&server)
        .await;

    let session =
        ConversationSession::new(Arc::new(provider_for(&server)), SessionOptions::default())
            .unwrap();
    let err = session.send_message("Hello", Vec::new()).await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<GemmaChatError>(),
        Some(GemmaChatError::Generation { .. })
    ));
    assert!(format!("{:#}", err).contains("no candidates"));
    assert_eq!(session.history().len(), 1);
}

#[tokio::test]
async fn test_blocked_candidate_records_no_model_turn() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "finishReason": "SAFETY" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session =
        ConversationSession::new(Arc::new(provider_for(&server)), SessionOptions::default())
            .unwrap();
    let err = session.send_message("hello", Vec::new()).await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<GemmaChatError>(),
        Some(GemmaChatError::Generation { .. })
    ));
    assert!(format!("{:#}", err).contains("SAFETY"));
    let history = session.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history.turns()[0].text(), "hello");
}

#[tokio::test]
async fn test_quota_error_is_generation_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_string("RESOURCE_EXHAUSTED"))
        .mount(&server)
        .await;

    let session =
        ConversationSession::new(Arc::new(provider_for(&server)), SessionOptions::default())
            .unwrap();
    let err = session.send_message("Hello", Vec::new()).await.unwrap_err();
    assert!(format!("{:#}", err).contains("429"));
}

#[tokio::test]
async fn test_list_models_follows_page_tokens() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1beta/models"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{
                "name": "models/gemma-3-1b-it",
                "displayName": "Gemma 3 1B",
                "inputTokenLimit": 32768,
                "supportedGenerationMethods": ["generateContent"]
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1beta/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{
                "name": "models/gemma-3-27b-it",
                "displayName": "Gemma 3 27B",
                "inputTokenLimit": 131072,
                "supportedGenerationMethods": ["generateContent", "countTokens"]
            }],
            "nextPageToken": "page-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let models = provider_for(&server).list_models().await.unwrap();
    assert_eq!(models.len(), 2);
    assert_eq!(models[0].name, "gemma-3-27b-it");
    assert!(models[0].supports_capability(ModelCapability::Vision));
    assert!(models[0].supports_capability(ModelCapability::LongContext));
    assert_eq!(models[1].name, "gemma-3-1b-it");
    assert!(!models[1].supports_capability(ModelCapability::Vision));
}

#[test]
fn test_missing_api_key_is_rejected() {
    let err = GeminiProvider::new(GeminiConfig {
        api_key: Some("   ".to_string()),
        ..GeminiConfig::default()
    })
    .err()
    .unwrap();
    assert!(matches!(
        err.downcast_ref::<GemmaChatError>(),
        Some(GemmaChatError::MissingCredentials(_))
    ));
}
