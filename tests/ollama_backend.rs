//! Ollama backend tests against a mock server

mod common;

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::png_image;
use gemma_chat::config::OllamaConfig;
use gemma_chat::error::GemmaChatError;
use gemma_chat::providers::{ModelCapability, OllamaProvider, Provider};
use gemma_chat::session::{ConversationSession, Modality, SessionOptions};
use gemma_chat::SamplingPolicy;

fn provider_for(server: &MockServer) -> OllamaProvider {
    OllamaProvider::new(OllamaConfig {
        host: server.uri(),
        num_gpu: Some(1),
        ..OllamaConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_generate_sends_raw_prompt_with_greedy_options() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({
            "model": "gemma3:4b",
            "prompt": "<start_of_turn>user\nTell me about Paris.<end_of_turn>\n<start_of_turn>model\n",
            "raw": true,
            "stream": false,
            "options": { "temperature": 0.0, "top_k": 1, "num_gpu": 1 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "gemma3:4b",
            "response": "Paris is the capital of France.<end_of_turn>",
            "done": true,
            "prompt_eval_count": 14,
            "eval_count": 8
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session =
        ConversationSession::new(Arc::new(provider_for(&server)), SessionOptions::default())
            .unwrap();
    let reply = session
        .send_message("Tell me about Paris.", Vec::new())
        .await
        .unwrap();

    assert_eq!(reply, "Paris is the capital of France.");
    assert_eq!(session.history().len(), 2);
}

#[tokio::test]
async fn test_generate_forwards_images_and_temperature() {
    let server = MockServer::start().await;
    let image = png_image();

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({
            "images": [image.to_base64()],
            "options": { "temperature": 0.7 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "A tiny image.",
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let options = SessionOptions {
        modality: Modality::Multimodal,
        sampling: SamplingPolicy::Randomized { temperature: 0.7 },
        ..SessionOptions::default()
    };
    let session = ConversationSession::new(Arc::new(provider_for(&server)), options).unwrap();
    let reply = session
        .send_message("What is this?", vec![image])
        .await
        .unwrap();
    assert_eq!(reply, "A tiny image.");
}

#[tokio::test]
async fn test_server_error_becomes_generation_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
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
    assert!(format!("{:#}", err).contains("model not loaded"));
    assert_eq!(session.history().len(), 1);
}

#[tokio::test]
async fn test_list_models_is_cached() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                {
                    "name": "gemma3:4b",
                    "size": 3_338_801_804u64,
                    "modified_at": "2025-03-12T10:00:00Z",
                    "details": { "parameter_size": "4.3B", "quantization_level": "Q4_K_M" }
                },
                { "name": "gemma3:1b", "size": 815_319_791u64 }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for(&server);
    let models = provider.list_models().await.unwrap();
    assert_eq!(models.len(), 2);

    let vision = models.iter().find(|m| m.name == "gemma3:4b").unwrap();
    assert_eq!(vision.context_window, 131_072);
    assert!(vision.supports_capability(ModelCapability::Vision));

    let small = models.iter().find(|m| m.name == "gemma3:1b").unwrap();
    assert_eq!(small.context_window, 32_768);
    assert!(!small.supports_capability(ModelCapability::Vision));

    let again = provider.list_models().await.unwrap();
    assert_eq!(again.len(), 2);
}

#[tokio::test]
async fn test_unreachable_host_is_provider_error() {
    let provider = OllamaProvider::new(OllamaConfig {
        host: "http://127.0.0.1:9".to_string(),
        timeout_seconds: 2,
        ..OllamaConfig::default()
    })
    .unwrap();

    let err = provider.list_models().await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<GemmaChatError>(),
        Some(GemmaChatError::Provider(_))
    ));
}
