//! Unit and mock HTTP tests for ReplicateClient.
//!
//! These tests cover:
//! - Client creation and configuration
//! - Prediction request formatting (versioned vs model-scoped)
//! - Status polling and output decoding
//! - Token verification
//! - Error mapping

use std::time::Duration;

use prompt_motion::error::PipelineError;
use prompt_motion::replicate::{
    ReplicateClient, DEFAULT_IMAGE_MODEL, DEFAULT_VIDEO_MODEL, REPLICATE_API_BASE_URL,
};

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// === Client Creation Tests ===

#[test]
fn test_with_token_creates_client_with_defaults() {
    let client = ReplicateClient::with_token("test-token").unwrap();
    assert_eq!(client.base_url(), REPLICATE_API_BASE_URL);
    assert_eq!(client.image_model(), DEFAULT_IMAGE_MODEL);
    assert_eq!(client.video_model(), DEFAULT_VIDEO_MODEL);
}

#[test]
fn test_empty_token_is_rejected() {
    assert!(matches!(
        ReplicateClient::with_token(""),
        Err(PipelineError::NotConfigured)
    ));
}

#[test]
fn test_token_is_trimmed() {
    // A token that is all whitespace trims down to empty and is rejected.
    assert!(matches!(
        ReplicateClient::with_token(" \t\n"),
        Err(PipelineError::NotConfigured)
    ));
}

// === Prediction Create Tests ===

#[tokio::test]
async fn test_create_prediction_sends_token_header() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/predictions"))
        .and(header("Authorization", "Token test-token"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({"id": "pred-1", "status": "starting"})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = ReplicateClient::with_base_url("test-token", mock_server.uri()).unwrap();
    let prediction = client
        .create_prediction(DEFAULT_IMAGE_MODEL, json!({"prompt": "a cat"}))
        .await
        .unwrap();

    assert_eq!(prediction.id, "pred-1");
    assert_eq!(prediction.status, "starting");
}

#[tokio::test]
async fn test_versioned_model_uses_predictions_endpoint_with_version() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/predictions"))
        .and(body_partial_json(json!({
            "version": "2b017d9b67edd2ee1401238df49d75da53c523f36e363881e057f5dc3ed3c5b2",
            "input": {"prompt": "a cat", "width": 768, "height": 768}
        })))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({"id": "pred-2", "status": "starting"})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = ReplicateClient::with_base_url("test-token", mock_server.uri()).unwrap();
    let result = client
        .create_prediction(
            DEFAULT_IMAGE_MODEL,
            json!({"prompt": "a cat", "width": 768, "height": 768}),
        )
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_unversioned_model_uses_model_scoped_endpoint() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/models/minimax/video-01-live/predictions"))
        .and(body_partial_json(json!({
            "input": {"prompt": "a cat", "first_frame_image": "https://img.example/a.png"}
        })))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({"id": "pred-3", "status": "starting"})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = ReplicateClient::with_base_url("test-token", mock_server.uri()).unwrap();
    let result = client
        .create_prediction(
            DEFAULT_VIDEO_MODEL,
            json!({"prompt": "a cat", "first_frame_image": "https://img.example/a.png"}),
        )
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_create_prediction_api_error_is_upstream() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/predictions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&mock_server)
        .await;

    let client = ReplicateClient::with_base_url("test-token", mock_server.uri()).unwrap();
    let result = client
        .create_prediction(DEFAULT_IMAGE_MODEL, json!({"prompt": "a cat"}))
        .await;

    match result {
        Err(PipelineError::Upstream(message)) => {
            assert!(message.contains("500"));
        }
        other => panic!("expected Upstream error, got {:?}", other.map(|p| p.id)),
    }
}

#[tokio::test]
async fn test_create_prediction_auth_error_is_upstream() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/predictions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&mock_server)
        .await;

    let client = ReplicateClient::with_base_url("bad-token", mock_server.uri()).unwrap();
    let result = client
        .create_prediction(DEFAULT_IMAGE_MODEL, json!({"prompt": "a cat"}))
        .await;

    assert!(matches!(result, Err(PipelineError::Upstream(_))));
}

#[tokio::test]
async fn test_connection_refused_is_upstream() {
    let client = ReplicateClient::with_base_url("test-token", "http://localhost:9").unwrap();
    let result = client
        .create_prediction(DEFAULT_IMAGE_MODEL, json!({"prompt": "a cat"}))
        .await;

    assert!(matches!(result, Err(PipelineError::Upstream(_))));
}

// === Polling Tests ===

#[tokio::test]
async fn test_run_polls_until_succeeded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/predictions"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({"id": "pred-4", "status": "starting"})),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/predictions/pred-4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "pred-4",
            "status": "succeeded",
            "output": ["https://img.example/a.png"]
        })))
        .mount(&mock_server)
        .await;

    let client = ReplicateClient::with_base_url("test-token", mock_server.uri()).unwrap();
    let urls = client
        .run(DEFAULT_IMAGE_MODEL, json!({"prompt": "a cat"}))
        .await
        .unwrap();

    assert_eq!(urls, vec!["https://img.example/a.png".to_string()]);
}

#[tokio::test]
async fn test_run_with_synchronously_completed_prediction_skips_polling() {
    let mock_server = MockServer::start().await;

    // No GET mock mounted: run() must not poll when the create response is
    // already terminal.
    Mock::given(method("POST"))
        .and(path("/v1/predictions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "pred-5",
            "status": "succeeded",
            "output": ["https://img.example/b.png"]
        })))
        .mount(&mock_server)
        .await;

    let client = ReplicateClient::with_base_url("test-token", mock_server.uri()).unwrap();
    let urls = client
        .run(DEFAULT_IMAGE_MODEL, json!({"prompt": "a cat"}))
        .await
        .unwrap();

    assert_eq!(urls, vec!["https://img.example/b.png".to_string()]);
}

#[tokio::test]
async fn test_failed_prediction_is_generation_failed_with_provider_message() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/predictions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "pred-6",
            "status": "failed",
            "error": "prompt flagged by moderation"
        })))
        .mount(&mock_server)
        .await;

    let client = ReplicateClient::with_base_url("test-token", mock_server.uri()).unwrap();
    let result = client
        .run(DEFAULT_IMAGE_MODEL, json!({"prompt": "a cat"}))
        .await;

    match result {
        Err(PipelineError::GenerationFailed(message)) => {
            assert_eq!(message, "prompt flagged by moderation");
        }
        other => panic!("expected GenerationFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_generation_timeout_maps_to_upstream() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/predictions"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({"id": "pred-7", "status": "starting"})),
        )
        .mount(&mock_server)
        .await;

    // The prediction never leaves processing.
    Mock::given(method("GET"))
        .and(path("/v1/predictions/pred-7"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": "pred-7", "status": "processing"})),
        )
        .mount(&mock_server)
        .await;

    let mut client = ReplicateClient::with_base_url("test-token", mock_server.uri()).unwrap();
    client.set_generation_timeout(Duration::from_millis(10));

    let result = client
        .run(DEFAULT_IMAGE_MODEL, json!({"prompt": "a cat"}))
        .await;

    match result {
        Err(PipelineError::Upstream(message)) => {
            assert!(message.contains("timed out"), "message: {}", message);
        }
        other => panic!("expected Upstream timeout, got {:?}", other),
    }
}

// === Token Verification Tests ===

#[tokio::test]
async fn test_verify_token_accepts_valid_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/account"))
        .and(header("Authorization", "Token good-token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"type": "user", "username": "tester"})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = ReplicateClient::with_base_url("good-token", mock_server.uri()).unwrap();
    assert!(client.verify_token().await.unwrap());
}

#[tokio::test]
async fn test_verify_token_rejected_token_is_ok_false() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/account"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthenticated"))
        .mount(&mock_server)
        .await;

    let client = ReplicateClient::with_base_url("bad-token", mock_server.uri()).unwrap();
    assert!(!client.verify_token().await.unwrap());
}

#[tokio::test]
async fn test_verify_token_server_error_is_upstream() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/account"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&mock_server)
        .await;

    let client = ReplicateClient::with_base_url("test-token", mock_server.uri()).unwrap();
    assert!(matches!(
        client.verify_token().await,
        Err(PipelineError::Upstream(_))
    ));
}
