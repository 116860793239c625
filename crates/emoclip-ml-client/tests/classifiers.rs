//! HTTP-level tests for both classifier backends.

use std::time::Duration;

use serde_json::json;
use serial_test::serial;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use emoclip_ml_client::{
    classifier_from_env, FrameClassifier, GatewayClassifier, GatewayConfig, MlClient,
    MlClientConfig, MlError,
};
use emoclip_models::{Detection, Emotion, FrameImage};

fn ml_client(server: &MockServer, max_retries: u32) -> MlClient {
    MlClient::new(MlClientConfig {
        base_url: server.uri(),
        timeout: Duration::from_secs(5),
        max_retries,
    })
    .unwrap()
}

fn gateway(server: &MockServer) -> GatewayClassifier {
    GatewayClassifier::new(GatewayConfig {
        url: format!("{}/v1/chat/completions", server.uri()),
        api_key: Some("test-key".to_string()),
        timeout: Duration::from_secs(5),
        ..Default::default()
    })
    .unwrap()
}

fn frame() -> FrameImage {
    FrameImage::jpeg(vec![0xFF, 0xD8, 0xFF])
}

fn chat_reply(content: &str) -> serde_json::Value {
    json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] })
}

#[tokio::test]
async fn ml_service_returns_requested_detections() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/detect-emotions"))
        .and(body_partial_json(json!({
            "image_base64": "/9j/",
            "target_emotions": ["joy", "anger"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "emotions": [
                { "emotion": "joy", "confidence": 0.81 },
                { "emotion": "anger", "confidence": 0.04 }
            ],
            "faces_detected": 1
        })))
        .expect(1)
        .mount(&server)
        .await;

    let detections = ml_client(&server, 0)
        .classify(&frame(), &[Emotion::Joy, Emotion::Anger])
        .await
        .unwrap();

    assert_eq!(
        detections,
        vec![
            Detection::new(Emotion::Joy, 0.81),
            Detection::new(Emotion::Anger, 0.04)
        ]
    );
}

#[tokio::test]
async fn ml_service_retries_when_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/detect-emotions"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/detect-emotions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "emotions": [], "faces_detected": 0 })),
        )
        .mount(&server)
        .await;

    let detections = ml_client(&server, 1)
        .classify(&frame(), &[Emotion::Fear])
        .await
        .unwrap();
    assert!(detections.is_empty());
}

#[tokio::test]
async fn ml_service_malformed_payload_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/detect-emotions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = ml_client(&server, 0)
        .classify(&frame(), &[Emotion::Joy])
        .await
        .unwrap_err();
    assert!(matches!(err, MlError::InvalidResponse(_)));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn ml_service_server_error_is_per_frame() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/detect-emotions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
        .mount(&server)
        .await;

    let err = ml_client(&server, 0)
        .classify(&frame(), &[Emotion::Joy])
        .await
        .unwrap_err();
    assert!(matches!(err, MlError::RequestFailed(_)));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn ml_service_health() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "healthy",
            "backend": "DeepFace",
            "supported_emotions": ["anger", "disgust", "fear", "joy", "sadness", "surprise", "neutral"]
        })))
        .mount(&server)
        .await;

    assert!(ml_client(&server, 0).health_check().await.unwrap());
}

#[tokio::test]
async fn ml_service_health_unreachable_is_false() {
    let client = MlClient::new(MlClientConfig {
        base_url: "http://127.0.0.1:9".to_string(),
        timeout: Duration::from_secs(1),
        max_retries: 0,
    })
    .unwrap();
    assert!(!client.health_check().await.unwrap());
}

#[tokio::test]
async fn gateway_reports_detected_emotion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply(
            "```json\n{\"emotion\": \"surprise\", \"confidence\": 0.77, \"detected\": true}\n```",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let detections = gateway(&server)
        .classify(&frame(), &[Emotion::Surprise, Emotion::Joy])
        .await
        .unwrap();
    assert_eq!(detections, vec![Detection::new(Emotion::Surprise, 0.77)]);
}

#[tokio::test]
async fn gateway_unparseable_reply_detects_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply("No face here.")))
        .mount(&server)
        .await;

    let detections = gateway(&server)
        .classify(&frame(), &[Emotion::Neutral])
        .await
        .unwrap();
    assert!(detections.is_empty());
}

#[tokio::test]
async fn gateway_percent_confidence_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply(
            "{\"emotion\": \"joy\", \"confidence\": 85, \"detected\": true}",
        )))
        .mount(&server)
        .await;

    let err = gateway(&server)
        .classify(&frame(), &[Emotion::Joy])
        .await
        .unwrap_err();
    assert!(matches!(err, MlError::InvalidResponse(_)));
}

#[tokio::test]
async fn gateway_maps_limit_statuses() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(402))
        .mount(&server)
        .await;

    let classifier = gateway(&server);
    let first = classifier.classify(&frame(), &[Emotion::Joy]).await.unwrap_err();
    assert!(matches!(first, MlError::RateLimited));
    let second = classifier.classify(&frame(), &[Emotion::Joy]).await.unwrap_err();
    assert!(matches!(second, MlError::QuotaExceeded));
    assert!(!second.is_fatal());
}

#[tokio::test]
async fn gateway_rejected_key_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = gateway(&server)
        .classify(&frame(), &[Emotion::Joy])
        .await
        .unwrap_err();
    assert!(matches!(err, MlError::Unauthorized(_)));
    assert!(err.is_fatal());
}

#[test]
#[serial]
fn backend_selection_from_env() {
    std::env::set_var("CLASSIFIER_BACKEND", "gateway");
    std::env::remove_var("GATEWAY_API_KEY");
    assert!(matches!(
        classifier_from_env().map(|_| ()),
        Err(MlError::MissingCredentials(_))
    ));

    std::env::set_var("GATEWAY_API_KEY", "k");
    assert_eq!(classifier_from_env().unwrap().name(), "gateway");

    std::env::set_var("CLASSIFIER_BACKEND", "ml_service");
    assert_eq!(classifier_from_env().unwrap().name(), "ml_service");

    std::env::remove_var("CLASSIFIER_BACKEND");
    std::env::remove_var("GATEWAY_API_KEY");
}
