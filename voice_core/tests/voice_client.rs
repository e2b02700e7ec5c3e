//! Voice client against a mocked DashScope HTTP API.

use std::time::Duration;

use serde_json::json;
use voice_core::{CreatedVoice, VoiceClient, VoiceError};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CUSTOMIZATION: &str = "/api/v1/services/audio/tts/customization";
const GENERATION: &str = "/api/v1/services/aigc/multimodal-generation/generation";

fn client(server: &MockServer) -> VoiceClient {
    VoiceClient::new("sk-test", format!("{}/api/v1", server.uri()))
}

#[tokio::test]
async fn test_create_voice_sends_data_uri() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CUSTOMIZATION))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "qwen-voice-enrollment",
            "input": {
                "action": "create",
                "target_model": "qwen3-tts-vc-realtime-2026-01-15",
                "preferred_name": "narrator",
                "audio": {"data": "data:audio/mpeg;base64,AQID"}
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "output": {"voice": "qwen-tts-vc-narrator-001", "target_model": "qwen3-tts-vc-realtime-2026-01-15"},
            "request_id": "req-1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let created = client(&server)
        .create_voice(&[1, 2, 3], "audio/mpeg", "qwen3-tts-vc-realtime-2026-01-15", "narrator")
        .await
        .unwrap();

    assert_eq!(
        created,
        CreatedVoice {
            voice: "qwen-tts-vc-narrator-001".to_string(),
            target_model: "qwen3-tts-vc-realtime-2026-01-15".to_string(),
        }
    );
}

#[tokio::test]
async fn test_create_voice_falls_back_to_requested_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CUSTOMIZATION))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"output": {"voice": "v-1"}})))
        .mount(&server)
        .await;

    let created = client(&server)
        .create_voice(b"RIFF", "audio/wav", "my-model", "custom_voice")
        .await
        .unwrap();

    assert_eq!(created.target_model, "my-model");
}

#[tokio::test]
async fn test_create_voice_api_error_keeps_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CUSTOMIZATION))
        .respond_with(ResponseTemplate::new(400).set_body_string("{\"message\":\"audio too short\"}"))
        .mount(&server)
        .await;

    let err = client(&server)
        .create_voice(b"x", "audio/wav", "m", "n")
        .await
        .unwrap_err();

    match err {
        VoiceError::Api { status, body } => {
            assert_eq!(status, 400);
            assert_eq!(body, "{\"message\":\"audio too short\"}");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_list_voices() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CUSTOMIZATION))
        .and(body_partial_json(json!({"input": {"action": "list", "page_index": 2, "page_size": 5}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "output": {"voice_list": [
                {"voice": "v-1", "target_model": "m", "gmt_create": "2026-01-20 10:00:00"},
                {"voice": "v-2", "target_model": "m", "gmt_create": "2026-01-21 10:00:00"}
            ]}
        })))
        .mount(&server)
        .await;

    let voices = client(&server).list_voices(2, 5).await.unwrap();

    assert_eq!(voices.len(), 2);
    assert_eq!(voices[0]["voice"], "v-1");
    assert_eq!(voices[1]["gmt_create"], "2026-01-21 10:00:00");
}

#[tokio::test]
async fn test_list_voices_without_output_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CUSTOMIZATION))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"request_id": "r"})))
        .mount(&server)
        .await;

    assert!(client(&server).list_voices(0, 20).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_voice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CUSTOMIZATION))
        .and(body_partial_json(json!({"input": {"action": "delete", "voice": "v-1"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"request_id": "r"})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).delete_voice("v-1").await.unwrap();
}

#[tokio::test]
async fn test_delete_voice_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CUSTOMIZATION))
        .respond_with(ResponseTemplate::new(404).set_body_string("voice not found"))
        .mount(&server)
        .await;

    let err = client(&server).delete_voice("missing").await.unwrap_err();
    assert_eq!(err.to_string(), "API error 404: voice not found");
}

#[tokio::test]
async fn test_synthesize_downloads_audio() {
    let server = MockServer::start().await;
    let audio_url = format!("{}/files/out.wav", server.uri());

    Mock::given(method("POST"))
        .and(path(GENERATION))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "qwen3-tts-vc-2026-01-22",
            "input": {"text": "你好", "voice": "v-1"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "output": {"audio": {"url": audio_url}}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/out.wav"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"RIFF....WAVE".to_vec()))
        .mount(&server)
        .await;

    let audio = client(&server)
        .synthesize("qwen3-tts-vc-2026-01-22", "v-1", "你好")
        .await
        .unwrap();

    assert_eq!(audio, b"RIFF....WAVE");
}

#[tokio::test]
async fn test_synthesize_without_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATION))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"output": {"audio": {"url": ""}}})))
        .mount(&server)
        .await;

    let err = client(&server).synthesize("m", "v", "text").await.unwrap_err();
    assert!(matches!(err, VoiceError::MissingAudioUrl));
}

#[tokio::test]
async fn test_synthesize_download_failure() {
    let server = MockServer::start().await;
    let audio_url = format!("{}/files/gone.wav", server.uri());
    Mock::given(method("POST"))
        .and(path(GENERATION))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"output": {"audio": {"url": audio_url}}})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/gone.wav"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = client(&server).synthesize("m", "v", "text").await.unwrap_err();
    assert!(matches!(err, VoiceError::Download(403)));
}

#[tokio::test]
async fn test_synthesize_generation_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATION))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"output": {"audio": {"url": "http://unused"}}}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .with_generation_timeout(Duration::from_millis(100))
        .synthesize("m", "v", "text")
        .await
        .unwrap_err();

    match err {
        VoiceError::Http(e) => assert!(e.is_timeout(), "expected timeout, got {e}"),
        other => panic!("unexpected error: {other:?}"),
    }
}
