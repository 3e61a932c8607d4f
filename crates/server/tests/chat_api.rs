//! End-to-end tests of the chat API with mocked library managers.
//!
//! These tests run the full router in-process with mock implementations of
//! Sonarr, Radarr and the speech service.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;
use tokio_test::assert_ok;

use mediarequest_core::testing::BackendOperation;

use common::{fixtures, TestConfig, TestFixture};

// =============================================================================
// Basic API Tests
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/health").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
    assert_eq!(response.body["voice_enabled"], false);
}

#[tokio::test]
async fn test_config_endpoint_hides_api_keys() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/config").await;
    assert_status!(response, StatusCode::OK);

    let body = response.body.to_string();
    assert!(!body.contains("sonarr-test-key"));
    assert!(!body.contains("radarr-test-key"));
    assert_eq!(response.body["sonarr"]["api_key_configured"], true);
    assert_eq!(response.body["radarr"]["quality_profile_id"], 4);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new().await;
    fixture.say(1, "/help").await;

    let (status, text) = fixture.get_text("/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("mediarequest_chat_replies_total"));
    assert!(text.contains("mediarequest_active_sessions"));
}

// =============================================================================
// Conversation Tests
// =============================================================================

#[tokio::test]
async fn test_full_series_request() {
    let fixture = TestFixture::new().await;
    fixture
        .sonarr
        .set_results(vec![
            fixtures::series("The Office (US)", 2005, 73244),
            fixtures::series("The Office", 2001, 78107),
        ])
        .await;

    let response = fixture.say(100, "show The Office").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["chat_id"], 100);
    assert_eq!(response.body["reply_kind"], "candidates");
    assert_eq!(response.body["state"], "awaiting_selection");
    let reply = response.body["reply"].as_str().unwrap();
    assert!(reply.contains("1. The Office (2001)"));
    assert!(reply.contains("2. The Office (US) (2005)"));

    let response = fixture.say(100, "2").await;
    assert_eq!(response.body["reply_kind"], "confirm_prompt");
    assert_eq!(response.body["state"], "awaiting_confirmation");

    let response = fixture.say(100, "yes").await;
    assert_eq!(response.body["reply_kind"], "added");
    assert_eq!(response.body["state"], "idle");

    let adds = fixture.sonarr.add_requests().await;
    assert_eq!(adds.len(), 1);
    assert_eq!(adds[0].candidate.external_id, 73244);
    assert_eq!(adds[0].root_folder, "/tv");
    assert_eq!(fixture.radarr.call_count().await, 0);
}

#[tokio::test]
async fn test_ambiguous_title_prompts_for_kind() {
    let fixture = TestFixture::new().await;
    fixture
        .radarr
        .set_results(vec![fixtures::movie("Fargo", 1996, 275)])
        .await;

    let response = fixture.say(101, "Fargo").await;
    assert_eq!(response.body["reply_kind"], "kind_prompt");
    assert_eq!(response.body["state"], "awaiting_kind");

    let response = fixture.say(101, "movie").await;
    assert_eq!(response.body["reply_kind"], "candidates");
    assert_eq!(fixture.sonarr.count(BackendOperation::Search).await, 0);
}

#[tokio::test]
async fn test_session_snapshot_and_cancel() {
    let fixture = TestFixture::new().await;
    fixture
        .radarr
        .set_results(vec![fixtures::movie("Heat", 1995, 949)])
        .await;

    let response = fixture.get("/api/v1/chats/102/session").await;
    assert_eq!(response.body["state"], "idle");
    assert!(response.body["session_id"].is_null());

    fixture.say(102, "/movie Heat").await;

    let response = fixture.get("/api/v1/chats/102/session").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["state"], "awaiting_selection");
    assert_eq!(response.body["query"]["title"], "Heat");
    assert_eq!(response.body["query"]["kind"], "movie");
    assert_eq!(response.body["candidates"][0]["external_id"], 949);
    assert!(response.body["session_id"].is_string());

    let response = fixture.delete("/api/v1/chats/102/session").await;
    assert_eq!(response.body["reply_kind"], "cancelled");
    assert_eq!(response.body["state"], "idle");

    let response = fixture.delete("/api/v1/chats/102/session").await;
    assert_eq!(response.body["reply_kind"], "nothing_to_cancel");
}

#[tokio::test]
async fn test_invalid_selection_keeps_list() {
    let fixture = TestFixture::new().await;
    fixture
        .radarr
        .set_results(vec![
            fixtures::movie("Heat", 1995, 949),
            fixtures::movie("Heat", 1986, 10000),
        ])
        .await;

    fixture.say(103, "movie Heat").await;
    let response = fixture.say(103, "7").await;
    assert_eq!(response.body["reply_kind"], "invalid_selection");
    assert_eq!(response.body["state"], "awaiting_selection");

    let session = fixture.get("/api/v1/chats/103/session").await;
    assert_eq!(session.body["candidates"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_backend_outage_surfaces_retry_hint() {
    let fixture = TestFixture::new().await;
    fixture
        .sonarr
        .set_results(vec![fixtures::series("Dark", 2017, 334824)])
        .await;

    fixture.say(104, "tv Dark").await;
    fixture.say(104, "1").await;
    fixture.sonarr.set_down(true).await;

    let response = fixture.say(104, "yes").await;
    assert_eq!(response.body["reply_kind"], "add_failed");
    assert_eq!(response.body["state"], "awaiting_confirmation");
    assert!(response.body["reply"].as_str().unwrap().contains("/retry"));

    fixture.sonarr.set_down(false).await;
    let response = fixture.say(104, "/retry").await;
    assert_eq!(response.body["reply_kind"], "added");
}

#[tokio::test]
async fn test_chats_are_isolated() {
    let fixture = TestFixture::new().await;
    fixture
        .radarr
        .set_results(vec![fixtures::movie("Heat", 1995, 949)])
        .await;
    fixture
        .sonarr
        .set_results(vec![fixtures::series("Dark", 2017, 334824)])
        .await;

    fixture.say(105, "movie Heat").await;
    fixture.say(106, "tv Dark").await;

    let response = fixture.say(105, "1").await;
    assert_eq!(response.body["reply_kind"], "confirm_prompt");
    assert!(response.body["reply"].as_str().unwrap().contains("Heat (1995)"));

    let other = fixture.get("/api/v1/chats/106/session").await;
    assert_eq!(other.body["state"], "awaiting_selection");
    assert_eq!(other.body["query"]["title"], "Dark");
}

#[tokio::test]
async fn test_expired_session_reply() {
    let fixture = TestFixture::with_config(TestConfig::with_idle_timeout(Duration::from_millis(50))).await;
    fixture
        .radarr
        .set_results(vec![fixtures::movie("Heat", 1995, 949)])
        .await;

    fixture.say(107, "movie Heat").await;
    tokio::time::sleep(Duration::from_millis(80)).await;

    let response = fixture.say(107, "1").await;
    assert_eq!(response.body["reply_kind"], "session_expired");
    assert_eq!(response.body["state"], "idle");
}

// =============================================================================
// Input Validation Tests
// =============================================================================

#[tokio::test]
async fn test_malformed_json_is_rejected() {
    let fixture = TestFixture::new().await;
    let response = fixture
        .post_raw("/api/v1/chats/1/messages", "{ not json")
        .await;
    assert!(response.status.is_client_error());
}

#[tokio::test]
async fn test_non_numeric_chat_id_is_rejected() {
    let fixture = TestFixture::new().await;
    let response = fixture
        .post("/api/v1/chats/abc/messages", json!({ "text": "hello" }))
        .await;
    assert_status!(response, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_oversized_message_is_rejected() {
    let fixture = TestFixture::new().await;
    let text = "a".repeat(5000);
    let response = fixture.say(1, &text).await;
    assert_status!(response, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(response.body["error"].is_string());
}

// =============================================================================
// Voice Tests
// =============================================================================

#[tokio::test]
async fn test_voice_disabled_is_a_chat_reply() {
    let fixture = TestFixture::new().await;
    let response = fixture
        .post_multipart(
            "/api/v1/chats/200/voice",
            &[("audio", Some("audio/ogg"), b"OggS fake audio")],
        )
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["reply_kind"], "voice_disabled");
}

#[tokio::test]
async fn test_voice_request_is_transcribed_and_handled() {
    let fixture = TestFixture::with_config(TestConfig::with_voice()).await;
    fixture
        .radarr
        .set_results(vec![fixtures::movie("Inception", 2010, 27205)])
        .await;
    fixture.transcriber.push_text("add the movie inception").await;

    let response = fixture
        .post_multipart(
            "/api/v1/chats/201/voice",
            &[
                ("audio", Some("application/octet-stream"), b"OggS fake audio"),
                ("mime", None, b"audio/ogg"),
            ],
        )
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["reply_kind"], "candidates");
    let reply = response.body["reply"].as_str().unwrap();
    assert!(reply.starts_with("I heard: \"add the movie inception\""));
    assert!(reply.contains("1. Inception (2010)"));
    assert_eq!(fixture.transcriber.call_count().await, 1);
}

#[tokio::test]
async fn test_failed_transcription_leaves_session() {
    let fixture = TestFixture::with_config(TestConfig::with_voice()).await;
    fixture
        .radarr
        .set_results(vec![fixtures::movie("Heat", 1995, 949)])
        .await;
    fixture.transcriber.push_error("speech service returned 500").await;

    fixture.say(202, "movie Heat").await;
    let response = fixture
        .post_multipart(
            "/api/v1/chats/202/voice",
            &[("audio", Some("audio/ogg"), b"OggS fake audio")],
        )
        .await;

    assert_eq!(response.body["reply_kind"], "transcription_failed");
    assert_eq!(response.body["state"], "awaiting_selection");
}

#[tokio::test]
async fn test_voice_without_audio_is_rejected() {
    let fixture = TestFixture::with_config(TestConfig::with_voice()).await;
    let response = fixture
        .post_multipart("/api/v1/chats/203/voice", &[("mime", None, b"audio/ogg")])
        .await;
    assert_status!(response, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_engine_is_shared_with_router() {
    let fixture = TestFixture::new().await;
    fixture
        .radarr
        .set_results(vec![fixtures::movie("Heat", 1995, 949)])
        .await;
    fixture.say(300, "movie Heat").await;

    let session = fixture.engine.session(mediarequest_core::ChatId(300)).await;
    let session = assert_ok!(session.ok_or("no session"));
    assert_eq!(session.candidates().len(), 1);
}
