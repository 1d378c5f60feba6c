//! HTTP-level tests of the API routes with mock license validation.

use axum::http::StatusCode;
use axum_test::TestServer;
use gateway_core::SecurityEventType;
use integration_tests::fixtures::*;
use integration_tests::setup::TestContext;
use serde_json::json;

const LICENSE_KEY: &str = "LIC-test-0001";
const ADMIN_TOKEN: &str = "admin-secret-token";

fn server(ctx: &TestContext, admin_token: Option<&str>) -> TestServer {
    TestServer::new(ctx.router(admin_token)).expect("Failed to create test server")
}

// =============================================================================
// Licensing
// =============================================================================

#[tokio::test]
async fn test_transcript_with_body_license() {
    let ctx = TestContext::new();
    ctx.transport.respond_json(transcript_body("hello"));
    let server = server(&ctx, None);

    let response = server
        .post("/v1/transcript")
        .json(&json!({
            "video_id": "vid123",
            "lang": "it",
            "license_key": LICENSE_KEY,
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["transcript"], "hello");

    let records = ctx.audit.records();
    assert_eq!(records.len(), 1);
    let tenant = records[0].tenant_id.as_deref().unwrap();
    assert!(tenant.starts_with("lic-"));
}

#[tokio::test]
async fn test_license_from_headers() {
    let ctx = TestContext::new();
    ctx.transport
        .respond_json(transcript_body("one"))
        .respond_json(transcript_body("two"));
    let server = server(&ctx, None);

    server
        .post("/v1/transcript")
        .add_header("X-License-Key", LICENSE_KEY)
        .json(&json!({ "video_id": "vid1" }))
        .await
        .assert_status_ok();

    server
        .post("/v1/transcript")
        .add_header("Authorization", format!("Bearer {}", LICENSE_KEY))
        .json(&json!({ "video_id": "vid2" }))
        .await
        .assert_status_ok();

    // Same key, same tenant
    let records = ctx.audit.records();
    assert_eq!(records[0].tenant_id, records[1].tenant_id);
}

#[tokio::test]
async fn test_missing_license_is_unauthorized() {
    let ctx = TestContext::new();
    let server = server(&ctx, None);

    let response = server
        .post("/v1/transcript")
        .json(&json!({ "video_id": "vid123" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "LIC_001");
    assert_eq!(ctx.transport.request_count(), 0);
}

#[tokio::test]
async fn test_malformed_license_is_rejected() {
    let ctx = TestContext::new();
    let server = server(&ctx, None);

    let response = server
        .get("/v1/videos/abc")
        .add_header("X-License-Key", "not a key!")
        .await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "LIC_002");
}

#[tokio::test]
async fn test_license_info_and_info_rate_limit() {
    let ctx = TestContext::new();
    let server = server(&ctx, None);

    let response = server
        .get("/v1/license")
        .add_header("X-License-Key", LICENSE_KEY)
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert!(body["license_id"].as_str().unwrap().starts_with("lic-"));
    assert_eq!(body["quota_window_requests"], 100);
    assert_eq!(body["quota_window_seconds"], 3600);

    // Info lookups are limited to 50 per hour
    for _ in 1..50 {
        server
            .get("/v1/license")
            .add_header("X-License-Key", LICENSE_KEY)
            .await
            .assert_status_ok();
    }
    let limited = server
        .get("/v1/license")
        .add_header("X-License-Key", LICENSE_KEY)
        .await;

    assert_eq!(limited.status_code(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.header("Retry-After"), "3600");
    let body: serde_json::Value = limited.json();
    assert_eq!(body["code"], "RATE_001");
}

// =============================================================================
// Gateway routes
// =============================================================================

#[tokio::test]
async fn test_invalid_json_is_bad_request() {
    let ctx = TestContext::new();
    let server = server(&ctx, None);

    let response = server
        .post("/v1/transcript")
        .content_type("application/json")
        .add_header("X-License-Key", LICENSE_KEY)
        .bytes("{not json".into())
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "VALID_001");
}

#[tokio::test]
async fn test_description_route() {
    let ctx = TestContext::new();
    ctx.transport
        .respond_json(completion_body("A friendly guide to sourdough."));
    let server = server(&ctx, None);

    let response = server
        .post("/v1/description")
        .add_header("X-License-Key", LICENSE_KEY)
        .json(&json!({
            "transcript": sample_transcript(),
            "title": "Sourdough basics",
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["description"], "A friendly guide to sourdough.");
}

#[tokio::test]
async fn test_video_route_found_and_not_found() {
    let ctx = TestContext::new();
    ctx.transport
        .respond_json(video_body("abc", "A video"))
        .respond_json(empty_video_body());
    let server = server(&ctx, None);

    let found = server
        .get("/v1/videos/abc")
        .add_header("X-License-Key", LICENSE_KEY)
        .await;
    found.assert_status_ok();
    let body: serde_json::Value = found.json();
    assert_eq!(body["video"]["id"], "abc");
    assert_eq!(body["video"]["contentDetails"]["duration"], "PT4M13S");

    let missing = server
        .get("/v1/videos/zzz")
        .add_header("X-License-Key", LICENSE_KEY)
        .await;
    assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = missing.json();
    assert_eq!(body["code"], "UP_004");
}

#[tokio::test]
async fn test_upstream_exhaustion_is_service_unavailable() {
    let ctx = TestContext::new();
    ctx.transport.fail("down").fail("down").fail("down");
    let server = server(&ctx, None);

    let response = server
        .post("/v1/transcript")
        .add_header("X-License-Key", LICENSE_KEY)
        .json(&json!({ "video_id": "vid123" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "UP_005");
    // Upstream details stay internal
    assert!(!body["error"].as_str().unwrap().contains("down"));
}

#[tokio::test]
async fn test_blocked_user_agent_is_forbidden() {
    let ctx = TestContext::new();
    let server = server(&ctx, None);

    let response = server
        .get("/v1/videos/abc")
        .add_header("X-License-Key", LICENSE_KEY)
        .add_header("User-Agent", "my-scraper/1.0")
        .await;

    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "SEC_002");
    assert_eq!(body["error"], "Request denied");
    assert_eq!(ctx.audit.security_events().len(), 1);
}

#[tokio::test]
async fn test_blocked_user_agent_is_screened_before_license() {
    let ctx = TestContext::new();
    let server = server(&ctx, None);

    let response = server
        .post("/v1/transcript")
        .add_header("User-Agent", "my-scraper/1.0")
        .json(&json!({ "video_id": "vid123", "license_key": "bad" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    let events = ctx.audit.security_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, SecurityEventType::BlockedUserAgent);
    assert!(ctx.audit.records().is_empty());
}

#[tokio::test]
async fn test_oversized_body_leaves_one_security_event() {
    let ctx = TestContext::new();
    let server = server(&ctx, None);

    // Larger than both the filter's cap and the framework's default limit
    let response = server
        .post("/v1/description")
        .add_header("X-License-Key", LICENSE_KEY)
        .json(&json!({
            "transcript": "a".repeat(3 * 1024 * 1024),
            "title": "Huge",
        }))
        .await;

    assert_eq!(response.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "SEC_001");

    let events = ctx.audit.security_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, SecurityEventType::RequestTooLarge);
    assert_eq!(ctx.transport.request_count(), 0);
    assert!(ctx.audit.records().is_empty());
}

#[tokio::test]
async fn test_raised_size_cap_admits_large_bodies() {
    let mut config = gateway_config();
    config.security.max_request_bytes = 4 * 1024 * 1024;
    let ctx = TestContext::with_config(config);
    ctx.transport.respond_json(completion_body("Long video."));
    let server = server(&ctx, None);

    let response = server
        .post("/v1/description")
        .add_header("X-License-Key", LICENSE_KEY)
        .json(&json!({
            "transcript": "a".repeat(3 * 1024 * 1024),
            "title": "Long",
        }))
        .await;

    response.assert_status_ok();
    assert!(ctx.audit.security_events().is_empty());
    assert_eq!(ctx.transport.request_count(), 1);
}

#[tokio::test]
async fn test_forwarded_ip_reaches_audit() {
    let ctx = TestContext::new();
    ctx.transport.respond_json(video_body("abc", "A video"));
    let server = server(&ctx, None);

    server
        .get("/v1/videos/abc")
        .add_header("X-License-Key", LICENSE_KEY)
        .add_header("X-Forwarded-For", "192.0.2.10, 10.0.0.1")
        .await
        .assert_status_ok();

    assert_eq!(ctx.audit.records()[0].client_ip, "192.0.2.10");
}

// =============================================================================
// Admin routes
// =============================================================================

#[tokio::test]
async fn test_admin_disabled_without_token() {
    let ctx = TestContext::new();
    let server = server(&ctx, None);

    let response = server
        .get("/v1/admin/stats")
        .add_header("X-Admin-Token", ADMIN_TOKEN)
        .await;

    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "ADMIN_001");
}

#[tokio::test]
async fn test_admin_wrong_token() {
    let ctx = TestContext::new();
    let server = server(&ctx, Some(ADMIN_TOKEN));

    let response = server
        .post("/v1/admin/cache/clear")
        .add_header("X-Admin-Token", "wrong-token")
        .json(&json!({ "scope": "all" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "ADMIN_002");
}

#[tokio::test]
async fn test_admin_cache_clear_and_stats() {
    let ctx = TestContext::new();
    ctx.transport
        .respond_json(transcript_body("hello"))
        .respond_json(transcript_body("hello again"));
    let server = server(&ctx, Some(ADMIN_TOKEN));

    let transcript = || {
        server
            .post("/v1/transcript")
            .add_header("X-License-Key", LICENSE_KEY)
            .json(&json!({ "video_id": "vid123" }))
    };

    transcript().await.assert_status_ok();
    transcript().await.assert_status_ok();
    assert_eq!(ctx.transport.request_count(), 1);

    let cleared = server
        .post("/v1/admin/cache/clear")
        .add_header("X-Admin-Token", ADMIN_TOKEN)
        .json(&json!({ "scope": "transcripts" }))
        .await;
    cleared.assert_status_ok();
    let body: serde_json::Value = cleared.json();
    assert_eq!(body["scope"], "transcript");
    assert_eq!(body["removed"], 1);

    transcript().await.assert_status_ok();
    assert_eq!(ctx.transport.request_count(), 2);

    let stats = server
        .get("/v1/admin/stats")
        .add_header("X-Admin-Token", ADMIN_TOKEN)
        .await;
    stats.assert_status_ok();
    let body: serde_json::Value = stats.json();
    assert_eq!(body["window_hours"], 24);
    let endpoints = body["endpoints"].as_array().unwrap();
    assert_eq!(endpoints.len(), 1);
    assert_eq!(endpoints[0]["endpoint"], "transcript");
    assert_eq!(endpoints[0]["total_calls"], 3);
    assert_eq!(endpoints[0]["cache_hits"], 1);
    assert!(body["metrics"].get("gateway_calls").is_some());
}

#[tokio::test]
async fn test_admin_rejects_unknown_scope() {
    let ctx = TestContext::new();
    let server = server(&ctx, Some(ADMIN_TOKEN));

    let response = server
        .post("/v1/admin/cache/clear")
        .add_header("X-Admin-Token", ADMIN_TOKEN)
        .json(&json!({ "scope": "everything" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}
