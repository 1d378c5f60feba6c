//! End-to-end tests of the gateway pipeline against a scripted upstream.
//!
//! Every test builds its own store, audit log and clock, so they can run
//! in parallel.

use gateway::cache::{cache_key, CacheOperation, CacheScope};
use gateway::rate_limit::window_key;
use gateway_core::{
    CallerContext, EndpointClass, Error, KvStore, RequestOrigin, RotationMode, SecurityEventType,
    Tenant,
};
use integration_tests::fixtures::*;
use integration_tests::setup::{caller, caller_with_quota, TestContext};
use std::time::Duration;

const WEEK: Duration = Duration::from_secs(7 * 24 * 3600);

// =============================================================================
// Transcripts and caching
// =============================================================================

#[tokio::test]
async fn test_transcript_first_call_hits_upstream_and_caches() {
    let ctx = TestContext::new();
    ctx.transport.respond_json(transcript_body("hello"));

    let transcript = ctx
        .gateway
        .get_transcript("vid123", "auto", "it", &caller("T1"))
        .await
        .unwrap();
    assert_eq!(transcript, "hello");

    let requests = ctx.transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].bearer.as_deref(), Some(TRANSCRIPTION_KEYS[0]));
    let body = requests[0].json.as_ref().unwrap();
    assert_eq!(body["video_id"], "vid123");
    assert_eq!(body["mode"], "auto");
    assert_eq!(body["language"], "it");

    let key = cache_key(CacheOperation::Transcript, "vid123", &["auto", "it"]);
    assert!(ctx.store.get(&key).await.unwrap().is_some());

    let records = ctx.audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].endpoint, "transcript");
    assert_eq!(records[0].resource_id, "vid123");
    assert_eq!(records[0].tenant_id.as_deref(), Some("T1"));
    assert_eq!(records[0].status_code, 200);
    assert_eq!(records[0].attempts, 1);
    assert_eq!(records[0].response_size, 5);
    assert!(!records[0].cache_hit);
    assert_eq!(records[0].client_ip, "203.0.113.7");
}

#[tokio::test]
async fn test_repeated_transcript_is_served_from_cache() {
    let ctx = TestContext::new();
    ctx.transport.respond_json(transcript_body("hello"));

    let first = ctx
        .gateway
        .get_transcript("vid123", "auto", "it", &caller("T1"))
        .await
        .unwrap();
    let second = ctx
        .gateway
        .get_transcript("vid123", "auto", "it", &caller("T1"))
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(ctx.transport.request_count(), 1);

    let records = ctx.audit.records();
    assert_eq!(records.len(), 2);
    assert!(records[1].cache_hit);
    assert_eq!(records[1].attempts, 0);
    assert_eq!(records[1].status_code, 200);
}

#[tokio::test]
async fn test_cache_key_includes_mode_and_language() {
    let ctx = TestContext::new();
    ctx.transport
        .respond_json(transcript_body("ciao"))
        .respond_json(transcript_body("hello"));

    let it = ctx
        .gateway
        .get_transcript("vid123", "auto", "it", &caller("T1"))
        .await
        .unwrap();
    let en = ctx
        .gateway
        .get_transcript("vid123", "auto", "en", &caller("T1"))
        .await
        .unwrap();

    assert_eq!(it, "ciao");
    assert_eq!(en, "hello");
    assert_eq!(ctx.transport.request_count(), 2);
}

#[tokio::test]
async fn test_unknown_mode_is_treated_as_auto() {
    let ctx = TestContext::new();
    ctx.transport.respond_json(transcript_body("hello"));

    ctx.gateway
        .get_transcript("vid123", "turbo", "it", &caller("T1"))
        .await
        .unwrap();
    // Same cache entry as an explicit "auto"
    ctx.gateway
        .get_transcript("vid123", "auto", "it", &caller("T1"))
        .await
        .unwrap();

    assert_eq!(ctx.transport.request_count(), 1);
    assert_eq!(ctx.transport.requests()[0].json.as_ref().unwrap()["mode"], "auto");
}

#[tokio::test]
async fn test_cache_entry_expires_after_ttl() {
    let ctx = TestContext::new();
    ctx.transport
        .respond_json(transcript_body("first"))
        .respond_json(transcript_body("second"));

    let c = caller("T1");
    let call = || ctx.gateway.get_transcript("vid123", "auto", "it", &c);

    assert_eq!(call().await.unwrap(), "first");

    ctx.clock.advance(WEEK - Duration::from_secs(1));
    assert_eq!(call().await.unwrap(), "first");
    assert_eq!(ctx.transport.request_count(), 1);

    ctx.clock.advance(Duration::from_secs(1));
    assert_eq!(call().await.unwrap(), "second");
    assert_eq!(ctx.transport.request_count(), 2);
}

#[tokio::test]
async fn test_disabled_cache_always_calls_upstream() {
    let mut config = gateway_config();
    config.cache.enabled = false;
    let ctx = TestContext::with_config(config);
    ctx.transport
        .respond_json(transcript_body("a"))
        .respond_json(transcript_body("b"));

    for _ in 0..2 {
        ctx.gateway
            .get_transcript("vid123", "auto", "it", &caller("T1"))
            .await
            .unwrap();
    }

    assert_eq!(ctx.transport.request_count(), 2);
    assert!(ctx.audit.records().iter().all(|r| !r.cache_hit));
}

#[tokio::test]
async fn test_clear_cache_by_scope() {
    let ctx = TestContext::new();
    ctx.transport
        .respond_json(transcript_body("hello"))
        .respond_json(video_body("abc", "A video"))
        .respond_json(transcript_body("hello again"));

    ctx.gateway
        .get_transcript("vid123", "auto", "it", &caller("T1"))
        .await
        .unwrap();
    ctx.gateway
        .get_youtube_video_data("abc", &caller("T1"))
        .await
        .unwrap();

    let removed = ctx.gateway.clear_cache(CacheScope::Transcript).await.unwrap();
    assert_eq!(removed, 1);

    // Video metadata is still cached, the transcript is not
    ctx.gateway
        .get_youtube_video_data("abc", &caller("T1"))
        .await
        .unwrap();
    let again = ctx
        .gateway
        .get_transcript("vid123", "auto", "it", &caller("T1"))
        .await
        .unwrap();

    assert_eq!(again, "hello again");
    assert_eq!(ctx.transport.request_count(), 3);

    assert_eq!(ctx.gateway.clear_cache(CacheScope::All).await.unwrap(), 2);
}

// =============================================================================
// Key rotation and retries
// =============================================================================

#[tokio::test]
async fn test_quota_responses_rotate_keys_without_backoff() {
    let ctx = TestContext::new();
    ctx.transport
        .respond(429, r#"{"error":"quota"}"#)
        .respond(429, r#"{"error":"quota"}"#)
        .respond_json(transcript_body("hello"));

    let transcript = ctx
        .gateway
        .get_transcript("vid123", "auto", "it", &caller("T1"))
        .await
        .unwrap();
    assert_eq!(transcript, "hello");

    assert_eq!(
        ctx.transport.bearers(),
        TRANSCRIPTION_KEYS
            .iter()
            .map(|k| Some(k.to_string()))
            .collect::<Vec<_>>()
    );
    assert!(ctx.clock.sleeps().is_empty());

    let records = ctx.audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].attempts, 3);
    assert_eq!(records[0].status_code, 200);
}

#[tokio::test]
async fn test_payment_required_also_rotates() {
    let ctx = TestContext::new();
    ctx.transport
        .respond(402, r#"{"error":"payment required"}"#)
        .respond_json(transcript_body("hello"));

    ctx.gateway
        .get_transcript("vid123", "auto", "it", &caller("T1"))
        .await
        .unwrap();

    assert_eq!(ctx.transport.request_count(), 2);
    assert!(ctx.clock.sleeps().is_empty());
}

#[tokio::test]
async fn test_transport_errors_back_off_exponentially() {
    let ctx = TestContext::new();
    ctx.transport
        .fail("connection reset")
        .fail("connection reset")
        .respond_json(transcript_body("hello"));

    let transcript = ctx
        .gateway
        .get_transcript("vid123", "auto", "it", &caller("T1"))
        .await
        .unwrap();
    assert_eq!(transcript, "hello");

    assert_eq!(
        ctx.clock.sleeps(),
        vec![Duration::from_millis(1000), Duration::from_millis(2000)]
    );
    assert_eq!(ctx.audit.records()[0].attempts, 3);
}

#[tokio::test]
async fn test_retry_exhaustion_audits_all_attempts() {
    let ctx = TestContext::new();
    ctx.transport
        .fail("timeout")
        .fail("timeout")
        .fail("timeout");

    let err = ctx
        .gateway
        .get_transcript("vid123", "auto", "it", &caller("T1"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RetryExhausted { attempts: 3, .. }));

    assert_eq!(ctx.transport.request_count(), 3);
    // No sleep after the final attempt
    assert_eq!(ctx.clock.sleeps().len(), 2);

    let records = ctx.audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].attempts, 3);
    assert_eq!(records[0].status_code, 503);

    // Failures are never cached
    let key = cache_key(CacheOperation::Transcript, "vid123", &["auto", "it"]);
    assert!(ctx.store.get(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn test_client_error_is_terminal() {
    let ctx = TestContext::new();
    ctx.transport
        .respond(400, r#"{"error":"Video is private"}"#)
        .respond_json(transcript_body("unused"));

    let err = ctx
        .gateway
        .get_transcript("vid123", "auto", "it", &caller("T1"))
        .await
        .unwrap_err();

    match err {
        Error::UpstreamRequest { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Video is private");
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(ctx.transport.request_count(), 1);
    assert_eq!(ctx.transport.remaining(), 1);
    assert_eq!(ctx.audit.records()[0].status_code, 400);
}

#[tokio::test]
async fn test_success_without_transcript_is_bad_gateway() {
    let ctx = TestContext::new();
    ctx.transport.respond(200, r#"{"status":"queued"}"#);

    let err = ctx
        .gateway
        .get_transcript("vid123", "auto", "it", &caller("T1"))
        .await
        .unwrap_err();

    assert_eq!(err.http_status(), 502);
    assert_eq!(ctx.audit.records()[0].status_code, 502);
}

#[tokio::test]
async fn test_round_robin_advances_per_call() {
    let mut config = gateway_config();
    config.credentials.rotation = RotationMode::RoundRobin;
    let ctx = TestContext::with_config(config);

    for i in 0..4 {
        ctx.transport.respond_json(transcript_body(&format!("t{}", i)));
    }
    for i in 0..4 {
        ctx.gateway
            .get_transcript(&format!("vid{}", i), "auto", "en", &caller("T1"))
            .await
            .unwrap();
    }

    let expected: Vec<Option<String>> = [0, 1, 2, 0]
        .iter()
        .map(|&i| Some(TRANSCRIPTION_KEYS[i].to_string()))
        .collect();
    assert_eq!(ctx.transport.bearers(), expected);
}

#[tokio::test]
async fn test_missing_credentials_are_audited() {
    let mut config = gateway_config();
    config.credentials.ai.clear();
    let ctx = TestContext::with_config(config);

    let err = ctx
        .gateway
        .generate_description(sample_transcript(), "Sourdough basics", None, &caller("T1"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::MissingCredential { .. }));
    assert_eq!(ctx.transport.request_count(), 0);

    let records = ctx.audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status_code, 500);
    assert_eq!(records[0].attempts, 0);
}

// =============================================================================
// Descriptions
// =============================================================================

#[tokio::test]
async fn test_description_prompt_and_audit() {
    let ctx = TestContext::new();
    ctx.transport
        .respond_json(completion_body("A friendly guide to sourdough."))
        .respond_json(completion_body("Another take."));

    let description = ctx
        .gateway
        .generate_description(sample_transcript(), "Sourdough basics", None, &caller("T1"))
        .await
        .unwrap();
    assert_eq!(description, "A friendly guide to sourdough.");

    let request = &ctx.transport.requests()[0];
    assert_eq!(request.bearer.as_deref(), Some(AI_KEY));
    let body = request.json.as_ref().unwrap();
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(
        messages[0]["content"],
        ctx.gateway.config().upstream.default_system_prompt.as_str()
    );
    let user = messages[1]["content"].as_str().unwrap();
    assert!(user.starts_with("Title: Sourdough basics\n\nTranscript:\n"));

    // Never cached
    ctx.gateway
        .generate_description(sample_transcript(), "Sourdough basics", None, &caller("T1"))
        .await
        .unwrap();
    assert_eq!(ctx.transport.request_count(), 2);

    let records = ctx.audit.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].endpoint, "ai_description");
    assert_eq!(records[0].resource_id, "Sourdough basics");
    assert!(records.iter().all(|r| !r.cache_hit && r.attempts == 1));
}

#[tokio::test]
async fn test_description_custom_prompt_and_long_title() {
    let ctx = TestContext::new();
    ctx.transport.respond_json(completion_body("Short."));

    let title = "x".repeat(80);
    ctx.gateway
        .generate_description(
            sample_transcript(),
            &title,
            Some("Write one sentence."),
            &caller("T1"),
        )
        .await
        .unwrap();

    let body = ctx.transport.requests()[0].json.clone().unwrap();
    assert_eq!(body["messages"][0]["content"], "Write one sentence.");
    assert_eq!(ctx.audit.records()[0].resource_id.chars().count(), 50);
}

#[tokio::test]
async fn test_description_is_single_attempt() {
    let ctx = TestContext::new();
    ctx.transport
        .respond(500, r#"{"error":{"message":"model overloaded"}}"#)
        .respond_json(completion_body("unused"));

    let err = ctx
        .gateway
        .generate_description(sample_transcript(), "Title", None, &caller("T1"))
        .await
        .unwrap_err();

    assert_eq!(err.http_status(), 500);
    assert_eq!(ctx.transport.request_count(), 1);

    let records = ctx.audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status_code, 500);
}

#[tokio::test]
async fn test_description_without_choices() {
    let ctx = TestContext::new();
    ctx.transport.respond(200, r#"{"choices":[]}"#);

    let err = ctx
        .gateway
        .generate_description(sample_transcript(), "Title", None, &caller("T1"))
        .await
        .unwrap_err();

    assert_eq!(err.http_status(), 502);
    assert_eq!(err.public_message(), "No response from AI provider");
}

// =============================================================================
// Video metadata
// =============================================================================

#[tokio::test]
async fn test_video_data_found_and_cached() {
    let ctx = TestContext::new();
    ctx.transport.respond_json(video_body("abc", "A video"));

    let video = ctx
        .gateway
        .get_youtube_video_data("abc", &caller("T1"))
        .await
        .unwrap();
    assert_eq!(video.id, "abc");
    assert_eq!(video.snippet["title"], "A video");
    assert_eq!(video.statistics["viewCount"], "1024");

    let request = &ctx.transport.requests()[0];
    assert!(request.query.contains(&("id".to_string(), "abc".to_string())));
    assert!(request.query.contains(&("key".to_string(), YOUTUBE_KEY.to_string())));

    // Metadata expires after an hour
    ctx.clock.advance(Duration::from_secs(3599));
    ctx.gateway
        .get_youtube_video_data("abc", &caller("T1"))
        .await
        .unwrap();
    assert_eq!(ctx.transport.request_count(), 1);

    ctx.transport.respond_json(video_body("abc", "Renamed"));
    ctx.clock.advance(Duration::from_secs(1));
    let refreshed = ctx
        .gateway
        .get_youtube_video_data("abc", &caller("T1"))
        .await
        .unwrap();
    assert_eq!(refreshed.snippet["title"], "Renamed");
}

#[tokio::test]
async fn test_video_not_found_is_not_cached() {
    let ctx = TestContext::new();
    ctx.transport.respond_json(empty_video_body());

    let err = ctx
        .gateway
        .get_youtube_video_data("abc", &caller("T1"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ItemNotFound(_)));

    let key = cache_key(CacheOperation::YoutubeData, "abc", &[]);
    assert!(ctx.store.get(&key).await.unwrap().is_none());

    let records = ctx.audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].endpoint, "youtube_data");
    assert_eq!(records[0].status_code, 404);
}

// =============================================================================
// Security filter
// =============================================================================

#[tokio::test]
async fn test_oversized_request_is_rejected_before_anything_else() {
    let ctx = TestContext::new();
    ctx.transport.respond_json(transcript_body("unused"));

    let caller = caller("T1").with_body_size(2 * 1024 * 1024);
    let err = ctx
        .gateway
        .get_transcript("vid123", "auto", "it", &caller)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RequestTooLarge { .. }));

    assert_eq!(ctx.transport.request_count(), 0);
    assert!(ctx.audit.records().is_empty());

    let events = ctx.audit.security_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, SecurityEventType::RequestTooLarge);

    // The rate limiter never saw the request
    let window = window_key(EndpointClass::Gateway, "T1");
    assert!(ctx.store.get(&window).await.unwrap().is_none());
}

#[tokio::test]
async fn test_blocked_user_agent_is_rejected() {
    let ctx = TestContext::new();
    let caller = CallerContext::new(Tenant::new("T1")).with_origin(RequestOrigin::new(
        Some("198.51.100.1".to_string()),
        Some("Mozilla/5.0 (compatible; Googlebot/2.1)".to_string()),
    ));

    let err = ctx
        .gateway
        .get_youtube_video_data("abc", &caller)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));
    assert_eq!(err.public_message(), "Request denied");

    assert_eq!(ctx.transport.request_count(), 0);
    assert!(ctx.audit.records().is_empty());

    let events = ctx.audit.security_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, SecurityEventType::BlockedUserAgent);
    assert_eq!(events[0].client_ip, "198.51.100.1");
}

#[tokio::test]
async fn test_suspicious_payload_is_rejected() {
    let ctx = TestContext::new();

    let err = ctx
        .gateway
        .generate_description("nice video; DROP TABLE users", "Title", None, &caller("T1"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));

    assert_eq!(ctx.transport.request_count(), 0);
    let events = ctx.audit.security_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, SecurityEventType::SuspiciousPayload);
}

#[tokio::test]
async fn test_empty_video_id_is_invalid() {
    let ctx = TestContext::new();

    let err = ctx
        .gateway
        .get_transcript("   ", "auto", "en", &caller("T1"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));

    assert_eq!(ctx.transport.request_count(), 0);
    assert!(ctx.audit.records().is_empty());
    assert_eq!(
        ctx.audit.security_events()[0].event_type,
        SecurityEventType::InvalidRequest
    );
}

// =============================================================================
// Rate limiting
// =============================================================================

#[tokio::test]
async fn test_twenty_first_call_in_window_is_rejected() {
    let ctx = TestContext::new();
    let tenant = Tenant::new("T2");
    let origin = RequestOrigin::unknown();

    for expected in 1..=20 {
        let count = ctx
            .gateway
            .check_rate_limit(&tenant, EndpointClass::Activate, &origin)
            .await
            .unwrap();
        assert_eq!(count, expected);
    }

    let err = ctx
        .gateway
        .check_rate_limit(&tenant, EndpointClass::Activate, &origin)
        .await
        .unwrap_err();
    match err {
        Error::RateLimitExceeded { limit, window_secs } => {
            assert_eq!(limit, 20);
            assert_eq!(window_secs, 3600);
        }
        other => panic!("unexpected error {:?}", other),
    }

    let events = ctx.audit.security_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, SecurityEventType::RateLimitExceeded);
    assert_eq!(events[0].event_data["license_id"], "T2");
    assert_eq!(events[0].event_data["limit"], 20);

    // A fresh window starts once the old one has elapsed
    ctx.clock.advance(Duration::from_secs(3600));
    let count = ctx
        .gateway
        .check_rate_limit(&tenant, EndpointClass::Activate, &origin)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_tenant_quota_applies_to_gateway_operations() {
    let ctx = TestContext::new();
    ctx.transport.respond_json(video_body("abc", "A video"));
    let caller = caller_with_quota("T3", 2, 60);

    ctx.gateway.get_youtube_video_data("abc", &caller).await.unwrap();
    // Cache hits still count against the quota
    ctx.gateway.get_youtube_video_data("abc", &caller).await.unwrap();

    let err = ctx
        .gateway
        .get_youtube_video_data("abc", &caller)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::RateLimitExceeded {
            limit: 2,
            window_secs: 60
        }
    ));

    // Rejected calls leave a security event, not an audit record
    assert_eq!(ctx.audit.records().len(), 2);
    assert_eq!(ctx.audit.security_events().len(), 1);
    assert_eq!(ctx.transport.request_count(), 1);

    // Other tenants are unaffected
    ctx.gateway
        .get_youtube_video_data("abc", &caller_with_quota("T4", 2, 60))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_disabled_rate_limits_admit_everything() {
    let mut config = gateway_config();
    config.rate_limits.enabled = false;
    let ctx = TestContext::with_config(config);
    let tenant = Tenant::new("T5").with_quota(1, 3600);

    for _ in 0..5 {
        ctx.gateway
            .check_rate_limit(&tenant, EndpointClass::Gateway, &RequestOrigin::unknown())
            .await
            .unwrap();
    }
    assert!(ctx.audit.security_events().is_empty());
}

// =============================================================================
// Audit completeness and stats
// =============================================================================

#[tokio::test]
async fn test_every_admitted_call_is_audited_once() {
    let ctx = TestContext::new();
    ctx.transport
        .respond_json(transcript_body("hello"))
        .respond(500, "upstream broke")
        .respond_json(empty_video_body())
        .respond_json(video_body("def", "Found"));

    let c = caller("T1");
    let _ = ctx.gateway.get_transcript("vid123", "auto", "it", &c).await;
    let _ = ctx.gateway.get_transcript("vid123", "auto", "it", &c).await;
    let _ = ctx
        .gateway
        .generate_description(sample_transcript(), "Title", None, &c)
        .await;
    let _ = ctx.gateway.get_youtube_video_data("abc", &c).await;
    let _ = ctx.gateway.get_youtube_video_data("def", &c).await;

    let records = ctx.audit.records();
    assert_eq!(records.len(), 5);
    let statuses: Vec<u16> = records.iter().map(|r| r.status_code).collect();
    assert_eq!(statuses, vec![200, 200, 500, 404, 200]);
}

#[tokio::test]
async fn test_store_failure_during_admission_is_audited() {
    let (ctx, store) = TestContext::with_flaky_store();
    store.fail_windows(true);

    let c = caller("T1");
    let err = ctx
        .gateway
        .get_transcript("vid123", "auto", "it", &c)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INFRA_001");
    assert_eq!(ctx.transport.request_count(), 0);
    assert!(ctx.audit.security_events().is_empty());

    let records = ctx.audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].endpoint, "transcript");
    assert_eq!(records[0].resource_id, "vid123");
    assert_eq!(records[0].status_code, 500);
    assert_eq!(records[0].attempts, 0);

    // Recovers once the store is back
    store.fail_windows(false);
    ctx.transport.respond_json(transcript_body("hello"));
    let transcript = ctx
        .gateway
        .get_transcript("vid123", "auto", "it", &c)
        .await
        .unwrap();
    assert_eq!(transcript, "hello");
    assert_eq!(ctx.audit.records().len(), 2);
}

#[tokio::test]
async fn test_performance_stats_per_endpoint() {
    let ctx = TestContext::new();
    ctx.transport
        .respond_json(transcript_body("hello"))
        .respond_json(empty_video_body());

    let c = caller("T1");
    ctx.gateway
        .get_transcript("vid123", "auto", "it", &c)
        .await
        .unwrap();
    ctx.gateway
        .get_transcript("vid123", "auto", "it", &c)
        .await
        .unwrap();
    let _ = ctx.gateway.get_youtube_video_data("abc", &c).await;

    let stats = ctx.gateway.performance_stats().await.unwrap();

    let transcript = stats.iter().find(|s| s.endpoint == "transcript").unwrap();
    assert_eq!(transcript.total_calls, 2);
    assert_eq!(transcript.cache_hits, 1);
    assert_eq!(transcript.errors, 0);
    assert!((transcript.avg_attempts - 0.5).abs() < f64::EPSILON);

    let video = stats.iter().find(|s| s.endpoint == "youtube_data").unwrap();
    assert_eq!(video.total_calls, 1);
    assert_eq!(video.errors, 1);

    // Records older than the stats window drop out
    ctx.clock.advance(Duration::from_secs(25 * 3600));
    assert!(ctx.gateway.performance_stats().await.unwrap().is_empty());
}
