//! `POST /api/summarize` through the full router, without a socket.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use summary_gateway::clock::ManualClock;
use summary_gateway::config::GatewayConfig;
use summary_gateway::http::{HttpServer, X_CACHE, X_REQUEST_ID};

mod common;
use common::{settle, test_config, ScriptedGenerator};

struct Harness {
    server: HttpServer,
    upstream: Arc<ScriptedGenerator>,
    clock: Arc<ManualClock>,
}

impl Harness {
    fn new(config: GatewayConfig) -> Self {
        let upstream = ScriptedGenerator::new();
        let clock = Arc::new(ManualClock::new(1_000));
        let server = HttpServer::with_generator(config, upstream.clone(), clock.clone());
        Self {
            server,
            upstream,
            clock,
        }
    }

    fn router(&self) -> Router {
        self.server.router()
    }

    async fn summarize(&self, body: Value, if_none_match: Option<&str>) -> Response {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/summarize")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(tag) = if_none_match {
            builder = builder.header(header::IF_NONE_MATCH, tag);
        }
        self.router()
            .oneshot(builder.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap()
    }
}

fn email(content: &str) -> Value {
    json!({ "content": content, "type": "brief" })
}

fn header_str<'a>(response: &'a Response, name: &str) -> &'a str {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_miss_then_hit() {
    let h = Harness::new(test_config());
    h.upstream.push_ok("  Meeting moved to Friday.\n");

    let first = h.summarize(email("Hi team, the meeting moves to Friday."), None).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(header_str(&first, X_CACHE), "MISS");
    assert_eq!(header_str(&first, "cache-control"), "private, max-age=3600");
    assert!(!header_str(&first, X_REQUEST_ID).is_empty());
    let etag = header_str(&first, "etag").to_string();
    assert!(etag.starts_with('"') && etag.ends_with('"'));
    assert_eq!(json_body(first).await, json!({ "summary": "Meeting moved to Friday." }));

    let second = h.summarize(email("Hi team, the meeting moves to Friday."), None).await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(header_str(&second, X_CACHE), "HIT");
    assert_eq!(header_str(&second, "etag"), etag);
    assert_eq!(h.upstream.calls(), 1);
}

#[tokio::test]
async fn test_kinds_are_cached_separately() {
    let h = Harness::new(test_config());
    let content = "Please send the Q3 numbers by Monday.";

    for kind in ["brief", "detailed", "action-items"] {
        let response = h
            .summarize(json!({ "content": content, "type": kind }), None)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_str(&response, X_CACHE), "MISS");
    }
    assert_eq!(h.upstream.calls(), 3);
    assert!(h.upstream.prompts()[2].starts_with("List the action items"));
}

#[tokio::test]
async fn test_matching_validator_not_modified() {
    let h = Harness::new(test_config());
    let first = h.summarize(email("status update"), None).await;
    let etag = header_str(&first, "etag").to_string();

    let conditional = h.summarize(email("status update"), Some(&etag)).await;
    assert_eq!(conditional.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(header_str(&conditional, X_CACHE), "HIT");
    assert_eq!(header_str(&conditional, "etag"), etag);
    assert_eq!(h.upstream.calls(), 1);

    let mismatched = h.summarize(email("status update"), Some("\"deadbeef\"")).await;
    assert_eq!(mismatched.status(), StatusCode::OK);
    assert_eq!(header_str(&mismatched, X_CACHE), "HIT");
}

#[tokio::test]
async fn test_validator_without_cache_entry_generates() {
    let h = Harness::new(test_config());
    let response = h.summarize(email("never seen"), Some("*")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, X_CACHE), "MISS");
}

#[tokio::test]
async fn test_stale_validator_match_refreshes() {
    let h = Harness::new(test_config());
    h.upstream.push_ok("first");
    h.upstream.push_ok("second");

    let first = h.summarize(email("thread"), None).await;
    let etag = header_str(&first, "etag").to_string();

    h.clock.advance(3_600_001);
    let conditional = h.summarize(email("thread"), Some(&etag)).await;
    assert_eq!(conditional.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(header_str(&conditional, X_CACHE), "STALE");

    settle(&h.server.state().governor).await;
    assert_eq!(h.upstream.calls(), 2);

    let refreshed = h.summarize(email("thread"), Some(&etag)).await;
    assert_eq!(refreshed.status(), StatusCode::OK);
    assert_eq!(header_str(&refreshed, X_CACHE), "HIT");
    assert_eq!(json_body(refreshed).await, json!({ "summary": "second" }));
}

#[tokio::test]
async fn test_invalid_bodies_rejected_without_upstream() {
    let h = Harness::new(test_config());

    let blank = h.summarize(json!({ "content": "   ", "type": "brief" }), None).await;
    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(blank).await["error"].is_string());

    let bad_kind = h.summarize(json!({ "content": "x", "type": "poem" }), None).await;
    assert_eq!(bad_kind.status(), StatusCode::BAD_REQUEST);

    let missing = h.summarize(json!({ "type": "brief" }), None).await;
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

    let malformed = h
        .router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/summarize")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);

    assert_eq!(h.upstream.calls(), 0);
    let snapshot = h.server.state().governor.admission().snapshot(1_000);
    assert_eq!(snapshot.requests_in_window, 0);
    assert_eq!(snapshot.consecutive_failures, 0);
}

#[tokio::test]
async fn test_content_and_body_limits() {
    let mut config = test_config();
    config.security.max_content_chars = 10;
    config.security.max_body_size = 256;
    let h = Harness::new(config);

    let long = h.summarize(email("this is longer than ten"), None).await;
    assert_eq!(long.status(), StatusCode::BAD_REQUEST);

    let huge = h.summarize(email(&"x".repeat(1_000)), None).await;
    assert_eq!(huge.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(h.upstream.calls(), 0);
}

#[tokio::test]
async fn test_upstream_failure_is_generic_500() {
    let h = Harness::new(test_config());
    h.upstream.push_err(403, "API key not valid. secret-detail");

    let response = h.summarize(email("hello"), None).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().get(header::RETRY_AFTER).is_none());
    let body = json_body(response).await;
    assert_eq!(body["error"], "Failed to generate summary");
    assert!(!body.to_string().contains("secret-detail"));
}

#[tokio::test]
async fn test_open_breaker_returns_429() {
    let h = Harness::new(test_config());
    for _ in 0..3 {
        h.upstream.push_err(500, "down");
    }
    for i in 0..3 {
        let response = h.summarize(email(&format!("mail {i}")), None).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    h.clock.advance(500);
    let response = h.summarize(email("another"), None).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(header_str(&response, "retry-after"), "30");
    assert_eq!(json_body(response).await["retryAfterMs"], 29_500);
    assert_eq!(h.upstream.calls(), 3);
}

#[tokio::test]
async fn test_window_exhaustion_returns_429() {
    let mut config = test_config();
    config.rate_limit.max_requests = 2;
    let h = Harness::new(config);

    for i in 0..2 {
        assert_eq!(
            h.summarize(email(&format!("m{i}")), None).await.status(),
            StatusCode::OK
        );
    }
    h.clock.advance(950);
    let limited = h.summarize(email("m2"), None).await;
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(header_str(&limited, "retry-after"), "60");
    assert_eq!(json_body(limited).await["retryAfterMs"], 59_050);

    // Cached entries are still served while the window is full.
    let cached = h.summarize(email("m0"), None).await;
    assert_eq!(cached.status(), StatusCode::OK);
    assert_eq!(header_str(&cached, X_CACHE), "HIT");
}

#[tokio::test]
async fn test_endpoint_pacing_guard() {
    let mut config = test_config();
    config.pacing.min_interval_ms = 1_000;
    config.pacing.backoff_multiplier = 2.0;
    config.pacing.max_interval_ms = 8_000;
    let h = Harness::new(config);

    assert_eq!(h.summarize(email("a"), None).await.status(), StatusCode::OK);

    h.clock.advance(400);
    let paced = h.summarize(email("a"), None).await;
    assert_eq!(paced.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(header_str(&paced, "retry-after"), "1");
    assert_eq!(json_body(paced).await["retryAfterMs"], 600);
    assert_eq!(h.server.state().pacing.current_interval_ms(), 2_000);

    h.clock.advance(1_600);
    let ok = h.summarize(email("a"), None).await;
    assert_eq!(ok.status(), StatusCode::OK);
    assert_eq!(h.server.state().pacing.current_interval_ms(), 1_000);
    assert_eq!(h.upstream.calls(), 1);
}

#[tokio::test]
async fn test_health() {
    let h = Harness::new(test_config());
    let response = h
        .router()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn test_reload_applies_endpoint_settings() {
    let h = Harness::new(test_config());

    let mut reloaded = test_config();
    reloaded.security.max_content_chars = 5;
    reloaded.pacing.min_interval_ms = 10_000;
    reloaded.pacing.max_interval_ms = 20_000;
    h.server.state().apply_reload(reloaded);

    let response = h.summarize(email("too long now"), None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(h.server.state().pacing.current_interval_ms(), 10_000);
}

#[tokio::test]
async fn test_admin_requires_key() {
    let mut config = test_config();
    config.admin.api_key = "s3cret-admin".into();
    let h = Harness::new(config);
    h.summarize(email("one"), None).await;

    let admin = h.server.admin_router();
    let denied = admin
        .clone()
        .oneshot(Request::builder().uri("/admin/governor").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

    let wrong = admin
        .clone()
        .oneshot(
            Request::builder()
                .uri("/admin/governor")
                .header(header::AUTHORIZATION, "Bearer nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let ok = admin
        .oneshot(
            Request::builder()
                .uri("/admin/governor")
                .header(header::AUTHORIZATION, "Bearer s3cret-admin")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
    let body = json_body(ok).await;
    assert_eq!(body["admission"]["requests_in_window"], 1);
    assert_eq!(body["admission"]["circuit_phase"], "closed");
    assert_eq!(body["cache"]["fresh"], 1);
}
