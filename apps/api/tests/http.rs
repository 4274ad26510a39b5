//! Router-level tests that need no database.
//!
//! The app is built without `DATABASE_URL`, so any request that gets past
//! routing and authentication ends in `503 db_not_configured`. That makes
//! it easy to tell which layer answered.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use tower::ServiceExt;

use bistro_api::config::Environment;
use bistro_api::routes::ROUTE_ALIASES;
use bistro_api::{build_router, ApiConfig, AppState};
use bistro_core::{Role, User};

fn config() -> ApiConfig {
    ApiConfig {
        jwt_secret: "http-test-secret".to_string(),
        ..ApiConfig::default()
    }
}

fn app_with(config: ApiConfig) -> (Router, AppState) {
    let state = AppState::new(config, None);
    let router = build_router(state.clone()).expect("route table is valid");
    (router, state)
}

fn token(state: &AppState, role: Role) -> String {
    let user = User {
        id: 1,
        email: "admin@bistro.local".to_string(),
        full_name: "Admin".to_string(),
        role,
        default_branch: "main".to_string(),
        is_active: true,
        created_at: Utc::now(),
    };
    state.jwt.generate_access_token(&user).unwrap()
}

async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_without_database() {
    let (app, _) = app_with(config());

    let response = app.oneshot(get("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "not_configured");
}

#[tokio::test]
async fn test_login_without_database_is_db_not_configured() {
    let (app, _) = app_with(config());

    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/login")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"email":"admin@bistro.local","password":"secret123"}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["error"], "db_not_configured");
}

#[tokio::test]
async fn test_protected_route_requires_token() {
    let (app, _) = app_with(config());

    let response = app.oneshot(get("/api/orders")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "unauthorized");
}

#[tokio::test]
async fn test_invalid_json_is_validation_error() {
    let (app, state) = app_with(config());

    let request = Request::builder()
        .method("POST")
        .uri("/api/pos/saveDraft")
        .header("authorization", format!("Bearer {}", token(&state, Role::Admin)))
        .header("content-type", "application/json")
        .body(Body::from(r#"{"branch":"main"}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "validation_error");
}

#[tokio::test]
async fn test_alias_reaches_canonical_handler() {
    let (app, state) = app_with(config());
    let bearer = format!("Bearer {}", token(&state, Role::Admin));
    let draft = r#"{"branch":"china_town","table":"5","items":[{"id":212,"qty":1},{"id":213,"qty":2}]}"#;

    for uri in ["/api/pos/saveDraft", "/api/pos/save-draft"] {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("authorization", &bearer)
            .header("content-type", "application/json")
            .body(Body::from(draft))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();

        // Past routing, auth and body parsing: only the database is missing
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE, "{}", uri);
    }

    for alias in ROUTE_ALIASES {
        let method = if alias.target.starts_with("/api/pos/") { "POST" } else { "GET" };
        let request = Request::builder()
            .method(method)
            .uri(alias.alias)
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_ne!(response.status(), StatusCode::NOT_FOUND, "{}", alias.alias);
    }
}

#[tokio::test]
async fn test_unknown_route_is_json_not_found() {
    let (app, _) = app_with(config());

    let response = app.oneshot(get("/api/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()["x-frame-options"], "DENY");
    assert_eq!(body_json(response).await["error"], "not_found");
}

#[tokio::test]
async fn test_security_headers_on_every_response() {
    let (app, _) = app_with(config());

    for uri in ["/api/health", "/api/orders", "/api/missing"] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        let headers = response.headers();
        assert_eq!(headers["x-frame-options"], "DENY", "{}", uri);
        assert_eq!(headers["x-content-type-options"], "nosniff", "{}", uri);
        assert!(headers.contains_key("content-security-policy"), "{}", uri);
        assert_eq!(headers["referrer-policy"], "strict-origin-when-cross-origin", "{}", uri);
        assert!(headers.contains_key("permissions-policy"), "{}", uri);
        assert!(!headers.contains_key("strict-transport-security"), "{}", uri);
    }
}

#[tokio::test]
async fn test_cors_preflight_carries_security_headers() {
    let (app, _) = app_with(config());

    let preflight = Request::builder()
        .method("OPTIONS")
        .uri("/api/orders")
        .header("origin", "https://pos.example.com")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "authorization")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(preflight).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert!(headers.contains_key("content-security-policy"));
}

#[tokio::test]
async fn test_hsts_only_in_production_over_https() {
    let https = || {
        Request::builder()
            .uri("/api/health")
            .header("x-forwarded-proto", "https")
            .body(Body::empty())
            .unwrap()
    };

    let (dev, _) = app_with(config());
    let response = dev.oneshot(https()).await.unwrap();
    assert!(!response.headers().contains_key("strict-transport-security"));

    let (prod, _) = app_with(ApiConfig {
        environment: Environment::Production,
        ..config()
    });
    let response = prod.clone().oneshot(https()).await.unwrap();
    assert!(response.headers().contains_key("strict-transport-security"));

    let response = prod.oneshot(get("/api/health")).await.unwrap();
    assert!(!response.headers().contains_key("strict-transport-security"));
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_then_recovery() {
    let (app, _) = app_with(ApiConfig {
        rate_limit_max_requests: 3,
        rate_limit_window: Duration::from_secs(60),
        trust_proxy: true,
        ..config()
    });
    let from = |ip: &str| {
        Request::builder()
            .uri("/api/health")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    };

    for _ in 0..3 {
        let response = app.clone().oneshot(from("203.0.113.9")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.clone().oneshot(from("203.0.113.9")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));
    assert_eq!(response.headers()["x-frame-options"], "DENY");
    assert_eq!(body_json(response).await["error"], "rate_limit_exceeded");

    // Another client is unaffected
    let response = app.clone().oneshot(from("198.51.100.2")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    tokio::time::advance(Duration::from_secs(61)).await;
    let response = app.oneshot(from("203.0.113.9")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
