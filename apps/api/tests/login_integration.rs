//! End-to-end tests against PostgreSQL.
//!
//! To run these tests:
//! 1. Point `TEST_DATABASE_URL` at a disposable database
//! 2. cargo test -p bistro-api --test login_integration
//!
//! Without `TEST_DATABASE_URL` every test returns early.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use bistro_api::{build_router, ApiConfig, AppState};
use bistro_core::{Permission, PermissionAction, Role};
use bistro_db::maintenance::{self, ProvisionOptions};
use bistro_db::repository::user::NewUser;
use bistro_db::{Database, DbConfig};

const ADMIN_EMAIL: &str = "admin@bistro.test";
const ADMIN_PASSWORD: &str = "admin-pass-123";

async fn test_app() -> Option<(Router, Database)> {
    let url = match std::env::var("TEST_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("TEST_DATABASE_URL not set, skipping");
            return None;
        }
    };
    let db = Database::new(DbConfig::new(url).max_connections(4))
        .await
        .expect("Failed to connect to test database");

    maintenance::provision(
        &db,
        &ProvisionOptions {
            branch_code: "main".to_string(),
            branch_name: "Main Branch".to_string(),
            admin: Some((ADMIN_EMAIL.to_string(), ADMIN_PASSWORD.to_string())),
        },
    )
    .await
    .expect("provisioning failed");

    let config = ApiConfig {
        jwt_secret: "login-test-secret".to_string(),
        ..ApiConfig::default()
    };
    let state = AppState::new(config, Some(db.clone()));
    Some((build_router(state).unwrap(), db))
}

fn post_json(uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_with(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn login(app: &Router, email: &str, password: &str) -> Response {
    app.clone()
        .oneshot(post_json(
            "/api/auth/login",
            json!({ "email": email, "password": password }),
            None,
        ))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_login_outcomes() {
    let Some((app, db)) = test_app().await else { return };

    // Valid admin
    let response = login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let token = body["token"].as_str().unwrap().to_string();
    assert!(!token.is_empty());
    assert_eq!(body["user"]["role"], "admin");

    // Email match ignores case
    let response = login(&app, &ADMIN_EMAIL.to_uppercase(), ADMIN_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);

    // Wrong password
    let response = login(&app, ADMIN_EMAIL, "not-the-password").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "invalid_credentials");

    // Unknown email
    let response = login(&app, "nobody@bistro.test", ADMIN_PASSWORD).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "not_found");

    // The token works for /me
    let response = app.clone().oneshot(get_with("/api/auth/me", &token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["user"]["email"], ADMIN_EMAIL);

    // Inactive users cannot log in
    let email = format!("cashier{}@bistro.test", std::process::id());
    let cashier = match db
        .users()
        .create(&NewUser {
            email: email.clone(),
            password: "cashier-pass-1".to_string(),
            full_name: "Night Cashier".to_string(),
            role: Role::Cashier,
            default_branch: "main".to_string(),
        })
        .await
    {
        Ok(user) => user,
        Err(_) => db.users().find_credentials(&email).await.unwrap().unwrap().user,
    };
    db.users().set_active(cashier.id, false).await.unwrap();

    let response = login(&app, &email, "cashier-pass-1").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "invalid_credentials");
}

/// Creates (or reuses) an active user and returns its id.
async fn ensure_user(db: &Database, email: &str, password: &str, role: Role, branch: &str) -> i64 {
    let id = match db.users().find_credentials(email).await.unwrap() {
        Some(existing) => existing.user.id,
        None => db
            .users()
            .create(&NewUser {
                email: email.to_string(),
                password: password.to_string(),
                full_name: "Test User".to_string(),
                role,
                default_branch: branch.to_string(),
            })
            .await
            .unwrap()
            .id,
    };
    db.users().set_active(id, true).await.unwrap();
    id
}

async fn token_for(app: &Router, email: &str, password: &str) -> String {
    let response = login(app, email, password).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_cashier_without_grants_is_forbidden() {
    let Some((app, db)) = test_app().await else { return };

    let email = format!("waiter{}@bistro.test", std::process::id());
    if db.users().find_credentials(&email).await.unwrap().is_none() {
        db.users()
            .create(&NewUser {
                email: email.clone(),
                password: "waiter-pass-1".to_string(),
                full_name: "Waiter".to_string(),
                role: Role::Cashier,
                default_branch: "main".to_string(),
            })
            .await
            .unwrap();
    }

    let response = login(&app, &email, "waiter-pass-1").await;
    let token = body_json(response).await["token"].as_str().unwrap().to_string();

    let response = app.clone().oneshot(get_with("/api/journal", &token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "forbidden");
}

#[tokio::test]
async fn test_draft_round_trip_over_http() {
    let Some((app, db)) = test_app().await else { return };

    for (id, name, price) in [(212_i64, "Chicken Shawarma", 1800_i64), (213, "Falafel Plate", 1500)] {
        sqlx::query(
            "INSERT INTO products (id, name, price_cents) VALUES ($1, $2, $3) ON CONFLICT (id) DO NOTHING",
        )
        .bind(id)
        .bind(name)
        .bind(price)
        .execute(db.pool())
        .await
        .unwrap();
    }
    sqlx::query(
        "UPDATE orders SET status = 'cancelled' \
         WHERE branch = 'china_town' AND table_number = '5' AND status IN ('draft', 'open', 'busy')",
    )
    .execute(db.pool())
    .await
    .unwrap();

    let token = body_json(login(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await).await["token"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/pos/save-draft",
            json!({
                "branch": "china_town",
                "table": "5",
                "items": [{ "id": 212, "qty": 1 }, { "id": 213, "qty": 2 }]
            }),
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let saved = body_json(response).await;
    assert_eq!(saved["storage_key"], "pos_order_china_town_5");
    let order_id = saved["order"]["id"].as_i64().unwrap();

    let item_ids = |order: &Value| {
        let mut ids: Vec<i64> = order["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["product_id"].as_i64().unwrap())
            .collect();
        ids.sort();
        ids
    };

    let response = app
        .clone()
        .oneshot(get_with(&format!("/api/orders/{}", order_id), &token))
        .await
        .unwrap();
    assert_eq!(item_ids(&body_json(response).await), vec![212, 213]);

    let response = app
        .clone()
        .oneshot(get_with(
            "/api/orders?branch=china_town&table=5&status=DRAFT,OPEN",
            &token,
        ))
        .await
        .unwrap();
    let listed = body_json(response).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(item_ids(&listed[0]), vec![212, 213]);
}

#[tokio::test]
async fn test_unfiltered_list_stays_in_callers_branch() {
    let Some((app, db)) = test_app().await else { return };

    let email = format!("branchcashier{}@bistro.test", std::process::id());
    let cashier_id = ensure_user(&db, &email, "branch-pass-1", Role::Cashier, "china_town").await;
    db.users()
        .set_permissions(
            cashier_id,
            &[Permission {
                screen: "orders".to_string(),
                branch: "china_town".to_string(),
                action: PermissionAction::View,
                allowed: true,
            }],
        )
        .await
        .unwrap();

    let table = format!("scope{}", std::process::id());
    for branch in ["china_town", "main"] {
        sqlx::query(
            "INSERT INTO orders (branch, table_number, status) VALUES ($1, $2, 'closed')",
        )
        .bind(branch)
        .bind(&table)
        .execute(db.pool())
        .await
        .unwrap();
    }

    let token = token_for(&app, &email, "branch-pass-1").await;

    // No branch in the query: only the cashier's own branch comes back
    let response = app
        .clone()
        .oneshot(get_with(&format!("/api/orders?table={}", table), &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed = body_json(response).await;
    let branches: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["branch"].as_str().unwrap())
        .collect();
    assert!(!branches.is_empty());
    assert!(branches.iter().all(|b| *b == "china_town"));

    // Asking for another branch is checked against that branch
    let response = app
        .clone()
        .oneshot(get_with(&format!("/api/orders?branch=main&table={}", table), &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Admins still see every branch
    let admin = token_for(&app, ADMIN_EMAIL, ADMIN_PASSWORD).await;
    let response = app
        .clone()
        .oneshot(get_with(&format!("/api/orders?table={}", table), &admin))
        .await
        .unwrap();
    let listed = body_json(response).await;
    assert!(listed.as_array().unwrap().iter().any(|o| o["branch"] == "main"));
}

#[tokio::test]
async fn test_deactivated_account_loses_issued_token() {
    let Some((app, db)) = test_app().await else { return };

    let email = format!("leaving{}@bistro.test", std::process::id());
    let user_id = ensure_user(&db, &email, "leaving-pass-1", Role::Admin, "main").await;
    let token = token_for(&app, &email, "leaving-pass-1").await;

    let response = app.clone().oneshot(get_with("/api/journal", &token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    db.users().set_active(user_id, false).await.unwrap();

    for uri in ["/api/auth/me", "/api/journal", "/api/users"] {
        let response = app.clone().oneshot(get_with(uri, &token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(body_json(response).await["error"], "unauthorized", "{}", uri);
    }

    // Reactivated accounts work again with the same token
    db.users().set_active(user_id, true).await.unwrap();
    let response = app.clone().oneshot(get_with("/api/auth/me", &token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
