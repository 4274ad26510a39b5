//! # Bistro API
//!
//! REST server for the restaurant frontend: POS, ledger, back office.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           Request Pipeline                              │
//! │                                                                         │
//! │  TraceLayer ─► security headers ─► CORS ─► rate limiter ─► Router      │
//! │                                                              │          │
//! │                         ┌────────────────────────────────────┘          │
//! │                         ▼                                               │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │  AuthUser      │  │  Handlers      │  │  bistro-db                 ││
//! │  │                │  │                │  │                            ││
//! │  │ • bearer JWT   │─►│ • pos, orders  │─►│ • repositories             ││
//! │  │ • permissions  │  │ • journal ...  │  │ • one tx per write         ││
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables (see [`config::ApiConfig::load`]):
//! - `DATABASE_URL` - PostgreSQL connection string (optional; without it
//!   data routes answer `db_not_configured`)
//! - `DATABASE_SSL` - require TLS to the database
//! - `APP_ENV` / `NODE_ENV` - `production` enables HSTS over HTTPS
//! - `HOST`, `PORT` - bind address (default `0.0.0.0:3000`)
//! - `JWT_SECRET`, `JWT_ACCESS_LIFETIME_SECS`
//! - `RATE_LIMIT_MAX_REQUESTS`, `RATE_LIMIT_WINDOW_MS`, `RATE_LIMIT_MAX_KEYS`
//! - `TRUST_PROXY` - read client address and scheme from `X-Forwarded-*`

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod security;

use std::sync::Arc;

use bistro_db::Database;

// Re-exports
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::build_router;

use crate::auth::JwtManager;
use crate::rate_limit::RateLimiter;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Option<Database>,
    pub config: Arc<ApiConfig>,
    pub jwt: Arc<JwtManager>,
    pub limiter: RateLimiter,
}

impl AppState {
    pub fn new(config: ApiConfig, db: Option<Database>) -> Self {
        let jwt = JwtManager::new(config.jwt_secret.clone(), config.jwt_access_lifetime_secs);
        let limiter = RateLimiter::new(
            config.rate_limit_max_requests,
            config.rate_limit_window,
            config.rate_limit_max_keys,
        );
        AppState {
            db,
            config: Arc::new(config),
            jwt: Arc::new(jwt),
            limiter,
        }
    }

    /// The database, or `db_not_configured`.
    pub fn db(&self) -> ApiResult<&Database> {
        self.db.as_ref().ok_or(ApiError::DbNotConfigured)
    }
}
