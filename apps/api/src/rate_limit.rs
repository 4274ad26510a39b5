//! # Rate Limiter
//!
//! Fixed-window request counter per client address.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  RateLimiter (owned by AppState, cloned into the middleware)           │
//! │                                                                         │
//! │  "203.0.113.9" ──► Window { count: 41, reset_at: t0 + window }         │
//! │  "198.51.100.2" ─► Window { count: 3,  reset_at: ... }                 │
//! │                                                                         │
//! │  check(key):                                                            │
//! │    expired or absent  → new window, count = 1                           │
//! │    count < max        → count += 1, allowed                             │
//! │    count == max       → limited until reset_at                          │
//! │                                                                         │
//! │  Bounded: at max_keys, expired windows are dropped first, then the     │
//! │  window that resets soonest. A sweep task drops expired windows.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Time comes from `tokio::time::Instant`, so tests drive windows with a
//! paused clock.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: Instant,
}

/// Outcome of one [`RateLimiter::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

/// Bounded per-key request counter.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    windows: Arc<Mutex<HashMap<String, Window>>>,
    max_requests: u32,
    window: Duration,
    max_keys: usize,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration, max_keys: usize) -> Self {
        RateLimiter {
            windows: Arc::new(Mutex::new(HashMap::new())),
            max_requests,
            window,
            max_keys: max_keys.max(1),
        }
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Counts one request for `key`.
    pub fn check(&self, key: &str) -> Decision {
        let now = Instant::now();
        let mut windows = self.lock();

        if let Some(window) = windows.get_mut(key) {
            if window.reset_at > now {
                if window.count >= self.max_requests {
                    return Decision::Limited {
                        retry_after: window.reset_at - now,
                    };
                }
                window.count += 1;
                return Decision::Allowed {
                    remaining: self.max_requests - window.count,
                };
            }
            *window = Window {
                count: 1,
                reset_at: now + self.window,
            };
            return Decision::Allowed {
                remaining: self.max_requests - 1,
            };
        }

        if windows.len() >= self.max_keys {
            Self::make_room(&mut windows, now);
        }
        windows.insert(
            key.to_string(),
            Window {
                count: 1,
                reset_at: now + self.window,
            },
        );
        Decision::Allowed {
            remaining: self.max_requests.saturating_sub(1),
        }
    }

    /// Drops expired windows, returning how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut windows = self.lock();
        let before = windows.len();
        windows.retain(|_, w| w.reset_at > now);
        before - windows.len()
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs [`sweep`](Self::sweep) every `every` until the limiter is dropped.
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let windows: Weak<Mutex<HashMap<String, Window>>> = Arc::downgrade(&self.windows);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(windows) = windows.upgrade() else { break };
                let now = Instant::now();
                let mut guard = windows.lock().unwrap_or_else(PoisonError::into_inner);
                let before = guard.len();
                guard.retain(|_, w| w.reset_at > now);
                let removed = before - guard.len();
                if removed > 0 {
                    debug!(removed, remaining = guard.len(), "Rate limit sweep");
                }
            }
        })
    }

    fn make_room(windows: &mut HashMap<String, Window>, now: Instant) {
        windows.retain(|_, w| w.reset_at > now);
        if windows.is_empty() {
            return;
        }
        let oldest = windows
            .iter()
            .min_by_key(|(_, w)| w.reset_at)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            windows.remove(&key);
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Window>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// Middleware
// =============================================================================

/// Client key: first `X-Forwarded-For` hop behind a trusted proxy,
/// otherwise the peer address.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    if trust_proxy {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Rejects the request with `rate_limit_exceeded` once the client's
/// window is used up.
pub async fn enforce(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let key = client_key(request.headers(), peer, state.config.trust_proxy);

    match state.limiter.check(&key) {
        Decision::Allowed { remaining } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert(
                "ratelimit-limit",
                HeaderValue::from(state.limiter.max_requests()),
            );
            headers.insert("ratelimit-remaining", HeaderValue::from(remaining));
            response
        }
        Decision::Limited { retry_after } => {
            warn!(client = %key, path = %request.uri().path(), "Rate limit exceeded");
            ApiError::RateLimited {
                retry_after_secs: retry_after.as_secs().max(1),
            }
            .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_limits_then_resets_after_window() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60), 100);

        for expected in [2, 1, 0] {
            assert_eq!(limiter.check("10.0.0.1"), Decision::Allowed { remaining: expected });
        }
        assert!(matches!(limiter.check("10.0.0.1"), Decision::Limited { .. }));

        // Other clients are counted separately
        assert_eq!(limiter.check("10.0.0.2"), Decision::Allowed { remaining: 2 });

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(limiter.check("10.0.0.1"), Decision::Allowed { remaining: 2 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_counts_down() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60), 100);
        limiter.check("a");

        tokio::time::advance(Duration::from_secs(20)).await;
        assert_eq!(
            limiter.check("a"),
            Decision::Limited {
                retry_after: Duration::from_secs(40)
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_evicts_oldest_window() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60), 2);
        limiter.check("first");
        tokio::time::advance(Duration::from_secs(1)).await;
        limiter.check("second");
        tokio::time::advance(Duration::from_secs(1)).await;
        limiter.check("third");

        assert_eq!(limiter.len(), 2);
        // "first" was evicted, so it starts a fresh window
        assert_eq!(limiter.check("first"), Decision::Allowed { remaining: 4 });
        assert_eq!(limiter.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_drops_expired_windows() {
        let limiter = RateLimiter::new(5, Duration::from_secs(10), 100);
        limiter.check("a");
        limiter.check("b");
        tokio::time::advance(Duration::from_secs(5)).await;
        limiter.check("c");

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(limiter.sweep(), 2);
        assert_eq!(limiter.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_task_runs_periodically() {
        let limiter = RateLimiter::new(5, Duration::from_secs(10), 100);
        let handle = limiter.spawn_sweeper(Duration::from_secs(30));
        limiter.check("a");

        // The paused clock auto-advances while this task sleeps, letting
        // the sweeper tick at 30s first.
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(limiter.is_empty());
        handle.abort();
    }

    #[test]
    fn test_client_key_prefers_forwarded_header_only_when_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        let peer: SocketAddr = "10.0.0.1:5000".parse().unwrap();

        assert_eq!(client_key(&headers, Some(peer), true), "203.0.113.9");
        assert_eq!(client_key(&headers, Some(peer), false), "10.0.0.1");
        assert_eq!(client_key(&HeaderMap::new(), None, false), "unknown");
    }
}
