//! Security response headers.
//!
//! Added to every response, errors included:
//!
//! | Header                      | Value                                      |
//! |-----------------------------|--------------------------------------------|
//! | `X-Frame-Options`           | `DENY`                                     |
//! | `X-Content-Type-Options`    | `nosniff`                                  |
//! | `Content-Security-Policy`   | [`CONTENT_SECURITY_POLICY`]                |
//! | `Referrer-Policy`           | `strict-origin-when-cross-origin`          |
//! | `Permissions-Policy`        | camera, microphone, geolocation disabled   |
//! | `Strict-Transport-Security` | production over HTTPS only                 |

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Uri};
use axum::middleware::Next;
use axum::response::Response;

use crate::AppState;

pub const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; script-src 'self'; \
     style-src 'self' 'unsafe-inline'; img-src 'self' data:; font-src 'self' data:; \
     connect-src 'self'; frame-ancestors 'none'; base-uri 'self'; form-action 'self'";

const PERMISSIONS_POLICY: &str = "camera=(), microphone=(), geolocation=()";

const HSTS: &str = "max-age=31536000; includeSubDomains";

/// Whether the request reached us over HTTPS, directly or through a
/// TLS-terminating proxy.
pub fn is_https(headers: &HeaderMap, uri: &Uri) -> bool {
    if uri.scheme_str() == Some("https") {
        return true;
    }
    headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|proto| proto.trim().eq_ignore_ascii_case("https"))
        .unwrap_or(false)
}

/// Writes the fixed header set, plus HSTS when `hsts` is set.
pub fn apply_headers(headers: &mut HeaderMap, hsts: bool) {
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(CONTENT_SECURITY_POLICY),
    );
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert("permissions-policy", HeaderValue::from_static(PERMISSIONS_POLICY));
    if hsts {
        headers.insert(header::STRICT_TRANSPORT_SECURITY, HeaderValue::from_static(HSTS));
    }
}

pub async fn security_headers(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let hsts = state.config.environment.is_production() && is_https(request.headers(), request.uri());
    let mut response = next.run(request).await;
    apply_headers(response.headers_mut(), hsts);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forwarded_proto_detects_https() {
        let mut headers = HeaderMap::new();
        let uri: Uri = "/api/health".parse().unwrap();
        assert!(!is_https(&headers, &uri));

        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        assert!(is_https(&headers, &uri));

        headers.insert("x-forwarded-proto", HeaderValue::from_static("http"));
        assert!(!is_https(&headers, &uri));
    }

    #[test]
    fn test_hsts_only_when_requested() {
        let mut headers = HeaderMap::new();
        apply_headers(&mut headers, false);
        assert_eq!(headers["x-frame-options"], "DENY");
        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert_eq!(headers["referrer-policy"], "strict-origin-when-cross-origin");
        assert!(headers["permissions-policy"]
            .to_str()
            .unwrap()
            .contains("camera=()"));
        assert!(headers.get("strict-transport-security").is_none());

        apply_headers(&mut headers, true);
        assert!(headers.get("strict-transport-security").is_some());
    }
}
