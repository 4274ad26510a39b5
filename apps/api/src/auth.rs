//! JWT authentication module.
//!
//! Handles token generation and validation, and the [`AuthUser`] extractor
//! that every protected handler takes.
//!
//! ```text
//! Authorization: Bearer <jwt>
//!        │
//!        ▼
//! AuthUser::from_request_parts ── missing / bad / expired ──► 401 unauthorized
//!        │
//!        ▼
//! users row reloaded ── deleted / deactivated ──► 401 unauthorized
//!        │                (role and branch taken from the row)
//!        ▼
//! handler ── auth.require(db, "journal", branch, Create) ── denied ──► 403 forbidden
//! ```

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use bistro_core::{PermissionAction, Role, User};
use bistro_db::{Database, DbError};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,

    pub email: String,

    pub role: Role,

    /// Default branch of the user
    pub branch: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// JWT ID (unique identifier for this token)
    pub jti: String,
}

/// JWT token manager.
pub struct JwtManager {
    secret: String,
    access_lifetime_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager.
    pub fn new(secret: String, access_lifetime_secs: i64) -> Self {
        JwtManager {
            secret,
            access_lifetime_secs,
        }
    }

    pub fn access_lifetime_secs(&self) -> i64 {
        self.access_lifetime_secs
    }

    /// Generate an access token for a user.
    pub fn generate_access_token(&self, user: &User) -> ApiResult<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.access_lifetime_secs);

        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role,
            branch: user.default_branch.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ApiError::Internal(format!("Failed to generate token: {}", e)))
    }

    /// Validate and decode a token.
    pub fn validate_token(&self, token: &str) -> ApiResult<Claims> {
        let validation = Validation::default();

        let token_data: TokenData<Claims> = decode(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| ApiError::Unauthorized(format!("Invalid token: {}", e)))?;

        Ok(token_data.claims)
    }
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

// =============================================================================
// Request Extractor
// =============================================================================

/// The authenticated caller, decoded from the bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub email: String,
    pub role: Role,
    pub branch: String,
}

impl AuthUser {
    /// Reloads the account behind the token. A deactivated or deleted user
    /// is rejected, and the stored role and branch replace the claims.
    async fn refresh(&mut self, db: &Database) -> ApiResult<()> {
        let current = match db.users().get(self.user_id).await {
            Ok(user) => user,
            Err(DbError::NotFound { .. }) => {
                return Err(ApiError::Unauthorized("account no longer exists".to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        if !current.is_active {
            debug!(user_id = self.user_id, "Token presented for deactivated account");
            return Err(ApiError::Unauthorized("account is deactivated".to_string()));
        }
        self.email = current.email;
        self.role = current.role;
        self.branch = current.default_branch;
        Ok(())
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Fails with `forbidden` unless the caller is an admin.
    pub fn require_admin(&self) -> ApiResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("admin role required".to_string()))
        }
    }

    /// Fails with `forbidden` unless the caller may perform `action` on
    /// `screen` in `branch`. Admins skip the database lookup.
    pub async fn require(
        &self,
        db: &Database,
        screen: &str,
        branch: &str,
        action: PermissionAction,
    ) -> ApiResult<()> {
        if self.is_admin() {
            return Ok(());
        }

        let permissions = db.users().permission_set(self.user_id).await?;
        if permissions.allows(screen, branch, action) {
            Ok(())
        } else {
            debug!(user_id = self.user_id, screen, branch, %action, "Permission denied");
            Err(ApiError::Forbidden(format!("{} on {} in {}", action, screen, branch)))
        }
    }
}

impl TryFrom<Claims> for AuthUser {
    type Error = ApiError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let user_id = claims
            .sub
            .parse()
            .map_err(|_| ApiError::Unauthorized("malformed subject".to_string()))?;
        Ok(AuthUser {
            user_id,
            email: claims.email,
            role: claims.role,
            branch: claims.branch,
        })
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;

        let token = extract_bearer_token(header)
            .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;

        let mut user: AuthUser = state.jwt.validate_token(token)?.try_into()?;
        // Without a database the claims are all there is.
        if let Some(db) = &state.db {
            user.refresh(db).await?;
        }
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> User {
        User {
            id: 7,
            email: "cashier@bistro.local".to_string(),
            full_name: "Front Counter".to_string(),
            role,
            default_branch: "china_town".to_string(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test-secret".to_string(), 3600);

        let token = manager.generate_access_token(&user(Role::Cashier)).unwrap();
        let claims = manager.validate_token(&token).unwrap();

        assert_eq!(claims.sub, "7");
        assert_eq!(claims.email, "cashier@bistro.local");
        assert_eq!(claims.role, Role::Cashier);
        assert_eq!(claims.branch, "china_town");
        assert_eq!(claims.exp - claims.iat, 3600);

        let auth = AuthUser::try_from(claims).unwrap();
        assert_eq!(auth.user_id, 7);
        assert!(!auth.is_admin());
        assert!(auth.require_admin().is_err());
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let issuer = JwtManager::new("secret-a".to_string(), 3600);
        let verifier = JwtManager::new("secret-b".to_string(), 3600);

        let token = issuer.generate_access_token(&user(Role::Admin)).unwrap();
        let err = verifier.validate_token(&token).unwrap_err();
        assert_eq!(err.code(), "unauthorized");
    }

    #[test]
    fn test_expired_token_is_rejected() {
        // Past the default 60s leeway
        let manager = JwtManager::new("test-secret".to_string(), -120);
        let token = manager.generate_access_token(&user(Role::Admin)).unwrap();
        assert!(manager.validate_token(&token).is_err());
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer_token("Bearer "), None);
        assert_eq!(extract_bearer_token("Basic dXNlcg=="), None);
    }
}
