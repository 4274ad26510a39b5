//! # User Repository
//!
//! Users, argon2 password hashes and per-screen permissions.
//!
//! The hash is loaded only through [`UserRepository::find_credentials`];
//! every other query returns a [`User`] without it.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use tracing::{info, warn};

use bistro_core::permissions::{PermissionSet, ANY_BRANCH, SCREENS};
use bistro_core::validation::{validate_branch, validate_email, validate_name};
use bistro_core::{Permission, Role, User, ValidationError};

use super::parse_column;
use crate::error::{DbError, DbResult};

/// Shortest password accepted for a new user.
pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, sqlx::FromRow)]
struct UserRecord {
    id: i64,
    email: String,
    full_name: String,
    role: String,
    default_branch: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl UserRecord {
    fn into_user(self) -> DbResult<User> {
        Ok(User {
            role: parse_column("role", &self.role)?,
            id: self.id,
            email: self.email,
            full_name: self.full_name,
            default_branch: self.default_branch,
            is_active: self.is_active,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct PermissionRecord {
    screen: String,
    branch: String,
    action: String,
    allowed: bool,
}

impl PermissionRecord {
    fn into_permission(self) -> DbResult<Permission> {
        Ok(Permission {
            action: parse_column("action", &self.action)?,
            screen: self.screen,
            branch: self.branch,
            allowed: self.allowed,
        })
    }
}

const USER_COLUMNS: &str = "id, email, full_name, role, default_branch, is_active, created_at";

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
    pub default_branch: String,
}

/// A user together with the stored password hash, for login.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

impl UserCredentials {
    pub fn verify(&self, password: &str) -> bool {
        verify_password(password, &self.password_hash)
    }
}

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        UserRepository { pool }
    }

    /// Case-insensitive lookup by email.
    pub async fn find_credentials(&self, email: &str) -> DbResult<Option<UserCredentials>> {
        #[derive(sqlx::FromRow)]
        struct Row {
            #[sqlx(flatten)]
            user: UserRecord,
            password_hash: String,
        }

        let row = sqlx::query_as::<_, Row>(&format!(
            "SELECT {}, password_hash FROM users WHERE LOWER(email) = LOWER($1)",
            USER_COLUMNS
        ))
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            Ok(UserCredentials {
                user: r.user.into_user()?,
                password_hash: r.password_hash,
            })
        })
        .transpose()
    }

    pub async fn list(&self) -> DbResult<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {} FROM users ORDER BY email",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(UserRecord::into_user).collect()
    }

    pub async fn get(&self, id: i64) -> DbResult<User> {
        sqlx::query_as::<_, UserRecord>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))?
            .into_user()
    }

    pub async fn create(&self, input: &NewUser) -> DbResult<User> {
        let email = input.email.trim();
        validate_email(email)?;
        validate_name("full_name", &input.full_name)?;
        validate_branch(&input.default_branch)?;
        validate_password(&input.password)?;

        let hash = hash_password(&input.password)?;

        let user = sqlx::query_as::<_, UserRecord>(&format!(
            r#"
            INSERT INTO users (email, password_hash, full_name, role, default_branch)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(email)
        .bind(&hash)
        .bind(input.full_name.trim())
        .bind(input.role.as_str())
        .bind(&input.default_branch)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("email", email),
            other => other,
        })?
        .into_user()?;

        info!(user_id = user.id, role = %user.role, "User created");
        Ok(user)
    }

    pub async fn set_active(&self, id: i64, is_active: bool) -> DbResult<User> {
        sqlx::query_as::<_, UserRecord>(&format!(
            "UPDATE users SET is_active = $2 WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .bind(is_active)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("User", id))?
        .into_user()
    }

    pub async fn permissions(&self, user_id: i64) -> DbResult<Vec<Permission>> {
        let records = sqlx::query_as::<_, PermissionRecord>(
            "SELECT screen, branch, action, allowed FROM user_permissions \
             WHERE user_id = $1 ORDER BY screen, branch, action",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(PermissionRecord::into_permission).collect()
    }

    /// Replaces a user's grants as a set.
    pub async fn set_permissions(&self, user_id: i64, grants: &[Permission]) -> DbResult<Vec<Permission>> {
        for grant in grants {
            if !SCREENS.contains(&grant.screen.as_str()) {
                return Err(ValidationError::NotAllowed {
                    field: "screen".to_string(),
                    allowed: SCREENS.iter().map(|s| s.to_string()).collect(),
                }
                .into());
            }
            if grant.branch != ANY_BRANCH {
                validate_branch(&grant.branch)?;
            }
        }

        let mut tx = self.pool.begin().await?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Err(DbError::not_found("User", user_id));
        }

        sqlx::query("DELETE FROM user_permissions WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        for grant in grants {
            sqlx::query(
                r#"
                INSERT INTO user_permissions (user_id, screen, branch, action, allowed)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (user_id, screen, branch, action) DO UPDATE SET allowed = EXCLUDED.allowed
                "#,
            )
            .bind(user_id)
            .bind(&grant.screen)
            .bind(&grant.branch)
            .bind(grant.action.as_str())
            .bind(grant.allowed)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(user_id, grants = grants.len(), "Permissions replaced");
        self.permissions(user_id).await
    }

    /// Role plus grants, ready for `allows` checks.
    pub async fn permission_set(&self, user_id: i64) -> DbResult<PermissionSet> {
        let user = self.get(user_id).await?;
        let grants = self.permissions(user_id).await?;
        Ok(PermissionSet::new(user.role, grants))
    }

    /// Creates the bootstrap admin unless a user with that email exists.
    /// Returns `true` when a user was created.
    pub async fn ensure_admin(&self, email: &str, password: &str, branch: &str) -> DbResult<bool> {
        if let Some(existing) = self.find_credentials(email).await? {
            if existing.user.role != Role::Admin {
                warn!(email, role = %existing.user.role, "Bootstrap email belongs to a non-admin user");
            }
            return Ok(false);
        }

        self.create(&NewUser {
            email: email.to_string(),
            password: password.to_string(),
            full_name: "Administrator".to_string(),
            role: Role::Admin,
            default_branch: branch.to_string(),
        })
        .await?;
        Ok(true)
    }
}

// =============================================================================
// Password hashing
// =============================================================================

fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::InvalidFormat {
            field: "password".to_string(),
            reason: format!("must be at least {} characters", MIN_PASSWORD_LEN),
        });
    }
    Ok(())
}

/// Hashes a password for storage (argon2id, random salt, PHC string).
pub fn hash_password(password: &str) -> DbResult<String> {
    use argon2::{
        password_hash::{rand_core::OsRng, SaltString},
        Argon2, PasswordHasher,
    };

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| DbError::Internal(format!("Failed to hash password: {}", e)))?;

    Ok(hash.to_string())
}

/// Verifies a password against a stored PHC hash. Malformed hashes fail.
pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};

    let parsed = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("s3cret-pass").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("s3cret-pass", &hash));
        assert!(!verify_password("wrong-pass", &hash));
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(!verify_password("anything", "not-a-hash"));
    }

    #[test]
    fn test_password_length() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("long enough").is_ok());
    }
}
