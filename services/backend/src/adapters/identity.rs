//! services/backend/src/adapters/identity.rs
//!
//! Resolves opaque bearer tokens against the `auth_sessions` table written
//! by the account service. Token contents are never inspected here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ghost_gym_core::domain::Identity;
use ghost_gym_core::ports::{IdentityProvider, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use tracing::debug;

#[derive(Clone)]
pub struct PgIdentityProvider {
    pool: PgPool,
}

impl PgIdentityProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct AuthSessionRecord {
    user_id: String,
    email: Option<String>,
    expires_at: DateTime<Utc>,
}

impl AuthSessionRecord {
    fn to_domain(self, now: DateTime<Utc>) -> Option<Identity> {
        (self.expires_at > now).then(|| Identity {
            uid: self.user_id,
            email: self.email,
        })
    }
}

#[async_trait]
impl IdentityProvider for PgIdentityProvider {
    async fn verify(&self, token: &str) -> PortResult<Option<Identity>> {
        let token = token.trim();
        if token.is_empty() {
            return Ok(None);
        }
        let record = sqlx::query_as::<_, AuthSessionRecord>(
            "SELECT user_id, email, expires_at FROM auth_sessions WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let identity = record.and_then(|r| r.to_domain(Utc::now()));
        if identity.is_none() {
            debug!("Rejected unknown or expired token");
        }
        Ok(identity)
    }
}

/// Used when no database is configured: every token is rejected, so every
/// caller is anonymous.
pub struct NoIdentityProvider;

#[async_trait]
impl IdentityProvider for NoIdentityProvider {
    async fn verify(&self, _token: &str) -> PortResult<Option<Identity>> {
        Ok(None)
    }
}
