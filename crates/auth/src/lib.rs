//! Credential issuance and verification for the Swapmeet backend.
//!
//! The real-time layer treats this crate as its identity provider: it hands a
//! bearer token to [`Authenticator::verify_credential`] and trusts the verdict.

use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use cuid2::CuidConstructor;
use once_cell::sync::Lazy;
use rand::RngCore;
use serde::Serialize;
use sqlx::{Row, SqlitePool, Transaction};
use swapmeet_config::AuthConfig;
use thiserror::Error;
use tracing::debug;

static CUID: Lazy<CuidConstructor> = Lazy::new(CuidConstructor::new);

#[derive(Clone)]
pub struct Authenticator {
    pool: SqlitePool,
    session_ttl: Duration,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("user already exists")]
    UserExists,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("user not found")]
    UserNotFound,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("password hashing failed: {0}")]
    PasswordHash(#[from] argon2::password_hash::Error),
    #[error("session not found")]
    SessionNotFound,
    #[error("session expired")]
    SessionExpired,
    #[error("invalid session token")]
    InvalidSession,
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    #[serde(skip_serializing)]
    pub id: i64,
    pub public_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
}

impl Authenticator {
    pub fn new(pool: SqlitePool, config: AuthConfig) -> Self {
        let session_ttl = Duration::seconds(config.session_ttl_seconds as i64);

        Self { pool, session_ttl }
    }

    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    pub async fn register_with_password(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<User, AuthError> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query("SELECT id FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&mut *tx)
            .await?;

        if existing.is_some() {
            return Err(AuthError::UserExists);
        }

        let now = Utc::now();
        let password_hash = self.hash_password(password)?;

        let user = self
            .insert_user(&mut tx, Some(email.to_owned()), display_name)
            .await?;

        sqlx::query(
            "INSERT INTO user_identities (user_id, provider, provider_uid, secret, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(user.id)
        .bind("password")
        .bind(email)
        .bind(password_hash)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(user = %user.public_id, "registered password identity");
        Ok(user)
    }

    pub async fn login_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, AuthError> {
        let identity = sqlx::query(
            "SELECT user_id, secret FROM user_identities WHERE provider = 'password' AND provider_uid = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = identity else {
            return Err(AuthError::InvalidCredentials);
        };

        let secret: String = row.try_get("secret")?;
        let stored_hash = PasswordHash::new(&secret)?;
        Argon2::default()
            .verify_password(password.as_bytes(), &stored_hash)
            .map_err(|_| AuthError::InvalidCredentials)?;

        let user_id: i64 = row.try_get("user_id")?;
        self.fetch_user(user_id).await?;

        self.issue_session(user_id).await
    }

    /// Verify an opaque bearer credential and resolve the identity behind it.
    ///
    /// Expired sessions are deleted as a side effect so the table does not
    /// accumulate dead rows.
    pub async fn verify_credential(&self, token: &str) -> Result<(User, AuthSession), AuthError> {
        let row = sqlx::query("SELECT user_id, expires_at FROM sessions WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Err(AuthError::SessionNotFound);
        };

        let user_id: i64 = row.try_get("user_id")?;
        let expires_at: String = row.try_get("expires_at")?;

        let expires_at = DateTime::parse_from_rfc3339(&expires_at)
            .map_err(|_| AuthError::InvalidSession)?
            .with_timezone(&Utc);

        if expires_at <= Utc::now() {
            sqlx::query("DELETE FROM sessions WHERE token = ?")
                .bind(token)
                .execute(&self.pool)
                .await?;
            return Err(AuthError::SessionExpired);
        }

        let user = self.fetch_user(user_id).await?;
        let session = AuthSession {
            token: token.to_owned(),
            user_id,
            expires_at,
        };

        Ok((user, session))
    }

    /// Resolve the public profile for a user by public id.
    pub async fn user_summary(&self, public_id: &str) -> Result<User, AuthError> {
        let row = sqlx::query("SELECT id FROM users WHERE public_id = ?")
            .bind(public_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Err(AuthError::UserNotFound);
        };

        self.fetch_user(row.try_get("id")?).await
    }

    async fn insert_user(
        &self,
        tx: &mut Transaction<'_, sqlx::Sqlite>,
        email: Option<String>,
        display_name: Option<&str>,
    ) -> Result<User, AuthError> {
        let now = Utc::now().to_rfc3339();
        let public_id = new_public_id();

        sqlx::query(
            "INSERT INTO users (public_id, email, display_name, avatar_url, created_at, updated_at) VALUES (?, ?, ?, NULL, ?, ?)",
        )
        .bind(&public_id)
        .bind(email.as_deref())
        .bind(display_name)
        .bind(&now)
        .bind(&now)
        .execute(&mut **tx)
        .await?;

        let row = sqlx::query("SELECT id FROM users WHERE public_id = ?")
            .bind(&public_id)
            .fetch_one(&mut **tx)
            .await?;

        Ok(User {
            id: row.try_get("id")?,
            public_id,
            email,
            display_name: display_name.map(str::to_owned),
            avatar_url: None,
        })
    }

    async fn fetch_user(&self, id: i64) -> Result<User, AuthError> {
        let row = sqlx::query(
            "SELECT id, public_id, email, display_name, avatar_url FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Err(AuthError::UserNotFound);
        };

        Ok(User {
            id,
            public_id: row.try_get("public_id")?,
            email: row.try_get("email")?,
            display_name: row.try_get("display_name")?,
            avatar_url: row.try_get("avatar_url")?,
        })
    }

    async fn issue_session(&self, user_id: i64) -> Result<AuthSession, AuthError> {
        let token = self.generate_session_token();
        let now = Utc::now();
        let expires_at = now + self.session_ttl;

        sqlx::query(
            "INSERT INTO sessions (user_id, token, created_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(&token)
        .bind(now.to_rfc3339())
        .bind(expires_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(AuthSession {
            token,
            user_id,
            expires_at,
        })
    }

    fn hash_password(&self, password: &str) -> Result<String, argon2::password_hash::Error> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
        Ok(hash.to_string())
    }

    fn generate_session_token(&self) -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }
}

fn new_public_id() -> String {
    CUID.create_id()
}
