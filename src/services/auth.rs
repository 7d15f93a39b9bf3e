//! Password hashing and session tokens.
//!
//! Access and refresh tokens are HS256 JWTs signed with separate secrets and
//! tagged with their kind so one can never be replayed as the other.

use crate::services::{ServiceError, ServiceResult};
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub kind: TokenKind,
    /// Unique per token so a rotated refresh token never equals its predecessor.
    pub jti: Uuid,
    pub exp: usize,
}

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub fn hash_password(password: &str) -> ServiceResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| ServiceError::Internal(format!("hashing password: {}", err)))
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Issues and verifies signed tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    access_secret: String,
    access_ttl: Duration,
    refresh_secret: String,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(
        access_secret: impl Into<String>,
        access_ttl: Duration,
        refresh_secret: impl Into<String>,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            access_secret: access_secret.into(),
            access_ttl,
            refresh_secret: refresh_secret.into(),
            refresh_ttl,
        }
    }

    fn secret(&self, kind: TokenKind) -> &str {
        match kind {
            TokenKind::Access => &self.access_secret,
            TokenKind::Refresh => &self.refresh_secret,
        }
    }

    fn issue(&self, kind: TokenKind, user_id: Uuid, username: &str) -> ServiceResult<String> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|err| ServiceError::Internal(format!("token ttl: {}", err)))?;
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            kind,
            jti: Uuid::new_v4(),
            exp: (chrono::Utc::now() + ttl).timestamp() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret(kind).as_bytes()),
        )
        .map_err(|err| ServiceError::Internal(format!("signing token: {}", err)))
    }

    pub fn issue_pair(&self, user_id: Uuid, username: &str) -> ServiceResult<TokenPair> {
        Ok(TokenPair {
            access_token: self.issue(TokenKind::Access, user_id, username)?,
            refresh_token: self.issue(TokenKind::Refresh, user_id, username)?,
        })
    }

    /// Decode and validate a token of the expected kind.
    pub fn verify(&self, token: &str, kind: TokenKind) -> ServiceResult<Claims> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret(kind).as_bytes()),
            &Validation::default(),
        )
        .map_err(|err| {
            tracing::warn!("rejected {:?} token: {}", kind, err);
            ServiceError::unauthorized("Invalid or expired token")
        })?;

        if data.claims.kind != kind {
            return Err(ServiceError::unauthorized("Invalid or expired token"));
        }
        Ok(data.claims)
    }
}
