use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{Token, TokenType};
use crate::repository::{RepositoryError, TokenRepository};
use crate::services::RbacError;

/// Random bytes behind every opaque token value.
const OPAQUE_TOKEN_BYTES: usize = 32;

/// Claims carried by a signed access token.
///
/// Every field except the registered `iat`/`exp`/`jti` is required when
/// decoding; a token missing any of them is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub role_ids: Vec<String>,
    /// Issued at (Unix timestamp). Filled on generation when unset.
    #[serde(rename = "iat", default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<i64>,
    /// Expiration time (Unix timestamp). Filled on generation when unset.
    #[serde(rename = "exp", default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    /// JWT ID, so tokens minted in the same second stay distinct.
    #[serde(rename = "jti", default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
}

impl TokenClaims {
    pub fn new(
        user_id: impl Into<String>,
        username: impl Into<String>,
        email: impl Into<String>,
        role_ids: Vec<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            email: email.into(),
            role_ids,
            issued_at: None,
            expires_at: None,
            token_id: None,
        }
    }
}

/// Lifetimes for each token class.
#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub access_token_ttl: Duration,
    /// `None` leaves refresh tokens valid until revoked.
    pub refresh_token_ttl: Option<Duration>,
    pub password_reset_ttl: Duration,
    pub email_verification_ttl: Duration,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            access_token_ttl: Duration::hours(1),
            refresh_token_ttl: Some(Duration::days(30)),
            password_reset_ttl: Duration::hours(24),
            email_verification_ttl: Duration::days(7),
        }
    }
}

/// Issues, validates, rotates and revokes every token class.
///
/// Access tokens are HS256 JWTs and are never stored; the other classes are
/// opaque random values kept in the token store.
#[derive(Clone)]
pub struct TokenService {
    tokens: Arc<dyn TokenRepository>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    settings: TokenSettings,
}

impl TokenService {
    pub fn new(
        secret: &[u8],
        settings: TokenSettings,
        tokens: Arc<dyn TokenRepository>,
    ) -> Result<Self, RbacError> {
        if secret.is_empty() {
            return Err(RbacError::InvalidInput(
                "token signing secret must not be empty".to_string(),
            ));
        }
        Ok(Self {
            tokens,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            settings,
        })
    }

    pub fn settings(&self) -> &TokenSettings {
        &self.settings
    }

    // ==================== Access Tokens ====================

    /// Sign `claims` as a compact JWT, filling `iat`, `exp` and `jti` when unset.
    pub fn generate_token(&self, claims: &TokenClaims) -> Result<String, RbacError> {
        if claims.user_id.is_empty() {
            return Err(RbacError::InvalidInput("user_id is required".to_string()));
        }

        let now = Utc::now();
        let mut claims = claims.clone();
        claims.issued_at.get_or_insert(now.timestamp());
        if claims.expires_at.is_none() {
            let expires_at = now
                .checked_add_signed(self.settings.access_token_ttl)
                .ok_or_else(|| {
                    RbacError::InvalidInput("access token lifetime is out of range".to_string())
                })?;
            claims.expires_at = Some(expires_at.timestamp());
        }
        claims
            .token_id
            .get_or_insert_with(|| Uuid::new_v4().to_string());

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| RbacError::Internal(anyhow::anyhow!("Failed to encode access token: {}", e)))
    }

    /// Verify an access token and return its claims.
    ///
    /// Blacklisted tokens are rejected before the signature is checked.
    pub async fn validate_token(&self, token: &str) -> Result<TokenClaims, RbacError> {
        if token.is_empty() {
            return Err(RbacError::InvalidToken);
        }
        if self.is_revoked(token).await? {
            tracing::debug!("Rejected revoked access token");
            return Err(RbacError::InvalidToken);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "iat"]);
        // A token is expired the second its `exp` passes.
        validation.leeway = 0;

        let data = decode::<TokenClaims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => RbacError::ExpiredToken,
                _ => {
                    tracing::debug!(error = %e, "Access token failed verification");
                    RbacError::InvalidToken
                }
            }
        })?;

        if data.claims.user_id.trim().is_empty() {
            return Err(RbacError::InvalidToken);
        }
        Ok(data.claims)
    }

    // ==================== Refresh Tokens ====================

    pub async fn generate_refresh_token(&self, user_id: &str) -> Result<String, RbacError> {
        self.issue(user_id, TokenType::Refresh, self.settings.refresh_token_ttl)
            .await
    }

    /// Return the owner of a live refresh token. Expired tokens are deleted.
    ///
    /// A blacklisted value is rejected even if its refresh record survived
    /// revocation.
    pub async fn validate_refresh_token(&self, value: &str) -> Result<String, RbacError> {
        if self.is_revoked(value).await? {
            tracing::debug!("Rejected revoked refresh token");
            return Err(RbacError::TokenNotFound);
        }

        let token = self
            .tokens
            .find_token_by_value(TokenType::Refresh, value)
            .await?
            .ok_or(RbacError::TokenNotFound)?;

        if token.is_expired() {
            self.discard(&token).await;
            return Err(RbacError::ExpiredToken);
        }
        Ok(token.user_id)
    }

    /// Exchange a refresh token for a new one; the old value is blacklisted first.
    ///
    /// The old record is taken from the store in one step, so concurrent
    /// rotations of the same value succeed at most once.
    /// Returns the owning user id and the new refresh token.
    pub async fn rotate_refresh_token(&self, value: &str) -> Result<(String, String), RbacError> {
        if self.is_revoked(value).await? {
            return Err(RbacError::TokenNotFound);
        }

        let token = self
            .tokens
            .consume_token(TokenType::Refresh, value)
            .await?
            .ok_or(RbacError::TokenNotFound)?;
        if token.is_expired() {
            return Err(RbacError::ExpiredToken);
        }

        let user_id = token.user_id;
        self.blacklist(value, &user_id).await?;
        let rotated = self.generate_refresh_token(&user_id).await?;
        tracing::info!(user_id = %user_id, "Refresh token rotated");
        Ok((user_id, rotated))
    }

    // ==================== Revocation ====================

    /// Blacklist `value` and drop any refresh token with the same value.
    ///
    /// Works for access tokens and refresh tokens alike, and may be repeated.
    pub async fn revoke_token(&self, value: &str) -> Result<(), RbacError> {
        if value.is_empty() {
            return Err(RbacError::InvalidInput("token is required".to_string()));
        }

        let owner = match self
            .tokens
            .find_token_by_value(TokenType::Refresh, value)
            .await
        {
            Ok(token) => token.map(|t| t.user_id),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to look up refresh token owner during revocation");
                None
            }
        };

        self.blacklist(value, owner.as_deref().unwrap_or_default())
            .await?;

        if let Err(e) = self.tokens.delete_token(TokenType::Refresh, value).await {
            tracing::warn!(error = %e, "Failed to delete revoked refresh token");
        }

        tracing::info!(user_id = ?owner, "Token revoked");
        Ok(())
    }

    /// Revoke every refresh token held by `user_id`.
    pub async fn revoke_all_user_tokens(&self, user_id: &str) -> Result<(), RbacError> {
        if user_id.is_empty() {
            return Err(RbacError::InvalidInput("user_id is required".to_string()));
        }

        let tokens = self
            .tokens
            .find_tokens_by_user(TokenType::Refresh, user_id)
            .await?;
        for token in &tokens {
            self.blacklist(&token.token_value, user_id).await?;
        }
        let deleted = self
            .tokens
            .delete_tokens_by_user(TokenType::Refresh, user_id)
            .await?;

        tracing::info!(
            user_id = %user_id,
            revoked = tokens.len(),
            deleted = deleted,
            "All refresh tokens revoked"
        );
        Ok(())
    }

    pub async fn is_revoked(&self, value: &str) -> Result<bool, RbacError> {
        Ok(self
            .tokens
            .find_token_by_value(TokenType::Revoked, value)
            .await?
            .is_some())
    }

    // ==================== One-Time Tokens ====================

    pub async fn generate_password_reset_token(&self, user_id: &str) -> Result<String, RbacError> {
        self.issue(
            user_id,
            TokenType::Reset,
            Some(self.settings.password_reset_ttl),
        )
        .await
    }

    /// Consume a password reset token and return its owner.
    ///
    /// The token is gone after this call whatever the outcome.
    pub async fn validate_password_reset_token(&self, value: &str) -> Result<String, RbacError> {
        self.consume(TokenType::Reset, value).await
    }

    pub async fn generate_email_verification_token(
        &self,
        user_id: &str,
    ) -> Result<String, RbacError> {
        self.issue(
            user_id,
            TokenType::Verification,
            Some(self.settings.email_verification_ttl),
        )
        .await
    }

    /// Consume an email verification token and return its owner.
    pub async fn validate_email_verification_token(
        &self,
        value: &str,
    ) -> Result<String, RbacError> {
        self.consume(TokenType::Verification, value).await
    }

    // ==================== Maintenance ====================

    /// Delete every stored token past its expiry. Blacklist entries never expire.
    pub async fn purge_expired_tokens(&self) -> Result<u64, RbacError> {
        let deleted = self.tokens.delete_expired_tokens().await?;
        if deleted > 0 {
            tracing::info!(deleted = deleted, "Purged expired tokens");
        }
        Ok(deleted)
    }

    /// Run [`purge_expired_tokens`](Self::purge_expired_tokens) every `period`
    /// until the returned task is aborted.
    pub fn spawn_purge_task(&self, period: std::time::Duration) -> tokio::task::JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                if let Err(e) = service.purge_expired_tokens().await {
                    tracing::error!(error = %e, "Expired token purge failed");
                }
            }
        })
    }

    // ==================== Internals ====================

    async fn issue(
        &self,
        user_id: &str,
        token_type: TokenType,
        ttl: Option<Duration>,
    ) -> Result<String, RbacError> {
        if user_id.is_empty() {
            return Err(RbacError::InvalidInput("user_id is required".to_string()));
        }

        let value = generate_opaque_value();
        let token = Token::new(user_id.to_string(), token_type, value.clone(), ttl);
        self.tokens.store_token(&token).await?;

        tracing::debug!(user_id = %user_id, token_type = %token_type, "Token issued");
        Ok(value)
    }

    async fn consume(&self, token_type: TokenType, value: &str) -> Result<String, RbacError> {
        let token = self
            .tokens
            .consume_token(token_type, value)
            .await?
            .ok_or(RbacError::TokenNotFound)?;

        if token.is_expired() {
            tracing::debug!(user_id = %token.user_id, token_type = %token_type, "Expired one-time token consumed");
            return Err(RbacError::ExpiredToken);
        }
        Ok(token.user_id)
    }

    async fn blacklist(&self, value: &str, user_id: &str) -> Result<(), RbacError> {
        match self
            .tokens
            .store_token(&Token::revocation(value.to_string(), user_id.to_string()))
            .await
        {
            Ok(()) | Err(RepositoryError::Duplicate) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Best-effort removal of a stale token; failures are logged.
    async fn discard(&self, token: &Token) {
        if let Err(e) = self
            .tokens
            .delete_token(token.token_type, &token.token_value)
            .await
        {
            tracing::warn!(
                user_id = %token.user_id,
                token_type = %token.token_type,
                error = %e,
                "Failed to delete expired token"
            );
        }
    }
}

/// 32 bytes from the OS RNG, URL-safe base64 without padding (43 characters).
fn generate_opaque_value() -> String {
    let mut bytes = [0u8; OPAQUE_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
