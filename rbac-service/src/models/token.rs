use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted token classes. Access tokens are stateless and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Refresh,
    Reset,
    Verification,
    /// Blacklist entry; terminal.
    Revoked,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Refresh => "refresh",
            TokenType::Reset => "reset",
            TokenType::Verification => "verification",
            TokenType::Revoked => "revoked",
        }
    }
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token record held by the token store.
///
/// `token_value` is unique per `token_type`. Revocation entries may carry an
/// empty `user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub user_id: String,
    pub token_type: TokenType,
    pub token_value: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Token {
    /// Create a token record expiring `ttl` from now, or never when `ttl` is `None`.
    ///
    /// A `ttl` past the end of the calendar saturates at the latest instant.
    pub fn new(
        user_id: String,
        token_type: TokenType,
        token_value: String,
        ttl: Option<Duration>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            token_type,
            token_value,
            created_at: now,
            expires_at: ttl.map(|ttl| {
                now.checked_add_signed(ttl)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC)
            }),
        }
    }

    /// Blacklist entry for `token_value`.
    pub fn revocation(token_value: String, user_id: String) -> Self {
        Self::new(user_id, TokenType::Revoked, token_value, None)
    }

    /// Check if this token is expired
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|expires_at| Utc::now() > expires_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_expiry() {
        let mut token = Token::new(
            "user_123".to_string(),
            TokenType::Reset,
            "value".to_string(),
            Some(Duration::hours(24)),
        );
        assert!(!token.is_expired());

        // Simulate expiry
        token.expires_at = Some(Utc::now() - Duration::seconds(1));
        assert!(token.is_expired());
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let token = Token::new(
            "user_123".to_string(),
            TokenType::Refresh,
            "value".to_string(),
            Some(Duration::days(1_000_000_000)),
        );
        assert_eq!(token.expires_at, Some(DateTime::<Utc>::MAX_UTC));
        assert!(!token.is_expired());
    }

    #[test]
    fn test_revocation_never_expires() {
        let token = Token::revocation("value".to_string(), String::new());
        assert_eq!(token.token_type, TokenType::Revoked);
        assert!(token.expires_at.is_none());
        assert!(!token.is_expired());
    }

    #[test]
    fn test_token_type_serializes_snake_case() {
        let json = serde_json::to_string(&TokenType::Verification).unwrap();
        assert_eq!(json, "\"verification\"");
    }
}
