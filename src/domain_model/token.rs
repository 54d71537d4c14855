use serde::{Deserialize, Serialize};
use std::fmt;

/// Short-lived bearer credential attached to ordinary requests.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(pub String);

/// Longer-lived credential used only for the refresh exchange.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefreshToken(pub String);

impl AccessToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl RefreshToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Tokens are credentials; keep them out of logs.
impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessToken({})", redact(&self.0))
    }
}

impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RefreshToken({})", redact(&self.0))
    }
}

fn redact(token: &str) -> String {
    let head: String = token.chars().take(6).collect();
    format!("{head}…")
}

/// A freshly issued access/refresh pair, always stored and replaced as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
}

/// Payload carried inside a mock token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    pub user_id: u64,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
    /// Milliseconds since the Unix epoch.
    pub expires_at: i64,
    pub random: String,
}

impl TokenClaims {
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms > self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_tokens() {
        let token = AccessToken("eyJ1c2VySWQiOjF9".to_string());
        assert_eq!(format!("{token:?}"), "AccessToken(eyJ1c2…)");
    }

    #[test]
    fn token_pair_uses_camel_case_wire_names() {
        let pair = TokenPair {
            access_token: AccessToken("A2".into()),
            refresh_token: RefreshToken("R2".into()),
        };
        let json = serde_json::to_value(&pair).unwrap();
        assert_eq!(json, serde_json::json!({"accessToken": "A2", "refreshToken": "R2"}));
    }

    #[test]
    fn expiry_is_strictly_after_deadline() {
        let claims = TokenClaims {
            user_id: 1,
            created_at: 0,
            expires_at: 1_000,
            random: "abc".into(),
        };
        assert!(!claims.is_expired_at(1_000));
        assert!(claims.is_expired_at(1_001));
    }
}
