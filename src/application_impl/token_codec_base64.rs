use crate::application_port::{AuthError, TokenCodec};
use crate::domain_model::TokenClaims;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Unsigned base64-encoded JSON claims. Suitable for local development only:
/// anyone can mint a token that this codec accepts.
#[derive(Debug, Default)]
pub struct Base64JsonCodec;

impl Base64JsonCodec {
    pub fn new() -> Self {
        Self
    }
}

impl TokenCodec for Base64JsonCodec {
    fn encode(&self, claims: &TokenClaims) -> Result<String, AuthError> {
        let json =
            serde_json::to_vec(claims).map_err(|e| AuthError::InternalError(e.to_string()))?;
        Ok(STANDARD.encode(json))
    }

    fn decode(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let bytes = STANDARD.decode(token).map_err(|_| AuthError::TokenInvalid)?;
        serde_json::from_slice(&bytes).map_err(|_| AuthError::TokenInvalid)
    }
}
