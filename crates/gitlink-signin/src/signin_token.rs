//! Correlation token codec.
//!
//! The token is the only state that survives the round trip through the
//! OAuth provider: it carries the (team, user, channel) triple as signed
//! claims, so the callback can resume the flow without a server-side
//! "pending login" row. The wire form is JWT-compatible HS256
//! (`base64url(header).base64url(claims).base64url(mac)`), which keeps the
//! `state` parameter interchangeable with tokens minted by earlier
//! deployments of the flow.

use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use gitlink_core::is_expired_unix;

/// Default validity window for a sign-in attempt.
pub const DEFAULT_TOKEN_TTL_SECONDS: u64 = 3_600;

const TOKEN_HEADER_JSON: &[u8] = br#"{"alg":"HS256","typ":"JWT"}"#;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Token validation failures. The `Display` strings are part of the HTTP
/// contract: the callback surfaces them verbatim as `Error: <reason>`.
pub enum TokenError {
    /// The state value could not be split or decoded into token segments.
    #[error("jwt malformed")]
    Malformed,
    /// The signature does not match the configured signing secret.
    #[error("invalid signature")]
    InvalidSignature,
    /// The token is structurally sound and correctly signed, but past its
    /// embedded expiry.
    #[error("jwt expired")]
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Claims carried by a correlation token. Immutable once issued.
pub struct CorrelationClaims {
    pub team_id: String,
    pub user_id: String,
    pub channel_id: String,
    pub iat: u64,
    pub exp: u64,
}

#[derive(Clone)]
pub struct CorrelationTokenCodec {
    secret: String,
}

impl CorrelationTokenCodec {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Issues a signed token binding the command context for `ttl_seconds`
    /// starting at `now_unix`.
    pub fn issue(
        &self,
        team_id: &str,
        user_id: &str,
        channel_id: &str,
        ttl_seconds: u64,
        now_unix: u64,
    ) -> Result<String> {
        let claims = CorrelationClaims {
            team_id: team_id.to_string(),
            user_id: user_id.to_string(),
            channel_id: channel_id.to_string(),
            iat: now_unix,
            exp: now_unix.saturating_add(ttl_seconds),
        };
        let header = URL_SAFE_NO_PAD.encode(TOKEN_HEADER_JSON);
        let payload = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&claims).context("failed to serialize correlation claims")?,
        );
        let signature = self.sign(&header, &payload)?;
        Ok(format!("{header}.{payload}.{signature}"))
    }

    /// Validates a token against the signing secret and the supplied clock.
    ///
    /// Checks run structure, then signature, then expiry: a token signed
    /// with a different secret reports [`TokenError::InvalidSignature`] even
    /// when its claims would not deserialize, and an expired token reports
    /// [`TokenError::Expired`] even when its signature was re-forged.
    pub fn verify(&self, token: &str, now_unix: u64) -> Result<CorrelationClaims, TokenError> {
        let mut segments = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(TokenError::Malformed);
        };
        if header.is_empty() || payload.is_empty() || signature.is_empty() {
            return Err(TokenError::Malformed);
        }
        let signature_bytes = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Malformed)?;
        let payload_bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::Malformed)?;

        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.as_bytes())
            .map_err(|_| TokenError::InvalidSignature)?;
        mac.update(header.as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature_bytes)
            .map_err(|_| TokenError::InvalidSignature)?;

        let claims: CorrelationClaims =
            serde_json::from_slice(&payload_bytes).map_err(|_| TokenError::Malformed)?;
        if is_expired_unix(claims.exp, now_unix) {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    fn sign(&self, header: &str, payload: &str) -> Result<String> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.as_bytes())
            .context("failed to initialize correlation token signer")?;
        mac.update(header.as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }
}
