//! HMAC-signed, action-bound, TTL-limited approval tokens (spec.md §3, §4.2).
//!
//! Wire format: `base64url-std(json(payload)) "." base64url-std(hmac_sha256(raw_payload))`.
//! `raw_payload` is the exact JSON bytes that were base64-encoded into the
//! first part — the signature covers the encoded bytes, not a re-serialized
//! copy, so byte-for-byte payload tampering is always caught.

use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::errors::ToolError;

type HmacSha256 = Hmac<Sha256>;

const DEFAULT_TTL_SECS: i64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    Format,
    Signature,
    ActionMismatch,
    Expired,
}

impl TokenError {
    fn message(self) -> &'static str {
        match self {
            Self::Format => "malformed approval token",
            Self::Signature => "approval token signature is invalid",
            Self::ActionMismatch => "approval token is not valid for this action",
            Self::Expired => "approval token has expired",
        }
    }
}

impl From<TokenError> for ToolError {
    fn from(err: TokenError) -> Self {
        ToolError::approval_required("").with_details(serde_json::json!({
            "reason": err.message(),
        }))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Payload {
    action: String,
    iat: i64,
    exp: i64,
    nonce: String,
}

/// An issued, encoded approval token. Value-typed; not retained after
/// validation (spec.md §3 ownership note).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalToken(String);

impl ApprovalToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ApprovalToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Issues and validates approval tokens against a shared secret.
pub struct TokenAuthority {
    secret: Vec<u8>,
}

impl TokenAuthority {
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self, ToolError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(ToolError::internal(
                "approval secret is empty; cannot issue or validate tokens",
            ));
        }
        Ok(Self { secret })
    }

    /// `Issue(action, ttl_seconds) -> token`.
    pub fn issue(&self, action: &str, ttl_seconds: i64) -> Result<ApprovalToken, ToolError> {
        let ttl = if ttl_seconds > 0 {
            ttl_seconds
        } else {
            DEFAULT_TTL_SECS
        };
        let now = chrono::Utc::now().timestamp();
        let mut nonce_bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);

        let payload = Payload {
            action: action.to_string(),
            iat: now,
            exp: now + ttl,
            nonce: BASE64.encode(nonce_bytes),
        };
        self.encode(&payload)
    }

    fn encode(&self, payload: &Payload) -> Result<ApprovalToken, ToolError> {
        let raw = serde_json::to_vec(payload)
            .map_err(|e| ToolError::internal(format!("failed to encode approval token: {e}")))?;
        let sig = self.sign(&raw);
        let token = format!("{}.{}", BASE64.encode(&raw), BASE64.encode(sig));
        Ok(ApprovalToken(token))
    }

    fn sign(&self, raw_payload: &[u8]) -> Vec<u8> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts keys of any length");
        mac.update(raw_payload);
        mac.finalize().into_bytes().to_vec()
    }

    /// `Validate(token, expected_action) -> ok | error` per spec.md §4.2.
    pub fn validate(&self, token: &str, expected_action: &str) -> Result<(), TokenError> {
        let mut parts = token.split('.');
        let (raw_b64, sig_b64) = match (parts.next(), parts.next(), parts.next()) {
            (Some(p), Some(s), None) if !p.is_empty() && !s.is_empty() => (p, s),
            _ => return Err(TokenError::Format),
        };

        let raw = BASE64.decode(raw_b64).map_err(|_| TokenError::Format)?;
        let sig = BASE64.decode(sig_b64).map_err(|_| TokenError::Format)?;

        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts keys of any length");
        mac.update(&raw);
        mac.verify_slice(&sig)
            .map_err(|_| TokenError::Signature)?;

        let payload: Payload = serde_json::from_slice(&raw).map_err(|_| TokenError::Format)?;
        if payload.action != expected_action {
            return Err(TokenError::ActionMismatch);
        }
        if chrono::Utc::now().timestamp() > payload.exp {
            return Err(TokenError::Expired);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authority() -> TokenAuthority {
        TokenAuthority::new(b"s".to_vec()).unwrap()
    }

    #[test]
    fn issue_then_validate_immediately_succeeds() {
        let auth = authority();
        let token = auth.issue("tool:citus_rebalance_execute", 60).unwrap();
        assert!(auth
            .validate(token.as_str(), "tool:citus_rebalance_execute")
            .is_ok());
    }

    #[test]
    fn tampered_payload_byte_fails_signature() {
        let auth = authority();
        let token = auth.issue("tool:citus_rebalance_execute", 60).unwrap();
        let (raw_b64, sig_b64) = token.as_str().split_once('.').unwrap();
        let mut raw = BASE64.decode(raw_b64).unwrap();
        raw[0] ^= 0x01;
        let tampered = format!("{}.{}", BASE64.encode(raw), sig_b64);
        assert_eq!(
            auth.validate(&tampered, "tool:citus_rebalance_execute"),
            Err(TokenError::Signature)
        );
    }

    #[test]
    fn wrong_action_fails_action_mismatch() {
        let auth = authority();
        let token = auth.issue("tool:citus_rebalance_execute", 60).unwrap();
        assert_eq!(
            auth.validate(token.as_str(), "tool:ping"),
            Err(TokenError::ActionMismatch)
        );
    }

    #[test]
    fn malformed_token_fails_format() {
        let auth = authority();
        assert_eq!(auth.validate("not-a-token", "tool:ping"), Err(TokenError::Format));
        assert_eq!(auth.validate("a.b.c", "tool:ping"), Err(TokenError::Format));
    }

    #[test]
    fn empty_secret_is_rejected_at_construction() {
        assert!(TokenAuthority::new(Vec::new()).is_err());
    }
}
