// [apps/orchestrator/src/auth.rs]
//! Provider API-key issuance and short-lived identity tokens.
//!
//! `AuthMaterial` only stores a salted digest (see
//! `nebula_domain_models::provider::AuthMaterial`): there is no separate
//! stored salt column, so the provider id doubles as the salt. It is
//! unique per provider and always available at verification time,
//! which is all domain separation needs here — see DESIGN.md for the
//! Open Question this resolves. The plaintext key is handed back to
//! the caller exactly once, at registration, and is never persisted.

use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::errors::OrchestratorError;

const API_KEY_BYTES: usize = 32;

/// Generates a fresh, high-entropy API key as a hex string.
#[must_use]
pub fn generate_api_key() -> String {
    let mut bytes = [0u8; API_KEY_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Computes the digest stored in `AuthMaterial::salted_key_digest`.
#[must_use]
pub fn salted_key_digest(provider_id: Uuid, raw_api_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(provider_id.as_bytes());
    hasher.update(b":");
    hasher.update(raw_api_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Verifies a presented API key against the stored digest, without
/// leaking timing information about how many bytes matched.
#[must_use]
pub fn verify_api_key(provider_id: Uuid, raw_api_key: &str, stored_digest: &str) -> bool {
    constant_time_eq(salted_key_digest(provider_id, raw_api_key).as_bytes(), stored_digest.as_bytes())
}

#[derive(Debug, Serialize, Deserialize)]
struct IdentityClaims {
    provider_id: Uuid,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

/// A minted identity token together with its expiry, so callers can
/// surface `expiry`/`token-type` in the Authenticate response without
/// re-parsing the token.
pub struct IdentityToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues a short-lived identity token for a provider that has already
/// passed API-key verification. The token is a `payload.signature`
/// pair, the same segmented shape `middleware.rs` parses back, but
/// with an HMAC-style symmetric signature computed from server-side
/// config instead of a third-party identity provider.
#[must_use]
pub fn issue_identity_token(config: &AuthConfig, provider_id: Uuid) -> IdentityToken {
    let issued_at = Utc::now();
    let expires_at = issued_at + Duration::seconds(config.identity_token_ttl_seconds);
    let claims = IdentityClaims { provider_id, issued_at, expires_at };
    let payload_json = serde_json::to_vec(&claims).expect("identity claims always serialize");
    let payload_b64 = BASE64_URL.encode(payload_json);
    let signature = sign(config, &payload_b64);
    IdentityToken { token: format!("{payload_b64}.{signature}"), expires_at }
}

/// Verifies an identity token's signature and expiry, returning the
/// provider id it was issued for.
pub fn verify_identity_token(config: &AuthConfig, token: &str) -> Result<Uuid, OrchestratorError> {
    let (payload_b64, signature) = token
        .split_once('.')
        .ok_or_else(|| OrchestratorError::Validation("malformed identity token".to_string()))?;

    let expected_signature = sign(config, payload_b64);
    if !constant_time_eq(expected_signature.as_bytes(), signature.as_bytes()) {
        return Err(OrchestratorError::Validation("identity token signature mismatch".to_string()));
    }

    let payload_bytes = BASE64_URL
        .decode(payload_b64)
        .map_err(|_| OrchestratorError::Validation("malformed identity token payload".to_string()))?;
    let claims: IdentityClaims = serde_json::from_slice(&payload_bytes)
        .map_err(|_| OrchestratorError::Validation("malformed identity token claims".to_string()))?;

    if claims.expires_at < Utc::now() {
        return Err(OrchestratorError::Precondition("identity token expired".to_string()));
    }

    Ok(claims.provider_id)
}

fn sign(config: &AuthConfig, payload_b64: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(config.token_secret.as_bytes());
    hasher.update(b":");
    hasher.update(payload_b64.as_bytes());
    BASE64_URL.encode(hasher.finalize())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig {
            token_secret: "test-secret".to_string(),
            identity_token_ttl_seconds: 3600,
            operator_token: "test-operator-token".to_string(),
        }
    }

    #[test]
    fn api_key_round_trips_through_salted_digest() {
        let provider_id = Uuid::new_v4();
        let raw_key = generate_api_key();
        let digest = salted_key_digest(provider_id, &raw_key);
        assert!(verify_api_key(provider_id, &raw_key, &digest));
    }

    #[test]
    fn api_key_digest_is_bound_to_provider_id() {
        let raw_key = generate_api_key();
        let digest = salted_key_digest(Uuid::new_v4(), &raw_key);
        assert!(!verify_api_key(Uuid::new_v4(), &raw_key, &digest));
    }

    #[test]
    fn identity_token_round_trips() {
        let config = config();
        let provider_id = Uuid::new_v4();
        let issued = issue_identity_token(&config, provider_id);
        let verified = verify_identity_token(&config, &issued.token).expect("token should verify");
        assert_eq!(verified, provider_id);
    }

    #[test]
    fn identity_token_rejects_tampering() {
        let config = config();
        let issued = issue_identity_token(&config, Uuid::new_v4());
        let mut tampered = issued.token.clone();
        tampered.push('x');
        assert!(verify_identity_token(&config, &tampered).is_err());
    }

    #[test]
    fn identity_token_rejects_foreign_secret() {
        let issued = issue_identity_token(&config(), Uuid::new_v4());
        let other = AuthConfig { token_secret: "different-secret".to_string(), ..config() };
        assert!(verify_identity_token(&other, &issued.token).is_err());
    }
}
