//! Authentication primitives: bearer header parsing, constant-time
//! comparison, salted password hashing and signed session tokens.

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine as _,
};
use chrono::Utc;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Compares two byte strings in constant time.
///
/// XOR accumulator over the shorter common prefix plus a length check, so the
/// comparison takes the same amount of time regardless of where (or if) the
/// inputs differ.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let len_match = a.len() == b.len();

    let mut diff: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }

    len_match && diff == 0
}

/// Validates a provided token against the expected token using constant-time
/// comparison. Empty tokens are never valid.
pub fn validate_token(provided: &str, expected: &str) -> bool {
    if provided.is_empty() || expected.is_empty() {
        return false;
    }

    constant_time_eq(provided.as_bytes(), expected.as_bytes())
}

/// Extracts the bearer token from an Authorization header value.
///
/// Expected format: "Bearer <token>"
/// Returns `None` if the header doesn't match the expected format.
pub fn extract_bearer_token(header: &str) -> Option<&str> {
    let header = header.trim();

    // Case-insensitive "Bearer " prefix check (RFC 6750 allows case-insensitive)
    if header.len() < 7 {
        return None;
    }

    let (prefix, token) = header.split_at(7);
    if prefix.eq_ignore_ascii_case("Bearer ") {
        let token = token.trim();
        if token.is_empty() {
            None
        } else {
            Some(token)
        }
    } else {
        None
    }
}

/// 16 random bytes, base64-encoded. One per user, generated at registration.
pub fn generate_salt() -> String {
    let mut salt = [0u8; 16];
    rand::rng().fill_bytes(&mut salt);
    STANDARD.encode(salt)
}

/// Salted SHA-256 digest of a password, base64-encoded for storage.
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    STANDARD.encode(hasher.finalize())
}

pub fn verify_password(password: &str, salt: &str, expected_hash: &str) -> bool {
    let computed = hash_password(password, salt);
    constant_time_eq(computed.as_bytes(), expected_hash.as_bytes())
}

/// Claims carried inside a signed token. `exp` is unix seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPayload {
    pub sub: String,
    pub exp: i64,
}

impl TokenPayload {
    pub fn new(user_id: &str, ttl_secs: i64) -> Self {
        Self {
            sub: user_id.to_string(),
            exp: Utc::now().timestamp() + ttl_secs,
        }
    }
}

fn signature(secret: &str, payload_json: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(payload_json);
    hasher.finalize().to_vec()
}

/// Produces a self-contained bearer token:
/// `base64url(payload_json) "." base64url(sha256(secret || payload_json))`.
pub fn sign_token(secret: &str, payload: &TokenPayload) -> String {
    let payload_json = serde_json::to_vec(payload).expect("token payload serializes");
    let sig = signature(secret, &payload_json);

    format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(&payload_json),
        URL_SAFE_NO_PAD.encode(sig)
    )
}

/// Verifies signature and expiry. Returns the claims on success.
pub fn verify_token(secret: &str, token: &str) -> Option<TokenPayload> {
    let (payload_b64, sig_b64) = token.split_once('.')?;

    let payload_json = URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
    let sig = URL_SAFE_NO_PAD.decode(sig_b64).ok()?;

    let expected = signature(secret, &payload_json);
    if !constant_time_eq(&sig, &expected) {
        return None;
    }

    let payload: TokenPayload = serde_json::from_slice(&payload_json).ok()?;
    if payload.exp <= Utc::now().timestamp() {
        return None;
    }

    Some(payload)
}

/// Digest used to key the revocation set, so raw tokens are never retained
/// after logout.
pub fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    STANDARD.encode(hasher.finalize())
}
