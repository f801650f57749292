//! Verification tokens for the webhook endpoint.
//!
//! Brokers deliver messages over plain HTTP, so every push endpoint embeds a
//! short signed token that the receiving side verifies before touching the
//! body. The token is an HS256 JWT whose only claim is the issuance time;
//! it is deterministic for a given second and secret, and otherwise opaque.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Algorithm used to sign verification tokens.
pub const TOKEN_ALGORITHM: Algorithm = Algorithm::HS256;

/// Token errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Token missing, malformed, or carrying a bad signature.
    #[error("invalid authentication token")]
    InvalidToken,

    /// Token could not be issued.
    #[error("token issuance failed: {0}")]
    Issue(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iat: u64,
}

fn validation() -> Validation {
    let mut validation = Validation::new(TOKEN_ALGORITHM);
    // The token carries only `iat`; there is no expiry to check.
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    validation
}

/// Issue a signed verification token.
///
/// # Errors
///
/// Returns an error if signing fails.
pub fn issue(secret: &str) -> Result<String, AuthError> {
    let issued_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let token = encode(
        &Header::new(TOKEN_ALGORITHM),
        &Claims { iat: issued_at },
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Verify a token against the shared secret.
///
/// Returns `false` for any malformed token, wrong signature, or unsupported
/// algorithm. This function never fails.
#[must_use]
pub fn verify(token: &str, secret: &str) -> bool {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation(),
    )
    .is_ok()
}

/// Verify a token, failing with [`AuthError::InvalidToken`] when invalid.
///
/// The webhook boundary must call this rather than [`verify`] so that
/// rejection always fails closed.
///
/// # Errors
///
/// Returns [`AuthError::InvalidToken`] if the token does not verify.
pub fn verify_strict(token: &str, secret: &str) -> Result<(), AuthError> {
    if verify(token, secret) {
        Ok(())
    } else {
        Err(AuthError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_verify_roundtrip() {
        let token = issue("s3cret").unwrap();
        assert!(verify(&token, "s3cret"));
    }

    #[test]
    fn test_verify_wrong_secret() {
        let token = issue("s3cret").unwrap();
        assert!(!verify(&token, "other"));
    }

    #[test]
    fn test_verify_garbage() {
        assert!(!verify("", "s3cret"));
        assert!(!verify("not-a-token", "s3cret"));
        assert!(!verify("a.b.c", "s3cret"));
    }

    #[test]
    fn test_single_character_flip_invalidates() {
        let token = issue("s3cret").unwrap();

        // Flipping any single character must break verification.
        for (i, ch) in token.char_indices() {
            if ch == '.' {
                continue;
            }
            let replacement = if ch == 'A' { 'B' } else { 'A' };
            let mut tampered: Vec<char> = token.chars().collect();
            tampered[i] = replacement;
            let tampered: String = tampered.into_iter().collect();
            if tampered == token {
                continue;
            }
            assert!(!verify(&tampered, "s3cret"), "flip at {} verified", i);
        }
    }

    #[test]
    fn test_verify_strict() {
        let token = issue("s3cret").unwrap();
        assert!(verify_strict(&token, "s3cret").is_ok());
        assert!(matches!(
            verify_strict(&token, "other"),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_unsupported_algorithm_rejected() {
        // An unsigned token ("alg":"none") must never verify.
        let header = "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0"; // {"alg":"none","typ":"JWT"}
        let claims = "eyJpYXQiOjB9"; // {"iat":0}
        assert!(!verify(&format!("{header}.{claims}."), "s3cret"));
    }
}
