//! HMAC-SHA256 signatures over raw confirmation bodies.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-gateway-signature";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature is not valid hex")]
    InvalidFormat,
    #[error("webhook secret is not usable as an HMAC key")]
    InvalidSecret,
    #[error("signature does not match body")]
    Mismatch,
}

/// Hex-encoded HMAC-SHA256 of `body` under `secret`.
pub fn sign(secret: &str, body: &[u8]) -> Result<String, SignatureError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidSecret)?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verifies a hex signature in constant time.
pub fn verify(secret: &str, body: &[u8], signature: &str) -> Result<(), SignatureError> {
    let expected = hex::decode(signature.trim()).map_err(|_| SignatureError::InvalidFormat)?;
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidSecret)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";

    #[test]
    fn signed_body_verifies() {
        let body = br#"{"session_id":"sess_1","status":"succeeded"}"#;
        let signature = sign(SECRET, body).unwrap();
        assert_eq!(verify(SECRET, body, &signature), Ok(()));
    }

    #[test]
    fn tampered_body_is_rejected() {
        let signature = sign(SECRET, br#"{"status":"failed"}"#).unwrap();
        assert_eq!(
            verify(SECRET, br#"{"status":"succeeded"}"#, &signature),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let body = b"payload";
        let signature = sign("other", body).unwrap();
        assert_eq!(verify(SECRET, body, &signature), Err(SignatureError::Mismatch));
    }

    #[test]
    fn non_hex_signature_is_rejected() {
        assert_eq!(
            verify(SECRET, b"payload", "not-hex"),
            Err(SignatureError::InvalidFormat)
        );
    }
}
