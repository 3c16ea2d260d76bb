//! Webhook signature verification.
//!
//! The platform signs the raw request body with HMAC-SHA256 keyed by the
//! channel secret and sends the base64 digest in the `x-chat-signature`
//! header. Verification is constant-time via `Mac::verify_slice`.

use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the base64-encoded signature.
pub const SIGNATURE_HEADER: &str = "x-chat-signature";

/// Returns `Ok(())` when `signature_b64` matches the body digest.
pub fn verify_signature(secret: &str, body: &[u8], signature_b64: &str) -> Result<(), String> {
    let expected = base64::engine::general_purpose::STANDARD
        .decode(signature_b64)
        .map_err(|_| "signature is not valid base64".to_string())?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| "invalid HMAC key length".to_string())?;
    mac.update(body);

    mac.verify_slice(&expected)
        .map_err(|_| "signature mismatch".to_string())
}

/// Compute the base64 signature for `body` — used by tests and by the
/// platform simulator in the integration suite.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(body);
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}
