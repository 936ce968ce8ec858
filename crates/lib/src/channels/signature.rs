//! LINE webhook signature: base64(HMAC-SHA256(channel secret, raw body)).

use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature on webhook POSTs.
pub const SIGNATURE_HEADER: &str = "X-Line-Signature";

fn mac_for(secret: &str, body: &[u8]) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(body);
    mac
}

/// Signature the platform would send for `body`.
pub fn sign(body: &[u8], secret: &str) -> String {
    let tag = mac_for(secret, body).finalize().into_bytes();
    base64::engine::general_purpose::STANDARD.encode(tag)
}

/// True when `signature` is the base64 HMAC of `body` under `secret`. Tag comparison is constant-time.
pub fn verify(body: &[u8], signature: &str, secret: &str) -> bool {
    let signature = signature.trim();
    if signature.is_empty() {
        return false;
    }
    let Ok(provided) = base64::engine::general_purpose::STANDARD.decode(signature) else {
        return false;
    };
    mac_for(secret, body).verify_slice(&provided).is_ok()
}
