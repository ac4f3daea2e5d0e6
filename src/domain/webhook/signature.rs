//! HMAC-SHA256 signing of webhook bodies.
//!
//! Deliveries carry `X-Webhook-Signature: sha256=<hex>` computed over the raw
//! request body with the webhook's secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";
pub const EVENT_HEADER: &str = "X-Webhook-Event";
pub const DELIVERY_HEADER: &str = "X-Webhook-Delivery";

const SCHEME_PREFIX: &str = "sha256=";

type HmacSha256 = Hmac<Sha256>;

/// Raw HMAC-SHA256 of `body`.
pub fn compute_signature(secret: &[u8], body: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key");
    mac.update(body);
    mac.finalize().into_bytes().to_vec()
}

/// Lower-case hex HMAC-SHA256 of `body`.
pub fn sign_hex(secret: &[u8], body: &[u8]) -> String {
    hex::encode(compute_signature(secret, body))
}

/// Value for the signature header: `sha256=<hex>`.
pub fn signature_header_value(secret: &[u8], body: &[u8]) -> String {
    format!("{}{}", SCHEME_PREFIX, sign_hex(secret, body))
}

/// Checks a received signature header against `body` in constant time.
///
/// Accepts the header with or without the `sha256=` prefix.
pub fn verify_signature(secret: &[u8], body: &[u8], header: &str) -> bool {
    let presented = header.trim();
    let presented = presented.strip_prefix(SCHEME_PREFIX).unwrap_or(presented);
    let Ok(presented) = hex::decode(presented) else {
        return false;
    };

    let expected = compute_signature(secret, body);
    expected.ct_eq(&presented).into()
}
