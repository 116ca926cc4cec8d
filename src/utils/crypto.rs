use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// base64(HMAC-SHA256(secret, timestamp || body))
pub fn sign_request(secret: &str, timestamp: &str, body: &[u8]) -> String {
    STANDARD.encode(mac(secret, timestamp, body).finalize().into_bytes())
}

/// Constant-time check of a base64 request signature.
pub fn verify_request_signature(secret: &str, timestamp: &str, body: &[u8], signature: &str) -> bool {
    let provided = match STANDARD.decode(signature.trim()) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let expected = mac(secret, timestamp, body).finalize().into_bytes();
    if expected.len() != provided.len() {
        return false;
    }
    expected.as_slice().ct_eq(&provided).into()
}

fn mac(secret: &str, timestamp: &str, body: &[u8]) -> HmacSha256 {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(timestamp.as_bytes());
    mac.update(body);
    mac
}
