use axum::http::HeaderMap;

use crate::{
    errors::{AppError, Result},
    utils::crypto::verify_request_signature,
};

pub const TIMESTAMP_HEADER: &str = "x-timestamp";
pub const SIGNATURE_HEADER: &str = "x-signature";

/// Checks `X-Signature` against the HMAC of `X-Timestamp` followed by the raw body.
pub fn verify_signature(headers: &HeaderMap, body: &[u8], secret: &str) -> Result<()> {
    let timestamp = header_str(headers, TIMESTAMP_HEADER);
    let signature = header_str(headers, SIGNATURE_HEADER);

    let (Some(timestamp), Some(signature)) = (timestamp, signature) else {
        tracing::warn!("Rejected request without signature headers");
        return Err(AppError::Auth("Missing authentication headers".to_string()));
    };

    if !verify_request_signature(secret, timestamp, body, signature) {
        tracing::warn!(timestamp, "Rejected request with invalid signature");
        return Err(AppError::Auth("Invalid signature".to_string()));
    }

    Ok(())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::crypto::sign_request;
    use axum::http::HeaderValue;

    const SECRET: &str = "secret";
    const BODY: &[u8] = br#"{"image":"aGVsbG8=","prompt":"p"}"#;

    fn headers(timestamp: Option<&str>, signature: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(ts) = timestamp {
            headers.insert(TIMESTAMP_HEADER, HeaderValue::from_str(ts).unwrap());
        }
        if let Some(sig) = signature {
            headers.insert(SIGNATURE_HEADER, HeaderValue::from_str(sig).unwrap());
        }
        headers
    }

    #[test]
    fn test_valid_signature() {
        let signature = sign_request(SECRET, "1720000000", BODY);
        assert!(verify_signature(&headers(Some("1720000000"), Some(&signature)), BODY, SECRET).is_ok());
    }

    #[test]
    fn test_missing_headers() {
        let signature = sign_request(SECRET, "1720000000", BODY);
        for h in [
            headers(None, None),
            headers(Some("1720000000"), None),
            headers(None, Some(&signature)),
            headers(Some(""), Some(&signature)),
        ] {
            let err = verify_signature(&h, BODY, SECRET).unwrap_err();
            assert!(matches!(err, AppError::Auth(ref msg) if msg.contains("Missing")));
        }
    }

    #[test]
    fn test_signature_mismatch() {
        let signature = sign_request("other", "1720000000", BODY);
        let err = verify_signature(&headers(Some("1720000000"), Some(&signature)), BODY, SECRET)
            .unwrap_err();
        assert!(matches!(err, AppError::Auth(ref msg) if msg == "Invalid signature"));
    }
}
