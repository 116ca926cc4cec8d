use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
    http::{HeaderMap, StatusCode},
};
use std::net::IpAddr;

use crate::{
    errors::AppError,
    handlers::AppState,
    middleware::auth::verify_signature,
    models::{AnalysisPayload, AnalysisRequest},
};

pub const ANONYMOUS_SUBJECT: &str = "anonymous";

/// An analysis request that passed signature and payload validation, along
/// with the identity its quota is charged to.
#[derive(Debug)]
pub struct ValidatedAnalysis {
    pub request: AnalysisRequest,
    pub subject: String,
}

#[async_trait]
impl FromRequest<AppState> for ValidatedAnalysis {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let headers = req.headers().clone();
        let body = Bytes::from_request(req, state).await.map_err(|rejection| {
            if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                AppError::PayloadTooLarge
            } else {
                AppError::Validation(rejection.body_text())
            }
        })?;

        if let Some(secret) = state.config.hmac_secret.as_deref() {
            verify_signature(&headers, &body, secret)?;
        }

        let payload: AnalysisPayload = serde_json::from_slice(&body)
            .map_err(|e| AppError::Validation(format!("Invalid JSON body: {}", e)))?;
        let request = payload.validate()?;
        let subject = quota_subject(&request, &headers);

        Ok(Self { request, subject })
    }
}

/// The device id when the client sent one, otherwise its address.
pub fn quota_subject(request: &AnalysisRequest, headers: &HeaderMap) -> String {
    if let Some(device_id) = &request.device_id {
        return device_id.clone();
    }
    match extract_client_ip(headers) {
        Some(ip) => format!("ip:{}", ip),
        None => ANONYMOUS_SUBJECT.to_string(),
    }
}

fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    // In order of preference
    let ip_headers = [
        "CF-Connecting-IP", // Cloudflare
        "X-Real-IP",        // Nginx
        "X-Forwarded-For",  // Standard proxy header
        "X-Client-IP",
    ];

    for header_name in ip_headers {
        if let Some(value) = headers.get(header_name).and_then(|v| v.to_str().ok()) {
            // X-Forwarded-For can contain multiple IPs, take the first one
            let ip = value.split(',').next().unwrap_or(value).trim();
            if let Ok(addr) = ip.parse::<IpAddr>() {
                return Some(addr.to_string());
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn request(device_id: Option<&str>) -> AnalysisRequest {
        AnalysisRequest {
            image: "aGVsbG8=".to_string(),
            prompt: "p".to_string(),
            device_id: device_id.map(str::to_string),
        }
    }

    #[test]
    fn test_device_id_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Real-IP", HeaderValue::from_static("10.0.0.1"));
        assert_eq!(quota_subject(&request(Some("dev-1")), &headers), "dev-1");
    }

    #[test]
    fn test_falls_back_to_first_forwarded_ip() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-Forwarded-For",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(quota_subject(&request(None), &headers), "ip:203.0.113.7");
    }

    #[test]
    fn test_ignores_garbage_and_defaults_to_anonymous() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Real-IP", HeaderValue::from_static("not-an-ip"));
        assert_eq!(quota_subject(&request(None), &headers), ANONYMOUS_SUBJECT);
        assert_eq!(quota_subject(&request(None), &HeaderMap::new()), ANONYMOUS_SUBJECT);
    }
}
