use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    models::{ErrorResponse, WatermelonReport},
    services::{extractor::ExtractionError, gemini::UpstreamError},
};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Usage record is corrupt: {0}")]
    CorruptRecord(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Daily limit reached")]
    QuotaExceeded { next_reset: DateTime<Utc> },

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Upstream(UpstreamError::Unavailable { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Upstream(_)
            | AppError::Redis(_)
            | AppError::CorruptRecord(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) | AppError::PayloadTooLarge => "validation",
            AppError::Auth(_) => "auth",
            AppError::QuotaExceeded { .. } => "quota",
            AppError::Upstream(UpstreamError::Extraction(_)) => "extraction",
            AppError::Upstream(UpstreamError::Unavailable { .. }) => "upstream_unavailable",
            AppError::Upstream(_) => "upstream",
            AppError::Redis(_) | AppError::CorruptRecord(_) => "store",
            AppError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = ErrorResponse {
            error: String::new(),
            report: WatermelonReport::empty(),
            remaining_limit: None,
            next_reset: None,
            raw: None,
        };

        let error = match self {
            AppError::Redis(ref e) => {
                tracing::error!("Redis error: {}", e);
                "Usage store unavailable".to_string()
            }
            AppError::CorruptRecord(ref e) => {
                tracing::error!("Corrupt usage record: {}", e);
                "Usage store unavailable".to_string()
            }
            AppError::Validation(msg) | AppError::Auth(msg) => msg,
            AppError::PayloadTooLarge => "Request body too large".to_string(),
            AppError::QuotaExceeded { next_reset } => {
                body.remaining_limit = Some(0);
                body.next_reset = Some(next_reset);
                "Daily limit reached".to_string()
            }
            AppError::Upstream(UpstreamError::Extraction(ExtractionError::Malformed {
                ref raw,
                ..
            })) => {
                tracing::error!(raw = %raw, "Model returned malformed JSON");
                body.raw = Some(raw.clone());
                "Failed to parse analysis result: malformed JSON".to_string()
            }
            AppError::Upstream(UpstreamError::Extraction(ExtractionError::NoJson { ref raw })) => {
                tracing::error!(raw = %raw, "Model returned no JSON");
                body.raw = Some(raw.clone());
                "Failed to parse analysis result: no JSON found".to_string()
            }
            AppError::Upstream(UpstreamError::Unavailable { attempts }) => {
                tracing::error!(attempts, "Upstream model unavailable");
                "Analysis service is temporarily unavailable, please try again later".to_string()
            }
            AppError::Upstream(ref e) => {
                tracing::error!("Upstream error: {}", e);
                "Analysis failed".to_string()
            }
            AppError::Internal(ref e) => {
                tracing::error!("Internal error: {}", e);
                "Internal server error".to_string()
            }
        };
        body.error = error;

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
