use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::errors::{AppError, Result};

pub const MAX_DEVICE_ID_LEN: usize = 128;

/// Standard alphabet, accepting both padded and unpadded input.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Inbound body of `POST /api/analyze`, before validation.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisPayload {
    /// Base64-encoded JPEG, optionally as a `data:` URL.
    pub image: Option<String>,
    pub prompt: Option<String>,
    pub device_id: Option<String>,
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub image: String,
    pub prompt: String,
    pub device_id: Option<String>,
}

impl AnalysisPayload {
    pub fn validate(self) -> Result<AnalysisRequest> {
        let image = self
            .image
            .as_deref()
            .map(strip_data_url)
            .map(normalize_base64)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Validation("Missing required field: image".to_string()))?;

        if LENIENT_BASE64.decode(&image).is_err() {
            return Err(AppError::Validation(
                "Field 'image' must be base64-encoded".to_string(),
            ));
        }

        let prompt = self
            .prompt
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Validation("Missing required field: prompt".to_string()))?;

        let device_id = self
            .device_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        if let Some(id) = device_id {
            if id.chars().count() > MAX_DEVICE_ID_LEN {
                return Err(AppError::Validation(format!(
                    "Field 'deviceId' must be at most {} characters",
                    MAX_DEVICE_ID_LEN
                )));
            }
        }

        Ok(AnalysisRequest {
            image: pad_base64(image),
            prompt: prompt.to_string(),
            device_id: device_id.map(str::to_string),
        })
    }
}

fn strip_data_url(image: &str) -> &str {
    match image.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map(|(_, data)| data).unwrap_or(rest),
        None => image,
    }
}

/// Drops line breaks and other ASCII whitespace, as inserted by MIME-style
/// encoders every 76 characters.
fn normalize_base64(image: &str) -> String {
    image
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect()
}

fn pad_base64(mut image: String) -> String {
    while image.len() % 4 != 0 {
        image.push('=');
    }
    image
}

/// JSON object extracted from the model completion, passed through as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisResult(pub Map<String, Value>);

impl AnalysisResult {
    pub fn has_watermelon(&self) -> Option<bool> {
        self.0.get("has_watermelon").and_then(Value::as_bool)
    }

    pub fn count(&self) -> Option<u64> {
        self.0.get("count").and_then(Value::as_u64)
    }

    /// Adds the quota fields the client shows next to the result.
    pub fn with_quota(mut self, remaining: u32, next_reset: DateTime<Utc>) -> Map<String, Value> {
        self.0.insert("remainingLimit".to_string(), Value::from(remaining));
        self.0.insert(
            "nextReset".to_string(),
            Value::from(next_reset.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        );
        self.0
    }
}

/// Fallback result fields present on every response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WatermelonReport {
    pub has_watermelon: bool,
    pub count: u64,
    #[schema(value_type = Vec<Object>)]
    pub watermelons: Vec<Value>,
}

impl WatermelonReport {
    pub fn empty() -> Self {
        Self {
            has_watermelon: false,
            count: 0,
            watermelons: Vec::new(),
        }
    }
}

/// Documented body of a successful analysis.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    #[serde(flatten)]
    pub report: WatermelonReport,
    pub remaining_limit: u32,
    pub next_reset: DateTime<Utc>,
}

/// Documented body of every failed request.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    #[serde(flatten)]
    pub report: WatermelonReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_reset: Option<DateTime<Utc>>,
    /// Raw completion text, present when extraction failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}
