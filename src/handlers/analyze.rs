use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::{
    config::ChargePolicy,
    errors::{AppError, Result},
    handlers::AppState,
    middleware::validation::ValidatedAnalysis,
    models::{AnalysisPayload, AnalysisResponse, ErrorResponse},
};

/// Analyze an image for watermelons.
///
/// One request is charged against the daily limit before the model is called.
/// Under the default `on_success` policy the charge is given back when the
/// analysis fails; under `up_front` it is kept.
#[utoipa::path(
    post,
    path = "/api/analyze",
    request_body = AnalysisPayload,
    responses(
        (status = 200, description = "Analysis result with remaining quota", body = AnalysisResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Missing or invalid signature", body = ErrorResponse),
        (status = 413, description = "Request body too large", body = ErrorResponse),
        (status = 429, description = "Daily limit reached", body = ErrorResponse),
        (status = 500, description = "Analysis failed", body = ErrorResponse),
        (status = 503, description = "Model overloaded after retries", body = ErrorResponse)
    ),
    tag = "analysis"
)]
pub async fn analyze_image(
    State(state): State<AppState>,
    analysis: ValidatedAnalysis,
) -> Result<Json<Map<String, Value>>> {
    let ValidatedAnalysis { request, subject } = analysis;

    let charged_at = Utc::now();
    let decision = state.quota.check_and_consume(&subject, charged_at).await?;
    if !decision.allowed {
        state.metrics.record_quota_denial();
        return Err(AppError::QuotaExceeded {
            next_reset: decision.reset_at,
        });
    }

    let result = match state.gemini.analyze(&request).await {
        Ok(result) => result,
        Err(e) => {
            let err = AppError::from(e);
            state.metrics.record_failure(err.kind());
            if state.config.charge_policy == ChargePolicy::OnSuccess {
                refund(&state, &subject, charged_at).await;
            }
            return Err(err);
        }
    };
    state.metrics.record_analysis(result.has_watermelon());

    tracing::info!(
        subject = %subject,
        remaining = decision.remaining,
        "Analysis served"
    );

    Ok(Json(result.with_quota(decision.remaining, decision.reset_at)))
}

/// The analysis error is what the client sees, even if the refund fails.
async fn refund(state: &AppState, subject: &str, charged_at: DateTime<Utc>) {
    if let Err(e) = state.quota.release(subject, charged_at).await {
        tracing::warn!(subject, "Failed to release usage after failed analysis: {}", e);
    }
}
