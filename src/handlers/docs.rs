use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::analyze::analyze_image,
        crate::handlers::health::liveness,
        crate::handlers::health::readiness,
    ),
    components(
        schemas(
            crate::models::AnalysisPayload,
            crate::models::AnalysisResponse,
            crate::models::ErrorResponse,
            crate::models::WatermelonReport,
        )
    ),
    tags(
        (name = "analysis", description = "Watermelon detection"),
        (name = "health", description = "Health check endpoints")
    ),
    info(
        title = "Watermelon Analyzer API",
        version = "0.1.0",
        description = "Quota-gated image analysis backed by a multimodal model"
    )
)]
pub struct ApiDoc;

pub fn create_docs_router() -> Router<AppState> {
    Router::new().merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
