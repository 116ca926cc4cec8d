use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::{handlers::AppState, services::metrics::RequestTimer};

pub async fn metrics_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let endpoint = format!("{} {}", request.method(), request.uri().path());

    // Records the duration on drop
    let _timer = RequestTimer::new(&state.metrics, endpoint);

    let response = next.run(request).await;
    state.metrics.record_response(response.status().as_u16());

    response
}
