//! Health and scrape endpoints.

use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /metrics/prometheus
#[cfg(feature = "metrics")]
pub async fn prometheus() -> crate::error::ApiResult<impl axum::response::IntoResponse> {
    use axum::http::header;

    let body = turnstile::metrics::gather_metrics()
        .map_err(|e| crate::error::ApiError::Internal(e.to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}
