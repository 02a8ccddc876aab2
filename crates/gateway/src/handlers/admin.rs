//! Cache control and service status

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;
use fundscope_common::{engine::ServiceStatus, errors::Result, models::CollectionSizes};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub status: String,
    pub sizes: CollectionSizes,
}

/// Discard the cached data context and fetch a new one
pub async fn refresh_cache(State(state): State<AppState>) -> Result<Json<RefreshResponse>> {
    let sizes = state.orchestrator.refresh().await?;
    tracing::info!(
        funders = sizes.funders,
        contributions = sizes.contributions,
        "Data context refreshed on request"
    );
    Ok(Json(RefreshResponse {
        status: "refreshed".to_string(),
        sizes,
    }))
}

/// Report initialization, model and cache state
pub async fn status(State(state): State<AppState>) -> Json<ServiceStatus> {
    Json(state.orchestrator.status().await)
}
