use axum::extract::State;
use axum::Json;

use controlmap::intake::{ConfigureRequest, ConfigureResponse};

use crate::error::ApiResult;
use crate::state::AppState;

/// POST /configure
///
/// Counting checks per provider scans the catalog directory, so it runs on
/// the blocking pool.
pub async fn configure(
    State(state): State<AppState>,
    Json(request): Json<ConfigureRequest>,
) -> ApiResult<Json<ConfigureResponse>> {
    let response = state
        .blocking(move |service| service.configure(request))
        .await??;
    Ok(Json(response))
}
