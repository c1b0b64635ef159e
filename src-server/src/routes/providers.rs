use axum::extract::{Path, Query, State};
use axum::Json;

use controlmap::catalog::{CheckPage, CheckQuery, ProviderInfo};
use controlmap::service::Health;

use crate::error::ApiResult;
use crate::state::AppState;

/// GET /health
pub async fn health(State(state): State<AppState>) -> ApiResult<Json<Health>> {
    Ok(Json(state.blocking(|service| service.health()).await?))
}

/// GET /providers
pub async fn list_providers(State(state): State<AppState>) -> ApiResult<Json<Vec<ProviderInfo>>> {
    Ok(Json(
        state.blocking(|service| service.list_providers()).await?,
    ))
}

/// GET /checks/{provider}
pub async fn list_checks(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<CheckQuery>,
) -> ApiResult<Json<CheckPage>> {
    let page = state
        .blocking(move |service| service.list_checks(&provider, &query))
        .await??;
    Ok(Json(page))
}
