use axum::extract::{Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};

use crate::error::ApiResult;
use crate::state::AppState;

fn attachment(filename: &str, content_type: &'static str, bytes: Vec<u8>) -> Response {
    (
        [
            (CONTENT_TYPE, content_type.to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response()
}

/// GET /download/{job_id}/{kind} where kind is `json` or `excel`.
pub async fn artifact(
    State(state): State<AppState>,
    Path((job_id, kind)): Path<(String, String)>,
) -> ApiResult<Response> {
    let artifact = state
        .blocking(move |service| service.artifact(&job_id, &kind))
        .await??;

    Ok(attachment(
        &artifact.filename,
        artifact.content_type,
        artifact.bytes,
    ))
}

/// GET /download/batch/{batch_id}/zip
pub async fn archive(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
) -> ApiResult<Response> {
    let archive = state
        .blocking(move |service| service.archive(&batch_id))
        .await??;

    Ok(attachment(&archive.filename, "application/zip", archive.bytes))
}
