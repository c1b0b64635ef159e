use axum::extract::{Multipart, State};
use axum::Json;

use controlmap::error::ValidationError;
use controlmap::intake::UploadResponse;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const FILE_FIELD: &str = "file";

/// POST /upload
///
/// Expects a multipart form with a `file` part. Extraction runs on the
/// blocking pool since PDF and workbook parsing is synchronous.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        file = Some((filename, bytes.to_vec()));
        break;
    }

    let (filename, content) = file.ok_or(ValidationError::MissingFilename)?;
    let response = state
        .blocking(move |service| service.upload(&filename, &content))
        .await??;

    Ok(Json(response))
}
