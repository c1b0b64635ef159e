use std::sync::Arc;

use controlmap::{MappingService, Settings};

use crate::error::{ApiError, ApiResult};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MappingService>,
}

impl AppState {
    pub fn new(service: MappingService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }

    pub fn from_settings(settings: Settings) -> Self {
        Self::new(MappingService::from_settings(settings))
    }

    /// Largest request body accepted, leaving room for multipart framing.
    pub fn body_limit(&self) -> usize {
        let max_upload = self.service.settings().limits.max_upload_bytes;
        usize::try_from(max_upload)
            .unwrap_or(usize::MAX)
            .saturating_add(64 * 1024)
    }

    /// Runs a synchronous service call on the blocking pool. Catalog scans,
    /// document extraction and artifact reads all touch the filesystem.
    pub async fn blocking<T, F>(&self, call: F) -> ApiResult<T>
    where
        F: FnOnce(&MappingService) -> T + Send + 'static,
        T: Send + 'static,
    {
        let service = Arc::clone(&self.service);
        tokio::task::spawn_blocking(move || call(&service))
            .await
            .map_err(|e| ApiError::Task(e.to_string()))
    }
}
