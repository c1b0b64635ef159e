use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures_util::stream::{self, Stream};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use controlmap::{
    BatchState, BatchStatus, JobProgressEvent, JobStatusView, MapRequest, MapResponse,
    MappingService,
};

use crate::error::ApiResult;
use crate::state::AppState;

/// POST /map. The batch runs in the background.
pub async fn start(
    State(state): State<AppState>,
    Json(request): Json<MapRequest>,
) -> ApiResult<(StatusCode, Json<MapResponse>)> {
    let response = state.service.start_batch(&request)?;
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// GET /batch/{batch_id}/status
pub async fn batch_status(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
) -> ApiResult<Json<BatchStatus>> {
    Ok(Json(state.service.batch_status(&batch_id)?))
}

/// POST /batch/{batch_id}/cancel
pub async fn cancel(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
) -> ApiResult<Json<BatchStatus>> {
    Ok(Json(state.service.cancel(&batch_id)?))
}

/// GET /status/{job_id}
pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobStatusView>> {
    Ok(Json(state.service.job_status(&job_id)?))
}

/// Where an event stream is in its life.
enum Cursor {
    /// The `status` snapshot has not been sent yet.
    Snapshot(BatchStatus),
    Following,
    Done,
}

struct EventFeed {
    service: Arc<MappingService>,
    rx: broadcast::Receiver<JobProgressEvent>,
    batch_id: String,
    cursor: Cursor,
}

impl EventFeed {
    async fn next(mut self) -> Option<(Result<Event, Infallible>, Self)> {
        match std::mem::replace(&mut self.cursor, Cursor::Following) {
            Cursor::Done => None,
            Cursor::Snapshot(status) => {
                if status.status != BatchState::Running {
                    self.cursor = Cursor::Done;
                }
                let event = json_event("status", &status);
                Some((Ok(event), self))
            }
            Cursor::Following => loop {
                match self.rx.recv().await {
                    Ok(event) if event.batch_id == self.batch_id => {
                        if event.is_terminal() && !self.batch_running() {
                            self.cursor = Cursor::Done;
                        }
                        return Some((Ok(json_event("progress", &event)), self));
                    }
                    Ok(_) => continue,
                    Err(RecvError::Lagged(missed)) => {
                        // The missed updates may include the last terminal
                        // one, so resend the whole status instead.
                        warn!(batch_id = %self.batch_id, missed, "Event stream lagged");
                        let status = match self.service.batch_status(&self.batch_id) {
                            Ok(status) => status,
                            Err(e) => {
                                debug!("Ending event stream: {}", e);
                                return None;
                            }
                        };
                        if status.status != BatchState::Running {
                            self.cursor = Cursor::Done;
                        }
                        return Some((Ok(json_event("status", &status)), self));
                    }
                    Err(RecvError::Closed) => return None,
                }
            },
        }
    }

    fn batch_running(&self) -> bool {
        self.service
            .orchestrator()
            .store()
            .is_batch_active(&self.batch_id)
    }
}

fn json_event<T: serde::Serialize>(name: &'static str, payload: &T) -> Event {
    match Event::default().event(name).json_data(payload) {
        Ok(event) => event,
        Err(e) => {
            debug!("Failed to encode {} event: {}", name, e);
            Event::default().event(name)
        }
    }
}

/// GET /batch/{batch_id}/events
///
/// Sends one `status` snapshot, then a `progress` event per job update of
/// this batch. The stream ends after the batch's last job is terminal.
pub async fn events(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    // Subscribe before the snapshot so no update falls between the two.
    let rx = state.service.subscribe();
    let snapshot = state.service.batch_status(&batch_id)?;

    let feed = EventFeed {
        service: state.service.clone(),
        rx,
        batch_id,
        cursor: Cursor::Snapshot(snapshot),
    };
    let stream = stream::unfold(feed, EventFeed::next);

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
