//! HTTP surface of the controlmap mapping service.

pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use error::{ApiError, ErrorBody};
pub use routes::router;
pub use state::AppState;
