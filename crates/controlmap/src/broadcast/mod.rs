//! Batch state and real-time progress streaming.
//!
//! The store is the single place job state is written; every write is
//! republished to subscribers such as the server's event stream.

pub mod job_progress;
pub mod job_store;

pub use job_progress::{JobProgressBroadcaster, JobProgressEvent};
pub use job_store::BatchStore;
