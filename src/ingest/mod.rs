//! Ingestion orchestration.
//!
//! [`Ingestor::refresh_feed`] runs one feed through
//! fetch, parse, identity resolution, upsert and prune;
//! [`Ingestor::refresh_user`] fans that out over a user's feeds with bounded
//! concurrency and an optional overall deadline.

mod batch;
mod cancel;
mod refresh;
pub mod retention;
mod types;

pub use cancel::{CancelHandle, CancelReason, Cancellation};
pub use refresh::{IngestSettings, Ingestor};
pub use retention::{is_purge_needed, prune_feed, prune_user};
pub use types::{ErrorCode, FeedRefreshResult, FetchState, RefreshResponse, RefreshStatus};
