//! SSRF-safe RSS/Atom ingestion with content-addressed deduplication and
//! per-feed retention.
//!
//! The pipeline is assembled from narrow parts: [`feed::SafeFetcher`] for the
//! network, [`feed::FeedParser`] for documents, [`storage::Database`] for
//! persistence, and [`ingest::Ingestor`] to drive them.

pub mod config;
pub mod feed;
pub mod ingest;
pub mod storage;
pub mod util;
