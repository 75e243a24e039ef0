//! SQLite storage for feeds and their items.
//!
//! [`Database`] implements [`FeedStore`], the storage collaborator the ingest
//! pipeline is written against, plus a few helpers used by the CLI and tests.

mod feeds;
mod items;
mod retention;
mod schema;
mod store;
mod types;

pub use schema::Database;
pub use store::FeedStore;
pub use types::{
    DatabaseError, Feed, FeedItem, FetchStateUpdate, FetchStatus, ItemFields, UpsertOutcome,
};
