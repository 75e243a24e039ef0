//! Network and document side of ingestion.
//!
//! - [`fetcher`] - SSRF-safe HTTP fetching with conditional GET, manual
//!   redirects and retry
//! - [`guard`] - the outbound address policy and the pinned DNS resolver
//! - [`parser`] - RSS 1.0/2.0 and Atom normalization using `feed-rs`
//! - [`fingerprint`] - content-addressed identity for items without a GUID

pub mod fetcher;
pub mod fingerprint;
pub mod guard;
pub mod parser;

pub use fetcher::{
    FetchError, FetchErrorKind, FetchFeed, FetchOptions, FetchOutcome, FetchedBody, FetcherConfig,
    SafeFetcher,
};
pub use fingerprint::{fingerprint, identity_key};
pub use guard::{AddressGuard, BlockedTarget, HostResolver, StaticResolver, SystemResolver};
pub use parser::{FeedParser, ParseError, ParseFeed, ParsedFeed, ParsedItem};
