//! Utility functions shared by the ingestion pipeline.
//!
//! - **URL validation**: static SSRF checks and the non-routable address table
//! - **Text processing**: whitespace/markup normalization and control-character stripping
//!
//! # Examples
//!
//! ```
//! use feedward::util::{normalize_text, strip_markup, validate_url};
//!
//! let url = validate_url("https://example.com/feed.xml").unwrap();
//! assert_eq!(url.scheme(), "https");
//!
//! assert_eq!(normalize_text("  Hello   WORLD "), "hello world");
//! assert_eq!(strip_markup("<p>Hello <b>world</b></p>"), "Hello world");
//! ```

mod text;
mod url_validator;

pub use text::{collapse_whitespace, normalize_text, strip_control_chars, strip_markup};
pub use url_validator::{check_url, is_non_routable, validate_url, UrlValidationError};
