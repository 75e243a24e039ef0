use chrono::{DateTime, Utc};
use feed_rs::model::{Entry, Link, Person};
use feed_rs::parser;
use thiserror::Error;

use crate::util::strip_control_chars;

/// A parsed feed document, normalized across RSS 1.0, RSS 2.0 and Atom.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFeed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub items: Vec<ParsedItem>,
}

/// One normalized feed entry. Every field is optional; absent and
/// whitespace-only values are both `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedItem {
    pub guid: Option<String>,
    pub title: Option<String>,
    pub link: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Error)]
pub enum ParseError {
    /// The document is not a recognizable RSS or Atom feed.
    #[error("Not a valid feed: {0}")]
    InvalidFeed(#[from] parser::ParseFeedError),
}

/// Turns raw feed bytes into a [`ParsedFeed`].
pub trait ParseFeed: Send + Sync {
    fn parse(&self, bytes: &[u8]) -> Result<ParsedFeed, ParseError>;
}

/// `feed-rs` backed parser.
///
/// Stateless: a `feed-rs` parser is built per call with synthetic id
/// generation turned off, so an entry without an upstream id reports
/// `guid: None` instead of a hash of its link and title.
#[derive(Debug, Default, Clone, Copy)]
pub struct FeedParser;

impl ParseFeed for FeedParser {
    fn parse(&self, bytes: &[u8]) -> Result<ParsedFeed, ParseError> {
        let feed = parser::Builder::new()
            .id_generator(|_links, _title, _uri| String::new())
            .build()
            .parse(bytes)?;

        let items: Vec<ParsedItem> = feed.entries.into_iter().map(parse_entry).collect();

        Ok(ParsedFeed {
            title: feed.title.and_then(|t| clean(&t.content)),
            description: feed.description.and_then(|t| clean(&t.content)),
            items,
        })
    }
}

fn parse_entry(entry: Entry) -> ParsedItem {
    let content = entry
        .content
        .and_then(|c| c.body)
        .and_then(|body| clean(&body))
        .or_else(|| entry.summary.and_then(|s| clean(&s.content)));

    let author = pick_author(&entry.authors);

    ParsedItem {
        guid: clean(&entry.id),
        title: entry.title.and_then(|t| clean(&t.content)),
        link: pick_link(&entry.links).and_then(clean),
        content,
        author,
        published_at: entry.published.or(entry.updated),
    }
}

/// Prefers the entry's alternate (or untyped) link over `self`/`enclosure`
/// relations.
fn pick_link(links: &[Link]) -> Option<&str> {
    links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| links.first())
        .map(|l| l.href.as_str())
}

/// Name recorded by `feed-rs` for an RSS 2.0 `<author>` element, whose text
/// lands in `email`.
const RSS_AUTHOR_ROLE: &str = "author";

/// Prefers a creator (`dc:creator`, Atom `<name>`) over the RSS `<author>`
/// element, whatever their order in the document.
fn pick_author(people: &[Person]) -> Option<String> {
    let is_role = |p: &Person| p.name.trim() == RSS_AUTHOR_ROLE;
    people
        .iter()
        .filter(|p| p.email.is_none() && !is_role(*p))
        .find_map(|p| clean(&p.name))
        .or_else(|| {
            people
                .iter()
                .filter(|p| is_role(*p))
                .find_map(|p| p.email.as_deref().and_then(clean))
        })
        .or_else(|| people.iter().filter(|p| !is_role(*p)).find_map(|p| clean(&p.name)))
}

/// Trims and strips control characters; empty results become `None`.
fn clean(s: &str) -> Option<String> {
    let stripped = strip_control_chars(s);
    let trimmed = stripped.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
