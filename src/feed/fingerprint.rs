//! Content-addressed identity for feed items.
//!
//! An item's identity key is its upstream GUID when one is present, otherwise
//! a SHA-256 fingerprint over its normalized content. A GUID always wins, even
//! if the upstream reuses it for different content.

use chrono::SecondsFormat;
use sha2::{Digest, Sha256};

use super::parser::ParsedItem;
use crate::util::{normalize_text, strip_markup};

/// Unit separator; cannot occur in normalized text.
const FIELD_SEPARATOR: u8 = 0x1f;

/// Hex SHA-256 over the normalized link, title, author, plain-text content and
/// publication time.
///
/// Whitespace, markup and casing differences do not change the result.
pub fn fingerprint(item: &ParsedItem) -> String {
    let normalized = |field: &Option<String>| field.as_deref().map(normalize_text).unwrap_or_default();

    let content = item
        .content
        .as_deref()
        .map(|html| normalize_text(&strip_markup(html)))
        .unwrap_or_default();
    let published = item
        .published_at
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default();

    let fields = [
        normalized(&item.link),
        normalized(&item.title),
        normalized(&item.author),
        content,
        published,
    ];

    let mut hasher = Sha256::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            hasher.update([FIELD_SEPARATOR]);
        }
        hasher.update(field.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// The item's identity within its feed, and the fingerprint if one had to be
/// computed.
pub fn identity_key(item: &ParsedItem) -> (String, Option<String>) {
    match &item.guid {
        Some(guid) => (guid.clone(), None),
        None => {
            let fp = fingerprint(item);
            (fp.clone(), Some(fp))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn item() -> ParsedItem {
        ParsedItem {
            guid: None,
            title: Some("Rust 2.0 Released".into()),
            link: Some("https://example.com/rust".into()),
            content: Some("<p>Big <em>news</em> today</p>".into()),
            author: Some("Ferris".into()),
            published_at: Some(Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()),
        }
    }

    #[test]
    fn test_fingerprint_is_hex_sha256() {
        let fp = fingerprint(&item());
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(fp, fingerprint(&item()));
    }

    #[test]
    fn test_cosmetic_differences_ignored() {
        let noisy = ParsedItem {
            title: Some("  rust 2.0\n\tRELEASED ".into()),
            link: Some("HTTPS://EXAMPLE.COM/rust ".into()),
            content: Some("<div>Big news\n<b>today</b></div>".into()),
            author: Some(" ferris".into()),
            ..item()
        };
        assert_eq!(fingerprint(&item()), fingerprint(&noisy));
    }

    #[test]
    fn test_each_field_changes_fingerprint() {
        let base = fingerprint(&item());
        let variants = [
            ParsedItem { link: Some("https://example.com/other".into()), ..item() },
            ParsedItem { title: Some("Rust 3.0 Released".into()), ..item() },
            ParsedItem { author: Some("Crab".into()), ..item() },
            ParsedItem { content: Some("<p>Small news</p>".into()), ..item() },
            ParsedItem {
                published_at: Some(Utc.with_ymd_and_hms(2025, 3, 2, 12, 0, 0).unwrap()),
                ..item()
            },
            ParsedItem { published_at: None, ..item() },
        ];
        for variant in variants {
            assert_ne!(base, fingerprint(&variant), "{variant:?}");
        }
    }

    #[test]
    fn test_fields_do_not_bleed_into_each_other() {
        let a = ParsedItem { title: Some("ab".into()), author: Some("c".into()), ..ParsedItem::default() };
        let b = ParsedItem { title: Some("a".into()), author: Some("bc".into()), ..ParsedItem::default() };
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_identity_key_prefers_guid() {
        let with_guid = ParsedItem { guid: Some("guid-1".into()), ..item() };
        assert_eq!(identity_key(&with_guid), ("guid-1".to_string(), None));

        let (key, fp) = identity_key(&item());
        assert_eq!(Some(key), fp);
    }

    fn words() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-zA-Z0-9]{1,8}", 1..6)
    }

    fn spaced(words: &[String], gaps: &[String]) -> String {
        let mut out = gaps.first().cloned().unwrap_or_default();
        for (i, w) in words.iter().enumerate() {
            out.push_str(w);
            out.push_str(gaps.get(i + 1).map_or(" ", String::as_str));
        }
        out
    }

    proptest! {
        #[test]
        fn prop_whitespace_markup_and_case_invariant(
            title in words(),
            content in words(),
            gaps in prop::collection::vec("[ \t\n]{1,3}", 7),
        ) {
            let plain = ParsedItem {
                title: Some(title.join(" ")),
                content: Some(content.join(" ")),
                ..ParsedItem::default()
            };
            let wrapped: Vec<String> = content.iter().map(|w| format!("<b>{}</b>", w.to_uppercase())).collect();
            let noisy = ParsedItem {
                title: Some(spaced(&title, &gaps).to_uppercase()),
                content: Some(format!("<p>{}</p>", spaced(&wrapped, &gaps))),
                ..ParsedItem::default()
            };
            prop_assert_eq!(fingerprint(&plain), fingerprint(&noisy));
        }

        #[test]
        fn prop_distinct_links_distinct_fingerprints(a in "[a-z]{1,12}", b in "[a-z]{1,12}") {
            prop_assume!(a != b);
            let left = ParsedItem { link: Some(format!("https://example.com/{a}")), ..ParsedItem::default() };
            let right = ParsedItem { link: Some(format!("https://example.com/{b}")), ..ParsedItem::default() };
            prop_assert_ne!(fingerprint(&left), fingerprint(&right));
        }
    }
}
