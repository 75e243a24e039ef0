use std::borrow::Cow;

/// Collapses every run of Unicode whitespace into a single ASCII space and
/// trims both ends.
///
/// Returns `Cow::Borrowed` when the input is already collapsed.
///
/// # Examples
///
/// ```
/// use feedward::util::collapse_whitespace;
///
/// assert_eq!(collapse_whitespace("  Hello \n\t world "), "Hello world");
/// assert_eq!(collapse_whitespace("tidy"), "tidy");
/// ```
pub fn collapse_whitespace(s: &str) -> Cow<'_, str> {
    let trimmed = s.trim();
    let mut prev_space = false;
    let already_clean = trimmed.chars().all(|c| {
        let bad = c.is_whitespace() && (c != ' ' || prev_space);
        prev_space = c == ' ';
        !bad
    });
    if already_clean {
        return Cow::Borrowed(trimmed);
    }

    let mut out = String::with_capacity(trimmed.len());
    for word in trimmed.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    Cow::Owned(out)
}

/// Identity normalization for fingerprinting: trim, collapse internal
/// whitespace, lowercase.
pub fn normalize_text(s: &str) -> String {
    collapse_whitespace(s).to_lowercase()
}

/// Strips markup from an HTML fragment, leaving collapsed plain text.
///
/// Tags are dropped without inserting separators. `<script>`/`<style>` bodies and
/// comments are removed entirely. Named entities for the common XML/HTML set and
/// numeric entities (`&#39;`, `&#x27;`) are decoded; unknown entities are kept
/// verbatim.
///
/// # Examples
///
/// ```
/// use feedward::util::strip_markup;
///
/// assert_eq!(strip_markup("<p>Fish &amp; <b>chips</b></p>"), "Fish & chips");
/// assert_eq!(strip_markup("  plain\n text "), "plain text");
/// ```
pub fn strip_markup(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(pos) = rest.find(|c: char| c == '<' || c == '&') {
        text.push_str(&rest[..pos]);
        rest = &rest[pos..];

        if rest.starts_with("<!--") {
            rest = match rest.find("-->") {
                Some(end) => &rest[end + 3..],
                None => "",
            };
        } else if rest.starts_with('<') {
            let Some(end) = rest.find('>') else {
                // Unterminated tag: treat the rest as text.
                text.push_str(rest);
                rest = "";
                break;
            };
            let tag = rest[1..end].to_ascii_lowercase();
            rest = &rest[end + 1..];
            let name = tag.split_whitespace().next().unwrap_or_default();
            if name == "script" || name == "style" {
                let close = format!("</{name}");
                rest = match rest.to_ascii_lowercase().find(&close) {
                    Some(i) => rest[i..].find('>').map_or("", |j| &rest[i + j + 1..]),
                    None => "",
                };
            }
        } else {
            // '&'
            match decode_entity(rest) {
                Some((ch, consumed)) => {
                    text.push(ch);
                    rest = &rest[consumed..];
                }
                None => {
                    text.push('&');
                    rest = &rest[1..];
                }
            }
        }
    }
    text.push_str(rest);

    collapse_whitespace(&text).into_owned()
}

/// Decodes one entity at the start of `s`, returning the character and how
/// many bytes were consumed.
fn decode_entity(s: &str) -> Option<(char, usize)> {
    let end = s.get(..12.min(s.len()))?.find(';')?;
    let name = &s[1..end];
    let ch = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or(name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                name.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code)?
        }
    };
    Some((ch, end + 1))
}

/// Strips control characters and ANSI escape sequences from untrusted feed text.
///
/// Feed titles, authors and bodies come straight off the network and are later
/// rendered by clients, so escape sequences must not reach storage.
///
/// Removes:
/// - ASCII control chars: 0x00-0x08, 0x0B-0x0C, 0x0E-0x1F, 0x7F
/// - CSI sequences: `\x1b[` ... final byte 0x40-0x7E
/// - OSC sequences: `\x1b]` ... BEL or ST (`\x1b\\`)
/// - any other bare ESC
///
/// Tab, newline and carriage return are kept. Clean input is returned borrowed.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    fn is_stripped(b: u8) -> bool {
        b == 0x1b || b == 0x7f || (b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r'))
    }

    let bytes = s.as_bytes();
    if !bytes.iter().any(|&b| is_stripped(b)) {
        return Cow::Borrowed(s);
    }

    let len = bytes.len();
    let mut out = String::with_capacity(len);
    let mut i = 0;

    while i < len {
        match bytes[i] {
            0x1b if bytes.get(i + 1) == Some(&b'[') => {
                i += 2;
                while i < len {
                    i += 1;
                    if (0x40..=0x7e).contains(&bytes[i - 1]) {
                        break;
                    }
                }
            }
            0x1b if bytes.get(i + 1) == Some(&b']') => {
                i += 2;
                while i < len {
                    if bytes[i] == 0x07 {
                        i += 1;
                        break;
                    }
                    if bytes[i] == 0x1b && bytes.get(i + 1) == Some(&b'\\') {
                        i += 2;
                        break;
                    }
                    i += 1;
                }
            }
            b if is_stripped(b) => i += 1,
            _ => {
                let start = i;
                while i < len && !is_stripped(bytes[i]) {
                    i += 1;
                }
                // Only ASCII bytes stop the run, so the slice stays on char boundaries.
                out.push_str(&s[start..i]);
            }
        }
    }

    Cow::Owned(out)
}
