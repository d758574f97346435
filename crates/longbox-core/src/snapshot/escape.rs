//! Reversible substitution tokens for snapshot labels.
//!
//! Labels live in a `;`/`,` delimited line, so the two delimiters are written
//! as tokens sharing the prefix `.&@`:
//!
//! | logical | on disk |
//! |---------|---------|
//! | `.&@`   | `.&@0`  |
//! | `,`     | `.&@1`  |
//! | `;`     | `.&@2`  |
//! | leading ` ` | `.&@3` |
//!
//! Escaping the prefix itself makes the mapping a bijection, so a label that
//! already contains a token survives the round trip. `.&@1` and `.&@2` match
//! the tokens found in existing snapshot files. A leading space is escaped
//! because the reader treats `, ` as part of a label, not a delimiter.

use std::borrow::Cow;

/// Prefix shared by every substitution token.
pub const TOKEN_PREFIX: &str = ".&@";

const LITERAL_PREFIX_TOKEN: &str = ".&@0";
const COMMA_TOKEN: &str = ".&@1";
const SEMICOLON_TOKEN: &str = ".&@2";
const LEADING_SPACE_TOKEN: &str = ".&@3";

/// Escape a logical label for the snapshot file.
#[must_use]
pub fn escape_label(label: &str) -> Cow<'_, str> {
    if !label.contains([',', ';']) && !label.contains(TOKEN_PREFIX) && !label.starts_with(' ') {
        return Cow::Borrowed(label);
    }

    let escaped = label
        .replace(TOKEN_PREFIX, LITERAL_PREFIX_TOKEN)
        .replace(',', COMMA_TOKEN)
        .replace(';', SEMICOLON_TOKEN);

    match escaped.strip_prefix(' ') {
        Some(rest) => Cow::Owned(format!("{LEADING_SPACE_TOKEN}{rest}")),
        None => Cow::Owned(escaped),
    }
}

/// Restore the logical label from its on-disk form.
///
/// A prefix that is not followed by a known token digit is kept verbatim.
#[must_use]
pub fn unescape_label(raw: &str) -> Cow<'_, str> {
    if !raw.contains(TOKEN_PREFIX) {
        return Cow::Borrowed(raw);
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(pos) = rest.find(TOKEN_PREFIX) {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + TOKEN_PREFIX.len()..];
        let replacement = match after.as_bytes().first() {
            Some(b'0') => Some(TOKEN_PREFIX),
            Some(b'1') => Some(","),
            Some(b'2') => Some(";"),
            Some(b'3') => Some(" "),
            _ => None,
        };
        match replacement {
            Some(text) => {
                out.push_str(text);
                rest = &after[1..];
            }
            None => {
                out.push_str(TOKEN_PREFIX);
                rest = after;
            }
        }
    }
    out.push_str(rest);

    Cow::Owned(out)
}

/// Normalize a label received from the remote catalog.
///
/// Line breaks cannot be represented in a line-oriented snapshot and are
/// dropped.
#[must_use]
pub fn normalize_remote_label(raw: &str) -> String {
    raw.chars().filter(|c| !matches!(c, '\n' | '\r')).collect()
}

/// Whether an escaped label list must be wrapped in double quotes.
pub fn needs_quoting<'a>(mut escaped: impl Iterator<Item = &'a str>) -> bool {
    escaped.any(|label| label.contains([' ', '"']))
}
