//! Name normalization for canonical entity keys.
//!
//! Two raw names that differ only by case, whitespace, punctuation or
//! diacritics produce the same key, so they resolve to the same entity.

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Characters removed outright instead of acting as a word separator, so
/// that "Crohn's" and "Crohns" share a key.
const ELIDED: &[char] = &['\'', '\u{2019}', '\u{02bc}', '`'];

/// Normalize a raw name into its canonical key.
///
/// Performs:
/// - lowercasing
/// - Unicode compatibility decomposition (NFKD) with combining marks dropped
/// - apostrophe elision
/// - every other non-alphanumeric run collapsed to a single space
/// - leading and trailing separators trimmed
///
/// The function is pure and idempotent.
pub fn normalize(raw: &str) -> String {
  let mut key = String::with_capacity(raw.len());
  let mut pending_space = false;

  let lowered = raw.to_lowercase();
  for c in lowered.nfkd() {
    if is_combining_mark(c) || ELIDED.contains(&c) {
      continue;
    }
    if c.is_alphanumeric() {
      if pending_space && !key.is_empty() {
        key.push(' ');
      }
      pending_space = false;
      // Decomposition can surface capitals (e.g. U+210C), so fold again.
      key.extend(c.to_lowercase());
    } else {
      pending_space = true;
    }
  }

  key
}
