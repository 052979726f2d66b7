//! Creature name normalization.
//!
//! Every lookup in the cache goes through [`normalize`], so "Mr. Mime",
//! "mr-mime" and "MRMIME" all resolve to the same record.

/// Map a display name to its canonical lookup key.
///
/// Lower-cases the input and drops every character that is not an ASCII
/// letter or digit.
pub fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
