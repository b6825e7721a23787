//! Simultaneous string substitution shared by the filename codec.
//!
//! Replacements are applied in a single pass over one alternation pattern, so
//! the output of one replacement can never be re-matched by another. Longer
//! keys are tried first; overlapping candidates at the same position resolve
//! to the leftmost match.

use indexmap::IndexMap;
use regex::Regex;

use crate::errors::ConfigError;

/// Replace every occurrence of each key with its mapped value, in one pass.
///
/// With `match_end` set, a key only matches at the very end of the text. The
/// decoder relies on this so that expanding `rec` to `reconstruction` leaves
/// a `recording` key untouched.
pub fn multireplace(
    text: &str,
    replacements: &IndexMap<String, String>,
    match_end: bool,
) -> Result<String, ConfigError> {
    if replacements.is_empty() {
        return Ok(text.to_string());
    }
    let mut keys: Vec<&String> = replacements.keys().collect();
    keys.sort_by(|a, b| b.len().cmp(&a.len()));

    let mut pattern = String::new();
    for (idx, key) in keys.iter().enumerate() {
        if idx > 0 {
            pattern.push('|');
        }
        pattern.push_str(&regex::escape(key));
        if match_end {
            pattern.push('$');
        }
    }
    let matcher = Regex::new(&pattern)?;
    let replaced = matcher.replace_all(text, |caps: &regex::Captures<'_>| {
        let matched = &caps[0];
        replacements
            .get(matched)
            .cloned()
            .unwrap_or_else(|| matched.to_string())
    });
    Ok(replaced.into_owned())
}

/// Rename the keys of a map with [`multireplace`], keeping value order.
///
/// When two keys collide after renaming, the later entry's value wins at the
/// earlier entry's position.
pub fn rename_keys<V: Clone>(
    map: &IndexMap<String, V>,
    replacements: &IndexMap<String, String>,
    match_end: bool,
) -> Result<IndexMap<String, V>, ConfigError> {
    let mut renamed = IndexMap::with_capacity(map.len());
    for (key, value) in map {
        let new_key = multireplace(key, replacements, match_end)?;
        renamed.insert(new_key, value.clone());
    }
    Ok(renamed)
}
