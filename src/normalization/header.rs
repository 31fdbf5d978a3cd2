use std::collections::HashMap;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Canonicalize a raw column header into a comparable key.
///
/// Normalization steps:
/// - trim whitespace and lowercase
/// - drop `*` required-field markers, then trim again
/// - NFKD-decompose and keep only ASCII (accents and other marks vanish)
/// - collapse internal whitespace runs to a single space
pub fn normalize_header(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase().replace('*', "");
    let ascii: String = lowered
        .trim()
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .filter(char::is_ascii)
        .collect();
    ascii.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalized header → column index for a header row.
///
/// When two headers normalize to the same key the later column wins, so a
/// lookup always lands on the rightmost spelling.
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    by_key: HashMap<String, usize>,
    keys: Vec<String>,
}

impl HeaderMap {
    pub fn new<S: AsRef<str>>(headers: &[S]) -> Self {
        let mut by_key = HashMap::with_capacity(headers.len());
        let mut keys = Vec::with_capacity(headers.len());
        for (idx, raw) in headers.iter().enumerate() {
            let key = normalize_header(raw.as_ref());
            by_key.insert(key.clone(), idx);
            keys.push(key);
        }
        Self { by_key, keys }
    }

    pub fn get(&self, normalized: &str) -> Option<usize> {
        self.by_key.get(normalized).copied()
    }

    pub fn contains(&self, normalized: &str) -> bool {
        self.by_key.contains_key(normalized)
    }

    /// Normalized keys in column order, paired with the column each one
    /// resolves to after collisions.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        let mut seen = std::collections::HashSet::new();
        self.keys.iter().filter_map(move |k| {
            if seen.insert(k.as_str()) {
                self.by_key.get(k).map(|idx| (k.as_str(), *idx))
            } else {
                None
            }
        })
    }
}
