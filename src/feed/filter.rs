//! Keyword filtering of feed entries.

use super::types::Entry;

/// Keep entries whose title or description contains at least one keyword.
///
/// An empty keyword list accepts everything. Matching is a case-sensitive
/// substring match; surviving entries keep their input order.
pub fn filter_by_keywords(entries: Vec<Entry>, keywords: &[String]) -> Vec<Entry> {
    if keywords.is_empty() {
        return entries;
    }

    entries
        .into_iter()
        .filter(|entry| matches_any(entry, keywords))
        .collect()
}

fn matches_any(entry: &Entry, keywords: &[String]) -> bool {
    keywords
        .iter()
        .any(|k| entry.title.contains(k.as_str()) || entry.description.contains(k.as_str()))
}
