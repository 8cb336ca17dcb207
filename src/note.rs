//! Outbound notes built from feed entries.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::feed::Entry;
use crate::RelayError;

/// Misskey note visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    #[default]
    Home,
    Followers,
    Specified,
}

impl Visibility {
    /// Wire name of the visibility.
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Home => "home",
            Visibility::Followers => "followers",
            Visibility::Specified => "specified",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "public" => Ok(Visibility::Public),
            "home" => Ok(Visibility::Home),
            "followers" => Ok(Visibility::Followers),
            "specified" => Ok(Visibility::Specified),
            other => Err(RelayError::Validation(format!(
                "unknown visibility: {other}"
            ))),
        }
    }
}

/// A message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub text: String,
    pub visibility: Visibility,
}

impl Note {
    /// Create a note from raw text.
    pub fn new(text: impl Into<String>, visibility: Visibility) -> Self {
        Self {
            text: text.into(),
            visibility,
        }
    }

    /// Build the note for an entry, inserting the summary when present.
    pub fn from_entry(entry: &Entry, summary: Option<&str>, visibility: Visibility) -> Self {
        let text = match summary.map(str::trim).filter(|s| !s.is_empty()) {
            Some(summary) => format!("📰 {}\n\n{}\n\n{}", entry.title, summary, entry.link),
            None => format!("📰 {}\n{}", entry.title, entry.link),
        };
        Self { text, visibility }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_entry() -> Entry {
        Entry::new(
            "guid-1",
            "Test Article",
            "https://example.tld/article",
            Utc::now(),
        )
    }

    #[test]
    fn test_note_without_summary() {
        let note = Note::from_entry(&sample_entry(), None, Visibility::Home);
        assert_eq!(note.text, "📰 Test Article\nhttps://example.tld/article");
        assert_eq!(note.visibility, Visibility::Home);
    }

    #[test]
    fn test_note_with_summary() {
        let note = Note::from_entry(
            &sample_entry(),
            Some("  A short summary.\n"),
            Visibility::Public,
        );
        assert_eq!(
            note.text,
            "📰 Test Article\n\nA short summary.\n\nhttps://example.tld/article"
        );
    }

    #[test]
    fn test_blank_summary_is_ignored() {
        let note = Note::from_entry(&sample_entry(), Some("   "), Visibility::Home);
        assert_eq!(note.text, "📰 Test Article\nhttps://example.tld/article");
    }

    #[test]
    fn test_visibility_round_trip_names() {
        for (name, vis) in [
            ("public", Visibility::Public),
            ("home", Visibility::Home),
            ("followers", Visibility::Followers),
            ("specified", Visibility::Specified),
        ] {
            assert_eq!(vis.as_str(), name);
            assert_eq!(name.parse::<Visibility>().unwrap(), vis);
        }
        assert_eq!("HOME".parse::<Visibility>().unwrap(), Visibility::Home);
        assert!("friends".parse::<Visibility>().is_err());
    }

    #[test]
    fn test_visibility_serializes_lowercase() {
        let json = serde_json::to_string(&Visibility::Followers).unwrap();
        assert_eq!(json, "\"followers\"");
    }
}
