//! Word-list and enrichment data types.

use serde::{Deserialize, Serialize};

/// A named word-book group as reported by a dictionary account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[must_use]
pub struct WordGroup {
    /// Display name of the group.
    pub name: String,
    /// Provider-side identifier of the group.
    pub id: String,
}

impl WordGroup {
    /// Create a group from its display name and provider-side identifier.
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }
}

/// An example sentence or phrase together with its translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentencePair {
    /// Source-language text.
    pub text: String,
    /// Translated text.
    pub translation: String,
}

/// Enrichment data for a single word as returned by a query provider.
///
/// Providers fill in whatever they know; everything except the term
/// itself is optional or may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordRecord {
    /// The word this record describes.
    pub term: String,
    /// Definitions, one entry per sense.
    #[serde(default)]
    pub definition: Vec<String>,
    /// Phrases containing the term.
    #[serde(default)]
    pub phrase: Vec<SentencePair>,
    /// Example sentences.
    #[serde(default)]
    pub sentence: Vec<SentencePair>,
    /// URL of an illustrative image.
    #[serde(default)]
    pub image: Option<String>,
    /// British phonetic notation.
    #[serde(default)]
    pub uk_phonetic: Option<String>,
    /// American phonetic notation.
    #[serde(default)]
    pub us_phonetic: Option<String>,
    /// URL of the British pronunciation audio.
    #[serde(default)]
    pub uk_pron: Option<String>,
    /// URL of the American pronunciation audio.
    #[serde(default)]
    pub us_pron: Option<String>,
}

impl WordRecord {
    /// Create an otherwise empty record for the given term.
    #[must_use]
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            ..Self::default()
        }
    }
}
