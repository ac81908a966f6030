//! Canonical data model for normalized stories.
//!
//! All site adapters produce a [StoryRecord]; the ebook-packaging collaborator
//! consumes it (as JSON) as the single source of truth.

use serde::{Deserialize, Serialize};

/// Normalized story: metadata plus chapters in reading order.
///
/// `title` is non-empty once populated (adapters reject pages without one).
/// `chapters` is either empty (not yet populated) or complete for everything the
/// source yielded; a source that declared more chapters than could be recovered
/// sets `partial` instead of failing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryRecord {
    pub title: String,
    pub author: String,
    #[serde(rename = "wordCount")]
    pub word_count: u64,
    /// Site rating token (e.g. "Fiction T", "K+"). Free-form: sites disagree on vocabularies.
    pub rating: String,
    pub chapters: Vec<ChapterRef>,
    /// Some declared chapters could not be recovered. Reported as succeeded-with-warning.
    #[serde(default)]
    pub partial: bool,
    /// Origin URL or local path, for logging and the report.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

/// One chapter reference in reading order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRef {
    #[serde(rename = "sourceUrl")]
    pub source_url: String,
    /// Canonical or source-provided name. Empty until resolution; the resolver
    /// guarantees a non-empty name ("Chapter N", 1-based) afterwards.
    #[serde(rename = "displayName", default)]
    pub display_name: String,
}

impl ChapterRef {
    /// Chapter with no name yet; the resolver fills it in.
    pub fn unnamed(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            display_name: String::new(),
        }
    }

    /// Fallback display name for a 1-based chapter position.
    pub fn default_name(index: usize) -> String {
        format!("Chapter {}", index)
    }
}
