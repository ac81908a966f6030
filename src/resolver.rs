//! Best-effort canonical chapter names.
//!
//! A secondary source, keyed by story title and author, can supply
//! better-quality chapter names than the site's own chapter list. Resolution is
//! strictly best-effort: any per-chapter failure falls back to the existing name
//! or "Chapter N", and never fails story assembly.

use crate::adapter::FetchClient;
use crate::model::{ChapterRef, StoryRecord};
use anyhow::{anyhow, Context};
use reqwest::Url;

/// Secondary source of canonical chapter names.
///
/// `index` is 1-based. An error means "no canonical name for this chapter";
/// the resolver falls back for that chapter only.
pub trait ChapterNameSource {
    fn canonical_name(&mut self, title: &str, author: &str, index: usize)
        -> anyhow::Result<String>;
}

/// Applies a [ChapterNameSource] to a record with per-chapter fallback.
///
/// With no source configured, resolution only fills in default names where the
/// adapter left a chapter unnamed.
pub struct ChapterNameResolver {
    source: Option<Box<dyn ChapterNameSource>>,
}

impl ChapterNameResolver {
    pub fn new(source: Option<Box<dyn ChapterNameSource>>) -> Self {
        Self { source }
    }

    /// Resolve display names for every chapter, in order.
    ///
    /// Never fails: a lookup failure keeps an already-populated name, and an
    /// unnamed chapter falls back to "Chapter N" (1-based).
    pub fn resolve(&mut self, record: &mut StoryRecord) {
        let title = record.title.clone();
        let author = record.author.clone();
        for (i, chapter) in record.chapters.iter_mut().enumerate() {
            let index = i + 1;
            let looked_up = self
                .source
                .as_mut()
                .and_then(|s| s.canonical_name(&title, &author, index).ok())
                .filter(|name| !name.trim().is_empty());
            match looked_up {
                Some(name) => chapter.display_name = name,
                None if chapter.display_name.trim().is_empty() => {
                    chapter.display_name = ChapterRef::default_name(index);
                }
                None => {}
            }
        }
    }
}

/// Production name source: fetches one JSON array of chapter names per story
/// from a configurable endpoint and serves per-chapter lookups from the cache.
///
/// The endpoint is queried as `{base}?title=...&author=...` and must return a
/// JSON array of strings in chapter order. The lookup result (success or
/// failure) is cached per story key, so each story costs at most one request
/// and a failed lookup never bleeds into the next story on the same worker.
pub struct EndpointNameSource {
    client: FetchClient,
    base_url: String,
    /// Last lookup: story key (title, author) and its outcome. A failed fetch
    /// is cached as the error message so retries wait for the next story.
    cache: Option<(StoryKey, Result<Vec<String>, String>)>,
}

type StoryKey = (String, String);

impl EndpointNameSource {
    pub fn new(client: FetchClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            cache: None,
        }
    }

    fn lookup(&mut self, title: &str, author: &str) -> Result<Vec<String>, String> {
        let url =
            Url::parse_with_params(&self.base_url, &[("title", title), ("author", author)])
                .map_err(|e| format!("invalid name source URL {}: {}", self.base_url, e))?;
        let body = self
            .client
            .get_text(url.as_str())
            .map_err(|e| format!("name source fetch failed: {}", e))?;
        names_from_json(&body).map_err(|e| e.to_string())
    }

    fn fetch_names(&mut self, title: &str, author: &str) -> anyhow::Result<&[String]> {
        let key: StoryKey = (title.to_string(), author.to_string());
        let cached = matches!(&self.cache, Some((k, _)) if *k == key);
        if !cached {
            let outcome = self.lookup(title, author);
            self.cache = Some((key, outcome));
        }
        match &self.cache {
            Some((_, Ok(names))) => Ok(names),
            Some((_, Err(msg))) => Err(anyhow!("{}", msg)),
            None => Err(anyhow!("name lookup produced no result")),
        }
    }
}

impl ChapterNameSource for EndpointNameSource {
    fn canonical_name(
        &mut self,
        title: &str,
        author: &str,
        index: usize,
    ) -> anyhow::Result<String> {
        let names = self.fetch_names(title, author)?;
        index
            .checked_sub(1)
            .and_then(|i| names.get(i))
            .cloned()
            .ok_or_else(|| anyhow!("no canonical name for chapter {}", index))
    }
}

/// Parse the endpoint response: a JSON array of chapter name strings.
fn names_from_json(body: &str) -> anyhow::Result<Vec<String>> {
    let names: Vec<String> =
        serde_json::from_str(body).context("name source returned malformed JSON")?;
    Ok(names)
}
