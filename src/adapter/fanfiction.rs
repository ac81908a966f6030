//! FanFiction.Net adapter. Fetches the story page (profile block + chapter
//! select) and normalizes it into a [StoryRecord].
//!
//! FictionPress runs the same site software, so the parsing here is shared with
//! the FictionPress adapter; only the host differs.

use crate::adapter::error::AdapterError;
use crate::adapter::{parse_stat_number, strip_chapter_ordinal, FetchClient, RawDocument, SiteAdapter};
use crate::model::{ChapterRef, StoryRecord};
use crate::queue::Identifier;
use reqwest::Url;
use scraper::{Html, Selector};

pub(crate) const FANFICTION_BASE: &str = "https://www.fanfiction.net";

/// Parse a CSS selector or return a parse error (avoids panics from Selector::parse).
fn parse_selector(sel: &str, origin: &str) -> Result<Selector, AdapterError> {
    Selector::parse(sel)
        .map_err(|e| AdapterError::parse(format!("selector {:?} ({})", sel, e), origin))
}

/// Story id and slug from a story URL path `/s/<id>/<chapter>/<slug>`.
fn story_url_parts(origin: &str) -> Option<(String, String)> {
    let url = Url::parse(origin).ok()?;
    let mut segments = url.path_segments()?;
    if segments.next()? != "s" {
        return None;
    }
    let id = segments.next()?.to_string();
    let _chapter = segments.next();
    let slug = segments.next().unwrap_or("").to_string();
    Some((id, slug))
}

/// Value for one stats-line key, e.g. `extract_stat(s, "Words: ")`.
/// Stats entries are " - " separated: "Rated: Fiction T - English - Words: 88,420 - ...".
fn extract_stat<'a>(stats: &'a str, key: &str) -> Option<&'a str> {
    let start = stats.find(key)? + key.len();
    let rest = &stats[start..];
    let end = rest.find(" - ").unwrap_or(rest.len());
    let value = rest[..end].trim();
    (!value.is_empty()).then_some(value)
}

/// Normalize a fetched story page into a [StoryRecord].
///
/// Title and a usable chapter list are required; author, rating, and word count
/// degrade gracefully. A chapter select that declares more entries than can be
/// recovered yields `partial: true` rather than an error.
pub(crate) fn parse_story_page(
    document: &RawDocument,
    base: &str,
) -> Result<StoryRecord, AdapterError> {
    let origin = document.origin.as_str();
    let doc = Html::parse_document(&document.body);

    let title_sel = parse_selector("#profile_top b.xcontrast_txt", origin)?;
    let title = doc
        .select(&title_sel)
        .next()
        .map(|e| e.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AdapterError::parse("title", origin))?;

    let author_sel = parse_selector("#profile_top a.xcontrast_txt[href^=\"/u/\"]", origin)?;
    let author = doc
        .select(&author_sel)
        .next()
        .map(|e| e.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Unknown".to_string());

    let stats_sel = parse_selector("#profile_top span.xgray", origin)?;
    let stats = doc
        .select(&stats_sel)
        .next()
        .map(|e| e.text().collect::<String>())
        .unwrap_or_default();
    let rating = extract_stat(&stats, "Rated: ")
        .unwrap_or_default()
        .to_string();
    let word_count = extract_stat(&stats, "Words: ")
        .and_then(parse_stat_number)
        .unwrap_or(0);

    let (story_id, slug) =
        story_url_parts(origin).ok_or_else(|| AdapterError::parse("story id", origin))?;

    let select_sel = parse_selector("select#chap_select option", origin)?;
    let options: Vec<_> = doc.select(&select_sel).collect();

    let mut chapters = Vec::with_capacity(options.len().max(1));
    let mut partial = false;
    if options.is_empty() {
        // One-shot story: the page itself is the only chapter.
        chapters.push(ChapterRef::unnamed(origin));
    } else {
        // The select is duplicated top and bottom of the page; dedup by value.
        let mut seen = std::collections::HashSet::new();
        for option in &options {
            let Some(value) = option.value().attr("value") else {
                partial = true;
                continue;
            };
            if !seen.insert(value.to_string()) {
                continue;
            }
            let name = strip_chapter_ordinal(&option.text().collect::<String>());
            chapters.push(ChapterRef {
                source_url: format!("{}/s/{}/{}/{}", base, story_id, value, slug),
                display_name: name,
            });
        }
        if chapters.is_empty() {
            return Err(AdapterError::parse("chapter list", origin));
        }
    }

    Ok(StoryRecord {
        title,
        author,
        word_count,
        rating,
        chapters,
        partial,
        source_url: Some(origin.to_string()),
    })
}

/// FanFiction.Net adapter. Holds a reference to the shared polite client.
pub struct FanFictionNetAdapter<'a> {
    client: &'a mut FetchClient,
}

impl<'a> FanFictionNetAdapter<'a> {
    pub fn new(client: &'a mut FetchClient) -> Self {
        Self { client }
    }
}

impl SiteAdapter for FanFictionNetAdapter<'_> {
    fn fetch(&mut self, identifier: &Identifier) -> Result<RawDocument, AdapterError> {
        let url = identifier
            .as_remote_url()
            .ok_or_else(|| AdapterError::parse("identifier", identifier.to_string()))?;
        let body = self.client.get_text(url)?;
        Ok(RawDocument::remote(url, body))
    }

    fn parse(&self, document: &RawDocument) -> Result<StoryRecord, AdapterError> {
        parse_story_page(document, FANFICTION_BASE)
    }
}
