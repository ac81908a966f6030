//! Site adapters: source detection, the fetch/parse trait, shared client, and
//! one adapter per source (FanFiction.Net, FictionPress, local library).

mod client;
mod error;

pub mod fanfiction;
pub mod fictionpress;
pub mod local;

pub use client::{FetchClient, FetchClientBuilder};
pub use error::AdapterError;

use crate::assembler::AssemblyError;
use crate::model::StoryRecord;
use crate::queue::Identifier;
use reqwest::Url;
use std::path::Path;

/// Raw material an adapter fetched for one story, before normalization.
///
/// Remote adapters put the story page HTML in `body`; the local adapter puts the
/// metadata file there and carries chapter files as `attachments`
/// (file name, contents).
#[derive(Debug, Clone)]
pub struct RawDocument {
    /// Origin URL or local path, echoed into the record for reporting.
    pub origin: String,
    pub body: String,
    pub attachments: Vec<(String, String)>,
}

impl RawDocument {
    pub fn remote(origin: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            body: body.into(),
            attachments: Vec::new(),
        }
    }
}

/// Supported story source, selected once per assembly from the identifier shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    FanFictionNet,
    FictionPress,
    Local,
}

/// Trait implemented by source adapters.
///
/// `fetch` performs the only I/O; `parse` is pure and turns the fetched
/// [RawDocument] into the canonical [StoryRecord]. Recovering some but not all
/// chapters is not a parse failure: the record comes back with `partial: true`.
pub trait SiteAdapter {
    fn fetch(&mut self, identifier: &Identifier) -> Result<RawDocument, AdapterError>;
    fn parse(&self, document: &RawDocument) -> Result<StoryRecord, AdapterError>;
}

/// Resolve which source handles an identifier. Local identifiers always match
/// the local adapter; remote ones are keyed by URL host.
pub fn resolve_source(identifier: &Identifier) -> Result<Source, AssemblyError> {
    match identifier {
        Identifier::Local(_) => Ok(Source::Local),
        Identifier::Remote(input) => {
            let url = Url::parse(input).map_err(|e| AssemblyError::UnknownSource {
                input: input.clone(),
                reason: e.to_string(),
            })?;
            let host = url
                .host_str()
                .ok_or_else(|| AssemblyError::UnknownSource {
                    input: input.clone(),
                    reason: "URL has no host".to_string(),
                })?;
            if host.contains("fanfiction.net") {
                Ok(Source::FanFictionNet)
            } else if host.contains("fictionpress.com") {
                Ok(Source::FictionPress)
            } else {
                Err(AssemblyError::UnknownSource {
                    input: input.clone(),
                    reason: format!("no adapter for host '{}'", host),
                })
            }
        }
    }
}

/// Build the adapter for a resolved source. The returned adapter borrows the
/// shared client (remote) or the library directory (local).
pub fn adapter_for<'a>(
    source: Source,
    client: &'a mut FetchClient,
    library_dir: &'a Path,
) -> Box<dyn SiteAdapter + 'a> {
    match source {
        Source::FanFictionNet => Box::new(fanfiction::FanFictionNetAdapter::new(client)),
        Source::FictionPress => Box::new(fictionpress::FictionPressAdapter::new(client)),
        Source::Local => Box::new(local::LocalAdapter::new(library_dir)),
    }
}

/// Parse a site stats number like "88,420" (thousands separators allowed).
pub(crate) fn parse_stat_number(s: &str) -> Option<u64> {
    let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Strip a leading "N. " ordinal from a chapter-list entry so names keep only
/// the author's title (e.g. "3. The Long Night" -> "The Long Night").
pub(crate) fn strip_chapter_ordinal(s: &str) -> String {
    let t = s.trim();
    if let Some((head, tail)) = t.split_once(". ") {
        if !head.is_empty() && head.chars().all(|c| c.is_ascii_digit()) {
            return tail.trim().to_string();
        }
    }
    t.to_string()
}
