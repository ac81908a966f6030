//! Local library adapter. Reads a saved story directory instead of the network
//! and synthesizes a [RawDocument] from file contents.
//!
//! Expected layout under the library directory:
//!   {library_dir}/{name}/story.toml   — title, author, rating, optional counts
//!   {library_dir}/{name}/*.html       — one file per chapter, filename order

use crate::adapter::error::AdapterError;
use crate::adapter::{RawDocument, SiteAdapter};
use crate::model::{ChapterRef, StoryRecord};
use crate::queue::Identifier;
use scraper::{Html, Selector};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// story.toml contents. Only `title` is required for a usable record.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StoryMeta {
    title: Option<String>,
    author: Option<String>,
    rating: Option<String>,
    word_count: Option<u64>,
    /// Declared chapter count; fewer files than declared marks the record partial.
    chapter_count: Option<usize>,
}

/// Adapter over a story subdirectory of the local library.
pub struct LocalAdapter<'a> {
    library_dir: &'a Path,
}

impl<'a> LocalAdapter<'a> {
    pub fn new(library_dir: &'a Path) -> Self {
        Self { library_dir }
    }

    fn story_dir(&self, identifier: &Identifier) -> Result<PathBuf, AdapterError> {
        match identifier {
            Identifier::Local(name) => Ok(self.library_dir.join(name)),
            Identifier::Remote(url) => Err(AdapterError::parse("identifier", url.clone())),
        }
    }
}

impl SiteAdapter for LocalAdapter<'_> {
    fn fetch(&mut self, identifier: &Identifier) -> Result<RawDocument, AdapterError> {
        let dir = self.story_dir(identifier)?;
        let origin = dir.display().to_string();
        if !dir.is_dir() {
            return Err(AdapterError::not_found(origin));
        }

        // Metadata file may be absent; parse() then fails on the missing title.
        let meta_path = dir.join("story.toml");
        let body = match std::fs::read_to_string(&meta_path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(AdapterError::network(meta_path.display().to_string(), e)),
        };

        let mut entries: Vec<PathBuf> = std::fs::read_dir(&dir)
            .map_err(|e| AdapterError::network(origin.clone(), e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "html"))
            .collect();
        entries.sort();

        let mut attachments = Vec::with_capacity(entries.len());
        for path in entries {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| AdapterError::network(path.display().to_string(), e))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            attachments.push((name, contents));
        }

        Ok(RawDocument {
            origin,
            body,
            attachments,
        })
    }

    fn parse(&self, document: &RawDocument) -> Result<StoryRecord, AdapterError> {
        let origin = document.origin.as_str();
        let meta: StoryMeta = toml::from_str(&document.body)
            .map_err(|e| AdapterError::parse(format!("story.toml ({})", e), origin))?;

        let title = meta
            .title
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AdapterError::parse("title", origin))?;

        if document.attachments.is_empty() {
            return Err(AdapterError::parse("chapter list", origin));
        }

        let mut chapters = Vec::with_capacity(document.attachments.len());
        let mut text_words = 0u64;
        for (file_name, contents) in &document.attachments {
            let html = Html::parse_document(contents);
            let name = first_text(&html, "h1")
                .or_else(|| first_text(&html, "title"))
                .unwrap_or_default();
            text_words += html
                .root_element()
                .text()
                .flat_map(str::split_whitespace)
                .count() as u64;
            chapters.push(ChapterRef {
                source_url: format!("{}/{}", origin, file_name),
                display_name: name,
            });
        }

        let partial = meta
            .chapter_count
            .is_some_and(|declared| declared > chapters.len());

        Ok(StoryRecord {
            title,
            author: meta.author.unwrap_or_else(|| "Unknown".to_string()),
            word_count: meta.word_count.unwrap_or(text_words),
            rating: meta.rating.unwrap_or_default(),
            chapters,
            partial,
            source_url: Some(origin.to_string()),
        })
    }
}

fn first_text(html: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    html.select(&sel)
        .next()
        .map(|e| e.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    fn write_story(
        dir: &Path,
        name: &str,
        meta: &str,
        chapters: &[(&str, &str)],
    ) -> Result<(), std::io::Error> {
        let story = dir.join(name);
        std::fs::create_dir_all(&story)?;
        if !meta.is_empty() {
            std::fs::write(story.join("story.toml"), meta)?;
        }
        for (file, contents) in chapters {
            std::fs::write(story.join(file), contents)?;
        }
        Ok(())
    }

    #[test]
    fn reads_metadata_and_chapters_in_filename_order() -> Result<(), Box<dyn Error>> {
        let tmp = tempfile::tempdir()?;
        write_story(
            tmp.path(),
            "saved-story",
            "title = \"Saved Story\"\nauthor = \"archivist\"\nrating = \"T\"\n",
            &[
                ("ch-01.html", "<html><h1>Arrival</h1><p>one two three</p></html>"),
                ("ch-02.html", "<html><h1>Departure</h1><p>four five</p></html>"),
            ],
        )?;

        let mut adapter = LocalAdapter::new(tmp.path());
        let id = Identifier::Local("saved-story".to_string());
        let doc = adapter.fetch(&id)?;
        let record = adapter.parse(&doc)?;

        assert_eq!(record.title, "Saved Story");
        assert_eq!(record.author, "archivist");
        assert_eq!(record.rating, "T");
        assert_eq!(record.chapters.len(), 2);
        assert_eq!(record.chapters[0].display_name, "Arrival");
        assert_eq!(record.chapters[1].display_name, "Departure");
        assert!(record.chapters[0].source_url.ends_with("ch-01.html"));
        assert!(!record.partial);
        // Word count computed from chapter text when not declared.
        assert_eq!(record.word_count, 7);
        Ok(())
    }

    #[test]
    fn missing_directory_is_not_found() -> Result<(), Box<dyn Error>> {
        let tmp = tempfile::tempdir()?;
        let mut adapter = LocalAdapter::new(tmp.path());
        let id = Identifier::Local("no-such-story".to_string());
        match adapter.fetch(&id) {
            Err(AdapterError::NotFound { .. }) => Ok(()),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn missing_title_is_a_parse_error() -> Result<(), Box<dyn Error>> {
        let tmp = tempfile::tempdir()?;
        write_story(
            tmp.path(),
            "untitled",
            "author = \"nobody\"\n",
            &[("ch-01.html", "<html><p>text</p></html>")],
        )?;
        let mut adapter = LocalAdapter::new(tmp.path());
        let id = Identifier::Local("untitled".to_string());
        let doc = adapter.fetch(&id)?;
        match adapter.parse(&doc) {
            Err(AdapterError::Parse { field, .. }) => {
                assert_eq!(field, "title");
                Ok(())
            }
            other => panic!("expected Parse error for title, got {:?}", other),
        }
    }

    #[test]
    fn absent_metadata_file_still_fails_on_title() -> Result<(), Box<dyn Error>> {
        let tmp = tempfile::tempdir()?;
        write_story(
            tmp.path(),
            "bare",
            "",
            &[("ch-01.html", "<html><p>text</p></html>")],
        )?;
        let mut adapter = LocalAdapter::new(tmp.path());
        let doc = adapter.fetch(&Identifier::Local("bare".to_string()))?;
        assert!(matches!(
            adapter.parse(&doc),
            Err(AdapterError::Parse { ref field, .. }) if field == "title"
        ));
        Ok(())
    }

    #[test]
    fn fewer_files_than_declared_marks_partial() -> Result<(), Box<dyn Error>> {
        let tmp = tempfile::tempdir()?;
        write_story(
            tmp.path(),
            "incomplete",
            "title = \"Incomplete\"\nchapter_count = 3\n",
            &[
                ("ch-01.html", "<html><p>a</p></html>"),
                ("ch-02.html", "<html><p>b</p></html>"),
            ],
        )?;
        let mut adapter = LocalAdapter::new(tmp.path());
        let doc = adapter.fetch(&Identifier::Local("incomplete".to_string()))?;
        let record = adapter.parse(&doc)?;
        assert!(record.partial);
        assert_eq!(record.chapters.len(), 2);
        Ok(())
    }

    #[test]
    fn no_chapter_files_is_a_parse_error() -> Result<(), Box<dyn Error>> {
        let tmp = tempfile::tempdir()?;
        write_story(tmp.path(), "empty", "title = \"Empty\"\n", &[])?;
        let mut adapter = LocalAdapter::new(tmp.path());
        let doc = adapter.fetch(&Identifier::Local("empty".to_string()))?;
        assert!(matches!(
            adapter.parse(&doc),
            Err(AdapterError::Parse { ref field, .. }) if field == "chapter list"
        ));
        Ok(())
    }
}
