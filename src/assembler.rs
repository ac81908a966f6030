//! Drives one story through fetch -> parse -> name resolution.
//!
//! Assembly is a small state machine: adapter selection, then fetching with
//! bounded retry for transient failures, then parsing (fatal on missing
//! required fields), then best-effort name resolution. Each call is
//! independent; the assembler holds no state that outlives a call, so repeated
//! assembly of the same identifier over the same content is idempotent.

use crate::adapter::{self, AdapterError, FetchClient, SiteAdapter};
use crate::model::StoryRecord;
use crate::queue::Identifier;
use crate::resolver::ChapterNameResolver;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default number of fetch attempts for transient failures (initial plus retries).
pub const DEFAULT_FETCH_ATTEMPTS: u32 = 3;
/// Default backoff in seconds after each failed attempt.
pub const DEFAULT_BACKOFF_SECS: [u64; 2] = [1, 2];

/// Terminal failure for one story, reported per work item.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("No adapter matches '{input}' ({reason}). Expected a FanFiction.Net or FictionPress story URL, or a library directory name.")]
    UnknownSource { input: String, reason: String },

    #[error("Fetch failed after {attempts} attempt(s): {source}")]
    Fetch {
        attempts: u32,
        #[source]
        source: AdapterError,
    },

    #[error("{source}")]
    Parse {
        #[source]
        source: AdapterError,
    },

    #[error("Run cancelled before this story was started.")]
    Cancelled,
}

impl AssemblyError {
    /// Stable error-kind token for the report.
    pub fn kind(&self) -> &'static str {
        match self {
            AssemblyError::UnknownSource { .. } => "unknown-source",
            AssemblyError::Fetch { source, .. } => match source {
                AdapterError::NotFound { .. } => "not-found",
                _ => "network",
            },
            AssemblyError::Parse { .. } => "parse",
            AssemblyError::Cancelled => "cancelled",
        }
    }
}

/// Anything that can turn an identifier into a story. The work queue drives
/// this trait so tests can substitute scripted assemblers.
pub trait Assemble {
    fn assemble(&mut self, identifier: &Identifier) -> Result<StoryRecord, AssemblyError>;
}

/// Production assembler: shared polite client, local library directory, and an
/// optional canonical-name resolver.
pub struct StoryAssembler {
    client: FetchClient,
    library_dir: PathBuf,
    resolver: ChapterNameResolver,
    fetch_attempts: u32,
    backoff: Vec<Duration>,
}

impl StoryAssembler {
    pub fn new(
        client: FetchClient,
        library_dir: impl Into<PathBuf>,
        resolver: ChapterNameResolver,
    ) -> Self {
        Self {
            client,
            library_dir: library_dir.into(),
            resolver,
            fetch_attempts: DEFAULT_FETCH_ATTEMPTS,
            backoff: DEFAULT_BACKOFF_SECS
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
        }
    }

    /// Override the fetch retry policy. `backoff_secs` holds the sleep before
    /// each retry; if shorter than `attempts - 1`, the last value is reused
    /// (empty means no sleep).
    pub fn with_retry(mut self, attempts: u32, backoff_secs: Vec<u64>) -> Self {
        self.fetch_attempts = attempts.max(1);
        self.backoff = backoff_secs.into_iter().map(Duration::from_secs).collect();
        self
    }
}

impl Assemble for StoryAssembler {
    fn assemble(&mut self, identifier: &Identifier) -> Result<StoryRecord, AssemblyError> {
        let source = adapter::resolve_source(identifier)?;
        let mut site = adapter::adapter_for(source, &mut self.client, &self.library_dir);

        let document =
            fetch_with_retry(site.as_mut(), identifier, self.fetch_attempts, &self.backoff)?;
        let mut record = site
            .parse(&document)
            .map_err(|source| AssemblyError::Parse { source })?;
        drop(site);

        // Best-effort: resolution never fails assembly.
        self.resolver.resolve(&mut record);
        Ok(record)
    }
}

/// Fetch with bounded retry. Only transient (network) failures are retried,
/// with a backoff sleep between attempts; not-found fails immediately.
pub(crate) fn fetch_with_retry(
    site: &mut dyn SiteAdapter,
    identifier: &Identifier,
    attempts: u32,
    backoff: &[Duration],
) -> Result<adapter::RawDocument, AssemblyError> {
    let attempts = attempts.max(1);
    for attempt in 1..=attempts {
        match site.fetch(identifier) {
            Ok(document) => return Ok(document),
            Err(e) if e.is_transient() && attempt < attempts => {
                let sleep = backoff
                    .get(attempt as usize - 1)
                    .or(backoff.last())
                    .copied()
                    .unwrap_or(Duration::ZERO);
                if !sleep.is_zero() {
                    std::thread::sleep(sleep);
                }
            }
            Err(e) => {
                return Err(AssemblyError::Fetch {
                    attempts: attempt,
                    source: e,
                })
            }
        }
    }
    unreachable!("retry loop returns on final attempt")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::RawDocument;
    use crate::model::ChapterRef;
    use std::error::Error;

    /// Adapter whose fetch pops scripted results; parse returns a fixed record.
    struct ScriptedAdapter {
        fetches: Vec<Result<(), AdapterError>>,
        fetch_calls: u32,
    }

    impl ScriptedAdapter {
        fn new(fetches: Vec<Result<(), AdapterError>>) -> Self {
            Self {
                fetches,
                fetch_calls: 0,
            }
        }
    }

    impl SiteAdapter for ScriptedAdapter {
        fn fetch(&mut self, _identifier: &Identifier) -> Result<RawDocument, AdapterError> {
            self.fetch_calls += 1;
            match self.fetches.remove(0) {
                Ok(()) => Ok(RawDocument::remote("scripted", "")),
                Err(e) => Err(e),
            }
        }

        fn parse(&self, _document: &RawDocument) -> Result<StoryRecord, AdapterError> {
            Ok(StoryRecord {
                title: "Scripted".to_string(),
                author: "test".to_string(),
                word_count: 0,
                rating: String::new(),
                chapters: vec![ChapterRef::unnamed("scripted/1")],
                partial: false,
                source_url: None,
            })
        }
    }

    fn remote_id() -> Identifier {
        Identifier::Remote("https://www.fanfiction.net/s/1/1/x".to_string())
    }

    #[test]
    fn transient_failures_are_retried_up_to_the_attempt_limit() -> Result<(), AssemblyError> {
        let mut site = ScriptedAdapter::new(vec![
            Err(AdapterError::network("u", "reset")),
            Err(AdapterError::network("u", "reset")),
            Ok(()),
        ]);
        fetch_with_retry(&mut site, &remote_id(), 3, &[])?;
        assert_eq!(site.fetch_calls, 3);
        Ok(())
    }

    #[test]
    fn exhausted_retries_fail_with_attempt_count() {
        let mut site = ScriptedAdapter::new(vec![
            Err(AdapterError::network("u", "reset")),
            Err(AdapterError::network("u", "reset")),
            Err(AdapterError::network("u", "reset")),
        ]);
        match fetch_with_retry(&mut site, &remote_id(), 3, &[]) {
            Err(AssemblyError::Fetch { attempts: 3, source }) => {
                assert!(source.is_transient());
            }
            other => panic!("expected exhausted Fetch error, got {:?}", other),
        }
        assert_eq!(site.fetch_calls, 3);
    }

    #[test]
    fn not_found_fails_on_the_first_attempt_without_retry() {
        let mut site = ScriptedAdapter::new(vec![Err(AdapterError::not_found("u")), Ok(())]);
        match fetch_with_retry(&mut site, &remote_id(), 3, &[]) {
            Err(e @ AssemblyError::Fetch { attempts: 1, .. }) => {
                assert_eq!(e.kind(), "not-found");
            }
            other => panic!("expected immediate not-found, got {:?}", other),
        }
        assert_eq!(site.fetch_calls, 1);
    }

    #[test]
    fn rejected_statuses_fail_on_the_first_attempt_without_retry() {
        let mut site = ScriptedAdapter::new(vec![Err(AdapterError::http(403, "u")), Ok(())]);
        match fetch_with_retry(&mut site, &remote_id(), 3, &[]) {
            Err(AssemblyError::Fetch { attempts: 1, source }) => {
                assert!(!source.is_transient());
            }
            other => panic!("expected immediate rejection, got {:?}", other),
        }
        assert_eq!(site.fetch_calls, 1);
    }

    #[test]
    fn unknown_host_fails_before_any_fetch() {
        let mut assembler = StoryAssembler::new(
            FetchClient::builder().delay_secs(0).build().expect("client"),
            ".",
            ChapterNameResolver::new(None),
        );
        let id = Identifier::Remote("https://example.com/s/1".to_string());
        match assembler.assemble(&id) {
            Err(e @ AssemblyError::UnknownSource { .. }) => {
                assert_eq!(e.kind(), "unknown-source");
            }
            other => panic!("expected UnknownSource, got {:?}", other),
        }
    }

    #[test]
    fn assembling_a_local_fixture_is_idempotent() -> Result<(), Box<dyn Error>> {
        let tmp = tempfile::tempdir()?;
        let story = tmp.path().join("fixture-story");
        std::fs::create_dir_all(&story)?;
        std::fs::write(story.join("story.toml"), "title = \"Fixture Story\"\n")?;
        std::fs::write(story.join("ch-01.html"), "<html><h1>One</h1></html>")?;
        std::fs::write(story.join("ch-02.html"), "<html><p>two</p></html>")?;

        let mut assembler = StoryAssembler::new(
            FetchClient::builder().delay_secs(0).build()?,
            tmp.path(),
            ChapterNameResolver::new(None),
        )
        .with_retry(3, vec![]);

        let id = Identifier::Local("fixture-story".to_string());
        let first = assembler.assemble(&id)?;
        let second = assembler.assemble(&id)?;
        assert_eq!(first.chapters.len(), 2);
        assert_eq!(second.chapters.len(), 2);
        assert_eq!(first.title, second.title);
        // Resolver filled the unnamed second chapter with the 1-based default.
        assert_eq!(first.chapters[0].display_name, "One");
        assert_eq!(first.chapters[1].display_name, "Chapter 2");
        Ok(())
    }

    #[test]
    fn parse_failure_is_fatal_and_names_the_field() -> Result<(), Box<dyn Error>> {
        let tmp = tempfile::tempdir()?;
        let story = tmp.path().join("untitled");
        std::fs::create_dir_all(&story)?;
        std::fs::write(story.join("ch-01.html"), "<html><p>text</p></html>")?;

        let mut assembler = StoryAssembler::new(
            FetchClient::builder().delay_secs(0).build()?,
            tmp.path(),
            ChapterNameResolver::new(None),
        );
        match assembler.assemble(&Identifier::Local("untitled".to_string())) {
            Err(e @ AssemblyError::Parse { .. }) => {
                assert_eq!(e.kind(), "parse");
                assert!(e.to_string().contains("title"));
                Ok(())
            }
            other => panic!("expected Parse error, got {:?}", other),
        }
    }
}
