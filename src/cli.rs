//! CLI parsing and orchestration. Parses args, submits identifiers to the work
//! queue, runs assembly with bounded concurrency, writes normalized story JSON,
//! and prints the per-item report. Maps errors to exit codes.

use crate::adapter::{resolve_source, FetchClient};
use crate::assembler::{StoryAssembler, DEFAULT_FETCH_ATTEMPTS};
use crate::config;
use crate::model::StoryRecord;
use crate::queue::{CancelToken, Identifier, IdentifierError, Outcome, WorkQueue};
use crate::report::render_report;
use crate::resolver::{ChapterNameResolver, ChapterNameSource, EndpointNameSource};
use clap::Parser;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// CLI error carrying exit code and message.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{failed} of {total} stories failed; see report above.")]
    ItemsFailed { failed: usize, total: usize },

    #[error("Failed to write {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CliRunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) => 1,
            CliRunError::ItemsFailed { .. } => 2,
            CliRunError::Output { .. } => 3,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "ficfetch")]
#[command(about = "Fetch FanFiction.Net/FictionPress stories or saved local stories and normalize them for ebook packaging")]
#[command(
    after_help = "Config file keys (output_dir, library_dir, user_agent, request_delay_secs, timeout_secs, retry_count, retry_backoff_secs, max_concurrency, name_source_url) are read from ./ficfetch.toml or the XDG config directory. CLI flags override config."
)]
pub struct Args {
    /// Story identifiers: full story URLs and/or names of saved story
    /// directories under the library directory. Duplicates are ignored.
    #[arg(required = true)]
    pub identifiers: Vec<String>,

    /// Output directory for normalized story JSON. Default: current directory.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Base directory containing saved story subdirectories. Default: current directory.
    #[arg(long)]
    pub library_dir: Option<PathBuf>,

    /// Maximum stories assembled concurrently (overrides config; default 2).
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// HTTP User-Agent (overrides config).
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Delay between requests in seconds (overrides config; default 2).
    #[arg(long)]
    pub delay: Option<u64>,

    /// Request timeout in seconds (overrides config; default 30).
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Canonical chapter-name endpoint (overrides config). Unset disables lookup.
    #[arg(long)]
    pub name_source: Option<String>,

    /// Resolve sources and print the deduplicated work list without fetching.
    #[arg(long)]
    pub dry_run: bool,

    /// Suppress progress output (report and errors only).
    #[arg(short, long)]
    pub quiet: bool,

    /// Print verbose error chain.
    #[arg(long)]
    pub verbose: bool,
}

/// Sanitize a story title to a safe filename: lowercase, replace spaces/special with `-`.
fn sanitize_title(title: &str) -> String {
    let mut s = title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect::<String>();
    while s.contains("--") {
        s = s.replace("--", "-");
    }
    s = s.trim_matches('-').to_string();
    if s.is_empty() {
        s = "story".to_string();
    }
    s
}

/// Ensure the output directory exists before the run starts.
fn validate_output_dir(dir: &Path) -> Result<(), CliRunError> {
    if !dir.as_os_str().is_empty() && !dir.exists() {
        return Err(CliRunError::InvalidInput(format!(
            "Output directory does not exist: {}",
            dir.display()
        )));
    }
    Ok(())
}

/// Write one normalized record as JSON, returning the path written.
///
/// `used_slugs` tracks filenames already claimed this run; distinct titles that
/// sanitize to the same slug get a numeric suffix instead of overwriting each
/// other.
fn write_record(
    record: &StoryRecord,
    output_dir: &Path,
    used_slugs: &mut std::collections::HashSet<String>,
) -> Result<PathBuf, CliRunError> {
    let base = sanitize_title(&record.title);
    let mut slug = base.clone();
    let mut n = 2;
    while !used_slugs.insert(slug.clone()) {
        slug = format!("{}-{}", base, n);
        n += 1;
    }
    let path = output_dir.join(format!("{}.json", slug));
    let file = std::fs::File::create(&path).map_err(|e| CliRunError::Output {
        path: path.clone(),
        source: e,
    })?;
    serde_json::to_writer_pretty(file, record).map_err(|e| CliRunError::Output {
        path: path.clone(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
    })?;
    Ok(path)
}

/// Entry point for the CLI. Returns Ok(()) on success; Err with exit code and message on failure.
pub fn run(args: &Args) -> Result<(), CliRunError> {
    let mut queue = WorkQueue::new();
    for input in &args.identifiers {
        let identifier = Identifier::parse(input).map_err(|e: IdentifierError| {
            CliRunError::InvalidInput(format!("Invalid identifier '{}': {}", input, e))
        })?;
        queue.submit(identifier);
    }

    let config = config::load_config().map_err(CliRunError::InvalidInput)?;

    const DEFAULT_DELAY_SECS: u64 = 2;
    const DEFAULT_TIMEOUT_SECS: u64 = 30;
    const DEFAULT_MAX_CONCURRENCY: usize = 2;
    let output_dir: PathBuf = args
        .output_dir
        .clone()
        .or_else(|| config.as_ref().and_then(|c| c.output_dir.clone()))
        .unwrap_or_else(|| PathBuf::from("."));
    let library_dir: PathBuf = args
        .library_dir
        .clone()
        .or_else(|| config.as_ref().and_then(|c| c.library_dir.clone()))
        .unwrap_or_else(|| PathBuf::from("."));
    let delay_secs = args
        .delay
        .or_else(|| config.as_ref().and_then(|c| c.request_delay_secs))
        .unwrap_or(DEFAULT_DELAY_SECS);
    let timeout_secs = args
        .timeout
        .or_else(|| config.as_ref().and_then(|c| c.timeout_secs))
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    let retry_count = config
        .as_ref()
        .and_then(|c| c.retry_count)
        .unwrap_or(DEFAULT_FETCH_ATTEMPTS)
        .max(1);
    let retry_backoff_secs = config
        .as_ref()
        .and_then(|c| c.retry_backoff_secs.clone())
        .unwrap_or_else(|| vec![1, 2]);
    let max_concurrency = args
        .jobs
        .or_else(|| config.as_ref().and_then(|c| c.max_concurrency))
        .unwrap_or(DEFAULT_MAX_CONCURRENCY)
        .max(1);
    let user_agent = args
        .user_agent
        .clone()
        .or_else(|| config.as_ref().and_then(|c| c.user_agent.clone()));
    let name_source_url = args
        .name_source
        .clone()
        .or_else(|| config.as_ref().and_then(|c| c.name_source_url.clone()));

    if args.dry_run {
        for item in queue.items() {
            match resolve_source(&item.identifier) {
                Ok(source) => eprintln!("would fetch {} via {:?}", item.identifier, source),
                Err(e) => eprintln!("would fail  {}: {}", item.identifier, e),
            }
        }
        eprintln!("{} stories queued. Output: {}", queue.len(), output_dir.display());
        return Ok(());
    }

    validate_output_dir(&output_dir)?;

    let mut builder = FetchClient::builder()
        .delay_secs(delay_secs)
        .timeout_secs(timeout_secs);
    if let Some(ua) = user_agent {
        builder = builder.user_agent(ua);
    }
    let client = builder
        .build()
        .map_err(|e| CliRunError::InvalidInput(format!("Failed to create HTTP client: {}", e)))?;

    let make_assembler = || {
        let source: Option<Box<dyn ChapterNameSource>> = name_source_url
            .clone()
            .map(|url| Box::new(EndpointNameSource::new(client.clone(), url)) as _);
        StoryAssembler::new(client.clone(), library_dir.clone(), ChapterNameResolver::new(source))
            .with_retry(retry_count, retry_backoff_secs.clone())
    };

    let bar = if args.quiet {
        None
    } else {
        let bar = indicatif::ProgressBar::new(queue.len() as u64);
        bar.set_style(
            indicatif::ProgressStyle::default_bar()
                .template("{spinner} {msg} [{bar:40}] {pos}/{len} ({elapsed})")
                .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar())
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                .progress_chars("█▉▊▋▌▍▎▏ "),
        );
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        Some(bar)
    };
    let progress_cb = |done: u32, total: u32| {
        if let Some(ref b) = bar {
            b.set_position(done as u64);
            b.set_message(format!("Assembled {}/{} stories", done, total));
        }
    };
    let progress: Option<&(dyn Fn(u32, u32) + Sync)> = Some(&progress_cb);

    let cancel = CancelToken::new();
    let outcomes = queue.run(max_concurrency, &cancel, make_assembler, progress);

    if let Some(b) = bar {
        b.disable_steady_tick();
        b.finish_and_clear();
    }

    let mut written = Vec::new();
    let mut used_slugs = std::collections::HashSet::new();
    for outcome in &outcomes {
        if let Outcome {
            result: Ok(record), ..
        } = outcome
        {
            written.push(write_record(record, &output_dir, &mut used_slugs)?);
        }
    }

    eprint!("{}", render_report(&outcomes));
    if !args.quiet {
        for path in &written {
            eprintln!("Wrote {}", path.display());
        }
    }

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    if failed > 0 {
        return Err(CliRunError::ItemsFailed {
            failed,
            total: outcomes.len(),
        });
    }
    Ok(())
}
