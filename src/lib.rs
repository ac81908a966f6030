//! ficfetch: fetch FanFiction.Net/FictionPress stories or saved local stories
//! and normalize them into records ready for ebook packaging.

pub mod adapter;
pub mod assembler;
pub mod cli;
pub mod config;
pub mod model;
pub mod queue;
pub mod report;
pub mod resolver;

// Re-exports for CLI and consumers.
pub use adapter::{
    adapter_for, resolve_source, AdapterError, FetchClient, FetchClientBuilder, RawDocument,
    SiteAdapter, Source,
};
pub use assembler::{Assemble, AssemblyError, StoryAssembler};
pub use model::{ChapterRef, StoryRecord};
pub use queue::{CancelToken, Identifier, Outcome, WorkItem, WorkQueue, WorkStatus};
pub use report::render_report;
pub use resolver::{ChapterNameResolver, ChapterNameSource, EndpointNameSource};
