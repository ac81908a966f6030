//! Work queue and orchestrator: accepts story identifiers, deduplicates them,
//! and drives assembly over each with bounded concurrency.
//!
//! Aggregated outcomes always come back in submission order, regardless of
//! completion order, so reports are reproducible across runs.

use crate::assembler::{Assemble, AssemblyError};
use crate::model::StoryRecord;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// One user-supplied story identifier: a remote story URL or the name of a
/// subdirectory in the local library. Never stringly-typed past this point.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    Remote(String),
    Local(String),
}

/// Rejected user input for an identifier.
#[derive(Debug, Error)]
pub enum IdentifierError {
    #[error("Identifier must be a non-empty story URL or library directory name.")]
    Empty,
}

impl Identifier {
    /// Classify raw input: http(s) URLs are remote, anything else names a
    /// local library directory. Empty input is rejected.
    pub fn parse(input: &str) -> Result<Self, IdentifierError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(IdentifierError::Empty);
        }
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Ok(Identifier::Remote(trimmed.to_string()))
        } else {
            Ok(Identifier::Local(trimmed.to_string()))
        }
    }

    pub fn as_remote_url(&self) -> Option<&str> {
        match self {
            Identifier::Remote(url) => Some(url),
            Identifier::Local(_) => None,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Remote(url) => f.write_str(url),
            Identifier::Local(name) => f.write_str(name),
        }
    }
}

/// Processing state of one submitted identifier. Transitions
/// Pending -> InProgress -> {Done | Failed} exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkStatus {
    Pending,
    InProgress,
    Done,
    Failed,
}

/// One submitted identifier and its processing status.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub identifier: Identifier,
    pub status: WorkStatus,
}

/// Terminal result for one submitted identifier, in submission order.
#[derive(Debug)]
pub struct Outcome {
    pub identifier: Identifier,
    pub result: Result<StoryRecord, AssemblyError>,
}

/// Run-level cancellation signal. Raising it prevents new items from starting;
/// in-flight items complete or fail naturally.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Status and result slot for one item while workers run. One writer at a time
/// per item; reads for reporting happen after all workers join.
struct ItemCell {
    status: WorkStatus,
    result: Option<Result<StoryRecord, AssemblyError>>,
}

/// Deduplicating queue of work items, processed in submission order.
#[derive(Default)]
pub struct WorkQueue {
    items: Vec<WorkItem>,
    seen: HashSet<Identifier>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a Pending item unless the identifier was already submitted.
    /// Duplicate submission is a silent no-op; returns whether the item was added.
    pub fn submit(&mut self, identifier: Identifier) -> bool {
        if !self.seen.insert(identifier.clone()) {
            return false;
        }
        self.items.push(WorkItem {
            identifier,
            status: WorkStatus::Pending,
        });
        true
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    /// Drive every Pending item through an assembler with at most
    /// `max_concurrency` in flight; return per-item outcomes in submission
    /// order once all items are terminal.
    ///
    /// Each worker thread gets its own assembler from `make_assembler`.
    /// Individual failures never abort the run. `progress` is called with
    /// (completed, total) after each item reaches a terminal state. Items not
    /// yet started when `cancel` is raised fail with a cancelled error.
    pub fn run<A, F>(
        &mut self,
        max_concurrency: usize,
        cancel: &CancelToken,
        make_assembler: F,
        progress: Option<&(dyn Fn(u32, u32) + Sync)>,
    ) -> Vec<Outcome>
    where
        A: Assemble,
        F: Fn() -> A + Sync,
    {
        let total = self.items.len();
        if total == 0 {
            return Vec::new();
        }

        let workers = max_concurrency.max(1).min(total);
        let cursor = AtomicUsize::new(0);
        let completed = AtomicU32::new(0);
        let cells: Vec<Mutex<ItemCell>> = self
            .items
            .iter()
            .map(|_| {
                Mutex::new(ItemCell {
                    status: WorkStatus::Pending,
                    result: None,
                })
            })
            .collect();

        let items = &self.items;
        let make_assembler = &make_assembler;
        let cells_ref = &cells;
        let cursor_ref = &cursor;
        let completed_ref = &completed;

        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(move || {
                    let mut assembler = make_assembler();
                    loop {
                        let i = cursor_ref.fetch_add(1, Ordering::SeqCst);
                        if i >= total {
                            break;
                        }
                        let identifier = items[i].identifier.clone();

                        if cancel.is_cancelled() {
                            let mut cell = lock(&cells_ref[i]);
                            cell.status = WorkStatus::Failed;
                            cell.result = Some(Err(AssemblyError::Cancelled));
                        } else {
                            lock(&cells_ref[i]).status = WorkStatus::InProgress;
                            let result = assembler.assemble(&identifier);
                            let mut cell = lock(&cells_ref[i]);
                            cell.status = if result.is_ok() {
                                WorkStatus::Done
                            } else {
                                WorkStatus::Failed
                            };
                            cell.result = Some(result);
                        }

                        let done = completed_ref.fetch_add(1, Ordering::SeqCst) + 1;
                        if let Some(p) = progress {
                            p(done, total as u32);
                        }
                    }
                });
            }
        });

        self.items
            .iter_mut()
            .zip(cells)
            .map(|(item, cell)| {
                let cell = cell
                    .into_inner()
                    .unwrap_or_else(PoisonError::into_inner);
                item.status = cell.status;
                Outcome {
                    identifier: item.identifier.clone(),
                    result: cell.result.unwrap_or(Err(AssemblyError::Cancelled)),
                }
            })
            .collect()
    }
}

fn lock(cell: &Mutex<ItemCell>) -> std::sync::MutexGuard<'_, ItemCell> {
    cell.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChapterRef;
    use std::time::Duration;

    fn record(title: &str) -> StoryRecord {
        StoryRecord {
            title: title.to_string(),
            author: "test".to_string(),
            word_count: 0,
            rating: String::new(),
            chapters: vec![ChapterRef::unnamed("fixture/1")],
            partial: false,
            source_url: None,
        }
    }

    /// Assembler fixture: fails identifiers containing "fail", sleeps for ones
    /// containing "slow" (to scramble completion order).
    struct Scripted;

    impl Assemble for Scripted {
        fn assemble(&mut self, identifier: &Identifier) -> Result<StoryRecord, AssemblyError> {
            let name = identifier.to_string();
            if name.contains("slow") {
                std::thread::sleep(Duration::from_millis(30));
            }
            if name.contains("fail") {
                Err(AssemblyError::UnknownSource {
                    input: name,
                    reason: "scripted".to_string(),
                })
            } else {
                Ok(record(&name))
            }
        }
    }

    fn local(name: &str) -> Identifier {
        Identifier::Local(name.to_string())
    }

    #[test]
    fn identifier_parse_classifies_and_validates() {
        assert_eq!(
            Identifier::parse("https://www.fanfiction.net/s/1/1/x").unwrap(),
            Identifier::Remote("https://www.fanfiction.net/s/1/1/x".to_string())
        );
        assert_eq!(
            Identifier::parse("  saved-story  ").unwrap(),
            Identifier::Local("saved-story".to_string())
        );
        assert!(matches!(Identifier::parse("   "), Err(IdentifierError::Empty)));
    }

    #[test]
    fn duplicate_submit_is_a_silent_no_op() {
        let mut queue = WorkQueue::new();
        assert!(queue.submit(local("a")));
        assert!(queue.submit(local("b")));
        assert!(!queue.submit(local("a")));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn outcomes_preserve_submission_order_under_concurrency() {
        let mut queue = WorkQueue::new();
        for name in ["slow-1", "b", "c", "slow-2", "e"] {
            queue.submit(local(name));
        }
        let cancel = CancelToken::new();
        let outcomes = queue.run(2, &cancel, || Scripted, None);
        assert_eq!(outcomes.len(), 5);
        let order: Vec<_> = outcomes.iter().map(|o| o.identifier.to_string()).collect();
        assert_eq!(order, vec!["slow-1", "b", "c", "slow-2", "e"]);
        assert!(queue
            .items()
            .iter()
            .all(|item| item.status == WorkStatus::Done));
    }

    #[test]
    fn individual_failures_never_abort_the_run() {
        let mut queue = WorkQueue::new();
        queue.submit(local("ok-1"));
        queue.submit(local("fail-1"));
        queue.submit(local("ok-2"));
        let outcomes = queue.run(1, &CancelToken::new(), || Scripted, None);
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].result.is_ok());
        assert!(outcomes[1].result.is_err());
        assert!(outcomes[2].result.is_ok());
        assert_eq!(queue.items()[1].status, WorkStatus::Failed);
        assert_eq!(queue.items()[2].status, WorkStatus::Done);
    }

    #[test]
    fn cancellation_prevents_new_items_from_starting() {
        let mut queue = WorkQueue::new();
        for name in ["a", "b", "c"] {
            queue.submit(local(name));
        }
        let cancel = CancelToken::new();
        // Single worker: cancel after the first item reaches a terminal state.
        let cancel_after_first = {
            let cancel = cancel.clone();
            move |done: u32, _total: u32| {
                if done == 1 {
                    cancel.cancel();
                }
            }
        };
        let outcomes = queue.run(1, &cancel, || Scripted, Some(&cancel_after_first));
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].result.is_ok());
        for outcome in &outcomes[1..] {
            match &outcome.result {
                Err(e) => assert_eq!(e.kind(), "cancelled"),
                Ok(_) => panic!("cancelled item should not succeed"),
            }
        }
        assert_eq!(queue.items()[0].status, WorkStatus::Done);
        assert_eq!(queue.items()[1].status, WorkStatus::Failed);
    }

    #[test]
    fn empty_queue_runs_to_an_empty_report() {
        let mut queue = WorkQueue::new();
        let outcomes = queue.run(4, &CancelToken::new(), || Scripted, None);
        assert!(outcomes.is_empty());
    }

    #[test]
    fn progress_reports_every_terminal_item() {
        let mut queue = WorkQueue::new();
        for name in ["a", "b", "c", "d"] {
            queue.submit(local(name));
        }
        let seen = Mutex::new(Vec::new());
        let progress = |done: u32, total: u32| {
            seen.lock().unwrap().push((done, total));
        };
        queue.run(2, &CancelToken::new(), || Scripted, Some(&progress));
        let mut seen = seen.into_inner().unwrap();
        seen.sort_unstable();
        assert_eq!(seen, vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
    }
}
