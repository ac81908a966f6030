//! Final run report: one line per submitted identifier, in submission order,
//! plus a summary line. Partial records are surfaced as succeeded-with-warning.

use crate::queue::Outcome;
use std::fmt::Write;

/// Render the per-item report. Order follows the outcome sequence, which the
/// queue guarantees is submission order.
pub fn render_report(outcomes: &[Outcome]) -> String {
    let mut out = String::new();
    let mut succeeded = 0usize;
    let mut warned = 0usize;
    let mut failed = 0usize;

    for outcome in outcomes {
        match &outcome.result {
            Ok(record) if record.partial => {
                warned += 1;
                succeeded += 1;
                let _ = writeln!(
                    out,
                    "ok (partial) {}: \"{}\" by {} ({} of declared chapters recovered)",
                    outcome.identifier,
                    record.title,
                    record.author,
                    record.chapters.len()
                );
            }
            Ok(record) => {
                succeeded += 1;
                let _ = writeln!(
                    out,
                    "ok           {}: \"{}\" by {} ({} chapters)",
                    outcome.identifier,
                    record.title,
                    record.author,
                    record.chapters.len()
                );
            }
            Err(e) => {
                failed += 1;
                let _ = writeln!(out, "failed       {}: {}: {}", outcome.identifier, e.kind(), e);
            }
        }
    }

    let _ = write!(out, "{} succeeded", succeeded);
    if warned > 0 {
        let _ = write!(out, " ({} with warnings)", warned);
    }
    let _ = writeln!(out, ", {} failed", failed);
    out
}
