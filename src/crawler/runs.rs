//! Scan run bookkeeping

use crate::crawler::window::{PageFetcher, ScanContext, ScanEnd, ScanReport, WindowScheduler};
use crate::storage::{Storage, StorageSink};

/// Which driver started a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    Links,
    Updates,
}

impl ScanKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Links => "links",
            Self::Updates => "updates",
        }
    }
}

/// Runs one scan into storage and records it in `scan_runs`
///
/// Listings are linked to `context.category_id` when set. Failing to write
/// the run record is logged and does not affect the scan.
pub async fn tracked_scan<F, S>(
    scheduler: &WindowScheduler<F>,
    storage: &mut S,
    kind: ScanKind,
    context: ScanContext,
    config_hash: &str,
) -> ScanReport
where
    F: PageFetcher,
    S: Storage + ?Sized,
{
    let scope = context.to_string();
    let run_id = match storage.create_run(kind.as_str(), &scope, config_hash) {
        Ok(id) => Some(id),
        Err(e) => {
            tracing::warn!("Failed to record {} run for {}: {}", kind.as_str(), scope, e);
            None
        }
    };

    let category_id = context.category_id;
    let report = {
        let mut sink = StorageSink::new(&mut *storage, category_id);
        scheduler.run(context, &mut sink).await
    };

    if let Some(run_id) = run_id {
        let result = match report.end {
            ScanEnd::Exhausted => {
                storage.complete_run(run_id, report.pages_delivered, report.products_delivered)
            }
            ScanEnd::Failed(_) => {
                storage.fail_run(run_id, report.pages_delivered, report.products_delivered)
            }
        };
        if let Err(e) = result {
            tracing::warn!("Failed to finish run {}: {}", run_id, e);
        }
    }

    report
}
