use anyhow::{Context, Result};
use std::time::Duration;
use tracing::info;

use crate::commands::CommandReport;
use crate::error::PatroError;
use crate::patro::audit;
use crate::patro::config::load_config;
use crate::patro::fetch::{HttpMonthFetcher, RetryPolicy};
use crate::patro::index::{CalendarIndex, IndexHandle};
use crate::patro::paths::{PatroPaths, resolve_paths};
use crate::patro::store::YearStore;
use crate::patro::sync::{self, SyncEvent, SyncLock, SyncOrchestrator, SyncProgress, SyncRequest};

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub force: bool,
    /// Echo progress to stderr as it arrives.
    pub live: bool,
}

fn audit_progress(paths: &PatroPaths, progress: &SyncProgress) {
    let status = match progress {
        SyncProgress::YearSaved { .. } => "saved",
        SyncProgress::YearSkipped { .. } => "skipped",
        SyncProgress::YearEmpty { .. } => "empty",
        SyncProgress::YearSaveFailed { .. } => "save-failed",
        SyncProgress::MonthFailed { .. } => "month-failed",
        SyncProgress::Cancelled { .. } => "cancelled",
        SyncProgress::Fetching { .. } | SyncProgress::Retrying { .. } => return,
    };
    if let Err(err) = audit::append_event(paths, "sync", status, &progress.to_string()) {
        tracing::warn!(error = %err, "failed to append audit event");
    }
}

pub fn run(opts: &SyncOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config()?;
    let mut report = CommandReport::new("sync");

    let request = SyncRequest {
        start_year: opts.start_year.unwrap_or(cfg.sync.start_year),
        end_year: opts.end_year.unwrap_or(cfg.sync.end_year),
        force: opts.force || cfg.sync.force,
    };
    report.detail(format!("data_dir={}", paths.data_dir.display()));
    report.detail(format!(
        "range={}..={} force={}",
        request.start_year, request.end_year, request.force
    ));
    if request.start_year > request.end_year {
        report.issue("start year is after end year");
        return Ok(report);
    }

    let index = IndexHandle::new(CalendarIndex::load(&paths.data_dir)?);
    report.detail(format!("index.before={}", index.snapshot().len()));

    let lock = match SyncLock::acquire(&paths.sync_lock_file()) {
        Ok(lock) => lock,
        Err(err) if err.downcast_ref::<PatroError>().is_some() => {
            report.issue(format!("{err}"));
            return Ok(report);
        }
        Err(err) => return Err(err),
    };

    report.detail(format!("lock={}", lock.path().display()));

    let fetcher = HttpMonthFetcher::from_config(&cfg.source)?;
    let orchestrator = SyncOrchestrator::new(
        fetcher,
        YearStore::new(&paths.data_dir),
        RetryPolicy::new(
            cfg.source.max_attempts,
            Duration::from_millis(cfg.source.retry_cooldown_ms),
        ),
        Duration::from_millis(cfg.source.month_gap_ms),
    )
    .with_rules(cfg.extra_events.clone());

    let handle = sync::spawn(orchestrator, request)?;
    let mut summary = None;
    for event in handle.events.iter() {
        match event {
            SyncEvent::Progress(progress) => {
                info!("{progress}");
                if opts.live {
                    eprintln!("{progress}");
                }
                audit_progress(&paths, &progress);
                if let SyncProgress::YearSaveFailed { .. } = progress {
                    // Later years would hit the same storage problem.
                    handle.cancel();
                    report.issue(progress.to_string());
                } else {
                    report.detail(progress.to_string());
                }
            }
            SyncEvent::Finished(done) => summary = Some(done),
        }
    }
    handle.join()?;
    let summary = summary.context("sync worker stopped without a summary")?;

    report.detail(format!(
        "summary.saved={:?} skipped={:?} empty={:?} months_failed={} days_written={} cancelled={}",
        summary.years_saved,
        summary.years_skipped,
        summary.years_empty,
        summary.months_failed,
        summary.days_written,
        summary.cancelled
    ));

    let snapshot = index.reload(&paths.data_dir)?;
    report.detail(format!("index.days={}", snapshot.len()));
    if snapshot.skipped_lines() > 0 {
        report.issue(format!("index.skipped_lines={}", snapshot.skipped_lines()));
    }
    if let (Some(first), Some(last)) = (snapshot.first_date(), snapshot.last_date()) {
        report.detail(format!("index.range={first}..={last}"));
    }

    drop(lock);
    Ok(report)
}
