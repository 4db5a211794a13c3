use crate::error::PatroError;
use crate::patro::fetch::{MonthSource, RetryPolicy};
use crate::patro::months::MONTHS;
use crate::patro::parse::parse_month;
use crate::patro::record::DayRecord;
use crate::patro::resolve::resolve_month;
use crate::patro::rules::{self, ExtraEventRule};
use crate::patro::store::{YearRecords, YearStore};
use crate::patro::warn::{self, WarnEvent};
use anyhow::{Context, Result};
use fs2::FileExt;
use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncRequest {
    pub start_year: i32,
    pub end_year: i32,
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncProgress {
    YearSkipped {
        year: i32,
    },
    Fetching {
        year: i32,
        month: &'static str,
    },
    Retrying {
        year: i32,
        month: &'static str,
        attempt: u32,
        error: String,
    },
    MonthFailed {
        year: i32,
        month: &'static str,
        error: String,
    },
    YearSaved {
        year: i32,
        days: usize,
        path: PathBuf,
    },
    YearEmpty {
        year: i32,
    },
    YearSaveFailed {
        year: i32,
        error: String,
    },
    Cancelled {
        year: i32,
    },
}

impl fmt::Display for SyncProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::YearSkipped { year } => write!(f, "Data for {year} B.S. exists. Skipping."),
            Self::Fetching { year, month } => write!(f, "Fetching {month} {year}..."),
            Self::Retrying { year, month, .. } => write!(f, "Failed {month} {year}. Retrying..."),
            Self::MonthFailed { year, month, error } => {
                write!(f, "Failed {month} {year} after retry: {error}")
            }
            Self::YearSaved { year, days, .. } => {
                write!(f, "Saved data for {year} B.S. ({days} days).")
            }
            Self::YearEmpty { year } => {
                write!(f, "No month fetched for {year} B.S.; nothing saved.")
            }
            Self::YearSaveFailed { year, error } => {
                write!(f, "Could not save {year} B.S.: {error}")
            }
            Self::Cancelled { year } => {
                write!(f, "Sync cancelled during {year} B.S.; year not saved.")
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub years_saved: Vec<i32>,
    pub years_skipped: Vec<i32>,
    pub years_empty: Vec<i32>,
    pub months_failed: usize,
    pub days_written: usize,
    pub cancelled: bool,
}

/// A month whose Gregorian dates collide with an earlier month (or with
/// itself) was resolved from a broken page; none of it is merged.
fn disjoint_from(
    merged: &YearRecords,
    records: Vec<DayRecord>,
) -> Result<Vec<DayRecord>, PatroError> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in &records {
        let date = record.gregorian_date.as_str();
        if let Some(existing) = merged.get(date) {
            return Err(PatroError::Resolve(format!(
                "{date} resolved for {} but already holds {}",
                record.lunar_date, existing.lunar_date
            )));
        }
        if !seen.insert(date) {
            return Err(PatroError::Resolve(format!(
                "{date} resolved twice within {}",
                record.lunar_month_name
            )));
        }
    }
    Ok(records)
}

/// Drives fetch -> parse -> resolve -> store one year at a time. It never
/// touches the in-memory index; callers rebuild it once the pass is over.
pub struct SyncOrchestrator<S> {
    source: S,
    store: YearStore,
    retry: RetryPolicy,
    month_gap: Duration,
    rules: Vec<ExtraEventRule>,
    cancel: Arc<AtomicBool>,
}

impl<S: MonthSource> SyncOrchestrator<S> {
    pub fn new(source: S, store: YearStore, retry: RetryPolicy, month_gap: Duration) -> Self {
        Self {
            source,
            store,
            retry,
            month_gap,
            rules: Vec::new(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_rules(mut self, rules: Vec<ExtraEventRule>) -> Self {
        self.rules = rules;
        self
    }

    /// Checked between months; setting it abandons the current year unsaved.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    fn fetch_month(&self, year: i32, month_index: usize) -> Result<Vec<DayRecord>, PatroError> {
        let raw = self.source.fetch(year, MONTHS[month_index])?;
        let mut parsed = parse_month(&raw, month_index)?;
        if parsed.lunar_year != year {
            return Err(PatroError::Parse(format!(
                "asked for {year} but page shows {}",
                parsed.lunar_year
            )));
        }
        let added = rules::apply(&self.rules, year, month_index, &mut parsed.days);
        debug!(
            year,
            month = parsed.month_name,
            month_index = parsed.month_index,
            days = parsed.days.len(),
            extra_events = added,
            "parsed month"
        );
        resolve_month(&parsed.days, year, month_index, parsed.ad_start)
    }

    /// Returns `None` when the pass was cancelled mid-year.
    fn sync_year(
        &self,
        year: i32,
        summary: &mut SyncSummary,
        progress: &mut dyn FnMut(SyncProgress),
    ) -> Option<YearRecords> {
        let mut merged = YearRecords::new();
        for (month_index, month) in MONTHS.iter().copied().enumerate() {
            if self.cancelled() {
                return None;
            }
            progress(SyncProgress::Fetching { year, month });

            let outcome = self.retry.run(
                |_| {
                    self.fetch_month(year, month_index)
                        .and_then(|records| disjoint_from(&merged, records))
                },
                |attempt, err| {
                    tracing::warn!(
                        year,
                        month,
                        attempt,
                        error = %err,
                        "month fetch failed, retrying"
                    );
                    progress(SyncProgress::Retrying {
                        year,
                        month,
                        attempt,
                        error: err.to_string(),
                    });
                },
            );
            match outcome {
                Ok(records) => {
                    for record in records {
                        merged.insert(record.gregorian_date.clone(), record);
                    }
                }
                Err(err) => {
                    summary.months_failed += 1;
                    warn::emit(WarnEvent {
                        code: err.code().as_str(),
                        stage: "sync-month",
                        year: &year.to_string(),
                        month,
                        retry: "next-sync",
                        reason: "retries-exhausted",
                        err: &err.to_string(),
                    });
                    progress(SyncProgress::MonthFailed {
                        year,
                        month,
                        error: err.to_string(),
                    });
                }
            }
            thread::sleep(self.month_gap);
        }
        Some(merged)
    }

    pub fn sync(
        &self,
        request: &SyncRequest,
        progress: &mut dyn FnMut(SyncProgress),
    ) -> SyncSummary {
        let mut summary = SyncSummary::default();
        for year in request.start_year..=request.end_year {
            if self.store.exists(year) && !request.force {
                summary.years_skipped.push(year);
                progress(SyncProgress::YearSkipped { year });
                continue;
            }

            let Some(merged) = self.sync_year(year, &mut summary, progress) else {
                summary.cancelled = true;
                progress(SyncProgress::Cancelled { year });
                break;
            };

            if merged.is_empty() {
                summary.years_empty.push(year);
                progress(SyncProgress::YearEmpty { year });
                continue;
            }

            match self.store.save(year, &merged) {
                Ok(path) => {
                    info!(year, days = merged.len(), path = %path.display(), "saved year");
                    summary.years_saved.push(year);
                    summary.days_written += merged.len();
                    progress(SyncProgress::YearSaved {
                        year,
                        days: merged.len(),
                        path,
                    });
                }
                Err(err) => progress(SyncProgress::YearSaveFailed {
                    year,
                    error: format!("{err:#}"),
                }),
            }
        }
        summary
    }
}

#[derive(Debug)]
pub enum SyncEvent {
    Progress(SyncProgress),
    Finished(SyncSummary),
}

/// A sync pass running on its own thread.
pub struct SyncHandle {
    pub events: Receiver<SyncEvent>,
    cancel: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

impl SyncHandle {
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn join(self) -> Result<()> {
        self.join
            .join()
            .map_err(|_| anyhow::anyhow!("sync worker panicked"))
    }
}

pub fn spawn<S>(orchestrator: SyncOrchestrator<S>, request: SyncRequest) -> Result<SyncHandle>
where
    S: MonthSource + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let cancel = orchestrator.cancel_flag();
    let join = thread::Builder::new()
        .name("patro-sync".to_string())
        .spawn(move || {
            let progress_tx = tx.clone();
            let summary = orchestrator.sync(&request, &mut |event| {
                let _ = progress_tx.send(SyncEvent::Progress(event));
            });
            let _ = tx.send(SyncEvent::Finished(summary));
        })
        .context("failed to start sync worker")?;
    Ok(SyncHandle {
        events: rx,
        cancel,
        join,
    })
}

/// Exclusive advisory lock so two processes never sync one data directory
/// at the same time. Released on drop.
#[derive(Debug)]
pub struct SyncLock {
    file: File,
    path: PathBuf,
}

impl SyncLock {
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        if file.try_lock_exclusive().is_err() {
            return Err(PatroError::SyncLocked(path.display().to_string()).into());
        }
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SyncLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patro::fixtures::{MONTH_LENGTHS_2081, first_day_2081, month_page, year_pages};
    use crate::patro::resolve::AdCursor;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::tempdir;

    #[derive(Default)]
    struct FakeSource {
        pages: HashMap<(i32, String), String>,
        /// Months whose first request fails.
        flaky: HashSet<(i32, String)>,
        calls: Mutex<HashMap<(i32, String), usize>>,
    }

    impl FakeSource {
        fn with_year(year: i32) -> Self {
            let mut source = FakeSource::default();
            for (index, page) in year_pages(year, first_day_2081(), &MONTH_LENGTHS_2081)
                .into_iter()
                .enumerate()
            {
                source.pages.insert((year, MONTHS[index].to_string()), page);
            }
            source
        }

        fn total_calls(&self) -> usize {
            self.calls.lock().expect("calls").values().sum()
        }
    }

    impl MonthSource for FakeSource {
        fn fetch(&self, lunar_year: i32, month_name: &str) -> Result<String, PatroError> {
            let key = (lunar_year, month_name.to_string());
            let mut calls = self.calls.lock().expect("calls");
            let count = calls.entry(key.clone()).or_insert(0);
            *count += 1;
            if self.flaky.contains(&key) && *count == 1 {
                return Err(PatroError::HttpStatus {
                    year: lunar_year,
                    month: month_name.to_string(),
                    status: 503,
                });
            }
            self.pages.get(&key).cloned().ok_or_else(|| PatroError::Fetch {
                year: lunar_year,
                month: month_name.to_string(),
                reason: "connection refused".into(),
            })
        }
    }

    impl MonthSource for Arc<FakeSource> {
        fn fetch(&self, lunar_year: i32, month_name: &str) -> Result<String, PatroError> {
            self.as_ref().fetch(lunar_year, month_name)
        }
    }

    fn orchestrator(source: Arc<FakeSource>, root: &Path) -> SyncOrchestrator<Arc<FakeSource>> {
        SyncOrchestrator::new(
            source,
            YearStore::new(root),
            RetryPolicy::new(2, Duration::ZERO),
            Duration::ZERO,
        )
    }

    fn request(year: i32, force: bool) -> SyncRequest {
        SyncRequest {
            start_year: year,
            end_year: year,
            force,
        }
    }

    #[test]
    fn full_year_is_saved_with_unique_contiguous_days() {
        let tmp = tempdir().expect("tempdir");
        let source = Arc::new(FakeSource::with_year(2081));
        let sync = orchestrator(Arc::clone(&source), tmp.path());
        let mut messages = Vec::new();
        let summary = sync.sync(&request(2081, false), &mut |p| messages.push(p.to_string()));

        let total: u32 = MONTH_LENGTHS_2081.iter().sum();
        assert_eq!(summary.years_saved, vec![2081]);
        assert_eq!(summary.days_written, total as usize);
        assert_eq!(source.total_calls(), 12);
        assert!(messages.iter().any(|m| m == "Fetching Baishakh 2081..."));
        assert!(messages.last().is_some_and(|m| m.starts_with("Saved data for 2081 B.S.")));

        let loaded = YearStore::new(tmp.path()).load(2081).expect("load");
        assert_eq!(loaded.records.len(), total as usize);
        let keys: HashSet<_> = loaded.records.values().map(DayRecord::bs_key).collect();
        assert_eq!(keys.len(), total as usize);
        for (index, len) in MONTH_LENGTHS_2081.iter().enumerate() {
            let mut days: Vec<_> = loaded
                .records
                .values()
                .filter(|r| r.lunar_month_index == index)
                .map(|r| r.lunar_day)
                .collect();
            days.sort_unstable();
            assert_eq!(days, (1..=*len).collect::<Vec<_>>());
        }
        let first = &loaded.records["2024-04-13"];
        assert_eq!(first.lunar_date, "2081-01-01");
        assert_eq!(first.weekday, "Saturday");
        assert!(first.is_holiday);
    }

    #[test]
    fn second_run_skips_existing_year_without_requests() {
        let tmp = tempdir().expect("tempdir");
        let source = Arc::new(FakeSource::with_year(2081));
        let sync = orchestrator(Arc::clone(&source), tmp.path());
        sync.sync(&request(2081, false), &mut |_| {});
        let path = YearStore::new(tmp.path()).path_for(2081);
        let before = fs::read(&path).expect("read");

        let mut messages = Vec::new();
        let summary = sync.sync(&request(2081, false), &mut |p| messages.push(p));
        assert_eq!(summary.years_skipped, vec![2081]);
        assert_eq!(source.total_calls(), 12);
        assert_eq!(messages, vec![SyncProgress::YearSkipped { year: 2081 }]);
        assert_eq!(fs::read(&path).expect("read"), before);
    }

    #[test]
    fn force_refetches_and_replaces() {
        let tmp = tempdir().expect("tempdir");
        let source = Arc::new(FakeSource::with_year(2081));
        let sync = orchestrator(Arc::clone(&source), tmp.path());
        sync.sync(&request(2081, false), &mut |_| {});
        let summary = sync.sync(&request(2081, true), &mut |_| {});
        assert_eq!(summary.years_saved, vec![2081]);
        assert_eq!(source.total_calls(), 24);
    }

    #[test]
    fn flaky_month_is_retried_once() {
        let tmp = tempdir().expect("tempdir");
        let mut source = FakeSource::with_year(2081);
        source.flaky.insert((2081, "Magh".to_string()));
        let source = Arc::new(source);
        let sync = orchestrator(Arc::clone(&source), tmp.path());
        let mut retries = 0;
        let summary = sync.sync(&request(2081, false), &mut |p| {
            if matches!(p, SyncProgress::Retrying { .. }) {
                retries += 1;
            }
        });
        assert_eq!(retries, 1);
        assert_eq!(summary.months_failed, 0);
        assert_eq!(source.total_calls(), 13);
    }

    #[test]
    fn failed_month_leaves_gap_but_year_is_saved() {
        let tmp = tempdir().expect("tempdir");
        let mut source = FakeSource::with_year(2081);
        source.pages.remove(&(2081, "Kartik".to_string()));
        let source = Arc::new(source);
        let sync = orchestrator(Arc::clone(&source), tmp.path());
        let summary = sync.sync(&request(2081, false), &mut |_| {});
        assert_eq!(summary.months_failed, 1);
        assert_eq!(source.total_calls(), 13);

        let loaded = YearStore::new(tmp.path()).load(2081).expect("load");
        assert!(loaded.records.values().all(|r| r.lunar_month_index != 6));
        let total: u32 = MONTH_LENGTHS_2081.iter().sum();
        assert_eq!(loaded.records.len(), (total - MONTH_LENGTHS_2081[6]) as usize);
    }

    #[test]
    fn empty_year_writes_nothing_and_stays_eligible() {
        let tmp = tempdir().expect("tempdir");
        let source = Arc::new(FakeSource::default());
        let sync = orchestrator(Arc::clone(&source), tmp.path());
        let summary = sync.sync(&request(2090, false), &mut |_| {});
        assert_eq!(summary.years_empty, vec![2090]);
        assert!(!YearStore::new(tmp.path()).exists(2090));

        let again = sync.sync(&request(2090, false), &mut |_| {});
        assert_eq!(again.years_empty, vec![2090]);
        assert_eq!(source.total_calls(), 48);
    }

    #[test]
    fn month_overlapping_earlier_dates_is_not_merged() {
        let tmp = tempdir().expect("tempdir");
        let mut source = FakeSource::with_year(2081);
        source.pages.insert(
            (2081, "Jestha".to_string()),
            month_page(2081, 1, first_day_2081(), 31),
        );
        let source = Arc::new(source);
        let sync = orchestrator(Arc::clone(&source), tmp.path());
        let mut failures = Vec::new();
        let summary = sync.sync(&request(2081, false), &mut |p| {
            if let SyncProgress::MonthFailed { month, .. } = p {
                failures.push(month);
            }
        });

        assert_eq!(failures, vec!["Jestha"]);
        assert_eq!(summary.months_failed, 1);
        assert_eq!(source.total_calls(), 13);
        let loaded = YearStore::new(tmp.path()).load(2081).expect("load");
        assert_eq!(loaded.records["2024-04-13"].lunar_date, "2081-01-01");
        assert!(loaded.records.values().all(|r| r.lunar_month_index != 1));
        let total: u32 = MONTH_LENGTHS_2081.iter().sum();
        assert_eq!(loaded.records.len(), (total - MONTH_LENGTHS_2081[1]) as usize);
    }

    #[test]
    fn disjoint_check_rejects_repeats_within_a_month() {
        let merged = YearRecords::new();
        let records = resolve_month(
            &parse_month(&month_page(2081, 0, first_day_2081(), 3), 0)
                .expect("parse")
                .days,
            2081,
            0,
            AdCursor::new(4, 2024),
        )
        .expect("resolve");
        let mut doubled = records.clone();
        doubled.push(records[0].clone());
        assert!(disjoint_from(&merged, records).is_ok());
        assert!(matches!(
            disjoint_from(&merged, doubled),
            Err(PatroError::Resolve(_))
        ));
    }

    #[test]
    fn page_for_wrong_year_counts_as_failure() {
        let tmp = tempdir().expect("tempdir");
        let mut source = FakeSource::default();
        source.pages.insert(
            (2081, "Baishakh".to_string()),
            month_page(2080, 0, first_day_2081(), 31),
        );
        let sync = orchestrator(Arc::new(source), tmp.path());
        let summary = sync.sync(&request(2081, false), &mut |_| {});
        assert_eq!(summary.months_failed, 12);
        assert_eq!(summary.years_empty, vec![2081]);
    }

    #[test]
    fn extra_event_rules_are_applied() {
        let tmp = tempdir().expect("tempdir");
        let source = Arc::new(FakeSource::with_year(2081));
        let sync = orchestrator(source, tmp.path()).with_rules(vec![ExtraEventRule {
            lunar_year: None,
            lunar_month_index: 2,
            lunar_day: 11,
            label: "Birthday".into(),
        }]);
        sync.sync(&request(2081, false), &mut |_| {});
        let loaded = YearStore::new(tmp.path()).load(2081).expect("load");
        let day = loaded
            .records
            .values()
            .find(|r| r.bs_key() == "2081-03-11")
            .expect("Ashadh 11");
        assert!(day.events.contains("Birthday"));
    }

    #[test]
    fn cancelled_pass_saves_nothing() {
        let tmp = tempdir().expect("tempdir");
        let sync = orchestrator(Arc::new(FakeSource::with_year(2081)), tmp.path());
        sync.cancel_flag().store(true, Ordering::Relaxed);
        let summary = sync.sync(&request(2081, false), &mut |_| {});
        assert!(summary.cancelled);
        assert!(!YearStore::new(tmp.path()).exists(2081));
    }

    #[test]
    fn worker_streams_progress_then_finishes() {
        let tmp = tempdir().expect("tempdir");
        let sync = orchestrator(Arc::new(FakeSource::with_year(2081)), tmp.path());
        let handle = spawn(sync, request(2081, false)).expect("spawn");
        let mut progress = 0;
        let mut finished = None;
        for event in handle.events.iter() {
            match event {
                SyncEvent::Progress(_) => progress += 1,
                SyncEvent::Finished(summary) => finished = Some(summary),
            }
        }
        handle.join().expect("join");
        assert_eq!(progress, 13);
        assert_eq!(finished.expect("finished").years_saved, vec![2081]);
    }

    #[test]
    fn second_lock_on_same_file_is_refused() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("data/.sync.lock");
        let first = SyncLock::acquire(&path).expect("first lock");
        let err = SyncLock::acquire(&path).expect_err("second lock");
        assert!(matches!(
            err.downcast_ref::<PatroError>(),
            Some(PatroError::SyncLocked(_))
        ));
        drop(first);
        assert!(SyncLock::acquire(&path).is_ok());
    }
}
