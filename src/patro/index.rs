use crate::patro::record::{DayRecord, bs_key};
use crate::patro::store::YearStore;
use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// Read-only lookup structure over every stored year. Built in one go and
/// never patched afterwards.
#[derive(Debug, Clone, Default)]
pub struct CalendarIndex {
    by_gregorian: HashMap<String, DayRecord>,
    by_lunar: HashMap<String, String>,
    by_month: HashMap<(i32, usize), Vec<String>>,
    sorted_dates: Vec<String>,
    skipped_lines: usize,
}

impl CalendarIndex {
    pub fn load(storage_root: &Path) -> Result<Self> {
        let store = YearStore::new(storage_root);
        let mut records = Vec::new();
        let mut skipped_lines = 0;
        for year in store.years()? {
            let loaded = store.load(year)?;
            skipped_lines += loaded.skipped_lines;
            records.extend(loaded.records.into_values());
        }
        let mut index = Self::from_records(records);
        index.skipped_lines = skipped_lines;
        info!(
            days = index.len(),
            skipped_lines,
            root = %storage_root.display(),
            "calendar index built"
        );
        Ok(index)
    }

    /// Later records win on a repeated Gregorian date.
    pub fn from_records(records: impl IntoIterator<Item = DayRecord>) -> Self {
        let mut by_gregorian: HashMap<String, DayRecord> = HashMap::new();
        for record in records {
            if let Some(previous) =
                by_gregorian.insert(record.gregorian_date.clone(), record)
            {
                warn!(
                    date = %previous.gregorian_date,
                    replaced = %previous.lunar_date,
                    "duplicate gregorian date across year files"
                );
            }
        }

        let mut sorted_dates: Vec<String> = by_gregorian.keys().cloned().collect();
        sorted_dates.sort_unstable();

        let mut by_lunar = HashMap::with_capacity(by_gregorian.len());
        let mut by_month: HashMap<(i32, usize), Vec<String>> = HashMap::new();
        for date in &sorted_dates {
            let record = &by_gregorian[date];
            if let Some(previous) = by_lunar.insert(record.bs_key(), date.clone()) {
                warn!(
                    bs = %record.lunar_date,
                    date = %date,
                    replaced = %previous,
                    "duplicate BS date across year files"
                );
            }
            by_month
                .entry((record.lunar_year, record.lunar_month_index))
                .or_default()
                .push(date.clone());
        }
        for dates in by_month.values_mut() {
            dates.sort_by_key(|d| by_gregorian[d].lunar_day);
        }

        Self {
            by_gregorian,
            by_lunar,
            by_month,
            sorted_dates,
            skipped_lines: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.sorted_dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted_dates.is_empty()
    }

    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    pub fn first_date(&self) -> Option<&str> {
        self.sorted_dates.first().map(String::as_str)
    }

    pub fn last_date(&self) -> Option<&str> {
        self.sorted_dates.last().map(String::as_str)
    }

    pub fn by_gregorian(&self, date: &str) -> Option<&DayRecord> {
        self.by_gregorian.get(date)
    }

    pub fn by_lunar(&self, year: i32, month_index: usize, day: u32) -> Option<&DayRecord> {
        let date = self.by_lunar.get(&bs_key(year, month_index, day))?;
        self.by_gregorian.get(date)
    }

    /// Ascending by BS day; empty when the month was never synced.
    pub fn days_in_lunar_month(&self, year: i32, month_index: usize) -> Vec<&DayRecord> {
        self.by_month
            .get(&(year, month_index))
            .map(|dates| dates.iter().filter_map(|d| self.by_gregorian.get(d)).collect())
            .unwrap_or_default()
    }

    /// Days with at least one event, from `from_date` onwards. An unknown
    /// `from_date` scans from the first stored day.
    pub fn upcoming_with_events(&self, from_date: &str, limit: usize) -> Vec<&DayRecord> {
        let start = self
            .sorted_dates
            .binary_search_by(|d| d.as_str().cmp(from_date))
            .unwrap_or(0);
        self.sorted_dates[start..]
            .iter()
            .filter_map(|d| self.by_gregorian.get(d))
            .filter(|r| r.has_events())
            .take(limit)
            .collect()
    }
}

/// Shared slot for the current index. Readers take a cheap `Arc` clone and
/// keep using it even while a newer index is swapped in.
#[derive(Debug, Clone, Default)]
pub struct IndexHandle {
    current: Arc<RwLock<Arc<CalendarIndex>>>,
}

impl IndexHandle {
    pub fn new(index: CalendarIndex) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(index))),
        }
    }

    pub fn snapshot(&self) -> Arc<CalendarIndex> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn replace(&self, index: CalendarIndex) {
        let next = Arc::new(index);
        match self.current.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    pub fn reload(&self, storage_root: &Path) -> Result<Arc<CalendarIndex>> {
        self.replace(CalendarIndex::load(storage_root)?);
        Ok(self.snapshot())
    }
}
