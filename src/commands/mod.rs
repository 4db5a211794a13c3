pub mod convert;
pub mod month;
pub mod status;
pub mod sync;
pub mod today;
pub mod upcoming;

use crate::patro::record::DayRecord;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }

    /// One detail line per field of `record`, each prefixed with `prefix`.
    pub fn day(&mut self, prefix: &str, record: &DayRecord) {
        self.detail(format!(
            "{prefix}ad={} ({})",
            record.gregorian_date, record.gregorian_date_expanded
        ));
        self.detail(format!(
            "{prefix}bs={} ({})",
            record.lunar_date, record.lunar_date_expanded
        ));
        self.detail(format!("{prefix}weekday={}", record.weekday));
        self.detail(format!("{prefix}tithi={}", record.tithi));
        self.detail(format!("{prefix}holiday={}", record.is_holiday));
        if record.has_events() {
            let events = record.events.iter().cloned().collect::<Vec<_>>();
            self.detail(format!("{prefix}events={}", events.join("; ")));
        }
    }
}

/// Shown wherever a lookup finds nothing; not an error.
pub const NO_DATA: &str = "No Data";
