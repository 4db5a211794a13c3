use anyhow::Result;
use chrono::{NaiveDate, Utc};
use chrono_tz::Asia::Kathmandu;

use crate::commands::{CommandReport, NO_DATA};
use crate::patro::index::CalendarIndex;
use crate::patro::paths::resolve_paths;

#[derive(Debug, Clone, Default)]
pub struct TodayOptions {
    pub date: Option<String>,
}

/// Today's date on the Nepal clock, whatever the host timezone.
pub fn today_in_nepal() -> NaiveDate {
    Utc::now().with_timezone(&Kathmandu).date_naive()
}

pub fn run(opts: &TodayOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("today");

    let date = match opts.date.as_deref() {
        Some(raw) => match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
            Ok(date) => date,
            Err(err) => {
                report.issue(format!("invalid --date `{raw}`: {err}"));
                return Ok(report);
            }
        },
        None => today_in_nepal(),
    };
    let key = date.format("%Y-%m-%d").to_string();
    report.detail(format!("date={key}"));

    let index = CalendarIndex::load(&paths.data_dir)?;
    match index.by_gregorian(&key) {
        Some(record) => report.day("", record),
        None => report.detail(NO_DATA),
    }
    Ok(report)
}
