use anyhow::Result;
use chrono::NaiveDate;

use crate::commands::today::today_in_nepal;
use crate::commands::{CommandReport, NO_DATA};
use crate::patro::index::CalendarIndex;
use crate::patro::paths::resolve_paths;

#[derive(Debug, Clone)]
pub struct UpcomingOptions {
    pub from: Option<String>,
    pub limit: usize,
}

impl Default for UpcomingOptions {
    fn default() -> Self {
        Self {
            from: None,
            limit: 10,
        }
    }
}

pub fn run(opts: &UpcomingOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("upcoming");

    let from = match opts.from.as_deref() {
        Some(raw) => match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
            Ok(date) => date,
            Err(err) => {
                report.issue(format!("invalid --from `{raw}`: {err}"));
                return Ok(report);
            }
        },
        None => today_in_nepal(),
    };
    let from = from.format("%Y-%m-%d").to_string();
    report.detail(format!("from={from} limit={}", opts.limit));

    let index = CalendarIndex::load(&paths.data_dir)?;
    let days = index.upcoming_with_events(&from, opts.limit);
    if days.is_empty() {
        report.detail(NO_DATA);
        return Ok(report);
    }
    for day in days {
        let events = day.events.iter().cloned().collect::<Vec<_>>();
        report.detail(format!(
            "{} ({}) {}",
            day.gregorian_date,
            day.lunar_date,
            events.join("; ")
        ));
    }
    Ok(report)
}
