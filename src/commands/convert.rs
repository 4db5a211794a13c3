use anyhow::Result;
use chrono::NaiveDate;

use crate::commands::{CommandReport, NO_DATA};
use crate::patro::index::CalendarIndex;
use crate::patro::months::{month_index_from_arg, normalize_digits};
use crate::patro::paths::resolve_paths;

#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    pub ad: Option<String>,
    pub bs: Option<String>,
}

/// `2081-01-15`, `2081-Baishakh-15` or `२०८१-०१-१५` -> (year, month index, day).
pub fn parse_bs_date(raw: &str) -> Option<(i32, usize, u32)> {
    let normalized = normalize_digits(raw.trim());
    let mut parts = normalized.split('-');
    let year = parts.next()?.trim().parse::<i32>().ok()?;
    let month_index = month_index_from_arg(parts.next()?)?;
    let day = parts.next()?.trim().parse::<u32>().ok()?;
    if parts.next().is_some() || !(1..=32).contains(&day) {
        return None;
    }
    Some((year, month_index, day))
}

pub fn run(opts: &ConvertOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("convert");

    let found = match (opts.ad.as_deref(), opts.bs.as_deref()) {
        (Some(raw), None) => {
            let Ok(date) = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") else {
                report.issue(format!("invalid AD date `{raw}`: use YYYY-MM-DD"));
                return Ok(report);
            };
            let key = date.format("%Y-%m-%d").to_string();
            report.detail(format!("query.ad={key}"));
            CalendarIndex::load(&paths.data_dir)?
                .by_gregorian(&key)
                .cloned()
        }
        (None, Some(raw)) => {
            let Some((year, month_index, day)) = parse_bs_date(raw) else {
                report.issue(format!("invalid BS date `{raw}`: use YYYY-MM-DD"));
                return Ok(report);
            };
            report.detail(format!("query.bs={year}-{:02}-{day:02}", month_index + 1));
            CalendarIndex::load(&paths.data_dir)?
                .by_lunar(year, month_index, day)
                .cloned()
        }
        _ => {
            report.issue("pass exactly one of --ad or --bs");
            return Ok(report);
        }
    };

    match found {
        Some(record) => report.day("", &record),
        None => report.detail(NO_DATA),
    }
    Ok(report)
}
