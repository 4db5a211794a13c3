use anyhow::Result;

use crate::commands::{CommandReport, NO_DATA};
use crate::patro::index::CalendarIndex;
use crate::patro::months::{MONTHS, aliases_for, month_index_from_arg};
use crate::patro::paths::resolve_paths;

#[derive(Debug, Clone)]
pub struct MonthOptions {
    pub year: i32,
    pub month: String,
}

pub fn run(opts: &MonthOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("month");

    let Some(month_index) = month_index_from_arg(&opts.month) else {
        report.issue(format!(
            "unknown month `{}`: use 1-12 or a name such as Baishakh",
            opts.month
        ));
        return Ok(report);
    };
    let month_name = MONTHS[month_index];
    report.detail(format!("month={month_name} {}", opts.year));
    report.detail(format!(
        "aliases={}",
        aliases_for(month_name).collect::<Vec<_>>().join(",")
    ));

    let index = CalendarIndex::load(&paths.data_dir)?;
    let days = index.days_in_lunar_month(opts.year, month_index);
    if days.is_empty() {
        report.detail(NO_DATA);
        return Ok(report);
    }

    report.detail(format!("days={}", days.len()));
    for day in days {
        let mut line = format!(
            "{:02} {} {:<9} {}",
            day.lunar_day, day.gregorian_date, day.weekday, day.tithi
        );
        if day.is_holiday {
            line.push_str(" [holiday]");
        }
        if day.has_events() {
            let events = day.events.iter().cloned().collect::<Vec<_>>();
            line.push_str(&format!(" | {}", events.join("; ")));
        }
        report.detail(line);
    }
    Ok(report)
}
