use crate::error::PatroError;
use crate::patro::months::{MONTHS, days_in_ad_month};
use crate::patro::record::{DayRecord, PartialDayRecord, bs_key};
use chrono::NaiveDate;

/// AD month/year the resolver is currently inside while walking a BS month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdCursor {
    pub month: u32,
    pub year: i32,
}

impl AdCursor {
    pub fn new(month: u32, year: i32) -> Self {
        Self { month, year }
    }

    fn days(self) -> u32 {
        days_in_ad_month(self.month, self.year)
    }

    fn advance(&mut self) {
        self.month += 1;
        if self.month == 13 {
            self.month = 1;
            self.year += 1;
        }
    }

    /// Resolve one printed AD day-of-month. A number past the end of the
    /// current month belongs to the next one; a number equal to the last
    /// day moves the cursor forward for the following cells.
    pub fn resolve_day(&mut self, raw_day: u32) -> Result<NaiveDate, PatroError> {
        let mut day = raw_day;
        if day > self.days() {
            day -= self.days();
            self.advance();
        }
        let date = NaiveDate::from_ymd_opt(self.year, self.month, day).ok_or_else(|| {
            PatroError::Resolve(format!(
                "day {raw_day} does not fit {:04}-{:02}",
                self.year, self.month
            ))
        })?;
        if day == self.days() {
            self.advance();
        }
        Ok(date)
    }
}

/// Turn a parsed BS month into finished records. `partials` must already be
/// sorted by BS day; `ad_start` is the AD month the BS month begins in.
pub fn resolve_month(
    partials: &[PartialDayRecord],
    lunar_year: i32,
    month_index: usize,
    ad_start: AdCursor,
) -> Result<Vec<DayRecord>, PatroError> {
    let month_name = MONTHS
        .get(month_index)
        .ok_or_else(|| PatroError::Resolve(format!("month index {month_index} out of range")))?;

    let mut cursor = ad_start;
    let mut out = Vec::with_capacity(partials.len());
    for partial in partials {
        let date = cursor.resolve_day(partial.ad_day)?;
        out.push(DayRecord {
            gregorian_date: date.format("%Y-%m-%d").to_string(),
            gregorian_date_expanded: date.format("%d %B, %Y").to_string(),
            lunar_date: bs_key(lunar_year, month_index, partial.lunar_day),
            lunar_date_expanded: format!("{:02} {month_name}, {lunar_year}", partial.lunar_day),
            lunar_year,
            lunar_month_name: (*month_name).to_string(),
            lunar_month_index: month_index,
            lunar_day: partial.lunar_day,
            weekday: partial.weekday.to_string(),
            tithi: partial.tithi.clone(),
            is_holiday: partial.is_holiday,
            events: partial.events.clone(),
        });
    }
    Ok(out)
}
