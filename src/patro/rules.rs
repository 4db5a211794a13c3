use crate::patro::record::PartialDayRecord;
use serde::{Deserialize, Serialize};

/// A locally configured event added to a BS day regardless of what the
/// source lists. `lunar_year = None` repeats every year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraEventRule {
    #[serde(default)]
    pub lunar_year: Option<i32>,
    pub lunar_month_index: usize,
    pub lunar_day: u32,
    pub label: String,
}

impl ExtraEventRule {
    fn matches(&self, lunar_year: i32, month_index: usize, lunar_day: u32) -> bool {
        self.lunar_year.is_none_or(|y| y == lunar_year)
            && self.lunar_month_index == month_index
            && self.lunar_day == lunar_day
    }
}

/// Returns how many labels were added.
pub fn apply(
    rules: &[ExtraEventRule],
    lunar_year: i32,
    month_index: usize,
    days: &mut [PartialDayRecord],
) -> usize {
    let mut added = 0usize;
    for day in days.iter_mut() {
        for rule in rules {
            if rule.matches(lunar_year, month_index, day.lunar_day)
                && day.events.insert(rule.label.clone())
            {
                added += 1;
            }
        }
    }
    added
}
