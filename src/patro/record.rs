use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One calendar day as persisted in a year file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRecord {
    pub gregorian_date: String,
    pub gregorian_date_expanded: String,
    #[serde(alias = "nepali_date")]
    pub lunar_date: String,
    #[serde(alias = "nepali_date_expanded")]
    pub lunar_date_expanded: String,
    #[serde(alias = "nepali_year")]
    pub lunar_year: i32,
    #[serde(alias = "nepali_month")]
    pub lunar_month_name: String,
    #[serde(alias = "nepali_month_index")]
    pub lunar_month_index: usize,
    #[serde(alias = "nepali_day")]
    pub lunar_day: u32,
    pub weekday: String,
    pub tithi: String,
    pub is_holiday: bool,
    #[serde(default)]
    pub events: BTreeSet<String>,
}

impl DayRecord {
    pub fn bs_key(&self) -> String {
        bs_key(self.lunar_year, self.lunar_month_index, self.lunar_day)
    }

    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }
}

/// `"{year}-{month_index + 1:02}-{day:02}"`
pub fn bs_key(year: i32, month_index: usize, day: u32) -> String {
    format!("{year}-{:02}-{day:02}", month_index + 1)
}

/// A grid cell after parsing, before its Gregorian date is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialDayRecord {
    pub lunar_day: u32,
    /// AD day-of-month printed in the cell, month and year unknown.
    pub ad_day: u32,
    pub weekday: &'static str,
    pub tithi: String,
    pub is_holiday: bool,
    pub events: BTreeSet<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bs_key_is_zero_padded_and_one_based() {
        assert_eq!(bs_key(2081, 0, 1), "2081-01-01");
        assert_eq!(bs_key(2081, 11, 30), "2081-12-30");
    }

    #[test]
    fn legacy_field_names_still_deserialize() {
        let raw = r#"{
            "gregorian_date": "2024-04-13",
            "gregorian_date_expanded": "13 April, 2024",
            "nepali_date": "2081-01-01",
            "nepali_date_expanded": "01 Baishakh, 2081",
            "nepali_year": 2081,
            "nepali_month": "Baishakh",
            "nepali_month_index": 0,
            "nepali_day": 1,
            "weekday": "Saturday",
            "tithi": "Shashthi",
            "is_holiday": true,
            "events": ["New Year", "New Year"]
        }"#;
        let record: DayRecord = serde_json::from_str(raw).expect("legacy record");
        assert_eq!(record.bs_key(), "2081-01-01");
        assert_eq!(record.events.len(), 1);
        assert!(record.has_events());
    }
}
