//! Static calendar tables: BS month names and their spelling variants,
//! AD month abbreviations, the grid column to weekday mapping and the
//! Gregorian month lengths.

pub const MONTHS: [&str; 12] = [
    "Baishakh", "Jestha", "Ashadh", "Shrawan", "Bhadra", "Ashwin", "Kartik", "Mangsir", "Poush",
    "Magh", "Falgun", "Chaitra",
];

/// Spelling variant -> canonical month name. Every canonical name is listed
/// as its own alias.
const MONTH_ALIASES: &[(&str, &str)] = &[
    ("Baishakh", "Baishakh"),
    ("Baisakh", "Baishakh"),
    ("Jestha", "Jestha"),
    ("Jeth", "Jestha"),
    ("Jeshtha", "Jestha"),
    ("Ashadh", "Ashadh"),
    ("Asar", "Ashadh"),
    ("Ashar", "Ashadh"),
    ("Ashaar", "Ashadh"),
    ("Aashadh", "Ashadh"),
    ("Shrawan", "Shrawan"),
    ("Shawn", "Shrawan"),
    ("Saaun", "Shrawan"),
    ("Srawan", "Shrawan"),
    ("Bhadra", "Bhadra"),
    ("Bhadaau", "Bhadra"),
    ("Bhaadra", "Bhadra"),
    ("Ashwin", "Ashwin"),
    ("Asoj", "Ashwin"),
    ("Ashvin", "Ashwin"),
    ("Kartik", "Kartik"),
    ("Kaattik", "Kartik"),
    ("Kartika", "Kartik"),
    ("Mangsir", "Mangsir"),
    ("Mangshir", "Mangsir"),
    ("Maarga", "Mangsir"),
    ("Poush", "Poush"),
    ("Paush", "Poush"),
    ("Push", "Poush"),
    ("Magh", "Magh"),
    ("Magghe", "Magh"),
    ("Falgun", "Falgun"),
    ("Faagun", "Falgun"),
    ("Faalgun", "Falgun"),
    ("Chaitra", "Chaitra"),
    ("Chait", "Chaitra"),
];

const AD_MONTH_ABBREVIATIONS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Grid column -> weekday. The source lays weeks out Sunday first.
pub const WEEKDAYS: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Column of the weekly rest day.
pub const REST_DAY_COLUMN: usize = 6;

/// Resolve any known spelling (case-insensitive) to `(index, canonical)`.
pub fn canonical_month(name: &str) -> Option<(usize, &'static str)> {
    let needle = name.trim();
    let canonical = MONTH_ALIASES
        .iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(needle))
        .map(|(_, canonical)| *canonical)?;
    let index = MONTHS.iter().position(|m| *m == canonical)?;
    Some((index, MONTHS[index]))
}

pub fn aliases_for(canonical: &str) -> impl Iterator<Item = &'static str> + '_ {
    MONTH_ALIASES
        .iter()
        .filter(move |(_, c)| *c == canonical)
        .map(|(alias, _)| *alias)
}

/// Accepts a month name, alias or 1-based number.
pub fn month_index_from_arg(raw: &str) -> Option<usize> {
    if let Ok(n) = raw.trim().parse::<usize>() {
        return (1..=12).contains(&n).then_some(n - 1);
    }
    canonical_month(raw).map(|(index, _)| index)
}

/// Maps `Jan`, `january`, `SEP` ... to 1..=12.
pub fn ad_month_from_abbreviation(token: &str) -> Option<u32> {
    let lower = token.trim().to_ascii_lowercase();
    let prefix = lower.get(..3)?;
    AD_MONTH_ABBREVIATIONS
        .iter()
        .position(|abbr| *abbr == prefix)
        .map(|i| i as u32 + 1)
}

pub fn weekday_for_column(column: usize) -> Option<&'static str> {
    WEEKDAYS.get(column).copied()
}

pub fn is_leap_year(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

pub fn days_in_ad_month(month: u32, year: i32) -> u32 {
    match month {
        2 if is_leap_year(year) => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// Replace Devanagari digits with ASCII ones so `str::parse` accepts them.
pub fn normalize_digits(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '\u{0966}'..='\u{096F}' => {
                char::from_digit(c as u32 - 0x0966, 10).unwrap_or(c)
            }
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve_to_canonical_month() {
        assert_eq!(canonical_month("Asar"), Some((2, "Ashadh")));
        assert_eq!(canonical_month("ASHADH"), canonical_month("asar"));
        assert_eq!(canonical_month("Chait"), Some((11, "Chaitra")));
        assert_eq!(canonical_month("Smarch"), None);
    }

    #[test]
    fn every_canonical_month_is_its_own_alias() {
        for (i, month) in MONTHS.iter().enumerate() {
            assert_eq!(canonical_month(month), Some((i, *month)));
            assert!(aliases_for(month).any(|a| a == *month));
        }
    }

    #[test]
    fn month_arg_accepts_numbers_and_names() {
        assert_eq!(month_index_from_arg("1"), Some(0));
        assert_eq!(month_index_from_arg("12"), Some(11));
        assert_eq!(month_index_from_arg("13"), None);
        assert_eq!(month_index_from_arg("Poush"), Some(8));
    }

    #[test]
    fn ad_abbreviations_are_case_insensitive() {
        assert_eq!(ad_month_from_abbreviation("Apr"), Some(4));
        assert_eq!(ad_month_from_abbreviation("DEC"), Some(12));
        assert_eq!(ad_month_from_abbreviation("September"), Some(9));
        assert_eq!(ad_month_from_abbreviation("Xy"), None);
    }

    #[test]
    fn leap_years_follow_gregorian_rule() {
        assert!(is_leap_year(2024));
        assert!(!is_leap_year(2023));
        assert!(!is_leap_year(1900));
        assert!(is_leap_year(2000));
        assert_eq!(days_in_ad_month(2, 2024), 29);
        assert_eq!(days_in_ad_month(2, 2100), 28);
        assert_eq!(days_in_ad_month(9, 2023), 30);
    }

    #[test]
    fn devanagari_digits_are_normalized() {
        assert_eq!(normalize_digits("२०८१"), "2081");
        assert_eq!(normalize_digits("12"), "12");
    }

    #[test]
    fn weekday_table_is_sunday_first() {
        assert_eq!(weekday_for_column(0), Some("Sunday"));
        assert_eq!(weekday_for_column(REST_DAY_COLUMN), Some("Saturday"));
        assert_eq!(weekday_for_column(7), None);
    }
}
