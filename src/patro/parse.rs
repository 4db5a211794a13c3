use crate::error::PatroError;
use crate::patro::months::{
    REST_DAY_COLUMN, ad_month_from_abbreviation, canonical_month, normalize_digits,
    weekday_for_column,
};
use crate::patro::record::PartialDayRecord;
use crate::patro::resolve::AdCursor;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeSet;
use std::sync::OnceLock;

pub const HOLIDAY_COLOR: &str = "#FF4D00";

/// Rows of the day grid before the first week (title and weekday header).
const GRID_HEADER_ROWS: usize = 2;

const EVENT_SLOTS: [&str; 3] = ["div.event_one", "div.rotate_left", "div.rotate_right"];

static AD_MONTH_RE: OnceLock<Option<Regex>> = OnceLock::new();
static AD_YEAR_RE: OnceLock<Option<Regex>> = OnceLock::new();

fn cached_regex(
    slot: &'static OnceLock<Option<Regex>>,
    pattern: &str,
) -> Result<&'static Regex, PatroError> {
    slot.get_or_init(|| Regex::new(pattern).ok())
        .as_ref()
        .ok_or_else(|| PatroError::Parse(format!("bad pattern {pattern}")))
}

#[derive(Debug, Clone)]
pub struct ParsedMonth {
    pub month_index: usize,
    pub month_name: &'static str,
    pub lunar_year: i32,
    pub ad_start: AdCursor,
    /// Sorted ascending by BS day.
    pub days: Vec<PartialDayRecord>,
}

struct Selectors {
    lunar_banner: Selector,
    ad_banner: Selector,
    grid: Selector,
    row: Selector,
    lunar_day: Selector,
    ad_day: Selector,
    tithi: Selector,
    events: Vec<Selector>,
}

fn selector(css: &str) -> Result<Selector, PatroError> {
    Selector::parse(css).map_err(|err| PatroError::Parse(format!("bad selector {css}: {err}")))
}

impl Selectors {
    fn build() -> Result<Self, PatroError> {
        Ok(Self {
            lunar_banner: selector("div.cal_left")?,
            ad_banner: selector("div.cal_right")?,
            grid: selector("table#calendartable")?,
            row: selector("tr")?,
            lunar_day: selector("div.date_np")?,
            ad_day: selector("div.date_en")?,
            tithi: selector("div.tithi")?,
            events: EVENT_SLOTS
                .iter()
                .map(|css| selector(css))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn first_text(scope: ElementRef<'_>, sel: &Selector) -> Option<String> {
    scope.select(sel).next().map(text_of)
}

fn parse_number(raw: &str) -> Option<u32> {
    normalize_digits(raw).trim().parse::<u32>().ok()
}

fn has_holiday_marker(el: ElementRef<'_>) -> bool {
    let Some(style) = el.value().attr("style") else {
        return false;
    };
    let compact: String = style.chars().filter(|c| !c.is_whitespace()).collect();
    compact
        .trim_end_matches(';')
        .eq_ignore_ascii_case(&format!("color:{HOLIDAY_COLOR}"))
}

/// `"Baishakh 2081"` -> canonical month and BS year.
fn parse_lunar_banner(text: &str) -> Result<(usize, &'static str, i32), PatroError> {
    let mut tokens = text.split_whitespace();
    let month_token = tokens
        .next()
        .ok_or_else(|| PatroError::Parse("empty month banner".into()))?;
    let year = tokens
        .next()
        .and_then(|raw| normalize_digits(raw).parse::<i32>().ok())
        .ok_or_else(|| PatroError::Parse(format!("no year in month banner `{text}`")))?;
    let (index, name) = canonical_month(month_token)
        .ok_or_else(|| PatroError::UnknownMonth(month_token.to_string()))?;
    Ok((index, name, year))
}

/// `"Apr/May 2024"` -> AD month and year the BS month starts in.
fn parse_ad_banner(text: &str) -> Result<AdCursor, PatroError> {
    let text = normalize_digits(text);
    let month_re = cached_regex(&AD_MONTH_RE, r"^([A-Za-z]+)")?;
    let year_re = cached_regex(&AD_YEAR_RE, r"^[^0-9]+(\d{4})")?;

    let month = month_re
        .captures(&text)
        .and_then(|c| c.get(1))
        .and_then(|m| ad_month_from_abbreviation(m.as_str()))
        .ok_or_else(|| PatroError::Parse(format!("no AD month in banner `{text}`")))?;
    let year = year_re
        .captures(&text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<i32>().ok())
        .ok_or_else(|| PatroError::Parse(format!("no AD year in banner `{text}`")))?;
    Ok(AdCursor::new(month, year))
}

fn parse_cell(
    cell: ElementRef<'_>,
    column: usize,
    sel: &Selectors,
) -> Result<Option<PartialDayRecord>, PatroError> {
    let Some(day_el) = cell.select(&sel.lunar_day).next() else {
        return Ok(None);
    };
    let raw_day = text_of(day_el);
    let lunar_day = parse_number(&raw_day)
        .ok_or_else(|| PatroError::Parse(format!("unreadable BS day number `{raw_day}`")))?;
    let weekday = weekday_for_column(column)
        .ok_or_else(|| PatroError::Parse(format!("grid column {column} beyond Saturday")))?;
    let ad_day = first_text(cell, &sel.ad_day)
        .as_deref()
        .and_then(parse_number)
        .ok_or_else(|| PatroError::Parse(format!("day {lunar_day} has no AD day number")))?;

    let events = sel
        .events
        .iter()
        .filter_map(|slot| first_text(cell, slot))
        .filter(|label| !label.is_empty())
        .collect::<BTreeSet<_>>();

    Ok(Some(PartialDayRecord {
        lunar_day,
        ad_day,
        weekday,
        tithi: first_text(cell, &sel.tithi).unwrap_or_default(),
        is_holiday: column == REST_DAY_COLUMN || has_holiday_marker(day_el),
        events,
    }))
}

/// Parse one month page. The banner month must be the month that was asked
/// for; the source answering with a different month is treated as broken
/// markup rather than stored under the wrong index.
pub fn parse_month(raw: &str, expected_month_index: usize) -> Result<ParsedMonth, PatroError> {
    let sel = Selectors::build()?;
    let doc = Html::parse_document(raw);
    let root = doc.root_element();

    let lunar_banner = first_text(root, &sel.lunar_banner)
        .ok_or_else(|| PatroError::Parse("month banner missing".into()))?;
    let (month_index, month_name, lunar_year) = parse_lunar_banner(&lunar_banner)?;
    if month_index != expected_month_index {
        return Err(PatroError::Parse(format!(
            "asked for month {} but page shows {month_name}",
            expected_month_index + 1
        )));
    }

    let grid = root
        .select(&sel.grid)
        .next()
        .ok_or_else(|| PatroError::Parse("day grid missing".into()))?;

    let mut days = Vec::new();
    for row in grid.select(&sel.row).skip(GRID_HEADER_ROWS) {
        let cells = row
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name() == "td");
        for (column, cell) in cells.enumerate() {
            if let Some(day) = parse_cell(cell, column, &sel)? {
                days.push(day);
            }
        }
    }
    if days.is_empty() {
        return Err(PatroError::Parse("day grid has no days".into()));
    }
    days.sort_by_key(|d| d.lunar_day);
    // The resolver's rollover relies on an unbroken 1..=N run.
    for (position, day) in days.iter().enumerate() {
        if day.lunar_day as usize != position + 1 {
            return Err(PatroError::Parse(format!(
                "BS days not contiguous: expected {} but found {}",
                position + 1,
                day.lunar_day
            )));
        }
    }

    let ad_banner = first_text(root, &sel.ad_banner)
        .ok_or_else(|| PatroError::Parse("AD banner missing".into()))?;
    let ad_start = parse_ad_banner(&ad_banner)?;

    Ok(ParsedMonth {
        month_index,
        month_name,
        lunar_year,
        ad_start,
        days,
    })
}
