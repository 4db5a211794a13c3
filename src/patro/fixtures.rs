//! Month pages shaped like the source's markup, for tests.

use crate::patro::months::MONTHS;
use chrono::{Datelike, Duration, NaiveDate};

/// BS 2081 month lengths.
pub const MONTH_LENGTHS_2081: [u32; 12] = [31, 31, 32, 31, 31, 31, 30, 29, 30, 29, 30, 30];

pub fn first_day_2081() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 4, 13).expect("valid date")
}

/// Events placed on the 1st and 15th of every month.
pub fn month_page(lunar_year: i32, month_index: usize, first_ad: NaiveDate, len: u32) -> String {
    month_page_with_banner(
        &format!("{} {lunar_year}", MONTHS[month_index]),
        first_ad,
        len,
    )
}

pub fn month_page_with_banner(banner: &str, first_ad: NaiveDate, len: u32) -> String {
    let mut rows = String::new();
    let lead = first_ad.weekday().num_days_from_sunday();
    let mut row = String::from("<tr>");
    for _ in 0..lead {
        row.push_str("<td></td>");
    }
    let mut column = lead;
    for day in 1..=len {
        let ad = first_ad + Duration::days(i64::from(day) - 1);
        let event = if day == 1 || day == 15 {
            format!("Event {banner} {day}")
        } else {
            String::new()
        };
        row.push_str(&format!(
            r#"<td><div class="date_np">{day}</div><div class="date_en">{}</div><div class="tithi">Tithi {day}</div><div class="event_one">{event}</div><div class="rotate_left"></div><div class="rotate_right">{event}</div></td>"#,
            ad.day()
        ));
        column += 1;
        if column == 7 {
            row.push_str("</tr>");
            rows.push_str(&row);
            row = String::from("<tr>");
            column = 0;
        }
    }
    if column > 0 {
        row.push_str("</tr>");
        rows.push_str(&row);
    }

    let last_ad = first_ad + Duration::days(i64::from(len) - 1);
    let ad_banner = format!(
        "{}/{} {}",
        first_ad.format("%b"),
        last_ad.format("%b"),
        first_ad.year()
    );
    format!(
        r#"<html><body><div class="cal_left">{banner}</div><div class="cal_right">{ad_banner}</div>
<table id="calendartable"><tr><th>{banner}</th></tr>
<tr><td>Sun</td><td>Mon</td><td>Tue</td><td>Wed</td><td>Thu</td><td>Fri</td><td>Sat</td></tr>
{rows}</table></body></html>"#
    )
}

/// All twelve pages of a BS year starting on `first_ad`.
pub fn year_pages(lunar_year: i32, first_ad: NaiveDate, lengths: &[u32; 12]) -> Vec<String> {
    let mut start = first_ad;
    let mut pages = Vec::with_capacity(12);
    for (index, len) in lengths.iter().enumerate() {
        pages.push(month_page(lunar_year, index, start, *len));
        start += Duration::days(i64::from(*len));
    }
    pages
}
