//! Lenient publication date parsing.

use chrono::NaiveDate;

use super::clean_text;

/// Formats carrying a full calendar date
const DAY_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d %B %Y", "%d %b %Y", "%B %d, %Y", "%b %d, %Y"];

/// Formats carrying only a month; the first of the month is assumed
const MONTH_FORMATS: &[&str] = &["%B %Y", "%b %Y", "%Y-%m"];

/// Parse the date formats databases commonly report into a calendar date.
///
/// Month-only dates resolve to the first of the month and bare years to
/// January 1st. Returns `None` for anything else.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = clean_text(text);
    let text = text.trim_end_matches('.');
    if text.is_empty() {
        return None;
    }

    for format in DAY_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date);
        }
    }

    for format in MONTH_FORMATS {
        let padded = format!("{} 01", text);
        if let Ok(date) = NaiveDate::parse_from_str(&padded, &format!("{} %d", format)) {
            return Some(date);
        }
    }

    if text.len() == 4 {
        if let Ok(year) = text.parse::<i32>() {
            return NaiveDate::from_ymd_opt(year, 1, 1);
        }
    }

    None
}
