use chrono::{DateTime, Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

// Recognised date shapes and the chrono format used for each.
static DATE_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"^\d{4}-\d{1,2}-\d{1,2}$", "%Y-%m-%d"),
        (r"^\d{4}/\d{1,2}/\d{1,2}$", "%Y/%m/%d"),
        (r"^\d{1,2}/\d{1,2}/\d{4}$", "%m/%d/%Y"),
        (r"^\d{1,2}-\d{1,2}-\d{4}$", "%m-%d-%Y"),
    ]
    .into_iter()
    .filter_map(|(pattern, format)| Regex::new(pattern).ok().map(|re| (re, format)))
    .collect()
});

static DATETIME_PREFIX: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^(\d{4}-\d{1,2}-\d{1,2})[ T]\d{1,2}:\d{2}").ok());

/// Parses the calendar date out of a date or date-time string.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();

    for (re, format) in DATE_PATTERNS.iter() {
        if re.is_match(value) {
            return NaiveDate::parse_from_str(value, format).ok();
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }

    DATETIME_PREFIX
        .as_ref()
        .and_then(|re| re.captures(value))
        .and_then(|caps| caps.get(1))
        .and_then(|m| NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d").ok())
}

/// Calendar-month bucket key, sortable.
pub fn month_key(date: NaiveDate) -> (i32, u32) {
    (date.year(), date.month())
}

pub fn month_label((year, month): (i32, u32)) -> String {
    format!("{:04}-{:02}", year, month)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_common_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 7);
        assert_eq!(parse_date("2025-03-07"), expected);
        assert_eq!(parse_date("2025/03/07"), expected);
        assert_eq!(parse_date("03/07/2025"), expected);
        assert_eq!(parse_date(" 2025-03-07 "), expected);
        assert_eq!(parse_date("2025-03-07 14:22:01"), expected);
        assert_eq!(parse_date("2025-03-07T14:22:01Z"), expected);
    }

    #[test]
    fn test_unparseable() {
        assert_eq!(parse_date("Laptop"), None);
        assert_eq!(parse_date("2025-13-45"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_month_label() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        assert_eq!(month_label(month_key(date)), "2025-01");
    }
}
