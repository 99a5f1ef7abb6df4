//! Date-of-birth parsing for the age filter

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

/// Age reported for values that cannot be parsed as a date of birth
pub const UNPARSEABLE_AGE: i32 = -1;

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d-%m-%Y",
    "%Y.%m.%d",
    "%d.%m.%Y",
    "%Y%m%d",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

/// Extract a birth year.
///
/// Slash-separated values (`1984/05/12`) use their year part only: the first
/// part when it is a four-digit year, otherwise the last. A two-digit last part
/// (`05/12/84`) pivots like `%y`: 69-99 are 1900s, 00-68 are 2000s.
/// Everything else goes through full date parsing.
pub fn birth_year(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if raw.contains('/') {
        let parts: Vec<&str> = raw.split('/').map(str::trim).collect();
        let first = parts.first().copied().and_then(four_digit_year);
        let last = parts.last().copied();
        return first
            .or_else(|| last.and_then(four_digit_year))
            .or_else(|| last.and_then(two_digit_year));
    }

    if let Some(year) = four_digit_year(raw) {
        return Some(year);
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date.year());
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.year());
        }
    }
    DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.year())
}

fn four_digit_year(part: &str) -> Option<i32> {
    if part.len() == 4 && part.bytes().all(|b| b.is_ascii_digit()) {
        part.parse().ok()
    } else {
        None
    }
}

fn two_digit_year(part: &str) -> Option<i32> {
    if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let yy: i32 = part.parse().ok()?;
    Some(if yy >= 69 { 1900 + yy } else { 2000 + yy })
}

/// `current_year - birth_year`, or [`UNPARSEABLE_AGE`]
pub fn age(raw: &str, current_year: i32) -> i32 {
    birth_year(raw)
        .map(|year| current_year - year)
        .unwrap_or(UNPARSEABLE_AGE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slash_separated_uses_year_part() {
        assert_eq!(birth_year("1984/05/12"), Some(1984));
        assert_eq!(birth_year("12/05/1984"), Some(1984));
        assert_eq!(birth_year("ab/cd"), None);
    }

    #[test]
    fn test_two_digit_slash_year_pivots() {
        assert_eq!(birth_year("05/12/84"), Some(1984));
        assert_eq!(birth_year("05/12/69"), Some(1969));
        assert_eq!(birth_year("05/12/07"), Some(2007));
        assert_eq!(birth_year("05/12/68"), Some(2068));
        assert_eq!(birth_year("05/12/1"), None);
        assert_eq!(age("05/12/84", 2024), 40);
    }

    #[test]
    fn test_full_date_formats() {
        assert_eq!(birth_year("1984-05-12"), Some(1984));
        assert_eq!(birth_year("12 May 1984"), Some(1984));
        assert_eq!(birth_year("May 12, 1984"), Some(1984));
        assert_eq!(birth_year("1984-05-12T08:30:00"), Some(1984));
        assert_eq!(birth_year("1984-05-12T08:30:00+01:00"), Some(1984));
        assert_eq!(birth_year("1984"), Some(1984));
    }

    #[test]
    fn test_age_boundary_and_unparseable() {
        assert_eq!(age("1984-01-01", 2024), 40);
        assert_eq!(age("not a date", 2024), UNPARSEABLE_AGE);
        assert_eq!(age("", 2024), UNPARSEABLE_AGE);
    }
}
