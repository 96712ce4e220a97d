//! Normalization of the Finnish `day.month.year` dates shown on search results.
//!
//! The results page prints dates such as `23.9.2025`, or `5.10.` for articles
//! from the current year. Both forms are interpreted as midnight in the site's
//! own timezone (`Europe/Helsinki`).
//!
//! An undated form is always assumed to belong to the current calendar year,
//! so an article from December viewed in January is dated into the wrong year.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;

/// Timezone the search site prints its dates in.
pub const SITE_TIMEZONE: Tz = chrono_tz::Europe::Helsinki;

static DAY_MONTH_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})\.(\d{1,2})\.(\d{4})$").unwrap());

/// Errors returned by [`normalize`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    #[error("unsupported date format: {0:?}")]
    Unsupported(String),
}

/// Normalize a date snippet using today's date in [`SITE_TIMEZONE`].
pub fn normalize(text: &str) -> Result<DateTime<Tz>, NormalizeError> {
    normalize_on(text, today())
}

/// Normalize a date snippet, treating `today` as the current date.
///
/// Rules, first match wins:
/// 1. `D.M.YYYY` with one or two digit day and month.
/// 2. If the text contains a `.` but not the current year, the current year
///    is appended and rule 1 is retried (`5.10.` becomes `5.10.2025`).
///
/// # Errors
///
/// Returns [`NormalizeError::Unsupported`] for anything else, including
/// impossible calendar dates such as `31.2.2025`.
pub fn normalize_on(text: &str, today: NaiveDate) -> Result<DateTime<Tz>, NormalizeError> {
    let text = text.trim();

    if let Some(parsed) = parse_day_month_year(text) {
        return Ok(parsed);
    }

    let year = today.year().to_string();
    if text.contains('.') && !text.contains(&year) {
        if let Some(parsed) = parse_day_month_year(&format!("{text}{year}")) {
            return Ok(parsed);
        }
    }

    Err(NormalizeError::Unsupported(text.to_string()))
}

/// `<pubDate>` layout: RFC 2822 with a zero-padded day and numeric offset.
pub const DISPLAY_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Format a timestamp the way `<pubDate>` expects it.
pub fn format_display(at: &DateTime<Tz>) -> String {
    at.format(DISPLAY_FORMAT).to_string()
}

/// Current wall-clock time in [`SITE_TIMEZONE`].
pub fn now() -> DateTime<Tz> {
    Utc::now().with_timezone(&SITE_TIMEZONE)
}

fn today() -> NaiveDate {
    now().date_naive()
}

fn parse_day_month_year(text: &str) -> Option<DateTime<Tz>> {
    let caps = DAY_MONTH_YEAR.captures(text)?;
    let day: u32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let year: i32 = caps[3].parse().ok()?;

    let midnight = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(0, 0, 0)?;
    SITE_TIMEZONE.from_local_datetime(&midnight).earliest()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_full_date_is_local_midnight() {
        let parsed = normalize_on("23.9.2025", day(2025, 10, 1)).unwrap();
        assert_eq!(parsed.date_naive(), day(2025, 9, 23));
        assert_eq!(parsed.format("%H:%M:%S").to_string(), "00:00:00");
        assert_eq!(
            parsed.with_timezone(&Utc).to_rfc3339(),
            "2025-09-22T21:00:00+00:00"
        );
    }

    #[test]
    fn test_normalize_full_date_ignores_clock() {
        let parsed = normalize("1.3.2024").unwrap();
        assert_eq!(parsed.date_naive(), day(2024, 3, 1));
        assert_eq!(parsed.timezone(), SITE_TIMEZONE);
    }

    #[test]
    fn test_full_date_with_leading_zeros() {
        let parsed = normalize_on("05.01.2024", day(2025, 10, 1)).unwrap();
        assert_eq!(parsed.date_naive(), day(2024, 1, 5));
    }

    #[test]
    fn test_partial_date_assumes_current_year() {
        let parsed = normalize_on("5.10.", day(2025, 3, 14)).unwrap();
        assert_eq!(parsed.date_naive(), day(2025, 10, 5));
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored() {
        let parsed = normalize_on("  7.1.2025 ", day(2025, 3, 14)).unwrap();
        assert_eq!(parsed.date_naive(), day(2025, 1, 7));
    }

    #[test]
    fn test_garbage_fails() {
        let err = normalize_on("garbage", day(2025, 3, 14)).unwrap_err();
        assert_eq!(err, NormalizeError::Unsupported("garbage".to_string()));
    }

    #[test]
    fn test_impossible_date_fails() {
        assert!(normalize_on("31.2.2025", day(2025, 3, 14)).is_err());
        assert!(normalize_on("31.2.", day(2025, 3, 14)).is_err());
    }

    #[test]
    fn test_partial_date_without_trailing_dot_fails() {
        assert!(normalize_on("12.3", day(2025, 3, 14)).is_err());
    }

    #[test]
    fn test_empty_text_fails() {
        assert!(normalize_on("", day(2025, 3, 14)).is_err());
    }

    #[test]
    fn test_display_uses_site_offset() {
        let summer = normalize_on("23.9.2025", day(2025, 10, 1)).unwrap();
        assert_eq!(format_display(&summer), "Tue, 23 Sep 2025 00:00:00 +0300");

        let winter = normalize_on("7.1.2025", day(2025, 10, 1)).unwrap();
        assert_eq!(format_display(&winter), "Tue, 07 Jan 2025 00:00:00 +0200");
    }
}
