//! Data models for scraped search results and the RSS document built from them.
//!
//! This module defines the core data structures used throughout the application:
//! - [`Record`]: One article discovered on a search results page
//! - [`Rss`]: Root of the syndication document written at the end of a run
//! - [`Channel`] and [`Item`]: The feed metadata block and its entries
//!
//! The feed types serialize through `quick-xml`'s serde support, so the field
//! renames below are the exact tag names that feed readers expect.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sort key given to records whose date could not be normalized.
///
/// It compares lower than every real timestamp, so these records fall to the
/// bottom of a newest-first ordering.
pub const EARLIEST: DateTime<Utc> = DateTime::<Utc>::MIN_UTC;

/// A single article found on a search results page.
///
/// # Fields
///
/// * `title` - Headline text, never empty
/// * `link` - Absolute article URL
/// * `raw_date_text` - Details-line snippet as it appeared on the page
/// * `published_at` - Normalized publication time, or [`EARLIEST`]
/// * `display_date` - RFC 2822 string written to the feed
/// * `guid` - Feed identity, always equal to `link`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// The article headline.
    pub title: String,
    /// The absolute article URL.
    pub link: String,
    /// The date snippet before normalization (text before the first `|`).
    pub raw_date_text: String,
    /// Publication time used for ordering.
    pub published_at: DateTime<Utc>,
    /// Publication time as written to `<pubDate>`.
    pub display_date: String,
    /// Identity key for the feed item.
    pub guid: String,
}

impl Record {
    /// Whether the publication date was recovered from the page.
    pub fn has_parsed_date(&self) -> bool {
        self.published_at != EARLIEST
    }
}

/// Root element of an RSS 2.0 document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "rss")]
pub struct Rss {
    /// Always `"2.0"`.
    #[serde(rename = "@version")]
    pub version: String,
    /// The single channel of the feed.
    pub channel: Channel,
}

/// Channel metadata and the ordered list of entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub title: String,
    pub link: String,
    pub description: String,
    pub language: String,
    #[serde(rename = "item", default)]
    pub items: Vec<Item>,
}

/// One feed entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub title: String,
    pub link: String,
    #[serde(rename = "pubDate")]
    pub pub_date: String,
    pub guid: String,
}

impl From<&Record> for Item {
    fn from(record: &Record) -> Self {
        Item {
            title: record.title.clone(),
            link: record.link.clone(),
            pub_date: record.display_date.clone(),
            guid: record.guid.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(link: &str, published_at: DateTime<Utc>) -> Record {
        Record {
            title: "Otsikko".to_string(),
            link: link.to_string(),
            raw_date_text: "23.9.2025".to_string(),
            published_at,
            display_date: "Tue, 23 Sep 2025 00:00:00 +0300".to_string(),
            guid: link.to_string(),
        }
    }

    #[test]
    fn test_earliest_sorts_below_real_dates() {
        let real = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();
        assert!(EARLIEST < real);
    }

    #[test]
    fn test_has_parsed_date() {
        let parsed = record(
            "https://yle.fi/a/1",
            Utc.with_ymd_and_hms(2025, 9, 22, 21, 0, 0).unwrap(),
        );
        let fallback = record("https://yle.fi/a/2", EARLIEST);
        assert!(parsed.has_parsed_date());
        assert!(!fallback.has_parsed_date());
    }

    #[test]
    fn test_item_from_record() {
        let rec = record("https://yle.fi/a/7", EARLIEST);
        let item = Item::from(&rec);
        assert_eq!(item.title, "Otsikko");
        assert_eq!(item.link, "https://yle.fi/a/7");
        assert_eq!(item.guid, item.link);
        assert_eq!(item.pub_date, "Tue, 23 Sep 2025 00:00:00 +0300");
    }
}
