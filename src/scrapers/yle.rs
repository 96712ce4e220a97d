//! Yle search results scraper.
//!
//! This module knows the shape of [Yle's search](https://haku.yle.fi): how a
//! results page URL is built and where each article's link, headline, and
//! date live in the rendered markup.
//!
//! # URL Pattern
//!
//! ```text
//! https://haku.yle.fi/?page=2&query=%22kansallispuisto%22&service=uutiset&type=article
//! ```
//!
//! The query is wrapped in literal quotes so the site matches the exact phrase.
//! Article links inside the results are usually relative (`/a/74-20183532`)
//! and are resolved against `https://yle.fi`.

use crate::dates::{self, format_display};
use crate::models::{EARLIEST, Record};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};
use url::{Url, form_urlencoded};

/// Host serving the search result pages.
pub const SEARCH_HOST: &str = "haku.yle.fi";

/// Origin that relative article links are resolved against.
pub const SITE_ORIGIN: &str = "https://yle.fi";

/// A rendered page only counts as a results page once this matches.
pub const RESULTS_CONTAINER_SELECTOR: &str =
    "div.elBtDR div[class^='ArticleResults__SearchItemContainer']";

static ARTICLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(RESULTS_CONTAINER_SELECTOR).unwrap());
static LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());
static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("h3").unwrap());
static DETAILS_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div[class*='ArticleResults__DetailsLine']").unwrap());
static SITE_BASE: Lazy<Url> = Lazy::new(|| Url::parse(SITE_ORIGIN).unwrap());

/// The search being crawled, independent of page number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTarget {
    /// Phrase to search for; sent quoted for an exact match.
    pub query: String,
    /// Service filter (`uutiset`, `urheilu`, ...); empty for no filter.
    pub service: String,
    /// Result type filter (`article`, ...); empty for no filter.
    pub result_type: String,
}

impl SearchTarget {
    pub fn new(
        query: impl Into<String>,
        service: impl Into<String>,
        result_type: impl Into<String>,
    ) -> Self {
        Self {
            query: query.into(),
            service: service.into(),
            result_type: result_type.into(),
        }
    }

    /// URL of the given results page (pages start at 1).
    pub fn page_url(&self, page: u32) -> String {
        let exact = format!("\"{}\"", self.query);
        format!(
            "https://{SEARCH_HOST}/?page={page}&query={}&service={}&type={}",
            escape(&exact),
            escape(&self.service),
            escape(&self.result_type),
        )
    }

    /// Canonical URL of the search, used as the feed's channel link.
    pub fn origin_url(&self) -> String {
        self.page_url(1)
    }
}

fn escape(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Extract every well-formed article from a rendered results page.
///
/// Never fails: malformed candidates are skipped, so a broken page yields an
/// empty list rather than an error. Records whose date cannot be normalized
/// get [`EARLIEST`] as their sort key and `now` as their display date.
#[instrument(level = "debug", skip_all, fields(bytes = markup.len()))]
pub fn extract_records(markup: &str, now: DateTime<Tz>) -> Vec<Record> {
    let document = Html::parse_document(markup);
    let today = now.date_naive();

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for candidate in document.select(&ARTICLE_SELECTOR) {
        match extract_record(candidate, today, &now) {
            Some(record) => records.push(record),
            None => skipped += 1,
        }
    }

    debug!(count = records.len(), skipped, "Extracted records from page");
    records
}

/// Build a [`Record`] from one article block, or `None` if it is unusable.
fn extract_record(candidate: ElementRef<'_>, today: NaiveDate, now: &DateTime<Tz>) -> Option<Record> {
    let anchor = candidate.select(&LINK_SELECTOR).next()?;
    let href = anchor.value().attr("href")?;
    let link = absolutize(href)?;

    let title = anchor
        .select(&TITLE_SELECTOR)
        .next()
        .map(collapse_text)
        .unwrap_or_default();
    if title.is_empty() {
        debug!(%link, "Skipping result without a title");
        return None;
    }

    let raw_date_text = candidate
        .select(&DETAILS_SELECTOR)
        .next()
        .map(|details| date_snippet(&details.text().collect::<String>()))
        .unwrap_or_default();

    let (published_at, display_date) = match dates::normalize_on(&raw_date_text, today) {
        Ok(at) => (at.with_timezone(&Utc), format_display(&at)),
        Err(e) => {
            debug!(%link, error = %e, "Date not recognised; using fallback");
            (EARLIEST, format_display(now))
        }
    };

    Some(Record {
        title,
        guid: link.clone(),
        link,
        raw_date_text,
        published_at,
        display_date,
    })
}

/// Resolve an href against [`SITE_ORIGIN`], passing absolute URLs through untouched.
pub fn absolutize(href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    SITE_BASE.join(href).ok().map(String::from)
}

/// Keep the part of a details line before the first `|`, trimmed.
fn date_snippet(details: &str) -> String {
    details
        .split('|')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

fn collapse_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}
