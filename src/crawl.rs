//! Pagination over the search results.
//!
//! The site never says "this is the last page". Past the end it simply
//! renders no results container, which surfaces here as a render timeout.
//! The crawler therefore walks pages `1, 2, 3, ...` one at a time until one of
//! the stop conditions in [`CrawlOutcome`] is reached, pausing between pages
//! to keep the request rate polite.

use crate::browser::{FetchError, RenderPage};
use crate::dates;
use crate::models::Record;
use crate::scrapers::yle::{RESULTS_CONTAINER_SELECTOR, SearchTarget, extract_records};
use crate::utils::truncate_for_log;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Timing and selector knobs for a crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSettings {
    /// Upper bound for rendering a single page.
    pub fetch_timeout: Duration,
    /// Pause after every page that produced results.
    pub page_delay: Duration,
    /// Element that must be visible before a page is captured.
    pub results_selector: String,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(10),
            page_delay: Duration::from_secs(2),
            results_selector: RESULTS_CONTAINER_SELECTOR.to_string(),
        }
    }
}

/// Why a crawl stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlOutcome {
    /// Rendering `page` failed or timed out; the usual end of the results.
    PageFetchFailed { page: u32, reason: FetchError },
    /// The very first page rendered but contained no usable articles.
    FirstPageEmpty,
    /// `page` (> 1) rendered but contained no usable articles.
    Exhausted { page: u32 },
    /// Cancellation was requested before `page` was fetched.
    Cancelled { page: u32 },
}

/// Records gathered by a finished crawl, newest first.
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pub records: Vec<Record>,
    pub outcome: CrawlOutcome,
    /// Number of pages that contributed records.
    pub pages_with_results: u32,
}

/// State of one run: the page about to be fetched and everything found so far.
#[derive(Debug)]
pub struct CrawlSession {
    page: u32,
    records: Vec<Record>,
}

impl Default for CrawlSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CrawlSession {
    pub fn new() -> Self {
        Self {
            page: 1,
            records: Vec::new(),
        }
    }

    /// The page number the next fetch should request.
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Append the records of the current page and move on to the next one.
    fn advance(&mut self, page_records: Vec<Record>) {
        self.records.extend(page_records);
        self.page += 1;
    }

    /// Close the session, handing its records over sorted newest first.
    pub fn finish(self, outcome: CrawlOutcome) -> CrawlReport {
        let mut records = self.records;
        sort_newest_first(&mut records);
        CrawlReport {
            records,
            outcome,
            pages_with_results: self.page - 1,
        }
    }
}

/// Stable sort by `published_at`, latest first.
///
/// Records carrying the [`EARLIEST`](crate::models::EARLIEST) sentinel end up
/// after every dated record.
pub fn sort_newest_first(records: &mut [Record]) {
    records.sort_by(|a, b| b.published_at.cmp(&a.published_at));
}

/// Drives a [`RenderPage`] across the result pages of one search.
#[derive(Debug)]
pub struct Crawler<R> {
    renderer: R,
    target: SearchTarget,
    settings: CrawlSettings,
    cancel: CancellationToken,
}

impl<R: RenderPage> Crawler<R> {
    pub fn new(renderer: R, target: SearchTarget, settings: CrawlSettings) -> Self {
        Self {
            renderer,
            target,
            settings,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop the crawl before the next page once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Crawl until the results run out and return what was found.
    #[instrument(level = "info", skip_all, fields(query = %self.target.query))]
    pub async fn run(&self) -> CrawlReport {
        let mut session = CrawlSession::new();

        let outcome = loop {
            let page = session.page();
            if self.cancel.is_cancelled() {
                warn!(page, "Crawl cancelled; keeping results gathered so far");
                break CrawlOutcome::Cancelled { page };
            }

            let url = self.target.page_url(page);
            info!(page, %url, "Scraping page");

            let markup = match self
                .renderer
                .render(&url, &self.settings.results_selector, self.settings.fetch_timeout)
                .await
            {
                Ok(markup) => markup,
                Err(reason) => {
                    info!(page, error = %reason, "Page scrape ended (likely no more results)");
                    break CrawlOutcome::PageFetchFailed { page, reason };
                }
            };

            let page_records = extract_records(&markup, dates::now());
            if page_records.is_empty() {
                debug!(
                    page,
                    preview = %truncate_for_log(&markup, 300),
                    "Rendered page had no usable articles"
                );
                if page == 1 {
                    warn!("No articles found on first page");
                    break CrawlOutcome::FirstPageEmpty;
                }
                info!(page, "Finished scraping; page returned no valid articles");
                break CrawlOutcome::Exhausted { page };
            }

            info!(page, count = page_records.len(), "Found articles on page");
            session.advance(page_records);

            tokio::select! {
                _ = sleep(self.settings.page_delay) => {}
                _ = self.cancel.cancelled() => {}
            }
        };

        let report = session.finish(outcome);
        info!(
            total = report.records.len(),
            pages = report.pages_with_results,
            outcome = ?report.outcome,
            "Crawl finished; results sorted newest to oldest"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EARLIEST;
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Serves canned responses in order and records every URL it was asked for.
    #[derive(Default)]
    struct ScriptedRenderer {
        responses: Mutex<VecDeque<Result<String, FetchError>>>,
        requested: Arc<Mutex<Vec<String>>>,
        cancel_on_call: Option<(usize, CancellationToken)>,
    }

    impl ScriptedRenderer {
        fn new(responses: Vec<Result<String, FetchError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                ..Self::default()
            }
        }

        fn requested(&self) -> Arc<Mutex<Vec<String>>> {
            Arc::clone(&self.requested)
        }
    }

    impl RenderPage for ScriptedRenderer {
        async fn render(
            &self,
            url: &str,
            _selector: &str,
            limit: Duration,
        ) -> Result<String, FetchError> {
            let calls = {
                let mut requested = self.requested.lock().unwrap();
                requested.push(url.to_string());
                requested.len()
            };
            if let Some((on_call, token)) = &self.cancel_on_call {
                if *on_call == calls {
                    token.cancel();
                }
            }
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(FetchError::Timeout(limit)))
        }
    }

    fn page_with(articles: &[(&str, &str)]) -> Result<String, FetchError> {
        let blocks: String = articles
            .iter()
            .map(|(href, date)| {
                format!(
                    r#"<div class="ArticleResults__SearchItemContainer-x">
                         <a href="{href}"><h3>Artikkeli {href}</h3></a>
                         <div class="ArticleResults__DetailsLine-y">{date} | Uutiset</div>
                       </div>"#
                )
            })
            .collect();
        Ok(format!(
            r#"<html><body><div class="elBtDR">{blocks}</div></body></html>"#
        ))
    }

    fn empty_page() -> Result<String, FetchError> {
        Ok(r#"<html><body><div class="elBtDR"></div></body></html>"#.to_string())
    }

    fn target() -> SearchTarget {
        SearchTarget::new("kansallispuisto", "uutiset", "article")
    }

    fn fast_settings() -> CrawlSettings {
        CrawlSettings {
            page_delay: Duration::ZERO,
            ..CrawlSettings::default()
        }
    }

    fn links(report: &CrawlReport) -> Vec<&str> {
        report.records.iter().map(|r| r.link.as_str()).collect()
    }

    #[tokio::test]
    async fn test_fetch_error_ends_crawl_with_previous_pages() {
        let renderer = ScriptedRenderer::new(vec![
            page_with(&[("/a/1", "1.9.2025"), ("/a/2", "2.9.2025")]),
            page_with(&[("/a/3", "3.9.2025")]),
            Err(FetchError::Timeout(Duration::from_secs(10))),
            page_with(&[("/a/never", "9.9.2025")]),
        ]);
        let requested = renderer.requested();

        let report = Crawler::new(renderer, target(), fast_settings()).run().await;

        assert_eq!(
            report.outcome,
            CrawlOutcome::PageFetchFailed {
                page: 3,
                reason: FetchError::Timeout(Duration::from_secs(10)),
            }
        );
        assert_eq!(report.pages_with_results, 2);
        assert_eq!(
            links(&report),
            vec!["https://yle.fi/a/3", "https://yle.fi/a/2", "https://yle.fi/a/1"]
        );
        assert_eq!(requested.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_first_page_stops_immediately() {
        let renderer = ScriptedRenderer::new(vec![
            empty_page(),
            page_with(&[("/a/1", "1.9.2025")]),
        ]);
        let requested = renderer.requested();

        let report = Crawler::new(renderer, target(), fast_settings()).run().await;

        assert_eq!(report.outcome, CrawlOutcome::FirstPageEmpty);
        assert!(report.records.is_empty());
        assert_eq!(report.pages_with_results, 0);
        assert_eq!(requested.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_later_page_means_exhausted() {
        let renderer = ScriptedRenderer::new(vec![
            page_with(&[("/a/1", "1.9.2025")]),
            empty_page(),
        ]);

        let report = Crawler::new(renderer, target(), fast_settings()).run().await;

        assert_eq!(report.outcome, CrawlOutcome::Exhausted { page: 2 });
        assert_eq!(links(&report), vec!["https://yle.fi/a/1"]);
    }

    #[tokio::test]
    async fn test_pages_are_requested_in_order_without_gaps() {
        let renderer = ScriptedRenderer::new(vec![
            page_with(&[("/a/1", "1.9.2025")]),
            page_with(&[("/a/2", "2.9.2025")]),
            page_with(&[("/a/3", "3.9.2025")]),
            page_with(&[("/a/4", "4.9.2025")]),
        ]);
        let requested = renderer.requested();

        let report = Crawler::new(renderer, target(), fast_settings()).run().await;

        let expected: Vec<String> = (1..=5).map(|page| target().page_url(page)).collect();
        assert_eq!(*requested.lock().unwrap(), expected);
        assert_eq!(report.pages_with_results, 4);
        assert!(matches!(
            report.outcome,
            CrawlOutcome::PageFetchFailed { page: 5, .. }
        ));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_fetches_nothing() {
        let renderer = ScriptedRenderer::new(vec![page_with(&[("/a/1", "1.9.2025")])]);
        let requested = renderer.requested();
        let token = CancellationToken::new();
        token.cancel();

        let report = Crawler::new(renderer, target(), fast_settings())
            .with_cancellation(token)
            .run()
            .await;

        assert_eq!(report.outcome, CrawlOutcome::Cancelled { page: 1 });
        assert!(report.records.is_empty());
        assert!(requested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_keeps_accumulated_records() {
        let token = CancellationToken::new();
        let mut renderer = ScriptedRenderer::new(vec![
            page_with(&[("/a/1", "1.9.2025")]),
            page_with(&[("/a/2", "2.9.2025")]),
            page_with(&[("/a/3", "3.9.2025")]),
        ]);
        renderer.cancel_on_call = Some((1, token.clone()));
        let requested = renderer.requested();

        // The token fires while page 1 renders, so the hour-long delay must be cut short.
        let settings = CrawlSettings {
            page_delay: Duration::from_secs(3600),
            ..CrawlSettings::default()
        };
        let report = tokio::time::timeout(
            Duration::from_secs(5),
            Crawler::new(renderer, target(), settings)
                .with_cancellation(token)
                .run(),
        )
        .await
        .expect("cancellation should interrupt the page delay");

        assert_eq!(report.outcome, CrawlOutcome::Cancelled { page: 2 });
        assert_eq!(links(&report), vec!["https://yle.fi/a/1"]);
        assert_eq!(requested.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_undated_records_sort_after_dated_ones() {
        let renderer = ScriptedRenderer::new(vec![
            page_with(&[("/a/old", "1.1.2024"), ("/a/undated", "eilen")]),
            page_with(&[("/a/new", "30.9.2025"), ("/a/mid", "15.6.2025")]),
        ]);

        let report = Crawler::new(renderer, target(), fast_settings()).run().await;

        assert_eq!(
            links(&report),
            vec![
                "https://yle.fi/a/new",
                "https://yle.fi/a/mid",
                "https://yle.fi/a/old",
                "https://yle.fi/a/undated",
            ]
        );
        assert_eq!(report.records[3].published_at, EARLIEST);
    }

    fn bare(link: &str, published_at: DateTime<Utc>) -> Record {
        Record {
            title: link.to_string(),
            link: link.to_string(),
            raw_date_text: String::new(),
            published_at,
            display_date: String::new(),
            guid: link.to_string(),
        }
    }

    #[test]
    fn test_sort_is_descending_and_stable() {
        let early = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let mut records = vec![
            bare("a", EARLIEST),
            bare("b", early),
            bare("c", late),
            bare("d", EARLIEST),
            bare("e", early),
        ];

        sort_newest_first(&mut records);

        let order: Vec<&str> = records.iter().map(|r| r.link.as_str()).collect();
        assert_eq!(order, vec!["c", "b", "e", "a", "d"]);
    }

    #[test]
    fn test_session_starts_at_page_one() {
        let session = CrawlSession::new();
        assert_eq!(session.page(), 1);
        let report = session.finish(CrawlOutcome::FirstPageEmpty);
        assert_eq!(report.pages_with_results, 0);
    }
}
