//! # Yle Search RSS
//!
//! Turns a Yle search into an RSS feed. The search site renders its results
//! with JavaScript and offers no feed of its own, so every results page is
//! loaded in a headless browser, scraped, and the collected articles are
//! published as RSS 2.0.
//!
//! ## Usage
//!
//! ```sh
//! yle_search_rss -c config.json
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Configuration**: Load and validate the feed's config file
//! 2. **Crawling**: Render result pages 1, 2, 3, ... until the results run out
//! 3. **Extraction**: Pull title, link, and date out of each article block
//! 4. **Ordering**: Sort everything newest first; undated articles go last
//! 5. **Output**: Write the RSS file and optionally upload it to Cloud Storage

use clap::Parser;
use std::error::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod browser;
mod cli;
mod config;
mod crawl;
mod dates;
mod models;
mod outputs;
mod scrapers;
mod utils;

use browser::ChromeRenderer;
use cli::Cli;
use config::Config;
use crawl::{CrawlSettings, Crawler};
use outputs::gcs::{Credentials, GcsUploader};
use outputs::{file, rss};
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("yle_search_rss starting up");

    let args = Cli::parse();
    debug!(?args.config, ?args.output, args.no_upload, "Parsed CLI arguments");

    // ---- Configuration ----
    let mut config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!(path = %args.config.display(), error = %e, "Failed to load config");
            return Err(e.into());
        }
    };
    if let Some(output) = args.output {
        config.output_file_path = output;
        config.validate()?;
    }
    if args.no_upload {
        config.use_gcs = false;
    }

    let output_path = config.output_path()?;
    let credentials = if config.use_gcs {
        match Credentials::from_env() {
            Ok(credentials) => Some(credentials),
            Err(e) => {
                error!(error = %e, "Opted for GCS upload but no credentials were provided");
                return Err(e.into());
            }
        }
    } else {
        None
    };
    info!(use_gcs = config.use_gcs, "GCS upload setting");

    // Early check: fail before crawling if the feed could not be written anyway
    if let Some(dir) = output_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(
                path = %dir.display(),
                error = %e,
                "Output directory is not writable (fix perms or choose a different path)"
            );
            return Err(e);
        }
    }

    // ---- Crawl ----
    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; finishing after the current page");
            on_ctrl_c.cancel();
        }
    });

    let target = config.search_target();
    let crawler = Crawler::new(
        ChromeRenderer::new(args.chrome),
        target.clone(),
        CrawlSettings::default(),
    )
    .with_cancellation(cancel);
    let report = crawler.run().await;

    if report.records.is_empty() {
        info!("No articles found.");
    } else {
        let undated = report.records.iter().filter(|r| !r.has_parsed_date()).count();
        info!(total = report.records.len(), undated, "Total articles");
    }

    // ---- Feed ----
    let feed = rss::synthesize(&report.records, &target.origin_url(), &config.search_query);
    let xml = match rss::to_xml(&feed) {
        Ok(xml) => xml,
        Err(e) => {
            error!(error = %e, "Error serializing RSS feed");
            return Err(e);
        }
    };

    if let Err(e) = file::write_feed(&output_path, xml.as_bytes()).await {
        error!(path = %output_path.display(), error = %e, "Error writing RSS file");
        return Err(e);
    }
    info!(path = %output_path.display(), items = feed.channel.items.len(), "RSS feed saved");

    // ---- Upload ----
    match credentials {
        Some(credentials) => {
            let object_name = config.object_name();
            info!(bucket = %config.gcs_bucket, object = %object_name, "GCS option is ON; uploading");
            let uploader = GcsUploader::new(credentials);
            if let Err(e) = uploader
                .upload_file(&output_path, &config.gcs_bucket, &object_name)
                .await
            {
                error!(bucket = %config.gcs_bucket, error = %e, "Upload failed");
                return Err(e.into());
            }
        }
        None => info!(
            path = %output_path.display(),
            "GCS option is OFF; not uploading. Local file is kept"
        ),
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        outcome = ?report.outcome,
        "Execution complete"
    );

    Ok(())
}
