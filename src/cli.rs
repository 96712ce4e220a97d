//! Command-line interface definitions for the Yle search feed generator.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Everything describing *what* to crawl lives in the config file; the flags
//! here only choose that file and override where the result goes.

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the Yle search feed generator.
///
/// # Examples
///
/// ```sh
/// # Use ./config.json
/// yle_search_rss
///
/// # Alternate config, write locally only
/// yle_search_rss -c feeds/susi.yaml --no-upload
///
/// # Override the output file and the browser binary
/// yle_search_rss -o /srv/rss/susi.xml --chrome /usr/bin/chromium
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the JSON or YAML config file
    #[arg(short, long, env = "YLE_RSS_CONFIG", default_value = "config.json")]
    pub config: PathBuf,

    /// Write the feed here instead of the config's output_file_path
    #[arg(short, long)]
    pub output: Option<String>,

    /// Skip the Google Cloud Storage upload even if the config enables it
    #[arg(long)]
    pub no_upload: bool,

    /// Chrome/Chromium executable to drive (autodetected when omitted)
    #[arg(long, env = "CHROME_PATH")]
    pub chrome: Option<PathBuf>,
}
