//! Output generation and delivery for the finished feed.
//!
//! # Submodules
//!
//! - [`rss`]: Builds the RSS 2.0 document from crawled records and serializes it
//! - [`file`]: Writes the serialized feed to the configured local path
//! - [`gcs`]: Optionally uploads the written feed to a Cloud Storage bucket
//!
//! # Output
//!
//! ```text
//! output_file_path            # e.g. ~/feeds/kansallispuisto.xml
//! gs://<GCSBucket>/<query>.xml  # only when useGCS is true
//! ```

pub mod file;
pub mod gcs;
pub mod rss;
