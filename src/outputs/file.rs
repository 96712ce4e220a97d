//! Local persistence of the generated feed.
//!
//! The feed is written as a single file at the configured path. Parent
//! directories are created on demand and an existing file is replaced.

use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument};

/// Write the serialized feed to `path`, creating parent directories.
///
/// # Errors
///
/// Returns an error if directory creation or file writing fails.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_feed(path: &Path, xml: &[u8]) -> Result<(), Box<dyn Error>> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create output directory");
            return Err(e.into());
        }
    }

    fs::write(path, xml).await?;
    info!(bytes = xml.len(), "Wrote RSS feed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_feed_creates_parent_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("feeds").join("yle").join("susi.xml");

        write_feed(&path, b"<rss/>").await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"<rss/>");
    }

    #[tokio::test]
    async fn test_write_feed_replaces_existing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("susi.xml");
        std::fs::write(&path, "old content that is longer").unwrap();

        write_feed(&path, b"new").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }

    #[tokio::test]
    async fn test_write_feed_fails_when_parent_is_a_file() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();

        let result = write_feed(&blocker.join("susi.xml"), b"<rss/>").await;
        assert!(result.is_err());
    }
}
