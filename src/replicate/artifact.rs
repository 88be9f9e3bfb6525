//! Artifact download and transient preview file handling.
//!
//! Generated media lives behind provider URLs. The fetcher streams the bytes
//! down; the preview file is a single per-process path that exists only while
//! the bytes are being rendered, with removal guaranteed on drop.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;

use crate::error::{PipelineError, Result};

/// Fixed filename offered for user-initiated saves.
pub const ARTIFACT_FILE_NAME: &str = "animation.mp4";

/// Media type of the saved artifact.
pub const ARTIFACT_MEDIA_TYPE: &str = "video/mp4";

/// Timeout for a full artifact download (120 seconds).
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Connection timeout for artifact requests (10 seconds).
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Directory under the system temp dir that holds preview files.
const PREVIEW_DIR: &str = "prompt-motion";

/// Filename prefix for preview files; the process ID follows.
const PREVIEW_PREFIX: &str = "preview-";

/// Downloads generated media from result URLs.
pub struct ArtifactFetcher {
    http_client: reqwest::Client,
}

impl ArtifactFetcher {
    pub fn new() -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self { http_client })
    }

    /// Download the artifact at `url` into memory.
    ///
    /// The body is streamed chunk by chunk rather than buffered by the HTTP
    /// layer. Only HTTP 200 is accepted; no file is written on failure.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::DownloadFailed` carrying the status code for a
    /// non-200 response, or `PipelineError::Upstream` for transport failures.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.http_client.get(url).send().await?;

        let status = response.status();
        if status.as_u16() != 200 {
            log::warn!("artifact download for {} returned status {}", url, status);
            return Err(PipelineError::DownloadFailed(status.as_u16()));
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            bytes.extend_from_slice(&chunk?);
        }

        log::info!("downloaded {} bytes from {}", bytes.len(), url);
        Ok(bytes)
    }

    /// Probe `url` with a metadata-only HEAD request.
    ///
    /// Returns false when the link looks dead. Some providers reject HEAD
    /// outright, so any failure here is advisory - the caller logs and
    /// proceeds.
    pub async fn probe(&self, url: &str) -> bool {
        match self.http_client.head(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                log::warn!("HEAD probe for {} failed: {}", url, err);
                false
            }
        }
    }
}

/// Scoped handle for the per-process preview file.
///
/// The file exists for exactly as long as the handle lives; `Drop` removes it,
/// so early returns and errors cannot leak it.
#[derive(Debug)]
pub struct PreviewFile {
    path: PathBuf,
}

impl PreviewFile {
    /// The preview path for this process. Fixed per process, not per request.
    pub fn process_path() -> PathBuf {
        std::env::temp_dir()
            .join(PREVIEW_DIR)
            .join(format!("{}{}.mp4", PREVIEW_PREFIX, std::process::id()))
    }

    /// Remove preview files left behind by earlier runs.
    ///
    /// Called once at process start. Returns the number of files removed.
    pub fn purge_stale() -> Result<usize> {
        let dir = std::env::temp_dir().join(PREVIEW_DIR);
        if !dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(PREVIEW_PREFIX)
                && name.ends_with(".mp4")
                && std::fs::remove_file(entry.path()).is_ok()
            {
                log::debug!("purged stale preview {}", entry.path().display());
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Write `bytes` to the process preview path and return the guard.
    pub fn write(bytes: &[u8]) -> Result<Self> {
        Self::write_at(Self::process_path(), bytes)
    }

    /// Write `bytes` to an explicit path and return the guard.
    pub fn write_at(path: PathBuf, bytes: &[u8]) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, bytes)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PreviewFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_process_path_is_per_process() {
        let path = PreviewFile::process_path();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(PREVIEW_PREFIX));
        assert!(name.contains(&std::process::id().to_string()));
        assert!(name.ends_with(".mp4"));
        assert!(path.to_string_lossy().contains(PREVIEW_DIR));
    }

    #[test]
    fn test_process_path_is_stable_within_process() {
        assert_eq!(PreviewFile::process_path(), PreviewFile::process_path());
    }

    #[test]
    fn test_write_at_creates_file_and_drop_removes_it() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("preview-test.mp4");

        {
            let preview = PreviewFile::write_at(path.clone(), b"fake video bytes").unwrap();
            assert!(preview.path().exists());
            assert_eq!(std::fs::read(preview.path()).unwrap(), b"fake video bytes");
        }

        // Guard dropped - file must be gone.
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_tolerates_already_removed_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("preview-gone.mp4");

        let preview = PreviewFile::write_at(path.clone(), b"bytes").unwrap();
        std::fs::remove_file(&path).unwrap();
        drop(preview); // must not panic
    }

    #[test]
    fn test_write_at_overwrites_previous_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("preview-twice.mp4");

        let first = PreviewFile::write_at(path.clone(), b"first").unwrap();
        // Simulate a second generation replacing the preview in place.
        std::mem::forget(first);
        let second = PreviewFile::write_at(path.clone(), b"second").unwrap();
        assert_eq!(std::fs::read(second.path()).unwrap(), b"second");
    }

    #[test]
    fn test_artifact_constants() {
        assert_eq!(ARTIFACT_FILE_NAME, "animation.mp4");
        assert_eq!(ARTIFACT_MEDIA_TYPE, "video/mp4");
    }

    #[tokio::test]
    async fn test_fetch_connection_error_is_upstream() {
        let fetcher = ArtifactFetcher::new().unwrap();
        let result = fetcher.fetch("http://localhost:9/missing.mp4").await;
        assert!(matches!(result, Err(PipelineError::Upstream(_))));
    }

    #[tokio::test]
    async fn test_probe_connection_error_is_false() {
        let fetcher = ArtifactFetcher::new().unwrap();
        assert!(!fetcher.probe("http://localhost:9/missing.mp4").await);
    }
}
