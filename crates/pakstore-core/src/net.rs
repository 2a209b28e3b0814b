//! HTTP transport for catalog, archive and screenshot fetches.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{PakStoreError, Result};

const USER_AGENT: &str = concat!("pakstore/", env!("CARGO_PKG_VERSION"));
const HTTP_TIMEOUT: Duration = Duration::from_secs(120);
const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DownloadStatus {
    Completed { bytes: u64 },
    Cancelled,
}

/// Observes a download and may stop it between chunks.
pub trait DownloadMonitor {
    fn started(&self, _total: Option<u64>) {}

    fn advanced(&self, _written: u64) {}

    fn cancel_requested(&self) -> bool {
        false
    }
}

/// Monitor that reports nothing and never cancels.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unmonitored;

impl DownloadMonitor for Unmonitored {}

pub trait Transport: Send + Sync {
    /// Fetch `url` fully into memory.
    fn get(&self, url: &str) -> Result<Vec<u8>>;

    /// Stream `url` into `dest`. Nothing is left at `dest` unless the
    /// download completes.
    fn download_to(&self, url: &str, dest: &Path, monitor: &dyn DownloadMonitor)
        -> Result<DownloadStatus>;
}

#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|err| PakStoreError::network("<client>", err))?;
        Ok(Self { client })
    }

    fn send(&self, url: &str) -> Result<reqwest::blocking::Response> {
        debug!(%url, "GET");
        self.client
            .get(url)
            .send()
            .map_err(|err| PakStoreError::network(url, err))?
            .error_for_status()
            .map_err(|err| PakStoreError::network(url, err))
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.send(url)?;
        let bytes = response
            .bytes()
            .map_err(|err| PakStoreError::network(url, err))?;
        Ok(bytes.to_vec())
    }

    fn download_to(
        &self,
        url: &str,
        dest: &Path,
        monitor: &dyn DownloadMonitor,
    ) -> Result<DownloadStatus> {
        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(PakStoreError::io(parent))?;

        let mut response = self.send(url)?;
        monitor.started(response.content_length());

        let mut tmp = NamedTempFile::new_in(parent).map_err(PakStoreError::io(parent))?;
        let mut buffer = vec![0_u8; CHUNK_SIZE];
        let mut written: u64 = 0;
        loop {
            if monitor.cancel_requested() {
                warn!(%url, written, "download cancelled");
                return Ok(DownloadStatus::Cancelled);
            }
            let read = response
                .read(&mut buffer)
                .map_err(|err| PakStoreError::network(url, err))?;
            if read == 0 {
                break;
            }
            tmp.write_all(&buffer[..read])
                .map_err(PakStoreError::io(tmp.path()))?;
            written += read as u64;
            monitor.advanced(written);
        }

        tmp.persist(dest)
            .map_err(|err| PakStoreError::io(dest)(err.error))?;
        debug!(%url, bytes = written, dest = %dest.display(), "download complete");
        Ok(DownloadStatus::Completed { bytes: written })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use httptest::{matchers::request, responders::status_code, Expectation, Server};

    struct CancelImmediately(AtomicBool);

    impl DownloadMonitor for CancelImmediately {
        fn cancel_requested(&self) -> bool {
            self.0.store(true, Ordering::Relaxed);
            true
        }
    }

    #[test]
    fn get_returns_body_and_rejects_error_status() -> anyhow::Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/ok"))
                .respond_with(status_code(200).body("hello")),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", "/missing"))
                .respond_with(status_code(404)),
        );
        let transport = HttpTransport::new()?;

        assert_eq!(transport.get(&server.url_str("/ok"))?, b"hello");
        let err = transport
            .get(&server.url_str("/missing"))
            .expect_err("404 should fail");
        assert!(matches!(err, PakStoreError::Network { .. }));
        Ok(())
    }

    #[test]
    fn download_writes_destination_only_on_completion() -> anyhow::Result<()> {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/pak.zip"))
                .times(2)
                .respond_with(status_code(200).body("archive-bytes")),
        );
        let temp = tempfile::tempdir()?;
        let dest = temp.path().join("downloads").join("pak.zip");
        let transport = HttpTransport::new()?;
        let url = server.url_str("/pak.zip");

        let monitor = CancelImmediately(AtomicBool::new(false));
        assert_eq!(
            transport.download_to(&url, &dest, &monitor)?,
            DownloadStatus::Cancelled
        );
        assert!(monitor.0.load(Ordering::Relaxed));
        assert!(!dest.exists());

        let status = transport.download_to(&url, &dest, &Unmonitored)?;
        assert_eq!(status, DownloadStatus::Completed { bytes: 13 });
        assert_eq!(fs::read(&dest)?, b"archive-bytes");
        Ok(())
    }
}
