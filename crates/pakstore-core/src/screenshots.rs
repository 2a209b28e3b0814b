//! Screenshot prefetch for a pak's detail view.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Mutex};
use std::thread;

use pakstore_domain::Pak;
use tracing::{debug, error};

use crate::error::{PakStoreError, Result};
use crate::net::Transport;

pub const SCREENSHOT_WORKERS: usize = 4;
const ATTEMPTS: usize = 2;

const GITHUB_ROOT: &str = "https://github.com/";
const RAW_CONTENT_ROOT: &str = "https://raw.githubusercontent.com/";
const MAIN_REF: &str = "/refs/heads/main/";

/// Raw-content URL of a screenshot path published in the manifest.
pub fn screenshot_url(pak: &Pak, screenshot: &str) -> String {
    let uri = format!(
        "{}{MAIN_REF}{}",
        pak.repo_url.trim_end_matches('/'),
        screenshot.trim_start_matches('/')
    );
    uri.replace(GITHUB_ROOT, RAW_CONTENT_ROOT)
}

/// Download every screenshot of `pak` into `dest_dir`.
///
/// At most [`SCREENSHOT_WORKERS`] transfers run at once and each gets one
/// retry. Failed screenshots are dropped; the rest keep manifest order.
pub fn fetch_screenshots(transport: &dyn Transport, pak: &Pak, dest_dir: &Path) -> Result<Vec<PathBuf>> {
    if pak.screenshots.is_empty() {
        return Ok(Vec::new());
    }
    fs::create_dir_all(dest_dir).map_err(PakStoreError::io(dest_dir))?;

    let (job_tx, job_rx) = mpsc::channel();
    for job in pak.screenshots.iter().enumerate() {
        // The receiver is alive until the end of this function.
        let _ = job_tx.send(job);
    }
    drop(job_tx);

    let job_rx = Mutex::new(job_rx);
    let (result_tx, result_rx) = mpsc::channel();
    let worker_count = SCREENSHOT_WORKERS.min(pak.screenshots.len());

    thread::scope(|scope| {
        for _ in 0..worker_count {
            let job_rx = &job_rx;
            let result_tx = result_tx.clone();
            scope.spawn(move || loop {
                let (index, screenshot) = {
                    let Ok(guard) = job_rx.lock() else { break };
                    match guard.recv() {
                        Ok(job) => job,
                        Err(_) => break,
                    }
                };
                let url = screenshot_url(pak, screenshot);
                let dest = dest_dir.join(local_name(index, screenshot));
                let outcome = download_with_retry(transport, &url, &dest);
                if result_tx.send((index, outcome)).is_err() {
                    break;
                }
            });
        }
        drop(result_tx);
    });

    let mut slots: Vec<Option<PathBuf>> = vec![None; pak.screenshots.len()];
    for (index, outcome) in result_rx {
        slots[index] = outcome;
    }
    Ok(slots.into_iter().flatten().collect())
}

fn download_with_retry(transport: &dyn Transport, url: &str, dest: &Path) -> Option<PathBuf> {
    for attempt in 1..=ATTEMPTS {
        match download_once(transport, url, dest) {
            Ok(()) => {
                debug!(%url, "screenshot downloaded");
                return Some(dest.to_path_buf());
            }
            Err(err) => error!(%url, attempt, error = %err, "failed to download screenshot"),
        }
    }
    None
}

fn download_once(transport: &dyn Transport, url: &str, dest: &Path) -> Result<()> {
    let bytes = transport.get(url)?;
    if bytes.is_empty() {
        return Err(PakStoreError::network(url, "empty response"));
    }
    fs::write(dest, bytes).map_err(PakStoreError::io(dest))
}

fn local_name(index: usize, screenshot: &str) -> String {
    let base = Path::new(screenshot)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("screenshot");
    format!("{index:02}-{base}")
}
