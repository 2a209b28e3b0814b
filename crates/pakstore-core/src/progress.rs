use std::env;
use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::net::DownloadMonitor;

const UNKNOWN_TOTAL: u64 = 0;

pub fn progress_enabled() -> bool {
    match env::var("PAKSTORE_PROGRESS") {
        Ok(value) => value != "0",
        Err(_) => io::stderr().is_terminal(),
    }
}

/// Stderr spinner for a single download, doubling as its
/// [`DownloadMonitor`].
pub struct ProgressReporter {
    written: Arc<AtomicU64>,
    total: Arc<AtomicU64>,
    cancel: Arc<AtomicBool>,
    stop: Option<Arc<AtomicBool>>,
    handle: Option<thread::JoinHandle<()>>,
    enabled: bool,
}

impl ProgressReporter {
    pub fn download(label: impl Into<String>) -> Self {
        let label = label.into();
        let written = Arc::new(AtomicU64::new(0));
        let total = Arc::new(AtomicU64::new(UNKNOWN_TOTAL));
        let cancel = Arc::new(AtomicBool::new(false));
        if !progress_enabled() {
            return Self {
                written,
                total,
                cancel,
                stop: None,
                handle: None,
                enabled: false,
            };
        }

        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let thread_written = Arc::clone(&written);
        let thread_total = Arc::clone(&total);
        let handle = thread::spawn(move || {
            ProgressReporter::run(&label, &thread_written, &thread_total, &thread_stop);
        });

        Self {
            written,
            total,
            cancel,
            stop: Some(stop),
            handle: Some(handle),
            enabled: true,
        }
    }

    /// Flag that makes the in-flight download stop at its next chunk.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn finish(mut self, message: impl Into<String>) {
        self.clear();
        eprintln!("pakstore ▸ {}", message.into());
    }

    fn clear(&mut self) {
        if self.enabled {
            if let Some(stop) = self.stop.take() {
                stop.store(true, AtomicOrdering::Relaxed);
            }
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
            let _ = io::stderr().write_all(b"\r\x1b[2K");
            let _ = io::stderr().flush();
        }
    }

    fn run(label: &str, written: &AtomicU64, total: &AtomicU64, stop: &AtomicBool) {
        const FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
        let mut idx = 0;
        while !stop.load(AtomicOrdering::Relaxed) {
            let frame = FRAMES[idx % FRAMES.len()];
            idx += 1;
            let kib = written.load(AtomicOrdering::Relaxed) / 1024;
            let line = match total.load(AtomicOrdering::Relaxed) {
                UNKNOWN_TOTAL => format!("\r\x1b[2Kpakstore ▸ {label} {kib} KiB {frame}"),
                total => {
                    let total_kib = (total / 1024).max(1);
                    format!("\r\x1b[2Kpakstore ▸ {label} [{kib}/{total_kib} KiB] {frame}")
                }
            };
            let _ = io::stderr().write_all(line.as_bytes());
            let _ = io::stderr().flush();
            thread::sleep(Duration::from_millis(80));
        }
    }
}

impl DownloadMonitor for ProgressReporter {
    fn started(&self, total: Option<u64>) {
        self.written.store(0, AtomicOrdering::Relaxed);
        self.total
            .store(total.unwrap_or(UNKNOWN_TOTAL), AtomicOrdering::Relaxed);
    }

    fn advanced(&self, written: u64) {
        self.written.store(written, AtomicOrdering::Relaxed);
    }

    fn cancel_requested(&self) -> bool {
        self.cancel.load(AtomicOrdering::Relaxed)
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn cancel_handle_reaches_monitor() {
        env::set_var("PAKSTORE_PROGRESS", "0");
        let reporter = ProgressReporter::download("Thing");
        assert!(!reporter.cancel_requested());
        reporter.cancel_handle().store(true, AtomicOrdering::Relaxed);
        assert!(reporter.cancel_requested());
        env::remove_var("PAKSTORE_PROGRESS");
    }
}
