//! Download, extract and record paks.

mod extract;

pub use extract::{extract_archive, ExtractReport};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use pakstore_domain::{find_record, IgnoreSet, InstalledRecord, Pak, PakType};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::error::{PakStoreError, Result};
use crate::net::{DownloadMonitor, DownloadStatus, Transport};
use crate::store::LocalStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallMode {
    Install,
    Update,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InstallOutcome {
    Completed {
        mode: InstallMode,
        version: String,
        destination: PathBuf,
        skipped: Vec<String>,
        /// The storefront replaced itself; the running binary is stale.
        store_updated: bool,
    },
    Cancelled,
}

/// Where paks land on the device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstallLayout {
    pub shared_root: PathBuf,
    pub tools_root: PathBuf,
    pub emus_root: PathBuf,
}

impl InstallLayout {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            shared_root: settings.sd_root.clone(),
            tools_root: settings.tools_root.clone(),
            emus_root: settings.emus_root.clone(),
        }
    }

    fn type_dir(&self, pak_type: PakType, name: &str) -> PathBuf {
        let root = match pak_type {
            PakType::Tool => &self.tools_root,
            PakType::Emulator => &self.emus_root,
        };
        root.join(format!("{name}.pak"))
    }

    /// Extraction root for `pak`: bundles unpack into the shared root.
    pub fn destination(&self, pak: &Pak) -> PathBuf {
        if pak.is_bundle() {
            self.shared_root.clone()
        } else {
            self.type_dir(pak.pak_type, &pak.name)
        }
    }

    /// Directory removed when `record` is uninstalled.
    pub fn installed_dir(&self, record: &InstalledRecord) -> PathBuf {
        self.type_dir(record.pak_type, &record.name)
    }
}

#[derive(Debug)]
pub struct BatchFailure {
    pub pak: String,
    pub error: PakStoreError,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub updated: Vec<String>,
    pub failed: Vec<BatchFailure>,
    /// Paks never attempted because the batch stopped early.
    pub not_attempted: Vec<String>,
    pub cancelled: bool,
    pub store_updated: bool,
}

impl BatchReport {
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty() || !self.not_attempted.is_empty()
    }
}

#[derive(Debug)]
pub struct UninstallOutcome {
    pub removed: PathBuf,
    /// The record is forgotten even when its directory could not be removed.
    pub removal_error: Option<io::Error>,
}

pub struct Installer<'a> {
    transport: &'a dyn Transport,
    store: &'a dyn LocalStore,
    layout: InstallLayout,
    download_dir: PathBuf,
}

impl<'a> Installer<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        store: &'a dyn LocalStore,
        layout: InstallLayout,
        download_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            transport,
            store,
            layout,
            download_dir: download_dir.into(),
        }
    }

    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    /// Install `pak` fresh, or update the record it matches.
    ///
    /// The installation record is only written after extraction succeeds;
    /// a cancelled download has no side effects.
    pub fn install_or_update(
        &self,
        pak: &Pak,
        mode: InstallMode,
        monitor: &dyn DownloadMonitor,
    ) -> Result<InstallOutcome> {
        let existing = match mode {
            InstallMode::Install => None,
            InstallMode::Update => {
                let records = self.store.list_installed()?;
                let (idx, rule) = find_record(pak, &records)
                    .ok_or_else(|| PakStoreError::NotFound(pak.display_name.clone()))?;
                info!(pak = %pak.display_name, match_reason = rule.as_str(), "updating installed pak");
                Some(records[idx].clone())
            }
        };

        fs::create_dir_all(&self.download_dir).map_err(PakStoreError::io(&self.download_dir))?;
        let staging = tempfile::Builder::new()
            .prefix("pakstore-")
            .tempdir_in(&self.download_dir)
            .map_err(PakStoreError::io(&self.download_dir))?;
        let archive = staging.path().join(archive_filename(pak));
        let url = pak.release_url();
        info!(pak = %pak.display_name, version = %pak.version, %url, "downloading");
        if self.transport.download_to(&url, &archive, monitor)? == DownloadStatus::Cancelled {
            info!(pak = %pak.display_name, "download cancelled by user");
            return Ok(InstallOutcome::Cancelled);
        }

        let destination = self.layout.destination(pak);
        let ignore = match mode {
            InstallMode::Update if !pak.update_ignore.is_empty() => {
                Some(IgnoreSet::new(&pak.update_ignore))
            }
            _ => None,
        };
        let report = extract_archive(&archive, &destination, ignore.as_ref())?;

        match existing {
            None => self.store.install(&InstalledRecord::from_pak(pak))?,
            Some(record) => {
                let repo_url = Some(pak.repo_url.as_str()).filter(|url| !url.is_empty());
                self.store
                    .update_version(&record.key(), &pak.version, repo_url)?;
            }
        }
        info!(
            pak = %pak.display_name,
            version = %pak.version,
            destination = %destination.display(),
            files = report.written,
            "installed"
        );
        Ok(InstallOutcome::Completed {
            mode,
            version: pak.version.clone(),
            destination,
            skipped: report.skipped,
            store_updated: pak.is_pak_store(),
        })
    }

    /// Update every pak in `paks`, in order.
    ///
    /// A failing pak is recorded and the batch moves on. Cancelling any
    /// download stops the batch, as does a successful self-update.
    pub fn update_all<M, F>(&self, paks: &[Pak], mut monitor_for: F) -> BatchReport
    where
        M: DownloadMonitor,
        F: FnMut(&Pak) -> M,
    {
        let mut report = BatchReport::default();
        for (idx, pak) in paks.iter().enumerate() {
            let monitor = monitor_for(pak);
            match self.install_or_update(pak, InstallMode::Update, &monitor) {
                Ok(InstallOutcome::Completed { store_updated, .. }) => {
                    report.updated.push(pak.display_name.clone());
                    if store_updated {
                        report.store_updated = true;
                        remaining(&mut report, &paks[idx + 1..]);
                        break;
                    }
                }
                Ok(InstallOutcome::Cancelled) => {
                    report.cancelled = true;
                    remaining(&mut report, &paks[idx..]);
                    break;
                }
                Err(err) => {
                    error!(pak = %pak.display_name, error = %err, "update failed, continuing");
                    report.failed.push(BatchFailure {
                        pak: pak.display_name.clone(),
                        error: err,
                    });
                }
            }
        }
        report
    }

    /// Remove an installed pak's directory and forget its record.
    pub fn uninstall(&self, record: &InstalledRecord) -> Result<UninstallOutcome> {
        if !record.can_uninstall {
            return Err(PakStoreError::NotUninstallable(record.display_name.clone()));
        }
        let dir = self.layout.installed_dir(record);
        let removal_error = match fs::remove_dir_all(&dir) {
            Ok(()) => None,
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => {
                warn!(pak = %record.display_name, dir = %dir.display(), error = %err, "failed to remove pak directory");
                Some(err)
            }
        };
        self.store.uninstall(&record.key())?;
        info!(pak = %record.display_name, "uninstalled");
        Ok(UninstallOutcome {
            removed: dir,
            removal_error,
        })
    }
}

fn remaining(report: &mut BatchReport, paks: &[Pak]) {
    report
        .not_attempted
        .extend(paks.iter().map(|pak| pak.display_name.clone()));
}

fn archive_filename(pak: &Pak) -> String {
    let file_name = Path::new(&pak.release_filename)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty());
    match file_name {
        Some(name) => name.to_string(),
        None => format!("{}.zip", pak.name),
    }
}
