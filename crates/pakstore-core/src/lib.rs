#![deny(clippy::all, warnings)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::module_name_repetitions
)]

pub mod catalog;
pub mod config;
pub mod error;
pub mod install;
pub mod migration;
pub mod net;
pub mod progress;
pub mod screenshots;
pub mod session;
pub mod store;

pub use pakstore_domain as domain;

pub use catalog::{fetch_catalog, CatalogSource};
pub use config::{EnvSnapshot, Settings, UserConfig};
pub use error::{PakStoreError, Result};
pub use install::{
    BatchFailure, BatchReport, InstallLayout, InstallMode, InstallOutcome, Installer,
    UninstallOutcome,
};
pub use migration::{
    backfill_identifiers, reconcile_identities, sync_metadata_from_catalog, MigrationReport,
};
pub use net::{DownloadMonitor, DownloadStatus, HttpTransport, Transport, Unmonitored};
pub use progress::ProgressReporter;
pub use session::{reconcile, Session};
pub use store::{LocalStore, SqliteStore};
