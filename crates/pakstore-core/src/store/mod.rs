//! Durable record of installed paks.

mod sqlite;

pub use sqlite::SqliteStore;

use pakstore_domain::{IdentityFields, InstalledRecord, RecordKey};

use crate::error::Result;

/// Installation records consumed by the reconciler, installer and the
/// migration routines.
///
/// Only the foreground operation writes, so implementations need no
/// concurrent-write protocol.
pub trait LocalStore {
    fn list_installed(&self) -> Result<Vec<InstalledRecord>>;

    fn install(&self, record: &InstalledRecord) -> Result<()>;

    /// Update version and source URL only; names and identifier stay.
    fn update_version(&self, key: &RecordKey, version: &str, repo_url: Option<&str>) -> Result<()>;

    fn uninstall(&self, key: &RecordKey) -> Result<()>;

    /// Rewrite identifier, names and source URL in one statement.
    fn update_identity_fields(&self, key: &RecordKey, fields: &IdentityFields) -> Result<()>;

    fn list_without_identifier(&self) -> Result<Vec<InstalledRecord>> {
        Ok(self
            .list_installed()?
            .into_iter()
            .filter(|record| record.identifier().is_none())
            .collect())
    }

    fn list_with_identifier(&self) -> Result<Vec<InstalledRecord>> {
        Ok(self
            .list_installed()?
            .into_iter()
            .filter(|record| record.identifier().is_some())
            .collect())
    }
}
