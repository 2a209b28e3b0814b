//! Bring installation records in line with the catalog's identities.
//!
//! Both routines only write when a record actually differs from the catalog,
//! so running them on every start is cheap and idempotent. A failure on one
//! record is logged and skipped.

use std::collections::BTreeSet;

use pakstore_domain::{find_pak, Catalog, IdentityFields, InstalledRecord, MatchRule, LEGACY_RULES};
use tracing::{debug, error, info, warn};

use crate::error::{PakStoreError, Result};
use crate::store::LocalStore;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentityChange {
    pub previous_name: String,
    pub fields: IdentityFields,
    pub matched_by: MatchRule,
}

#[derive(Debug)]
pub struct RecordFailure {
    pub record: String,
    pub error: PakStoreError,
}

#[derive(Debug, Default)]
pub struct MigrationReport {
    pub changes: Vec<IdentityChange>,
    pub failures: Vec<RecordFailure>,
}

impl MigrationReport {
    pub fn writes(&self) -> usize {
        self.changes.len()
    }

    fn merge(&mut self, other: MigrationReport) {
        self.changes.extend(other.changes);
        self.failures.extend(other.failures);
    }
}

/// Assign identifiers to records installed before identifiers existed.
///
/// Records are matched by current URL, previous URL, then display name. A
/// match whose identifier another record already carries is left alone.
pub fn backfill_identifiers(catalog: &Catalog, store: &dyn LocalStore) -> Result<MigrationReport> {
    let mut taken: BTreeSet<String> = store
        .list_with_identifier()?
        .iter()
        .filter_map(|record| record.identifier().map(str::to_string))
        .collect();
    let mut report = MigrationReport::default();

    for record in store.list_without_identifier()? {
        let Some((pak, rule)) = find_pak(&record, &catalog.paks, &LEGACY_RULES) else {
            debug!(record = %record.display_name, "no catalog entry for legacy record");
            continue;
        };
        let fields = IdentityFields::from_pak(pak);
        if let Some(id) = fields.pak_id.as_deref() {
            if taken.contains(id) {
                warn!(record = %record.display_name, pak_id = id, "identifier already assigned, skipping");
                continue;
            }
        }
        if !fields.differs_from(&record) {
            continue;
        }
        let assigned = fields.pak_id.clone();
        if apply(store, &record, fields, rule, &mut report) {
            taken.extend(assigned);
        }
    }
    Ok(report)
}

/// Refresh names and source URL of records that already carry an
/// identifier, following renames published in the catalog.
pub fn sync_metadata_from_catalog(
    catalog: &Catalog,
    store: &dyn LocalStore,
) -> Result<MigrationReport> {
    let mut report = MigrationReport::default();
    for record in store.list_with_identifier()? {
        if record.is_pak_store() {
            continue;
        }
        let Some(pak) = record.identifier().and_then(|id| catalog.find_by_id(id)) else {
            continue;
        };
        let fields = IdentityFields::from_pak(pak);
        if fields.differs_from(&record) {
            apply(store, &record, fields, MatchRule::Identifier, &mut report);
        }
    }
    Ok(report)
}

/// Backfill then sync, as done on every start.
pub fn reconcile_identities(catalog: &Catalog, store: &dyn LocalStore) -> Result<MigrationReport> {
    let mut report = backfill_identifiers(catalog, store)?;
    report.merge(sync_metadata_from_catalog(catalog, store)?);
    Ok(report)
}

fn apply(
    store: &dyn LocalStore,
    record: &InstalledRecord,
    fields: IdentityFields,
    rule: MatchRule,
    report: &mut MigrationReport,
) -> bool {
    match store.update_identity_fields(&record.key(), &fields) {
        Ok(()) => {
            info!(
                record = %record.display_name,
                display_name = %fields.display_name,
                pak_id = fields.pak_id.as_deref().unwrap_or(""),
                repo_url = fields.repo_url.as_deref().unwrap_or(""),
                match_reason = rule.as_str(),
                "updated installed pak identity"
            );
            report.changes.push(IdentityChange {
                previous_name: record.display_name.clone(),
                fields,
                matched_by: rule,
            });
            true
        }
        Err(err) => {
            error!(record = %record.display_name, error = %err, "failed to update installed pak identity");
            report.failures.push(RecordFailure {
                record: record.display_name.clone(),
                error: err,
            });
            false
        }
    }
}
