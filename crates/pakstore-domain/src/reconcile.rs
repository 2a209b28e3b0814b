use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::identity::{assign_records, MatchRule};
use crate::model::{Catalog, InstalledRecord, Pak};
use crate::version::has_update;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformFilter {
    #[default]
    MatchDevice,
    All,
}

impl PlatformFilter {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PlatformFilter::MatchDevice => "match_device",
            PlatformFilter::All => "all",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "match_device" | "" => Some(PlatformFilter::MatchDevice),
            "all" => Some(PlatformFilter::All),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcileOptions {
    pub filter: PlatformFilter,
    pub platform: String,
}

impl ReconcileOptions {
    fn admits(&self, pak: &Pak) -> bool {
        match self.filter {
            PlatformFilter::All => true,
            PlatformFilter::MatchDevice => pak.supports_platform(&self.platform),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PendingUpdate {
    pub identity: String,
    pub installed_version: String,
    pub matched_by: MatchRule,
    pub pak: Pak,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CurrentInstall {
    pub identity: String,
    pub matched_by: MatchRule,
    pub pak: Pak,
}

/// Views derived from one catalog and one snapshot of the installation
/// store. Rebuilt from scratch on every refresh.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DerivedState {
    /// Every installed record except the storefront's own, keyed by the
    /// display form of [`InstalledRecord::key`]. Rows sharing a key are one
    /// installation to the store, and the last of them is kept.
    pub installed_by_identity: BTreeMap<String, InstalledRecord>,
    /// Paks no installed record belongs to, by category, then display name.
    /// Installed paks are only ever listed in `updates_available` or
    /// `up_to_date`.
    pub browse_by_category: BTreeMap<String, BTreeMap<String, Pak>>,
    /// Installed paks with a newer catalog version, sorted by display name.
    pub updates_available: Vec<PendingUpdate>,
    /// Installed paks already at the catalog version, keyed by identity.
    pub up_to_date: BTreeMap<String, CurrentInstall>,
    /// Records no visible catalog entry claimed.
    pub orphaned: Vec<InstalledRecord>,
}

impl DerivedState {
    #[must_use]
    pub fn update_paks(&self) -> Vec<&Pak> {
        self.updates_available.iter().map(|update| &update.pak).collect()
    }

    #[must_use]
    pub fn categories(&self) -> Vec<&str> {
        self.browse_by_category.keys().map(String::as_str).collect()
    }

    #[must_use]
    pub fn has_available(&self) -> bool {
        self.browse_by_category.values().any(|paks| !paks.is_empty())
    }
}

/// Combine a catalog with the installed records.
///
/// Disabled entries, the storefront's own entry, and entries the platform
/// filter rejects are dropped before matching. Records are paired with the
/// remaining entries by [`assign_records`], so each record belongs to at
/// most one entry and identifier matches are settled before URL or name
/// matches.
#[must_use]
pub fn derive_state(
    catalog: &Catalog,
    installed: &[InstalledRecord],
    options: &ReconcileOptions,
) -> DerivedState {
    let records: Vec<InstalledRecord> = installed
        .iter()
        .filter(|record| !record.is_pak_store())
        .cloned()
        .collect();
    let visible: Vec<&Pak> = catalog
        .paks
        .iter()
        .filter(|pak| !pak.disabled && !pak.is_pak_store() && options.admits(pak))
        .collect();
    let assigned = assign_records(&visible, &records);
    let mut claimed = vec![false; records.len()];
    let mut state = DerivedState::default();

    for (pak, found) in visible.into_iter().zip(assigned) {
        let Some((idx, rule)) = found else {
            for category in &pak.categories {
                state
                    .browse_by_category
                    .entry(category.clone())
                    .or_default()
                    .insert(pak.display_name.clone(), pak.clone());
            }
            continue;
        };

        claimed[idx] = true;
        let record = &records[idx];
        let identity = record.key().to_string();
        if has_update(&record.version, &pak.version) {
            state.updates_available.push(PendingUpdate {
                identity,
                installed_version: record.version.clone(),
                matched_by: rule,
                pak: pak.clone(),
            });
        } else {
            state.up_to_date.insert(
                identity.clone(),
                CurrentInstall {
                    identity,
                    matched_by: rule,
                    pak: pak.clone(),
                },
            );
        }
    }

    state
        .updates_available
        .sort_by(|a, b| a.pak.display_name.cmp(&b.pak.display_name));

    for (idx, record) in records.into_iter().enumerate() {
        if !claimed[idx] {
            state.orphaned.push(record.clone());
        }
        state
            .installed_by_identity
            .insert(record.key().to_string(), record);
    }

    state
}
