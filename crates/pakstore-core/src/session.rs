//! One store session: settings, the installation database and a catalog.

use std::path::PathBuf;

use pakstore_domain::{
    assign_records, derive_state, find_record, Catalog, DerivedState, InstalledRecord, Pak,
    PlatformFilter, ReconcileOptions,
};
use tracing::{info, warn};

use crate::catalog::{fetch_catalog, CatalogSource};
use crate::config::{Settings, UserConfig};
use crate::error::{PakStoreError, Result};
use crate::install::{InstallLayout, Installer};
use crate::migration::{reconcile_identities, MigrationReport};
use crate::net::{HttpTransport, Transport};
use crate::screenshots::fetch_screenshots;
use crate::store::{LocalStore, SqliteStore};

/// Recompute the derived views from the current store contents.
///
/// Fails only when the store cannot be read.
pub fn reconcile(
    catalog: &Catalog,
    store: &dyn LocalStore,
    options: &ReconcileOptions,
) -> Result<DerivedState> {
    let installed = store.list_installed()?;
    Ok(derive_state(catalog, &installed, options))
}

pub struct Session<T: Transport = HttpTransport> {
    settings: Settings,
    config: UserConfig,
    store: SqliteStore,
    transport: T,
    catalog: Catalog,
    migration: MigrationReport,
}

impl Session<HttpTransport> {
    pub fn open(settings: Settings) -> Result<Self> {
        Self::open_with(settings, HttpTransport::new()?)
    }
}

impl<T: Transport> Session<T> {
    /// Load configuration, open the database, fetch the catalog and bring
    /// installed identities up to date. Any failure here is fatal.
    pub fn open_with(settings: Settings, transport: T) -> Result<Self> {
        let config = UserConfig::load(&settings.config_path())?;
        let store = SqliteStore::open(&settings.database_path())?;
        let catalog = fetch_catalog(&transport, &CatalogSource::from_settings(&settings))?;
        info!(paks = catalog.paks.len(), "catalog loaded");
        let migration = reconcile_identities(&catalog, &store)?;
        if !migration.failures.is_empty() {
            warn!(
                failures = migration.failures.len(),
                "some installed paks could not be migrated"
            );
        }
        Ok(Self {
            settings,
            config,
            store,
            transport,
            catalog,
            migration,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn config(&self) -> &UserConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn store(&self) -> &dyn LocalStore {
        &self.store
    }

    pub fn migration(&self) -> &MigrationReport {
        &self.migration
    }

    pub fn options(&self, filter: Option<PlatformFilter>) -> ReconcileOptions {
        let mut options = self.settings.reconcile_options(&self.config);
        if let Some(filter) = filter {
            options.filter = filter;
        }
        options
    }

    pub fn derive(&self, filter: Option<PlatformFilter>) -> Result<DerivedState> {
        reconcile(&self.catalog, &self.store, &self.options(filter))
    }

    /// Fetch the catalog again; on failure the previous catalog is kept.
    pub fn refresh_catalog(&mut self) -> Result<()> {
        let catalog = fetch_catalog(&self.transport, &CatalogSource::from_settings(&self.settings))?;
        self.migration = reconcile_identities(&catalog, &self.store)?;
        self.catalog = catalog;
        Ok(())
    }

    pub fn installer(&self) -> Installer<'_> {
        Installer::new(
            &self.transport,
            &self.store,
            InstallLayout::from_settings(&self.settings),
            self.settings.cache_dir.join("downloads"),
        )
    }

    pub fn lookup(&self, query: &str) -> Result<&Pak> {
        self.catalog
            .lookup(query)
            .ok_or_else(|| PakStoreError::NotFound(query.to_string()))
    }

    /// The record installed for `pak`, if any. Catalog entries compete for
    /// records the same way they do in [`derive_state`], so an entry is never
    /// handed a record another entry holds by a stronger rule.
    pub fn installed_record(&self, pak: &Pak) -> Result<Option<InstalledRecord>> {
        let records = self.store.list_installed()?;
        let paks: Vec<&Pak> = self.catalog.paks.iter().collect();
        let found = match paks.iter().position(|candidate| std::ptr::eq(*candidate, pak)) {
            Some(pos) => assign_records(&paks, &records)[pos],
            None => find_record(pak, &records),
        };
        Ok(found.map(|(idx, _)| records[idx].clone()))
    }

    /// Resolve `query` to an installed record: through the catalog first,
    /// then by the record's own names for paks the catalog no longer lists.
    pub fn find_installed(&self, query: &str) -> Result<InstalledRecord> {
        if let Some(pak) = self.catalog.lookup(query) {
            if let Some(record) = self.installed_record(pak)? {
                return Ok(record);
            }
        }
        self.store
            .list_installed()?
            .into_iter()
            .find(|record| {
                record.identifier() == Some(query)
                    || record.display_name == query
                    || record.name == query
            })
            .ok_or_else(|| PakStoreError::NotFound(query.to_string()))
    }

    pub fn screenshots(&self, pak: &Pak) -> Result<Vec<PathBuf>> {
        let dir = self.settings.cache_dir.join("screenshots").join(&pak.name);
        fetch_screenshots(&self.transport, pak, &dir)
    }
}
