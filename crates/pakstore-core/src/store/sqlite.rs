//! SQLite-backed installation store.

use std::path::Path;
use std::time::Duration;

use pakstore_domain::{
    IdentityFields, InstalledRecord, PakType, RecordKey, PAK_STORE_ID, PAK_STORE_NAME,
    PAK_STORE_REPO,
};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use super::LocalStore;
use crate::error::{PakStoreError, Result};

const TABLE: &str = "installed_paks";
const STORE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Columns added after the first released schema.
const LATE_COLUMNS: [(&str, &str); 2] = [("repo_url", "TEXT"), ("pak_id", "TEXT")];

const SELECT_COLUMNS: &str =
    "SELECT pak_id, display_name, name, repo_url, version, type, can_uninstall FROM installed_paks";

pub struct SqliteStore {
    conn: Connection,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`, bring its schema
    /// up to date and refresh the storefront's own record.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(PakStoreError::io(parent))?;
        }
        let conn = Connection::open(path).map_err(PakStoreError::store("opening the database"))?;
        conn.busy_timeout(Duration::from_secs(10))
            .map_err(PakStoreError::store("setting the busy timeout"))?;
        Self::initialize(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(PakStoreError::store("opening an in-memory database"))?;
        Self::initialize(conn)
    }

    fn initialize(conn: Connection) -> Result<Self> {
        let store = Self { conn };
        let created = !store.table_exists(TABLE)?;
        store.init_schema()?;
        for (column, sql_type) in LATE_COLUMNS {
            store.add_column_if_missing(column, sql_type)?;
        }
        store.ensure_self_record(created)?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r"
                CREATE TABLE IF NOT EXISTS installed_paks (
                    id INTEGER PRIMARY KEY,
                    display_name TEXT NOT NULL,
                    name TEXT NOT NULL,
                    pak_id TEXT,
                    repo_url TEXT,
                    version TEXT NOT NULL,
                    type TEXT NOT NULL,
                    can_uninstall INTEGER NOT NULL DEFAULT 1
                );
                ",
            )
            .map_err(PakStoreError::store("initializing the schema"))
    }

    fn table_exists(&self, table: &str) -> Result<bool> {
        let found: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table],
                |row| row.get(0),
            )
            .optional()
            .map_err(PakStoreError::store("inspecting the schema"))?;
        Ok(found.is_some())
    }

    pub(crate) fn column_exists(&self, column: &str) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?1)")
            .map_err(PakStoreError::store("inspecting table columns"))?;
        let names = stmt
            .query_map(params![TABLE], |row| row.get::<_, String>(0))
            .map_err(PakStoreError::store("inspecting table columns"))?;
        for name in names {
            if name.map_err(PakStoreError::store("inspecting table columns"))? == column {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn add_column_if_missing(&self, column: &str, sql_type: &str) -> Result<()> {
        if self.column_exists(column)? {
            return Ok(());
        }
        self.conn
            .execute_batch(&format!("ALTER TABLE {TABLE} ADD COLUMN {column} {sql_type};"))
            .map_err(PakStoreError::store("migrating the schema"))?;
        info!(column, "added column to installation database");
        Ok(())
    }

    /// Insert the storefront's own row on a fresh database, otherwise bring
    /// its version (and identifier, for legacy rows) up to date.
    fn ensure_self_record(&self, created: bool) -> Result<()> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM installed_paks WHERE pak_id = ?1 OR display_name = ?2 LIMIT 1",
                params![PAK_STORE_ID, PAK_STORE_NAME],
                |row| row.get(0),
            )
            .optional()
            .map_err(PakStoreError::store("looking up the store record"))?;

        match existing {
            Some(id) => {
                self.conn
                    .execute(
                        "UPDATE installed_paks SET version = ?1, pak_id = ?2 WHERE id = ?3",
                        params![STORE_VERSION, PAK_STORE_ID, id],
                    )
                    .map_err(PakStoreError::store("refreshing the store record"))?;
            }
            None if created => {
                self.conn
                    .execute(
                        "INSERT INTO installed_paks \
                         (display_name, name, pak_id, repo_url, version, type, can_uninstall) \
                         VALUES (?1, ?1, ?2, ?3, ?4, ?5, 0)",
                        params![
                            PAK_STORE_NAME,
                            PAK_STORE_ID,
                            PAK_STORE_REPO,
                            STORE_VERSION,
                            PakType::Tool.as_str()
                        ],
                    )
                    .map_err(PakStoreError::store("seeding the store record"))?;
                debug!(version = STORE_VERSION, "seeded store record");
            }
            None => {}
        }
        Ok(())
    }
}

/// `WHERE` clause selecting the row `key` addresses. Mirrors
/// [`InstalledRecord::key`]: a URL key only applies to rows without an
/// identifier, a name key only to rows with neither.
fn key_clause(key: &RecordKey) -> &'static str {
    match key {
        RecordKey::PakId(_) => "pak_id = ?1",
        RecordKey::RepoUrl(_) => "(pak_id IS NULL OR pak_id = '') AND repo_url = ?1",
        RecordKey::DisplayName(_) => {
            "(pak_id IS NULL OR pak_id = '') AND (repo_url IS NULL OR repo_url = '') \
             AND display_name = ?1"
        }
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<InstalledRecord> {
    let raw_type: String = row.get(5)?;
    let pak_type = PakType::parse(&raw_type).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            Type::Text,
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown pak type '{raw_type}'"),
            )),
        )
    })?;
    Ok(InstalledRecord {
        pak_id: row.get(0)?,
        display_name: row.get(1)?,
        name: row.get(2)?,
        repo_url: row.get(3)?,
        version: row.get(4)?,
        pak_type,
        can_uninstall: row.get(6)?,
    })
}

impl LocalStore for SqliteStore {
    fn list_installed(&self) -> Result<Vec<InstalledRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SELECT_COLUMNS} ORDER BY id"))
            .map_err(PakStoreError::store("listing installed paks"))?;
        let rows = stmt
            .query_map([], record_from_row)
            .map_err(PakStoreError::store("listing installed paks"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(PakStoreError::store("reading installed paks"))
    }

    fn install(&self, record: &InstalledRecord) -> Result<()> {
        let key = record.key();
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(PakStoreError::store("starting an install transaction"))?;
        tx.execute(
            &format!("DELETE FROM installed_paks WHERE {}", key_clause(&key)),
            params![key.as_str()],
        )
        .map_err(PakStoreError::store("replacing an installed pak"))?;
        tx.execute(
            "INSERT INTO installed_paks \
             (display_name, name, pak_id, repo_url, version, type, can_uninstall) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.display_name,
                record.name,
                record.identifier(),
                record.source_url(),
                record.version,
                record.pak_type.as_str(),
                record.can_uninstall
            ],
        )
        .map_err(PakStoreError::store("recording an installed pak"))?;
        tx.commit()
            .map_err(PakStoreError::store("committing an install"))?;
        Ok(())
    }

    fn update_version(&self, key: &RecordKey, version: &str, repo_url: Option<&str>) -> Result<()> {
        let changed = self
            .conn
            .execute(
                &format!(
                    "UPDATE installed_paks SET version = ?2, repo_url = COALESCE(?3, repo_url) \
                     WHERE {}",
                    key_clause(key)
                ),
                params![key.as_str(), version, repo_url],
            )
            .map_err(PakStoreError::store("updating an installed version"))?;
        if changed == 0 {
            return Err(PakStoreError::NotFound(key.as_str().to_string()));
        }
        Ok(())
    }

    fn uninstall(&self, key: &RecordKey) -> Result<()> {
        self.conn
            .execute(
                &format!("DELETE FROM installed_paks WHERE {}", key_clause(key)),
                params![key.as_str()],
            )
            .map_err(PakStoreError::store("removing an installed pak"))?;
        Ok(())
    }

    fn update_identity_fields(&self, key: &RecordKey, fields: &IdentityFields) -> Result<()> {
        let changed = self
            .conn
            .execute(
                &format!(
                    "UPDATE installed_paks SET pak_id = COALESCE(?2, pak_id), \
                     display_name = ?3, name = ?4, repo_url = ?5 WHERE {}",
                    key_clause(key)
                ),
                params![
                    key.as_str(),
                    fields.pak_id,
                    fields.display_name,
                    fields.name,
                    fields.repo_url
                ],
            )
            .map_err(PakStoreError::store("updating identity fields"))?;
        if changed == 0 {
            return Err(PakStoreError::NotFound(key.as_str().to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: Option<&str>, name: &str, url: Option<&str>, version: &str) -> InstalledRecord {
        InstalledRecord {
            pak_id: id.map(str::to_string),
            display_name: name.to_string(),
            name: name.to_string(),
            repo_url: url.map(str::to_string),
            version: version.to_string(),
            pak_type: PakType::Emulator,
            can_uninstall: true,
        }
    }

    fn user_records(store: &SqliteStore) -> Vec<InstalledRecord> {
        store
            .list_installed()
            .expect("list")
            .into_iter()
            .filter(|r| !r.is_pak_store())
            .collect()
    }

    #[test]
    fn fresh_database_seeds_store_record() -> anyhow::Result<()> {
        let store = SqliteStore::open_in_memory()?;
        let rows = store.list_installed()?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].identifier(), Some(PAK_STORE_ID));
        assert!(!rows[0].can_uninstall);
        assert_eq!(rows[0].version, STORE_VERSION);
        Ok(())
    }

    #[test]
    fn install_update_and_uninstall_by_key() -> anyhow::Result<()> {
        let store = SqliteStore::open_in_memory()?;
        let rec = record(Some("abc"), "Thing", Some("https://github.com/a/thing"), "1.0");
        store.install(&rec)?;
        store.install(&rec)?;
        assert_eq!(user_records(&store), vec![rec.clone()]);

        store.update_version(&rec.key(), "1.1", Some("https://github.com/b/thing"))?;
        let updated = &user_records(&store)[0];
        assert_eq!(updated.version, "1.1");
        assert_eq!(updated.source_url(), Some("https://github.com/b/thing"));
        assert_eq!(updated.display_name, "Thing");

        store.uninstall(&rec.key())?;
        assert!(user_records(&store).is_empty());
        Ok(())
    }

    #[test]
    fn url_key_does_not_touch_rows_with_identifier() -> anyhow::Result<()> {
        let store = SqliteStore::open_in_memory()?;
        let url = Some("https://github.com/a/shared");
        store.install(&record(Some("x"), "With Id", url, "1.0"))?;
        store.install(&record(None, "Legacy", url, "1.0"))?;

        store.update_version(&RecordKey::RepoUrl("https://github.com/a/shared".into()), "2.0", None)?;
        let rows = user_records(&store);
        let with_id = rows.iter().find(|r| r.display_name == "With Id").expect("row");
        let legacy = rows.iter().find(|r| r.display_name == "Legacy").expect("row");
        assert_eq!(with_id.version, "1.0");
        assert_eq!(legacy.version, "2.0");
        Ok(())
    }

    #[test]
    fn update_version_of_missing_row_is_not_found() -> anyhow::Result<()> {
        let store = SqliteStore::open_in_memory()?;
        let err = store
            .update_version(&RecordKey::PakId("nope".into()), "1.0", None)
            .expect_err("missing row");
        assert!(matches!(err, PakStoreError::NotFound(_)));
        Ok(())
    }

    #[test]
    fn identity_fields_for_missing_row_are_not_found() -> anyhow::Result<()> {
        let store = SqliteStore::open_in_memory()?;
        let fields = IdentityFields {
            pak_id: Some("id".into()),
            display_name: "Ghost".into(),
            name: "Ghost".into(),
            repo_url: None,
        };
        let err = store
            .update_identity_fields(&RecordKey::DisplayName("Ghost".into()), &fields)
            .expect_err("missing row");
        assert!(matches!(err, PakStoreError::NotFound(_)));
        Ok(())
    }

    #[test]
    fn identity_fields_rewrite_legacy_record() -> anyhow::Result<()> {
        let store = SqliteStore::open_in_memory()?;
        let legacy = record(None, "Old Name", None, "1.0");
        store.install(&legacy)?;
        assert_eq!(store.list_without_identifier()?, vec![legacy.clone()]);

        let fields = IdentityFields {
            pak_id: Some("new-id".into()),
            display_name: "New Name".into(),
            name: "NewName".into(),
            repo_url: Some("https://github.com/a/new".into()),
        };
        store.update_identity_fields(&legacy.key(), &fields)?;

        assert!(store.list_without_identifier()?.is_empty());
        let rows = user_records(&store);
        assert_eq!(rows[0].identifier(), Some("new-id"));
        assert_eq!(rows[0].display_name, "New Name");
        assert_eq!(rows[0].version, "1.0");
        Ok(())
    }

    #[test]
    fn legacy_schema_gains_columns_once() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("pak-store.db");
        {
            let conn = Connection::open(&path)?;
            conn.execute_batch(
                "CREATE TABLE installed_paks (
                    id INTEGER PRIMARY KEY,
                    display_name TEXT NOT NULL,
                    name TEXT NOT NULL,
                    version TEXT NOT NULL,
                    type TEXT NOT NULL,
                    can_uninstall INTEGER NOT NULL
                );
                INSERT INTO installed_paks (display_name, name, version, type, can_uninstall)
                VALUES ('Pak Store', 'Pak Store', '0.1', 'TOOL', 0),
                       ('Legacy', 'LEGACY', '1.0', 'EMU', 1);",
            )?;
        }

        let store = SqliteStore::open(&path)?;
        assert!(store.column_exists("pak_id")?);
        assert!(store.column_exists("repo_url")?);
        drop(store);

        let reopened = SqliteStore::open(&path)?;
        let rows = reopened.list_installed()?;
        assert_eq!(rows.len(), 2);
        let own = rows.iter().find(|r| r.is_pak_store()).expect("store row");
        assert_eq!(own.identifier(), Some(PAK_STORE_ID));
        assert_eq!(own.version, STORE_VERSION);
        let legacy = rows.iter().find(|r| r.name == "LEGACY").expect("legacy row");
        assert_eq!(legacy.pak_type, PakType::Emulator);
        assert!(legacy.repo_url.is_none());
        Ok(())
    }
}
