//! Device layout, environment overrides, and the persisted user settings.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use pakstore_domain::{PlatformFilter, ReconcileOptions};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PakStoreError, Result};

pub const STOREFRONT_URL: &str = "https://pak-store.unclejun.vip/storefront.json";
pub const STOREFRONT_BACKUP_URL: &str =
    "https://raw.githubusercontent.com/UncleJunVIP/nextui-pak-store/refs/heads/gh-pages/storefront.json";

const DEFAULT_SD_ROOT: &str = "/mnt/SDCARD";
const DEFAULT_PLATFORM: &str = "tg5040";
const DATABASE_FILENAME: &str = "pak-store.db";
const CONFIG_FILENAME: &str = "config.json";

#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    pub fn capture() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    pub fn testing(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }
}

/// Where things live on the device and where the catalog comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub sd_root: PathBuf,
    pub tools_root: PathBuf,
    pub emus_root: PathBuf,
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub platform: String,
    pub storefront_url: String,
    pub storefront_backup_url: Option<String>,
    pub storefront_override: Option<String>,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_snapshot(&EnvSnapshot::capture())
    }

    pub fn from_snapshot(snapshot: &EnvSnapshot) -> Self {
        let platform = snapshot
            .var("PAKSTORE_PLATFORM")
            .or_else(|| snapshot.var("PLATFORM"))
            .unwrap_or(DEFAULT_PLATFORM)
            .to_string();
        let sd_root = PathBuf::from(snapshot.var("PAKSTORE_SD_ROOT").unwrap_or(DEFAULT_SD_ROOT));
        let path_or = |key: &str, default: PathBuf| snapshot.var(key).map_or(default, PathBuf::from);

        let settings = Self {
            tools_root: path_or("PAKSTORE_TOOLS_ROOT", sd_root.join("Tools").join(&platform)),
            emus_root: path_or("PAKSTORE_EMUS_ROOT", sd_root.join("Emus").join(&platform)),
            data_dir: path_or(
                "PAKSTORE_DATA_DIR",
                sd_root
                    .join(".userdata")
                    .join(&platform)
                    .join("pak-store"),
            ),
            cache_dir: path_or("PAKSTORE_CACHE_DIR", env::temp_dir().join("pak-store")),
            storefront_url: snapshot
                .var("PAKSTORE_STOREFRONT_URL")
                .unwrap_or(STOREFRONT_URL)
                .to_string(),
            storefront_backup_url: Some(STOREFRONT_BACKUP_URL.to_string()),
            storefront_override: snapshot
                .var("PAKSTORE_STOREFRONT_OVERRIDE")
                .map(str::to_string),
            sd_root,
            platform,
        };
        debug!(?settings, "resolved store settings");
        settings
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILENAME)
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILENAME)
    }

    pub fn reconcile_options(&self, config: &UserConfig) -> ReconcileOptions {
        ReconcileOptions {
            filter: config.platform_filter,
            platform: self.platform.clone(),
        }
    }
}

/// Settings the user can change from the store itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UserConfig {
    pub platform_filter: PlatformFilter,
}

#[derive(Deserialize)]
struct RawUserConfig {
    #[serde(default)]
    platform_filter: Option<String>,
}

impl UserConfig {
    /// Load `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(PakStoreError::io(path)(err)),
        };
        let raw: RawUserConfig =
            serde_json::from_str(&contents).map_err(|err| PakStoreError::Config {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?;
        let platform_filter = match raw.platform_filter.as_deref() {
            None => PlatformFilter::default(),
            Some(value) => PlatformFilter::parse(value).ok_or_else(|| PakStoreError::Config {
                path: path.to_path_buf(),
                message: format!("unknown platform_filter '{value}'"),
            })?,
        };
        Ok(Self { platform_filter })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(PakStoreError::io(parent))?;
        }
        let pretty = serde_json::to_string_pretty(self).map_err(|err| PakStoreError::Config {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        fs::write(path, pretty).map_err(PakStoreError::io(path))?;
        Ok(())
    }
}
