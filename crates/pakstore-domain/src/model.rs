use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::version;

/// Identifier the storefront publishes for its own pak.
pub const PAK_STORE_ID: &str = "xK9mR2vL4w";
/// Display name of the storefront's own record in legacy databases.
pub const PAK_STORE_NAME: &str = "Pak Store";
pub const PAK_STORE_REPO: &str = "https://github.com/UncleJunVIP/nextui-pak-store";

const BUNDLE_EXTENSION: &str = "pakz";

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PakType {
    #[serde(rename = "TOOL")]
    Tool,
    #[serde(rename = "EMU", alias = "EMULATOR")]
    Emulator,
}

impl PakType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PakType::Tool => "TOOL",
            PakType::Emulator => "EMU",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "TOOL" => Some(PakType::Tool),
            "EMU" | "EMULATOR" => Some(PakType::Emulator),
            _ => None,
        }
    }
}

/// A catalog entry as published in the storefront manifest.
///
/// Every field other than the names, version and type is optional on the
/// wire so that manifests written before identifiers and rename tracking
/// existed still parse.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pak {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "storefront_name")]
    pub display_name: String,
    pub name: String,
    pub version: String,
    #[serde(rename = "type")]
    pub pak_type: PakType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub repo_url: String,
    #[serde(default)]
    pub previous_names: Vec<String>,
    #[serde(default)]
    pub previous_repo_urls: Vec<String>,
    #[serde(default)]
    pub release_filename: String,
    #[serde(default)]
    pub changelog: BTreeMap<String, String>,
    #[serde(default)]
    pub screenshots: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub platforms: Vec<String>,
    #[serde(default)]
    pub update_ignore: Vec<String>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub large_pak: bool,
    #[serde(default, rename = "pakz")]
    pub bundle: bool,
}

impl Pak {
    /// Bundle-format paks extract to the shared root. Older manifests never
    /// set the flag, so a `.pakz` release filename counts as well.
    #[must_use]
    pub fn is_bundle(&self) -> bool {
        self.bundle
            || Path::new(&self.release_filename)
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(BUNDLE_EXTENSION))
    }

    #[must_use]
    pub fn identifier(&self) -> Option<&str> {
        non_empty(self.id.as_deref())
    }

    #[must_use]
    pub fn is_pak_store(&self) -> bool {
        self.identifier() == Some(PAK_STORE_ID) || self.name == PAK_STORE_NAME
    }

    #[must_use]
    pub fn release_url(&self) -> String {
        format!(
            "{}/releases/download/{}/{}",
            self.repo_url.trim_end_matches('/'),
            self.version,
            self.release_filename
        )
    }

    /// Changelog entry for the catalog version, if the author wrote one.
    #[must_use]
    pub fn whats_new(&self) -> Option<&str> {
        self.changelog
            .iter()
            .find(|(v, _)| version::compare(v, &self.version).is_eq())
            .map(|(_, notes)| notes.as_str())
    }

    /// Changelog entries, newest version first.
    #[must_use]
    pub fn changelog_newest_first(&self) -> Vec<(&str, &str)> {
        let mut entries: Vec<(&str, &str)> = self
            .changelog
            .iter()
            .map(|(v, notes)| (v.as_str(), notes.as_str()))
            .collect();
        entries.sort_by(|a, b| version::compare(b.0, a.0).then_with(|| a.0.cmp(b.0)));
        entries
    }

    /// Platform check used by the match-device filter. An empty platform list
    /// means the pak runs everywhere.
    #[must_use]
    pub fn supports_platform(&self, platform: &str) -> bool {
        self.platforms.is_empty()
            || self
                .platforms
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(platform))
    }
}

/// The storefront manifest.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub paks: Vec<Pak>,
}

impl Catalog {
    /// Parse the manifest wire format.
    ///
    /// # Errors
    ///
    /// Returns the underlying JSON error when the document is malformed.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    #[must_use]
    pub fn find_by_id(&self, id: &str) -> Option<&Pak> {
        self.paks.iter().find(|pak| pak.identifier() == Some(id))
    }

    /// Resolve a user-supplied name against identifier, display name, or
    /// internal name, in that order.
    #[must_use]
    pub fn lookup(&self, query: &str) -> Option<&Pak> {
        self.find_by_id(query)
            .or_else(|| self.paks.iter().find(|pak| pak.display_name == query))
            .or_else(|| self.paks.iter().find(|pak| pak.name == query))
            .or_else(|| {
                self.paks
                    .iter()
                    .find(|pak| pak.display_name.eq_ignore_ascii_case(query))
            })
    }
}

/// One row of the local installation database.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledRecord {
    pub pak_id: Option<String>,
    pub display_name: String,
    pub name: String,
    pub repo_url: Option<String>,
    pub version: String,
    pub pak_type: PakType,
    pub can_uninstall: bool,
}

impl InstalledRecord {
    /// Fresh record for a pak that was just installed from the catalog.
    #[must_use]
    pub fn from_pak(pak: &Pak) -> Self {
        Self {
            pak_id: pak.identifier().map(str::to_string),
            display_name: pak.display_name.clone(),
            name: pak.name.clone(),
            repo_url: non_empty(Some(pak.repo_url.as_str())).map(str::to_string),
            version: pak.version.clone(),
            pak_type: pak.pak_type,
            can_uninstall: true,
        }
    }

    #[must_use]
    pub fn identifier(&self) -> Option<&str> {
        non_empty(self.pak_id.as_deref())
    }

    #[must_use]
    pub fn source_url(&self) -> Option<&str> {
        non_empty(self.repo_url.as_deref())
    }

    /// The key the database addresses this row by: identifier, else source
    /// URL, else display name.
    #[must_use]
    pub fn key(&self) -> RecordKey {
        if let Some(id) = self.identifier() {
            RecordKey::PakId(id.to_string())
        } else if let Some(url) = self.source_url() {
            RecordKey::RepoUrl(url.to_string())
        } else {
            RecordKey::DisplayName(self.display_name.clone())
        }
    }

    #[must_use]
    pub fn is_pak_store(&self) -> bool {
        self.identifier() == Some(PAK_STORE_ID)
            || self.display_name == PAK_STORE_NAME
            || self.name == PAK_STORE_NAME
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum RecordKey {
    PakId(String),
    RepoUrl(String),
    DisplayName(String),
}

impl RecordKey {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            RecordKey::PakId(value) | RecordKey::RepoUrl(value) | RecordKey::DisplayName(value) => {
                value
            }
        }
    }
}

/// `pak_id:<id>`, `repo_url:<url>` or `name:<display name>`, so keys of
/// different kinds never collide.
impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::PakId(id) => write!(f, "pak_id:{id}"),
            RecordKey::RepoUrl(url) => write!(f, "repo_url:{url}"),
            RecordKey::DisplayName(name) => write!(f, "name:{name}"),
        }
    }
}

/// Name and source fields rewritten by the migration routines.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentityFields {
    pub pak_id: Option<String>,
    pub display_name: String,
    pub name: String,
    pub repo_url: Option<String>,
}

impl IdentityFields {
    #[must_use]
    pub fn from_pak(pak: &Pak) -> Self {
        Self {
            pak_id: pak.identifier().map(str::to_string),
            display_name: pak.display_name.clone(),
            name: pak.name.clone(),
            repo_url: non_empty(Some(pak.repo_url.as_str())).map(str::to_string),
        }
    }

    /// Whether writing these fields would change `record`. A missing catalog
    /// identifier never clears one the record already has.
    #[must_use]
    pub fn differs_from(&self, record: &InstalledRecord) -> bool {
        let id_changes = match self.pak_id.as_deref() {
            Some(id) => record.identifier() != Some(id),
            None => false,
        };
        id_changes
            || record.display_name != self.display_name
            || record.name != self.name
            || record.source_url() != self.repo_url.as_deref()
    }
}

pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
