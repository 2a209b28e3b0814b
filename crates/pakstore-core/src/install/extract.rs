use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use pakstore_domain::IgnoreSet;
use tempfile::NamedTempFile;
use tracing::{debug, trace};
use zip::ZipArchive;

use crate::error::{PakStoreError, Result};

#[cfg(unix)]
const DEFAULT_FILE_MODE: u32 = 0o755;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractReport {
    pub written: usize,
    pub skipped: Vec<String>,
}

struct PlannedEntry {
    index: usize,
    name: String,
    target: PathBuf,
    is_dir: bool,
}

/// Unpack `archive` under `dest`.
///
/// Every entry is validated before anything is written, so an archive with
/// an entry escaping `dest` leaves the destination untouched. Entries
/// matching `ignore` are skipped. Files are staged next to their target and
/// renamed into place.
pub fn extract_archive(archive: &Path, dest: &Path, ignore: Option<&IgnoreSet>) -> Result<ExtractReport> {
    let extraction = |message: String| PakStoreError::Extraction {
        archive: archive.to_path_buf(),
        message,
    };
    let file = File::open(archive).map_err(PakStoreError::io(archive))?;
    let mut zip = ZipArchive::new(file).map_err(|err| extraction(err.to_string()))?;

    let mut plan = Vec::with_capacity(zip.len());
    for index in 0..zip.len() {
        let entry = zip
            .by_index(index)
            .map_err(|err| extraction(err.to_string()))?;
        let name = entry.name().replace('\\', "/");
        let target = contained_target(dest, &name, entry.enclosed_name()).ok_or_else(|| {
            PakStoreError::PathTraversal {
                entry: name.clone(),
                destination: dest.to_path_buf(),
            }
        })?;
        plan.push(PlannedEntry {
            index,
            is_dir: entry.is_dir() || name.ends_with('/'),
            name,
            target,
        });
    }

    fs::create_dir_all(dest).map_err(PakStoreError::io(dest))?;
    let mut report = ExtractReport::default();
    for planned in plan {
        if ignore.is_some_and(|set| set.is_ignored(&planned.name)) {
            debug!(entry = %planned.name, "keeping existing file matched by update-ignore");
            report.skipped.push(planned.name);
            continue;
        }
        if planned.is_dir {
            fs::create_dir_all(&planned.target).map_err(PakStoreError::io(&planned.target))?;
            continue;
        }

        let mut entry = zip
            .by_index(planned.index)
            .map_err(|err| extraction(err.to_string()))?;
        let parent = planned.target.parent().unwrap_or(dest);
        fs::create_dir_all(parent).map_err(PakStoreError::io(parent))?;
        let mut staged = NamedTempFile::new_in(parent).map_err(PakStoreError::io(parent))?;
        io::copy(&mut entry, staged.as_file_mut())
            .map_err(|err| extraction(format!("{}: {err}", planned.name)))?;
        #[cfg(unix)]
        {
            let mode = entry.unix_mode().unwrap_or(DEFAULT_FILE_MODE) & 0o7777;
            fs::set_permissions(staged.path(), fs::Permissions::from_mode(mode))
                .map_err(PakStoreError::io(&planned.target))?;
        }
        staged
            .persist(&planned.target)
            .map_err(|err| PakStoreError::io(&planned.target)(err.error))?;
        trace!(entry = %planned.name, "extracted");
        report.written += 1;
    }
    Ok(report)
}

/// Resolved path of `name` below `dest`, or `None` when the entry would land
/// outside it.
fn contained_target(dest: &Path, name: &str, enclosed: Option<&Path>) -> Option<PathBuf> {
    let relative = enclosed?;
    if relative
        .components()
        .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir))
    {
        return None;
    }
    if name.starts_with('/') || name.split('/').any(|segment| segment == "..") {
        return None;
    }
    let target = dest.join(relative);
    target.starts_with(dest).then_some(target)
}
