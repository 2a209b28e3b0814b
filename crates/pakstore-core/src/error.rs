use std::io;
use std::path::PathBuf;

/// Errors surfaced by store operations.
///
/// A user cancelling a download is not represented here; see
/// [`crate::InstallOutcome::Cancelled`].
#[derive(Debug, thiserror::Error)]
pub enum PakStoreError {
    #[error("request to {url} failed: {message}")]
    Network { url: String, message: String },
    #[error("unable to parse catalog from {origin}: {message}")]
    Parse { origin: String, message: String },
    #[error("installation database error while {context}: {source}")]
    Store {
        context: &'static str,
        #[source]
        source: rusqlite::Error,
    },
    #[error("unable to extract {archive}: {message}")]
    Extraction { archive: PathBuf, message: String },
    #[error("illegal archive entry {entry} escapes {destination}")]
    PathTraversal { entry: String, destination: PathBuf },
    #[error("invalid configuration at {path}: {message}")]
    Config { path: PathBuf, message: String },
    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no pak named {0} in the catalog")]
    NotFound(String),
    #[error("{0} cannot be uninstalled")]
    NotUninstallable(String),
}

impl PakStoreError {
    pub(crate) fn store(context: &'static str) -> impl FnOnce(rusqlite::Error) -> Self {
        move |source| PakStoreError::Store { context, source }
    }

    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| PakStoreError::Io { path, source }
    }

    pub(crate) fn network(url: &str, message: impl ToString) -> Self {
        PakStoreError::Network {
            url: url.to_string(),
            message: message.to_string(),
        }
    }

    /// Failures during extraction, path traversal included.
    #[must_use]
    pub fn is_extraction(&self) -> bool {
        matches!(
            self,
            PakStoreError::Extraction { .. } | PakStoreError::PathTraversal { .. }
        )
    }

    /// Errors caused by the request rather than the environment.
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            PakStoreError::NotFound(_) | PakStoreError::NotUninstallable(_)
        )
    }
}

pub type Result<T, E = PakStoreError> = std::result::Result<T, E>;
