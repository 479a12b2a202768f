//! Error types for the pyhost runtime.

use std::sync::Arc;

use pyhost_resolve::ResolveError;
use pyhost_vfs::{FsError, PathError};
use thiserror::Error;

/// Errors raised while materializing a file in the interpreter filesystem.
///
/// Cloneable so that one outcome can be handed to every caller waiting on the
/// same target path.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// A directory prefix was reached before its own parent existed.
    ///
    /// Prefixes are created root to leaf, so this means the filesystem was
    /// changed underneath the writer or the target path is malformed.
    #[error("parent of {path} does not exist in the interpreter filesystem")]
    ParentMissing { path: String },

    /// The resolved source did not have status 200.
    #[error("failed to fetch {path}: {status} {status_text}")]
    Fetch {
        path: String,
        status: u16,
        status_text: String,
    },

    #[error("invalid target path: {0}")]
    Path(#[from] PathError),

    #[error("interpreter filesystem error: {0}")]
    Fs(#[from] FsError),

    /// Resolution failed for a reason other than a miss.
    #[error("could not resolve {path}: {source}")]
    Resolve {
        path: String,
        #[source]
        source: Arc<ResolveError>,
    },
}

impl LoadError {
    /// Wrap a resolution error for `path`, turning a miss into a 404.
    pub(crate) fn from_resolve(path: &str, err: ResolveError) -> Self {
        if err.is_not_found() {
            tracing::debug!("{}", err);
            return LoadError::Fetch {
                path: path.to_string(),
                status: 404,
                status_text: "Not Found".to_string(),
            };
        }
        LoadError::Resolve {
            path: path.to_string(),
            source: Arc::new(err),
        }
    }

    /// The status of a failed fetch, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            LoadError::Fetch { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors raised by the interpreter lifecycle.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// An operation needed the interpreter before `load_interpreter` finished.
    #[error("interpreter is not loaded")]
    NotLoaded,

    /// The interpreter image could not be loaded.
    #[error("failed to load interpreter image: {0}")]
    Image(String),

    /// The interpreter raised while running code or loading packages.
    #[error("interpreter error: {0}")]
    Interpreter(String),

    /// The package installer was not found in the interpreter's globals.
    #[error("package installer '{name}' is not available in interpreter globals")]
    Installer { name: String },

    /// The package installer failed.
    #[error("package install failed: {0}")]
    Install(String),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_message_names_path_and_status() {
        let err = LoadError::Fetch {
            path: "lib/missing.py".to_string(),
            status: 404,
            status_text: "Not Found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to fetch lib/missing.py: 404 Not Found"
        );
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn local_miss_becomes_404() {
        let miss = ResolveError::NotFound {
            path: "a/b.py".to_string(),
            segment: "a".to_string(),
        };
        let err = LoadError::from_resolve("a/b.py", miss);
        assert_eq!(err.to_string(), "failed to fetch a/b.py: 404 Not Found");
    }

    #[test]
    fn other_resolve_errors_are_kept() {
        let err = LoadError::from_resolve("a.py", ResolveError::PromptClosed);
        assert!(matches!(err, LoadError::Resolve { .. }));
        assert_eq!(err.status(), None);
        assert!(std::error::Error::source(&err).is_some());
    }
}
