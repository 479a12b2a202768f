//! The capability to ask the user for a directory.
//!
//! A picker is asked at most once per
//! [`LocalResolutionContext`](crate::LocalResolutionContext). Implementations
//! may wait on the user indefinitely; there is no timeout or cancellation.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::directory::DirectoryHandle;
use crate::error::Result;
use crate::fs_directory::FsDirectory;

/// Obtain a directory handle through a user-gesture-gated chooser.
#[async_trait]
pub trait DirectoryPicker: Send + Sync {
    async fn request_directory(&self) -> Result<Arc<dyn DirectoryHandle>>;
}

#[async_trait]
impl<T: DirectoryPicker + ?Sized> DirectoryPicker for Arc<T> {
    async fn request_directory(&self) -> Result<Arc<dyn DirectoryHandle>> {
        self.as_ref().request_directory().await
    }
}

/// A picker whose answer was decided up front.
pub struct FixedDirectoryPicker {
    choice: Choice,
}

enum Choice {
    Handle(Arc<dyn DirectoryHandle>),
    Path(PathBuf),
}

impl FixedDirectoryPicker {
    /// Always hand out `handle`.
    pub fn new(handle: Arc<dyn DirectoryHandle>) -> Self {
        Self {
            choice: Choice::Handle(handle),
        }
    }

    /// Open `path` on the host filesystem when asked.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            choice: Choice::Path(path.into()),
        }
    }
}

#[async_trait]
impl DirectoryPicker for FixedDirectoryPicker {
    async fn request_directory(&self) -> Result<Arc<dyn DirectoryHandle>> {
        match &self.choice {
            Choice::Handle(handle) => Ok(handle.clone()),
            Choice::Path(path) => Ok(Arc::new(FsDirectory::open(path.clone()).await?)),
        }
    }
}
