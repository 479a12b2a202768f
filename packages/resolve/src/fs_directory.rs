//! Directory handles backed by the host filesystem.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::directory::{DirEntry, DirectoryHandle, EntryKind, EntryStream, FileHandle, LocalFile};
use crate::error::{ResolveError, Result};

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// A directory on the host filesystem.
#[derive(Debug, Clone)]
pub struct FsDirectory {
    name: String,
    path: PathBuf,
}

impl FsDirectory {
    /// Open a directory, failing if the path is missing or not a directory.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_dir() {
            return Err(ResolveError::NotADirectory {
                path: path.display().to_string(),
            });
        }
        let path = tokio::fs::canonicalize(&path).await?;
        Ok(Self {
            name: file_name(&path),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DirectoryHandle for FsDirectory {
    fn name(&self) -> &str {
        &self.name
    }

    async fn entries(&self) -> Result<Box<dyn EntryStream>> {
        let read_dir = tokio::fs::read_dir(&self.path).await?;
        Ok(Box::new(FsEntryStream { read_dir }))
    }
}

struct FsEntryStream {
    read_dir: tokio::fs::ReadDir,
}

#[async_trait]
impl EntryStream for FsEntryStream {
    async fn next_entry(&mut self) -> Result<Option<DirEntry>> {
        while let Some(entry) = self.read_dir.next_entry().await? {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();

            // Follows symlinks; dangling links are skipped.
            let Ok(metadata) = tokio::fs::metadata(&path).await else {
                tracing::trace!("Skipping unreadable entry {}", path.display());
                continue;
            };

            let kind = if metadata.is_dir() {
                EntryKind::Directory(Arc::new(FsDirectory {
                    name: name.clone(),
                    path,
                }))
            } else if metadata.is_file() {
                EntryKind::File(Arc::new(FsFile {
                    name: name.clone(),
                    path,
                }))
            } else {
                continue;
            };

            return Ok(Some(DirEntry { name, kind }));
        }
        Ok(None)
    }
}

/// A file on the host filesystem.
#[derive(Debug, Clone)]
pub struct FsFile {
    name: String,
    path: PathBuf,
}

#[async_trait]
impl FileHandle for FsFile {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_file(&self) -> Result<LocalFile> {
        tracing::debug!("Reading {}...", self.path.display());
        let bytes = tokio::fs::read(&self.path).await?;
        Ok(LocalFile::new(self.name.clone(), bytes))
    }
}
