//! Handles onto a user-granted directory tree.
//!
//! A [`DirectoryHandle`] enumerates its entries through an [`EntryStream`]:
//! a finite sequence of `(name, handle)` pairs that ends with `Ok(None)`.
//! Every call to `entries()` starts a fresh enumeration.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// File content retrieved from a local directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    name: String,
    bytes: Bytes,
}

impl LocalFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The file's content as a byte buffer.
    pub fn bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A handle onto a single file.
#[async_trait]
pub trait FileHandle: Send + Sync {
    fn name(&self) -> &str;

    /// Retrieve the file's content.
    async fn get_file(&self) -> Result<LocalFile>;
}

/// What a directory entry points at.
#[derive(Clone)]
pub enum EntryKind {
    File(Arc<dyn FileHandle>),
    Directory(Arc<dyn DirectoryHandle>),
}

impl std::fmt::Debug for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::File(h) => write!(f, "File({})", h.name()),
            EntryKind::Directory(h) => write!(f, "Directory({})", h.name()),
        }
    }
}

/// One `(name, handle)` pair yielded while enumerating a directory.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

/// A lazy, finite enumeration of a directory's entries.
#[async_trait]
pub trait EntryStream: Send {
    /// The next entry, or `Ok(None)` once the directory is exhausted.
    async fn next_entry(&mut self) -> Result<Option<DirEntry>>;
}

/// A handle onto a directory.
///
/// # Object Safety
///
/// This trait is object-safe: you can use `Arc<dyn DirectoryHandle>`.
#[async_trait]
pub trait DirectoryHandle: Send + Sync {
    fn name(&self) -> &str;

    /// Start enumerating this directory's entries.
    async fn entries(&self) -> Result<Box<dyn EntryStream>>;
}

/// Enumerate `dir` until an entry named `name` turns up.
pub async fn find_entry(dir: &dyn DirectoryHandle, name: &str) -> Result<Option<EntryKind>> {
    let mut entries = dir.entries().await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.name == name {
            return Ok(Some(entry.kind));
        }
    }
    Ok(None)
}

/// An [`EntryStream`] over entries that are already in memory.
pub struct VecEntryStream {
    entries: std::vec::IntoIter<DirEntry>,
}

impl VecEntryStream {
    pub fn new(entries: Vec<DirEntry>) -> Self {
        Self {
            entries: entries.into_iter(),
        }
    }
}

#[async_trait]
impl EntryStream for VecEntryStream {
    async fn next_entry(&mut self) -> Result<Option<DirEntry>> {
        Ok(self.entries.next())
    }
}

#[derive(Debug, Clone)]
enum MemoryNode {
    File(Arc<MemoryFile>),
    Directory(Arc<MemoryDirectory>),
}

/// A file held in memory.
#[derive(Debug, Clone)]
pub struct MemoryFile {
    name: String,
    contents: Bytes,
}

#[async_trait]
impl FileHandle for MemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_file(&self) -> Result<LocalFile> {
        Ok(LocalFile::new(self.name.clone(), self.contents.clone()))
    }
}

/// A directory tree held in memory.
///
/// # Example
///
/// ```rust
/// use pyhost_resolve::MemoryDirectory;
///
/// let root = MemoryDirectory::new("project")
///     .with_file("main.py", "import lib.pkg.mod")
///     .with_file("lib/pkg/mod.py", "VALUE = 1");
/// assert_eq!(root.file_count(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    name: String,
    children: BTreeMap<String, MemoryNode>,
}

impl MemoryDirectory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: BTreeMap::new(),
        }
    }

    /// Add a file at a slash-separated path, creating directories on the way.
    pub fn with_file(mut self, path: &str, contents: impl Into<Bytes>) -> Self {
        self.insert_file(path, contents);
        self
    }

    /// Add a file at a slash-separated path, creating directories on the way.
    ///
    /// A file already at the path is replaced; a file standing where a
    /// directory is needed is replaced by that directory.
    pub fn insert_file(&mut self, path: &str, contents: impl Into<Bytes>) {
        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let Some(leaf) = segments.pop() else {
            return;
        };

        let mut current = self;
        for segment in segments {
            let node = current
                .children
                .entry(segment.to_string())
                .or_insert_with(|| MemoryNode::Directory(Arc::new(MemoryDirectory::new(segment))));
            if let MemoryNode::File(_) = node {
                *node = MemoryNode::Directory(Arc::new(MemoryDirectory::new(segment)));
            }
            let MemoryNode::Directory(dir) = node else {
                return;
            };
            current = Arc::make_mut(dir);
        }

        current.children.insert(
            leaf.to_string(),
            MemoryNode::File(Arc::new(MemoryFile {
                name: leaf.to_string(),
                contents: contents.into(),
            })),
        );
    }

    /// Total number of files in this tree.
    pub fn file_count(&self) -> usize {
        self.children
            .values()
            .map(|node| match node {
                MemoryNode::File(_) => 1,
                MemoryNode::Directory(dir) => dir.file_count(),
            })
            .sum()
    }
}

#[async_trait]
impl DirectoryHandle for MemoryDirectory {
    fn name(&self) -> &str {
        &self.name
    }

    async fn entries(&self) -> Result<Box<dyn EntryStream>> {
        let entries = self
            .children
            .iter()
            .map(|(name, node)| DirEntry {
                name: name.clone(),
                kind: match node {
                    MemoryNode::File(f) => EntryKind::File(f.clone()),
                    MemoryNode::Directory(d) => EntryKind::Directory(d.clone()),
                },
            })
            .collect();
        Ok(Box::new(VecEntryStream::new(entries)))
    }
}
