//! In-memory virtual filesystem.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;

use crate::error::{FsError, Result};
use crate::traits::{InterpreterFs, NodeKind, OpenMode, PathInfo, StreamHandle};

/// Largest size a single file may grow to.
pub const MAX_FILE_LEN: usize = 1 << 30;

enum Node {
    Directory,
    File(Vec<u8>),
}

struct OpenStream {
    path: String,
    mode: OpenMode,
    position: u64,
}

#[derive(Default)]
struct Inner {
    /// Nodes keyed by normalized path. The root ("") is implicit.
    nodes: BTreeMap<String, Node>,
    streams: HashMap<u32, OpenStream>,
    next_fd: u32,
}

/// An interpreter filesystem held entirely in memory.
///
/// # Example
///
/// ```rust
/// use pyhost_vfs::{InterpreterFs, MemoryFs, OpenMode};
///
/// let fs = MemoryFs::new();
/// fs.mkdir("app").unwrap();
/// let fd = fs.open("app/main.py", OpenMode::Write).unwrap();
/// fs.write(fd, b"print(1)", 0, 8, Some(0)).unwrap();
/// fs.close(fd).unwrap();
///
/// assert_eq!(&fs.read_file("app/main.py").unwrap()[..], b"print(1)");
/// ```
#[derive(Default)]
pub struct MemoryFs {
    inner: Mutex<Inner>,
}

/// Normalize a filesystem path: drop empty and `.` segments, apply `..`.
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[..i],
        None => "",
    }
}

impl MemoryFs {
    /// Create an empty filesystem containing only the root directory.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of currently open streams.
    pub fn open_streams(&self) -> usize {
        self.lock().streams.len()
    }

    /// Every path in the filesystem, sorted, directories suffixed with `/`.
    pub fn tree(&self) -> Vec<String> {
        self.lock()
            .nodes
            .iter()
            .map(|(path, node)| match node {
                Node::Directory => format!("{}/", path),
                Node::File(_) => path.clone(),
            })
            .collect()
    }
}

impl Inner {
    fn is_dir(&self, path: &str) -> bool {
        path.is_empty() || matches!(self.nodes.get(path), Some(Node::Directory))
    }

    fn exists(&self, path: &str) -> bool {
        path.is_empty() || self.nodes.contains_key(path)
    }

    fn require_parent_dir(&self, path: &str) -> Result<()> {
        let parent = parent_of(path);
        if !self.exists(parent) {
            return Err(FsError::ParentMissing {
                path: path.to_string(),
            });
        }
        if !self.is_dir(parent) {
            return Err(FsError::NotADirectory {
                path: parent.to_string(),
            });
        }
        Ok(())
    }
}

impl InterpreterFs for MemoryFs {
    fn analyze_path(&self, path: &str) -> PathInfo {
        let path = normalize(path);
        let inner = self.lock();
        PathInfo {
            exists: inner.exists(&path),
            parent_exists: path.is_empty() || inner.is_dir(parent_of(&path)),
            is_dir: inner.is_dir(&path),
        }
    }

    fn mkdir(&self, path: &str) -> Result<()> {
        let path = normalize(path);
        let mut inner = self.lock();
        if inner.exists(&path) {
            return Err(FsError::AlreadyExists { path });
        }
        inner.require_parent_dir(&path)?;
        tracing::trace!(path = %path, "mkdir");
        inner.nodes.insert(path, Node::Directory);
        Ok(())
    }

    fn open(&self, path: &str, mode: OpenMode) -> Result<StreamHandle> {
        let path = normalize(path);
        let mut inner = self.lock();

        if inner.is_dir(&path) {
            return Err(FsError::IsADirectory { path });
        }

        let position = match mode {
            OpenMode::Read => {
                if !inner.exists(&path) {
                    return Err(FsError::NotFound { path });
                }
                0
            }
            OpenMode::Write => {
                inner.require_parent_dir(&path)?;
                inner.nodes.insert(path.clone(), Node::File(Vec::new()));
                0
            }
            OpenMode::Append => {
                inner.require_parent_dir(&path)?;
                match inner
                    .nodes
                    .entry(path.clone())
                    .or_insert_with(|| Node::File(Vec::new()))
                {
                    Node::File(data) => data.len() as u64,
                    Node::Directory => 0,
                }
            }
        };

        let fd = inner.next_fd;
        inner.next_fd += 1;
        inner.streams.insert(
            fd,
            OpenStream {
                path,
                mode,
                position,
            },
        );
        Ok(StreamHandle::new(fd))
    }

    fn write(
        &self,
        stream: StreamHandle,
        buffer: &[u8],
        offset: usize,
        length: usize,
        position: Option<u64>,
    ) -> Result<usize> {
        let end = offset
            .checked_add(length)
            .filter(|end| *end <= buffer.len())
            .ok_or(FsError::OutOfRange {
                offset,
                length,
                available: buffer.len(),
            })?;

        let mut inner = self.lock();
        let Inner { nodes, streams, .. } = &mut *inner;

        let open = streams
            .get_mut(&stream.fd())
            .ok_or(FsError::BadStream(stream))?;
        if !open.mode.is_writable() {
            return Err(FsError::WrongMode(stream));
        }

        let data = match nodes.get_mut(&open.path) {
            Some(Node::File(data)) => data,
            Some(Node::Directory) => {
                return Err(FsError::IsADirectory {
                    path: open.path.clone(),
                })
            }
            None => {
                return Err(FsError::NotFound {
                    path: open.path.clone(),
                })
            }
        };

        let start = position.unwrap_or(open.position);
        let (at, file_end) = usize::try_from(start)
            .ok()
            .and_then(|at| Some((at, at.checked_add(length)?)))
            .filter(|(_, file_end)| *file_end <= MAX_FILE_LEN)
            .ok_or(FsError::PositionTooLarge {
                position: start,
                length,
            })?;
        if data.len() < file_end {
            data.resize(file_end, 0);
        }
        data[at..file_end].copy_from_slice(&buffer[offset..end]);

        if position.is_none() {
            open.position += length as u64;
        }
        Ok(length)
    }

    fn close(&self, stream: StreamHandle) -> Result<()> {
        self.lock()
            .streams
            .remove(&stream.fd())
            .map(|_| ())
            .ok_or(FsError::BadStream(stream))
    }

    fn read_file(&self, path: &str) -> Result<Bytes> {
        let path = normalize(path);
        match self.lock().nodes.get(&path) {
            Some(Node::File(data)) => Ok(Bytes::copy_from_slice(data)),
            Some(Node::Directory) => Err(FsError::IsADirectory { path }),
            None if path.is_empty() => Err(FsError::IsADirectory { path }),
            None => Err(FsError::NotFound { path }),
        }
    }

    fn read_dir(&self, path: &str) -> Result<Vec<(String, NodeKind)>> {
        let path = normalize(path);
        let inner = self.lock();
        if !inner.exists(&path) {
            return Err(FsError::NotFound { path });
        }
        if !inner.is_dir(&path) {
            return Err(FsError::NotADirectory { path });
        }

        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{}/", path)
        };

        Ok(inner
            .nodes
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter(|(key, _)| !key[prefix.len()..].contains('/'))
            .map(|(key, node)| {
                let kind = match node {
                    Node::Directory => NodeKind::Directory,
                    Node::File(_) => NodeKind::File,
                };
                (key[prefix.len()..].to_string(), kind)
            })
            .collect())
    }
}
