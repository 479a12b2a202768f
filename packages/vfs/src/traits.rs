//! The interpreter filesystem contract.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::Result;

/// What `analyze_path` learned about a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PathInfo {
    /// Something exists at the path.
    pub exists: bool,
    /// The directory containing the path exists.
    pub parent_exists: bool,
    /// The path exists and is a directory.
    pub is_dir: bool,
}

/// How a stream is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read an existing file.
    Read,
    /// Create or truncate, then write.
    Write,
    /// Create if missing, then write at the end.
    Append,
}

impl OpenMode {
    /// Parse the short flag strings interpreter filesystems use (`r`, `w`, `a`).
    pub fn from_flags(flags: &str) -> Option<Self> {
        match flags {
            "r" | "rb" => Some(OpenMode::Read),
            "w" | "wb" | "w+" => Some(OpenMode::Write),
            "a" | "ab" | "a+" => Some(OpenMode::Append),
            _ => None,
        }
    }

    pub fn is_writable(&self) -> bool {
        !matches!(self, OpenMode::Read)
    }
}

/// An open stream inside an interpreter filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamHandle(u32);

impl StreamHandle {
    pub fn new(fd: u32) -> Self {
        Self(fd)
    }

    pub fn fd(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fd {}", self.0)
    }
}

/// Kind of a node listed by `read_dir`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NodeKind {
    File,
    Directory,
}

/// The interpreter's private filesystem.
///
/// Paths are slash-separated and relative to the filesystem root; a leading
/// `/` is accepted and ignored. All methods take `&self` so one filesystem can
/// be shared between the interpreter and the code that populates it.
///
/// # Object Safety
///
/// This trait is object-safe: you can use `Arc<dyn InterpreterFs>`.
pub trait InterpreterFs: Send + Sync {
    /// Report whether a path and its parent exist.
    fn analyze_path(&self, path: &str) -> PathInfo;

    /// Create a single directory. The parent must already exist.
    fn mkdir(&self, path: &str) -> Result<()>;

    /// Open a file.
    fn open(&self, path: &str, mode: OpenMode) -> Result<StreamHandle>;

    /// Write `buffer[offset..offset + length]` to the stream.
    ///
    /// With `position` set, the bytes land at that file position and the
    /// stream position is left alone; otherwise they land at the stream
    /// position, which then advances. Returns the number of bytes written.
    fn write(
        &self,
        stream: StreamHandle,
        buffer: &[u8],
        offset: usize,
        length: usize,
        position: Option<u64>,
    ) -> Result<usize>;

    /// Close a stream.
    fn close(&self, stream: StreamHandle) -> Result<()>;

    /// Read a whole file.
    fn read_file(&self, path: &str) -> Result<Bytes>;

    /// List a directory, sorted by name.
    fn read_dir(&self, path: &str) -> Result<Vec<(String, NodeKind)>>;
}

impl<T: InterpreterFs + ?Sized> InterpreterFs for Arc<T> {
    fn analyze_path(&self, path: &str) -> PathInfo {
        self.as_ref().analyze_path(path)
    }

    fn mkdir(&self, path: &str) -> Result<()> {
        self.as_ref().mkdir(path)
    }

    fn open(&self, path: &str, mode: OpenMode) -> Result<StreamHandle> {
        self.as_ref().open(path, mode)
    }

    fn write(
        &self,
        stream: StreamHandle,
        buffer: &[u8],
        offset: usize,
        length: usize,
        position: Option<u64>,
    ) -> Result<usize> {
        self.as_ref()
            .write(stream, buffer, offset, length, position)
    }

    fn close(&self, stream: StreamHandle) -> Result<()> {
        self.as_ref().close(stream)
    }

    fn read_file(&self, path: &str) -> Result<Bytes> {
        self.as_ref().read_file(path)
    }

    fn read_dir(&self, path: &str) -> Result<Vec<(String, NodeKind)>> {
        self.as_ref().read_dir(path)
    }
}
