//! Error types for the virtual filesystem.

use thiserror::Error;

use crate::traits::StreamHandle;

/// Errors raised by an [`InterpreterFs`](crate::InterpreterFs) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FsError {
    /// Nothing exists at the path.
    #[error("no such file or directory: {path}")]
    NotFound { path: String },

    /// A node already exists at the path.
    #[error("file exists: {path}")]
    AlreadyExists { path: String },

    /// The parent of the path does not exist.
    #[error("parent directory missing: {path}")]
    ParentMissing { path: String },

    /// A path component that must be a directory is a file.
    #[error("not a directory: {path}")]
    NotADirectory { path: String },

    /// The path names a directory where a file was expected.
    #[error("is a directory: {path}")]
    IsADirectory { path: String },

    /// The stream handle is not open.
    #[error("bad stream handle: {0}")]
    BadStream(StreamHandle),

    /// The write arguments lie outside the supplied buffer.
    #[error("write range {offset}+{length} exceeds buffer of {available} bytes")]
    OutOfRange {
        offset: usize,
        length: usize,
        available: usize,
    },

    /// Writing at the position would grow the file past its size limit.
    #[error("write of {length} bytes at position {position} exceeds the file size limit")]
    PositionTooLarge { position: u64, length: usize },

    /// The stream was opened without the capability the operation needs.
    #[error("stream {0} was not opened for this operation")]
    WrongMode(StreamHandle),
}

/// Result type alias for filesystem operations.
pub type Result<T> = std::result::Result<T, FsError>;
