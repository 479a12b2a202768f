//! Module paths and the interpreter's virtual filesystem.
//!
//! This crate is the bottom layer of pyhost:
//! - `ModulePath`: a relative source path split into directories and one leaf
//! - `InterpreterFs`: the contract of the interpreter's private filesystem
//! - `MemoryFs`: an in-memory implementation of that contract
//!
//! # Example
//!
//! ```rust
//! use pyhost_vfs::{InterpreterFs, MemoryFs, ModulePath};
//!
//! let fs = MemoryFs::new();
//! let path = ModulePath::parse("lib/pkg/mod.py").unwrap();
//! for prefix in path.prefixes() {
//!     if !fs.analyze_path(&prefix).exists {
//!         fs.mkdir(&prefix).unwrap();
//!     }
//! }
//! assert!(fs.analyze_path("lib/pkg").is_dir);
//! ```

mod error;
mod memory;
mod path;
mod traits;

pub use error::{FsError, Result};
pub use memory::{normalize, MemoryFs, MAX_FILE_LEN};
pub use path::{ModulePath, PathError};
pub use traits::{InterpreterFs, NodeKind, OpenMode, PathInfo, StreamHandle};
