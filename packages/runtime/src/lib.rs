//! # pyhost-runtime
//!
//! The interpreter lifecycle and the writer that fills its filesystem.
//!
//! - [`InterpreterLifecycle`] boots an interpreter through an
//!   [`ImageLoader`], loads the package installer, runs the bootstrap source
//!   and then serves `run`, module registration, package loading and
//!   installation.
//! - [`VirtualFileWriter`] resolves a source path through a
//!   [`SourceResolver`](pyhost_resolve::SourceResolver) and writes it into
//!   the interpreter's [`InterpreterFs`](pyhost_vfs::InterpreterFs),
//!   creating intermediate directories root to leaf.
//! - [`RuntimeConfig`] is the JSON configuration both are built from.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod interpreter;

mod lifecycle;
mod writer;

pub use config::RuntimeConfig;
pub use error::{LoadError, Result, RuntimeError};
pub use interpreter::{
    stderr_sink, stdout_sink, Globals, HostModule, ImageLoader, ImageOptions, Interpreter,
    LineSink, PackageInstaller,
};
pub use lifecycle::InterpreterLifecycle;
pub use writer::VirtualFileWriter;
