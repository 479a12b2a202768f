//! # pyhost
//!
//! Host a WASM-built language interpreter and feed its virtual filesystem
//! with sources that come from a server or, when there is none, from a
//! directory the user picks once.
//!
//! This crate re-exports the layers it is built from:
//!
//! - [`vfs`]: module paths and the interpreter filesystem contract
//! - [`resolve`]: network, cache and local-directory source resolution
//! - [`runtime`]: the interpreter lifecycle and the file writer
//!
//! It also provides the terminal [`PromptDirectoryPicker`] and the `pyhost`
//! command line in [`cli`].
//!
//! ```ignore
//! use pyhost::{InterpreterLifecycle, PromptDirectoryPicker, RuntimeConfig};
//!
//! let config = RuntimeConfig::from_file("pyhost.json")?;
//! let resolver = config.build_resolver(Arc::new(PromptDirectoryPicker::stdio()))?;
//! let runtime = InterpreterLifecycle::new(config, loader, Arc::new(resolver));
//! runtime.load_interpreter().await?;
//! runtime.import_from_file("app/main.py").await?;
//! ```

pub mod cli;
pub mod prompt;

pub use pyhost_resolve as resolve;
pub use pyhost_runtime as runtime;
pub use pyhost_vfs as vfs;

pub use prompt::PromptDirectoryPicker;
pub use pyhost_resolve::{
    DirectoryPicker, FixedDirectoryPicker, LocalResolutionContext, ResolveError, ResolvedSource,
    SourceResolver,
};
pub use pyhost_runtime::{
    ImageLoader, InterpreterLifecycle, LoadError, RuntimeConfig, RuntimeError, VirtualFileWriter,
};
pub use pyhost_vfs::{InterpreterFs, MemoryFs, ModulePath};
