//! # pyhost-resolve
//!
//! Source resolution for pyhost.
//!
//! A [`SourceResolver`] turns a relative module path into a
//! [`ResolvedSource`]. Which source answers depends on the base URL:
//!
//! - **served** (`http:`, `https:`, ...): the path is joined onto the base
//!   URL and fetched with a [`NetworkFetcher`]. Non-200 responses are
//!   returned as-is.
//! - **local** (`file:`): the [`PersistentCache`] is consulted first; on a
//!   miss the path is walked inside a directory the user granted once via a
//!   [`DirectoryPicker`]. The file's text is written to the cache the first
//!   time its body is read.
//!
//! ```ignore
//! use pyhost_resolve::{
//!     DiskCache, FixedDirectoryPicker, LocalResolutionContext, ReqwestFetcher, SourceResolver,
//! };
//!
//! let context = LocalResolutionContext::new(
//!     Arc::new(FixedDirectoryPicker::from_path("./project")),
//!     Arc::new(DiskCache::open("cache.json")?),
//! );
//! let resolver = SourceResolver::new(
//!     Url::parse("file:///")?,
//!     context,
//!     Arc::new(ReqwestFetcher::with_default_timeout()?),
//! );
//!
//! let source = resolver.safe_fetch("lib/pkg/mod.py").await?;
//! println!("{} {} from {}", source.status(), source.status_text(), source.origin());
//! ```

pub mod cache;
pub mod directory;
pub mod error;
pub mod network;
pub mod picker;
pub mod source;

mod fs_directory;
mod local;
mod resolver;

pub use cache::{CacheKeyPolicy, DiskCache, MemoryCache, PersistentCache};
pub use directory::{
    find_entry, DirEntry, DirectoryHandle, EntryKind, EntryStream, FileHandle, LocalFile,
    MemoryDirectory, MemoryFile, VecEntryStream,
};
pub use error::{ResolveError, Result};
pub use fs_directory::{FsDirectory, FsFile};
pub use local::{walk, LocalDirectoryResolver, LocalResolutionContext, DEFAULT_SOURCE_EXTENSION};
pub use network::{NetworkFetcher, ReqwestFetcher};
pub use picker::{DirectoryPicker, FixedDirectoryPicker};
pub use resolver::SourceResolver;
pub use source::{status_text_for, BodySource, Origin, ResolvedSource};
