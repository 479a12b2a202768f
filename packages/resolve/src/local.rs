//! Resolution of module paths against a user-granted directory.

use std::sync::Arc;

use pyhost_vfs::ModulePath;
use tokio::sync::OnceCell;

use crate::cache::{CacheKeyPolicy, PersistentCache};
use crate::directory::{find_entry, DirectoryHandle, EntryKind, LocalFile};
use crate::error::{ResolveError, Result};
use crate::picker::DirectoryPicker;

/// Default extension marking a segment as the leaf source file.
pub const DEFAULT_SOURCE_EXTENSION: &str = ".py";

/// State owned by one runtime instance for local resolution.
///
/// Holds the root directory handle (acquired at most once, on first need,
/// through the picker), the persistent cache and the rules for naming cache
/// keys and recognizing source files. Nothing here is reset before the
/// context is dropped.
pub struct LocalResolutionContext {
    picker: Arc<dyn DirectoryPicker>,
    cache: Arc<dyn PersistentCache>,
    root: OnceCell<Arc<dyn DirectoryHandle>>,
    extension: String,
    key_policy: CacheKeyPolicy,
}

impl LocalResolutionContext {
    pub fn new(picker: Arc<dyn DirectoryPicker>, cache: Arc<dyn PersistentCache>) -> Self {
        Self {
            picker,
            cache,
            root: OnceCell::new(),
            extension: DEFAULT_SOURCE_EXTENSION.to_string(),
            key_policy: CacheKeyPolicy::default(),
        }
    }

    /// Use a different source-file extension (including the dot).
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_key_policy(mut self, policy: CacheKeyPolicy) -> Self {
        self.key_policy = policy;
        self
    }

    /// Start with a root that has already been granted; the picker is never asked.
    pub fn with_root(self, root: Arc<dyn DirectoryHandle>) -> Self {
        Self {
            root: OnceCell::new_with(Some(root)),
            ..self
        }
    }

    pub fn cache(&self) -> &Arc<dyn PersistentCache> {
        &self.cache
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn key_policy(&self) -> CacheKeyPolicy {
        self.key_policy
    }

    /// Whether the root directory has been granted yet.
    pub fn has_root(&self) -> bool {
        self.root.initialized()
    }

    /// The root directory, asking the picker the first time.
    ///
    /// Concurrent first callers share a single request.
    pub async fn root(&self) -> Result<Arc<dyn DirectoryHandle>> {
        let root = self
            .root
            .get_or_try_init(|| async {
                tracing::info!("Requesting a source directory from the user");
                let handle = self.picker.request_directory().await?;
                tracing::info!("Using source directory {}", handle.name());
                Ok::<_, ResolveError>(handle)
            })
            .await?;
        Ok(root.clone())
    }

    /// The cache key for a module path under this context's policy.
    pub fn cache_key(&self, path: &ModulePath) -> String {
        self.key_policy.key_for(path)
    }
}

/// Walks the granted directory tree to find a module path.
pub struct LocalDirectoryResolver<'a> {
    context: &'a LocalResolutionContext,
}

impl<'a> LocalDirectoryResolver<'a> {
    pub fn new(context: &'a LocalResolutionContext) -> Self {
        Self { context }
    }

    /// Resolve `path` against the root, acquiring the root first if needed.
    pub async fn resolve(&self, path: &str) -> Result<LocalFile> {
        let module = ModulePath::parse(path)?;
        let root = self.context.root().await?;
        walk(root, &module, self.context.extension()).await
    }
}

/// Descend from `root` along `path` and return the leaf file.
///
/// Segments are consumed from the root side. Each segment that does not end
/// in `extension` names a directory to descend into; the first segment that
/// does (or the final segment, whichever comes first) names the leaf file.
/// The leaf is matched by its raw filename, so `mod.py?v=2` finds `mod.py`.
pub async fn walk(
    root: Arc<dyn DirectoryHandle>,
    path: &ModulePath,
    extension: &str,
) -> Result<LocalFile> {
    let mut remaining: Vec<&str> = path.directories().iter().map(String::as_str).collect();
    remaining.push(path.raw_filename());
    remaining.reverse();

    let not_found = |segment: &str| ResolveError::NotFound {
        path: path.to_string(),
        segment: segment.to_string(),
    };

    let mut current = root;
    while let Some(segment) = remaining.pop() {
        let is_leaf = segment.ends_with(extension) || remaining.is_empty();

        match find_entry(current.as_ref(), segment).await? {
            Some(EntryKind::File(file)) if is_leaf => {
                tracing::trace!("Found {} in {}", segment, current.name());
                return file.get_file().await;
            }
            Some(EntryKind::Directory(dir)) if !is_leaf => {
                tracing::trace!("Descending into {}", segment);
                current = dir;
            }
            _ => return Err(not_found(segment)),
        }
    }

    Err(not_found(path.leaf()))
}
