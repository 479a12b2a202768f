//! Per-request choice between the network, the cache and a local directory.

use std::sync::Arc;

use pyhost_vfs::ModulePath;
use url::Url;

use crate::error::Result;
use crate::local::{LocalDirectoryResolver, LocalResolutionContext};
use crate::network::NetworkFetcher;
use crate::source::ResolvedSource;

/// Resolves module paths to [`ResolvedSource`]s.
///
/// When the base URL is served (anything but `file:`), every request is a
/// network fetch relative to it. When the base URL is local, requests are
/// answered from the persistent cache if possible and otherwise by walking
/// the user-granted directory.
///
/// # Example
///
/// ```rust,ignore
/// let resolver = SourceResolver::new(base_url, context, Arc::new(ReqwestFetcher::with_default_timeout()?));
/// let source = resolver.safe_fetch("lib/pkg/mod.py").await?;
/// if source.is_ok() {
///     println!("{}", source.text().await?);
/// }
/// ```
pub struct SourceResolver {
    base_url: Url,
    local: bool,
    context: LocalResolutionContext,
    fetcher: Arc<dyn NetworkFetcher>,
}

impl SourceResolver {
    pub fn new(
        base_url: Url,
        context: LocalResolutionContext,
        fetcher: Arc<dyn NetworkFetcher>,
    ) -> Self {
        let local = base_url.scheme() == "file";
        Self {
            base_url,
            local,
            context,
            fetcher,
        }
    }

    /// Treat the context as local regardless of the base URL.
    pub fn force_local(mut self, force: bool) -> Self {
        self.local = self.local || force;
        self
    }

    /// Whether requests are served from the local directory and cache.
    pub fn is_local(&self) -> bool {
        self.local
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn context(&self) -> &LocalResolutionContext {
        &self.context
    }

    /// Resolve `path` from whichever source this context uses.
    ///
    /// A non-200 network response is returned as-is, not as an error. A local
    /// miss is an error ([`ResolveError::NotFound`](crate::ResolveError::NotFound)).
    pub async fn safe_fetch(&self, path: &str) -> Result<ResolvedSource> {
        if !self.local {
            let url = self.base_url.join(path)?;
            return self.fetcher.fetch(&url).await;
        }

        let module = ModulePath::parse(path)?;
        let key = self.context.cache_key(&module);

        if let Some(text) = self.context.cache().get_item(&key)? {
            tracing::debug!("Serving {} from cache entry {}", module, key);
            return Ok(ResolvedSource::cached(text));
        }

        tracing::debug!("Resolving {} from the local directory", module);
        let file = LocalDirectoryResolver::new(&self.context)
            .resolve(path)
            .await?;
        Ok(ResolvedSource::local(
            file,
            self.context.cache().clone(),
            key,
        ))
    }
}
