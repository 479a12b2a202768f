//! Runtime configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use pyhost_resolve::{
    CacheKeyPolicy, DirectoryPicker, DiskCache, LocalResolutionContext, MemoryCache, PersistentCache,
    ReqwestFetcher, SourceResolver,
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, RuntimeError};

/// Configuration for a pyhost runtime.
///
/// Every field has a default, so `{}` is a valid configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Base URL relative source paths are resolved against.
    ///
    /// A `file:` URL selects local-directory resolution.
    pub base_url: String,

    /// Use local-directory resolution even for a served base URL.
    pub force_local: bool,

    /// Extension marking a path segment as the leaf source file.
    pub source_extension: String,

    /// Name of the package installer module and the global it binds.
    pub installer_global: String,

    /// Interpreter-level packages loaded right after bootstrap.
    pub preload_packages: Vec<String>,

    /// Where to persist the local-resolution cache. In memory when unset.
    pub cache_path: Option<PathBuf>,

    /// How cache keys are derived: `raw_filename` or `full_path`.
    pub cache_key_policy: CacheKeyPolicy,

    /// Network fetch timeout in seconds.
    pub fetch_timeout_secs: u64,

    /// Load the full standard library instead of the reduced footprint.
    pub full_stdlib: bool,

    /// Where the interpreter image fetches its own packages from.
    pub index_url: Option<String>,

    /// Application data, passed through untouched.
    pub extra: serde_json::Value,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            base_url: "file:///".to_string(),
            force_local: false,
            source_extension: pyhost_resolve::DEFAULT_SOURCE_EXTENSION.to_string(),
            installer_global: "micropip".to_string(),
            preload_packages: Vec::new(),
            cache_path: None,
            cache_key_policy: CacheKeyPolicy::default(),
            fetch_timeout_secs: 30,
            full_stdlib: false,
            index_url: None,
            extra: serde_json::Value::Null,
        }
    }
}

impl RuntimeConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| RuntimeError::Config(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("Reading configuration from {}", path.display());
        let text = std::fs::read_to_string(path)
            .map_err(|e| RuntimeError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    /// The parsed base URL.
    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.base_url)
            .map_err(|e| RuntimeError::Config(format!("invalid base_url '{}': {}", self.base_url, e)))
    }

    /// Whether sources resolve from the local directory and cache.
    pub fn is_local(&self) -> Result<bool> {
        Ok(self.force_local || self.base_url()?.scheme() == "file")
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Open the persistent cache this configuration names.
    pub fn open_cache(&self) -> Result<Arc<dyn PersistentCache>> {
        Ok(match &self.cache_path {
            Some(path) => Arc::new(DiskCache::open(path)?),
            None => Arc::new(MemoryCache::new()),
        })
    }

    /// Build a source resolver that asks `picker` for the local root.
    pub fn build_resolver(&self, picker: Arc<dyn DirectoryPicker>) -> Result<SourceResolver> {
        let context = LocalResolutionContext::new(picker, self.open_cache()?)
            .with_extension(self.source_extension.clone())
            .with_key_policy(self.cache_key_policy);
        let fetcher = ReqwestFetcher::new(self.fetch_timeout())?;
        Ok(SourceResolver::new(self.base_url()?, context, Arc::new(fetcher))
            .force_local(self.force_local))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_is_default() {
        let config = RuntimeConfig::from_json_str("{}").unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert!(config.is_local().unwrap());
        assert_eq!(config.fetch_timeout(), Duration::from_secs(30));
        assert_eq!(config.source_extension, ".py");
        assert_eq!(config.installer_global, "micropip");
    }

    #[test]
    fn served_base_url() {
        let config =
            RuntimeConfig::from_json_str(r#"{"base_url": "https://example.com/app/"}"#).unwrap();
        assert!(!config.is_local().unwrap());
        assert_eq!(config.base_url().unwrap().host_str(), Some("example.com"));
    }

    #[test]
    fn force_local_overrides_scheme() {
        let config = RuntimeConfig::from_json_str(
            r#"{"base_url": "http://localhost:8000/", "force_local": true}"#,
        )
        .unwrap();
        assert!(config.is_local().unwrap());
    }

    #[test]
    fn extra_passes_through() {
        let config = RuntimeConfig::from_json_str(
            r#"{"preload_packages": ["numpy"], "extra": {"theme": "dark", "n": [1, 2]}}"#,
        )
        .unwrap();
        assert_eq!(config.preload_packages, vec!["numpy"]);
        assert_eq!(config.extra["theme"], "dark");
        assert_eq!(config.extra["n"][1], 2);
    }

    #[test]
    fn bad_documents_are_config_errors() {
        assert!(matches!(
            RuntimeConfig::from_json_str("{"),
            Err(RuntimeError::Config(_))
        ));
        let config = RuntimeConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.base_url(), Err(RuntimeError::Config(_))));
    }

    #[test]
    fn from_file_reads_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"cache_path": "/tmp/pyhost-cache.json", "full_stdlib": true}}"#).unwrap();

        let config = RuntimeConfig::from_file(file.path()).unwrap();
        assert_eq!(
            config.cache_path.as_deref(),
            Some(Path::new("/tmp/pyhost-cache.json"))
        );
        assert!(config.full_stdlib);
    }

    #[test]
    fn resolver_follows_config() {
        let picker = Arc::new(pyhost_resolve::FixedDirectoryPicker::from_path("."));

        let local = RuntimeConfig::default().build_resolver(picker.clone()).unwrap();
        assert!(local.is_local());
        assert_eq!(local.context().extension(), ".py");
        assert_eq!(local.context().key_policy(), CacheKeyPolicy::RawFilename);

        let served = RuntimeConfig {
            base_url: "https://example.com/app/".to_string(),
            source_extension: ".pyw".to_string(),
            ..Default::default()
        }
        .build_resolver(picker)
        .unwrap();
        assert!(!served.is_local());
        assert_eq!(served.context().extension(), ".pyw");
    }

    #[test]
    fn full_path_keys_from_config() {
        let config = RuntimeConfig::from_json_str(r#"{"cache_key_policy": "full_path"}"#).unwrap();
        assert_eq!(config.cache_key_policy, CacheKeyPolicy::FullPath);

        let picker = Arc::new(pyhost_resolve::FixedDirectoryPicker::from_path("."));
        let resolver = config.build_resolver(picker).unwrap();
        assert_eq!(resolver.context().key_policy(), CacheKeyPolicy::FullPath);
        let path = pyhost_vfs::ModulePath::parse("lib/util.py").unwrap();
        assert_eq!(resolver.context().cache_key(&path), "lib/util.py");
    }

    #[test]
    fn disk_cache_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = RuntimeConfig {
            cache_path: Some(dir.path().join("cache.json")),
            ..Default::default()
        };
        config.open_cache().unwrap().set_item("main.py", "x").unwrap();
        assert_eq!(
            config.open_cache().unwrap().get_item("main.py").unwrap().as_deref(),
            Some("x")
        );
    }

    #[test]
    fn from_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = RuntimeConfig::from_file(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, RuntimeError::Config(_)));
    }
}
