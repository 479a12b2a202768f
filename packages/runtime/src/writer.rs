//! Materializing resolved sources inside the interpreter filesystem.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use pyhost_resolve::SourceResolver;
use pyhost_vfs::{InterpreterFs, ModulePath, OpenMode};
use tokio::sync::OnceCell;

use crate::error::LoadError;

type Outcome = Result<(), LoadError>;

/// A materialization underway, with the source it was started for.
#[derive(Clone)]
struct Pending {
    source: String,
    cell: Arc<OnceCell<Outcome>>,
}

/// Writes resolved sources into an interpreter filesystem.
///
/// Concurrent calls for the same target path share one resolution and one
/// write; every caller receives the same outcome. Once that write finishes
/// the target is free again, so a later call resolves and writes afresh.
/// A caller that joins with a different source still gets the outcome of
/// the source already in flight.
pub struct VirtualFileWriter {
    fs: Arc<dyn InterpreterFs>,
    resolver: Arc<SourceResolver>,
    in_flight: Mutex<HashMap<String, Pending>>,
}

impl VirtualFileWriter {
    pub fn new(fs: Arc<dyn InterpreterFs>, resolver: Arc<SourceResolver>) -> Self {
        Self {
            fs,
            resolver,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn resolver(&self) -> &Arc<SourceResolver> {
        &self.resolver
    }

    pub fn fs(&self) -> &Arc<dyn InterpreterFs> {
        &self.fs
    }

    /// Resolve `source` and write it at `target`, creating missing directories.
    ///
    /// Directories are created one prefix at a time, root to leaf, before the
    /// source is resolved. The leaf is rewritten on every call.
    pub async fn load_from_file(&self, target: &str, source: &str) -> Outcome {
        let target = ModulePath::parse(target)?;
        let key = target.to_string();

        let cell = {
            let mut in_flight = self.lock();
            let pending = in_flight.entry(key.clone()).or_insert_with(|| Pending {
                source: source.to_string(),
                cell: Arc::default(),
            });
            if pending.source != source {
                tracing::debug!(
                    "Load of {} from {} joins the one already in flight from {}",
                    key,
                    source,
                    pending.source
                );
            }
            pending.cell.clone()
        };

        let outcome = cell
            .get_or_init(|| self.materialize(&target, source))
            .await
            .clone();

        let mut in_flight = self.lock();
        if in_flight
            .get(&key)
            .is_some_and(|current| Arc::ptr_eq(&current.cell, &cell))
        {
            in_flight.remove(&key);
        }

        outcome
    }

    /// Number of targets currently being materialized.
    pub fn in_flight(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Pending>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn materialize(&self, target: &ModulePath, source: &str) -> Outcome {
        for prefix in target.prefixes() {
            let info = self.fs.analyze_path(&prefix);
            if !info.parent_exists {
                tracing::error!("Parent of {} is missing while materializing {}", prefix, target);
                return Err(LoadError::ParentMissing { path: prefix });
            }
            if !info.exists {
                tracing::debug!("Creating directory {}", prefix);
                self.fs.mkdir(&prefix)?;
            }
        }

        let resolved = self
            .resolver
            .safe_fetch(source)
            .await
            .map_err(|e| LoadError::from_resolve(source, e))?;

        if !resolved.is_ok() {
            return Err(LoadError::Fetch {
                path: source.to_string(),
                status: resolved.status(),
                status_text: resolved.status_text().to_string(),
            });
        }

        let bytes = resolved
            .bytes()
            .await
            .map_err(|e| LoadError::from_resolve(source, e))?;

        let path = target.to_string();
        let stream = self.fs.open(&path, OpenMode::Write)?;
        let written = self.fs.write(stream, &bytes, 0, bytes.len(), Some(0));
        self.fs.close(stream)?;
        written?;

        tracing::debug!(
            "Wrote {} bytes to {} from {} ({})",
            bytes.len(),
            path,
            source,
            resolved.origin()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use pyhost_resolve::{
        status_text_for, FixedDirectoryPicker, LocalResolutionContext, MemoryCache,
        MemoryDirectory, NetworkFetcher, Origin, ResolvedSource,
    };
    use pyhost_vfs::{FsError, MemoryFs, PathInfo, StreamHandle};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;

    /// Serves a fixed table, yielding once per fetch so callers can interleave.
    #[derive(Default)]
    struct TableFetcher {
        bodies: Mutex<BTreeMap<String, (u16, &'static str)>>,
        fetches: AtomicUsize,
    }

    impl TableFetcher {
        fn with(self, path: &str, status: u16, body: &'static str) -> Self {
            self.bodies
                .lock()
                .unwrap()
                .insert(format!("http://localhost/{}", path), (status, body));
            self
        }

        fn set(&self, path: &str, body: &'static str) {
            self.bodies
                .lock()
                .unwrap()
                .insert(format!("http://localhost/{}", path), (200, body));
        }
    }

    #[async_trait]
    impl NetworkFetcher for TableFetcher {
        async fn fetch(&self, url: &Url) -> pyhost_resolve::Result<ResolvedSource> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            let (status, body) = self
                .bodies
                .lock()
                .unwrap()
                .get(url.as_str())
                .copied()
                .unwrap_or((404, ""));
            Ok(ResolvedSource::from_bytes(
                status,
                status_text_for(status),
                Origin::Network,
                Bytes::from_static(body.as_bytes()),
            ))
        }
    }

    /// Records directory creation on top of a MemoryFs.
    struct Tracking {
        inner: MemoryFs,
        mkdirs: Mutex<Vec<String>>,
    }

    impl InterpreterFs for Tracking {
        fn analyze_path(&self, path: &str) -> PathInfo {
            self.inner.analyze_path(path)
        }

        fn mkdir(&self, path: &str) -> pyhost_vfs::Result<()> {
            self.mkdirs.lock().unwrap().push(path.to_string());
            self.inner.mkdir(path)
        }

        fn open(&self, path: &str, mode: OpenMode) -> pyhost_vfs::Result<StreamHandle> {
            self.inner.open(path, mode)
        }

        fn write(
            &self,
            stream: StreamHandle,
            buffer: &[u8],
            offset: usize,
            length: usize,
            position: Option<u64>,
        ) -> pyhost_vfs::Result<usize> {
            self.inner.write(stream, buffer, offset, length, position)
        }

        fn close(&self, stream: StreamHandle) -> pyhost_vfs::Result<()> {
            self.inner.close(stream)
        }

        fn read_file(&self, path: &str) -> pyhost_vfs::Result<Bytes> {
            self.inner.read_file(path)
        }

        fn read_dir(&self, path: &str) -> pyhost_vfs::Result<Vec<(String, pyhost_vfs::NodeKind)>> {
            self.inner.read_dir(path)
        }
    }

    /// Claims every parent is missing.
    struct Orphaned;

    impl InterpreterFs for Orphaned {
        fn analyze_path(&self, _path: &str) -> PathInfo {
            PathInfo::default()
        }

        fn mkdir(&self, path: &str) -> pyhost_vfs::Result<()> {
            Err(FsError::ParentMissing {
                path: path.to_string(),
            })
        }

        fn open(&self, path: &str, _mode: OpenMode) -> pyhost_vfs::Result<StreamHandle> {
            Err(FsError::NotFound {
                path: path.to_string(),
            })
        }

        fn write(
            &self,
            stream: StreamHandle,
            _buffer: &[u8],
            _offset: usize,
            _length: usize,
            _position: Option<u64>,
        ) -> pyhost_vfs::Result<usize> {
            Err(FsError::BadStream(stream))
        }

        fn close(&self, stream: StreamHandle) -> pyhost_vfs::Result<()> {
            Err(FsError::BadStream(stream))
        }

        fn read_file(&self, path: &str) -> pyhost_vfs::Result<Bytes> {
            Err(FsError::NotFound {
                path: path.to_string(),
            })
        }

        fn read_dir(&self, path: &str) -> pyhost_vfs::Result<Vec<(String, pyhost_vfs::NodeKind)>> {
            Err(FsError::NotFound {
                path: path.to_string(),
            })
        }
    }

    fn served(fetcher: Arc<TableFetcher>) -> Arc<SourceResolver> {
        Arc::new(SourceResolver::new(
            Url::parse("http://localhost/").unwrap(),
            LocalResolutionContext::new(
                Arc::new(FixedDirectoryPicker::new(Arc::new(MemoryDirectory::new("unused")))),
                Arc::new(MemoryCache::new()),
            ),
            fetcher,
        ))
    }

    fn tracking() -> Arc<Tracking> {
        Arc::new(Tracking {
            inner: MemoryFs::new(),
            mkdirs: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn creates_directories_root_to_leaf_once() {
        let fetcher = Arc::new(TableFetcher::default().with("lib/pkg/mod.py", 200, "VALUE = 1"));
        let fs = tracking();
        let writer = VirtualFileWriter::new(fs.clone(), served(fetcher));

        writer
            .load_from_file("lib/pkg/mod.py", "lib/pkg/mod.py")
            .await
            .unwrap();
        writer
            .load_from_file("lib/pkg/mod.py", "lib/pkg/mod.py")
            .await
            .unwrap();

        assert_eq!(*fs.mkdirs.lock().unwrap(), vec!["lib", "lib/pkg"]);
        assert_eq!(&fs.read_file("lib/pkg/mod.py").unwrap()[..], b"VALUE = 1");
        assert_eq!(fs.inner.open_streams(), 0);
    }

    #[tokio::test]
    async fn last_write_wins() {
        let fetcher = Arc::new(TableFetcher::default().with("a.py", 200, "first version"));
        let fs = Arc::new(MemoryFs::new());
        let writer = VirtualFileWriter::new(fs.clone(), served(fetcher.clone()));

        writer.load_from_file("a.py", "a.py").await.unwrap();
        fetcher.set("a.py", "second");
        writer.load_from_file("a.py", "a.py").await.unwrap();

        assert_eq!(&fs.read_file("a.py").unwrap()[..], b"second");
        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn target_and_source_may_differ() {
        let fetcher = Arc::new(TableFetcher::default().with("v2/util.py?h=abc", 200, "x = 2"));
        let fs = Arc::new(MemoryFs::new());
        let writer = VirtualFileWriter::new(fs.clone(), served(fetcher));

        writer
            .load_from_file("site/util.py", "v2/util.py?h=abc")
            .await
            .unwrap();
        assert_eq!(fs.tree(), vec!["site/", "site/util.py"]);
    }

    #[tokio::test]
    async fn non_200_is_fetch_error_and_writes_nothing() {
        let fetcher = Arc::new(TableFetcher::default());
        let fs = Arc::new(MemoryFs::new());
        let writer = VirtualFileWriter::new(fs.clone(), served(fetcher));

        let err = writer
            .load_from_file("lib/missing.py", "lib/missing.py")
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("lib/missing.py"));
        assert!(message.contains("404"));
        assert!(message.contains("Not Found"));
        assert!(!fs.analyze_path("lib/missing.py").exists);
        // Directories are created before resolution.
        assert!(fs.analyze_path("lib").is_dir);
    }

    #[tokio::test]
    async fn server_error_status_is_reported() {
        let fetcher = Arc::new(TableFetcher::default().with("boom.py", 500, "oops"));
        let writer = VirtualFileWriter::new(Arc::new(MemoryFs::new()), served(fetcher));

        let err = writer.load_from_file("boom.py", "boom.py").await.unwrap_err();
        assert!(matches!(
            err,
            LoadError::Fetch { status: 500, ref status_text, .. } if status_text == "Internal Server Error"
        ));
    }

    #[tokio::test]
    async fn missing_parent_is_fatal() {
        let fetcher = Arc::new(TableFetcher::default().with("a/b.py", 200, "x"));
        let writer = VirtualFileWriter::new(Arc::new(Orphaned), served(fetcher.clone()));

        let err = writer.load_from_file("a/b.py", "a/b.py").await.unwrap_err();
        assert!(matches!(err, LoadError::ParentMissing { ref path } if path == "a"));
        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_target_is_rejected() {
        let writer = VirtualFileWriter::new(
            Arc::new(MemoryFs::new()),
            served(Arc::new(TableFetcher::default())),
        );
        let err = writer.load_from_file("/", "main.py").await.unwrap_err();
        assert!(matches!(err, LoadError::Path(_)));
    }

    #[tokio::test]
    async fn concurrent_calls_share_one_write() {
        let fetcher = Arc::new(TableFetcher::default().with("app/main.py", 200, "print(1)"));
        let fs = tracking();
        let writer = VirtualFileWriter::new(fs.clone(), served(fetcher.clone()));

        let (a, b) = tokio::join!(
            writer.load_from_file("app/main.py", "app/main.py"),
            writer.load_from_file("app/main.py", "app/main.py"),
        );
        a.unwrap();
        b.unwrap();

        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(*fs.mkdirs.lock().unwrap(), vec!["app"]);
        assert_eq!(writer.in_flight(), 0);
    }

    #[tokio::test]
    async fn joining_caller_gets_the_source_in_flight() {
        let fetcher = Arc::new(
            TableFetcher::default()
                .with("v1/main.py", 200, "print(1)")
                .with("v2/main.py", 200, "print(2)"),
        );
        let fs = tracking();
        let writer = VirtualFileWriter::new(fs.clone(), served(fetcher.clone()));

        let (a, b) = tokio::join!(
            writer.load_from_file("main.py", "v1/main.py"),
            writer.load_from_file("main.py", "v2/main.py"),
        );
        a.unwrap();
        b.unwrap();

        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(&fs.inner.read_file("main.py").unwrap()[..], b"print(1)");
        assert_eq!(writer.in_flight(), 0);

        writer.load_from_file("main.py", "v2/main.py").await.unwrap();
        assert_eq!(&fs.inner.read_file("main.py").unwrap()[..], b"print(2)");
    }

    #[tokio::test]
    async fn concurrent_failures_reach_every_caller() {
        let fetcher = Arc::new(TableFetcher::default());
        let writer =
            VirtualFileWriter::new(Arc::new(MemoryFs::new()), served(fetcher.clone()));

        let (a, b) = tokio::join!(
            writer.load_from_file("gone.py", "gone.py"),
            writer.load_from_file("gone.py", "gone.py"),
        );
        assert_eq!(a.unwrap_err().status(), Some(404));
        assert_eq!(b.unwrap_err().status(), Some(404));
        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(writer.in_flight(), 0);
    }

    #[tokio::test]
    async fn local_miss_reads_as_404() {
        let resolver = Arc::new(SourceResolver::new(
            Url::parse("file:///").unwrap(),
            LocalResolutionContext::new(
                Arc::new(FixedDirectoryPicker::new(Arc::new(
                    MemoryDirectory::new("project").with_file("lib/other.py", ""),
                ))),
                Arc::new(MemoryCache::new()),
            ),
            Arc::new(TableFetcher::default()),
        ));
        let writer = VirtualFileWriter::new(Arc::new(MemoryFs::new()), resolver);

        let err = writer
            .load_from_file("lib/absent.py", "lib/absent.py")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "failed to fetch lib/absent.py: 404 Not Found");
    }
}
