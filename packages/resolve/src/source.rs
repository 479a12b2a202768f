//! The normalized result of resolving a path.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use tokio::sync::OnceCell;

use crate::cache::PersistentCache;
use crate::directory::LocalFile;
use crate::error::{ResolveError, Result};

/// Where a resolved source's bytes came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Network,
    Cache,
    LocalDirectory,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Network => write!(f, "network"),
            Origin::Cache => write!(f, "cache"),
            Origin::LocalDirectory => write!(f, "local directory"),
        }
    }
}

/// Loads the body of a resolved source on first read.
#[async_trait]
pub trait BodySource: Send + Sync {
    async fn load(&self) -> Result<Bytes>;
}

struct LocalFileBody(LocalFile);

#[async_trait]
impl BodySource for LocalFileBody {
    async fn load(&self) -> Result<Bytes> {
        Ok(self.0.bytes())
    }
}

struct CacheWriteBack {
    cache: Arc<dyn PersistentCache>,
    key: String,
}

/// A resolved source: status, status text, and content accessors.
///
/// The body is loaded at most once; `bytes()` and `text()` may each be called
/// any number of times. A source resolved from a local directory writes its
/// decoded text into the persistent cache the first time either accessor
/// succeeds.
pub struct ResolvedSource {
    status: u16,
    status_text: String,
    origin: Origin,
    body: OnceCell<Bytes>,
    loader: Option<Box<dyn BodySource>>,
    write_back: Option<CacheWriteBack>,
}

impl ResolvedSource {
    /// A source whose body is already in hand.
    pub fn from_bytes(
        status: u16,
        status_text: impl Into<String>,
        origin: Origin,
        body: impl Into<Bytes>,
    ) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            origin,
            body: OnceCell::new_with(Some(body.into())),
            loader: None,
            write_back: None,
        }
    }

    /// A source whose body is loaded lazily.
    pub fn from_loader(
        status: u16,
        status_text: impl Into<String>,
        origin: Origin,
        loader: Box<dyn BodySource>,
    ) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            origin,
            body: OnceCell::new(),
            loader: Some(loader),
            write_back: None,
        }
    }

    /// A 200 "OK" source served from the persistent cache.
    pub fn cached(text: String) -> Self {
        Self::from_bytes(ok_code(), ok_text(), Origin::Cache, text)
    }

    /// A 200 "OK" source read from a local directory.
    ///
    /// The first successful read stores the decoded text under `key`.
    pub fn local(file: LocalFile, cache: Arc<dyn PersistentCache>, key: impl Into<String>) -> Self {
        let mut source = Self::from_loader(
            ok_code(),
            ok_text(),
            Origin::LocalDirectory,
            Box::new(LocalFileBody(file)),
        );
        source.write_back = Some(CacheWriteBack {
            cache,
            key: key.into(),
        });
        source
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// True when the status is exactly 200.
    pub fn is_ok(&self) -> bool {
        self.status == ok_code()
    }

    /// The body as a byte buffer.
    pub async fn bytes(&self) -> Result<Bytes> {
        let body = self
            .body
            .get_or_try_init(|| async {
                let bytes = match &self.loader {
                    Some(loader) => loader.load().await?,
                    None => Bytes::new(),
                };
                if let Some(write_back) = &self.write_back {
                    tracing::debug!("Caching {} under {}", self.origin, write_back.key);
                    write_back
                        .cache
                        .set_item(&write_back.key, &String::from_utf8_lossy(&bytes))?;
                }
                Ok::<_, ResolveError>(bytes)
            })
            .await?;
        Ok(body.clone())
    }

    /// The body decoded as UTF-8, with invalid sequences replaced.
    pub async fn text(&self) -> Result<String> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl fmt::Debug for ResolvedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedSource")
            .field("status", &self.status)
            .field("status_text", &self.status_text)
            .field("origin", &self.origin)
            .field("loaded", &self.body.initialized())
            .finish()
    }
}

fn ok_code() -> u16 {
    StatusCode::OK.as_u16()
}

fn ok_text() -> &'static str {
    StatusCode::OK.canonical_reason().unwrap_or("OK")
}

/// The canonical reason phrase for a status code.
pub fn status_text_for(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown")
}
