//! Network fetch abstraction.
//!
//! This module provides a trait for fetching sources over the network that
//! can be replaced in tests, plus the production implementation on reqwest.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response};
use url::Url;

use crate::error::{ResolveError, Result};
use crate::source::{status_text_for, BodySource, Origin, ResolvedSource};

/// Trait for fetching a URL.
///
/// Implementations return the transport's status and status text unchanged;
/// a non-200 response is a successful fetch.
#[async_trait]
pub trait NetworkFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<ResolvedSource>;
}

/// Production fetcher using reqwest.
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    /// Create a new fetcher with the given timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Create with default timeout of 30 seconds.
    pub fn with_default_timeout() -> Result<Self> {
        Self::new(Duration::from_secs(30))
    }
}

struct ResponseBody {
    url: String,
    response: Mutex<Option<Response>>,
}

#[async_trait]
impl BodySource for ResponseBody {
    async fn load(&self) -> Result<Bytes> {
        let response = self
            .response
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| ResolveError::BodyConsumed {
                url: self.url.clone(),
            })?;
        Ok(response.bytes().await?)
    }
}

#[async_trait]
impl NetworkFetcher for ReqwestFetcher {
    async fn fetch(&self, url: &Url) -> Result<ResolvedSource> {
        tracing::debug!("GET {}", url);
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status().as_u16();
        let status_text = status_text_for(status);
        tracing::trace!("{} -> {} {}", url, status, status_text);

        Ok(ResolvedSource::from_loader(
            status,
            status_text,
            Origin::Network,
            Box::new(ResponseBody {
                url: url.to_string(),
                response: Mutex::new(Some(response)),
            }),
        ))
    }
}
