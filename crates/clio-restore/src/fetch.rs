//! HTTP access to remote media hosts.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use tracing::trace;

use clio_core::defaults::UNSHORTEN_TIMEOUT_SECS;
use clio_core::{Error, FetchedBody, RemoteFetcher, Result};

const USER_AGENT: &str = concat!("clio-restore/", env!("CARGO_PKG_VERSION"));

pub struct HttpFetcher {
    client: Client,
    unshorten_timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Config(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            unshorten_timeout: Duration::from_secs(UNSHORTEN_TIMEOUT_SECS),
        })
    }
}

/// Media type of a `Content-Type` header without parameters, lowercased.
pub fn media_type_essence(header: &str) -> String {
    header
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

#[async_trait]
impl RemoteFetcher for HttpFetcher {
    async fn get(&self, url: &str) -> Result<FetchedBody> {
        trace!(subsystem = "media", component = "fetch", op = "get", url, "GET");
        let resp = self.client.get(url).send().await?;
        if resp.status() != StatusCode::OK {
            return Err(Error::Request(format!("{}: status {}", url, resp.status())));
        }
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(media_type_essence)
            .unwrap_or_default();
        let data = resp.bytes().await?.to_vec();
        Ok(FetchedBody { content_type, data })
    }

    async fn resolve_redirects(&self, url: &str) -> Result<String> {
        trace!(subsystem = "media", component = "fetch", op = "head", url, "HEAD");
        let resp = self
            .client
            .head(url)
            .timeout(self.unshorten_timeout)
            .send()
            .await?;
        Ok(resp.url().to_string())
    }
}
