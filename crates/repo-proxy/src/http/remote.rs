//! # HTTP Remote Format
//!
//! A generic repository format that maps request paths directly onto an
//! upstream base URL and keeps fetched content in memory.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use tracing::{debug, trace};
use url::Url;

use crate::cache::{CacheInfo, CacheType, ContentCache};
use crate::caching_proxy::CachingProxy;
use crate::config::CachingProxyConfig;
use crate::content::{Content, Context};
use crate::error::{ProxyError, ProxyResult};
use crate::format::ProxyFormat;
use crate::http::client::{create_client, extract_cache_headers};

/// Content attribute holding the URL the payload was downloaded from.
pub const UPSTREAM_URL_ATTRIBUTE: &str = "upstream-url";

pub struct HttpRemoteFormat {
    client: Client,
    remote: Url,
    cache: ContentCache,
    /// Path suffixes served under the metadata cache controller
    metadata_suffixes: Vec<String>,
    upstream_requests: AtomicU64,
    cache_hits: AtomicU64,
}

impl HttpRemoteFormat {
    pub fn new(client: Client, remote_url: &str, cache: ContentCache) -> ProxyResult<Self> {
        // Url::join drops the last segment of a base without a trailing slash
        let mut remote = Url::parse(remote_url)
            .map_err(|e| ProxyError::InvalidUrl(format!("{remote_url}: {e}")))?;
        if !remote.path().ends_with('/') {
            let path = format!("{}/", remote.path());
            remote.set_path(&path);
        }

        Ok(Self {
            client,
            remote,
            cache,
            metadata_suffixes: Vec::new(),
            upstream_requests: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
        })
    }

    pub fn from_config(config: &CachingProxyConfig) -> ProxyResult<Self> {
        let client = create_client(&config.http)?;
        Self::new(
            client,
            &config.remote_url,
            ContentCache::new(config.memory_cache_size),
        )
    }

    /// Treat paths ending in `suffix` as metadata (e.g. `maven-metadata.xml`).
    pub fn with_metadata_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.metadata_suffixes.push(suffix.into());
        self
    }

    pub fn remote(&self) -> &Url {
        &self.remote
    }

    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    /// Requests sent upstream so far, revalidations included.
    pub fn upstream_requests(&self) -> u64 {
        self.upstream_requests.load(Ordering::Relaxed)
    }

    /// Requests answered from fresh cached content.
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ProxyFormat for HttpRemoteFormat {
    async fn cached_content(&self, context: &Context) -> ProxyResult<Option<Content>> {
        Ok(self.cache.get(&self.cooperation_key(context)).await)
    }

    async fn indicate_verified(
        &self,
        context: &Context,
        _content: &Content,
        cache_info: &CacheInfo,
    ) -> ProxyResult<()> {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
        trace!(path = %context.path(), last_verified = %cache_info.last_verified(), "Cache hit");
        Ok(())
    }

    async fn url(&self, context: &Context, _proxy: &CachingProxy) -> ProxyResult<String> {
        self.remote
            .join(context.path().trim_start_matches('/'))
            .map(String::from)
            .map_err(|e| ProxyError::InvalidUrl(format!("{}: {e}", context.path())))
    }

    async fn fetch(
        &self,
        url: &str,
        _context: &Context,
        stale: Option<&Content>,
    ) -> ProxyResult<Content> {
        let mut request = self.client.get(url);
        if let Some(stale) = stale {
            if let Some(etag) = stale.etag() {
                request = request.header(header::IF_NONE_MATCH, etag);
            }
            if let Some(last_modified) = stale.last_modified() {
                request = request.header(header::IF_MODIFIED_SINCE, last_modified);
            }
        }

        self.upstream_requests.fetch_add(1, Ordering::Relaxed);
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_MODIFIED {
            if let Some(stale) = stale {
                debug!(url = %url, "Upstream content not modified");
                return Ok(stale.clone());
            }
        }
        if status == StatusCode::NOT_FOUND {
            return Err(ProxyError::NotFound {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(ProxyError::Status {
                url: url.to_string(),
                status,
            });
        }

        let headers = extract_cache_headers(&response);
        let data = response.bytes().await?;
        debug!(url = %url, size = data.len(), "Fetched from upstream");

        Ok(Content::new(data)
            .with_content_type_option(headers.content_type)
            .with_etag_option(headers.etag)
            .with_last_modified_option(headers.last_modified)
            .with_attribute(UPSTREAM_URL_ATTRIBUTE, url))
    }

    async fn store(&self, context: &Context, content: Content) -> ProxyResult<Content> {
        self.cache
            .put(self.cooperation_key(context), content.clone())
            .await;
        Ok(content)
    }

    fn cache_type(&self, context: &Context) -> CacheType {
        if self
            .metadata_suffixes
            .iter()
            .any(|suffix| context.path().ends_with(suffix.as_str()))
        {
            CacheType::Metadata
        } else {
            CacheType::Content
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(remote_url: &str) -> HttpRemoteFormat {
        HttpRemoteFormat::new(Client::new(), remote_url, ContentCache::new(0)).unwrap()
    }

    #[test]
    fn remote_base_gets_trailing_slash() {
        assert_eq!(
            format("https://repo.example.com/maven2").remote().as_str(),
            "https://repo.example.com/maven2/"
        );
    }

    #[test]
    fn rejects_bad_remote() {
        assert!(matches!(
            HttpRemoteFormat::new(Client::new(), "not a url", ContentCache::new(0)),
            Err(ProxyError::InvalidUrl(_))
        ));
    }

    #[test]
    fn metadata_suffixes_select_controller() {
        let format = format("https://repo.example.com/maven2/").with_metadata_suffix("maven-metadata.xml");

        let metadata = Context::new("maven", "org/foo/maven-metadata.xml");
        let artifact = Context::new("maven", "org/foo/1.0/foo-1.0.jar");

        assert_eq!(format.cache_type(&metadata), CacheType::Metadata);
        assert_eq!(format.cache_type(&artifact), CacheType::Content);
    }
}
