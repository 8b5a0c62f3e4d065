//! # Proxy Format Trait
//!
//! The capability interface a repository format implements so that
//! [`CachingProxy`] can serve it. The proxy depends only on this trait and
//! never on a concrete format.

use async_trait::async_trait;

use crate::cache::{CacheInfo, CacheType};
use crate::caching_proxy::CachingProxy;
use crate::content::{Content, Context};
use crate::error::ProxyResult;

/// Per-format hooks invoked by the proxy orchestrator.
#[async_trait]
pub trait ProxyFormat: Send + Sync + 'static {
    /// Look up previously stored content for the request, if any.
    async fn cached_content(&self, context: &Context) -> ProxyResult<Option<Content>>;

    /// Record that `content` was found fresh under `cache_info`. Called on the
    /// fast path only; must not perform network I/O.
    async fn indicate_verified(
        &self,
        context: &Context,
        content: &Content,
        cache_info: &CacheInfo,
    ) -> ProxyResult<()>;

    /// Resolve the upstream URL for the request.
    ///
    /// Implementations may call back into `proxy` to fetch other resources
    /// first (an index to discover the real asset location, say), as long as
    /// those requests use a different cooperation key.
    async fn url(&self, context: &Context, proxy: &CachingProxy) -> ProxyResult<String>;

    /// Fetch the resource from upstream. `stale` is the cached content being
    /// replaced, usable for conditional requests.
    async fn fetch(
        &self,
        url: &str,
        context: &Context,
        stale: Option<&Content>,
    ) -> ProxyResult<Content>;

    /// Persist freshly fetched content and return the stored form.
    async fn store(&self, context: &Context, content: Content) -> ProxyResult<Content>;

    /// Which cache controller governs this request.
    fn cache_type(&self, _context: &Context) -> CacheType {
        CacheType::Content
    }

    /// Key under which concurrent fetches of this request are coalesced.
    fn cooperation_key(&self, context: &Context) -> String {
        context.cooperation_key()
    }
}
