//! # Caching Proxy
//!
//! The per-request orchestrator. Serves fresh content straight from the
//! format's cache, and funnels everything else through the cooperation
//! registry so that concurrent requests for one resource share a single
//! upstream fetch.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, info, trace, warn};

use crate::cache::{CacheController, CacheControllerHolder};
use crate::config::{CachingProxyConfig, CooperationConfig};
use crate::content::{Content, Context};
use crate::cooperation::CooperationRegistry;
use crate::error::ProxyResult;
use crate::format::ProxyFormat;

pub struct CachingProxy {
    name: String,
    format: Arc<dyn ProxyFormat>,
    registry: Arc<CooperationRegistry>,
    controllers: CacheControllerHolder,
    cooperation: RwLock<CooperationConfig>,
    serve_stale_on_error: bool,
}

impl CachingProxy {
    pub fn new(
        name: impl Into<String>,
        format: Arc<dyn ProxyFormat>,
        registry: Arc<CooperationRegistry>,
        controllers: CacheControllerHolder,
        cooperation: CooperationConfig,
    ) -> Self {
        Self {
            name: name.into(),
            format,
            registry,
            controllers,
            cooperation: RwLock::new(cooperation),
            serve_stale_on_error: false,
        }
    }

    /// Build a proxy from its configuration. Pass the same `registry` to every
    /// proxy that should share in-flight bookkeeping.
    pub fn from_config(
        config: &CachingProxyConfig,
        format: Arc<dyn ProxyFormat>,
        registry: Arc<CooperationRegistry>,
    ) -> Self {
        let controllers = CacheControllerHolder::new(
            CacheController::new(config.content_max_age),
            CacheController::new(config.metadata_max_age),
        );
        Self::new(
            config.name.clone(),
            format,
            registry,
            controllers,
            config.cooperation.clone(),
        )
        .with_serve_stale_on_error(config.serve_stale_on_error)
    }

    pub fn with_serve_stale_on_error(mut self, serve_stale: bool) -> Self {
        self.serve_stale_on_error = serve_stale;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Request context for `path` in this repository.
    pub fn context(&self, path: impl Into<String>) -> Context {
        Context::new(self.name.clone(), path)
    }

    pub fn registry(&self) -> &Arc<CooperationRegistry> {
        &self.registry
    }

    pub fn cache_controllers(&self) -> &CacheControllerHolder {
        &self.controllers
    }

    /// Snapshot of the current cooperation settings.
    pub fn cooperation_config(&self) -> CooperationConfig {
        self.cooperation.read().clone()
    }

    /// Change the cooperation settings at runtime. Requests already inside
    /// the registry keep the settings they entered with.
    pub fn configure_cooperation(
        &self,
        enabled: bool,
        passive_timeout: Duration,
        active_timeout: Duration,
        thread_limit: usize,
    ) {
        let mut cooperation = self.cooperation.write();
        cooperation.enabled = enabled;
        cooperation.passive_timeout = passive_timeout;
        cooperation.active_timeout = active_timeout;
        cooperation.thread_limit = thread_limit;
        info!(
            repository = %self.name,
            enabled,
            passive_timeout = ?passive_timeout,
            active_timeout = ?active_timeout,
            thread_limit,
            "Cooperation configured"
        );
    }

    /// Make every piece of content cached so far stale.
    pub fn invalidate_caches(&self) {
        info!(repository = %self.name, "Invalidating caches");
        self.controllers.invalidate_all();
    }

    /// Serve `context`, from cache when fresh, otherwise via a cooperating
    /// upstream fetch.
    pub async fn get(&self, context: &Context) -> ProxyResult<Content> {
        let cached = self.format.cached_content(context).await?;
        let controller = self.controllers.get(self.format.cache_type(context));

        if let Some(content) = &cached {
            if let Some(cache_info) = content.cache_info() {
                if !controller.is_stale(cache_info) {
                    trace!(repository = %self.name, path = %context.path(), "Serving fresh cached content");
                    if let Err(e) = self
                        .format
                        .indicate_verified(context, content, cache_info)
                        .await
                    {
                        warn!(path = %context.path(), error = %e, "Failed to record verification");
                    }
                    return Ok(content.clone());
                }
            }
        }

        let key = self.format.cooperation_key(context);
        let cooperation = self.cooperation_config();
        let result = self
            .registry
            .join(&key, &cooperation, || {
                self.fetch_and_store(context, cached.as_ref(), controller)
            })
            .await;

        match (result, cached) {
            (Err(e), Some(stale)) if self.serve_stale_on_error && e.is_fetch_failure() => {
                warn!(
                    key = %key,
                    error = %e,
                    "Upstream unavailable, serving stale content"
                );
                Ok(stale)
            }
            (result, _) => result,
        }
    }

    async fn fetch_and_store(
        &self,
        context: &Context,
        stale: Option<&Content>,
        controller: &CacheController,
    ) -> ProxyResult<Content> {
        // A primary that finished between our cache lookup and `join` may
        // already have stored fresh content.
        let latest = self.format.cached_content(context).await?;
        if let Some(content) = &latest {
            if content
                .cache_info()
                .is_some_and(|cache_info| !controller.is_stale(cache_info))
            {
                debug!(path = %context.path(), "Content stored by an earlier fetch, skipping upstream");
                return Ok(content.clone());
            }
        }
        let stale = latest.as_ref().or(stale);

        let url = self.format.url(context, self).await?;
        debug!(url = %url, path = %context.path(), revalidating = stale.is_some(), "Fetching from upstream");

        let fetched = match self.format.fetch(&url, context, stale).await {
            Ok(content) => content,
            Err(e) => {
                warn!(url = %url, error = %e, "Upstream fetch failed");
                return Err(e);
            }
        };

        let stamped = fetched.with_cache_info(controller.current());
        self.format.store(context, stamped).await
    }
}
