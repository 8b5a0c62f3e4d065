//! # Builder for CachingProxyConfig
//!
//! Fluent construction of [`CachingProxyConfig`] instances.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use repo_proxy::{CachingProxyConfig, ThreadLimitScope};
//!
//! let config = CachingProxyConfig::builder()
//!     .with_name("maven-central")
//!     .with_remote_url("https://repo1.maven.org/maven2/")
//!     .with_content_max_age(None)
//!     .with_metadata_max_age(Some(Duration::from_secs(600)))
//!     .with_cooperation(true, Duration::from_secs(30), Duration::from_secs(120), 50)
//!     .with_thread_limit_scope(ThreadLimitScope::Global)
//!     .with_header("X-Api-Key", "my-secret-key")
//!     .build();
//!
//! assert_eq!(config.cooperation.thread_limit, 50);
//! ```

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::config::{CachingProxyConfig, CooperationConfig, HttpProxyConfig, ThreadLimitScope};

/// Builder for creating CachingProxyConfig instances with a fluent API
#[derive(Debug, Clone)]
pub struct CachingProxyConfigBuilder {
    /// Internal config being built
    config: CachingProxyConfig,
}

impl CachingProxyConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: CachingProxyConfig::default(),
        }
    }

    /// Set the repository name used in cooperation keys
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set the upstream base URL
    pub fn with_remote_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote_url = url.into();
        self
    }

    /// Set the maximum age of cached artifacts
    pub fn with_content_max_age(mut self, max_age: Option<Duration>) -> Self {
        self.config.content_max_age = max_age;
        self
    }

    /// Set the maximum age of cached metadata
    pub fn with_metadata_max_age(mut self, max_age: Option<Duration>) -> Self {
        self.config.metadata_max_age = max_age;
        self
    }

    /// Serve stale content when a refetch fails
    pub fn with_serve_stale_on_error(mut self, serve_stale: bool) -> Self {
        self.config.serve_stale_on_error = serve_stale;
        self
    }

    /// Set the in-memory content cache size in bytes
    pub fn with_memory_cache_size(mut self, bytes: u64) -> Self {
        self.config.memory_cache_size = bytes;
        self
    }

    /// Set the core cooperation knobs
    pub fn with_cooperation(
        mut self,
        enabled: bool,
        passive_timeout: Duration,
        active_timeout: Duration,
        thread_limit: usize,
    ) -> Self {
        self.config.cooperation = CooperationConfig {
            enabled,
            passive_timeout,
            active_timeout,
            thread_limit,
            ..self.config.cooperation
        };
        self
    }

    /// Replace the whole cooperation configuration
    pub fn with_cooperation_config(mut self, cooperation: CooperationConfig) -> Self {
        self.config.cooperation = cooperation;
        self
    }

    /// Set how the thread limit is counted
    pub fn with_thread_limit_scope(mut self, scope: ThreadLimitScope) -> Self {
        self.config.cooperation.thread_limit_scope = scope;
        self
    }

    /// Set the overall timeout for upstream HTTP requests
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.http.timeout = timeout;
        self
    }

    /// Set the connection timeout for upstream HTTP requests
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.http.connect_timeout = timeout;
        self
    }

    /// Set whether to follow redirects
    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.config.http.follow_redirects = follow;
        self
    }

    /// Set the user agent string
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.http.user_agent = user_agent.into();
        self
    }

    /// Add a custom HTTP header
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let (Ok(name), Ok(value)) = (
            name.as_ref().parse::<reqwest::header::HeaderName>(),
            HeaderValue::from_str(value.as_ref()),
        ) {
            self.config.http.headers.insert(name, value);
        }
        self
    }

    /// Merge headers into the current set; later values win
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        for (name, value) in headers.iter() {
            self.config.http.headers.insert(name.clone(), value.clone());
        }
        self
    }

    /// Set the outbound proxy configuration
    pub fn with_proxy(mut self, proxy: HttpProxyConfig) -> Self {
        self.config.http.proxy = Some(proxy);
        self.config.http.use_system_proxy = false; // Explicit proxy overrides system proxy
        self
    }

    /// Set whether to use system proxy settings if available
    pub fn with_system_proxy(mut self, use_system_proxy: bool) -> Self {
        // Only set system proxy if no explicit proxy is configured
        if self.config.http.proxy.is_none() {
            self.config.http.use_system_proxy = use_system_proxy;
        }
        self
    }

    /// Build the CachingProxyConfig instance
    pub fn build(self) -> CachingProxyConfig {
        self.config
    }
}

impl Default for CachingProxyConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
