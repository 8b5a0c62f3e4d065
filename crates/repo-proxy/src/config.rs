use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

const DEFAULT_USER_AGENT: &str = concat!("repo-proxy/", env!("CARGO_PKG_VERSION"));

/// Scheme used to reach the upstream through an outbound proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyType {
    Http,
    Https,
    /// SOCKS5; a bare `host:port` gets the `socks5://` scheme
    Socks5,
    /// One proxy for every scheme
    All,
}

/// Basic credentials for the outbound proxy.
#[derive(Debug, Clone)]
pub struct ProxyAuth {
    pub username: String,
    pub password: String,
}

/// Outbound proxy between the caching proxy and its upstream repository.
#[derive(Debug, Clone)]
pub struct HttpProxyConfig {
    /// e.g. `http://proxy.internal:3128`
    pub url: String,
    pub proxy_type: ProxyType,
    pub auth: Option<ProxyAuth>,
}

/// How the cooperation thread limit is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThreadLimitScope {
    /// At most `thread_limit` callers (primary + waiters) per cooperation key.
    #[default]
    PerKey,
    /// At most `thread_limit` callers cooperating across all keys of a registry.
    Global,
}

/// Download cooperation settings for one proxy instance.
///
/// A zero `passive_timeout` or `active_timeout` leaves that wait unbounded,
/// and a zero `thread_limit` disables admission control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CooperationConfig {
    /// Coalesce concurrent fetches of the same key into one
    pub enabled: bool,
    /// Longest a waiter blocks on somebody else's in-flight fetch
    pub passive_timeout: Duration,
    /// Longest the primary may spend inside the fetch
    pub active_timeout: Duration,
    /// Maximum number of concurrently cooperating callers
    pub thread_limit: usize,
    /// Whether `thread_limit` applies per key or across the registry
    pub thread_limit_scope: ThreadLimitScope,
    /// Spacing between staggered retry hints handed to timed-out waiters
    pub stagger_gap: Duration,
}

impl Default for CooperationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            passive_timeout: Duration::from_secs(30),
            active_timeout: Duration::from_secs(5 * 60),
            thread_limit: 100,
            thread_limit_scope: ThreadLimitScope::PerKey,
            stagger_gap: Duration::from_secs(1),
        }
    }
}

impl CooperationConfig {
    /// Every caller fetches independently.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn new(
        enabled: bool,
        passive_timeout: Duration,
        active_timeout: Duration,
        thread_limit: usize,
    ) -> Self {
        Self {
            enabled,
            passive_timeout,
            active_timeout,
            thread_limit,
            ..Self::default()
        }
    }

    pub fn with_thread_limit_scope(mut self, scope: ThreadLimitScope) -> Self {
        self.thread_limit_scope = scope;
        self
    }

    pub fn with_stagger_gap(mut self, gap: Duration) -> Self {
        self.stagger_gap = gap;
        self
    }
}

/// Settings for the HTTP client used to reach the upstream.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Overall timeout for the entire HTTP request
    pub timeout: Duration,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// Whether to follow redirects
    pub follow_redirects: bool,

    /// User agent string
    pub user_agent: String,

    /// Custom HTTP headers for requests
    pub headers: HeaderMap,

    /// Outbound proxy configuration (optional)
    pub proxy: Option<HttpProxyConfig>,

    /// Whether to use system proxy settings if available
    pub use_system_proxy: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: HttpClientConfig::get_default_headers(),
            proxy: None,
            use_system_proxy: true,
        }
    }
}

impl HttpClientConfig {
    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(
            reqwest::header::ACCEPT_ENCODING,
            HeaderValue::from_static("gzip, deflate"),
        );

        default_headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("*/*"));

        default_headers
    }
}

/// Full configuration of a caching proxy repository.
#[derive(Debug, Clone)]
pub struct CachingProxyConfig {
    /// Repository identity, part of every cooperation key
    pub name: String,
    /// Base URL of the upstream repository
    pub remote_url: String,
    /// Maximum age of cached artifacts; `None` never expires by age
    pub content_max_age: Option<Duration>,
    /// Maximum age of cached metadata; `None` never expires by age
    pub metadata_max_age: Option<Duration>,
    /// Return stale cached content when a refetch fails
    pub serve_stale_on_error: bool,
    /// Size limit of the in-memory content cache in bytes, zero for unbounded
    pub memory_cache_size: u64,
    /// Download cooperation settings
    pub cooperation: CooperationConfig,
    /// Upstream HTTP client settings
    pub http: HttpClientConfig,
}

impl Default for CachingProxyConfig {
    fn default() -> Self {
        Self {
            name: "proxy".to_owned(),
            remote_url: String::new(),
            content_max_age: Some(Duration::from_secs(24 * 60 * 60)),
            metadata_max_age: Some(Duration::from_secs(30 * 60)),
            serve_stale_on_error: false,
            memory_cache_size: 256 * 1024 * 1024, // 256MB
            cooperation: CooperationConfig::default(),
            http: HttpClientConfig::default(),
        }
    }
}

impl CachingProxyConfig {
    pub fn builder() -> crate::builder::CachingProxyConfigBuilder {
        crate::builder::CachingProxyConfigBuilder::new()
    }
}
