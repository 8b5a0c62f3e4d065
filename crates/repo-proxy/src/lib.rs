//! # Repo Proxy
//!
//! A caching proxy engine for upstream package repositories.
//! Concurrent requests for the same resource are coalesced into a single
//! upstream fetch, and cached content is revalidated according to per-type
//! staleness policies.
//!
//! ## Features
//!
//! - Single-flight download cooperation with bounded waiters
//! - Passive and active timeouts with staggered retry hints
//! - Token-based cache invalidation
//! - Pluggable repository formats behind one capability trait
//! - Generic HTTP remote format with conditional revalidation

pub mod builder;
pub mod cache;
pub mod caching_proxy;
pub mod config;
pub mod content;
pub mod cooperation;
pub mod error;
pub mod format;
pub mod http;

pub use builder::CachingProxyConfigBuilder;
pub use cache::{CacheController, CacheControllerHolder, CacheInfo, CacheType, ContentCache};
pub use caching_proxy::CachingProxy;
pub use config::{
    CachingProxyConfig, CooperationConfig, HttpClientConfig, HttpProxyConfig, ProxyAuth, ProxyType,
    ThreadLimitScope,
};
pub use content::{Content, Context};
pub use cooperation::{CooperatingFuture, CooperationRegistry, FutureState};
pub use error::{ErrorKind, ProxyError, ProxyResult};
pub use format::ProxyFormat;
pub use http::{HttpRemoteFormat, create_client};
