//! # Cache Controller
//!
//! Staleness decisions for cached content. Everything here is lock-free and
//! performs no I/O, so it can be consulted on every request.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::info;

use crate::cache::info::CacheInfo;

/// Which family of content a request belongs to.
///
/// Metadata (indexes, listings) usually changes far more often than the
/// artifacts it describes, so each family gets its own controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CacheType {
    #[default]
    Content,
    Metadata,
}

/// Decides whether cached content must be revalidated.
#[derive(Debug)]
pub struct CacheController {
    /// Maximum age before content is stale; `None` never expires by age
    max_age: Option<Duration>,
    /// Current cache generation; bumping it invalidates all earlier content
    token: AtomicU64,
}

impl CacheController {
    pub fn new(max_age: Option<Duration>) -> Self {
        Self::with_token(max_age, 0)
    }

    /// Create a controller starting at a known generation, e.g. one restored
    /// from persisted repository settings.
    pub fn with_token(max_age: Option<Duration>, token: u64) -> Self {
        Self {
            max_age,
            token: AtomicU64::new(token),
        }
    }

    pub fn max_age(&self) -> Option<Duration> {
        self.max_age
    }

    pub fn token(&self) -> u64 {
        self.token.load(Ordering::Acquire)
    }

    /// Fresh cache info for content verified right now.
    pub fn current(&self) -> CacheInfo {
        CacheInfo::new(Utc::now(), Some(self.token()))
    }

    /// Whether content carrying `info` must be revalidated.
    pub fn is_stale(&self, info: &CacheInfo) -> bool {
        self.is_stale_at(info, Utc::now())
    }

    /// Staleness relative to an explicit clock reading.
    ///
    /// Content is stale when it was verified under a different cache token,
    /// or when `max_age` is set and `last_verified + max_age <= now`.
    pub fn is_stale_at(&self, info: &CacheInfo, now: DateTime<Utc>) -> bool {
        if info.cache_token() != Some(self.token()) {
            return true;
        }

        let Some(max_age) = self.max_age else {
            return false;
        };

        // An age too large to represent can never be reached.
        match TimeDelta::from_std(max_age)
            .ok()
            .and_then(|age| info.last_verified().checked_add_signed(age))
        {
            Some(expires_at) => expires_at <= now,
            None => false,
        }
    }

    /// Invalidate every piece of content verified so far.
    pub fn invalidate_cache(&self) -> u64 {
        let token = self.token.fetch_add(1, Ordering::AcqRel) + 1;
        info!(token, "Cache invalidated");
        token
    }
}

/// One controller per [`CacheType`].
#[derive(Debug)]
pub struct CacheControllerHolder {
    content: CacheController,
    metadata: CacheController,
}

impl CacheControllerHolder {
    pub fn new(content: CacheController, metadata: CacheController) -> Self {
        Self { content, metadata }
    }

    pub fn get(&self, cache_type: CacheType) -> &CacheController {
        match cache_type {
            CacheType::Content => &self.content,
            CacheType::Metadata => &self.metadata,
        }
    }

    pub fn content(&self) -> &CacheController {
        &self.content
    }

    pub fn metadata(&self) -> &CacheController {
        &self.metadata
    }

    pub fn invalidate_all(&self) {
        self.content.invalidate_cache();
        self.metadata.invalidate_cache();
    }
}
