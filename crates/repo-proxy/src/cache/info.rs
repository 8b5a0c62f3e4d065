//! # Cache Info
//!
//! Verification metadata attached to stored content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// When a piece of content was last confirmed current, and under which
/// cache token.
///
/// Values are replaced, never mutated in place: re-verifying content yields
/// a new `CacheInfo` so readers holding the old one are unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheInfo {
    /// Last time the content was fetched or re-verified against the upstream
    last_verified: DateTime<Utc>,
    /// Token of the controller generation that verified the content
    cache_token: Option<u64>,
}

impl CacheInfo {
    pub fn new(last_verified: DateTime<Utc>, cache_token: Option<u64>) -> Self {
        Self {
            last_verified,
            cache_token,
        }
    }

    pub fn last_verified(&self) -> DateTime<Utc> {
        self.last_verified
    }

    pub fn cache_token(&self) -> Option<u64> {
        self.cache_token
    }
}
