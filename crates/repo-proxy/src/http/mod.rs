//! Upstream HTTP access: client construction and a generic remote format.

mod client;
mod remote;

pub use client::{CacheHeaders, create_client, extract_cache_headers};
pub use remote::{HttpRemoteFormat, UPSTREAM_URL_ATTRIBUTE};
