//! # Cache System
//!
//! Freshness bookkeeping for proxied content: the [`CacheInfo`] stamped on
//! every stored item, the [`CacheController`] that decides whether it is
//! stale, and a memory-backed [`ContentCache`] usable as a format's store.

// Module declarations
mod controller;
mod info;
mod store;

pub use controller::{CacheController, CacheControllerHolder, CacheType};
pub use info::CacheInfo;
pub use store::ContentCache;
