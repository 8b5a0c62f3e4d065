//! # Download Cooperation
//!
//! Coalesces concurrent fetches of the same cooperation key so that only one
//! caller (the primary) talks to the upstream while the others wait for and
//! share its outcome.
//!
//! - [`CooperationRegistry`] owns the key to in-flight fetch table and runs
//!   admission control.
//! - [`CooperatingFuture`] is the shared handle for one in-flight fetch.

mod future;
mod registry;

pub use future::{CooperatingFuture, FutureState, Outcome};
pub use registry::CooperationRegistry;
