//! # Cooperation Registry
//!
//! Maps cooperation keys to their in-flight [`CooperatingFuture`] and decides,
//! for every caller, whether it leads a fetch, waits on one, or is turned away.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::{CooperationConfig, ThreadLimitScope};
use crate::content::Content;
use crate::cooperation::future::{CooperatingFuture, Outcome};
use crate::error::{ProxyError, ProxyResult};

tokio::task_local! {
    /// Keys the current task is primary for, outermost first.
    static PRIMARY_CHAIN: Vec<String>;
}

enum Role {
    Primary,
    Waiter,
}

/// Process-wide (or per-proxy) table of in-flight fetches.
///
/// Inject one shared instance into every proxy that should coalesce with the
/// others; keys carry the repository identity so proxies never collide.
#[derive(Debug, Default)]
pub struct CooperationRegistry {
    in_flight: Mutex<HashMap<String, Arc<CooperatingFuture>>>,
    /// Callers currently cooperating across all keys
    cooperating: AtomicUsize,
}

impl CooperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with a fetch in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Number of callers currently inside `join` with cooperation enabled.
    pub fn cooperating(&self) -> usize {
        self.cooperating.load(Ordering::Acquire)
    }

    /// Run `fetch` for `key`, sharing a single execution among all concurrent
    /// callers of the same key.
    ///
    /// The first caller becomes the primary and runs `fetch` bounded by the
    /// active timeout; later callers wait for its outcome up to the passive
    /// timeout. With cooperation disabled every caller runs `fetch` itself.
    pub async fn join<F, Fut>(
        &self,
        key: &str,
        config: &CooperationConfig,
        fetch: F,
    ) -> ProxyResult<Content>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ProxyResult<Content>>,
    {
        if !config.enabled {
            return fetch().await;
        }

        // Waiting on a key this task is already fetching would never finish.
        let chain = PRIMARY_CHAIN.try_with(Clone::clone).unwrap_or_default();
        if chain.iter().any(|k| k == key) {
            warn!(key = %key, chain = ?chain, "Refusing recursive cooperation");
            return Err(ProxyError::RecursiveCooperation {
                key: key.to_string(),
            });
        }

        let (role, permit) = self.admit(key, config)?;
        match role {
            Role::Primary => self.lead(&permit.future, config, chain, fetch).await,
            Role::Waiter => self.wait(&permit.future, config).await,
        }
    }

    /// Attach the caller to the future for `key`, creating it if absent,
    /// subject to the thread limit. Lookup, admission and insertion happen
    /// under one lock so exactly one caller per key becomes primary.
    fn admit(&self, key: &str, config: &CooperationConfig) -> ProxyResult<(Role, Permit<'_>)> {
        let mut in_flight = self.in_flight.lock();
        let existing = in_flight.get(key).cloned();

        if config.thread_limit > 0 {
            let current = match config.thread_limit_scope {
                ThreadLimitScope::Global => self.cooperating(),
                ThreadLimitScope::PerKey => existing.as_ref().map_or(0, |f| f.cooperators()),
            };
            if current >= config.thread_limit {
                debug!(
                    key = %key,
                    current,
                    limit = config.thread_limit,
                    scope = ?config.thread_limit_scope,
                    "Cooperation rejected"
                );
                return Err(ProxyError::CooperationRejected {
                    key: key.to_string(),
                    limit: config.thread_limit,
                });
            }
        }

        let (role, future) = match existing {
            Some(future) => (Role::Waiter, future),
            None => {
                let future = Arc::new(CooperatingFuture::new(key));
                in_flight.insert(key.to_string(), Arc::clone(&future));
                (Role::Primary, future)
            }
        };

        future.attach();
        self.cooperating.fetch_add(1, Ordering::AcqRel);
        Ok((
            role,
            Permit {
                registry: self,
                future,
            },
        ))
    }

    async fn lead<F, Fut>(
        &self,
        future: &Arc<CooperatingFuture>,
        config: &CooperationConfig,
        mut chain: Vec<String>,
        fetch: F,
    ) -> ProxyResult<Content>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ProxyResult<Content>>,
    {
        let mut guard = ResolveGuard {
            registry: self,
            future,
            armed: true,
        };
        future.mark_running();
        debug!(key = %future.key(), "Fetching as primary");

        chain.push(future.key().to_string());
        let fetching = PRIMARY_CHAIN.scope(chain, fetch());

        let outcome = if config.active_timeout.is_zero() {
            fetching.await
        } else {
            match tokio::time::timeout(config.active_timeout, fetching).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(
                        key = %future.key(),
                        timeout = ?config.active_timeout,
                        waiters = future.waiters(),
                        "Primary fetch exceeded active timeout"
                    );
                    Err(ProxyError::FetchTimeout {
                        key: future.key().to_string(),
                        timeout: config.active_timeout,
                    })
                }
            }
        };

        guard.armed = false;
        self.complete(future, outcome.clone());
        outcome
    }

    async fn wait(
        &self,
        future: &Arc<CooperatingFuture>,
        config: &CooperationConfig,
    ) -> ProxyResult<Content> {
        let started = Instant::now();
        let mut outcome_rx = future.subscribe();
        debug!(
            key = %future.key(),
            waiters = future.waiters(),
            "Waiting on in-flight fetch"
        );

        let received = async {
            outcome_rx
                .wait_for(Option::is_some)
                .await
                .ok()
                .and_then(|published| (*published).clone())
        };

        let outcome = if config.passive_timeout.is_zero() {
            received.await
        } else {
            match tokio::time::timeout(config.passive_timeout, received).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    let waited = started.elapsed();
                    let retry_after = future.retry_after(config.stagger_gap);
                    warn!(
                        key = %future.key(),
                        waited_ms = waited.as_millis() as u64,
                        retry_after_ms = retry_after.as_millis() as u64,
                        "Gave up waiting on in-flight fetch"
                    );
                    return Err(ProxyError::CooperationTimeout {
                        key: future.key().to_string(),
                        waited,
                        retry_after,
                    });
                }
            }
        };

        outcome.unwrap_or_else(|| {
            Err(ProxyError::Cancelled {
                key: future.key().to_string(),
            })
        })
    }

    /// Deregister `future` and publish its outcome as one step with respect
    /// to `admit`, so no caller can attach to a resolved future.
    fn complete(&self, future: &Arc<CooperatingFuture>, outcome: Outcome) {
        let mut in_flight = self.in_flight.lock();
        if in_flight
            .get(future.key())
            .is_some_and(|current| Arc::ptr_eq(current, future))
        {
            in_flight.remove(future.key());
        }
        if outcome.is_err() {
            debug!(key = %future.key(), waiters = future.waiters(), "Fetch failed, notifying waiters");
        }
        future.resolve(outcome);
    }
}

/// Holds one cooperation slot; released when the caller leaves `join`.
struct Permit<'a> {
    registry: &'a CooperationRegistry,
    future: Arc<CooperatingFuture>,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.future.detach();
        self.registry.cooperating.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Resolves the future as cancelled if the primary is dropped mid-fetch.
struct ResolveGuard<'a> {
    registry: &'a CooperationRegistry,
    future: &'a Arc<CooperatingFuture>,
    armed: bool,
}

impl Drop for ResolveGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!(key = %self.future.key(), "Primary dropped before fetch completed");
            self.registry.complete(
                self.future,
                Err(ProxyError::Cancelled {
                    key: self.future.key().to_string(),
                }),
            );
        }
    }
}
