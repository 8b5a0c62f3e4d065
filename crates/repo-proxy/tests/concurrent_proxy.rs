//! Many clients hammering a proxy whose format resolves asset URLs through a
//! shared index resource.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use repo_proxy::{
    CacheController, CacheControllerHolder, CacheInfo, CachingProxy, Content, Context,
    CooperationConfig, CooperationRegistry, ProxyError, ProxyFormat, ProxyResult,
    ThreadLimitScope,
};

const NUM_CLIENTS: usize = 100;
const NUM_PATHS: usize = 10;
const DOWNLOAD_DELAY: Duration = Duration::from_millis(1000);
const PASSIVE_TIMEOUT: Duration = Duration::from_secs(60);
const ACTIVE_TIMEOUT: Duration = Duration::from_millis(3000);

const META_PREFIX: &str = "meta/";
const ASSET_PREFIX: &str = "asset/";
const META_CONTENT: &[u8] = b"META";
const ASSET_CONTENT: &[u8] = b"ASSET";
const INDEX_PATH: &str = "index.json";

#[derive(Default)]
struct ScriptedFormat {
    storage: Mutex<HashMap<String, Content>>,
    upstream_requests: Mutex<HashMap<String, usize>>,
    fetches: AtomicU64,
}

impl ScriptedFormat {
    fn count(&self, url: &str) -> usize {
        self.upstream_requests.lock().get(url).copied().unwrap_or(0)
    }

    fn requests(&self) -> HashMap<String, usize> {
        self.upstream_requests.lock().clone()
    }
}

#[async_trait]
impl ProxyFormat for ScriptedFormat {
    async fn cached_content(&self, context: &Context) -> ProxyResult<Option<Content>> {
        Ok(self.storage.lock().get(context.path()).cloned())
    }

    async fn indicate_verified(
        &self,
        _context: &Context,
        _content: &Content,
        _cache_info: &CacheInfo,
    ) -> ProxyResult<()> {
        Ok(())
    }

    async fn url(&self, context: &Context, proxy: &CachingProxy) -> ProxyResult<String> {
        let path = context.path();
        if path == INDEX_PATH {
            return Ok(format!("{META_PREFIX}{path}"));
        }
        if path.contains("indirect") {
            // formats that read an index to locate the asset
            let index = proxy.get(&proxy.context(INDEX_PATH)).await?;
            assert_eq!(index.data().as_ref(), META_CONTENT);
        }
        Ok(format!("{ASSET_PREFIX}{path}"))
    }

    async fn fetch(
        &self,
        url: &str,
        _context: &Context,
        _stale: Option<&Content>,
    ) -> ProxyResult<Content> {
        *self
            .upstream_requests
            .lock()
            .entry(url.to_string())
            .or_default() += 1;

        // mimic download time, varying per request
        let n = self.fetches.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(DOWNLOAD_DELAY + Duration::from_millis((n * 97) % 250)).await;

        if url.starts_with(META_PREFIX) {
            return Ok(Content::new(META_CONTENT));
        }
        if url.contains("broken") {
            return Err(std::io::Error::other("oops").into());
        }
        Ok(Content::new(ASSET_CONTENT))
    }

    async fn store(&self, context: &Context, content: Content) -> ProxyResult<Content> {
        self.storage
            .lock()
            .insert(context.path().to_string(), content.clone());
        Ok(content)
    }
}

fn setup(cooperation: CooperationConfig) -> (Arc<ScriptedFormat>, Arc<CachingProxy>) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let format = Arc::new(ScriptedFormat::default());
    let proxy = CachingProxy::new(
        "scripted",
        format.clone(),
        Arc::new(CooperationRegistry::new()),
        CacheControllerHolder::new(CacheController::new(None), CacheController::new(None)),
        cooperation,
    );
    (format, Arc::new(proxy))
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Tally {
    ok: usize,
    oops: usize,
    rejected: usize,
}

/// One round: `NUM_CLIENTS` valid and `NUM_CLIENTS` broken requests at once.
async fn run_round(proxy: &Arc<CachingProxy>) -> Tally {
    let mut handles = Vec::with_capacity(2 * NUM_CLIENTS);
    for i in 0..NUM_CLIENTS {
        for kind in ["valid", "broken"] {
            let proxy = Arc::clone(proxy);
            let context = proxy.context(format!("some/{kind}/indirect/path-{}", i % NUM_PATHS));
            handles.push(tokio::spawn(async move { proxy.get(&context).await }));
        }
    }

    let mut tally = Tally::default();
    for result in join_all(handles).await {
        match result.expect("client task panicked") {
            Ok(content) => {
                assert_eq!(content.data().as_ref(), ASSET_CONTENT);
                tally.ok += 1;
            }
            Err(ProxyError::Io { source }) => {
                assert_eq!(source.to_string(), "oops");
                tally.oops += 1;
            }
            Err(ProxyError::CooperationRejected { .. }) => tally.rejected += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    tally
}

#[tokio::test(start_paused = true)]
async fn no_download_cooperation() {
    let (format, proxy) = setup(CooperationConfig::default());
    proxy.configure_cooperation(false, Duration::ZERO, Duration::ZERO, 0);

    for _ in 0..2 {
        let tally = run_round(&proxy).await;
        assert_eq!(tally.ok, NUM_CLIENTS);
        assert_eq!(tally.oops, NUM_CLIENTS);
    }

    // every client of the first round misses the index
    assert!(format.count("meta/index.json") > NUM_CLIENTS);
}

#[tokio::test(start_paused = true)]
async fn download_cooperation() {
    let iterations = 2;
    let (format, proxy) = setup(CooperationConfig::default());
    proxy.configure_cooperation(true, PASSIVE_TIMEOUT, ACTIVE_TIMEOUT, 2 * NUM_CLIENTS);

    for _ in 0..iterations {
        let tally = run_round(&proxy).await;
        assert_eq!(
            tally,
            Tally {
                ok: NUM_CLIENTS,
                oops: NUM_CLIENTS,
                rejected: 0
            }
        );
    }

    assert_eq!(format.count("meta/index.json"), 1);

    let requests = format.requests();
    assert_eq!(requests.len(), 1 + 2 * NUM_PATHS);
    for (url, count) in requests {
        if url.contains("broken") {
            // failures are shared within a round but never cached
            assert_eq!(count, iterations, "{url}");
        } else {
            assert_eq!(count, 1, "{url}");
        }
    }
    assert_eq!(proxy.registry().in_flight(), 0);
    assert_eq!(proxy.registry().cooperating(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn download_cooperation_on_parallel_workers() {
    let (format, proxy) = setup(CooperationConfig::new(
        true,
        PASSIVE_TIMEOUT,
        Duration::from_secs(10),
        2 * NUM_CLIENTS,
    ));

    for _ in 0..2 {
        let tally = run_round(&proxy).await;
        assert_eq!(
            tally,
            Tally {
                ok: NUM_CLIENTS,
                oops: NUM_CLIENTS,
                rejected: 0
            }
        );
    }

    assert_eq!(format.count("meta/index.json"), 1);
    for i in 0..NUM_PATHS {
        let url = format!("asset/some/valid/indirect/path-{i}");
        assert_eq!(format.count(&url), 1, "{url}");
    }
    assert_eq!(proxy.registry().in_flight(), 0);
    assert_eq!(proxy.registry().cooperating(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn per_key_limit_on_parallel_workers() {
    let thread_limit = 10;
    let (format, proxy) = setup(CooperationConfig::new(
        true,
        PASSIVE_TIMEOUT,
        ACTIVE_TIMEOUT,
        thread_limit,
    ));

    let rejected = hammer_fixed_path(&proxy, "some/fixed/path").await;

    assert_eq!(format.count("asset/some/fixed/path"), 1);
    assert_eq!(rejected, NUM_CLIENTS - thread_limit);
    assert_eq!(proxy.registry().cooperating(), 0);
}

#[tokio::test(start_paused = true)]
async fn global_limit_counts_nested_index_waits() {
    // Each asset primary also cooperates on the index while resolving its URL.
    let nested = 2 * NUM_PATHS;
    let (format, proxy) = setup(
        CooperationConfig::new(true, PASSIVE_TIMEOUT, ACTIVE_TIMEOUT, 2 * NUM_CLIENTS + nested)
            .with_thread_limit_scope(ThreadLimitScope::Global),
    );

    let tally = run_round(&proxy).await;

    assert_eq!(tally.rejected, 0);
    assert_eq!(tally.ok, NUM_CLIENTS);
    assert_eq!(format.count("meta/index.json"), 1);
}

async fn hammer_fixed_path(proxy: &Arc<CachingProxy>, path: &str) -> usize {
    let handles: Vec<_> = (0..NUM_CLIENTS)
        .map(|_| {
            let proxy = Arc::clone(proxy);
            let context = proxy.context(path);
            tokio::spawn(async move { proxy.get(&context).await })
        })
        .collect();

    join_all(handles)
        .await
        .into_iter()
        .filter(|r| {
            matches!(
                r.as_ref().expect("client task panicked"),
                Err(ProxyError::CooperationRejected { .. })
            )
        })
        .count()
}

#[tokio::test(start_paused = true)]
async fn limit_cooperating_tasks_per_key() {
    let thread_limit = 10;
    let (format, proxy) = setup(CooperationConfig::new(
        true,
        PASSIVE_TIMEOUT,
        ACTIVE_TIMEOUT,
        thread_limit,
    ));

    let rejected = hammer_fixed_path(&proxy, "some/fixed/path").await;

    assert_eq!(format.count("asset/some/fixed/path"), 1);
    assert_eq!(rejected, NUM_CLIENTS - thread_limit);
}

#[tokio::test(start_paused = true)]
async fn limit_cooperating_tasks_globally() {
    let thread_limit = 10;
    let (format, proxy) = setup(
        CooperationConfig::new(true, PASSIVE_TIMEOUT, ACTIVE_TIMEOUT, thread_limit)
            .with_thread_limit_scope(ThreadLimitScope::Global),
    );

    let rejected = hammer_fixed_path(&proxy, "some/fixed/path").await;

    assert_eq!(format.count("asset/some/fixed/path"), 1);
    assert_eq!(rejected, NUM_CLIENTS - thread_limit);

    // once the fetch is done the budget is free again, and the asset is cached
    let context = proxy.context("some/fixed/path");
    assert_eq!(
        proxy.get(&context).await.unwrap().data().as_ref(),
        ASSET_CONTENT
    );
    assert_eq!(proxy.registry().cooperating(), 0);
}

#[tokio::test(start_paused = true)]
async fn global_limit_spans_distinct_paths() {
    let thread_limit = 25;
    let (format, proxy) = setup(
        CooperationConfig::new(true, PASSIVE_TIMEOUT, ACTIVE_TIMEOUT, thread_limit)
            .with_thread_limit_scope(ThreadLimitScope::Global),
    );

    let handles: Vec<_> = (0..NUM_CLIENTS)
        .map(|i| {
            let proxy = Arc::clone(&proxy);
            let context = proxy.context(format!("some/direct/path-{}", i % NUM_PATHS));
            tokio::spawn(async move { proxy.get(&context).await })
        })
        .collect();

    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.expect("client task panicked"))
        .collect();

    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(ProxyError::CooperationRejected { .. })))
        .count();
    assert_eq!(rejected, NUM_CLIENTS - thread_limit);
    for i in 0..NUM_PATHS {
        assert_eq!(format.count(&format!("asset/some/direct/path-{i}")), 1);
    }
}
