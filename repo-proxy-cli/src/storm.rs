use std::sync::Arc;

use futures::future::join_all;
use repo_proxy::{CachingProxy, Content, ErrorKind, ProxyResult};
use tracing::debug;

use crate::error::AppError;

/// How the requests of one or more rounds ended.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub ok: usize,
    pub rejected: usize,
    pub timed_out: usize,
    pub failed: usize,
    pub bytes: u64,
}

impl Tally {
    pub fn record(&mut self, result: &ProxyResult<Content>) {
        match result {
            Ok(content) => {
                self.ok += 1;
                self.bytes += content.len() as u64;
            }
            Err(e) => match e.kind() {
                ErrorKind::CooperationRejected => self.rejected += 1,
                ErrorKind::CooperationTimeout => self.timed_out += 1,
                ErrorKind::FetchTimeout | ErrorKind::Fetch => self.failed += 1,
            },
        }
    }

    pub fn merge(&mut self, other: &Tally) {
        self.ok += other.ok;
        self.rejected += other.rejected;
        self.timed_out += other.timed_out;
        self.failed += other.failed;
        self.bytes += other.bytes;
    }

    pub fn total(&self) -> usize {
        self.ok + self.rejected + self.timed_out + self.failed
    }
}

/// Fire `clients` concurrent requests, client `i` asking for `paths[i % len]`.
pub async fn run_round(
    proxy: &Arc<CachingProxy>,
    paths: &[String],
    clients: usize,
) -> Result<Tally, AppError> {
    if paths.is_empty() {
        return Err(AppError::InvalidInput("No paths to request".to_string()));
    }

    let handles: Vec<_> = (0..clients)
        .map(|i| {
            let proxy = Arc::clone(proxy);
            let context = proxy.context(paths[i % paths.len()].clone());
            tokio::spawn(async move {
                let result = proxy.get(&context).await;
                if let Err(e) = &result {
                    debug!(client = i, path = %context.path(), error = %e, "Request failed");
                }
                result
            })
        })
        .collect();

    let mut tally = Tally::default();
    for handle in join_all(handles).await {
        tally.record(&handle?);
    }
    Ok(tally)
}
