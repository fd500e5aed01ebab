use std::collections::HashMap;
use std::fs;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LabelError {
    /// The service refused the request because the rate-limit window is
    /// spent. Retried after a cooldown.
    #[error("label quota exhausted")]
    QuotaExhausted,
    #[error("label service failure: {0}")]
    Service(String),
    #[error("gave up labeling {uri} after {attempts} attempts")]
    RetriesExhausted { uri: String, attempts: u32 },
    #[error("labeling worker panicked: {0}")]
    Worker(String),
}

/// External labeling service boundary: resolves an image URI to a list of
/// (label, score) pairs.
pub trait LabelService: Send + Sync + 'static {
    fn label(
        &self,
        uri: &str,
    ) -> impl Future<Output = Result<Vec<(String, f64)>, LabelError>> + Send;
}

/// Labels plus the caller-supplied classification for one URI, as persisted
/// in the output JSON mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledImage {
    pub labels: Vec<(String, f64)>,
    pub classification: String,
}

/// Retry discipline for quota stalls and other transient service failures.
/// The attempt bound keeps a persistent failure from looping forever.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub cooldown: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        // Vision-style quotas are granted per 100-second window, so a failed
        // request is retried once the window rolls over.
        Self { cooldown: Duration::from_secs(100), max_attempts: 5 }
    }
}

/// Dispatches label requests in fixed-size batches across a bounded worker
/// pool. Batches are independent; each one processes its items sequentially
/// and sleeps through quota stalls rather than failing.
pub struct BatchLabeler<S> {
    service: Arc<S>,
    batch_size: usize,
    workers: usize,
    retry: RetryPolicy,
}

impl<S: LabelService> BatchLabeler<S> {
    pub fn new(service: S) -> Self {
        Self {
            service: Arc::new(service),
            batch_size: 4,
            workers: 20,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Labels every (uri, classification) pair and merges the per-batch
    /// results into one mapping. Each input URI appears exactly once in the
    /// output; since URIs are unique across the input, the merge needs no
    /// precedence rule.
    pub async fn label_all(
        &self,
        items: Vec<(String, String)>,
    ) -> Result<HashMap<String, LabeledImage>, LabelError> {
        let total = items.len();
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();

        for batch in items.chunks(self.batch_size) {
            let batch = batch.to_vec();
            let semaphore = Arc::clone(&semaphore);
            let service = Arc::clone(&self.service);
            let retry = self.retry;
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("labeler semaphore closed");
                label_batch(service, batch, retry).await
            });
        }

        let mut merged = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            let batch_results = joined.map_err(|e| LabelError::Worker(e.to_string()))??;
            merged.extend(batch_results);
        }

        info!("labeled {} of {total} uris", merged.len());
        Ok(merged)
    }
}

/// One worker's share: label each item in order, retrying the same item from
/// scratch after a cooldown on any failure. No partial progress is recorded
/// mid-item.
async fn label_batch<S: LabelService>(
    service: Arc<S>,
    batch: Vec<(String, String)>,
    retry: RetryPolicy,
) -> Result<HashMap<String, LabeledImage>, LabelError> {
    let mut results = HashMap::new();

    for (uri, classification) in batch {
        let mut attempts = 0u32;
        let labels = loop {
            attempts += 1;
            match service.label(&uri).await {
                Ok(labels) => break labels,
                Err(err) => {
                    if attempts >= retry.max_attempts {
                        return Err(LabelError::RetriesExhausted { uri, attempts });
                    }
                    warn!(
                        "labeling {uri} failed ({err}); retrying in {}s",
                        retry.cooldown.as_secs()
                    );
                    tokio::time::sleep(retry.cooldown).await;
                }
            }
        };
        results.insert(uri, LabeledImage { labels, classification });
    }

    Ok(results)
}

/// Reads whitespace-separated `uri classification` pairs, one per line.
pub fn read_uri_file(path: &Path) -> anyhow::Result<Vec<(String, String)>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading uri file {}", path.display()))?;
    let mut items = Vec::new();
    for line in contents.lines() {
        let mut fields = line.split_whitespace();
        let (Some(uri), Some(classification)) = (fields.next(), fields.next()) else {
            continue;
        };
        items.push((uri.to_string(), classification.to_string()));
    }
    Ok(items)
}

/// Persists the merged mapping as JSON.
pub fn write_results(
    path: &Path,
    results: &HashMap<String, LabeledImage>,
) -> anyhow::Result<()> {
    let json = serde_json::to_string(results)?;
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Service that fails with quota errors a fixed number of times per uri
    /// before succeeding.
    struct FlakyService {
        failures_per_uri: u32,
        attempts: Mutex<HashMap<String, u32>>,
    }

    impl FlakyService {
        fn new(failures_per_uri: u32) -> Self {
            Self { failures_per_uri, attempts: Mutex::new(HashMap::new()) }
        }
    }

    impl LabelService for FlakyService {
        async fn label(&self, uri: &str) -> Result<Vec<(String, f64)>, LabelError> {
            let mut attempts = self.attempts.lock().unwrap();
            let seen = attempts.entry(uri.to_string()).or_insert(0);
            *seen += 1;
            if *seen <= self.failures_per_uri {
                return Err(LabelError::QuotaExhausted);
            }
            Ok(vec![("eclipse".to_string(), 0.9)])
        }
    }

    fn items(n: usize) -> Vec<(String, String)> {
        (0..n)
            .map(|i| (format!("gs://bucket/img_{i}.jpg"), "partial".to_string()))
            .collect()
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy { cooldown: Duration::from_secs(100), max_attempts: 3 }
    }

    #[tokio::test(start_paused = true)]
    async fn every_uri_appears_exactly_once() {
        let labeler = BatchLabeler::new(FlakyService::new(0))
            .with_batch_size(4)
            .with_workers(3)
            .with_retry(fast_retry());
        let input = items(10);
        let results = labeler.label_all(input.clone()).await.unwrap();

        assert_eq!(results.len(), 10);
        for (uri, classification) in &input {
            let labeled = results.get(uri).expect("uri missing from results");
            assert_eq!(&labeled.classification, classification);
            assert_eq!(labeled.labels, vec![("eclipse".to_string(), 0.9)]);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn merge_is_independent_of_input_order() {
        let input = items(9);
        let mut reversed = input.clone();
        reversed.reverse();

        let forward = BatchLabeler::new(FlakyService::new(0))
            .with_retry(fast_retry())
            .label_all(input)
            .await
            .unwrap();
        let backward = BatchLabeler::new(FlakyService::new(0))
            .with_retry(fast_retry())
            .label_all(reversed)
            .await
            .unwrap();

        assert_eq!(forward, backward);
    }

    #[tokio::test(start_paused = true)]
    async fn quota_stalls_are_retried_after_the_cooldown() {
        let labeler = BatchLabeler::new(FlakyService::new(2)).with_retry(fast_retry());
        let results = labeler.label_all(items(2)).await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_failures_exhaust_retries() {
        let labeler = BatchLabeler::new(FlakyService::new(u32::MAX)).with_retry(fast_retry());
        let err = labeler.label_all(items(1)).await.unwrap_err();
        match err {
            LabelError::RetriesExhausted { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn uri_file_parses_whitespace_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uris.txt");
        fs::write(&path, "gs://a/1.jpg partial\n\ngs://a/2.jpg total\n").unwrap();
        let items = read_uri_file(&path).unwrap();
        assert_eq!(
            items,
            vec![
                ("gs://a/1.jpg".to_string(), "partial".to_string()),
                ("gs://a/2.jpg".to_string(), "total".to_string()),
            ]
        );
    }
}
