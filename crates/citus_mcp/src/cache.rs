//! Result cache with TTL and single-flight coalescing (spec.md §4.7, §9).
//!
//! The in-flight registry never holds the main cache lock during compute:
//! a concurrent miss either becomes the sole producer (holds an entry in
//! `inflight` and runs `compute`) or waits on that producer's broadcast
//! channel. The cache entry is written only on success.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::{broadcast, Mutex};

use crate::errors::ToolError;

#[derive(Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

enum Slot {
    Producing(broadcast::Sender<Result<Value, String>>),
}

/// Removes this key's `inflight` entry unconditionally once the producer is
/// done with it — including if the producing future is dropped mid-compute
/// (cancellation), which would otherwise leave a `Slot::Producing` behind
/// forever and hang every later caller for that key on `rx.recv()`.
struct InflightGuard<'a> {
    inflight: &'a StdMutex<HashMap<String, Slot>>,
    key: String,
    done: bool,
}

impl<'a> InflightGuard<'a> {
    fn new(inflight: &'a StdMutex<HashMap<String, Slot>>, key: String) -> Self {
        Self {
            inflight,
            key,
            done: false,
        }
    }

    /// Remove and return this key's slot so the caller can broadcast a
    /// result on it. Marks the guard finished so `Drop` is a no-op.
    fn take(&mut self) -> Option<Slot> {
        self.done = true;
        self.inflight.lock().unwrap().remove(&self.key)
    }
}

impl<'a> Drop for InflightGuard<'a> {
    fn drop(&mut self) {
        if !self.done {
            self.inflight.lock().unwrap().remove(&self.key);
        }
    }
}

pub struct ResultCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    inflight: StdMutex<HashMap<String, Slot>>,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            inflight: StdMutex::new(HashMap::new()),
        }
    }

    /// `Get(key) -> (value, ok)`.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// `Set(key, value, ttl)`.
    pub async fn set(&self, key: &str, value: Value, ttl: Duration) {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// `GetOrCompute(key, ttl, compute)`: concurrent callers with the same
    /// key cause `compute` to run exactly once; all observe the same result.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<Value, ToolError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Value, ToolError>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }

        let mut rx = {
            let mut inflight = self.inflight.lock().unwrap();
            match inflight.get(key) {
                Some(Slot::Producing(tx)) => Some(tx.subscribe()),
                None => {
                    let (tx, _rx) = broadcast::channel(1);
                    inflight.insert(key.to_string(), Slot::Producing(tx));
                    None
                }
            }
        };

        if let Some(rx) = rx.take() {
            return wait_for_result(rx).await;
        }

        // We are the producer. `guard` removes our `inflight` entry even if
        // this future is cancelled before `compute` resolves.
        let mut guard = InflightGuard::new(&self.inflight, key.to_string());
        let result = compute().await;
        let broadcast_result = result
            .as_ref()
            .map(|v| v.clone())
            .map_err(|e| e.to_string());

        if let Ok(ref value) = result {
            self.set(key, value.clone(), ttl).await;
        }

        if let Some(Slot::Producing(tx)) = guard.take() {
            let _ = tx.send(broadcast_result);
        }

        result
    }
}

async fn wait_for_result(
    mut rx: broadcast::Receiver<Result<Value, String>>,
) -> Result<Value, ToolError> {
    match rx.recv().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(message)) => Err(ToolError::internal(message)),
        Err(_) => Err(ToolError::internal(
            "single-flight producer dropped before completing",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn set_then_get_returns_fresh_value() {
        let cache = ResultCache::new();
        cache
            .set("k", serde_json::json!(1), Duration::from_secs(60))
            .await;
        assert_eq!(cache.get("k").await, Some(serde_json::json!(1)));
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss() {
        let cache = ResultCache::new();
        cache
            .set("k", serde_json::json!(1), Duration::from_millis(1))
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn concurrent_misses_coalesce_to_one_compute() {
        let cache = Arc::new(ResultCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute("k", Duration::from_secs(60), || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(serde_json::json!(42))
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), serde_json::json!(42));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_producer_does_not_wedge_future_callers() {
        let cache = Arc::new(ResultCache::new());

        let fut = cache.get_or_compute("k", Duration::from_secs(60), || async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(serde_json::json!(1))
        });
        tokio::select! {
            _ = fut => panic!("compute should not have finished"),
            _ = tokio::time::sleep(Duration::from_millis(10)) => {}
        }

        let result = tokio::time::timeout(
            Duration::from_millis(200),
            cache.get_or_compute("k", Duration::from_secs(60), || async {
                Ok(serde_json::json!(2))
            }),
        )
        .await
        .expect("new producer must not hang behind the cancelled one")
        .unwrap();
        assert_eq!(result, serde_json::json!(2));
    }
}
