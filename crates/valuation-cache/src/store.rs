use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;
use valuation_core::ValuationError;

/// Pipeline stage a cache entry belongs to; each stage has its own TTL
/// class and subdirectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStage {
    Extraction,
    Valuation,
    Analysis,
    Price,
}

impl CacheStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStage::Extraction => "extraction",
            CacheStage::Valuation => "valuation",
            CacheStage::Analysis => "analysis",
            CacheStage::Price => "price",
        }
    }
}

/// One persisted cache record. Entries are created by writers, expire by
/// TTL or explicit invalidation, and are never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub stage: CacheStage,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub ttl_secs: u64,
}

impl CacheEntry {
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.created_at + ChronoDuration::seconds(self.ttl_secs as i64)
    }
}

struct Inner {
    dir: PathBuf,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Shared on-disk KV store: one JSON file per fingerprint under a per-stage
/// subdirectory, atomic writes via temp file + rename, per-key single-flight
/// locks. Survives process restart; concurrent readers and writers are safe
/// because readers only ever see fully renamed files.
#[derive(Clone)]
pub struct CacheStore {
    inner: Arc<Inner>,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Inner {
                dir: dir.into(),
                locks: DashMap::new(),
            }),
        }
    }

    fn entry_path(&self, stage: CacheStage, fingerprint: &str) -> PathBuf {
        self.inner
            .dir
            .join(stage.as_str())
            .join(format!("{}.json", fingerprint))
    }

    /// Read an entry; expired entries are removed and reported as a miss.
    pub async fn get(
        &self,
        stage: CacheStage,
        fingerprint: &str,
    ) -> Result<Option<CacheEntry>, ValuationError> {
        let path = self.entry_path(stage, fingerprint);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(_) => return Ok(None),
        };

        let entry: CacheEntry = match serde_json::from_slice(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                // A corrupt entry is treated as a miss and cleared.
                tracing::warn!("corrupt cache entry {} ({}), discarding", fingerprint, e);
                let _ = tokio::fs::remove_file(&path).await;
                return Ok(None);
            }
        };

        if entry.is_expired() {
            tracing::debug!("cache entry {} expired", fingerprint);
            let _ = tokio::fs::remove_file(&path).await;
            return Ok(None);
        }

        Ok(Some(entry))
    }

    /// Typed read of an entry's payload.
    pub async fn get_payload<T: DeserializeOwned>(
        &self,
        stage: CacheStage,
        fingerprint: &str,
    ) -> Result<Option<T>, ValuationError> {
        match self.get(stage, fingerprint).await? {
            Some(entry) => {
                let value = serde_json::from_value(entry.payload).map_err(|e| {
                    ValuationError::CacheError(format!(
                        "cache payload for {} does not deserialize: {}",
                        fingerprint, e
                    ))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Durably write an entry: serialize, write to a temp file in the same
    /// directory, rename over the final path.
    pub async fn set<T: Serialize>(
        &self,
        stage: CacheStage,
        fingerprint: &str,
        payload: &T,
        ttl: Duration,
    ) -> Result<(), ValuationError> {
        let entry = CacheEntry {
            fingerprint: fingerprint.to_string(),
            stage,
            payload: serde_json::to_value(payload)
                .map_err(|e| ValuationError::CacheError(format!("serialize failed: {}", e)))?,
            created_at: Utc::now(),
            ttl_secs: ttl.as_secs(),
        };

        let path = self.entry_path(stage, fingerprint);
        let dir = path.parent().expect("entry path has a parent");
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| ValuationError::CacheError(format!("create cache dir failed: {}", e)))?;

        let bytes = serde_json::to_vec(&entry)
            .map_err(|e| ValuationError::CacheError(format!("serialize failed: {}", e)))?;
        let tmp = dir.join(format!(".{}.tmp", fingerprint));
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| ValuationError::CacheError(format!("cache write failed: {}", e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| ValuationError::CacheError(format!("cache rename failed: {}", e)))?;

        tracing::debug!(
            "cached {} entry {} (ttl {}s)",
            stage.as_str(),
            fingerprint,
            entry.ttl_secs
        );
        Ok(())
    }

    /// Explicit refresh path: drop the entry so the next read recomputes.
    pub async fn invalidate(
        &self,
        stage: CacheStage,
        fingerprint: &str,
    ) -> Result<bool, ValuationError> {
        let path = self.entry_path(stage, fingerprint);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!("invalidated {} entry {}", stage.as_str(), fingerprint);
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    /// Run `producer` under this key's single-flight lock.
    ///
    /// Concurrent callers for the same fingerprint serialize on the lock;
    /// followers re-check the cache after acquiring it and observe the
    /// leader's result. The producer and the cache write run on a spawned
    /// task holding the lock guard, so a cancelled caller does not abandon
    /// the write: the lock is released only after the entry is durable.
    pub async fn with_single_flight<T, F, Fut>(
        &self,
        stage: CacheStage,
        fingerprint: &str,
        ttl: Duration,
        producer: F,
    ) -> Result<T, ValuationError>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ValuationError>> + Send + 'static,
    {
        let lock = self
            .inner
            .locks
            .entry(fingerprint.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;

        if let Some(hit) = self.get_payload::<T>(stage, fingerprint).await? {
            return Ok(hit);
        }

        let store = self.clone();
        let fingerprint = fingerprint.to_string();
        let fut = producer();
        let task = tokio::spawn(async move {
            let _guard = guard;
            let value = fut.await?;
            store.set(stage, &fingerprint, &value, ttl).await?;
            Ok::<T, ValuationError>(value)
        });

        match task.await {
            Ok(result) => result,
            Err(e) => Err(ValuationError::CacheError(format!(
                "single-flight producer panicked: {}",
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn set_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());

        store
            .set(CacheStage::Valuation, "abc123", &42u32, Duration::from_secs(60))
            .await
            .unwrap();
        let value: Option<u32> = store
            .get_payload(CacheStage::Valuation, "abc123")
            .await
            .unwrap();
        assert_eq!(value, Some(42));

        let entry = store.get(CacheStage::Valuation, "abc123").await.unwrap().unwrap();
        assert_eq!(entry.stage, CacheStage::Valuation);
        assert_eq!(entry.ttl_secs, 60);
    }

    #[tokio::test]
    async fn miss_on_unknown_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let value: Option<u32> = store.get_payload(CacheStage::Price, "nothing").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn zero_ttl_expires_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        store
            .set(CacheStage::Price, "spot", &100.0f64, Duration::from_secs(0))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let value: Option<f64> = store.get_payload(CacheStage::Price, "spot").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        store
            .set(CacheStage::Analysis, "memo1", &"payload", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(store.invalidate(CacheStage::Analysis, "memo1").await.unwrap());
        assert!(!store.invalidate(CacheStage::Analysis, "memo1").await.unwrap());
        let value: Option<String> = store.get_payload(CacheStage::Analysis, "memo1").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = CacheStore::new(dir.path());
            store
                .set(CacheStage::Extraction, "persist", &7i64, Duration::from_secs(600))
                .await
                .unwrap();
        }
        let reopened = CacheStore::new(dir.path());
        let value: Option<i64> = reopened
            .get_payload(CacheStage::Extraction, "persist")
            .await
            .unwrap();
        assert_eq!(value, Some(7));
    }

    #[tokio::test]
    async fn stages_are_namespaced() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        store
            .set(CacheStage::Extraction, "same-key", &1u32, Duration::from_secs(60))
            .await
            .unwrap();
        let other: Option<u32> = store.get_payload(CacheStage::Valuation, "same-key").await.unwrap();
        assert_eq!(other, None);
    }

    #[tokio::test]
    async fn single_flight_runs_producer_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                store
                    .with_single_flight(
                        CacheStage::Extraction,
                        "hotkey",
                        Duration::from_secs(60),
                        move || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok::<u64, ValuationError>(99)
                        },
                    )
                    .await
                    .unwrap()
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), 99);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn single_flight_leader_failure_releases_followers() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());
        let calls = Arc::new(AtomicUsize::new(0));

        let failing = store
            .with_single_flight(CacheStage::Valuation, "flaky", Duration::from_secs(60), {
                let calls = calls.clone();
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<u64, _>(ValuationError::ExtractionFailed("boom".into()))
                }
            })
            .await;
        assert!(failing.is_err());

        // A later caller is not poisoned; the producer runs again.
        let ok = store
            .with_single_flight(CacheStage::Valuation, "flaky", Duration::from_secs(60), {
                let calls = calls.clone();
                move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<u64, ValuationError>(7)
                }
            })
            .await
            .unwrap();
        assert_eq!(ok, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cancelled_leader_still_writes() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path());

        let leader = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .with_single_flight(
                        CacheStage::Analysis,
                        "cancelme",
                        Duration::from_secs(60),
                        move || async move {
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            Ok::<u64, ValuationError>(123)
                        },
                    )
                    .await
            })
        };

        // Cancel the waiting caller while the producer is mid-flight.
        tokio::time::sleep(Duration::from_millis(20)).await;
        leader.abort();

        // The detached producer finishes and commits its write.
        tokio::time::sleep(Duration::from_millis(300)).await;
        let value: Option<u64> = store
            .get_payload(CacheStage::Analysis, "cancelme")
            .await
            .unwrap();
        assert_eq!(value, Some(123));
    }
}
