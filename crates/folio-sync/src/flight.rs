//! Per-key deduplication of concurrent fetches.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use folio_core::sanitize_for_log;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

use crate::error::FetchError;

type SharedFetch<T> = Shared<BoxFuture<'static, Result<T, FetchError>>>;

/// Collapses concurrent fetches for the same key into one.
///
/// The first caller for a key starts the fetch on its own task; callers that
/// arrive while it runs await the same shared future. The fetch keeps running
/// if its initiating caller goes away, so joined callers still get a result.
/// Different keys never wait on each other.
pub struct SingleFlight<T> {
    inflight: Arc<Mutex<HashMap<String, SharedFetch<T>>>>,
}

/// Removes a key from the in-flight map when the fetch task ends.
struct Release<T> {
    registry: Arc<Mutex<HashMap<String, SharedFetch<T>>>>,
    key: String,
}

impl<T> Drop for Release<T> {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.key);
    }
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the future built by `start` unless a fetch for `key` is already
    /// in flight, in which case `start` is dropped unused and the in-flight
    /// outcome is returned.
    pub async fn run<F, Fut>(&self, key: &str, start: F) -> Result<T, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let shared = {
            let mut inflight = self.inflight.lock();
            if let Some(existing) = inflight.get(key) {
                tracing::debug!(key = %sanitize_for_log(key), "joining in-flight fetch");
                existing.clone()
            } else {
                let fetch = start();
                let registry = Arc::clone(&self.inflight);
                let owned_key = key.to_string();
                // The guard is built on first poll, never under the lock held
                // here; it releases the key on return and on panic alike.
                let task = tokio::spawn(async move {
                    let _release = Release {
                        registry,
                        key: owned_key,
                    };
                    fetch.await
                });
                let shared = async move {
                    task.await.unwrap_or_else(|e| {
                        Err(FetchError::Aborted {
                            detail: e.to_string(),
                        })
                    })
                }
                .boxed()
                .shared();
                inflight.insert(key.to_string(), shared.clone());
                shared
            }
        };
        shared.await
    }

    /// Number of keys with a fetch currently in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inflight.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn concurrent_callers_share_one_execution() {
        let flight = Arc::new(SingleFlight::<u32>::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let flight = Arc::clone(&flight);
            let runs = Arc::clone(&runs);
            handles.push(tokio::spawn(async move {
                flight
                    .run("alice", move || async move {
                        runs.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok(7)
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(7));
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(flight.in_flight(), 0);
    }

    #[tokio::test]
    async fn failures_are_shared_too() {
        let flight = Arc::new(SingleFlight::<u32>::new());
        let a = {
            let flight = Arc::clone(&flight);
            tokio::spawn(async move {
                flight
                    .run("bob", || async {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Err(FetchError::Rejected { status: 404 })
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let b = flight.run("bob", || async { Ok(1) }).await;

        assert_eq!(b, Err(FetchError::Rejected { status: 404 }));
        assert_eq!(a.await.unwrap(), Err(FetchError::Rejected { status: 404 }));
    }

    #[tokio::test]
    async fn distinct_keys_run_independently() {
        let flight = SingleFlight::<&'static str>::new();
        let (a, b) = tokio::join!(
            flight.run("a", || async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok("a")
            }),
            flight.run("b", || async { Ok("b") }),
        );
        assert_eq!(a, Ok("a"));
        assert_eq!(b, Ok("b"));
    }

    #[tokio::test]
    async fn key_is_released_after_completion() {
        let flight = SingleFlight::<u32>::new();
        assert_eq!(flight.run("k", || async { Ok(1) }).await, Ok(1));
        assert_eq!(flight.run("k", || async { Ok(2) }).await, Ok(2));
    }

    #[tokio::test]
    async fn key_is_released_after_a_panicking_fetch() {
        let flight = SingleFlight::<u32>::new();

        let first = flight
            .run("carol", || async { panic!("fetch blew up") })
            .await;
        assert!(matches!(first, Err(FetchError::Aborted { .. })), "{first:?}");
        assert_eq!(flight.in_flight(), 0);

        let second = flight.run("carol", || async { Ok(5) }).await;
        assert_eq!(second, Ok(5));
    }
}
