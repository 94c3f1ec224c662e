//! Keyed deduplication of in-flight asynchronous work.
//!
//! Concurrent requests for the same key join one shared task instead of
//! running the work twice. The completing task removes its own map entry
//! before its outcome resolves for waiters, so a failure is never replayed:
//! the next `get_or_start` for that key begins a fresh attempt.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};

/// Handle to a deduplicated in-flight operation. Cloneable; every clone
/// resolves to the same outcome. Dropping one handle does not cancel the
/// operation while other handles remain.
pub type InFlight<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

/// Registry of in-flight operations keyed by `K`. The lock guards only map
/// bookkeeping (lookup, insert, remove); the operation body runs outside it,
/// so distinct keys never block each other.
pub struct SingleFlightStore<K, V, E> {
    inflight: Arc<Mutex<HashMap<K, InFlight<V, E>>>>,
}

impl<K, V, E> SingleFlightStore<K, V, E>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Join the in-flight operation for `key`, or invoke `start` to begin one.
    ///
    /// `start` only constructs a (lazy) future; it runs synchronously and must
    /// not block. If it panics nothing has been inserted, so no dangling entry
    /// remains and the store stays usable. The registered entry is removed by
    /// the operation itself the moment it completes, success or failure,
    /// before the result becomes observable through the returned handle.
    pub fn get_or_start<F, Fut>(&self, key: K, start: F) -> InFlight<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let mut map = lock_inflight(&self.inflight);
        if let Some(task) = map.get(&key) {
            return task.clone();
        }

        let fut = start();
        let inflight = Arc::clone(&self.inflight);
        let k = key.clone();
        let task: InFlight<V, E> = async move {
            let result = fut.await;
            // Entries are only ever removed here, so this cannot evict a
            // newer task for the same key.
            lock_inflight(&inflight).remove(&k);
            result
        }
        .boxed()
        .shared();

        map.insert(key, task.clone());
        task
    }

    /// Number of operations currently in flight.
    pub fn len(&self) -> usize {
        lock_inflight(&self.inflight).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Acquire the map, recovering from poisoning. A panic under the lock (a
/// panicking factory, for instance) happens between complete map updates,
/// so the map is consistent at every acquire point and the poison flag
/// carries no information.
fn lock_inflight<K, V, E>(
    inflight: &Mutex<HashMap<K, InFlight<V, E>>>,
) -> MutexGuard<'_, HashMap<K, InFlight<V, E>>> {
    inflight.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<K, V, E> Default for SingleFlightStore<K, V, E>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    type Store = SingleFlightStore<&'static str, u32, String>;

    #[tokio::test]
    async fn concurrent_callers_share_one_execution() {
        let store = Store::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let r = Arc::clone(&runs);
        let first = store.get_or_start("k", move || async move {
            r.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(7)
        });
        // The factory for a joining caller must not run at all.
        let second = store.get_or_start("k", || async { panic!("duplicate execution") });

        let (a, b) = tokio::join!(first, second);
        assert_eq!(a.unwrap(), 7);
        assert_eq!(b.unwrap(), 7);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_keys_run_independently() {
        let store = Store::new();
        let a = store.get_or_start("a", || async { Ok(1) });
        let b = store.get_or_start("b", || async { Ok(2) });
        assert_eq!(store.len(), 2);
        assert_eq!(a.await.unwrap(), 1);
        assert_eq!(b.await.unwrap(), 2);
    }

    #[tokio::test]
    async fn failure_is_evicted_before_waiters_observe_it() {
        let store = Store::new();

        let err = store
            .get_or_start("k", || async { Err("boom".to_string()) })
            .await
            .unwrap_err();
        assert_eq!(err, "boom");
        // Observing the failure implies the entry is already gone.
        assert!(store.is_empty());

        let runs = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&runs);
        let retry = store.get_or_start("k", move || async move {
            r.fetch_add(1, Ordering::SeqCst);
            Ok(9)
        });
        assert_eq!(retry.await.unwrap(), 9);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn completed_entries_do_not_linger() {
        let store = Store::new();
        store.get_or_start("k", || async { Ok(1) }).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn panicking_factory_does_not_wedge_the_store() {
        let store = Arc::new(Store::new());

        let s = Arc::clone(&store);
        let joined = tokio::spawn(async move {
            let _ = s.get_or_start("k", || -> std::future::Ready<Result<u32, String>> {
                panic!("factory failed")
            });
        })
        .await;
        assert!(joined.is_err());

        // The panic happened under the lock; later callers must still work.
        assert!(store.is_empty());
        let retry = store.get_or_start("k", || async { Ok(5) });
        assert_eq!(retry.await.unwrap(), 5);
    }

    #[tokio::test]
    async fn one_joiner_dropping_does_not_cancel_the_flight() {
        let store = Store::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let r = Arc::clone(&runs);
        let first = store.get_or_start("k", move || async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            r.fetch_add(1, Ordering::SeqCst);
            Ok(3)
        });
        let second = store.get_or_start("k", || async { unreachable!() });
        drop(second);

        assert_eq!(first.await.unwrap(), 3);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
