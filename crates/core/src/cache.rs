//! TTL resource cache with in-flight load deduplication.

use std::{
    collections::HashMap,
    future::Future,
    hash::Hash,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use tokio::sync::OnceCell;

/// A time-limited cache for expensive resources.
///
/// Entries expire once `insertion time + duration` is reached; a `None`
/// duration means unlimited. Concurrent loads for one key share a single
/// pending cell, so exactly one loader runs and every waiter observes
/// the same outcome.
pub struct ResourceCache<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
    default_ttl: Option<Duration>,
}

struct Entry<V> {
    inserted: Instant,
    ttl: Option<Duration>,
    cell: Arc<OnceCell<V>>,
}

impl<V> Entry<V> {
    fn expired(&self, now: Instant) -> bool {
        match self.ttl {
            Some(ttl) => self.inserted + ttl <= now,
            None => false,
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> ResourceCache<K, V> {
    /// Cache whose entries live for `default_ttl` (`None` = unlimited).
    pub fn new(default_ttl: Option<Duration>) -> Self {
        Self { entries: Mutex::new(HashMap::new()), default_ttl }
    }

    /// Cache whose entries never expire.
    pub fn unbounded() -> Self {
        Self::new(None)
    }

    /// Value for `key` if present and inside its lifetime; expired
    /// entries are evicted.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock().unwrap();
        let expired = entries.get(key)?.expired(Instant::now());
        if expired {
            entries.remove(key);
            return None;
        }
        entries.get(key).and_then(|entry| entry.cell.get().cloned())
    }

    /// Store a value with the default lifetime.
    pub fn insert(&self, key: K, value: V) {
        self.insert_with_ttl(key, value, self.default_ttl);
    }

    /// Store a value with an explicit lifetime (`None` = unlimited).
    pub fn insert_with_ttl(&self, key: K, value: V, ttl: Option<Duration>) {
        let entry = Entry {
            inserted: Instant::now(),
            ttl,
            cell: Arc::new(OnceCell::from(value)),
        };
        self.entries.lock().unwrap().insert(key, entry);
    }

    /// Value for `key`, loading it on a miss. Callers arriving during a
    /// load await the same in-flight result instead of loading again.
    pub async fn get_or_load<F, Fut>(&self, key: &K, load: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let cell = {
            let mut entries = self.entries.lock().unwrap();
            let now = Instant::now();
            match entries.get(key) {
                Some(entry) if !entry.expired(now) => Arc::clone(&entry.cell),
                _ => {
                    let entry = Entry {
                        inserted: now,
                        ttl: self.default_ttl,
                        cell: Arc::new(OnceCell::new()),
                    };
                    let cell = Arc::clone(&entry.cell);
                    entries.insert(key.clone(), entry);
                    cell
                }
            }
        };
        cell.get_or_init(load).await.clone()
    }
}
