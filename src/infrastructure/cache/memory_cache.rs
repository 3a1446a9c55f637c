use crate::application::ports::ReactiveCache;
use crate::domain::value_objects::CacheKey;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};

const CHANGE_FEED_CAPACITY: usize = 256;

/// In-memory read cache. Every write is announced on a broadcast change feed
/// so views can re-render; lagging subscribers only miss notifications.
pub struct MemoryReactiveCache<T: Clone> {
    entries: Arc<RwLock<HashMap<CacheKey, T>>>,
    changes: broadcast::Sender<CacheKey>,
}

impl<T> MemoryReactiveCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            changes,
        }
    }

    pub async fn keys(&self) -> Vec<CacheKey> {
        let entries = self.entries.read().await;
        let mut keys: Vec<CacheKey> = entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn clear(&self) {
        let keys = {
            let mut entries = self.entries.write().await;
            entries.drain().map(|(key, _)| key).collect::<Vec<_>>()
        };
        for key in keys {
            self.notify(key);
        }
    }

    pub async fn size(&self) -> usize {
        self.entries.read().await.len()
    }

    fn notify(&self, key: CacheKey) {
        // No receivers is not an error.
        let _ = self.changes.send(key);
    }
}

impl<T> Default for MemoryReactiveCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> ReactiveCache<T> for MemoryReactiveCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &CacheKey) -> Option<T> {
        self.entries.read().await.get(key).cloned()
    }

    async fn set(&self, key: &CacheKey, value: T) {
        self.entries.write().await.insert(key.clone(), value);
        self.notify(key.clone());
    }

    async fn remove(&self, key: &CacheKey) {
        let removed = self.entries.write().await.remove(key).is_some();
        if removed {
            self.notify(key.clone());
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<CacheKey> {
        self.changes.subscribe()
    }
}
