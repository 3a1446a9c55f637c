use crate::domain::value_objects::CacheKey;
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Read cache the UI renders from. Every `set` is announced to subscribers.
#[async_trait]
pub trait ReactiveCache<T>: Send + Sync
where
    T: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &CacheKey) -> Option<T>;
    async fn set(&self, key: &CacheKey, value: T);
    async fn remove(&self, key: &CacheKey);
    fn subscribe(&self) -> broadcast::Receiver<CacheKey>;
}
