use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::bot::error::Error;
use crate::store::document_store::DocumentStore;

/// Time-boxed read-through cache in front of the document store for one
/// config domain (namespace), keyed by guild id.
///
/// `get` always hands out a copy, so callers mutating the returned value can
/// never corrupt the cached one. A guild with no stored config gets the
/// domain default materialized and persisted on first access. Writes through
/// `set` update the cache synchronously, so a reader after a completed write
/// never observes the old value; out-of-band writes become visible once the
/// TTL expires.
pub struct ConfigCache<T> {
    store: Arc<DocumentStore>,
    namespace: &'static str,
    ttl: Duration,
    entries: DashMap<u64, CachedEntry>,
    _marker: PhantomData<fn() -> T>,
}

struct CachedEntry {
    // Stored as JSON to keep the map type simple; cloning on read is the
    // defensive-copy guarantee either way.
    value: Value,
    fetched_at: Instant,
}

impl<T> ConfigCache<T>
where
    T: Clone + Default + Serialize + DeserializeOwned,
{
    pub fn new(store: Arc<DocumentStore>, namespace: &'static str, ttl: Duration) -> Self {
        Self {
            store,
            namespace,
            ttl,
            entries: DashMap::new(),
            _marker: PhantomData,
        }
    }

    /// Get the guild's config, from cache when fresh, from the store
    /// otherwise. Materializes and persists the default on first access.
    pub async fn get(&self, guild_id: u64) -> Result<T, Error> {
        if let Some(entry) = self.entries.get(&guild_id) {
            if entry.fetched_at.elapsed() < self.ttl {
                return Ok(serde_json::from_value(entry.value.clone())?);
            }
        }

        let config = match self.store.load::<T>(self.namespace, &guild_id.to_string()).await? {
            Some(config) => config,
            None => {
                let config = T::default();
                self.store
                    .save(self.namespace, &guild_id.to_string(), &config)
                    .await?;
                debug!("Materialized default {} config for guild {}", self.namespace, guild_id);
                config
            }
        };

        self.insert(guild_id, &config)?;
        Ok(config)
    }

    /// Write through to the store, then update the cache. The cache is only
    /// refreshed after the save succeeds, so a failed write leaves readers
    /// seeing the old (still durable) value.
    pub async fn set(&self, guild_id: u64, config: &T) -> Result<(), Error> {
        self.store
            .save(self.namespace, &guild_id.to_string(), config)
            .await?;
        self.insert(guild_id, config)?;
        Ok(())
    }

    /// Force the next `get` for this guild to bypass the cache
    pub fn invalidate(&self, guild_id: u64) {
        self.entries.remove(&guild_id);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    fn insert(&self, guild_id: u64, config: &T) -> Result<(), Error> {
        self.entries.insert(
            guild_id,
            CachedEntry {
                value: serde_json::to_value(config)?,
                fetched_at: Instant::now(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::guild_config::GuildConfig;

    fn scratch() -> (Arc<DocumentStore>, ConfigCache<GuildConfig>) {
        let dir = std::env::temp_dir().join(format!("warden-cache-{}", uuid::Uuid::new_v4()));
        let store = Arc::new(DocumentStore::new(dir));
        let cache = ConfigCache::new(store.clone(), "guild_configs", Duration::from_secs(300));
        (store, cache)
    }

    #[tokio::test]
    async fn first_access_materializes_and_persists_default() {
        let (store, cache) = scratch();
        assert!(!store.exists("guild_configs", "42").await);

        let config = cache.get(42).await.unwrap();
        assert_eq!(config, GuildConfig::default());
        assert!(store.exists("guild_configs", "42").await);
    }

    #[tokio::test]
    async fn repeated_gets_are_identical_and_served_from_cache() {
        let (store, cache) = scratch();
        let first = cache.get(42).await.unwrap();

        // Delete the backing file: a second get within the TTL must be a
        // cache hit, never a reload (which would re-materialize the file).
        store.delete("guild_configs", "42").await.unwrap();

        let second = cache.get(42).await.unwrap();
        assert_eq!(first, second);
        assert!(!store.exists("guild_configs", "42").await);
    }

    #[tokio::test]
    async fn mutating_a_returned_copy_does_not_poison_the_cache() {
        let (_store, cache) = scratch();
        let mut copy = cache.get(42).await.unwrap();
        copy.auto_pardon = !copy.auto_pardon;
        copy.warning_expiry_days = 1;

        let fresh = cache.get(42).await.unwrap();
        assert_eq!(fresh, GuildConfig::default());
    }

    #[tokio::test]
    async fn set_writes_through_and_updates_cache_synchronously() {
        let (store, cache) = scratch();
        let mut config = cache.get(42).await.unwrap();
        config.auto_pardon = true;
        cache.set(42, &config).await.unwrap();

        let read_back = cache.get(42).await.unwrap();
        assert!(read_back.auto_pardon);

        let stored: GuildConfig = store
            .load("guild_configs", "42")
            .await
            .unwrap()
            .unwrap();
        assert!(stored.auto_pardon);
    }

    #[tokio::test]
    async fn expired_entries_are_refreshed_from_the_store() {
        let dir = std::env::temp_dir().join(format!("warden-cache-{}", uuid::Uuid::new_v4()));
        let store = Arc::new(DocumentStore::new(dir));
        let cache: ConfigCache<GuildConfig> =
            ConfigCache::new(store.clone(), "guild_configs", Duration::from_millis(10));

        cache.get(42).await.unwrap();

        // Out-of-band write, bypassing the cache
        let mut config = GuildConfig::default();
        config.warning_expiry_days = 7;
        store.save("guild_configs", "42", &config).await.unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        let refreshed = cache.get(42).await.unwrap();
        assert_eq!(refreshed.warning_expiry_days, 7);
    }

    #[tokio::test]
    async fn invalidate_forces_a_reload() {
        let (store, cache) = scratch();
        cache.get(42).await.unwrap();

        let mut config = GuildConfig::default();
        config.allow_appeals = false;
        store.save("guild_configs", "42", &config).await.unwrap();

        cache.invalidate(42);
        let reloaded = cache.get(42).await.unwrap();
        assert!(!reloaded.allow_appeals);
    }
}
