use crate::entities::item::{EntityHandle, ItemId};
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no entity for item {0}")]
    NotFound(ItemId),
}

/// Maps a wire identifier to a renderable entity.
///
/// Implementations must be side-effect free from the caller's point of view;
/// the view grid calls them from its apply thread only.
pub trait EntityResolver: Send + Sync {
    fn resolve(&self, id: ItemId) -> Result<EntityHandle, ResolveError>;
}

/// Owner-held table of known entities.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: HashMap<ItemId, EntityHandle>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity: EntityHandle) -> Option<EntityHandle> {
        self.entities.insert(entity.id(), entity)
    }

    pub fn remove(&mut self, id: ItemId) -> Option<EntityHandle> {
        self.entities.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl EntityResolver for EntityRegistry {
    fn resolve(&self, id: ItemId) -> Result<EntityHandle, ResolveError> {
        self.entities
            .get(&id)
            .cloned()
            .ok_or(ResolveError::NotFound(id))
    }
}

impl<R: EntityResolver + ?Sized> EntityResolver for std::sync::Arc<R> {
    fn resolve(&self, id: ItemId) -> Result<EntityHandle, ResolveError> {
        (**self).resolve(id)
    }
}

impl<R: EntityResolver> EntityResolver for std::sync::RwLock<R> {
    fn resolve(&self, id: ItemId) -> Result<EntityHandle, ResolveError> {
        match self.read() {
            Ok(inner) => inner.resolve(id),
            Err(poisoned) => poisoned.into_inner().resolve(id),
        }
    }
}

/// Resolver cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolverStats {
    pub hits: u64,
    pub misses: u64,
    pub failures: u64,
}

impl ResolverStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64) / (total as f64)
        }
    }
}

struct CacheState {
    entries: LruCache<ItemId, EntityHandle>,
    stats: ResolverStats,
}

/// LRU cache in front of a slower resolver.
///
/// Only successful lookups are cached, so an entity that shows up after a
/// failed lookup is found on the next attempt.
pub struct CachedResolver<R> {
    inner: R,
    state: Mutex<CacheState>,
}

impl<R: EntityResolver> CachedResolver<R> {
    pub fn new(inner: R, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            state: Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                stats: ResolverStats::default(),
            }),
        }
    }

    pub fn stats(&self) -> ResolverStats {
        match self.state.lock() {
            Ok(state) => state.stats,
            Err(poisoned) => poisoned.into_inner().stats,
        }
    }

    /// Drop a cached entry so the next lookup goes to the inner resolver.
    pub fn invalidate(&self, id: ItemId) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.entries.pop(&id);
    }
}

impl<R: EntityResolver> EntityResolver for CachedResolver<R> {
    fn resolve(&self, id: ItemId) -> Result<EntityHandle, ResolveError> {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(handle) = state.entries.get(&id) {
            let handle = handle.clone();
            state.stats.hits += 1;
            return Ok(handle);
        }
        state.stats.misses += 1;
        match self.inner.resolve(id) {
            Ok(handle) => {
                state.entries.put(id, handle.clone());
                Ok(handle)
            }
            Err(err) => {
                state.stats.failures += 1;
                Err(err)
            }
        }
    }
}
