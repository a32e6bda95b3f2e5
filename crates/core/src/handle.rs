use crate::cache::{CacheStats, ClassCache};
use crate::error::{ClassCacheError, Result};
use crate::instrumentation::SharedApplier;
use crate::model::TypeNode;
use classcache_api::{AgentConfig, EventBatch, InstrumentationResult, TypeDescriptor};
use std::sync::Arc;

/// Class cache handle - shared by every client of the cache
///
/// This provides both async and sync APIs:
/// - Async API: for tokio-based transports, blocking work goes to the blocking pool
/// - Sync API: direct access to the underlying [`ClassCache`]
#[derive(Clone)]
pub struct ClassCacheHandle {
    cache: Arc<ClassCache>,
}

impl Default for ClassCacheHandle {
    fn default() -> Self {
        Self::new(ClassCache::new())
    }
}

impl ClassCacheHandle {
    pub fn new(cache: ClassCache) -> Self {
        Self {
            cache: Arc::new(cache),
        }
    }

    /// Create a handle from an existing shared cache
    pub fn from_cache(cache: Arc<ClassCache>) -> Self {
        Self { cache }
    }

    // ---- Sync API ----

    pub fn cache(&self) -> &ClassCache {
        &self.cache
    }

    // ---- Async API ----

    async fn run_blocking<R, F>(&self, op: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&ClassCache) -> Result<R> + Send + 'static,
    {
        let cache = self.cache.clone();
        tokio::task::spawn_blocking(move || op(cache.as_ref()))
            .await
            .map_err(|e| ClassCacheError::Task(e.to_string()))?
    }

    pub async fn merge(&self, candidate: TypeDescriptor) -> Result<EventBatch> {
        self.run_blocking(move |cache| cache.merge(candidate)).await
    }

    pub async fn merge_all(&self, candidates: Vec<TypeDescriptor>) -> Result<EventBatch> {
        self.run_blocking(move |cache| cache.merge_all(candidates))
            .await
    }

    pub async fn find_by_fqn(&self, fqn: &str) -> Result<Option<TypeNode>> {
        let fqn = fqn.to_string();
        self.run_blocking(move |cache| cache.lookup().find_by_fqn(&fqn))
            .await
    }

    pub async fn find_by_hash(&self, hash: &str) -> Result<Option<TypeNode>> {
        let hash = hash.to_string();
        self.run_blocking(move |cache| cache.lookup().find_by_hash(&hash))
            .await
    }

    pub async fn find_by_pattern(&self, pattern: &str, only_initialized: bool) -> Result<Vec<TypeNode>> {
        let pattern = pattern.to_string();
        self.run_blocking(move |cache| cache.lookup().find_by_pattern(&pattern, only_initialized))
            .await
    }

    pub async fn add_instrumentation_points(
        &self,
        agent: AgentConfig,
        appliers: Vec<SharedApplier>,
    ) -> Result<Vec<TypeNode>> {
        self.run_blocking(move |cache| {
            cache
                .instrumentation()
                .add_instrumentation_points(&agent, &appliers)
        })
        .await
    }

    pub async fn instrumentation_results(&self) -> Result<Vec<InstrumentationResult>> {
        self.run_blocking(|cache| cache.instrumentation().instrumentation_results())
            .await
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        self.run_blocking(|cache| cache.stats()).await
    }
}
