//! The class cache: guarded state plus the services operating on it.

mod guard;
mod listener;

pub use guard::ConcurrencyGuard;
pub(crate) use listener::dispatch;
pub use listener::{NodeChangeListener, RecordingListener};

use crate::config::ClassCacheConfig;
use crate::error::Result;
use crate::index::{FqnIndexer, HashIndexer};
use crate::instrumentation::{ClassCacheSearchNarrower, InstrumentationService, SearchNarrower};
use crate::lookup::LookupService;
use crate::model::TypeGraph;
use crate::modification;
use classcache_api::{EventBatch, TypeDescriptor};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

/// Everything behind the cache lock.
pub(crate) struct CacheState {
    pub(crate) graph: TypeGraph,
    pub(crate) fqn_index: FqnIndexer,
    pub(crate) hash_index: HashIndexer,
    pub(crate) listeners: Vec<Box<dyn NodeChangeListener>>,
}

impl CacheState {
    pub(crate) fn new(config: &ClassCacheConfig) -> Self {
        Self {
            graph: TypeGraph::with_capacity(config.initial_capacity),
            fqn_index: FqnIndexer::new(),
            hash_index: HashIndexer::with_capacity(config.initial_capacity),
            listeners: Vec::new(),
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub node_count: usize,
    pub initialized_count: usize,
    pub hash_count: usize,
    pub instrumented_count: usize,
}

/// In-memory graph of observed types.
///
/// All access runs through one reader/writer lock: merges and instrumentation
/// changes are exclusive, lookups run in parallel.
pub struct ClassCache {
    guard: ConcurrencyGuard<CacheState>,
    config: ClassCacheConfig,
    narrower: Box<dyn SearchNarrower>,
}

impl Default for ClassCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassCache {
    pub fn new() -> Self {
        Self::with_config(ClassCacheConfig::default())
    }

    pub fn with_config(config: ClassCacheConfig) -> Self {
        Self {
            guard: ConcurrencyGuard::new(CacheState::new(&config)),
            config,
            narrower: Box::new(ClassCacheSearchNarrower),
        }
    }

    /// Replaces the narrower used by the instrumentation engine.
    pub fn with_search_narrower(mut self, narrower: impl SearchNarrower + 'static) -> Self {
        self.narrower = Box::new(narrower);
        self
    }

    pub fn config(&self) -> &ClassCacheConfig {
        &self.config
    }

    pub fn register_node_change_listener(&self, listener: Box<dyn NodeChangeListener>) -> Result<()> {
        self.guard.with_write_lock(|state| {
            state.listeners.push(listener);
            Ok(())
        })
    }

    pub fn lookup(&self) -> LookupService<'_> {
        LookupService::new(&self.guard, &self.config)
    }

    pub fn instrumentation(&self) -> InstrumentationService<'_> {
        InstrumentationService::new(&self.guard, self.lookup(), self.narrower.as_ref())
    }

    /// Merges one type description into the graph.
    pub fn merge(&self, candidate: TypeDescriptor) -> Result<EventBatch> {
        candidate.validate()?;
        self.guard
            .with_write_lock(|state| modification::merge(state, &self.config, candidate))
    }

    /// Merges a sequence of descriptions, each under its own write lock.
    /// All of them are validated first; merging stops at the first error.
    pub fn merge_all(&self, candidates: impl IntoIterator<Item = TypeDescriptor>) -> Result<EventBatch> {
        let candidates: Vec<TypeDescriptor> = candidates.into_iter().collect();
        for candidate in &candidates {
            candidate.validate()?;
        }

        let mut events = EventBatch::new();
        for candidate in candidates {
            events.extend(self.merge(candidate)?);
        }
        Ok(events)
    }

    /// Drops every stored type. Registered listeners stay.
    pub fn reset(&self) -> Result<()> {
        self.guard.with_write_lock(|state| {
            let dropped = state.graph.len();
            state.graph.clear();
            state.fqn_index.clear();
            state.hash_index.clear();
            info!(dropped, "Class cache reset");
            Ok(())
        })
    }

    pub fn stats(&self) -> Result<CacheStats> {
        self.guard.with_read_lock(|state| {
            let mut stats = CacheStats {
                node_count: state.graph.len(),
                hash_count: state.hash_index.len(),
                ..Default::default()
            };
            for node in state.graph.nodes() {
                if node.is_initialized() {
                    stats.initialized_count += 1;
                }
                if node.has_instrumentation_points() {
                    stats.instrumented_count += 1;
                }
            }
            Ok(stats)
        })
    }

    /// Every broken edge found in the graph; empty when consistent.
    pub fn consistency_violations(&self) -> Result<Vec<String>> {
        self.guard
            .with_read_lock(|state| Ok(state.graph.verify_consistency().err().unwrap_or_default()))
    }

    /// Dumps the graph as pretty JSON for inspection. Not a persistence format.
    pub fn save_to_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.guard.with_read_lock(|state| {
            let writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(writer, &state.graph)?;
            Ok(())
        })?;
        info!(path = %path.display(), "Class cache written");
        Ok(())
    }

    pub fn read_acquisitions(&self) -> usize {
        self.guard.read_acquisitions()
    }

    pub fn write_acquisitions(&self) -> usize {
        self.guard.write_acquisitions()
    }
}
