//! Read-only query facade over the indexers.
//!
//! Every public operation takes the read lock and hands back owned
//! snapshots. The `pub(crate)` functions work on an already locked state and
//! are what the merge and instrumentation engines call internally.

mod pattern;

pub use pattern::FqnPattern;

use crate::cache::{CacheState, ConcurrencyGuard};
use crate::config::ClassCacheConfig;
use crate::error::Result;
use crate::model::{TypeGraph, TypeNode};

pub(crate) fn find_by_fqn<'s>(state: &'s CacheState, fqn: &str) -> Option<&'s TypeNode> {
    state.fqn_index.get(fqn).and_then(|id| state.graph.get(id))
}

pub(crate) fn find_by_hash<'s>(state: &'s CacheState, hash: &str) -> Option<&'s TypeNode> {
    state.hash_index.get(hash).and_then(|id| state.graph.get(id))
}

pub(crate) fn find_by_pattern<'s>(
    state: &'s CacheState,
    pattern: &FqnPattern,
    only_initialized: bool,
) -> Vec<&'s TypeNode> {
    let keep = |node: &&TypeNode| !only_initialized || node.is_initialized();
    if pattern.is_exact() {
        return find_by_fqn(state, pattern.prefix()).into_iter().filter(keep).collect();
    }
    state
        .fqn_index
        .find_by_prefix(pattern.prefix())
        .filter(|fqn| pattern.matches(fqn))
        .filter_map(|fqn| state.graph.get(fqn))
        .filter(keep)
        .collect()
}

/// Initialized classes with at least one instrumented method.
pub(crate) fn find_instrumented(state: &CacheState) -> Vec<&TypeNode> {
    let mut found: Vec<&TypeNode> = state
        .graph
        .nodes()
        .filter(|n| n.is_initialized() && n.has_instrumentation_points())
        .collect();
    found.sort_by(|a, b| a.fqn().cmp(b.fqn()));
    found
}

fn snapshot(nodes: Vec<&TypeNode>) -> Vec<TypeNode> {
    nodes.into_iter().cloned().collect()
}

/// Lookup operations, each under its own read lock.
#[derive(Clone, Copy)]
pub struct LookupService<'c> {
    guard: &'c ConcurrencyGuard<CacheState>,
    config: &'c ClassCacheConfig,
}

impl<'c> LookupService<'c> {
    pub(crate) fn new(guard: &'c ConcurrencyGuard<CacheState>, config: &'c ClassCacheConfig) -> Self {
        Self { guard, config }
    }

    pub fn find_by_fqn(&self, fqn: &str) -> Result<Option<TypeNode>> {
        self.guard
            .with_read_lock(|state| Ok(find_by_fqn(state, fqn).cloned()))
    }

    pub fn find_by_hash(&self, hash: &str) -> Result<Option<TypeNode>> {
        self.guard
            .with_read_lock(|state| Ok(find_by_hash(state, hash).cloned()))
    }

    /// Every stored node, ordered by FQN.
    pub fn find_all(&self) -> Result<Vec<TypeNode>> {
        self.guard.with_read_lock(|state| {
            let mut all: Vec<TypeNode> = state.graph.nodes().cloned().collect();
            all.sort_by(|a, b| a.fqn().cmp(b.fqn()));
            Ok(all)
        })
    }

    /// Nodes whose FQN matches `pattern` (`*` as wildcard).
    pub fn find_by_pattern(&self, pattern: &str, only_initialized: bool) -> Result<Vec<TypeNode>> {
        self.find_filtered(pattern, only_initialized, |_, _| true)
    }

    pub fn find_class_types_by_pattern(&self, pattern: &str, only_initialized: bool) -> Result<Vec<TypeNode>> {
        self.find_filtered(pattern, only_initialized, |_, node| node.is_class())
    }

    pub fn find_interface_types_by_pattern(
        &self,
        pattern: &str,
        only_initialized: bool,
    ) -> Result<Vec<TypeNode>> {
        self.find_filtered(pattern, only_initialized, |_, node| node.is_interface())
    }

    pub fn find_annotation_types_by_pattern(
        &self,
        pattern: &str,
        only_initialized: bool,
    ) -> Result<Vec<TypeNode>> {
        self.find_filtered(pattern, only_initialized, |_, node| node.is_annotation())
    }

    /// Classes matching `pattern` that extend the configured throwable type.
    pub fn find_exception_types_by_pattern(
        &self,
        pattern: &str,
        only_initialized: bool,
    ) -> Result<Vec<TypeNode>> {
        let throwable = self.config.throwable_fqn.as_str();
        self.find_filtered(pattern, only_initialized, |graph, node| {
            graph.is_exception(node.fqn(), throwable)
        })
    }

    pub fn find_instrumented_types(&self) -> Result<Vec<TypeNode>> {
        self.guard
            .with_read_lock(|state| Ok(snapshot(find_instrumented(state))))
    }

    /// Runs `op` against the graph under a single read lock.
    pub fn with_graph<R>(&self, op: impl FnOnce(&TypeGraph) -> R) -> Result<R> {
        self.guard.with_read_lock(|state| Ok(op(&state.graph)))
    }

    fn find_filtered<F>(&self, pattern: &str, only_initialized: bool, keep: F) -> Result<Vec<TypeNode>>
    where
        F: Fn(&TypeGraph, &TypeNode) -> bool,
    {
        let pattern = FqnPattern::parse(pattern)?;
        self.guard.with_read_lock(|state| {
            Ok(find_by_pattern(state, &pattern, only_initialized)
                .into_iter()
                .filter(|node| keep(&state.graph, *node))
                .cloned()
                .collect())
        })
    }
}
