//! Instrumentation-point engine.
//!
//! Candidate selection (narrowing) runs under read locks before the write
//! lock is taken; an empty candidate set never reaches the write lock.

mod applier;
mod narrower;

pub use applier::{
    InstrumentableClass, InstrumentationApplier, RemoveAllInstrumentationApplier,
    SensorAssignmentApplier,
};
pub use narrower::{ClassCacheSearchNarrower, SearchNarrower};

use crate::cache::{CacheState, ConcurrencyGuard};
use crate::error::Result;
use crate::lookup::{LookupService, find_instrumented};
use crate::model::TypeNode;
use classcache_api::{AgentConfig, InstrumentationResult, TypeId};
use indexmap::IndexSet;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

pub type SharedApplier = Arc<dyn InstrumentationApplier>;

fn instrumentation_result(node: &TypeNode) -> Option<InstrumentationResult> {
    if !node.is_class() || !node.is_initialized() || !node.has_instrumentation_points() {
        return None;
    }
    let mut result = InstrumentationResult::new(node.fqn());
    result.method_instrumentation_configs = node.instrumentation_points();
    Some(result)
}

pub struct InstrumentationService<'c> {
    guard: &'c ConcurrencyGuard<CacheState>,
    lookup: LookupService<'c>,
    narrower: &'c dyn SearchNarrower,
}

impl<'c> InstrumentationService<'c> {
    pub(crate) fn new(
        guard: &'c ConcurrencyGuard<CacheState>,
        lookup: LookupService<'c>,
        narrower: &'c dyn SearchNarrower,
    ) -> Self {
        Self {
            guard,
            lookup,
            narrower,
        }
    }

    /// Offers every initialized class selected for an applier to that
    /// applier. Returns the classes changed by at least one applier, each
    /// once, as they look afterwards.
    pub fn add_instrumentation_points(
        &self,
        agent: &AgentConfig,
        appliers: &[SharedApplier],
    ) -> Result<Vec<TypeNode>> {
        let mut plan: Vec<(&SharedApplier, Vec<TypeId>)> = Vec::with_capacity(appliers.len());
        let mut all: Option<Vec<TypeId>> = None;
        for applier in appliers {
            let ids: Vec<TypeId> = match applier.sensor_assignment() {
                Some(assignment) => self
                    .narrower
                    .narrow_by_assignment(&self.lookup, assignment)?
                    .into_iter()
                    .filter(|n| n.is_class() && n.is_initialized())
                    .map(|n| n.id().clone())
                    .collect(),
                None => match &all {
                    Some(ids) => ids.clone(),
                    None => all.insert(self.initialized_class_ids()?).clone(),
                },
            };
            if !ids.is_empty() {
                plan.push((applier, ids));
            }
        }
        if plan.is_empty() {
            return Ok(Vec::new());
        }

        self.guard.with_write_lock(|state| {
            let mut changed: IndexSet<TypeId> = IndexSet::new();
            for (applier, ids) in &plan {
                for id in ids {
                    let Some(node) = state.graph.get_mut(id).filter(|n| n.is_initialized()) else {
                        continue;
                    };
                    let Some(mut class) = InstrumentableClass::new(node) else {
                        continue;
                    };
                    if applier.add_instrumentation_points(agent, &mut class) {
                        changed.insert(id.clone());
                    }
                }
            }
            debug!(changed = changed.len(), "Instrumentation points added");
            Ok(changed.iter().filter_map(|id| state.graph.get(id)).cloned().collect())
        })
    }

    /// Removes instrumentation from `types`, or from every instrumented class
    /// when `types` is `None`. Without appliers all points are cleared.
    /// Returns the classes that changed.
    pub fn remove_instrumentation_points(
        &self,
        types: Option<&[TypeNode]>,
        appliers: Option<&[SharedApplier]>,
    ) -> Result<Vec<TypeNode>> {
        let candidates: Vec<TypeId> = match types {
            Some(types) => types
                .iter()
                .filter(|n| n.is_class() && n.is_initialized())
                .map(|n| n.id().clone())
                .collect(),
            None => self
                .lookup
                .find_instrumented_types()?
                .into_iter()
                .map(|n| n.id().clone())
                .collect(),
        };
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let remove_all: [SharedApplier; 1] = [Arc::new(RemoveAllInstrumentationApplier)];
        let appliers = appliers.unwrap_or(&remove_all);

        self.guard.with_write_lock(|state| {
            let mut changed: IndexSet<TypeId> = IndexSet::new();
            for id in candidates {
                let Some(mut class) = state.graph.get_mut(&id).and_then(InstrumentableClass::new) else {
                    continue;
                };
                let mut removed = false;
                for applier in appliers {
                    removed |= applier.remove_instrumentation_points(&mut class);
                }
                if removed {
                    changed.insert(id);
                }
            }
            debug!(changed = changed.len(), "Instrumentation points removed");
            Ok(changed.iter().filter_map(|id| state.graph.get(id)).cloned().collect())
        })
    }

    /// Applies `appliers` to a single class. Returns its instrumentation when
    /// an applier attached something and the class carries points afterwards.
    pub fn instrument(
        &self,
        class: &TypeNode,
        agent: &AgentConfig,
        appliers: &[SharedApplier],
    ) -> Result<Option<InstrumentationResult>> {
        if !class.is_class() || !class.is_initialized() || appliers.is_empty() {
            return Ok(None);
        }

        self.guard.with_write_lock(|state| {
            let Some(mut target) = state.graph.get_mut(class.fqn()).and_then(InstrumentableClass::new) else {
                return Ok(None);
            };
            let mut added = false;
            for applier in appliers {
                added |= applier.add_instrumentation_points(agent, &mut target);
            }
            if !added {
                return Ok(None);
            }
            Ok(instrumentation_result(target.node()))
        })
    }

    /// Every initialized class, taken under its own read lock.
    fn initialized_class_ids(&self) -> Result<Vec<TypeId>> {
        self.lookup.with_graph(|graph| {
            graph
                .nodes()
                .filter(|n| n.is_class() && n.is_initialized())
                .map(|n| n.id().clone())
                .collect()
        })
    }

    /// One result per initialized class currently carrying points.
    pub fn instrumentation_results(&self) -> Result<Vec<InstrumentationResult>> {
        self.guard.with_read_lock(|state| {
            Ok(find_instrumented(state)
                .into_iter()
                .filter_map(instrumentation_result)
                .collect())
        })
    }

    /// Same as [`instrumentation_results`](Self::instrumentation_results),
    /// keyed by the full hash set of each class.
    pub fn instrumentation_results_with_hashes(
        &self,
    ) -> Result<HashMap<BTreeSet<String>, InstrumentationResult>> {
        self.guard.with_read_lock(|state| {
            Ok(find_instrumented(state)
                .into_iter()
                .filter_map(|node| instrumentation_result(node).map(|r| (node.hashes().clone(), r)))
                .collect())
        })
    }
}
