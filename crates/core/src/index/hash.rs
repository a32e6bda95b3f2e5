use crate::cache::NodeChangeListener;
use crate::model::TypeGraph;
use classcache_api::{NodeEvent, NodeEventDetails, TypeId};
use std::collections::HashMap;

/// Bytecode hash to FQN. One entry per hash a node carries.
#[derive(Debug, Default)]
pub struct HashIndexer {
    by_hash: HashMap<String, TypeId>,
}

impl HashIndexer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            by_hash: HashMap::with_capacity(capacity),
        }
    }

    pub fn get(&self, hash: &str) -> Option<&TypeId> {
        self.by_hash.get(hash)
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_hash.clear();
    }
}

impl NodeChangeListener for HashIndexer {
    fn on_node_event(&mut self, event: &NodeEvent, graph: &TypeGraph) {
        if !matches!(
            event.details,
            NodeEventDetails::Initialized | NodeEventDetails::HashAdded
        ) {
            return;
        }
        let Some(node) = graph.get(&event.fqn) else {
            return;
        };
        for hash in node.hashes() {
            self.by_hash
                .entry(hash.clone())
                .or_insert_with(|| node.id().clone());
        }
    }
}
