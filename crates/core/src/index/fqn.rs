use crate::cache::NodeChangeListener;
use crate::model::TypeGraph;
use classcache_api::{NodeEvent, TypeId};
use std::collections::BTreeSet;
use std::ops::Bound;

/// Ordered set of all stored FQNs.
#[derive(Debug, Default)]
pub struct FqnIndexer {
    fqns: BTreeSet<TypeId>,
}

impl FqnIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, fqn: &str) -> Option<&TypeId> {
        self.fqns.get(fqn)
    }

    /// All FQNs starting with `prefix`, in lexicographic order.
    pub fn find_by_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a TypeId> + 'a {
        self.fqns
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(move |fqn| fqn.starts_with(prefix))
    }

    pub fn len(&self) -> usize {
        self.fqns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fqns.is_empty()
    }

    pub fn clear(&mut self) {
        self.fqns.clear();
    }
}

impl NodeChangeListener for FqnIndexer {
    fn on_node_event(&mut self, event: &NodeEvent, _graph: &TypeGraph) {
        if event.is_new() {
            self.fqns.insert(event.fqn.clone());
        }
    }
}
