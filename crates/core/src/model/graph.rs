//! FQN-keyed arena holding every stored type.
//!
//! All edges are stored twice, once on each end. The `link*` operations are
//! the only way to create an edge and always write both ends.

use super::node::{MethodKey, MethodRef, TypeBody, TypeKind, TypeNode, TypeSet};
use classcache_api::{ReferenceType, TypeId};
use serde::{Serialize, Serializer};
use std::collections::{HashMap, HashSet, VecDeque};

pub const REFERENCE_TYPES: [ReferenceType; 4] = [
    ReferenceType::Superclass,
    ReferenceType::SuperInterface,
    ReferenceType::RealizeInterface,
    ReferenceType::Annotation,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinkOutcome {
    Added,
    Existing,
    /// One end is missing or has a variant the relation does not accept.
    Incompatible,
}

/// Whether an edge of the given family may go from `from` to `to`.
pub fn accepts(reference: ReferenceType, from: TypeKind, to: TypeKind) -> bool {
    match reference {
        ReferenceType::Superclass => from == TypeKind::Class && to == TypeKind::Class,
        ReferenceType::SuperInterface => from == TypeKind::Interface && to == TypeKind::Interface,
        ReferenceType::RealizeInterface => {
            from == TypeKind::Class && matches!(to, TypeKind::Interface | TypeKind::Annotation)
        }
        ReferenceType::Annotation => to == TypeKind::Annotation,
    }
}

fn forward(node: &TypeNode, reference: ReferenceType) -> Option<&TypeSet> {
    match (reference, &node.body) {
        (ReferenceType::Superclass, TypeBody::Class(c)) => Some(&c.superclasses),
        (ReferenceType::SuperInterface, TypeBody::Interface(i)) => Some(&i.super_interfaces),
        (ReferenceType::RealizeInterface, TypeBody::Class(c)) => Some(&c.realized_interfaces),
        (ReferenceType::Annotation, _) => Some(node.annotations()),
        _ => None,
    }
}

fn forward_mut(node: &mut TypeNode, reference: ReferenceType) -> Option<&mut TypeSet> {
    match (reference, &mut node.body) {
        (ReferenceType::Superclass, TypeBody::Class(c)) => Some(&mut c.superclasses),
        (ReferenceType::SuperInterface, TypeBody::Interface(i)) => Some(&mut i.super_interfaces),
        (ReferenceType::RealizeInterface, TypeBody::Class(c)) => Some(&mut c.realized_interfaces),
        (ReferenceType::Annotation, TypeBody::Class(c)) => Some(&mut c.annotations),
        (ReferenceType::Annotation, TypeBody::Interface(i)) => Some(&mut i.annotations),
        (ReferenceType::Annotation, TypeBody::Annotation(a)) => Some(&mut a.annotations),
        _ => None,
    }
}

fn backward(node: &TypeNode, reference: ReferenceType) -> Option<&TypeSet> {
    match (reference, &node.body) {
        (ReferenceType::Superclass, TypeBody::Class(c)) => Some(&c.subclasses),
        (ReferenceType::SuperInterface, TypeBody::Interface(i)) => Some(&i.sub_interfaces),
        (ReferenceType::RealizeInterface, TypeBody::Interface(i)) => Some(&i.realizing_classes),
        (ReferenceType::RealizeInterface, TypeBody::Annotation(a)) => Some(&a.realizing_classes),
        (ReferenceType::Annotation, TypeBody::Annotation(a)) => Some(&a.annotated_types),
        _ => None,
    }
}

fn backward_mut(node: &mut TypeNode, reference: ReferenceType) -> Option<&mut TypeSet> {
    match (reference, &mut node.body) {
        (ReferenceType::Superclass, TypeBody::Class(c)) => Some(&mut c.subclasses),
        (ReferenceType::SuperInterface, TypeBody::Interface(i)) => Some(&mut i.sub_interfaces),
        (ReferenceType::RealizeInterface, TypeBody::Interface(i)) => Some(&mut i.realizing_classes),
        (ReferenceType::RealizeInterface, TypeBody::Annotation(a)) => Some(&mut a.realizing_classes),
        (ReferenceType::Annotation, TypeBody::Annotation(a)) => Some(&mut a.annotated_types),
        _ => None,
    }
}

#[derive(Debug, Default, Clone)]
pub struct TypeGraph {
    nodes: HashMap<TypeId, TypeNode>,
}

impl TypeGraph {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: HashMap::with_capacity(capacity),
        }
    }

    pub fn get(&self, fqn: &str) -> Option<&TypeNode> {
        self.nodes.get(fqn)
    }

    pub(crate) fn get_mut(&mut self, fqn: &str) -> Option<&mut TypeNode> {
        self.nodes.get_mut(fqn)
    }

    pub fn contains(&self, fqn: &str) -> bool {
        self.nodes.contains_key(fqn)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TypeNode> {
        self.nodes.values()
    }

    pub(crate) fn nodes_mut(&mut self) -> impl Iterator<Item = &mut TypeNode> {
        self.nodes.values_mut()
    }

    pub(crate) fn insert(&mut self, node: TypeNode) {
        self.nodes.insert(node.fqn.clone(), node);
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Ids of all nodes reachable from `fqn` over the forward side of `reference`.
    pub fn outgoing(&self, fqn: &str, reference: ReferenceType) -> Option<&TypeSet> {
        self.get(fqn).and_then(|n| forward(n, reference))
    }

    /// Ids of all nodes pointing at `fqn` over `reference`.
    pub fn incoming(&self, fqn: &str, reference: ReferenceType) -> Option<&TypeSet> {
        self.get(fqn).and_then(|n| backward(n, reference))
    }

    pub(crate) fn link(&mut self, from: &TypeId, to: &TypeId, reference: ReferenceType) -> LinkOutcome {
        let (Some(f), Some(t)) = (self.nodes.get(from), self.nodes.get(to)) else {
            return LinkOutcome::Incompatible;
        };
        if !accepts(reference, f.kind(), t.kind()) {
            return LinkOutcome::Incompatible;
        }

        let added = self
            .nodes
            .get_mut(from)
            .and_then(|n| forward_mut(n, reference))
            .is_some_and(|set| set.insert(to.clone()));
        if let Some(set) = self.nodes.get_mut(to).and_then(|n| backward_mut(n, reference)) {
            set.insert(from.clone());
        }

        if added {
            LinkOutcome::Added
        } else {
            LinkOutcome::Existing
        }
    }

    /// Records that `owner`'s method `key` declares `exception`.
    pub(crate) fn link_method_exception(
        &mut self,
        owner: &TypeId,
        key: &MethodKey,
        exception: &TypeId,
    ) -> LinkOutcome {
        if !self.get(exception).is_some_and(TypeNode::is_class) {
            return LinkOutcome::Incompatible;
        }
        let Some(method) = self
            .nodes
            .get_mut(owner)
            .and_then(|n| n.methods_mut())
            .and_then(|m| m.get_mut(key))
        else {
            return LinkOutcome::Incompatible;
        };

        let added = method.exceptions.insert(exception.clone());
        if let Some(TypeBody::Class(c)) = self.nodes.get_mut(exception).map(|n| &mut n.body) {
            c.throwing_methods
                .insert(MethodRef::new(owner.clone(), key.clone()));
        }

        if added {
            LinkOutcome::Added
        } else {
            LinkOutcome::Existing
        }
    }

    /// Method annotations are kept on the method only.
    pub(crate) fn link_method_annotation(
        &mut self,
        owner: &TypeId,
        key: &MethodKey,
        annotation: &TypeId,
    ) -> LinkOutcome {
        if !self.get(annotation).is_some_and(TypeNode::is_annotation) {
            return LinkOutcome::Incompatible;
        }
        match self
            .nodes
            .get_mut(owner)
            .and_then(|n| n.methods_mut())
            .and_then(|m| m.get_mut(key))
        {
            Some(method) => {
                if method.annotations.insert(annotation.clone()) {
                    LinkOutcome::Added
                } else {
                    LinkOutcome::Existing
                }
            }
            None => LinkOutcome::Incompatible,
        }
    }

    /// Turns a stored interface into an annotation, keeping its realizing
    /// classes and annotations. Interface-only edges are severed on both ends;
    /// the ids on the other side of those edges are returned.
    pub(crate) fn retag_as_annotation(&mut self, fqn: &TypeId) -> Vec<TypeId> {
        let Some(node) = self.nodes.get_mut(fqn).filter(|n| n.is_interface()) else {
            return Vec::new();
        };
        let TypeBody::Interface(interface) = std::mem::replace(&mut node.body, TypeBody::empty(TypeKind::Annotation))
        else {
            return Vec::new();
        };
        if let TypeBody::Annotation(a) = &mut node.body {
            a.annotations = interface.annotations;
            a.realizing_classes = interface.realizing_classes;
        }

        let mut severed = Vec::new();
        for sup in interface.super_interfaces {
            if let Some(TypeBody::Interface(i)) = self.nodes.get_mut(&sup).map(|n| &mut n.body) {
                i.sub_interfaces.shift_remove(fqn);
            }
            severed.push(sup);
        }
        for sub in interface.sub_interfaces {
            if let Some(TypeBody::Interface(i)) = self.nodes.get_mut(&sub).map(|n| &mut n.body) {
                i.super_interfaces.shift_remove(fqn);
            }
            severed.push(sub);
        }
        for (key, method) in interface.methods {
            let method_ref = MethodRef::new(fqn.clone(), key);
            for exception in method.exceptions {
                if let Some(TypeBody::Class(c)) = self.nodes.get_mut(&exception).map(|n| &mut n.body) {
                    c.throwing_methods.shift_remove(&method_ref);
                }
            }
        }
        severed
    }

    /// Whether `fqn` is a class whose superclass chain reaches
    /// `throwable_fqn`. The throwable root itself is not an exception type.
    pub fn is_exception(&self, fqn: &str, throwable_fqn: &str) -> bool {
        if !self.get(fqn).is_some_and(TypeNode::is_class) {
            return false;
        }
        self.superclass_closure(fqn).iter().any(|s| &**s == throwable_fqn)
    }

    /// All transitive superclasses of `fqn`, nearest first. Cycle safe.
    pub fn superclass_closure(&self, fqn: &str) -> Vec<TypeId> {
        self.closure(fqn, |n| n.as_class().map(|c| &c.superclasses))
    }

    /// All transitive subclasses of `fqn`, nearest first. Cycle safe.
    pub fn subclass_closure(&self, fqn: &str) -> Vec<TypeId> {
        self.closure(fqn, |n| n.as_class().map(|c| &c.subclasses))
    }

    /// All transitive sub-interfaces of `fqn`, nearest first. Cycle safe.
    pub fn sub_interface_closure(&self, fqn: &str) -> Vec<TypeId> {
        self.closure(fqn, |n| n.as_interface().map(|i| &i.sub_interfaces))
    }

    fn closure<F>(&self, start: &str, next: F) -> Vec<TypeId>
    where
        F: Fn(&TypeNode) -> Option<&TypeSet>,
    {
        let mut seen: HashSet<&str> = HashSet::new();
        seen.insert(start);
        let mut out = Vec::new();
        let mut queue: VecDeque<&str> = VecDeque::from([start]);

        while let Some(current) = queue.pop_front() {
            let Some(ids) = self.get(current).and_then(&next) else {
                continue;
            };
            for id in ids {
                if seen.insert(id) {
                    out.push(id.clone());
                    queue.push_back(id);
                }
            }
        }
        out
    }

    /// Checks that every edge is recorded on both ends and points at a
    /// stored node of an accepted variant. Returns every violation found.
    pub fn verify_consistency(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();

        for node in self.nodes.values() {
            for reference in REFERENCE_TYPES {
                if let Some(targets) = forward(node, reference) {
                    for target in targets {
                        match self.get(target) {
                            None => problems.push(format!("{} -{:?}-> missing {}", node.fqn, reference, target)),
                            Some(t) => {
                                if !accepts(reference, node.kind(), t.kind()) {
                                    problems.push(format!("{} -{:?}-> {} has kind {}", node.fqn, reference, target, t.kind()));
                                }
                                if !backward(t, reference).is_some_and(|b| b.contains(&node.fqn)) {
                                    problems.push(format!("{} -{:?}-> {} has no back edge", node.fqn, reference, target));
                                }
                            }
                        }
                    }
                }
                if let Some(sources) = backward(node, reference) {
                    for source in sources {
                        let ok = self
                            .get(source)
                            .and_then(|s| forward(s, reference))
                            .is_some_and(|f| f.contains(&node.fqn));
                        if !ok {
                            problems.push(format!("{} <-{:?}- {} has no forward edge", node.fqn, reference, source));
                        }
                    }
                }
            }

            if let Some(methods) = node.methods() {
                for (key, method) in methods {
                    let method_ref = MethodRef::new(node.fqn.clone(), key.clone());
                    for exception in &method.exceptions {
                        let ok = self
                            .get(exception)
                            .and_then(TypeNode::as_class)
                            .is_some_and(|c| c.throwing_methods.contains(&method_ref));
                        if !ok {
                            problems.push(format!("{}.{} throws {} without back edge", node.fqn, key, exception));
                        }
                    }
                    for annotation in &method.annotations {
                        if !self.get(annotation).is_some_and(TypeNode::is_annotation) {
                            problems.push(format!("{}.{} annotated by unknown {}", node.fqn, key, annotation));
                        }
                    }
                }
            }

            if let Some(class) = node.as_class() {
                for method_ref in &class.throwing_methods {
                    let ok = self
                        .get(&method_ref.owner)
                        .and_then(|o| o.method(&method_ref.key))
                        .is_some_and(|m| m.exceptions.contains(&node.fqn));
                    if !ok {
                        problems.push(format!(
                            "{} thrown by {}.{} which does not declare it",
                            node.fqn, method_ref.owner, method_ref.key
                        ));
                    }
                }
            }
        }

        if problems.is_empty() { Ok(()) } else { Err(problems) }
    }
}

impl Serialize for TypeGraph {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut nodes: Vec<&TypeNode> = self.nodes.values().collect();
        nodes.sort_by(|a, b| a.fqn.cmp(&b.fqn));
        serializer.collect_seq(nodes)
    }
}
