//! Merge engine: the only writer of the type graph.
//!
//! A candidate descriptor is reconciled with the stored node of the same FQN.
//! Its outgoing references are resolved one hop deep, creating placeholders
//! for unseen types. Every change is recorded in an [`EventBatch`]; the
//! indexers see each event as soon as it is recorded, external listeners see
//! the finished batch.

use crate::cache::{CacheState, NodeChangeListener, dispatch};
use crate::config::ClassCacheConfig;
use crate::error::{ClassCacheError, Result};
use crate::index::{FqnIndexer, HashIndexer};
use crate::model::{LinkOutcome, Method, MethodKey, TypeGraph, TypeKind, TypeNode, type_id};
use classcache_api::{
    EventBatch, MethodDescriptor, NodeEvent, NodeEventDetails, NodeEventType, ReferenceEvent,
    ReferenceType, TypeDescriptor, TypeHeader, TypeId,
};
use tracing::{debug, warn};

/// Merges one candidate into `state` and notifies the registered listeners.
/// Must run under the write lock.
pub(crate) fn merge(
    state: &mut CacheState,
    config: &ClassCacheConfig,
    candidate: TypeDescriptor,
) -> Result<EventBatch> {
    candidate.validate()?;

    let mut merger = Merger {
        graph: &mut state.graph,
        fqn_index: &mut state.fqn_index,
        hash_index: &mut state.hash_index,
        config,
        events: EventBatch::new(),
    };
    merger.merge_root(candidate)?;
    let events = merger.events;

    if !events.is_empty() {
        for listener in state.listeners.iter_mut() {
            dispatch(listener.as_mut(), &events, &state.graph);
        }
    }
    Ok(events)
}

fn kind_of(descriptor: &TypeDescriptor) -> Option<TypeKind> {
    match descriptor {
        TypeDescriptor::Class(_) => Some(TypeKind::Class),
        TypeDescriptor::Interface(_) => Some(TypeKind::Interface),
        TypeDescriptor::Annotation(_) => Some(TypeKind::Annotation),
        TypeDescriptor::Other(_) => None,
    }
}

/// Whether a descriptor carries anything beyond its header.
fn carries_references(descriptor: &TypeDescriptor) -> bool {
    match descriptor {
        TypeDescriptor::Class(c) => {
            !(c.annotations.is_empty()
                && c.superclasses.is_empty()
                && c.realized_interfaces.is_empty()
                && c.methods.is_empty()
                && c.subclasses.is_empty()
                && c.throwing_methods.is_empty())
        }
        TypeDescriptor::Interface(i) => {
            !(i.annotations.is_empty()
                && i.super_interfaces.is_empty()
                && i.methods.is_empty()
                && i.sub_interfaces.is_empty()
                && i.realizing_classes.is_empty())
        }
        TypeDescriptor::Annotation(a) => {
            !(a.annotations.is_empty()
                && a.annotated_types.is_empty()
                && a.realizing_classes.is_empty())
        }
        TypeDescriptor::Other(_) => false,
    }
}

/// Variants an edge of the given family may point at.
fn target_kinds(reference: ReferenceType) -> &'static [TypeKind] {
    match reference {
        ReferenceType::Superclass => &[TypeKind::Class],
        ReferenceType::SuperInterface => &[TypeKind::Interface],
        ReferenceType::RealizeInterface => &[TypeKind::Interface, TypeKind::Annotation],
        ReferenceType::Annotation => &[TypeKind::Annotation],
    }
}

fn relation_name(reference: ReferenceType) -> &'static str {
    match reference {
        ReferenceType::Superclass => "superclass",
        ReferenceType::SuperInterface => "super-interface",
        ReferenceType::RealizeInterface => "realized interface",
        ReferenceType::Annotation => "annotation",
    }
}

struct Merger<'s> {
    graph: &'s mut TypeGraph,
    fqn_index: &'s mut FqnIndexer,
    hash_index: &'s mut HashIndexer,
    config: &'s ClassCacheConfig,
    events: EventBatch,
}

impl Merger<'_> {
    fn merge_root(&mut self, candidate: TypeDescriptor) -> Result<()> {
        let given = kind_of(&candidate).ok_or_else(|| {
            ClassCacheError::InvalidMergeInput(format!("unsupported kind for {}", candidate.fqn()))
        })?;
        let header = candidate
            .header()
            .cloned()
            .ok_or_else(|| ClassCacheError::InvalidMergeInput(format!("no header for {}", candidate.fqn())))?;

        let (id, created) = match self.graph.get(&header.fqn) {
            None => (self.create_root(&header, given), true),
            Some(stored) => {
                let stored_kind = stored.kind();
                let retag = stored_kind == TypeKind::Interface
                    && given == TypeKind::Annotation
                    && !stored.is_initialized()
                    && header.is_initialized();
                if stored_kind != given && !retag {
                    return Err(ClassCacheError::VariantMismatch {
                        fqn: header.fqn.clone(),
                        stored: stored_kind.as_str(),
                        given: given.as_str(),
                    });
                }

                if stored.is_initialized() {
                    if !header.is_initialized() {
                        debug!(fqn = %header.fqn, "Placeholder merged onto initialized type, ignored");
                        return Ok(());
                    }
                    if header.hashes.iter().any(|h| stored.contains_hash(h)) {
                        debug!(fqn = %header.fqn, "Bytecode already known, nothing to merge");
                        return Ok(());
                    }
                }

                let id = stored.id().clone();
                if retag {
                    let severed = self.graph.retag_as_annotation(&id);
                    if !severed.is_empty() {
                        warn!(
                            fqn = %id,
                            severed = ?severed,
                            "Interface placeholder turned out to be an annotation; interface edges removed"
                        );
                    }
                }
                self.merge_header(&id, &header, retag);
                (id, false)
            }
        };

        self.merge_body(&id, candidate, created);
        Ok(())
    }

    fn create_root(&mut self, header: &TypeHeader, kind: TypeKind) -> TypeId {
        let id = type_id(&header.fqn);
        let mut node = TypeNode::new(id.clone(), kind);
        let details = if header.is_initialized() {
            node.hashes = header.hashes.clone();
            node.modifiers = header.modifiers;
            NodeEventDetails::Initialized
        } else {
            NodeEventDetails::NotInitialized
        };
        self.graph.insert(node);
        self.fire_node(id.clone(), NodeEventType::New, details);
        id
    }

    /// Hashes and modifiers; only an initialized candidate contributes.
    /// A re-tagged node is reported as a new annotation.
    fn merge_header(&mut self, id: &TypeId, header: &TypeHeader, retagged: bool) {
        if !header.is_initialized() {
            return;
        }
        let Some(node) = self.graph.get_mut(id) else {
            return;
        };

        let was_initialized = node.is_initialized();
        let mut hash_added = false;
        for hash in &header.hashes {
            hash_added |= node.hashes.insert(hash.clone());
        }
        let before = node.modifiers;
        node.modifiers = before.merge(header.modifiers);
        let modifiers_changed = before != node.modifiers;

        if !was_initialized {
            let event_type = if retagged { NodeEventType::New } else { NodeEventType::Changed };
            self.fire_node(id.clone(), event_type, NodeEventDetails::Initialized);
        } else if hash_added {
            self.fire_node(id.clone(), NodeEventType::Changed, NodeEventDetails::HashAdded);
        }
        if modifiers_changed {
            self.fire_node(id.clone(), NodeEventType::Changed, NodeEventDetails::ModifiersChanged);
        }
    }

    fn merge_body(&mut self, id: &TypeId, candidate: TypeDescriptor, created: bool) {
        match candidate {
            TypeDescriptor::Class(c) => {
                self.drop_reverse(id, "subclass", c.subclasses.iter().map(TypeDescriptor::fqn));
                self.drop_reverse(id, "throwing method", c.throwing_methods.iter().map(|m| m.name.as_str()));
                self.link_all(id, c.superclasses, ReferenceType::Superclass);
                self.link_all(id, c.realized_interfaces, ReferenceType::RealizeInterface);
                self.link_all(id, c.annotations, ReferenceType::Annotation);
                self.merge_methods(id, c.methods, created);
            }
            TypeDescriptor::Interface(i) => {
                self.drop_reverse(id, "sub-interface", i.sub_interfaces.iter().map(TypeDescriptor::fqn));
                self.drop_reverse(id, "realizing class", i.realizing_classes.iter().map(TypeDescriptor::fqn));
                self.link_all(id, i.super_interfaces, ReferenceType::SuperInterface);
                self.link_all(id, i.annotations, ReferenceType::Annotation);
                self.merge_methods(id, i.methods, created);
            }
            TypeDescriptor::Annotation(a) => {
                self.drop_reverse(id, "annotated type", a.annotated_types.iter().map(TypeDescriptor::fqn));
                self.drop_reverse(id, "realizing class", a.realizing_classes.iter().map(TypeDescriptor::fqn));
                self.link_all(id, a.annotations, ReferenceType::Annotation);
            }
            TypeDescriptor::Other(_) => {}
        }
    }

    fn link_all(&mut self, owner: &TypeId, references: Vec<TypeDescriptor>, reference: ReferenceType) {
        let relation = relation_name(reference);
        for descriptor in references {
            let Some(target) = self.resolve(owner, descriptor, target_kinds(reference), relation) else {
                continue;
            };
            match self.graph.link(owner, &target, reference) {
                LinkOutcome::Added => self.fire_reference(owner.clone(), target, reference),
                LinkOutcome::Existing => {}
                LinkOutcome::Incompatible => {
                    self.dropped(owner, relation, &target, "relation not allowed from this variant")
                }
            }
        }
    }

    fn merge_methods(&mut self, owner: &TypeId, methods: Vec<MethodDescriptor>, created: bool) {
        for descriptor in methods {
            let MethodDescriptor {
                name,
                parameters,
                return_type,
                modifiers,
                exceptions,
                annotations,
            } = descriptor;
            let key = MethodKey { name, parameters };

            let Some(stored) = self.graph.get_mut(owner).and_then(|n| n.methods_mut()) else {
                return;
            };
            let mut changed = match stored.get_mut(&key) {
                None => {
                    stored.insert(key.clone(), Method::new(key.clone(), return_type, modifiers));
                    true
                }
                Some(method) => {
                    let mut changed = false;
                    let merged = method.modifiers.merge(modifiers);
                    if merged != method.modifiers {
                        method.modifiers = merged;
                        changed = true;
                    }
                    match return_type {
                        Some(given) if method.return_type.is_none() => {
                            method.return_type = Some(given);
                            changed = true;
                        }
                        Some(given) if method.return_type.as_ref() != Some(&given) => {
                            debug!(owner = %owner, method = %key, given = %given, "Return type differs, keeping first");
                        }
                        _ => {}
                    }
                    changed
                }
            };

            for exception in exceptions {
                let Some(target) = self.resolve(owner, exception, &[TypeKind::Class], "method exception") else {
                    continue;
                };
                match self.graph.link_method_exception(owner, &key, &target) {
                    LinkOutcome::Added => changed = true,
                    LinkOutcome::Existing => {}
                    LinkOutcome::Incompatible => {
                        self.dropped(owner, "method exception", &target, "not a class")
                    }
                }
            }
            for annotation in annotations {
                let Some(target) = self.resolve(owner, annotation, &[TypeKind::Annotation], "method annotation") else {
                    continue;
                };
                match self.graph.link_method_annotation(owner, &key, &target) {
                    LinkOutcome::Added => changed = true,
                    LinkOutcome::Existing => {}
                    LinkOutcome::Incompatible => {
                        self.dropped(owner, "method annotation", &target, "not an annotation")
                    }
                }
            }

            if changed && !created {
                self.fire_node(owner.clone(), NodeEventType::Changed, NodeEventDetails::MethodChangedOrAdded);
            }
        }
    }

    /// Resolves a referenced descriptor to a stored node, creating a
    /// placeholder when the FQN is unknown. Only the FQN and variant of the
    /// reference are used.
    fn resolve(
        &mut self,
        owner: &TypeId,
        reference: TypeDescriptor,
        accepted: &[TypeKind],
        relation: &str,
    ) -> Option<TypeId> {
        let fqn = reference.fqn();
        let kind = match kind_of(&reference) {
            Some(kind) if accepted.contains(&kind) => kind,
            _ => {
                self.dropped(owner, relation, fqn, reference.kind_name());
                return None;
            }
        };
        if fqn.trim().is_empty() {
            self.dropped(owner, relation, fqn, "missing FQN");
            return None;
        }
        if reference.is_initialized() {
            warn!(
                owner = %owner,
                target = %fqn,
                "Referenced type is initialized; only one level is merged, treating it as a placeholder"
            );
        }
        if carries_references(&reference) {
            debug!(owner = %owner, target = %fqn, "Ignoring references nested below the first level");
        }

        match self.graph.get(fqn) {
            Some(stored) if accepted.contains(&stored.kind()) => Some(stored.id().clone()),
            Some(stored) => {
                let stored_kind = stored.kind().as_str();
                self.dropped(owner, relation, fqn, stored_kind);
                None
            }
            None => {
                let id = type_id(fqn);
                self.graph.insert(TypeNode::new(id.clone(), kind));
                self.fire_node(id.clone(), NodeEventType::New, NodeEventDetails::NotInitialized);
                Some(id)
            }
        }
    }

    fn drop_reverse<'a>(&self, owner: &TypeId, relation: &str, targets: impl Iterator<Item = &'a str>) {
        for target in targets {
            self.dropped(owner, relation, target, "reverse direction is derived, not accepted on input");
        }
    }

    fn dropped(&self, owner: &TypeId, relation: &str, target: &str, reason: &str) {
        if self.config.warn_on_dropped_references {
            warn!(owner = %owner, relation, target, reason, "Dropping reference");
        } else {
            debug!(owner = %owner, relation, target, reason, "Dropping reference");
        }
    }

    fn fire_node(&mut self, fqn: TypeId, event_type: NodeEventType, details: NodeEventDetails) {
        let event = NodeEvent::new(fqn, event_type, details);
        if self.events.push_node(event.clone()) {
            self.fqn_index.on_node_event(&event, self.graph);
            self.hash_index.on_node_event(&event, self.graph);
        }
    }

    fn fire_reference(&mut self, from: TypeId, to: TypeId, reference: ReferenceType) {
        self.events
            .push_reference(ReferenceEvent::new(from, to, reference));
    }
}
