//! Change notifications produced by a merge.

use super::TypeId;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeEventType {
    New,
    Changed,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeEventDetails {
    Initialized,
    NotInitialized,
    HashAdded,
    ModifiersChanged,
    MethodChangedOrAdded,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeEvent {
    #[serde(with = "crate::models::util::serde_arc_str")]
    pub fqn: TypeId,
    pub event_type: NodeEventType,
    pub details: NodeEventDetails,
}

impl NodeEvent {
    pub fn new(fqn: TypeId, event_type: NodeEventType, details: NodeEventDetails) -> Self {
        Self {
            fqn,
            event_type,
            details,
        }
    }

    pub fn is_new(&self) -> bool {
        self.event_type == NodeEventType::New
    }
}

impl fmt::Display for NodeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{:?} {}", self.event_type, self.details, self.fqn)
    }
}

/// Kind of edge announced by a [`ReferenceEvent`], named after the canonical
/// direction (owner -> referenced).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceType {
    Superclass,
    SuperInterface,
    RealizeInterface,
    Annotation,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferenceEvent {
    #[serde(with = "crate::models::util::serde_arc_str")]
    pub from: TypeId,
    #[serde(with = "crate::models::util::serde_arc_str")]
    pub to: TypeId,
    pub reference_type: ReferenceType,
}

impl ReferenceEvent {
    pub fn new(from: TypeId, to: TypeId, reference_type: ReferenceType) -> Self {
        Self {
            from,
            to,
            reference_type,
        }
    }
}

impl fmt::Display for ReferenceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -{:?}-> {}", self.from, self.reference_type, self.to)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum CacheEvent {
    Node(NodeEvent),
    Reference(ReferenceEvent),
}

/// Ordered batch of distinct events; pushing an event already present is a no-op.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct EventBatch {
    events: IndexSet<CacheEvent>,
}

/// Two batches are equal when they hold the same events in the same order.
impl PartialEq for EventBatch {
    fn eq(&self, other: &Self) -> bool {
        self.events.iter().eq(other.events.iter())
    }
}

impl Eq for EventBatch {}

impl EventBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when an equal event was already recorded.
    pub fn push(&mut self, event: CacheEvent) -> bool {
        self.events.insert(event)
    }

    pub fn push_node(&mut self, event: NodeEvent) -> bool {
        self.push(CacheEvent::Node(event))
    }

    pub fn push_reference(&mut self, event: ReferenceEvent) -> bool {
        self.push(CacheEvent::Reference(event))
    }

    pub fn extend(&mut self, other: EventBatch) {
        for event in other.events {
            self.push(event);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CacheEvent> {
        self.events.iter()
    }

    pub fn node_events(&self) -> impl Iterator<Item = &NodeEvent> {
        self.events.iter().filter_map(|e| match e {
            CacheEvent::Node(n) => Some(n),
            CacheEvent::Reference(_) => None,
        })
    }

    pub fn reference_events(&self) -> impl Iterator<Item = &ReferenceEvent> {
        self.events.iter().filter_map(|e| match e {
            CacheEvent::Reference(r) => Some(r),
            CacheEvent::Node(_) => None,
        })
    }

    pub fn contains(&self, event: &CacheEvent) -> bool {
        self.events.contains(event)
    }
}

impl IntoIterator for EventBatch {
    type Item = CacheEvent;
    type IntoIter = indexmap::set::IntoIter<CacheEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

impl<'a> IntoIterator for &'a EventBatch {
    type Item = &'a CacheEvent;
    type IntoIter = indexmap::set::Iter<'a, CacheEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}
