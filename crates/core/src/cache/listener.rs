use crate::model::TypeGraph;
use classcache_api::{CacheEvent, EventBatch, NodeEvent, ReferenceEvent};

/// Observer of graph mutations.
///
/// Callbacks run synchronously while the write lock is held, after the merge
/// that produced the events has been fully applied. A listener must not call
/// back into the cache.
pub trait NodeChangeListener: Send + Sync {
    fn on_node_event(&mut self, event: &NodeEvent, graph: &TypeGraph);

    fn on_reference_event(&mut self, _event: &ReferenceEvent, _graph: &TypeGraph) {}
}

/// Replays a batch, in order, to a single listener.
pub(crate) fn dispatch(listener: &mut dyn NodeChangeListener, batch: &EventBatch, graph: &TypeGraph) {
    for event in batch {
        match event {
            CacheEvent::Node(e) => listener.on_node_event(e, graph),
            CacheEvent::Reference(e) => listener.on_reference_event(e, graph),
        }
    }
}

/// Listener that keeps every event it sees. Handy for audits and tests.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: std::sync::Arc<std::sync::Mutex<EventBatch>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared view of the recorded events, usable after the listener was
    /// handed to the cache.
    pub fn events(&self) -> std::sync::Arc<std::sync::Mutex<EventBatch>> {
        self.events.clone()
    }

    fn record(&self, event: CacheEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl NodeChangeListener for RecordingListener {
    fn on_node_event(&mut self, event: &NodeEvent, _graph: &TypeGraph) {
        self.record(CacheEvent::Node(event.clone()));
    }

    fn on_reference_event(&mut self, event: &ReferenceEvent, _graph: &TypeGraph) {
        self.record(CacheEvent::Reference(event.clone()));
    }
}
