//! Graph change events.
//!
//! The generation pass reports every change as a [`GraphEvent`] to the
//! registered observers, in order, synchronously. Events carry enough data
//! for a renderer to create or move its visual object without calling back
//! into the graph.

use serde::Serialize;

use super::EntityId;

/// Payload of vertex and vertex-set events.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VertexEvent {
    /// Vertex or vertex-set id.
    pub id: EntityId,
    /// Current x position.
    pub x: f64,
    /// Current y position.
    pub y: f64,
}

/// Payload of edge, edge-set and edge-set-collection events.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeEvent {
    /// Edge id for single edges, link key for sets and collections.
    pub id: EntityId,
    /// Canonical link key of the endpoint pair.
    pub link_key: String,
    /// Source endpoint id.
    pub source: EntityId,
    /// Target endpoint id.
    pub target: EntityId,
    /// Number of caller edges represented.
    pub size: usize,
}

/// Everything the graph reports to its observers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GraphEvent {
    /// A generation pass with changes is starting.
    StartGenerate,
    /// The generation pass finished.
    EndGenerate,
    /// `set_data` replaced the graph.
    SetData,
    /// `insert_data` appended records.
    InsertData,
    /// The graph was cleared.
    Clear,

    AddVertex(VertexEvent),
    RemoveVertex(VertexEvent),
    UpdateVertex(VertexEvent),

    AddVertexSet(VertexEvent),
    RemoveVertexSet(VertexEvent),
    UpdateVertexSet(VertexEvent),

    AddEdge(EdgeEvent),
    RemoveEdge(EdgeEvent),
    UpdateEdge(EdgeEvent),

    AddEdgeSet(EdgeEvent),
    RemoveEdgeSet(EdgeEvent),
    UpdateEdgeSet(EdgeEvent),

    AddEdgeSetCollection(EdgeEvent),
    RemoveEdgeSetCollection(EdgeEvent),
    UpdateEdgeSetCollection(EdgeEvent),
}

impl GraphEvent {
    /// Event name as used by the JavaScript side (`"addVertex"`, ...).
    pub fn name(&self) -> &'static str {
        match self {
            GraphEvent::StartGenerate => "startGenerate",
            GraphEvent::EndGenerate => "endGenerate",
            GraphEvent::SetData => "setData",
            GraphEvent::InsertData => "insertData",
            GraphEvent::Clear => "clear",
            GraphEvent::AddVertex(_) => "addVertex",
            GraphEvent::RemoveVertex(_) => "removeVertex",
            GraphEvent::UpdateVertex(_) => "updateVertex",
            GraphEvent::AddVertexSet(_) => "addVertexSet",
            GraphEvent::RemoveVertexSet(_) => "removeVertexSet",
            GraphEvent::UpdateVertexSet(_) => "updateVertexSet",
            GraphEvent::AddEdge(_) => "addEdge",
            GraphEvent::RemoveEdge(_) => "removeEdge",
            GraphEvent::UpdateEdge(_) => "updateEdge",
            GraphEvent::AddEdgeSet(_) => "addEdgeSet",
            GraphEvent::RemoveEdgeSet(_) => "removeEdgeSet",
            GraphEvent::UpdateEdgeSet(_) => "updateEdgeSet",
            GraphEvent::AddEdgeSetCollection(_) => "addEdgeSetCollection",
            GraphEvent::RemoveEdgeSetCollection(_) => "removeEdgeSetCollection",
            GraphEvent::UpdateEdgeSetCollection(_) => "updateEdgeSetCollection",
        }
    }

    /// Id of the entity the event is about, if any.
    pub fn subject(&self) -> Option<&EntityId> {
        match self {
            GraphEvent::AddVertex(e)
            | GraphEvent::RemoveVertex(e)
            | GraphEvent::UpdateVertex(e)
            | GraphEvent::AddVertexSet(e)
            | GraphEvent::RemoveVertexSet(e)
            | GraphEvent::UpdateVertexSet(e) => Some(&e.id),
            GraphEvent::AddEdge(e)
            | GraphEvent::RemoveEdge(e)
            | GraphEvent::UpdateEdge(e)
            | GraphEvent::AddEdgeSet(e)
            | GraphEvent::RemoveEdgeSet(e)
            | GraphEvent::UpdateEdgeSet(e)
            | GraphEvent::AddEdgeSetCollection(e)
            | GraphEvent::RemoveEdgeSetCollection(e)
            | GraphEvent::UpdateEdgeSetCollection(e) => Some(&e.id),
            _ => None,
        }
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub(crate) u32);

type Observer = Box<dyn FnMut(&GraphEvent)>;

/// Ordered list of event observers.
#[derive(Default)]
pub struct Observers {
    entries: Vec<(ObserverId, Observer)>,
    next_id: u32,
}

impl Observers {
    /// Register an observer.
    pub fn subscribe<F: FnMut(&GraphEvent) + 'static>(&mut self, observer: F) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, Box::new(observer)));
        id
    }

    /// Remove an observer. Returns true if it was registered.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    /// Deliver one event to every observer, in registration order.
    pub fn emit(&mut self, event: &GraphEvent) {
        for (_, observer) in &mut self.entries {
            observer(event);
        }
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nobody is listening.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
