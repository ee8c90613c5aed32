//! Graph entities stored in the arena.
//!
//! Vertices and vertex sets share one node type, edges, edge sets and
//! edge-set collections share one edge type. Kind-specific data lives in the
//! variant payload; lifecycle flags live in [`EntityState`].

use petgraph::stable_graph::{EdgeIndex, NodeIndex};
use serde_json::{Map, Value};

use super::EntityId;
use crate::geometry::Vector;

/// Lifecycle flags shared by every entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityState {
    /// Caller-controlled visibility.
    pub visible: bool,
    /// An add event has been fired and not yet matched by a remove.
    pub generated: bool,
    /// A property changed since the last generation pass.
    pub updated: bool,
    /// Removed from the graph; the slot is freed by the next generation pass.
    pub retired: bool,
}

impl EntityState {
    /// State of a freshly created entity.
    pub fn new() -> Self {
        Self {
            visible: true,
            generated: false,
            updated: false,
            retired: false,
        }
    }

    /// Set `visible`, returning true if it changed.
    pub fn set_visible(&mut self, visible: bool) -> bool {
        if self.visible == visible {
            return false;
        }
        self.visible = visible;
        self.updated = true;
        true
    }
}

impl Default for EntityState {
    fn default() -> Self {
        Self::new()
    }
}

/// Group payload of a vertex set.
#[derive(Debug, Clone, Default)]
pub struct GroupData {
    /// Members in insertion order (vertices and nested vertex sets).
    pub members: Vec<NodeIndex>,
    /// True when collapsed: the set is shown and its members are hidden.
    pub activated: bool,
}

/// Vertex or vertex set.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// A plain vertex.
    Leaf,
    /// A vertex set.
    Group(GroupData),
}

/// A vertex or vertex set.
#[derive(Debug, Clone)]
pub struct GraphNode {
    /// Entity id.
    pub id: EntityId,
    /// Position in graph space.
    pub position: Vector,
    /// Excluded from layout when true.
    pub fixed: bool,
    /// Hidden because an ancestor vertex set is collapsed.
    pub restricted: bool,
    /// Owning vertex set.
    pub parent: Option<NodeIndex>,
    /// Caller fields carried through from the ingest record.
    pub fields: Map<String, Value>,
    /// Lifecycle flags.
    pub state: EntityState,
    /// Leaf or group payload.
    pub kind: NodeKind,
}

impl GraphNode {
    /// A new vertex.
    pub fn vertex(id: EntityId, position: Vector, fields: Map<String, Value>) -> Self {
        Self {
            id,
            position,
            fixed: false,
            restricted: false,
            parent: None,
            fields,
            state: EntityState::new(),
            kind: NodeKind::Leaf,
        }
    }

    /// A new, empty vertex set.
    pub fn vertex_set(id: EntityId, position: Vector, fields: Map<String, Value>, activated: bool) -> Self {
        Self {
            kind: NodeKind::Group(GroupData {
                members: Vec::new(),
                activated,
            }),
            ..Self::vertex(id, position, fields)
        }
    }

    /// True for vertex sets.
    pub fn is_group(&self) -> bool {
        matches!(self.kind, NodeKind::Group(_))
    }

    /// Group payload, if this is a vertex set.
    pub fn group(&self) -> Option<&GroupData> {
        match &self.kind {
            NodeKind::Group(group) => Some(group),
            NodeKind::Leaf => None,
        }
    }

    pub(crate) fn group_mut(&mut self) -> Option<&mut GroupData> {
        match &mut self.kind {
            NodeKind::Group(group) => Some(group),
            NodeKind::Leaf => None,
        }
    }

    /// True for a collapsed vertex set.
    pub fn is_collapsed(&self) -> bool {
        self.group().is_some_and(|group| group.activated)
    }

    /// Visible flag combined with ancestor restriction.
    pub fn is_visible(&self) -> bool {
        self.state.visible && !self.restricted && !self.state.retired
    }

    /// Whether the entity should currently be rendered: visible, and for
    /// vertex sets, collapsed.
    pub fn is_shown(&self) -> bool {
        self.is_visible()
            && match &self.kind {
                NodeKind::Leaf => true,
                NodeKind::Group(group) => group.activated,
            }
    }
}

/// Single edge, edge set or edge-set collection.
#[derive(Debug, Clone)]
pub enum EdgeKind {
    /// One caller edge.
    Single {
        /// Caller or positional id.
        id: EntityId,
        /// Direction opposes the owning edge set's canonical direction.
        reverse: bool,
        /// Owning edge set.
        edge_set: EdgeIndex,
        /// Caller fields carried through from the ingest record.
        fields: Map<String, Value>,
    },
    /// All edges between one unordered vertex pair.
    Bundle {
        /// Member edges in insertion order.
        edges: Vec<EdgeIndex>,
        /// True when member edges are rendered individually.
        activated: bool,
    },
    /// Edge sets whose endpoints are hidden behind collapsed vertex sets.
    Aggregate {
        /// Member edge sets.
        edge_sets: Vec<EdgeIndex>,
    },
}

/// An edge-like entity.
#[derive(Debug, Clone)]
pub struct GraphEdge {
    /// Source id (canonical low id for edge sets and collections).
    pub source_id: EntityId,
    /// Target id (canonical high id for edge sets and collections).
    pub target_id: EntityId,
    /// Canonical link key of the endpoint pair.
    pub link_key: String,
    /// Lifecycle flags.
    pub state: EntityState,
    /// Kind-specific payload.
    pub kind: EdgeKind,
}

impl GraphEdge {
    /// `"target_source"` form of the link key.
    pub fn reverse_link_key(&self) -> String {
        super::id::directed_key(&self.target_id, &self.source_id)
    }

    /// Id of a single edge.
    pub fn edge_id(&self) -> Option<&EntityId> {
        match &self.kind {
            EdgeKind::Single { id, .. } => Some(id),
            _ => None,
        }
    }

    /// True for a single edge whose direction opposes its edge set.
    pub fn is_reverse(&self) -> bool {
        matches!(self.kind, EdgeKind::Single { reverse: true, .. })
    }

    /// True for an edge set rendering its edges individually.
    pub fn is_activated(&self) -> bool {
        matches!(self.kind, EdgeKind::Bundle { activated: true, .. })
    }

    /// Caller fields of a single edge.
    pub fn fields(&self) -> Option<&Map<String, Value>> {
        match &self.kind {
            EdgeKind::Single { fields, .. } => Some(fields),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_set_visible() {
        let mut state = EntityState::new();
        assert!(state.visible);
        assert!(!state.set_visible(true));
        assert!(!state.updated);
        assert!(state.set_visible(false));
        assert!(state.updated);
    }

    #[test]
    fn test_group_shown_only_when_collapsed() {
        let mut set = GraphNode::vertex_set(EntityId::from("g"), Vector::ZERO, Map::new(), false);
        assert!(set.is_group());
        assert!(set.is_visible());
        assert!(!set.is_shown());

        set.group_mut().unwrap().activated = true;
        assert!(set.is_collapsed());
        assert!(set.is_shown());

        set.restricted = true;
        assert!(!set.is_shown());
    }

    #[test]
    fn test_vertex_shown() {
        let mut vertex = GraphNode::vertex(EntityId::from(0), Vector::new(1.0, 2.0), Map::new());
        assert!(vertex.is_shown());
        vertex.state.visible = false;
        assert!(!vertex.is_shown());
    }
}
