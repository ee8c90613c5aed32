//! ObservableGraph - the graph container and its generation pass.
//!
//! Every entity lives in one petgraph `StableGraph` arena:
//!
//! - vertices and vertex sets are nodes,
//! - single edges run between their resolved endpoints,
//! - an edge set (bundle) runs between the canonical low and high endpoint,
//! - an edge-set collection runs between the two visible representatives of
//!   the edge sets it aggregates.
//!
//! Id-keyed `IndexMap`s give insertion-ordered lookup. Mutations only touch
//! entity state; observers hear about them when [`ObservableGraph::generate`]
//! diffs each entity's `generated` flag against whether it should currently
//! be shown, and turns the difference into ordered add/update/remove events.
//! Removed entities are retired first and their arena slots freed at the end
//! of the next pass, so indices stay valid while events are built.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use indexmap::IndexMap;
use petgraph::Direction;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableGraph};
use petgraph::visit::EdgeRef;
use serde::Serialize;
use serde_json::Value;

use super::entity::{EdgeKind, EntityState, GraphEdge, GraphNode};
use super::event::{EdgeEvent, GraphEvent, ObserverId, Observers, VertexEvent};
use super::id::{EntityId, PairKey, canonical_pair, link_key, pair_key};
use super::record::{self, DEFAULT_ID_FIELD, GraphData, Record};
use crate::config::GraphConfig;
use crate::error::{GraphError, IngestReport, Result};
use crate::geometry::Vector;
use crate::layout::{DataProcessor, LayoutLink, LayoutNode, ProcessorRegistry};
use crate::spatial::{NodePoint, SpatialIndex};

/// Axis-aligned bounds of a set of nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeClass {
    Vertex,
    VertexSet,
}

impl NodeClass {
    fn add(self) -> fn(VertexEvent) -> GraphEvent {
        match self {
            NodeClass::Vertex => GraphEvent::AddVertex,
            NodeClass::VertexSet => GraphEvent::AddVertexSet,
        }
    }

    fn remove(self) -> fn(VertexEvent) -> GraphEvent {
        match self {
            NodeClass::Vertex => GraphEvent::RemoveVertex,
            NodeClass::VertexSet => GraphEvent::RemoveVertexSet,
        }
    }

    fn update(self) -> fn(VertexEvent) -> GraphEvent {
        match self {
            NodeClass::Vertex => GraphEvent::UpdateVertex,
            NodeClass::VertexSet => GraphEvent::UpdateVertexSet,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeClass {
    Edge,
    EdgeSet,
    Collection,
}

impl EdgeClass {
    fn of(kind: &EdgeKind) -> Self {
        match kind {
            EdgeKind::Single { .. } => EdgeClass::Edge,
            EdgeKind::Bundle { .. } => EdgeClass::EdgeSet,
            EdgeKind::Aggregate { .. } => EdgeClass::Collection,
        }
    }

    fn add(self) -> fn(EdgeEvent) -> GraphEvent {
        match self {
            EdgeClass::Edge => GraphEvent::AddEdge,
            EdgeClass::EdgeSet => GraphEvent::AddEdgeSet,
            EdgeClass::Collection => GraphEvent::AddEdgeSetCollection,
        }
    }

    fn remove(self) -> fn(EdgeEvent) -> GraphEvent {
        match self {
            EdgeClass::Edge => GraphEvent::RemoveEdge,
            EdgeClass::EdgeSet => GraphEvent::RemoveEdgeSet,
            EdgeClass::Collection => GraphEvent::RemoveEdgeSetCollection,
        }
    }

    fn update(self) -> fn(EdgeEvent) -> GraphEvent {
        match self {
            EdgeClass::Edge => GraphEvent::UpdateEdge,
            EdgeClass::EdgeSet => GraphEvent::UpdateEdgeSet,
            EdgeClass::Collection => GraphEvent::UpdateEdgeSetCollection,
        }
    }
}

fn reject(report: &mut IngestReport, what: &str, err: GraphError) {
    log::warn!("skipping {what}: {err}");
    report.rejected.push(err);
}

/// The observable multigraph with hierarchical grouping.
pub struct ObservableGraph {
    config: GraphConfig,

    /// All entities.
    arena: StableGraph<GraphNode, GraphEdge>,

    vertices: IndexMap<EntityId, NodeIndex>,
    vertex_sets: IndexMap<EntityId, NodeIndex>,
    edges: IndexMap<EntityId, EdgeIndex>,
    /// Edge sets by canonical endpoint pair.
    edge_sets: IndexMap<PairKey, EdgeIndex>,
    /// Edge-set collections by canonical representative pair.
    collections: IndexMap<PairKey, EdgeIndex>,

    /// Removed entities whose slots are freed by the next generation pass.
    retired_nodes: Vec<NodeIndex>,
    retired_edges: Vec<EdgeIndex>,

    /// Grouping or edges changed since collections were last rebuilt.
    aggregates_dirty: bool,

    next_vertex: u64,
    next_edge: u64,
    next_vertex_set: u64,

    observers: Observers,
    processors: ProcessorRegistry,

    /// Hit-testing index over shown nodes.
    spatial: RefCell<SpatialIndex>,
    spatial_dirty: Cell<bool>,
}

impl ObservableGraph {
    /// Create an empty graph.
    pub fn new(config: GraphConfig) -> Self {
        Self {
            config,
            arena: StableGraph::new(),
            vertices: IndexMap::new(),
            vertex_sets: IndexMap::new(),
            edges: IndexMap::new(),
            edge_sets: IndexMap::new(),
            collections: IndexMap::new(),
            retired_nodes: Vec::new(),
            retired_edges: Vec::new(),
            aggregates_dirty: false,
            next_vertex: 0,
            next_edge: 0,
            next_vertex_set: 0,
            observers: Observers::default(),
            processors: ProcessorRegistry::default(),
            spatial: RefCell::new(SpatialIndex::new()),
            spatial_dirty: Cell::new(false),
        }
    }

    // =========================================================================
    // Configuration & observers
    // =========================================================================

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Select the processor run by `set_data` / `insert_data`.
    pub fn set_data_processor(&mut self, name: Option<String>) {
        self.config.data_processor = name;
    }

    /// Register a custom data processor.
    pub fn register_processor(&mut self, name: impl Into<String>, processor: Box<dyn DataProcessor>) {
        self.processors.register(name, processor);
    }

    /// Register an observer for graph events.
    pub fn subscribe<F: FnMut(&GraphEvent) + 'static>(&mut self, observer: F) -> ObserverId {
        self.observers.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.observers.unsubscribe(id)
    }

    fn emit(&mut self, event: GraphEvent) {
        log::trace!("{}", event.name());
        self.observers.emit(&event);
    }

    // =========================================================================
    // Batch ingest
    // =========================================================================

    /// Replace the whole graph with `data`.
    pub fn set_data(&mut self, data: GraphData) -> IngestReport {
        self.clear();
        let report = self.ingest(data);
        self.emit(GraphEvent::SetData);
        self.generate();
        report
    }

    /// Append `data` to the graph. Existing vertices keep their positions
    /// while the data processor lays out the new ones.
    pub fn insert_data(&mut self, data: GraphData) -> IngestReport {
        let report = self.ingest(data);
        self.emit(GraphEvent::InsertData);
        self.generate();
        report
    }

    /// Drop every entity. Observers receive a single `Clear` event.
    pub fn clear(&mut self) {
        self.arena.clear();
        self.vertices.clear();
        self.vertex_sets.clear();
        self.edges.clear();
        self.edge_sets.clear();
        self.collections.clear();
        self.retired_nodes.clear();
        self.retired_edges.clear();
        self.aggregates_dirty = false;
        self.next_vertex = 0;
        self.next_edge = 0;
        self.next_vertex_set = 0;
        self.spatial.borrow_mut().clear();
        self.spatial_dirty.set(false);
        self.emit(GraphEvent::Clear);
    }

    fn ingest(&mut self, data: GraphData) -> IngestReport {
        let mut report = IngestReport::default();
        let mut batch: HashMap<NodeIndex, bool> = HashMap::new();

        for record in data.nodes {
            match self.insert_vertex(record) {
                Ok((index, placed)) => {
                    batch.insert(index, placed);
                    report.vertices += 1;
                }
                Err(err) => reject(&mut report, "node", err),
            }
        }

        // Create every set before wiring members so sets may reference sets
        // that appear later in the batch.
        let mut sets = Vec::new();
        for record in &data.node_set {
            match self.insert_vertex_set(record.clone()) {
                Ok(index) => {
                    sets.push((index, record));
                    report.vertex_sets += 1;
                }
                Err(err) => reject(&mut report, "node set", err),
            }
        }
        for (index, record) in &sets {
            for member in record::read_members(record) {
                if let Err(err) = self.attach_member(*index, &member) {
                    reject(&mut report, "node set member", err);
                }
            }
        }

        for record in data.links {
            match self.insert_edge(record) {
                Ok(_) => report.edges += 1,
                Err(err) => reject(&mut report, "link", err),
            }
        }

        self.run_processor(&batch);

        for (index, record) in &sets {
            if record::read_position(record).is_none() {
                if let Some(center) = self.centroid(*index) {
                    self.arena[*index].position = center;
                }
            }
            if record::read_bool(record, "activated").unwrap_or(false) {
                self.apply_activation(*index, true);
            }
        }

        self.sync_aggregates();
        log::debug!(
            "ingested {} vertices, {} edges, {} vertex sets ({} rejected)",
            report.vertices,
            report.edges,
            report.vertex_sets,
            report.rejected.len()
        );
        report
    }

    /// Lay out the vertices of `batch` with the configured processor. Every
    /// other vertex is pinned.
    fn run_processor(&mut self, batch: &HashMap<NodeIndex, bool>) {
        let Some(name) = self.config.data_processor.clone() else {
            return;
        };

        let order: Vec<NodeIndex> = self.vertices.values().copied().collect();
        let slots: HashMap<NodeIndex, usize> =
            order.iter().enumerate().map(|(slot, &index)| (index, slot)).collect();

        let mut nodes: Vec<LayoutNode> = order
            .iter()
            .map(|index| {
                let vertex = &self.arena[*index];
                let position = vertex.position;
                match batch.get(index) {
                    Some(&placed) => LayoutNode {
                        position,
                        fixed: vertex.fixed,
                        placed,
                    },
                    None => LayoutNode::pinned(position.x, position.y),
                }
            })
            .collect();

        let links: Vec<LayoutLink> = self
            .edges
            .values()
            .filter_map(|&edge| self.arena.edge_endpoints(edge))
            .filter_map(|(source, target)| {
                Some(LayoutLink::new(*slots.get(&source)?, *slots.get(&target)?))
            })
            .collect();

        if let Err(err) = self.processors.run(&name, &mut nodes, &links, &self.config) {
            log::warn!("{err}; positions left unchanged");
            return;
        }

        for (index, node) in order.into_iter().zip(nodes) {
            let vertex = &mut self.arena[index];
            if !node.fixed && vertex.position != node.position {
                vertex.position = node.position;
                vertex.state.updated = true;
            }
        }
    }

    // =========================================================================
    // Single-entity insertion
    // =========================================================================

    /// Add one vertex. Returns its id.
    pub fn add_vertex(&mut self, record: Record, auto_generate: bool) -> Result<EntityId> {
        let (index, _) = self.insert_vertex(record)?;
        let id = self.arena[index].id.clone();
        self.finish_mutation(auto_generate);
        Ok(id)
    }

    /// Add one edge, reusing the edge set of its endpoint pair if there is
    /// one. Returns the edge id.
    pub fn add_edge(&mut self, record: Record, auto_generate: bool) -> Result<EntityId> {
        let id = self.insert_edge(record)?;
        self.finish_mutation(auto_generate);
        Ok(id)
    }

    /// Add one vertex set. Unknown or already grouped members are logged
    /// and skipped. Returns the set id.
    pub fn add_vertex_set(&mut self, record: Record, auto_generate: bool) -> Result<EntityId> {
        let members = record::read_members(&record);
        let explicit_position = record::read_position(&record).is_some();
        let activated = record::read_bool(&record, "activated").unwrap_or(false);

        let index = self.insert_vertex_set(record)?;
        for member in members {
            if let Err(err) = self.attach_member(index, &member) {
                log::warn!("skipping node set member: {err}");
            }
        }
        if !explicit_position {
            if let Some(center) = self.centroid(index) {
                self.arena[index].position = center;
            }
        }
        if activated {
            self.apply_activation(index, true);
        }

        let id = self.arena[index].id.clone();
        self.finish_mutation(auto_generate);
        Ok(id)
    }

    fn insert_vertex(&mut self, record: Record) -> Result<(NodeIndex, bool)> {
        let id = match &self.config.identity_key {
            Some(key) => record::read_id(&record, key)
                .ok_or_else(|| GraphError::MissingIdentity(key.clone()))?,
            None => {
                let id = EntityId::Index(self.next_vertex);
                self.next_vertex += 1;
                id
            }
        };
        self.ensure_unused(&id)?;

        let position = record::read_position(&record);
        let fixed = record::read_bool(&record, "fixed").unwrap_or(false);
        let mut vertex = GraphNode::vertex(id.clone(), position.unwrap_or(Vector::ZERO), record);
        vertex.fixed = fixed;

        let index = self.arena.add_node(vertex);
        self.vertices.insert(id, index);
        self.aggregates_dirty = true;
        Ok((index, position.is_some()))
    }

    fn insert_vertex_set(&mut self, record: Record) -> Result<NodeIndex> {
        let key = self.id_field();
        let id = match record::read_id(&record, &key) {
            Some(id) => id,
            None if self.config.identity_key.is_none() => self.next_vertex_set_id(),
            None => return Err(GraphError::MissingIdentity(key)),
        };
        self.ensure_unused(&id)?;

        let position = record::read_position(&record).unwrap_or(Vector::ZERO);
        let index = self
            .arena
            .add_node(GraphNode::vertex_set(id.clone(), position, record, false));
        self.vertex_sets.insert(id, index);
        self.aggregates_dirty = true;
        Ok(index)
    }

    fn insert_edge(&mut self, record: Record) -> Result<EntityId> {
        let source_id =
            record::read_id(&record, "source").ok_or(GraphError::MissingEndpoint("source"))?;
        let target_id =
            record::read_id(&record, "target").ok_or(GraphError::MissingEndpoint("target"))?;

        let unknown = |missing: &EntityId| GraphError::UnknownEndpoint {
            source_id: source_id.clone(),
            target_id: target_id.clone(),
            missing: missing.clone(),
        };
        let source = self.resolve(&source_id).ok_or_else(|| unknown(&source_id))?;
        let target = self.resolve(&target_id).ok_or_else(|| unknown(&target_id))?;

        let key = self.id_field();
        let id = match record::read_id(&record, &key) {
            Some(id) if self.edges.contains_key(&id) => return Err(GraphError::DuplicateId(id)),
            Some(id) => id,
            None => self.next_edge_id(),
        };

        let edge_set = self.edge_set_for(source, target, &source_id, &target_id);
        let reverse = self.arena[edge_set].source_id != source_id;
        let link_key = self.arena[edge_set].link_key.clone();

        let edge = GraphEdge {
            source_id,
            target_id,
            link_key,
            state: EntityState::new(),
            kind: EdgeKind::Single {
                id: id.clone(),
                reverse,
                edge_set,
                fields: record,
            },
        };
        let index = self.arena.add_edge(source, target, edge);

        let bundle = &mut self.arena[edge_set];
        if let EdgeKind::Bundle { edges, .. } = &mut bundle.kind {
            edges.push(index);
        }
        bundle.state.updated = true;

        self.edges.insert(id.clone(), index);
        self.aggregates_dirty = true;
        Ok(id)
    }

    /// The edge set of an endpoint pair, created on first use.
    fn edge_set_for(
        &mut self,
        source: NodeIndex,
        target: NodeIndex,
        source_id: &EntityId,
        target_id: &EntityId,
    ) -> EdgeIndex {
        let key = pair_key(source_id, target_id);
        if let Some(&existing) = self.edge_sets.get(&key) {
            return existing;
        }

        let (low_id, high_id) = canonical_pair(source_id, target_id);
        let (low, high) = if low_id == source_id {
            (source, target)
        } else {
            (target, source)
        };
        let bundle = GraphEdge {
            source_id: low_id.clone(),
            target_id: high_id.clone(),
            link_key: link_key(source_id, target_id),
            state: EntityState::new(),
            kind: EdgeKind::Bundle {
                edges: Vec::new(),
                activated: true,
            },
        };
        let index = self.arena.add_edge(low, high, bundle);
        self.edge_sets.insert(key, index);
        index
    }

    /// Field holding explicit ids of vertex sets and edges.
    fn id_field(&self) -> String {
        self.config
            .identity_key
            .clone()
            .unwrap_or_else(|| DEFAULT_ID_FIELD.to_string())
    }

    fn ensure_unused(&self, id: &EntityId) -> Result<()> {
        if self.resolve(id).is_some() {
            return Err(GraphError::DuplicateId(id.clone()));
        }
        Ok(())
    }

    fn next_edge_id(&mut self) -> EntityId {
        loop {
            let id = EntityId::Index(self.next_edge);
            self.next_edge += 1;
            if !self.edges.contains_key(&id) {
                return id;
            }
        }
    }

    fn next_vertex_set_id(&mut self) -> EntityId {
        loop {
            let id = EntityId::Name(format!("vertexSet{}", self.next_vertex_set));
            self.next_vertex_set += 1;
            if self.resolve(&id).is_none() {
                return id;
            }
        }
    }

    fn finish_mutation(&mut self, auto_generate: bool) {
        self.sync_aggregates();
        if auto_generate {
            self.generate();
        }
    }

    // =========================================================================
    // Removal
    // =========================================================================

    /// Remove a vertex and every edge touching it.
    pub fn remove_vertex(&mut self, id: &EntityId, auto_generate: bool) -> bool {
        let Some(index) = self.vertices.shift_remove(id) else {
            return false;
        };
        self.retire_node(index);
        self.finish_mutation(auto_generate);
        true
    }

    /// Remove one edge. Its edge set goes with it once empty.
    pub fn remove_edge(&mut self, id: &EntityId, auto_generate: bool) -> bool {
        let Some(index) = self.edges.shift_remove(id) else {
            return false;
        };
        self.retire_edge(index);
        self.finish_mutation(auto_generate);
        true
    }

    /// Remove a vertex set. It is expanded first; its members move up to
    /// its own parent and edges attached to the set itself are removed.
    pub fn remove_vertex_set(&mut self, id: &EntityId, auto_generate: bool) -> bool {
        let Some(index) = self.vertex_sets.shift_remove(id) else {
            return false;
        };
        self.apply_activation(index, false);

        let parent = self.arena[index].parent;
        let members = self.arena[index]
            .group_mut()
            .map(|group| std::mem::take(&mut group.members))
            .unwrap_or_default();
        for &member in &members {
            self.arena[member].parent = parent;
        }
        if let Some(parent) = parent {
            let parent = &mut self.arena[parent];
            if let Some(group) = parent.group_mut() {
                group.members.extend(members.iter().copied());
            }
            parent.state.updated = true;
        }
        for &member in &members {
            self.refresh_restriction(member);
        }

        self.retire_node(index);
        self.finish_mutation(auto_generate);
        true
    }

    fn retire_node(&mut self, index: NodeIndex) {
        // Retire in edge insertion order so removal events come out stable.
        let mut incident: Vec<(usize, EdgeIndex)> = self
            .incident_edges(index)
            .into_iter()
            .filter_map(|edge| {
                let id = self.arena[edge].edge_id()?;
                Some((self.edges.get_index_of(id)?, edge))
            })
            .collect();
        incident.sort_unstable();
        incident.dedup();
        for &(_, edge) in &incident {
            if let Some(id) = self.arena[edge].edge_id().cloned() {
                self.edges.shift_remove(&id);
            }
            self.retire_edge(edge);
        }

        if let Some(parent) = self.arena[index].parent {
            let set = &mut self.arena[parent];
            if let Some(group) = set.group_mut() {
                group.members.retain(|&member| member != index);
            }
            set.state.updated = true;
        }

        let node = &mut self.arena[index];
        if node.state.retired {
            return;
        }
        node.state.retired = true;
        node.parent = None;
        self.retired_nodes.push(index);
        self.aggregates_dirty = true;
    }

    fn retire_edge(&mut self, index: EdgeIndex) {
        let edge = &mut self.arena[index];
        if edge.state.retired {
            return;
        }
        edge.state.retired = true;
        self.retired_edges.push(index);
        self.aggregates_dirty = true;

        let edge_set = match &edge.kind {
            EdgeKind::Single { edge_set, .. } => *edge_set,
            _ => return,
        };
        let bundle = &mut self.arena[edge_set];
        bundle.state.updated = true;
        let empty = match &mut bundle.kind {
            EdgeKind::Bundle { edges, .. } => {
                edges.retain(|&edge| edge != index);
                edges.is_empty()
            }
            _ => false,
        };
        if empty && !bundle.state.retired {
            bundle.state.retired = true;
            let key = (bundle.source_id.clone(), bundle.target_id.clone());
            self.edge_sets.shift_remove(&key);
            self.retired_edges.push(edge_set);
        }
    }

    // =========================================================================
    // Grouping
    // =========================================================================

    /// Collapse (`true`) or expand (`false`) a vertex set.
    pub fn set_vertex_set_activated(&mut self, id: &EntityId, activated: bool) -> bool {
        let Some(&index) = self.vertex_sets.get(id) else {
            return false;
        };
        let changed = self.apply_activation(index, activated);
        if changed {
            self.sync_aggregates();
        }
        changed
    }

    /// Add an existing vertex or vertex set to a vertex set.
    pub fn add_vertex_set_member(&mut self, set_id: &EntityId, member_id: &EntityId) -> Result<()> {
        let set = *self
            .vertex_sets
            .get(set_id)
            .ok_or_else(|| GraphError::UnknownVertexSet(set_id.clone()))?;
        self.attach_member(set, member_id)?;
        if self.arena[set].is_collapsed() {
            if let Some(center) = self.centroid(set) {
                self.arena[set].position = center;
            }
        }
        self.sync_aggregates();
        Ok(())
    }

    /// Take a member out of a vertex set. It moves up to the set's parent.
    pub fn remove_vertex_set_member(&mut self, set_id: &EntityId, member_id: &EntityId) -> bool {
        let (Some(&set), Some(member)) = (self.vertex_sets.get(set_id), self.resolve(member_id))
        else {
            return false;
        };
        if self.arena[member].parent != Some(set) {
            return false;
        }

        let grandparent = self.arena[set].parent;
        let group_node = &mut self.arena[set];
        if let Some(group) = group_node.group_mut() {
            group.members.retain(|&m| m != member);
        }
        group_node.state.updated = true;

        self.arena[member].parent = grandparent;
        if let Some(grandparent) = grandparent {
            if let Some(group) = self.arena[grandparent].group_mut() {
                group.members.push(member);
            }
        }
        self.refresh_restriction(member);
        self.aggregates_dirty = true;
        self.sync_aggregates();
        true
    }

    fn attach_member(&mut self, set: NodeIndex, member_id: &EntityId) -> Result<()> {
        let set_id = self.arena[set].id.clone();
        let member = self
            .resolve(member_id)
            .ok_or_else(|| GraphError::UnknownMember {
                set: set_id.clone(),
                member: member_id.clone(),
            })?;

        if member == set || self.is_ancestor(member, set) {
            return Err(GraphError::GroupCycle {
                set: set_id,
                member: member_id.clone(),
            });
        }
        match self.arena[member].parent {
            Some(parent) if parent == set => return Ok(()),
            Some(parent) => {
                return Err(GraphError::MemberAlreadyGrouped {
                    member: member_id.clone(),
                    parent: self.arena[parent].id.clone(),
                });
            }
            None => {}
        }

        self.arena[member].parent = Some(set);
        let group_node = &mut self.arena[set];
        if let Some(group) = group_node.group_mut() {
            group.members.push(member);
        }
        group_node.state.updated = true;

        self.refresh_restriction(member);
        self.aggregates_dirty = true;
        Ok(())
    }

    /// Toggle `activated` and update the restriction of every descendant.
    fn apply_activation(&mut self, set: NodeIndex, activated: bool) -> bool {
        match self.arena[set].group_mut() {
            Some(group) if group.activated != activated => group.activated = activated,
            _ => return false,
        }
        if activated {
            if let Some(center) = self.centroid(set) {
                self.arena[set].position = center;
            }
        }
        self.arena[set].state.updated = true;

        let members = self.arena[set]
            .group()
            .map(|group| group.members.clone())
            .unwrap_or_default();
        for member in members {
            self.refresh_restriction(member);
        }
        self.aggregates_dirty = true;
        true
    }

    /// Recompute `restricted` for `root` and everything below it from the
    /// state of its parent.
    fn refresh_restriction(&mut self, root: NodeIndex) {
        let mut stack = vec![root];
        while let Some(index) = stack.pop() {
            let restricted = self.arena[index].parent.is_some_and(|parent| {
                let parent = &self.arena[parent];
                parent.restricted || parent.is_collapsed()
            });
            let node = &mut self.arena[index];
            node.restricted = restricted;
            if let Some(group) = node.group() {
                stack.extend(group.members.iter().copied());
            }
        }
    }

    fn is_ancestor(&self, candidate: NodeIndex, index: NodeIndex) -> bool {
        let mut current = self.arena[index].parent;
        while let Some(parent) = current {
            if parent == candidate {
                return true;
            }
            current = self.arena[parent].parent;
        }
        false
    }

    /// Outermost collapsed ancestor of `index`, or `index` itself.
    fn representative(&self, index: NodeIndex) -> NodeIndex {
        let mut representative = index;
        let mut current = self.arena[index].parent;
        while let Some(parent) = current {
            if self.arena[parent].is_collapsed() {
                representative = parent;
            }
            current = self.arena[parent].parent;
        }
        representative
    }

    /// Every node below `set`, depth first.
    fn descendants(&self, set: NodeIndex) -> Vec<NodeIndex> {
        let mut found = Vec::new();
        let mut stack: Vec<NodeIndex> = self.arena[set]
            .group()
            .map(|group| group.members.clone())
            .unwrap_or_default();
        while let Some(index) = stack.pop() {
            found.push(index);
            if let Some(group) = self.arena[index].group() {
                stack.extend(group.members.iter().copied());
            }
        }
        found
    }

    /// Mean position of the vertices below `set`.
    fn centroid(&self, set: NodeIndex) -> Option<Vector> {
        let leaves: Vec<Vector> = self
            .descendants(set)
            .into_iter()
            .filter(|&index| !self.arena[index].is_group())
            .map(|index| self.arena[index].position)
            .collect();
        if leaves.is_empty() {
            return None;
        }
        let sum = leaves.iter().fold(Vector::ZERO, |acc, &p| acc + p);
        Some(sum * (1.0 / leaves.len() as f64))
    }

    // =========================================================================
    // Aggregation
    // =========================================================================

    fn sync_aggregates(&mut self) {
        if self.aggregates_dirty {
            self.rebuild_aggregates();
            self.aggregates_dirty = false;
        }
        self.spatial_dirty.set(true);
    }

    /// Bring edge-set collections in line with the current grouping.
    ///
    /// Every edge set whose endpoints are represented by two different
    /// nodes, at least one of them a collapsed ancestor, belongs to the
    /// collection keyed by the representatives' pair. Edge sets with both
    /// endpoints under the same collapsed set are held by that set.
    fn rebuild_aggregates(&mut self) {
        let mut desired: IndexMap<PairKey, (NodeIndex, NodeIndex, Vec<EdgeIndex>)> =
            IndexMap::new();
        for &edge_set in self.edge_sets.values() {
            let Some((a, b)) = self.arena.edge_endpoints(edge_set) else {
                continue;
            };
            let (rep_a, rep_b) = (self.representative(a), self.representative(b));
            if rep_a == rep_b || (rep_a == a && rep_b == b) {
                continue;
            }
            let (id_a, id_b) = (&self.arena[rep_a].id, &self.arena[rep_b].id);
            let (low, high) = if id_b < id_a { (rep_b, rep_a) } else { (rep_a, rep_b) };
            desired
                .entry(pair_key(id_a, id_b))
                .or_insert_with(|| (low, high, Vec::new()))
                .2
                .push(edge_set);
        }

        let stale: Vec<PairKey> = self
            .collections
            .iter()
            .filter(|&(key, &index)| {
                desired.get(key).is_none_or(|(low, high, _)| {
                    self.arena.edge_endpoints(index) != Some((*low, *high))
                })
            })
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            if let Some(index) = self.collections.shift_remove(&key) {
                self.arena[index].state.retired = true;
                self.retired_edges.push(index);
            }
        }

        for (key, (low, high, members)) in desired {
            if let Some(&index) = self.collections.get(&key) {
                let collection = &mut self.arena[index];
                if let EdgeKind::Aggregate { edge_sets } = &mut collection.kind {
                    if *edge_sets != members {
                        *edge_sets = members;
                        collection.state.updated = true;
                    }
                }
                continue;
            }
            let collection = GraphEdge {
                link_key: link_key(&key.0, &key.1),
                source_id: self.arena[low].id.clone(),
                target_id: self.arena[high].id.clone(),
                state: EntityState::new(),
                kind: EdgeKind::Aggregate { edge_sets: members },
            };
            let index = self.arena.add_edge(low, high, collection);
            self.collections.insert(key, index);
        }
    }

    /// Ids of every edge an observer can reach from what is shown: edges of
    /// shown edge sets, of shown collections, and those held inside shown
    /// collapsed vertex sets.
    pub fn aggregated_edge_ids(&self) -> Vec<EntityId> {
        let mut ids = Vec::new();
        for &edge_set in self.edge_sets.values() {
            let Some((a, b)) = self.arena.edge_endpoints(edge_set) else {
                continue;
            };
            let reachable = if self.edge_is_shown(edge_set) {
                true
            } else if !self.arena[edge_set].state.visible {
                false
            } else {
                let (rep_a, rep_b) = (self.representative(a), self.representative(b));
                if rep_a == rep_b {
                    (rep_a != a || rep_b != b) && self.arena[rep_a].is_shown()
                } else {
                    let key = pair_key(&self.arena[rep_a].id, &self.arena[rep_b].id);
                    self.collections
                        .get(&key)
                        .is_some_and(|&collection| self.edge_is_shown(collection))
                }
            };
            if reachable {
                ids.extend(self.bundle_edges(edge_set).filter_map(|e| self.arena[e].edge_id().cloned()));
            }
        }
        ids
    }

    fn bundle_edges(&self, edge_set: EdgeIndex) -> impl Iterator<Item = EdgeIndex> + '_ {
        let edges: &[EdgeIndex] = match self.arena.edge_weight(edge_set).map(|e| &e.kind) {
            Some(EdgeKind::Bundle { edges, .. }) => edges,
            _ => &[],
        };
        edges.iter().copied()
    }

    // =========================================================================
    // Property setters
    // =========================================================================

    /// Move a vertex or vertex set. Moving a collapsed set moves everything
    /// inside it by the same offset.
    pub fn set_vertex_position(&mut self, id: &EntityId, x: f64, y: f64) -> bool {
        let Some(index) = self.resolve(id) else {
            return false;
        };
        let target = Vector::new(x, y);
        let delta = target - self.arena[index].position;
        if delta == Vector::ZERO {
            return false;
        }

        let mut moved = vec![index];
        if self.arena[index].is_collapsed() {
            moved.extend(self.descendants(index));
        }
        for &node in &moved {
            let entry = &mut self.arena[node];
            entry.position = if node == index { target } else { entry.position + delta };
            entry.state.updated = true;
        }
        for node in moved {
            for edge in self.incident_edges(node) {
                self.arena[edge].state.updated = true;
            }
        }
        self.spatial_dirty.set(true);
        true
    }

    pub fn set_vertex_visible(&mut self, id: &EntityId, visible: bool) -> bool {
        let Some(index) = self.resolve(id) else {
            return false;
        };
        let changed = self.arena[index].state.set_visible(visible);
        if changed {
            self.spatial_dirty.set(true);
        }
        changed
    }

    pub fn set_edge_visible(&mut self, id: &EntityId, visible: bool) -> bool {
        match self.edges.get(id) {
            Some(&index) => self.arena[index].state.set_visible(visible),
            None => false,
        }
    }

    pub fn set_edge_set_visible(&mut self, key: &str, visible: bool) -> bool {
        match self.edge_set_index(key) {
            Some(index) => self.arena[index].state.set_visible(visible),
            None => false,
        }
    }

    /// Show the edges of an edge set individually (`true`) or as one bundle.
    pub fn set_edge_set_activated(&mut self, key: &str, activated: bool) -> bool {
        let Some(index) = self.edge_set_index(key) else {
            return false;
        };
        let edge_set = &mut self.arena[index];
        match &mut edge_set.kind {
            EdgeKind::Bundle { activated: current, .. } if *current != activated => {
                *current = activated;
                edge_set.state.updated = true;
                true
            }
            _ => false,
        }
    }

    /// Flag an entity for an update event on the next pass. Edge sets and
    /// collections are addressed by their link key.
    pub fn mark_updated(&mut self, id: &EntityId) -> bool {
        if let Some(index) = self.resolve(id) {
            self.arena[index].state.updated = true;
            return true;
        }
        let edge = self.edges.get(id).copied().or_else(|| match id {
            EntityId::Name(key) => self
                .edge_set_index(key)
                .or_else(|| self.collection_index(key)),
            EntityId::Index(_) => None,
        });
        match edge {
            Some(index) => {
                self.arena[index].state.updated = true;
                true
            }
            None => false,
        }
    }

    /// Merge caller fields into a vertex or vertex set. `x`/`y` move it.
    pub fn update_vertex_fields(&mut self, id: &EntityId, fields: Record) -> bool {
        let Some(index) = self.resolve(id) else {
            return false;
        };
        let position = record::read_position(&fields);
        let identity = self.config.identity_key.clone();

        let node = &mut self.arena[index];
        for (key, value) in fields {
            if identity.as_deref() != Some(key.as_str()) {
                node.fields.insert(key, value);
            }
        }
        node.state.updated = true;

        if let Some(position) = position {
            self.set_vertex_position(id, position.x, position.y);
        }
        true
    }

    // =========================================================================
    // Generation pass
    // =========================================================================

    /// Reconcile entity state with what observers have been told.
    ///
    /// Fires, between `StartGenerate` and `EndGenerate`: removals
    /// (collections, edges, edge sets, vertex sets, vertices), then additions
    /// (vertices, vertex sets, edge sets, edges, collections), then updates in
    /// addition order. A pass with nothing to report fires nothing at all.
    pub fn generate(&mut self) {
        self.sync_aggregates();
        let events = self.reconcile();
        self.free_retired();
        self.spatial_dirty.set(true);

        if events.is_empty() {
            return;
        }
        log::debug!("generation pass: {} events", events.len());
        self.emit(GraphEvent::StartGenerate);
        for event in events {
            self.emit(event);
        }
        self.emit(GraphEvent::EndGenerate);
    }

    fn reconcile(&mut self) -> Vec<GraphEvent> {
        let mut events = Vec::new();

        let vertices: Vec<NodeIndex> = self.vertices.values().copied().collect();
        let vertex_sets: Vec<NodeIndex> = self.vertex_sets.values().copied().collect();
        let edges: Vec<EdgeIndex> = self.edges.values().copied().collect();
        let edge_sets: Vec<EdgeIndex> = self.edge_sets.values().copied().collect();
        let collections: Vec<EdgeIndex> = self.collections.values().copied().collect();

        let live_edges = |class: EdgeClass| match class {
            EdgeClass::Edge => &edges,
            EdgeClass::EdgeSet => &edge_sets,
            EdgeClass::Collection => &collections,
        };
        let live_nodes = |class: NodeClass| match class {
            NodeClass::Vertex => &vertices,
            NodeClass::VertexSet => &vertex_sets,
        };

        // Removals, retired entities first.
        for class in [EdgeClass::Collection, EdgeClass::Edge, EdgeClass::EdgeSet] {
            let candidates: Vec<EdgeIndex> = self
                .retired_edges
                .iter()
                .copied()
                .filter(|&index| EdgeClass::of(&self.arena[index].kind) == class)
                .chain(live_edges(class).iter().copied())
                .collect();
            for index in candidates {
                if self.arena[index].state.generated && !self.edge_is_shown(index) {
                    events.push(class.remove()(self.edge_event(index)));
                    self.arena[index].state.generated = false;
                }
            }
        }
        for class in [NodeClass::VertexSet, NodeClass::Vertex] {
            let candidates: Vec<NodeIndex> = self
                .retired_nodes
                .iter()
                .copied()
                .filter(|&index| {
                    (class == NodeClass::VertexSet) == self.arena[index].is_group()
                })
                .chain(live_nodes(class).iter().copied())
                .collect();
            for index in candidates {
                let node = &self.arena[index];
                if node.state.generated && !node.is_shown() {
                    events.push(class.remove()(self.vertex_event(index)));
                    self.arena[index].state.generated = false;
                }
            }
        }

        // Additions.
        for class in [NodeClass::Vertex, NodeClass::VertexSet] {
            for &index in live_nodes(class) {
                let node = &self.arena[index];
                if !node.state.generated && node.is_shown() {
                    events.push(class.add()(self.vertex_event(index)));
                    let state = &mut self.arena[index].state;
                    state.generated = true;
                    state.updated = false;
                }
            }
        }
        for class in [EdgeClass::EdgeSet, EdgeClass::Edge, EdgeClass::Collection] {
            for &index in live_edges(class) {
                if !self.arena[index].state.generated && self.edge_is_shown(index) {
                    events.push(class.add()(self.edge_event(index)));
                    let state = &mut self.arena[index].state;
                    state.generated = true;
                    state.updated = false;
                }
            }
        }

        // Updates.
        for class in [NodeClass::Vertex, NodeClass::VertexSet] {
            for &index in live_nodes(class) {
                let state = self.arena[index].state;
                if state.generated && state.updated {
                    events.push(class.update()(self.vertex_event(index)));
                }
                self.arena[index].state.updated = false;
            }
        }
        for class in [EdgeClass::EdgeSet, EdgeClass::Edge, EdgeClass::Collection] {
            for &index in live_edges(class) {
                let state = self.arena[index].state;
                if state.generated && state.updated {
                    events.push(class.update()(self.edge_event(index)));
                }
                self.arena[index].state.updated = false;
            }
        }

        events
    }

    fn free_retired(&mut self) {
        for edge in self.retired_edges.drain(..) {
            self.arena.remove_edge(edge);
        }
        for node in self.retired_nodes.drain(..) {
            self.arena.remove_node(node);
        }
    }

    /// Whether an edge-like entity should currently be rendered.
    fn edge_is_shown(&self, index: EdgeIndex) -> bool {
        let edge = &self.arena[index];
        if edge.state.retired || !edge.state.visible {
            return false;
        }
        let endpoints_shown = || {
            self.arena
                .edge_endpoints(index)
                .is_some_and(|(a, b)| self.arena[a].is_shown() && self.arena[b].is_shown())
        };
        match &edge.kind {
            EdgeKind::Single { edge_set, .. } => {
                self.arena[*edge_set].is_activated() && self.edge_is_shown(*edge_set)
            }
            EdgeKind::Bundle { .. } => endpoints_shown(),
            // Collections follow the visibility of the edge sets they hold.
            EdgeKind::Aggregate { edge_sets } => {
                edge_sets
                    .iter()
                    .any(|&edge_set| self.arena[edge_set].state.visible)
                    && endpoints_shown()
            }
        }
    }

    fn vertex_event(&self, index: NodeIndex) -> VertexEvent {
        let node = &self.arena[index];
        VertexEvent {
            id: node.id.clone(),
            x: node.position.x,
            y: node.position.y,
        }
    }

    fn edge_event(&self, index: EdgeIndex) -> EdgeEvent {
        let edge = &self.arena[index];
        let (id, size) = match &edge.kind {
            EdgeKind::Single { id, .. } => (id.clone(), 1),
            EdgeKind::Bundle { edges, .. } => (EntityId::Name(edge.link_key.clone()), edges.len()),
            EdgeKind::Aggregate { edge_sets } => (
                EntityId::Name(edge.link_key.clone()),
                edge_sets
                    .iter()
                    .map(|&edge_set| self.bundle_edges(edge_set).count())
                    .sum(),
            ),
        };
        EdgeEvent {
            id,
            link_key: edge.link_key.clone(),
            source: edge.source_id.clone(),
            target: edge.target_id.clone(),
            size,
        }
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    fn resolve(&self, id: &EntityId) -> Option<NodeIndex> {
        self.vertices
            .get(id)
            .or_else(|| self.vertex_sets.get(id))
            .copied()
    }

    fn incident_edges(&self, index: NodeIndex) -> Vec<EdgeIndex> {
        self.arena
            .edges_directed(index, Direction::Outgoing)
            .chain(self.arena.edges_directed(index, Direction::Incoming))
            .map(|edge| edge.id())
            .collect()
    }

    pub fn get_vertex(&self, id: &EntityId) -> Option<&GraphNode> {
        self.vertices.get(id).map(|&index| &self.arena[index])
    }

    pub fn get_vertex_set(&self, id: &EntityId) -> Option<&GraphNode> {
        self.vertex_sets.get(id).map(|&index| &self.arena[index])
    }

    pub fn get_edge(&self, id: &EntityId) -> Option<&GraphEdge> {
        self.edges.get(id).map(|&index| &self.arena[index])
    }

    /// First entry of `map` whose link key is `key`.
    fn find_by_link_key(&self, map: &IndexMap<PairKey, EdgeIndex>, key: &str) -> Option<EdgeIndex> {
        map.values()
            .copied()
            .find(|&index| self.arena[index].link_key == key)
    }

    fn edge_set_index(&self, key: &str) -> Option<EdgeIndex> {
        self.find_by_link_key(&self.edge_sets, key)
    }

    fn collection_index(&self, key: &str) -> Option<EdgeIndex> {
        self.find_by_link_key(&self.collections, key)
    }

    /// Edge set by link key. When ids containing `_` make two pairs share a
    /// key, the older edge set wins; use
    /// [`get_edge_set_by_source_target`](Self::get_edge_set_by_source_target)
    /// to address a pair exactly.
    pub fn get_edge_set(&self, key: &str) -> Option<&GraphEdge> {
        self.edge_set_index(key).map(|index| &self.arena[index])
    }

    /// Edge-set collection by link key.
    pub fn get_edge_set_collection(&self, key: &str) -> Option<&GraphEdge> {
        self.collection_index(key).map(|index| &self.arena[index])
    }

    /// Edge set between two endpoints, in either direction.
    pub fn get_edge_set_by_source_target(&self, a: &EntityId, b: &EntityId) -> Option<&GraphEdge> {
        self.edge_sets
            .get(&pair_key(a, b))
            .map(|&index| &self.arena[index])
    }

    /// Member ids of a vertex set, in insertion order.
    pub fn vertex_set_members(&self, id: &EntityId) -> Vec<&EntityId> {
        self.members_where(id, |_| true)
    }

    /// Members of a vertex set that are plain vertices.
    pub fn vertex_set_vertices(&self, id: &EntityId) -> Vec<&EntityId> {
        self.members_where(id, |node| !node.is_group())
    }

    /// Members of a vertex set that are vertex sets themselves.
    pub fn vertex_set_children(&self, id: &EntityId) -> Vec<&EntityId> {
        self.members_where(id, GraphNode::is_group)
    }

    fn members_where(&self, id: &EntityId, keep: impl Fn(&GraphNode) -> bool) -> Vec<&EntityId> {
        self.get_vertex_set(id)
            .and_then(GraphNode::group)
            .map(|group| {
                group
                    .members
                    .iter()
                    .map(|&member| &self.arena[member])
                    .filter(|node| keep(node))
                    .map(|node| &node.id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Owning vertex set of a vertex or vertex set.
    pub fn parent_of(&self, id: &EntityId) -> Option<&EntityId> {
        let parent = self.arena[self.resolve(id)?].parent?;
        Some(&self.arena[parent].id)
    }

    /// Edge ids of an edge set, in insertion order.
    pub fn edge_set_edges(&self, key: &str) -> Vec<&EntityId> {
        match self.edge_set_index(key) {
            Some(index) => self
                .bundle_edges(index)
                .filter_map(|edge| self.arena[edge].edge_id())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Link keys of the edge sets held by a collection.
    pub fn collection_edge_sets(&self, key: &str) -> Vec<&str> {
        match self.get_edge_set_collection(key).map(|c| &c.kind) {
            Some(EdgeKind::Aggregate { edge_sets }) => edge_sets
                .iter()
                .map(|&edge_set| self.arena[edge_set].link_key.as_str())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Link keys of the edge sets a vertex or vertex set takes part in.
    pub fn vertex_edge_sets(&self, id: &EntityId) -> Vec<&str> {
        let Some(index) = self.resolve(id) else {
            return Vec::new();
        };
        let mut keys: Vec<&str> = self
            .incident_edges(index)
            .into_iter()
            .map(|edge| &self.arena[edge])
            .filter(|edge| matches!(edge.kind, EdgeKind::Bundle { .. }) && !edge.state.retired)
            .map(|edge| edge.link_key.as_str())
            .collect();
        keys.dedup();
        keys
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn vertex_set_count(&self) -> usize {
        self.vertex_sets.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edge_set_count(&self) -> usize {
        self.edge_sets.len()
    }

    pub fn collection_count(&self) -> usize {
        self.collections.len()
    }

    /// Every edge id, in insertion order.
    pub fn all_edge_ids(&self) -> Vec<EntityId> {
        self.edges.keys().cloned().collect()
    }

    /// Vertices not hidden by their own flag or a collapsed ancestor.
    pub fn visible_vertices(&self) -> Vec<&GraphNode> {
        self.vertices
            .values()
            .map(|&index| &self.arena[index])
            .filter(|vertex| vertex.is_visible())
            .collect()
    }

    /// Bounds of the given vertices or vertex sets, or of everything shown
    /// when `ids` is `None`. Empty input yields a zero rectangle.
    pub fn bounding_box(&self, ids: Option<&[EntityId]>) -> Bounds {
        let positions: Vec<Vector> = match ids {
            Some(ids) => ids
                .iter()
                .filter_map(|id| self.resolve(id))
                .map(|index| self.arena[index].position)
                .collect(),
            None => self
                .vertices
                .values()
                .chain(self.vertex_sets.values())
                .map(|&index| &self.arena[index])
                .filter(|node| node.is_shown())
                .map(|node| node.position)
                .collect(),
        };
        if positions.is_empty() {
            return Bounds::default();
        }

        let (mut min, mut max) = (positions[0], positions[0]);
        for p in &positions[1..] {
            min = Vector::new(min.x.min(p.x), min.y.min(p.y));
            max = Vector::new(max.x.max(p.x), max.y.max(p.y));
        }
        Bounds {
            x: min.x,
            y: min.y,
            width: max.x - min.x,
            height: max.y - min.y,
        }
    }

    // =========================================================================
    // Hit testing
    // =========================================================================

    fn ensure_spatial_index_up_to_date(&self) {
        if !self.spatial_dirty.get() {
            return;
        }
        let points = self
            .vertices
            .values()
            .chain(self.vertex_sets.values())
            .filter(|&&index| self.arena[index].is_shown())
            .map(|&index| {
                let p = self.arena[index].position;
                NodePoint::new(index, p.x, p.y)
            })
            .collect();
        self.spatial.borrow_mut().rebuild(points);
        self.spatial_dirty.set(false);
    }

    /// Nearest shown vertex or collapsed vertex set within `max_distance`.
    pub fn find_nearest_vertex(&self, x: f64, y: f64, max_distance: f64) -> Option<EntityId> {
        self.ensure_spatial_index_up_to_date();
        let found = self.spatial.borrow().nearest_within(x, y, max_distance);
        found.map(|index| self.arena[index].id.clone())
    }

    /// Shown vertices and collapsed vertex sets inside a rectangle.
    pub fn vertices_in_rect(&self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Vec<EntityId> {
        self.ensure_spatial_index_up_to_date();
        let found = self.spatial.borrow().in_rect(min_x, min_y, max_x, max_y);
        found
            .into_iter()
            .map(|index| self.arena[index].id.clone())
            .collect()
    }

    // =========================================================================
    // Export
    // =========================================================================

    /// Re-derive the ingest shape from the current state. Caller fields are
    /// kept; positions, endpoints and memberships reflect the graph. Without
    /// an identity key, vertices are referenced by their export position.
    pub fn get_data(&self) -> GraphData {
        let positional = self.config.identity_key.is_none();
        let id_field = self.id_field();
        let slots: HashMap<NodeIndex, usize> = self
            .vertices
            .values()
            .enumerate()
            .map(|(slot, &index)| (index, slot))
            .collect();
        let reference = |index: NodeIndex| -> Value {
            match slots.get(&index) {
                Some(&slot) if positional => Value::from(slot),
                _ => self.arena[index].id.to_value(),
            }
        };

        let nodes = self
            .vertices
            .values()
            .map(|&index| {
                let vertex = &self.arena[index];
                let mut out = vertex.fields.clone();
                if !positional {
                    out.insert(id_field.clone(), vertex.id.to_value());
                }
                record::write_position(&mut out, vertex.position);
                out
            })
            .collect();

        let links = self
            .edges
            .values()
            .map(|&index| {
                let mut out = self.arena[index].fields().cloned().unwrap_or_default();
                if let Some((source, target)) = self.arena.edge_endpoints(index) {
                    out.insert("source".to_string(), reference(source));
                    out.insert("target".to_string(), reference(target));
                }
                out
            })
            .collect();

        let node_set = self
            .vertex_sets
            .values()
            .map(|&index| {
                let set = &self.arena[index];
                let mut out = set.fields.clone();
                out.insert(id_field.clone(), set.id.to_value());
                let members: Vec<Value> = set
                    .group()
                    .map(|group| group.members.iter().map(|&m| reference(m)).collect())
                    .unwrap_or_default();
                out.insert("nodes".to_string(), Value::Array(members));
                out.insert("activated".to_string(), Value::Bool(set.is_collapsed()));
                record::write_position(&mut out, set.position);
                out
            })
            .collect();

        GraphData {
            nodes,
            links,
            node_set,
        }
    }
}

impl Default for ObservableGraph {
    fn default() -> Self {
        Self::new(GraphConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use std::rc::Rc;

    fn data(value: Value) -> GraphData {
        serde_json::from_value(value).unwrap()
    }

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn keyed() -> ObservableGraph {
        ObservableGraph::new(GraphConfig {
            identity_key: Some("id".to_string()),
            ..GraphConfig::default()
        })
    }

    /// Collect events as `"name:subject"` strings.
    fn recorder(graph: &mut ObservableGraph) -> Rc<RefCell<Vec<String>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        graph.subscribe(move |event| {
            let entry = match event.subject() {
                Some(id) => format!("{}:{id}", event.name()),
                None => event.name().to_string(),
            };
            sink.borrow_mut().push(entry);
        });
        log
    }

    fn triangle() -> GraphData {
        data(json!({
            "nodes": [{"id": 0}, {"id": 1}, {"id": 2}],
            "links": [
                {"source": 0, "target": 1},
                {"source": 1, "target": 0},
                {"source": 1, "target": 2}
            ]
        }))
    }

    fn count(log: &[String], prefix: &str) -> usize {
        log.iter().filter(|e| e.starts_with(prefix)).count()
    }

    #[test]
    fn test_parallel_edges_share_edge_set() {
        let mut graph = keyed();
        let log = recorder(&mut graph);
        let report = graph.set_data(triangle());

        assert!(report.is_complete());
        assert_eq!(report.vertices, 3);
        assert_eq!(report.edges, 3);
        assert_eq!(graph.edge_set_count(), 2);

        let pair = graph.get_edge_set("0_1").unwrap();
        assert_eq!(graph.edge_set_edges("0_1").len(), 2);
        assert_eq!(graph.edge_set_edges("1_2").len(), 1);
        assert_eq!(pair.source_id, EntityId::from(0));

        let reversed: Vec<bool> = graph
            .edge_set_edges("0_1")
            .into_iter()
            .map(|id| graph.get_edge(id).unwrap().is_reverse())
            .collect();
        assert_eq!(reversed, vec![false, true]);

        let (a, b) = (EntityId::from(0), EntityId::from(1));
        let forward = graph.get_edge_set_by_source_target(&a, &b).unwrap();
        let backward = graph.get_edge_set_by_source_target(&b, &a).unwrap();
        assert_eq!(forward.link_key, backward.link_key);

        let log = log.borrow();
        assert_eq!(count(&log, "addVertex:"), 3);
        assert_eq!(count(&log, "addEdgeSet:"), 2);
        assert_eq!(count(&log, "addEdge:"), 3);
        assert_eq!(log[0], "clear");
        assert_eq!(log[1], "setData");
        assert_eq!(log[2], "startGenerate");
        assert_eq!(log.last().map(String::as_str), Some("endGenerate"));
    }

    #[test]
    fn test_collapse_aggregates_cross_boundary_edges() {
        let mut graph = keyed();
        graph.set_data(triangle());
        graph
            .add_vertex_set(record(json!({"id": "g", "nodes": [0, 1]})), true)
            .unwrap();

        let log = recorder(&mut graph);
        assert!(graph.set_vertex_set_activated(&EntityId::from("g"), true));
        graph.generate();

        assert_eq!(
            *log.borrow(),
            vec![
                "startGenerate",
                "removeEdge:0",
                "removeEdge:1",
                "removeEdge:2",
                "removeEdgeSet:0_1",
                "removeEdgeSet:1_2",
                "removeVertex:0",
                "removeVertex:1",
                "addVertexSet:g",
                "addEdgeSetCollection:2_g",
                "endGenerate",
            ]
        );

        let collection = graph.get_edge_set_collection("2_g").unwrap();
        assert_eq!(collection.source_id, EntityId::from(2));
        assert_eq!(collection.target_id, EntityId::from("g"));
        assert_eq!(graph.collection_edge_sets("2_g"), vec!["1_2"]);
    }

    #[test]
    fn test_collapse_expand_round_trip() {
        let mut graph = keyed();
        graph.set_data(triangle());
        graph
            .add_vertex_set(record(json!({"id": "g", "nodes": [0, 1]})), true)
            .unwrap();
        graph.set_vertex_visible(&EntityId::from(0), false);
        graph.generate();

        let before: Vec<(EntityId, bool)> = graph
            .visible_vertices()
            .iter()
            .map(|v| (v.id.clone(), v.state.visible))
            .collect();

        let g = EntityId::from("g");
        graph.set_vertex_set_activated(&g, true);
        graph.generate();
        assert_eq!(graph.collection_count(), 1);
        assert!(!graph.set_vertex_set_activated(&g, true));

        let log = recorder(&mut graph);
        graph.set_vertex_set_activated(&g, false);
        graph.generate();

        assert_eq!(graph.collection_count(), 0);
        let after: Vec<(EntityId, bool)> = graph
            .visible_vertices()
            .iter()
            .map(|v| (v.id.clone(), v.state.visible))
            .collect();
        assert_eq!(before, after);
        assert!(!graph.get_vertex(&EntityId::from(0)).unwrap().state.visible);

        let log = log.borrow();
        assert_eq!(log[1], "removeEdgeSetCollection:2_g");
        assert_eq!(count(&log, "removeVertexSet:g"), 1);
        assert_eq!(count(&log, "addVertex:1"), 1);
        assert_eq!(count(&log, "addVertex:0"), 0);
    }

    #[test]
    fn test_generate_is_idempotent() {
        let mut graph = keyed();
        graph.set_data(triangle());
        let log = recorder(&mut graph);
        graph.generate();
        graph.generate();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_nested_collapse_uses_outermost_set() {
        let mut graph = keyed();
        graph.set_data(data(json!({
            "nodes": [{"id": 0}, {"id": 1}, {"id": 2}, {"id": 3}],
            "links": [{"source": 0, "target": 3}, {"source": 1, "target": 3}],
            "nodeSet": [
                {"id": "outer", "nodes": ["inner", 2]},
                {"id": "inner", "nodes": [0, 1], "activated": true}
            ]
        })));

        assert_eq!(graph.collection_edge_sets("3_inner"), vec!["0_3", "1_3"]);
        assert_eq!(graph.vertex_set_children(&EntityId::from("outer")), vec![&EntityId::from("inner")]);
        assert_eq!(graph.vertex_set_vertices(&EntityId::from("outer")), vec![&EntityId::from(2)]);

        graph.set_vertex_set_activated(&EntityId::from("outer"), true);
        graph.generate();
        assert!(graph.get_edge_set_collection("3_inner").is_none());
        assert_eq!(graph.collection_edge_sets("3_outer"), vec!["0_3", "1_3"]);
        assert!(!graph.get_vertex_set(&EntityId::from("inner")).unwrap().is_shown());

        let mut reachable = graph.aggregated_edge_ids();
        reachable.sort();
        assert_eq!(reachable, vec![EntityId::from(0), EntityId::from(1)]);
    }

    #[test]
    fn test_remove_vertex_cascades() {
        let mut graph = keyed();
        graph.set_data(triangle());
        graph
            .add_vertex_set(record(json!({"id": "g", "nodes": [1, 2]})), true)
            .unwrap();

        let log = recorder(&mut graph);
        assert!(graph.remove_vertex(&EntityId::from(1), true));
        assert!(!graph.remove_vertex(&EntityId::from(1), true));

        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.edge_set_count(), 0);
        assert_eq!(graph.vertex_set_members(&EntityId::from("g")), vec![&EntityId::from(2)]);
        assert_eq!(
            *log.borrow(),
            vec![
                "startGenerate",
                "removeEdge:0",
                "removeEdge:1",
                "removeEdge:2",
                "removeEdgeSet:0_1",
                "removeEdgeSet:1_2",
                "removeVertex:1",
                "endGenerate",
            ]
        );
    }

    #[test]
    fn test_remove_edge_keeps_non_empty_edge_set() {
        let mut graph = keyed();
        graph.set_data(triangle());
        let log = recorder(&mut graph);

        assert!(graph.remove_edge(&EntityId::from(0), true));
        assert_eq!(graph.edge_set_edges("0_1"), vec![&EntityId::from(1)]);
        assert_eq!(
            *log.borrow(),
            vec!["startGenerate", "removeEdge:0", "updateEdgeSet:0_1", "endGenerate"]
        );
    }

    #[test]
    fn test_remove_vertex_set_reparents_members() {
        let mut graph = keyed();
        graph.set_data(data(json!({
            "nodes": [{"id": 0}, {"id": 1}, {"id": 2}],
            "links": [{"source": 0, "target": 2}],
            "nodeSet": [
                {"id": "outer", "nodes": ["inner"]},
                {"id": "inner", "nodes": [0, 1], "activated": true}
            ]
        })));
        assert_eq!(graph.collection_count(), 1);

        assert!(graph.remove_vertex_set(&EntityId::from("inner"), true));
        assert_eq!(graph.collection_count(), 0);
        assert_eq!(graph.parent_of(&EntityId::from(0)), Some(&EntityId::from("outer")));
        assert_eq!(graph.vertex_set_members(&EntityId::from("outer")).len(), 2);
        assert!(graph.get_edge_set("0_2").is_some());
        assert_eq!(graph.visible_vertices().len(), 3);
    }

    #[test]
    fn test_rejected_records_are_reported() {
        let mut graph = keyed();
        let report = graph.set_data(data(json!({
            "nodes": [{"id": 0}, {"name": "no id"}, {"id": 0}],
            "links": [{"source": 0, "target": 9}, {"target": 0}],
            "nodeSet": [{"id": "g", "nodes": [0, 42]}]
        })));

        assert_eq!(report.vertices, 1);
        assert_eq!(report.edges, 0);
        assert_eq!(report.vertex_sets, 1);
        assert!(!report.is_complete());
        assert_eq!(
            report.rejected,
            vec![
                GraphError::MissingIdentity("id".to_string()),
                GraphError::DuplicateId(EntityId::from(0)),
                GraphError::UnknownMember {
                    set: EntityId::from("g"),
                    member: EntityId::from(42),
                },
                GraphError::UnknownEndpoint {
                    source_id: EntityId::from(0),
                    target_id: EntityId::from(9),
                    missing: EntityId::from(9),
                },
                GraphError::MissingEndpoint("source"),
            ]
        );
        assert_eq!(graph.vertex_set_members(&EntityId::from("g")), vec![&EntityId::from(0)]);
    }

    #[test]
    fn test_membership_errors() {
        let mut graph = keyed();
        graph.set_data(data(json!({
            "nodes": [{"id": 0}],
            "nodeSet": [{"id": "a", "nodes": [0]}, {"id": "b", "nodes": ["a"]}]
        })));
        let (a, b) = (EntityId::from("a"), EntityId::from("b"));

        assert_eq!(
            graph.add_vertex_set_member(&a, &b),
            Err(GraphError::GroupCycle {
                set: a.clone(),
                member: b.clone()
            })
        );
        assert_eq!(
            graph.add_vertex_set_member(&b, &EntityId::from(0)),
            Err(GraphError::MemberAlreadyGrouped {
                member: EntityId::from(0),
                parent: a.clone()
            })
        );
        assert!(graph.remove_vertex_set_member(&a, &EntityId::from(0)));
        assert_eq!(graph.parent_of(&EntityId::from(0)), Some(&b));
        assert!(!graph.remove_vertex_set_member(&a, &EntityId::from(0)));
    }

    #[test]
    fn test_edge_set_deactivation_hides_edges() {
        let mut graph = keyed();
        graph.set_data(triangle());
        let log = recorder(&mut graph);

        assert!(graph.set_edge_set_activated("0_1", false));
        assert!(!graph.set_edge_set_activated("0_1", false));
        graph.generate();
        assert_eq!(
            *log.borrow(),
            vec![
                "startGenerate",
                "removeEdge:0",
                "removeEdge:1",
                "updateEdgeSet:0_1",
                "endGenerate"
            ]
        );
        let mut reachable = graph.aggregated_edge_ids();
        reachable.sort();
        assert_eq!(reachable.len(), 3);
    }

    #[test]
    fn test_moving_collapsed_set_moves_members() {
        let mut graph = keyed();
        graph.set_data(data(json!({
            "nodes": [{"id": 0, "x": 0, "y": 0}, {"id": 1, "x": 10, "y": 0}, {"id": 2, "x": 50, "y": 50}],
            "links": [{"source": 1, "target": 2}],
            "nodeSet": [{"id": "g", "nodes": [0, 1], "activated": true}]
        })));
        let g = EntityId::from("g");
        assert_eq!(graph.get_vertex_set(&g).unwrap().position, Vector::new(5.0, 0.0));

        let log = recorder(&mut graph);
        assert!(graph.set_vertex_position(&g, 5.0, 20.0));
        assert!(!graph.set_vertex_position(&g, 5.0, 20.0));
        graph.generate();

        assert_eq!(graph.get_vertex(&EntityId::from(0)).unwrap().position, Vector::new(0.0, 20.0));
        assert_eq!(graph.get_vertex(&EntityId::from(1)).unwrap().position, Vector::new(10.0, 20.0));
        assert_eq!(
            *log.borrow(),
            vec!["startGenerate", "updateVertexSet:g", "updateEdgeSetCollection:2_g", "endGenerate"]
        );
    }

    #[test]
    fn test_positional_ids_and_round_trip() {
        let mut graph = ObservableGraph::default();
        graph.set_data(data(json!({
            "nodes": [{"label": "a", "x": 1, "y": 2}, {"label": "b", "x": 3, "y": 4}, {"label": "c"}],
            "links": [{"source": 0, "target": 1, "weight": 5}, {"source": 2, "target": 1}],
            "nodeSet": [{"nodes": [0, 2]}]
        })));
        assert!(graph.get_vertex(&EntityId::from(2)).is_some());
        assert!(graph.get_vertex_set(&EntityId::from("vertexSet0")).is_some());

        graph.remove_vertex(&EntityId::from(0), true);
        let exported = graph.get_data();

        assert_eq!(exported.nodes.len(), 2);
        assert_eq!(exported.nodes[0]["label"], "b");
        assert_eq!(exported.nodes[0]["x"], 3.0);
        assert_eq!(exported.links.len(), 1);
        assert_eq!(exported.links[0]["source"], 1);
        assert_eq!(exported.links[0]["target"], 0);
        assert_eq!(exported.node_set[0]["id"], "vertexSet0");
        assert_eq!(exported.node_set[0]["nodes"], json!([1]));

        let mut copy = ObservableGraph::default();
        let report = copy.set_data(exported.clone());
        assert!(report.is_complete());
        assert_eq!(copy.get_data(), exported);
    }

    #[test]
    fn test_keyed_round_trip_keeps_fields() {
        let mut graph = keyed();
        graph.set_data(data(json!({
            "nodes": [{"id": "a", "x": 1, "y": 1, "color": "red"}, {"id": "b", "x": 2, "y": 2}],
            "links": [{"id": "ab", "source": "a", "target": "b", "weight": 2}],
            "nodeSet": [{"id": "g", "nodes": ["a", "b"], "activated": true}]
        })));
        let exported = graph.get_data();
        assert_eq!(exported.nodes[0]["color"], "red");
        assert_eq!(exported.links[0]["id"], "ab");
        assert_eq!(exported.links[0]["weight"], 2);
        assert_eq!(exported.node_set[0]["activated"], true);

        let mut copy = keyed();
        copy.set_data(exported.clone());
        assert_eq!(copy.get_data(), exported);
        assert!(copy.get_vertex_set(&EntityId::from("g")).unwrap().is_collapsed());
    }

    #[test]
    fn test_data_processor_positions_new_vertices() {
        let mut graph = ObservableGraph::new(GraphConfig {
            identity_key: Some("id".to_string()),
            data_processor: Some("circle".to_string()),
            ..GraphConfig::default()
        });
        graph.set_data(data(json!({"nodes": [{"id": 0}, {"id": 1}, {"id": 2}]})));
        let center = Vector::new(400.0, 400.0);
        for vertex in graph.visible_vertices() {
            assert!((vertex.position.distance(center) - 320.0).abs() < 1e-9);
        }

        let before = graph.get_vertex(&EntityId::from(0)).unwrap().position;
        graph.insert_data(data(json!({"nodes": [{"id": 3}]})));
        assert_eq!(graph.get_vertex(&EntityId::from(0)).unwrap().position, before);
        let added = graph.get_vertex(&EntityId::from(3)).unwrap().position;
        assert!((added.distance(center) - 320.0).abs() < 1e-9);
    }

    #[test]
    fn test_force_processor_spreads_vertices() {
        let mut graph = ObservableGraph::new(GraphConfig {
            data_processor: Some("force".to_string()),
            ..GraphConfig::default()
        });
        graph.set_data(data(json!({
            "nodes": [{}, {}, {}, {}],
            "links": [{"source": 0, "target": 1}, {"source": 1, "target": 2}, {"source": 2, "target": 3}]
        })));
        let bounds = graph.bounding_box(None);
        assert!(bounds.width > 10.0 || bounds.height > 10.0);
    }

    #[test]
    fn test_unknown_processor_leaves_positions() {
        let mut graph = ObservableGraph::new(GraphConfig {
            data_processor: Some("spiral".to_string()),
            ..GraphConfig::default()
        });
        let report = graph.set_data(data(json!({"nodes": [{"x": 7, "y": 8}]})));
        assert!(report.is_complete());
        assert_eq!(graph.get_vertex(&EntityId::from(0)).unwrap().position, Vector::new(7.0, 8.0));
    }

    #[test]
    fn test_hit_testing_follows_visibility() {
        let mut graph = keyed();
        graph.set_data(data(json!({
            "nodes": [{"id": 0, "x": 0, "y": 0}, {"id": 1, "x": 100, "y": 0}],
            "nodeSet": [{"id": "g", "nodes": [1]}]
        })));

        assert_eq!(graph.find_nearest_vertex(90.0, 0.0, 20.0), Some(EntityId::from(1)));
        assert_eq!(graph.vertices_in_rect(-1.0, -1.0, 200.0, 1.0).len(), 2);

        graph.set_vertex_set_activated(&EntityId::from("g"), true);
        graph.generate();
        assert_eq!(graph.find_nearest_vertex(90.0, 0.0, 20.0), Some(EntityId::from("g")));

        graph.set_vertex_position(&EntityId::from(0), 500.0, 500.0);
        assert_eq!(graph.find_nearest_vertex(0.0, 0.0, 20.0), None);
    }

    #[test]
    fn test_bounding_box() {
        let mut graph = keyed();
        assert_eq!(graph.bounding_box(None), Bounds::default());

        graph.set_data(data(json!({
            "nodes": [{"id": 0, "x": -10, "y": 5}, {"id": 1, "x": 30, "y": 25}, {"id": 2, "x": 0, "y": 0}]
        })));
        assert_eq!(
            graph.bounding_box(None),
            Bounds { x: -10.0, y: 0.0, width: 40.0, height: 25.0 }
        );
        assert_eq!(
            graph.bounding_box(Some(&[EntityId::from(1), EntityId::from(2)])),
            Bounds { x: 0.0, y: 0.0, width: 30.0, height: 25.0 }
        );
        assert_eq!(graph.bounding_box(Some(&[])), Bounds::default());
    }

    #[test]
    fn test_incremental_add_reuses_edge_set() {
        let mut graph = keyed();
        graph.set_data(triangle());
        let log = recorder(&mut graph);

        let id = graph
            .add_edge(record(json!({"source": 2, "target": 1})), true)
            .unwrap();
        assert_eq!(graph.edge_set_count(), 2);
        assert!(graph.get_edge(&id).unwrap().is_reverse());
        assert_eq!(id, EntityId::from(3));
        assert_eq!(
            *log.borrow(),
            vec!["startGenerate", "addEdge:3", "updateEdgeSet:1_2", "endGenerate"]
        );

        let vertex = graph.add_vertex(record(json!({"id": 7})), false).unwrap();
        assert_eq!(vertex, EntityId::from(7));
        assert_eq!(
            graph.add_vertex(record(json!({"id": 7})), false),
            Err(GraphError::DuplicateId(EntityId::from(7)))
        );
        graph.generate();
        assert_eq!(log.borrow().iter().filter(|e| *e == "addVertex:7").count(), 1);
    }

    #[test]
    fn test_clear_resets() {
        let mut graph = keyed();
        graph.set_data(triangle());
        let log = recorder(&mut graph);
        graph.clear();
        assert_eq!(*log.borrow(), vec!["clear"]);
        assert_eq!(graph.vertex_count(), 0);
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.get_edge_set("0_1").is_none());
    }

    #[test]
    fn test_update_fields_and_mark_updated() {
        let mut graph = keyed();
        graph.set_data(triangle());
        let log = recorder(&mut graph);

        assert!(graph.update_vertex_fields(&EntityId::from(2), record(json!({"label": "two", "id": 99}))));
        assert!(graph.mark_updated(&EntityId::from("0_1")));
        assert!(!graph.mark_updated(&EntityId::from("nope")));
        graph.generate();

        let vertex = graph.get_vertex(&EntityId::from(2)).unwrap();
        assert_eq!(vertex.fields["label"], "two");
        assert_eq!(vertex.fields["id"], 2);
        assert_eq!(
            *log.borrow(),
            vec!["startGenerate", "updateVertex:2", "updateEdgeSet:0_1", "endGenerate"]
        );
    }

    #[test]
    fn test_edge_sets_keyed_by_endpoint_pair() {
        let mut graph = keyed();
        let report = graph.set_data(data(json!({
            "nodes": [{"id": "a_b"}, {"id": "c"}, {"id": "a"}, {"id": "b_c"}],
            "links": [{"source": "a_b", "target": "c"}, {"source": "a", "target": "b_c"}]
        })));
        assert!(report.is_complete());
        assert_eq!(graph.edge_set_count(), 2);

        let (a, b_c) = (EntityId::from("a"), EntityId::from("b_c"));
        let edge_set = graph.get_edge_set_by_source_target(&b_c, &a).unwrap();
        assert_eq!((&edge_set.source_id, &edge_set.target_id), (&a, &b_c));
        assert_eq!(edge_set.link_key, "a_b_c");

        let log = recorder(&mut graph);
        assert!(graph.remove_vertex(&EntityId::from("c"), true));
        graph.generate();

        assert_eq!(graph.edge_set_count(), 1);
        assert_eq!(graph.edge_set_edges("a_b_c"), vec![&EntityId::from(1)]);
        assert_eq!(
            *log.borrow(),
            vec![
                "startGenerate",
                "removeEdge:0",
                "removeEdgeSet:a_b_c",
                "removeVertex:c",
                "endGenerate"
            ]
        );
    }

    #[test]
    fn test_numeric_and_string_ids_get_separate_edge_sets() {
        let mut graph = keyed();
        graph.set_data(data(json!({
            "nodes": [{"id": 1}, {"id": 3}, {"id": "3"}],
            "links": [{"source": 1, "target": 3}, {"source": "3", "target": 1}]
        })));
        assert_eq!(graph.edge_set_count(), 2);

        assert!(graph.remove_vertex(&EntityId::from(3), true));
        graph.generate();

        let (one, name_three) = (EntityId::from(1), EntityId::from("3"));
        let edge_set = graph.get_edge_set_by_source_target(&name_three, &one).unwrap();
        assert_eq!(edge_set.target_id, name_three);
        assert!(graph.get_edge_set_by_source_target(&one, &EntityId::from(3)).is_none());
        assert_eq!(graph.edge_set_edges("1_3"), vec![&EntityId::from(1)]);
        assert_eq!(graph.aggregated_edge_ids(), vec![EntityId::from(1)]);
    }

    #[test]
    fn test_collapsed_set_holds_edges_to_its_own_members() {
        let mut graph = keyed();
        graph.set_data(data(json!({
            "nodes": [{"id": "b"}, {"id": "c"}],
            "links": [{"source": "A", "target": "b"}, {"source": "b", "target": "c"}],
            "nodeSet": [{"id": "A", "nodes": ["b", "c"], "activated": true}]
        })));
        assert_eq!(graph.edge_count(), 2);

        let mut reachable = graph.aggregated_edge_ids();
        reachable.sort();
        assert_eq!(reachable, vec![EntityId::from(0), EntityId::from(1)]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_aggregation_is_lossless(
            links in prop::collection::vec((0usize..8, 0usize..8), 1..20),
            set_links in prop::collection::vec((0usize..3, 0usize..8), 0..6),
            ops in prop::collection::vec((0usize..3, any::<bool>()), 0..16),
        ) {
            // Named ids put the vertex sets on the low side of their link keys.
            let vertex = |i: usize| format!("v{i}");
            let sets = ["a", "b", "outer"];

            let mut graph = keyed();
            let nodes: Vec<Value> = (0..8).map(|i| json!({"id": vertex(i)})).collect();
            let records: Vec<Value> = links
                .iter()
                .map(|&(s, t)| json!({"source": vertex(s), "target": vertex(t)}))
                .chain(
                    set_links
                        .iter()
                        .map(|&(set, t)| json!({"source": sets[set], "target": vertex(t)})),
                )
                .collect();
            let report = graph.set_data(data(json!({
                "nodes": nodes,
                "links": records,
                "nodeSet": [
                    {"id": "a", "nodes": ["v0", "v1", "v2"]},
                    {"id": "b", "nodes": ["v3", "v4"]},
                    {"id": "outer", "nodes": ["a", "v5"]}
                ]
            })));
            prop_assert!(report.is_complete());

            let mut collapsed = [false; 3];
            for (set, collapse) in ops {
                graph.set_vertex_set_activated(&EntityId::from(sets[set]), collapse);
                collapsed[set] = collapse;
                graph.generate();

                // Edges ending on an expanded set are hidden until something
                // above them collapses.
                let represented = |set: usize| collapsed[set] || (set == 0 && collapsed[2]);
                let expected: Vec<EntityId> = (0..records.len())
                    .filter(|&i| i < links.len() || represented(set_links[i - links.len()].0))
                    .map(|i| EntityId::from(i as u64))
                    .collect();

                let mut reachable = graph.aggregated_edge_ids();
                reachable.sort();
                prop_assert_eq!(&reachable, &expected);
                prop_assert_eq!(graph.edge_count(), records.len());
            }

            for set in sets {
                graph.set_vertex_set_activated(&EntityId::from(set), false);
            }
            graph.generate();
            prop_assert_eq!(graph.collection_count(), 0);
            prop_assert_eq!(graph.visible_vertices().len(), 8);
        }
    }
}
