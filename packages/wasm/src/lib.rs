//! Topology Graph - WASM Module
//!
//! Graph model and layout core for the Topology Graph visualization library.
//! It is compiled to WebAssembly and exposes a JavaScript-friendly API via
//! wasm-bindgen; renderers subscribe to graph events and draw whatever the
//! generation pass announces.
//!
//! # Architecture
//!
//! - `graph`: Observable multigraph with vertex sets, edge sets and
//!   edge-set collections, stored in petgraph's StableGraph
//! - `layout`: Force simulators and named data processors
//! - `spatial`: Barnes-Hut quadtree and R-tree hit testing
//! - `geometry`: 2-D vector, line and matrix kernel

use js_sys::Function;
use serde::Serialize;
use serde_wasm_bindgen::Serializer;
use wasm_bindgen::prelude::*;

pub mod config;
pub mod error;
pub mod geometry;
pub mod graph;
pub mod layout;
pub mod spatial;

use config::GraphConfig;
use error::{GraphError, IngestReport};
use graph::{EntityId, GraphData, ObservableGraph, ObserverId, Record};

/// Initialize the WASM module.
#[wasm_bindgen(start)]
pub fn init() {
    let _ = console_log::init_with_level(log::Level::Warn);
    console_error_panic_hook::set_once();
}

/// Batch ingest outcome as seen from JavaScript.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IngestSummary {
    vertices: usize,
    edges: usize,
    vertex_sets: usize,
    rejected: Vec<String>,
}

impl From<IngestReport> for IngestSummary {
    fn from(report: IngestReport) -> Self {
        Self {
            vertices: report.vertices,
            edges: report.edges,
            vertex_sets: report.vertex_sets,
            rejected: report.rejected.iter().map(ToString::to_string).collect(),
        }
    }
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsError> {
    Ok(value.serialize(&Serializer::json_compatible())?)
}

/// Read an id passed from JavaScript: a number or a string.
fn entity_id(value: &JsValue) -> Result<EntityId, JsError> {
    if let Some(number) = value.as_f64() {
        return Ok(EntityId::from_f64(number));
    }
    value
        .as_string()
        .map(EntityId::Name)
        .ok_or_else(|| JsError::new("id must be a number or a string"))
}

fn record(value: JsValue) -> Result<Record, JsError> {
    Ok(serde_wasm_bindgen::from_value(value)?)
}

/// Main entry point for the graph.
///
/// This struct wraps the internal ObservableGraph and provides the public
/// API exposed to JavaScript. Single-entity mutations generate immediately so
/// observers stay in sync without an explicit `generate()` call.
#[wasm_bindgen]
pub struct TopologyGraphWasm {
    graph: ObservableGraph,
}

#[wasm_bindgen]
impl TopologyGraphWasm {
    /// Create a new empty graph.
    ///
    /// `config` is an optional partial `GraphConfig` object, e.g.
    /// `{ identityKey: "id", dataProcessor: "force" }`.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<TopologyGraphWasm, JsError> {
        let config: GraphConfig = if config.is_undefined() || config.is_null() {
            GraphConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)?
        };
        Ok(Self {
            graph: ObservableGraph::new(config),
        })
    }

    // =========================================================================
    // Batch Operations
    // =========================================================================

    /// Replace the graph with `{ nodes, links, nodeSet }`.
    ///
    /// Returns `{ vertices, edges, vertexSets, rejected }`.
    #[wasm_bindgen(js_name = setData)]
    pub fn set_data(&mut self, data: JsValue) -> Result<JsValue, JsError> {
        let data: GraphData = serde_wasm_bindgen::from_value(data)?;
        to_js(&IngestSummary::from(self.graph.set_data(data)))
    }

    /// Append `{ nodes, links, nodeSet }` to the graph.
    #[wasm_bindgen(js_name = insertData)]
    pub fn insert_data(&mut self, data: JsValue) -> Result<JsValue, JsError> {
        let data: GraphData = serde_wasm_bindgen::from_value(data)?;
        to_js(&IngestSummary::from(self.graph.insert_data(data)))
    }

    /// Export the current graph in the ingest shape.
    #[wasm_bindgen(js_name = getData)]
    pub fn get_data(&self) -> Result<JsValue, JsError> {
        to_js(&self.graph.get_data())
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.graph.clear();
    }

    /// Run a generation pass explicitly.
    pub fn generate(&mut self) {
        self.graph.generate();
    }

    // =========================================================================
    // Entity Operations
    // =========================================================================

    /// Add a vertex record. Returns its id.
    #[wasm_bindgen(js_name = addVertex)]
    pub fn add_vertex(&mut self, vertex: JsValue) -> Result<JsValue, JsError> {
        let id = self.graph.add_vertex(record(vertex)?, true)?;
        to_js(&id)
    }

    /// Add a link record. Returns the edge id.
    #[wasm_bindgen(js_name = addEdge)]
    pub fn add_edge(&mut self, link: JsValue) -> Result<JsValue, JsError> {
        let id = self.graph.add_edge(record(link)?, true)?;
        to_js(&id)
    }

    /// Add a node-set record. Returns the vertex set id.
    #[wasm_bindgen(js_name = addVertexSet)]
    pub fn add_vertex_set(&mut self, set: JsValue) -> Result<JsValue, JsError> {
        let id = self.graph.add_vertex_set(record(set)?, true)?;
        to_js(&id)
    }

    /// Remove a vertex and its edges. Returns false if it did not exist.
    #[wasm_bindgen(js_name = removeVertex)]
    pub fn remove_vertex(&mut self, id: JsValue) -> Result<bool, JsError> {
        Ok(self.graph.remove_vertex(&entity_id(&id)?, true))
    }

    /// Remove an edge. Returns false if it did not exist.
    #[wasm_bindgen(js_name = removeEdge)]
    pub fn remove_edge(&mut self, id: JsValue) -> Result<bool, JsError> {
        Ok(self.graph.remove_edge(&entity_id(&id)?, true))
    }

    /// Remove a vertex set, keeping its members. Returns false if it did not
    /// exist.
    #[wasm_bindgen(js_name = removeVertexSet)]
    pub fn remove_vertex_set(&mut self, id: JsValue) -> Result<bool, JsError> {
        Ok(self.graph.remove_vertex_set(&entity_id(&id)?, true))
    }

    /// Collapse or expand a vertex set and generate.
    ///
    /// Returns false when the set already was in that state.
    #[wasm_bindgen(js_name = setVertexSetCollapsed)]
    pub fn set_vertex_set_collapsed(&mut self, id: JsValue, collapsed: bool) -> Result<bool, JsError> {
        let id = entity_id(&id)?;
        if self.graph.get_vertex_set(&id).is_none() {
            return Err(GraphError::UnknownVertexSet(id).into());
        }
        let changed = self.graph.set_vertex_set_activated(&id, collapsed);
        self.graph.generate();
        Ok(changed)
    }

    /// Move a vertex or vertex set and generate.
    #[wasm_bindgen(js_name = setVertexPosition)]
    pub fn set_vertex_position(&mut self, id: JsValue, x: f64, y: f64) -> Result<bool, JsError> {
        let id = entity_id(&id)?;
        if self.graph.get_vertex(&id).is_none() && self.graph.get_vertex_set(&id).is_none() {
            return Err(GraphError::UnknownVertex(id).into());
        }
        let moved = self.graph.set_vertex_position(&id, x, y);
        self.graph.generate();
        Ok(moved)
    }

    /// Number of vertices.
    #[wasm_bindgen(js_name = vertexCount)]
    pub fn vertex_count(&self) -> usize {
        self.graph.vertex_count()
    }

    /// Number of edges.
    #[wasm_bindgen(js_name = edgeCount)]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Call `callback` with every graph event (`{ type, ... }`).
    ///
    /// Returns a handle for `offEvent`.
    #[wasm_bindgen(js_name = onEvent)]
    pub fn on_event(&mut self, callback: Function) -> u32 {
        let ObserverId(id) = self.graph.subscribe(move |event| {
            let value = match to_js(event) {
                Ok(value) => value,
                Err(_) => {
                    log::warn!("failed to serialize {} event", event.name());
                    return;
                }
            };
            if let Err(err) = callback.call1(&JsValue::NULL, &value) {
                log::warn!("event callback threw: {:?}", err);
            }
        });
        id
    }

    /// Stop delivering events to a callback registered with `onEvent`.
    #[wasm_bindgen(js_name = offEvent)]
    pub fn off_event(&mut self, handle: u32) -> bool {
        self.graph.unsubscribe(ObserverId(handle))
    }

    // =========================================================================
    // Spatial Queries
    // =========================================================================

    /// Find the nearest rendered vertex or collapsed vertex set within
    /// `max_distance`. Returns its id, or undefined.
    #[wasm_bindgen(js_name = findNearestVertex)]
    pub fn find_nearest_vertex(&self, x: f64, y: f64, max_distance: f64) -> Result<JsValue, JsError> {
        match self.graph.find_nearest_vertex(x, y, max_distance) {
            Some(id) => to_js(&id),
            None => Ok(JsValue::UNDEFINED),
        }
    }

    /// Ids of rendered vertices and collapsed vertex sets inside a rectangle.
    #[wasm_bindgen(js_name = findVerticesInRect)]
    pub fn find_vertices_in_rect(
        &self,
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    ) -> Result<JsValue, JsError> {
        to_js(&self.graph.vertices_in_rect(min_x, min_y, max_x, max_y))
    }

    /// Bounds `{ x, y, width, height }` of everything rendered.
    #[wasm_bindgen(js_name = getBounds)]
    pub fn get_bounds(&self) -> Result<JsValue, JsError> {
        to_js(&self.graph.bounding_box(None))
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::graph::GraphEvent;
    use serde_json::{Value, json};
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Ingest with a layout processor, collapse a group, and check what a
    /// renderer subscribed to the graph would have been told.
    #[test]
    fn test_ingest_layout_collapse_pipeline() {
        let mut graph = ObservableGraph::new(GraphConfig {
            identity_key: Some("id".to_string()),
            data_processor: Some("force".to_string()),
            ..GraphConfig::default()
        });

        let events: Rc<RefCell<Vec<Value>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        graph.subscribe(move |event: &GraphEvent| {
            sink.borrow_mut().push(serde_json::to_value(event).unwrap());
        });

        let data: GraphData = serde_json::from_value(json!({
            "nodes": [{"id": "a"}, {"id": "b"}, {"id": "c"}, {"id": "d"}],
            "links": [
                {"source": "a", "target": "b"},
                {"source": "b", "target": "c"},
                {"source": "c", "target": "d"},
                {"source": "d", "target": "a"}
            ],
            "nodeSet": [{"id": "left", "nodes": ["a", "b"]}]
        }))
        .unwrap();
        let report = graph.set_data(data);
        assert!(report.is_complete());

        let added: Vec<Value> = events
            .borrow()
            .iter()
            .filter(|e| e["type"] == "addVertex")
            .cloned()
            .collect();
        assert_eq!(added.len(), 4);
        for event in &added {
            let (x, y) = (event["x"].as_f64().unwrap(), event["y"].as_f64().unwrap());
            assert!(x.is_finite() && y.is_finite());
        }

        events.borrow_mut().clear();
        assert!(graph.set_vertex_set_activated(&EntityId::from("left"), true));
        graph.generate();

        let types: Vec<String> = events
            .borrow()
            .iter()
            .map(|e| e["type"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(types.first().map(String::as_str), Some("startGenerate"));
        assert_eq!(types.last().map(String::as_str), Some("endGenerate"));
        assert_eq!(types.iter().filter(|t| *t == "addEdgeSetCollection").count(), 2);

        let collection = events
            .borrow()
            .iter()
            .find(|e| e["type"] == "addEdgeSetCollection" && e["linkKey"] == "c_left")
            .cloned()
            .unwrap();
        assert_eq!(collection["size"], 1);
        assert_eq!(collection["source"], "c");
        assert_eq!(collection["target"], "left");

        let bounds = graph.bounding_box(None);
        let left = graph.get_vertex_set(&EntityId::from("left")).unwrap().position;
        assert!(left.x >= bounds.x && left.x <= bounds.x + bounds.width);
    }

    #[test]
    fn test_ingest_summary_lists_rejections() {
        let mut graph = ObservableGraph::new(GraphConfig {
            identity_key: Some("id".to_string()),
            ..GraphConfig::default()
        });
        let data: GraphData = serde_json::from_value(json!({
            "nodes": [{"id": 1}],
            "links": [{"source": 1, "target": 2}]
        }))
        .unwrap();

        let summary = IngestSummary::from(graph.set_data(data));
        assert_eq!(summary.vertices, 1);
        assert_eq!(summary.edges, 0);
        assert_eq!(summary.rejected, vec!["edge 1 -> 2 references unknown endpoint 2"]);

        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["vertexSets"], 0);
    }

    #[test]
    fn test_export_survives_json_text() {
        let mut graph = ObservableGraph::new(GraphConfig {
            identity_key: Some("name".to_string()),
            ..GraphConfig::default()
        });
        let text = r#"{
            "nodes": [{"name": "x", "x": 1, "y": 2}, {"name": "y", "x": 3, "y": 4}],
            "links": [{"source": "x", "target": "y", "kind": "uses"}],
            "nodeSet": [{"name": "both", "nodes": ["x", "y"], "activated": true}]
        }"#;
        graph.set_data(serde_json::from_str(text).unwrap());

        let exported = serde_json::to_string(&graph.get_data()).unwrap();
        let mut copy = ObservableGraph::new(graph.config().clone());
        copy.set_data(serde_json::from_str(&exported).unwrap());

        assert_eq!(copy.get_data(), graph.get_data());
        assert_eq!(copy.collection_count(), 0);
        assert_eq!(copy.visible_vertices().len(), 0);
        assert_eq!(copy.find_nearest_vertex(2.0, 3.0, 1.0), Some(EntityId::from("both")));
    }
}
