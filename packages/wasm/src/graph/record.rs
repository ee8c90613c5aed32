//! Ingest and export records.
//!
//! Records are plain JSON objects so that caller fields survive a
//! `set_data` / `get_data` round trip untouched. Only a handful of fields are
//! interpreted: the identity key, `x`/`y`/`fixed` on nodes, `source`/`target`
//! on links, and `nodes`/`activated` on node sets.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::EntityId;
use crate::geometry::Vector;

/// A single node, link or node-set record.
pub type Record = Map<String, Value>;

/// The ingest shape `{ nodes, links, nodeSet? }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    /// Vertex records.
    #[serde(default)]
    pub nodes: Vec<Record>,
    /// Edge records.
    #[serde(default)]
    pub links: Vec<Record>,
    /// Vertex-set records.
    #[serde(default, rename = "nodeSet", skip_serializing_if = "Vec::is_empty")]
    pub node_set: Vec<Record>,
}

/// Field holding the id of node sets and links when no identity key is set.
pub(crate) const DEFAULT_ID_FIELD: &str = "id";

pub(crate) fn read_id(record: &Record, key: &str) -> Option<EntityId> {
    record.get(key).and_then(EntityId::from_value)
}

pub(crate) fn read_position(record: &Record) -> Option<Vector> {
    let x = record.get("x").and_then(Value::as_f64)?;
    let y = record.get("y").and_then(Value::as_f64)?;
    Some(Vector::new(x, y))
}

pub(crate) fn read_bool(record: &Record, key: &str) -> Option<bool> {
    record.get(key).and_then(Value::as_bool)
}

pub(crate) fn read_members(record: &Record) -> Vec<EntityId> {
    record
        .get("nodes")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(EntityId::from_value).collect())
        .unwrap_or_default()
}

pub(crate) fn write_position(record: &mut Record, position: Vector) {
    record.insert("x".to_string(), Value::from(position.x));
    record.insert("y".to_string(), Value::from(position.y));
}
