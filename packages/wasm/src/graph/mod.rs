//! Graph model with hierarchical grouping.
//!
//! [`ObservableGraph`] stores vertices, edges and vertex sets in a petgraph
//! `StableGraph` arena. Parallel edges between one vertex pair share an edge
//! set; collapsing a vertex set hides its members and routes their edge sets
//! through edge-set collections attached to the collapsed set. Observers
//! learn about every visible change through [`GraphEvent`]s fired by the
//! generation pass.

mod entity;
mod event;
mod id;
mod observable;
mod record;

pub use entity::{EdgeKind, EntityState, GraphEdge, GraphNode, GroupData, NodeKind};
pub use event::{EdgeEvent, GraphEvent, ObserverId, Observers, VertexEvent};
pub use id::{EntityId, PairKey, canonical_pair, directed_key, link_key, pair_key};
pub use observable::{Bounds, ObservableGraph};
pub use record::{GraphData, Record};
