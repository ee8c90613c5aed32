//! Spatial indexing.
//!
//! - `quadtree`: Barnes-Hut quadtree used by the force simulators to
//!   approximate n-body repulsion in O(n log n).
//! - `rtree`: R-tree over rendered vertices for O(log n) hit testing.

pub mod quadtree;
mod rtree;

pub use quadtree::{Influence, QuadNode, QuadTree};
pub use rtree::{NodePoint, SpatialIndex};
