//! Barnes-Hut quadtree for n-body repulsion.
//!
//! The tree is rebuilt from scratch every simulation tick. Construction has
//! two phases:
//!
//! 1. **Insertion:** the bounding box of all points is forced square, then
//!    points are inserted one by one into a 4-ary tree whose child index is
//!    `(y >= cy) << 1 | (x >= cx)`. A cell holds at most one point; when a
//!    second point lands in an occupied leaf both are pushed down into child
//!    cells. Coincident points (distance < 0.01) are not merged: the resident
//!    point stays and the newcomer descends, so every point keeps its own
//!    slot.
//! 2. **Charge accumulation:** a bottom-up pass stores, per cell, the total
//!    charge and the charge-weighted centroid of everything below it.
//!
//! Queries walk the tree depth-first. A cell far enough away that
//! `cell_width / distance < theta` is treated as a single mass at its
//! centroid; otherwise its own points are visited exactly and the walk
//! descends into the children. `theta = 0` disables the approximation.

use crate::geometry::Vector;

/// Manhattan distance under which two points count as coincident.
const COINCIDENT_DISTANCE: f64 = 0.01;

/// Below this depth, coincident points stack in one leaf instead of
/// descending further.
const MAX_DEPTH: usize = 48;

/// A cell of the quadtree.
#[derive(Debug)]
pub struct QuadNode {
    /// Left edge of the cell.
    pub x0: f64,
    /// Top edge of the cell.
    pub y0: f64,
    /// Cell width (cells are square).
    pub size: f64,
    /// Indices of points stored directly in this cell. Usually zero or one;
    /// several only when coincident points hit the depth floor.
    pub points: Vec<usize>,
    /// `NW, NE, SW, SE` children.
    pub children: [Option<Box<QuadNode>>; 4],
    /// Total charge of this cell and its descendants.
    pub charge: f64,
    /// Charge-weighted centroid.
    pub center: Vector,
}

/// One contribution reported by [`QuadTree::for_each_node_affecting`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Influence {
    /// A far cell approximated as a single mass.
    Mass {
        /// Aggregate charge of the cell.
        charge: f64,
        /// Charge-weighted centroid of the cell.
        center: Vector,
    },
    /// An individual point visited exactly.
    Point {
        /// Index of the point in the build input.
        index: usize,
        /// Charge carried by the point.
        charge: f64,
        /// Position of the point.
        position: Vector,
    },
}

impl QuadNode {
    fn new(x0: f64, y0: f64, size: f64) -> Self {
        Self {
            x0,
            y0,
            size,
            points: Vec::new(),
            children: std::array::from_fn(|_| None),
            charge: 0.0,
            center: Vector::ZERO,
        }
    }

    /// True if the cell has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.iter().all(|child| child.is_none())
    }

    /// True if `p` lies inside the cell (edges included).
    pub fn contains(&self, p: Vector) -> bool {
        p.x >= self.x0 && p.x <= self.x0 + self.size && p.y >= self.y0 && p.y <= self.y0 + self.size
    }

    fn quadrant_for(&self, p: Vector) -> usize {
        let half = self.size * 0.5;
        let right = p.x >= self.x0 + half;
        let below = p.y >= self.y0 + half;
        ((below as usize) << 1) | right as usize
    }

    fn insert(&mut self, index: usize, positions: &[Vector], depth: usize) {
        if !self.is_leaf() {
            self.insert_child(index, positions, depth);
            return;
        }

        let Some(&resident) = self.points.first() else {
            self.points.push(index);
            return;
        };

        if depth >= MAX_DEPTH {
            self.points.push(index);
            return;
        }

        let p = positions[index];
        let q = positions[resident];
        if (p.x - q.x).abs() + (p.y - q.y).abs() < COINCIDENT_DISTANCE {
            self.insert_child(index, positions, depth);
        } else {
            let moved = std::mem::take(&mut self.points);
            for m in moved {
                self.insert_child(m, positions, depth);
            }
            self.insert_child(index, positions, depth);
        }
    }

    fn insert_child(&mut self, index: usize, positions: &[Vector], depth: usize) {
        let quadrant = self.quadrant_for(positions[index]);
        let half = self.size * 0.5;
        let x0 = self.x0 + if quadrant & 1 == 1 { half } else { 0.0 };
        let y0 = self.y0 + if quadrant & 2 == 2 { half } else { 0.0 };
        self.children[quadrant]
            .get_or_insert_with(|| Box::new(QuadNode::new(x0, y0, half)))
            .insert(index, positions, depth + 1);
    }

    fn accumulate_charge(&mut self, positions: &[Vector], point_charge: f64) {
        let mut charge = 0.0;
        let mut cx = 0.0;
        let mut cy = 0.0;

        for child in self.children.iter_mut().flatten() {
            child.accumulate_charge(positions, point_charge);
            charge += child.charge;
            cx += child.charge * child.center.x;
            cy += child.charge * child.center.y;
        }

        for &index in &self.points {
            let p = positions[index];
            charge += point_charge;
            cx += point_charge * p.x;
            cy += point_charge * p.y;
        }

        self.charge = charge;
        self.center = if charge != 0.0 {
            Vector::new(cx / charge, cy / charge)
        } else {
            let half = self.size * 0.5;
            Vector::new(self.x0 + half, self.y0 + half)
        };
    }

    fn visit<F: FnMut(&QuadNode) -> bool>(&self, f: &mut F) {
        if f(self) {
            for child in self.children.iter().flatten() {
                child.visit(f);
            }
        }
    }
}

/// Barnes-Hut quadtree over a point set with a constant per-point charge.
#[derive(Debug, Default)]
pub struct QuadTree {
    root: Option<QuadNode>,
    positions: Vec<Vector>,
    point_charge: f64,
}

impl QuadTree {
    /// Build the tree and accumulate charge.
    ///
    /// Non-finite points are left out of the tree but keep their index.
    pub fn build(points: &[Vector], point_charge: f64) -> Self {
        let positions = points.to_vec();
        let finite: Vec<usize> = (0..positions.len())
            .filter(|&i| positions[i].x.is_finite() && positions[i].y.is_finite())
            .collect();

        if finite.is_empty() {
            return Self {
                root: None,
                positions,
                point_charge,
            };
        }

        let mut x1 = f64::INFINITY;
        let mut y1 = f64::INFINITY;
        let mut x2 = f64::NEG_INFINITY;
        let mut y2 = f64::NEG_INFINITY;
        for &i in &finite {
            let p = positions[i];
            x1 = x1.min(p.x);
            y1 = y1.min(p.y);
            x2 = x2.max(p.x);
            y2 = y2.max(p.y);
        }

        // Extend the shorter axis so the root cell is square.
        let size = (x2 - x1).max(y2 - y1);

        let mut root = QuadNode::new(x1, y1, size);
        for &i in &finite {
            root.insert(i, &positions, 0);
        }
        root.accumulate_charge(&positions, point_charge);

        Self {
            root: Some(root),
            positions,
            point_charge,
        }
    }

    /// The root cell, if any point was inserted.
    pub fn root(&self) -> Option<&QuadNode> {
        self.root.as_ref()
    }

    /// Number of points given to [`QuadTree::build`].
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// True if the tree was built from no points.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Depth-first walk. The visitor returns `true` to descend into the
    /// children of the cell it was given.
    pub fn visit<F: FnMut(&QuadNode) -> bool>(&self, mut f: F) {
        if let Some(root) = &self.root {
            root.visit(&mut f);
        }
    }

    /// Report every mass affecting point `index` under the Barnes-Hut
    /// criterion. The point itself is never reported.
    pub fn for_each_node_affecting<F: FnMut(Influence)>(&self, index: usize, theta: f64, mut f: F) {
        let Some(&p) = self.positions.get(index) else {
            return;
        };
        let theta_sq = theta * theta;
        let point_charge = self.point_charge;
        let positions = &self.positions;

        self.visit(|node| {
            if node.is_leaf() {
                for &other in &node.points {
                    if other != index {
                        f(Influence::Point {
                            index: other,
                            charge: point_charge,
                            position: positions[other],
                        });
                    }
                }
                return false;
            }

            let dist_sq = (node.center - p).length_sq();
            if !node.contains(p) && dist_sq > 0.0 && node.size * node.size < theta_sq * dist_sq {
                f(Influence::Mass {
                    charge: node.charge,
                    center: node.center,
                });
                return false;
            }

            for &other in &node.points {
                if other != index {
                    f(Influence::Point {
                        index: other,
                        charge: point_charge,
                        position: positions[other],
                    });
                }
            }
            true
        });
    }

    /// Repulsive displacement on point `index`: `(p - q) * charge / |p - q|²`
    /// summed over every affecting mass. Exactly coincident points contribute
    /// `jitter()` instead.
    pub fn repulsion<J: FnMut() -> Vector>(&self, index: usize, theta: f64, mut jitter: J) -> Vector {
        let Some(&p) = self.positions.get(index) else {
            return Vector::ZERO;
        };
        let mut force = Vector::ZERO;
        self.for_each_node_affecting(index, theta, |influence| {
            let (charge, q) = match influence {
                Influence::Mass { charge, center } => (charge, center),
                Influence::Point {
                    charge, position, ..
                } => (charge, position),
            };
            let d = p - q;
            let dist_sq = d.length_sq();
            if dist_sq == 0.0 {
                force = force + jitter();
            } else {
                force = force + d * (charge / dist_sq);
            }
        });
        force
    }
}
