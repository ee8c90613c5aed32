//! Force-directed layout.
//!
//! Two simulators share the [`ForceSimulator`] interface: an energy-threshold
//! Euler integrator ([`ThresholdForce`]) and a velocity/friction integrator
//! with a cooling `alpha` ([`VelocityForce`]). Both work on a flat snapshot
//! of positions and index-based links, rebuild a Barnes-Hut quadtree every
//! tick, and leave `fixed` nodes where they are.
//!
//! Callers driving an animation call [`ForceSimulator::tick`] once per frame
//! and stop when [`ForceSimulator::converged`] returns true. The named data
//! processors in [`processor`] wrap the simulators for one-shot layout at
//! ingest time.

mod force;
pub mod processor;
mod velocity;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::ForceConfig;
use crate::geometry::Vector;

pub use force::ThresholdForce;
pub use processor::{DataProcessor, ProcessorRegistry};
pub use velocity::VelocityForce;

/// A node as seen by a simulator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutNode {
    /// Current position.
    pub position: Vector,
    /// Pinned nodes are never moved.
    pub fixed: bool,
    /// False when the position is a placeholder that a processor should
    /// replace before simulating.
    pub placed: bool,
}

impl LayoutNode {
    /// A free node at `(x, y)`.
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            position: Vector::new(x, y),
            fixed: false,
            placed: true,
        }
    }

    /// A free node with no meaningful position yet.
    pub fn unplaced() -> Self {
        Self {
            position: Vector::ZERO,
            fixed: false,
            placed: false,
        }
    }

    /// A pinned node at `(x, y)`.
    pub fn pinned(x: f64, y: f64) -> Self {
        Self {
            position: Vector::new(x, y),
            fixed: true,
            placed: true,
        }
    }
}

/// A spring between two nodes, by index into the node slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutLink {
    pub source: usize,
    pub target: usize,
}

impl LayoutLink {
    pub fn new(source: usize, target: usize) -> Self {
        Self { source, target }
    }
}

/// Movement measured over one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickStats {
    /// Sum of per-node `|dx| + |dy|`.
    pub total_energy: f64,
    /// Largest per-node `|dx| + |dy|`.
    pub max_energy: f64,
}

impl TickStats {
    fn record(&mut self, step: Vector) {
        let energy = step.x.abs() + step.y.abs();
        self.total_energy += energy;
        self.max_energy = self.max_energy.max(energy);
    }
}

/// Common interface of the force simulators.
pub trait ForceSimulator {
    /// Replace the simulation parameters. Takes effect on the next tick.
    fn configure(&mut self, config: ForceConfig);

    /// Replace the nodes and links being simulated. Links whose endpoints
    /// are out of range are dropped.
    fn load(&mut self, nodes: Vec<LayoutNode>, links: Vec<LayoutLink>);

    /// Advance the simulation one step.
    fn tick(&mut self) -> TickStats;

    /// True once further ticks would not move the layout meaningfully.
    fn converged(&self) -> bool;

    /// Current node positions, in load order.
    fn nodes(&self) -> &[LayoutNode];

    /// Tick until converged or `max_ticks` is reached. Returns the number of
    /// ticks run.
    fn run_to_convergence(&mut self, max_ticks: usize) -> usize {
        let mut ticks = 0;
        while ticks < max_ticks && !self.converged() {
            self.tick();
            ticks += 1;
        }
        ticks
    }

    /// Run exactly `ticks` steps, ignoring convergence.
    fn run_ticks(&mut self, ticks: usize) {
        for _ in 0..ticks {
            self.tick();
        }
    }
}

/// State shared by both simulators: the loaded graph, link degrees and the
/// seeded random source used for jitter.
struct Simulation {
    config: ForceConfig,
    nodes: Vec<LayoutNode>,
    links: Vec<LayoutLink>,
    degrees: Vec<usize>,
    rng: StdRng,
}

impl Simulation {
    fn new(config: ForceConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            nodes: Vec::new(),
            links: Vec::new(),
            degrees: Vec::new(),
            rng,
        }
    }

    fn configure(&mut self, config: ForceConfig) {
        if config.seed != self.config.seed {
            self.rng = StdRng::seed_from_u64(config.seed);
        }
        self.config = config;
    }

    fn load(&mut self, nodes: Vec<LayoutNode>, links: Vec<LayoutLink>) {
        let count = nodes.len();
        let links: Vec<LayoutLink> = links
            .into_iter()
            .filter(|link| {
                let in_range = link.source < count && link.target < count;
                if !in_range {
                    log::warn!(
                        "dropping layout link {} -> {}: only {} nodes",
                        link.source,
                        link.target,
                        count
                    );
                }
                in_range && link.source != link.target
            })
            .collect();

        let mut degrees = vec![0; count];
        for link in &links {
            degrees[link.source] += 1;
            degrees[link.target] += 1;
        }

        self.nodes = nodes;
        self.links = links;
        self.degrees = degrees;
    }

    /// A small random kick in `[-0.5, 0.5)` on both axes.
    fn jitter(rng: &mut StdRng) -> Vector {
        Vector::new(rng.random::<f64>() - 0.5, rng.random::<f64>() - 0.5)
    }

    /// Sum spring, gravity and repulsion displacements for every node.
    fn forces(&mut self) -> Vec<Vector> {
        let count = self.nodes.len();
        let mut forces = vec![Vector::ZERO; count];
        if count == 0 {
            return forces;
        }
        let config = &self.config;

        for link in &self.links {
            let (s, t) = (link.source, link.target);
            let mut d = self.nodes[t].position - self.nodes[s].position;
            if d.length_sq() == 0.0 {
                d = Self::jitter(&mut self.rng);
            }
            let length = d.length();
            if length == 0.0 {
                continue;
            }
            let pull = d * (config.link_strength * (length - config.link_distance) / length);

            let (deg_s, deg_t) = (self.degrees[s] as f64, self.degrees[t] as f64);
            let bias = deg_s / (deg_s + deg_t);
            forces[t] = forces[t] - pull * bias;
            forces[s] = forces[s] + pull * (1.0 - bias);
        }

        let center = Vector::new(config.width / 2.0, config.height / 2.0);
        for (i, node) in self.nodes.iter().enumerate() {
            forces[i] = forces[i] + (center - node.position) * config.gravity;
        }

        if config.charge != 0.0 && count > 1 {
            let positions: Vec<Vector> = self.nodes.iter().map(|n| n.position).collect();
            let tree = crate::spatial::QuadTree::build(&positions, config.charge);
            let rng = &mut self.rng;
            for (i, force) in forces.iter_mut().enumerate() {
                if self.nodes[i].fixed {
                    continue;
                }
                let push = tree.repulsion(i, config.theta, || Self::jitter(rng));
                if push.x.is_finite() && push.y.is_finite() {
                    *force = *force + push;
                } else {
                    *force = *force + Self::jitter(rng);
                }
            }
        }

        forces
    }
}

/// Clamp a displacement to `max_step` length.
fn clamp_step(step: Vector, max_step: f64) -> Vector {
    let length = step.length();
    if length > max_step && length > 0.0 {
        step * (max_step / length)
    } else {
        step
    }
}
