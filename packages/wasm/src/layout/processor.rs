//! Named pre-layout data processors.
//!
//! A processor assigns positions to a freshly ingested batch before the
//! generation pass announces it, so observers see final coordinates in the
//! add events. The graph looks processors up by the name configured in
//! [`GraphConfig::data_processor`].
//!
//! Built-in processors:
//!
//! | Name | Behaviour |
//! |------|-----------|
//! | `force` | [`ThresholdForce`]; run to convergence for small graphs, a fixed tick count above `large_graph_threshold` |
//! | `velocity` | [`VelocityForce`] until its cooling schedule ends |
//! | `quick` | Uniform random placement over the canvas |
//! | `circle` | Even spacing on a circle around the canvas center |
//! | `none` | Leaves positions untouched |

use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{ForceSimulator, LayoutLink, LayoutNode, ThresholdForce, VelocityForce};
use crate::config::GraphConfig;
use crate::error::{GraphError, Result};
use crate::geometry::Vector;

/// A named layout step run at ingest time.
pub trait DataProcessor {
    /// Update `nodes` in place. Fixed nodes must keep their position.
    fn process(&self, nodes: &mut [LayoutNode], links: &[LayoutLink], config: &GraphConfig);
}

/// Give every unplaced, free node a random position on the canvas.
fn scatter_unplaced(nodes: &mut [LayoutNode], config: &GraphConfig) {
    let mut rng = StdRng::seed_from_u64(config.force.seed);
    for node in nodes.iter_mut().filter(|n| !n.placed && !n.fixed) {
        node.position = Vector::new(
            rng.random::<f64>() * config.force.width,
            rng.random::<f64>() * config.force.height,
        );
        node.placed = true;
    }
}

fn write_back(nodes: &mut [LayoutNode], simulated: &[LayoutNode]) {
    for (node, result) in nodes.iter_mut().zip(simulated) {
        if !node.fixed {
            node.position = result.position;
        }
    }
}

/// Threshold simulator with the small/large graph split.
struct ForceProcessor;

impl DataProcessor for ForceProcessor {
    fn process(&self, nodes: &mut [LayoutNode], links: &[LayoutLink], config: &GraphConfig) {
        scatter_unplaced(nodes, config);

        let mut force = ThresholdForce::new(config.force.clone());
        force.load(nodes.to_vec(), links.to_vec());
        if nodes.len() > config.large_graph_threshold {
            force.run_ticks(config.large_graph_iterations);
        } else {
            let ticks = force.run_to_convergence(config.max_iterations);
            if !force.converged() {
                log::debug!("force layout stopped after {} ticks without converging", ticks);
            }
        }
        write_back(nodes, force.nodes());
    }
}

struct VelocityProcessor;

impl DataProcessor for VelocityProcessor {
    fn process(&self, nodes: &mut [LayoutNode], links: &[LayoutLink], config: &GraphConfig) {
        scatter_unplaced(nodes, config);

        let mut force = VelocityForce::new(config.force.clone());
        force.load(nodes.to_vec(), links.to_vec());
        force.run_to_convergence(config.max_iterations);
        write_back(nodes, force.nodes());
    }
}

struct QuickProcessor;

impl DataProcessor for QuickProcessor {
    fn process(&self, nodes: &mut [LayoutNode], _links: &[LayoutLink], config: &GraphConfig) {
        for node in nodes.iter_mut().filter(|n| !n.fixed) {
            node.placed = false;
        }
        scatter_unplaced(nodes, config);
    }
}

struct CircleProcessor;

impl DataProcessor for CircleProcessor {
    fn process(&self, nodes: &mut [LayoutNode], _links: &[LayoutLink], config: &GraphConfig) {
        let free = nodes.iter().filter(|n| !n.fixed).count();
        if free == 0 {
            return;
        }
        let center = Vector::new(config.force.width / 2.0, config.force.height / 2.0);
        let radius = config.force.width.min(config.force.height) * 0.4;
        let step = 360.0 / free as f64;

        for (slot, node) in nodes.iter_mut().filter(|n| !n.fixed).enumerate() {
            node.position = center + Vector::new(radius, 0.0).rotate(step * slot as f64);
            node.placed = true;
        }
    }
}

struct NoneProcessor;

impl DataProcessor for NoneProcessor {
    fn process(&self, _nodes: &mut [LayoutNode], _links: &[LayoutLink], _config: &GraphConfig) {}
}

/// Processors by name.
pub struct ProcessorRegistry {
    processors: IndexMap<String, Box<dyn DataProcessor>>,
}

impl ProcessorRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        Self {
            processors: IndexMap::new(),
        }
    }

    /// Register (or replace) a processor under `name`.
    pub fn register(&mut self, name: impl Into<String>, processor: Box<dyn DataProcessor>) {
        self.processors.insert(name.into(), processor);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.processors.contains_key(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.processors.keys().map(String::as_str)
    }

    /// Run the processor called `name`.
    pub fn run(
        &self,
        name: &str,
        nodes: &mut [LayoutNode],
        links: &[LayoutLink],
        config: &GraphConfig,
    ) -> Result<()> {
        let processor = self
            .processors
            .get(name)
            .ok_or_else(|| GraphError::UnknownProcessor(name.to_string()))?;
        processor.process(nodes, links, config);
        Ok(())
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("force", Box::new(ForceProcessor));
        registry.register("velocity", Box::new(VelocityProcessor));
        registry.register("quick", Box::new(QuickProcessor));
        registry.register("circle", Box::new(CircleProcessor));
        registry.register("none", Box::new(NoneProcessor));
        registry
    }
}
