//! Energy-threshold force simulator.
//!
//! Each tick applies the summed spring, gravity and repulsion displacement
//! directly to every free node (explicit Euler, unit step), clamped to
//! `max_step`. The layout counts as settled once no node moved more than
//! `5 * threshold` and the average movement dropped below `threshold`.

use super::{ForceSimulator, LayoutLink, LayoutNode, Simulation, TickStats, clamp_step};
use crate::config::ForceConfig;

/// Euler integrator that stops on an energy threshold.
pub struct ThresholdForce {
    sim: Simulation,
    last: Option<TickStats>,
    ticks: usize,
}

impl ThresholdForce {
    pub fn new(config: ForceConfig) -> Self {
        Self {
            sim: Simulation::new(config),
            last: None,
            ticks: 0,
        }
    }

    /// Stats of the most recent tick.
    pub fn last_stats(&self) -> Option<TickStats> {
        self.last
    }

    /// Ticks run since the last `load`.
    pub fn ticks(&self) -> usize {
        self.ticks
    }
}

impl Default for ThresholdForce {
    fn default() -> Self {
        Self::new(ForceConfig::default())
    }
}

impl ForceSimulator for ThresholdForce {
    fn configure(&mut self, config: ForceConfig) {
        self.sim.configure(config);
    }

    fn load(&mut self, nodes: Vec<LayoutNode>, links: Vec<LayoutLink>) {
        self.sim.load(nodes, links);
        self.last = None;
        self.ticks = 0;
    }

    fn tick(&mut self) -> TickStats {
        let forces = self.sim.forces();
        let max_step = self.sim.config.max_step;

        let mut stats = TickStats::default();
        for (node, force) in self.sim.nodes.iter_mut().zip(forces) {
            if node.fixed {
                continue;
            }
            let step = clamp_step(force, max_step);
            node.position = node.position + step;
            stats.record(step);
        }

        self.ticks += 1;
        self.last = Some(stats);
        stats
    }

    fn converged(&self) -> bool {
        if self.sim.nodes.iter().all(|node| node.fixed) {
            return true;
        }
        let threshold = self.sim.config.threshold;
        let count = self.sim.nodes.len() as f64;
        self.last.is_some_and(|stats| {
            stats.max_energy < 5.0 * threshold && stats.total_energy < threshold * count
        })
    }

    fn nodes(&self) -> &[LayoutNode] {
        &self.sim.nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// A connected random graph: a random spanning tree plus a few extra
    /// links, nodes scattered over the canvas.
    fn random_graph(count: usize, seed: u64) -> (Vec<LayoutNode>, Vec<LayoutLink>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let nodes = (0..count)
            .map(|_| LayoutNode::new(rng.random::<f64>() * 800.0, rng.random::<f64>() * 800.0))
            .collect();
        let mut links: Vec<LayoutLink> = (1..count)
            .map(|i| LayoutLink::new(rng.random_range(0..i), i))
            .collect();
        for _ in 0..count / 5 {
            let a = rng.random_range(0..count);
            let b = rng.random_range(0..count);
            if a != b {
                links.push(LayoutLink::new(a, b));
            }
        }
        (nodes, links)
    }

    #[test]
    fn test_converges_for_small_graphs() {
        for (count, seed) in [(2, 1), (10, 2), (30, 3), (50, 4)] {
            let (nodes, links) = random_graph(count, seed);
            let mut force = ThresholdForce::default();
            force.load(nodes, links);

            let ticks = force.run_to_convergence(2000);
            assert!(force.converged(), "{count} nodes did not converge in {ticks} ticks");
            let stats = force.last_stats().unwrap();
            assert!(stats.max_energy < 10.0);
            assert!(force.nodes().iter().all(|n| n.position.x.is_finite() && n.position.y.is_finite()));
        }
    }

    #[test]
    fn test_fixed_nodes_do_not_move() {
        let mut force = ThresholdForce::default();
        force.load(
            vec![LayoutNode::pinned(10.0, 10.0), LayoutNode::new(20.0, 10.0)],
            vec![LayoutLink::new(0, 1)],
        );
        force.run_ticks(20);
        assert_eq!(force.nodes()[0].position.x, 10.0);
        assert_eq!(force.nodes()[0].position.y, 10.0);
        assert_ne!(force.nodes()[1].position.x, 20.0);
    }

    #[test]
    fn test_coincident_nodes_separate() {
        let mut force = ThresholdForce::default();
        force.load(
            vec![LayoutNode::new(400.0, 400.0), LayoutNode::new(400.0, 400.0)],
            vec![LayoutLink::new(0, 1)],
        );
        force.tick();
        let [a, b] = [force.nodes()[0].position, force.nodes()[1].position];
        assert!(a.distance(b) > 0.0);
    }

    #[test]
    fn test_empty_and_all_fixed_are_converged() {
        let mut force = ThresholdForce::default();
        assert!(force.converged());
        force.load(vec![LayoutNode::pinned(0.0, 0.0)], Vec::new());
        assert!(force.converged());
        assert_eq!(force.run_to_convergence(10), 0);
    }

    #[test]
    fn test_step_clamped() {
        let config = ForceConfig {
            max_step: 5.0,
            ..ForceConfig::default()
        };
        let mut force = ThresholdForce::new(config);
        force.load(
            vec![LayoutNode::new(0.0, 0.0), LayoutNode::new(5000.0, 0.0)],
            vec![LayoutLink::new(0, 1)],
        );
        let stats = force.tick();
        // |dx| + |dy| of a step of length 5 is at most 5 * sqrt(2).
        assert!(stats.max_energy <= 5.0 * 2f64.sqrt() + 1e-9);
    }
}
