//! Velocity/friction force simulator.
//!
//! Forces are scaled by a cooling factor `alpha` and accumulated into a
//! per-node velocity that loses `1 - friction` of its magnitude every tick.
//! `alpha` starts at 0.1 and decays by 1% per tick; the simulation is done
//! once it drops below 0.005, which bounds the run at roughly 300 ticks
//! regardless of graph size.

use super::{ForceSimulator, LayoutLink, LayoutNode, Simulation, TickStats, clamp_step};
use crate::config::ForceConfig;
use crate::geometry::Vector;

const ALPHA_START: f64 = 0.1;
const ALPHA_DECAY: f64 = 0.99;
const ALPHA_MIN: f64 = 0.005;

/// Integrator with velocity, friction and a cooling schedule.
pub struct VelocityForce {
    sim: Simulation,
    velocities: Vec<Vector>,
    alpha: f64,
}

impl VelocityForce {
    pub fn new(config: ForceConfig) -> Self {
        Self {
            sim: Simulation::new(config),
            velocities: Vec::new(),
            alpha: ALPHA_START,
        }
    }

    /// Current cooling factor.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Restart the cooling schedule, e.g. after the caller dragged a node.
    pub fn reheat(&mut self) {
        self.alpha = ALPHA_START;
    }
}

impl Default for VelocityForce {
    fn default() -> Self {
        Self::new(ForceConfig::default())
    }
}

impl ForceSimulator for VelocityForce {
    fn configure(&mut self, config: ForceConfig) {
        self.sim.configure(config);
    }

    fn load(&mut self, nodes: Vec<LayoutNode>, links: Vec<LayoutLink>) {
        self.velocities = vec![Vector::ZERO; nodes.len()];
        self.sim.load(nodes, links);
        self.alpha = ALPHA_START;
    }

    fn tick(&mut self) -> TickStats {
        let mut stats = TickStats::default();
        if self.converged() {
            return stats;
        }

        let forces = self.sim.forces();
        let friction = self.sim.config.friction;
        let max_step = self.sim.config.max_step;
        let alpha = self.alpha;

        for ((node, velocity), force) in self
            .sim
            .nodes
            .iter_mut()
            .zip(self.velocities.iter_mut())
            .zip(forces)
        {
            if node.fixed {
                *velocity = Vector::ZERO;
                continue;
            }
            *velocity = (*velocity + force * alpha) * friction;
            let step = clamp_step(*velocity, max_step);
            node.position = node.position + step;
            stats.record(step);
        }

        self.alpha *= ALPHA_DECAY;
        stats
    }

    fn converged(&self) -> bool {
        self.alpha < ALPHA_MIN
    }

    fn nodes(&self) -> &[LayoutNode] {
        &self.sim.nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alpha_schedule_ends() {
        let mut force = VelocityForce::default();
        force.load(
            vec![LayoutNode::new(100.0, 100.0), LayoutNode::new(700.0, 700.0)],
            vec![LayoutLink::new(0, 1)],
        );

        let ticks = force.run_to_convergence(10_000);
        // 0.1 * 0.99^n < 0.005  <=>  n > ln(0.05) / ln(0.99) ~= 298.1
        assert_eq!(ticks, 299);
        assert!(force.converged());
        assert!(force.alpha() < ALPHA_MIN);

        let idle = force.tick();
        assert_eq!(idle, TickStats::default());

        force.reheat();
        assert!(!force.converged());
    }

    #[test]
    fn test_linked_nodes_approach_rest_length() {
        let config = ForceConfig {
            charge: 0.0,
            gravity: 0.0,
            ..ForceConfig::default()
        };
        let mut force = VelocityForce::new(config);
        force.load(
            vec![LayoutNode::new(0.0, 0.0), LayoutNode::new(600.0, 0.0)],
            vec![LayoutLink::new(0, 1)],
        );
        force.run_to_convergence(1000);

        let [a, b] = [force.nodes()[0].position, force.nodes()[1].position];
        assert!(a.distance(b) < 300.0);
    }

    #[test]
    fn test_fixed_node_has_no_velocity() {
        let mut force = VelocityForce::default();
        force.load(
            vec![LayoutNode::pinned(0.0, 0.0), LayoutNode::new(10.0, 0.0)],
            vec![LayoutLink::new(0, 1)],
        );
        force.run_ticks(5);
        assert_eq!(force.nodes()[0].position, Vector::new(0.0, 0.0));
    }
}
