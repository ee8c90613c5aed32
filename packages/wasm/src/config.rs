//! Graph and layout configuration.
//!
//! Both structs deserialize from partial objects (missing fields take their
//! defaults), so the JavaScript side can pass `{ dataProcessor: "force" }`
//! and nothing else.

use serde::{Deserialize, Serialize};

/// Parameters shared by both force simulators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ForceConfig {
    /// Repulsion strength. Positive values push nodes apart (default: 200.0).
    pub charge: f64,
    /// Rest length of a link (default: 100.0).
    pub link_distance: f64,
    /// Spring stiffness of a link (default: 0.1).
    pub link_strength: f64,
    /// Pull toward the canvas center (default: 0.02).
    pub gravity: f64,
    /// Barnes-Hut opening criterion; 0 disables approximation (default: 0.8).
    pub theta: f64,
    /// Velocity retained per tick by the velocity simulator (default: 0.9).
    pub friction: f64,
    /// Canvas width (default: 800.0).
    pub width: f64,
    /// Canvas height (default: 800.0).
    pub height: f64,
    /// Energy threshold of the threshold simulator (default: 2.0).
    pub threshold: f64,
    /// Largest displacement a node may take in one tick (default: 100.0).
    pub max_step: f64,
    /// Seed for initial placement and jitter (default: 1).
    pub seed: u64,
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self {
            charge: 200.0,
            link_distance: 100.0,
            link_strength: 0.1,
            gravity: 0.02,
            theta: 0.8,
            friction: 0.9,
            width: 800.0,
            height: 800.0,
            threshold: 2.0,
            max_step: 100.0,
            seed: 1,
        }
    }
}

/// Configuration of an [`ObservableGraph`](crate::graph::ObservableGraph).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GraphConfig {
    /// Record field holding the entity id. `None` uses positional indices
    /// for vertices and edges (default: None).
    pub identity_key: Option<String>,
    /// Name of the data processor run on `set_data` / `insert_data`
    /// (default: None).
    pub data_processor: Option<String>,
    /// Layout parameters handed to the data processors.
    pub force: ForceConfig,
    /// Above this many vertices the threshold simulator runs a fixed number
    /// of ticks instead of waiting for convergence (default: 50).
    pub large_graph_threshold: usize,
    /// Tick count used for large graphs (default: 900).
    pub large_graph_iterations: usize,
    /// Safety cap on ticks for small graphs (default: 2000).
    pub max_iterations: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            identity_key: None,
            data_processor: None,
            force: ForceConfig::default(),
            large_graph_threshold: 50,
            large_graph_iterations: 900,
            max_iterations: 2000,
        }
    }
}
