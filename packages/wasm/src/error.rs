//! Error types for graph ingestion and mutation.
//!
//! None of these errors is fatal to the graph: a rejected record is logged
//! and skipped while the rest of a batch is still applied. Batch operations
//! collect them in an [`IngestReport`] so that a partial ingest stays
//! observable to the caller.

use thiserror::Error;

use crate::graph::EntityId;

/// A specialized `Result` type for graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Reasons a record or mutation was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// The record has no value under the configured identity key.
    #[error("record is missing identity field `{0}`")]
    MissingIdentity(String),

    /// Another entity already uses this id.
    #[error("duplicate id {0}")]
    DuplicateId(EntityId),

    /// A link record has no usable `source` or `target`.
    #[error("link record is missing `{0}`")]
    MissingEndpoint(&'static str),

    /// An edge references an id that is neither a vertex nor a vertex set.
    #[error("edge {source_id} -> {target_id} references unknown endpoint {missing}")]
    UnknownEndpoint {
        /// Source id as written in the record.
        source_id: EntityId,
        /// Target id as written in the record.
        target_id: EntityId,
        /// The id that could not be resolved.
        missing: EntityId,
    },

    /// No vertex with this id.
    #[error("unknown vertex {0}")]
    UnknownVertex(EntityId),

    /// No vertex set with this id.
    #[error("unknown vertex set {0}")]
    UnknownVertexSet(EntityId),

    /// A vertex set lists a member that does not exist.
    #[error("vertex set {set} references unknown member {member}")]
    UnknownMember {
        /// The vertex set.
        set: EntityId,
        /// The missing member id.
        member: EntityId,
    },

    /// The member is already owned by another vertex set.
    #[error("{member} already belongs to vertex set {parent}")]
    MemberAlreadyGrouped {
        /// The member id.
        member: EntityId,
        /// Its current vertex set.
        parent: EntityId,
    },

    /// The membership would make a vertex set contain itself.
    #[error("adding {member} to vertex set {set} would create a cycle")]
    GroupCycle {
        /// The vertex set.
        set: EntityId,
        /// The member id.
        member: EntityId,
    },

    /// No data processor is registered under this name.
    #[error("unknown data processor `{0}`")]
    UnknownProcessor(String),
}

/// Outcome of a batch ingest (`set_data` / `insert_data`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    /// Vertices created.
    pub vertices: usize,
    /// Edges created.
    pub edges: usize,
    /// Vertex sets created.
    pub vertex_sets: usize,
    /// Records (or vertex-set members) that were skipped.
    pub rejected: Vec<GraphError>,
}

impl IngestReport {
    /// True if nothing was skipped.
    pub fn is_complete(&self) -> bool {
        self.rejected.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphError::UnknownEndpoint {
            source_id: EntityId::from(1),
            target_id: EntityId::from("x"),
            missing: EntityId::from("x"),
        };
        let text = err.to_string();
        assert!(text.contains("1 -> x"));
        assert!(text.contains("unknown endpoint x"));
    }

    #[test]
    fn test_report_completeness() {
        let mut report = IngestReport::default();
        assert!(report.is_complete());
        report.rejected.push(GraphError::DuplicateId(EntityId::from(0)));
        assert!(!report.is_complete());
    }
}
