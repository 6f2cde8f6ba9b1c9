//! Error types for the knowledge graph engine

use thiserror::Error;

/// Result type alias for graph engine operations
pub type Result<T> = std::result::Result<T, GraphError>;

/// Main error type for the graph engine
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Graph not found: {0}")]
    GraphNotFound(String),

    #[error("Node not found: {node_id} (graph {graph_id})")]
    NodeNotFound { graph_id: String, node_id: String },

    #[error("Link not found: {link_id} (graph {graph_id})")]
    LinkNotFound { graph_id: String, link_id: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl GraphError {
    /// True for the not-found class (graph, node or link missing).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            GraphError::GraphNotFound(_)
                | GraphError::NodeNotFound { .. }
                | GraphError::LinkNotFound { .. }
        )
    }

    /// True for the invalid-input class, including unsupported formats.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            GraphError::InvalidInput(_)
                | GraphError::UnsupportedFormat(_)
                | GraphError::Serialization(_)
        )
    }
}
