//! Error type for graph construction and persistence.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("unknown node type `{0}`")]
    UnknownNodeType(String),

    #[error("duplicate node id `{0}`")]
    DuplicateNodeId(String),

    #[error("missing connection endpoint `{node}.{property}`")]
    MissingEndpoint { node: String, property: String },

    #[error("input `{node}.{property}` already has a connection")]
    InputAlreadyConnected { node: String, property: String },

    #[error("node `{node}` has no property `{property}`")]
    UnknownProperty { node: String, property: String },

    #[error("cannot connect `{from}` to `{to}`: both ports have the same direction")]
    IncompatiblePorts { from: String, to: String },

    #[error("invalid graph document: {0}")]
    Json(#[from] serde_json::Error),
}
