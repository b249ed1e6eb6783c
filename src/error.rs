use thiserror::Error;

/// Failures reported by a [`crate::layout::LayoutSolver`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    #[error("edge {edge} references unknown endpoint {endpoint} in container {container}")]
    UnknownEndpoint {
        edge: String,
        endpoint: String,
        container: String,
    },
    #[error("duplicate element id {0} in solver input")]
    DuplicateId(String),
    #[error("element {id} has invalid size {width}x{height}")]
    InvalidSize { id: String, width: f64, height: f64 },
    #[error("solver failed: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    #[error("layout solver failed: {0}")]
    Solver(#[from] SolverError),
}

/// Reasons an interchange payload is refused.
#[derive(Debug, Error)]
pub enum ContractError {
    #[error("payload is not valid for the contract: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload nesting exceeds {limit} levels")]
    TooDeep { limit: usize },
    #[error("explicit null at {path}; absent optional fields must be omitted")]
    ExplicitNull { path: String },
    #[error("map {field} has integer-like keys but no {field}Order list")]
    AmbiguousKeyOrder { field: String },
    #[error("order list for {field} does not match its keys")]
    OrderMismatch { field: String },
    #[error("payload shape is invalid at {path}: {reason}")]
    Shape { path: String, reason: String },
}
