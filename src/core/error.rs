//! Error types for Strata.
//!
//! Errors are layered the same way the pipeline is: wiring problems surface
//! as [`GraphError`] before anything runs, region negotiation problems as
//! [`RegionError`], and failures while generating data as
//! [`ExecutionError`]. [`StrataError`] aggregates them and classifies each
//! into an [`ErrorKind`] so callers can react without matching every variant.

use crate::core::data::DataKind;
use crate::core::region::Region;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a node in a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Create a new random node ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a node ID from a UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Unique identifier for a connection in a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Coarse classification of every error the crate produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Unknown slot, unbound required input or incompatible data kind.
    InvalidSlot,
    /// A requested region lies outside what the data can provide.
    RegionOutOfBounds,
    /// The pipeline graph contains or would contain a cycle.
    PipelineCycle,
    /// A buffer could not be allocated.
    AllocationFailure,
    /// A filter failed while generating data.
    ComputationFailure,
    /// The update was cancelled.
    Cancelled,
    /// A node, connection or filter id does not exist.
    NotFound,
    /// Invalid parameters, options or pipeline descriptions.
    Configuration,
}

/// Top-level error type for Strata.
#[derive(Error, Debug)]
pub enum StrataError {
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Region error: {0}")]
    Region(#[from] RegionError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors related to pipeline structure and wiring.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum GraphError {
    #[error("Node {0} not found")]
    NodeNotFound(NodeId),

    #[error("Connection {0} not found")]
    ConnectionNotFound(ConnectionId),

    #[error("Invalid slot '{slot}' on node {node_id}: {reason}")]
    InvalidSlot {
        node_id: NodeId,
        slot: String,
        reason: String,
    },

    #[error("Slot '{slot}' on node {node_id} expects {expected}, got {got}")]
    SlotTypeMismatch {
        node_id: NodeId,
        slot: String,
        expected: DataKind,
        got: DataKind,
    },

    #[error("Required input '{slot}' on node {node_id} is not bound")]
    MissingInput { node_id: NodeId, slot: String },

    #[error("Cycle detected in pipeline involving nodes: {nodes:?}")]
    CycleDetected { nodes: Vec<NodeId> },

    #[error("Unknown filter '{0}'")]
    UnknownFilter(String),

    #[error("Invalid parameter '{parameter}' on node {node_id}: {error}")]
    InvalidParameter {
        node_id: NodeId,
        parameter: String,
        error: String,
    },

    #[error("Invalid pipeline description: {0}")]
    InvalidDescription(String),
}

/// Errors from region negotiation and buffer bookkeeping.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RegionError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Buffer holds {got} elements but region needs {expected}")]
    BufferSizeMismatch { expected: usize, got: usize },

    #[error("Region of size {size} from index {index} overflows axis {axis}")]
    Overflow { axis: usize, index: i64, size: usize },

    #[error("Region {requested} on node {node_id} lies outside the largest possible region {largest}")]
    OutOfBounds {
        node_id: NodeId,
        requested: Region,
        largest: Region,
    },

    #[error("Input '{slot}' of node {node_id} does not buffer the requested region {requested}")]
    NotBuffered {
        node_id: NodeId,
        slot: String,
        requested: Region,
    },
}

/// Errors during pipeline execution.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Node {node_id} failed{}: {error}", region_suffix(.region))]
    ComputationFailure {
        node_id: NodeId,
        region: Option<Region>,
        error: String,
    },

    #[error("Allocation of output {output} on node {node_id} failed: {error}")]
    AllocationFailure {
        node_id: NodeId,
        output: usize,
        error: String,
    },

    #[error("Missing input '{slot}' for node {node_id}")]
    MissingInput { node_id: NodeId, slot: String },

    #[error("Missing parameter '{parameter}' for node {node_id}")]
    MissingParameter { node_id: NodeId, parameter: String },

    #[error("Invalid parameter '{parameter}' for node {node_id}: {error}")]
    InvalidParameter {
        node_id: NodeId,
        parameter: String,
        error: String,
    },

    #[error("Incompatible inputs on node {node_id}: {reason}")]
    IncompatibleInputs { node_id: NodeId, reason: String },

    #[error("Slot '{slot}' on node {node_id} does not hold {expected}")]
    WrongDataType {
        node_id: NodeId,
        slot: String,
        expected: String,
    },

    #[error("Output {output} was not set by node {node_id}")]
    OutputNotSet { node_id: NodeId, output: usize },

    #[error("Execution cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

fn region_suffix(region: &Option<Region>) -> String {
    match region {
        Some(region) => format!(" on region {}", region),
        None => String::new(),
    }
}

// ============================================================================
// Error Utilities
// ============================================================================

impl StrataError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StrataError::Graph(e) => e.kind(),
            StrataError::Region(e) => e.kind(),
            StrataError::Execution(e) => e.kind(),
            StrataError::Io(_)
            | StrataError::Serialization(_)
            | StrataError::Config(_)
            | StrataError::Other(_) => ErrorKind::Configuration,
        }
    }

    /// The node the error is attributed to, if any.
    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            StrataError::Graph(e) => e.node_id(),
            StrataError::Region(e) => e.node_id(),
            StrataError::Execution(e) => e.node_id(),
            _ => None,
        }
    }

    /// The region involved in the failure, if any.
    pub fn region(&self) -> Option<&Region> {
        match self {
            StrataError::Region(RegionError::OutOfBounds { requested, .. })
            | StrataError::Region(RegionError::NotBuffered { requested, .. }) => Some(requested),
            StrataError::Execution(ExecutionError::ComputationFailure { region, .. }) => {
                region.as_ref()
            }
            _ => None,
        }
    }
}

impl GraphError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GraphError::NodeNotFound(_)
            | GraphError::ConnectionNotFound(_)
            | GraphError::UnknownFilter(_) => ErrorKind::NotFound,
            GraphError::InvalidSlot { .. }
            | GraphError::SlotTypeMismatch { .. }
            | GraphError::MissingInput { .. } => ErrorKind::InvalidSlot,
            GraphError::CycleDetected { .. } => ErrorKind::PipelineCycle,
            GraphError::InvalidParameter { .. } | GraphError::InvalidDescription(_) => {
                ErrorKind::Configuration
            }
        }
    }

    /// Get the node ID that caused this error, if applicable.
    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            GraphError::NodeNotFound(node_id)
            | GraphError::InvalidSlot { node_id, .. }
            | GraphError::SlotTypeMismatch { node_id, .. }
            | GraphError::MissingInput { node_id, .. }
            | GraphError::InvalidParameter { node_id, .. } => Some(*node_id),
            GraphError::CycleDetected { nodes } => nodes.first().copied(),
            _ => None,
        }
    }
}

impl RegionError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegionError::OutOfBounds { .. } | RegionError::Overflow { .. } => {
                ErrorKind::RegionOutOfBounds
            }
            RegionError::NotBuffered { .. } => ErrorKind::ComputationFailure,
            RegionError::DimensionMismatch { .. } | RegionError::BufferSizeMismatch { .. } => {
                ErrorKind::Configuration
            }
        }
    }

    /// Get the node ID that caused this error, if applicable.
    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            RegionError::OutOfBounds { node_id, .. } | RegionError::NotBuffered { node_id, .. } => {
                Some(*node_id)
            }
            _ => None,
        }
    }
}

impl ExecutionError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecutionError::AllocationFailure { .. } => ErrorKind::AllocationFailure,
            ExecutionError::Cancelled => ErrorKind::Cancelled,
            ExecutionError::MissingInput { .. } => ErrorKind::InvalidSlot,
            ExecutionError::MissingParameter { .. } | ExecutionError::InvalidParameter { .. } => {
                ErrorKind::Configuration
            }
            _ => ErrorKind::ComputationFailure,
        }
    }

    /// Get the node ID that caused this error, if applicable.
    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            ExecutionError::ComputationFailure { node_id, .. }
            | ExecutionError::AllocationFailure { node_id, .. }
            | ExecutionError::MissingInput { node_id, .. }
            | ExecutionError::MissingParameter { node_id, .. }
            | ExecutionError::InvalidParameter { node_id, .. }
            | ExecutionError::IncompatibleInputs { node_id, .. }
            | ExecutionError::WrongDataType { node_id, .. }
            | ExecutionError::OutputNotSet { node_id, .. } => Some(*node_id),
            _ => None,
        }
    }

    /// Attach the region being generated to a computation failure.
    pub fn with_region(self, at: &Region) -> Self {
        match self {
            ExecutionError::ComputationFailure {
                node_id,
                region: None,
                error,
            } => ExecutionError::ComputationFailure {
                node_id,
                region: Some(at.clone()),
                error,
            },
            other => other,
        }
    }

    /// Whether retrying the same update could succeed without changes.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            ExecutionError::AllocationFailure { .. } | ExecutionError::Cancelled
        )
    }
}

/// Result type alias for Strata operations.
pub type StrataResult<T> = Result<T, StrataError>;

/// Result type alias for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Result type alias for execution operations.
pub type ExecutionResult<T> = Result<T, ExecutionError>;
