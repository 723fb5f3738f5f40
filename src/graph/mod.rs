//! Graph module for managing pipelines.
//!
//! A pipeline is a directed acyclic graph (DAG) where nodes are filter
//! instances and edges carry data objects from an output slot to an input
//! slot.

pub mod connection;
pub mod serialization;
pub mod structure;
pub mod topology;

// Re-export commonly used types
pub use connection::{Connection, Endpoint, SlotKey};
pub use serialization::{LoadedPipeline, PipelineDescription};
pub use structure::{Pipeline, PipelineMetadata, PipelineNode};
pub use topology::TopologyAnalyzer;
