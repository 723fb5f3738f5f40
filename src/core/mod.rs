//! Core types and traits for the Strata pipeline.
//!
//! This module contains the foundational pieces every pipeline is built from:
//! - Regions and the logical modification clock
//! - Data objects, shared handles and typed payloads
//! - Slot and parameter definitions
//! - The `Filter` trait and its hook contexts
//! - Streaming configuration and error types

pub mod context;
pub mod data;
pub mod error;
pub mod node;
pub mod port;
pub mod region;
pub mod streaming;
pub mod time;
pub mod types;

// Re-export commonly used types
pub use context::{GenerateContext, InformationContext, Parameters, RegionContext};
pub use data::{
    DataHandle, DataInformation, DataKind, DataObject, Image, OutputRef, Payload, Pixel,
    PixelType, Summary,
};
pub use error::{
    ErrorKind, ExecutionError, GraphError, NodeId, RegionError, StrataError, StrataResult,
};
pub use node::{Category, Filter, FilterMetadata};
pub use port::{Constraint, ParameterDefinition, SlotDefinition, SlotDirection};
pub use region::Region;
pub use streaming::{MemoryTracker, SplitStrategy, StreamingConfig};
pub use time::ModifiedTime;
pub use types::{Value, ValueType};
