//! # Strata - Demand-driven Image Filter Pipelines
//!
//! Strata runs image filters as a directed acyclic graph whose outputs are
//! computed lazily. Asking a node for its output walks the graph three times:
//! metadata flows downstream, requested regions flow upstream, and only the
//! stale nodes execute, each one producing just the region that was asked of
//! it.
//!
//! ## Features
//!
//! - **Lazy Updates**: Nothing runs until an output is requested; unchanged
//!   nodes whose buffers already hold the requested region are skipped
//! - **Region Requests**: Filters declare which input region they need, so
//!   a small request reads a small part of the upstream data
//! - **Streaming**: Large outputs can be produced piece by piece under a
//!   memory budget
//! - **Typed Slots**: Inputs and outputs carry a data kind checked at wiring
//!   time; filters are generic over their pixel type
//! - **Parallel Siblings**: Independent nodes can run on a rayon pool
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use strata::prelude::*;
//!
//! let registry = FilterRegistry::with_builtins();
//! let mut pipeline = Pipeline::new();
//!
//! let source = pipeline.add_filter(registry.create("image_source_u8").unwrap());
//! pipeline.set_parameter(source, "size", vec![512i64, 512]).unwrap();
//! pipeline.set_parameter(source, "pattern", "ramp").unwrap();
//!
//! let mean = pipeline.add_filter(registry.create("box_mean_u8").unwrap());
//! pipeline.set_parameter(mean, "radius", 2i64).unwrap();
//! pipeline.connect(source, "output", mean, "input").unwrap();
//!
//! // Only the pixels needed for this corner are generated.
//! let corner = Region::new(vec![0, 0], vec![64, 64]).unwrap();
//! pipeline.update_region(mean, 0, corner).unwrap();
//!
//! // Nothing changed, so nothing runs.
//! let report = pipeline.update_region(mean, 0, Region::new(vec![8, 8], vec![8, 8]).unwrap()).unwrap();
//! assert_eq!(report.stats.nodes_executed(), 0);
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: Regions, data objects, the `Filter` trait and error handling
//! - [`graph`]: The pipeline graph, topology analysis and JSON descriptions
//! - [`execution`]: The update engine, streaming and progress reporting
//! - [`filters`]: Filter registry and built-in filters
//!
//! ## Creating Custom Filters
//!
//! Implement the [`Filter`](core::node::Filter) trait. Only `metadata` and
//! `generate_data` are required:
//!
//! ```rust,ignore
//! use strata::prelude::*;
//!
//! struct Negate;
//!
//! impl Filter for Negate {
//!     fn metadata(&self) -> FilterMetadata {
//!         FilterMetadata::builder("negate_f32", "Negate")
//!             .category(Category::Intensity)
//!             .input(SlotDefinition::input("input", DataKind::Image(PixelType::F32)))
//!             .output(SlotDefinition::output("output", DataKind::Image(PixelType::F32)))
//!             .build()
//!     }
//!
//!     fn generate_data(&self, ctx: &mut GenerateContext) -> Result<(), ExecutionError> {
//!         let region = ctx.output_region(0).clone();
//!         let input = ctx.input_image::<f32>(0)?;
//!         let mut output = ctx.output_image::<f32>(0)?;
//!         region.for_each_index(|idx| {
//!             if let Some(v) = input.get(idx) {
//!                 output.set(idx, -v);
//!             }
//!         });
//!         Ok(())
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod execution;
pub mod filters;
pub mod graph;

pub use crate::core::error::{StrataError, StrataResult};

/// Prelude module for convenient imports.
///
/// Import everything commonly needed with:
/// ```rust,ignore
/// use strata::prelude::*;
/// ```
pub mod prelude {
    // Regions and data
    pub use crate::core::data::{
        DataHandle, DataInformation, DataKind, DataObject, Image, Payload, Pixel, PixelType,
        Summary,
    };
    pub use crate::core::region::Region;
    pub use crate::core::time::ModifiedTime;
    pub use crate::core::types::{Value, ValueType};

    // Filter trait and definitions
    pub use crate::core::context::{GenerateContext, InformationContext, Parameters, RegionContext};
    pub use crate::core::node::{Category, Filter, FilterMetadata};
    pub use crate::core::port::{Constraint, ParameterDefinition, SlotDefinition};

    // Errors
    pub use crate::core::error::{
        ErrorKind, ExecutionError, GraphError, NodeId, RegionError, StrataError, StrataResult,
    };

    // Streaming
    pub use crate::core::streaming::{MemoryTracker, SplitStrategy, StreamingConfig};

    // Graph
    pub use crate::graph::connection::{Connection, Endpoint, SlotKey};
    pub use crate::graph::serialization::{LoadedPipeline, PipelineDescription};
    pub use crate::graph::structure::{Pipeline, PipelineMetadata, PipelineNode};
    pub use crate::graph::topology::TopologyAnalyzer;

    // Execution
    pub use crate::execution::engine::{ExecutionOptions, ExecutionStats, UpdateEngine, UpdateReport};
    pub use crate::execution::progress::{
        CancellationToken, ProgressCallback, ProgressTracker, ProgressUpdate, SkipReason,
    };

    // Filters
    pub use crate::filters::builtin::{
        Add, BoxMean, Crop, ImageSource, Pattern, ShiftScale, Statistics, Threshold,
    };
    pub use crate::filters::registry::{FilterFactory, FilterRegistry, RegistryEntry};
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
        assert_eq!(super::NAME, "strata");
    }

    #[test]
    fn test_registry_with_builtins() {
        let registry = FilterRegistry::with_builtins();
        assert_eq!(registry.len(), 35);
        assert!(registry.contains("image_source_u8"));
        assert!(registry.contains("statistics_f64"));
    }

    #[test]
    fn test_registry_built_pipeline() {
        let registry = FilterRegistry::with_builtins();
        let mut pipeline = Pipeline::new();

        let source = pipeline.add_filter(registry.create("image_source_u8").unwrap());
        pipeline.set_parameter(source, "pattern", "ramp").unwrap();
        let stats = pipeline.add_filter(registry.create("statistics_u8").unwrap());
        pipeline.connect(source, "output", stats, "input").unwrap();

        let report = pipeline.update(stats).unwrap();
        assert_eq!(report.stats.nodes_executed(), 2);

        let summary = pipeline.output(stats, 0).unwrap().summary().unwrap();
        assert_eq!(summary.count, 100);
        assert_eq!(summary.minimum, 0.0);
        assert_eq!(summary.maximum, 99.0);
        assert_eq!(summary.mean, 49.5);
    }
}
