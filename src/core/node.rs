//! The Filter trait and filter metadata.
//!
//! A filter is a stage of the pipeline. The update engine drives every filter
//! through the same fixed sequence of hooks:
//!
//! 1. [`Filter::generate_output_information`] publishes output metadata
//!    (kind, largest possible region, spacing, origin) from input metadata.
//! 2. [`Filter::enlarge_output_requested_region`] may widen what the filter
//!    was asked to produce.
//! 3. [`Filter::generate_input_requested_region`] declares what each input
//!    must hold for the output request to be satisfied.
//! 4. [`Filter::generate_data`] fills the already allocated output buffers.
//!
//! Only `metadata` and `generate_data` are mandatory; the defaults suit
//! pixel-wise filters whose output mirrors their first input.

use crate::core::context::{GenerateContext, InformationContext, RegionContext};
use crate::core::error::ExecutionError;
use crate::core::port::{ParameterDefinition, SlotDefinition};
use crate::core::types::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Category for organizing filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Filters with no inputs that synthesize data
    Source,
    /// Pixel-wise intensity mappings
    Intensity,
    /// Filters reading a neighbourhood around each pixel
    Neighborhood,
    /// Pixel-wise combination of several images
    Arithmetic,
    /// Reductions to non-spatial results
    Statistics,
    /// Changes of extent or geometry
    Geometry,
    /// Everything else
    #[default]
    Utility,
}

impl Category {
    /// Get the display name for this category.
    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Source => "Source",
            Category::Intensity => "Intensity",
            Category::Neighborhood => "Neighborhood",
            Category::Arithmetic => "Arithmetic",
            Category::Statistics => "Statistics",
            Category::Geometry => "Geometry",
            Category::Utility => "Utility",
        }
    }

    /// Get all categories in display order.
    pub fn all() -> &'static [Category] {
        &[
            Category::Source,
            Category::Intensity,
            Category::Neighborhood,
            Category::Arithmetic,
            Category::Statistics,
            Category::Geometry,
            Category::Utility,
        ]
    }
}

/// Metadata describing a filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterMetadata {
    /// Unique identifier for this filter type (e.g., "threshold_u8")
    pub id: String,
    /// Human-readable name (e.g., "Threshold")
    pub name: String,
    /// Category for organization
    pub category: Category,
    /// Detailed description
    pub description: String,
    /// Version string
    pub version: String,

    /// Input slot definitions, in slot index order
    pub inputs: Vec<SlotDefinition>,
    /// Output slot definitions, in slot index order
    pub outputs: Vec<SlotDefinition>,
    /// Parameter definitions
    pub parameters: Vec<ParameterDefinition>,

    /// Searchable tags
    pub tags: Vec<String>,
}

impl FilterMetadata {
    /// Create a new metadata builder.
    pub fn builder(id: impl Into<String>, name: impl Into<String>) -> FilterMetadataBuilder {
        FilterMetadataBuilder::new(id, name)
    }

    /// Get all input slot names.
    pub fn input_names(&self) -> Vec<&str> {
        self.inputs.iter().map(|p| p.name.as_str()).collect()
    }

    /// Get all output slot names.
    pub fn output_names(&self) -> Vec<&str> {
        self.outputs.iter().map(|p| p.name.as_str()).collect()
    }

    /// Index of the input slot called `name`.
    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|p| p.name == name)
    }

    /// Index of the output slot called `name`.
    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|p| p.name == name)
    }

    /// Find a parameter by name.
    pub fn get_parameter(&self, name: &str) -> Option<&ParameterDefinition> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Default value of every parameter, in declaration order.
    pub fn default_parameters(&self) -> IndexMap<String, Value> {
        self.parameters
            .iter()
            .map(|p| (p.name.clone(), p.default_value.clone()))
            .collect()
    }
}

/// Builder for FilterMetadata.
pub struct FilterMetadataBuilder {
    metadata: FilterMetadata,
}

impl FilterMetadataBuilder {
    /// Create a new builder with required fields.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            metadata: FilterMetadata {
                id: id.into(),
                name: name.into(),
                category: Category::Utility,
                description: String::new(),
                version: "1.0.0".to_string(),
                inputs: Vec::new(),
                outputs: Vec::new(),
                parameters: Vec::new(),
                tags: Vec::new(),
            },
        }
    }

    /// Set the category.
    pub fn category(mut self, category: Category) -> Self {
        self.metadata.category = category;
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.metadata.description = description.into();
        self
    }

    /// Set the version.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.metadata.version = version.into();
        self
    }

    /// Add an input slot.
    pub fn input(mut self, slot: SlotDefinition) -> Self {
        self.metadata.inputs.push(slot);
        self
    }

    /// Add an output slot.
    pub fn output(mut self, slot: SlotDefinition) -> Self {
        self.metadata.outputs.push(slot);
        self
    }

    /// Add a parameter.
    pub fn parameter(mut self, param: ParameterDefinition) -> Self {
        self.metadata.parameters.push(param);
        self
    }

    /// Add multiple tags.
    pub fn tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.metadata.tags.extend(tags.into_iter().map(|t| t.into()));
        self
    }

    /// Build the metadata.
    pub fn build(self) -> FilterMetadata {
        self.metadata
    }
}

/// A pipeline stage.
///
/// Filters hold no pipeline state of their own: parameters, bound inputs
/// and outputs live in the pipeline and reach the hooks through the
/// contexts. This keeps a filter shareable between threads and lets the
/// pipeline decide when anything runs.
///
/// # Example Implementation
///
/// ```ignore
/// struct Invert;
///
/// impl Filter for Invert {
///     fn metadata(&self) -> FilterMetadata {
///         FilterMetadata::builder("invert_u8", "Invert")
///             .category(Category::Intensity)
///             .input(SlotDefinition::input("input", DataKind::Image(PixelType::U8)))
///             .output(SlotDefinition::output("output", DataKind::Image(PixelType::U8)))
///             .build()
///     }
///
///     fn generate_data(&self, ctx: &mut GenerateContext) -> Result<(), ExecutionError> {
///         let region = ctx.output_region(0).clone();
///         let input = ctx.input_image::<u8>(0)?;
///         let mut output = ctx.output_image::<u8>(0)?;
///         region.for_each_row(|start, len| {
///             if let (Some(src), Some(dst)) = (input.row(start, len), output.row_mut(start, len)) {
///                 for (d, s) in dst.iter_mut().zip(src) {
///                     *d = 255 - *s;
///                 }
///             }
///         });
///         Ok(())
///     }
/// }
/// ```
pub trait Filter: Send + Sync {
    /// Get the metadata for this filter.
    fn metadata(&self) -> FilterMetadata;

    /// Publish the metadata of every output.
    ///
    /// The default copies the information of input 0 to every output.
    fn generate_output_information(
        &self,
        ctx: &mut InformationContext,
    ) -> Result<(), ExecutionError> {
        ctx.copy_primary_information()
    }

    /// Widen the requested region of the outputs. The default keeps it.
    fn enlarge_output_requested_region(
        &self,
        ctx: &mut RegionContext,
    ) -> Result<(), ExecutionError> {
        let _ = ctx;
        Ok(())
    }

    /// Declare the region needed from each input.
    ///
    /// The default asks every input for the region requested of output 0.
    fn generate_input_requested_region(
        &self,
        ctx: &mut RegionContext,
    ) -> Result<(), ExecutionError> {
        ctx.request_inputs_like_output(0);
        Ok(())
    }

    /// Fill the requested region of every output.
    fn generate_data(&self, ctx: &mut GenerateContext) -> Result<(), ExecutionError>;
}
