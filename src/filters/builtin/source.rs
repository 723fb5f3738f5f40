//! Synthetic image source.

use super::filter_id;
use crate::core::context::{GenerateContext, InformationContext, Parameters};
use crate::core::data::{DataInformation, DataKind, Pixel};
use crate::core::error::ExecutionError;
use crate::core::node::{Category, Filter, FilterMetadata};
use crate::core::port::{Constraint, ParameterDefinition, SlotDefinition};
use crate::core::region::Region;
use crate::core::types::{Value, ValueType};
use std::marker::PhantomData;
use std::str::FromStr;

/// Pixel pattern generated by [`ImageSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    /// Every pixel holds `value`.
    Constant,
    /// `value` plus the linear offset of the pixel in the largest region.
    Ramp,
    /// `value` where the index sum is even, zero elsewhere.
    Checker,
}

impl Pattern {
    const NAMES: [&'static str; 3] = ["constant", "ramp", "checker"];
}

impl FromStr for Pattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "constant" => Ok(Pattern::Constant),
            "ramp" => Ok(Pattern::Ramp),
            "checker" => Ok(Pattern::Checker),
            other => Err(format!("unknown pattern '{}'", other)),
        }
    }
}

/// Generates an image of configurable extent from a closed-form pattern.
///
/// Every pixel depends on its index alone, so any sub-region can be
/// generated on its own and matches the same pixels of a full pass.
#[derive(Debug, Clone, Copy)]
pub struct ImageSource<P: Pixel> {
    _pixel: PhantomData<P>,
}

impl<P: Pixel> ImageSource<P> {
    /// Create the filter with its default parameters.
    pub fn new() -> Self {
        Self { _pixel: PhantomData }
    }

    fn largest_region(params: &Parameters) -> Result<Region, ExecutionError> {
        let size = params.get_usize_list("size")?;
        let index = params.get_integer_list("index")?;
        let index = if index.is_empty() {
            vec![0; size.len()]
        } else {
            index
        };
        Region::new(index, size).map_err(|e| params.invalid("index", e.to_string()))
    }
}

impl<P: Pixel> Default for ImageSource<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Pixel> Filter for ImageSource<P> {
    fn metadata(&self) -> FilterMetadata {
        let patterns = Pattern::NAMES.iter().map(|p| Value::from(*p)).collect();

        FilterMetadata::builder(filter_id::<P>("image_source"), "Image Source")
            .description("Generate an image from a constant, ramp or checker pattern")
            .category(Category::Source)
            .output(
                SlotDefinition::output("output", DataKind::Image(P::PIXEL_TYPE))
                    .with_description("Generated image"),
            )
            .parameter(
                ParameterDefinition::new(
                    "size",
                    ValueType::Array(Box::new(ValueType::Integer)),
                    Value::from(vec![10i64, 10]),
                )
                .with_description("Extent along each axis")
                .with_constraint(Constraint::NotEmpty)
                .with_constraint(Constraint::Positive),
            )
            .parameter(
                ParameterDefinition::new(
                    "index",
                    ValueType::Array(Box::new(ValueType::Integer)),
                    Value::Array(Vec::new()),
                )
                .with_description("Start index along each axis, empty for the origin"),
            )
            .parameter(
                ParameterDefinition::new(
                    "spacing",
                    ValueType::Array(Box::new(ValueType::Float)),
                    Value::Array(Vec::new()),
                )
                .with_description("Sample spacing along each axis, empty for unit spacing")
                .with_constraint(Constraint::Positive),
            )
            .parameter(
                ParameterDefinition::new("pattern", ValueType::String, Value::from("constant"))
                    .with_constraint(Constraint::OneOf(patterns)),
            )
            .parameter(ParameterDefinition::new(
                "value",
                ValueType::Float,
                Value::Float(0.0),
            ))
            .tags(["source", "synthetic"])
            .build()
    }

    fn generate_output_information(
        &self,
        ctx: &mut InformationContext,
    ) -> Result<(), ExecutionError> {
        let params = ctx.params();
        let largest = Self::largest_region(params)?;
        let dim = largest.dimension();

        let spacing = params.get_float_list("spacing")?;
        let spacing = match spacing.len() {
            0 => vec![1.0; dim],
            n if n == dim => spacing,
            n => {
                return Err(params.invalid(
                    "spacing",
                    format!("{} values given for a {}-dimensional image", n, dim),
                ))
            }
        };

        let information = DataInformation::image(P::PIXEL_TYPE, largest).with_spacing(spacing);
        ctx.set_output_information(0, information);
        Ok(())
    }

    fn generate_data(&self, ctx: &mut GenerateContext) -> Result<(), ExecutionError> {
        let params = ctx.params();
        let largest = Self::largest_region(params)?;
        let value = params.get_float("value")?;
        let pattern: Pattern = params
            .get_string("pattern")?
            .parse()
            .map_err(|e: String| params.invalid("pattern", e))?;

        let region = ctx.output_region(0).clone();
        let mut output = ctx.output_image::<P>(0)?;

        region.for_each_index(|idx| {
            let v = match pattern {
                Pattern::Constant => value,
                Pattern::Ramp => value + largest.offset_of(idx).unwrap_or(0) as f64,
                Pattern::Checker => {
                    if idx.iter().sum::<i64>().rem_euclid(2) == 0 {
                        value
                    } else {
                        0.0
                    }
                }
            };
            output.set(idx, P::from_f64(v));
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Pipeline;

    #[test]
    fn test_ramp_covers_largest_region() {
        let mut pipeline = Pipeline::new();
        let src = pipeline.add_filter(Box::new(ImageSource::<u8>::new()));
        pipeline.set_parameter(src, "size", vec![3i64, 2]).unwrap();
        pipeline.set_parameter(src, "pattern", "ramp").unwrap();
        pipeline.update(src).unwrap();

        let image = pipeline.output(src, 0).unwrap().image::<u8>().unwrap();
        assert_eq!(image.as_slice(), &[0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_shifted_index_and_spacing() {
        let mut pipeline = Pipeline::new();
        let src = pipeline.add_filter(Box::new(ImageSource::<f32>::new()));
        pipeline.set_parameter(src, "size", vec![2i64, 2]).unwrap();
        pipeline.set_parameter(src, "index", vec![5i64, -1]).unwrap();
        pipeline.set_parameter(src, "spacing", vec![0.5, 2.0]).unwrap();
        pipeline.set_parameter(src, "pattern", "checker").unwrap();
        pipeline.set_parameter(src, "value", 3.0).unwrap();
        pipeline.update(src).unwrap();

        let output = pipeline.output(src, 0).unwrap();
        let object = output.read();
        let info = object.information().unwrap();
        assert_eq!(info.largest_region, Region::new(vec![5, -1], vec![2, 2]).unwrap());
        assert_eq!(info.spacing, vec![0.5, 2.0]);

        let image = object.payload_as::<crate::core::data::Image<f32>>().unwrap();
        assert_eq!(image.get(&[5, -1]), Some(3.0));
        assert_eq!(image.get(&[6, -1]), Some(0.0));
        assert_eq!(image.get(&[6, 0]), Some(3.0));
    }

    #[test]
    fn test_rejects_unknown_pattern() {
        let mut pipeline = Pipeline::new();
        let src = pipeline.add_filter(Box::new(ImageSource::<u8>::new()));
        assert!(pipeline.set_parameter(src, "pattern", "noise").is_err());
        assert!(pipeline.set_parameter(src, "size", vec![0i64, 4]).is_err());
    }

    #[test]
    fn test_spacing_dimension_mismatch() {
        let mut pipeline = Pipeline::new();
        let src = pipeline.add_filter(Box::new(ImageSource::<u8>::new()));
        pipeline.set_parameter(src, "spacing", vec![1.0, 1.0, 1.0]).unwrap();
        assert!(pipeline.update(src).is_err());
    }
}
