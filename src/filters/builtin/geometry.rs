//! Filters changing the extent of an image.

use super::{filter_id, map_pixels};
use crate::core::context::{GenerateContext, InformationContext, Parameters};
use crate::core::data::{DataKind, Pixel};
use crate::core::error::ExecutionError;
use crate::core::node::{Category, Filter, FilterMetadata};
use crate::core::port::{Constraint, ParameterDefinition, SlotDefinition};
use crate::core::region::Region;
use crate::core::types::{Value, ValueType};
use std::marker::PhantomData;

/// Removes `lower[a]` pixels from the start and `upper[a]` pixels from the
/// end of every axis.
///
/// Pixels keep their indices: the output's largest possible region starts
/// at the input start plus `lower`.
#[derive(Debug, Clone, Copy)]
pub struct Crop<P: Pixel> {
    _pixel: PhantomData<P>,
}

impl<P: Pixel> Crop<P> {
    /// Create the filter with its default parameters.
    pub fn new() -> Self {
        Self { _pixel: PhantomData }
    }
}

impl<P: Pixel> Default for Crop<P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-axis crop amounts of `name`, zero when the list is empty.
fn amounts(params: &Parameters, name: &str, dim: usize) -> Result<Vec<usize>, ExecutionError> {
    let values = params.get_usize_list(name)?;
    match values.len() {
        0 => Ok(vec![0; dim]),
        n if n == dim => Ok(values),
        n => Err(params.invalid(
            name,
            format!("{} values given for a {}-dimensional image", n, dim),
        )),
    }
}

impl<P: Pixel> Filter for Crop<P> {
    fn metadata(&self) -> FilterMetadata {
        let kind = DataKind::Image(P::PIXEL_TYPE);
        let list = || ValueType::Array(Box::new(ValueType::Integer));

        FilterMetadata::builder(filter_id::<P>("crop"), "Crop")
            .description("Remove pixels from the borders of an image")
            .category(Category::Geometry)
            .input(SlotDefinition::input("input", kind))
            .output(SlotDefinition::output("output", kind))
            .parameter(
                ParameterDefinition::new("lower", list(), Value::Array(Vec::new()))
                    .with_description("Pixels removed at the start of each axis")
                    .with_constraint(Constraint::NonNegative),
            )
            .parameter(
                ParameterDefinition::new("upper", list(), Value::Array(Vec::new()))
                    .with_description("Pixels removed at the end of each axis")
                    .with_constraint(Constraint::NonNegative),
            )
            .tags(["extent", "border"])
            .build()
    }

    fn generate_output_information(
        &self,
        ctx: &mut InformationContext,
    ) -> Result<(), ExecutionError> {
        let information = ctx.input_information(0)?.clone();
        let input = &information.largest_region;
        let params = ctx.params();
        let lower = amounts(params, "lower", input.dimension())?;
        let upper = amounts(params, "upper", input.dimension())?;

        let mut index = input.index().to_vec();
        let mut size = input.size().to_vec();
        for a in 0..input.dimension() {
            let too_many = || {
                params.invalid(
                    "lower",
                    format!(
                        "axis {} of {} cannot lose {} + {} pixels",
                        a, input, lower[a], upper[a]
                    ),
                )
            };
            size[a] = lower[a]
                .checked_add(upper[a])
                .and_then(|removed| size[a].checked_sub(removed))
                .ok_or_else(too_many)?;
            index[a] = i64::try_from(lower[a])
                .ok()
                .and_then(|shift| index[a].checked_add(shift))
                .ok_or_else(too_many)?;
        }
        let largest =
            Region::new(index, size).map_err(|e| params.invalid("lower", e.to_string()))?;

        let mut output = information.clone();
        output.largest_region = largest;
        ctx.set_output_information(0, output);
        Ok(())
    }

    fn generate_data(&self, ctx: &mut GenerateContext) -> Result<(), ExecutionError> {
        map_pixels::<P>(ctx, |v| v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::data::{DataHandle, Image};
    use crate::core::error::ErrorKind;
    use crate::graph::Pipeline;

    fn cropped(lower: Vec<i64>, upper: Vec<i64>) -> crate::StrataResult<(Region, Vec<u8>)> {
        let mut pipeline = Pipeline::new();
        let crop = pipeline.add_filter(Box::new(Crop::<u8>::new()));
        pipeline.set_parameter(crop, "lower", lower).unwrap();
        pipeline.set_parameter(crop, "upper", upper).unwrap();
        let image = Image::from_fn(Region::from_size(&[4, 3]), |idx| (idx[0] + 4 * idx[1]) as u8);
        pipeline.set_input(crop, 0, DataHandle::from_image(image)).unwrap();
        pipeline.update(crop)?;

        let output = pipeline.output(crop, 0).unwrap();
        let image = output.image::<u8>().unwrap();
        Ok((image.region().unwrap().clone(), image.as_slice().to_vec()))
    }

    #[test]
    fn test_crop_keeps_indices() {
        let (region, pixels) = cropped(vec![1, 1], vec![1, 0]).unwrap();
        assert_eq!(region, Region::new(vec![1, 1], vec![2, 2]).unwrap());
        assert_eq!(pixels, vec![5, 6, 9, 10]);
    }

    #[test]
    fn test_crop_too_large() {
        let err = cropped(vec![3, 0], vec![2, 0]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(cropped(vec![1], vec![]).is_err());
    }

    #[test]
    fn test_crop_amounts_that_overflow_are_rejected() {
        let err = cropped(vec![i64::MAX, 0], vec![i64::MAX, 0]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("cannot lose"));
    }
}
