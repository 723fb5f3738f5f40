//! Neighbourhood filters.

use super::filter_id;
use crate::core::context::{GenerateContext, Parameters, RegionContext};
use crate::core::data::{DataKind, Pixel};
use crate::core::error::ExecutionError;
use crate::core::node::{Category, Filter, FilterMetadata};
use crate::core::port::{Constraint, ParameterDefinition, SlotDefinition};
use crate::core::region::Region;
use crate::core::types::{Value, ValueType};
use std::marker::PhantomData;

/// Mean over the box of half-width `radius` around each pixel.
///
/// Only neighbours inside the input's largest possible region take part,
/// so border pixels average over fewer samples.
#[derive(Debug, Clone, Copy)]
pub struct BoxMean<P: Pixel> {
    _pixel: PhantomData<P>,
}

impl<P: Pixel> BoxMean<P> {
    /// Create the filter with its default parameters.
    pub fn new() -> Self {
        Self { _pixel: PhantomData }
    }
}

impl<P: Pixel> Default for BoxMean<P> {
    fn default() -> Self {
        Self::new()
    }
}

/// The radius parameter, rejected when the box width `2 * radius + 1` does
/// not fit the index space.
fn radius(params: &Parameters) -> Result<usize, ExecutionError> {
    let radius = params.get_usize("radius")?;
    radius
        .checked_mul(2)
        .and_then(|width| width.checked_add(1))
        .filter(|&width| i64::try_from(width).is_ok())
        .map(|_| radius)
        .ok_or_else(|| params.invalid("radius", format!("box of radius {} is too wide", radius)))
}

impl<P: Pixel> Filter for BoxMean<P> {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder(filter_id::<P>("box_mean"), "Box Mean")
            .description("Average each pixel with its neighbours in a box of the given radius")
            .category(Category::Neighborhood)
            .input(SlotDefinition::input("input", DataKind::Image(P::PIXEL_TYPE)))
            .output(SlotDefinition::output("output", DataKind::Image(P::PIXEL_TYPE)))
            .parameter(
                ParameterDefinition::new("radius", ValueType::Integer, Value::Integer(1))
                    .with_description("Half-width of the box along every axis")
                    .with_constraint(Constraint::NonNegative),
            )
            .tags(["smoothing", "blur"])
            .build()
    }

    fn generate_input_requested_region(
        &self,
        ctx: &mut RegionContext,
    ) -> Result<(), ExecutionError> {
        let radius = radius(ctx.params())?;
        let request = ctx.output_requested_region(0).padded_uniform(radius);
        ctx.set_input_requested_region(0, request);
        Ok(())
    }

    fn generate_data(&self, ctx: &mut GenerateContext) -> Result<(), ExecutionError> {
        let radius = radius(ctx.params())?;
        let bounds = ctx.input_largest_region(0)?;
        let region = ctx.output_region(0).clone();
        let input = ctx.input_image::<P>(0)?;
        let mut output = ctx.output_image::<P>(0)?;

        let pixel = vec![1; region.dimension()];
        let mut missing = None;
        region.for_each_index(|idx| {
            let Ok(centre) = Region::new(idx.to_vec(), pixel.clone()) else {
                return;
            };
            let neighbourhood = centre.padded_uniform(radius).intersection(&bounds);

            let mut sum = 0.0;
            let mut count = 0usize;
            neighbourhood.for_each_index(|n| match input.get(n) {
                Some(v) => {
                    sum += v.to_f64();
                    count += 1;
                }
                None => {
                    missing.get_or_insert_with(|| n.to_vec());
                }
            });
            if count > 0 {
                output.set(idx, P::from_f64(sum / count as f64));
            }
        });

        match missing {
            Some(idx) => Err(ctx.failure(format!("input pixel {:?} is not buffered", idx))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::data::{DataHandle, Image};
    use crate::core::error::ErrorKind;
    use crate::graph::Pipeline;

    fn mean_of(pixels: Vec<f32>, size: &[usize], radius: i64) -> Vec<f32> {
        let mut pipeline = Pipeline::new();
        let mean = pipeline.add_filter(Box::new(BoxMean::<f32>::new()));
        pipeline.set_parameter(mean, "radius", radius).unwrap();
        let input = Image::from_vec(Region::from_size(size), pixels).unwrap();
        pipeline.set_input(mean, 0, DataHandle::from_image(input)).unwrap();
        pipeline.update(mean).unwrap();
        pipeline.output(mean, 0).unwrap().image::<f32>().unwrap().as_slice().to_vec()
    }

    #[test]
    fn test_border_uses_in_bounds_neighbours() {
        let out = mean_of(vec![0.0, 3.0, 6.0, 9.0], &[4], 1);
        assert_eq!(out, vec![1.5, 3.0, 6.0, 7.5]);
    }

    #[test]
    fn test_radius_zero_is_identity() {
        let pixels = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        assert_eq!(mean_of(pixels.clone(), &[3, 2], 0), pixels);
    }

    #[test]
    fn test_two_dimensional_mean() {
        let out = mean_of(vec![9.0; 9], &[3, 3], 1);
        assert_eq!(out, vec![9.0; 9]);

        let mut pixels = vec![0.0; 9];
        pixels[4] = 9.0;
        let out = mean_of(pixels, &[3, 3], 1);
        // corners see 4 samples, edges 6, the centre all 9
        assert_eq!(out, vec![2.25, 1.5, 2.25, 1.5, 1.0, 1.5, 2.25, 1.5, 2.25]);
    }

    #[test]
    fn test_radius_wider_than_the_image_averages_everything() {
        let out = mean_of(vec![0.0, 3.0, 6.0, 9.0], &[4], 1000);
        assert_eq!(out, vec![4.5; 4]);
    }

    #[test]
    fn test_radius_too_wide_for_the_index_space() {
        let mut pipeline = Pipeline::new();
        let mean = pipeline.add_filter(Box::new(BoxMean::<f32>::new()));
        pipeline.set_parameter(mean, "radius", i64::MAX).unwrap();
        let input = Image::<f32>::from_vec(Region::from_size(&[2]), vec![1.0, 2.0]).unwrap();
        pipeline.set_input(mean, 0, DataHandle::from_image(input)).unwrap();

        let err = pipeline.update(mean).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("too wide"));
    }
}
