//! Reductions of an image to a summary.

use super::filter_id;
use crate::core::context::{GenerateContext, InformationContext, RegionContext};
use crate::core::data::{DataInformation, DataKind, Pixel, Summary};
use crate::core::error::ExecutionError;
use crate::core::node::{Category, Filter, FilterMetadata};
use crate::core::port::SlotDefinition;
use std::marker::PhantomData;

/// Count, sum, mean, variance, sigma, minimum and maximum of a whole image.
///
/// The summary is non-spatial, so the input is always requested in full,
/// whatever region downstream asks for.
#[derive(Debug, Clone, Copy)]
pub struct Statistics<P: Pixel> {
    _pixel: PhantomData<P>,
}

impl<P: Pixel> Statistics<P> {
    /// Create the filter with its default parameters.
    pub fn new() -> Self {
        Self { _pixel: PhantomData }
    }
}

impl<P: Pixel> Default for Statistics<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Pixel> Filter for Statistics<P> {
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::builder(filter_id::<P>("statistics"), "Statistics")
            .description("Summarize the pixel values of an image")
            .category(Category::Statistics)
            .input(SlotDefinition::input("input", DataKind::Image(P::PIXEL_TYPE)))
            .output(SlotDefinition::output("summary", DataKind::Summary))
            .tags(["mean", "variance", "min", "max"])
            .build()
    }

    fn generate_output_information(
        &self,
        ctx: &mut InformationContext,
    ) -> Result<(), ExecutionError> {
        ctx.input_information(0)?;
        ctx.set_output_information(0, DataInformation::summary());
        Ok(())
    }

    fn generate_input_requested_region(
        &self,
        ctx: &mut RegionContext,
    ) -> Result<(), ExecutionError> {
        if let Some(largest) = ctx.input_largest_region(0).cloned() {
            ctx.set_input_requested_region(0, largest);
        }
        Ok(())
    }

    fn generate_data(&self, ctx: &mut GenerateContext) -> Result<(), ExecutionError> {
        let region = ctx.input_largest_region(0)?;
        let input = ctx.input_image::<P>(0)?;
        let samples = input
            .extract(&region)
            .ok_or_else(|| ctx.failure(format!("input does not cover {}", region)))?;

        let summary = Summary::from_samples(samples.into_iter().map(P::to_f64))
            .ok_or_else(|| ctx.failure("statistics of an empty image"))?;
        ctx.output::<Summary>(0)?.assign(&summary);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::data::{DataHandle, Image};
    use crate::core::error::ErrorKind;
    use crate::core::region::Region;
    use crate::graph::Pipeline;

    #[test]
    fn test_summary_values() {
        let mut pipeline = Pipeline::new();
        let stats = pipeline.add_filter(Box::new(Statistics::<u8>::new()));
        let image = Image::from_vec(Region::from_size(&[2, 2]), vec![2u8, 4, 4, 6]).unwrap();
        pipeline.set_input(stats, "input", DataHandle::from_image(image)).unwrap();
        pipeline.update(stats).unwrap();

        let summary = pipeline.output(stats, "summary").unwrap().summary().unwrap();
        assert_eq!(summary.count, 4);
        assert_eq!(summary.sum, 16.0);
        assert_eq!(summary.mean, 4.0);
        assert!((summary.variance - 8.0 / 3.0).abs() < 1e-12);
        assert_eq!(summary.minimum, 2.0);
        assert_eq!(summary.maximum, 6.0);
    }

    #[test]
    fn test_empty_input_fails() {
        let mut pipeline = Pipeline::new();
        let stats = pipeline.add_filter(Box::new(Statistics::<f32>::new()));
        let image = Image::<f32>::allocated(Region::from_size(&[0, 3]));
        pipeline.set_input(stats, 0, DataHandle::from_image(image)).unwrap();

        let err = pipeline.update(stats).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ComputationFailure);
        assert_eq!(err.node_id(), Some(stats));
        assert!(pipeline.get_node(stats).unwrap().last_executed().is_never());
    }
}
