//! Pixel-wise arithmetic on several images.

use super::filter_id;
use crate::core::context::{GenerateContext, InformationContext};
use crate::core::data::{DataKind, Pixel};
use crate::core::error::ExecutionError;
use crate::core::node::{Category, Filter, FilterMetadata};
use crate::core::port::SlotDefinition;
use std::marker::PhantomData;

/// Sum of two images of identical extent, saturating to the pixel type.
#[derive(Debug, Clone, Copy)]
pub struct Add<P: Pixel> {
    _pixel: PhantomData<P>,
}

impl<P: Pixel> Add<P> {
    /// Create the filter with its default parameters.
    pub fn new() -> Self {
        Self { _pixel: PhantomData }
    }
}

impl<P: Pixel> Default for Add<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Pixel> Filter for Add<P> {
    fn metadata(&self) -> FilterMetadata {
        let kind = DataKind::Image(P::PIXEL_TYPE);
        FilterMetadata::builder(filter_id::<P>("add"), "Add")
            .description("Add two images pixel by pixel")
            .category(Category::Arithmetic)
            .input(SlotDefinition::input("first", kind).with_description("First operand"))
            .input(SlotDefinition::input("second", kind).with_description("Second operand"))
            .output(SlotDefinition::output("output", kind).with_description("first + second"))
            .tags(["math", "sum"])
            .build()
    }

    fn generate_output_information(
        &self,
        ctx: &mut InformationContext,
    ) -> Result<(), ExecutionError> {
        let first = ctx.input_information(0)?;
        let second = ctx.input_information(1)?;
        if first.largest_region != second.largest_region {
            return Err(ExecutionError::IncompatibleInputs {
                node_id: ctx.node_id(),
                reason: format!(
                    "operands cover {} and {}",
                    first.largest_region, second.largest_region
                ),
            });
        }
        ctx.copy_primary_information()
    }

    fn generate_data(&self, ctx: &mut GenerateContext) -> Result<(), ExecutionError> {
        let region = ctx.output_region(0).clone();
        let first = ctx.input_image::<P>(0)?;
        let second = ctx.input_image::<P>(1)?;
        let mut output = ctx.output_image::<P>(0)?;

        let mut complete = true;
        region.for_each_row(|start, len| {
            match (first.row(start, len), second.row(start, len), output.row_mut(start, len)) {
                (Some(a), Some(b), Some(dst)) => {
                    for ((d, a), b) in dst.iter_mut().zip(a).zip(b) {
                        *d = P::from_f64(a.to_f64() + b.to_f64());
                    }
                }
                _ => complete = false,
            }
        });

        if complete {
            Ok(())
        } else {
            Err(ctx.failure(format!("operands do not cover {}", region)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::data::{DataHandle, Image};
    use crate::core::error::ErrorKind;
    use crate::core::region::Region;
    use crate::graph::Pipeline;

    fn image(values: Vec<u8>) -> DataHandle {
        let region = Region::from_size(&[values.len()]);
        DataHandle::from_image(Image::from_vec(region, values).unwrap())
    }

    #[test]
    fn test_add_saturates() {
        let mut pipeline = Pipeline::new();
        let sum = pipeline.add_filter(Box::new(Add::<u8>::new()));
        pipeline.set_input(sum, "first", image(vec![1, 100, 200])).unwrap();
        pipeline.set_input(sum, "second", image(vec![2, 100, 100])).unwrap();
        pipeline.update(sum).unwrap();

        let out = pipeline.output(sum, 0).unwrap().image::<u8>().unwrap();
        assert_eq!(out.as_slice(), &[3, 200, 255]);
    }

    #[test]
    fn test_mismatched_extents() {
        let mut pipeline = Pipeline::new();
        let sum = pipeline.add_filter(Box::new(Add::<u8>::new()));
        pipeline.set_input(sum, "first", image(vec![1, 2, 3])).unwrap();
        pipeline.set_input(sum, "second", image(vec![1, 2])).unwrap();

        let err = pipeline.update(sum).unwrap_err();
        assert_eq!(err.node_id(), Some(sum));
        assert_eq!(err.kind(), ErrorKind::ComputationFailure);
        assert!(pipeline.output(sum, 0).unwrap().read().information().is_none());
    }
}
