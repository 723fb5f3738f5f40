//! Pixel-wise intensity mappings.

use super::{filter_id, map_pixels};
use crate::core::context::GenerateContext;
use crate::core::data::{DataKind, Pixel};
use crate::core::error::ExecutionError;
use crate::core::node::{Category, Filter, FilterMetadata, FilterMetadataBuilder};
use crate::core::port::{ParameterDefinition, SlotDefinition};
use crate::core::types::{Value, ValueType};
use std::marker::PhantomData;

fn image_slots<P: Pixel>(builder: FilterMetadataBuilder) -> FilterMetadataBuilder {
    builder
        .input(
            SlotDefinition::input("input", DataKind::Image(P::PIXEL_TYPE))
                .with_description("Input image"),
        )
        .output(SlotDefinition::output("output", DataKind::Image(P::PIXEL_TYPE)))
}

/// Binary threshold: pixels in `[lower, upper]` become `inside`, all others
/// `outside`.
#[derive(Debug, Clone, Copy)]
pub struct Threshold<P: Pixel> {
    _pixel: PhantomData<P>,
}

impl<P: Pixel> Threshold<P> {
    /// Create the filter with its default parameters.
    pub fn new() -> Self {
        Self { _pixel: PhantomData }
    }
}

impl<P: Pixel> Default for Threshold<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Pixel> Filter for Threshold<P> {
    fn metadata(&self) -> FilterMetadata {
        image_slots::<P>(FilterMetadata::builder(filter_id::<P>("threshold"), "Threshold"))
            .description("Map pixels inside [lower, upper] to one value and the rest to another")
            .category(Category::Intensity)
            .parameter(
                ParameterDefinition::new("lower", ValueType::Float, Value::Float(0.0))
                    .with_description("Lowest value counted as inside"),
            )
            .parameter(
                ParameterDefinition::new("upper", ValueType::Float, Value::Float(255.0))
                    .with_description("Highest value counted as inside"),
            )
            .parameter(ParameterDefinition::new(
                "inside",
                ValueType::Float,
                Value::Float(1.0),
            ))
            .parameter(ParameterDefinition::new(
                "outside",
                ValueType::Float,
                Value::Float(0.0),
            ))
            .tags(["binary", "mask"])
            .build()
    }

    fn generate_data(&self, ctx: &mut GenerateContext) -> Result<(), ExecutionError> {
        let params = ctx.params();
        let lower = params.get_float("lower")?;
        let upper = params.get_float("upper")?;
        let inside = P::from_f64(params.get_float("inside")?);
        let outside = P::from_f64(params.get_float("outside")?);

        map_pixels::<P>(ctx, |v| {
            let v = v.to_f64();
            if lower <= v && v <= upper {
                inside
            } else {
                outside
            }
        })
    }
}

/// Linear intensity mapping `(v + shift) * scale`, saturating to the pixel
/// type.
#[derive(Debug, Clone, Copy)]
pub struct ShiftScale<P: Pixel> {
    _pixel: PhantomData<P>,
}

impl<P: Pixel> ShiftScale<P> {
    /// Create the filter with its default parameters.
    pub fn new() -> Self {
        Self { _pixel: PhantomData }
    }
}

impl<P: Pixel> Default for ShiftScale<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Pixel> Filter for ShiftScale<P> {
    fn metadata(&self) -> FilterMetadata {
        image_slots::<P>(FilterMetadata::builder(filter_id::<P>("shift_scale"), "Shift Scale"))
            .description("Add a shift to every pixel, then multiply by a scale")
            .category(Category::Intensity)
            .parameter(ParameterDefinition::new(
                "shift",
                ValueType::Float,
                Value::Float(0.0),
            ))
            .parameter(ParameterDefinition::new(
                "scale",
                ValueType::Float,
                Value::Float(1.0),
            ))
            .tags(["linear", "rescale"])
            .build()
    }

    fn generate_data(&self, ctx: &mut GenerateContext) -> Result<(), ExecutionError> {
        let shift = ctx.params().get_float("shift")?;
        let scale = ctx.params().get_float("scale")?;
        map_pixels::<P>(ctx, |v| P::from_f64((v.to_f64() + shift) * scale))
    }
}
