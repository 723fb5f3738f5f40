//! Built-in filter implementations.
//!
//! Every filter is generic over its pixel type and registered once per
//! supported type, with the type name appended to the filter id
//! (`threshold_u8`, `box_mean_f32`, ...).

mod arithmetic;
mod geometry;
mod intensity;
mod neighborhood;
mod source;
mod statistics;

use crate::core::context::GenerateContext;
use crate::core::data::Pixel;
use crate::core::error::ExecutionError;
use crate::filters::registry::FilterRegistry;

pub use arithmetic::Add;
pub use geometry::Crop;
pub use intensity::{ShiftScale, Threshold};
pub use neighborhood::BoxMean;
pub use source::{ImageSource, Pattern};
pub use statistics::Statistics;

/// Register `$filter` for every pixel type the built-ins support.
macro_rules! register_pixel_types {
    ($registry:expr, $($filter:ident),* $(,)?) => {
        $(
            $registry.register(|| Box::new($filter::<u8>::new()));
            $registry.register(|| Box::new($filter::<u16>::new()));
            $registry.register(|| Box::new($filter::<i16>::new()));
            $registry.register(|| Box::new($filter::<f32>::new()));
            $registry.register(|| Box::new($filter::<f64>::new()));
        )*
    };
}

/// Register all built-in filters.
pub fn register_all(registry: &mut FilterRegistry) {
    register_pixel_types!(
        registry,
        ImageSource,
        Threshold,
        ShiftScale,
        BoxMean,
        Add,
        Statistics,
        Crop,
    );
}

/// Filter id of a built-in: the base name followed by the pixel type.
fn filter_id<P: Pixel>(base: &str) -> String {
    format!("{}_{}", base, P::PIXEL_TYPE.name())
}

/// Write `f(input)` into output 0 for every pixel of its requested region.
fn map_pixels<P: Pixel>(
    ctx: &GenerateContext,
    f: impl Fn(P) -> P,
) -> Result<(), ExecutionError> {
    let region = ctx.output_region(0).clone();
    let input = ctx.input_image::<P>(0)?;
    let mut output = ctx.output_image::<P>(0)?;

    let mut complete = true;
    region.for_each_row(|start, len| {
        match (input.row(start, len), output.row_mut(start, len)) {
            (Some(src), Some(dst)) => {
                for (d, s) in dst.iter_mut().zip(src) {
                    *d = f(*s);
                }
            }
            _ => complete = false,
        }
    });

    if complete {
        Ok(())
    } else {
        Err(ctx.failure(format!("input does not cover {}", region)))
    }
}
