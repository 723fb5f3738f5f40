//! Data objects flowing through a pipeline.
//!
//! A [`DataObject`] is the unit of exchange between filters. It carries the
//! metadata published by the information pass ([`DataInformation`]), the
//! region the last update asked for, the time it was last generated and a
//! typed buffer behind the [`Payload`] trait. Objects are shared between the
//! producing node and every consumer through a [`DataHandle`].

use crate::core::error::{NodeId, RegionError};
use crate::core::region::Region;
use crate::core::time::ModifiedTime;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

// ============================================================================
// Pixel Types
// ============================================================================

/// Element type of an image buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    F32,
    F64,
}

impl PixelType {
    /// All supported pixel types.
    pub const ALL: [PixelType; 8] = [
        PixelType::U8,
        PixelType::I8,
        PixelType::U16,
        PixelType::I16,
        PixelType::U32,
        PixelType::I32,
        PixelType::F32,
        PixelType::F64,
    ];

    /// Size of one element in bytes.
    pub fn size_bytes(&self) -> usize {
        match self {
            PixelType::U8 | PixelType::I8 => 1,
            PixelType::U16 | PixelType::I16 => 2,
            PixelType::U32 | PixelType::I32 | PixelType::F32 => 4,
            PixelType::F64 => 8,
        }
    }

    /// Short lowercase name, as used in filter ids.
    pub fn name(&self) -> &'static str {
        match self {
            PixelType::U8 => "u8",
            PixelType::I8 => "i8",
            PixelType::U16 => "u16",
            PixelType::I16 => "i16",
            PixelType::U32 => "u32",
            PixelType::I32 => "i32",
            PixelType::F32 => "f32",
            PixelType::F64 => "f64",
        }
    }
}

impl fmt::Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PixelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PixelType::ALL
            .iter()
            .find(|pt| pt.name() == s)
            .copied()
            .ok_or_else(|| format!("unknown pixel type '{}'", s))
    }
}

/// A scalar element type that images can be made of.
pub trait Pixel:
    Copy + Default + PartialEq + PartialOrd + fmt::Debug + Send + Sync + 'static
{
    /// Runtime tag of this type.
    const PIXEL_TYPE: PixelType;

    /// Widen to `f64`.
    fn to_f64(self) -> f64;

    /// Narrow from `f64`, rounding and saturating for integer types.
    fn from_f64(value: f64) -> Self;
}

macro_rules! impl_integer_pixel {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl Pixel for $t {
                const PIXEL_TYPE: PixelType = PixelType::$variant;

                fn to_f64(self) -> f64 {
                    self as f64
                }

                fn from_f64(value: f64) -> Self {
                    value.round() as $t
                }
            }
        )*
    };
}

impl_integer_pixel!(u8 => U8, i8 => I8, u16 => U16, i16 => I16, u32 => U32, i32 => I32);

impl Pixel for f32 {
    const PIXEL_TYPE: PixelType = PixelType::F32;

    fn to_f64(self) -> f64 {
        self as f64
    }

    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

impl Pixel for f64 {
    const PIXEL_TYPE: PixelType = PixelType::F64;

    fn to_f64(self) -> f64 {
        self
    }

    fn from_f64(value: f64) -> Self {
        value
    }
}

// ============================================================================
// Data Kinds and Information
// ============================================================================

/// What a data object holds, used to type-check slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    /// An image with the given pixel type.
    Image(PixelType),
    /// A non-spatial statistics summary.
    Summary,
    /// Accepts any kind. Only meaningful for input slots.
    Any,
}

impl DataKind {
    /// Whether a slot of this kind accepts data of kind `other`.
    pub fn accepts(&self, other: DataKind) -> bool {
        matches!(self, DataKind::Any) || *self == other
    }

    /// Bytes per element of this kind.
    pub fn element_size(&self) -> usize {
        match self {
            DataKind::Image(pt) => pt.size_bytes(),
            DataKind::Summary => std::mem::size_of::<Summary>(),
            DataKind::Any => 0,
        }
    }

    /// Create an empty payload of this kind.
    pub fn new_payload(&self) -> Option<Box<dyn Payload>> {
        match self {
            DataKind::Image(pt) => Some(match pt {
                PixelType::U8 => Box::new(Image::<u8>::new()),
                PixelType::I8 => Box::new(Image::<i8>::new()),
                PixelType::U16 => Box::new(Image::<u16>::new()),
                PixelType::I16 => Box::new(Image::<i16>::new()),
                PixelType::U32 => Box::new(Image::<u32>::new()),
                PixelType::I32 => Box::new(Image::<i32>::new()),
                PixelType::F32 => Box::new(Image::<f32>::new()),
                PixelType::F64 => Box::new(Image::<f64>::new()),
            }),
            DataKind::Summary => Some(Box::new(Summary::default())),
            DataKind::Any => None,
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataKind::Image(pt) => write!(f, "image<{}>", pt),
            DataKind::Summary => write!(f, "summary"),
            DataKind::Any => write!(f, "any"),
        }
    }
}

/// Metadata published for a data object by the information pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataInformation {
    /// Kind of data.
    pub kind: DataKind,
    /// Full extent the producer could ever generate.
    pub largest_region: Region,
    /// Physical distance between samples per axis.
    pub spacing: Vec<f64>,
    /// Physical position of index zero per axis.
    pub origin: Vec<f64>,
}

impl DataInformation {
    /// Information for an image with unit spacing and zero origin.
    pub fn image(pixel_type: PixelType, largest_region: Region) -> Self {
        let dim = largest_region.dimension();
        Self {
            kind: DataKind::Image(pixel_type),
            largest_region,
            spacing: vec![1.0; dim],
            origin: vec![0.0; dim],
        }
    }

    /// Information for a non-spatial summary.
    pub fn summary() -> Self {
        Self {
            kind: DataKind::Summary,
            largest_region: Region::scalar(),
            spacing: Vec::new(),
            origin: Vec::new(),
        }
    }

    /// Set the spacing.
    pub fn with_spacing(mut self, spacing: Vec<f64>) -> Self {
        self.spacing = spacing;
        self
    }

    /// Set the origin.
    pub fn with_origin(mut self, origin: Vec<f64>) -> Self {
        self.origin = origin;
        self
    }

    /// Same metadata with a different kind. Spatial metadata is kept.
    pub fn with_kind(mut self, kind: DataKind) -> Self {
        self.kind = kind;
        self
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// A typed buffer owned by a data object.
///
/// Buffers are sized only by the core through [`Payload::allocate`]; filters
/// read and write the elements of an already allocated buffer.
pub trait Payload: Any + Send + Sync + fmt::Debug {
    /// Kind of data held.
    fn kind(&self) -> DataKind;

    /// Make the buffer cover exactly `region`.
    ///
    /// Returns `true` when the underlying storage had to grow.
    fn allocate(&mut self, region: &Region) -> Result<bool, String>;

    /// Drop the buffer contents and storage.
    fn release(&mut self);

    /// Region the buffer currently covers.
    fn buffered_region(&self) -> Option<&Region>;

    /// Bytes held by the buffer.
    fn byte_size(&self) -> usize;

    /// Copy `region` from `source` into this buffer.
    fn paste(&mut self, source: &dyn Payload, region: &Region) -> Result<(), String>;

    /// A fresh, unallocated payload of the same concrete type.
    fn empty_like(&self) -> Box<dyn Payload>;

    /// Downcast support.
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcast support.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A dimension-generic image buffer.
///
/// Elements are stored with axis 0 varying fastest over the buffered region.
#[derive(Debug, Clone, PartialEq)]
pub struct Image<P: Pixel> {
    region: Option<Region>,
    data: Vec<P>,
}

impl<P: Pixel> Image<P> {
    /// An image with no buffer.
    pub fn new() -> Self {
        Self {
            region: None,
            data: Vec::new(),
        }
    }

    /// An image covering `region`, filled with the default value.
    pub fn allocated(region: Region) -> Self {
        let data = vec![P::default(); region.number_of_pixels()];
        Self {
            region: Some(region),
            data,
        }
    }

    /// An image covering `region` with the given elements.
    pub fn from_vec(region: Region, data: Vec<P>) -> Result<Self, RegionError> {
        let expected = region.number_of_pixels();
        if data.len() != expected {
            return Err(RegionError::BufferSizeMismatch {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            region: Some(region),
            data,
        })
    }

    /// An image covering `region` computed element by element.
    pub fn from_fn(region: Region, mut f: impl FnMut(&[i64]) -> P) -> Self {
        let mut data = Vec::with_capacity(region.number_of_pixels());
        region.for_each_index(|idx| data.push(f(idx)));
        Self {
            region: Some(region),
            data,
        }
    }

    /// Region covered by the buffer.
    pub fn region(&self) -> Option<&Region> {
        self.region.as_ref()
    }

    /// Linear offset of `idx` in the buffer.
    pub fn offset(&self, idx: &[i64]) -> Option<usize> {
        self.region.as_ref()?.offset_of(idx)
    }

    /// Element at `idx`, if buffered.
    pub fn get(&self, idx: &[i64]) -> Option<P> {
        self.offset(idx).map(|o| self.data[o])
    }

    /// Set the element at `idx`. Returns `false` if it is not buffered.
    pub fn set(&mut self, idx: &[i64], value: P) -> bool {
        match self.offset(idx) {
            Some(o) => {
                self.data[o] = value;
                true
            }
            None => false,
        }
    }

    /// The `len` elements of a row starting at `start`.
    pub fn row(&self, start: &[i64], len: usize) -> Option<&[P]> {
        let o = self.offset(start)?;
        self.data.get(o..o + len)
    }

    /// Mutable access to a row.
    pub fn row_mut(&mut self, start: &[i64], len: usize) -> Option<&mut [P]> {
        let o = self.offset(start)?;
        self.data.get_mut(o..o + len)
    }

    /// All buffered elements in buffer order.
    pub fn as_slice(&self) -> &[P] {
        &self.data
    }

    /// Mutable access to all buffered elements.
    pub fn as_mut_slice(&mut self) -> &mut [P] {
        &mut self.data
    }

    /// Set every buffered element to `value`.
    pub fn fill(&mut self, value: P) {
        self.data.iter_mut().for_each(|v| *v = value);
    }

    /// Copy of the elements inside `region`, in buffer order of `region`.
    pub fn extract(&self, region: &Region) -> Option<Vec<P>> {
        if !self.region.as_ref()?.contains(region) {
            return None;
        }
        let mut out = Vec::with_capacity(region.number_of_pixels());
        let mut ok = true;
        region.for_each_row(|start, len| match self.row(start, len) {
            Some(row) => out.extend_from_slice(row),
            None => ok = false,
        });
        ok.then_some(out)
    }
}

impl<P: Pixel> Default for Image<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Pixel> Payload for Image<P> {
    fn kind(&self) -> DataKind {
        DataKind::Image(P::PIXEL_TYPE)
    }

    fn allocate(&mut self, region: &Region) -> Result<bool, String> {
        if self.region.as_ref() == Some(region) {
            return Ok(false);
        }
        let count = region
            .checked_number_of_pixels()
            .ok_or_else(|| format!("element count of {} overflows", region))?;
        count
            .checked_mul(std::mem::size_of::<P>())
            .filter(|bytes| *bytes <= isize::MAX as usize)
            .ok_or_else(|| format!("byte size of {} overflows", region))?;

        let grew = count > self.data.capacity();
        self.data.clear();
        self.data
            .try_reserve_exact(count)
            .map_err(|e| format!("cannot reserve {} elements: {}", count, e))?;
        self.data.resize(count, P::default());
        self.region = Some(region.clone());
        Ok(grew)
    }

    fn release(&mut self) {
        self.region = None;
        self.data = Vec::new();
    }

    fn buffered_region(&self) -> Option<&Region> {
        self.region.as_ref()
    }

    fn byte_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<P>()
    }

    fn paste(&mut self, source: &dyn Payload, region: &Region) -> Result<(), String> {
        let source = source
            .as_any()
            .downcast_ref::<Image<P>>()
            .ok_or_else(|| format!("cannot paste {} into {}", source.kind(), self.kind()))?;
        let (Some(src_region), Some(dst_region)) = (source.region(), self.region.as_ref()) else {
            return Err("paste between unallocated buffers".to_string());
        };
        if !src_region.contains(region) || !dst_region.contains(region) {
            return Err(format!(
                "paste region {} not covered by source {} and destination {}",
                region, src_region, dst_region
            ));
        }
        region.for_each_row(|start, len| {
            if let (Some(src), Some(dst)) = (source.row(start, len), self.row_mut(start, len)) {
                dst.copy_from_slice(src);
            }
        });
        Ok(())
    }

    fn empty_like(&self) -> Box<dyn Payload> {
        Box::new(Image::<P>::new())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Descriptive statistics of an image, a non-spatial payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Number of samples.
    pub count: usize,
    /// Sum of all samples.
    pub sum: f64,
    /// Arithmetic mean.
    pub mean: f64,
    /// Unbiased sample variance.
    pub variance: f64,
    /// Standard deviation.
    pub sigma: f64,
    /// Smallest sample.
    pub minimum: f64,
    /// Largest sample.
    pub maximum: f64,
    #[serde(skip)]
    region: Option<Region>,
}

impl Summary {
    /// Compute the statistics of a sequence of samples.
    ///
    /// Returns `None` for an empty sequence.
    pub fn from_samples(samples: impl IntoIterator<Item = f64>) -> Option<Self> {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        let mut minimum = f64::INFINITY;
        let mut maximum = f64::NEG_INFINITY;
        for v in samples {
            count += 1;
            sum += v;
            sum_sq += v * v;
            minimum = minimum.min(v);
            maximum = maximum.max(v);
        }
        if count == 0 {
            return None;
        }
        let n = count as f64;
        let mean = sum / n;
        let variance = if count > 1 {
            ((sum_sq - sum * sum / n) / (n - 1.0)).max(0.0)
        } else {
            0.0
        };
        Some(Self {
            count,
            sum,
            mean,
            variance,
            sigma: variance.sqrt(),
            minimum,
            maximum,
            region: None,
        })
    }

    /// Overwrite the statistics, keeping the buffer state.
    pub fn assign(&mut self, other: &Summary) {
        let region = self.region.take();
        *self = other.clone();
        self.region = region;
    }
}

impl Payload for Summary {
    fn kind(&self) -> DataKind {
        DataKind::Summary
    }

    fn allocate(&mut self, region: &Region) -> Result<bool, String> {
        if region.dimension() != 0 {
            return Err(format!("summary cannot cover spatial region {}", region));
        }
        self.region = Some(Region::scalar());
        Ok(false)
    }

    fn release(&mut self) {
        *self = Summary::default();
    }

    fn buffered_region(&self) -> Option<&Region> {
        self.region.as_ref()
    }

    fn byte_size(&self) -> usize {
        if self.region.is_some() {
            std::mem::size_of::<Summary>()
        } else {
            0
        }
    }

    fn paste(&mut self, source: &dyn Payload, _region: &Region) -> Result<(), String> {
        let source = source
            .as_any()
            .downcast_ref::<Summary>()
            .ok_or_else(|| format!("cannot paste {} into summary", source.kind()))?;
        self.assign(source);
        self.region = Some(Region::scalar());
        Ok(())
    }

    fn empty_like(&self) -> Box<dyn Payload> {
        Box::new(Summary::default())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ============================================================================
// Data Objects
// ============================================================================

/// Identifies the node output that produces a data object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputRef {
    /// Producing node.
    pub node_id: NodeId,
    /// Output slot index on that node.
    pub index: usize,
}

impl fmt::Display for OutputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node_id, self.index)
    }
}

/// A unit of data exchanged between pipeline stages.
#[derive(Debug, Default)]
pub struct DataObject {
    information: Option<DataInformation>,
    requested_region: Option<Region>,
    pinned_region: Option<Region>,
    source: Option<OutputRef>,
    modified: ModifiedTime,
    payload: Option<Box<dyn Payload>>,
}

impl DataObject {
    /// An empty object produced by the given node output.
    pub fn for_output(source: OutputRef) -> Self {
        Self {
            source: Some(source),
            ..Self::default()
        }
    }

    /// An object supplied from outside any pipeline.
    pub fn external(information: DataInformation, payload: Box<dyn Payload>) -> Self {
        let requested_region = payload.buffered_region().cloned();
        Self {
            information: Some(information),
            requested_region,
            pinned_region: None,
            source: None,
            modified: ModifiedTime::tick(),
            payload: Some(payload),
        }
    }

    /// Metadata from the last information pass.
    pub fn information(&self) -> Option<&DataInformation> {
        self.information.as_ref()
    }

    pub(crate) fn set_information(&mut self, information: DataInformation) {
        self.information = Some(information);
    }

    /// Kind of data, once known.
    pub fn kind(&self) -> Option<DataKind> {
        self.information.as_ref().map(|i| i.kind)
    }

    /// Full extent the producer could ever generate.
    pub fn largest_possible_region(&self) -> Option<&Region> {
        self.information.as_ref().map(|i| &i.largest_region)
    }

    /// Region asked for by the last update.
    pub fn requested_region(&self) -> Option<&Region> {
        self.requested_region.as_ref()
    }

    pub(crate) fn set_requested_region(&mut self, region: Region) {
        self.requested_region = Some(region);
    }

    /// Region pinned by the user for the next update, if any.
    pub fn pinned_region(&self) -> Option<&Region> {
        self.pinned_region.as_ref()
    }

    /// Pin the region that updates of this object should produce.
    pub fn pin_region(&mut self, region: Option<Region>) {
        self.pinned_region = region;
    }

    /// Region actually held by the buffer.
    pub fn buffered_region(&self) -> Option<&Region> {
        self.payload.as_ref().and_then(|p| p.buffered_region())
    }

    /// Whether the buffer holds all of `region`.
    pub fn buffered_contains(&self, region: &Region) -> bool {
        match self.buffered_region() {
            Some(buffered) => buffered.contains(region),
            None => false,
        }
    }

    /// Producing node output, or `None` for external data.
    pub fn source(&self) -> Option<OutputRef> {
        self.source
    }

    pub(crate) fn disconnect_source(&mut self) {
        self.source = None;
    }

    /// Time the contents last changed.
    pub fn modified(&self) -> ModifiedTime {
        self.modified
    }

    /// Record an external change to the contents.
    pub fn modify(&mut self) {
        self.modified = ModifiedTime::tick();
    }

    pub(crate) fn mark_generated(&mut self, at: ModifiedTime) {
        self.modified = at;
    }

    /// The payload, if any.
    pub fn payload(&self) -> Option<&dyn Payload> {
        self.payload.as_deref()
    }

    /// The payload downcast to its concrete type.
    pub fn payload_as<T: Payload>(&self) -> Option<&T> {
        self.payload.as_ref()?.as_any().downcast_ref::<T>()
    }

    /// Mutable access to the payload. Counts as a modification.
    pub fn payload_mut<T: Payload>(&mut self) -> Option<&mut T> {
        self.modified = ModifiedTime::tick();
        self.payload_mut_untracked()
    }

    pub(crate) fn payload_mut_untracked<T: Payload>(&mut self) -> Option<&mut T> {
        self.payload.as_mut()?.as_any_mut().downcast_mut::<T>()
    }

    /// Replace the payload wholesale.
    pub(crate) fn install_payload(&mut self, payload: Box<dyn Payload>) {
        self.payload = Some(payload);
    }

    pub(crate) fn take_payload(&mut self) -> Option<Box<dyn Payload>> {
        self.payload.take()
    }

    /// Size the buffer to `region`, creating it on first use.
    ///
    /// Returns `true` when new storage was obtained.
    pub(crate) fn allocate(&mut self, region: &Region) -> Result<bool, String> {
        let kind = self
            .kind()
            .ok_or_else(|| "data information not generated".to_string())?;
        let mut created = false;
        if self.payload.as_ref().map(|p| p.kind()) != Some(kind) {
            let payload = kind
                .new_payload()
                .ok_or_else(|| format!("cannot allocate data of kind {}", kind))?;
            self.payload = Some(payload);
            created = true;
        }
        match self.payload.as_mut() {
            Some(payload) => Ok(payload.allocate(region)? || created),
            None => Err("payload missing".to_string()),
        }
    }

    /// Drop the buffer contents.
    pub fn release(&mut self) {
        if let Some(payload) = self.payload.as_mut() {
            payload.release();
        }
    }

    /// Bytes held by the buffer.
    pub fn byte_size(&self) -> usize {
        self.payload.as_ref().map_or(0, |p| p.byte_size())
    }
}

/// Shared ownership of a data object.
///
/// Cloning a handle shares the object; the object lives while any handle
/// does.
#[derive(Debug, Clone, Default)]
pub struct DataHandle(Arc<RwLock<DataObject>>);

impl DataHandle {
    /// Wrap a data object.
    pub fn new(object: DataObject) -> Self {
        Self(Arc::new(RwLock::new(object)))
    }

    /// External data holding `image`.
    pub fn from_image<P: Pixel>(image: Image<P>) -> Self {
        let largest = image
            .region()
            .cloned()
            .unwrap_or_else(|| Region::from_size(&[0]));
        let information = DataInformation::image(P::PIXEL_TYPE, largest);
        Self::new(DataObject::external(information, Box::new(image)))
    }

    /// Shared read access.
    pub fn read(&self) -> RwLockReadGuard<'_, DataObject> {
        self.0.read()
    }

    /// Read access that never waits behind a queued writer.
    pub(crate) fn read_recursive(&self) -> RwLockReadGuard<'_, DataObject> {
        self.0.read_recursive()
    }

    /// Exclusive write access.
    pub fn write(&self) -> RwLockWriteGuard<'_, DataObject> {
        self.0.write()
    }

    /// Producing node output, or `None` for external data.
    pub fn source(&self) -> Option<OutputRef> {
        self.0.read().source()
    }

    /// Time the contents last changed.
    pub fn modified(&self) -> ModifiedTime {
        self.0.read().modified()
    }

    /// Record an external change to the contents.
    pub fn modify(&self) {
        self.0.write().modify();
    }

    /// Whether both handles share the same object.
    pub fn ptr_eq(&self, other: &DataHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Clone of the image held, if it is an image of `P`.
    pub fn image<P: Pixel>(&self) -> Option<Image<P>> {
        self.0.read().payload_as::<Image<P>>().cloned()
    }

    /// Clone of the summary held, if any.
    pub fn summary(&self) -> Option<Summary> {
        self.0.read().payload_as::<Summary>().cloned()
    }
}
