//! N-dimensional index regions.
//!
//! A [`Region`] is an axis-aligned box in index space: a start index and a
//! size per dimension. Regions describe what a consumer asks for (requested),
//! what a data object actually holds (buffered) and what could exist at all
//! (largest possible). Axis 0 is the fastest varying axis in every buffer
//! layout, so the last axis is the slowest.
//!
//! A zero-dimensional region describes a non-spatial object such as a
//! statistics summary. It holds exactly one element and is never empty.
//!
//! The exclusive end `index + size` of every axis fits in an `i64`.
//! [`Region::new`] and deserialization reject regions that break this, and
//! the operations producing new regions clamp to it.

use crate::core::error::RegionError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An axis-aligned index range over an N-dimensional index space.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "RegionParts")]
pub struct Region {
    index: Vec<i64>,
    size: Vec<usize>,
}

/// Unchecked serialized form of a [`Region`].
#[derive(Deserialize)]
struct RegionParts {
    index: Vec<i64>,
    size: Vec<usize>,
}

impl TryFrom<RegionParts> for Region {
    type Error = RegionError;

    fn try_from(parts: RegionParts) -> Result<Self, Self::Error> {
        Region::new(parts.index, parts.size)
    }
}

impl Region {
    /// Create a region from a start index and a size.
    pub fn new(index: Vec<i64>, size: Vec<usize>) -> Result<Self, RegionError> {
        if index.len() != size.len() {
            return Err(RegionError::DimensionMismatch {
                expected: size.len(),
                got: index.len(),
            });
        }
        for (axis, (&start, &len)) in index.iter().zip(&size).enumerate() {
            if start as i128 + len as i128 > i64::MAX as i128 {
                return Err(RegionError::Overflow {
                    axis,
                    index: start,
                    size: len,
                });
            }
        }
        Ok(Self { index, size })
    }

    /// Create a region starting at the origin.
    pub fn from_size(size: &[usize]) -> Self {
        Self {
            index: vec![0; size.len()],
            size: size.to_vec(),
        }
    }

    /// The zero-dimensional region of a non-spatial object.
    pub fn scalar() -> Self {
        Self::default()
    }

    /// Number of dimensions.
    pub fn dimension(&self) -> usize {
        self.size.len()
    }

    /// Start index per dimension.
    pub fn index(&self) -> &[i64] {
        &self.index
    }

    /// Size per dimension.
    pub fn size(&self) -> &[usize] {
        &self.size
    }

    /// Exclusive upper bound along `axis`.
    pub fn upper(&self, axis: usize) -> i64 {
        clamp(self.end(axis))
    }

    fn end(&self, axis: usize) -> i128 {
        self.index[axis] as i128 + self.size[axis] as i128
    }

    /// Number of elements covered by the region.
    pub fn number_of_pixels(&self) -> usize {
        self.size.iter().product()
    }

    /// Number of elements, or `None` if the product overflows.
    pub fn checked_number_of_pixels(&self) -> Option<usize> {
        self.size
            .iter()
            .try_fold(1usize, |acc, &len| acc.checked_mul(len))
    }

    /// Whether the region covers no elements at all.
    pub fn is_empty(&self) -> bool {
        self.size.iter().any(|&len| len == 0)
    }

    /// Whether `idx` lies inside the region.
    pub fn contains_index(&self, idx: &[i64]) -> bool {
        idx.len() == self.dimension()
            && (0..self.dimension())
                .all(|a| idx[a] >= self.index[a] && (idx[a] as i128) < self.end(a))
    }

    /// Whether `other` lies entirely inside this region.
    ///
    /// An empty region of the same dimension is contained in every region.
    pub fn contains(&self, other: &Region) -> bool {
        if other.dimension() != self.dimension() {
            return false;
        }
        if other.is_empty() {
            return true;
        }
        (0..self.dimension())
            .all(|a| other.index[a] >= self.index[a] && other.end(a) <= self.end(a))
    }

    /// The overlap of two regions.
    ///
    /// Disjoint regions yield an empty region. Regions of differing dimension
    /// have an empty intersection expressed in this region's dimension.
    pub fn intersection(&self, other: &Region) -> Region {
        if other.dimension() != self.dimension() {
            return Region {
                index: self.index.clone(),
                size: vec![0; self.dimension().max(1)],
            };
        }
        let mut index = Vec::with_capacity(self.dimension());
        let mut size = Vec::with_capacity(self.dimension());
        for a in 0..self.dimension() {
            let lo = self.index[a].max(other.index[a]);
            let hi = self.end(a).min(other.end(a));
            index.push(lo);
            size.push(span(lo as i128, hi));
        }
        Region { index, size }
    }

    /// Crop this region to `bounds`. Returns `false` when nothing overlaps.
    pub fn crop(&mut self, bounds: &Region) -> bool {
        *self = self.intersection(bounds);
        !self.is_empty()
    }

    /// The smallest region containing both regions.
    ///
    /// Empty regions do not contribute to the bounds.
    pub fn union_bounds(&self, other: &Region) -> Region {
        if other.is_empty() || other.dimension() != self.dimension() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        let mut index = Vec::with_capacity(self.dimension());
        let mut size = Vec::with_capacity(self.dimension());
        for a in 0..self.dimension() {
            let lo = self.index[a].min(other.index[a]);
            let hi = self.end(a).max(other.end(a));
            index.push(lo);
            size.push(span(lo as i128, hi));
        }
        Region { index, size }
    }

    /// Grow the region by `radius[a]` elements on both sides of each axis.
    ///
    /// The result is clamped to the `i64` index space.
    pub fn padded(&self, radius: &[usize]) -> Region {
        let mut index = self.index.clone();
        let mut size = self.size.clone();
        for a in 0..self.dimension() {
            let r = radius.get(a).copied().unwrap_or(0) as i128;
            let lo = clamp(self.index[a] as i128 - r);
            let hi = clamp(self.end(a) + r) as i128;
            index[a] = lo;
            size[a] = span(lo as i128, hi);
        }
        Region { index, size }
    }

    /// Grow the region by the same radius along every axis.
    pub fn padded_uniform(&self, radius: usize) -> Region {
        self.padded(&vec![radius; self.dimension()])
    }

    /// Linear offset of `idx` in a buffer laid out over this region.
    pub fn offset_of(&self, idx: &[i64]) -> Option<usize> {
        if !self.contains_index(idx) {
            return None;
        }
        let mut offset = 0usize;
        let mut stride = 1usize;
        for a in 0..self.dimension() {
            offset += (idx[a] as i128 - self.index[a] as i128) as usize * stride;
            stride *= self.size[a];
        }
        Some(offset)
    }

    /// Split into at most `pieces` contiguous slabs along `axis`.
    ///
    /// Every slab except possibly the last holds `ceil(len / pieces)`
    /// elements along the axis, so fewer slabs than requested may come back.
    pub fn split_along(&self, axis: usize, pieces: usize) -> Vec<Region> {
        if self.is_empty() {
            return Vec::new();
        }
        if axis >= self.dimension() || pieces <= 1 {
            return vec![self.clone()];
        }
        let len = self.size[axis];
        let pieces = pieces.min(len);
        let chunk = len.div_ceil(pieces);
        let mut result = Vec::with_capacity(pieces);
        let mut offset = 0;
        while offset < len {
            let mut piece = self.clone();
            piece.index[axis] += offset as i64;
            piece.size[axis] = chunk.min(len - offset);
            result.push(piece);
            offset += chunk;
        }
        result
    }

    /// Visit every row of the region.
    ///
    /// A row runs along axis 0; the callback receives the index of its first
    /// element and its length. A zero-dimensional region has a single row of
    /// length one.
    pub fn for_each_row(&self, mut f: impl FnMut(&[i64], usize)) {
        if self.is_empty() {
            return;
        }
        if self.dimension() == 0 {
            f(&[], 1);
            return;
        }
        let mut idx = self.index.clone();
        loop {
            f(&idx, self.size[0]);
            // Advance axes 1.. like an odometer.
            let mut axis = 1;
            loop {
                if axis >= self.dimension() {
                    return;
                }
                idx[axis] += 1;
                if idx[axis] < self.upper(axis) {
                    break;
                }
                idx[axis] = self.index[axis];
                axis += 1;
            }
        }
    }

    /// Visit every index of the region in buffer order.
    pub fn for_each_index(&self, mut f: impl FnMut(&[i64])) {
        self.for_each_row(|start, len| {
            let mut idx = start.to_vec();
            for k in 0..len {
                if !idx.is_empty() {
                    idx[0] = start[0] + k as i64;
                }
                f(&idx);
            }
        });
    }

    /// Collect every index of the region in buffer order.
    pub fn indices(&self) -> Vec<Vec<i64>> {
        let mut result = Vec::with_capacity(self.number_of_pixels());
        self.for_each_index(|idx| result.push(idx.to_vec()));
        result
    }
}

fn clamp(value: i128) -> i64 {
    value.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Length of `lo..hi`, zero when `hi <= lo`.
fn span(lo: i128, hi: i128) -> usize {
    usize::try_from((hi - lo).max(0)).unwrap_or(usize::MAX)
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}+{:?}", self.index, self.size)
    }
}
