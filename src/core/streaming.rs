//! Region splitting and memory accounting for streamed updates.
//!
//! A streamed update produces a large region in several smaller passes.
//! This module decides how a region is cut into pieces and how many pieces
//! a memory budget calls for. The update engine drives the passes.

use crate::core::region::Region;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Default memory limit (500 MB).
pub const DEFAULT_MEMORY_LIMIT: usize = 500 * 1024 * 1024;

/// Bytes of working memory per output byte assumed when sizing pieces
/// (input plus output).
const WORKING_MEMORY_FACTOR: usize = 2;

/// How a region is cut into pieces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitStrategy {
    /// Contiguous slabs along the slowest varying axis of extent > 1.
    #[default]
    SlowestAxis,
    /// A grid of blocks, cutting the longest axes first.
    Tiles,
}

impl SplitStrategy {
    /// Cut `region` into at most `pieces` disjoint regions whose union is
    /// `region`.
    ///
    /// An empty region yields no pieces. Fewer pieces than asked for come
    /// back when the region is too small to be cut that finely.
    pub fn split(&self, region: &Region, pieces: usize) -> Vec<Region> {
        if region.is_empty() {
            return Vec::new();
        }
        if pieces <= 1 || region.dimension() == 0 {
            return vec![region.clone()];
        }
        match self {
            SplitStrategy::SlowestAxis => {
                match (0..region.dimension()).rev().find(|&a| region.size()[a] > 1) {
                    Some(axis) => region.split_along(axis, pieces),
                    None => vec![region.clone()],
                }
            }
            SplitStrategy::Tiles => split_tiles(region, pieces),
        }
    }
}

fn prime_factors(mut n: usize) -> Vec<usize> {
    let mut factors = Vec::new();
    let mut p = 2;
    while p * p <= n {
        while n % p == 0 {
            factors.push(p);
            n /= p;
        }
        p += 1;
    }
    if n > 1 {
        factors.push(n);
    }
    factors.reverse();
    factors
}

fn split_tiles(region: &Region, pieces: usize) -> Vec<Region> {
    let size = region.size();
    let mut cuts = vec![1usize; region.dimension()];
    for factor in prime_factors(pieces) {
        // Longest extent per block that can still take the cut.
        let axis = (0..region.dimension())
            .filter(|&a| size[a] / cuts[a] >= factor)
            .max_by_key(|&a| (size[a] / cuts[a], a));
        if let Some(axis) = axis {
            cuts[axis] *= factor;
        }
    }

    // Per-axis (offset, len) bounds, remainders spread over the first blocks.
    let bounds: Vec<Vec<(i64, usize)>> = (0..region.dimension())
        .map(|a| {
            let (len, k) = (size[a], cuts[a]);
            let (base, extra) = (len / k, len % k);
            let mut offset = region.index()[a];
            (0..k)
                .map(|i| {
                    let part = base + usize::from(i < extra);
                    let block = (offset, part);
                    offset += part as i64;
                    block
                })
                .collect()
        })
        .collect();

    let grid = Region::from_size(&cuts);
    let mut result = Vec::with_capacity(grid.number_of_pixels());
    grid.for_each_index(|cell| {
        let (index, size): (Vec<i64>, Vec<usize>) = cell
            .iter()
            .enumerate()
            .map(|(a, &c)| bounds[a][c as usize])
            .unzip();
        if let Ok(piece) = Region::new(index, size) {
            result.push(piece);
        }
    });
    result
}

/// Streaming settings of an update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Fixed number of pieces. `None` derives it from the memory limit.
    pub pieces: Option<usize>,
    /// How regions are cut.
    pub strategy: SplitStrategy,
    /// Maximum working memory of one piece in bytes.
    pub memory_limit: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            pieces: None,
            strategy: SplitStrategy::SlowestAxis,
            memory_limit: DEFAULT_MEMORY_LIMIT,
        }
    }
}

impl StreamingConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a fixed number of pieces.
    pub fn with_pieces(mut self, pieces: usize) -> Self {
        self.pieces = Some(pieces.max(1));
        self
    }

    /// Set the split strategy.
    pub fn with_strategy(mut self, strategy: SplitStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the memory limit in bytes.
    pub fn with_memory_limit(mut self, limit: usize) -> Self {
        self.memory_limit = limit;
        self
    }

    /// Set the memory limit in megabytes.
    pub fn with_memory_limit_mb(mut self, mb: usize) -> Self {
        self.memory_limit = mb * 1024 * 1024;
        self
    }

    /// Number of pieces to produce `region` with elements of
    /// `element_size` bytes.
    pub fn pieces_for(&self, region: &Region, element_size: usize) -> usize {
        if let Some(pieces) = self.pieces {
            return pieces.max(1);
        }
        let bytes = region
            .number_of_pixels()
            .saturating_mul(element_size)
            .saturating_mul(WORKING_MEMORY_FACTOR);
        if self.memory_limit == 0 || bytes <= self.memory_limit {
            1
        } else {
            bytes.div_ceil(self.memory_limit)
        }
    }

    /// Cut `region` into `pieces` pieces with the configured strategy.
    pub fn split(&self, region: &Region, pieces: usize) -> Vec<Region> {
        self.strategy.split(region, pieces)
    }
}

/// Tracks memory claimed by in-flight pieces against a limit.
#[derive(Debug)]
pub struct MemoryTracker {
    /// Current memory usage in bytes.
    current: AtomicUsize,
    /// Peak memory usage in bytes.
    peak: AtomicUsize,
    /// Memory limit in bytes.
    limit: usize,
}

impl MemoryTracker {
    /// Create a new memory tracker with the given limit.
    pub fn new(limit: usize) -> Self {
        Self {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            limit,
        }
    }

    /// Claim `bytes`. Returns false if that would exceed the limit.
    pub fn try_allocate(&self, bytes: usize) -> bool {
        let mut current = self.current.load(Ordering::Relaxed);
        loop {
            let Some(next) = current.checked_add(bytes).filter(|n| *n <= self.limit) else {
                return false;
            };
            match self.current.compare_exchange_weak(
                current,
                next,
                Ordering::SeqCst,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    self.peak.fetch_max(next, Ordering::SeqCst);
                    return true;
                }
                Err(c) => current = c,
            }
        }
    }

    /// Release claimed memory.
    pub fn release(&self, bytes: usize) {
        self.current.fetch_sub(bytes, Ordering::SeqCst);
    }

    /// Get current memory usage.
    pub fn current_usage(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }

    /// Get peak memory usage.
    pub fn peak_usage(&self) -> usize {
        self.peak.load(Ordering::Relaxed)
    }

    /// Get the memory limit.
    pub fn limit(&self) -> usize {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn assert_exact_cover(region: &Region, pieces: &[Region]) {
        let total: usize = pieces.iter().map(|p| p.number_of_pixels()).sum();
        assert_eq!(total, region.number_of_pixels());
        for (i, a) in pieces.iter().enumerate() {
            assert!(region.contains(a));
            for b in &pieces[i + 1..] {
                assert!(a.intersection(b).is_empty());
            }
        }
    }

    #[test]
    fn test_slowest_axis_split() {
        let region = Region::from_size(&[10, 10]);
        let pieces = SplitStrategy::SlowestAxis.split(&region, 4);
        assert_eq!(pieces.len(), 4);
        assert!(pieces.iter().all(|p| p.size()[0] == 10));
        assert_exact_cover(&region, &pieces);
    }

    #[test]
    fn test_slowest_axis_skips_flat_axes() {
        let region = Region::from_size(&[6, 4, 1]);
        let pieces = SplitStrategy::SlowestAxis.split(&region, 2);
        assert_eq!(pieces.len(), 2);
        assert!(pieces.iter().all(|p| p.size()[1] == 2));
    }

    #[test]
    fn test_tiles_split() {
        let region = Region::new(vec![-3, 5], vec![12, 6]).unwrap();
        let pieces = SplitStrategy::Tiles.split(&region, 6);
        assert_eq!(pieces.len(), 6);
        assert_exact_cover(&region, &pieces);
    }

    #[test]
    fn test_degenerate_splits() {
        let empty = Region::from_size(&[0, 5]);
        assert!(SplitStrategy::SlowestAxis.split(&empty, 3).is_empty());
        assert!(SplitStrategy::Tiles.split(&empty, 3).is_empty());

        let scalar = Region::scalar();
        assert_eq!(SplitStrategy::Tiles.split(&scalar, 4), vec![scalar.clone()]);

        let single = Region::from_size(&[1, 1]);
        assert_eq!(SplitStrategy::SlowestAxis.split(&single, 8).len(), 1);
        assert_eq!(SplitStrategy::Tiles.split(&single, 8).len(), 1);
    }

    #[test]
    fn test_pieces_for_memory() {
        let region = Region::from_size(&[100, 100]);
        let config = StreamingConfig::new().with_memory_limit(10_000);
        // 100 * 100 * 4 bytes * 2 = 80_000 bytes
        assert_eq!(config.pieces_for(&region, 4), 8);
        assert_eq!(config.clone().with_pieces(3).pieces_for(&region, 4), 3);
        assert_eq!(StreamingConfig::new().pieces_for(&region, 4), 1);
    }

    #[test]
    fn test_memory_tracker() {
        let tracker = MemoryTracker::new(100);
        assert!(tracker.try_allocate(60));
        assert!(!tracker.try_allocate(50));
        assert!(tracker.try_allocate(40));
        tracker.release(100);
        assert_eq!(tracker.current_usage(), 0);
        assert_eq!(tracker.peak_usage(), 100);
        assert!(!tracker.try_allocate(usize::MAX));
    }

    #[test]
    fn test_config_from_toml() {
        let config: StreamingConfig =
            toml::from_str("pieces = 4\nstrategy = \"tiles\"").unwrap();
        assert_eq!(config.pieces, Some(4));
        assert_eq!(config.strategy, SplitStrategy::Tiles);
        assert_eq!(config.memory_limit, DEFAULT_MEMORY_LIMIT);
    }

    proptest! {
        #[test]
        fn prop_split_is_exact_cover(
            w in 1usize..30, h in 1usize..30, d in 1usize..4,
            x in -10i64..10, y in -10i64..10,
            pieces in 1usize..24,
            tiles in any::<bool>(),
        ) {
            let region = Region::new(vec![x, y, 0], vec![w, h, d]).unwrap();
            let strategy = if tiles { SplitStrategy::Tiles } else { SplitStrategy::SlowestAxis };
            let parts = strategy.split(&region, pieces);
            prop_assert!(!parts.is_empty());
            prop_assert!(parts.len() <= pieces);
            let total: usize = parts.iter().map(|p| p.number_of_pixels()).sum();
            prop_assert_eq!(total, region.number_of_pixels());
            for (i, a) in parts.iter().enumerate() {
                prop_assert!(!a.is_empty());
                prop_assert!(region.contains(a));
                for b in &parts[i + 1..] {
                    prop_assert!(a.intersection(b).is_empty());
                }
            }
        }
    }
}
