//! Level-of-detail selection by viewing distance.
//!
//! Each LOD level has a maximum useful viewing distance; a tile is shown
//! at the LOD whose band contains its distance from the viewer. Beyond
//! the coarsest band no streamed tile applies and queries fall through to
//! the base fallback.

use serde::{Deserialize, Serialize};

/// Default per-LOD maximum distances, finest first.
pub const DEFAULT_LOD_MAX_DISTANCES: [f32; 4] = [1000.0, 2500.0, 6000.0, 14000.0];

/// Monotonic table of per-LOD maximum viewing distances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LodBands {
    max_distances: Vec<f32>,
}

impl LodBands {
    /// Creates bands from an explicit distance table, finest first.
    ///
    /// # Panics
    ///
    /// Panics if the table is empty or not strictly increasing.
    #[must_use]
    pub fn new(max_distances: Vec<f32>) -> Self {
        assert!(!max_distances.is_empty(), "LOD band table must not be empty");
        assert!(
            max_distances.windows(2).all(|w| w[0] < w[1]),
            "LOD band distances must be strictly increasing"
        );
        Self { max_distances }
    }

    /// Creates bands for `num_lod_levels` using the default table,
    /// truncated or extended by doubling the last entry.
    #[must_use]
    pub fn for_levels(num_lod_levels: u32) -> Self {
        Self::from_table(&DEFAULT_LOD_MAX_DISTANCES, num_lod_levels)
    }

    /// Creates bands for `num_lod_levels` from a caller-supplied table,
    /// truncated or extended by doubling the last entry.
    #[must_use]
    pub fn from_table(table: &[f32], num_lod_levels: u32) -> Self {
        let mut distances: Vec<f32> = table.iter().copied().take(num_lod_levels as usize).collect();
        while distances.len() < num_lod_levels as usize {
            let last = *distances.last().unwrap_or(&DEFAULT_LOD_MAX_DISTANCES[0]);
            distances.push(last * 2.0);
        }
        Self::new(distances)
    }

    /// Number of LOD levels covered.
    #[must_use]
    pub fn levels(&self) -> u32 {
        self.max_distances.len() as u32
    }

    /// The LOD level appropriate for a viewing distance, or `None` when
    /// the distance lies beyond the coarsest band (base fallback only).
    #[must_use]
    pub fn lod_for_distance(&self, distance: f32) -> Option<u32> {
        self.max_distances
            .iter()
            .position(|&max| distance < max)
            .map(|lod| lod as u32)
    }

    /// Maximum useful distance for a LOD level.
    ///
    /// # Panics
    ///
    /// Panics if `lod` is out of range.
    #[must_use]
    pub fn max_distance(&self, lod: u32) -> f32 {
        self.max_distances[lod as usize]
    }

    /// The `[min, max)` distance interval served by a LOD level.
    #[must_use]
    pub fn band(&self, lod: u32) -> (f32, f32) {
        let min = if lod == 0 {
            0.0
        } else {
            self.max_distances[lod as usize - 1]
        };
        (min, self.max_distances[lod as usize])
    }
}
