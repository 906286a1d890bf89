//! A single resident or CPU-only terrain height tile.

use bytemuck::{Pod, Zeroable};

use relief_common::{TileBounds, TileCoord};

use crate::layers::LayerId;
use crate::source::TileSamples;

/// Residency state of a loaded tile.
///
/// A tile only exists after a successful CPU load, so "resident without
/// data" is unrepresentable: `Resident` merely adds the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Residency {
    /// CPU sample data only; not visible to the renderer
    CpuOnly,
    /// Occupies a layer slot; data is GPU-visible
    Resident(LayerId),
}

/// A terrain height tile known to the cache.
///
/// Bounds are computed once at load time and never change; the sample
/// grid is immutable after load. Only the residency state transitions.
#[derive(Debug)]
pub struct Tile {
    /// Grid coordinate within this tile's LOD
    pub coord: TileCoord,
    /// LOD level (0 is finest)
    pub lod: u32,
    /// World-space footprint
    pub bounds: TileBounds,
    /// Decoded height samples
    pub samples: TileSamples,
    /// Current residency state
    pub residency: Residency,
}

impl Tile {
    /// Creates a CPU-only tile from freshly decoded samples.
    #[must_use]
    pub fn new(coord: TileCoord, lod: u32, bounds: TileBounds, samples: TileSamples) -> Self {
        Self {
            coord,
            lod,
            bounds,
            samples,
            residency: Residency::CpuOnly,
        }
    }

    /// Whether this tile currently occupies a layer slot.
    #[must_use]
    pub const fn is_resident(&self) -> bool {
        matches!(self.residency, Residency::Resident(_))
    }

    /// The occupied slot, if resident.
    #[must_use]
    pub const fn slot(&self) -> Option<LayerId> {
        match self.residency {
            Residency::Resident(id) => Some(id),
            Residency::CpuOnly => None,
        }
    }

    /// Half-open containment test against the tile's world bounds.
    #[must_use]
    pub fn contains(&self, world_x: f32, world_z: f32) -> bool {
        self.bounds.contains(world_x, world_z)
    }

    /// Bilinearly samples the height grid at a world position and
    /// denormalizes into world altitude.
    ///
    /// The caller must ensure the point is inside (or clamped against)
    /// the tile's bounds; coordinates are clamped to the grid edge.
    /// Sampling is identical regardless of residency.
    #[must_use]
    pub fn sample_height(&self, world_x: f32, world_z: f32, height_scale: f32, min_altitude: f32) -> f32 {
        let size = self.bounds.size();
        let u = ((world_x - self.bounds.min_x) / size.x).clamp(0.0, 1.0);
        let v = ((world_z - self.bounds.min_z) / size.y).clamp(0.0, 1.0);

        let res = self.samples.resolution as usize;
        let fx = u * (res - 1) as f32;
        let fz = v * (res - 1) as f32;

        let x0 = fx as usize;
        let z0 = fz as usize;
        let x1 = (x0 + 1).min(res - 1);
        let z1 = (z0 + 1).min(res - 1);

        let tx = fx - x0 as f32;
        let tz = fz - z0 as f32;

        let grid = &self.samples.samples;
        let h00 = grid[z0 * res + x0];
        let h10 = grid[z0 * res + x1];
        let h01 = grid[z1 * res + x0];
        let h11 = grid[z1 * res + x1];

        let h0 = h00 * (1.0 - tx) + h10 * tx;
        let h1 = h01 * (1.0 - tx) + h11 * tx;
        let h = h0 * (1.0 - tz) + h1 * tz;

        h * height_scale + min_altitude
    }
}

/// Renderer-visible record for one active tile (48 bytes = 12 x f32).
///
/// `uv_scale_offset` maps world position to tile UV:
/// `uv = world * scale + offset`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TileSlotInfo {
    /// World bounds as (min_x, min_z, max_x, max_z)
    pub world_bounds: [f32; 4],
    /// UV mapping as (scale_x, scale_z, offset_x, offset_z)
    pub uv_scale_offset: [f32; 4],
    /// Occupied layer slot index
    pub slot: u32,
    /// LOD level of the tile
    pub lod: u32,
    /// Padding to 16-byte alignment
    pub _pad: [u32; 2],
}

impl TileSlotInfo {
    /// Builds the record for a resident tile.
    ///
    /// Returns `None` for a CPU-only tile.
    #[must_use]
    pub fn for_tile(tile: &Tile) -> Option<Self> {
        let slot = tile.slot()?;
        let b = tile.bounds;
        let size = b.size();
        Some(Self {
            world_bounds: [b.min_x, b.min_z, b.max_x, b.max_z],
            uv_scale_offset: [
                1.0 / size.x,
                1.0 / size.y,
                -b.min_x / size.x,
                -b.min_z / size.y,
            ],
            slot: slot.raw(),
            lod: tile.lod,
            _pad: [0; 2],
        })
    }
}
