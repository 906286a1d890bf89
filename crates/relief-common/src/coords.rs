//! Tile coordinates, packed cache keys, and world-to-grid mapping.
//!
//! A tile is identified by a [`TileCoord`] within one LOD's grid; the pair
//! `(coord, lod)` is made unique by packing into a [`TileKey`]. The
//! [`TileGrid`] maps between world space and grid cells for every LOD.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Clamp applied to normalized coordinates so exact-boundary positions
/// never index one past the last tile.
const NORM_MAX: f32 = 0.9999;

/// Bits reserved for each coordinate component in a packed [`TileKey`].
const KEY_COORD_BITS: u64 = 24;
const KEY_COORD_MASK: u64 = (1 << KEY_COORD_BITS) - 1;

/// Grid coordinate of a tile within a single LOD level.
///
/// Not unique across LODs; pair with a LOD level (see [`TileKey`]).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Pod, Zeroable,
)]
#[repr(C)]
pub struct TileCoord {
    /// X coordinate in the LOD's grid
    pub x: i32,
    /// Z coordinate in the LOD's grid
    pub z: i32,
}

impl TileCoord {
    /// Creates a new tile coordinate.
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Packed `(coord, lod)` identity of a tile.
///
/// Layout: `lod << 48 | x << 24 | z`, with each coordinate occupying 24
/// bits. Coordinates must be clamped to the grid (non-negative) before
/// keying; within that range the packing is collision-free and reversible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileKey(u64);

impl TileKey {
    /// Packs a clamped coordinate and LOD level into a key.
    #[must_use]
    pub const fn pack(coord: TileCoord, lod: u32) -> Self {
        let x = (coord.x as u64) & KEY_COORD_MASK;
        let z = (coord.z as u64) & KEY_COORD_MASK;
        Self(((lod as u64) << 48) | (x << KEY_COORD_BITS) | z)
    }

    /// Recovers the coordinate and LOD level from a key.
    #[must_use]
    pub const fn unpack(self) -> (TileCoord, u32) {
        let lod = (self.0 >> 48) as u32;
        let x = ((self.0 >> KEY_COORD_BITS) & KEY_COORD_MASK) as i32;
        let z = (self.0 & KEY_COORD_MASK) as i32;
        (TileCoord::new(x, z), lod)
    }

    /// LOD level encoded in this key.
    #[must_use]
    pub const fn lod(self) -> u32 {
        (self.0 >> 48) as u32
    }

    /// Raw packed value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (coord, lod) = self.unpack();
        write!(f, "{coord} lod{lod}")
    }
}

/// World-space axis-aligned footprint of a tile.
///
/// Membership is half-open: a point belongs to the tile when it lies in
/// `[min, max)` on both axes, matching the truncation direction of
/// [`TileGrid::world_to_tile`]. A point exactly at `max` belongs to the
/// neighboring tile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileBounds {
    /// Minimum world X (inclusive)
    pub min_x: f32,
    /// Minimum world Z (inclusive)
    pub min_z: f32,
    /// Maximum world X (exclusive)
    pub max_x: f32,
    /// Maximum world Z (exclusive)
    pub max_z: f32,
}

impl TileBounds {
    /// Half-open containment test.
    #[must_use]
    pub fn contains(&self, x: f32, z: f32) -> bool {
        x >= self.min_x && x < self.max_x && z >= self.min_z && z < self.max_z
    }

    /// Center of the footprint.
    #[must_use]
    pub fn center(&self) -> Vec2 {
        Vec2::new(
            (self.min_x + self.max_x) * 0.5,
            (self.min_z + self.max_z) * 0.5,
        )
    }

    /// Width and depth of the footprint.
    #[must_use]
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.max_x - self.min_x, self.max_z - self.min_z)
    }
}

/// World-to-grid mapping for a square terrain split into per-LOD tile
/// grids. Tile counts halve per LOD level, floored at one.
///
/// World space is centered on the origin: the terrain spans
/// `[-terrain_size/2, terrain_size/2)` on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileGrid {
    /// Terrain extent in world units (both axes).
    pub terrain_size: f32,
    /// Tile count along X at LOD 0.
    pub tiles_x: u32,
    /// Tile count along Z at LOD 0.
    pub tiles_z: u32,
    /// Number of LOD levels (LOD 0 is finest).
    pub num_lod_levels: u32,
}

impl TileGrid {
    /// Tile counts at a LOD level (halved per level, floored at 1).
    #[must_use]
    pub const fn tiles_at(&self, lod: u32) -> (u32, u32) {
        let tx = self.tiles_x >> lod;
        let tz = self.tiles_z >> lod;
        (if tx < 1 { 1 } else { tx }, if tz < 1 { 1 } else { tz })
    }

    /// Maps a world position to the tile containing it at a LOD level.
    ///
    /// Total function: positions outside the terrain clamp to the edge
    /// tiles. Deterministic truncation toward the grid origin.
    #[must_use]
    pub fn world_to_tile(&self, world_x: f32, world_z: f32, lod: u32) -> TileCoord {
        let norm_x = (world_x / self.terrain_size + 0.5).clamp(0.0, NORM_MAX);
        let norm_z = (world_z / self.terrain_size + 0.5).clamp(0.0, NORM_MAX);

        let (tiles_x, tiles_z) = self.tiles_at(lod);
        TileCoord::new(
            (norm_x * tiles_x as f32) as i32,
            (norm_z * tiles_z as f32) as i32,
        )
    }

    /// World-space footprint of a tile. Exact inverse of
    /// [`world_to_tile`](Self::world_to_tile) under half-open membership.
    #[must_use]
    pub fn tile_bounds(&self, coord: TileCoord, lod: u32) -> TileBounds {
        let (tiles_x, tiles_z) = self.tiles_at(lod);
        let size_x = self.terrain_size / tiles_x as f32;
        let size_z = self.terrain_size / tiles_z as f32;

        let min_x = (coord.x as f32 / tiles_x as f32 - 0.5) * self.terrain_size;
        let min_z = (coord.z as f32 / tiles_z as f32 - 0.5) * self.terrain_size;
        TileBounds {
            min_x,
            min_z,
            max_x: min_x + size_x,
            max_z: min_z + size_z,
        }
    }

    /// World-space center of a tile.
    #[must_use]
    pub fn tile_center(&self, coord: TileCoord, lod: u32) -> Vec2 {
        self.tile_bounds(coord, lod).center()
    }

    /// Clamps a coordinate into the valid grid range for a LOD level.
    #[must_use]
    pub fn clamp_coord(&self, coord: TileCoord, lod: u32) -> TileCoord {
        let (tiles_x, tiles_z) = self.tiles_at(lod);
        TileCoord::new(
            coord.x.clamp(0, tiles_x as i32 - 1),
            coord.z.clamp(0, tiles_z as i32 - 1),
        )
    }

    /// The coarsest LOD level.
    #[must_use]
    pub const fn coarsest_lod(&self) -> u32 {
        self.num_lod_levels - 1
    }
}
