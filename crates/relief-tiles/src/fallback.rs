//! Always-available base terrain layer.
//!
//! A full coverage of the terrain at the coarsest LOD, loaded once at
//! startup and held in CPU memory for the lifetime of the cache. Height
//! queries that miss every streamed tile land here, so a query anywhere
//! on the terrain always has an answer. Base tiles never occupy
//! resident slots and are never evicted.

use tracing::info;

use relief_common::{CacheInitError, TileCoord, TileGrid, TileKey};

use crate::source::TileSource;
use crate::tile::Tile;

/// The permanently loaded coarse layer backing every height query.
pub struct BaseLodFallback {
    grid: TileGrid,
    lod: u32,
    tiles_x: u32,
    tiles: Vec<Tile>,
    height_scale: f32,
    min_altitude: f32,
}

impl BaseLodFallback {
    /// Loads every tile of the coarsest LOD. Any tile failure is fatal:
    /// without full base coverage, height queries would have holes.
    ///
    /// `progress` is invoked after each tile with `(loaded, total)`;
    /// callers can drive a loading screen or yield to other work from
    /// it. Pass `|_, _| {}` when nothing needs to observe progress.
    pub fn load<F>(
        grid: TileGrid,
        source: &dyn TileSource,
        nominal_resolution: u32,
        overlap: u32,
        height_scale: f32,
        min_altitude: f32,
        mut progress: F,
    ) -> Result<Self, CacheInitError>
    where
        F: FnMut(u32, u32),
    {
        let lod = grid.coarsest_lod();
        let (tiles_x, tiles_z) = grid.tiles_at(lod);
        let total = tiles_x * tiles_z;

        let mut tiles = Vec::with_capacity(total as usize);
        for z in 0..tiles_z {
            for x in 0..tiles_x {
                let coord = TileCoord::new(x as i32, z as i32);
                let key = TileKey::pack(coord, lod);
                let samples = source
                    .load(coord, lod)
                    .map_err(|source| CacheInitError::BaseTile { key, source })?;
                if samples.resolution != nominal_resolution
                    && samples.resolution != nominal_resolution + overlap
                {
                    return Err(CacheInitError::InvalidMetadata(format!(
                        "base tile {key} has resolution {}, expected {} or {}",
                        samples.resolution,
                        nominal_resolution,
                        nominal_resolution + overlap
                    )));
                }
                tiles.push(Tile::new(coord, lod, grid.tile_bounds(coord, lod), samples));
                progress(tiles.len() as u32, total);
            }
        }

        info!("Loaded base terrain layer: {total} tiles at LOD {lod}");
        Ok(Self {
            grid,
            lod,
            tiles_x,
            tiles,
            height_scale,
            min_altitude,
        })
    }

    /// The LOD level of the base layer.
    #[must_use]
    pub fn lod(&self) -> u32 {
        self.lod
    }

    /// Number of base tiles held.
    #[must_use]
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Samples the terrain height at a world position.
    ///
    /// Total over the entire plane: positions outside the terrain clamp
    /// to the nearest edge tile.
    #[must_use]
    pub fn sample(&self, world_x: f32, world_z: f32) -> f32 {
        let coord = self.grid.world_to_tile(world_x, world_z, self.lod);
        let index = coord.z as usize * self.tiles_x as usize + coord.x as usize;
        self.tiles[index].sample_height(world_x, world_z, self.height_scale, self.min_altitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{TileSamples, TileSource};
    use relief_common::LoadError;

    struct FlatSource {
        resolution: u32,
        value: f32,
        missing: Option<TileCoord>,
    }

    impl TileSource for FlatSource {
        fn load(&self, coord: TileCoord, lod: u32) -> Result<TileSamples, LoadError> {
            if self.missing == Some(coord) {
                return Err(LoadError::NotFound {
                    key: TileKey::pack(coord, lod),
                });
            }
            Ok(TileSamples::constant(self.resolution, self.value))
        }
    }

    fn grid() -> TileGrid {
        TileGrid {
            terrain_size: 4096.0,
            tiles_x: 16,
            tiles_z: 16,
            num_lod_levels: 3,
        }
    }

    #[test]
    fn test_covers_entire_coarsest_lod() {
        let source = FlatSource {
            resolution: 64,
            value: 0.5,
            missing: None,
        };
        let base = BaseLodFallback::load(grid(), &source, 64, 0, 100.0, -10.0, |_, _| {})
            .expect("base load");
        // 16 >> 2 = 4 tiles per axis at LOD 2.
        assert_eq!(base.lod(), 2);
        assert_eq!(base.tile_count(), 16);
    }

    #[test]
    fn test_sample_total_and_denormalized() {
        let source = FlatSource {
            resolution: 64,
            value: 0.5,
            missing: None,
        };
        let base = BaseLodFallback::load(grid(), &source, 64, 0, 100.0, -10.0, |_, _| {})
            .expect("base load");

        // 0.5 * 100 - 10 everywhere, including far outside the terrain.
        assert!((base.sample(0.0, 0.0) - 40.0).abs() < 1e-4);
        assert!((base.sample(-2048.0, 2000.0) - 40.0).abs() < 1e-4);
        assert!((base.sample(1.0e6, -1.0e6) - 40.0).abs() < 1e-4);
    }

    #[test]
    fn test_missing_base_tile_is_fatal() {
        let source = FlatSource {
            resolution: 64,
            value: 0.5,
            missing: Some(TileCoord::new(1, 2)),
        };
        let result = BaseLodFallback::load(grid(), &source, 64, 0, 100.0, -10.0, |_, _| {});
        assert!(matches!(result, Err(CacheInitError::BaseTile { .. })));
    }

    #[test]
    fn test_wrong_resolution_is_fatal() {
        let source = FlatSource {
            resolution: 48,
            value: 0.5,
            missing: None,
        };
        let result = BaseLodFallback::load(grid(), &source, 64, 4, 100.0, -10.0, |_, _| {});
        assert!(matches!(result, Err(CacheInitError::InvalidMetadata(_))));
    }

    #[test]
    fn test_progress_reports_every_tile() {
        let source = FlatSource {
            resolution: 64,
            value: 0.0,
            missing: None,
        };
        let mut calls = Vec::new();
        let _ = BaseLodFallback::load(grid(), &source, 64, 0, 1.0, 0.0, |loaded, total| {
            calls.push((loaded, total));
        })
        .expect("base load");

        assert_eq!(calls.len(), 16);
        assert_eq!(calls.first(), Some(&(1, 16)));
        assert_eq!(calls.last(), Some(&(16, 16)));
    }
}
