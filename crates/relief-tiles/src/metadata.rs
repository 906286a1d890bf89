//! Tile-set metadata: global layout constants for a baked tile cache.
//!
//! Loaded once at startup from `tileset.toml` in the cache directory.
//! Unlike runtime configuration, a missing or unparseable metadata file
//! is fatal; nothing about the tile layout can be guessed.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use relief_common::{CacheInitError, CacheResult, TileGrid};

/// Metadata file name inside a tile cache directory.
pub const METADATA_FILE: &str = "tileset.toml";

/// Global layout constants for a baked terrain tile set.
///
/// Pure configuration; never changes after load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileSetMetadata {
    /// Nominal tile resolution (samples per side, without overlap)
    pub tile_resolution: u32,
    /// Overlap margin in samples for seamless cross-tile sampling
    pub overlap: u32,
    /// Number of LOD levels (LOD 0 is finest)
    pub num_lod_levels: u32,
    /// Tile count along X at LOD 0
    pub tiles_x: u32,
    /// Tile count along Z at LOD 0
    pub tiles_z: u32,
    /// Terrain extent in world units
    pub terrain_size: f32,
    /// Lowest altitude in world units (height sample 0.0)
    pub min_altitude: f32,
    /// Highest altitude in world units (height sample 1.0)
    pub max_altitude: f32,
}

impl TileSetMetadata {
    /// Loads metadata from `<cache_dir>/tileset.toml`.
    pub fn load_from_dir<P: AsRef<Path>>(cache_dir: P) -> CacheResult<Self> {
        let path = cache_dir.as_ref().join(METADATA_FILE);
        let contents = fs::read_to_string(&path).map_err(|source| CacheInitError::MetadataIo {
            path: path.display().to_string(),
            source,
        })?;

        let metadata: Self =
            toml::from_str(&contents).map_err(|e| CacheInitError::MetadataParse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        metadata.validate()?;

        info!(
            "Loaded tile-set metadata: {}m terrain, {}x{} tiles at LOD0, {} LOD levels, {}+{} samples/tile",
            metadata.terrain_size,
            metadata.tiles_x,
            metadata.tiles_z,
            metadata.num_lod_levels,
            metadata.tile_resolution,
            metadata.overlap
        );
        Ok(metadata)
    }

    /// Parses metadata from a TOML string and validates it.
    pub fn from_toml(contents: &str) -> CacheResult<Self> {
        let metadata: Self =
            toml::from_str(contents).map_err(|e| CacheInitError::MetadataParse {
                path: "<inline>".to_string(),
                message: e.to_string(),
            })?;
        metadata.validate()?;
        Ok(metadata)
    }

    /// Checks internal consistency. Run automatically by the parsing
    /// constructors; call directly for hand-built metadata.
    pub fn validate(&self) -> CacheResult<()> {
        if self.tile_resolution == 0 {
            return Err(CacheInitError::InvalidMetadata(
                "tile_resolution must be nonzero".into(),
            ));
        }
        if self.num_lod_levels == 0 {
            return Err(CacheInitError::InvalidMetadata(
                "num_lod_levels must be at least 1".into(),
            ));
        }
        if self.tiles_x == 0 || self.tiles_z == 0 {
            return Err(CacheInitError::InvalidMetadata(
                "tiles_x and tiles_z must be at least 1".into(),
            ));
        }
        if self.terrain_size <= 0.0 {
            return Err(CacheInitError::InvalidMetadata(
                "terrain_size must be positive".into(),
            ));
        }
        if self.max_altitude <= self.min_altitude {
            return Err(CacheInitError::InvalidMetadata(
                "max_altitude must exceed min_altitude".into(),
            ));
        }
        Ok(())
    }

    /// Altitude span; normalized height samples scale by this.
    #[must_use]
    pub fn height_scale(&self) -> f32 {
        self.max_altitude - self.min_altitude
    }

    /// Stored tile side length: nominal resolution plus overlap.
    #[must_use]
    pub const fn stored_resolution(&self) -> u32 {
        self.tile_resolution + self.overlap
    }

    /// The grid mapping described by this metadata.
    #[must_use]
    pub const fn grid(&self) -> TileGrid {
        TileGrid {
            terrain_size: self.terrain_size,
            tiles_x: self.tiles_x,
            tiles_z: self.tiles_z,
            num_lod_levels: self.num_lod_levels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
        tile_resolution = 512
        overlap = 16
        num_lod_levels = 3
        tiles_x = 64
        tiles_z = 64
        terrain_size = 16384.0
        min_altitude = -50.0
        max_altitude = 1950.0
    "#;

    #[test]
    fn test_parse_valid_metadata() {
        let meta = TileSetMetadata::from_toml(VALID).expect("valid metadata");
        assert_eq!(meta.tile_resolution, 512);
        assert_eq!(meta.stored_resolution(), 528);
        assert!((meta.height_scale() - 2000.0).abs() < 1e-3);
        assert_eq!(meta.grid().tiles_at(2), (16, 16));
    }

    #[test]
    fn test_missing_field_is_fatal() {
        let result = TileSetMetadata::from_toml("tile_resolution = 512");
        assert!(matches!(result, Err(CacheInitError::MetadataParse { .. })));
    }

    #[test]
    fn test_garbage_is_fatal() {
        let result = TileSetMetadata::from_toml("not toml at all {{{");
        assert!(matches!(result, Err(CacheInitError::MetadataParse { .. })));
    }

    #[test]
    fn test_invalid_altitude_range_rejected() {
        let bad = VALID.replace("max_altitude = 1950.0", "max_altitude = -100.0");
        let result = TileSetMetadata::from_toml(&bad);
        assert!(matches!(result, Err(CacheInitError::InvalidMetadata(_))));
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let result = TileSetMetadata::load_from_dir("/nonexistent/tile/cache");
        assert!(matches!(result, Err(CacheInitError::MetadataIo { .. })));
    }

    #[test]
    fn test_load_from_dir() {
        let dir = std::env::temp_dir().join("relief_meta_test");
        std::fs::create_dir_all(&dir).expect("create temp dir");
        std::fs::write(dir.join(METADATA_FILE), VALID).expect("write metadata");

        let meta = TileSetMetadata::load_from_dir(&dir).expect("load metadata");
        assert_eq!(meta.tiles_x, 64);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
