//! Pluggable disk tile source.
//!
//! The cache never performs I/O directly; it asks a [`TileSource`] for a
//! decoded square grid of normalized height samples. The shipped
//! implementation reads 16-bit grayscale PNG tiles from a cache
//! directory; tests substitute synthetic sources.

use std::path::{Path, PathBuf};

use relief_common::{LoadError, TileCoord, TileKey};

/// A decoded square grid of normalized height samples.
#[derive(Debug, Clone, PartialEq)]
pub struct TileSamples {
    /// Side length of the grid
    pub resolution: u32,
    /// Row-major samples in `[0, 1]`, length `resolution * resolution`
    pub samples: Vec<f32>,
}

impl TileSamples {
    /// Creates a sample grid, checking the length invariant.
    ///
    /// # Panics
    ///
    /// Panics if `samples.len() != resolution * resolution`.
    #[must_use]
    pub fn new(resolution: u32, samples: Vec<f32>) -> Self {
        assert_eq!(
            samples.len(),
            (resolution * resolution) as usize,
            "sample grid must be resolution squared"
        );
        Self { resolution, samples }
    }

    /// Creates a grid filled with a constant height.
    #[must_use]
    pub fn constant(resolution: u32, value: f32) -> Self {
        Self::new(resolution, vec![value; (resolution * resolution) as usize])
    }
}

/// Producer of decoded tile data for a `(coord, lod)` pair.
///
/// Implementations complete synchronously; a load either yields samples
/// or a [`LoadError`], with no partial state.
pub trait TileSource {
    /// Loads and decodes the tile at `(coord, lod)`.
    fn load(&self, coord: TileCoord, lod: u32) -> Result<TileSamples, LoadError>;
}

/// Tile source reading 16-bit grayscale PNG files from a directory.
///
/// Files are named `tile_{x}_{z}_lod{l}.png`. Sample values are
/// normalized by 65535.
#[derive(Debug, Clone)]
pub struct DirectoryTileSource {
    cache_dir: PathBuf,
}

impl DirectoryTileSource {
    /// Creates a source rooted at a tile cache directory.
    #[must_use]
    pub fn new<P: AsRef<Path>>(cache_dir: P) -> Self {
        Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
        }
    }

    /// Path of the backing file for a tile.
    #[must_use]
    pub fn tile_path(&self, coord: TileCoord, lod: u32) -> PathBuf {
        self.cache_dir
            .join(format!("tile_{}_{}_lod{}.png", coord.x, coord.z, lod))
    }
}

impl TileSource for DirectoryTileSource {
    fn load(&self, coord: TileCoord, lod: u32) -> Result<TileSamples, LoadError> {
        let key = TileKey::pack(coord, lod);
        let path = self.tile_path(coord, lod);
        if !path.exists() {
            return Err(LoadError::NotFound { key });
        }

        let image = image::open(&path).map_err(|e| LoadError::Decode {
            key,
            message: e.to_string(),
        })?;

        let gray = image.to_luma16();
        let (width, height) = gray.dimensions();
        if width != height {
            return Err(LoadError::Decode {
                key,
                message: format!("tile image is {width}x{height}, expected square"),
            });
        }

        let samples = gray
            .into_raw()
            .into_iter()
            .map(|v| f32::from(v) / 65535.0)
            .collect();
        Ok(TileSamples::new(width, samples))
    }
}
