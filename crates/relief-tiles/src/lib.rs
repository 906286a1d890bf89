//! # Relief Tiles
//!
//! A streamed terrain tile cache: a bounded pool of resident tile
//! slots, per-frame budgeted loading around a moving viewer with
//! hysteresis against churn, and height queries that always answer by
//! falling back through coarser layers to a permanently loaded base
//! LOD.
//!
//! The entry point is [`TileCache`]; everything else is exposed for
//! callers that need to customize loading ([`TileSource`]), GPU
//! residency ([`SlotBackend`]), or drive the pieces individually.
//!
//! ```no_run
//! use glam::Vec2;
//! use relief_tiles::{CacheConfig, NullSlotBackend, TileCache};
//!
//! # fn main() -> Result<(), relief_common::CacheInitError> {
//! let mut cache = TileCache::open(
//!     "assets/terrain_cache",
//!     &CacheConfig::default(),
//!     Box::new(NullSlotBackend),
//! )?;
//!
//! // Per frame:
//! cache.update(Vec2::new(120.0, -340.0));
//! let height = cache.get_height_at(120.0, -340.0);
//! # let _ = height;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod cache;
pub mod fallback;
pub mod layers;
pub mod metadata;
pub mod source;
pub mod store;
pub mod streamer;
pub mod tile;

pub use cache::{CacheConfig, TileCache};
pub use fallback::BaseLodFallback;
pub use layers::{LayerAllocator, LayerId};
pub use metadata::{TileSetMetadata, METADATA_FILE};
pub use source::{DirectoryTileSource, TileSamples, TileSource};
pub use store::{CpuRetention, NullSlotBackend, SlotBackend, TileStore};
pub use streamer::{
    ActiveTile, StreamStats, Streamer, StreamerConfig, DEFAULT_MAX_LOADS_PER_FRAME,
};
pub use tile::{Residency, Tile, TileSlotInfo};

pub use relief_common::{
    CacheInitError, CacheResult, LoadError, LodBands, PromoteError, TileBounds, TileCoord,
    TileGrid, TileKey, DEFAULT_LOD_MAX_DISTANCES,
};
