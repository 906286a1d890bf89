//! Tile ownership: the map of all loaded tiles and their residency.
//!
//! The store owns every [`Tile`] and its sample buffer, plus the
//! [`LayerAllocator`] bookkeeping for the resident slots. GPU uploads are
//! delegated to a [`SlotBackend`]; the store only ever handles opaque
//! [`LayerId`]s, never resource handles.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use relief_common::{LoadError, PromoteError, TileCoord, TileGrid, TileKey};

use crate::layers::{LayerAllocator, LayerId};
use crate::source::TileSource;
use crate::tile::{Residency, Tile};

/// Receiver of sample data for resident slots (graphics collaborator).
///
/// `promote_to_resident` and `evict` are the cache's only points of
/// contact with the backing GPU resources.
pub trait SlotBackend {
    /// Makes `samples` visible at `slot` for renderer consumption.
    fn upload(&mut self, slot: LayerId, resolution: u32, samples: &[f32]);

    /// Invalidates `slot` after eviction.
    fn release(&mut self, slot: LayerId);
}

/// Backend that discards uploads; for headless use and tests.
#[derive(Debug, Default)]
pub struct NullSlotBackend;

impl SlotBackend for NullSlotBackend {
    fn upload(&mut self, _slot: LayerId, _resolution: u32, _samples: &[f32]) {}
    fn release(&mut self, _slot: LayerId) {}
}

/// What happens to a tile's CPU samples when it is evicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CpuRetention {
    /// Keep the tile CPU-only so height queries stay cheap
    #[default]
    Retain,
    /// Drop the tile entirely to save memory
    Drop,
}

/// Owner of all loaded tiles, keyed by packed `(coord, lod)`.
pub struct TileStore {
    grid: TileGrid,
    tiles: HashMap<TileKey, Tile>,
    layers: LayerAllocator,
    source: Box<dyn TileSource>,
    backend: Box<dyn SlotBackend>,
    nominal_resolution: u32,
    overlap: u32,
    retention: CpuRetention,
}

impl TileStore {
    /// Creates an empty store.
    ///
    /// `max_resident` bounds the simultaneously resident set;
    /// `nominal_resolution` and `overlap` define the accepted decoded
    /// tile sizes.
    #[must_use]
    pub fn new(
        grid: TileGrid,
        max_resident: u32,
        nominal_resolution: u32,
        overlap: u32,
        source: Box<dyn TileSource>,
        backend: Box<dyn SlotBackend>,
        retention: CpuRetention,
    ) -> Self {
        Self {
            grid,
            tiles: HashMap::new(),
            layers: LayerAllocator::new(max_resident),
            source,
            backend,
            nominal_resolution,
            overlap,
            retention,
        }
    }

    /// Loads a tile's CPU data, if not already present.
    ///
    /// Idempotent: a tile that is already loaded (CPU-only or resident)
    /// is returned unchanged. The decoded side length must equal the
    /// nominal resolution or nominal plus overlap.
    pub fn load_cpu_only(&mut self, coord: TileCoord, lod: u32) -> Result<TileKey, LoadError> {
        let coord = self.grid.clamp_coord(coord, lod);
        let key = TileKey::pack(coord, lod);
        if self.tiles.contains_key(&key) {
            return Ok(key);
        }

        let samples = self.source.load(coord, lod)?;
        let with_overlap = self.nominal_resolution + self.overlap;
        if samples.resolution != self.nominal_resolution && samples.resolution != with_overlap {
            return Err(LoadError::SizeMismatch {
                key,
                nominal: self.nominal_resolution,
                with_overlap,
                actual: samples.resolution,
            });
        }

        let bounds = self.grid.tile_bounds(coord, lod);
        debug!(
            "Loaded tile {key} - world bounds [{:.0},{:.0}]-[{:.0},{:.0}]",
            bounds.min_x, bounds.min_z, bounds.max_x, bounds.max_z
        );
        self.tiles.insert(key, Tile::new(coord, lod, bounds, samples));
        Ok(key)
    }

    /// Promotes a CPU-loaded tile into a resident slot.
    ///
    /// Already-resident tiles succeed without change. `NoCapacity` is an
    /// expected back-pressure signal, not a fault.
    pub fn promote_to_resident(&mut self, key: TileKey) -> Result<(), PromoteError> {
        let tile = self
            .tiles
            .get_mut(&key)
            .ok_or(PromoteError::NoCpuData(key))?;
        if tile.is_resident() {
            return Ok(());
        }

        let slot = self.layers.allocate().ok_or(PromoteError::NoCapacity {
            capacity: self.layers.capacity(),
        })?;
        self.backend
            .upload(slot, tile.samples.resolution, &tile.samples.samples);
        tile.residency = Residency::Resident(slot);
        debug!("Promoted tile {key} to {slot}");
        Ok(())
    }

    /// Evicts a tile from the resident set, freeing its slot.
    ///
    /// CPU data is kept or dropped according to the configured
    /// [`CpuRetention`]. Evicting an unknown or CPU-only tile under
    /// `Retain` is a no-op. Returns whether any state changed.
    pub fn evict(&mut self, key: TileKey) -> bool {
        let Some(tile) = self.tiles.get_mut(&key) else {
            return false;
        };
        let mut changed = false;
        if let Residency::Resident(slot) = tile.residency {
            self.layers.free(slot);
            self.backend.release(slot);
            tile.residency = Residency::CpuOnly;
            changed = true;
            debug!("Evicted tile {key} from {slot}");
        }
        if self.retention == CpuRetention::Drop {
            self.tiles.remove(&key);
            changed = true;
        }
        changed
    }

    /// Fully removes a tile, evicting it first if resident.
    pub fn remove(&mut self, key: TileKey) {
        if let Some(tile) = self.tiles.get(&key) {
            if let Some(slot) = tile.slot() {
                self.layers.free(slot);
                self.backend.release(slot);
            }
            self.tiles.remove(&key);
        }
    }

    /// Whether a tile has CPU data (resident or not).
    #[must_use]
    pub fn is_loaded(&self, key: TileKey) -> bool {
        self.tiles.contains_key(&key)
    }

    /// Looks up a loaded tile.
    #[must_use]
    pub fn get(&self, key: TileKey) -> Option<&Tile> {
        self.tiles.get(&key)
    }

    /// Iterates over all loaded tiles.
    pub fn tiles(&self) -> impl Iterator<Item = (&TileKey, &Tile)> {
        self.tiles.iter()
    }

    /// Number of tiles with CPU data.
    #[must_use]
    pub fn loaded_count(&self) -> usize {
        self.tiles.len()
    }

    /// Number of simultaneously resident tiles.
    #[must_use]
    pub fn resident_count(&self) -> u32 {
        self.layers.in_use()
    }

    /// Resident slot capacity.
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.layers.capacity()
    }

    /// The grid mapping this store was built for.
    #[must_use]
    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    /// Loads and promotes in one step, logging per-tile failures.
    ///
    /// Returns `Ok(true)` on success, `Ok(false)` when the tile failed to
    /// load (recoverable, logged), and the capacity error untouched so
    /// the caller can stop its load loop.
    pub(crate) fn load_and_promote(
        &mut self,
        coord: TileCoord,
        lod: u32,
    ) -> Result<bool, PromoteError> {
        let key = match self.load_cpu_only(coord, lod) {
            Ok(key) => key,
            Err(e) => {
                warn!("Tile load failed: {e}");
                return Ok(false);
            }
        };
        self.promote_to_resident(key)?;
        Ok(true)
    }
}
