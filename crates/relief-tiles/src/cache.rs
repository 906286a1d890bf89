//! The terrain tile cache facade.
//!
//! [`TileCache`] wires the pieces together: tile set metadata, the base
//! fallback layer, the tile store with its resident slot pool, and the
//! per-frame streamer. Callers construct one cache per terrain, call
//! [`TileCache::update`] once per frame with the viewer position, and
//! query heights at any world position at any time.

use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use relief_common::{
    CacheInitError, CacheResult, LodBands, TileCoord, TileGrid, TileKey, DEFAULT_LOD_MAX_DISTANCES,
};

use crate::fallback::BaseLodFallback;
use crate::metadata::TileSetMetadata;
use crate::source::{DirectoryTileSource, TileSource};
use crate::store::{CpuRetention, SlotBackend, TileStore};
use crate::streamer::{
    ActiveTile, StreamStats, Streamer, StreamerConfig, DEFAULT_MAX_LOADS_PER_FRAME,
};
use crate::tile::{Tile, TileSlotInfo};

/// Tuning knobs for a [`TileCache`].
///
/// Deserializable so applications can embed it in their own config
/// files; every field has a usable default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Size of the resident slot pool
    pub max_resident_tiles: u32,
    /// Tiles within this distance of the viewer are streamed in
    pub load_radius: f32,
    /// Radius term of the unload threshold; must exceed `load_radius`
    pub unload_radius: f32,
    /// Cap on successful tile loads per frame
    pub max_loads_per_frame: usize,
    /// Per-LOD max viewing distances, finest first; adapted to the tile
    /// set's LOD count by truncation or doubling the last entry
    pub lod_max_distances: Vec<f32>,
    /// Whether evicted tiles keep their CPU samples
    pub retention: CpuRetention,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_resident_tiles: 64,
            load_radius: 3000.0,
            unload_radius: 3500.0,
            max_loads_per_frame: DEFAULT_MAX_LOADS_PER_FRAME,
            lod_max_distances: DEFAULT_LOD_MAX_DISTANCES.to_vec(),
            retention: CpuRetention::default(),
        }
    }
}

/// One terrain's streamed tile cache.
///
/// Single-threaded by design: `update` mutates the resident set, height
/// queries read it, and nothing here is `Sync`. Run it on the thread
/// that owns the terrain.
pub struct TileCache {
    metadata: TileSetMetadata,
    store: TileStore,
    streamer: Streamer,
    base: BaseLodFallback,
}

impl TileCache {
    /// Opens a tile cache directory (`tileset.toml` plus tile images).
    ///
    /// Reads and validates the metadata, then eagerly loads the full
    /// base LOD layer; any failure there is fatal.
    ///
    /// # Panics
    ///
    /// Panics unless `config.unload_radius > config.load_radius > 0`.
    pub fn open<P: AsRef<Path>>(
        cache_dir: P,
        config: &CacheConfig,
        backend: Box<dyn SlotBackend>,
    ) -> CacheResult<Self> {
        Self::open_with(cache_dir, config, backend, |_, _| {})
    }

    /// Like [`TileCache::open`], reporting base-layer loading progress
    /// as `(loaded, total)` after each tile.
    pub fn open_with<P, F>(
        cache_dir: P,
        config: &CacheConfig,
        backend: Box<dyn SlotBackend>,
        progress: F,
    ) -> CacheResult<Self>
    where
        P: AsRef<Path>,
        F: FnMut(u32, u32),
    {
        let metadata = TileSetMetadata::load_from_dir(&cache_dir)?;
        let source = Box::new(DirectoryTileSource::new(cache_dir));
        Self::new_with(metadata, source, config, backend, progress)
    }

    /// Builds a cache over an arbitrary [`TileSource`].
    ///
    /// # Panics
    ///
    /// Panics unless `config.unload_radius > config.load_radius > 0`.
    pub fn new(
        metadata: TileSetMetadata,
        source: Box<dyn TileSource>,
        config: &CacheConfig,
        backend: Box<dyn SlotBackend>,
    ) -> CacheResult<Self> {
        Self::new_with(metadata, source, config, backend, |_, _| {})
    }

    /// Like [`TileCache::new`] with a base-layer progress callback.
    pub fn new_with<F>(
        metadata: TileSetMetadata,
        source: Box<dyn TileSource>,
        config: &CacheConfig,
        backend: Box<dyn SlotBackend>,
        progress: F,
    ) -> CacheResult<Self>
    where
        F: FnMut(u32, u32),
    {
        metadata.validate()?;
        if config.max_resident_tiles == 0 {
            return Err(CacheInitError::InvalidMetadata(
                "max_resident_tiles must be nonzero".into(),
            ));
        }

        let grid = metadata.grid();
        let bands = LodBands::from_table(&config.lod_max_distances, grid.num_lod_levels);
        let base = BaseLodFallback::load(
            grid,
            source.as_ref(),
            metadata.tile_resolution,
            metadata.overlap,
            metadata.height_scale(),
            metadata.min_altitude,
            progress,
        )?;
        let store = TileStore::new(
            grid,
            config.max_resident_tiles,
            metadata.tile_resolution,
            metadata.overlap,
            source,
            backend,
            config.retention,
        );
        let streamer = Streamer::new(
            StreamerConfig::new(
                config.load_radius,
                config.unload_radius,
                config.max_loads_per_frame,
            ),
            bands,
        );

        info!(
            "Tile cache ready: {}x{} tiles, {} LOD levels, {} resident slots",
            metadata.tiles_x, metadata.tiles_z, metadata.num_lod_levels, config.max_resident_tiles
        );
        Ok(Self {
            metadata,
            store,
            streamer,
            base,
        })
    }

    /// Runs one streaming frame: evicts out-of-range tiles, loads up to
    /// the per-frame budget around `viewer`, and rebuilds the active
    /// list. Call once per frame.
    pub fn update(&mut self, viewer: Vec2) {
        self.streamer.update(viewer, &mut self.store);
    }

    /// Samples the terrain height at a world position.
    ///
    /// Resolution degrades gracefully: the finest active tile covering
    /// the position wins, then any other loaded tile, then the base
    /// layer. Never fails; positions outside the terrain clamp to the
    /// edge.
    #[must_use]
    pub fn get_height_at(&self, world_x: f32, world_z: f32) -> f32 {
        let height_scale = self.metadata.height_scale();
        let min_altitude = self.metadata.min_altitude;

        // Active list is sorted finest LOD first.
        for active in self.streamer.active_tiles() {
            if !active.bounds.contains(world_x, world_z) {
                continue;
            }
            if let Some(tile) = self.store.get(active.key) {
                return tile.sample_height(world_x, world_z, height_scale, min_altitude);
            }
        }

        // Loaded but outside the active list, finest available.
        let mut best: Option<&Tile> = None;
        for (_, tile) in self.store.tiles() {
            if tile.contains(world_x, world_z) && best.map_or(true, |b| tile.lod < b.lod) {
                best = Some(tile);
            }
        }
        if let Some(tile) = best {
            return tile.sample_height(world_x, world_z, height_scale, min_altitude);
        }

        self.base.sample(world_x, world_z)
    }

    /// Warms the cache with CPU-only tiles around a world position, for
    /// physics or other consumers that need sample data before the
    /// streamer reaches the area. Does not touch resident slots or the
    /// per-frame budget. Returns the number of tiles loaded.
    pub fn preload_around(&mut self, center: Vec2, radius: f32) -> usize {
        self.preload_around_with(center, radius, |_, _| {})
    }

    /// Like [`TileCache::preload_around`], reporting `(loaded, total)`
    /// after each tile.
    pub fn preload_around_with<F>(&mut self, center: Vec2, radius: f32, mut progress: F) -> usize
    where
        F: FnMut(u32, u32),
    {
        let grid = *self.store.grid();

        // Physics wants the finest data regardless of LOD bands.
        let mut wanted: Vec<TileCoord> = Vec::new();
        let min = grid.world_to_tile(center.x - radius, center.y - radius, 0);
        let max = grid.world_to_tile(center.x + radius, center.y + radius, 0);
        for z in min.z..=max.z {
            for x in min.x..=max.x {
                let coord = TileCoord::new(x, z);
                if grid.tile_center(coord, 0).distance(center) >= radius {
                    continue;
                }
                if !self.store.is_loaded(TileKey::pack(coord, 0)) {
                    wanted.push(coord);
                }
            }
        }

        let total = wanted.len() as u32;
        let mut loaded = 0;
        for (done, coord) in wanted.into_iter().enumerate() {
            match self.store.load_cpu_only(coord, 0) {
                Ok(_) => loaded += 1,
                Err(err) => {
                    warn!("Preload of tile {coord} failed: {err}");
                }
            }
            progress(done as u32 + 1, total);
        }
        loaded
    }

    /// The resident tiles in range this frame, finest LOD first.
    #[must_use]
    pub fn active_tiles(&self) -> &[ActiveTile] {
        self.streamer.active_tiles()
    }

    /// GPU-ready records for the active tiles, in active-list order.
    #[must_use]
    pub fn slot_infos(&self) -> Vec<TileSlotInfo> {
        self.streamer
            .active_tiles()
            .iter()
            .filter_map(|active| self.store.get(active.key))
            .filter_map(TileSlotInfo::for_tile)
            .collect()
    }

    /// Whether a tile has CPU data loaded (resident or not).
    #[must_use]
    pub fn is_loaded(&self, coord: TileCoord, lod: u32) -> bool {
        self.store.is_loaded(TileKey::pack(coord, lod))
    }

    /// Looks up a loaded tile by grid coordinate and LOD.
    #[must_use]
    pub fn get_tile(&self, coord: TileCoord, lod: u32) -> Option<&Tile> {
        self.store.get(TileKey::pack(coord, lod))
    }

    /// Counters from the most recent [`TileCache::update`].
    #[must_use]
    pub fn stats(&self) -> &StreamStats {
        self.streamer.stats()
    }

    /// The tile set metadata this cache was opened with.
    #[must_use]
    pub fn metadata(&self) -> &TileSetMetadata {
        &self.metadata
    }

    /// The grid mapping for this terrain.
    #[must_use]
    pub fn grid(&self) -> &TileGrid {
        self.store.grid()
    }

    /// Number of tiles currently holding a resident slot.
    #[must_use]
    pub fn resident_count(&self) -> u32 {
        self.store.resident_count()
    }

    /// Number of tiles with CPU data loaded (resident or not).
    #[must_use]
    pub fn loaded_count(&self) -> usize {
        self.store.loaded_count()
    }

    /// Size of the resident slot pool.
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.store.capacity()
    }

    /// The permanently loaded base layer.
    #[must_use]
    pub fn base(&self) -> &BaseLodFallback {
        &self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::TileSamples;
    use crate::store::NullSlotBackend;
    use relief_common::LoadError;

    /// Returns a distinct flat height per LOD so queries reveal which
    /// layer answered: LOD 0 -> 0.1, LOD 1 -> 0.2, LOD 2 -> 0.3.
    struct PerLodSource {
        resolution: u32,
    }

    impl TileSource for PerLodSource {
        fn load(&self, _coord: TileCoord, lod: u32) -> Result<TileSamples, LoadError> {
            Ok(TileSamples::constant(
                self.resolution,
                0.1 * (lod + 1) as f32,
            ))
        }
    }

    // Grid geometry matches a 16k terrain with 64x64 LOD0 tiles; sample
    // resolution is scaled down to keep the eagerly loaded base layer
    // small in tests.
    fn metadata() -> TileSetMetadata {
        TileSetMetadata {
            tile_resolution: 32,
            overlap: 4,
            num_lod_levels: 3,
            tiles_x: 64,
            tiles_z: 64,
            terrain_size: 16384.0,
            min_altitude: -50.0,
            max_altitude: 1950.0,
        }
    }

    fn config() -> CacheConfig {
        CacheConfig {
            max_resident_tiles: 64,
            load_radius: 500.0,
            unload_radius: 600.0,
            max_loads_per_frame: 4,
            lod_max_distances: vec![1000.0, 2500.0, 6000.0],
            retention: CpuRetention::Retain,
        }
    }

    fn cache() -> TileCache {
        TileCache::new(
            metadata(),
            Box::new(PerLodSource { resolution: 36 }),
            &config(),
            Box::new(NullSlotBackend),
        )
        .expect("cache init")
    }

    // Heights after denormalization: sample * 2000 - 50.
    const LOD0_HEIGHT: f32 = 0.1 * 2000.0 - 50.0;
    const BASE_HEIGHT: f32 = 0.3 * 2000.0 - 50.0;

    #[test]
    fn test_height_query_before_any_update_uses_base() {
        let cache = cache();
        assert!((cache.get_height_at(0.0, 0.0) - BASE_HEIGHT).abs() < 1e-3);
        assert!((cache.get_height_at(-8000.0, 8000.0) - BASE_HEIGHT).abs() < 1e-3);
    }

    #[test]
    fn test_streaming_scenario_at_origin() {
        // 16k terrain, 64x64 tiles, 3 LODs, 64 slots, 4 loads per frame,
        // viewer at the origin: 12 LOD0 tiles are in the 500m radius.
        let mut cache = cache();

        cache.update(Vec2::ZERO);
        assert_eq!(cache.stats().loaded, 4);
        assert_eq!(cache.resident_count(), 4);

        cache.update(Vec2::ZERO);
        cache.update(Vec2::ZERO);
        assert_eq!(cache.resident_count(), 12);
        assert!(cache.active_tiles().iter().all(|t| t.lod == 0));

        // The origin is now covered by a resident LOD0 tile.
        assert!((cache.get_height_at(0.0, 0.0) - LOD0_HEIGHT).abs() < 1e-3);
    }

    #[test]
    fn test_height_falls_back_beyond_streamed_radius() {
        let mut cache = cache();
        for _ in 0..3 {
            cache.update(Vec2::ZERO);
        }

        // In range: finest tile answers. Far away: base layer answers.
        assert!((cache.get_height_at(10.0, -10.0) - LOD0_HEIGHT).abs() < 1e-3);
        assert!((cache.get_height_at(7000.0, 7000.0) - BASE_HEIGHT).abs() < 1e-3);
    }

    #[test]
    fn test_capacity_one_is_stable() {
        let mut cfg = config();
        cfg.max_resident_tiles = 1;
        let mut cache = TileCache::new(
            metadata(),
            Box::new(PerLodSource { resolution: 36 }),
            &cfg,
            Box::new(NullSlotBackend),
        )
        .expect("cache init");

        cache.update(Vec2::ZERO);
        assert_eq!(cache.resident_count(), 1);
        for _ in 0..4 {
            cache.update(Vec2::ZERO);
            assert_eq!(cache.resident_count(), 1);
            assert_eq!(cache.stats().loaded, 0);
            assert_eq!(cache.stats().evicted, 0);
        }
    }

    #[test]
    fn test_preload_loads_cpu_only() {
        let mut cache = cache();
        let loaded = cache.preload_around(Vec2::ZERO, 500.0);

        assert_eq!(loaded, 12);
        assert_eq!(cache.loaded_count(), 12);
        assert_eq!(cache.resident_count(), 0);
        assert!(cache.active_tiles().is_empty());
        assert!(cache.is_loaded(TileCoord::new(32, 32), 0));
        assert!(!cache.is_loaded(TileCoord::new(0, 0), 0));
        let tile = cache.get_tile(TileCoord::new(32, 32), 0).expect("preloaded");
        assert!(!tile.is_resident());

        // Preloaded tiles answer height queries without any update.
        assert!((cache.get_height_at(0.0, 0.0) - LOD0_HEIGHT).abs() < 1e-3);
    }

    #[test]
    fn test_preload_then_update_promotes_without_reload() {
        let mut cache = cache();
        cache.preload_around(Vec2::ZERO, 500.0);

        cache.update(Vec2::ZERO);
        assert_eq!(cache.resident_count(), 4);
        assert_eq!(cache.loaded_count(), 12);
    }

    #[test]
    fn test_preload_progress_reports_total() {
        let mut cache = cache();
        let mut last = (0, 0);
        cache.preload_around_with(Vec2::ZERO, 500.0, |done, total| last = (done, total));
        assert_eq!(last, (12, 12));
    }

    #[test]
    fn test_slot_infos_match_active_tiles() {
        let mut cache = cache();
        for _ in 0..3 {
            cache.update(Vec2::ZERO);
        }

        let infos = cache.slot_infos();
        assert_eq!(infos.len(), cache.active_tiles().len());
        for (info, active) in infos.iter().zip(cache.active_tiles()) {
            assert_eq!(info.slot, active.slot.raw());
            assert_eq!(info.lod, active.lod);
        }
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut cfg = config();
        cfg.max_resident_tiles = 0;
        let result = TileCache::new(
            metadata(),
            Box::new(PerLodSource { resolution: 36 }),
            &cfg,
            Box::new(NullSlotBackend),
        );
        assert!(matches!(result, Err(CacheInitError::InvalidMetadata(_))));
    }

    #[test]
    fn test_full_resolution_tiles() {
        // Production-sized 512+16 tiles over a small terrain.
        let metadata = TileSetMetadata {
            tile_resolution: 512,
            overlap: 16,
            num_lod_levels: 2,
            tiles_x: 4,
            tiles_z: 4,
            terrain_size: 2048.0,
            min_altitude: -50.0,
            max_altitude: 1950.0,
        };
        let mut cache = TileCache::new(
            metadata,
            Box::new(PerLodSource { resolution: 528 }),
            &config(),
            Box::new(NullSlotBackend),
        )
        .expect("cache init");

        cache.update(Vec2::ZERO);
        assert_eq!(cache.resident_count(), 4);
        assert!((cache.get_height_at(0.0, 0.0) - LOD0_HEIGHT).abs() < 1e-3);
    }

    #[test]
    fn test_config_defaults_deserialize() {
        let cfg: CacheConfig = toml::from_str("max_resident_tiles = 32").expect("parse");
        assert_eq!(cfg.max_resident_tiles, 32);
        assert!(cfg.unload_radius > cfg.load_radius);
        assert_eq!(cfg.lod_max_distances.len(), 4);
    }
}
