//! Per-frame streaming driver.
//!
//! Given the viewer position, decides which tiles should be resident:
//! computes per-LOD candidate ranges, evicts tiles that drifted past
//! their LOD's unload threshold, loads a budgeted number of new tiles,
//! and rebuilds the active list consumed by height queries and the
//! renderer. All evictions in a frame happen before any loads, so a slot
//! freed this frame is immediately reusable.

use glam::Vec2;
use tracing::debug;

use relief_common::{LodBands, TileBounds, TileCoord, TileKey};

use crate::layers::LayerId;
use crate::store::TileStore;
use crate::tile::Tile;

/// Default cap on tile loads per frame.
pub const DEFAULT_MAX_LOADS_PER_FRAME: usize = 4;

/// Streaming radii and per-frame budget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamerConfig {
    /// Radius within which tiles are loaded
    pub load_radius: f32,
    /// Radius term of the unload threshold; must exceed `load_radius`
    pub unload_radius: f32,
    /// Maximum successful loads per `update` call
    pub max_loads_per_frame: usize,
}

impl StreamerConfig {
    /// Creates a config, validating the radii.
    ///
    /// # Panics
    ///
    /// Panics unless `unload_radius > load_radius > 0`: the hysteresis
    /// margin must be strictly positive or a viewer oscillating at the
    /// load boundary would thrash load/evict every frame.
    #[must_use]
    pub fn new(load_radius: f32, unload_radius: f32, max_loads_per_frame: usize) -> Self {
        assert!(load_radius > 0.0, "Load radius must be positive");
        assert!(
            unload_radius > load_radius,
            "Unload radius must be greater than load radius"
        );
        Self {
            load_radius,
            unload_radius,
            max_loads_per_frame,
        }
    }

    /// The hysteresis band added to each LOD's max distance on unload.
    #[must_use]
    pub fn hysteresis_margin(&self) -> f32 {
        self.unload_radius - self.load_radius
    }
}

/// One entry of the per-frame active list: resident and in range.
#[derive(Debug, Clone, Copy)]
pub struct ActiveTile {
    /// Packed tile identity
    pub key: TileKey,
    /// Occupied resident slot
    pub slot: LayerId,
    /// LOD level (list is sorted ascending, finest first)
    pub lod: u32,
    /// World-space footprint
    pub bounds: TileBounds,
    /// Distance from tile center to the viewer this frame
    pub distance: f32,
}

/// Counters for one `update` call.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamStats {
    /// Tiles successfully loaded and promoted this frame
    pub loaded: usize,
    /// Tiles evicted this frame
    pub evicted: usize,
    /// Tile load failures this frame (retried while in range)
    pub failed: usize,
    /// Candidates left for future frames
    pub pending: usize,
    /// Resident tiles after this frame
    pub resident: u32,
}

/// The per-frame streaming driver.
///
/// Single-threaded: `update` is the only mutator of the store and must
/// not run concurrently with height queries.
pub struct Streamer {
    config: StreamerConfig,
    bands: LodBands,
    active: Vec<ActiveTile>,
    stats: StreamStats,
}

struct Candidate {
    coord: TileCoord,
    lod: u32,
    distance: f32,
}

impl Streamer {
    /// Creates a streamer with validated config and LOD bands.
    #[must_use]
    pub fn new(config: StreamerConfig, bands: LodBands) -> Self {
        Self {
            config,
            bands,
            active: Vec::new(),
            stats: StreamStats::default(),
        }
    }

    /// The configured radii and budget.
    #[must_use]
    pub fn config(&self) -> &StreamerConfig {
        &self.config
    }

    /// The LOD distance bands in use.
    #[must_use]
    pub fn bands(&self) -> &LodBands {
        &self.bands
    }

    /// Counters from the most recent `update`.
    #[must_use]
    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    /// The active list: resident tiles in range, finest LOD first.
    #[must_use]
    pub fn active_tiles(&self) -> &[ActiveTile] {
        &self.active
    }

    /// Runs one streaming frame against the store.
    pub fn update(&mut self, viewer: Vec2, store: &mut TileStore) {
        let (in_range, candidates) = self.collect_in_range(viewer, store);

        // Evictions first: slots freed here are reusable this frame.
        let evicted = self.evict_out_of_range(viewer, store);

        let (loaded, failed, pending) = self.load_candidates(candidates, store);

        self.rebuild_active(&in_range, store);

        self.stats = StreamStats {
            loaded,
            evicted,
            failed,
            pending,
            resident: store.resident_count(),
        };
        if loaded > 0 || evicted > 0 {
            debug!(
                "Streamed frame: {loaded} loaded, {evicted} evicted, {failed} failed, {} resident",
                store.resident_count()
            );
        }
    }

    /// Computes, per LOD, every grid cell whose center falls in this
    /// LOD's band and within the load radius. Returns the full in-range
    /// set (for the active list) and the unresident subset as load
    /// candidates, sorted nearest first.
    fn collect_in_range(
        &self,
        viewer: Vec2,
        store: &TileStore,
    ) -> (Vec<(TileKey, f32)>, Vec<Candidate>) {
        let grid = *store.grid();
        let mut in_range = Vec::new();
        let mut candidates = Vec::new();

        let levels = grid.num_lod_levels.min(self.bands.levels());
        for lod in 0..levels {
            let reach = self.config.load_radius.min(self.bands.max_distance(lod));
            let min = grid.world_to_tile(viewer.x - reach, viewer.y - reach, lod);
            let max = grid.world_to_tile(viewer.x + reach, viewer.y + reach, lod);

            for z in min.z..=max.z {
                for x in min.x..=max.x {
                    let coord = TileCoord::new(x, z);
                    let distance = grid.tile_center(coord, lod).distance(viewer);
                    if self.bands.lod_for_distance(distance) != Some(lod)
                        || distance >= self.config.load_radius
                    {
                        continue;
                    }

                    let key = TileKey::pack(coord, lod);
                    in_range.push((key, distance));
                    let resident = store.get(key).is_some_and(Tile::is_resident);
                    if !resident {
                        candidates.push(Candidate {
                            coord,
                            lod,
                            distance,
                        });
                    }
                }
            }
        }

        candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        (in_range, candidates)
    }

    /// Evicts every loaded tile whose center has drifted past its LOD's
    /// unload threshold: `lod_max_distance + hysteresis_margin`.
    fn evict_out_of_range(&self, viewer: Vec2, store: &mut TileStore) -> usize {
        let margin = self.config.hysteresis_margin();
        let to_evict: Vec<TileKey> = store
            .tiles()
            .filter(|(_, tile)| {
                let lod = tile.lod.min(self.bands.levels() - 1);
                let threshold = self.bands.max_distance(lod) + margin;
                tile.bounds.center().distance(viewer) > threshold
            })
            .map(|(key, _)| *key)
            .collect();

        let mut count = 0;
        for key in to_evict {
            if store.evict(key) {
                count += 1;
            }
        }
        count
    }

    /// Loads up to the per-frame budget from the candidate list.
    ///
    /// Per-tile failures are logged and skipped; capacity exhaustion
    /// stops loading for the frame (expected back-pressure). Returns
    /// (loaded, failed, pending).
    fn load_candidates(
        &self,
        candidates: Vec<Candidate>,
        store: &mut TileStore,
    ) -> (usize, usize, usize) {
        let total = candidates.len();

        // Already saturated: skip instead of failing K times.
        if store.resident_count() >= store.capacity() {
            return (0, 0, total);
        }

        let mut loaded = 0;
        let mut failed = 0;
        let mut attempted = 0;
        for candidate in &candidates {
            if loaded >= self.config.max_loads_per_frame {
                break;
            }
            attempted += 1;
            match store.load_and_promote(candidate.coord, candidate.lod) {
                Ok(true) => loaded += 1,
                Ok(false) => failed += 1,
                // Slot pool exhausted; keep the resident set as-is.
                Err(_) => break,
            }
        }

        (loaded, failed, total - attempted + failed)
    }

    /// Rebuilds the active list: resident tiles from this frame's
    /// in-range set, sorted ascending LOD then distance (finest first).
    fn rebuild_active(&mut self, in_range: &[(TileKey, f32)], store: &TileStore) {
        self.active.clear();
        for &(key, distance) in in_range {
            let Some(tile) = store.get(key) else { continue };
            let Some(slot) = tile.slot() else { continue };
            self.active.push(ActiveTile {
                key,
                slot,
                lod: tile.lod,
                bounds: tile.bounds,
                distance,
            });
        }
        self.active
            .sort_by(|a, b| a.lod.cmp(&b.lod).then(a.distance.total_cmp(&b.distance)));
    }
}
