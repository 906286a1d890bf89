//! Error types for the relief terrain cache.

use thiserror::Error;

use crate::coords::TileKey;

/// Recoverable per-tile load failure.
///
/// A tile that fails to load simply stays unloaded; it remains a
/// candidate on later frames while it is in range.
#[derive(Debug, Error)]
pub enum LoadError {
    /// No backing file exists for this tile
    #[error("tile {key} not found")]
    NotFound {
        /// Key of the missing tile
        key: TileKey,
    },

    /// The backing file exists but could not be decoded
    #[error("failed to decode tile {key}: {message}")]
    Decode {
        /// Key of the failing tile
        key: TileKey,
        /// Decoder diagnostic
        message: String,
    },

    /// Decoded grid side length is neither the nominal resolution nor
    /// nominal plus overlap
    #[error(
        "tile {key} decoded to {actual}x{actual}, expected {nominal} or {with_overlap}"
    )]
    SizeMismatch {
        /// Key of the failing tile
        key: TileKey,
        /// Nominal tile resolution
        nominal: u32,
        /// Nominal resolution plus overlap margin
        with_overlap: u32,
        /// Observed side length
        actual: u32,
    },
}

/// Failure to promote a CPU-loaded tile into a resident slot.
#[derive(Debug, Error)]
pub enum PromoteError {
    /// The tile has no CPU data; load it first
    #[error("tile {0} has no CPU data to promote")]
    NoCpuData(TileKey),

    /// All resident slots are occupied (expected back-pressure)
    #[error("no free resident slots (capacity: {capacity})")]
    NoCapacity {
        /// Total slot capacity
        capacity: u32,
    },
}

/// Fatal startup failure; the cache cannot be constructed.
#[derive(Debug, Error)]
pub enum CacheInitError {
    /// Metadata file missing or unreadable
    #[error("failed to read tile-set metadata at {path}: {source}")]
    MetadataIo {
        /// Path that was attempted
        path: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Metadata file present but unparseable
    #[error("failed to parse tile-set metadata at {path}: {message}")]
    MetadataParse {
        /// Path that was attempted
        path: String,
        /// Parser diagnostic
        message: String,
    },

    /// Metadata parsed but describes an unusable tile set
    #[error("invalid tile-set metadata: {0}")]
    InvalidMetadata(String),

    /// A base-LOD tile failed to load during startup
    #[error("failed to load base-LOD tile {key}: {source}")]
    BaseTile {
        /// Key of the failing base tile
        key: TileKey,
        /// Underlying load failure
        #[source]
        source: LoadError,
    },
}

/// Result alias for fatal cache construction paths.
pub type CacheResult<T> = Result<T, CacheInitError>;
