//! # Relief Common
//!
//! Foundational types for the relief terrain tile cache:
//! - Tile coordinates, packed cache keys, and world/grid mapping
//! - Level-of-detail distance bands
//! - The cache's error taxonomy

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod coords;
pub mod error;
pub mod lod;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::coords::*;
    pub use crate::error::*;
    pub use crate::lod::*;
}

pub use prelude::*;
