//! Geometry and spatial indexing for the Flatworld simulation.
//!
//! This crate models the physical side of a scene: overlap tests between
//! the shapes entities carry, and the fixed-depth recursive grid that
//! answers "who is within radius `r` of this point" faster than a scan.
//!
//! # Modules
//!
//! - [`error`] -- Error types for index construction.
//! - [`geometry`] -- [`Rect`], shape overlap predicates and the
//!   circle-versus-rectangle test the index prunes with.
//! - [`index`] -- [`SpatialIndex`], a tree of rectangular cells rebuilt
//!   from scratch once per tick.

pub mod error;
pub mod geometry;
pub mod index;

// Re-export primary types at crate root.
pub use error::IndexError;
pub use geometry::{Rect, circle_overlaps_rectangle, shapes_overlap};
pub use index::{IndexConfig, IndexStats, SpatialIndex};
