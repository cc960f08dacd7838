//! Shared type definitions for the Flatworld simulation.
//!
//! This crate holds the plain value types that every other crate in the
//! workspace passes around: positions, shapes, presentation colors and
//! entity identifiers. Nothing here knows about scenes, ticks or threads.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe identifier wrappers
//! - [`geometry`] -- [`Point`] and [`Shape`] value types
//! - [`color`] -- RGBA presentation color

pub mod color;
pub mod geometry;
pub mod ids;

// Re-export all public types at crate root for convenience.
pub use color::Color;
pub use geometry::{Point, Shape, ShapeKind};
pub use ids::EntityId;
