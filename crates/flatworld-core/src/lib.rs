//! Entities, the per-tick scene cycle and the simulation manager.
//!
//! A [`Scene`] owns every entity and a [`SpatialIndex`] over them. Each call
//! to [`Scene::tick`] rebuilds the index, runs every entity's [`Behavior`]
//! once in insertion order and purges entities that were removed. The
//! [`Manager`] drives ticks on a dedicated thread with an optional rate cap.
//!
//! # Modules
//!
//! - [`entity`] -- [`Behavior`] trait, [`EntityState`] and movement
//!   primitives.
//! - [`scene`] -- [`Scene`] arena, neighbor queries and the tick cycle.
//! - [`context`] -- [`UpdateContext`], the view of the scene handed to a
//!   behavior while it runs.
//! - [`manager`] -- [`Manager`] loop thread, throttling and [`TickHooks`].
//! - [`throughput`] -- Sliding window of achieved updates per second.
//! - [`config`] -- Configuration loading from `flatworld-config.yaml`.
//! - [`data`] -- [`DataPoints`] trait and the [`DataCollector`].
//! - [`random`] -- [`SimRandom`], seeded randomness for simulations.
//!
//! [`SpatialIndex`]: flatworld_world::SpatialIndex

pub mod config;
pub mod context;
pub mod data;
pub mod entity;
pub mod manager;
pub mod random;
pub mod scene;
pub mod throughput;

pub use config::{ConfigError, SimulationConfig};
pub use context::UpdateContext;
pub use data::{Data, DataCollector, DataError, DataPoints};
pub use entity::{AsAny, Attachment, Behavior, Entity, EntityState};
pub use manager::{Manager, ManagerError, ManagerStatus, NoOpHooks, TickHooks};
pub use random::SimRandom;
pub use scene::{EntitySnapshot, Scene, SceneError, TickSummary};
