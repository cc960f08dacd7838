//! The scene: entity arena, spatial index and the tick cycle.
//!
//! # Tick cycle
//!
//! Every call to [`Scene::tick`] runs these steps on the calling thread:
//!
//! 1. Advance the age counter and purge entities whose behavior was lost
//!    to a panic during an earlier tick.
//! 2. Snapshot the ids and positions of every live entity.
//! 3. Clear the spatial index and insert the snapshot.
//! 4. Update each snapshotted entity that is still live, in id order.
//! 5. Purge every entity marked removed.
//!
//! Entities added while a tick is running enter the arena immediately but
//! are neither indexed nor updated until the next tick, because steps 3
//! and 4 only look at the snapshot.
//!
//! # Locking
//!
//! The arena sits behind a mutex and the index behind a read-write lock.
//! When both are needed the index is locked first. Behaviors run with no
//! lock held; every [`UpdateContext`] operation takes the locks it needs
//! for that one operation. External readers always receive copies.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use flatworld_types::{Color, EntityId, Point, Shape};
use flatworld_world::{IndexConfig, IndexError, Rect, SpatialIndex};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::context::UpdateContext;
use crate::data::DataPoints;
use crate::entity::{Attachment, Behavior, Entity, EntityState, downcast_mut};

/// Errors that can occur when constructing a scene.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// Width or height is negative or not finite.
    #[error("invalid scene dimensions {width} x {height}: both must be finite and non-negative")]
    InvalidDimensions {
        /// Requested width.
        width: f64,
        /// Requested height.
        height: f64,
    },

    /// The spatial index could not be built.
    #[error("index error: {source}")]
    Index {
        /// The underlying index error.
        #[from]
        source: IndexError,
    },
}

/// Outcome of one [`Scene::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSummary {
    /// Age of the scene after this tick.
    pub age: u64,
    /// Number of behaviors that ran.
    pub updated: usize,
    /// Number of entities purged by this tick: removed entities and
    /// entities whose behavior panicked during an earlier tick.
    pub purged: usize,
    /// Number of entities in the arena after the purge.
    pub population: usize,
}

/// A copy of one entity handed to external readers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Id assigned by the scene.
    pub id: EntityId,
    /// Shape at the time of the snapshot.
    pub shape: Shape,
    /// Presentation color.
    pub color: Color,
    /// Whether the entity was marked removed but not yet purged.
    pub removed: bool,
}

/// An arena entry. `behavior` is `None` while the behavior is running.
struct Slot {
    state: EntityState,
    behavior: Option<Box<dyn Behavior>>,
}

/// Authoritative entity storage.
struct Arena {
    slots: BTreeMap<EntityId, Slot>,
    next_id: u64,
}

impl Arena {
    const fn new() -> Self {
        Self {
            slots: BTreeMap::new(),
            next_id: 0,
        }
    }

    fn insert(&mut self, entity: Entity, width: f64, height: f64) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);

        let Entity {
            mut state,
            behavior,
        } = entity;
        state.attach(Attachment { id, width, height });
        self.slots.insert(
            id,
            Slot {
                state,
                behavior: Some(behavior),
            },
        );
        id
    }
}

/// A bounded two-dimensional world of entities.
///
/// `Scene` is `Send + Sync`; share it as `Arc<Scene>` between the thread
/// that ticks it and any readers.
pub struct Scene {
    width: f64,
    height: f64,
    age: AtomicU64,
    index: RwLock<SpatialIndex>,
    arena: Mutex<Arena>,
}

impl Scene {
    /// Create an empty scene with the default index shape.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::InvalidDimensions`] if either dimension is
    /// negative or not finite.
    pub fn new(width: f64, height: f64) -> Result<Self, SceneError> {
        Self::with_index_config(width, height, IndexConfig::default())
    }

    /// Create an empty scene with an explicit index shape.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::InvalidDimensions`] for negative or non-finite
    /// dimensions and [`SceneError::Index`] for an invalid index shape.
    pub fn with_index_config(
        width: f64,
        height: f64,
        index_config: IndexConfig,
    ) -> Result<Self, SceneError> {
        let valid = |v: f64| v.is_finite() && v >= 0.0;
        if !valid(width) || !valid(height) {
            return Err(SceneError::InvalidDimensions { width, height });
        }

        let index = SpatialIndex::new(width, height, index_config)?;
        info!(
            width,
            height,
            depth = index_config.depth,
            branching = index_config.branching,
            "Scene created"
        );

        Ok(Self {
            width,
            height,
            age: AtomicU64::new(0),
            index: RwLock::new(index),
            arena: Mutex::new(Arena::new()),
        })
    }

    /// Scene width.
    pub const fn width(&self) -> f64 {
        self.width
    }

    /// Scene height.
    pub const fn height(&self) -> f64 {
        self.height
    }

    /// The rectangle `[0, width] x [0, height]`.
    pub const fn bounds(&self) -> Rect {
        Rect::from_size(self.width, self.height)
    }

    /// Number of completed ticks.
    pub fn age(&self) -> u64 {
        self.age.load(Ordering::Acquire)
    }

    /// Number of entities in the arena, including removed entities that
    /// have not been purged yet.
    pub fn population(&self) -> usize {
        self.arena.lock().slots.len()
    }

    // -----------------------------------------------------------------------
    // Adding entities
    // -----------------------------------------------------------------------

    /// Add an entity and return the id assigned to it.
    ///
    /// The entity's position is clamped into the scene bounds.
    pub fn add(&self, entity: Entity) -> EntityId {
        let id = self.arena.lock().insert(entity, self.width, self.height);
        trace!(%id, "Entity added");
        id
    }

    /// Add several entities, preserving their order.
    pub fn add_many<I>(&self, entities: I) -> Vec<EntityId>
    where
        I: IntoIterator<Item = Entity>,
    {
        let mut arena = self.arena.lock();
        let ids: Vec<EntityId> = entities
            .into_iter()
            .map(|entity| arena.insert(entity, self.width, self.height))
            .collect();
        drop(arena);
        trace!(count = ids.len(), "Entities added");
        ids
    }

    // -----------------------------------------------------------------------
    // Reading
    // -----------------------------------------------------------------------

    /// Copy every entity in the arena, in insertion order.
    ///
    /// Entities marked removed are included until the tick that purges
    /// them.
    pub fn snapshot_entities(&self) -> Vec<EntitySnapshot> {
        self.arena
            .lock()
            .slots
            .iter()
            .map(|(id, slot)| EntitySnapshot {
                id: *id,
                shape: *slot.state.shape(),
                color: slot.state.color(),
                removed: slot.state.is_removed(),
            })
            .collect()
    }

    /// Copy the state of one entity.
    pub fn entity(&self, id: EntityId) -> Option<EntityState> {
        self.arena.lock().slots.get(&id).map(|slot| slot.state)
    }

    /// Ids of live entities within `radius` of `point`, excluding
    /// `ignored`.
    ///
    /// Only entities indexed by the most recent tick can be found.
    pub fn query_neighbors(
        &self,
        point: Point,
        radius: f64,
        ignored: Option<EntityId>,
    ) -> Vec<EntityId> {
        let index = self.index.read();
        let arena = self.arena.lock();
        index.query(point, radius, ignored, |id| {
            arena
                .slots
                .get(&id)
                .filter(|slot| !slot.state.is_removed())
                .map(|slot| slot.state.position())
        })
    }

    /// Neighbors of entity `id` within `radius`, excluding itself.
    ///
    /// Empty if the entity is unknown.
    pub fn neighbors_of(&self, id: EntityId, radius: f64) -> Vec<EntityId> {
        match self.entity(id) {
            Some(state) => self.query_neighbors(state.position(), radius, Some(id)),
            None => Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Mutation from outside a behavior
    // -----------------------------------------------------------------------

    /// Run `f` on the state of entity `id`.
    ///
    /// `f` runs with the arena locked and must not call back into the
    /// scene.
    pub fn update_entity<R>(&self, id: EntityId, f: impl FnOnce(&mut EntityState) -> R) -> Option<R> {
        self.arena.lock().slots.get_mut(&id).map(|slot| f(&mut slot.state))
    }

    /// Run `f` on the stored state of `id` and copy the result to `cached`.
    ///
    /// Falls back to `cached` alone when the entity is not in the arena.
    pub(crate) fn update_cached<R>(
        &self,
        id: EntityId,
        cached: &mut EntityState,
        f: impl FnOnce(&mut EntityState) -> R,
    ) -> R {
        let mut arena = self.arena.lock();
        if let Some(slot) = arena.slots.get_mut(&id) {
            let result = f(&mut slot.state);
            *cached = slot.state;
            result
        } else {
            f(cached)
        }
    }

    /// Run `f` on the behavior of entity `id`, downcast to `T`, and its
    /// state.
    ///
    /// Returns `None` if the entity is unknown, its behavior is not a `T`,
    /// or its behavior is running right now. `f` runs with the arena
    /// locked and must not call back into the scene.
    pub fn with_behavior<T, R>(
        &self,
        id: EntityId,
        f: impl FnOnce(&mut T, &mut EntityState) -> R,
    ) -> Option<R>
    where
        T: Behavior,
    {
        let mut arena = self.arena.lock();
        let Slot { state, behavior } = arena.slots.get_mut(&id)?;
        let behavior = downcast_mut::<T>(behavior.as_deref_mut()?)?;
        Some(f(behavior, state))
    }

    /// Forward an external selection to the entity's
    /// [`on_select`](Behavior::on_select) hook.
    ///
    /// Returns `false` if the entity is unknown or is being updated.
    pub fn select(&self, id: EntityId) -> bool {
        let mut arena = self.arena.lock();
        let Some(Slot { state, behavior }) = arena.slots.get_mut(&id) else {
            warn!(%id, "Selection forwarded to unknown entity");
            return false;
        };
        let Some(behavior) = behavior.as_deref_mut() else {
            warn!(%id, "Selection forwarded to entity that is being updated");
            return false;
        };
        behavior.on_select(state);
        true
    }

    /// Visit every live entity whose behavior is idle.
    pub(crate) fn for_each_behavior(&self, mut f: impl FnMut(EntityId, &EntityState, &dyn Behavior)) {
        let arena = self.arena.lock();
        for (id, slot) in &arena.slots {
            if slot.state.is_removed() {
                continue;
            }
            if let Some(behavior) = slot.behavior.as_deref() {
                f(*id, &slot.state, behavior);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Tick cycle
    // -----------------------------------------------------------------------

    /// Advance the scene by one tick.
    ///
    /// A panic inside a behavior propagates to the caller. The panicking
    /// entity's behavior is lost; the arena and index stay consistent, and
    /// the entity is purged at the start of the next tick. Ticks of one
    /// scene must not overlap.
    pub fn tick(&self) -> TickSummary {
        let age = self.age.fetch_add(1, Ordering::AcqRel).saturating_add(1);
        let orphans = self.purge_orphans(age);

        let snapshot: Vec<(EntityId, Point)> = self
            .arena
            .lock()
            .slots
            .iter()
            .filter(|(_, slot)| !slot.state.is_removed())
            .map(|(id, slot)| (*id, slot.state.position()))
            .collect();

        {
            let mut index = self.index.write();
            let indexed = index.rebuild(snapshot.iter().copied());
            let stats = index.stats();
            trace!(
                age,
                indexed,
                occupied_leaves = stats.occupied_leaves,
                largest_leaf = stats.largest_leaf,
                "Index rebuilt"
            );
        }

        let mut updated: usize = 0;
        for &(id, _) in &snapshot {
            if self.run_behavior(id) {
                updated = updated.saturating_add(1);
            }
        }

        let (purged, population) = {
            let mut arena = self.arena.lock();
            let before = arena.slots.len();
            arena.slots.retain(|_, slot| !slot.state.is_removed());
            let after = arena.slots.len();
            (before.saturating_sub(after).saturating_add(orphans), after)
        };

        let summary = TickSummary {
            age,
            updated,
            purged,
            population,
        };
        debug!(age, updated, purged, population, "Tick completed");
        summary
    }

    /// Drop slots left without a behavior. No behavior runs outside
    /// [`Scene::tick`], so an empty slot here means its update panicked.
    fn purge_orphans(&self, age: u64) -> usize {
        let mut arena = self.arena.lock();
        let before = arena.slots.len();
        arena.slots.retain(|id, slot| {
            let orphaned = slot.behavior.is_none();
            if orphaned {
                warn!(%id, age, "Purging entity whose behavior panicked");
            }
            !orphaned
        });
        before.saturating_sub(arena.slots.len())
    }

    /// Take the behavior of `id` out of the arena, run it, put it back.
    fn run_behavior(&self, id: EntityId) -> bool {
        let taken = {
            let mut arena = self.arena.lock();
            match arena.slots.get_mut(&id) {
                Some(slot) if !slot.state.is_removed() => slot
                    .behavior
                    .take()
                    .map(|behavior| (behavior, slot.state)),
                _ => None,
            }
        };
        let Some((mut behavior, state)) = taken else {
            return false;
        };

        let mut ctx = UpdateContext::new(self, id, state);
        behavior.update(&mut ctx);

        if let Some(slot) = self.arena.lock().slots.get_mut(&id) {
            slot.behavior = Some(behavior);
        }
        true
    }
}

impl DataPoints for Scene {
    fn data_points(&self) -> Vec<(&'static str, f64)> {
        #[allow(clippy::cast_precision_loss)]
        let points = vec![
            ("age", self.age() as f64),
            ("entity_count", self.population() as f64),
        ];
        points
    }
}

impl core::fmt::Debug for Scene {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Scene")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("age", &self.age())
            .field("population", &self.population())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use std::sync::Arc;

    use super::*;

    struct Idle;

    impl Behavior for Idle {
        fn update(&mut self, _ctx: &mut UpdateContext<'_>) {}
    }

    /// Appends its own id to a shared log on every update.
    struct Logger {
        log: Arc<Mutex<Vec<EntityId>>>,
    }

    impl Behavior for Logger {
        fn update(&mut self, ctx: &mut UpdateContext<'_>) {
            self.log.lock().push(ctx.id());
        }
    }

    /// Removes itself on its first update.
    struct SelfDestruct;

    impl Behavior for SelfDestruct {
        fn update(&mut self, ctx: &mut UpdateContext<'_>) {
            ctx.remove();
        }
    }

    struct Selectable {
        selected: u32,
    }

    impl Behavior for Selectable {
        fn update(&mut self, _ctx: &mut UpdateContext<'_>) {}

        fn on_select(&mut self, state: &mut EntityState) {
            self.selected = self.selected.saturating_add(1);
            state.set_color(Color::RED);
        }
    }

    fn idle_at(x: f64, y: f64) -> Entity {
        Entity::new(Shape::circle(Point::new(x, y), 2.0), Color::WHITE, Idle)
    }

    #[test]
    fn negative_dimensions_fail() {
        assert!(matches!(
            Scene::new(-1.0, 10.0),
            Err(SceneError::InvalidDimensions { .. })
        ));
        assert!(Scene::new(10.0, -0.5).is_err());
        assert!(Scene::new(f64::NAN, 10.0).is_err());
        assert!(Scene::new(0.0, 0.0).is_ok());
    }

    #[test]
    fn invalid_index_config_fails() {
        let config = IndexConfig {
            depth: 0,
            branching: 5,
        };
        assert!(matches!(
            Scene::with_index_config(10.0, 10.0, config),
            Err(SceneError::Index { .. })
        ));
    }

    #[test]
    fn ids_follow_insertion_order() {
        let scene = Scene::new(100.0, 100.0).unwrap();
        let first = scene.add(idle_at(1.0, 1.0));
        let rest = scene.add_many([idle_at(2.0, 2.0), idle_at(3.0, 3.0)]);
        assert_eq!(first, EntityId(0));
        assert_eq!(rest, vec![EntityId(1), EntityId(2)]);
    }

    #[test]
    fn add_clamps_position() {
        let scene = Scene::new(100.0, 100.0).unwrap();
        let id = scene.add(idle_at(250.0, -4.0));
        let state = scene.entity(id).unwrap();
        assert_eq!(state.position(), Point::new(100.0, 0.0));
        assert_eq!(state.id(), Some(id));
    }

    #[test]
    fn update_order_is_insertion_order() {
        let scene = Scene::new(100.0, 100.0).unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..6 {
            let logger = Logger {
                log: Arc::clone(&log),
            };
            scene.add(Entity::new(
                Shape::circle(Point::new(f64::from(i), 0.0), 1.0),
                Color::WHITE,
                logger,
            ));
        }
        let summary = scene.tick();
        let expected: Vec<EntityId> = (0..6).map(EntityId).collect();
        assert_eq!(*log.lock(), expected);
        assert_eq!(summary.updated, 6);
    }

    #[test]
    fn removed_entity_survives_until_next_tick() {
        let scene = Scene::new(100.0, 100.0).unwrap();
        let id = scene.add(idle_at(5.0, 5.0));
        scene.update_entity(id, EntityState::remove);

        let snapshot = scene.snapshot_entities();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.first().is_some_and(|e| e.removed));

        let summary = scene.tick();
        assert_eq!(summary.purged, 1);
        assert!(scene.snapshot_entities().is_empty());
    }

    #[test]
    fn self_removal_is_purged_at_end_of_tick() {
        let scene = Scene::new(100.0, 100.0).unwrap();
        scene.add(Entity::new(
            Shape::circle(Point::new(5.0, 5.0), 1.0),
            Color::WHITE,
            SelfDestruct,
        ));
        scene.add(idle_at(6.0, 6.0));
        let summary = scene.tick();
        assert_eq!(summary.updated, 2);
        assert_eq!(summary.purged, 1);
        assert_eq!(summary.population, 1);
    }

    #[test]
    fn age_counts_ticks() {
        let scene = Scene::new(10.0, 10.0).unwrap();
        assert_eq!(scene.age(), 0);
        for expected in 1..=5 {
            assert_eq!(scene.tick().age, expected);
            assert_eq!(scene.age(), expected);
        }
    }

    #[test]
    fn query_excludes_self_and_distant() {
        let scene = Scene::new(100.0, 100.0).unwrap();
        let ids = scene.add_many([idle_at(10.0, 10.0), idle_at(20.0, 10.0), idle_at(30.0, 10.0)]);
        scene.tick();

        let first = *ids.first().unwrap();
        let found = scene.neighbors_of(first, 15.0);
        assert_eq!(found, vec![*ids.get(1).unwrap()]);
    }

    #[test]
    fn query_before_first_tick_finds_nothing() {
        let scene = Scene::new(100.0, 100.0).unwrap();
        scene.add_many([idle_at(10.0, 10.0), idle_at(11.0, 10.0)]);
        assert!(scene.query_neighbors(Point::new(10.0, 10.0), 5.0, None).is_empty());
    }

    #[test]
    fn query_skips_removed_entities() {
        let scene = Scene::new(100.0, 100.0).unwrap();
        let ids = scene.add_many([idle_at(10.0, 10.0), idle_at(12.0, 10.0)]);
        scene.tick();
        let second = *ids.get(1).unwrap();
        scene.update_entity(second, EntityState::remove);
        assert!(scene.query_neighbors(Point::new(10.0, 10.0), 5.0, Some(EntityId(0))).is_empty());
    }

    #[test]
    fn neighbors_of_finds_clustered_entities() {
        let scene = Scene::new(200.0, 200.0).unwrap();
        let ids = scene.add_many([
            idle_at(100.0, 100.0),
            idle_at(95.0, 95.0),
            idle_at(40.0, 10.0),
            idle_at(105.0, 103.0),
        ]);
        scene.tick();
        let found = scene.neighbors_of(*ids.first().unwrap(), 10.0);
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn select_runs_hook_on_idle_entity() {
        let scene = Scene::new(10.0, 10.0).unwrap();
        let id = scene.add(Entity::new(
            Shape::circle(Point::ORIGIN, 1.0),
            Color::WHITE,
            Selectable { selected: 0 },
        ));
        assert!(scene.select(id));
        assert!(!scene.select(EntityId(99)));
        assert_eq!(scene.entity(id).unwrap().color(), Color::RED);
        let count = scene.with_behavior::<Selectable, _>(id, |s, _| s.selected);
        assert_eq!(count, Some(1));
    }

    #[test]
    fn with_behavior_rejects_wrong_type() {
        let scene = Scene::new(10.0, 10.0).unwrap();
        let id = scene.add(idle_at(1.0, 1.0));
        assert!(scene.with_behavior::<Selectable, _>(id, |_, _| ()).is_none());
        assert!(scene.with_behavior::<Idle, _>(id, |_, _| ()).is_some());
    }

    #[test]
    fn scene_reports_data_points() {
        let scene = Scene::new(10.0, 10.0).unwrap();
        scene.add(idle_at(1.0, 1.0));
        scene.tick();
        let points = scene.data_points();
        assert!(points.contains(&("age", 1.0)));
        assert!(points.contains(&("entity_count", 1.0)));
    }

    #[test]
    fn scene_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Scene>();
    }
}
