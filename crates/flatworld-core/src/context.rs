//! The view of the scene a behavior gets while it updates.
//!
//! Changes to the updating entity are applied to the state stored in the
//! arena under its lock, so writes made by other threads during the update
//! are never overwritten. The context caches the stored state after every
//! change. Access to other entities goes through the scene's locks one
//! operation at a time.

use flatworld_types::{Color, EntityId, Point, Shape};
use flatworld_world::Rect;

use crate::entity::{Behavior, Entity, EntityState};
use crate::scene::Scene;

/// Scene access for one entity during one [`Behavior::update`] call.
pub struct UpdateContext<'a> {
    scene: &'a Scene,
    id: EntityId,
    state: EntityState,
}

impl<'a> UpdateContext<'a> {
    pub(crate) const fn new(scene: &'a Scene, id: EntityId, state: EntityState) -> Self {
        Self { scene, id, state }
    }

    /// Id of the updating entity.
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// State of the updating entity as of its last own change.
    pub const fn state(&self) -> &EntityState {
        &self.state
    }

    /// Position of the updating entity.
    pub const fn position(&self) -> Point {
        self.state.position()
    }

    /// Age of the scene; the current tick has already been counted.
    pub fn age(&self) -> u64 {
        self.scene.age()
    }

    /// Bounds of the scene.
    pub const fn bounds(&self) -> Rect {
        self.scene.bounds()
    }

    // -----------------------------------------------------------------------
    // Own state
    // -----------------------------------------------------------------------

    /// Apply `f` to the stored own state and refresh the cached copy.
    fn modify<R>(&mut self, f: impl FnOnce(&mut EntityState) -> R) -> R {
        self.scene.update_cached(self.id, &mut self.state, f)
    }

    /// Move to `position`, clamped into the scene bounds.
    pub fn set_position(&mut self, position: Point) {
        self.modify(|s| s.set_position(position));
    }

    /// Step towards `target` by at most `max_distance`.
    pub fn move_towards(&mut self, target: Point, max_distance: f64) {
        self.modify(|s| s.move_towards(target, max_distance));
    }

    /// Replace the shape.
    pub fn set_shape(&mut self, shape: Shape) {
        self.modify(|s| s.set_shape(shape));
    }

    /// Change the presentation color.
    pub fn set_color(&mut self, color: Color) {
        self.modify(|s| s.set_color(color));
    }

    /// Mark the updating entity as removed.
    pub fn remove(&mut self) {
        self.modify(EntityState::remove);
    }

    // -----------------------------------------------------------------------
    // Other entities
    // -----------------------------------------------------------------------

    /// Live neighbors within `radius`, excluding the updating entity.
    pub fn query_neighbors(&self, radius: f64) -> Vec<EntityId> {
        self.scene
            .query_neighbors(self.state.position(), radius, Some(self.id))
    }

    /// Copy of an entity's state, read from the arena.
    pub fn entity(&self, other: EntityId) -> Option<EntityState> {
        let found = self.scene.entity(other);
        if other == self.id {
            return found.or(Some(self.state));
        }
        found
    }

    /// Return `true` if the updating entity overlaps `other`.
    pub fn overlaps_with(&self, other: EntityId) -> bool {
        self.entity(other)
            .is_some_and(|state| self.state.overlaps_with(&state))
    }

    /// Run `f` on another entity's state.
    ///
    /// Passing the updating entity's own id modifies its own state.
    pub fn update_entity<R>(
        &mut self,
        other: EntityId,
        f: impl FnOnce(&mut EntityState) -> R,
    ) -> Option<R> {
        if other == self.id {
            return Some(self.modify(f));
        }
        self.scene.update_entity(other, f)
    }

    /// Run `f` on another entity's behavior, downcast to `T`, and state.
    ///
    /// Returns `None` for the updating entity itself, whose behavior is
    /// the one running.
    pub fn with_behavior<T, R>(
        &mut self,
        other: EntityId,
        f: impl FnOnce(&mut T, &mut EntityState) -> R,
    ) -> Option<R>
    where
        T: Behavior,
    {
        if other == self.id {
            return None;
        }
        self.scene.with_behavior(other, f)
    }

    /// Add a new entity to the scene.
    ///
    /// The new entity is not indexed or updated before the next tick.
    pub fn spawn(&mut self, entity: Entity) -> EntityId {
        self.scene.add(entity)
    }
}
