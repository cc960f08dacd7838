//! Entity state, the behavior capability and movement primitives.
//!
//! An entity is split in two parts:
//!
//! - [`EntityState`] -- the plain data every entity has: shape, color,
//!   removed flag and the [`Attachment`] to the scene that owns it.
//! - [`Behavior`] -- the per-tick logic of a concrete entity type,
//!   together with whatever private data that type needs.
//!
//! The scene stores both in its arena, keyed by [`EntityId`]. A behavior
//! never holds a reference to the scene; it is handed an
//! [`UpdateContext`](crate::UpdateContext) for the duration of one update.

use std::any::Any;

use flatworld_types::{Color, EntityId, Point, Shape};
use flatworld_world::shapes_overlap;
use serde::{Deserialize, Serialize};

use crate::context::UpdateContext;

/// Record of the scene an entity belongs to.
///
/// Copied into the entity state when the entity is added. It is not a
/// pointer: it only carries the id the scene assigned and the scene
/// dimensions positions are clamped to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    /// Id assigned by the owning scene.
    pub id: EntityId,
    /// Width of the owning scene.
    pub width: f64,
    /// Height of the owning scene.
    pub height: f64,
}

/// Data shared by every entity regardless of its behavior.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    shape: Shape,
    color: Color,
    removed: bool,
    attachment: Option<Attachment>,
}

impl EntityState {
    /// Create a detached, live state.
    pub const fn new(shape: Shape, color: Color) -> Self {
        Self {
            shape,
            color,
            removed: false,
            attachment: None,
        }
    }

    /// Current shape, including position.
    pub const fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Current position (center of the shape).
    pub const fn position(&self) -> Point {
        self.shape.position
    }

    /// Presentation color.
    pub const fn color(&self) -> Color {
        self.color
    }

    /// Return `true` once [`remove`](Self::remove) has been called.
    pub const fn is_removed(&self) -> bool {
        self.removed
    }

    /// The scene this entity belongs to, if it has been added.
    pub const fn attachment(&self) -> Option<&Attachment> {
        self.attachment.as_ref()
    }

    /// The id assigned by the owning scene, if attached.
    pub fn id(&self) -> Option<EntityId> {
        self.attachment.map(|a| a.id)
    }

    /// Move the entity to `position`.
    ///
    /// When attached, each coordinate is clamped into the scene bounds
    /// before it is stored. Detached entities store the position as
    /// given.
    pub fn set_position(&mut self, position: Point) {
        let position = match self.attachment {
            Some(a) => position.clamped(a.width, a.height),
            None => position,
        };
        self.shape = self.shape.with_position(position);
    }

    /// Step towards `target` by at most `max_distance`.
    ///
    /// Lands exactly on `target` when it is within reach, so repeated
    /// calls never overshoot. A negative `max_distance` steps away from
    /// `target` unless the entity already sits on it.
    pub fn move_towards(&mut self, target: Point, max_distance: f64) {
        let current = self.position();
        let distance = current.distance_to(target);

        if distance <= max_distance || distance <= 0.0 {
            self.set_position(target);
        } else {
            self.set_position(current + (target - current) / distance * max_distance);
        }
    }

    /// Replace the shape; the new position is clamped like
    /// [`set_position`](Self::set_position).
    pub fn set_shape(&mut self, shape: Shape) {
        self.shape = shape;
        self.set_position(shape.position);
    }

    /// Change the presentation color.
    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    /// Mark the entity as removed. Calling this again has no effect.
    pub fn remove(&mut self) {
        self.removed = true;
    }

    /// Test whether the two shapes overlap. Removed entities never
    /// overlap anything.
    pub fn overlaps_with(&self, other: &Self) -> bool {
        !self.removed && !other.removed && shapes_overlap(&self.shape, &other.shape)
    }

    /// Bind the state to a scene and clamp its position into the bounds.
    pub(crate) fn attach(&mut self, attachment: Attachment) {
        self.attachment = Some(attachment);
        self.set_position(self.position());
    }
}

// ---------------------------------------------------------------------------
// Behavior
// ---------------------------------------------------------------------------

/// Upcast to [`Any`] so behaviors can be downcast to their concrete type.
///
/// Implemented for every `'static` type; never implement it by hand.
pub trait AsAny {
    /// Borrow as [`Any`].
    fn as_any(&self) -> &dyn Any;
    /// Mutably borrow as [`Any`].
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Per-tick logic of a concrete entity type.
///
/// The scene calls [`update`](Self::update) once per tick on the loop
/// thread, in insertion order. Behaviors must not block.
pub trait Behavior: AsAny + Send + 'static {
    /// Advance this entity by one tick.
    fn update(&mut self, ctx: &mut UpdateContext<'_>);

    /// Called when a presentation layer selects this entity.
    fn on_select(&mut self, _state: &mut EntityState) {}

    /// Named numeric values for data collection.
    fn data_points(&self) -> Vec<(&'static str, f64)> {
        Vec::new()
    }
}

/// Downcast a behavior to its concrete type.
pub(crate) fn downcast_mut<T: Behavior>(behavior: &mut dyn Behavior) -> Option<&mut T> {
    behavior.as_any_mut().downcast_mut::<T>()
}

/// Downcast a behavior to its concrete type.
pub(crate) fn downcast_ref<T: Behavior>(behavior: &dyn Behavior) -> Option<&T> {
    behavior.as_any().downcast_ref::<T>()
}

/// A state together with its behavior, ready to be added to a scene.
pub struct Entity {
    pub(crate) state: EntityState,
    pub(crate) behavior: Box<dyn Behavior>,
}

impl Entity {
    /// Create an entity from its shape, color and behavior.
    pub fn new<B: Behavior>(shape: Shape, color: Color, behavior: B) -> Self {
        Self::from_parts(EntityState::new(shape, color), Box::new(behavior))
    }

    /// Create an entity from an existing state and a boxed behavior.
    pub fn from_parts(state: EntityState, behavior: Box<dyn Behavior>) -> Self {
        Self { state, behavior }
    }

    /// The entity state.
    pub const fn state(&self) -> &EntityState {
        &self.state
    }

    /// Mutable access to the state before the entity is added.
    pub const fn state_mut(&mut self) -> &mut EntityState {
        &mut self.state
    }

    /// The behavior, downcast to `T`.
    pub fn behavior<T: Behavior>(&self) -> Option<&T> {
        downcast_ref::<T>(self.behavior.as_ref())
    }
}

impl core::fmt::Debug for Entity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Entity")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
