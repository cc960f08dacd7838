//! Fixed-depth recursive grid for neighbor queries.
//!
//! The scene rectangle is split into `branching x branching` child cells,
//! each of which is split again until `depth` levels exist; the cells on
//! the last level are leaves holding entity ids. With the defaults
//! (depth 3, branching 5) the tree has 625 leaves.
//!
//! The index stores ids only. Positions are supplied at insert time to
//! pick a leaf, and looked up again at query time so that a query sees
//! where an entity is *now*, not where it was when the index was built.
//! Queries are therefore exact for entities that have not moved far since
//! the last rebuild, and may miss entities that moved out of their leaf.

use flatworld_types::{EntityId, Point};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::IndexError;
use crate::geometry::Rect;

/// Default number of levels in the tree, leaves included.
pub const DEFAULT_DEPTH: u32 = 3;

/// Default number of subdivisions along each axis per level.
pub const DEFAULT_BRANCHING: u32 = 5;

/// Shape of the index tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Levels in the tree. A depth of 1 is a single leaf.
    #[serde(default = "default_depth")]
    pub depth: u32,
    /// Subdivisions along each axis at every non-leaf level.
    #[serde(default = "default_branching")]
    pub branching: u32,
}

const fn default_depth() -> u32 {
    DEFAULT_DEPTH
}

const fn default_branching() -> u32 {
    DEFAULT_BRANCHING
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            depth: DEFAULT_DEPTH,
            branching: DEFAULT_BRANCHING,
        }
    }
}

impl IndexConfig {
    /// Check that the tree shape can be built.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::InvalidConfig`] if `depth` or `branching` is
    /// zero.
    pub fn validate(&self) -> Result<(), IndexError> {
        if self.depth == 0 {
            return Err(IndexError::InvalidConfig {
                reason: String::from("depth must be at least 1"),
            });
        }
        if self.branching == 0 {
            return Err(IndexError::InvalidConfig {
                reason: String::from("branching must be at least 1"),
            });
        }
        Ok(())
    }
}

/// Occupancy figures, used for trace logging after a rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Number of leaf cells in the tree.
    pub leaves: usize,
    /// Number of leaves holding at least one id.
    pub occupied_leaves: usize,
    /// Total number of ids stored.
    pub entries: usize,
    /// Largest number of ids in a single leaf.
    pub largest_leaf: usize,
}

/// A cell of the tree: either more cells or a bucket of ids.
#[derive(Debug, Clone)]
enum Cell {
    Branch { bounds: Rect, children: Vec<Self> },
    Leaf { bounds: Rect, ids: Vec<EntityId> },
}

impl Cell {
    fn build(bounds: Rect, depth: u32, branching: u32) -> Self {
        if depth <= 1 {
            return Self::Leaf {
                bounds,
                ids: Vec::new(),
            };
        }

        let xs = split_axis(bounds.min.x, bounds.max.x, branching);
        let ys = split_axis(bounds.min.y, bounds.max.y, branching);
        let child_depth = depth.saturating_sub(1);

        // Row-major: rows along y, columns along x.
        let mut children = Vec::with_capacity(xs.len().saturating_sub(1).saturating_pow(2));
        for row in ys.windows(2) {
            for col in xs.windows(2) {
                if let ([x0, x1], [y0, y1]) = (col, row) {
                    let child = Rect::new(Point::new(*x0, *y0), Point::new(*x1, *y1));
                    children.push(Self::build(child, child_depth, branching));
                }
            }
        }

        Self::Branch { bounds, children }
    }

    const fn bounds(&self) -> &Rect {
        match self {
            Self::Branch { bounds, .. } | Self::Leaf { bounds, .. } => bounds,
        }
    }

    fn clear(&mut self) {
        match self {
            Self::Branch { children, .. } => children.iter_mut().for_each(Self::clear),
            Self::Leaf { ids, .. } => ids.clear(),
        }
    }

    /// Descend to the first child containing `position` at every level.
    fn insert(&mut self, id: EntityId, position: Point) -> bool {
        match self {
            Self::Leaf { ids, .. } => {
                ids.push(id);
                true
            }
            Self::Branch { children, .. } => children
                .iter_mut()
                .find(|child| child.bounds().contains(position))
                .is_some_and(|child| child.insert(id, position)),
        }
    }

    fn collect<F>(&self, query: &Query, position_of: &mut F, out: &mut Vec<EntityId>)
    where
        F: FnMut(EntityId) -> Option<Point>,
    {
        if !self.bounds().overlaps_circle(query.center, query.radius) {
            return;
        }
        match self {
            Self::Branch { children, .. } => {
                for child in children {
                    child.collect(query, position_of, out);
                }
            }
            Self::Leaf { ids, .. } => {
                for &id in ids {
                    if query.ignored == Some(id) {
                        continue;
                    }
                    let within = position_of(id)
                        .is_some_and(|p| p.distance_squared_to(query.center) <= query.radius_squared);
                    if within {
                        out.push(id);
                    }
                }
            }
        }
    }

    fn accumulate(&self, stats: &mut IndexStats) {
        match self {
            Self::Branch { children, .. } => {
                for child in children {
                    child.accumulate(stats);
                }
            }
            Self::Leaf { ids, .. } => {
                stats.leaves = stats.leaves.saturating_add(1);
                if !ids.is_empty() {
                    stats.occupied_leaves = stats.occupied_leaves.saturating_add(1);
                }
                stats.entries = stats.entries.saturating_add(ids.len());
                stats.largest_leaf = stats.largest_leaf.max(ids.len());
            }
        }
    }
}

/// `n + 1` cut positions from `min` to `max`; the last is exactly `max`.
fn split_axis(min: f64, max: f64, n: u32) -> Vec<f64> {
    let extent = max - min;
    let parts = f64::from(n);
    let mut cuts: Vec<f64> = (0..n).map(|i| extent.mul_add(f64::from(i) / parts, min)).collect();
    cuts.push(max);
    cuts
}

struct Query {
    center: Point,
    radius: f64,
    radius_squared: f64,
    ignored: Option<EntityId>,
}

/// The recursive grid covering one scene.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    root: Cell,
    config: IndexConfig,
    len: usize,
}

impl SpatialIndex {
    /// Build an empty index over `[0, width] x [0, height]`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::InvalidConfig`] if the tree shape is invalid.
    pub fn new(width: f64, height: f64, config: IndexConfig) -> Result<Self, IndexError> {
        config.validate()?;
        let root = Cell::build(Rect::from_size(width, height), config.depth, config.branching);
        Ok(Self {
            root,
            config,
            len: 0,
        })
    }

    /// The tree shape this index was built with.
    pub const fn config(&self) -> IndexConfig {
        self.config
    }

    /// The rectangle covered by the root cell.
    pub const fn bounds(&self) -> &Rect {
        self.root.bounds()
    }

    /// Number of ids currently stored.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Return `true` if no ids are stored.
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Empty every leaf, keeping the tree structure.
    pub fn clear(&mut self) {
        self.root.clear();
        self.len = 0;
    }

    /// Store `id` in the leaf whose cell contains `position`.
    ///
    /// Cells are closed rectangles; a position on a shared edge goes to
    /// the first candidate in row-major order. Returns `false` if the
    /// position lies outside the root cell, in which case nothing is
    /// stored.
    pub fn insert(&mut self, id: EntityId, position: Point) -> bool {
        let inserted = self.root.insert(id, position);
        if inserted {
            self.len = self.len.saturating_add(1);
        } else {
            trace!(%id, %position, "Position outside index bounds, not indexed");
        }
        inserted
    }

    /// Clear the index and insert every `(id, position)` pair.
    ///
    /// Returns the number of ids actually stored.
    pub fn rebuild<I>(&mut self, entries: I) -> usize
    where
        I: IntoIterator<Item = (EntityId, Point)>,
    {
        self.clear();
        for (id, position) in entries {
            self.insert(id, position);
        }
        self.len
    }

    /// Ids within `radius` of `center`, excluding `ignored`.
    ///
    /// `position_of` reports the current position of a stored id, or
    /// `None` if the id should be skipped (removed or unknown). Subtrees
    /// whose cell does not reach the query circle are not visited.
    pub fn query<F>(
        &self,
        center: Point,
        radius: f64,
        ignored: Option<EntityId>,
        mut position_of: F,
    ) -> Vec<EntityId>
    where
        F: FnMut(EntityId) -> Option<Point>,
    {
        let query = Query {
            center,
            radius,
            radius_squared: radius * radius,
            ignored,
        };
        let mut out = Vec::new();
        self.root.collect(&query, &mut position_of, &mut out);
        out
    }

    /// Occupancy figures for the whole tree.
    pub fn stats(&self) -> IndexStats {
        let mut stats = IndexStats::default();
        self.root.accumulate(&mut stats);
        stats
    }
}
