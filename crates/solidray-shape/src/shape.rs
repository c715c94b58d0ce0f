//! The shape capability contract consumed and exposed by the CSG kernel.

use std::any::Any;
use std::fmt;

use solidray_math::{Point3, Transform, Vec3};
use thiserror::Error;

use crate::bounds::{BoundingSphere, Bounds};
use crate::hit::{HitInfo, HitList, MaterialId};
use crate::ray::Ray;

/// Coarse two-level cost oracle for a shape's ray tests.
///
/// Drives the bounds-check decisions in the union family: wrapping a
/// cheap shape in a box test costs more than it saves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cost {
    /// Testing the shape is about as cheap as testing its bounds.
    Cheap,
    /// Testing the shape is expensive enough to justify a pre-test.
    Expensive,
}

/// Camera/scene context available during the final initialization pass.
#[derive(Debug, Clone, Copy)]
pub struct SceneContext {
    /// Eye position; children are sorted by distance to it for
    /// early-exit ordering.
    pub eye: Point3,
}

impl SceneContext {
    /// Context for a camera at `eye`.
    pub fn new(eye: Point3) -> Self {
        Self { eye }
    }
}

/// Construction-time validation errors for combinator trees.
///
/// Malformed trees are an upstream configuration error caught long
/// before ray traversal begins; nothing here is retried.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A union was built with no operands.
    #[error("a union needs at least one operand (got {0})")]
    TooFewUnionOperands(usize),

    /// An intersection was built with fewer than two operands.
    #[error("an intersection needs at least two operands (got {0})")]
    TooFewIntersectionOperands(usize),

    /// A difference was built with nothing to subtract.
    #[error("a difference needs at least one subtrahend")]
    NoSubtrahends,

    /// A merge was built with fewer than two operands.
    #[error("a merge needs at least two operands (got {0})")]
    TooFewMergeOperands(usize),
}

/// Signal a programming-contract violation on an aggregate node.
///
/// CSG aggregates never own surface geometry and certain opaque-only
/// specializations never participate in interval algebra; asking them
/// anyway is a structural misuse of the tree, not a recoverable runtime
/// condition.
pub fn aggregate_misuse(type_name: &str, operation: &str) -> ! {
    panic!(
        "{operation} invoked on aggregate CSG node {type_name}; \
         resolve it through the leaf shape of the winning hit"
    );
}

/// The capability contract every combinator and every leaf satisfies.
///
/// Combinators are themselves shapes, enabling arbitrary nesting. Ray
/// queries take `&self`: a tree is freely shared across render threads
/// once the three-phase build completes. Per-thread trees that must
/// mutate independently (translation animations and the like) are
/// produced with [`Shape::clone_shape`].
///
/// Lifecycle: `Constructed -> simplify -> substitute -> initialize ->
/// rendering`, strictly one-directional. `simplify` and `substitute`
/// consume the node and may return a different shape entirely.
pub trait Shape: fmt::Debug + Send + Sync + 'static {
    /// True if the ray hits this shape strictly between the origin
    /// (plus epsilon) and `max_time`. Union variants store the
    /// occluding child into `cache` when permitted.
    fn shadow_test<'a>(&'a self, ray: &Ray, max_time: f64, cache: &mut ShadowCache<'a>) -> bool;

    /// Closest forward hit within `max_time`; fills `info` and returns
    /// true on a hit.
    fn hit_test(&self, ray: &Ray, max_time: f64, info: &mut HitInfo) -> bool;

    /// Append every boundary crossing along the full ray line, in
    /// non-decreasing time order. Returns the number appended.
    fn get_hits<'a>(&'a self, ray: &Ray, out: &mut HitList<'a>) -> usize;

    /// Outward surface normal at a point on this shape's surface.
    ///
    /// Aggregates must never be asked directly; the normal always comes
    /// from the leaf recorded in the winning [`crate::Hit`].
    fn normal_at(&self, point: &Point3) -> Vec3 {
        let _ = point;
        aggregate_misuse(std::any::type_name::<Self>(), "normal_at");
    }

    /// Material handle of this leaf.
    fn material(&self) -> MaterialId {
        aggregate_misuse(std::any::type_name::<Self>(), "material");
    }

    /// Conservative axis-aligned bounds of this shape.
    fn bounds(&self) -> Bounds;

    /// Center used for distance sorting and sphere fitting.
    fn centroid(&self) -> Point3 {
        self.bounds().centroid()
    }

    /// Squared radius of a sphere about [`Shape::centroid`] enclosing
    /// the shape.
    fn squared_radius(&self) -> f64 {
        self.bounds().squared_radius()
    }

    /// Enclosing sphere assembled from centroid and squared radius.
    fn bounding_sphere(&self) -> BoundingSphere {
        BoundingSphere::new(self.centroid(), self.squared_radius())
    }

    /// Two-level cost oracle for this shape's ray tests.
    fn cost(&self) -> Cost;

    /// Static upper bound on simultaneous crossings against any ray.
    /// Convex shapes report 2.
    fn max_hits(&self) -> usize;

    /// Flip the shape's inside/outside sense (normals point the other
    /// way). Used once on subtrahends at difference construction.
    fn negate(&mut self);

    /// Produce an independent copy of this shape.
    ///
    /// `force = true` demands a deep copy whose mutations never leak
    /// back; `force = false` lets leaves share immutable heavy data.
    fn clone_shape(&self, force: bool) -> Box<dyn Shape>;

    /// Structural rewriting pass: flatten nested combinators and select
    /// specialized implementations. Idempotent on already-simplified
    /// trees; may return a different shape. `in_csg` is true for
    /// subtrees whose crossing lists feed further boolean composition,
    /// where opaque-only specializations must not be chosen.
    fn simplify(self: Box<Self>, in_csg: bool) -> Box<dyn Shape>;

    /// Second rewriting pass over already-simplified children. Never
    /// changes arity; may swap `self` for an equivalent type (convex
    /// fast paths, bounded pair tests).
    fn substitute(self: Box<Self>) -> Box<dyn Shape>;

    /// Final camera-dependent pass: sorts children by distance to the
    /// eye, finalizes bounds-check decisions, and propagates the
    /// `in_csg`/`in_transform` flags. Called exactly once, after
    /// `substitute`.
    fn initialize(&mut self, scene: &SceneContext, in_csg: bool, in_transform: bool);

    /// Downward notification from a parent whose enclosing sphere is
    /// final: a child whose own sphere nearly fills it may drop its
    /// redundant bounds check.
    fn notify_spheric_bounds(&mut self, center: &Point3, radius2: f64) {
        let _ = (center, radius2);
    }

    /// Can this shape be rotated in place?
    fn can_rotate(&self) -> bool;

    /// Can this shape be scaled in place?
    fn can_scale(&self) -> bool;

    /// Translate the shape; bounds are recomputed.
    fn apply_translation(&mut self, offset: &Vec3);

    /// Rotate the shape; bounds are recomputed.
    fn apply_rotation(&mut self, rotation: &Transform);

    /// Scale the shape per axis; bounds are recomputed.
    fn apply_scale(&mut self, factors: &Vec3);

    /// Type-erased view for structural passes (combinator flattening).
    fn as_any(&self) -> &dyn Any;

    /// Consuming type-erased view for structural passes.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

/// Per-light cache of the most recent shadow occluder.
///
/// Shadow rays toward one light tend to be blocked by the same shape
/// frame after frame; re-testing the last occluder first skips the
/// whole tree walk in the common case. This is an explicit context
/// threaded through [`Shape::shadow_test`], never global state, and
/// shapes initialized under a dynamic transform never store into it.
#[derive(Debug, Default)]
pub struct ShadowCache<'a> {
    occluder: Option<&'a dyn Shape>,
    disabled: bool,
}

impl<'a> ShadowCache<'a> {
    /// Fresh cache for one light.
    pub fn new() -> Self {
        Self {
            occluder: None,
            disabled: false,
        }
    }

    /// A cache that never stores; used when re-testing a cached
    /// occluder to avoid recursive cache churn.
    pub fn off() -> Self {
        Self {
            occluder: None,
            disabled: true,
        }
    }

    /// Remember `shape` as the latest occluder, unless disabled.
    pub fn store(&mut self, shape: &'a dyn Shape) {
        if !self.disabled {
            self.occluder = Some(shape);
        }
    }

    /// Re-test the cached occluder. Clears the cache entry on a miss.
    pub fn probe(&mut self, ray: &Ray, max_time: f64) -> bool {
        let Some(occluder) = self.occluder else {
            return false;
        };
        let mut off = ShadowCache::off();
        if occluder.shadow_test(ray, max_time, &mut off) {
            true
        } else {
            self.occluder = None;
            false
        }
    }

    /// Renderer-facing entry point: probe the cache, then fall back to
    /// a full tree query that may repopulate it.
    pub fn shadow_test(&mut self, root: &'a dyn Shape, ray: &Ray, max_time: f64) -> bool {
        if self.probe(ray, max_time) {
            return true;
        }
        root.shadow_test(ray, max_time, self)
    }

    /// The currently cached occluder, if any.
    pub fn occluder(&self) -> Option<&'a dyn Shape> {
        self.occluder
    }
}
