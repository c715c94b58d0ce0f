//! Boundary crossing records: the common currency between combinators.

use smallvec::SmallVec;
use solidray_math::{Point3, Tolerance, Vec3};

use crate::ray::Ray;
use crate::shape::Shape;

/// Opaque handle to a material owned by the renderer.
///
/// The kernel never resolves materials; it only carries the winning
/// leaf's handle out through [`HitInfo`] so shading happens elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialId(pub u32);

/// A single ray-parameter crossing, tagged with the leaf that owns the
/// surface.
///
/// Within one combinator's working list, hits are kept in non-decreasing
/// time order, alternating entry/exit crossings of the combined solid.
/// Lists are state-complete: they contain every crossing along the full
/// ray line, including those at or behind the origin, so inside/outside
/// parity is always derivable by toggling. Forward filtering happens
/// only at single-hit selection (see [`first_forward`]).
#[derive(Debug, Clone, Copy)]
pub struct Hit<'a> {
    /// Ray parameter of the crossing.
    pub time: f64,
    /// Leaf shape owning the crossed surface.
    pub shape: &'a dyn Shape,
}

impl<'a> Hit<'a> {
    /// Create a crossing record.
    pub fn new(time: f64, shape: &'a dyn Shape) -> Self {
        Self { time, shape }
    }

    /// Resolve this crossing into a full query result.
    ///
    /// The normal and material always come from the owning leaf; CSG
    /// aggregates only reassemble intervals and never own surface
    /// geometry.
    pub fn resolve(&self, ray: &Ray) -> HitInfo {
        let point = ray.at(self.time);
        HitInfo {
            time: self.time,
            point,
            normal: self.shape.normal_at(&point),
            material: self.shape.material(),
        }
    }
}

/// Working list of crossings. Inline capacity covers typical scenes
/// without touching the heap.
pub type HitList<'a> = SmallVec<[Hit<'a>; 8]>;

/// Externally reported result of a single closest-hit query.
#[derive(Debug, Clone, Copy)]
pub struct HitInfo {
    /// Ray parameter of the hit.
    pub time: f64,
    /// 3D hit point.
    pub point: Point3,
    /// Surface normal at the hit point.
    pub normal: Vec3,
    /// Material handle of the winning leaf.
    pub material: MaterialId,
}

impl HitInfo {
    /// Placeholder for "no hit yet"; `time` is infinite.
    pub fn none() -> Self {
        Self {
            time: f64::INFINITY,
            point: Point3::origin(),
            normal: Vec3::zeros(),
            material: MaterialId(0),
        }
    }
}

impl Default for HitInfo {
    fn default() -> Self {
        Self::none()
    }
}

/// First crossing strictly in front of the ray origin and within the
/// query horizon.
///
/// Crossings at `time <= EPSILON` are skipped: a ray starting exactly
/// on a surface must not report that surface as its own hit.
#[inline]
pub fn first_forward<'a>(hits: &[Hit<'a>], max_time: f64) -> Option<Hit<'a>> {
    hits.iter()
        .copied()
        .find(|h| h.time > Tolerance::EPSILON && h.time < max_time)
}
