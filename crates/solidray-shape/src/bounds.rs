//! Conservative bounding volumes: axis-aligned boxes and bounding spheres.
//!
//! A combinator's bounds are always at least as large as the true extent
//! of its result. Over-approximation is acceptable; under-approximation
//! is a correctness bug.

use solidray_math::{Point3, Vec3};

/// Axis-aligned bounding box in 3D.
///
/// An empty box is represented with inverted infinite corners so that
/// `include_point`/`union` grow it naturally. The universe box has both
/// corners at the respective infinities and contains every point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Minimum corner.
    pub min: Point3,
    /// Maximum corner.
    pub max: Point3,
}

impl Bounds {
    /// Create a box from min and max corners.
    pub fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// The empty (inverted) box, suitable for expansion.
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// The box containing all of space.
    pub fn universe() -> Self {
        Self {
            min: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            max: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
        }
    }

    /// The tightest box around a sphere given by center and radius.
    pub fn from_sphere(center: &Point3, radius: f64) -> Self {
        let r = Vec3::new(radius, radius, radius);
        Self {
            min: center - r,
            max: center + r,
        }
    }

    /// True if the box contains no points.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// True if the box is unbounded along at least one axis.
    pub fn is_infinite(&self) -> bool {
        !self.is_empty()
            && (self.min.x == f64::NEG_INFINITY
                || self.min.y == f64::NEG_INFINITY
                || self.min.z == f64::NEG_INFINITY
                || self.max.x == f64::INFINITY
                || self.max.y == f64::INFINITY
                || self.max.z == f64::INFINITY)
    }

    /// True if the box contains all of space.
    pub fn is_universe(&self) -> bool {
        self.min.x == f64::NEG_INFINITY
            && self.min.y == f64::NEG_INFINITY
            && self.min.z == f64::NEG_INFINITY
            && self.max.x == f64::INFINITY
            && self.max.y == f64::INFINITY
            && self.max.z == f64::INFINITY
    }

    /// Expand this box to include a point.
    pub fn include_point(&mut self, p: &Point3) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    /// Smallest box containing both operands.
    pub fn union(&self, other: &Bounds) -> Bounds {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Bounds {
            min: Point3::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            max: Point3::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        }
    }

    /// Largest box contained in both operands (may be empty).
    pub fn intersection(&self, other: &Bounds) -> Bounds {
        Bounds {
            min: Point3::new(
                self.min.x.max(other.min.x),
                self.min.y.max(other.min.y),
                self.min.z.max(other.min.z),
            ),
            max: Point3::new(
                self.max.x.min(other.max.x),
                self.max.y.min(other.max.y),
                self.max.z.min(other.max.z),
            ),
        }
    }

    /// Test if two boxes overlap (touching counts as overlap).
    pub fn overlaps(&self, other: &Bounds) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Expand the box by a tolerance in all directions.
    pub fn expand(&mut self, tol: f64) {
        self.min.x -= tol;
        self.min.y -= tol;
        self.min.z -= tol;
        self.max.x += tol;
        self.max.y += tol;
        self.max.z += tol;
    }

    /// True if the point lies inside or on the box.
    pub fn contains_point(&self, p: &Point3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Edge lengths along each axis; zero for an empty box.
    pub fn extent(&self) -> Vec3 {
        if self.is_empty() {
            return Vec3::zeros();
        }
        self.max - self.min
    }

    /// Enclosed volume. Infinite boxes report infinity, empty boxes zero.
    pub fn volume(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let d = self.extent();
        d.x * d.y * d.z
    }

    /// Half the surface area, the SAH cost weight for this box.
    pub fn half_area(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let d = self.extent();
        d.x * d.y + d.y * d.z + d.z * d.x
    }

    /// Center of the box. Falls back to the origin when the midpoint is
    /// not finite (empty or unbounded boxes), so distance sorting stays
    /// well defined.
    pub fn centroid(&self) -> Point3 {
        let c = Point3::new(
            (self.min.x + self.max.x) * 0.5,
            (self.min.y + self.max.y) * 0.5,
            (self.min.z + self.max.z) * 0.5,
        );
        if c.x.is_finite() && c.y.is_finite() && c.z.is_finite() {
            c
        } else {
            Point3::origin()
        }
    }

    /// Squared radius of the circumscribing sphere about [`Self::centroid`].
    pub fn squared_radius(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        if self.is_infinite() {
            return f64::INFINITY;
        }
        (self.max - self.centroid()).norm_squared()
    }

    /// Index of the longest axis (0 = x, 1 = y, 2 = z).
    pub fn dominant_axis(&self) -> usize {
        let d = self.extent();
        if d.x >= d.y && d.x >= d.z {
            0
        } else if d.y >= d.z {
            1
        } else {
            2
        }
    }

    /// The circumscribing sphere of this box.
    pub fn sphere(&self) -> BoundingSphere {
        BoundingSphere::new(self.centroid(), self.squared_radius())
    }
}

/// A bounding sphere stored as center plus squared radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    /// Sphere center.
    pub center: Point3,
    /// Squared radius; negative marks the empty sphere.
    pub radius2: f64,
}

impl BoundingSphere {
    /// Sphere from center and squared radius.
    pub fn new(center: Point3, radius2: f64) -> Self {
        Self { center, radius2 }
    }

    /// The empty sphere, suitable for incremental merging.
    pub fn empty() -> Self {
        Self {
            center: Point3::origin(),
            radius2: -1.0,
        }
    }

    /// True if the sphere encloses nothing.
    pub fn is_empty(&self) -> bool {
        self.radius2 < 0.0
    }

    /// True if the sphere is unbounded.
    pub fn is_infinite(&self) -> bool {
        self.radius2 == f64::INFINITY
    }

    /// Radius (zero for the empty sphere).
    pub fn radius(&self) -> f64 {
        if self.radius2 <= 0.0 {
            0.0
        } else {
            self.radius2.sqrt()
        }
    }

    /// True if the point lies inside or on the sphere.
    pub fn contains_point(&self, p: &Point3) -> bool {
        (p - self.center).norm_squared() <= self.radius2
    }

    /// Fold another sphere into this running enclosing-sphere estimate.
    ///
    /// Cheap two-candidate heuristic, not a minimal enclosing sphere:
    /// candidate one keeps the current center and extends the radius,
    /// candidate two spans the two extreme points of the pair. The
    /// smaller result wins. The splitting and effectivity heuristics
    /// downstream are tuned against this estimate, so both candidates
    /// are always evaluated.
    pub fn merge(&mut self, other: &BoundingSphere) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            *self = *other;
            return;
        }
        if self.is_infinite() {
            return;
        }
        if other.is_infinite() {
            *self = *other;
            return;
        }

        let offset = other.center - self.center;
        let dist = offset.norm();
        let r0 = self.radius();
        let r1 = other.radius();

        if dist + r1 <= r0 {
            // Other already enclosed
            return;
        }
        if dist + r0 <= r1 {
            *self = *other;
            return;
        }

        // Candidate one: keep the current center
        let extended = dist + r1;
        // Candidate two: sphere through the two extreme points
        let spanned = (dist + r0 + r1) * 0.5;

        if extended <= spanned {
            self.radius2 = extended * extended;
        } else {
            // dist > 0 here, otherwise one sphere would enclose the other
            self.center += offset * ((spanned - r0) / dist);
            self.radius2 = spanned * spanned;
        }
    }
}
