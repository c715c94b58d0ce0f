//! Ray representation and bounding-volume rejection tests.

use solidray_math::{Dir3, Point3, Vec3};

use crate::bounds::Bounds;

/// A ray in 3D space defined by origin and unit direction.
///
/// Reciprocal direction components and sign masks are precomputed at
/// construction so the slab test stays branch-light in the hot path.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    /// Origin point of the ray.
    pub origin: Point3,
    /// Unit direction of the ray.
    pub direction: Dir3,
    /// Precomputed reciprocal of direction components.
    inv_direction: Vec3,
    /// Sign of direction components (0 if positive, 1 if negative).
    sign: [usize; 3],
}

impl Ray {
    /// Create a new ray from origin and direction.
    ///
    /// The direction will be normalized.
    pub fn new(origin: Point3, direction: Vec3) -> Self {
        let dir = Dir3::new_normalize(direction);
        let inv = Vec3::new(1.0 / dir.x, 1.0 / dir.y, 1.0 / dir.z);
        let sign = [
            if inv.x < 0.0 { 1 } else { 0 },
            if inv.y < 0.0 { 1 } else { 0 },
            if inv.z < 0.0 { 1 } else { 0 },
        ];
        Self {
            origin,
            direction: dir,
            inv_direction: inv,
            sign,
        }
    }

    /// Evaluate the ray at parameter `t`: `origin + t * direction`.
    #[inline]
    pub fn at(&self, t: f64) -> Point3 {
        self.origin + t * self.direction.as_ref()
    }

    /// Precomputed reciprocal direction, for externally unrolled slab
    /// tests.
    #[inline]
    pub fn inv_direction(&self) -> Vec3 {
        self.inv_direction
    }

    /// Slab test against an axis-aligned box.
    ///
    /// Returns `Some((t_min, t_max))` when the forward ray intersects
    /// the box, with `t_min` clamped to zero when the origin lies
    /// inside. Empty boxes never intersect; infinite boxes always do.
    #[inline]
    pub fn intersect_bounds(&self, bounds: &Bounds) -> Option<(f64, f64)> {
        if bounds.is_empty() {
            return None;
        }
        if bounds.is_infinite() {
            // Slab arithmetic produces NaN on unbounded slabs; an
            // infinite box can never reject a ray anyway.
            return Some((0.0, f64::INFINITY));
        }

        let corners = [bounds.min, bounds.max];

        let tx1 = (corners[self.sign[0]].x - self.origin.x) * self.inv_direction.x;
        let tx2 = (corners[1 - self.sign[0]].x - self.origin.x) * self.inv_direction.x;

        let mut t_min = tx1;
        let mut t_max = tx2;

        let ty1 = (corners[self.sign[1]].y - self.origin.y) * self.inv_direction.y;
        let ty2 = (corners[1 - self.sign[1]].y - self.origin.y) * self.inv_direction.y;

        t_min = t_min.max(ty1);
        t_max = t_max.min(ty2);

        let tz1 = (corners[self.sign[2]].z - self.origin.z) * self.inv_direction.z;
        let tz2 = (corners[1 - self.sign[2]].z - self.origin.z) * self.inv_direction.z;

        t_min = t_min.max(tz1);
        t_max = t_max.min(tz2);

        if t_max >= t_min && t_max >= 0.0 {
            Some((t_min.max(0.0), t_max))
        } else {
            None
        }
    }

    /// Cheap rejection test: does the forward ray reach the box before
    /// `max_time`?
    #[inline]
    pub fn hits_bounds(&self, bounds: &Bounds, max_time: f64) -> bool {
        match self.intersect_bounds(bounds) {
            Some((t_min, _)) => t_min <= max_time,
            None => false,
        }
    }

    /// Intersection parameters against a sphere given by center and
    /// squared radius, or `None` if the line misses it.
    #[inline]
    pub fn intersect_sphere(&self, center: &Point3, radius2: f64) -> Option<(f64, f64)> {
        let oc = self.origin - center;
        let half_b = oc.dot(self.direction.as_ref());
        let c = oc.norm_squared() - radius2;
        let disc = half_b * half_b - c;
        if disc < 0.0 {
            return None;
        }
        let sqrt_d = disc.sqrt();
        Some((-half_b - sqrt_d, -half_b + sqrt_d))
    }

    /// Cheap rejection test against a bounding sphere.
    #[inline]
    pub fn hits_sphere(&self, center: &Point3, radius2: f64, max_time: f64) -> bool {
        if radius2 == f64::INFINITY {
            return true;
        }
        match self.intersect_sphere(center, radius2) {
            Some((t_min, t_max)) => t_max >= 0.0 && t_min <= max_time,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_at() {
        let ray = Ray::new(Point3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 2.0, 0.0));
        let p = ray.at(3.0);
        assert!((p.x - 1.0).abs() < 1e-12);
        assert!((p.y - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_slab_hit_and_miss() {
        let b = Bounds::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        let hit = Ray::new(Point3::new(-5.0, 0.5, 0.5), Vec3::new(1.0, 0.0, 0.0));
        let (t0, t1) = hit.intersect_bounds(&b).unwrap();
        assert!((t0 - 5.0).abs() < 1e-10);
        assert!((t1 - 6.0).abs() < 1e-10);

        let miss = Ray::new(Point3::new(-5.0, 5.0, 0.5), Vec3::new(1.0, 0.0, 0.0));
        assert!(miss.intersect_bounds(&b).is_none());

        let behind = Ray::new(Point3::new(-5.0, 0.5, 0.5), Vec3::new(-1.0, 0.0, 0.0));
        assert!(behind.intersect_bounds(&b).is_none());
    }

    #[test]
    fn test_slab_origin_inside() {
        let b = Bounds::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        let ray = Ray::new(Point3::new(0.5, 0.5, 0.5), Vec3::new(0.0, 0.0, 1.0));
        let (t0, t1) = ray.intersect_bounds(&b).unwrap();
        assert_eq!(t0, 0.0);
        assert!((t1 - 0.5).abs() < 1e-10);
    }

    #[test]
    fn test_slab_degenerate_boxes() {
        let ray = Ray::new(Point3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        assert!(ray.intersect_bounds(&Bounds::empty()).is_none());
        assert!(ray.intersect_bounds(&Bounds::universe()).is_some());
    }

    #[test]
    fn test_hits_bounds_max_time() {
        let b = Bounds::new(Point3::new(10.0, -1.0, -1.0), Point3::new(12.0, 1.0, 1.0));
        let ray = Ray::new(Point3::origin(), Vec3::new(1.0, 0.0, 0.0));
        assert!(ray.hits_bounds(&b, 100.0));
        // Box entry at t=10 is beyond the query horizon
        assert!(!ray.hits_bounds(&b, 5.0));
    }

    #[test]
    fn test_sphere_test() {
        let ray = Ray::new(Point3::new(-5.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        let (t0, t1) = ray.intersect_sphere(&Point3::origin(), 1.0).unwrap();
        assert!((t0 - 4.0).abs() < 1e-10);
        assert!((t1 - 6.0).abs() < 1e-10);
        assert!(ray.intersect_sphere(&Point3::new(0.0, 3.0, 0.0), 1.0).is_none());
        assert!(ray.hits_sphere(&Point3::origin(), 1.0, 100.0));
        assert!(!ray.hits_sphere(&Point3::origin(), 1.0, 2.0));
    }
}
