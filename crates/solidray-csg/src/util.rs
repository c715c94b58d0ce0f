//! Shared helpers for the combinator family.

use solidray_math::Point3;
use solidray_shape::{BoundingSphere, Bounds, Shape};

/// Union of all child bounds.
pub(crate) fn children_bounds(children: &[Box<dyn Shape>]) -> Bounds {
    let mut bounds = Bounds::empty();
    for child in children {
        bounds = bounds.union(&child.bounds());
    }
    bounds
}

/// Incremental enclosing-sphere estimate over all children.
pub(crate) fn merged_sphere(children: &[Box<dyn Shape>]) -> BoundingSphere {
    let mut sphere = BoundingSphere::empty();
    for child in children {
        sphere.merge(&child.bounding_sphere());
    }
    sphere
}

/// Sort children front-to-back as seen from the eye, so closest-hit
/// scans shrink the query horizon as early as possible.
pub(crate) fn sort_by_distance(children: &mut [Box<dyn Shape>], eye: &Point3) {
    children.sort_by(|a, b| {
        let da = (a.centroid() - eye).norm_squared();
        let db = (b.centroid() - eye).norm_squared();
        da.total_cmp(&db)
    });
}

/// Clone every child; `force` propagates the deep-copy demand.
pub(crate) fn clone_children(children: &[Box<dyn Shape>], force: bool) -> Vec<Box<dyn Shape>> {
    children.iter().map(|c| c.clone_shape(force)).collect()
}

/// Number of children whose ray tests are worth pre-filtering.
pub(crate) fn count_expensive(children: &[Box<dyn Shape>]) -> usize {
    children
        .iter()
        .filter(|c| c.cost() == solidray_shape::Cost::Expensive)
        .count()
}

/// Static crossing-count bound of a child list.
pub(crate) fn sum_max_hits(children: &[Box<dyn Shape>]) -> usize {
    children.iter().map(|c| c.max_hits()).sum()
}

/// Is a sphere pre-test worth its cost for this child set?
///
/// A sphere that barely shrinks the box rejects almost nothing; the
/// cube-of-radius versus box-volume ratio is the tuning handle.
pub(crate) fn sphere_pays_off(bounds: &Bounds, sphere: &BoundingSphere, threshold: f64) -> bool {
    if bounds.is_empty() || bounds.is_infinite() || sphere.is_empty() || sphere.is_infinite() {
        return false;
    }
    let r = sphere.radius();
    r * r * r < threshold * bounds.volume()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::IntervalShape;
    use solidray_math::Point3;

    #[test]
    fn test_children_bounds_and_sphere() {
        let children: Vec<Box<dyn Shape>> = vec![
            IntervalShape::with_bounds(
                &[(1.0, 2.0)],
                Bounds::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)),
            ),
            IntervalShape::with_bounds(
                &[(3.0, 4.0)],
                Bounds::new(Point3::new(2.0, 0.0, 0.0), Point3::new(3.0, 1.0, 1.0)),
            ),
        ];
        let b = children_bounds(&children);
        assert_eq!(b.min, Point3::new(0.0, 0.0, 0.0));
        assert_eq!(b.max, Point3::new(3.0, 1.0, 1.0));

        let s = merged_sphere(&children);
        assert!(!s.is_empty());
        assert!(s.contains_point(&Point3::new(0.0, 0.0, 0.0)));
        assert!(s.contains_point(&Point3::new(3.0, 1.0, 1.0)));
    }

    #[test]
    fn test_sort_by_distance() {
        let mut children: Vec<Box<dyn Shape>> = vec![
            IntervalShape::with_bounds(
                &[(1.0, 2.0)],
                Bounds::new(Point3::new(9.0, 0.0, 0.0), Point3::new(10.0, 1.0, 1.0)),
            ),
            IntervalShape::with_bounds(
                &[(3.0, 4.0)],
                Bounds::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)),
            ),
        ];
        sort_by_distance(&mut children, &Point3::origin());
        assert!(children[0].centroid().x < children[1].centroid().x);
    }

    #[test]
    fn test_sphere_pays_off() {
        // Cube-ish contents: circumscribing sphere rejects little
        let cube = Bounds::new(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 2.0, 2.0));
        assert!(!sphere_pays_off(&cube, &cube.sphere(), 0.4));

        // A tight sphere inside a stretched box pays for itself
        let slab = Bounds::new(Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 10.0, 10.0));
        let tight = BoundingSphere::new(Point3::new(5.0, 5.0, 5.0), 4.0);
        assert!(sphere_pays_off(&slab, &tight, 0.4));

        assert!(!sphere_pays_off(&Bounds::universe(), &tight, 0.4));
    }
}
