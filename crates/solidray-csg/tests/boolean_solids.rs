//! End-to-end scenes: real geometry through construction, the build
//! passes, and ray queries.

mod common;

use common::{inside_at, near_boundary, x_ray_from, Slab, Sphere};
use solidray_csg::{
    prepare, Diff2Convex, Difference, Intersection, Merge, SUnion, Union, Union2F,
};
use solidray_math::{Point3, Vec3};
use solidray_shape::{
    BuildError, HitInfo, HitList, MaterialId, Ray, SceneContext, ShadowCache, Shape,
};

fn scene() -> SceneContext {
    SceneContext::new(Point3::new(-5.0, 0.0, 0.0))
}

/// Unit spheres at the origin and at (1, 0, 0), probed from (-5, 0, 0).
fn two_spheres() -> (Box<dyn Shape>, Box<dyn Shape>, Ray) {
    let a = Sphere::with_material(Point3::origin(), 1.0, MaterialId(10));
    let b = Sphere::with_material(Point3::new(1.0, 0.0, 0.0), 1.0, MaterialId(20));
    (a, b, x_ray_from(Point3::new(-5.0, 0.0, 0.0)))
}

fn crossing_times(shape: &dyn Shape, ray: &Ray) -> Vec<f64> {
    let mut hits = HitList::new();
    shape.get_hits(ray, &mut hits);
    hits.iter().map(|h| h.time).collect()
}

#[test]
fn test_union_of_overlapping_spheres() {
    let (a, b, ray) = two_spheres();
    let union = prepare(Box::new(Union::new(vec![a, b]).unwrap()), &scene());

    let mut info = HitInfo::none();
    assert!(union.hit_test(&ray, f64::INFINITY, &mut info));
    assert!((info.time - 4.0).abs() < 1e-9);
    assert_eq!(info.material, MaterialId(10));
    assert!((info.normal - Vec3::new(-1.0, 0.0, 0.0)).norm() < 1e-9);
}

#[test]
fn test_intersection_of_overlapping_spheres() {
    let (a, b, ray) = two_spheres();
    let lens = prepare(Box::new(Intersection::new(vec![a, b]).unwrap()), &scene());

    assert_eq!(crossing_times(lens.as_ref(), &ray), vec![5.0, 6.0]);
    let mut info = HitInfo::none();
    assert!(lens.hit_test(&ray, f64::INFINITY, &mut info));
    assert!((info.time - 5.0).abs() < 1e-9);
    // The lens front surface belongs to the second sphere
    assert_eq!(info.material, MaterialId(20));
}

#[test]
fn test_difference_of_overlapping_spheres() {
    let (a, b, ray) = two_spheres();
    let diff = prepare(Box::new(Difference::new(a, vec![b]).unwrap()), &scene());

    assert_eq!(crossing_times(diff.as_ref(), &ray), vec![4.0, 5.0]);
    let mut info = HitInfo::none();
    assert!(diff.hit_test(&ray, f64::INFINITY, &mut info));
    assert!((info.time - 4.0).abs() < 1e-9);
    assert_eq!(info.material, MaterialId(10));
}

#[test]
fn test_cavity_wall_material_and_normal() {
    let (a, b, _) = two_spheres();
    let diff = prepare(Box::new(Difference::new(a, vec![b]).unwrap()), &scene());

    // From inside the base, the first visible surface is the carved
    // wall: owned by the negated subtrahend, normal pointing out of the
    // remaining solid.
    let ray = x_ray_from(Point3::new(-0.5, 0.0, 0.0));
    let mut info = HitInfo::none();
    assert!(diff.hit_test(&ray, f64::INFINITY, &mut info));
    assert!((info.time - 0.5).abs() < 1e-9);
    assert_eq!(info.material, MaterialId(20));
    assert!((info.normal - Vec3::new(1.0, 0.0, 0.0)).norm() < 1e-9);
}

#[test]
fn test_ray_from_surface_skips_own_boundary() {
    let sphere = Sphere::new(Point3::origin(), 1.0);
    let ray = x_ray_from(Point3::new(-1.0, 0.0, 0.0));
    let mut info = HitInfo::none();
    // The crossing at t = 0 is this surface itself; the far side wins.
    assert!(sphere.hit_test(&ray, f64::INFINITY, &mut info));
    assert!((info.time - 2.0).abs() < 1e-9);
}

#[test]
fn test_shadow_horizon_excludes_far_occluders() {
    let (a, b, ray) = two_spheres();
    let union = prepare(Box::new(Union::new(vec![a, b]).unwrap()), &scene());

    let mut cache = ShadowCache::new();
    assert!(cache.shadow_test(union.as_ref(), &ray, 10.0));
    // Light closer than the first surface at t = 4
    assert!(!ShadowCache::new().shadow_test(union.as_ref(), &ray, 3.5));
}

#[test]
fn test_shadow_cache_short_circuits_repeat_queries() {
    let (a, b, ray) = two_spheres();
    let union = prepare(Box::new(Union::new(vec![a, b]).unwrap()), &scene());

    let mut cache = ShadowCache::new();
    assert!(cache.shadow_test(union.as_ref(), &ray, 10.0));
    let occluder = cache.occluder();
    assert!(occluder.is_some());
    // Second query resolves on the cached occluder alone
    assert!(cache.probe(&ray, 10.0));
    // A miss clears the entry and the full walk still answers
    let clear = x_ray_from(Point3::new(-5.0, 10.0, 0.0));
    assert!(!cache.shadow_test(union.as_ref(), &clear, 10.0));
    assert!(cache.occluder().is_none());
}

#[test]
fn test_merge_welds_internal_wall() {
    let a = Slab::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
    let b = Slab::new(Point3::new(1.0, 0.0, 0.0), Point3::new(2.0, 1.0, 1.0));
    let union = prepare(
        Box::new(Union::new(vec![a.clone_shape(false), b.clone_shape(false)]).unwrap()),
        &scene(),
    );
    let merge = prepare(Box::new(Merge::new(a, b)), &scene());

    // Ray starting inside the first slab: the union reports the shared
    // wall at x = 1, the merge sees one solid through x = 2.
    let ray = x_ray_from(Point3::new(0.5, 0.5, 0.5));
    let mut info = HitInfo::none();
    assert!(union.hit_test(&ray, f64::INFINITY, &mut info));
    assert!((info.time - 0.5).abs() < 1e-9);
    assert!(merge.hit_test(&ray, f64::INFINITY, &mut info));
    assert!((info.time - 1.5).abs() < 1e-9);
}

#[test]
fn test_construction_errors() {
    assert!(matches!(
        Union::new(Vec::new()),
        Err(BuildError::TooFewUnionOperands(0))
    ));
    assert!(matches!(
        Intersection::new(vec![Sphere::new(Point3::origin(), 1.0) as Box<dyn Shape>]),
        Err(BuildError::TooFewIntersectionOperands(1))
    ));
    assert!(matches!(
        Difference::new(Sphere::new(Point3::origin(), 1.0), Vec::new()),
        Err(BuildError::NoSubtrahends)
    ));
    assert!(matches!(
        Merge::merge_all(vec![Sphere::new(Point3::origin(), 1.0) as Box<dyn Shape>]),
        Err(BuildError::TooFewMergeOperands(1))
    ));
}

#[test]
fn test_simplify_is_idempotent() {
    let (a, b, _) = two_spheres();
    let diff: Box<dyn Shape> = Box::new(Difference::new(a, vec![b]).unwrap());
    let once = diff.simplify(false);
    let fingerprint = format!("{once:?}");
    let twice = once.simplify(false);
    assert_eq!(fingerprint, format!("{twice:?}"));
}

#[test]
fn test_substitution_picks_convex_difference() {
    let (a, b, ray) = two_spheres();
    let reference: Box<dyn Shape> =
        Box::new(Difference::new(a.clone_shape(false), vec![b.clone_shape(false)]).unwrap());
    let expect = crossing_times(reference.as_ref(), &ray);

    let built = Box::new(Difference::new(a, vec![b]).unwrap())
        .simplify(false)
        .substitute();
    assert!(built.as_any().is::<Diff2Convex>());
    assert_eq!(crossing_times(built.as_ref(), &ray), expect);
}

#[test]
fn test_cluster_union_becomes_sphere_chain_outside_csg_only() {
    let cluster = |material| -> Vec<Box<dyn Shape>> {
        let r = 5.0;
        [
            (r, 0.0, 0.0),
            (-r, 0.0, 0.0),
            (0.0, r, 0.0),
            (0.0, -r, 0.0),
            (0.0, 0.0, r),
            (0.0, 0.0, -r),
        ]
        .into_iter()
        .map(|(x, y, z)| {
            Sphere::with_material(Point3::new(x, y, z), 0.3, material) as Box<dyn Shape>
        })
        .collect()
    };

    // Standalone the cluster takes the opaque sphere-checked chain
    let top = Box::new(Union::new(cluster(MaterialId(1))).unwrap()).simplify(false);
    assert!(top.as_any().is::<SUnion>());
    let ray = x_ray_from(Point3::new(-20.0, 0.0, 0.0));
    let mut info = HitInfo::none();
    assert!(top.hit_test(&ray, f64::INFINITY, &mut info));
    assert!((info.time - 14.7).abs() < 1e-9);

    // As a CSG operand the same cluster must stay interval-capable
    let base: Box<dyn Shape> = Box::new(Union::new(cluster(MaterialId(1))).unwrap());
    let hole = Sphere::new(Point3::new(-5.0, 0.0, 0.0), 0.1) as Box<dyn Shape>;
    let carved = prepare(
        Box::new(Difference::new(base, vec![hole]).unwrap()),
        &scene(),
    );
    assert!(carved.hit_test(&ray, f64::INFINITY, &mut info));
    assert!((info.time - 14.7).abs() < 1e-9);
}

#[test]
fn test_expensive_row_takes_bounded_forms() {
    let row = |n: usize| -> Vec<Box<dyn Shape>> {
        (0..n)
            .map(|k| {
                let x = 3.0 * k as f64;
                Slab::expensive(
                    Point3::new(x, 0.0, 0.0),
                    Point3::new(x + 1.0, 1.0, 1.0),
                ) as Box<dyn Shape>
            })
            .collect()
    };

    // Eight expensive operands pack four wide under a general union
    let packed = Box::new(Union::new(row(8)).unwrap()).simplify(false);
    assert!(packed.as_any().is::<Union>());

    // Twelve trigger the SAH split into bounded pairs
    let split = Box::new(Union::new(row(12)).unwrap()).simplify(false);
    assert!(split.as_any().is::<Union2F>());

    for built in [packed, split] {
        let ray = x_ray_from(Point3::new(-1.0, 0.5, 0.5));
        let mut info = HitInfo::none();
        assert!(built.hit_test(&ray, f64::INFINITY, &mut info));
        assert!((info.time - 1.0).abs() < 1e-9);
    }
}

#[test]
fn test_clone_isolation() {
    let (a, b, ray) = two_spheres();
    let original = prepare(Box::new(Union::new(vec![a, b]).unwrap()), &scene());

    let mut copy = original.clone_shape(true);
    copy.apply_translation(&Vec3::new(100.0, 0.0, 0.0));

    let mut info = HitInfo::none();
    assert!(!copy.hit_test(&ray, 50.0, &mut info));
    assert!(original.hit_test(&ray, 50.0, &mut info));
    assert!((info.time - 4.0).abs() < 1e-9);
}

#[test]
fn test_parity_against_brute_force() {
    let a = Sphere::new(Point3::new(0.0, 0.0, 0.0), 1.5);
    let b = Slab::new(Point3::new(-1.0, -2.0, -1.0), Point3::new(1.0, 2.0, 1.0));

    let union = prepare(
        Box::new(Union::new(vec![a.clone_shape(false), b.clone_shape(false)]).unwrap()),
        &scene(),
    );
    let inter = prepare(
        Box::new(Intersection::new(vec![a.clone_shape(false), b.clone_shape(false)]).unwrap()),
        &scene(),
    );
    let diff = prepare(
        Box::new(Difference::new(a.clone_shape(false), vec![b.clone_shape(false)]).unwrap()),
        &scene(),
    );

    for ky in -4..=4 {
        for kz in -4..=4 {
            let origin = Point3::new(-10.0, 0.37 * ky as f64, 0.29 * kz as f64);
            let ray = x_ray_from(origin);

            let mut ah = HitList::new();
            a.get_hits(&ray, &mut ah);
            let mut bh = HitList::new();
            b.get_hits(&ray, &mut bh);

            let mut uh = HitList::new();
            union.get_hits(&ray, &mut uh);
            let mut ih = HitList::new();
            inter.get_hits(&ray, &mut ih);
            let mut dh = HitList::new();
            diff.get_hits(&ray, &mut dh);

            for step in 0..60 {
                let t = 0.25 * step as f64;
                if near_boundary(&ah, t) || near_boundary(&bh, t) {
                    continue;
                }
                let in_a = inside_at(&ah, t);
                let in_b = inside_at(&bh, t);
                assert_eq!(inside_at(&uh, t), in_a || in_b, "union at {origin:?} t={t}");
                assert_eq!(inside_at(&ih, t), in_a && in_b, "inter at {origin:?} t={t}");
                assert_eq!(inside_at(&dh, t), in_a && !in_b, "diff at {origin:?} t={t}");
            }
        }
    }
}

#[test]
fn test_deep_nesting_through_prepare() {
    // ((a ∪ b) − c) ∩ d with every operand convex
    let a = Sphere::new(Point3::new(0.0, 0.0, 0.0), 2.0) as Box<dyn Shape>;
    let b = Sphere::new(Point3::new(3.0, 0.0, 0.0), 2.0) as Box<dyn Shape>;
    let c = Sphere::new(Point3::new(1.5, 0.0, 0.0), 1.0) as Box<dyn Shape>;
    let d = Slab::new(Point3::new(-10.0, -10.0, -10.0), Point3::new(10.0, 10.0, 10.0))
        as Box<dyn Shape>;

    let ab: Box<dyn Shape> = Box::new(Union::new(vec![a, b]).unwrap());
    let abc: Box<dyn Shape> = Box::new(Difference::new(ab, vec![c]).unwrap());
    let tree = prepare(
        Box::new(Intersection::new(vec![abc, d]).unwrap()),
        &scene(),
    );

    let ray = x_ray_from(Point3::new(-5.0, 0.0, 0.0));
    // Spheres span [-2, 5], the hole spans [0.5, 2.5]; entry at x = -2.
    assert_eq!(
        crossing_times(tree.as_ref(), &ray),
        vec![3.0, 5.5, 7.5, 10.0]
    );
    let mut info = HitInfo::none();
    assert!(tree.hit_test(&ray, f64::INFINITY, &mut info));
    assert!((info.time - 3.0).abs() < 1e-9);
}
