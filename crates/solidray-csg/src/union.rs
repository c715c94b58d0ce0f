//! The union family: general N-ary union plus the fixed-arity variants.
//!
//! `Union` is the entry point users construct; its `simplify` pass
//! flattens nested unions, regroups unbounded operands, and selects the
//! cheapest specialization for what remains ([`Union2`], [`Union3`],
//! the bounded quads in [`crate::bounded`], the sphere-checked chains,
//! or an SAH-split tree).

use std::any::Any;

use rayon::prelude::*;
use smallvec::SmallVec;
use solidray_math::{Point3, Transform, Vec3};
use solidray_shape::{
    BoundingSphere, Bounds, BuildError, Cost, HitInfo, HitList, Ray, SceneContext, ShadowCache,
    Shape,
};

use crate::bounded::{SUnion, SUnion2, Union2F, Union4F};
use crate::settings::Settings;
use crate::span::{merge_spans, SpanOp};
use crate::split;
use crate::util;

/// Fold the union of all children's crossing lists into `out`.
///
/// Shared by every union variant; bounds culling never happens here
/// because crossing lists must stay complete along the full ray line.
pub(crate) fn union_hits<'a>(
    children: impl Iterator<Item = &'a dyn Shape>,
    ray: &Ray,
    out: &mut HitList<'a>,
) -> usize {
    let mut acc: HitList<'a> = SmallVec::new();
    let mut scratch: HitList<'a> = SmallVec::new();
    let mut merged: HitList<'a> = SmallVec::new();
    for child in children {
        scratch.clear();
        if child.get_hits(ray, &mut scratch) == 0 {
            continue;
        }
        if acc.is_empty() {
            acc.extend_from_slice(&scratch);
        } else {
            merged.clear();
            merge_spans(SpanOp::Union, &acc, &scratch, &mut merged);
            std::mem::swap(&mut acc, &mut merged);
        }
    }
    out.extend_from_slice(&acc);
    acc.len()
}

/// N-ary union of arbitrary shapes.
///
/// A freshly constructed union is a plain container; the build passes
/// rewrite it into whichever specialization fits its operand set. Only
/// operand sets that defy every specialization (unbounded members,
/// awkward arity) render through this general form.
#[derive(Debug)]
pub struct Union {
    children: Vec<Box<dyn Shape>>,
    bounds: Bounds,
    sphere: BoundingSphere,
    check_bounds: bool,
    cache_occluders: bool,
    simplified: bool,
}

impl Union {
    /// Union of `children`. Fails on an empty operand list.
    pub fn new(children: Vec<Box<dyn Shape>>) -> Result<Self, BuildError> {
        if children.is_empty() {
            return Err(BuildError::TooFewUnionOperands(children.len()));
        }
        Ok(Self::from_children(children, false))
    }

    fn from_children(children: Vec<Box<dyn Shape>>, simplified: bool) -> Self {
        let bounds = util::children_bounds(&children);
        let sphere = util::merged_sphere(&children);
        Self {
            children,
            bounds,
            sphere,
            check_bounds: false,
            cache_occluders: true,
            simplified,
        }
    }

    fn refresh_extent(&mut self) {
        self.bounds = util::children_bounds(&self.children);
        self.sphere = util::merged_sphere(&self.children);
    }

    /// Pick the best implementation for an already-simplified,
    /// all-finite operand list.
    fn specialize(children: Vec<Box<dyn Shape>>, in_csg: bool) -> Box<dyn Shape> {
        let settings = Settings::DEFAULT;
        let n = children.len();

        let bounds = util::children_bounds(&children);
        let sphere = util::merged_sphere(&children);
        let spheric =
            !in_csg && util::sphere_pays_off(&bounds, &sphere, settings.bounding_sphere_threshold);

        if n == 2 {
            return match <[Box<dyn Shape>; 2]>::try_from(children) {
                Ok([a, b]) => {
                    if spheric {
                        debug_csg!("union/2 -> sphere-checked pair");
                        Box::new(SUnion2::new(a, b))
                    } else {
                        Box::new(Union2::new(a, b))
                    }
                }
                Err(children) => Box::new(Union::from_children(children, true)),
            };
        }
        if n == 3 {
            return match <[Box<dyn Shape>; 3]>::try_from(children) {
                Ok(triple) => Box::new(Union3::new(triple)),
                Err(children) => Box::new(Union::from_children(children, true)),
            };
        }
        if spheric && n >= settings.union_threshold {
            debug_csg!("union/{n} -> sphere-checked chain");
            return SUnion::build(children);
        }
        if n >= settings.split_threshold
            && util::count_expensive(&children) >= settings.split_expensive
        {
            debug_csg!("union/{n} -> SAH split");
            return split::build(children);
        }
        if n >= settings.union_threshold && util::count_expensive(&children) == n {
            // All operands pay for a box pre-test: pack them four wide.
            let mut groups: Vec<Box<dyn Shape>> = Vec::with_capacity(n.div_ceil(4));
            let mut rest = children;
            while rest.len() > 5 {
                let tail = rest.split_off(4);
                groups.push(Box::new(Union4F::new(rest)));
                rest = tail;
            }
            // A remainder of 5 splits 3+2 so no quad is underfull.
            if rest.len() == 5 {
                let tail = rest.split_off(3);
                groups.push(Box::new(Union4F::new(rest)));
                rest = tail;
            }
            groups.push(Box::new(Union4F::new(rest)));
            return if groups.len() == 1 {
                match groups.pop() {
                    Some(only) => only,
                    None => Box::new(Union::from_children(Vec::new(), true)),
                }
            } else {
                Box::new(Union::from_children(groups, true))
            };
        }
        Box::new(Union::from_children(children, true))
    }
}

impl Shape for Union {
    fn shadow_test<'a>(&'a self, ray: &Ray, max_time: f64, cache: &mut ShadowCache<'a>) -> bool {
        if self.check_bounds && !ray.hits_bounds(&self.bounds, max_time) {
            return false;
        }
        for child in &self.children {
            if child.shadow_test(ray, max_time, cache) {
                if self.cache_occluders {
                    cache.store(child.as_ref());
                }
                return true;
            }
        }
        false
    }

    fn hit_test(&self, ray: &Ray, max_time: f64, info: &mut HitInfo) -> bool {
        if self.check_bounds && !ray.hits_bounds(&self.bounds, max_time) {
            return false;
        }
        let mut closest = max_time;
        let mut found = false;
        for child in &self.children {
            let mut local = HitInfo::none();
            if child.hit_test(ray, closest, &mut local) {
                closest = local.time;
                *info = local;
                found = true;
            }
        }
        found
    }

    fn get_hits<'a>(&'a self, ray: &Ray, out: &mut HitList<'a>) -> usize {
        union_hits(self.children.iter().map(|c| c.as_ref()), ray, out)
    }

    fn bounds(&self) -> Bounds {
        self.bounds
    }

    fn centroid(&self) -> Point3 {
        self.sphere.center
    }

    fn squared_radius(&self) -> f64 {
        self.sphere.radius2
    }

    fn bounding_sphere(&self) -> BoundingSphere {
        self.sphere
    }

    fn cost(&self) -> Cost {
        Cost::Expensive
    }

    fn max_hits(&self) -> usize {
        util::sum_max_hits(&self.children)
    }

    fn negate(&mut self) {
        for child in &mut self.children {
            child.negate();
        }
    }

    fn clone_shape(&self, force: bool) -> Box<dyn Shape> {
        Box::new(Self {
            children: util::clone_children(&self.children, force),
            bounds: self.bounds,
            sphere: self.sphere,
            check_bounds: self.check_bounds,
            cache_occluders: self.cache_occluders,
            simplified: self.simplified,
        })
    }

    fn simplify(mut self: Box<Self>, in_csg: bool) -> Box<dyn Shape> {
        if self.simplified {
            return self;
        }
        let settings = Settings::DEFAULT;

        // Flatten nested unions before anything specializes.
        let mut stack: Vec<Box<dyn Shape>> = std::mem::take(&mut self.children);
        stack.reverse();
        let mut flat: Vec<Box<dyn Shape>> = Vec::with_capacity(stack.len());
        while let Some(child) = stack.pop() {
            if child.as_any().is::<Union>() {
                if let Ok(nested) = child.into_any().downcast::<Union>() {
                    stack.extend(nested.children.into_iter().rev());
                }
            } else {
                flat.push(child);
            }
        }

        let children: Vec<Box<dyn Shape>> = if flat.len() >= settings.parallel_threshold {
            flat.into_par_iter().map(|c| c.simplify(in_csg)).collect()
        } else {
            flat.into_iter().map(|c| c.simplify(in_csg)).collect()
        };

        if children.len() == 1 {
            return match children.into_iter().next() {
                Some(only) => only,
                None => self,
            };
        }

        // Unbounded operands defeat every box- or sphere-based
        // specialization; group the finite ones under their own node.
        let (finite, infinite): (Vec<_>, Vec<_>) = children
            .into_iter()
            .partition(|c| !c.bounds().is_infinite());
        if !infinite.is_empty() {
            let mut top = Vec::with_capacity(infinite.len() + 1);
            if finite.len() >= 2 {
                top.push(Self::specialize(finite, in_csg));
            } else {
                top.extend(finite);
            }
            top.extend(infinite);
            if top.len() == 1 {
                return match top.into_iter().next() {
                    Some(only) => only,
                    None => self,
                };
            }
            return Box::new(Union::from_children(top, true));
        }

        Self::specialize(finite, in_csg)
    }

    fn substitute(self: Box<Self>) -> Box<dyn Shape> {
        let Self {
            children,
            bounds,
            sphere,
            check_bounds,
            cache_occluders,
            simplified,
        } = *self;
        Box::new(Self {
            children: children.into_iter().map(|c| c.substitute()).collect(),
            bounds,
            sphere,
            check_bounds,
            cache_occluders,
            simplified,
        })
    }

    fn initialize(&mut self, scene: &SceneContext, in_csg: bool, in_transform: bool) {
        util::sort_by_distance(&mut self.children, &scene.eye);
        for child in &mut self.children {
            child.initialize(scene, in_csg, in_transform);
        }
        self.refresh_extent();
        self.check_bounds = !self.bounds.is_infinite()
            && (self.children.len() >= Settings::DEFAULT.union_threshold
                || util::count_expensive(&self.children) > 0);
        self.cache_occluders = !in_transform;
        if !self.sphere.is_empty() && !self.sphere.is_infinite() {
            let center = self.sphere.center;
            let radius2 = self.sphere.radius2;
            for child in &mut self.children {
                child.notify_spheric_bounds(&center, radius2);
            }
        }
    }

    fn notify_spheric_bounds(&mut self, _center: &Point3, radius2: f64) {
        // A child filling most of the parent sphere rejects almost no
        // ray the parent test did not already reject.
        if self.sphere.radius2 > 0.9 * radius2 {
            self.check_bounds = false;
        }
    }

    fn can_rotate(&self) -> bool {
        self.children.iter().all(|c| c.can_rotate())
    }

    fn can_scale(&self) -> bool {
        self.children.iter().all(|c| c.can_scale())
    }

    fn apply_translation(&mut self, offset: &Vec3) {
        for child in &mut self.children {
            child.apply_translation(offset);
        }
        self.refresh_extent();
    }

    fn apply_rotation(&mut self, rotation: &Transform) {
        for child in &mut self.children {
            child.apply_rotation(rotation);
        }
        self.refresh_extent();
    }

    fn apply_scale(&mut self, factors: &Vec3) {
        for child in &mut self.children {
            child.apply_scale(factors);
        }
        self.refresh_extent();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Union of exactly two shapes, the most common case after flattening.
#[derive(Debug)]
pub struct Union2 {
    a: Box<dyn Shape>,
    b: Box<dyn Shape>,
    bounds: Bounds,
    cache_occluders: bool,
}

impl Union2 {
    /// Pair union.
    pub fn new(a: Box<dyn Shape>, b: Box<dyn Shape>) -> Self {
        let bounds = a.bounds().union(&b.bounds());
        Self {
            a,
            b,
            bounds,
            cache_occluders: true,
        }
    }
}

impl Shape for Union2 {
    fn shadow_test<'a>(&'a self, ray: &Ray, max_time: f64, cache: &mut ShadowCache<'a>) -> bool {
        if self.a.shadow_test(ray, max_time, cache) {
            if self.cache_occluders {
                cache.store(self.a.as_ref());
            }
            return true;
        }
        if self.b.shadow_test(ray, max_time, cache) {
            if self.cache_occluders {
                cache.store(self.b.as_ref());
            }
            return true;
        }
        false
    }

    fn hit_test(&self, ray: &Ray, max_time: f64, info: &mut HitInfo) -> bool {
        let mut found = self.a.hit_test(ray, max_time, info);
        let horizon = if found { info.time } else { max_time };
        let mut local = HitInfo::none();
        if self.b.hit_test(ray, horizon, &mut local) {
            *info = local;
            found = true;
        }
        found
    }

    fn get_hits<'a>(&'a self, ray: &Ray, out: &mut HitList<'a>) -> usize {
        let mut ah: HitList<'a> = SmallVec::new();
        let mut bh: HitList<'a> = SmallVec::new();
        self.a.get_hits(ray, &mut ah);
        self.b.get_hits(ray, &mut bh);
        let before = out.len();
        merge_spans(SpanOp::Union, &ah, &bh, out);
        out.len() - before
    }

    fn bounds(&self) -> Bounds {
        self.bounds
    }

    fn cost(&self) -> Cost {
        Cost::Expensive
    }

    fn max_hits(&self) -> usize {
        self.a.max_hits() + self.b.max_hits()
    }

    fn negate(&mut self) {
        self.a.negate();
        self.b.negate();
    }

    fn clone_shape(&self, force: bool) -> Box<dyn Shape> {
        Box::new(Self {
            a: self.a.clone_shape(force),
            b: self.b.clone_shape(force),
            bounds: self.bounds,
            cache_occluders: self.cache_occluders,
        })
    }

    fn simplify(self: Box<Self>, in_csg: bool) -> Box<dyn Shape> {
        let Self { a, b, .. } = *self;
        Box::new(Self::new(a.simplify(in_csg), b.simplify(in_csg)))
    }

    fn substitute(self: Box<Self>) -> Box<dyn Shape> {
        let Self { a, b, .. } = *self;
        let a = a.substitute();
        let b = b.substitute();
        let finite = !a.bounds().is_infinite() && !b.bounds().is_infinite();
        if finite && a.cost() == Cost::Expensive && b.cost() == Cost::Expensive {
            Box::new(Union2F::new(a, b))
        } else {
            Box::new(Self::new(a, b))
        }
    }

    fn initialize(&mut self, scene: &SceneContext, in_csg: bool, in_transform: bool) {
        let da = (self.a.centroid() - scene.eye).norm_squared();
        let db = (self.b.centroid() - scene.eye).norm_squared();
        if db < da {
            std::mem::swap(&mut self.a, &mut self.b);
        }
        self.a.initialize(scene, in_csg, in_transform);
        self.b.initialize(scene, in_csg, in_transform);
        self.bounds = self.a.bounds().union(&self.b.bounds());
        self.cache_occluders = !in_transform;
    }

    fn can_rotate(&self) -> bool {
        self.a.can_rotate() && self.b.can_rotate()
    }

    fn can_scale(&self) -> bool {
        self.a.can_scale() && self.b.can_scale()
    }

    fn apply_translation(&mut self, offset: &Vec3) {
        self.a.apply_translation(offset);
        self.b.apply_translation(offset);
        self.bounds = self.a.bounds().union(&self.b.bounds());
    }

    fn apply_rotation(&mut self, rotation: &Transform) {
        self.a.apply_rotation(rotation);
        self.b.apply_rotation(rotation);
        self.bounds = self.a.bounds().union(&self.b.bounds());
    }

    fn apply_scale(&mut self, factors: &Vec3) {
        self.a.apply_scale(factors);
        self.b.apply_scale(factors);
        self.bounds = self.a.bounds().union(&self.b.bounds());
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Union of exactly three shapes.
#[derive(Debug)]
pub struct Union3 {
    children: [Box<dyn Shape>; 3],
    bounds: Bounds,
    cache_occluders: bool,
}

impl Union3 {
    /// Triple union.
    pub fn new(children: [Box<dyn Shape>; 3]) -> Self {
        let bounds = util::children_bounds(&children);
        Self {
            children,
            bounds,
            cache_occluders: true,
        }
    }
}

impl Shape for Union3 {
    fn shadow_test<'a>(&'a self, ray: &Ray, max_time: f64, cache: &mut ShadowCache<'a>) -> bool {
        for child in &self.children {
            if child.shadow_test(ray, max_time, cache) {
                if self.cache_occluders {
                    cache.store(child.as_ref());
                }
                return true;
            }
        }
        false
    }

    fn hit_test(&self, ray: &Ray, max_time: f64, info: &mut HitInfo) -> bool {
        let mut closest = max_time;
        let mut found = false;
        for child in &self.children {
            let mut local = HitInfo::none();
            if child.hit_test(ray, closest, &mut local) {
                closest = local.time;
                *info = local;
                found = true;
            }
        }
        found
    }

    fn get_hits<'a>(&'a self, ray: &Ray, out: &mut HitList<'a>) -> usize {
        union_hits(self.children.iter().map(|c| c.as_ref()), ray, out)
    }

    fn bounds(&self) -> Bounds {
        self.bounds
    }

    fn cost(&self) -> Cost {
        Cost::Expensive
    }

    fn max_hits(&self) -> usize {
        util::sum_max_hits(&self.children)
    }

    fn negate(&mut self) {
        for child in &mut self.children {
            child.negate();
        }
    }

    fn clone_shape(&self, force: bool) -> Box<dyn Shape> {
        let [a, b, c] = &self.children;
        Box::new(Self {
            children: [
                a.clone_shape(force),
                b.clone_shape(force),
                c.clone_shape(force),
            ],
            bounds: self.bounds,
            cache_occluders: self.cache_occluders,
        })
    }

    fn simplify(self: Box<Self>, in_csg: bool) -> Box<dyn Shape> {
        let Self { children, .. } = *self;
        let [a, b, c] = children;
        Box::new(Self::new([
            a.simplify(in_csg),
            b.simplify(in_csg),
            c.simplify(in_csg),
        ]))
    }

    fn substitute(self: Box<Self>) -> Box<dyn Shape> {
        let Self { children, .. } = *self;
        let [a, b, c] = children;
        Box::new(Self::new([a.substitute(), b.substitute(), c.substitute()]))
    }

    fn initialize(&mut self, scene: &SceneContext, in_csg: bool, in_transform: bool) {
        self.children.sort_by(|a, b| {
            let da = (a.centroid() - scene.eye).norm_squared();
            let db = (b.centroid() - scene.eye).norm_squared();
            da.total_cmp(&db)
        });
        for child in &mut self.children {
            child.initialize(scene, in_csg, in_transform);
        }
        self.bounds = util::children_bounds(&self.children);
        self.cache_occluders = !in_transform;
    }

    fn can_rotate(&self) -> bool {
        self.children.iter().all(|c| c.can_rotate())
    }

    fn can_scale(&self) -> bool {
        self.children.iter().all(|c| c.can_scale())
    }

    fn apply_translation(&mut self, offset: &Vec3) {
        for child in &mut self.children {
            child.apply_translation(offset);
        }
        self.bounds = util::children_bounds(&self.children);
    }

    fn apply_rotation(&mut self, rotation: &Transform) {
        for child in &mut self.children {
            child.apply_rotation(rotation);
        }
        self.bounds = util::children_bounds(&self.children);
    }

    fn apply_scale(&mut self, factors: &Vec3) {
        for child in &mut self.children {
            child.apply_scale(factors);
        }
        self.bounds = util::children_bounds(&self.children);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{times, x_ray, IntervalShape};
    use solidray_math::Point3;

    fn boxed(spans: &[(f64, f64)], lo: f64, hi: f64) -> Box<dyn Shape> {
        IntervalShape::with_bounds(
            spans,
            Bounds::new(Point3::new(lo, -0.5, -0.5), Point3::new(hi, 0.5, 0.5)),
        )
    }

    #[test]
    fn test_empty_union_rejected() {
        assert!(matches!(
            Union::new(Vec::new()),
            Err(BuildError::TooFewUnionOperands(0))
        ));
    }

    #[test]
    fn test_get_hits_folds_all_children() {
        let union = Union::new(vec![
            IntervalShape::new(&[(1.0, 3.0)]),
            IntervalShape::new(&[(2.0, 5.0)]),
            IntervalShape::new(&[(7.0, 8.0)]),
        ])
        .unwrap();
        let mut out = HitList::new();
        union.get_hits(&x_ray(), &mut out);
        assert_eq!(times(&out), vec![1.0, 5.0, 7.0, 8.0]);
    }

    #[test]
    fn test_hit_test_picks_closest() {
        let union = Union::new(vec![
            IntervalShape::new(&[(4.0, 6.0)]),
            IntervalShape::new(&[(2.0, 3.0)]),
        ])
        .unwrap();
        let mut info = HitInfo::none();
        assert!(union.hit_test(&x_ray(), f64::INFINITY, &mut info));
        assert!((info.time - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_simplify_flattens_and_specializes() {
        let nested: Box<dyn Shape> = Box::new(
            Union::new(vec![boxed(&[(1.0, 2.0)], 0.0, 1.0), boxed(&[(3.0, 4.0)], 2.0, 3.0)])
                .unwrap(),
        );
        let outer = Box::new(Union::new(vec![nested, boxed(&[(5.0, 6.0)], 4.0, 5.0)]).unwrap());
        let simplified = outer.simplify(false);
        assert!(simplified.as_any().is::<Union3>());

        let mut out = HitList::new();
        simplified.get_hits(&x_ray(), &mut out);
        assert_eq!(times(&out), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_simplify_pair_becomes_union2() {
        let u = Box::new(
            Union::new(vec![boxed(&[(1.0, 2.0)], 0.0, 1.0), boxed(&[(3.0, 4.0)], 2.0, 3.0)])
                .unwrap(),
        );
        let simplified = u.simplify(true);
        assert!(simplified.as_any().is::<Union2>());
    }

    #[test]
    fn test_simplify_single_child_unwraps() {
        let u = Box::new(Union::new(vec![boxed(&[(1.0, 2.0)], 0.0, 1.0)]).unwrap());
        let simplified = u.simplify(false);
        assert!(simplified.as_any().is::<IntervalShape>());
    }

    #[test]
    fn test_simplify_groups_finite_under_infinite() {
        let u = Box::new(
            Union::new(vec![
                IntervalShape::new(&[(10.0, 20.0)]), // universe bounds
                boxed(&[(1.0, 2.0)], 0.0, 1.0),
                boxed(&[(3.0, 4.0)], 2.0, 3.0),
            ])
            .unwrap(),
        );
        let simplified = u.simplify(false);
        assert!(simplified.as_any().is::<Union>());
        assert!(simplified.bounds().is_infinite());

        let mut out = HitList::new();
        simplified.get_hits(&x_ray(), &mut out);
        assert_eq!(times(&out), vec![1.0, 2.0, 3.0, 4.0, 10.0, 20.0]);
    }

    #[test]
    fn test_simplify_picks_sphere_chain_for_ball_cluster() {
        // Six small boxes at the face centers of a cube: the merged
        // sphere hugs the inscribed ball and rejects far more than the
        // box does.
        let r = 5.0;
        let mut children: Vec<Box<dyn Shape>> = Vec::new();
        for (x, y, z) in [
            (r, 0.0, 0.0),
            (-r, 0.0, 0.0),
            (0.0, r, 0.0),
            (0.0, -r, 0.0),
            (0.0, 0.0, r),
            (0.0, 0.0, -r),
        ] {
            children.push(IntervalShape::with_bounds(
                &[(1.0, 2.0)],
                Bounds::new(
                    Point3::new(x - 0.1, y - 0.1, z - 0.1),
                    Point3::new(x + 0.1, y + 0.1, z + 0.1),
                ),
            ));
        }
        let u = Box::new(Union::new(children).unwrap());
        let simplified = u.simplify(false);
        assert!(simplified.as_any().is::<SUnion>());
    }

    #[test]
    fn test_initialize_sorts_front_to_back() {
        let mut u = Union::new(vec![
            boxed(&[(8.0, 9.0)], 8.0, 9.0),
            boxed(&[(1.0, 2.0)], 1.0, 2.0),
        ])
        .unwrap();
        u.initialize(&SceneContext::new(Point3::origin()), false, false);
        assert!(u.children[0].centroid().x < u.children[1].centroid().x);
    }

    #[test]
    fn test_union2_substitute_upgrades_expensive_pairs() {
        let a: Box<dyn Shape> = Box::new(
            Union::new(vec![boxed(&[(1.0, 2.0)], 0.0, 1.0), boxed(&[(2.5, 3.0)], 1.0, 2.0)])
                .unwrap(),
        );
        let b: Box<dyn Shape> = Box::new(
            Union::new(vec![boxed(&[(4.0, 5.0)], 3.0, 4.0), boxed(&[(6.0, 7.0)], 5.0, 6.0)])
                .unwrap(),
        );
        let pair = Box::new(Union2::new(a, b));
        let substituted = pair.substitute();
        assert!(substituted.as_any().is::<Union2F>());

        let cheap = Box::new(Union2::new(
            boxed(&[(1.0, 2.0)], 0.0, 1.0),
            boxed(&[(3.0, 4.0)], 2.0, 3.0),
        ));
        assert!(cheap.substitute().as_any().is::<Union2>());
    }

    #[test]
    fn test_shadow_cache_stores_occluder() {
        let union = Union::new(vec![
            boxed(&[(1.0, 2.0)], 1.0, 2.0),
            boxed(&[(5.0, 6.0)], 5.0, 6.0),
        ])
        .unwrap();
        let mut cache = ShadowCache::new();
        assert!(union.shadow_test(&x_ray(), 10.0, &mut cache));
        assert!(cache.occluder().is_some());
        // The cached occluder answers the repeat query by itself.
        assert!(cache.probe(&x_ray(), 10.0));
    }
}
