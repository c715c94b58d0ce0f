//! Coalescing union: interiors join and shared internal surfaces
//! disappear.
//!
//! A plain union re-emits coincident boundaries between its operands;
//! for transparent solids assembled from touching pieces those internal
//! walls are visible artifacts. Merge runs the same union walk but
//! welds zero-width outside gaps shut, so the result behaves like one
//! watertight solid.

use std::any::Any;

use smallvec::SmallVec;
use solidray_math::{Transform, Vec3};
use solidray_shape::{
    first_forward, Bounds, BuildError, Cost, HitInfo, HitList, Ray, SceneContext, ShadowCache,
    Shape,
};

use crate::span::weld_spans;

/// Welded union of two shapes.
///
/// N-ary merges are a left-fold of pairs; see [`Merge::merge_all`].
#[derive(Debug)]
pub struct Merge {
    a: Box<dyn Shape>,
    b: Box<dyn Shape>,
    bounds: Bounds,
    check_bounds: bool,
}

impl Merge {
    /// Welded pair.
    pub fn new(a: Box<dyn Shape>, b: Box<dyn Shape>) -> Self {
        let bounds = a.bounds().union(&b.bounds());
        Self {
            a,
            b,
            bounds,
            check_bounds: false,
        }
    }

    /// Fold `shapes` into a chain of welded pairs. Fails on fewer than
    /// two operands.
    pub fn merge_all(shapes: Vec<Box<dyn Shape>>) -> Result<Box<dyn Shape>, BuildError> {
        if shapes.len() < 2 {
            return Err(BuildError::TooFewMergeOperands(shapes.len()));
        }
        let mut iter = shapes.into_iter();
        let mut acc = match iter.next() {
            Some(first) => first,
            None => return Err(BuildError::TooFewMergeOperands(0)),
        };
        for next in iter {
            acc = Box::new(Merge::new(acc, next));
        }
        Ok(acc)
    }

    fn first_forward_hit(&self, ray: &Ray, max_time: f64) -> Option<HitInfo> {
        if self.check_bounds && !ray.hits_bounds(&self.bounds, max_time) {
            return None;
        }
        let mut hits = HitList::new();
        self.get_hits(ray, &mut hits);
        first_forward(&hits, max_time).map(|h| h.resolve(ray))
    }
}

impl Shape for Merge {
    fn shadow_test<'a>(&'a self, ray: &Ray, max_time: f64, _cache: &mut ShadowCache<'a>) -> bool {
        self.first_forward_hit(ray, max_time).is_some()
    }

    fn hit_test(&self, ray: &Ray, max_time: f64, info: &mut HitInfo) -> bool {
        match self.first_forward_hit(ray, max_time) {
            Some(hit) => {
                *info = hit;
                true
            }
            None => false,
        }
    }

    fn get_hits<'a>(&'a self, ray: &Ray, out: &mut HitList<'a>) -> usize {
        let mut ah: HitList<'a> = SmallVec::new();
        let mut bh: HitList<'a> = SmallVec::new();
        self.a.get_hits(ray, &mut ah);
        self.b.get_hits(ray, &mut bh);
        let before = out.len();
        weld_spans(&ah, &bh, out);
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
            check_bounds: self.check_bounds,
        })
    }

    fn simplify(self: Box<Self>, _in_csg: bool) -> Box<dyn Shape> {
        let Self { a, b, .. } = *self;
        Box::new(Self::new(a.simplify(true), b.simplify(true)))
    }

    fn substitute(self: Box<Self>) -> Box<dyn Shape> {
        let Self { a, b, .. } = *self;
        Box::new(Self::new(a.substitute(), b.substitute()))
    }

    fn initialize(&mut self, scene: &SceneContext, _in_csg: bool, in_transform: bool) {
        self.a.initialize(scene, true, in_transform);
        self.b.initialize(scene, true, in_transform);
        self.bounds = self.a.bounds().union(&self.b.bounds());
        self.check_bounds = !self.bounds.is_infinite();
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
