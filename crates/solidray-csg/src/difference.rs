//! The difference family: AND-NOT interval engines.
//!
//! Subtrahends are negated exactly once at construction so their
//! surfaces shade correctly when they survive into the result; every
//! clone path reuses the already-negated operands.

use std::any::Any;

use smallvec::SmallVec;
use solidray_math::{Transform, Vec3};
use solidray_shape::{
    first_forward, Bounds, BuildError, Cost, HitInfo, HitList, Ray, SceneContext, ShadowCache,
    Shape,
};

use crate::span::{merge_spans, SpanOp};
use crate::util;

/// Base shape minus any number of subtrahends.
#[derive(Debug)]
pub struct Difference {
    base: Box<dyn Shape>,
    subtrahends: Vec<Box<dyn Shape>>,
    bounds: Bounds,
    check_bounds: bool,
    simplified: bool,
}

impl Difference {
    /// `base` minus each of `subtrahends`. Fails when there is nothing
    /// to subtract. Negates every subtrahend.
    pub fn new(
        base: Box<dyn Shape>,
        mut subtrahends: Vec<Box<dyn Shape>>,
    ) -> Result<Self, BuildError> {
        if subtrahends.is_empty() {
            return Err(BuildError::NoSubtrahends);
        }
        for sub in &mut subtrahends {
            sub.negate();
        }
        Ok(Self::from_parts(base, subtrahends, false))
    }

    /// Internal constructor for operands that are already negated.
    fn from_parts(
        base: Box<dyn Shape>,
        subtrahends: Vec<Box<dyn Shape>>,
        simplified: bool,
    ) -> Self {
        let bounds = base.bounds();
        Self {
            base,
            subtrahends,
            bounds,
            check_bounds: false,
            simplified,
        }
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

impl Shape for Difference {
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
        let mut acc: HitList<'a> = SmallVec::new();
        if self.base.get_hits(ray, &mut acc) == 0 {
            return 0;
        }
        let mut scratch: HitList<'a> = SmallVec::new();
        let mut merged: HitList<'a> = SmallVec::new();
        for sub in &self.subtrahends {
            scratch.clear();
            if sub.get_hits(ray, &mut scratch) == 0 {
                continue;
            }
            merged.clear();
            merge_spans(SpanOp::Difference, &acc, &scratch, &mut merged);
            if merged.is_empty() {
                return 0;
            }
            std::mem::swap(&mut acc, &mut merged);
        }
        out.extend_from_slice(&acc);
        acc.len()
    }

    fn bounds(&self) -> Bounds {
        self.bounds
    }

    fn cost(&self) -> Cost {
        Cost::Expensive
    }

    fn max_hits(&self) -> usize {
        self.base.max_hits() + util::sum_max_hits(&self.subtrahends)
    }

    fn negate(&mut self) {
        self.base.negate();
        for sub in &mut self.subtrahends {
            sub.negate();
        }
    }

    fn clone_shape(&self, force: bool) -> Box<dyn Shape> {
        Box::new(Self {
            base: self.base.clone_shape(force),
            subtrahends: util::clone_children(&self.subtrahends, force),
            bounds: self.bounds,
            check_bounds: self.check_bounds,
            simplified: self.simplified,
        })
    }

    fn simplify(self: Box<Self>, _in_csg: bool) -> Box<dyn Shape> {
        if self.simplified {
            return self;
        }
        let Self {
            mut base,
            mut subtrahends,
            ..
        } = *self;

        // (a - b) - c subtracts from the same base as a - b - c.
        while base.as_any().is::<Difference>() {
            match base.into_any().downcast::<Difference>() {
                Ok(inner) => {
                    let mut merged = inner.subtrahends;
                    merged.append(&mut subtrahends);
                    subtrahends = merged;
                    base = inner.base;
                }
                Err(_) => unreachable!("downcast checked by as_any"),
            }
        }

        let base = base.simplify(true);
        let subtrahends: Vec<Box<dyn Shape>> =
            subtrahends.into_iter().map(|s| s.simplify(true)).collect();

        if subtrahends.len() == 1 {
            return match <[Box<dyn Shape>; 1]>::try_from(subtrahends) {
                Ok([sub]) => Box::new(Diff2::from_parts(base, sub)),
                Err(subtrahends) => Box::new(Self::from_parts(base, subtrahends, true)),
            };
        }
        Box::new(Self::from_parts(base, subtrahends, true))
    }

    fn substitute(self: Box<Self>) -> Box<dyn Shape> {
        let Self {
            base,
            subtrahends,
            check_bounds,
            simplified,
            ..
        } = *self;
        let base = base.substitute();
        let subtrahends: Vec<Box<dyn Shape>> =
            subtrahends.into_iter().map(|s| s.substitute()).collect();
        let bounds = base.bounds();
        Box::new(Self {
            base,
            subtrahends,
            bounds,
            check_bounds,
            simplified,
        })
    }

    fn initialize(&mut self, scene: &SceneContext, _in_csg: bool, in_transform: bool) {
        self.base.initialize(scene, true, in_transform);
        for sub in &mut self.subtrahends {
            sub.initialize(scene, true, in_transform);
        }
        self.bounds = self.base.bounds();
        self.check_bounds = !self.bounds.is_infinite();
    }

    fn can_rotate(&self) -> bool {
        self.base.can_rotate() && self.subtrahends.iter().all(|s| s.can_rotate())
    }

    fn can_scale(&self) -> bool {
        self.base.can_scale() && self.subtrahends.iter().all(|s| s.can_scale())
    }

    fn apply_translation(&mut self, offset: &Vec3) {
        self.base.apply_translation(offset);
        for sub in &mut self.subtrahends {
            sub.apply_translation(offset);
        }
        self.bounds = self.base.bounds();
    }

    fn apply_rotation(&mut self, rotation: &Transform) {
        self.base.apply_rotation(rotation);
        for sub in &mut self.subtrahends {
            sub.apply_rotation(rotation);
        }
        self.bounds = self.base.bounds();
    }

    fn apply_scale(&mut self, factors: &Vec3) {
        self.base.apply_scale(factors);
        for sub in &mut self.subtrahends {
            sub.apply_scale(factors);
        }
        self.bounds = self.base.bounds();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Base minus a single subtrahend.
#[derive(Debug)]
pub struct Diff2 {
    base: Box<dyn Shape>,
    sub: Box<dyn Shape>,
    bounds: Bounds,
    check_bounds: bool,
}

impl Diff2 {
    /// `base` minus `sub`. Negates the subtrahend.
    pub fn new(base: Box<dyn Shape>, mut sub: Box<dyn Shape>) -> Self {
        sub.negate();
        Self::from_parts(base, sub)
    }

    fn from_parts(base: Box<dyn Shape>, sub: Box<dyn Shape>) -> Self {
        let bounds = base.bounds();
        Self {
            base,
            sub,
            bounds,
            check_bounds: false,
        }
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

impl Shape for Diff2 {
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
        let mut bh: HitList<'a> = SmallVec::new();
        if self.base.get_hits(ray, &mut bh) == 0 {
            return 0;
        }
        let mut sh: HitList<'a> = SmallVec::new();
        self.sub.get_hits(ray, &mut sh);
        let before = out.len();
        merge_spans(SpanOp::Difference, &bh, &sh, out);
        out.len() - before
    }

    fn bounds(&self) -> Bounds {
        self.bounds
    }

    fn cost(&self) -> Cost {
        Cost::Expensive
    }

    fn max_hits(&self) -> usize {
        self.base.max_hits() + self.sub.max_hits()
    }

    fn negate(&mut self) {
        self.base.negate();
        self.sub.negate();
    }

    fn clone_shape(&self, force: bool) -> Box<dyn Shape> {
        Box::new(Self {
            base: self.base.clone_shape(force),
            sub: self.sub.clone_shape(force),
            bounds: self.bounds,
            check_bounds: self.check_bounds,
        })
    }

    fn simplify(self: Box<Self>, _in_csg: bool) -> Box<dyn Shape> {
        let Self { base, sub, .. } = *self;
        Box::new(Self::from_parts(base.simplify(true), sub.simplify(true)))
    }

    fn substitute(self: Box<Self>) -> Box<dyn Shape> {
        let Self { base, sub, .. } = *self;
        let base = base.substitute();
        let sub = sub.substitute();
        if base.max_hits() == 2 && sub.max_hits() == 2 {
            debug_csg!("difference pair -> convex slots");
            Box::new(Diff2Convex::from_parts(base, sub))
        } else {
            Box::new(Self::from_parts(base, sub))
        }
    }

    fn initialize(&mut self, scene: &SceneContext, _in_csg: bool, in_transform: bool) {
        self.base.initialize(scene, true, in_transform);
        self.sub.initialize(scene, true, in_transform);
        self.bounds = self.base.bounds();
        self.check_bounds = !self.bounds.is_infinite();
    }

    fn can_rotate(&self) -> bool {
        self.base.can_rotate() && self.sub.can_rotate()
    }

    fn can_scale(&self) -> bool {
        self.base.can_scale() && self.sub.can_scale()
    }

    fn apply_translation(&mut self, offset: &Vec3) {
        self.base.apply_translation(offset);
        self.sub.apply_translation(offset);
        self.bounds = self.base.bounds();
    }

    fn apply_rotation(&mut self, rotation: &Transform) {
        self.base.apply_rotation(rotation);
        self.sub.apply_rotation(rotation);
        self.bounds = self.base.bounds();
    }

    fn apply_scale(&mut self, factors: &Vec3) {
        self.base.apply_scale(factors);
        self.sub.apply_scale(factors);
        self.bounds = self.base.bounds();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Convex base minus a convex subtrahend: fixed-slot enumeration of the
/// at most two surviving pieces.
///
/// The slot conditions replicate the walker's tie policy, including the
/// zero-width pieces it emits when boundaries coincide exactly.
#[derive(Debug)]
pub struct Diff2Convex {
    base: Box<dyn Shape>,
    sub: Box<dyn Shape>,
    bounds: Bounds,
    check_bounds: bool,
}

impl Diff2Convex {
    /// `base` minus `sub`; both must report `max_hits() == 2`. Negates
    /// the subtrahend.
    pub fn new(base: Box<dyn Shape>, mut sub: Box<dyn Shape>) -> Self {
        sub.negate();
        Self::from_parts(base, sub)
    }

    fn from_parts(base: Box<dyn Shape>, sub: Box<dyn Shape>) -> Self {
        debug_assert!(base.max_hits() == 2 && sub.max_hits() == 2);
        let bounds = base.bounds();
        Self {
            base,
            sub,
            bounds,
            check_bounds: false,
        }
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

impl Shape for Diff2Convex {
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
        let mut bh: HitList<'a> = SmallVec::new();
        if self.base.get_hits(ray, &mut bh) < 2 {
            return 0;
        }
        let mut sh: HitList<'a> = SmallVec::new();
        if self.sub.get_hits(ray, &mut sh) < 2 {
            out.push(bh[0]);
            out.push(bh[1]);
            return 2;
        }
        let (t0, t1) = (bh[0].time, bh[1].time);
        let (s0, s1) = (sh[0].time, sh[1].time);

        // Subtrahend entirely past or before the base interval
        if s0 >= t1 || s1 < t0 {
            out.push(bh[0]);
            out.push(bh[1]);
            return 2;
        }

        let before = out.len();
        if t0 <= s0 {
            out.push(bh[0]);
            out.push(sh[0]);
        }
        if s1 < t1 {
            out.push(sh[1]);
            out.push(bh[1]);
        }
        out.len() - before
    }

    fn bounds(&self) -> Bounds {
        self.bounds
    }

    fn cost(&self) -> Cost {
        Cost::Expensive
    }

    fn max_hits(&self) -> usize {
        4
    }

    fn negate(&mut self) {
        self.base.negate();
        self.sub.negate();
    }

    fn clone_shape(&self, force: bool) -> Box<dyn Shape> {
        Box::new(Self {
            base: self.base.clone_shape(force),
            sub: self.sub.clone_shape(force),
            bounds: self.bounds,
            check_bounds: self.check_bounds,
        })
    }

    fn simplify(self: Box<Self>, _in_csg: bool) -> Box<dyn Shape> {
        self
    }

    fn substitute(self: Box<Self>) -> Box<dyn Shape> {
        self
    }

    fn initialize(&mut self, scene: &SceneContext, _in_csg: bool, in_transform: bool) {
        self.base.initialize(scene, true, in_transform);
        self.sub.initialize(scene, true, in_transform);
        self.bounds = self.base.bounds();
        self.check_bounds = !self.bounds.is_infinite();
    }

    fn can_rotate(&self) -> bool {
        self.base.can_rotate() && self.sub.can_rotate()
    }

    fn can_scale(&self) -> bool {
        self.base.can_scale() && self.sub.can_scale()
    }

    fn apply_translation(&mut self, offset: &Vec3) {
        self.base.apply_translation(offset);
        self.sub.apply_translation(offset);
        self.bounds = self.base.bounds();
    }

    fn apply_rotation(&mut self, rotation: &Transform) {
        self.base.apply_rotation(rotation);
        self.sub.apply_rotation(rotation);
        self.bounds = self.base.bounds();
    }

    fn apply_scale(&mut self, factors: &Vec3) {
        self.base.apply_scale(factors);
        self.sub.apply_scale(factors);
        self.bounds = self.base.bounds();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}
