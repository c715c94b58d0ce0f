//! The intersection family: AND interval engines with convex fast paths.
//!
//! The general forms run the sorted-merge walker; once every operand is
//! known convex (at most two crossings) the interval algebra collapses
//! to a running entry/exit window, selected by the substitution pass.

use std::any::Any;

use smallvec::SmallVec;
use solidray_math::{Transform, Vec3};
use solidray_shape::{
    first_forward, BoundingSphere, Bounds, BuildError, Cost, HitInfo, HitList, Ray, SceneContext,
    ShadowCache, Shape,
};

use crate::span::{merge_spans, SpanOp};
use crate::util;

fn sphere_clip(bounds: Bounds, sphere: &BoundingSphere) -> Bounds {
    if sphere.is_empty() || sphere.is_infinite() {
        return bounds;
    }
    bounds.intersection(&Bounds::from_sphere(&sphere.center, sphere.radius()))
}

/// Conjunction of all operand boxes, further clipped by the merged
/// operand bounding sphere. The sphere carries extent information the
/// axis-aligned intersection alone cannot.
fn clipped_bounds(children: &[Box<dyn Shape>]) -> Bounds {
    let mut bounds = Bounds::universe();
    for child in children {
        bounds = bounds.intersection(&child.bounds());
    }
    sphere_clip(bounds, &util::merged_sphere(children))
}

fn pair_bounds(a: &dyn Shape, b: &dyn Shape) -> Bounds {
    let mut sphere = a.bounding_sphere();
    sphere.merge(&b.bounding_sphere());
    sphere_clip(a.bounds().intersection(&b.bounds()), &sphere)
}

/// N-ary intersection of arbitrary shapes.
#[derive(Debug)]
pub struct Intersection {
    children: Vec<Box<dyn Shape>>,
    bounds: Bounds,
    check_bounds: bool,
    simplified: bool,
}

impl Intersection {
    /// Intersection of `children`. Fails on fewer than two operands.
    pub fn new(children: Vec<Box<dyn Shape>>) -> Result<Self, BuildError> {
        if children.len() < 2 {
            return Err(BuildError::TooFewIntersectionOperands(children.len()));
        }
        Ok(Self::from_children(children, false))
    }

    fn from_children(children: Vec<Box<dyn Shape>>, simplified: bool) -> Self {
        let bounds = clipped_bounds(&children);
        Self {
            children,
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

impl Shape for Intersection {
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
        let mut scratch: HitList<'a> = SmallVec::new();
        let mut merged: HitList<'a> = SmallVec::new();
        for (k, child) in self.children.iter().enumerate() {
            scratch.clear();
            if child.get_hits(ray, &mut scratch) == 0 {
                return 0;
            }
            if k == 0 {
                acc.extend_from_slice(&scratch);
                continue;
            }
            merged.clear();
            merge_spans(SpanOp::Intersection, &acc, &scratch, &mut merged);
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
            check_bounds: self.check_bounds,
            simplified: self.simplified,
        })
    }

    fn simplify(mut self: Box<Self>, _in_csg: bool) -> Box<dyn Shape> {
        if self.simplified {
            return self;
        }
        // Flatten nested intersections; associativity makes the walker
        // order irrelevant.
        let mut stack: Vec<Box<dyn Shape>> = std::mem::take(&mut self.children);
        stack.reverse();
        let mut flat: Vec<Box<dyn Shape>> = Vec::with_capacity(stack.len());
        while let Some(child) = stack.pop() {
            if child.as_any().is::<Intersection>() {
                if let Ok(nested) = child.into_any().downcast::<Intersection>() {
                    stack.extend(nested.children.into_iter().rev());
                }
            } else {
                flat.push(child);
            }
        }

        // Operands feed the walker, so they stay in interval mode.
        let children: Vec<Box<dyn Shape>> =
            flat.into_iter().map(|c| c.simplify(true)).collect();

        if children.len() == 2 {
            return match <[Box<dyn Shape>; 2]>::try_from(children) {
                Ok([a, b]) => Box::new(Inter2::new(a, b)),
                Err(children) => Box::new(Self::from_children(children, true)),
            };
        }
        Box::new(Self::from_children(children, true))
    }

    fn substitute(self: Box<Self>) -> Box<dyn Shape> {
        let Self {
            children,
            check_bounds,
            simplified,
            ..
        } = *self;
        let children: Vec<Box<dyn Shape>> =
            children.into_iter().map(|c| c.substitute()).collect();
        if children.iter().all(|c| c.max_hits() == 2) {
            debug_csg!("intersection/{} -> convex window", children.len());
            return Box::new(InterConvex::new(children));
        }
        let bounds = clipped_bounds(&children);
        Box::new(Self {
            children,
            bounds,
            check_bounds,
            simplified,
        })
    }

    fn initialize(&mut self, scene: &SceneContext, _in_csg: bool, in_transform: bool) {
        // Cheap operands first: an empty crossing list ends the whole
        // query.
        self.children.sort_by_key(|c| match c.cost() {
            Cost::Cheap => 0,
            Cost::Expensive => 1,
        });
        for child in &mut self.children {
            child.initialize(scene, true, in_transform);
        }
        self.bounds = clipped_bounds(&self.children);
        self.check_bounds = !self.bounds.is_infinite();
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
        self.bounds = clipped_bounds(&self.children);
    }

    fn apply_rotation(&mut self, rotation: &Transform) {
        for child in &mut self.children {
            child.apply_rotation(rotation);
        }
        self.bounds = clipped_bounds(&self.children);
    }

    fn apply_scale(&mut self, factors: &Vec3) {
        for child in &mut self.children {
            child.apply_scale(factors);
        }
        self.bounds = clipped_bounds(&self.children);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Intersection of exactly two shapes.
#[derive(Debug)]
pub struct Inter2 {
    a: Box<dyn Shape>,
    b: Box<dyn Shape>,
    bounds: Bounds,
    check_bounds: bool,
}

impl Inter2 {
    /// Pair intersection.
    pub fn new(a: Box<dyn Shape>, b: Box<dyn Shape>) -> Self {
        let bounds = pair_bounds(a.as_ref(), b.as_ref());
        Self {
            a,
            b,
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

impl Shape for Inter2 {
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
        if self.a.get_hits(ray, &mut ah) == 0 {
            return 0;
        }
        let mut bh: HitList<'a> = SmallVec::new();
        if self.b.get_hits(ray, &mut bh) == 0 {
            return 0;
        }
        let before = out.len();
        merge_spans(SpanOp::Intersection, &ah, &bh, out);
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
        let a = a.substitute();
        let b = b.substitute();
        if a.max_hits() == 2 && b.max_hits() == 2 {
            Box::new(Inter2Convex::new(a, b))
        } else {
            Box::new(Self::new(a, b))
        }
    }

    fn initialize(&mut self, scene: &SceneContext, _in_csg: bool, in_transform: bool) {
        self.a.initialize(scene, true, in_transform);
        self.b.initialize(scene, true, in_transform);
        self.bounds = pair_bounds(self.a.as_ref(), self.b.as_ref());
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
        self.bounds = pair_bounds(self.a.as_ref(), self.b.as_ref());
    }

    fn apply_rotation(&mut self, rotation: &Transform) {
        self.a.apply_rotation(rotation);
        self.b.apply_rotation(rotation);
        self.bounds = pair_bounds(self.a.as_ref(), self.b.as_ref());
    }

    fn apply_scale(&mut self, factors: &Vec3) {
        self.a.apply_scale(factors);
        self.b.apply_scale(factors);
        self.bounds = pair_bounds(self.a.as_ref(), self.b.as_ref());
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Pair intersection of two convex shapes: no walker, just the later
/// entry against the earlier exit.
///
/// Tie handling matches the generic walker exactly, so swapping this in
/// never changes which operand owns a boundary.
#[derive(Debug)]
pub struct Inter2Convex {
    a: Box<dyn Shape>,
    b: Box<dyn Shape>,
    bounds: Bounds,
    check_bounds: bool,
}

impl Inter2Convex {
    /// Convex pair intersection; both operands must report
    /// `max_hits() == 2`.
    pub fn new(a: Box<dyn Shape>, b: Box<dyn Shape>) -> Self {
        debug_assert!(a.max_hits() == 2 && b.max_hits() == 2);
        let bounds = pair_bounds(a.as_ref(), b.as_ref());
        Self {
            a,
            b,
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

impl Shape for Inter2Convex {
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
        if self.a.get_hits(ray, &mut ah) < 2 {
            return 0;
        }
        let mut bh: HitList<'a> = SmallVec::new();
        if self.b.get_hits(ray, &mut bh) < 2 {
            return 0;
        }
        let entry = if ah[0].time > bh[0].time { ah[0] } else { bh[0] };
        let exit = if ah[1].time <= bh[1].time { ah[1] } else { bh[1] };
        if entry.time >= exit.time {
            return 0;
        }
        out.push(entry);
        out.push(exit);
        2
    }

    fn bounds(&self) -> Bounds {
        self.bounds
    }

    fn cost(&self) -> Cost {
        Cost::Expensive
    }

    fn max_hits(&self) -> usize {
        2
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
        self
    }

    fn substitute(self: Box<Self>) -> Box<dyn Shape> {
        self
    }

    fn initialize(&mut self, scene: &SceneContext, _in_csg: bool, in_transform: bool) {
        self.a.initialize(scene, true, in_transform);
        self.b.initialize(scene, true, in_transform);
        self.bounds = pair_bounds(self.a.as_ref(), self.b.as_ref());
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
        self.bounds = pair_bounds(self.a.as_ref(), self.b.as_ref());
    }

    fn apply_rotation(&mut self, rotation: &Transform) {
        self.a.apply_rotation(rotation);
        self.b.apply_rotation(rotation);
        self.bounds = pair_bounds(self.a.as_ref(), self.b.as_ref());
    }

    fn apply_scale(&mut self, factors: &Vec3) {
        self.a.apply_scale(factors);
        self.b.apply_scale(factors);
        self.bounds = pair_bounds(self.a.as_ref(), self.b.as_ref());
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// N-ary intersection of convex shapes: one running entry/exit window.
#[derive(Debug)]
pub struct InterConvex {
    children: Vec<Box<dyn Shape>>,
    bounds: Bounds,
    check_bounds: bool,
}

impl InterConvex {
    /// Convex N-ary intersection; every operand must report
    /// `max_hits() == 2`.
    pub fn new(children: Vec<Box<dyn Shape>>) -> Self {
        debug_assert!(children.iter().all(|c| c.max_hits() == 2));
        let bounds = clipped_bounds(&children);
        Self {
            children,
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

impl Shape for InterConvex {
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
        let mut scratch: HitList<'a> = SmallVec::new();
        if self.children.is_empty() {
            return 0;
        }
        let mut entry;
        let mut exit;
        if self.children[0].get_hits(ray, &mut scratch) < 2 {
            return 0;
        }
        entry = scratch[0];
        exit = scratch[1];
        for child in &self.children[1..] {
            scratch.clear();
            if child.get_hits(ray, &mut scratch) < 2 {
                return 0;
            }
            // Same tie policy as the walker: the running window plays
            // operand 0.
            entry = if entry.time > scratch[0].time {
                entry
            } else {
                scratch[0]
            };
            exit = if exit.time <= scratch[1].time {
                exit
            } else {
                scratch[1]
            };
            if entry.time >= exit.time {
                return 0;
            }
        }
        if entry.time >= exit.time {
            return 0;
        }
        out.push(entry);
        out.push(exit);
        2
    }

    fn bounds(&self) -> Bounds {
        self.bounds
    }

    fn cost(&self) -> Cost {
        Cost::Expensive
    }

    fn max_hits(&self) -> usize {
        2
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
        for child in &mut self.children {
            child.initialize(scene, true, in_transform);
        }
        self.bounds = clipped_bounds(&self.children);
        self.check_bounds = !self.bounds.is_infinite();
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
        self.bounds = clipped_bounds(&self.children);
    }

    fn apply_rotation(&mut self, rotation: &Transform) {
        for child in &mut self.children {
            child.apply_rotation(rotation);
        }
        self.bounds = clipped_bounds(&self.children);
    }

    fn apply_scale(&mut self, factors: &Vec3) {
        for child in &mut self.children {
            child.apply_scale(factors);
        }
        self.bounds = clipped_bounds(&self.children);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}
