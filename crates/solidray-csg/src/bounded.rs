//! Bounded and sphere-checked union specializations.
//!
//! [`Union2F`] and [`Union4F`] cache their children's boxes and reject
//! rays before recursing; [`Union4F`] keeps the four boxes in
//! structure-of-arrays layout so one pass over the slabs tests all
//! lanes. [`SUnion`] and [`SUnion2`] guard groups of children behind a
//! bounding-sphere test instead; they answer only opaque queries
//! (shadow and closest-hit) and are never selected inside a CSG
//! operand, where crossing lists are required.

use std::any::Any;

use solidray_math::{Point3, Transform, Vec3};
use solidray_shape::{
    aggregate_misuse, BoundingSphere, Bounds, Cost, HitInfo, HitList, Ray, SceneContext,
    ShadowCache, Shape,
};

use crate::union::union_hits;
use crate::util;

/// Pair union with cached per-child boxes tested before recursion.
///
/// Selected for pairs of expensive, finite children; also the internal
/// node of the SAH split tree.
#[derive(Debug)]
pub struct Union2F {
    a: Box<dyn Shape>,
    b: Box<dyn Shape>,
    bounds_a: Bounds,
    bounds_b: Bounds,
    bounds: Bounds,
    cache_occluders: bool,
}

impl Union2F {
    /// Bounded pair union. Both children must have finite bounds.
    pub fn new(a: Box<dyn Shape>, b: Box<dyn Shape>) -> Self {
        let bounds_a = a.bounds();
        let bounds_b = b.bounds();
        Self {
            bounds: bounds_a.union(&bounds_b),
            a,
            b,
            bounds_a,
            bounds_b,
            cache_occluders: true,
        }
    }

    fn refresh_extent(&mut self) {
        self.bounds_a = self.a.bounds();
        self.bounds_b = self.b.bounds();
        self.bounds = self.bounds_a.union(&self.bounds_b);
    }
}

impl Shape for Union2F {
    fn shadow_test<'a>(&'a self, ray: &Ray, max_time: f64, cache: &mut ShadowCache<'a>) -> bool {
        if !ray.hits_bounds(&self.bounds, max_time) {
            return false;
        }
        if ray.hits_bounds(&self.bounds_a, max_time) && self.a.shadow_test(ray, max_time, cache) {
            if self.cache_occluders {
                cache.store(self.a.as_ref());
            }
            return true;
        }
        if ray.hits_bounds(&self.bounds_b, max_time) && self.b.shadow_test(ray, max_time, cache) {
            if self.cache_occluders {
                cache.store(self.b.as_ref());
            }
            return true;
        }
        false
    }

    fn hit_test(&self, ray: &Ray, max_time: f64, info: &mut HitInfo) -> bool {
        if !ray.hits_bounds(&self.bounds, max_time) {
            return false;
        }
        let mut found = false;
        let mut horizon = max_time;
        if ray.hits_bounds(&self.bounds_a, horizon) && self.a.hit_test(ray, horizon, info) {
            horizon = info.time;
            found = true;
        }
        let mut local = HitInfo::none();
        if ray.hits_bounds(&self.bounds_b, horizon) && self.b.hit_test(ray, horizon, &mut local) {
            *info = local;
            found = true;
        }
        found
    }

    fn get_hits<'a>(&'a self, ray: &Ray, out: &mut HitList<'a>) -> usize {
        union_hits(
            [self.a.as_ref(), self.b.as_ref()].into_iter(),
            ray,
            out,
        )
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
            bounds_a: self.bounds_a,
            bounds_b: self.bounds_b,
            bounds: self.bounds,
            cache_occluders: self.cache_occluders,
        })
    }

    fn simplify(self: Box<Self>, _in_csg: bool) -> Box<dyn Shape> {
        self
    }

    fn substitute(self: Box<Self>) -> Box<dyn Shape> {
        let Self { a, b, .. } = *self;
        Box::new(Self::new(a.substitute(), b.substitute()))
    }

    fn initialize(&mut self, scene: &SceneContext, in_csg: bool, in_transform: bool) {
        let da = (self.a.centroid() - scene.eye).norm_squared();
        let db = (self.b.centroid() - scene.eye).norm_squared();
        if db < da {
            std::mem::swap(&mut self.a, &mut self.b);
        }
        self.a.initialize(scene, in_csg, in_transform);
        self.b.initialize(scene, in_csg, in_transform);
        self.refresh_extent();
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
        self.refresh_extent();
    }

    fn apply_rotation(&mut self, rotation: &Transform) {
        self.a.apply_rotation(rotation);
        self.b.apply_rotation(rotation);
        self.refresh_extent();
    }

    fn apply_scale(&mut self, factors: &Vec3) {
        self.a.apply_scale(factors);
        self.b.apply_scale(factors);
        self.refresh_extent();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Four child boxes in structure-of-arrays layout.
#[derive(Debug, Clone, Copy)]
struct BoundsPack4 {
    min_x: [f64; 4],
    min_y: [f64; 4],
    min_z: [f64; 4],
    max_x: [f64; 4],
    max_y: [f64; 4],
    max_z: [f64; 4],
}

impl BoundsPack4 {
    fn from_children(children: &[Box<dyn Shape>]) -> Self {
        let mut pack = Self {
            min_x: [f64::INFINITY; 4],
            min_y: [f64::INFINITY; 4],
            min_z: [f64::INFINITY; 4],
            max_x: [f64::NEG_INFINITY; 4],
            max_y: [f64::NEG_INFINITY; 4],
            max_z: [f64::NEG_INFINITY; 4],
        };
        for (lane, child) in children.iter().enumerate() {
            let b = child.bounds();
            pack.min_x[lane] = b.min.x;
            pack.min_y[lane] = b.min.y;
            pack.min_z[lane] = b.min.z;
            pack.max_x[lane] = b.max.x;
            pack.max_y[lane] = b.max.y;
            pack.max_z[lane] = b.max.z;
        }
        pack
    }

    /// Slab test all populated lanes in one pass.
    fn hits(&self, ray: &Ray, max_time: f64, len: usize) -> [bool; 4] {
        let o = ray.origin;
        let inv = ray.inv_direction();
        let mut out = [false; 4];
        for lane in 0..len {
            let tx1 = (self.min_x[lane] - o.x) * inv.x;
            let tx2 = (self.max_x[lane] - o.x) * inv.x;
            let ty1 = (self.min_y[lane] - o.y) * inv.y;
            let ty2 = (self.max_y[lane] - o.y) * inv.y;
            let tz1 = (self.min_z[lane] - o.z) * inv.z;
            let tz2 = (self.max_z[lane] - o.z) * inv.z;

            let t_min = tx1.min(tx2).max(ty1.min(ty2)).max(tz1.min(tz2));
            let t_max = tx1.max(tx2).min(ty1.max(ty2)).min(tz1.max(tz2));

            out[lane] = t_max >= t_min && t_max >= 0.0 && t_min <= max_time;
        }
        out
    }
}

/// Union of up to four shapes whose boxes are slab-tested four wide.
#[derive(Debug)]
pub struct Union4F {
    children: Vec<Box<dyn Shape>>,
    pack: BoundsPack4,
    bounds: Bounds,
    cache_occluders: bool,
}

impl Union4F {
    /// Quad union of two to four finite children.
    pub fn new(children: Vec<Box<dyn Shape>>) -> Self {
        debug_assert!((2..=4).contains(&children.len()));
        let bounds = util::children_bounds(&children);
        let pack = BoundsPack4::from_children(&children);
        Self {
            children,
            pack,
            bounds,
            cache_occluders: true,
        }
    }

    fn refresh_extent(&mut self) {
        self.bounds = util::children_bounds(&self.children);
        self.pack = BoundsPack4::from_children(&self.children);
    }
}

impl Shape for Union4F {
    fn shadow_test<'a>(&'a self, ray: &Ray, max_time: f64, cache: &mut ShadowCache<'a>) -> bool {
        let mask = self.pack.hits(ray, max_time, self.children.len());
        for (lane, child) in self.children.iter().enumerate() {
            if mask[lane] && child.shadow_test(ray, max_time, cache) {
                if self.cache_occluders {
                    cache.store(child.as_ref());
                }
                return true;
            }
        }
        false
    }

    fn hit_test(&self, ray: &Ray, max_time: f64, info: &mut HitInfo) -> bool {
        let mask = self.pack.hits(ray, max_time, self.children.len());
        let mut closest = max_time;
        let mut found = false;
        for (lane, child) in self.children.iter().enumerate() {
            if !mask[lane] {
                continue;
            }
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
        Box::new(Self {
            children: util::clone_children(&self.children, force),
            pack: self.pack,
            bounds: self.bounds,
            cache_occluders: self.cache_occluders,
        })
    }

    fn simplify(self: Box<Self>, _in_csg: bool) -> Box<dyn Shape> {
        self
    }

    fn substitute(self: Box<Self>) -> Box<dyn Shape> {
        let Self { children, .. } = *self;
        Box::new(Self::new(
            children.into_iter().map(|c| c.substitute()).collect(),
        ))
    }

    fn initialize(&mut self, scene: &SceneContext, in_csg: bool, in_transform: bool) {
        util::sort_by_distance(&mut self.children, &scene.eye);
        for child in &mut self.children {
            child.initialize(scene, in_csg, in_transform);
        }
        self.refresh_extent();
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

/// Sphere-checked union chain, the opaque fast path for ball-like
/// clusters.
///
/// Each link guards a small group of children behind its own bounding
/// sphere; the links form an intrusive tail chain walked iteratively.
/// The chain answers shadow and closest-hit queries only: it is never
/// selected where crossing lists feed further boolean composition, and
/// asking it for them is a structural misuse.
#[derive(Debug)]
pub struct SUnion {
    children: Vec<Box<dyn Shape>>,
    sphere: BoundingSphere,
    bounds: Bounds,
    tail: Option<Box<SUnion>>,
    cache_occluders: bool,
}

impl SUnion {
    /// Chain `children` into sphere-checked groups.
    pub fn build(children: Vec<Box<dyn Shape>>) -> Box<Self> {
        let group = crate::settings::Settings::DEFAULT.sunion_group;
        let mut tail: Option<Box<SUnion>> = None;
        let mut rest = children;
        // Build back to front so the head keeps the leading operands.
        while rest.len() > group {
            let split_at = rest.len() - group;
            let link = rest.split_off(split_at);
            tail = Some(Box::new(Self::link(link, tail)));
        }
        Box::new(Self::link(rest, tail))
    }

    fn link(children: Vec<Box<dyn Shape>>, tail: Option<Box<SUnion>>) -> Self {
        let sphere = util::merged_sphere(&children);
        let mut bounds = util::children_bounds(&children);
        if let Some(tail) = &tail {
            bounds = bounds.union(&tail.bounds);
        }
        Self {
            children,
            sphere,
            bounds,
            tail,
            cache_occluders: true,
        }
    }

    fn refresh_extent(&mut self) {
        self.sphere = util::merged_sphere(&self.children);
        self.bounds = util::children_bounds(&self.children);
        if let Some(tail) = &self.tail {
            self.bounds = self.bounds.union(&tail.bounds);
        }
    }

    fn for_each_child(&mut self, f: &mut dyn FnMut(&mut Box<dyn Shape>)) {
        let mut node = self;
        loop {
            for child in &mut node.children {
                f(child);
            }
            match &mut node.tail {
                Some(tail) => node = tail,
                None => return,
            }
        }
    }

    fn into_children(self: Box<Self>) -> Vec<Box<dyn Shape>> {
        let mut out = Vec::new();
        let mut node = Some(self);
        while let Some(mut link) = node {
            out.append(&mut link.children);
            node = link.tail.take();
        }
        out
    }

    fn refresh_chain(&mut self) {
        if let Some(tail) = &mut self.tail {
            tail.refresh_chain();
        }
        self.refresh_extent();
    }
}

impl Shape for SUnion {
    fn shadow_test<'a>(&'a self, ray: &Ray, max_time: f64, cache: &mut ShadowCache<'a>) -> bool {
        let mut node = self;
        loop {
            if ray.hits_sphere(&node.sphere.center, node.sphere.radius2, max_time) {
                for child in &node.children {
                    if child.shadow_test(ray, max_time, cache) {
                        if node.cache_occluders {
                            cache.store(child.as_ref());
                        }
                        return true;
                    }
                }
            }
            match &node.tail {
                Some(tail) => node = tail,
                None => return false,
            }
        }
    }

    fn hit_test(&self, ray: &Ray, max_time: f64, info: &mut HitInfo) -> bool {
        let mut node = self;
        let mut closest = max_time;
        let mut found = false;
        loop {
            if ray.hits_sphere(&node.sphere.center, node.sphere.radius2, closest) {
                for child in &node.children {
                    let mut local = HitInfo::none();
                    if child.hit_test(ray, closest, &mut local) {
                        closest = local.time;
                        *info = local;
                        found = true;
                    }
                }
            }
            match &node.tail {
                Some(tail) => node = tail,
                None => return found,
            }
        }
    }

    fn get_hits<'a>(&'a self, _ray: &Ray, _out: &mut HitList<'a>) -> usize {
        aggregate_misuse("SUnion", "get_hits");
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

    fn cost(&self) -> Cost {
        Cost::Expensive
    }

    fn max_hits(&self) -> usize {
        let mut node = self;
        let mut total = 0;
        loop {
            total += util::sum_max_hits(&node.children);
            match &node.tail {
                Some(tail) => node = tail,
                None => return total,
            }
        }
    }

    fn negate(&mut self) {
        self.for_each_child(&mut |child| child.negate());
    }

    fn clone_shape(&self, force: bool) -> Box<dyn Shape> {
        Box::new(Self {
            children: util::clone_children(&self.children, force),
            sphere: self.sphere,
            bounds: self.bounds,
            tail: self.tail.as_ref().map(|tail| {
                match tail.clone_shape(force).into_any().downcast::<SUnion>() {
                    Ok(tail) => tail,
                    Err(_) => unreachable!("SUnion clones as SUnion"),
                }
            }),
            cache_occluders: self.cache_occluders,
        })
    }

    fn simplify(self: Box<Self>, _in_csg: bool) -> Box<dyn Shape> {
        self
    }

    fn substitute(self: Box<Self>) -> Box<dyn Shape> {
        let children: Vec<Box<dyn Shape>> = self
            .into_children()
            .into_iter()
            .map(|c| c.substitute())
            .collect();
        SUnion::build(children)
    }

    fn initialize(&mut self, scene: &SceneContext, in_csg: bool, in_transform: bool) {
        let mut node = &mut *self;
        loop {
            util::sort_by_distance(&mut node.children, &scene.eye);
            for child in &mut node.children {
                child.initialize(scene, in_csg, in_transform);
            }
            node.cache_occluders = !in_transform;
            match &mut node.tail {
                Some(tail) => node = tail,
                None => break,
            }
        }
        self.refresh_chain();
    }

    fn can_rotate(&self) -> bool {
        let mut node = self;
        loop {
            if !node.children.iter().all(|c| c.can_rotate()) {
                return false;
            }
            match &node.tail {
                Some(tail) => node = tail,
                None => return true,
            }
        }
    }

    fn can_scale(&self) -> bool {
        let mut node = self;
        loop {
            if !node.children.iter().all(|c| c.can_scale()) {
                return false;
            }
            match &node.tail {
                Some(tail) => node = tail,
                None => return true,
            }
        }
    }

    fn apply_translation(&mut self, offset: &Vec3) {
        self.for_each_child(&mut |child| child.apply_translation(offset));
        self.refresh_chain();
    }

    fn apply_rotation(&mut self, rotation: &Transform) {
        self.for_each_child(&mut |child| child.apply_rotation(rotation));
        self.refresh_chain();
    }

    fn apply_scale(&mut self, factors: &Vec3) {
        self.for_each_child(&mut |child| child.apply_scale(factors));
        self.refresh_chain();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Sphere-checked pair union; opaque queries only.
#[derive(Debug)]
pub struct SUnion2 {
    a: Box<dyn Shape>,
    b: Box<dyn Shape>,
    sphere: BoundingSphere,
    bounds: Bounds,
    cache_occluders: bool,
}

impl SUnion2 {
    /// Sphere-checked pair.
    pub fn new(a: Box<dyn Shape>, b: Box<dyn Shape>) -> Self {
        let mut sphere = a.bounding_sphere();
        sphere.merge(&b.bounding_sphere());
        let bounds = a.bounds().union(&b.bounds());
        Self {
            a,
            b,
            sphere,
            bounds,
            cache_occluders: true,
        }
    }

    fn refresh_extent(&mut self) {
        self.sphere = self.a.bounding_sphere();
        self.sphere.merge(&self.b.bounding_sphere());
        self.bounds = self.a.bounds().union(&self.b.bounds());
    }
}

impl Shape for SUnion2 {
    fn shadow_test<'a>(&'a self, ray: &Ray, max_time: f64, cache: &mut ShadowCache<'a>) -> bool {
        if !ray.hits_sphere(&self.sphere.center, self.sphere.radius2, max_time) {
            return false;
        }
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
        if !ray.hits_sphere(&self.sphere.center, self.sphere.radius2, max_time) {
            return false;
        }
        let mut found = self.a.hit_test(ray, max_time, info);
        let horizon = if found { info.time } else { max_time };
        let mut local = HitInfo::none();
        if self.b.hit_test(ray, horizon, &mut local) {
            *info = local;
            found = true;
        }
        found
    }

    fn get_hits<'a>(&'a self, _ray: &Ray, _out: &mut HitList<'a>) -> usize {
        aggregate_misuse("SUnion2", "get_hits");
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
            sphere: self.sphere,
            bounds: self.bounds,
            cache_occluders: self.cache_occluders,
        })
    }

    fn simplify(self: Box<Self>, _in_csg: bool) -> Box<dyn Shape> {
        self
    }

    fn substitute(self: Box<Self>) -> Box<dyn Shape> {
        let Self { a, b, .. } = *self;
        Box::new(Self::new(a.substitute(), b.substitute()))
    }

    fn initialize(&mut self, scene: &SceneContext, in_csg: bool, in_transform: bool) {
        let da = (self.a.centroid() - scene.eye).norm_squared();
        let db = (self.b.centroid() - scene.eye).norm_squared();
        if db < da {
            std::mem::swap(&mut self.a, &mut self.b);
        }
        self.a.initialize(scene, in_csg, in_transform);
        self.b.initialize(scene, in_csg, in_transform);
        self.refresh_extent();
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
        self.refresh_extent();
    }

    fn apply_rotation(&mut self, rotation: &Transform) {
        self.a.apply_rotation(rotation);
        self.b.apply_rotation(rotation);
        self.refresh_extent();
    }

    fn apply_scale(&mut self, factors: &Vec3) {
        self.a.apply_scale(factors);
        self.b.apply_scale(factors);
        self.refresh_extent();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}
