//! Concrete leaf shapes for exercising the combinators end to end.

use std::any::Any;

use solidray_math::{Point3, Tolerance, Transform, Vec3};
use solidray_shape::{
    first_forward, Bounds, Cost, Hit, HitInfo, HitList, MaterialId, Ray, SceneContext,
    ShadowCache, Shape,
};

/// A solid sphere.
#[derive(Debug, Clone)]
pub struct Sphere {
    pub center: Point3,
    pub radius: f64,
    pub material: MaterialId,
    negated: bool,
}

impl Sphere {
    pub fn new(center: Point3, radius: f64) -> Box<Self> {
        Box::new(Self {
            center,
            radius,
            material: MaterialId(1),
            negated: false,
        })
    }

    pub fn with_material(center: Point3, radius: f64, material: MaterialId) -> Box<Self> {
        let mut s = Self::new(center, radius);
        s.material = material;
        s
    }
}

impl Shape for Sphere {
    fn shadow_test<'a>(&'a self, ray: &Ray, max_time: f64, _cache: &mut ShadowCache<'a>) -> bool {
        let mut hits = HitList::new();
        self.get_hits(ray, &mut hits);
        first_forward(&hits, max_time).is_some()
    }

    fn hit_test(&self, ray: &Ray, max_time: f64, info: &mut HitInfo) -> bool {
        let mut hits = HitList::new();
        self.get_hits(ray, &mut hits);
        match first_forward(&hits, max_time) {
            Some(hit) => {
                *info = hit.resolve(ray);
                true
            }
            None => false,
        }
    }

    fn get_hits<'a>(&'a self, ray: &Ray, out: &mut HitList<'a>) -> usize {
        match ray.intersect_sphere(&self.center, self.radius * self.radius) {
            Some((t0, t1)) => {
                out.push(Hit::new(t0, self));
                out.push(Hit::new(t1, self));
                2
            }
            None => 0,
        }
    }

    fn normal_at(&self, point: &Point3) -> Vec3 {
        let n = (point - self.center) / self.radius;
        if self.negated {
            -n
        } else {
            n
        }
    }

    fn material(&self) -> MaterialId {
        self.material
    }

    fn bounds(&self) -> Bounds {
        Bounds::from_sphere(&self.center, self.radius)
    }

    fn centroid(&self) -> Point3 {
        self.center
    }

    fn squared_radius(&self) -> f64 {
        self.radius * self.radius
    }

    fn cost(&self) -> Cost {
        Cost::Cheap
    }

    fn max_hits(&self) -> usize {
        2
    }

    fn negate(&mut self) {
        self.negated = !self.negated;
    }

    fn clone_shape(&self, _force: bool) -> Box<dyn Shape> {
        Box::new(self.clone())
    }

    fn simplify(self: Box<Self>, _in_csg: bool) -> Box<dyn Shape> {
        self
    }

    fn substitute(self: Box<Self>) -> Box<dyn Shape> {
        self
    }

    fn initialize(&mut self, _scene: &SceneContext, _in_csg: bool, _in_transform: bool) {}

    fn can_rotate(&self) -> bool {
        true
    }

    fn can_scale(&self) -> bool {
        false
    }

    fn apply_translation(&mut self, offset: &Vec3) {
        self.center += offset;
    }

    fn apply_rotation(&mut self, rotation: &Transform) {
        self.center = rotation.apply_point(&self.center);
    }

    fn apply_scale(&mut self, _factors: &Vec3) {}

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// An axis-aligned solid box.
#[derive(Debug, Clone)]
pub struct Slab {
    pub bounds: Bounds,
    pub material: MaterialId,
    cost: Cost,
    negated: bool,
}

impl Slab {
    pub fn new(min: Point3, max: Point3) -> Box<Self> {
        Box::new(Self {
            bounds: Bounds::new(min, max),
            material: MaterialId(2),
            cost: Cost::Cheap,
            negated: false,
        })
    }

    /// Same box, reported as expensive; drives the bounded and split
    /// specializations in tests.
    pub fn expensive(min: Point3, max: Point3) -> Box<Self> {
        let mut s = Self::new(min, max);
        s.cost = Cost::Expensive;
        s
    }
}

impl Shape for Slab {
    fn shadow_test<'a>(&'a self, ray: &Ray, max_time: f64, _cache: &mut ShadowCache<'a>) -> bool {
        let mut hits = HitList::new();
        self.get_hits(ray, &mut hits);
        first_forward(&hits, max_time).is_some()
    }

    fn hit_test(&self, ray: &Ray, max_time: f64, info: &mut HitInfo) -> bool {
        let mut hits = HitList::new();
        self.get_hits(ray, &mut hits);
        match first_forward(&hits, max_time) {
            Some(hit) => {
                *info = hit.resolve(ray);
                true
            }
            None => false,
        }
    }

    fn get_hits<'a>(&'a self, ray: &Ray, out: &mut HitList<'a>) -> usize {
        // Full-line slab test: no forward clamping, callers derive
        // parity from crossings behind the origin too.
        let inv = ray.inv_direction();
        let tx1 = (self.bounds.min.x - ray.origin.x) * inv.x;
        let tx2 = (self.bounds.max.x - ray.origin.x) * inv.x;
        let ty1 = (self.bounds.min.y - ray.origin.y) * inv.y;
        let ty2 = (self.bounds.max.y - ray.origin.y) * inv.y;
        let tz1 = (self.bounds.min.z - ray.origin.z) * inv.z;
        let tz2 = (self.bounds.max.z - ray.origin.z) * inv.z;

        let t_min = tx1.min(tx2).max(ty1.min(ty2)).max(tz1.min(tz2));
        let t_max = tx1.max(tx2).min(ty1.max(ty2)).min(tz1.max(tz2));

        if t_max < t_min {
            return 0;
        }
        out.push(Hit::new(t_min, self));
        out.push(Hit::new(t_max, self));
        2
    }

    fn normal_at(&self, point: &Point3) -> Vec3 {
        let eps = 1e-6;
        let n = if (point.x - self.bounds.min.x).abs() < eps {
            -Vec3::x()
        } else if (point.x - self.bounds.max.x).abs() < eps {
            Vec3::x()
        } else if (point.y - self.bounds.min.y).abs() < eps {
            -Vec3::y()
        } else if (point.y - self.bounds.max.y).abs() < eps {
            Vec3::y()
        } else if (point.z - self.bounds.min.z).abs() < eps {
            -Vec3::z()
        } else {
            Vec3::z()
        };
        if self.negated {
            -n
        } else {
            n
        }
    }

    fn material(&self) -> MaterialId {
        self.material
    }

    fn bounds(&self) -> Bounds {
        self.bounds
    }

    fn cost(&self) -> Cost {
        self.cost
    }

    fn max_hits(&self) -> usize {
        2
    }

    fn negate(&mut self) {
        self.negated = !self.negated;
    }

    fn clone_shape(&self, _force: bool) -> Box<dyn Shape> {
        Box::new(self.clone())
    }

    fn simplify(self: Box<Self>, _in_csg: bool) -> Box<dyn Shape> {
        self
    }

    fn substitute(self: Box<Self>) -> Box<dyn Shape> {
        self
    }

    fn initialize(&mut self, _scene: &SceneContext, _in_csg: bool, _in_transform: bool) {}

    fn can_rotate(&self) -> bool {
        false
    }

    fn can_scale(&self) -> bool {
        true
    }

    fn apply_translation(&mut self, offset: &Vec3) {
        self.bounds.min += offset;
        self.bounds.max += offset;
    }

    fn apply_rotation(&mut self, _rotation: &Transform) {}

    fn apply_scale(&mut self, factors: &Vec3) {
        self.bounds.min.x *= factors.x;
        self.bounds.min.y *= factors.y;
        self.bounds.min.z *= factors.z;
        self.bounds.max.x *= factors.x;
        self.bounds.max.y *= factors.y;
        self.bounds.max.z *= factors.z;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// A ray along +x from `origin`.
pub fn x_ray_from(origin: Point3) -> Ray {
    Ray::new(origin, Vec3::x())
}

/// Count crossings at or before `t` to decide containment.
pub fn inside_at(hits: &[Hit<'_>], t: f64) -> bool {
    hits.iter().filter(|h| h.time <= t).count() % 2 == 1
}

/// True when `t` is within tolerance of any crossing in `hits`; parity
/// sampling near a boundary is not meaningful.
pub fn near_boundary(hits: &[Hit<'_>], t: f64) -> bool {
    hits.iter()
        .any(|h| (h.time - t).abs() <= Tolerance::DEFAULT.epsilon * 10.0)
}
