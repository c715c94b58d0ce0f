#![warn(missing_docs)]

//! Shape capability contract and ray/bounds primitives for the solidray
//! CSG kernel.
//!
//! This crate defines the currency types every combinator and every leaf
//! shape trades in:
//!
//! - [`Ray`] - ray with precomputed reciprocals for fast slab tests
//! - [`Hit`] / [`HitInfo`] - boundary crossing records and query results
//! - [`Bounds`] / [`BoundingSphere`] - conservative bounding volumes
//! - [`Shape`] - the capability contract (ray queries, bounds/cost
//!   oracles, the three-phase build, clone/transform operations)
//! - [`ShadowCache`] - the explicit per-light occluder cache context
//!
//! Leaf primitives (spheres, planes, ...) live outside this crate; the
//! kernel only consumes their [`Shape`] implementation.

pub mod bounds;
pub mod hit;
mod ray;
mod shape;

pub use bounds::{Bounds, BoundingSphere};
pub use hit::{first_forward, Hit, HitInfo, HitList, MaterialId};
pub use ray::Ray;
pub use shape::{
    aggregate_misuse, BuildError, Cost, SceneContext, ShadowCache, Shape,
};
