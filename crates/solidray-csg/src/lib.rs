#![warn(missing_docs)]

//! CSG ray-intersection combinators for the solidray kernel.
//!
//! Union, intersection, difference and merge of arbitrary
//! [`Shape`](solidray_shape::Shape) trees, computed by interval (span)
//! algebra over sorted crossing lists.
//!
//! # Architecture
//!
//! - [`span`] - the shared sorted-merge interval walker all operators
//!   reduce to
//! - [`Union`] family - general N-ary union plus fixed-arity, bounded
//!   and sphere-checked specializations
//! - [`Intersection`] / [`Difference`] families - AND / AND-NOT interval
//!   engines with convex fast paths
//! - [`Merge`] - union with internal coincident surfaces welded away
//! - [`split`] - surface-area-heuristic partitioning of large unions
//! - [`prepare`] - the three-phase build driver (simplify, substitute,
//!   initialize)
//!
//! # Example
//!
//! ```ignore
//! use solidray_csg::{prepare, Union};
//! use solidray_shape::{SceneContext, ShadowCache};
//!
//! let scene = SceneContext::new(eye);
//! let root = prepare(Box::new(Union::new(shapes)?), &scene);
//!
//! let mut cache = ShadowCache::new();
//! let lit = !cache.shadow_test(root.as_ref(), &shadow_ray, light_dist);
//! ```

/// Debug logging macro - only prints when the debug-csg feature is enabled
#[allow(unused_macros)]
#[cfg(feature = "debug-csg")]
macro_rules! debug_csg {
    ($($arg:tt)*) => {
        eprintln!($($arg)*)
    };
}

/// No-op version when the debug-csg feature is disabled
#[allow(unused_macros)]
#[cfg(not(feature = "debug-csg"))]
macro_rules! debug_csg {
    ($($arg:tt)*) => {};
}

mod bounded;
mod difference;
mod intersection;
mod merge;
mod settings;
pub mod span;
pub mod split;
mod union;
mod util;

pub use bounded::{SUnion, SUnion2, Union2F, Union4F};
pub use difference::{Diff2, Diff2Convex, Difference};
pub use intersection::{Inter2, Inter2Convex, InterConvex, Intersection};
pub use merge::Merge;
pub use settings::Settings;
pub use union::{Union, Union2, Union3};

use solidray_shape::{SceneContext, Shape};

/// Run the three-phase build on a shape tree: structural simplification,
/// leaf-level substitution, then camera-dependent initialization.
///
/// After this returns the tree is immutable for the rest of the render;
/// queries may run from any thread.
pub fn prepare(shape: Box<dyn Shape>, scene: &SceneContext) -> Box<dyn Shape> {
    let mut shape = shape.simplify(false).substitute();
    shape.initialize(scene, false, false);
    shape
}
