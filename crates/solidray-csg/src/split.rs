//! Surface-area-heuristic partitioning of large unions.
//!
//! A union with many expensive operands renders faster as a tree of
//! bounded pairs: each level splits the operand list where the summed
//! child-count-weighted surface area is smallest, the classic SAH sweep.
//! Internal nodes are [`Union2F`]; leaves pack the remaining operands
//! four wide.

use solidray_shape::{Bounds, Shape};

use crate::bounded::{Union2F, Union4F};

/// Partition `children` into an SAH tree. All operands must have
/// finite bounds.
pub fn build(mut children: Vec<Box<dyn Shape>>) -> Box<dyn Shape> {
    let n = children.len();
    if n <= 4 {
        return leaf(children);
    }

    // The spread of centroids picks the sort axis; child boxes may
    // overlap heavily and would bias it.
    let mut centroid_bounds = Bounds::empty();
    for child in &children {
        centroid_bounds.include_point(&child.centroid());
    }
    let axis = centroid_bounds.dominant_axis();
    children.sort_by(|a, b| a.centroid()[axis].total_cmp(&b.centroid()[axis]));

    // Suffix pass caches right-side areas so the sweep stays linear.
    let mut area_right = vec![0.0; n + 1];
    let mut acc = Bounds::empty();
    for i in (0..n).rev() {
        acc = acc.union(&children[i].bounds());
        area_right[i] = acc.half_area();
    }

    let mut best_cost = f64::INFINITY;
    let mut best_split = n / 2;
    let mut left = Bounds::empty();
    for i in 1..n {
        left = left.union(&children[i - 1].bounds());
        let cost = i as f64 * left.half_area() + (n - i) as f64 * area_right[i];
        if cost < best_cost {
            best_cost = cost;
            best_split = i;
        }
    }
    debug_csg!("split {n} operands at {best_split} along axis {axis}");

    let right = children.split_off(best_split);
    Box::new(Union2F::new(build(children), build(right)))
}

fn leaf(mut children: Vec<Box<dyn Shape>>) -> Box<dyn Shape> {
    debug_assert!(!children.is_empty());
    if children.len() == 1 {
        if let Some(only) = children.pop() {
            return only;
        }
    }
    Box::new(Union4F::new(children))
}
