//! The shared interval algebra all combinators reduce to.
//!
//! Two sorted crossing lists describe alternating inside/outside
//! interval boundaries for two operands. A single merge-step walk over
//! both lists, keeping one inside flag per operand, emits a boundary of
//! the combined solid exactly when the combined state changes. Only the
//! boolean combination differs per operator.
//!
//! Ties are deliberate: when two candidate crossings carry equal time,
//! the left operand's list drains first (non-strict `<=`). Every
//! specialization replicates this policy so behavior at exactly
//! touching surfaces stays consistent across the whole family.

use smallvec::SmallVec;
use solidray_math::Tolerance;
use solidray_shape::{Hit, HitList};

/// Boolean combination applied by the walker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanOp {
    /// Combined-inside = inside0 OR inside1.
    Union,
    /// Combined-inside = inside0 AND inside1.
    Intersection,
    /// Combined-inside = inside0 AND NOT inside1.
    Difference,
}

impl SpanOp {
    #[inline]
    fn combine(self, in0: bool, in1: bool) -> bool {
        match self {
            SpanOp::Union => in0 || in1,
            SpanOp::Intersection => in0 && in1,
            SpanOp::Difference => in0 && !in1,
        }
    }
}

/// Merge two sorted crossing lists under `op`, appending the combined
/// solid's boundaries to `out`.
///
/// Both inputs must be in non-decreasing time order; the output then is
/// too, alternating entry/exit of the combined solid.
pub fn merge_spans<'a>(op: SpanOp, a: &[Hit<'a>], b: &[Hit<'a>], out: &mut HitList<'a>) {
    let mut i = 0;
    let mut j = 0;
    let mut in0 = false;
    let mut in1 = false;
    let mut inside = false;

    while i < a.len() || j < b.len() {
        // Ties favor operand 0: drain the left list first.
        let hit = if j >= b.len() || (i < a.len() && a[i].time <= b[j].time) {
            in0 = !in0;
            let h = a[i];
            i += 1;
            h
        } else {
            in1 = !in1;
            let h = b[j];
            j += 1;
            h
        };

        let now = op.combine(in0, in1);
        if now != inside {
            inside = now;
            out.push(hit);
        }
    }
}

/// Union merge that welds shared surfaces (the merge engine).
///
/// Identical to `merge_spans(SpanOp::Union, ..)` except that a
/// zero-width outside gap - an exit immediately re-entered at
/// (numerically) the same time, i.e. an internal coincident boundary
/// between the operands - is dropped instead of re-emitted, producing a
/// watertight combined solid.
pub fn weld_spans<'a>(a: &[Hit<'a>], b: &[Hit<'a>], out: &mut HitList<'a>) {
    let mut raw: HitList<'a> = SmallVec::new();
    merge_spans(SpanOp::Union, a, b, &mut raw);

    let tol = Tolerance::DEFAULT;
    let mut k = 0;
    while k < raw.len() {
        // Even raw indices enter the combined solid, odd ones exit it.
        if k % 2 == 1 && k + 1 < raw.len() && tol.same_crossing(raw[k].time, raw[k + 1].time) {
            k += 2;
        } else {
            out.push(raw[k]);
            k += 1;
        }
    }
}
