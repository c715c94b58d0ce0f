//! Tuning knobs for the simplification/specialization pass.

/// Thresholds steering which specialized combinator the optimizer
/// selects. The defaults are tuned against the conservative
/// bounding-sphere merge heuristic; change them together.
#[derive(Debug, Clone, Copy)]
pub struct Settings {
    /// Minimum operand count before a general union pre-tests its own
    /// bounding box (smaller unions only do so when a child is
    /// expensive).
    pub union_threshold: usize,
    /// A bounding sphere is worth testing when
    /// `radius^3 < bounding_sphere_threshold * bounds.volume()`.
    pub bounding_sphere_threshold: f64,
    /// Minimum operand count before the SAH split pass runs.
    pub split_threshold: usize,
    /// Minimum number of expensive operands before the SAH split pass
    /// runs.
    pub split_expensive: usize,
    /// Minimum operand count before child simplification goes through
    /// the thread pool.
    pub parallel_threshold: usize,
    /// Link width of the sphere-checked union chain.
    pub sunion_group: usize,
}

impl Settings {
    /// Default tuning.
    pub const DEFAULT: Self = Self {
        union_threshold: 4,
        bounding_sphere_threshold: 0.4,
        split_threshold: 10,
        split_expensive: 3,
        parallel_threshold: 8,
        sunion_group: 4,
    };
}

impl Default for Settings {
    fn default() -> Self {
        Self::DEFAULT
    }
}
