//! Per-query search parameters and per-planner configuration.

/// Options for a single path query.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SearchParams {
    /// Allow 8-connected movement.
    pub allow_diagonal: bool,
    /// Allow a diagonal step even when one of the two orthogonal cells
    /// forming the corner is blocked.
    pub allow_corner_cutting: bool,
    /// Use Jump Point Search when the grid is eligible.
    pub prefer_jps: bool,
    /// Serve and store results through the path cache.
    pub use_cache: bool,
    /// Try the hierarchical planner first.
    pub use_hpa: bool,
    /// Side length of HPA* clusters (clamped to at least 4).
    pub hpa_cluster_size: i32,
    /// Revisions the grid may advance before HPA* rebuilds its graph.
    pub hpa_rebuild_threshold: u64,
    /// 1.0 is admissible; larger values trade optimality for speed.
    pub heuristic_weight: f32,
    /// Soft cap on node expansions, 0 for unlimited.
    pub max_expansions: u32,
    /// Apply line-of-sight smoothing to returned paths.
    pub smooth: bool,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            allow_diagonal: true,
            allow_corner_cutting: false,
            prefer_jps: true,
            use_cache: true,
            use_hpa: false,
            hpa_cluster_size: 16,
            hpa_rebuild_threshold: 64,
            heuristic_weight: 1.0,
            max_expansions: 0,
            smooth: true,
        }
    }
}

impl SearchParams {
    /// Bit set used in cache keys.
    pub(crate) fn cache_flags(&self) -> u8 {
        (self.allow_diagonal as u8)
            | (self.allow_corner_cutting as u8) << 1
            | (self.prefer_jps as u8) << 2
            | (self.use_hpa as u8) << 3
    }
}

/// Capabilities and tuning fixed for the lifetime of a
/// [`Planner`](crate::Planner).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlannerConfig {
    pub enable_jps: bool,
    pub enable_cache: bool,
    pub enable_flow_fields: bool,
    pub enable_dstar: bool,
    pub enable_hpa: bool,
    pub enable_debug: bool,
    /// Break open-list ties by push order so results are reproducible.
    pub deterministic: bool,
    pub cache_capacity: usize,
    pub seed: u64,
    /// Cells a single JPS jump may scan before it stops at the current cell.
    pub jump_budget: u32,
    /// Upper bound of the random score jitter in crowd avoidance.
    pub crowd_jitter: f32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            enable_jps: true,
            enable_cache: true,
            enable_flow_fields: true,
            enable_dstar: true,
            enable_hpa: true,
            enable_debug: true,
            deterministic: true,
            cache_capacity: 128,
            seed: 0xC0FF_EE12_34,
            jump_budget: 4096,
            crowd_jitter: 0.0,
        }
    }
}
