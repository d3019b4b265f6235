/// Work counters accumulated by a [`Planner`](crate::Planner).
///
/// Counters only ever grow until [`Planner::reset_stats`](crate::Planner::reset_stats).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlannerStats {
    pub astar_expansions: u64,
    pub jps_expansions: u64,
    /// Open-list pushes of A\* and JPS.
    pub heap_pushes: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Abstract-graph nodes expanded by HPA\*.
    pub hpa_node_expansions: u64,
    pub hpa_rebuilds: u64,
    /// HPA\* queries that fell back to A\* or JPS.
    pub hpa_fallbacks: u64,
    pub dstar_pops: u64,
    pub dstar_pushes: u64,
    /// D\*-Lite (re)initializations from scratch.
    pub dstar_full_rebuilds: u64,
}
