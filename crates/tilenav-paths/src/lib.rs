//! Path planning on mutable 2D tile grids.
//!
//! The [`Planner`] facade composes several strategies over a borrowed
//! [`NavGrid`](tilenav_core::NavGrid):
//!
//! - **A\*** shortest paths with a weighted octile or Manhattan heuristic
//! - **Jump Point Search** on grids that never carried a non-unit cost
//! - **HPA\*** over a cluster/portal graph ([`Hpa`])
//! - **D\*-Lite** incremental replanning toward a standing goal
//! - an LRU **path cache** keyed by the grid revision
//! - **flow fields** for many agents sharing targets ([`FlowField`])
//! - line-of-sight **smoothing** ([`smooth_path`])
//! - density-based **crowd avoidance** ([`CrowdField`])
//!
//! Search scratch space, cache, D\*-Lite state and the HPA\* graph all live
//! in the planner and are reused between queries.
//!
//! # Movement model
//!
//! | Policy | Steps |
//! |---|---|
//! | 4-connected | E, W, S, N |
//! | 8-connected, no corner cutting | plus diagonals whose two orthogonal cells are open |
//! | 8-connected, corner cutting | plus every diagonal onto an open cell |
//!
//! Entering a cell costs the step length (1 or √2) times its move cost.

mod astar;
mod cache;
mod crowd;
mod debug;
mod distance;
mod dstar;
mod flow;
mod hpa;
mod jps;
mod neighbors;
mod params;
mod planner;
mod rng;
mod search;
mod smooth;
mod stats;
mod traits;

pub use crowd::{CrowdField, DEFAULT_DECAY, OUTSIDE_DENSITY};
pub use debug::{dump_flow, dump_path};
pub use distance::{DIAG, chebyshev, heuristic, manhattan, octile};
pub use flow::{FlowField, NO_DIRECTION};
pub use hpa::{Hpa, MIN_CLUSTER_SIZE, PortalNode};
pub use neighbors::{DIRECTIONS, GridSteps, direction_index};
pub use params::{PlannerConfig, SearchParams};
pub use planner::Planner;
pub use rng::TieBreakRng;
pub use search::PathResult;
pub use smooth::{has_line_of_sight, smooth_path};
pub use stats::PlannerStats;
pub use traits::Traversal;
