//! Shared scenario setup for the demos.
//!
//! The scenario is a 40×20 room split by a wall at x=20 with a couple of
//! doors, which is small enough to print and still forces every planner
//! through a bottleneck.

use tilenav_core::{NavGrid, Point};
use tilenav_paths::PlannerStats;

pub const WIDTH: i32 = 40;
pub const HEIGHT: i32 = 20;
pub const WALL_X: i32 = 20;

pub const START: Point = Point::new(2, 2);
pub const GOAL: Point = Point::new(37, 17);

/// The room with the wall closed everywhere except at the `doors` rows.
pub fn wall_grid(doors: &[i32]) -> NavGrid {
    let mut grid = NavGrid::new(WIDTH, HEIGHT);
    for y in 0..HEIGHT {
        if !doors.contains(&y) {
            grid.set_blocked(Point::new(WALL_X, y), true);
        }
    }
    grid
}

/// Open or close the door at row `y`; returns the changed cell, if any.
pub fn set_door(grid: &mut NavGrid, y: i32, open: bool) -> Option<Point> {
    let p = Point::new(WALL_X, y);
    grid.set_blocked(p, !open).then_some(p)
}

/// Log the planner counters at info level.
pub fn log_stats(stats: &PlannerStats) {
    log::info!(
        "astar {} / jps {} expansions, {} heap pushes, cache {} hits {} misses",
        stats.astar_expansions,
        stats.jps_expansions,
        stats.heap_pushes,
        stats.cache_hits,
        stats.cache_misses
    );
    log::info!(
        "hpa {} expansions, {} rebuilds, {} fallbacks; d*-lite {} pops, {} pushes, {} full rebuilds",
        stats.hpa_node_expansions,
        stats.hpa_rebuilds,
        stats.hpa_fallbacks,
        stats.dstar_pops,
        stats.dstar_pushes,
        stats.dstar_full_rebuilds
    );
}
