//! Line-of-sight path smoothing (string pulling).

use tilenav_core::{NavGrid, Point};

/// Whether every cell on the Bresenham line from `a` to `b` is inside the
/// grid and unblocked. Both endpoints are checked.
pub fn has_line_of_sight(grid: &NavGrid, a: Point, b: Point) -> bool {
    let dx = (b.x - a.x).abs();
    let dy = -(b.y - a.y).abs();
    let sx = if a.x < b.x { 1 } else { -1 };
    let sy = if a.y < b.y { 1 } else { -1 };
    let mut err = dx + dy;
    let mut p = a;
    loop {
        if grid.is_blocked(p) {
            return false;
        }
        if p == b {
            return true;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            p.x += sx;
        }
        if e2 <= dx {
            err += dx;
            p.y += sy;
        }
    }
}

/// One greedy pass: keep the first waypoint, then extend the line of sight
/// from the current anchor as far as it reaches before keeping a waypoint.
fn pull(grid: &NavGrid, path: &[Point]) -> Vec<Point> {
    let mut out = vec![path[0]];
    let mut anchor = 0;
    for i in 2..path.len() {
        if !has_line_of_sight(grid, path[anchor], path[i]) {
            anchor = i - 1;
            out.push(path[anchor]);
        }
    }
    out.push(path[path.len() - 1]);
    out
}

/// Remove waypoints that are visible from an earlier kept waypoint.
///
/// The first and last waypoints are always kept and paths shorter than 3
/// are left alone. Passes repeat until the waypoint count stops shrinking,
/// so smoothing an already smoothed path leaves it unchanged.
pub fn smooth_path(grid: &NavGrid, path: &mut Vec<Point>) {
    while path.len() >= 3 {
        let pulled = pull(grid, path);
        if pulled.len() >= path.len() {
            break;
        }
        *path = pulled;
    }
}
