//! Jump Point Search (JPS) on uniform-cost grids.
//!
//! JPS is an A\* variant for grids where every passable cell costs the same
//! to enter. It "jumps" along straight lines and diagonals, only adding
//! *jump points* to the open list: cells where an optimal path may have to
//! turn because of an obstacle corner, plus the goal.
//!
//! Three pruning rule sets are used, one per movement policy: 4-connected,
//! 8-connected with corner cutting, and 8-connected without corner cutting.
//! Jumps are bounded walks; a jump that exhausts its step budget stops at
//! the current cell and reports it as a jump point.

use tilenav_core::{NavGrid, Point};

use crate::distance;
use crate::neighbors::GridSteps;
use crate::search::{NO_PARENT, PathResult, SearchSpace};
use crate::traits::Traversal;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Moves {
    /// 4-connected.
    Orthogonal,
    /// 8-connected, diagonal steps may squeeze past blocked corners.
    CutCorners,
    /// 8-connected, diagonal steps need both orthogonal cells open.
    NoCornerCut,
}

struct Jumper<'a> {
    grid: &'a NavGrid,
    moves: Moves,
    goal: Point,
    budget: u32,
}

impl Jumper<'_> {
    #[inline]
    fn walkable(&self, p: Point) -> bool {
        self.grid.is_passable(p)
    }

    /// Successor directions of a node reached by moving along `d`.
    fn pruned(&self, p: Point, d: Point, out: &mut Vec<Point>) {
        out.clear();
        let w = |dx: i32, dy: i32| self.walkable(p.shift(dx, dy));
        match self.moves {
            Moves::Orthogonal => {
                if d.x != 0 {
                    for dir in [Point::new(0, -1), Point::new(0, 1), Point::new(d.x, 0)] {
                        if w(dir.x, dir.y) {
                            out.push(dir);
                        }
                    }
                } else {
                    for dir in [Point::new(-1, 0), Point::new(1, 0), Point::new(0, d.y)] {
                        if w(dir.x, dir.y) {
                            out.push(dir);
                        }
                    }
                }
            }
            Moves::CutCorners => {
                if d.x != 0 && d.y != 0 {
                    if w(0, d.y) {
                        out.push(Point::new(0, d.y));
                    }
                    if w(d.x, 0) {
                        out.push(Point::new(d.x, 0));
                    }
                    if w(d.x, d.y) {
                        out.push(d);
                    }
                    if !w(-d.x, 0) {
                        out.push(Point::new(-d.x, d.y));
                    }
                    if !w(0, -d.y) {
                        out.push(Point::new(d.x, -d.y));
                    }
                } else if d.x != 0 {
                    if w(d.x, 0) {
                        out.push(d);
                    }
                    if !w(0, 1) {
                        out.push(Point::new(d.x, 1));
                    }
                    if !w(0, -1) {
                        out.push(Point::new(d.x, -1));
                    }
                } else {
                    if w(0, d.y) {
                        out.push(d);
                    }
                    if !w(1, 0) {
                        out.push(Point::new(1, d.y));
                    }
                    if !w(-1, 0) {
                        out.push(Point::new(-1, d.y));
                    }
                }
            }
            Moves::NoCornerCut => {
                if d.x != 0 && d.y != 0 {
                    let vert = w(0, d.y);
                    let horiz = w(d.x, 0);
                    if vert {
                        out.push(Point::new(0, d.y));
                    }
                    if horiz {
                        out.push(Point::new(d.x, 0));
                    }
                    if vert && horiz {
                        out.push(d);
                    }
                } else if d.x != 0 {
                    let next = w(d.x, 0);
                    let down = w(0, 1);
                    let up = w(0, -1);
                    if next {
                        out.push(d);
                        if down {
                            out.push(Point::new(d.x, 1));
                        }
                        if up {
                            out.push(Point::new(d.x, -1));
                        }
                    }
                    if down {
                        out.push(Point::new(0, 1));
                    }
                    if up {
                        out.push(Point::new(0, -1));
                    }
                } else {
                    let next = w(0, d.y);
                    let right = w(1, 0);
                    let left = w(-1, 0);
                    if next {
                        out.push(d);
                        if right {
                            out.push(Point::new(1, d.y));
                        }
                        if left {
                            out.push(Point::new(-1, d.y));
                        }
                    }
                    if right {
                        out.push(Point::new(1, 0));
                    }
                    if left {
                        out.push(Point::new(-1, 0));
                    }
                }
            }
        }
    }

    /// Whether a straight move along `d` has a forced neighbor at `n`.
    fn straight_forced(&self, n: Point, d: Point) -> bool {
        let w = |dx: i32, dy: i32| self.walkable(n.shift(dx, dy));
        match self.moves {
            Moves::CutCorners => {
                if d.x != 0 {
                    (w(d.x, 1) && !w(0, 1)) || (w(d.x, -1) && !w(0, -1))
                } else {
                    (w(1, d.y) && !w(1, 0)) || (w(-1, d.y) && !w(-1, 0))
                }
            }
            Moves::Orthogonal | Moves::NoCornerCut => {
                if d.x != 0 {
                    (w(0, -1) && !w(-d.x, -1)) || (w(0, 1) && !w(-d.x, 1))
                } else {
                    (w(-1, 0) && !w(-1, -d.y)) || (w(1, 0) && !w(1, -d.y))
                }
            }
        }
    }

    /// Jump from `from` along `d`.
    fn jump(&self, from: Point, d: Point) -> Option<Point> {
        let mut left = self.budget;
        if d.x != 0 && d.y != 0 {
            self.jump_diagonal(from, d, &mut left)
        } else if self.moves == Moves::Orthogonal && d.y != 0 {
            self.jump_vertical_orthogonal(from, d, &mut left)
        } else {
            self.scan(from, d, &mut left)
        }
    }

    /// Straight walk that stops at the goal or at a forced neighbor.
    fn scan(&self, from: Point, d: Point, left: &mut u32) -> Option<Point> {
        let mut n = from;
        loop {
            n = n + d;
            if !self.walkable(n) {
                return None;
            }
            if n == self.goal || *left == 0 {
                return Some(n);
            }
            *left -= 1;
            if self.straight_forced(n, d) {
                return Some(n);
            }
        }
    }

    /// 4-connected vertical walk. Every cell also probes east and west,
    /// since a horizontal jump point there means the path may turn here.
    fn jump_vertical_orthogonal(&self, from: Point, d: Point, left: &mut u32) -> Option<Point> {
        let mut n = from;
        loop {
            n = n + d;
            if !self.walkable(n) {
                return None;
            }
            if n == self.goal || *left == 0 {
                return Some(n);
            }
            *left -= 1;
            if self.straight_forced(n, d)
                || self.scan(n, Point::new(1, 0), left).is_some()
                || self.scan(n, Point::new(-1, 0), left).is_some()
            {
                return Some(n);
            }
        }
    }

    /// Diagonal walk. Every cell scans both component directions.
    fn jump_diagonal(&self, from: Point, d: Point, left: &mut u32) -> Option<Point> {
        let horiz = Point::new(d.x, 0);
        let vert = Point::new(0, d.y);
        let mut p = from;
        loop {
            let n = p + d;
            if !self.walkable(n) {
                return None;
            }
            if self.moves == Moves::NoCornerCut
                && !(self.walkable(p + horiz) && self.walkable(p + vert))
            {
                return None;
            }
            if n == self.goal || *left == 0 {
                return Some(n);
            }
            *left -= 1;
            if self.moves == Moves::CutCorners {
                let w = |dx: i32, dy: i32| self.walkable(n.shift(dx, dy));
                if (w(-d.x, d.y) && !w(-d.x, 0)) || (w(d.x, -d.y) && !w(0, -d.y)) {
                    return Some(n);
                }
            }
            if self.scan(n, horiz, left).is_some() || self.scan(n, vert, left).is_some() {
                return Some(n);
            }
            p = n;
        }
    }
}

impl SearchSpace {
    /// Shortest path with Jump Point Search.
    ///
    /// Only valid on grids where every move cost is 1; the result then has
    /// the same cost as [`astar`](SearchSpace::astar) with the same
    /// movement policy. `jump_budget` bounds the cells a single jump may
    /// scan.
    pub(crate) fn jps(
        &mut self,
        grid: &NavGrid,
        steps: &GridSteps<'_>,
        start: Point,
        goal: Point,
        max_expansions: u32,
        jump_budget: u32,
    ) -> PathResult {
        let (Some(si), Some(gi)) = (grid.index(start), grid.index(goal)) else {
            return PathResult::failure();
        };
        if si == gi {
            return PathResult::single(start);
        }
        let diagonal = steps.diagonal();
        let jumper = Jumper {
            grid,
            moves: match (diagonal, steps.corner_cutting()) {
                (false, _) => Moves::Orthogonal,
                (true, true) => Moves::CutCorners,
                (true, false) => Moves::NoCornerCut,
            },
            goal,
            budget: jump_budget,
        };
        let h = |p: Point| steps.estimate(p, goal);

        self.begin(grid.len());
        self.node(si).g = 0.0;
        self.push(si, h(start));

        let mut dirs = Vec::with_capacity(8);
        let mut expanded = 0u32;
        while let Some(ci) = self.pop() {
            if ci == gi {
                return self.jump_result(grid, gi);
            }
            if max_expansions > 0 {
                expanded += 1;
                if expanded > max_expansions {
                    return self.jump_result(grid, ci);
                }
            }

            let cp = grid.point(ci);
            let (cg, parent) = {
                let n = self.node(ci);
                (n.g, n.parent)
            };
            if parent == NO_PARENT {
                dirs.clear();
                dirs.extend(steps.directions().iter().copied().filter(|&d| steps.can_step(cp, d)));
            } else {
                jumper.pruned(cp, (cp - grid.point(parent)).signum(), &mut dirs);
            }

            for &d in &dirs {
                let Some(jp) = jumper.jump(cp, d) else {
                    continue;
                };
                let Some(ji) = grid.index(jp) else {
                    continue;
                };
                let tentative = cg + distance::octile(cp, jp);
                let n = self.node(ji);
                if n.closed || tentative >= n.g {
                    continue;
                }
                n.g = tentative;
                n.parent = ci;
                self.push(ji, tentative + h(jp));
            }
        }
        PathResult::failure()
    }

    fn jump_result(&self, grid: &NavGrid, idx: usize) -> PathResult {
        let mut r = self.result(grid, idx);
        r.path = interpolate(&r.path);
        r
    }
}

/// Expand a list of jump points, each on a straight or diagonal line from
/// the previous one, into a contiguous cell path.
fn interpolate(jump_points: &[Point]) -> Vec<Point> {
    let Some(&first) = jump_points.first() else {
        return Vec::new();
    };
    let mut out = vec![first];
    for w in jump_points.windows(2) {
        let step = (w[1] - w[0]).signum();
        let mut c = w[0];
        while c != w[1] {
            c = c + step;
            out.push(c);
        }
    }
    out
}
