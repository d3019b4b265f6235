//! D\*-Lite incremental re-planning.
//!
//! The planner keeps goal distances (`g`, `rhs`) for one goal across calls.
//! When the caller reports which cells changed, only the affected region is
//! repaired; moving the start only accumulates the key modifier `km`.
//!
//! Any revision change the planner was not told about forces a full
//! re-initialization, as does a new goal, a new grid or new traversal
//! parameters.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tilenav_core::{GridId, NavGrid, Point};

use crate::neighbors::GridSteps;
use crate::params::SearchParams;
use crate::search::PathResult;
use crate::traits::Traversal;

const INF: f64 = f64::INFINITY;
/// Relative tolerance for comparing distances summed along different routes.
const EPS: f64 = 1e-9;

/// Equal up to rounding. Infinities only equal themselves.
#[inline]
fn close(a: f64, b: f64) -> bool {
    if a == b {
        return true;
    }
    if !a.is_finite() || !b.is_finite() {
        return false;
    }
    (a - b).abs() <= EPS * a.abs().max(b.abs()).max(1.0)
}

#[inline]
fn definitely_less(a: f64, b: f64) -> bool {
    a < b && !close(a, b)
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Key {
    k1: f64,
    k2: f64,
}

impl Key {
    /// Lexicographic `<` where components equal up to rounding tie.
    fn less(self, other: Key) -> bool {
        if close(self.k1, other.k1) {
            definitely_less(self.k2, other.k2)
        } else {
            self.k1 < other.k1
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct QItem {
    key: Key,
    idx: usize,
}

impl Ord for QItem {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .key
            .k1
            .total_cmp(&self.key.k1)
            .then_with(|| other.key.k2.total_cmp(&self.key.k2))
            .then_with(|| other.idx.cmp(&self.idx))
    }
}

impl PartialOrd for QItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QItem {}

/// Movement policy the distances were computed under.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Policy {
    diagonal: bool,
    corner_cutting: bool,
    weight: f32,
}

impl From<&SearchParams> for Policy {
    fn from(p: &SearchParams) -> Self {
        Self {
            diagonal: p.allow_diagonal,
            corner_cutting: p.allow_corner_cutting,
            weight: p.heuristic_weight,
        }
    }
}

#[derive(Default)]
pub(crate) struct DStarLite {
    initialized: bool,
    grid_id: Option<GridId>,
    width: i32,
    height: i32,
    g: Vec<f64>,
    rhs: Vec<f64>,
    /// Key of the live queue entry of each cell; other entries are stale.
    queued: Vec<Option<Key>>,
    open: BinaryHeap<QItem>,
    km: f64,
    start: usize,
    last: usize,
    goal: usize,
    goal_cell: Point,
    policy: Option<Policy>,
    last_seen_revision: u64,
    pub(crate) pops: u64,
    pub(crate) pushes: u64,
    pub(crate) updates: u64,
    pub(crate) full_rebuilds: u64,
}

impl DStarLite {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Forget all state; the next query initializes from scratch.
    pub(crate) fn reset(&mut self) {
        self.initialized = false;
        self.open.clear();
    }

    pub(crate) fn reset_counters(&mut self) {
        self.pops = 0;
        self.pushes = 0;
        self.updates = 0;
        self.full_rebuilds = 0;
    }

    fn steps<'a>(&self, grid: &'a NavGrid) -> GridSteps<'a> {
        let p = self.policy.unwrap_or(Policy {
            diagonal: true,
            corner_cutting: false,
            weight: 1.0,
        });
        GridSteps::new(grid, p.diagonal, p.corner_cutting).with_weight(p.weight)
    }

    fn same_grid(&self, grid: &NavGrid) -> bool {
        self.grid_id == Some(grid.id()) && self.width == grid.width() && self.height == grid.height()
    }

    /// Path from `start` to `goal`, reusing previous work where possible.
    pub(crate) fn replan(
        &mut self,
        grid: &NavGrid,
        start: Point,
        goal: Point,
        params: &SearchParams,
    ) -> PathResult {
        let (Some(si), Some(gi)) = (grid.index(start), grid.index(goal)) else {
            return PathResult::failure();
        };
        if grid.is_blocked(goal) {
            return PathResult::failure();
        }
        if si == gi {
            return PathResult::single(start);
        }

        let policy = Policy::from(params);
        let reason = if !self.initialized {
            Some("first query")
        } else if !self.same_grid(grid) {
            Some("grid replaced")
        } else if gi != self.goal {
            Some("goal changed")
        } else if self.policy != Some(policy) {
            Some("parameters changed")
        } else {
            None
        };

        match reason {
            Some(reason) => self.initialize(grid, si, gi, goal, policy, reason),
            None => {
                self.set_start(grid, si);
                if grid.revision() != self.last_seen_revision {
                    self.initialize(grid, si, gi, goal, policy, "unreported grid changes");
                }
            }
        }

        if grid.is_blocked(start) {
            // A blocked cell is nobody's successor; price the way out here
            // in case it only just became the start.
            let steps = self.steps(grid);
            self.update_vertex(&steps, si);
        }
        self.compute_shortest_path(grid);
        let out = self.build_path(grid);
        self.last_seen_revision = grid.revision();
        out
    }

    /// Repair distances around cells whose blocked state or cost changed.
    ///
    /// Does nothing before the first [`replan`](Self::replan) or when
    /// `grid` is not the grid the state was built for.
    pub(crate) fn notify_changed_cells(&mut self, grid: &NavGrid, changed: &[Point]) {
        if !self.initialized || !self.same_grid(grid) {
            return;
        }
        let steps = self.steps(grid);
        let mut around = Vec::with_capacity(8);
        for &c in changed {
            let Some(ci) = grid.index(c) else {
                continue;
            };
            self.update_vertex(&steps, ci);
            around.clear();
            self.predecessors(&steps, c, &mut around);
            for &n in &around {
                self.update_vertex(&steps, n);
            }
        }
        self.compute_shortest_path(grid);
        self.last_seen_revision = grid.revision();
    }

    fn initialize(
        &mut self,
        grid: &NavGrid,
        start: usize,
        goal: usize,
        goal_cell: Point,
        policy: Policy,
        reason: &str,
    ) {
        log::debug!("d*-lite initializing toward {goal_cell}: {reason}");
        let len = grid.len();
        self.grid_id = Some(grid.id());
        self.width = grid.width();
        self.height = grid.height();
        self.g.clear();
        self.g.resize(len, INF);
        self.rhs.clear();
        self.rhs.resize(len, INF);
        self.queued.clear();
        self.queued.resize(len, None);
        self.open.clear();
        self.km = 0.0;
        self.start = start;
        self.last = start;
        self.goal = goal;
        self.goal_cell = goal_cell;
        self.policy = Some(policy);
        self.initialized = true;
        self.last_seen_revision = grid.revision();
        self.full_rebuilds += 1;

        let steps = self.steps(grid);
        self.rhs[goal] = 0.0;
        let k = self.key(&steps, goal);
        self.enqueue(goal, k);
    }

    fn set_start(&mut self, grid: &NavGrid, start: usize) {
        if start == self.start {
            return;
        }
        let steps = self.steps(grid);
        self.km += f64::from(steps.estimate(grid.point(self.last), grid.point(start)));
        self.last = start;
        self.start = start;
    }

    fn key(&self, steps: &GridSteps<'_>, u: usize) -> Key {
        let m = self.g[u].min(self.rhs[u]);
        let grid = steps.grid();
        let h = f64::from(steps.estimate(grid.point(self.start), grid.point(u)));
        Key {
            k1: m + h + self.km,
            k2: m,
        }
    }

    fn enqueue(&mut self, u: usize, key: Key) {
        self.queued[u] = Some(key);
        self.open.push(QItem { key, idx: u });
        self.pushes += 1;
    }

    fn update_vertex(&mut self, steps: &GridSteps<'_>, u: usize) {
        let grid = steps.grid();
        if u != self.goal {
            let mut best = INF;
            let g = &self.g;
            steps.for_each_step(grid.point(u), &mut |v, c| {
                if let Some(vi) = grid.index(v) {
                    best = best.min(f64::from(c) + g[vi]);
                }
            });
            self.rhs[u] = best;
        }
        if close(self.g[u], self.rhs[u]) {
            self.queued[u] = None;
        } else {
            let k = self.key(steps, u);
            self.enqueue(u, k);
        }
        self.updates += 1;
    }

    /// Best live queue entry, dropping stale ones on the way.
    fn top(&mut self) -> Option<QItem> {
        while let Some(&q) = self.open.peek() {
            if self.queued[q.idx] == Some(q.key) {
                return Some(q);
            }
            self.open.pop();
        }
        None
    }

    fn compute_shortest_path(&mut self, grid: &NavGrid) {
        let steps = self.steps(grid);
        let mut around = Vec::with_capacity(8);
        while let Some(top) = self.top() {
            let start_key = self.key(&steps, self.start);
            let start_consistent = close(self.g[self.start], self.rhs[self.start]);
            if !top.key.less(start_key) && start_consistent {
                break;
            }
            self.open.pop();
            self.pops += 1;
            let u = top.idx;
            self.queued[u] = None;

            let new_key = self.key(&steps, u);
            if top.key.less(new_key) {
                self.enqueue(u, new_key);
                continue;
            }

            around.clear();
            self.predecessors(&steps, grid.point(u), &mut around);
            if self.g[u] > self.rhs[u] {
                self.g[u] = self.rhs[u];
            } else {
                self.g[u] = INF;
                self.update_vertex(&steps, u);
            }
            for &p in &around {
                self.update_vertex(&steps, p);
            }
        }
    }

    /// Follow the cheapest successor from start to goal.
    fn build_path(&self, grid: &NavGrid) -> PathResult {
        if self.rhs[self.start].is_infinite() {
            return PathResult::failure();
        }
        let steps = self.steps(grid);
        let mut cur = self.start;
        let mut path = vec![grid.point(cur)];
        let mut total = 0.0;
        let mut cap = grid.len() * 4;
        while cur != self.goal && cap > 0 {
            cap -= 1;
            let mut best = INF;
            let mut best_cost = 0.0;
            let mut best_next = cur;
            steps.for_each_step(grid.point(cur), &mut |v, c| {
                let Some(vi) = grid.index(v) else {
                    return;
                };
                let cand = f64::from(c) + self.g[vi];
                if definitely_less(cand, best) {
                    best = cand;
                    best_cost = f64::from(c);
                    best_next = vi;
                }
            });
            if best_next == cur || best.is_infinite() {
                return PathResult::failure();
            }
            cur = best_next;
            path.push(grid.point(cur));
            total += best_cost;
        }
        if cur != self.goal {
            return PathResult::failure();
        }
        PathResult {
            success: true,
            cost: total as f32,
            path,
        }
    }

    /// Cells whose `rhs` may depend on `p`: every open neighbor, plus the
    /// start when it sits next to `p` on a blocked cell.
    ///
    /// Open neighbors count even when no step joins them to `p`, since `p`
    /// may be the corner a diagonal between two of them has to clear.
    fn predecessors(&self, steps: &GridSteps<'_>, p: Point, out: &mut Vec<usize>) {
        let grid = steps.grid();
        for &d in steps.directions() {
            let Some(i) = grid.index(p + d) else {
                continue;
            };
            if i == self.start || !grid.is_blocked(p + d) {
                out.push(i);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SearchSpace;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn wall_grid() -> NavGrid {
        let mut g = NavGrid::new(40, 20);
        for y in 0..20 {
            if y != 5 && y != 12 {
                g.set_blocked(Point::new(20, y), true);
            }
        }
        g
    }

    fn params() -> SearchParams {
        SearchParams {
            allow_diagonal: true,
            allow_corner_cutting: false,
            ..SearchParams::default()
        }
    }

    fn astar_cost(g: &NavGrid, from: Point, to: Point) -> f32 {
        let mut s = SearchSpace::new(true);
        s.astar(g, &GridSteps::new(g, true, false), from, to, 0).cost
    }

    fn assert_legal(g: &NavGrid, r: &PathResult) {
        let steps = GridSteps::new(g, true, false);
        for w in r.path.windows(2) {
            assert!(steps.can_step(w[0], w[1] - w[0]), "illegal step {} -> {}", w[0], w[1]);
        }
    }

    #[test]
    fn initial_plan_is_optimal() {
        let g = wall_grid();
        let mut d = DStarLite::new();
        let (s, t) = (Point::new(2, 2), Point::new(37, 17));
        let r = d.replan(&g, s, t, &params());
        assert!(r.success);
        assert_eq!(r.path.first(), Some(&s));
        assert_eq!(r.path.last(), Some(&t));
        assert!((r.cost - astar_cost(&g, s, t)).abs() < 1e-3);
        assert_legal(&g, &r);
        assert_eq!(d.full_rebuilds, 1);
    }

    #[test]
    fn repairs_without_rebuild() {
        let mut g = wall_grid();
        let mut d = DStarLite::new();
        let (s, t) = (Point::new(2, 2), Point::new(37, 17));
        let first = d.replan(&g, s, t, &params());
        assert!(first.path.contains(&Point::new(20, 5)) || first.path.contains(&Point::new(20, 12)));

        // Close the door the path uses.
        let door = if first.path.contains(&Point::new(20, 5)) {
            Point::new(20, 5)
        } else {
            Point::new(20, 12)
        };
        g.set_blocked(door, true);
        d.notify_changed_cells(&g, &[door]);
        let second = d.replan(&g, s, t, &params());
        assert!(second.success);
        assert!(!second.path.contains(&door));
        assert_legal(&g, &second);
        assert!((second.cost - astar_cost(&g, s, t)).abs() < 1e-3);
        assert_eq!(d.full_rebuilds, 1);
    }

    #[test]
    fn opening_a_shortcut_is_found() {
        let mut g = wall_grid();
        let mut d = DStarLite::new();
        let (s, t) = (Point::new(2, 9), Point::new(37, 9));
        d.replan(&g, s, t, &params());
        g.set_blocked(Point::new(20, 9), false);
        d.notify_changed_cells(&g, &[Point::new(20, 9)]);
        let r = d.replan(&g, s, t, &params());
        assert!(r.path.contains(&Point::new(20, 9)));
        assert!((r.cost - 35.0).abs() < 1e-3);
        assert_eq!(d.full_rebuilds, 1);
    }

    #[test]
    fn moving_start_reuses_state() {
        let g = wall_grid();
        let mut d = DStarLite::new();
        let t = Point::new(37, 17);
        let mut r = d.replan(&g, Point::new(2, 2), t, &params());
        for _ in 0..5 {
            let next = r.path[1];
            r = d.replan(&g, next, t, &params());
            assert!(r.success);
            assert_eq!(r.path[0], next);
            assert!((r.cost - astar_cost(&g, next, t)).abs() < 1e-3);
        }
        assert_eq!(d.full_rebuilds, 1);
        assert!(d.km > 0.0);
    }

    #[test]
    fn unreported_change_forces_rebuild() {
        let mut g = wall_grid();
        let mut d = DStarLite::new();
        let (s, t) = (Point::new(2, 2), Point::new(37, 17));
        d.replan(&g, s, t, &params());
        g.set_blocked(Point::new(20, 5), true);
        let r = d.replan(&g, s, t, &params());
        assert_eq!(d.full_rebuilds, 2);
        assert!(r.path.contains(&Point::new(20, 12)));
    }

    #[test]
    fn goal_or_params_change_rebuilds() {
        let g = wall_grid();
        let mut d = DStarLite::new();
        d.replan(&g, Point::new(2, 2), Point::new(37, 17), &params());
        d.replan(&g, Point::new(2, 2), Point::new(30, 3), &params());
        assert_eq!(d.full_rebuilds, 2);
        let four = SearchParams {
            allow_diagonal: false,
            ..params()
        };
        let r = d.replan(&g, Point::new(2, 2), Point::new(30, 3), &four);
        assert_eq!(d.full_rebuilds, 3);
        assert!(r.path.windows(2).all(|w| crate::distance::manhattan(w[0], w[1]) == 1));
    }

    #[test]
    fn unreachable_and_trivial() {
        let mut g = NavGrid::new(6, 6);
        for y in 0..6 {
            g.set_blocked(Point::new(3, y), true);
        }
        let mut d = DStarLite::new();
        assert!(!d.replan(&g, Point::new(0, 0), Point::new(5, 5), &params()).success);
        assert!(!d.replan(&g, Point::new(0, 0), Point::new(3, 3), &params()).success);
        assert!(!d.replan(&g, Point::new(0, 0), Point::new(9, 9), &params()).success);
        let same = d.replan(&g, Point::new(1, 1), Point::new(1, 1), &params());
        assert_eq!(same.path, vec![Point::new(1, 1)]);
    }

    #[test]
    fn repeated_edits_match_a_fresh_search() {
        let p = params();
        let goal = Point::new(22, 21);
        for seed in 0..12u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut g = NavGrid::new(25, 25);
            for c in g.bounds() {
                if rng.random_bool(0.2) {
                    g.set_blocked(c, true);
                }
            }
            let mut start = Point::new(2, 3);
            g.set_blocked(start, false);
            g.set_blocked(goal, false);

            let mut d = DStarLite::new();
            d.replan(&g, start, goal, &p);
            for round in 0..25 {
                let mut changed = Vec::new();
                for _ in 0..rng.random_range(1..6) {
                    let c = Point::new(rng.random_range(0..25), rng.random_range(0..25));
                    if c == start || c == goal {
                        continue;
                    }
                    let edited = if rng.random_bool(0.5) {
                        let blocked = g.is_blocked(c);
                        g.set_blocked(c, !blocked)
                    } else {
                        g.set_move_cost(c, rng.random_range(1..6))
                    };
                    if edited {
                        changed.push(c);
                    }
                }
                d.notify_changed_cells(&g, &changed);

                let r = d.replan(&g, start, goal, &p);
                let mut s = SearchSpace::new(true);
                let want = s.astar(&g, &GridSteps::new(&g, true, false), start, goal, 0);
                assert_eq!(r.success, want.success, "seed {seed} round {round}");
                if !r.success {
                    continue;
                }
                assert!(
                    (r.cost - want.cost).abs() < 1e-3,
                    "seed {seed} round {round}: {} vs {}",
                    r.cost,
                    want.cost
                );
                assert_eq!(r.path.last(), Some(&goal));
                assert_legal(&g, &r);
                if r.path.len() > 2 {
                    start = r.path[1];
                }
            }
            assert_eq!(d.full_rebuilds, 1, "seed {seed}");
        }
    }

    #[test]
    fn cost_edits_are_repaired() {
        let mut g = NavGrid::new(12, 7);
        let mut d = DStarLite::new();
        let (s, t) = (Point::new(0, 3), Point::new(11, 3));
        assert!((d.replan(&g, s, t, &params()).cost - 11.0).abs() < 1e-3);
        let band: Vec<Point> = (0..7).map(|y| Point::new(6, y)).filter(|p| p.y != 0).collect();
        for &c in &band {
            g.set_move_cost(c, 9);
        }
        d.notify_changed_cells(&g, &band);
        let r = d.replan(&g, s, t, &params());
        assert!(r.path.contains(&Point::new(6, 0)));
        assert!((r.cost - astar_cost(&g, s, t)).abs() < 1e-3);
        assert_eq!(d.full_rebuilds, 1);
    }

    #[test]
    fn blocked_start_can_leave() {
        let mut g = wall_grid();
        let (s, t) = (Point::new(2, 2), Point::new(37, 17));
        g.set_blocked(s, true);
        let mut d = DStarLite::new();
        let r = d.replan(&g, s, t, &params());
        assert!(r.success);
        assert!((r.cost - astar_cost(&g, s, t)).abs() < 1e-3);
        assert_legal(&g, &r);

        // Walk one step, then have the cell under the agent close.
        let next = r.path[1];
        g.set_blocked(next, true);
        d.notify_changed_cells(&g, &[next]);
        let r = d.replan(&g, next, t, &params());
        assert!(r.success);
        assert_eq!(r.path[0], next);
        assert!((r.cost - astar_cost(&g, next, t)).abs() < 1e-3);
        assert_eq!(d.full_rebuilds, 1);
    }

    #[test]
    fn notify_before_replan_is_ignored() {
        let g = wall_grid();
        let mut d = DStarLite::new();
        d.notify_changed_cells(&g, &[Point::new(1, 1)]);
        assert_eq!(d.full_rebuilds, 0);
        assert_eq!(d.updates, 0);
    }
}
