use tilenav_core::{NavGrid, Point};

use crate::search::{PathResult, SearchSpace};
use crate::traits::Traversal;

impl SearchSpace {
    /// Shortest path from `start` to `goal` with A\*.
    ///
    /// Only the neighbor contract of `steps` decides which cells are
    /// reachable, so a clipped [`GridSteps`](crate::GridSteps) gives a
    /// search restricted to a rectangle. The goal test happens when the goal
    /// is expanded. With `max_expansions > 0`, the search stops after that
    /// many expansions and returns the path to the node expanded last, still
    /// marked successful.
    pub(crate) fn astar<T: Traversal>(
        &mut self,
        grid: &NavGrid,
        steps: &T,
        start: Point,
        goal: Point,
        max_expansions: u32,
    ) -> PathResult {
        let (Some(si), Some(gi)) = (grid.index(start), grid.index(goal)) else {
            return PathResult::failure();
        };
        if si == gi {
            return PathResult::single(start);
        }

        self.begin(grid.len());
        self.node(si).g = 0.0;
        self.push(si, steps.estimate(start, goal));

        let mut expanded = 0u32;
        while let Some(ci) = self.pop() {
            if ci == gi {
                return self.result(grid, gi);
            }
            if max_expansions > 0 {
                expanded += 1;
                if expanded > max_expansions {
                    return self.result(grid, ci);
                }
            }

            let cp = grid.point(ci);
            let cg = self.node(ci).g;
            steps.for_each_step(cp, &mut |np, cost| {
                let Some(ni) = grid.index(np) else {
                    return;
                };
                let tentative = cg + cost;
                let n = self.node(ni);
                if n.closed || tentative >= n.g {
                    return;
                }
                n.g = tentative;
                n.parent = ci;
                self.push(ni, tentative + steps.estimate(np, goal));
            });
        }
        PathResult::failure()
    }
}
