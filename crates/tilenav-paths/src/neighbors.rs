use tilenav_core::{NavGrid, Point, Range};

use crate::distance::{self, DIAG};
use crate::params::SearchParams;
use crate::traits::Traversal;

/// The eight step directions: E, W, S, N, SE, SW, NE, NW.
///
/// The first four are the orthogonal steps. Flow-field directions are
/// indices into this table.
pub const DIRECTIONS: [Point; 8] = [
    Point::new(1, 0),
    Point::new(-1, 0),
    Point::new(0, 1),
    Point::new(0, -1),
    Point::new(1, 1),
    Point::new(-1, 1),
    Point::new(1, -1),
    Point::new(-1, -1),
];

/// Index into [`DIRECTIONS`] of a unit step, if it is one.
pub fn direction_index(step: Point) -> Option<u8> {
    DIRECTIONS.iter().position(|&d| d == step).map(|i| i as u8)
}

/// The legal steps on a [`NavGrid`] under a given movement policy.
///
/// A step is legal when the destination is inside the grid (and inside the
/// optional clip rectangle) and not blocked. Without corner cutting, a
/// diagonal step is also rejected when either orthogonal cell forming the
/// corner is blocked. Stepping onto a cell costs the step length times the
/// cell's move cost.
#[derive(Clone, Copy)]
pub struct GridSteps<'a> {
    grid: &'a NavGrid,
    diagonal: bool,
    corner_cutting: bool,
    weight: f32,
    clip: Option<Range>,
}

impl<'a> GridSteps<'a> {
    pub fn new(grid: &'a NavGrid, diagonal: bool, corner_cutting: bool) -> Self {
        Self {
            grid,
            diagonal,
            corner_cutting,
            weight: 1.0,
            clip: None,
        }
    }

    /// Movement policy and heuristic weight taken from `params`.
    pub fn from_params(grid: &'a NavGrid, params: &SearchParams) -> Self {
        Self::new(grid, params.allow_diagonal, params.allow_corner_cutting)
            .with_weight(params.heuristic_weight)
    }

    /// Scale [`estimate`](Traversal::estimate) by `weight`.
    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    /// Only allow steps that stay inside `clip`.
    pub fn clipped(mut self, clip: Range) -> Self {
        self.clip = Some(clip);
        self
    }

    #[inline]
    pub fn grid(&self) -> &'a NavGrid {
        self.grid
    }

    #[inline]
    pub fn diagonal(&self) -> bool {
        self.diagonal
    }

    #[inline]
    pub fn corner_cutting(&self) -> bool {
        self.corner_cutting
    }

    /// Whether `p` may be stood on.
    #[inline]
    pub fn can_enter(&self, p: Point) -> bool {
        self.grid.is_passable(p) && self.clip.is_none_or(|r| r.contains(p))
    }

    /// Whether the unit step `dir` out of `p` is legal.
    #[inline]
    pub fn can_step(&self, p: Point, dir: Point) -> bool {
        let diagonal = dir.x != 0 && dir.y != 0;
        if diagonal && !self.diagonal {
            return false;
        }
        if !self.can_enter(p + dir) {
            return false;
        }
        if diagonal && !self.corner_cutting {
            return !self.grid.is_blocked(p.shift(dir.x, 0))
                && !self.grid.is_blocked(p.shift(0, dir.y));
        }
        true
    }

    /// Cost of the step `dir` out of `p`, assuming it is legal.
    #[inline]
    pub fn step_cost(&self, p: Point, dir: Point) -> f32 {
        let len = if dir.x != 0 && dir.y != 0 { DIAG } else { 1.0 };
        len * self.grid.move_cost(p + dir) as f32
    }

    /// The directions to consider: the four orthogonal ones, plus the
    /// diagonals when allowed.
    #[inline]
    pub fn directions(&self) -> &'static [Point] {
        if self.diagonal {
            &DIRECTIONS
        } else {
            &DIRECTIONS[..4]
        }
    }
}

impl Traversal for GridSteps<'_> {
    fn for_each_step(&self, p: Point, visit: &mut dyn FnMut(Point, f32)) {
        for &d in self.directions() {
            if self.can_step(p, d) {
                visit(p + d, self.step_cost(p, d));
            }
        }
    }

    fn estimate(&self, from: Point, to: Point) -> f32 {
        self.weight * distance::heuristic(from, to, self.diagonal)
    }
}
