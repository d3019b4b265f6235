//! Flow fields: per-cell cost to the nearest target and the best next step.
//!
//! A flow field is computed once with a multi-source Dijkstra relaxation and
//! then followed by any number of agents with [`FlowField::step`].

use std::collections::BinaryHeap;

use tilenav_core::{NavGrid, Point};

use crate::neighbors::{DIRECTIONS, GridSteps};
use crate::search::NodeRef;

/// Direction value of a cell with no better neighbor: a source, a blocked
/// cell or an unreachable cell.
pub const NO_DIRECTION: u8 = 255;

const EPS: f32 = 1e-6;

/// Distance-to-target field with the derived best direction per cell.
///
/// `dir` values index [`DIRECTIONS`](crate::DIRECTIONS). A default
/// constructed field is empty and invalid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowField {
    width: i32,
    height: i32,
    dist: Vec<f32>,
    dir: Vec<u8>,
}

impl FlowField {
    /// Multi-source Dijkstra from every in-bounds, unblocked target.
    ///
    /// Steps cost like A\* steps (step length × move cost of the cell
    /// entered) plus `extra_weight × extra[cell]` when an extra scalar field
    /// is given; cells past the end of `extra` add nothing. Diagonal steps
    /// never cut blocked corners.
    pub fn from_targets(
        grid: &NavGrid,
        targets: &[Point],
        diagonal: bool,
        extra: Option<&[f32]>,
        extra_weight: f32,
    ) -> Self {
        let len = grid.len();
        let mut ff = Self {
            width: grid.width(),
            height: grid.height(),
            dist: vec![f32::INFINITY; len],
            dir: vec![NO_DIRECTION; len],
        };
        let steps = GridSteps::new(grid, diagonal, false);
        let mut open = BinaryHeap::new();

        for &t in targets {
            if grid.is_blocked(t) {
                continue;
            }
            if let Some(i) = grid.index(t) {
                ff.dist[i] = 0.0;
                open.push(NodeRef { idx: i, f: 0.0, seq: 0 });
            }
        }

        while let Some(NodeRef { idx, f, .. }) = open.pop() {
            if f > ff.dist[idx] {
                continue;
            }
            let p = grid.point(idx);
            for &d in steps.directions() {
                if !steps.can_step(p, d) {
                    continue;
                }
                let n = p + d;
                let Some(ni) = grid.index(n) else {
                    continue;
                };
                let mut add = steps.step_cost(p, d);
                if let Some(v) = extra.and_then(|e| e.get(ni)) {
                    add += extra_weight * v;
                }
                let nd = f + add;
                if nd + EPS < ff.dist[ni] {
                    ff.dist[ni] = nd;
                    open.push(NodeRef { idx: ni, f: nd, seq: 0 });
                }
            }
        }

        ff.fill_directions(&steps);
        ff
    }

    /// A new field with `dist' = w_base × dist + w_hazard × hazard`, and
    /// directions recomputed on the blended values.
    ///
    /// Unreached cells stay unreached. A hazard slice shorter than the field
    /// is padded with zeros. Blending an invalid field, or a field computed
    /// for a grid of other dimensions, returns a copy of it.
    pub fn blended(
        &self,
        grid: &NavGrid,
        hazard: &[f32],
        w_base: f32,
        w_hazard: f32,
        diagonal: bool,
    ) -> Self {
        if !self.is_valid() {
            return self.clone();
        }
        if self.width != grid.width() || self.height != grid.height() {
            log::warn!(
                "not blending a {}x{} flow field on a {}x{} grid",
                self.width,
                self.height,
                grid.width(),
                grid.height()
            );
            return self.clone();
        }
        if hazard.len() < self.dist.len() {
            log::warn!(
                "blending flow field of {} cells with hazard of {}; padding with zeros",
                self.dist.len(),
                hazard.len()
            );
        }
        let dist = self
            .dist
            .iter()
            .enumerate()
            .map(|(i, &d)| {
                if d.is_infinite() {
                    d
                } else {
                    w_base * d + w_hazard * hazard.get(i).copied().unwrap_or(0.0)
                }
            })
            .collect();
        let mut ff = Self {
            width: self.width,
            height: self.height,
            dist,
            dir: vec![NO_DIRECTION; self.dist.len()],
        };
        ff.fill_directions(&GridSteps::new(grid, diagonal, false));
        ff
    }

    /// Point every cell at its legal neighbor with the strictly smallest
    /// distance.
    fn fill_directions(&mut self, steps: &GridSteps<'_>) {
        let grid = steps.grid();
        for i in 0..self.dist.len() {
            let p = grid.point(i);
            if grid.is_blocked(p) {
                self.dir[i] = NO_DIRECTION;
                continue;
            }
            let mut best = self.dist[i];
            let mut best_k = NO_DIRECTION;
            for (k, &d) in steps.directions().iter().enumerate() {
                if !steps.can_step(p, d) {
                    continue;
                }
                let v = self.dist_at(p + d);
                if v + EPS < best {
                    best = v;
                    best_k = k as u8;
                }
            }
            self.dir[i] = best_k;
        }
    }

    /// Whether the field holds data for a grid.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && self.dist.len() == (self.width * self.height) as usize
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.height
    }

    #[inline]
    fn index(&self, p: Point) -> Option<usize> {
        if (p.x as u32) < (self.width as u32) && (p.y as u32) < (self.height as u32) {
            Some(p.y as usize * self.width as usize + p.x as usize)
        } else {
            None
        }
    }

    /// Cost from `p` to the nearest target; infinite when unreached or
    /// outside the field.
    pub fn dist_at(&self, p: Point) -> f32 {
        self.index(p)
            .and_then(|i| self.dist.get(i).copied())
            .unwrap_or(f32::INFINITY)
    }

    /// Direction index at `p`, or [`NO_DIRECTION`].
    pub fn dir_at(&self, p: Point) -> u8 {
        self.index(p)
            .and_then(|i| self.dir.get(i).copied())
            .unwrap_or(NO_DIRECTION)
    }

    pub fn distances(&self) -> &[f32] {
        &self.dist
    }

    pub fn directions(&self) -> &[u8] {
        &self.dir
    }

    /// The cell one step along the field from `p`; `p` itself when it has
    /// no direction.
    pub fn step(&self, p: Point) -> Point {
        match DIRECTIONS.get(self.dir_at(p) as usize) {
            Some(&d) => p + d,
            None => p,
        }
    }

    /// Central-difference gradient of the distance at `p`, for continuous
    /// steering. `None` on the border, outside the field, or for an invalid
    /// field.
    pub fn sample_gradient(&self, p: Point) -> Option<(f32, f32)> {
        if !self.is_valid() || p.x <= 0 || p.y <= 0 || p.x >= self.width - 1 || p.y >= self.height - 1 {
            return None;
        }
        let gx = 0.5 * (self.dist_at(p.shift(1, 0)) - self.dist_at(p.shift(-1, 0)));
        let gy = 0.5 * (self.dist_at(p.shift(0, 1)) - self.dist_at(p.shift(0, -1)));
        Some((gx, gy))
    }
}
