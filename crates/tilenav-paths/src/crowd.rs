//! Decaying occupancy density for local crowd avoidance.

use tilenav_core::{NavGrid, Point};

use crate::rng::TieBreakRng;

/// Density reported for cells outside the field.
pub const OUTSIDE_DENSITY: f32 = 1e9;

/// Default per-frame decay factor.
pub const DEFAULT_DECAY: f32 = 0.85;

/// Per-cell occupancy density that decays every frame.
///
/// Agents stamp the cells they occupy; [`begin_frame`](Self::begin_frame)
/// multiplies everything by the decay factor. The field is independent of
/// any grid and must be [`reset`](Self::reset) when the map size changes.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CrowdField {
    width: i32,
    height: i32,
    density: Vec<f32>,
    decay: f32,
}

impl Default for CrowdField {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl CrowdField {
    pub fn new(width: i32, height: i32) -> Self {
        let mut cf = Self {
            width: 0,
            height: 0,
            density: Vec::new(),
            decay: DEFAULT_DECAY,
        };
        cf.reset(width, height);
        cf
    }

    /// Use `decay` as the per-frame factor instead of [`DEFAULT_DECAY`].
    pub fn with_decay(mut self, decay: f32) -> Self {
        self.decay = decay;
        self
    }

    /// Resize to `width` × `height` and clear all density.
    pub fn reset(&mut self, width: i32, height: i32) {
        self.width = width.max(0);
        self.height = height.max(0);
        self.density.clear();
        self.density.resize(self.width as usize * self.height as usize, 0.0);
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
    pub fn decay(&self) -> f32 {
        self.decay
    }

    #[inline]
    fn index(&self, p: Point) -> Option<usize> {
        if (p.x as u32) < (self.width as u32) && (p.y as u32) < (self.height as u32) {
            Some(p.y as usize * self.width as usize + p.x as usize)
        } else {
            None
        }
    }

    pub fn begin_frame(&mut self) {
        let decay = self.decay;
        for v in &mut self.density {
            *v *= decay;
        }
    }

    /// Add `amount` of occupancy at `p`. Ignored outside the field.
    pub fn stamp(&mut self, p: Point, amount: f32) {
        if let Some(i) = self.index(p) {
            self.density[i] += amount;
        }
    }

    /// Density at `p`, or [`OUTSIDE_DENSITY`] outside the field.
    pub fn at(&self, p: Point) -> f32 {
        self.index(p).map_or(OUTSIDE_DENSITY, |i| self.density[i])
    }
}

/// Pick the next cell for an agent at `current` that wants to move to the
/// adjacent cell `desired`, steering away from crowded cells.
///
/// Five candidates are scored: the desired cell, the two axis-aligned
/// partial steps toward it, and the two diagonals that swerve sideways. The
/// score is the squared distance to `desired` plus `density_weight` times
/// the crowd density, plus a jitter in `[0, jitter)` drawn from `rng`.
/// Candidates are visited by ascending score (ties keep the order above)
/// and the first one inside the grid, unblocked and different from
/// `current` wins. Returns `current` when none qualifies.
pub(crate) fn avoid_crowd(
    grid: &NavGrid,
    current: Point,
    desired: Point,
    field: &CrowdField,
    density_weight: f32,
    rng: &mut TieBreakRng,
    jitter: f32,
) -> Point {
    let s = (desired - current).signum();
    let candidates = [
        desired,
        current.shift(s.x, 0),
        current.shift(0, s.y),
        current.shift(s.x, -s.y),
        current.shift(-s.x, s.y),
    ];
    let mut scored: Vec<(Point, f32)> = candidates
        .iter()
        .map(|&c| {
            let score = c.distance_squared(desired) as f32
                + density_weight * field.at(c)
                + rng.jitter(jitter);
            (c, score)
        })
        .collect();
    scored.sort_by(|a, b| a.1.total_cmp(&b.1));
    scored
        .into_iter()
        .map(|(c, _)| c)
        .find(|&c| c != current && grid.is_passable(c))
        .unwrap_or(current)
}


#[cfg(all(test, feature = "serde"))]
mod serde_tests {
    use super::*;

    #[test]
    fn crowd_round_trip() {
        let mut cf = CrowdField::new(3, 2);
        cf.stamp(Point::new(1, 1), 0.5);
        let json = serde_json::to_string(&cf).unwrap();
        let back: CrowdField = serde_json::from_str(&json).unwrap();
        assert_eq!(cf, back);
    }
}
