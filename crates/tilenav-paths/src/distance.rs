use tilenav_core::Point;

/// Length of a diagonal step.
pub const DIAG: f32 = 1.414_213_56;

/// Manhattan (L1) distance between two points.
#[inline]
pub fn manhattan(a: Point, b: Point) -> i32 {
    (a.x - b.x).abs() + (a.y - b.y).abs()
}

/// Chebyshev (L∞) distance between two points.
#[inline]
pub fn chebyshev(a: Point, b: Point) -> i32 {
    (a.x - b.x).abs().max((a.y - b.y).abs())
}

/// Octile distance: the cost of the shortest 8-connected walk on an open
/// unit-cost grid.
#[inline]
pub fn octile(a: Point, b: Point) -> f32 {
    let dx = (a.x - b.x).abs();
    let dy = (a.y - b.y).abs();
    let m = dx.min(dy);
    let big = dx.max(dy);
    m as f32 * DIAG + (big - m) as f32
}

/// Unweighted admissible estimate: octile when diagonal steps are allowed,
/// Manhattan otherwise.
#[inline]
pub fn heuristic(a: Point, b: Point, diagonal: bool) -> f32 {
    if diagonal {
        octile(a, b)
    } else {
        manhattan(a, b) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_metrics() {
        let a = Point::new(1, 1);
        let b = Point::new(4, 6);
        assert_eq!(manhattan(a, b), 8);
        assert_eq!(chebyshev(a, b), 5);
    }

    #[test]
    fn octile_mixes_diagonal_and_straight() {
        let d = octile(Point::new(0, 0), Point::new(3, 5));
        assert!((d - (3.0 * DIAG + 2.0)).abs() < 1e-5);
        assert_eq!(octile(Point::new(2, 2), Point::new(2, 2)), 0.0);
        assert_eq!(heuristic(Point::new(0, 0), Point::new(3, 5), false), 8.0);
    }
}
