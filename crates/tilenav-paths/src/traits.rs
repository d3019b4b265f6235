use tilenav_core::Point;

/// Movement model shared by the grid searches.
///
/// A\*, D\*-Lite and the local searches of HPA\* only see the grid through
/// this trait, so a single implementation decides which steps are legal and
/// what they cost.
pub trait Traversal {
    /// Call `visit` once for every legal step out of `p`, with the cell
    /// reached and the cost of the step. Costs must be > 0.
    fn for_each_step(&self, p: Point, visit: &mut dyn FnMut(Point, f32));

    /// Estimate of the cost from `from` to `to`. Must never overestimate
    /// the true cost when the search is expected to be optimal.
    fn estimate(&self, from: Point, to: Point) -> f32;
}
