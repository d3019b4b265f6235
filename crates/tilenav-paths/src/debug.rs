//! ASCII renderings of grids, paths and flow fields.

use tilenav_core::{NavGrid, Point};

use crate::flow::FlowField;

/// Glyphs for the flow directions, in [`DIRECTIONS`](crate::DIRECTIONS) order.
const ARROWS: [char; 8] = ['>', '<', 'v', '^', '\\', '/', '/', '\\'];

/// One line per row: `#` blocked, `*` on `path`, `.` otherwise.
pub fn dump_path(grid: &NavGrid, path: &[Point]) -> String {
    let mut out = String::with_capacity(grid.len() + grid.height() as usize);
    for y in 0..grid.height() {
        for x in 0..grid.width() {
            let p = Point::new(x, y);
            out.push(if grid.is_blocked(p) {
                '#'
            } else if path.contains(&p) {
                '*'
            } else {
                '.'
            });
        }
        out.push('\n');
    }
    out
}

/// One line per row: `#` blocked, an arrow for the cell's flow direction,
/// `.` for cells without one. Cells outside the field render as `.`; an
/// invalid field renders as an empty string.
pub fn dump_flow(grid: &NavGrid, field: &FlowField) -> String {
    if !field.is_valid() {
        return String::new();
    }
    let mut out = String::with_capacity(grid.len() + grid.height() as usize);
    for y in 0..grid.height() {
        for x in 0..grid.width() {
            let p = Point::new(x, y);
            let c = if grid.is_blocked(p) {
                '#'
            } else {
                ARROWS.get(field.dir_at(p) as usize).copied().unwrap_or('.')
            };
            out.push(c);
        }
        out.push('\n');
    }
    out
}
