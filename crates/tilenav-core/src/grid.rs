//! The mutable navigation grid.
//!
//! [`NavGrid`] stores, for every cell, whether it is blocked and how much it
//! costs to step onto it. Every effective mutation bumps a monotonically
//! increasing [`revision`](NavGrid::revision), which is the only invalidation
//! signal the planners use.
//!
//! ## Wire format
//!
//! ```text
//! [width: i32 LE]
//! [height: i32 LE]
//! [revision: u64 LE]
//! [ever_non_unit_cost: u8]
//! [blocked: u8 × width*height]
//! [move_cost: u16 LE × width*height]
//! ```
//!
//! No version tag is embedded.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::geom::{Point, Range};

static NEXT_GRID_ID: AtomicU64 = AtomicU64::new(1);

/// Largest cell count [`NavGrid::deserialize`] accepts.
pub const MAX_CELLS: usize = 1 << 28;

/// Process-unique identity of a grid's contents.
///
/// A new identity is handed out whenever a grid is created, reset, cloned or
/// deserialized, so planners can detect that the grid they were attached to
/// has been replaced.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct GridId(u64);

impl GridId {
    fn fresh() -> Self {
        Self(NEXT_GRID_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A rectangular grid of blocked flags and per-cell move costs.
#[derive(Debug)]
pub struct NavGrid {
    width: i32,
    height: i32,
    blocked: Vec<bool>,
    cost: Vec<u16>,
    revision: u64,
    ever_non_unit_cost: bool,
    id: GridId,
}

impl Default for NavGrid {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl Clone for NavGrid {
    fn clone(&self) -> Self {
        Self {
            width: self.width,
            height: self.height,
            blocked: self.blocked.clone(),
            cost: self.cost.clone(),
            revision: self.revision,
            ever_non_unit_cost: self.ever_non_unit_cost,
            id: GridId::fresh(),
        }
    }
}

impl NavGrid {
    /// Create an open grid: nothing blocked, every cost 1, revision 1.
    ///
    /// Dimensions are clamped to at least 1.
    pub fn new(width: i32, height: i32) -> Self {
        let mut grid = Self {
            width: 1,
            height: 1,
            blocked: Vec::new(),
            cost: Vec::new(),
            revision: 1,
            ever_non_unit_cost: false,
            id: GridId::fresh(),
        };
        grid.reset(width, height);
        grid
    }

    /// Reallocate to `width` × `height`, clearing all state.
    ///
    /// The revision restarts at 1 and the grid gets a new [`GridId`], so any
    /// planner attached to it must be re-attached.
    pub fn reset(&mut self, width: i32, height: i32) {
        self.width = width.max(1);
        self.height = height.max(1);
        let len = self.len();
        self.blocked.clear();
        self.blocked.resize(len, false);
        self.cost.clear();
        self.cost.resize(len, 1);
        self.revision = 1;
        self.ever_non_unit_cost = false;
        self.id = GridId::fresh();
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
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// The grid rectangle `[0, width) × [0, height)`.
    #[inline]
    pub fn bounds(&self) -> Range {
        Range::new(0, 0, self.width, self.height)
    }

    #[inline]
    pub fn id(&self) -> GridId {
        self.id
    }

    /// Revision counter; strictly increases on every effective mutation.
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// True while no cost other than 1 has ever been set on this grid.
    ///
    /// The flag behind it is sticky: resetting a cell back to cost 1 does
    /// not make the grid uniform again.
    #[inline]
    pub fn uniform_cost_ever(&self) -> bool {
        !self.ever_non_unit_cost
    }

    /// Whether `p` lies inside the grid.
    #[inline]
    pub fn in_bounds(&self, p: Point) -> bool {
        (p.x as u32) < (self.width as u32) && (p.y as u32) < (self.height as u32)
    }

    /// Flat row-major index of `p`. Returns `None` if out of bounds.
    #[inline]
    pub fn index(&self, p: Point) -> Option<usize> {
        if !self.in_bounds(p) {
            return None;
        }
        Some(p.y as usize * self.width as usize + p.x as usize)
    }

    #[inline]
    pub fn point(&self, idx: usize) -> Point {
        let w = self.width as usize;
        Point::new((idx % w) as i32, (idx / w) as i32)
    }

    /// Whether `p` is blocked. Cells outside the grid count as blocked.
    #[inline]
    pub fn is_blocked(&self, p: Point) -> bool {
        match self.index(p) {
            Some(i) => self.blocked[i],
            None => true,
        }
    }

    /// In bounds and not blocked.
    #[inline]
    pub fn is_passable(&self, p: Point) -> bool {
        !self.is_blocked(p)
    }

    /// Cost of stepping onto `p` (always ≥ 1).
    ///
    /// # Panics
    ///
    /// Panics if `p` is outside the grid.
    #[inline]
    pub fn move_cost(&self, p: Point) -> u16 {
        match self.index(p) {
            Some(i) => self.cost[i],
            None => panic!("move_cost queried outside the grid at {p}"),
        }
    }

    /// Set the blocked flag of `p`.
    ///
    /// Returns whether the stored value changed (and therefore whether the
    /// revision was bumped). Out-of-bounds cells are ignored.
    pub fn set_blocked(&mut self, p: Point, blocked: bool) -> bool {
        let Some(i) = self.index(p) else {
            return false;
        };
        if self.blocked[i] == blocked {
            return false;
        }
        self.blocked[i] = blocked;
        self.revision += 1;
        true
    }

    /// Set the move cost of `p`, clamped to at least 1.
    ///
    /// Returns whether the stored value changed. Any cost other than 1 marks
    /// the grid as having carried weighted cells, permanently.
    pub fn set_move_cost(&mut self, p: Point, cost: u16) -> bool {
        let Some(i) = self.index(p) else {
            return false;
        };
        let cost = cost.max(1);
        if self.cost[i] == cost {
            return false;
        }
        self.cost[i] = cost;
        self.revision += 1;
        if cost != 1 {
            self.ever_non_unit_cost = true;
        }
        true
    }

    // -----------------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------------

    /// Write the grid in the binary format described in the module docs.
    pub fn serialize<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.width.to_le_bytes())?;
        w.write_all(&self.height.to_le_bytes())?;
        w.write_all(&self.revision.to_le_bytes())?;
        w.write_all(&[self.ever_non_unit_cost as u8])?;
        let blocked: Vec<u8> = self.blocked.iter().map(|&b| b as u8).collect();
        w.write_all(&blocked)?;
        let mut costs = Vec::with_capacity(self.cost.len() * 2);
        for c in &self.cost {
            costs.extend_from_slice(&c.to_le_bytes());
        }
        w.write_all(&costs)
    }

    /// Replace the grid with one read from `r`.
    ///
    /// The whole stream is read and checked before anything is replaced, so
    /// on error the grid is left as it was. Grids over [`MAX_CELLS`] cells
    /// are rejected with [`io::ErrorKind::InvalidData`].
    pub fn deserialize<R: Read>(&mut self, r: &mut R) -> io::Result<()> {
        let width = read_i32(r)?;
        let height = read_i32(r)?;
        let mut rev = [0u8; 8];
        r.read_exact(&mut rev)?;
        let mut flag = [0u8; 1];
        r.read_exact(&mut flag)?;
        let len = (width >= 1 && height >= 1)
            .then(|| (width as usize).checked_mul(height as usize))
            .flatten()
            .filter(|&n| n <= MAX_CELLS)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("invalid grid dimensions {width}x{height}"),
                )
            })?;

        let blocked = read_bytes(r, len)?;
        let costs = read_bytes(r, len * 2)?;

        self.reset(width, height);
        self.revision = u64::from_le_bytes(rev);
        self.ever_non_unit_cost = flag[0] != 0;
        for (dst, b) in self.blocked.iter_mut().zip(blocked) {
            *dst = b != 0;
        }
        for (dst, c) in self.cost.iter_mut().zip(costs.chunks_exact(2)) {
            *dst = u16::from_le_bytes([c[0], c[1]]).max(1);
        }
        Ok(())
    }
}

fn read_i32<R: Read>(r: &mut R) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

/// Exactly `len` bytes, growing the buffer only as data arrives.
fn read_bytes<R: Read>(r: &mut R, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    r.by_ref().take(len as u64).read_to_end(&mut buf)?;
    if buf.len() < len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("grid data ends after {} of {len} bytes", buf.len()),
        ));
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_grid_is_open_and_uniform() {
        let g = NavGrid::new(5, 4);
        assert_eq!(g.len(), 20);
        assert_eq!(g.revision(), 1);
        assert!(g.uniform_cost_ever());
        assert!(g.bounds().iter().all(|p| g.is_passable(p) && g.move_cost(p) == 1));
    }

    #[test]
    fn dimensions_are_clamped() {
        let g = NavGrid::new(0, -3);
        assert_eq!((g.width(), g.height()), (1, 1));
    }

    #[test]
    fn revision_bumps_only_on_change() {
        let mut g = NavGrid::new(4, 4);
        let p = Point::new(1, 2);
        assert!(g.set_blocked(p, true));
        assert_eq!(g.revision(), 2);
        assert!(!g.set_blocked(p, true));
        assert_eq!(g.revision(), 2);
        assert!(g.set_move_cost(p, 3));
        assert_eq!(g.revision(), 3);
        assert!(!g.set_move_cost(p, 3));
        assert_eq!(g.revision(), 3);
        // 0 clamps to 1, which is a change back from 3.
        assert!(g.set_move_cost(p, 0));
        assert_eq!(g.move_cost(p), 1);
        assert_eq!(g.revision(), 4);
        assert!(!g.set_move_cost(p, 1));
        assert_eq!(g.revision(), 4);
    }

    #[test]
    fn out_of_bounds_is_blocked_and_ignored() {
        let mut g = NavGrid::new(3, 3);
        assert!(g.is_blocked(Point::new(-1, 0)));
        assert!(g.is_blocked(Point::new(3, 0)));
        assert!(!g.set_blocked(Point::new(5, 5), true));
        assert!(!g.set_move_cost(Point::new(0, 9), 4));
        assert_eq!(g.revision(), 1);
    }

    #[test]
    fn non_unit_cost_flag_is_sticky() {
        let mut g = NavGrid::new(3, 3);
        g.set_move_cost(Point::new(1, 1), 5);
        g.set_move_cost(Point::new(1, 1), 1);
        assert!(!g.uniform_cost_ever());
        g.reset(3, 3);
        assert!(g.uniform_cost_ever());
    }

    #[test]
    fn reset_and_clone_renew_identity() {
        let mut g = NavGrid::new(3, 3);
        let id = g.id();
        let copy = g.clone();
        assert_ne!(copy.id(), id);
        g.set_blocked(Point::new(0, 0), true);
        assert_eq!(g.id(), id);
        g.reset(3, 3);
        assert_ne!(g.id(), id);
        assert_eq!(g.revision(), 1);
    }

    #[test]
    fn index_point_roundtrip() {
        let g = NavGrid::new(7, 3);
        for p in g.bounds() {
            let i = g.index(p).unwrap();
            assert_eq!(g.point(i), p);
        }
        assert_eq!(g.index(Point::new(7, 0)), None);
    }

    #[test]
    fn serialize_roundtrip() {
        let mut g = NavGrid::new(6, 5);
        g.set_blocked(Point::new(2, 2), true);
        g.set_move_cost(Point::new(4, 1), 9);
        let mut buf = Vec::new();
        g.serialize(&mut buf).unwrap();
        assert_eq!(buf.len(), 4 + 4 + 8 + 1 + 30 + 60);

        let mut back = NavGrid::default();
        back.deserialize(&mut buf.as_slice()).unwrap();
        assert_eq!((back.width(), back.height()), (6, 5));
        assert_eq!(back.revision(), g.revision());
        assert!(!back.uniform_cost_ever());
        assert!(back.is_blocked(Point::new(2, 2)));
        assert_eq!(back.move_cost(Point::new(4, 1)), 9);
        assert_ne!(back.id(), g.id());
    }

    #[test]
    fn deserialize_truncated_stream_fails() {
        let g = NavGrid::new(4, 4);
        let mut buf = Vec::new();
        g.serialize(&mut buf).unwrap();
        buf.truncate(buf.len() - 3);
        let mut back = NavGrid::default();
        let err = back.deserialize(&mut buf.as_slice()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    fn header(width: i32, height: i32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&width.to_le_bytes());
        buf.extend_from_slice(&height.to_le_bytes());
        buf.extend_from_slice(&7u64.to_le_bytes());
        buf.push(0);
        buf
    }

    #[test]
    fn oversized_header_is_rejected() {
        let mut buf = header(i32::MAX, i32::MAX);
        buf.extend_from_slice(&[0; 9]);
        let mut back = NavGrid::new(3, 2);
        let err = back.deserialize(&mut buf.as_slice()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!((back.width(), back.height()), (3, 2));
    }

    #[test]
    fn large_header_with_short_body_fails_cleanly() {
        let mut buf = header(10_000, 10_000);
        buf.extend_from_slice(&[1; 9]);
        let mut back = NavGrid::new(3, 2);
        back.set_blocked(Point::new(1, 1), true);
        let id = back.id();
        let err = back.deserialize(&mut buf.as_slice()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert_eq!((back.width(), back.height(), back.revision()), (3, 2, 2));
        assert!(back.is_blocked(Point::new(1, 1)));
        assert_eq!(back.id(), id);
    }

    #[test]
    fn deserialize_rejects_bad_dimensions() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0i32.to_le_bytes());
        buf.extend_from_slice(&4i32.to_le_bytes());
        buf.extend_from_slice(&1u64.to_le_bytes());
        buf.push(0);
        let mut back = NavGrid::default();
        let err = back.deserialize(&mut buf.as_slice()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
