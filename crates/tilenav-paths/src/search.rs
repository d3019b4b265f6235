//! Search results and the reusable node storage behind the best-first
//! searches.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tilenav_core::{NavGrid, Point};

/// Outcome of a path query.
///
/// `path` runs from start to goal inclusive. A failed query has
/// `success == false`, zero cost and an empty path. A search stopped by its
/// expansion cap reports `success == true` with a path that may end short of
/// the goal.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PathResult {
    pub success: bool,
    /// Σ step length × move cost of the cell stepped onto.
    pub cost: f32,
    pub path: Vec<Point>,
}

impl PathResult {
    /// A failed query.
    pub fn failure() -> Self {
        Self::default()
    }

    /// The trivial path of a query whose start is its goal.
    pub fn single(p: Point) -> Self {
        Self {
            success: true,
            cost: 0.0,
            path: vec![p],
        }
    }

    /// The last cell of the path, if any.
    pub fn end(&self) -> Option<Point> {
        self.path.last().copied()
    }
}

pub(crate) const NO_PARENT: usize = usize::MAX;

#[derive(Clone)]
pub(crate) struct Node {
    pub(crate) g: f32,
    pub(crate) parent: usize,
    pub(crate) generation: u32,
    pub(crate) closed: bool,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            g: f32::INFINITY,
            parent: NO_PARENT,
            generation: 0,
            closed: false,
        }
    }
}

/// Open-list entry ordered so that `BinaryHeap` pops the smallest `f`
/// first, and among equal `f` the most recently pushed entry.
#[derive(Clone, Copy, Debug)]
pub(crate) struct NodeRef {
    pub(crate) idx: usize,
    pub(crate) f: f32,
    pub(crate) seq: u64,
}

impl Ord for NodeRef {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for NodeRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for NodeRef {}

/// Node storage and open list reused across searches.
///
/// Nodes are stamped with a generation number, so starting a new search
/// only bumps the generation instead of clearing the array.
pub(crate) struct SearchSpace {
    nodes: Vec<Node>,
    generation: u32,
    open: BinaryHeap<NodeRef>,
    seq: u64,
    deterministic: bool,
    /// Nodes expanded by the last search.
    pub(crate) expansions: u64,
    /// Open-list pushes of the last search.
    pub(crate) pushes: u64,
}

impl SearchSpace {
    pub(crate) fn new(deterministic: bool) -> Self {
        Self {
            nodes: Vec::new(),
            generation: 0,
            open: BinaryHeap::new(),
            seq: 0,
            deterministic,
            expansions: 0,
            pushes: 0,
        }
    }

    /// Prepare for a new search over `len` cells.
    pub(crate) fn begin(&mut self, len: usize) {
        if self.nodes.len() != len {
            self.nodes.clear();
            self.nodes.resize(len, Node::default());
            self.generation = 0;
        }
        self.generation = self.generation.wrapping_add(1);
        if self.generation == 0 {
            for n in &mut self.nodes {
                n.generation = 0;
            }
            self.generation = 1;
        }
        self.open.clear();
        self.seq = 0;
        self.expansions = 0;
        self.pushes = 0;
    }

    /// The node at `idx`, reset first if it belongs to an older search.
    #[inline]
    pub(crate) fn node(&mut self, idx: usize) -> &mut Node {
        let generation = self.generation;
        let n = &mut self.nodes[idx];
        if n.generation != generation {
            *n = Node {
                generation,
                ..Node::default()
            };
        }
        n
    }

    #[inline]
    pub(crate) fn push(&mut self, idx: usize, f: f32) {
        self.seq += 1;
        let seq = if self.deterministic { self.seq } else { 0 };
        self.open.push(NodeRef { idx, f, seq });
        self.pushes += 1;
    }

    /// Pop the best open node that is not closed yet, and close it.
    pub(crate) fn pop(&mut self) -> Option<usize> {
        while let Some(r) = self.open.pop() {
            let n = self.node(r.idx);
            if n.closed {
                continue;
            }
            n.closed = true;
            self.expansions += 1;
            return Some(r.idx);
        }
        None
    }

    /// Walk parent links back from `idx` to the search root.
    pub(crate) fn trace(&self, grid: &NavGrid, idx: usize) -> Vec<Point> {
        let mut path = Vec::new();
        let mut ci = idx;
        while ci != NO_PARENT {
            path.push(grid.point(ci));
            ci = self.nodes[ci].parent;
        }
        path.reverse();
        path
    }

    /// Successful result ending at `idx`.
    pub(crate) fn result(&self, grid: &NavGrid, idx: usize) -> PathResult {
        PathResult {
            success: true,
            cost: self.nodes[idx].g,
            path: self.trace(grid, idx),
        }
    }
}
