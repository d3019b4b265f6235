//! Hierarchical path-finding (HPA\*).
//!
//! The grid is cut into square clusters. Every maximal run of cells that is
//! passable on both sides of a border between two clusters gets one portal
//! pair, placed at the middle of the run. Portals of the same cluster are
//! linked by their local A\* distance inside the cluster, and each portal
//! is linked to its peer across the border. A query searches this abstract
//! graph and then stitches the portal hops back into a cell path.
//!
//! The graph is rebuilt as a whole, never patched: see
//! [`Hpa::maybe_rebuild`].
//!
//! ## Wire format
//!
//! Structure only; edge weights are recomputed on load. All fields are
//! little-endian.
//!
//! ```text
//! [cluster_size: i32] [clusters_x: i32] [clusters_y: i32]
//! [cluster count: u32] { [x: i32] [y: i32] [w: i32] [h: i32] } × count
//! [node count: u32] { [id: u32] [x: i32] [y: i32] [cluster: u32] [peer: i32, -1 = none] } × count
//! { [portal count: u32] [node id: u32] × portal count } × cluster count
//! ```

use std::collections::BinaryHeap;
use std::io::{self, Read, Write};

use tilenav_core::{GridId, NavGrid, Point, Range};

use crate::distance;
use crate::neighbors::GridSteps;
use crate::params::SearchParams;
use crate::search::{NodeRef, PathResult, SearchSpace};

/// Smallest allowed cluster side.
pub const MIN_CLUSTER_SIZE: i32 = 4;

/// A portal: one side of a passable run crossing a cluster border.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PortalNode {
    pub id: usize,
    pub cell: Point,
    pub cluster: usize,
    /// The matching portal on the other side of the border.
    pub cross_peer: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    to: usize,
    w: f32,
}

/// Cluster/portal graph over a [`NavGrid`].
pub struct Hpa {
    built: bool,
    last_built_revision: u64,
    grid_id: Option<GridId>,
    width: i32,
    height: i32,
    cluster_size: i32,
    clusters_x: i32,
    clusters_y: i32,
    clusters: Vec<Range>,
    nodes: Vec<PortalNode>,
    adj: Vec<Vec<Edge>>,
    cluster_portals: Vec<Vec<usize>>,
    local: SearchSpace,
    /// Abstract nodes expanded by the last query.
    pub(crate) node_expansions: u64,
}

impl Default for Hpa {
    fn default() -> Self {
        Self::new()
    }
}

impl Hpa {
    pub fn new() -> Self {
        Self {
            built: false,
            last_built_revision: 0,
            grid_id: None,
            width: 0,
            height: 0,
            cluster_size: 16,
            clusters_x: 0,
            clusters_y: 0,
            clusters: Vec::new(),
            nodes: Vec::new(),
            adj: Vec::new(),
            cluster_portals: Vec::new(),
            local: SearchSpace::new(true),
            node_expansions: 0,
        }
    }

    /// Drop the graph; the next [`maybe_rebuild`](Self::maybe_rebuild)
    /// builds it again.
    pub fn invalidate(&mut self) {
        self.built = false;
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    pub fn cluster_size(&self) -> i32 {
        self.cluster_size
    }

    /// Cluster rectangles, row-major.
    pub fn clusters(&self) -> &[Range] {
        &self.clusters
    }

    /// Portal nodes, indexed by id.
    pub fn nodes(&self) -> &[PortalNode] {
        &self.nodes
    }

    /// Ids of the portals lying in cluster `cluster`.
    pub fn cluster_portals(&self, cluster: usize) -> &[usize] {
        self.cluster_portals.get(cluster).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Revision of the grid when the graph was last built or loaded.
    pub fn last_built_revision(&self) -> u64 {
        self.last_built_revision
    }

    fn same_grid(&self, grid: &NavGrid) -> bool {
        self.grid_id == Some(grid.id()) && self.width == grid.width() && self.height == grid.height()
    }

    /// Rebuild the graph if it was never built, if `cluster_size` (clamped
    /// to [`MIN_CLUSTER_SIZE`]) differs from the built one, if `grid` is not
    /// the grid it was built from, or if the grid revision advanced by at
    /// least `rebuild_threshold` since the last build. Returns whether a
    /// rebuild happened.
    pub fn maybe_rebuild(&mut self, grid: &NavGrid, cluster_size: i32, rebuild_threshold: u64) -> bool {
        let cluster_size = cluster_size.max(MIN_CLUSTER_SIZE);
        let need = !self.built
            || cluster_size != self.cluster_size
            || !self.same_grid(grid)
            || grid.revision().saturating_sub(self.last_built_revision) >= rebuild_threshold;
        if need {
            self.build(grid, cluster_size);
        }
        need
    }

    fn build(&mut self, grid: &NavGrid, cluster_size: i32) {
        self.cluster_size = cluster_size;
        (self.clusters_x, self.clusters_y) = layout(grid, cluster_size);
        self.clusters.clear();
        for cy in 0..self.clusters_y {
            for cx in 0..self.clusters_x {
                self.clusters.push(cluster_rect(grid, cluster_size, cx, cy));
            }
        }
        self.nodes.clear();
        self.cluster_portals.clear();
        self.cluster_portals.resize(self.clusters.len(), Vec::new());
        self.extract_portals(grid);
        self.rebuild_adjacency(grid);
        self.mark_built(grid);
        log::debug!(
            "hpa rebuilt: {} clusters of {}, {} portals, rev {}",
            self.clusters.len(),
            cluster_size,
            self.nodes.len(),
            grid.revision()
        );
    }

    fn mark_built(&mut self, grid: &NavGrid) {
        self.built = true;
        self.last_built_revision = grid.revision();
        self.grid_id = Some(grid.id());
        self.width = grid.width();
        self.height = grid.height();
    }

    fn cluster_id(&self, cx: i32, cy: i32) -> Option<usize> {
        if cx < 0 || cy < 0 || cx >= self.clusters_x || cy >= self.clusters_y {
            return None;
        }
        Some((cy * self.clusters_x + cx) as usize)
    }

    /// The cluster containing `p`.
    pub fn cluster_of(&self, p: Point) -> Option<usize> {
        if self.clusters.is_empty() || p.x < 0 || p.y < 0 {
            return None;
        }
        let id = self.cluster_id(
            (p.x / self.cluster_size).min(self.clusters_x - 1),
            (p.y / self.cluster_size).min(self.clusters_y - 1),
        )?;
        self.clusters.get(id).filter(|r| r.contains(p)).map(|_| id)
    }

    fn add_portal_pair(&mut self, a: Point, ca: usize, b: Point, cb: usize) {
        let ia = self.nodes.len();
        let ib = ia + 1;
        self.nodes.push(PortalNode {
            id: ia,
            cell: a,
            cluster: ca,
            cross_peer: Some(ib),
        });
        self.nodes.push(PortalNode {
            id: ib,
            cell: b,
            cluster: cb,
            cross_peer: Some(ia),
        });
        self.cluster_portals[ca].push(ia);
        self.cluster_portals[cb].push(ib);
    }

    /// Scan one border. `at(i)` gives the cell pair facing each other at
    /// offset `i` along the border.
    fn scan_border(
        &mut self,
        grid: &NavGrid,
        len: i32,
        ca: usize,
        cb: usize,
        at: impl Fn(i32) -> (Point, Point),
    ) {
        let mut run_start = None;
        for i in 0..len {
            let (a, b) = at(i);
            let ok = grid.is_passable(a) && grid.is_passable(b);
            if ok && run_start.is_none() {
                run_start = Some(i);
            }
            if !ok || i == len - 1 {
                if let Some(s) = run_start.take() {
                    let end = if ok { i } else { i - 1 };
                    let (pa, pb) = at((s + end) / 2);
                    self.add_portal_pair(pa, ca, pb, cb);
                }
            }
        }
    }

    fn extract_portals(&mut self, grid: &NavGrid) {
        // Borders between vertically adjacent clusters.
        for cy in 0..self.clusters_y - 1 {
            for cx in 0..self.clusters_x {
                let (Some(a), Some(b)) = (self.cluster_id(cx, cy), self.cluster_id(cx, cy + 1)) else {
                    continue;
                };
                let ra = self.clusters[a];
                let top = ra.max.y - 1;
                let bottom = self.clusters[b].min.y;
                self.scan_border(grid, ra.width(), a, b, |i| {
                    (Point::new(ra.min.x + i, top), Point::new(ra.min.x + i, bottom))
                });
            }
        }
        // Borders between horizontally adjacent clusters.
        for cy in 0..self.clusters_y {
            for cx in 0..self.clusters_x - 1 {
                let (Some(a), Some(b)) = (self.cluster_id(cx, cy), self.cluster_id(cx + 1, cy)) else {
                    continue;
                };
                let ra = self.clusters[a];
                let right = ra.max.x - 1;
                let left = self.clusters[b].min.x;
                self.scan_border(grid, ra.height(), a, b, |i| {
                    (Point::new(right, ra.min.y + i), Point::new(left, ra.min.y + i))
                });
            }
        }
    }

    fn rebuild_adjacency(&mut self, grid: &NavGrid) {
        self.adj.clear();
        self.adj.resize(self.nodes.len(), Vec::new());

        for n in &self.nodes {
            let Some(peer) = n.cross_peer else {
                continue;
            };
            if peer < n.id {
                continue;
            }
            // One orthogonal step; the cheaper side's cost in both directions.
            let w = grid.move_cost(n.cell).min(grid.move_cost(self.nodes[peer].cell)) as f32;
            self.adj[n.id].push(Edge { to: peer, w });
            self.adj[peer].push(Edge { to: n.id, w });
        }

        for (cid, bounds) in self.clusters.iter().enumerate() {
            let steps = GridSteps::new(grid, true, false).clipped(*bounds);
            let portals = &self.cluster_portals[cid];
            for (i, &a) in portals.iter().enumerate() {
                for &b in &portals[i + 1..] {
                    let r = self.local.astar(grid, &steps, self.nodes[a].cell, self.nodes[b].cell, 0);
                    if r.success {
                        self.adj[a].push(Edge { to: b, w: r.cost });
                        self.adj[b].push(Edge { to: a, w: r.cost });
                    }
                }
            }
        }
    }

    /// Path from `start` to `goal` over the abstract graph.
    ///
    /// Fails when the graph is not built for `grid`, when either end is
    /// blocked or outside the grid, or when the abstract search or the
    /// stitching finds no route. The caller is expected to fall back to a
    /// flat search on failure.
    pub fn find_path(&mut self, grid: &NavGrid, start: Point, goal: Point, params: &SearchParams) -> PathResult {
        self.node_expansions = 0;
        if !self.built || !self.same_grid(grid) {
            return PathResult::failure();
        }
        if !grid.is_passable(start) || !grid.is_passable(goal) {
            return PathResult::failure();
        }
        if start == goal {
            return PathResult::single(start);
        }
        let (Some(sc), Some(gc)) = (self.cluster_of(start), self.cluster_of(goal)) else {
            return PathResult::failure();
        };

        let query = GridSteps::new(grid, params.allow_diagonal, params.allow_corner_cutting);

        // Transient links: start -> portals of its cluster, portals of the
        // goal cluster -> goal, and start -> goal inside a shared cluster.
        let mut from_start = Vec::new();
        let steps = query.clipped(self.clusters[sc]);
        for &p in &self.cluster_portals[sc] {
            let r = self.local.astar(grid, &steps, start, self.nodes[p].cell, 0);
            if r.success {
                from_start.push(Edge { to: p, w: r.cost });
            }
        }
        let mut to_goal = Vec::new();
        let steps = query.clipped(self.clusters[gc]);
        for &p in &self.cluster_portals[gc] {
            let r = self.local.astar(grid, &steps, self.nodes[p].cell, goal, 0);
            if r.success {
                to_goal.push(Edge { to: p, w: r.cost });
            }
        }
        let base = self.nodes.len();
        let (start_node, goal_node) = (base, base + 1);
        if sc == gc {
            let r = self.local.astar(grid, &steps, start, goal, 0);
            if r.success {
                from_start.push(Edge { to: goal_node, w: r.cost });
            }
        }

        let Some(route) = self.abstract_search(start, goal, &from_start, &to_goal, params.heuristic_weight)
        else {
            return PathResult::failure();
        };
        let cells: Vec<Point> = route
            .iter()
            .map(|&id| match id {
                _ if id == start_node => start,
                _ if id == goal_node => goal,
                _ => self.nodes[id].cell,
            })
            .collect();
        self.stitch(grid, &query, &cells)
    }

    /// A\* over the portal graph plus the two transient nodes. Returns the
    /// node sequence from start to goal.
    fn abstract_search(
        &mut self,
        start: Point,
        goal: Point,
        from_start: &[Edge],
        to_goal: &[Edge],
        weight: f32,
    ) -> Option<Vec<usize>> {
        let base = self.nodes.len();
        let (start_node, goal_node) = (base, base + 1);
        let total = base + 2;
        let cell = |id: usize| match id {
            _ if id == start_node => start,
            _ if id == goal_node => goal,
            _ => self.nodes[id].cell,
        };
        let h = |id: usize| weight * distance::octile(cell(id), goal);

        let mut g = vec![f32::INFINITY; total];
        let mut parent = vec![usize::MAX; total];
        let mut closed = vec![false; total];
        let mut open = BinaryHeap::new();
        let mut seq = 0u64;
        g[start_node] = 0.0;
        open.push(NodeRef {
            idx: start_node,
            f: h(start_node),
            seq,
        });

        let mut found = false;
        while let Some(NodeRef { idx: u, .. }) = open.pop() {
            if closed[u] {
                continue;
            }
            closed[u] = true;
            self.node_expansions += 1;
            if u == goal_node {
                found = true;
                break;
            }
            let edges: &[Edge] = if u == start_node { from_start } else { &self.adj[u] };
            let goal_link = to_goal.iter().find(|e| e.to == u).map(|e| Edge {
                to: goal_node,
                w: e.w,
            });
            for e in edges.iter().copied().chain(goal_link) {
                if closed[e.to] {
                    continue;
                }
                let cand = g[u] + e.w;
                if cand < g[e.to] {
                    g[e.to] = cand;
                    parent[e.to] = u;
                    seq += 1;
                    open.push(NodeRef {
                        idx: e.to,
                        f: cand + h(e.to),
                        seq,
                    });
                }
            }
        }
        if !found {
            return None;
        }
        let mut route = Vec::new();
        let mut cur = goal_node;
        while cur != usize::MAX {
            route.push(cur);
            cur = parent[cur];
        }
        route.reverse();
        Some(route)
    }

    /// Expand a sequence of abstract waypoints into a contiguous path.
    fn stitch(&mut self, grid: &NavGrid, query: &GridSteps<'_>, cells: &[Point]) -> PathResult {
        let Some(&first) = cells.first() else {
            return PathResult::failure();
        };
        let mut out = PathResult {
            success: true,
            cost: 0.0,
            path: vec![first],
        };
        for w in cells.windows(2) {
            let (cur, next) = (w[0], w[1]);
            let (Some(cc), Some(nc)) = (self.cluster_of(cur), self.cluster_of(next)) else {
                return PathResult::failure();
            };
            if cc != nc && distance::manhattan(cur, next) == 1 {
                if !grid.is_passable(next) {
                    return PathResult::failure();
                }
                out.path.push(next);
                out.cost += grid.move_cost(next) as f32;
                continue;
            }
            let steps = query.clipped(self.clusters[cc]);
            let seg = self.local.astar(grid, &steps, cur, next, 0);
            if !seg.success {
                return PathResult::failure();
            }
            out.path.extend_from_slice(&seg.path[1..]);
            out.cost += seg.cost;
        }
        out
    }

    // -----------------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------------

    /// Write the cluster/portal structure in the format described in the
    /// module docs.
    pub fn serialize<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.cluster_size.to_le_bytes())?;
        w.write_all(&self.clusters_x.to_le_bytes())?;
        w.write_all(&self.clusters_y.to_le_bytes())?;
        write_u32(w, self.clusters.len())?;
        for c in &self.clusters {
            for v in [c.min.x, c.min.y, c.width(), c.height()] {
                w.write_all(&v.to_le_bytes())?;
            }
        }
        write_u32(w, self.nodes.len())?;
        for n in &self.nodes {
            write_u32(w, n.id)?;
            w.write_all(&n.cell.x.to_le_bytes())?;
            w.write_all(&n.cell.y.to_le_bytes())?;
            write_u32(w, n.cluster)?;
            let peer = n.cross_peer.map_or(-1, |p| p as i32);
            w.write_all(&peer.to_le_bytes())?;
        }
        for portals in &self.cluster_portals {
            write_u32(w, portals.len())?;
            for &p in portals {
                write_u32(w, p)?;
            }
        }
        Ok(())
    }

    /// Load a structure written by [`serialize`](Self::serialize) for
    /// `grid`, recompute edge weights on it and mark the graph built at the
    /// grid's current revision.
    ///
    /// On error the graph is left unbuilt.
    pub fn deserialize<R: Read>(&mut self, grid: &NavGrid, r: &mut R) -> io::Result<()> {
        self.built = false;
        self.cluster_size = read_i32(r)?;
        self.clusters_x = read_i32(r)?;
        self.clusters_y = read_i32(r)?;
        if self.cluster_size < MIN_CLUSTER_SIZE
            || (self.clusters_x, self.clusters_y) != layout(grid, self.cluster_size)
        {
            return Err(invalid(format!(
                "cluster layout {}x{} of size {} does not fit a {}x{} grid",
                self.clusters_x,
                self.clusters_y,
                self.cluster_size,
                grid.width(),
                grid.height()
            )));
        }

        // Both factors are now bounded by the grid dimensions.
        let expected = (self.clusters_x * self.clusters_y) as usize;
        let count = read_u32(r)?;
        if count != expected {
            return Err(invalid(format!("{count} clusters for a {}x{} layout", self.clusters_x, self.clusters_y)));
        }
        self.clusters.clear();
        for i in 0..count as i32 {
            let (x, y, cw, ch) = (read_i32(r)?, read_i32(r)?, read_i32(r)?, read_i32(r)?);
            let c = Range::with_size(Point::new(x, y), cw, ch);
            if c != cluster_rect(grid, self.cluster_size, i % self.clusters_x, i / self.clusters_x) {
                return Err(invalid(format!("cluster {i} at {c} does not match the layout")));
            }
            self.clusters.push(c);
        }

        let count = read_u32(r)?;
        self.nodes.clear();
        for i in 0..count {
            let id = read_u32(r)?;
            let cell = Point::new(read_i32(r)?, read_i32(r)?);
            let cluster = read_u32(r)?;
            let peer = read_i32(r)?;
            if id != i || cluster >= self.clusters.len() || !grid.in_bounds(cell) {
                return Err(invalid(format!("portal {i} is inconsistent")));
            }
            let cross_peer = match peer {
                -1 => None,
                p if p >= 0 && (p as usize) < count => Some(p as usize),
                p => return Err(invalid(format!("portal {i} has peer {p}"))),
            };
            self.nodes.push(PortalNode {
                id,
                cell,
                cluster,
                cross_peer,
            });
        }

        self.cluster_portals.clear();
        for _ in 0..self.clusters.len() {
            let n = read_u32(r)?;
            let mut portals = Vec::with_capacity(n.min(self.nodes.len()));
            for _ in 0..n {
                let p = read_u32(r)?;
                if p >= self.nodes.len() {
                    return Err(invalid(format!("portal index {p} out of range")));
                }
                portals.push(p);
            }
            self.cluster_portals.push(portals);
        }

        self.rebuild_adjacency(grid);
        self.mark_built(grid);
        log::debug!("hpa loaded: {} clusters, {} portals", self.clusters.len(), self.nodes.len());
        Ok(())
    }
}

/// Cluster columns and rows covering `grid`.
fn layout(grid: &NavGrid, cluster_size: i32) -> (i32, i32) {
    (
        (grid.width() - 1) / cluster_size + 1,
        (grid.height() - 1) / cluster_size + 1,
    )
}

/// Cluster `(cx, cy)`, clipped at the grid edge.
fn cluster_rect(grid: &NavGrid, cluster_size: i32, cx: i32, cy: i32) -> Range {
    let origin = Point::new(cx * cluster_size, cy * cluster_size);
    Range::with_size(
        origin,
        cluster_size.min(grid.width() - origin.x),
        cluster_size.min(grid.height() - origin.y),
    )
}

fn invalid(msg: String) -> io::Error {
    log::warn!("rejecting hpa structure: {msg}");
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

fn write_u32<W: Write>(w: &mut W, v: usize) -> io::Result<()> {
    let v = u32::try_from(v).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "count exceeds u32"))?;
    w.write_all(&v.to_le_bytes())
}

fn read_u32<R: Read>(r: &mut R) -> io::Result<usize> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf) as usize)
}

fn read_i32<R: Read>(r: &mut R) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walled(door: i32) -> NavGrid {
        let mut g = NavGrid::new(32, 16);
        for y in 0..16 {
            if y != door {
                g.set_blocked(Point::new(16, y), true);
            }
        }
        g
    }

    fn params() -> SearchParams {
        SearchParams {
            use_hpa: true,
            hpa_cluster_size: 8,
            ..SearchParams::default()
        }
    }

    fn built(grid: &NavGrid) -> Hpa {
        let mut h = Hpa::new();
        assert!(h.maybe_rebuild(grid, 8, 64));
        h
    }

    fn assert_walkable(grid: &NavGrid, r: &PathResult, from: Point, to: Point) {
        assert!(r.success);
        assert_eq!(r.path.first(), Some(&from));
        assert_eq!(r.path.last(), Some(&to));
        let mut cost = 0.0;
        for w in r.path.windows(2) {
            let d = w[1] - w[0];
            assert!(d.x.abs() <= 1 && d.y.abs() <= 1 && d != Point::ZERO, "gap at {}", w[0]);
            assert!(grid.is_passable(w[1]));
            let step = if d.x != 0 && d.y != 0 { distance::DIAG } else { 1.0 };
            cost += step * grid.move_cost(w[1]) as f32;
        }
        assert!((cost - r.cost).abs() < 1e-3, "{cost} vs {}", r.cost);
    }

    fn flat_cost(grid: &NavGrid, from: Point, to: Point) -> PathResult {
        let mut s = SearchSpace::new(true);
        s.astar(grid, &GridSteps::new(grid, true, false), from, to, 0)
    }

    #[test]
    fn open_grid_layout() {
        let g = NavGrid::new(32, 32);
        let h = built(&g);
        assert_eq!(h.clusters().len(), 16);
        // One full-length run per border: 12 vertical and 12 horizontal.
        assert_eq!(h.nodes().len(), 48);
        for n in h.nodes() {
            let peer = h.nodes()[n.cross_peer.unwrap()];
            assert_eq!(peer.cross_peer, Some(n.id));
            assert_eq!(distance::manhattan(n.cell, peer.cell), 1);
            assert!(h.clusters()[n.cluster].contains(n.cell));
        }
        // Runs are marked at their midpoint.
        assert_eq!(h.nodes()[0].cell, Point::new(3, 7));
        assert_eq!(h.nodes()[1].cell, Point::new(3, 8));
    }

    #[test]
    fn edge_clusters_are_clipped() {
        let g = NavGrid::new(20, 10);
        let h = built(&g);
        assert_eq!(h.clusters().len(), 6);
        assert_eq!(h.clusters()[2], Range::new(16, 0, 20, 8));
        assert_eq!(h.clusters()[5], Range::new(16, 8, 20, 10));
    }

    #[test]
    fn cluster_size_is_clamped() {
        let g = NavGrid::new(16, 16);
        let mut h = Hpa::new();
        h.maybe_rebuild(&g, 2, 64);
        assert_eq!(h.cluster_size(), MIN_CLUSTER_SIZE);
        assert!(!h.maybe_rebuild(&g, 1, 64));
    }

    #[test]
    fn rebuild_rules() {
        let mut g = NavGrid::new(16, 16);
        let mut h = Hpa::new();
        assert!(!h.is_built());
        assert!(h.maybe_rebuild(&g, 8, 2));
        assert!(!h.maybe_rebuild(&g, 8, 2));
        g.set_blocked(Point::new(3, 3), true);
        assert!(!h.maybe_rebuild(&g, 8, 2));
        g.set_blocked(Point::new(4, 3), true);
        assert!(h.maybe_rebuild(&g, 8, 2));
        assert_eq!(h.last_built_revision(), g.revision());
        assert!(h.maybe_rebuild(&g, 4, 2));
        let other = NavGrid::new(16, 16);
        assert!(h.maybe_rebuild(&other, 4, 2));
        h.invalidate();
        assert!(h.maybe_rebuild(&other, 4, 2));
    }

    #[test]
    fn path_through_door() {
        let g = walled(10);
        let mut h = built(&g);
        let (from, to) = (Point::new(2, 3), Point::new(29, 4));
        let r = h.find_path(&g, from, to, &params());
        assert_walkable(&g, &r, from, to);
        assert!(r.path.contains(&Point::new(16, 10)));
        assert!(r.cost >= flat_cost(&g, from, to).cost - 1e-3);
        assert!(h.node_expansions > 0);
    }

    #[test]
    fn reachability_matches_flat_search() {
        let mut g = walled(10);
        g.set_blocked(Point::new(16, 10), true);
        let mut h = built(&g);
        let (from, to) = (Point::new(2, 3), Point::new(29, 4));
        assert!(!flat_cost(&g, from, to).success);
        assert!(!h.find_path(&g, from, to, &params()).success);

        let near = Point::new(12, 12);
        assert!(h.find_path(&g, from, near, &params()).success);
    }

    #[test]
    fn same_cluster_goal() {
        let g = NavGrid::new(32, 32);
        let mut h = built(&g);
        let r = h.find_path(&g, Point::new(1, 1), Point::new(5, 2), &params());
        assert_walkable(&g, &r, Point::new(1, 1), Point::new(5, 2));
        assert_eq!(r.path.len(), 5);
    }

    #[test]
    fn trivial_and_invalid_queries() {
        let mut g = NavGrid::new(16, 16);
        g.set_blocked(Point::new(9, 9), true);
        let mut h = built(&g);
        let p = Point::new(3, 3);
        assert_eq!(h.find_path(&g, p, p, &params()), PathResult::single(p));
        assert!(!h.find_path(&g, Point::new(9, 9), p, &params()).success);
        assert!(!h.find_path(&g, p, Point::new(-1, 0), &params()).success);
        let other = NavGrid::new(16, 16);
        assert!(!h.find_path(&other, p, Point::new(12, 12), &params()).success);
    }

    #[test]
    fn weighted_crossing_costs_cheaper_side() {
        let mut g = NavGrid::new(16, 8);
        g.set_move_cost(Point::new(8, 3), 5);
        let h = built(&g);
        let a = h.nodes().iter().find(|n| n.cell == Point::new(7, 3)).unwrap();
        let b = a.cross_peer.unwrap();
        let w = h.adj[a.id].iter().find(|e| e.to == b).unwrap().w;
        assert_eq!(w, 1.0);
    }

    #[test]
    fn codec_round_trip() {
        let g = walled(10);
        let h = built(&g);
        let mut buf = Vec::new();
        h.serialize(&mut buf).unwrap();

        let mut loaded = Hpa::new();
        loaded.deserialize(&g, &mut buf.as_slice()).unwrap();
        assert!(loaded.is_built());
        assert_eq!(loaded.cluster_size(), 8);
        assert_eq!(loaded.clusters(), h.clusters());
        assert_eq!(loaded.nodes(), h.nodes());
        assert_eq!(loaded.last_built_revision(), g.revision());
        assert!(!loaded.maybe_rebuild(&g, 8, 64));

        let (from, to) = (Point::new(2, 3), Point::new(29, 4));
        let mut h = h;
        assert_eq!(loaded.find_path(&g, from, to, &params()), h.find_path(&g, from, to, &params()));
    }

    #[test]
    fn truncated_stream_is_rejected() {
        let g = NavGrid::new(16, 16);
        let h = built(&g);
        let mut buf = Vec::new();
        h.serialize(&mut buf).unwrap();
        buf.truncate(buf.len() - 3);
        let mut loaded = Hpa::new();
        let err = loaded.deserialize(&g, &mut buf.as_slice()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(!loaded.is_built());
    }

    fn layout_header(cluster_size: i32, cx: i32, cy: i32, count: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        for v in [cluster_size, cx, cy] {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        buf.extend_from_slice(&count.to_le_bytes());
        buf
    }

    #[test]
    fn hostile_layout_headers_are_rejected() {
        let g = NavGrid::new(16, 16);
        for buf in [
            layout_header(8, 65_536, 65_536, 0),
            layout_header(8, i32::MAX, 2, 0),
            layout_header(8, -2, -2, 4),
            layout_header(8, 3, 2, 6),
            layout_header(2, 8, 8, 64),
            layout_header(8, 2, 2, u32::MAX),
        ] {
            let mut loaded = Hpa::new();
            let err = loaded.deserialize(&g, &mut buf.as_slice()).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidData);
            assert!(!loaded.is_built());
        }
    }

    #[test]
    fn layout_header_with_no_clusters_is_truncated() {
        let g = NavGrid::new(16, 16);
        let buf = layout_header(8, 2, 2, 4);
        let mut loaded = Hpa::new();
        let err = loaded.deserialize(&g, &mut buf.as_slice()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn misplaced_cluster_is_rejected() {
        let g = NavGrid::new(16, 16);
        let h = built(&g);
        let mut buf = Vec::new();
        h.serialize(&mut buf).unwrap();
        // First cluster's x.
        buf[16..20].copy_from_slice(&1i32.to_le_bytes());
        let mut loaded = Hpa::new();
        let err = loaded.deserialize(&g, &mut buf.as_slice()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn bad_peer_is_rejected() {
        let g = NavGrid::new(16, 16);
        let h = built(&g);
        let mut buf = Vec::new();
        h.serialize(&mut buf).unwrap();
        // Header, 4 clusters, node count, then the first node's peer field.
        let peer_at = 16 + 4 * 16 + 4 + 16;
        buf[peer_at..peer_at + 4].copy_from_slice(&999i32.to_le_bytes());
        let mut loaded = Hpa::new();
        let err = loaded.deserialize(&g, &mut buf.as_slice()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
