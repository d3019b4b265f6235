//! The [`Planner`] facade.
//!
//! A planner owns every piece of reusable navigation state (search scratch
//! space, path cache, D\*-Lite state, HPA\* graph, RNG) but never the grid:
//! each call borrows a [`NavGrid`] for its duration. The planner remembers
//! which grid it is attached to and refuses to work on any other.

use std::io::{self, Read, Write};

use tilenav_core::{GridId, NavGrid, Point};

use crate::cache::{CacheKey, PathCache};
use crate::crowd::{self, CrowdField};
use crate::debug;
use crate::dstar::DStarLite;
use crate::flow::FlowField;
use crate::hpa::Hpa;
use crate::neighbors::GridSteps;
use crate::params::{PlannerConfig, SearchParams};
use crate::rng::TieBreakRng;
use crate::search::{PathResult, SearchSpace};
use crate::smooth::smooth_path;
use crate::stats::PlannerStats;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Attachment {
    id: GridId,
    width: i32,
    height: i32,
}

impl Attachment {
    fn of(grid: &NavGrid) -> Self {
        Self {
            id: grid.id(),
            width: grid.width(),
            height: grid.height(),
        }
    }
}

/// Path planning front end composing every search strategy.
///
/// One-shot queries go through [`find_path`](Self::find_path): cache, then
/// HPA\*, then JPS, then A\*, depending on the configuration and the query
/// parameters. Agents with a standing destination use
/// [`replan`](Self::replan) together with
/// [`notify_terrain_changed`](Self::notify_terrain_changed).
///
/// # Panics
///
/// Every method taking a grid panics when the grid is not the one the
/// planner is attached to. Resetting, cloning or deserializing a grid gives
/// it a new identity; call [`attach`](Self::attach) again afterwards. A
/// planner that was never attached attaches to the first grid it sees.
pub struct Planner {
    config: PlannerConfig,
    attached: Option<Attachment>,
    search: SearchSpace,
    cache: PathCache,
    dstar: DStarLite,
    hpa: Hpa,
    rng: TieBreakRng,
    stats: PlannerStats,
}

impl Default for Planner {
    fn default() -> Self {
        Self::new(PlannerConfig::default())
    }
}

impl Planner {
    pub fn new(config: PlannerConfig) -> Self {
        Self {
            search: SearchSpace::new(config.deterministic),
            cache: PathCache::new(if config.enable_cache { config.cache_capacity } else { 0 }),
            dstar: DStarLite::new(),
            hpa: Hpa::new(),
            rng: TieBreakRng::new(config.seed),
            stats: PlannerStats::default(),
            attached: None,
            config,
        }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Bind the planner to `grid`, dropping all cached paths, D\*-Lite state
    /// and the HPA\* graph.
    pub fn attach(&mut self, grid: &NavGrid) {
        log::debug!(
            "planner attached to {}x{} grid at revision {}",
            grid.width(),
            grid.height(),
            grid.revision()
        );
        self.attached = Some(Attachment::of(grid));
        self.cache.clear();
        self.dstar.reset();
        self.hpa.invalidate();
    }

    fn check(&mut self, grid: &NavGrid) {
        match self.attached {
            None => self.attach(grid),
            Some(a) => assert!(
                a == Attachment::of(grid),
                "planner is not attached to this grid (attached to {:?} {}x{}, got {:?} {}x{}); call attach after replacing or resizing a grid",
                a.id,
                a.width,
                a.height,
                grid.id(),
                grid.width(),
                grid.height()
            ),
        }
    }

    /// Shortest path from `start` to `goal`.
    ///
    /// Fails when either end is outside the grid or the goal is blocked.
    /// `start == goal` yields a one-cell path. A search stopped by
    /// `max_expansions` still reports success with a path to the last
    /// expanded cell.
    pub fn find_path(&mut self, grid: &NavGrid, start: Point, goal: Point, params: &SearchParams) -> PathResult {
        self.check(grid);
        if !grid.in_bounds(start) || !grid.in_bounds(goal) || grid.is_blocked(goal) {
            return PathResult::failure();
        }
        if start == goal {
            return PathResult::single(start);
        }

        let use_cache = self.config.enable_cache && params.use_cache;
        let key = CacheKey {
            revision: grid.revision(),
            start,
            goal,
            flags: params.cache_flags(),
        };
        if use_cache {
            if let Some(mut hit) = self.cache.get(&key).cloned() {
                self.stats.cache_hits += 1;
                self.finish(grid, params, &mut hit);
                return hit;
            }
            self.stats.cache_misses += 1;
        }

        let mut out = self.search(grid, start, goal, params);
        if use_cache {
            self.cache.put(key, out.clone());
        }
        log::trace!(
            "path {start} -> {goal}: success {}, {} cells, cost {}",
            out.success,
            out.path.len(),
            out.cost
        );
        self.finish(grid, params, &mut out);
        out
    }

    fn search(&mut self, grid: &NavGrid, start: Point, goal: Point, params: &SearchParams) -> PathResult {
        if self.config.enable_hpa && params.use_hpa {
            if self
                .hpa
                .maybe_rebuild(grid, params.hpa_cluster_size, params.hpa_rebuild_threshold)
            {
                self.stats.hpa_rebuilds += 1;
            }
            let out = self.hpa.find_path(grid, start, goal, params);
            self.stats.hpa_node_expansions += self.hpa.node_expansions;
            if out.success {
                return out;
            }
            self.stats.hpa_fallbacks += 1;
            log::debug!("hpa found no route {start} -> {goal}, falling back to a flat search");
        }

        let steps = GridSteps::from_params(grid, params);
        if self.config.enable_jps && params.prefer_jps && grid.uniform_cost_ever() {
            let out = self.search.jps(
                grid,
                &steps,
                start,
                goal,
                params.max_expansions,
                self.config.jump_budget,
            );
            self.stats.jps_expansions += self.search.expansions;
            self.stats.heap_pushes += self.search.pushes;
            return out;
        }

        let out = self.search.astar(grid, &steps, start, goal, params.max_expansions);
        self.stats.astar_expansions += self.search.expansions;
        self.stats.heap_pushes += self.search.pushes;
        out
    }

    fn finish(&self, grid: &NavGrid, params: &SearchParams, out: &mut PathResult) {
        if params.smooth && out.success {
            smooth_path(grid, &mut out.path);
        }
    }

    /// Incremental path toward a standing goal with D\*-Lite.
    ///
    /// Work from previous calls is reused as long as the goal and movement
    /// parameters stay the same and every grid change since the last call
    /// was reported through
    /// [`notify_terrain_changed`](Self::notify_terrain_changed). Otherwise
    /// the state is rebuilt from scratch. With D\*-Lite disabled this is
    /// [`find_path`](Self::find_path).
    pub fn replan(&mut self, grid: &NavGrid, start: Point, goal: Point, params: &SearchParams) -> PathResult {
        if !self.config.enable_dstar {
            return self.find_path(grid, start, goal, params);
        }
        self.check(grid);
        let mut out = self.dstar.replan(grid, start, goal, params);
        self.finish(grid, params, &mut out);
        out
    }

    /// Report the exact set of cells whose blocked state or cost changed
    /// since the last call.
    pub fn notify_terrain_changed(&mut self, grid: &NavGrid, changed: &[Point]) {
        self.check(grid);
        if self.config.enable_dstar {
            self.dstar.notify_changed_cells(grid, changed);
        }
    }

    /// Flow field toward a single target. See
    /// [`compute_flow_field_multi`](Self::compute_flow_field_multi).
    pub fn compute_flow_field(
        &mut self,
        grid: &NavGrid,
        target: Point,
        diagonal: bool,
        extra: Option<&[f32]>,
        extra_weight: f32,
    ) -> FlowField {
        self.compute_flow_field_multi(grid, &[target], diagonal, extra, extra_weight)
    }

    /// Flow field toward the nearest of `targets`, optionally adding
    /// `extra_weight × extra[cell]` to every step onto a cell.
    ///
    /// Returns an invalid field when flow fields are disabled.
    pub fn compute_flow_field_multi(
        &mut self,
        grid: &NavGrid,
        targets: &[Point],
        diagonal: bool,
        extra: Option<&[f32]>,
        extra_weight: f32,
    ) -> FlowField {
        self.check(grid);
        if !self.config.enable_flow_fields {
            return FlowField::default();
        }
        FlowField::from_targets(grid, targets, diagonal, extra, extra_weight)
    }

    /// `w_base × base + w_hazard × hazard`, with directions recomputed on
    /// the blended distances.
    pub fn blend_flow_field(
        &mut self,
        grid: &NavGrid,
        base: &FlowField,
        hazard: &[f32],
        w_base: f32,
        w_hazard: f32,
        diagonal: bool,
    ) -> FlowField {
        self.check(grid);
        if !self.config.enable_flow_fields {
            return FlowField::default();
        }
        base.blended(grid, hazard, w_base, w_hazard, diagonal)
    }

    /// Line-of-sight smoothing of a successful path built elsewhere.
    pub fn smooth(&mut self, grid: &NavGrid, result: &mut PathResult) {
        self.check(grid);
        if result.success {
            smooth_path(grid, &mut result.path);
        }
    }

    /// Next cell for an agent at `current` that wants to step onto the
    /// adjacent cell `desired`, steering away from crowded cells.
    pub fn avoid_crowd(
        &mut self,
        grid: &NavGrid,
        current: Point,
        desired: Point,
        field: &CrowdField,
        density_weight: f32,
    ) -> Point {
        self.check(grid);
        crowd::avoid_crowd(
            grid,
            current,
            desired,
            field,
            density_weight,
            &mut self.rng,
            self.config.crowd_jitter,
        )
    }

    /// ASCII picture of `result` on the grid; empty when debugging is off.
    pub fn debug_dump_path(&mut self, grid: &NavGrid, result: &PathResult) -> String {
        self.check(grid);
        if !self.config.enable_debug {
            return String::new();
        }
        debug::dump_path(grid, &result.path)
    }

    /// ASCII picture of a flow field's directions; empty when debugging is
    /// off or the field is invalid.
    pub fn debug_dump_flow(&mut self, grid: &NavGrid, field: &FlowField) -> String {
        self.check(grid);
        if !self.config.enable_debug {
            return String::new();
        }
        debug::dump_flow(grid, field)
    }

    /// Write the HPA\* cluster/portal structure.
    pub fn serialize_hpa<W: Write>(&self, w: &mut W) -> io::Result<()> {
        self.hpa.serialize(w)
    }

    /// Load an HPA\* structure for `grid`. On error the graph is left
    /// unbuilt and is rebuilt by the next HPA\* query.
    pub fn deserialize_hpa<R: Read>(&mut self, grid: &NavGrid, r: &mut R) -> io::Result<()> {
        self.check(grid);
        self.hpa.deserialize(grid, r)
    }

    pub fn hpa(&self) -> &Hpa {
        &self.hpa
    }

    /// Work counters since construction or the last
    /// [`reset_stats`](Self::reset_stats).
    pub fn stats(&self) -> PlannerStats {
        PlannerStats {
            dstar_pops: self.dstar.pops,
            dstar_pushes: self.dstar.pushes,
            dstar_full_rebuilds: self.dstar.full_rebuilds,
            ..self.stats
        }
    }

    pub fn reset_stats(&mut self) {
        self.stats = PlannerStats::default();
        self.dstar.reset_counters();
    }

    /// Change the cache capacity, evicting least recently used entries
    /// right away. 0 stops caching.
    pub fn set_cache_capacity(&mut self, capacity: usize) {
        self.cache.set_capacity(capacity);
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}
