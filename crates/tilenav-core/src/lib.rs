//! Core types of the *tilenav* grid navigation engine.
//!
//! This crate provides the geometry primitives shared by every planner and
//! the mutable [`NavGrid`] whose revision counter drives cache and
//! incremental-search invalidation.

pub mod geom;
pub mod grid;

pub use geom::{Point, Range, RangeIter};
pub use grid::{GridId, MAX_CELLS, NavGrid};
