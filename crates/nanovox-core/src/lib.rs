//! Core types for the nanovox volume toolkit.
//!
//! This crate provides the foundational types shared by the source-tree
//! representation and the grid exporter:
//! - Integer voxel coordinates and bounding boxes
//! - The tagged value-type registry (F32, Vec3F32, I32)
//! - The index-to-world affine transform

pub mod coords;
pub mod error;
pub mod math;
pub mod types;

pub use coords::{BBoxd, Coord, CoordBBox};
pub use error::{Error, Result};
pub use math::AffineMap;
pub use types::{GridClass, Value, ValueType};

/// Toolkit-wide constants
pub mod constants {
    /// Number of tree levels below the root (leaf = 0, root = 3).
    pub const TREE_DEPTH: u32 = 3;
    /// Smallest supported per-level branching exponent.
    pub const MIN_LOG2_DIM: u32 = 1;
    /// Largest supported per-level branching exponent.
    pub const MAX_LOG2_DIM: u32 = 8;
}
