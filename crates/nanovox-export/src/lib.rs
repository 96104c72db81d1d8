//! Exports sparse voxel trees into a pointer-free, read-optimized grid
//! image.
//!
//! Given a three-level source tree behind the [`nanovox_tree::TreeSource`]
//! interface, [`export`] produces a single contiguous byte image —
//! grid header, tree header, root with sorted tiles, then the node regions —
//! that a reader can map and query without deserialization. The byte layout
//! is computed up front from the branching factors and value type
//! ([`layout::LayoutPlan`]), node regions are filled by parallel workers
//! level by level, and the root ties everything together with
//! binary-searchable spatial keys.

pub mod buffer;
pub mod error;
pub mod export;
pub mod format;
pub mod headers;
pub mod layout;
pub mod node;
pub mod root;

pub use error::{ExportError, Result};
pub use export::{export, export_with, CancelToken, ExportOptions, ExportedGrid};
pub use layout::{LayoutPlan, Region, REGION_COUNT};
pub use root::coord_to_key;
