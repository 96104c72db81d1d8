//! Sparse three-level voxel tree storage for the nanovox toolkit.
//!
//! The tree keeps topology (node origins, occupancy masks, child tables) in
//! flat per-level arrays and voxel values in per-channel atlases; consumers
//! such as the grid exporter read both through the narrow [`TreeSource`]
//! interface.

pub mod access;
pub mod atlas;
pub mod host;

pub use access::TreeSource;
pub use atlas::Atlas;
pub use host::{HostTree, HostTreeBuilder};
