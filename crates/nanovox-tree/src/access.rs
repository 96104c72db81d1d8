//! Read-only access interface for three-level sparse voxel trees.

use nanovox_core::{AffineMap, Coord};

/// Read-only view of a three-level sparse voxel tree.
///
/// This is the narrow seam the exporter consumes: topology by level and node
/// index, packed voxel values by channel and leaf id, and the index-to-world
/// transform. Levels are numbered from the bottom: 0 = leaf, 1 and 2 =
/// interior. Implementations must be safe to read from many threads at once.
pub trait TreeSource: Sync {
    /// Base-2 log of the per-axis branching factor at `level` (0..3).
    fn log2_dim(&self, level: u32) -> u32;

    /// Number of nodes at `level`.
    fn node_count(&self, level: u32) -> usize;

    /// Index-space origin (minimum voxel corner) of a node.
    fn node_origin(&self, level: u32, node: usize) -> Coord;

    /// Occupancy bitmask words of a node, least-significant bit first.
    ///
    /// For level 0 the bits cover voxels; for levels 1 and 2 they cover
    /// child slots, with slot `(i << 2L) | (j << L) | k` at bit position
    /// `slot`.
    fn occupancy_mask(&self, level: u32, node: usize) -> &[u64];

    /// Index of the child node occupying `slot`, for levels 1 and 2.
    fn child_at(&self, level: u32, node: usize, slot: usize) -> Option<u32>;

    /// Number of value channels carried by the tree.
    fn channel_count(&self) -> u32;

    /// Wire tag of the channel's value type, or `None` if the channel does
    /// not exist.
    ///
    /// The tag is reported raw so consumers validate it against the value
    /// types they support instead of trusting the source; a tree may carry
    /// channels whose type a given consumer cannot encode.
    fn channel_type_tag(&self, channel: u32) -> Option<u32>;

    /// Packed value block of one leaf in the channel's atlas.
    ///
    /// The block holds `2^(3·log2_dim(0))` values of the channel's type in
    /// slot order `(x << 2L) | (y << L) | z`.
    fn leaf_values(&self, channel: u32, leaf: usize) -> &[u8];

    /// Index-to-world transform of the volume.
    fn index_to_world(&self) -> AffineMap;

    /// Per-axis voxel span of a node at `level`, in voxels.
    fn node_dim(&self, level: u32) -> i32 {
        let shift: u32 = (0..=level).map(|l| self.log2_dim(l)).sum();
        1 << shift
    }
}
