//! Root record and tile construction.
//!
//! The root holds one tile per level-2 node, sorted ascending by a 63-bit
//! spatial key so readers can binary-search a coordinate in O(log n). The
//! grid-wide index bounds and value extremes are folded here from the
//! already-filled level-2 records.

use tracing::warn;

use nanovox_core::{Coord, CoordBBox, Value};

use crate::error::Result;
use crate::format;
use crate::layout::LayoutPlan;
use crate::node::internal_summary;

/// Encode a node origin as a root key.
///
/// Packs the three coordinates, each shifted down by the tree's summed
/// branching exponent `T` and masked to 21 bits, as
/// `(k >> T) | ((j >> T) << 21) | ((i >> T) << 42)` for origin `(i, j, k)`.
/// Requires `32 - T <= 21`, which the orchestrator validates up front.
#[inline]
pub fn coord_to_key(origin: Coord, total_log2_dim: u32) -> u64 {
    const MASK: u64 = (1 << 21) - 1;
    ((origin.z >> total_log2_dim) as u64 & MASK)
        | (((origin.y >> total_log2_dim) as u64 & MASK) << 21)
        | (((origin.x >> total_log2_dim) as u64 & MASK) << 42)
}

/// Grid-wide extents folded over the level-2 nodes.
pub(crate) struct RootExtents {
    pub index_bbox: CoordBBox,
    pub value_min: Value,
    pub value_max: Value,
}

/// Build the root record and sorted tile array from the filled level-2
/// region, and return the folded grid extents.
pub(crate) fn build_root(
    root_region: &mut [u8],
    node2_region: &[u8],
    plan: &LayoutPlan,
    background: Value,
) -> Result<RootExtents> {
    let ty = plan.value_type;
    let num_node2 = plan.node_counts[2];
    let node2_size = plan.node_sizes[2];
    let total_log2_dim = plan.total_log2_dim();

    let mut index_bbox = CoordBBox::empty();
    let mut vmin = ty.max_sentinel();
    let mut vmax = ty.min_sentinel();
    let mut tiles = Vec::with_capacity(num_node2);

    for t in 0..num_node2 {
        let bytes = &node2_region[t * node2_size..(t + 1) * node2_size];
        let prefix: format::InternalPrefix = format::read_record(bytes, 0);
        let summary = internal_summary(bytes, plan);

        let origin = Coord::new(prefix.origin[0], prefix.origin[1], prefix.origin[2]);
        tiles.push((coord_to_key(origin, total_log2_dim), t as i32));

        index_bbox.expand_bbox(&summary.bbox);
        vmin = vmin.min(summary.min);
        vmax = vmax.max(summary.max);
    }

    // Keys are distinct because level-2 nodes have distinct origins, so an
    // unstable comparison sort is deterministic here.
    tiles.sort_unstable_by_key(|&(key, _)| key);

    if index_bbox.is_degenerate() {
        warn!("grid index-space bounding box has zero volume");
    }

    // All leaf voxels are active in the source.
    let active_voxel_count = (plan.node_counts[0] as u64) << (3 * plan.log2_dims[0]);

    format::write_record(
        root_region,
        0,
        &format::RootPrefix {
            bbox: [
                index_bbox.min.x,
                index_bbox.min.y,
                index_bbox.min.z,
                index_bbox.max.x,
                index_bbox.max.y,
                index_bbox.max.z,
            ],
            active_voxel_count,
            tile_count: num_node2 as u32,
            _pad: 0,
        },
    );
    background.write_to(&mut root_region[format::ROOT_VALUES_OFFSET..]);
    vmin.write_to(&mut root_region[format::root_min_offset(ty)..]);
    vmax.write_to(&mut root_region[format::root_max_offset(ty)..]);

    let tiles_offset = format::root_size(ty);
    for (i, &(key, child_id)) in tiles.iter().enumerate() {
        format::write_record(
            root_region,
            tiles_offset + i * plan.tile_size,
            &format::TilePrefix {
                key,
                child_id,
                state: 0,
            },
        );
    }

    Ok(RootExtents {
        index_bbox,
        value_min: vmin,
        value_max: vmax,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_formula_matches_reference_cases() {
        // Randomly generated reference coordinates for the key encoding.
        let key = coord_to_key(Coord::new(438603478, 101217144, 861900436), 12);
        assert_eq!(
            key,
            (861900436u64 >> 12) | ((101217144u64 >> 12) << 21) | ((438603478u64 >> 12) << 42)
        );

        let key = coord_to_key(Coord::new(35463336, 183524282, 84996283), 17);
        assert_eq!(
            key,
            (84996283u64 >> 17) | ((183524282u64 >> 17) << 21) | ((35463336u64 >> 17) << 42)
        );
    }

    #[test]
    fn origin_key_is_zero() {
        assert_eq!(coord_to_key(Coord::ZERO, 12), 0);
    }

    #[test]
    fn x_axis_lands_in_the_high_field() {
        assert_eq!(coord_to_key(Coord::new(4096, 0, 0), 12), 1 << 42);
        assert_eq!(coord_to_key(Coord::new(0, 4096, 0), 12), 1 << 21);
        assert_eq!(coord_to_key(Coord::new(0, 0, 4096), 12), 1);
    }

    #[test]
    fn components_do_not_bleed_across_fields() {
        // A negative coordinate must stay inside its own 21-bit field.
        let key = coord_to_key(Coord::new(0, 0, -4096), 12);
        assert_eq!(key & !((1 << 21) - 1), 0);
    }
}
