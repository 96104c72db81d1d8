//! Grid and tree header writers.

use std::mem::offset_of;

use tracing::warn;

use nanovox_core::{AffineMap, BBoxd, CoordBBox, GridClass, ValueType};

use crate::format::{self, GridHeader, MapRecord, TreeHeader, MAX_NAME_SIZE};
use crate::layout::{LayoutPlan, Region};

/// Write the grid header, except for the world bounding box, which depends
/// on the root extents and is patched in afterwards.
pub(crate) fn write_grid_header(
    region: &mut [u8],
    grid_name: &str,
    map: &AffineMap,
    value_type: ValueType,
    grid_class: GridClass,
) {
    let mut header = GridHeader {
        magic: format::MAGIC,
        grid_name: [0u8; MAX_NAME_SIZE],
        map: MapRecord::from_affine(map),
        world_bbox: [0.0; 6],
        voxel_size: map.voxel_size().to_array(),
        grid_class: grid_class.wire_tag(),
        grid_type: value_type.wire_tag(),
        blind_metadata_offset: 0,
        blind_metadata_count: 0,
        _pad: [0; 5],
    };

    let name = truncated_name(grid_name);
    header.grid_name[..name.len()].copy_from_slice(name.as_bytes());

    format::write_record(region, 0, &header);
}

/// Cut a grid name down to the header field, keeping a terminating NUL and
/// whole UTF-8 characters. Over-long names warn but do not fail.
fn truncated_name(name: &str) -> &str {
    if name.len() < MAX_NAME_SIZE {
        return name;
    }
    let mut end = MAX_NAME_SIZE - 1;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    warn!(
        "grid name of {} bytes truncated to {end} to fit the header field",
        name.len()
    );
    &name[..end]
}

/// Patch the world bounding box into an already-written grid header.
pub(crate) fn patch_world_bbox(region: &mut [u8], world: &BBoxd) {
    let bounds = [
        world.min.x,
        world.min.y,
        world.min.z,
        world.max.x,
        world.max.y,
        world.max.z,
    ];
    format::write_record(region, offset_of!(GridHeader, world_bbox), &bounds);
}

/// World-space bounds: the union of the mapped 8 corners of the index box.
pub(crate) fn world_bbox_from_index(map: &AffineMap, index_bbox: &CoordBBox) -> BBoxd {
    let mut world = BBoxd::empty();
    for corner in index_bbox.corners() {
        world.expand(map.apply(corner));
    }
    world
}

/// Write the tree header: per-level byte offsets (relative to the tree
/// header start) and node counts, level 0 = leaf through 3 = root.
pub(crate) fn write_tree_header(region: &mut [u8], plan: &LayoutPlan) {
    let tree_start = plan.offset(Region::Tree);
    let header = TreeHeader {
        region_bytes: [
            (plan.offset(Region::Leaf) - tree_start) as u64,
            (plan.offset(Region::Node1) - tree_start) as u64,
            (plan.offset(Region::Node2) - tree_start) as u64,
            (plan.offset(Region::Root) - tree_start) as u64,
        ],
        node_count: [
            plan.node_counts[0] as u32,
            plan.node_counts[1] as u32,
            plan.node_counts[2] as u32,
            1,
        ],
        _pad: [0; 4],
    };
    format::write_record(region, 0, &header);
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;
    use nanovox_core::Coord;

    #[test]
    fn grid_header_fields() {
        let mut region = vec![0u8; format::GRID_HEADER_SIZE];
        let map = AffineMap::uniform_scale(0.5);
        write_grid_header(
            &mut region,
            "density",
            &map,
            ValueType::F32,
            GridClass::FogVolume,
        );

        let header: GridHeader = format::read_record(&region, 0);
        assert_eq!(header.magic, format::MAGIC);
        assert_eq!(&header.grid_name[..8], b"density\0");
        assert!(header.grid_name[8..].iter().all(|&b| b == 0));
        assert_eq!(header.grid_type, 1);
        assert_eq!(header.grid_class, 2);
        assert_eq!(header.blind_metadata_count, 0);
        assert_eq!(header.blind_metadata_offset, 0);
        assert!((header.voxel_size[0] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn over_long_names_are_cut_at_255_bytes() {
        let name = "g".repeat(400);
        let cut = truncated_name(&name);
        assert_eq!(cut.len(), MAX_NAME_SIZE - 1);

        let mut region = vec![0u8; format::GRID_HEADER_SIZE];
        write_grid_header(
            &mut region,
            &name,
            &AffineMap::IDENTITY,
            ValueType::I32,
            GridClass::Unknown,
        );
        let header: GridHeader = format::read_record(&region, 0);
        assert_eq!(header.grid_name[MAX_NAME_SIZE - 1], 0);
        assert_eq!(header.grid_name[MAX_NAME_SIZE - 2], b'g');
    }

    #[test]
    fn world_bbox_covers_all_mapped_corners() {
        let map = AffineMap::uniform_scale(2.0);
        let index_bbox = CoordBBox::new(Coord::new(-1, 0, 0), Coord::new(3, 4, 5));
        let world = world_bbox_from_index(&map, &index_bbox);
        assert_eq!(world.min, DVec3::new(-2.0, 0.0, 0.0));
        assert_eq!(world.max, DVec3::new(6.0, 8.0, 10.0));
        for corner in index_bbox.corners() {
            assert!(world.contains(map.apply(corner)));
        }
    }

    #[test]
    fn tree_header_offsets_are_relative() {
        let plan = LayoutPlan::compute(ValueType::F32, [3, 4, 5], [4, 2, 1]).unwrap();
        let mut region = vec![0u8; format::TREE_HEADER_SIZE];
        write_tree_header(&mut region, &plan);

        let header: TreeHeader = format::read_record(&region, 0);
        let tree_start = plan.offset(Region::Tree);
        assert_eq!(
            header.region_bytes[3] as usize + tree_start,
            plan.offset(Region::Root)
        );
        assert_eq!(
            header.region_bytes[0] as usize + tree_start,
            plan.offset(Region::Leaf)
        );
        assert_eq!(header.node_count, [4, 2, 1, 1]);
    }
}
