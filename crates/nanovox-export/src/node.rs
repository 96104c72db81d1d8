//! Per-node fillers for the leaf and interior regions.
//!
//! Fillers are stateless: each one writes exactly the bytes of its own node
//! slot and reads only the source tree and the already-filled child region.
//! Within a level every filler is independent, so a level is processed as a
//! parallel sweep over disjoint `node_size` chunks; the barrier between
//! levels is the sequential call order in the orchestrator.

use rayon::prelude::*;

use nanovox_core::{Coord, CoordBBox, Value};
use nanovox_tree::TreeSource;

use crate::error::{ExportError, Result};
use crate::format;
use crate::layout::LayoutPlan;

/// Fill the leaf region from the source atlas, one parallel task per leaf.
pub(crate) fn fill_leaves<T: TreeSource + ?Sized>(
    region: &mut [u8],
    tree: &T,
    channel: u32,
    plan: &LayoutPlan,
) -> Result<()> {
    if region.is_empty() {
        return Ok(());
    }
    region
        .par_chunks_mut(plan.node_sizes[0])
        .enumerate()
        .try_for_each(|(n, slot)| fill_leaf(slot, tree, channel, n, plan))
}

fn fill_leaf<T: TreeSource + ?Sized>(
    slot: &mut [u8],
    tree: &T,
    channel: u32,
    n: usize,
    plan: &LayoutPlan,
) -> Result<()> {
    let ty = plan.value_type;
    let ld = plan.log2_dims[0];
    let width = ty.width();
    let voxels = 1usize << (3 * ld);

    let origin = tree.node_origin(0, n);
    let mask = tree.occupancy_mask(0, n);
    if mask.len() != format::mask_words(ld) {
        return Err(ExportError::WorkerFailed(format!(
            "leaf {n}: occupancy mask has {} words, expected {}",
            mask.len(),
            format::mask_words(ld)
        )));
    }
    let values = tree.leaf_values(channel, n);
    if values.len() != voxels * width {
        return Err(ExportError::WorkerFailed(format!(
            "leaf {n}: value block is {} bytes, expected {}",
            values.len(),
            voxels * width
        )));
    }

    let active: u32 = mask.iter().map(|w| w.count_ones()).sum();

    let mut vmin = ty.max_sentinel();
    let mut vmax = ty.min_sentinel();
    for i in 0..voxels {
        let v = Value::read_from(ty, &values[i * width..]);
        vmin = vmin.min(v);
        vmax = vmax.max(v);
    }

    format::write_record(
        slot,
        0,
        &format::LeafPrefix {
            origin: [origin.x, origin.y, origin.z],
            active_voxel_count: active,
        },
    );
    slot[format::LEAF_MASK_OFFSET..][..mask.len() * 8]
        .copy_from_slice(bytemuck::cast_slice(mask));
    vmin.write_to(&mut slot[format::leaf_min_offset(ld)..]);
    vmax.write_to(&mut slot[format::leaf_max_offset(ty, ld)..]);
    slot[format::leaf_values_offset(ty, ld)..][..values.len()].copy_from_slice(values);
    Ok(())
}

/// What an interior node needs to know about one of its children.
pub(crate) struct ChildSummary {
    pub bbox: CoordBBox,
    pub active: u64,
    pub min: Value,
    pub max: Value,
}

/// Summarize an already-filled leaf record.
pub(crate) fn leaf_summary(bytes: &[u8], plan: &LayoutPlan) -> ChildSummary {
    let ty = plan.value_type;
    let ld = plan.log2_dims[0];
    let prefix: format::LeafPrefix = format::read_record(bytes, 0);
    let origin = Coord::new(prefix.origin[0], prefix.origin[1], prefix.origin[2]);
    ChildSummary {
        bbox: CoordBBox::from_origin_dim(origin, 1 << ld),
        active: prefix.active_voxel_count as u64,
        min: Value::read_from(ty, &bytes[format::leaf_min_offset(ld)..]),
        max: Value::read_from(ty, &bytes[format::leaf_max_offset(ty, ld)..]),
    }
}

/// Summarize an already-filled interior record.
pub(crate) fn internal_summary(bytes: &[u8], plan: &LayoutPlan) -> ChildSummary {
    let ty = plan.value_type;
    let prefix: format::InternalPrefix = format::read_record(bytes, 0);
    ChildSummary {
        bbox: CoordBBox::new(
            Coord::new(prefix.bbox[0], prefix.bbox[1], prefix.bbox[2]),
            Coord::new(prefix.bbox[3], prefix.bbox[4], prefix.bbox[5]),
        ),
        active: prefix.active_voxel_count,
        min: Value::read_from(ty, &bytes[format::INTERNAL_VALUES_OFFSET..]),
        max: Value::read_from(ty, &bytes[format::internal_max_offset(ty)..]),
    }
}

/// Fill the interior region of `level` (1 or 2), one parallel task per node.
///
/// `child_region` must hold the completely filled records of `level - 1`;
/// child offsets written into the slot table are relative to the owning
/// node's start, which is what makes the image position-independent.
pub(crate) fn fill_internal_level<T: TreeSource + ?Sized>(
    level: u32,
    region: &mut [u8],
    child_region: &[u8],
    tree: &T,
    plan: &LayoutPlan,
    background: Value,
) -> Result<()> {
    if region.is_empty() {
        return Ok(());
    }
    region
        .par_chunks_mut(plan.node_sizes[level as usize])
        .enumerate()
        .try_for_each(|(n, slot)| {
            fill_internal(slot, child_region, tree, plan, level, n, background)
        })
}

#[allow(clippy::too_many_arguments)]
fn fill_internal<T: TreeSource + ?Sized>(
    slot: &mut [u8],
    child_region: &[u8],
    tree: &T,
    plan: &LayoutPlan,
    level: u32,
    n: usize,
    background: Value,
) -> Result<()> {
    let ty = plan.value_type;
    let ld = plan.log2_dims[level as usize];
    let slots = 1usize << (3 * ld);
    let child_level = level - 1;
    let child_size = plan.node_sizes[child_level as usize];
    let stride = format::internal_slot_stride(ty);
    let table_offset = format::internal_table_offset(ty, ld);

    // Absolute positions inside the image, for node-relative child offsets.
    let node_abs = plan.offset(LayoutPlan::level_region(level)) + n * plan.node_sizes[level as usize];
    let children_abs = plan.offset(LayoutPlan::level_region(child_level));

    let origin = tree.node_origin(level, n);
    let mask = tree.occupancy_mask(level, n);
    if mask.len() != format::mask_words(ld) {
        return Err(ExportError::WorkerFailed(format!(
            "level {level} node {n}: child mask has {} words, expected {}",
            mask.len(),
            format::mask_words(ld)
        )));
    }

    let mut bbox = CoordBBox::empty();
    let mut active: u64 = 0;
    let mut vmin = ty.max_sentinel();
    let mut vmax = ty.min_sentinel();

    for slot_idx in 0..slots {
        let present = mask[slot_idx / 64] >> (slot_idx % 64) & 1 != 0;
        let entry_offset = table_offset + slot_idx * stride;
        if present {
            let child = tree.child_at(level, n, slot_idx).ok_or_else(|| {
                ExportError::WorkerFailed(format!(
                    "level {level} node {n}: slot {slot_idx} is masked occupied but has no child"
                ))
            })? as usize;
            let child_end = (child + 1) * child_size;
            if child_end > child_region.len() {
                return Err(ExportError::WorkerFailed(format!(
                    "level {level} node {n}: child {child} is outside the child region"
                )));
            }
            let child_bytes = &child_region[child * child_size..child_end];
            let summary = if child_level == 0 {
                leaf_summary(child_bytes, plan)
            } else {
                internal_summary(child_bytes, plan)
            };
            bbox.expand_bbox(&summary.bbox);
            active += summary.active;
            vmin = vmin.min(summary.min);
            vmax = vmax.max(summary.max);

            let relative = (children_abs + child * child_size) as i64 - node_abs as i64;
            format::write_record(slot, entry_offset, &relative);
        } else {
            background.write_to(&mut slot[entry_offset..entry_offset + ty.width()]);
        }
    }

    format::write_record(
        slot,
        0,
        &format::InternalPrefix {
            origin: [origin.x, origin.y, origin.z],
            flags: 0,
            bbox: [
                bbox.min.x, bbox.min.y, bbox.min.z, bbox.max.x, bbox.max.y, bbox.max.z,
            ],
            active_voxel_count: active,
        },
    );
    vmin.write_to(&mut slot[format::INTERNAL_VALUES_OFFSET..]);
    vmax.write_to(&mut slot[format::internal_max_offset(ty)..]);
    slot[format::internal_mask_offset(ty)..][..mask.len() * 8]
        .copy_from_slice(bytemuck::cast_slice(mask));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nanovox_core::{Coord, ValueType};
    use nanovox_tree::HostTreeBuilder;

    fn one_leaf_tree() -> (nanovox_tree::HostTree, u32) {
        let mut builder = HostTreeBuilder::new(2, 1, 1).unwrap();
        let channel = builder.add_channel(ValueType::F32);
        for z in 0..4 {
            for y in 0..4 {
                for x in 0..4 {
                    builder
                        .set_value(channel, Coord::new(x, y, z), Value::F32((x + y + z) as f32))
                        .unwrap();
                }
            }
        }
        (builder.build(), channel)
    }

    #[test]
    fn leaf_filler_writes_prefix_mask_and_extremes() {
        let (tree, channel) = one_leaf_tree();
        let plan = LayoutPlan::compute(ValueType::F32, [2, 1, 1], [1, 1, 1]).unwrap();

        let mut region = vec![0u8; plan.node_sizes[0]];
        fill_leaves(&mut region, &tree, channel, &plan).unwrap();

        let prefix: format::LeafPrefix = format::read_record(&region, 0);
        assert_eq!(prefix.origin, [0, 0, 0]);
        assert_eq!(prefix.active_voxel_count, 64);

        let summary = leaf_summary(&region, &plan);
        assert_eq!(summary.min, Value::F32(0.0));
        assert_eq!(summary.max, Value::F32(9.0));
        assert_eq!(summary.bbox.max, Coord::new(3, 3, 3));

        // Value table is in (x << 2L) | (y << L) | z order.
        let index = (1 << 4) | (2 << 2) | 3;
        let v = Value::read_from(
            ValueType::F32,
            &region[format::leaf_values_offset(ValueType::F32, 2) + index * 4..],
        );
        assert_eq!(v, Value::F32(6.0));
    }

    #[test]
    fn internal_filler_links_children_and_folds_summaries() {
        let (tree, channel) = one_leaf_tree();
        let plan = LayoutPlan::compute(ValueType::F32, [2, 1, 1], [1, 1, 1]).unwrap();

        let mut leaf_region = vec![0u8; plan.sizes[5]];
        fill_leaves(&mut leaf_region, &tree, channel, &plan).unwrap();

        let mut node1_region = vec![0u8; plan.sizes[4]];
        fill_internal_level(
            1,
            &mut node1_region,
            &leaf_region,
            &tree,
            &plan,
            Value::F32(-1.0),
        )
        .unwrap();

        let prefix: format::InternalPrefix = format::read_record(&node1_region, 0);
        assert_eq!(prefix.origin, [0, 0, 0]);
        assert_eq!(prefix.active_voxel_count, 64);
        assert_eq!(prefix.bbox, [0, 0, 0, 3, 3, 3]);

        // Slot 0 holds the node-relative offset of leaf 0.
        let table = format::internal_table_offset(ValueType::F32, 1);
        let rel: i64 = format::read_record(&node1_region, table);
        assert_eq!(
            rel,
            (plan.offsets[5] as i64) - (plan.offsets[4] as i64)
        );

        // Every other slot holds the background verbatim.
        let absent: f32 = format::read_record(&node1_region, table + format::internal_slot_stride(ValueType::F32));
        assert_eq!(absent, -1.0);
    }

    #[test]
    fn mismatched_atlas_block_is_a_worker_fault() {
        let (tree, channel) = one_leaf_tree();
        // Plan claims a bigger leaf than the tree provides.
        let plan = LayoutPlan::compute(ValueType::F32, [3, 1, 1], [1, 1, 1]).unwrap();
        let mut region = vec![0u8; plan.node_sizes[0]];
        let err = fill_leaves(&mut region, &tree, channel, &plan).unwrap_err();
        assert!(matches!(err, ExportError::WorkerFailed(_)));
    }
}
