//! Output buffer allocation and region carving.

use crate::error::{ExportError, Result};
use crate::layout::{LayoutPlan, Region};

/// The single contiguous output block, owned by the exporter until the
/// image is sealed.
///
/// The whole block is zero-initialized so header padding and unwritten tile
/// slots are reproducible; node fillers overwrite every byte of their own
/// slots.
pub struct GridBuffer {
    data: Vec<u8>,
}

impl GridBuffer {
    /// Allocate a zeroed block of `total` bytes.
    ///
    /// Allocator rejection surfaces as [`ExportError::AllocationFailed`]
    /// instead of aborting the process.
    pub fn allocate(total: usize) -> Result<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(total)
            .map_err(|_| ExportError::AllocationFailed(total))?;
        data.resize(total, 0);
        Ok(Self { data })
    }

    /// Total byte length.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True for the zero-byte buffer.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Mutable view of the whole block.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Transfer ownership of the sealed image to the caller.
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

/// Disjoint mutable views of the six image regions.
///
/// Each byte of the buffer belongs to exactly one view, so fillers for
/// different regions can run concurrently without synchronization.
pub struct RegionSlices<'a> {
    pub grid: &'a mut [u8],
    pub tree: &'a mut [u8],
    pub root: &'a mut [u8],
    pub node2: &'a mut [u8],
    pub node1: &'a mut [u8],
    pub leaf: &'a mut [u8],
}

/// Carve a buffer into its per-region slices according to `plan`.
pub fn split_regions<'a>(buf: &'a mut [u8], plan: &LayoutPlan) -> RegionSlices<'a> {
    debug_assert_eq!(buf.len(), plan.total_size());
    let (grid, rest) = buf.split_at_mut(plan.size(Region::Grid));
    let (tree, rest) = rest.split_at_mut(plan.size(Region::Tree));
    let (root, rest) = rest.split_at_mut(plan.size(Region::Root));
    let (node2, rest) = rest.split_at_mut(plan.size(Region::Node2));
    let (node1, leaf) = rest.split_at_mut(plan.size(Region::Node1));
    RegionSlices {
        grid,
        tree,
        root,
        node2,
        node1,
        leaf,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nanovox_core::ValueType;

    #[test]
    fn allocation_is_zeroed() {
        let buffer = GridBuffer::allocate(1024).unwrap();
        assert_eq!(buffer.len(), 1024);
        assert!(buffer.into_inner().iter().all(|&b| b == 0));
    }

    #[test]
    fn regions_tile_the_buffer() {
        let plan = LayoutPlan::compute(ValueType::I32, [2, 3, 4], [5, 2, 1]).unwrap();
        let mut buffer = GridBuffer::allocate(plan.total_size()).unwrap();
        let regions = split_regions(buffer.as_mut_slice(), &plan);

        assert_eq!(regions.grid.len(), plan.size(Region::Grid));
        assert_eq!(regions.tree.len(), plan.size(Region::Tree));
        assert_eq!(regions.root.len(), plan.size(Region::Root));
        assert_eq!(regions.node2.len(), plan.size(Region::Node2));
        assert_eq!(regions.node1.len(), plan.size(Region::Node1));
        assert_eq!(regions.leaf.len(), plan.size(Region::Leaf));

        let total: usize = [
            regions.grid.len(),
            regions.tree.len(),
            regions.root.len(),
            regions.node2.len(),
            regions.node1.len(),
            regions.leaf.len(),
        ]
        .iter()
        .sum();
        assert_eq!(total, plan.total_size());
    }
}
