//! Export orchestration.
//!
//! One call turns a read-only source tree into a sealed, self-describing
//! grid image: validate → plan the layout → allocate → fill node regions
//! level by level (parallel within a level, barriers between levels) while
//! the host writes the grid and tree headers → build the root from the
//! finished level-2 region → patch the world bounds → hand the buffer to the
//! caller. Any failure after allocation drops the buffer; no partial image
//! escapes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use nanovox_core::constants::{MAX_LOG2_DIM, MIN_LOG2_DIM};
use nanovox_core::{GridClass, Value, ValueType};
use nanovox_tree::TreeSource;

use crate::buffer::{split_regions, GridBuffer};
use crate::error::{ExportError, Result};
use crate::headers::{patch_world_bbox, world_bbox_from_index, write_grid_header, write_tree_header};
use crate::layout::LayoutPlan;
use crate::node::{fill_internal_level, fill_leaves};
use crate::root::build_root;

/// Cloneable handle for cooperative cancellation.
///
/// Fillers check the flag at the barriers between tree levels; a cancelled
/// export fails with [`ExportError::Cancelled`] and frees its buffer.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// True once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Optional knobs for [`export_with`].
#[derive(Clone, Debug, Default)]
pub struct ExportOptions {
    /// Cancellation handle checked at inter-level barriers.
    pub cancel: Option<CancelToken>,
}

impl ExportOptions {
    fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(ExportError::Cancelled),
            _ => Ok(()),
        }
    }
}

/// A sealed grid image, ready to map, transmit, or persist.
///
/// The image is a single contiguous block; the caller owns it once the
/// export returns.
#[derive(Clone, Debug)]
pub struct ExportedGrid {
    data: Vec<u8>,
}

impl ExportedGrid {
    /// The image bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Total image size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True only for a zero-byte image, which no export produces.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Take ownership of the image bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

/// Export one channel of a source tree as a grid image.
///
/// `background` must be a value of the channel's type; its bits are copied
/// verbatim into the root record. `grid_name` is truncated or zero-padded to
/// the fixed header field. `grid_class` is copied through as a tag.
pub fn export<T: TreeSource + ?Sized>(
    tree: &T,
    channel: u32,
    background: Value,
    grid_name: &str,
    grid_class: GridClass,
) -> Result<ExportedGrid> {
    export_with(
        tree,
        channel,
        background,
        grid_name,
        grid_class,
        &ExportOptions::default(),
    )
}

/// [`export`] with explicit options.
pub fn export_with<T: TreeSource + ?Sized>(
    tree: &T,
    channel: u32,
    background: Value,
    grid_name: &str,
    grid_class: GridClass,
    options: &ExportOptions,
) -> Result<ExportedGrid> {
    // Everything that can fail cheaply fails before the allocation.
    let type_tag = tree.channel_type_tag(channel).ok_or_else(|| {
        ExportError::InvalidArgument(format!(
            "channel {channel} does not exist (tree has {})",
            tree.channel_count()
        ))
    })?;
    let value_type =
        ValueType::from_wire_tag(type_tag).ok_or(ExportError::TypeUnsupported(type_tag))?;
    if background.value_type() != value_type {
        return Err(ExportError::InvalidArgument(format!(
            "background is {:?} but channel {channel} stores {:?}",
            background.value_type(),
            value_type
        )));
    }

    let log2_dims = [tree.log2_dim(0), tree.log2_dim(1), tree.log2_dim(2)];
    for (level, &ld) in log2_dims.iter().enumerate() {
        if !(MIN_LOG2_DIM..=MAX_LOG2_DIM).contains(&ld) {
            return Err(ExportError::Log2DimOutOfRange {
                level: level as u32,
                log2_dim: ld,
            });
        }
    }

    // The root key stores 21 bits per axis above the level-2 span.
    let total_log2_dim: u32 = log2_dims.iter().sum();
    if 32 - (total_log2_dim as i64) > 21 {
        return Err(ExportError::KeyOverflow { total_log2_dim });
    }

    let node_counts = [
        tree.node_count(0),
        tree.node_count(1),
        tree.node_count(2),
    ];
    let plan = LayoutPlan::compute(value_type, log2_dims, node_counts)?;

    debug!(
        leaves = node_counts[0],
        node1 = node_counts[1],
        node2 = node_counts[2],
        total_bytes = plan.total_size(),
        "export layout planned"
    );

    let mut buffer = GridBuffer::allocate(plan.total_size())?;
    let map = tree.index_to_world();

    {
        let regions = split_regions(buffer.as_mut_slice(), &plan);
        let (grid_region, tree_region) = (regions.grid, regions.tree);
        let (node2_region, node1_region, leaf_region) =
            (regions.node2, regions.node1, regions.leaf);

        // Node fillers and header writers touch disjoint regions, so they
        // run concurrently; levels are separated by barriers because each
        // level reads the summaries its children wrote.
        let fill = || -> Result<()> {
            fill_leaves(leaf_region, tree, channel, &plan)?;
            options.check_cancelled()?;
            debug!("leaf region filled");

            fill_internal_level(1, node1_region, leaf_region, tree, &plan, background)?;
            options.check_cancelled()?;
            debug!("level-1 region filled");

            fill_internal_level(2, node2_region, node1_region, tree, &plan, background)?;
            options.check_cancelled()?;
            debug!("level-2 region filled");
            Ok(())
        };
        let headers = || -> Result<()> {
            write_grid_header(grid_region, grid_name, &map, value_type, grid_class);
            write_tree_header(tree_region, &plan);
            Ok(())
        };
        let (filled, headed) = rayon::join(fill, headers);
        filled?;
        headed?;

        let extents = build_root(regions.root, node2_region, &plan, background)?;
        let world = world_bbox_from_index(&map, &extents.index_bbox);
        patch_world_bbox(grid_region, &world);
    }

    info!(
        name = grid_name,
        bytes = buffer.len(),
        leaves = node_counts[0],
        "grid image sealed"
    );
    Ok(ExportedGrid {
        data: buffer.into_inner(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nanovox_core::{Coord, ValueType};
    use nanovox_tree::HostTreeBuilder;

    fn simple_tree() -> nanovox_tree::HostTree {
        let mut builder = HostTreeBuilder::new(3, 4, 5).unwrap();
        let channel = builder.add_channel(ValueType::F32);
        builder
            .fill_leaf(channel, Coord::ZERO, Value::F32(1.0))
            .unwrap();
        builder.build()
    }

    #[test]
    fn missing_channel_is_invalid_argument() {
        let tree = simple_tree();
        let err = export(&tree, 7, Value::F32(0.0), "g", GridClass::Unknown).unwrap_err();
        assert!(matches!(err, ExportError::InvalidArgument(_)));
    }

    #[test]
    fn background_type_mismatch_is_invalid_argument() {
        let tree = simple_tree();
        let err = export(&tree, 0, Value::I32(0), "g", GridClass::Unknown).unwrap_err();
        assert!(matches!(err, ExportError::InvalidArgument(_)));
    }

    #[test]
    fn key_overflow_is_rejected_before_allocation() {
        // T = 10 leaves 22 bits above the level-2 span, one too many.
        let mut builder = HostTreeBuilder::new(4, 3, 3).unwrap();
        let channel = builder.add_channel(ValueType::F32);
        builder
            .fill_leaf(channel, Coord::ZERO, Value::F32(1.0))
            .unwrap();
        let tree = builder.build();

        let err = export(&tree, 0, Value::F32(0.0), "g", GridClass::Unknown).unwrap_err();
        assert!(matches!(
            err,
            ExportError::KeyOverflow { total_log2_dim: 10 }
        ));
    }

    #[test]
    fn pre_cancelled_export_fails_with_cancelled() {
        let tree = simple_tree();
        let token = CancelToken::new();
        token.cancel();
        let options = ExportOptions {
            cancel: Some(token),
        };
        let err = export_with(
            &tree,
            0,
            Value::F32(0.0),
            "g",
            GridClass::Unknown,
            &options,
        )
        .unwrap_err();
        assert!(matches!(err, ExportError::Cancelled));
    }

    #[test]
    fn token_observes_cancel_across_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
