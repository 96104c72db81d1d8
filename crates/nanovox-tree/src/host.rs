//! In-memory three-level sparse voxel tree.
//!
//! `HostTree` keeps node topology in flat per-level arrays so exporters can
//! walk it by index without chasing pointers. Trees are constructed through
//! [`HostTreeBuilder`], which activates leaves voxel-by-voxel and creates
//! interior nodes on demand.

use hashbrown::HashMap;

use nanovox_core::constants::{MAX_LOG2_DIM, MIN_LOG2_DIM};
use nanovox_core::{AffineMap, Coord, Error, Result, Value, ValueType};

use crate::access::TreeSource;
use crate::atlas::Atlas;

/// Sentinel for an unoccupied child slot.
const NO_CHILD: u32 = u32::MAX;

/// Flat node storage for one tree level.
#[derive(Clone, Debug, Default)]
struct LevelNodes {
    origins: Vec<Coord>,
    /// Occupancy words, `mask_words` per node.
    masks: Vec<u64>,
    /// Child ids, one per slot per node. Empty for level 0.
    children: Vec<u32>,
    mask_words: usize,
    slots: usize,
}

impl LevelNodes {
    fn new(log2_dim: u32, with_children: bool) -> Self {
        let slots = 1usize << (3 * log2_dim);
        Self {
            origins: Vec::new(),
            masks: Vec::new(),
            children: Vec::new(),
            mask_words: slots.div_ceil(64),
            slots: if with_children { slots } else { 0 },
        }
    }

    fn push(&mut self, origin: Coord, mask_fill: u64) -> u32 {
        let id = self.origins.len() as u32;
        self.origins.push(origin);
        self.masks
            .extend(std::iter::repeat(mask_fill).take(self.mask_words));
        self.children
            .extend(std::iter::repeat(NO_CHILD).take(self.slots));
        id
    }

    fn mask(&self, node: usize) -> &[u64] {
        &self.masks[node * self.mask_words..(node + 1) * self.mask_words]
    }

    fn set_mask_bit(&mut self, node: usize, bit: usize) {
        self.masks[node * self.mask_words + bit / 64] |= 1 << (bit % 64);
    }

    fn link_child(&mut self, node: usize, slot: usize, child: u32) {
        self.children[node * self.slots + slot] = child;
        self.set_mask_bit(node, slot);
    }

    fn child(&self, node: usize, slot: usize) -> Option<u32> {
        match self.children.get(node * self.slots + slot) {
            Some(&c) if c != NO_CHILD => Some(c),
            _ => None,
        }
    }
}

/// Immutable in-memory three-level sparse voxel tree with per-channel
/// value atlases.
#[derive(Clone, Debug)]
pub struct HostTree {
    log2_dims: [u32; 3],
    levels: [LevelNodes; 3],
    channels: Vec<Atlas>,
    map: AffineMap,
}

impl HostTree {
    /// Number of voxels in one leaf.
    pub fn voxels_per_leaf(&self) -> usize {
        1 << (3 * self.log2_dims[0])
    }
}

impl TreeSource for HostTree {
    fn log2_dim(&self, level: u32) -> u32 {
        self.log2_dims[level as usize]
    }

    fn node_count(&self, level: u32) -> usize {
        self.levels[level as usize].origins.len()
    }

    fn node_origin(&self, level: u32, node: usize) -> Coord {
        self.levels[level as usize].origins[node]
    }

    fn occupancy_mask(&self, level: u32, node: usize) -> &[u64] {
        self.levels[level as usize].mask(node)
    }

    fn child_at(&self, level: u32, node: usize, slot: usize) -> Option<u32> {
        self.levels[level as usize].child(node, slot)
    }

    fn channel_count(&self) -> u32 {
        self.channels.len() as u32
    }

    fn channel_type_tag(&self, channel: u32) -> Option<u32> {
        self.channels
            .get(channel as usize)
            .map(|atlas| atlas.value_type().wire_tag())
    }

    fn leaf_values(&self, channel: u32, leaf: usize) -> &[u8] {
        self.channels[channel as usize].block(leaf)
    }

    fn index_to_world(&self) -> AffineMap {
        self.map
    }
}

/// Builder that activates leaves and writes voxel values into a
/// [`HostTree`].
///
/// Interior nodes are created automatically when a leaf below them is first
/// activated; every voxel of an activated leaf is considered active.
pub struct HostTreeBuilder {
    log2_dims: [u32; 3],
    levels: [LevelNodes; 3],
    channels: Vec<Atlas>,
    map: AffineMap,
    /// Per-level origin → node id.
    index: [HashMap<Coord, u32>; 3],
}

impl HostTreeBuilder {
    /// Create a builder with the given per-level branching exponents
    /// (leaf, level 1, level 2), each in `[1, 8]`.
    pub fn new(leaf_log2_dim: u32, node1_log2_dim: u32, node2_log2_dim: u32) -> Result<Self> {
        let log2_dims = [leaf_log2_dim, node1_log2_dim, node2_log2_dim];
        for (level, &ld) in log2_dims.iter().enumerate() {
            if !(MIN_LOG2_DIM..=MAX_LOG2_DIM).contains(&ld) {
                return Err(Error::InvalidData(format!(
                    "level {level} log2dim {ld} outside [{MIN_LOG2_DIM}, {MAX_LOG2_DIM}]"
                )));
            }
        }
        Ok(Self {
            log2_dims,
            levels: [
                LevelNodes::new(log2_dims[0], false),
                LevelNodes::new(log2_dims[1], true),
                LevelNodes::new(log2_dims[2], true),
            ],
            channels: Vec::new(),
            map: AffineMap::IDENTITY,
            index: [HashMap::new(), HashMap::new(), HashMap::new()],
        })
    }

    /// Set the index-to-world transform.
    pub fn with_transform(mut self, map: AffineMap) -> Self {
        self.map = map;
        self
    }

    /// Declare a value channel; returns its index.
    ///
    /// Leaves activated before the channel was declared get zeroed blocks.
    pub fn add_channel(&mut self, value_type: ValueType) -> u32 {
        let mut atlas = Atlas::new(value_type, 1 << (3 * self.log2_dims[0]));
        for _ in 0..self.levels[0].origins.len() {
            atlas.push_block();
        }
        self.channels.push(atlas);
        self.channels.len() as u32 - 1
    }

    /// Voxel span of a node at `level`, per axis.
    fn span(&self, level: u32) -> i32 {
        let shift: u32 = (0..=level).map(|l| self.log2_dims[l as usize]).sum();
        1 << shift
    }

    /// Origin of the node at `level` containing `at`.
    fn aligned_origin(&self, level: u32, at: Coord) -> Coord {
        let mask = !(self.span(level) - 1);
        Coord::new(at.x & mask, at.y & mask, at.z & mask)
    }

    /// Linear child-slot index of `child_origin` within its parent at
    /// `level`, using the `(i << 2L) | (j << L) | k` ordering.
    fn child_slot(&self, level: u32, parent_origin: Coord, child_origin: Coord) -> usize {
        let child_span = self.span(level - 1);
        let ld = self.log2_dims[level as usize];
        let i = ((child_origin.x - parent_origin.x) / child_span) as usize;
        let j = ((child_origin.y - parent_origin.y) / child_span) as usize;
        let k = ((child_origin.z - parent_origin.z) / child_span) as usize;
        (i << (2 * ld)) | (j << ld) | k
    }

    /// Activate the leaf containing `at`, creating parents as needed, and
    /// return its id. Every voxel of the leaf becomes active.
    pub fn touch_leaf(&mut self, at: Coord) -> u32 {
        let leaf_origin = self.aligned_origin(0, at);
        if let Some(&leaf) = self.index[0].get(&leaf_origin) {
            return leaf;
        }

        // Leaf voxel mask: every voxel active.
        let voxels = 1usize << (3 * self.log2_dims[0]);
        let fill = if voxels >= 64 {
            u64::MAX
        } else {
            (1u64 << voxels) - 1
        };
        let leaf = self.levels[0].push(leaf_origin, fill);
        self.index[0].insert(leaf_origin, leaf);
        for atlas in &mut self.channels {
            atlas.push_block();
        }

        // Create or find the interior chain above the leaf.
        let mut child = leaf;
        let mut child_origin = leaf_origin;
        for level in 1..=2u32 {
            let origin = self.aligned_origin(level, at);
            let existing = self.index[level as usize].get(&origin).copied();
            let (node, existed) = match existing {
                Some(n) => (n, true),
                None => {
                    let n = self.levels[level as usize].push(origin, 0);
                    self.index[level as usize].insert(origin, n);
                    (n, false)
                }
            };
            let slot = self.child_slot(level, origin, child_origin);
            self.levels[level as usize].link_child(node as usize, slot, child);
            if existed {
                break;
            }
            child = node;
            child_origin = origin;
        }
        leaf
    }

    /// Write one voxel value, activating the containing leaf.
    pub fn set_value(&mut self, channel: u32, at: Coord, value: Value) -> Result<()> {
        let leaf = self.touch_leaf(at);
        let origin = self.aligned_origin(0, at);
        let ld = self.log2_dims[0];
        let x = (at.x - origin.x) as usize;
        let y = (at.y - origin.y) as usize;
        let z = (at.z - origin.z) as usize;
        let index = (x << (2 * ld)) | (y << ld) | z;
        self.atlas_mut(channel)?.write_value(leaf as usize, index, value)
    }

    /// Fill every voxel of the leaf containing `at` with one value.
    pub fn fill_leaf(&mut self, channel: u32, at: Coord, value: Value) -> Result<()> {
        let leaf = self.touch_leaf(at);
        self.atlas_mut(channel)?.fill_block(leaf as usize, value)
    }

    fn atlas_mut(&mut self, channel: u32) -> Result<&mut Atlas> {
        self.channels
            .get_mut(channel as usize)
            .ok_or_else(|| Error::OutOfBounds(format!("channel {channel} does not exist")))
    }

    /// Finish building.
    pub fn build(self) -> HostTree {
        HostTree {
            log2_dims: self.log2_dims,
            levels: self.levels,
            channels: self.channels,
            map: self.map,
        }
    }
}
