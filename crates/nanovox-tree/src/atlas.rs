//! Flat storage of packed per-leaf voxel values for one channel.

use nanovox_core::{Error, Result, Value, ValueType};

/// Packed voxel-value blocks for every leaf of one channel.
///
/// Blocks are fixed-width (`voxels per leaf × value width`) and indexed by
/// leaf id, so the exporter can copy a leaf's values with a single slice
/// read.
#[derive(Clone, Debug)]
pub struct Atlas {
    value_type: ValueType,
    block_len: usize,
    data: Vec<u8>,
}

impl Atlas {
    /// Create an empty atlas for `voxels_per_leaf` values of `value_type`.
    pub fn new(value_type: ValueType, voxels_per_leaf: usize) -> Self {
        Self {
            value_type,
            block_len: voxels_per_leaf * value_type.width(),
            data: Vec::new(),
        }
    }

    /// Value type stored in this atlas.
    #[inline]
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// Byte length of one leaf block.
    #[inline]
    pub fn block_len(&self) -> usize {
        self.block_len
    }

    /// Number of leaf blocks.
    pub fn len(&self) -> usize {
        if self.block_len == 0 {
            0
        } else {
            self.data.len() / self.block_len
        }
    }

    /// True if no block has been allocated.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append a zeroed block and return its leaf id.
    pub fn push_block(&mut self) -> usize {
        let id = self.len();
        self.data.resize(self.data.len() + self.block_len, 0);
        id
    }

    /// Packed bytes of one leaf block.
    pub fn block(&self, leaf: usize) -> &[u8] {
        let start = leaf * self.block_len;
        &self.data[start..start + self.block_len]
    }

    /// Mutable packed bytes of one leaf block.
    pub fn block_mut(&mut self, leaf: usize) -> &mut [u8] {
        let start = leaf * self.block_len;
        &mut self.data[start..start + self.block_len]
    }

    /// Write one voxel value at `index` within a leaf block.
    pub fn write_value(&mut self, leaf: usize, index: usize, value: Value) -> Result<()> {
        if value.value_type() != self.value_type {
            return Err(Error::TypeMismatch(format!(
                "atlas stores {:?}, got {:?}",
                self.value_type,
                value.value_type()
            )));
        }
        let width = self.value_type.width();
        let offset = index * width;
        if offset + width > self.block_len {
            return Err(Error::OutOfBounds(format!(
                "voxel index {index} exceeds block of {} values",
                self.block_len / width
            )));
        }
        value.write_to(&mut self.block_mut(leaf)[offset..offset + width]);
        Ok(())
    }

    /// Read one voxel value at `index` within a leaf block.
    pub fn read_value(&self, leaf: usize, index: usize) -> Value {
        let width = self.value_type.width();
        let offset = index * width;
        Value::read_from(self.value_type, &self.block(leaf)[offset..offset + width])
    }

    /// Fill an entire leaf block with one value.
    pub fn fill_block(&mut self, leaf: usize, value: Value) -> Result<()> {
        let count = self.block_len / self.value_type.width();
        for i in 0..count {
            self.write_value(leaf, i, value)?;
        }
        Ok(())
    }
}
