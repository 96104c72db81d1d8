//! Wire records of the output grid image.
//!
//! The image is a single contiguous block laid out as
//! `grid header | tree header | root | level-2 nodes | level-1 nodes |
//! leaves`, self-describing from its start. Everything here is the single
//! source of truth for that encoding: fixed records are `#[repr(C)]` `Pod`
//! structs, and the variable parts of node records (masks and per-slot
//! tables, whose extent depends on the branching factors) are located by the
//! `const fn` offset helpers below. Writer and reader both compute the same
//! offsets from the same parameters, so nothing in the image stores a
//! pointer.
//!
//! Every record size is rounded up to [`DATA_ALIGNMENT`], so each node slot
//! starts 32-byte aligned relative to the image start.

use bytemuck::{Pod, Zeroable};

use nanovox_core::{AffineMap, ValueType};

/// First eight bytes of every grid image: "NanoVDB0", LSB first.
pub const MAGIC: u64 = 0x304244566f6e614e;

/// Fixed width of the grid-name field, including its NUL terminator.
pub const MAX_NAME_SIZE: usize = 256;

/// Records are padded so every node slot starts on this boundary.
pub const DATA_ALIGNMENT: usize = 32;

/// Round `n` up to a multiple of `align` (a power of two).
#[inline]
pub const fn align_up(n: usize, align: usize) -> usize {
    (n + align - 1) & !(align - 1)
}

/// Copy a record into `buf` at `offset`.
#[inline]
pub fn write_record<T: Pod>(buf: &mut [u8], offset: usize, value: &T) {
    let bytes = bytemuck::bytes_of(value);
    buf[offset..offset + bytes.len()].copy_from_slice(bytes);
}

/// Read a record out of `buf` at `offset`.
#[inline]
pub fn read_record<T: Pod>(buf: &[u8], offset: usize) -> T {
    bytemuck::pod_read_unaligned(&buf[offset..offset + std::mem::size_of::<T>()])
}

/// Affine index↔world transform as stored in the grid header.
///
/// Row-major 3×3 matrix plus translation, in both single and double
/// precision; `applyMap`-style readers compute `M · p + t` from the rows.
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
pub struct MapRecord {
    pub mat_f: [f32; 9],
    pub inv_mat_f: [f32; 9],
    pub vec_f: [f32; 3],
    pub taper_f: f32,
    pub mat_d: [f64; 9],
    pub inv_mat_d: [f64; 9],
    pub vec_d: [f64; 3],
    pub taper_d: f64,
}

const _: () = assert!(std::mem::size_of::<MapRecord>() == 264);

impl MapRecord {
    /// Encode an affine map. The taper field is unused and fixed at 1.
    pub fn from_affine(map: &AffineMap) -> Self {
        let fwd = map.index_to_world();
        let inv = map.world_to_index();

        let mut mat_f = [0.0f32; 9];
        let mut inv_mat_f = [0.0f32; 9];
        for row in 0..3 {
            for col in 0..3 {
                mat_f[3 * row + col] = fwd.col(col)[row];
                inv_mat_f[3 * row + col] = inv.col(col)[row];
            }
        }
        let vec_f = [fwd.col(3).x, fwd.col(3).y, fwd.col(3).z];

        let mut mat_d = [0.0f64; 9];
        let mut inv_mat_d = [0.0f64; 9];
        for i in 0..9 {
            mat_d[i] = mat_f[i] as f64;
            inv_mat_d[i] = inv_mat_f[i] as f64;
        }

        Self {
            mat_f,
            inv_mat_f,
            vec_f,
            taper_f: 1.0,
            mat_d,
            inv_mat_d,
            vec_d: [vec_f[0] as f64, vec_f[1] as f64, vec_f[2] as f64],
            taper_d: 1.0,
        }
    }
}

/// Grid header: the first record of the image.
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
pub struct GridHeader {
    pub magic: u64,
    /// NUL-padded grid name.
    pub grid_name: [u8; MAX_NAME_SIZE],
    pub map: MapRecord,
    /// World-space bounds as min xyz then max xyz.
    pub world_bbox: [f64; 6],
    /// Per-axis voxel size derived from the map.
    pub voxel_size: [f64; 3],
    pub grid_class: u32,
    pub grid_type: u32,
    pub blind_metadata_offset: i64,
    pub blind_metadata_count: u32,
    pub _pad: [u32; 5],
}

pub const GRID_HEADER_SIZE: usize = 640;
const _: () = assert!(std::mem::size_of::<GridHeader>() == GRID_HEADER_SIZE);

/// Tree header: per-level region offsets and node counts.
///
/// `region_bytes[level]` is the byte offset from the tree header start to
/// the node region of that level (0 = leaf, 1, 2, 3 = root).
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
pub struct TreeHeader {
    pub region_bytes: [u64; 4],
    pub node_count: [u32; 4],
    pub _pad: [u32; 4],
}

pub const TREE_HEADER_SIZE: usize = 64;
const _: () = assert!(std::mem::size_of::<TreeHeader>() == TREE_HEADER_SIZE);

/// Fixed front of the root record; the background / min / max values follow
/// at [`ROOT_VALUES_OFFSET`], then the tile array.
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
pub struct RootPrefix {
    /// Index-space bounds as min xyz then max xyz.
    pub bbox: [i32; 6],
    pub active_voxel_count: u64,
    pub tile_count: u32,
    pub _pad: u32,
}

/// Offset of the background value within the root record.
pub const ROOT_VALUES_OFFSET: usize = 40;
const _: () = assert!(std::mem::size_of::<RootPrefix>() == ROOT_VALUES_OFFSET);

/// Byte size of the fixed root record (tiles excluded).
#[inline]
pub const fn root_size(ty: ValueType) -> usize {
    align_up(ROOT_VALUES_OFFSET + 3 * ty.width(), DATA_ALIGNMENT)
}

/// Offset of the root minimum value.
#[inline]
pub const fn root_min_offset(ty: ValueType) -> usize {
    ROOT_VALUES_OFFSET + ty.width()
}

/// Offset of the root maximum value.
#[inline]
pub const fn root_max_offset(ty: ValueType) -> usize {
    ROOT_VALUES_OFFSET + 2 * ty.width()
}

/// Fixed front of a root tile; the tile value slot follows at
/// [`TILE_VALUE_OFFSET`].
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
pub struct TilePrefix {
    /// 63-bit spatial key the tile array is sorted by.
    pub key: u64,
    /// Index of the referenced level-2 node.
    pub child_id: i32,
    pub state: u32,
}

/// Offset of the value slot within a tile.
pub const TILE_VALUE_OFFSET: usize = 16;
const _: () = assert!(std::mem::size_of::<TilePrefix>() == TILE_VALUE_OFFSET);

/// Byte stride of one root tile.
#[inline]
pub const fn tile_size(ty: ValueType) -> usize {
    align_up(TILE_VALUE_OFFSET + ty.width(), DATA_ALIGNMENT)
}

/// Fixed front of an interior-node record. Value min/max follow at
/// [`INTERNAL_VALUES_OFFSET`], then the child mask, then the slot table.
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
pub struct InternalPrefix {
    pub origin: [i32; 3],
    pub flags: u32,
    /// Index-space bounds of the occupied voxels, min xyz then max xyz.
    pub bbox: [i32; 6],
    pub active_voxel_count: u64,
}

pub const INTERNAL_VALUES_OFFSET: usize = 48;
const _: () = assert!(std::mem::size_of::<InternalPrefix>() == INTERNAL_VALUES_OFFSET);

/// Number of 64-bit words in an occupancy mask of `2^(3·log2_dim)` bits.
#[inline]
pub const fn mask_words(log2_dim: u32) -> usize {
    let bits = 1usize << (3 * log2_dim);
    (bits + 63) / 64
}

/// Offset of the maximum value within an interior node.
#[inline]
pub const fn internal_max_offset(ty: ValueType) -> usize {
    INTERNAL_VALUES_OFFSET + ty.width()
}

/// Offset of the child mask within an interior node.
#[inline]
pub const fn internal_mask_offset(ty: ValueType) -> usize {
    align_up(INTERNAL_VALUES_OFFSET + 2 * ty.width(), 8)
}

/// Byte stride of one slot in the interior-node table.
///
/// A slot holds either the child offset (`i64` in its first 8 bytes) or the
/// background value verbatim, so it must fit the wider of the two.
#[inline]
pub const fn internal_slot_stride(ty: ValueType) -> usize {
    let w = ty.width();
    if w > 8 {
        align_up(w, 8)
    } else {
        8
    }
}

/// Offset of the slot table within an interior node.
#[inline]
pub const fn internal_table_offset(ty: ValueType, log2_dim: u32) -> usize {
    internal_mask_offset(ty) + mask_words(log2_dim) * 8
}

/// Byte size of one interior node.
#[inline]
pub const fn internal_size(ty: ValueType, log2_dim: u32) -> usize {
    let slots = 1usize << (3 * log2_dim);
    align_up(
        internal_table_offset(ty, log2_dim) + slots * internal_slot_stride(ty),
        DATA_ALIGNMENT,
    )
}

/// Fixed front of a leaf record. The voxel mask follows at
/// [`LEAF_MASK_OFFSET`], then value min/max, then the packed value table.
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
pub struct LeafPrefix {
    pub origin: [i32; 3],
    pub active_voxel_count: u32,
}

pub const LEAF_MASK_OFFSET: usize = 16;
const _: () = assert!(std::mem::size_of::<LeafPrefix>() == LEAF_MASK_OFFSET);

/// Offset of the minimum value within a leaf.
#[inline]
pub const fn leaf_min_offset(log2_dim: u32) -> usize {
    LEAF_MASK_OFFSET + mask_words(log2_dim) * 8
}

/// Offset of the maximum value within a leaf.
#[inline]
pub const fn leaf_max_offset(ty: ValueType, log2_dim: u32) -> usize {
    leaf_min_offset(log2_dim) + ty.width()
}

/// Offset of the packed voxel-value table within a leaf.
#[inline]
pub const fn leaf_values_offset(ty: ValueType, log2_dim: u32) -> usize {
    leaf_min_offset(log2_dim) + 2 * ty.width()
}

/// Byte size of one leaf node.
#[inline]
pub const fn leaf_size(ty: ValueType, log2_dim: u32) -> usize {
    let voxels = 1usize << (3 * log2_dim);
    align_up(
        leaf_values_offset(ty, log2_dim) + voxels * ty.width(),
        DATA_ALIGNMENT,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Mat4;

    #[test]
    fn record_sizes_are_aligned() {
        assert_eq!(GRID_HEADER_SIZE % DATA_ALIGNMENT, 0);
        assert_eq!(TREE_HEADER_SIZE % DATA_ALIGNMENT, 0);
        for ty in ValueType::ALL {
            assert_eq!(root_size(ty) % DATA_ALIGNMENT, 0);
            assert_eq!(tile_size(ty) % DATA_ALIGNMENT, 0);
            for ld in 1..=8 {
                assert_eq!(internal_size(ty, ld) % DATA_ALIGNMENT, 0, "{ty:?} ld {ld}");
                assert_eq!(leaf_size(ty, ld) % DATA_ALIGNMENT, 0, "{ty:?} ld {ld}");
            }
        }
    }

    #[test]
    fn known_record_sizes() {
        // 16-byte prefix + 64-byte mask + 8 bytes min/max + 512 floats.
        assert_eq!(leaf_size(ValueType::F32, 3), align_up(16 + 64 + 8 + 2048, 32));
        // Vec3 slots widen to 16 bytes.
        assert_eq!(internal_slot_stride(ValueType::Vec3F32), 16);
        assert_eq!(internal_slot_stride(ValueType::F32), 8);
        // All supported value types fit a 32-byte tile.
        for ty in ValueType::ALL {
            assert_eq!(tile_size(ty), 32);
        }
    }

    #[test]
    fn mask_word_counts() {
        assert_eq!(mask_words(1), 1); // 8 bits
        assert_eq!(mask_words(2), 1); // 64 bits
        assert_eq!(mask_words(3), 8); // 512 bits
        assert_eq!(mask_words(4), 64); // 4096 bits
    }

    #[test]
    fn field_offsets_do_not_overlap() {
        for ty in ValueType::ALL {
            for ld in 1..=8 {
                assert!(internal_mask_offset(ty) >= internal_max_offset(ty) + ty.width());
                assert!(internal_table_offset(ty, ld) > internal_mask_offset(ty));
                assert!(leaf_values_offset(ty, ld) >= leaf_max_offset(ty, ld) + ty.width());
            }
        }
    }

    #[test]
    fn map_record_is_row_major() {
        let map = AffineMap::new(Mat4::from_cols_array_2d(&[
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 2.0, 0.0, 0.0],
            [0.0, 0.0, 4.0, 0.0],
            [5.0, 6.0, 7.0, 1.0],
        ]));
        let record = MapRecord::from_affine(&map);
        assert_eq!(record.mat_f[0], 1.0);
        assert_eq!(record.mat_f[4], 2.0);
        assert_eq!(record.mat_f[8], 4.0);
        assert_eq!(record.vec_f, [5.0, 6.0, 7.0]);
        // Inverse of a diagonal scale.
        assert_eq!(record.inv_mat_f[0], 1.0);
        assert_eq!(record.inv_mat_f[4], 0.5);
        assert_eq!(record.inv_mat_f[8], 0.25);
    }

    #[test]
    fn record_io_roundtrip() {
        let mut buf = vec![0u8; 64];
        let prefix = TilePrefix {
            key: 0x1234_5678,
            child_id: -3,
            state: 1,
        };
        write_record(&mut buf, 8, &prefix);
        let back: TilePrefix = read_record(&buf, 8);
        assert_eq!(back.key, 0x1234_5678);
        assert_eq!(back.child_id, -3);
        assert_eq!(back.state, 1);
    }
}
