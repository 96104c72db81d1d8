//! The voxel value-type registry.
//!
//! Grids carry one value per voxel; the supported value types are a closed
//! set so that every consumer can dispatch over them without dynamic typing.

use serde::{Deserialize, Serialize};

/// Value type of a grid channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// Single-precision float, 4 bytes.
    F32,
    /// Three single-precision floats, 12 bytes.
    Vec3F32,
    /// Two's-complement 32-bit integer, 4 bytes.
    I32,
}

impl ValueType {
    /// All supported value types, in table order.
    pub const ALL: [ValueType; 3] = [ValueType::F32, ValueType::Vec3F32, ValueType::I32];

    /// Encoded byte width of one value.
    #[inline]
    pub const fn width(self) -> usize {
        match self {
            ValueType::F32 | ValueType::I32 => 4,
            ValueType::Vec3F32 => 12,
        }
    }

    /// Stable wire tag written into the grid header.
    #[inline]
    pub const fn wire_tag(self) -> u32 {
        match self {
            ValueType::F32 => 1,
            ValueType::I32 => 4,
            ValueType::Vec3F32 => 6,
        }
    }

    /// Look a wire tag up in the registry.
    ///
    /// Returns `None` for tags outside the supported set, so consumers can
    /// reject a source that reports a type the format cannot encode.
    #[inline]
    pub const fn from_wire_tag(tag: u32) -> Option<ValueType> {
        match tag {
            1 => Some(ValueType::F32),
            4 => Some(ValueType::I32),
            6 => Some(ValueType::Vec3F32),
            _ => None,
        }
    }

    /// Row index into the per-type size tables.
    #[inline]
    pub const fn table_index(self) -> usize {
        match self {
            ValueType::F32 => 0,
            ValueType::Vec3F32 => 1,
            ValueType::I32 => 2,
        }
    }

    /// Largest representable value; the identity for min folds.
    pub const fn max_sentinel(self) -> Value {
        match self {
            ValueType::F32 => Value::F32(f32::MAX),
            ValueType::Vec3F32 => Value::Vec3F32([f32::MAX; 3]),
            ValueType::I32 => Value::I32(i32::MAX),
        }
    }

    /// Smallest representable value; the identity for max folds.
    pub const fn min_sentinel(self) -> Value {
        match self {
            ValueType::F32 => Value::F32(f32::MIN),
            ValueType::Vec3F32 => Value::Vec3F32([f32::MIN; 3]),
            ValueType::I32 => Value::I32(i32::MIN),
        }
    }
}

/// A single voxel value of any supported type.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    F32(f32),
    Vec3F32([f32; 3]),
    I32(i32),
}

/// `if b < a { b } else { a }` — keeps the accumulator when the probe is NaN.
#[inline]
fn min_f32(a: f32, b: f32) -> f32 {
    if b < a {
        b
    } else {
        a
    }
}

#[inline]
fn max_f32(a: f32, b: f32) -> f32 {
    if b > a {
        b
    } else {
        a
    }
}

impl Value {
    /// The type of this value.
    #[inline]
    pub const fn value_type(&self) -> ValueType {
        match self {
            Value::F32(_) => ValueType::F32,
            Value::Vec3F32(_) => ValueType::Vec3F32,
            Value::I32(_) => ValueType::I32,
        }
    }

    /// Copy the value bits verbatim into `out`, which must be at least
    /// `value_type().width()` bytes long.
    pub fn write_to(&self, out: &mut [u8]) {
        match self {
            Value::F32(v) => out[..4].copy_from_slice(bytemuck::bytes_of(v)),
            Value::Vec3F32(v) => out[..12].copy_from_slice(bytemuck::bytes_of(v)),
            Value::I32(v) => out[..4].copy_from_slice(bytemuck::bytes_of(v)),
        }
    }

    /// Reinterpret the leading `ty.width()` bytes of `bytes` as a value.
    pub fn read_from(ty: ValueType, bytes: &[u8]) -> Value {
        match ty {
            ValueType::F32 => Value::F32(bytemuck::pod_read_unaligned(&bytes[..4])),
            ValueType::Vec3F32 => Value::Vec3F32(bytemuck::pod_read_unaligned(&bytes[..12])),
            ValueType::I32 => Value::I32(bytemuck::pod_read_unaligned(&bytes[..4])),
        }
    }

    /// Pairwise minimum; componentwise for Vec3F32.
    ///
    /// Floats follow IEEE ordering with NaN treated as neither less nor
    /// greater. Mismatched variants keep the left operand.
    pub fn min(self, other: Value) -> Value {
        match (self, other) {
            (Value::F32(a), Value::F32(b)) => Value::F32(min_f32(a, b)),
            (Value::I32(a), Value::I32(b)) => Value::I32(a.min(b)),
            (Value::Vec3F32(a), Value::Vec3F32(b)) => Value::Vec3F32([
                min_f32(a[0], b[0]),
                min_f32(a[1], b[1]),
                min_f32(a[2], b[2]),
            ]),
            (a, _) => a,
        }
    }

    /// Pairwise maximum; componentwise for Vec3F32.
    pub fn max(self, other: Value) -> Value {
        match (self, other) {
            (Value::F32(a), Value::F32(b)) => Value::F32(max_f32(a, b)),
            (Value::I32(a), Value::I32(b)) => Value::I32(a.max(b)),
            (Value::Vec3F32(a), Value::Vec3F32(b)) => Value::Vec3F32([
                max_f32(a[0], b[0]),
                max_f32(a[1], b[1]),
                max_f32(a[2], b[2]),
            ]),
            (a, _) => a,
        }
    }
}

/// Semantic class of a grid, copied verbatim into the grid header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GridClass {
    /// No particular interpretation.
    #[default]
    Unknown,
    /// Narrow-band signed distance field.
    LevelSet,
    /// Density volume in [0, 1].
    FogVolume,
    /// Staggered velocity grid.
    Staggered,
}

impl GridClass {
    /// Stable wire tag written into the grid header.
    #[inline]
    pub const fn wire_tag(self) -> u32 {
        match self {
            GridClass::Unknown => 0,
            GridClass::LevelSet => 1,
            GridClass::FogVolume => 2,
            GridClass::Staggered => 3,
        }
    }
}
