//! Coordinate systems for sparse voxel volumes.

use bytemuck::{Pod, Zeroable};
use glam::{DVec3, IVec3};
use serde::{Deserialize, Serialize};

/// Signed voxel coordinate in index space.
///
/// Unlike `glam::IVec3` this is guaranteed to be 12 bytes with no padding,
/// so it can be written verbatim into wire records.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize,
)]
#[repr(C)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Coord {
    /// Create a new coordinate
    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The origin coordinate
    pub const ZERO: Self = Self::new(0, 0, 0);

    /// Offset every component by the same amount
    #[inline]
    pub const fn offset(self, d: i32) -> Self {
        Self::new(self.x + d, self.y + d, self.z + d)
    }

    /// Componentwise minimum
    #[inline]
    pub fn min(self, other: Self) -> Self {
        Self::new(
            self.x.min(other.x),
            self.y.min(other.y),
            self.z.min(other.z),
        )
    }

    /// Componentwise maximum
    #[inline]
    pub fn max(self, other: Self) -> Self {
        Self::new(
            self.x.max(other.x),
            self.y.max(other.y),
            self.z.max(other.z),
        )
    }

    /// Convert to glam IVec3
    #[inline]
    pub const fn to_ivec3(self) -> IVec3 {
        IVec3::new(self.x, self.y, self.z)
    }

    /// Convert to a double-precision vector
    #[inline]
    pub fn to_dvec3(self) -> DVec3 {
        DVec3::new(self.x as f64, self.y as f64, self.z as f64)
    }
}

impl From<IVec3> for Coord {
    fn from(v: IVec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

/// Closed integer bounding box over voxel coordinates.
///
/// The empty box is represented by `min > max` on every axis, so expanding an
/// empty box by any coordinate yields the degenerate box containing exactly
/// that coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable, Serialize, Deserialize)]
#[repr(C)]
pub struct CoordBBox {
    pub min: Coord,
    pub max: Coord,
}

impl CoordBBox {
    /// Create a box from its corners
    #[inline]
    pub const fn new(min: Coord, max: Coord) -> Self {
        Self { min, max }
    }

    /// The empty box
    #[inline]
    pub const fn empty() -> Self {
        Self {
            min: Coord::new(i32::MAX, i32::MAX, i32::MAX),
            max: Coord::new(i32::MIN, i32::MIN, i32::MIN),
        }
    }

    /// Box covering `[origin, origin + dim - 1]` on every axis
    #[inline]
    pub const fn from_origin_dim(origin: Coord, dim: i32) -> Self {
        Self {
            min: origin,
            max: origin.offset(dim - 1),
        }
    }

    /// True if no coordinate is contained
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// True if the box has zero volume (empty or a single point/slab)
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.min == self.max || self.is_empty()
    }

    /// Expand to include a coordinate
    #[inline]
    pub fn expand(&mut self, c: Coord) {
        self.min = self.min.min(c);
        self.max = self.max.max(c);
    }

    /// Expand to cover another box
    #[inline]
    pub fn expand_bbox(&mut self, other: &CoordBBox) {
        if !other.is_empty() {
            self.min = self.min.min(other.min);
            self.max = self.max.max(other.max);
        }
    }

    /// True if `other` is fully inside this box
    pub fn contains_bbox(&self, other: &CoordBBox) -> bool {
        if other.is_empty() {
            return true;
        }
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && self.min.z <= other.min.z
            && self.max.x >= other.max.x
            && self.max.y >= other.max.y
            && self.max.z >= other.max.z
    }

    /// The 8 corner coordinates as double-precision points.
    ///
    /// Corner `c` selects max (bit set) or min (bit clear) per axis with
    /// bit 0 = x, bit 1 = y, bit 2 = z.
    pub fn corners(&self) -> [DVec3; 8] {
        let mut out = [DVec3::ZERO; 8];
        for (c, v) in out.iter_mut().enumerate() {
            *v = DVec3::new(
                if c & 1 != 0 { self.max.x } else { self.min.x } as f64,
                if c & 2 != 0 { self.max.y } else { self.min.y } as f64,
                if c & 4 != 0 { self.max.z } else { self.min.z } as f64,
            );
        }
        out
    }
}

impl Default for CoordBBox {
    fn default() -> Self {
        Self::empty()
    }
}

/// Closed real-valued bounding box in world space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BBoxd {
    pub min: DVec3,
    pub max: DVec3,
}

impl BBoxd {
    /// The empty box
    #[inline]
    pub const fn empty() -> Self {
        Self {
            min: DVec3::splat(f64::MAX),
            max: DVec3::splat(f64::MIN),
        }
    }

    /// Expand to include a point
    #[inline]
    pub fn expand(&mut self, p: DVec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// True if a point is inside the box
    pub fn contains(&self, p: DVec3) -> bool {
        p.x >= self.min.x
            && p.y >= self.min.y
            && p.z >= self.min.z
            && p.x <= self.max.x
            && p.y <= self.max.y
            && p.z <= self.max.z
    }
}

impl Default for BBoxd {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coord_is_wire_sized() {
        assert_eq!(std::mem::size_of::<Coord>(), 12);
        assert_eq!(std::mem::size_of::<CoordBBox>(), 24);
    }

    #[test]
    fn empty_bbox_expands_to_point() {
        let mut bbox = CoordBBox::empty();
        assert!(bbox.is_empty());

        bbox.expand(Coord::new(3, -1, 7));
        assert!(!bbox.is_empty());
        assert_eq!(bbox.min, Coord::new(3, -1, 7));
        assert_eq!(bbox.max, Coord::new(3, -1, 7));
    }

    #[test]
    fn bbox_union() {
        let mut a = CoordBBox::from_origin_dim(Coord::ZERO, 8);
        let b = CoordBBox::from_origin_dim(Coord::new(16, 0, 0), 8);

        a.expand_bbox(&b);
        assert_eq!(a.min, Coord::ZERO);
        assert_eq!(a.max, Coord::new(23, 7, 7));
        assert!(a.contains_bbox(&b));
    }

    #[test]
    fn union_with_empty_is_identity() {
        let mut a = CoordBBox::from_origin_dim(Coord::ZERO, 4);
        let before = a;
        a.expand_bbox(&CoordBBox::empty());
        assert_eq!(a, before);
    }

    #[test]
    fn corner_selection() {
        let bbox = CoordBBox::new(Coord::ZERO, Coord::new(1, 2, 3));
        let corners = bbox.corners();
        assert_eq!(corners[0], DVec3::new(0.0, 0.0, 0.0));
        assert_eq!(corners[1], DVec3::new(1.0, 0.0, 0.0));
        assert_eq!(corners[2], DVec3::new(0.0, 2.0, 0.0));
        assert_eq!(corners[7], DVec3::new(1.0, 2.0, 3.0));
    }
}
