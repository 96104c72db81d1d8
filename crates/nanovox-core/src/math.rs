//! Affine transform between index space and world space.

use glam::{DVec3, Mat4};

/// Index-to-world affine map with its cached inverse.
///
/// The forward map takes voxel index-space coordinates to world space;
/// both directions are kept so wire formats can store the pair without
/// recomputing an inverse at read time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AffineMap {
    fwd: Mat4,
    inv: Mat4,
}

impl AffineMap {
    /// The identity map (1 world unit per voxel).
    pub const IDENTITY: Self = Self {
        fwd: Mat4::IDENTITY,
        inv: Mat4::IDENTITY,
    };

    /// Build from an index-to-world matrix; the inverse is computed here.
    pub fn new(index_to_world: Mat4) -> Self {
        Self {
            fwd: index_to_world,
            inv: index_to_world.inverse(),
        }
    }

    /// Uniform scale map: `scale` world units per voxel.
    pub fn uniform_scale(scale: f32) -> Self {
        Self::new(Mat4::from_scale(glam::Vec3::splat(scale)))
    }

    /// The index-to-world matrix.
    #[inline]
    pub const fn index_to_world(&self) -> Mat4 {
        self.fwd
    }

    /// The world-to-index matrix.
    #[inline]
    pub const fn world_to_index(&self) -> Mat4 {
        self.inv
    }

    /// Map an index-space point to world space in double precision.
    pub fn apply(&self, p: DVec3) -> DVec3 {
        self.fwd.as_dmat4().transform_point3(p)
    }

    /// Per-axis voxel size, `|map(eᵢ) − map(0)|` for each basis vector.
    ///
    /// Skewed transforms have no single scale; this is the per-axis edge
    /// length of the mapped unit cell.
    pub fn voxel_size(&self) -> DVec3 {
        let at0 = self.apply(DVec3::ZERO);
        DVec3::new(
            (self.apply(DVec3::X) - at0).length(),
            (self.apply(DVec3::Y) - at0).length(),
            (self.apply(DVec3::Z) - at0).length(),
        )
    }
}

impl Default for AffineMap {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_maps_points_unchanged() {
        let map = AffineMap::IDENTITY;
        let p = DVec3::new(1.0, -2.0, 3.0);
        assert_eq!(map.apply(p), p);
        assert_eq!(map.voxel_size(), DVec3::ONE);
    }

    #[test]
    fn uniform_scale_voxel_size() {
        let map = AffineMap::uniform_scale(0.5);
        let size = map.voxel_size();
        assert!((size.x - 0.5).abs() < 1e-6);
        assert!((size.y - 0.5).abs() < 1e-6);
        assert!((size.z - 0.5).abs() < 1e-6);
    }

    #[test]
    fn inverse_roundtrip() {
        let map = AffineMap::new(Mat4::from_scale_rotation_translation(
            glam::Vec3::splat(2.0),
            glam::Quat::from_rotation_y(0.3),
            glam::Vec3::new(5.0, -1.0, 0.5),
        ));
        let p = glam::Vec3::new(3.0, 4.0, 5.0);
        let roundtrip = map.world_to_index().transform_point3(map.index_to_world().transform_point3(p));
        assert!((roundtrip - p).length() < 1e-4);
    }

    #[test]
    fn translation_does_not_affect_voxel_size() {
        let map = AffineMap::new(Mat4::from_translation(glam::Vec3::new(100.0, 0.0, -7.0)));
        let size = map.voxel_size();
        assert!((size - DVec3::ONE).length() < 1e-9);
    }
}
