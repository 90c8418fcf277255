//! Reference-space → subject-voxel coordinate mapping.
//!
//! Registration lives outside this crate; the pipeline only needs a function
//! that takes an atlas point (mm, template space) and returns a continuous
//! voxel coordinate in the functional image.  Any closure of that shape is a
//! [`CoordinateMap`]; [`AffineMap`] covers the common case of a single 4×4
//! voxel→world affine.
use nalgebra::{Matrix4, Vector4};

use crate::error::{FcError, Result};

/// Maps a reference-space point to a continuous voxel coordinate `(i, j, k)`.
pub trait CoordinateMap {
    fn to_voxel(&self, point: [f64; 3]) -> [f64; 3];
}

impl<F> CoordinateMap for F
where
    F: Fn([f64; 3]) -> [f64; 3],
{
    fn to_voxel(&self, point: [f64; 3]) -> [f64; 3] {
        self(point)
    }
}

/// World (mm) → voxel mapping obtained by inverting a voxel → world affine.
#[derive(Debug, Clone, PartialEq)]
pub struct AffineMap {
    world_to_voxel: Matrix4<f64>,
}

impl AffineMap {
    /// `voxel_to_world` is row-major, as stored in NIfTI `sform`/`qform`.
    pub fn from_voxel_to_world(voxel_to_world: [[f64; 4]; 4]) -> Result<Self> {
        let m = Matrix4::from_fn(|r, c| voxel_to_world[r][c]);
        let inv = m.try_inverse().ok_or_else(|| {
            FcError::InvalidConfig("voxel-to-world affine is not invertible".into())
        })?;
        Ok(Self { world_to_voxel: inv })
    }

    /// Axis-aligned grid with the given voxel size and world position of voxel (0,0,0).
    pub fn scaled(voxel_size: [f64; 3], origin: [f64; 3]) -> Self {
        let mut m = Matrix4::identity();
        for a in 0..3 {
            m[(a, a)] = 1.0 / voxel_size[a];
            m[(a, 3)] = -origin[a] / voxel_size[a];
        }
        Self { world_to_voxel: m }
    }
}

impl CoordinateMap for AffineMap {
    fn to_voxel(&self, point: [f64; 3]) -> [f64; 3] {
        let v = self.world_to_voxel * Vector4::new(point[0], point[1], point[2], 1.0);
        [v[0], v[1], v[2]]
    }
}
