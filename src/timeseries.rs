//! Dense frames × voxels container with a voxel-index map.
//!
//! A 4-D volume `[X, Y, Z, T]` plus a binary brain mask is flattened into
//! a `[T, V]` matrix whose columns are the in-mask voxels in C order
//! (`x` slowest, `z` fastest).  The grid coordinate of every column is kept
//! so that spatial stages (ROI rasterisation, tissue sampling) can go back
//! and forth between grid and column space.
use std::collections::HashMap;

use ndarray::{Array2, Array3, Array4, ArrayView1, Axis};

use crate::error::{FcError, Result};

/// Grid shape and voxel spacing of the functional image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeGeometry {
    /// Number of voxels along x, y, z.
    pub dims: [usize; 3],
    /// Voxel edge lengths in millimetres.
    pub voxel_size: [f64; 3],
}

impl VolumeGeometry {
    /// `true` when the continuous voxel coordinate lies inside the grid
    /// (within half a voxel of the outermost centres).
    pub fn contains(&self, v: [f64; 3]) -> bool {
        (0..3).all(|a| v[a] >= -0.5 && v[a] <= self.dims[a] as f64 - 0.5)
    }
}

/// Brain time series restricted to the mask.
#[derive(Debug, Clone)]
pub struct TimeSeriesMatrix {
    /// `[T, V]` intensities.
    pub data: Array2<f64>,
    /// Grid coordinate of each column.
    voxels: Vec<[usize; 3]>,
    /// Reverse map: grid coordinate → column.
    index: HashMap<[usize; 3], usize>,
    pub geometry: VolumeGeometry,
}

impl TimeSeriesMatrix {
    /// Flatten `volume` (`[X, Y, Z, T]`) to the voxels where `mask` is set.
    pub fn from_volume(
        volume: &Array4<f64>,
        mask: &Array3<bool>,
        voxel_size: [f64; 3],
    ) -> Result<Self> {
        let (nx, ny, nz, nt) = volume.dim();
        let (mx, my, mz) = mask.dim();
        for (what, expected, got) in [
            ("mask x extent", nx, mx),
            ("mask y extent", ny, my),
            ("mask z extent", nz, mz),
        ] {
            if expected != got {
                return Err(FcError::ShapeMismatch { what, expected, got });
            }
        }

        let voxels: Vec<[usize; 3]> = mask
            .indexed_iter()
            .filter(|(_, &m)| m)
            .map(|((x, y, z), _)| [x, y, z])
            .collect();

        let mut data = Array2::<f64>::zeros((nt, voxels.len()));
        for (col, &[x, y, z]) in voxels.iter().enumerate() {
            data.column_mut(col)
                .assign(&volume.slice(ndarray::s![x, y, z, ..]));
        }

        let geometry = VolumeGeometry { dims: [nx, ny, nz], voxel_size };
        Ok(Self::from_parts(data, voxels, geometry))
    }

    /// Build directly from a `[T, V]` matrix and the grid coordinate of each
    /// column.
    pub fn from_parts(
        data: Array2<f64>,
        voxels: Vec<[usize; 3]>,
        geometry: VolumeGeometry,
    ) -> Self {
        let index = voxels.iter().enumerate().map(|(i, &v)| (v, i)).collect();
        Self { data, voxels, index, geometry }
    }

    /// Same voxel layout, new values.  `data` must keep the column count.
    pub fn with_data(&self, data: Array2<f64>) -> Self {
        debug_assert_eq!(data.ncols(), self.voxels.len());
        Self {
            data,
            voxels: self.voxels.clone(),
            index: self.index.clone(),
            geometry: self.geometry,
        }
    }

    #[inline]
    pub fn n_frames(&self) -> usize {
        self.data.nrows()
    }

    #[inline]
    pub fn n_voxels(&self) -> usize {
        self.data.ncols()
    }

    pub fn voxels(&self) -> &[[usize; 3]] {
        &self.voxels
    }

    /// Column holding grid voxel `v`, if it is inside the mask.
    pub fn column_of(&self, v: [usize; 3]) -> Option<usize> {
        self.index.get(&v).copied()
    }

    /// Time course of column `col`.
    pub fn voxel(&self, col: usize) -> ArrayView1<'_, f64> {
        self.data.column(col)
    }

    /// Sample a label volume at every in-mask voxel, in column order.
    pub fn sample_labels(&self, labels: &Array3<i32>) -> Result<Vec<i32>> {
        let (lx, ly, lz) = labels.dim();
        let [nx, ny, nz] = self.geometry.dims;
        if (lx, ly, lz) != (nx, ny, nz) {
            return Err(FcError::ShapeMismatch {
                what: "tissue label volume size",
                expected: nx * ny * nz,
                got: lx * ly * lz,
            });
        }
        Ok(self.voxels.iter().map(|&[x, y, z]| labels[[x, y, z]]).collect())
    }

    /// Mean over the given columns at every frame (`[T]`).
    pub fn mean_of_columns(&self, cols: &[usize]) -> ndarray::Array1<f64> {
        if cols.is_empty() {
            return ndarray::Array1::zeros(self.n_frames());
        }
        self.data
            .select(Axis(1), cols)
            .mean_axis(Axis(1))
            .unwrap_or_else(|| ndarray::Array1::zeros(self.n_frames()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> VolumeGeometry {
        VolumeGeometry { dims: [3, 3, 2], voxel_size: [2.0, 2.0, 2.0] }
    }

    #[test]
    fn flatten_keeps_only_masked_voxels() {
        let vol = Array4::from_shape_fn((3, 3, 2, 5), |(x, y, z, t)| {
            (x * 100 + y * 10 + z) as f64 + t as f64 * 0.5
        });
        let mut mask = Array3::from_elem((3, 3, 2), false);
        mask[[0, 1, 1]] = true;
        mask[[2, 2, 0]] = true;

        let ts = TimeSeriesMatrix::from_volume(&vol, &mask, [2.0; 3]).unwrap();
        assert_eq!(ts.n_frames(), 5);
        assert_eq!(ts.n_voxels(), 2);
        assert_eq!(ts.voxels(), &[[0, 1, 1], [2, 2, 0]]);
        assert_eq!(ts.column_of([2, 2, 0]), Some(1));
        assert_eq!(ts.column_of([1, 1, 1]), None);
        approx::assert_abs_diff_eq!(ts.data[[4, 1]], 220.0 + 2.0, epsilon = 1e-12);
    }

    #[test]
    fn mask_shape_must_match() {
        let vol = Array4::<f64>::zeros((3, 3, 2, 4));
        let mask = Array3::from_elem((3, 3, 3), true);
        let err = TimeSeriesMatrix::from_volume(&vol, &mask, [2.0; 3]).unwrap_err();
        assert!(matches!(err, FcError::ShapeMismatch { .. }));
    }

    #[test]
    fn contains_uses_half_voxel_margin() {
        let g = geometry();
        assert!(g.contains([-0.4, 0.0, 1.4]));
        assert!(!g.contains([3.0, 0.0, 0.0]));
        assert!(!g.contains([0.0, -0.6, 0.0]));
    }

    #[test]
    fn labels_follow_column_order() {
        let data = Array2::<f64>::zeros((4, 2));
        let ts = TimeSeriesMatrix::from_parts(data, vec![[0, 0, 0], [2, 1, 1]], geometry());
        let mut labels = Array3::<i32>::zeros((3, 3, 2));
        labels[[2, 1, 1]] = 3;
        assert_eq!(ts.sample_labels(&labels).unwrap(), vec![0, 3]);
    }
}
