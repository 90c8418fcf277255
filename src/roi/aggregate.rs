//! Sphere rasterisation and ROI / system time courses.
use std::collections::BTreeMap;

use ndarray::{Array1, Array2, Axis};
use tracing::{debug, warn};

use super::atlas::{Atlas, System};
use super::map::CoordinateMap;
use crate::artifact::FrameQuality;
use crate::error::{Diagnostic, FcError, Result};
use crate::timeseries::{TimeSeriesMatrix, VolumeGeometry};

/// One rasterised ROI.
#[derive(Debug, Clone, PartialEq)]
pub struct Roi {
    pub id: u32,
    pub system: Option<System>,
    /// Continuous voxel coordinate of the sphere centre.
    pub center: [f64; 3],
    /// Member columns of the time-series matrix, ascending.
    pub columns: Vec<usize>,
    /// Too few member voxels; excluded from correlation and graph stages.
    pub missing: bool,
}

/// All ROIs of an atlas, in atlas order, plus findings from rasterisation.
#[derive(Debug, Clone)]
pub struct RoiSet {
    pub rois: Vec<Roi>,
    pub diagnostics: Vec<Diagnostic>,
}

impl RoiSet {
    pub fn len(&self) -> usize {
        self.rois.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rois.is_empty()
    }

    /// Per-ROI missing flags.
    pub fn missing(&self) -> Vec<bool> {
        self.rois.iter().map(|r| r.missing).collect()
    }

    pub fn n_missing(&self) -> usize {
        self.rois.iter().filter(|r| r.missing).count()
    }
}

/// Grid voxels whose centres lie within `radius_mm` of `center`.
pub fn sphere_voxels(center: [f64; 3], radius_mm: f64, geometry: &VolumeGeometry) -> Vec<[usize; 3]> {
    let mut lo = [0usize; 3];
    let mut hi = [0usize; 3];
    for a in 0..3 {
        let r_vox = radius_mm / geometry.voxel_size[a];
        let max = geometry.dims[a] as f64 - 1.0;
        if geometry.dims[a] == 0 || center[a] + r_vox < 0.0 || center[a] - r_vox > max {
            return vec![];
        }
        lo[a] = (center[a] - r_vox).ceil().max(0.0) as usize;
        hi[a] = (center[a] + r_vox).floor().min(max) as usize;
    }

    let r2 = radius_mm * radius_mm;
    let vs = geometry.voxel_size;
    let mut out = Vec::new();
    for x in lo[0]..=hi[0] {
        let dx = (x as f64 - center[0]) * vs[0];
        for y in lo[1]..=hi[1] {
            let dy = (y as f64 - center[1]) * vs[1];
            for z in lo[2]..=hi[2] {
                let dz = (z as f64 - center[2]) * vs[2];
                if dx * dx + dy * dy + dz * dz <= r2 {
                    out.push([x, y, z]);
                }
            }
        }
    }
    out
}

/// Map every atlas point into the subject grid and collect in-mask sphere voxels.
///
/// ROIs with fewer than `min_voxels` members are flagged missing; a centre
/// mapped outside the volume gives an empty ROI.  Neither case is an error.
pub fn rasterize_rois(
    atlas: &Atlas,
    map: &dyn CoordinateMap,
    series: &TimeSeriesMatrix,
    radius_mm: f64,
    min_voxels: usize,
) -> RoiSet {
    let geometry = series.geometry;
    let mut diagnostics = Vec::new();
    let rois = atlas
        .points
        .iter()
        .map(|p| {
            let center = map.to_voxel(p.position);
            let columns: Vec<usize> = if geometry.contains(center) {
                let mut cols: Vec<usize> = sphere_voxels(center, radius_mm, &geometry)
                    .into_iter()
                    .filter_map(|v| series.column_of(v))
                    .collect();
                cols.sort_unstable();
                cols
            } else {
                let d = Diagnostic::OutOfBoundsMapping { roi_id: p.id, voxel: center };
                warn!("{d}");
                diagnostics.push(d);
                Vec::new()
            };

            let missing = columns.len() < min_voxels.max(1);
            if missing && geometry.contains(center) {
                let d = Diagnostic::EmptyRoi { roi_id: p.id, voxels: columns.len() };
                warn!("{d}");
                diagnostics.push(d);
            }
            Roi { id: p.id, system: p.system, center, columns, missing }
        })
        .collect::<Vec<_>>();

    debug!(
        rois = rois.len(),
        missing = rois.iter().filter(|r| r.missing).count(),
        "ROIs rasterised"
    );
    RoiSet { rois, diagnostics }
}

/// Mean time course of each ROI over good frames: `[n_good, n_roi]`.
///
/// Missing ROIs get an all-zero column so that node indices stay aligned
/// with the atlas.
pub fn roi_time_series(
    series: &TimeSeriesMatrix,
    rois: &RoiSet,
    quality: &FrameQuality,
) -> Result<Array2<f64>> {
    if series.n_frames() != quality.n_frames() {
        return Err(FcError::ShapeMismatch {
            what: "series frames vs frame count",
            expected: quality.n_frames(),
            got: series.n_frames(),
        });
    }
    let good = quality.good_frames();
    let good_rows = series.data.select(Axis(0), &good);

    let mut out = Array2::<f64>::zeros((good.len(), rois.len()));
    for (j, roi) in rois.rois.iter().enumerate() {
        if roi.missing {
            continue;
        }
        if let Some(mean) = good_rows.select(Axis(1), &roi.columns).mean_axis(Axis(1)) {
            out.column_mut(j).assign(&mean);
        }
    }
    Ok(out)
}

/// Mean and standard deviation across the ROIs of one system, per frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemSignal {
    pub system: System,
    /// Non-missing ROIs that contributed.
    pub n_rois: usize,
    pub mean: Array1<f64>,
    /// Population standard deviation (ddof = 0).
    pub std: Array1<f64>,
}

/// Per-system summary time courses from `[T, n_roi]` ROI signals.
///
/// Systems whose ROIs are all missing are omitted.
pub fn system_time_series(roi_signals: &Array2<f64>, rois: &RoiSet) -> Vec<SystemSignal> {
    let mut groups: BTreeMap<System, Vec<usize>> = BTreeMap::new();
    for (j, roi) in rois.rois.iter().enumerate() {
        if let (Some(system), false) = (roi.system, roi.missing) {
            groups.entry(system).or_default().push(j);
        }
    }

    groups
        .into_iter()
        .filter_map(|(system, cols)| {
            let sub = roi_signals.select(Axis(1), &cols);
            let mean = sub.mean_axis(Axis(1))?;
            let std = sub.std_axis(Axis(1), 0.0);
            Some(SystemSignal { system, n_rois: cols.len(), mean, std })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> VolumeGeometry {
        VolumeGeometry { dims: [10, 10, 10], voxel_size: [2.0, 2.0, 2.0] }
    }

    #[test]
    fn five_mm_sphere_on_two_mm_grid() {
        // Offsets with (2·dx)²+(2·dy)²+(2·dz)² <= 25  →  dx²+dy²+dz² <= 6.
        let vox = sphere_voxels([5.0, 5.0, 5.0], 5.0, &geometry());
        let expected = (-2i32..=2)
            .flat_map(|a| (-2i32..=2).flat_map(move |b| (-2i32..=2).map(move |c| (a, b, c))))
            .filter(|(a, b, c)| a * a + b * b + c * c <= 6)
            .count();
        assert_eq!(vox.len(), expected);
        assert!(vox.contains(&[5, 5, 5]));
        assert!(!vox.contains(&[7, 7, 5]));
    }

    #[test]
    fn sphere_is_clipped_at_grid_edge() {
        let vox = sphere_voxels([0.0, 0.0, 0.0], 2.0, &geometry());
        // Centre plus its three in-grid neighbours.
        assert_eq!(vox.len(), 4);
    }

    #[test]
    fn sphere_far_outside_is_empty() {
        assert!(sphere_voxels([40.0, 5.0, 5.0], 5.0, &geometry()).is_empty());
    }
}
