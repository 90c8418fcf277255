//! Nuisance design-matrix construction.
//!
//! Column groups, in order:
//!
//! | group                       | columns |
//! |-----------------------------|---------|
//! | motion parameters           | 6       |
//! | squared motion parameters   | 6       |
//! | Δ motion parameters         | 6       |
//! | Δ squared motion parameters | 6       |
//! | CSF mean, Δ CSF mean        | 2       |
//! | WM mean, Δ WM mean          | 2       |
//! | global mean, Δ (optional)   | 2       |
//! | CompCor components          | `n_compcor` |
//!
//! `Δ` is the backward first difference with `Δx[0] = 0`.  Signals derived
//! from the detrended data are undefined on bad frames; they are filled by
//! spline interpolation before differencing, so every column is finite.
//!
//! CompCor draws its noise pool from CSF and white matter (aCompCor) or from
//! the highest-variance voxels of the whole mask (tCompCor), per
//! [`CompCorSource`].
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array1, Array2, Axis};
use tracing::{debug, warn};

use crate::artifact::FrameQuality;
use crate::config::{CompCorSource, PipelineConfig};
use crate::error::{FcError, Result};
use crate::interpolate::GapFiller;
use crate::timeseries::TimeSeriesMatrix;

/// Iteration cap of the CompCor eigensolver.
const MAX_EIGEN_ITERATIONS: usize = 10_000;

const MOTION_NAMES: [&str; 6] = ["trans_x", "trans_y", "trans_z", "rot_x", "rot_y", "rot_z"];

/// Frames × regressors nuisance matrix with one name per column.
#[derive(Debug, Clone)]
pub struct NuisanceMatrix {
    data: Array2<f64>,
    names: Vec<String>,
}

impl NuisanceMatrix {
    /// `[T, K]` regressor values.
    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn n_regressors(&self) -> usize {
        self.names.len()
    }

    /// Column by name.
    pub fn column(&self, name: &str) -> Option<ndarray::ArrayView1<'_, f64>> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.data.column(i))
    }
}

/// Incremental builder; gap-fills every pushed channel on bad frames.
pub struct NuisanceBuilder {
    n_frames: usize,
    filler: GapFiller,
    names: Vec<String>,
    columns: Vec<Array1<f64>>,
}

impl NuisanceBuilder {
    pub fn new(quality: &FrameQuality) -> Result<Self> {
        Ok(Self {
            n_frames: quality.n_frames(),
            filler: GapFiller::new(quality)?,
            names: Vec::new(),
            columns: Vec::new(),
        })
    }

    /// Add a channel observed on every frame.
    pub fn push(&mut self, name: impl Into<String>, values: Array1<f64>) -> Result<&mut Self> {
        self.check_len(values.len())?;
        self.names.push(name.into());
        self.columns.push(values);
        Ok(self)
    }

    /// Add a channel valid on good frames only; bad frames are interpolated.
    pub fn push_gapped(&mut self, name: impl Into<String>, values: Array1<f64>) -> Result<&mut Self> {
        self.check_len(values.len())?;
        let filled = self.filler.fill(values.view());
        self.names.push(name.into());
        self.columns.push(filled);
        Ok(self)
    }

    /// Add a gapped channel followed by its first difference.
    pub fn push_gapped_with_derivative(
        &mut self,
        name: &str,
        values: Array1<f64>,
    ) -> Result<&mut Self> {
        self.push_gapped(name, values)?;
        let filled = self.columns[self.columns.len() - 1].clone();
        self.push(format!("{name}_diff"), first_difference(&filled))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn finish(self) -> NuisanceMatrix {
        let mut data = Array2::<f64>::zeros((self.n_frames, self.columns.len()));
        for (j, col) in self.columns.iter().enumerate() {
            data.column_mut(j).assign(col);
        }
        NuisanceMatrix { data, names: self.names }
    }

    fn check_len(&self, n: usize) -> Result<()> {
        if n != self.n_frames {
            return Err(FcError::ShapeMismatch {
                what: "regressor length vs frame count",
                expected: self.n_frames,
                got: n,
            });
        }
        Ok(())
    }
}

/// Backward first difference, `d[0] = 0`.
pub fn first_difference(x: &Array1<f64>) -> Array1<f64> {
    let mut d = Array1::zeros(x.len());
    for t in 1..x.len() {
        d[t] = x[t] - x[t - 1];
    }
    d
}

/// Build the full nuisance design.
///
/// * `detrended` — voxel data after [`detrend_good_frames`](super::detrend_good_frames)
///   (NaN on bad frames).
/// * `motion` — `[T, 6]` rigid-body parameters (3 translations, 3 rotations).
/// * `labels` — tissue label of every column of `detrended`.
pub fn build_design(
    detrended: &TimeSeriesMatrix,
    motion: &Array2<f64>,
    labels: &[i32],
    quality: &FrameQuality,
    cfg: &PipelineConfig,
) -> Result<NuisanceMatrix> {
    let n_t = quality.n_frames();
    if motion.dim() != (n_t, 6) {
        return Err(FcError::ShapeMismatch {
            what: "motion parameter rows (expected 6 columns)",
            expected: n_t,
            got: motion.nrows(),
        });
    }
    if labels.len() != detrended.n_voxels() {
        return Err(FcError::ShapeMismatch {
            what: "tissue labels vs voxel count",
            expected: detrended.n_voxels(),
            got: labels.len(),
        });
    }

    let mut b = NuisanceBuilder::new(quality)?;

    // 24-parameter motion expansion.
    let params: Vec<Array1<f64>> = motion.columns().into_iter().map(|c| c.to_owned()).collect();
    let squares: Vec<Array1<f64>> = params.iter().map(|p| p.mapv(|v| v * v)).collect();
    for (name, p) in MOTION_NAMES.iter().zip(&params) {
        b.push(*name, p.clone())?;
    }
    for (name, s) in MOTION_NAMES.iter().zip(&squares) {
        b.push(format!("{name}_sq"), s.clone())?;
    }
    for (name, p) in MOTION_NAMES.iter().zip(&params) {
        b.push(format!("{name}_diff"), first_difference(p))?;
    }
    for (name, s) in MOTION_NAMES.iter().zip(&squares) {
        b.push(format!("{name}_sq_diff"), first_difference(s))?;
    }

    // Tissue means.
    let tissue = cfg.tissue;
    let csf: Vec<usize> = columns_with(labels, |l| l == tissue.csf);
    let wm: Vec<usize> = columns_with(labels, |l| l == tissue.white);
    for (name, cols) in [("csf", &csf), ("wm", &wm)] {
        if cols.is_empty() {
            warn!(tissue = name, "no voxels carry this tissue label; regressor skipped");
            continue;
        }
        b.push_gapped_with_derivative(name, detrended.mean_of_columns(cols))?;
    }

    if cfg.global_signal {
        let all: Vec<usize> = (0..detrended.n_voxels()).collect();
        b.push_gapped_with_derivative("global", detrended.mean_of_columns(&all))?;
    }

    if cfg.n_compcor > 0 {
        let noise: Vec<usize> = match cfg.compcor_source {
            CompCorSource::Anatomical => {
                columns_with(labels, |l| l == tissue.csf || l == tissue.white)
            }
            CompCorSource::Temporal => {
                high_variance_columns(detrended, quality, cfg.tcompcor_fraction)
            }
        };
        debug!(source = ?cfg.compcor_source, voxels = noise.len(), "CompCor noise pool");
        let comps = compcor(detrended, &noise, quality, cfg.n_compcor)?;
        if comps.ncols() < cfg.n_compcor {
            warn!(
                requested = cfg.n_compcor,
                extracted = comps.ncols(),
                "fewer CompCor components than requested"
            );
        }
        for (i, c) in comps.columns().into_iter().enumerate() {
            b.push_gapped(format!("compcor_{i}"), c.to_owned())?;
        }
    }

    debug!(regressors = b.len(), "nuisance design built");
    Ok(b.finish())
}

/// Whole-mask tCompCor pool: the `⌈fraction · V⌉` columns with the largest
/// variance over good frames, in ascending column order.
///
/// Columns whose good-frame variance is not finite are never selected.
pub fn high_variance_columns(
    detrended: &TimeSeriesMatrix,
    quality: &FrameQuality,
    fraction: f64,
) -> Vec<usize> {
    let good = quality.good_frames();
    if good.is_empty() {
        return Vec::new();
    }
    let sub = detrended.data.select(Axis(0), &good);
    let n = good.len() as f64;
    let mut ranked: Vec<(usize, f64)> = sub
        .columns()
        .into_iter()
        .enumerate()
        .map(|(j, col)| {
            let mean = col.sum() / n;
            (j, col.mapv(|v| (v - mean) * (v - mean)).sum() / n)
        })
        .filter(|(_, var)| var.is_finite())
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    let keep = ((fraction * detrended.n_voxels() as f64).ceil() as usize).max(1);
    let mut cols: Vec<usize> = ranked.into_iter().take(keep).map(|(j, _)| j).collect();
    cols.sort_unstable();
    cols
}

/// CompCor: leading principal time courses of the noise voxels.
///
/// Each noise column is restricted to good frames, centred and scaled to
/// unit variance (constant and non-finite columns are dropped).  The components are the
/// eigenvectors of the good-frame Gram matrix `A Aᵀ` with the largest
/// eigenvalues, i.e. the leading left singular vectors of `A`.
///
/// Returns `[T, k']` with NaN on bad frames, `k' ≤ k`.
pub fn compcor(
    detrended: &TimeSeriesMatrix,
    noise_cols: &[usize],
    quality: &FrameQuality,
    k: usize,
) -> Result<Array2<f64>> {
    let good = quality.good_frames();
    let n_good = good.len();
    let sub = detrended.data.select(Axis(0), &good).select(Axis(1), noise_cols);

    let mut usable: Vec<Array1<f64>> = Vec::with_capacity(sub.ncols());
    for col in sub.columns() {
        let mean = col.sum() / n_good.max(1) as f64;
        let centred = col.mapv(|v| v - mean);
        let sd = (centred.mapv(|v| v * v).sum() / n_good.max(1) as f64).sqrt();
        if sd.is_finite() && sd > 1e-12 {
            usable.push(centred / sd);
        }
    }

    let k_eff = k.min(usable.len()).min(n_good);
    let mut out = Array2::from_elem((quality.n_frames(), k_eff), f64::NAN);
    if k_eff == 0 {
        warn!(noise_voxels = noise_cols.len(), "no usable CompCor voxels");
        return Ok(out);
    }

    let mut a = Array2::<f64>::zeros((n_good, usable.len()));
    for (j, col) in usable.iter().enumerate() {
        a.column_mut(j).assign(col);
    }
    let gram = a.dot(&a.t());
    let eig = SymmetricEigen::try_new(
        DMatrix::from_fn(n_good, n_good, |i, j| gram[[i, j]]),
        f64::EPSILON,
        MAX_EIGEN_ITERATIONS,
    )
    .ok_or(FcError::SingularDesign { rank: 0, columns: usable.len(), rows: n_good })?;

    let mut order: Vec<usize> = (0..n_good).collect();
    order.sort_by(|&i, &j| eig.eigenvalues[j].total_cmp(&eig.eigenvalues[i]));

    for (c, &e) in order.iter().take(k_eff).enumerate() {
        for (r, &t) in good.iter().enumerate() {
            out[[t, c]] = eig.eigenvectors[(r, e)];
        }
    }
    debug!(components = k_eff, voxels = usable.len(), "CompCor extracted");
    Ok(out)
}

fn columns_with(labels: &[i32], pred: impl Fn(i32) -> bool) -> Vec<usize> {
    labels
        .iter()
        .enumerate()
        .filter(|(_, &l)| pred(l))
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::detect_bad_frames;

    #[test]
    fn first_difference_starts_at_zero() {
        let d = first_difference(&Array1::from(vec![1.0, 4.0, 2.0]));
        assert_eq!(d.to_vec(), vec![0.0, 3.0, -2.0]);
    }

    #[test]
    fn gapped_channel_is_filled_before_differencing() {
        let q = detect_bad_frames(&[0.0, 0.0, 0.9, 0.0, 0.0, 0.0], 0.5);
        let mut b = NuisanceBuilder::new(&q).unwrap();
        let sig = Array1::from(vec![0.0, 1.0, f64::NAN, f64::NAN, 4.0, 5.0]);
        b.push_gapped_with_derivative("lin", sig).unwrap();
        let m = b.finish();
        assert_eq!(m.names(), &["lin".to_string(), "lin_diff".to_string()]);
        assert!(m.data().iter().all(|v| v.is_finite()));
        approx::assert_abs_diff_eq!(m.column("lin").unwrap()[2], 2.0, epsilon = 1e-10);
        approx::assert_abs_diff_eq!(m.column("lin_diff").unwrap()[3], 1.0, epsilon = 1e-10);
    }

    #[test]
    fn high_variance_pool_ranks_on_good_frames() {
        let q = detect_bad_frames(&[0.0, 0.0, 0.9, 0.0, 0.0, 0.0], 0.5);
        let mut data = Array2::<f64>::zeros((6, 4));
        for t in 0..6 {
            data[[t, 1]] = if t % 2 == 0 { 3.0 } else { -3.0 };
            data[[t, 2]] = t as f64 * 0.1;
        }
        // Huge values on the scrubbed frames must not promote column 3.
        data[[2, 3]] = 1e6;
        data[[3, 3]] = f64::NAN;
        data[[0, 0]] = f64::NAN;
        let series = TimeSeriesMatrix::from_parts(
            data,
            vec![[0, 0, 0], [1, 0, 0], [2, 0, 0], [3, 0, 0]],
            crate::timeseries::VolumeGeometry { dims: [4, 1, 1], voxel_size: [1.0; 3] },
        );
        assert_eq!(high_variance_columns(&series, &q, 0.5), vec![1, 2]);
        assert_eq!(high_variance_columns(&series, &q, 0.01), vec![1]);
    }

    #[test]
    fn wrong_length_rejected() {
        let q = detect_bad_frames(&[0.0; 4], 0.5);
        let mut b = NuisanceBuilder::new(&q).unwrap();
        assert!(b.push("x", Array1::zeros(3)).is_err());
    }
}
