//! Frequency-domain band-pass filter.
//!
//! Each time course is extended by reflect-limited padding of `n − 1`
//! samples on both sides, transformed with a full complex FFT, every bin
//! whose frequency lies outside `[low, high]` is zeroed (the mask is
//! symmetric, so the inverse stays real), and the padding is stripped.
//!
//! The input must be fully populated: bad frames are interpolated before
//! this stage, because the FFT assumes uniform sampling.
use std::sync::Arc;

use ndarray::Array2;
use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::error::{FcError, Result};

/// FFT plans and passband mask for one signal length.
pub struct BandPass {
    n: usize,
    n_edge: usize,
    keep: Vec<bool>,
    fwd: Arc<dyn Fft<f64>>,
    inv: Arc<dyn Fft<f64>>,
}

impl BandPass {
    /// Plan a filter for signals of `n` samples taken every `tr` seconds.
    pub fn new(n: usize, tr: f64, low: f64, high: f64) -> Self {
        let n_edge = n.saturating_sub(1);
        let n_fft = (n + 2 * n_edge).max(1);
        let df = 1.0 / (n_fft as f64 * tr);
        let keep = (0..n_fft)
            .map(|k| {
                let bin = k.min(n_fft - k);
                let f = bin as f64 * df;
                f >= low && f <= high
            })
            .collect();

        let mut planner: FftPlanner<f64> = FftPlanner::new();
        let fwd = planner.plan_fft_forward(n_fft);
        let inv = planner.plan_fft_inverse(n_fft);
        Self { n, n_edge, keep, fwd, inv }
    }

    /// Number of FFT bins that pass.
    pub fn passband_bins(&self) -> usize {
        self.keep.iter().filter(|&&k| k).count()
    }

    /// Filter one signal of the planned length.
    pub fn apply(&self, x: &[f64]) -> Vec<f64> {
        debug_assert_eq!(x.len(), self.n);
        if self.n == 0 {
            return vec![];
        }
        let ext = reflect_limited_pad(x, self.n_edge, self.n_edge);
        let n_fft = ext.len();

        let mut buf: Vec<Complex<f64>> = ext.iter().map(|&v| Complex { re: v, im: 0.0 }).collect();
        self.fwd.process(&mut buf);
        for (b, &k) in buf.iter_mut().zip(self.keep.iter()) {
            if !k {
                *b = Complex::default();
            }
        }
        self.inv.process(&mut buf);

        let inv_scale = 1.0 / n_fft as f64;
        buf[self.n_edge..self.n_edge + self.n]
            .iter()
            .map(|c| c.re * inv_scale)
            .collect()
    }
}

/// Band-pass every column of `[T, C]` data.
///
/// Fails with [`FcError::NonFinite`] if any value is NaN or infinite.
pub fn bandpass_columns(data: &Array2<f64>, tr: f64, low: f64, high: f64) -> Result<Array2<f64>> {
    if let Some(((frame, column), _)) = data.indexed_iter().find(|(_, v)| !v.is_finite()) {
        return Err(FcError::NonFinite { stage: "band-pass filter", frame, column });
    }
    let bp = BandPass::new(data.nrows(), tr, low, high);
    let mut out = Array2::<f64>::zeros(data.dim());
    for (c, col) in data.columns().into_iter().enumerate() {
        let filtered = bp.apply(&col.to_vec());
        out.column_mut(c).assign(&ndarray::ArrayView1::from(&filtered));
    }
    Ok(out)
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Reflect-limited padding (odd reflection about the end samples).
///
/// Left:  `pad[i] = 2*x[0] - x[n_l-i]`  for i in 1..=n_l
/// Right: `pad[i] = 2*x[-1] - x[-(i+1)]` for i in 1..=n_r
///
/// Requests longer than `n - 1` are zero-filled beyond the reflection.
pub(crate) fn reflect_limited_pad(x: &[f64], n_l: usize, n_r: usize) -> Vec<f64> {
    let n = x.len();
    if n == 0 {
        return vec![0.0; n_l + n_r];
    }
    let actual_l = n_l.min(n - 1);
    let actual_r = n_r.min(n - 1);

    let mut out = Vec::with_capacity(n_l + n + n_r);
    out.extend(std::iter::repeat(0.0).take(n_l - actual_l));
    for i in (1..=actual_l).rev() {
        out.push(2.0 * x[0] - x[i]);
    }

    out.extend_from_slice(x);

    let last = x[n - 1];
    for i in 1..=actual_r {
        out.push(2.0 * last - x[n - 1 - i]);
    }
    out.extend(std::iter::repeat(0.0).take(n_r - actual_r));

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine(n: usize, tr: f64, f: f64) -> Vec<f64> {
        (0..n).map(|t| (2.0 * PI * f * t as f64 * tr).sin()).collect()
    }

    #[test]
    fn filter_preserves_length() {
        let bp = BandPass::new(150, 2.0, 0.009, 0.08);
        assert_eq!(bp.apply(&sine(150, 2.0, 0.03)).len(), 150);
    }

    #[test]
    fn filter_removes_dc() {
        let bp = BandPass::new(200, 2.0, 0.009, 0.08);
        let y = bp.apply(&vec![5.0; 200]);
        let max_val = y.iter().map(|v| v.abs()).fold(0.0_f64, f64::max);
        assert!(max_val < 1e-9, "DC not removed: max={max_val}");
    }

    #[test]
    fn reflect_limited_left_pad() {
        let x = [1.0_f64, 2.0, 3.0, 4.0, 5.0];
        let padded = reflect_limited_pad(&x, 3, 0);
        assert_eq!(&padded[..3], &[-2.0, -1.0, 0.0]);
        assert_eq!(&padded[3..], &x[..]);
    }

    #[test]
    fn reflect_limited_pad_beyond_signal_zero_fills() {
        let padded = reflect_limited_pad(&[1.0, 2.0], 3, 2);
        assert_eq!(padded, vec![0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 0.0]);
    }

    #[test]
    fn nan_input_rejected() {
        let mut data = Array2::<f64>::zeros((10, 2));
        data[[4, 1]] = f64::NAN;
        let err = bandpass_columns(&data, 2.0, 0.009, 0.08).unwrap_err();
        assert_eq!(err, FcError::NonFinite { stage: "band-pass filter", frame: 4, column: 1 });
    }
}
