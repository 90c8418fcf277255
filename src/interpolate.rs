//! Natural cubic-spline gap filling across bad frames.
//!
//! Knots are the good frames `(t, y[t])`; the spline is evaluated at the bad
//! frames only, so good-frame values are returned bit-for-bit.
//!
//! Second derivatives at the knots are found by solving the tridiagonal
//! system of the natural spline (`M₀ = M_{m-1} = 0`) with the Thomas
//! algorithm.  The factorisation depends only on the knot positions, so
//! [`GapFiller`] computes it once and reuses it for every voxel.
//!
//! Bad frames before the first or after the last good frame take the value
//! of the nearest good frame.
use ndarray::{Array1, Array2, ArrayView1};

use crate::artifact::FrameQuality;
use crate::error::{FcError, Result};

/// Precomputed spline solver for one set of knot positions.
#[derive(Debug, Clone)]
pub struct GapFiller {
    /// Knot abscissae (good frame indices), ascending.
    knots: Vec<f64>,
    /// Interval widths `h[i] = x[i+1] - x[i]`.
    h: Vec<f64>,
    /// Thomas forward-sweep upper coefficients for interior rows.
    c_prime: Vec<f64>,
    /// Thomas forward-sweep pivots for interior rows.
    denom: Vec<f64>,
    /// Frames to fill.
    targets: Vec<usize>,
}

impl GapFiller {
    /// Plan interpolation from the good frames of `quality` onto its bad frames.
    pub fn new(quality: &FrameQuality) -> Result<Self> {
        let knots: Vec<f64> = quality.good_frames().into_iter().map(|t| t as f64).collect();
        Self::with_knots(knots, quality.bad_frames())
    }

    /// Plan interpolation through arbitrary strictly increasing knots.
    pub fn with_knots(knots: Vec<f64>, targets: Vec<usize>) -> Result<Self> {
        let m = knots.len();
        if m < 2 {
            return Err(FcError::InsufficientData {
                context: "spline interpolation",
                got: m,
                need: 2,
            });
        }
        let h: Vec<f64> = knots.windows(2).map(|w| w[1] - w[0]).collect();
        debug_assert!(h.iter().all(|&v| v > 0.0), "knots must be strictly increasing");

        // Interior unknowns M[1..m-1]; row i: h[i-1]·M[i-1] + 2(h[i-1]+h[i])·M[i] + h[i]·M[i+1].
        let n_in = m.saturating_sub(2);
        let mut c_prime = vec![0.0; n_in];
        let mut denom = vec![0.0; n_in];
        for r in 0..n_in {
            let i = r + 1;
            let diag = 2.0 * (h[i - 1] + h[i]);
            let lower = h[i - 1];
            let upper = h[i];
            let d = if r == 0 { diag } else { diag - lower * c_prime[r - 1] };
            denom[r] = d;
            c_prime[r] = upper / d;
        }

        Ok(Self { knots, h, c_prime, denom, targets })
    }

    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    /// Second derivatives at the knots for values `y`.
    fn second_derivatives(&self, y: &[f64]) -> Vec<f64> {
        let m = self.knots.len();
        let mut big_m = vec![0.0; m];
        let n_in = m.saturating_sub(2);
        if n_in == 0 {
            return big_m;
        }
        let h = &self.h;

        let mut d_prime = vec![0.0; n_in];
        for r in 0..n_in {
            let i = r + 1;
            let rhs = 6.0 * ((y[i + 1] - y[i]) / h[i] - (y[i] - y[i - 1]) / h[i - 1]);
            d_prime[r] = if r == 0 {
                rhs / self.denom[r]
            } else {
                (rhs - h[i - 1] * d_prime[r - 1]) / self.denom[r]
            };
        }
        big_m[n_in] = d_prime[n_in - 1];
        for r in (0..n_in - 1).rev() {
            big_m[r + 1] = d_prime[r] - self.c_prime[r] * big_m[r + 2];
        }
        big_m
    }

    /// Evaluate the spline through `(knots, y)` at `x`.
    fn eval_with(&self, y: &[f64], big_m: &[f64], x: f64) -> f64 {
        let xs = &self.knots;
        let last = xs.len() - 1;
        if x <= xs[0] {
            return y[0];
        }
        if x >= xs[last] {
            return y[last];
        }
        // Interval containing x: xs[i] <= x < xs[i+1].
        let i = xs.partition_point(|&k| k <= x) - 1;
        let h = self.h[i];
        let a = xs[i + 1] - x;
        let b = x - xs[i];
        big_m[i] * a.powi(3) / (6.0 * h)
            + big_m[i + 1] * b.powi(3) / (6.0 * h)
            + (y[i] / h - big_m[i] * h / 6.0) * a
            + (y[i + 1] / h - big_m[i + 1] * h / 6.0) * b
    }

    /// Fill the target frames of one full-length signal.
    ///
    /// Values at the knots are read from `signal`; values at the targets are
    /// ignored (they may be NaN).
    pub fn fill(&self, signal: ArrayView1<f64>) -> Array1<f64> {
        let y: Vec<f64> = self.knots.iter().map(|&k| signal[k as usize]).collect();
        let big_m = self.second_derivatives(&y);
        let mut out = signal.to_owned();
        for &t in &self.targets {
            out[t] = self.eval_with(&y, &big_m, t as f64);
        }
        out
    }

    /// Fill the target frames of every column of a `[T, C]` matrix.
    pub fn fill_columns(&self, data: &Array2<f64>) -> Array2<f64> {
        let mut out = data.clone();
        for (c, col) in data.columns().into_iter().enumerate() {
            out.column_mut(c).assign(&self.fill(col));
        }
        out
    }
}

/// Replace the bad frames of a single signal by spline interpolation.
pub fn interpolate_bad_frames(
    signal: ArrayView1<f64>,
    quality: &FrameQuality,
) -> Result<Array1<f64>> {
    check_len(signal.len(), quality)?;
    Ok(GapFiller::new(quality)?.fill(signal))
}

/// Replace the bad frames (rows) of every column of `[T, C]` data.
pub fn interpolate_columns(data: &Array2<f64>, quality: &FrameQuality) -> Result<Array2<f64>> {
    check_len(data.nrows(), quality)?;
    Ok(GapFiller::new(quality)?.fill_columns(data))
}

fn check_len(n: usize, quality: &FrameQuality) -> Result<()> {
    if n != quality.n_frames() {
        return Err(FcError::ShapeMismatch {
            what: "signal length vs frame count",
            expected: quality.n_frames(),
            got: n,
        });
    }
    Ok(())
}
