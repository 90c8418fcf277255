//! Linear detrending over good frames.
//!
//! For every column the least-squares line `a + b·t` is fitted to the good
//! frames only and subtracted from them.  Bad frames are set to NaN: they
//! carry no valid value until the interpolation stage fills them.
use ndarray::{Array1, Array2};

use crate::artifact::FrameQuality;
use crate::error::{FcError, Result};

/// Detrend every column of `[T, C]` data using good frames only.
pub fn detrend_good_frames(data: &Array2<f64>, quality: &FrameQuality) -> Result<Array2<f64>> {
    if data.nrows() != quality.n_frames() {
        return Err(FcError::ShapeMismatch {
            what: "rows vs frame count",
            expected: quality.n_frames(),
            got: data.nrows(),
        });
    }
    let good = quality.good_frames();
    if good.len() < 2 {
        return Err(FcError::InsufficientData {
            context: "linear detrend",
            got: good.len(),
            need: 2,
        });
    }

    let n = good.len() as f64;
    let t_mean = good.iter().map(|&t| t as f64).sum::<f64>() / n;
    let sxx: f64 = good.iter().map(|&t| (t as f64 - t_mean).powi(2)).sum();

    let mut out = Array2::from_elem(data.dim(), f64::NAN);
    for (c, col) in data.columns().into_iter().enumerate() {
        let y_mean = good.iter().map(|&t| col[t]).sum::<f64>() / n;
        let sxy: f64 = good
            .iter()
            .map(|&t| (t as f64 - t_mean) * (col[t] - y_mean))
            .sum();
        let slope = sxy / sxx;
        let intercept = y_mean - slope * t_mean;
        for &t in &good {
            out[[t, c]] = col[t] - (intercept + slope * t as f64);
        }
    }
    Ok(out)
}

/// Detrend a single signal; convenience wrapper around [`detrend_good_frames`].
pub fn detrend_signal(signal: &Array1<f64>, quality: &FrameQuality) -> Result<Array1<f64>> {
    let col = signal.clone().insert_axis(ndarray::Axis(1));
    let out = detrend_good_frames(&col, quality)?;
    Ok(out.column(0).to_owned())
}
