//! Detrending and nuisance regression.
//!
//! - [`detrend`]: per-column linear detrend fitted on good frames.
//! - [`design`]: 24-parameter motion, tissue-mean, global and CompCor
//!   regressors.
//! - [`ols`]: SVD-based least-squares residuals.
//!
//! Both steps use good frames only; bad frames come out as NaN and are
//! filled later by the interpolation stage.

pub mod design;
pub mod detrend;
pub mod ols;

pub use design::{
    build_design, compcor, first_difference, high_variance_columns, NuisanceBuilder,
    NuisanceMatrix,
};
pub use detrend::{detrend_good_frames, detrend_signal};
pub use ols::{ols_residuals, ColumnBasis};

use ndarray::{Array2, Axis};

use crate::artifact::FrameQuality;
use crate::error::{FcError, Result};

/// Regress `design` (plus an intercept) out of every column of `data`.
///
/// The model is fitted on good frames only and residuals replace the
/// good-frame values.  Bad frames are NaN in the output.  Coefficients are
/// not retained.
pub fn regress_nuisance(
    data: &Array2<f64>,
    design: &NuisanceMatrix,
    quality: &FrameQuality,
) -> Result<Array2<f64>> {
    if data.nrows() != quality.n_frames() || design.data().nrows() != quality.n_frames() {
        return Err(FcError::ShapeMismatch {
            what: "regression rows vs frame count",
            expected: quality.n_frames(),
            got: data.nrows().min(design.data().nrows()),
        });
    }
    let good = quality.good_frames();
    let k = design.n_regressors() + 1;

    let mut x = Array2::<f64>::ones((good.len(), k));
    x.slice_mut(ndarray::s![.., 1..])
        .assign(&design.data().select(Axis(0), &good));
    let y = data.select(Axis(0), &good);

    let resid = ColumnBasis::new(&x)?.residuals(&y)?;

    let mut out = Array2::from_elem(data.dim(), f64::NAN);
    for (r, &t) in good.iter().enumerate() {
        out.row_mut(t).assign(&resid.row(r));
    }
    Ok(out)
}
