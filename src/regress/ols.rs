//! Ordinary least squares via a thin SVD of the design matrix.
//!
//! With `X = U Σ Vᵀ` of full column rank, the fitted values of any response
//! `Y` are `U Uᵀ Y`, so residuals are `Y − U (Uᵀ Y)`.  Coefficients are never
//! formed.
use nalgebra::{DMatrix, SVD};
use ndarray::Array2;
use tracing::debug;

use crate::error::{FcError, Result};

/// Iteration cap of the SVD; an unconverged factorisation is reported as
/// [`FcError::SingularDesign`].
const MAX_SVD_ITERATIONS: usize = 10_000;

/// Orthonormal basis of the column space of a full-rank design.
#[derive(Debug, Clone)]
pub struct ColumnBasis {
    /// `[n, k]` orthonormal columns.
    u: Array2<f64>,
}

impl ColumnBasis {
    /// Factor `x` (`[n, k]`) and verify it has full column rank.
    ///
    /// Rank is the number of singular values above
    /// `max(n, k) · ε · σ_max`.  A NaN or infinite entry fails with
    /// [`FcError::NonFinite`].
    pub fn new(x: &Array2<f64>) -> Result<Self> {
        let (n, k) = x.dim();
        if n < k {
            return Err(FcError::SingularDesign { rank: n, columns: k, rows: n });
        }
        if k == 0 {
            return Ok(Self { u: Array2::zeros((n, 0)) });
        }
        if let Some(((frame, column), _)) = x.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(FcError::NonFinite { stage: "least-squares design", frame, column });
        }

        let mat = DMatrix::from_fn(n, k, |i, j| x[[i, j]]);
        let svd = SVD::try_new(mat, true, false, f64::EPSILON, MAX_SVD_ITERATIONS)
            .ok_or(FcError::SingularDesign { rank: 0, columns: k, rows: n })?;
        let sigma = &svd.singular_values;
        let s_max = sigma.iter().cloned().fold(0.0_f64, f64::max);
        let tol = n.max(k) as f64 * f64::EPSILON * s_max;
        let rank = sigma.iter().filter(|&&s| s > tol).count();
        debug!(rows = n, columns = k, rank, "design factorised");
        if rank < k {
            return Err(FcError::SingularDesign { rank, columns: k, rows: n });
        }

        let u_mat = svd
            .u
            .ok_or(FcError::SingularDesign { rank: 0, columns: k, rows: n })?;
        let u = Array2::from_shape_fn((n, k), |(i, j)| u_mat[(i, j)]);
        Ok(Self { u })
    }

    /// Residuals of every column of `y` (`[n, m]`) after projecting out the basis.
    pub fn residuals(&self, y: &Array2<f64>) -> Result<Array2<f64>> {
        if y.nrows() != self.u.nrows() {
            return Err(FcError::ShapeMismatch {
                what: "response rows vs design rows",
                expected: self.u.nrows(),
                got: y.nrows(),
            });
        }
        let coef = self.u.t().dot(y);
        Ok(y - &self.u.dot(&coef))
    }
}

/// Regress `x` (`[n, k]`) out of every column of `y` (`[n, m]`).
pub fn ols_residuals(x: &Array2<f64>, y: &Array2<f64>) -> Result<Array2<f64>> {
    ColumnBasis::new(x)?.residuals(y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_fit_leaves_zero_residual() {
        let x = Array2::from_shape_fn((20, 2), |(i, j)| if j == 0 { 1.0 } else { i as f64 });
        let y = Array2::from_shape_fn((20, 1), |(i, _)| 4.0 - 0.5 * i as f64);
        let r = ols_residuals(&x, &y).unwrap();
        for &v in r.iter() {
            approx::assert_abs_diff_eq!(v, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn duplicated_column_is_singular() {
        let x = Array2::from_shape_fn((10, 3), |(i, j)| if j == 0 { 1.0 } else { i as f64 });
        let err = ColumnBasis::new(&x).unwrap_err();
        assert!(matches!(err, FcError::SingularDesign { columns: 3, .. }));
    }

    #[test]
    fn nan_in_design_is_rejected() {
        let mut x = Array2::from_shape_fn((40, 3), |(i, j)| ((i * (j + 1)) % 7) as f64);
        x[[5, 1]] = f64::NAN;
        let y = Array2::zeros((40, 1));
        assert_eq!(
            ols_residuals(&x, &y).unwrap_err(),
            FcError::NonFinite { stage: "least-squares design", frame: 5, column: 1 }
        );
    }

    #[test]
    fn more_columns_than_rows_is_singular() {
        let x = Array2::from_shape_fn((3, 5), |(i, j)| ((i + 1) * (j + 2)) as f64);
        assert!(matches!(
            ColumnBasis::new(&x),
            Err(FcError::SingularDesign { rows: 3, columns: 5, .. })
        ));
    }
}
