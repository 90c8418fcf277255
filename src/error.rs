//! Error taxonomy and non-fatal diagnostics.
//!
//! Structural problems (too few usable frames, a rank-deficient nuisance
//! design, mismatched array shapes) abort the run with an [`FcError`].
//! Problems local to one ROI or one node pair are recorded as a
//! [`Diagnostic`] and the run continues with the affected entry marked
//! missing.
use serde::Serialize;
use thiserror::Error;

/// Fatal pipeline errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FcError {
    /// Too few good frames for the requested operation.
    #[error("insufficient data for {context}: got {got} good frames, need at least {need}")]
    InsufficientData {
        /// Operation that ran out of data (e.g. "spline interpolation").
        context: &'static str,
        /// Number of usable frames.
        got: usize,
        /// Minimum required.
        need: usize,
    },

    /// The nuisance design matrix restricted to good frames is not full rank.
    #[error("nuisance design is singular: rank {rank} < {columns} regressors over {rows} good frames")]
    SingularDesign {
        /// Numerical rank found by SVD.
        rank: usize,
        /// Number of design columns (intercept included).
        columns: usize,
        /// Number of good frames used for the fit.
        rows: usize,
    },

    /// Two inputs that must agree in one dimension do not.
    #[error("shape mismatch for {what}: expected {expected}, got {got}")]
    ShapeMismatch {
        /// Which input pair disagreed.
        what: &'static str,
        /// Expected length.
        expected: usize,
        /// Actual length.
        got: usize,
    },

    /// A stage that needs every frame populated received NaN or infinity.
    #[error("{stage} requires finite input; found a non-finite value at frame {frame}, column {column}")]
    NonFinite {
        stage: &'static str,
        frame: usize,
        column: usize,
    },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Crate-wide result alias for the core stages.
pub type Result<T> = std::result::Result<T, FcError>;

/// Recoverable data-quality findings, collected alongside pipeline output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// ROI has fewer member voxels than required; it is marked missing.
    EmptyRoi { roi_id: u32, voxels: usize },
    /// Atlas point mapped outside the image volume; the ROI is empty.
    OutOfBoundsMapping { roi_id: u32, voxel: [f64; 3] },
    /// Node pairs with no connecting path were excluded from path metrics.
    DisconnectedGraph { disconnected_pairs: usize },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::EmptyRoi { roi_id, voxels } => {
                write!(f, "ROI {roi_id} has {voxels} voxel(s) in mask; marked missing")
            }
            Diagnostic::OutOfBoundsMapping { roi_id, voxel } => write!(
                f,
                "ROI {roi_id} maps to voxel ({:.1}, {:.1}, {:.1}) outside the volume",
                voxel[0], voxel[1], voxel[2]
            ),
            Diagnostic::DisconnectedGraph { disconnected_pairs } => write!(
                f,
                "{disconnected_pairs} connected-node pair(s) have no path; excluded from path metrics"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_problem() {
        let e = FcError::SingularDesign { rank: 10, columns: 31, rows: 12 };
        let msg = e.to_string();
        assert!(msg.contains("rank 10"));
        assert!(msg.contains("31 regressors"));
    }

    #[test]
    fn diagnostic_serializes_with_kind_tag() {
        let d = Diagnostic::EmptyRoi { roi_id: 7, voxels: 1 };
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["kind"], "empty_roi");
        assert_eq!(json["roi_id"], 7);
    }
}
