//! Pipeline configuration.
//!
//! [`PipelineConfig`] holds every tunable parameter for the full
//! connectivity pipeline.  All fields have defaults matching common
//! resting-state practice (Power et al. scrubbing, 0.009–0.08 Hz band,
//! 5 mm spheres, 10 % edge density).
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::FcError;

/// Integer codes used by the tissue-label volume.
///
/// Defaults follow the FSL FAST `pveseg` convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TissueLabels {
    pub csf: i32,
    pub gray: i32,
    pub white: i32,
}

impl Default for TissueLabels {
    fn default() -> Self {
        Self { csf: 1, gray: 2, white: 3 }
    }
}

/// Which voxels feed the CompCor noise components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompCorSource {
    /// aCompCor: CSF and white-matter voxels.
    #[default]
    Anatomical,
    /// tCompCor: the highest-variance voxels of the whole mask, ranked on
    /// good frames.
    Temporal,
}

/// Configuration for the full connectivity pipeline.
///
/// All fields are `pub` so you can construct one with struct-update syntax:
///
/// ```
/// use fcnet::PipelineConfig;
///
/// let cfg = PipelineConfig {
///     fd_threshold: 0.5,   // lenient scrubbing
///     density:      0.05,  // sparser graph
///     ..PipelineConfig::default()
/// };
/// assert!(cfg.validate().is_ok());
/// ```
///
/// A JSON file containing any subset of the fields can be loaded with
/// [`PipelineConfig::from_json_file`]; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Framewise-displacement threshold (mm) above which a frame and its
    /// successor are scrubbed.
    ///
    /// Typical values lie in 0.1–0.5 mm.
    ///
    /// Default: `0.2`.
    pub fd_threshold: f64,

    /// Repetition time: seconds between consecutive frames.
    ///
    /// Default: `2.0` s.
    pub tr: f64,

    /// Lower edge of the band-pass filter in Hz.
    ///
    /// Default: `0.009` Hz.
    pub low_freq: f64,

    /// Upper edge of the band-pass filter in Hz.  Must lie below the Nyquist
    /// frequency `1 / (2 · tr)`.
    ///
    /// Default: `0.08` Hz.
    pub high_freq: f64,

    /// Number of CompCor noise components added to the nuisance design.
    ///
    /// Set to `0` to disable.
    ///
    /// Default: `4`.
    pub n_compcor: usize,

    /// Noise pool of the CompCor components.
    ///
    /// Default: [`CompCorSource::Anatomical`].
    pub compcor_source: CompCorSource,

    /// Fraction of in-mask voxels, ranked by good-frame variance, that form
    /// the pool when `compcor_source` is [`CompCorSource::Temporal`].
    ///
    /// Default: `0.02`.
    pub tcompcor_fraction: f64,

    /// Add the whole-brain mean signal and its first difference as regressors.
    ///
    /// Default: `false`.
    pub global_signal: bool,

    /// Radius of each ROI sphere in millimetres.
    ///
    /// Default: `5.0` mm.
    pub roi_radius_mm: f64,

    /// ROIs with fewer in-mask voxels than this are marked missing.
    ///
    /// Default: `2`.
    pub min_roi_voxels: usize,

    /// Fraction of all node pairs kept as edges after thresholding.
    ///
    /// Default: `0.10`.
    pub density: f64,

    /// Damping factor of the page-rank random walk.
    ///
    /// Default: `0.85`.
    pub pagerank_damping: f64,

    /// Integer codes of the tissue-label volume.
    pub tissue: TissueLabels,
}

impl Default for PipelineConfig {
    /// Returns the standard resting-state configuration:
    /// FD 0.2 mm · TR 2 s · 0.009–0.08 Hz · 4 CompCor · 5 mm ROIs · 10 % density.
    fn default() -> Self {
        Self {
            fd_threshold: 0.2,
            tr: 2.0,
            low_freq: 0.009,
            high_freq: 0.08,
            n_compcor: 4,
            compcor_source: CompCorSource::Anatomical,
            tcompcor_fraction: 0.02,
            global_signal: false,
            roi_radius_mm: 5.0,
            min_roi_voxels: 2,
            density: 0.10,
            pagerank_damping: 0.85,
            tissue: TissueLabels::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file.  Absent fields keep defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Nyquist frequency in Hz for the configured TR.
    pub fn nyquist(&self) -> f64 {
        0.5 / self.tr
    }

    /// Check that every parameter lies in its valid range.
    pub fn validate(&self) -> crate::Result<()> {
        let bad = |msg: String| Err(FcError::InvalidConfig(msg));
        if !(self.fd_threshold.is_finite() && self.fd_threshold >= 0.0) {
            return bad(format!("fd_threshold must be >= 0, got {}", self.fd_threshold));
        }
        if !(self.tr.is_finite() && self.tr > 0.0) {
            return bad(format!("tr must be > 0, got {}", self.tr));
        }
        if !(self.low_freq >= 0.0 && self.low_freq < self.high_freq) {
            return bad(format!(
                "passband must satisfy 0 <= low < high, got {}..{}",
                self.low_freq, self.high_freq
            ));
        }
        if self.high_freq > self.nyquist() {
            return bad(format!(
                "high_freq {} Hz exceeds Nyquist {} Hz for TR {} s",
                self.high_freq,
                self.nyquist(),
                self.tr
            ));
        }
        if !(self.tcompcor_fraction > 0.0 && self.tcompcor_fraction <= 1.0) {
            return bad(format!(
                "tcompcor_fraction must lie in (0, 1], got {}",
                self.tcompcor_fraction
            ));
        }
        if !(self.roi_radius_mm > 0.0) {
            return bad(format!("roi_radius_mm must be > 0, got {}", self.roi_radius_mm));
        }
        if !(self.density > 0.0 && self.density <= 1.0) {
            return bad(format!("density must lie in (0, 1], got {}", self.density));
        }
        if !(self.pagerank_damping > 0.0 && self.pagerank_damping < 1.0) {
            return bad(format!(
                "pagerank_damping must lie in (0, 1), got {}",
                self.pagerank_damping
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn passband_above_nyquist_rejected() {
        let cfg = PipelineConfig { tr: 10.0, ..PipelineConfig::default() };
        // Nyquist = 0.05 Hz < 0.08 Hz.
        assert!(matches!(cfg.validate(), Err(FcError::InvalidConfig(_))));
    }

    #[test]
    fn zero_density_rejected() {
        let cfg = PipelineConfig { density: 0.0, ..PipelineConfig::default() };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn temporal_compcor_parses_and_checks_fraction() {
        let cfg: PipelineConfig =
            serde_json::from_str(r#"{ "compcor_source": "temporal", "tcompcor_fraction": 0.05 }"#)
                .unwrap();
        assert_eq!(cfg.compcor_source, CompCorSource::Temporal);
        assert!(cfg.validate().is_ok());
        let cfg = PipelineConfig { tcompcor_fraction: 0.0, ..cfg };
        assert!(matches!(cfg.validate(), Err(FcError::InvalidConfig(_))));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: PipelineConfig =
            serde_json::from_str(r#"{ "density": 0.05, "tissue": { "csf": 3 } }"#).unwrap();
        assert_eq!(cfg.density, 0.05);
        assert_eq!(cfg.tr, 2.0);
        assert_eq!(cfg.tissue.csf, 3);
        assert_eq!(cfg.tissue.white, 3);
    }
}
