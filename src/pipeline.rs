//! Stage orchestration.
//!
//! Stages run strictly in order, each consuming the previous stage's
//! output and returning a new value:
//!
//! ```text
//! fd ─► scrub ─► detrend ─► nuisance design ─► regress ─► interpolate
//!                                                           │
//!        metrics ◄─ network ◄─ ROI signals (good frames) ◄─ band-pass
//! ```
//!
//! The run is a pure function of its inputs.  It either returns a complete
//! [`PipelineOutput`] or the first fatal [`FcError`].
//!
//! Inputs are checked before any factorisation: motion must be finite on
//! every frame and the BOLD series on every good frame.  A non-finite
//! framewise displacement scrubs its frame instead.
use std::time::Instant;

use ndarray::{Array1, Array2, Array3};
use tracing::{info, warn};

use crate::artifact::{detect_bad_frames, FrameQuality};
use crate::config::PipelineConfig;
use crate::error::{Diagnostic, FcError, Result};
use crate::filter::bandpass_columns;
use crate::interpolate::interpolate_columns;
use crate::metrics::{compute_metrics, GraphMetrics};
use crate::network::{build_network, Network};
use crate::regress::{build_design, detrend_good_frames, regress_nuisance, NuisanceMatrix};
use crate::roi::{
    rasterize_rois, roi_time_series, system_time_series, Atlas, CoordinateMap, RoiSet,
    SystemSignal,
};
use crate::timeseries::TimeSeriesMatrix;

/// Everything the core needs from the external imaging tools.
#[derive(Debug, Clone)]
pub struct SubjectInput {
    /// In-mask voxel time series.
    pub series: TimeSeriesMatrix,
    /// `[T, 6]` rigid-body motion parameters.
    pub motion: Array2<f64>,
    /// `[T]` framewise displacement.
    pub fd: Array1<f64>,
    /// Tissue-label volume on the functional grid.
    pub tissue: Array3<i32>,
}

/// All stage outputs of one run, kept for quality control.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub quality: FrameQuality,
    pub nuisance: NuisanceMatrix,
    /// `[T, V]`, NaN on bad frames.
    pub detrended: Array2<f64>,
    /// `[T, V]`, NaN on bad frames.
    pub regressed: Array2<f64>,
    /// `[T, V]`, bad frames filled.
    pub interpolated: Array2<f64>,
    /// `[T, V]` band-passed, NaN on bad frames.
    pub filtered: Array2<f64>,
    pub rois: RoiSet,
    /// `[n_good, n_roi]`; zero columns for missing ROIs.
    pub roi_signals: Array2<f64>,
    pub system_signals: Vec<SystemSignal>,
    pub network: Network,
    pub metrics: GraphMetrics,
}

impl PipelineOutput {
    /// Non-fatal findings from all stages.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.rois
            .diagnostics
            .iter()
            .chain(self.metrics.diagnostics.iter())
            .cloned()
            .collect()
    }
}

/// Run a stage with start/finish logging.
fn stage<T>(name: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let start = Instant::now();
    info!(stage = name, "stage started");
    let out = f();
    let elapsed_ms = start.elapsed().as_millis() as u64;
    match &out {
        Ok(_) => info!(stage = name, elapsed_ms, "stage finished"),
        Err(e) => warn!(stage = name, elapsed_ms, error = %e, "stage failed"),
    }
    out
}

/// Fail on the first NaN or infinite value in a row selected by `checked`.
fn check_finite(
    stage: &'static str,
    data: &Array2<f64>,
    checked: impl Fn(usize) -> bool,
) -> Result<()> {
    for (frame, row) in data.rows().into_iter().enumerate() {
        if !checked(frame) {
            continue;
        }
        if let Some(column) = row.iter().position(|v| !v.is_finite()) {
            return Err(FcError::NonFinite { stage, frame, column });
        }
    }
    Ok(())
}

/// Run the full pipeline on one subject.
pub fn run(
    input: &SubjectInput,
    atlas: &Atlas,
    map: &dyn CoordinateMap,
    cfg: &PipelineConfig,
) -> Result<PipelineOutput> {
    cfg.validate()?;
    let series = &input.series;
    let n_t = series.n_frames();
    if input.fd.len() != n_t {
        return Err(FcError::ShapeMismatch {
            what: "framewise displacement length",
            expected: n_t,
            got: input.fd.len(),
        });
    }
    let labels = series.sample_labels(&input.tissue)?;
    check_finite("motion parameters", &input.motion, |_| true)?;
    let missing_fd = input.fd.iter().filter(|d| !d.is_finite()).count();
    if missing_fd > 0 {
        warn!(frames = missing_fd, "non-finite framewise displacement; frames scrubbed");
    }

    let quality = stage("scrub", || {
        let fd: Vec<f64> = input.fd.to_vec();
        let q = detect_bad_frames(&fd, cfg.fd_threshold);
        info!(
            frames = q.n_frames(),
            good = q.n_good(),
            bad = q.n_frames() - q.n_good(),
            threshold = cfg.fd_threshold,
            "frames classified"
        );
        Ok(q)
    })?;
    if quality.n_good() < 2 {
        return Err(FcError::InsufficientData {
            context: "pipeline",
            got: quality.n_good(),
            need: 2,
        });
    }
    check_finite("bold time series", &series.data, |t| quality.is_good(t))?;

    let detrended = stage("detrend", || detrend_good_frames(&series.data, &quality))?;

    let nuisance = stage("nuisance_design", || {
        build_design(&series.with_data(detrended.clone()), &input.motion, &labels, &quality, cfg)
    })?;

    let regressed = stage("regress", || regress_nuisance(&detrended, &nuisance, &quality))?;

    let interpolated = stage("interpolate", || interpolate_columns(&regressed, &quality))?;

    let filtered = stage("bandpass", || {
        let mut out = bandpass_columns(&interpolated, cfg.tr, cfg.low_freq, cfg.high_freq)?;
        for t in quality.bad_frames() {
            out.row_mut(t).fill(f64::NAN);
        }
        Ok(out)
    })?;

    let filtered_series = series.with_data(filtered.clone());
    let (rois, roi_signals, system_signals) = stage("roi", || {
        let rois = rasterize_rois(atlas, map, &filtered_series, cfg.roi_radius_mm, cfg.min_roi_voxels);
        let signals = roi_time_series(&filtered_series, &rois, &quality)?;
        let systems = system_time_series(&signals, &rois);
        info!(rois = rois.len(), missing = rois.n_missing(), systems = systems.len(), "ROI signals extracted");
        Ok((rois, signals, systems))
    })?;

    let network = stage("network", || build_network(&roi_signals, &rois.missing(), cfg.density))?;

    let metrics = stage("metrics", || Ok(compute_metrics(&network.graph, cfg.pagerank_damping)))?;

    Ok(PipelineOutput {
        quality,
        nuisance,
        detrended,
        regressed,
        interpolated,
        filtered,
        rois,
        roi_signals,
        system_signals,
        network,
        metrics,
    })
}
