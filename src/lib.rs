//! # fcnet — resting-state functional-connectivity networks in Rust
//!
//! `fcnet` turns a preprocessed 4-D BOLD series into a thresholded
//! ROI-to-ROI connectivity graph and its graph-theoretic metrics.
//! Registration, segmentation and motion estimation are done by external
//! imaging tools; this crate consumes their arrays.
//!
//! ## Pipeline overview
//!
//! ```text
//! bold [X,Y,Z,T] + mask + tissue + motion [T,6] + fd [T]
//!   │
//!   ├─ artifact::detect_bad_frames()   FD > threshold, plus the next frame
//!   ├─ regress::detrend_good_frames()  linear trend fitted on good frames
//!   ├─ regress::build_design()         24 motion + CSF/WM (+ global) + CompCor
//!   ├─ regress::regress_nuisance()     OLS on good frames, residuals kept
//!   ├─ interpolate_columns()           natural cubic spline over bad frames
//!   ├─ filter::bandpass_columns()      FFT brick-wall 0.009–0.08 Hz, bad frames re-marked
//!   ├─ roi::rasterize_rois()           5 mm spheres around atlas centres
//!   ├─ roi::roi_time_series()          mean signal, good frames only
//!   ├─ network::build_network()        Pearson r → density threshold → LCC
//!   └─ metrics::compute_metrics()      degree, clustering, paths, PageRank …
//!        │
//!        └─→ PipelineOutput (every stage kept for QC)
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use fcnet::{run, AffineMap, PipelineConfig};
//! use fcnet::io::{load_atlas, SubjectData};
//! use std::path::Path;
//!
//! let subject = SubjectData::load(Path::new("sub-01.safetensors")).unwrap();
//! let atlas   = load_atlas(Path::new("power264.json")).unwrap();
//! let map     = AffineMap::scaled(subject.input.series.geometry.voxel_size, [0.0; 3]);
//!
//! let cfg = PipelineConfig::default();
//! let out = run(&subject.input, &atlas, &map, &cfg).unwrap();
//!
//! println!("edges: {}", out.network.graph.edge_count());
//! println!("global efficiency: {:?}", out.metrics.global_efficiency);
//! ```
//!
//! ## Running individual steps
//!
//! Each stage is a standalone function over `ndarray` matrices:
//!
//! ```no_run
//! use fcnet::{detect_bad_frames, interpolate_columns};
//! use fcnet::filter::bandpass_columns;
//! use ndarray::Array2;
//!
//! let data: Array2<f64> = Array2::zeros((200, 50)); // [T, V]
//! let fd = vec![0.05; 200];
//!
//! let quality = detect_bad_frames(&fd, 0.2);
//! let filled  = interpolate_columns(&data, &quality).unwrap();
//! let clean   = bandpass_columns(&filled, 2.0, 0.009, 0.08).unwrap();
//! ```

pub mod artifact;
pub mod config;
pub mod error;
pub mod filter;
pub mod interpolate;
pub mod io;
pub mod metrics;
pub mod network;
pub mod pipeline;
pub mod regress;
pub mod roi;
pub mod timeseries;

// ── Crate-root re-exports ─────────────────────────────────────────────────
//
// Everything a downstream user is likely to need is available directly as
// `fcnet::Foo` without having to know the internal module layout.

// config / errors
pub use config::{CompCorSource, PipelineConfig, TissueLabels};
pub use error::{Diagnostic, FcError, Result};

// data model
pub use timeseries::{TimeSeriesMatrix, VolumeGeometry};

// artifact detection + interpolation
pub use artifact::{detect_bad_frames, FrameQuality};
pub use interpolate::{interpolate_bad_frames, interpolate_columns, GapFiller};

// detrend + nuisance regression
pub use regress::{
    build_design, compcor, detrend_good_frames, ols_residuals, regress_nuisance, ColumnBasis,
    NuisanceBuilder, NuisanceMatrix,
};

// band-pass
pub use filter::{bandpass_columns, BandPass};

// ROIs
pub use roi::{
    rasterize_rois, roi_time_series, system_time_series, AffineMap, Atlas, AtlasPoint,
    CoordinateMap, Roi, RoiSet, System, SystemSignal,
};

// network + metrics
pub use metrics::{compute_metrics, GraphMetrics, MetricSummary, NodeMetrics};
pub use network::{
    build_network, correlation_matrix, threshold_by_density, AdjacencyGraph, Network, Thresholded,
};

// orchestration
pub use pipeline::{run, PipelineOutput, SubjectInput};
