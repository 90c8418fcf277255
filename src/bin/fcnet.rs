/// fcnet: run the connectivity pipeline on one subject bundle and write the
/// network, node metrics and a JSON report.
///
/// ```text
/// fcnet --input sub-01.safetensors --atlas power264.json \
///       --output sub-01_net.safetensors --report sub-01_report.json --qc
/// ```
///
/// Without an `affine` tensor in the input, the voxel grid is assumed to be
/// axis-aligned and centred on world (0, 0, 0).
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fcnet::io::{load_atlas, write_outputs, Report, SubjectData};
use fcnet::{run, AffineMap, CompCorSource, PipelineConfig};

#[derive(Parser, Debug)]
#[command(name = "fcnet", about = "Resting-state functional-connectivity network pipeline")]
struct Args {
    /// Subject bundle (bold, mask, tissue, motion, fd, voxel_size[, affine]).
    #[arg(long)]
    input: PathBuf,

    /// Atlas JSON: [{id, x, y, z, system, color}, ...]
    #[arg(long)]
    atlas: PathBuf,

    /// Output safetensors path.
    #[arg(long)]
    output: PathBuf,

    /// Optional JSON report path.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Optional JSON config; any subset of the fields.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Framewise-displacement threshold (mm).
    #[arg(long)]
    fd_threshold: Option<f64>,

    /// Repetition time (s).
    #[arg(long)]
    tr: Option<f64>,

    /// Edge density of the thresholded graph, in (0, 1].
    #[arg(long)]
    density: Option<f64>,

    /// Number of CompCor components (0 disables).
    #[arg(long)]
    n_compcor: Option<usize>,

    /// Draw CompCor components from the highest-variance voxels (tCompCor)
    /// instead of CSF and white matter.
    #[arg(long)]
    tcompcor: bool,

    /// Add the global signal (+ derivative) to the nuisance design.
    #[arg(long)]
    global_signal: bool,

    /// Also write every intermediate stage matrix.
    #[arg(long)]
    qc: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(v) = args.fd_threshold { cfg.fd_threshold = v; }
    if let Some(v) = args.tr { cfg.tr = v; }
    if let Some(v) = args.density { cfg.density = v; }
    if let Some(v) = args.n_compcor { cfg.n_compcor = v; }
    if args.tcompcor { cfg.compcor_source = CompCorSource::Temporal; }
    if args.global_signal { cfg.global_signal = true; }
    cfg.validate()?;

    let subject = SubjectData::load(&args.input)?;
    let series = &subject.input.series;
    info!(
        frames = series.n_frames(),
        voxels = series.n_voxels(),
        dims = ?series.geometry.dims,
        "subject loaded"
    );

    let atlas = load_atlas(&args.atlas)?;
    info!(rois = atlas.len(), systems = atlas.systems().len(), "atlas loaded");

    let map = match subject.affine {
        Some(aff) => AffineMap::from_voxel_to_world(aff)?,
        None => {
            let g = series.geometry;
            let origin: [f64; 3] =
                std::array::from_fn(|a| -(g.dims[a] as f64 - 1.0) / 2.0 * g.voxel_size[a]);
            AffineMap::scaled(g.voxel_size, origin)
        }
    };

    let out = run(&subject.input, &atlas, &map, &cfg)?;
    for d in out.diagnostics() {
        info!(diagnostic = %d, "non-fatal finding");
    }

    write_outputs(&out, &args.output, args.qc)?;
    info!(path = %args.output.display(), "outputs written");

    if let Some(path) = &args.report {
        Report::new(&out, &cfg).write(path)?;
        info!(path = %path.display(), "report written");
    }

    Ok(())
}
