//! Safetensors / JSON I/O for the command-line tool.
//!
//! Reader: an input bundle with the arrays produced by the external imaging
//! tools (see [`SubjectData`]).  Writer: correlation, graph, metrics and,
//! on request, every intermediate stage matrix.
use anyhow::{bail, Context, Result};
use ndarray::{Array1, Array2, Array3, Array4};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

use crate::config::{CompCorSource, PipelineConfig};
use crate::error::Diagnostic;
use crate::pipeline::{PipelineOutput, SubjectInput};
use crate::roi::{Atlas, System};
use crate::timeseries::TimeSeriesMatrix;

// ── Low-level safetensors parser (raw bytes → f64 values + shape). ───────────

fn parse_header(bytes: &[u8]) -> Result<(HashMap<String, serde_json::Value>, usize)> {
    if bytes.len() < 8 {
        bail!("safetensors file too small");
    }
    let n = u64::from_le_bytes(bytes[..8].try_into()?);
    let end = usize::try_from(n)
        .ok()
        .and_then(|n| n.checked_add(8))
        .filter(|&end| end <= bytes.len())
        .with_context(|| format!("safetensors header length {n} exceeds file size"))?;
    let header: HashMap<String, serde_json::Value> =
        serde_json::from_slice(&bytes[8..end])
            .context("failed to parse safetensors header")?;
    Ok((header, end))
}

/// One decoded tensor, values widened to `f64`, C order.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    pub shape: Vec<usize>,
    pub values: Vec<f64>,
}

/// An opened safetensors file.
pub struct SafeTensors {
    bytes: Vec<u8>,
    header: HashMap<String, serde_json::Value>,
    data_start: usize,
}

impl SafeTensors {
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let (header, data_start) = parse_header(&bytes)?;
        Ok(Self { bytes, header, data_start })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.header.contains_key(name)
    }

    /// Decode tensor `name`.  F32, F64, I32, I64 and U8 are supported.
    pub fn tensor(&self, name: &str) -> Result<Tensor> {
        let entry = self
            .header
            .get(name)
            .with_context(|| format!("missing '{name}' tensor"))?;
        let dtype = entry["dtype"].as_str().context("tensor dtype is not a string")?;
        let offsets = entry["data_offsets"]
            .as_array()
            .context("tensor data_offsets is not an array")?;
        let (s, e) = match offsets.as_slice() {
            [s, e] => (
                s.as_u64().context("bad data offset")? as usize,
                e.as_u64().context("bad data offset")? as usize,
            ),
            _ => bail!("tensor '{name}' must have two data offsets"),
        };
        let raw = self
            .data_start
            .checked_add(s)
            .zip(self.data_start.checked_add(e))
            .filter(|(start, end)| start <= end)
            .and_then(|(start, end)| self.bytes.get(start..end))
            .with_context(|| format!("tensor '{name}' data out of file bounds"))?;
        let shape = self.shape_of(name)?;

        let values: Vec<f64> = match dtype {
            "F32" => raw.chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
                .collect(),
            "F64" => raw.chunks_exact(8)
                .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
                .collect(),
            "I32" => raw.chunks_exact(4)
                .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
                .collect(),
            "I64" => raw.chunks_exact(8)
                .map(|b| i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f64)
                .collect(),
            "U8" => raw.iter().map(|&b| b as f64).collect(),
            other => bail!("tensor '{name}' has unsupported dtype {other}"),
        };
        if values.len() != shape.iter().product::<usize>() {
            bail!("tensor '{name}': {} values do not fill shape {shape:?}", values.len());
        }
        Ok(Tensor { shape, values })
    }

    fn array<D: ndarray::Dimension>(&self, name: &str, dim: D) -> Result<ndarray::Array<f64, D>> {
        let t = self.tensor(name)?;
        if t.shape != dim.slice() {
            bail!("tensor '{name}' has shape {:?}, expected {:?}", t.shape, dim.slice());
        }
        Ok(ndarray::Array::from_shape_vec(dim, t.values)?)
    }

    /// Shape from the header, without decoding the data.
    fn shape_of(&self, name: &str) -> Result<Vec<usize>> {
        let entry = self
            .header
            .get(name)
            .with_context(|| format!("missing '{name}' tensor"))?;
        entry["shape"]
            .as_array()
            .context("tensor shape is not an array")?
            .iter()
            .map(|v| v.as_u64().map(|d| d as usize).context("bad shape entry"))
            .collect()
    }
}

// ── Input bundle ──────────────────────────────────────────────────────────────

/// Subject arrays loaded from one safetensors bundle.
///
/// | key          | shape        | meaning                               |
/// |--------------|--------------|---------------------------------------|
/// | `bold`       | `[X,Y,Z,T]`  | preprocessed functional volume        |
/// | `mask`       | `[X,Y,Z]`    | brain mask, non-zero = inside         |
/// | `tissue`     | `[X,Y,Z]`    | integer tissue labels                 |
/// | `motion`     | `[T,6]`      | translations (mm) + rotations         |
/// | `fd`         | `[T]`        | framewise displacement                |
/// | `voxel_size` | `[3]`        | voxel size in mm                      |
/// | `affine`     | `[4,4]`      | optional voxel → world affine         |
pub struct SubjectData {
    pub input: SubjectInput,
    pub affine: Option<[[f64; 4]; 4]>,
}

impl SubjectData {
    pub fn load(path: &Path) -> Result<Self> {
        let st = SafeTensors::open(path)?;

        let bold_shape = st.shape_of("bold")?;
        let [nx, ny, nz, nt] = match bold_shape.as_slice() {
            &[x, y, z, t] => [x, y, z, t],
            other => bail!("'bold' must be 4-D, got shape {other:?}"),
        };
        let bold: Array4<f64> = st.array("bold", ndarray::Ix4(nx, ny, nz, nt))?;
        let mask: Array3<bool> = st.array("mask", ndarray::Ix3(nx, ny, nz))?.mapv(|v| v != 0.0);
        let tissue: Array3<i32> =
            st.array("tissue", ndarray::Ix3(nx, ny, nz))?.mapv(|v| v.round() as i32);
        let motion: Array2<f64> = st.array("motion", ndarray::Ix2(nt, 6))?;
        let fd: Array1<f64> = st.array("fd", ndarray::Ix1(nt))?;
        let vs = st.array("voxel_size", ndarray::Ix1(3))?;
        let voxel_size = [vs[0], vs[1], vs[2]];

        let affine = if st.contains("affine") {
            let a = st.array("affine", ndarray::Ix2(4, 4))?;
            Some(std::array::from_fn(|r| std::array::from_fn(|c| a[[r, c]])))
        } else {
            None
        };

        let series = TimeSeriesMatrix::from_volume(&bold, &mask, voxel_size)?;
        Ok(SubjectData { input: SubjectInput { series, motion, fd, tissue }, affine })
    }
}

/// Load a JSON atlas (see [`crate::roi::atlas`] for the record schema).
pub fn load_atlas(path: &Path) -> Result<Atlas> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading atlas {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing atlas {}", path.display()))
}

// ── Generic safetensors builder ───────────────────────────────────────────────

/// Simple safetensors file writer for F32, F64, I32 and U8 tensors.
///
/// Usage:
/// ```rust,no_run
/// use fcnet::io::StWriter;
/// use std::path::Path;
/// let mut w = StWriter::new();
/// w.add_f32("signal", &[1.0f32, 2.0, 3.0], &[1, 3]);
/// w.add_f64("signal_d", &[1.0f64, 2.0, 3.0], &[1, 3]);
/// w.write(Path::new("/tmp/out.safetensors")).unwrap();
/// ```
#[derive(Default)]
pub struct StWriter {
    entries: Vec<(String, Vec<u8>, &'static str, Vec<usize>)>,
}

impl StWriter {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn add_f32(&mut self, name: &str, data: &[f32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F32", shape.to_vec()));
    }

    pub fn add_f64(&mut self, name: &str, data: &[f64], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F64", shape.to_vec()));
    }

    pub fn add_f64_arr2(&mut self, name: &str, arr: &Array2<f64>) {
        let data: Vec<f64> = arr.iter().copied().collect();
        self.add_f64(name, &data, &[arr.nrows(), arr.ncols()]);
    }

    /// Per-node optional values; `None` is written as NaN.
    pub fn add_optional(&mut self, name: &str, values: &[Option<f64>]) {
        let data: Vec<f64> = values.iter().map(|v| v.unwrap_or(f64::NAN)).collect();
        self.add_f64(name, &data, &[data.len()]);
    }

    pub fn add_i32(&mut self, name: &str, data: &[i32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "I32", shape.to_vec()));
    }

    pub fn add_u8(&mut self, name: &str, data: &[u8], shape: &[usize]) {
        self.entries.push((name.to_string(), data.to_vec(), "U8", shape.to_vec()));
    }

    pub fn add_u8_arr2(&mut self, name: &str, arr: &Array2<u8>) {
        let data: Vec<u8> = arr.iter().copied().collect();
        self.add_u8(name, &data, &[arr.nrows(), arr.ncols()]);
    }

    /// Serialised file: little-endian header length, space-padded JSON
    /// header, then every tensor's bytes in insertion order.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut header = serde_json::Map::new();
        let mut offset = 0usize;
        for (name, data, dtype, shape) in &self.entries {
            let end = offset + data.len();
            header.insert(
                name.clone(),
                serde_json::json!({ "dtype": dtype, "shape": shape, "data_offsets": [offset, end] }),
            );
            offset = end;
        }
        let mut json = serde_json::to_vec(&header)?;
        json.resize(json.len().next_multiple_of(8), b' ');

        let mut out = Vec::with_capacity(8 + json.len() + offset);
        out.extend_from_slice(&(json.len() as u64).to_le_bytes());
        out.extend_from_slice(&json);
        for (_, data, _, _) in &self.entries {
            out.extend_from_slice(data);
        }
        Ok(out)
    }

    /// Write to `path` through a sibling `*.partial` file that is renamed
    /// into place.  On failure the partial file is removed and `path` is
    /// left untouched.
    pub fn write(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        let mut partial = path.as_os_str().to_owned();
        partial.push(".partial");
        let partial = std::path::PathBuf::from(partial);

        let result = std::fs::write(&partial, &bytes)
            .with_context(|| format!("writing {}", partial.display()))
            .and_then(|()| {
                std::fs::rename(&partial, path)
                    .with_context(|| format!("moving output into {}", path.display()))
            });
        if result.is_err() {
            let _ = std::fs::remove_file(&partial);
        }
        result
    }
}

// ── Pipeline outputs ─────────────────────────────────────────────────────────

fn as_i32(idx: &[usize]) -> Vec<i32> {
    idx.iter().map(|&i| i as i32).collect()
}

/// Write network, metrics and (with `include_qc`) every stage matrix.
///
/// Output keys:
///   correlation            [R, R]  f64
///   adjacency              [R, R]  u8   after largest-component pruning
///   adjacency_thresholded  [R, R]  u8   before pruning
///   distances              [R, R]  f64  +inf for disconnected pairs
///   roi_signals            [G, R]  f64  good frames only
///   roi_missing            [R]     u8
///   roi_ids                [R]     i32
///   good_frames / bad_frames       i32
///   degree, clustering, mean_path_length, local_efficiency, pagerank
///                          [R]     f64  NaN = undefined
///   system_mean_<name> / system_std_<name>  [G] f64
///   qc_detrended, qc_regressed, qc_interpolated, qc_filtered  [T, V] f64
///   qc_nuisance            [T, K]  f64
pub fn write_outputs(out: &PipelineOutput, path: &Path, include_qc: bool) -> Result<()> {
    let mut w = StWriter::new();
    let n_roi = out.rois.len();

    w.add_f64_arr2("correlation", &out.network.correlation);
    w.add_u8_arr2("adjacency", &out.network.graph.to_matrix());
    w.add_u8_arr2("adjacency_thresholded", &out.network.thresholded.graph.to_matrix());
    w.add_f64_arr2("distances", &out.metrics.distances);
    w.add_f64_arr2("roi_signals", &out.roi_signals);

    let missing: Vec<u8> = out.rois.rois.iter().map(|r| r.missing as u8).collect();
    w.add_u8("roi_missing", &missing, &[n_roi]);
    let ids: Vec<i32> = out.rois.rois.iter().map(|r| r.id as i32).collect();
    w.add_i32("roi_ids", &ids, &[n_roi]);

    let good = out.quality.good_frames();
    let bad = out.quality.bad_frames();
    w.add_i32("good_frames", &as_i32(&good), &[good.len()]);
    w.add_i32("bad_frames", &as_i32(&bad), &[bad.len()]);

    let nodes = &out.metrics.nodes;
    w.add_optional("degree", &nodes.degree);
    w.add_optional("clustering", &nodes.clustering);
    w.add_optional("mean_path_length", &nodes.mean_path_length);
    w.add_optional("local_efficiency", &nodes.local_efficiency);
    w.add_optional("pagerank", &nodes.pagerank);

    for s in &out.system_signals {
        let key = system_key(s.system);
        w.add_f64(&format!("system_mean_{key}"), &s.mean.to_vec(), &[s.mean.len()]);
        w.add_f64(&format!("system_std_{key}"), &s.std.to_vec(), &[s.std.len()]);
    }

    if include_qc {
        w.add_f64_arr2("qc_detrended", &out.detrended);
        w.add_f64_arr2("qc_regressed", &out.regressed);
        w.add_f64_arr2("qc_interpolated", &out.interpolated);
        w.add_f64_arr2("qc_filtered", &out.filtered);
        w.add_f64_arr2("qc_nuisance", out.nuisance.data());
    }

    w.write(path)
}

fn system_key(system: System) -> String {
    serde_json::to_value(system)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| format!("{system:?}"))
}

/// JSON summary of one run.
#[derive(Debug, Serialize)]
pub struct Report {
    pub n_frames: usize,
    pub n_good_frames: usize,
    pub bad_frames: Vec<usize>,
    pub n_voxels: usize,
    pub n_regressors: usize,
    pub regressors: Vec<String>,
    pub n_rois: usize,
    pub n_missing_rois: usize,
    pub density: f64,
    pub compcor_source: CompCorSource,
    pub threshold: Option<f64>,
    pub target_edges: usize,
    pub edges_thresholded: usize,
    pub edges: usize,
    pub component_sizes: Vec<usize>,
    pub global_efficiency: Option<f64>,
    pub global_clustering: Option<f64>,
    pub node_summaries: serde_json::Map<String, serde_json::Value>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Report {
    pub fn new(out: &PipelineOutput, cfg: &PipelineConfig) -> Self {
        let mut node_summaries = serde_json::Map::new();
        for (name, s) in out.metrics.summaries() {
            node_summaries.insert(name.to_string(), serde_json::json!(s));
        }
        Self {
            n_frames: out.quality.n_frames(),
            n_good_frames: out.quality.n_good(),
            bad_frames: out.quality.bad_frames(),
            n_voxels: out.filtered.ncols(),
            n_regressors: out.nuisance.n_regressors(),
            regressors: out.nuisance.names().to_vec(),
            n_rois: out.rois.len(),
            n_missing_rois: out.rois.n_missing(),
            density: cfg.density,
            compcor_source: cfg.compcor_source,
            threshold: out.network.thresholded.threshold,
            target_edges: out.network.thresholded.target_edges,
            edges_thresholded: out.network.thresholded.graph.edge_count(),
            edges: out.network.graph.edge_count(),
            component_sizes: out.network.component_sizes.clone(),
            global_efficiency: out.metrics.global_efficiency,
            global_clustering: out.metrics.global_clustering,
            node_summaries,
            diagnostics: out.diagnostics(),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))
    }
}
