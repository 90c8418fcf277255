mod common;
use common::{four_roi_atlas, grid_map, synthetic_subject, DIMS, VOXEL_MM};
use fcnet::io::{load_atlas, write_outputs, Report, SafeTensors, StWriter, SubjectData};
use fcnet::{run, PipelineConfig, SubjectInput};
use tempfile::TempDir;

fn write_bundle(subject: &SubjectInput, path: &std::path::Path, affine: bool) {
    let [nx, ny, nz] = DIMS;
    let n_t = subject.series.n_frames();
    let mut w = StWriter::new();
    // Full mask: column order is C order over (x, y, z).
    let bold: Vec<f64> = subject.series.data.t().iter().copied().collect();
    w.add_f64("bold", &bold, &[nx, ny, nz, n_t]);
    w.add_u8("mask", &vec![1u8; nx * ny * nz], &[nx, ny, nz]);
    let tissue: Vec<i32> = subject.tissue.iter().copied().collect();
    w.add_i32("tissue", &tissue, &[nx, ny, nz]);
    let motion: Vec<f32> = subject.motion.iter().map(|&v| v as f32).collect();
    w.add_f32("motion", &motion, &[n_t, 6]);
    w.add_f64("fd", &subject.fd.to_vec(), &[n_t]);
    w.add_f64("voxel_size", &[VOXEL_MM; 3], &[3]);
    if affine {
        let a = [
            VOXEL_MM, 0.0, 0.0, 0.0,
            0.0, VOXEL_MM, 0.0, 0.0,
            0.0, 0.0, VOXEL_MM, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        w.add_f64("affine", &a, &[4, 4]);
    }
    w.write(path).unwrap();
}

#[test]
fn subject_bundle_loads() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sub.safetensors");
    let subject = synthetic_subject(40, &[10], 5);
    write_bundle(&subject, &path, true);

    let loaded = SubjectData::load(&path).unwrap();
    assert_eq!(loaded.input.series.data, subject.series.data);
    assert_eq!(loaded.input.tissue, subject.tissue);
    assert_eq!(loaded.input.fd, subject.fd);
    assert_eq!(loaded.input.series.geometry.dims, DIMS);
    for (a, b) in loaded.input.motion.iter().zip(subject.motion.iter()) {
        approx::assert_abs_diff_eq!(*a, *b, epsilon = 1e-6);
    }
    assert_eq!(loaded.affine.unwrap()[1][1], VOXEL_MM);
}

#[test]
fn missing_tensor_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.safetensors");
    let mut w = StWriter::new();
    w.add_f64("fd", &[0.0; 4], &[4]);
    w.write(&path).unwrap();
    let err = SubjectData::load(&path).err().unwrap();
    assert!(err.to_string().contains("bold"), "{err}");
}

#[test]
fn atlas_round_trips_through_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("atlas.json");
    let atlas = four_roi_atlas();
    std::fs::write(&path, serde_json::to_string(&atlas).unwrap()).unwrap();
    assert_eq!(load_atlas(&path).unwrap(), atlas);
}

#[test]
fn outputs_and_report_written() {
    let dir = TempDir::new().unwrap();
    let subject = synthetic_subject(120, &[40], 9);
    let cfg = PipelineConfig { density: 0.5, ..PipelineConfig::default() };
    let out = run(&subject, &four_roi_atlas(), &grid_map(), &cfg).unwrap();

    let st_path = dir.path().join("net.safetensors");
    write_outputs(&out, &st_path, true).unwrap();
    let st = SafeTensors::open(&st_path).unwrap();

    assert_eq!(st.tensor("correlation").unwrap().shape, vec![4, 4]);
    assert_eq!(st.tensor("adjacency").unwrap().shape, vec![4, 4]);
    assert_eq!(st.tensor("roi_signals").unwrap().shape, vec![118, 4]);
    assert_eq!(st.tensor("bad_frames").unwrap().values, vec![40.0, 41.0]);
    assert_eq!(st.tensor("roi_missing").unwrap().values, vec![0.0; 4]);
    assert!(st.contains("qc_filtered"));
    assert!(st.contains("system_mean_visual"));

    let degree = st.tensor("degree").unwrap().values;
    for (on_disk, node) in degree.iter().zip(&out.metrics.nodes.degree) {
        match node {
            Some(v) => assert_eq!(on_disk, v),
            None => assert!(on_disk.is_nan()),
        }
    }

    let report_path = dir.path().join("report.json");
    Report::new(&out, &cfg).write(&report_path).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(json["n_rois"], 4);
    assert_eq!(json["n_good_frames"], 118);
    assert_eq!(json["target_edges"], 3);
    assert!(json["node_summaries"]["pagerank"]["n_defined"].is_number());
    assert!(json["diagnostics"].is_array());
}

#[test]
fn qc_matrices_only_on_request() {
    let dir = TempDir::new().unwrap();
    let subject = synthetic_subject(80, &[20], 2);
    let out = run(&subject, &four_roi_atlas(), &grid_map(), &PipelineConfig {
        density: 0.5,
        ..PipelineConfig::default()
    })
    .unwrap();
    let path = dir.path().join("net.safetensors");
    write_outputs(&out, &path, false).unwrap();
    let st = SafeTensors::open(&path).unwrap();
    assert!(!st.contains("qc_detrended"));
    assert!(st.contains("pagerank"));
}
