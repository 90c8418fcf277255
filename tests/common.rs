//! Shared helpers: deterministic synthetic signals and a small subject.
#![allow(dead_code)]
use fcnet::{
    AffineMap, Atlas, AtlasPoint, SubjectInput, System, TimeSeriesMatrix,
};
use ndarray::{Array1, Array2, Array3, Array4};
use std::f64::consts::PI;

/// Grid used by [`synthetic_subject`]: 12³ voxels of 3 mm.
pub const DIMS: [usize; 3] = [12, 12, 12];
pub const VOXEL_MM: f64 = 3.0;
pub const TR: f64 = 2.0;

/// Small xorshift generator so tests need no RNG crate.
pub struct Noise(u64);

impl Noise {
    pub fn new(seed: u64) -> Self {
        Self(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1)
    }

    /// Uniform in [-1, 1).
    pub fn next(&mut self) -> f64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        (x >> 11) as f64 / (1u64 << 52) as f64 - 1.0
    }

    pub fn vec(&mut self, n: usize, amp: f64) -> Vec<f64> {
        (0..n).map(|_| amp * self.next()).collect()
    }
}

/// `amp · sin(2π f t·tr + phase)` sampled at `n` frames.
pub fn sine(n: usize, freq_hz: f64, tr: f64, amp: f64, phase: f64) -> Vec<f64> {
    (0..n)
        .map(|t| amp * (2.0 * PI * freq_hz * t as f64 * tr + phase).sin())
        .collect()
}

pub fn rms(x: &[f64]) -> f64 {
    (x.iter().map(|v| v * v).sum::<f64>() / x.len() as f64).sqrt()
}

/// Voxel → world map of the synthetic grid: voxel (0,0,0) at the origin.
pub fn grid_map() -> AffineMap {
    AffineMap::scaled([VOXEL_MM; 3], [0.0; 3])
}

/// World position (mm) of grid voxel `v`.
pub fn world(v: [usize; 3]) -> [f64; 3] {
    [v[0] as f64 * VOXEL_MM, v[1] as f64 * VOXEL_MM, v[2] as f64 * VOXEL_MM]
}

/// Four ROIs: 1 and 3 sit in the `y < 6` half, 2 and 4 in the `y ≥ 6` half.
pub fn four_roi_atlas() -> Atlas {
    let centres = [[3, 3, 6], [3, 8, 6], [8, 3, 6], [8, 8, 6]];
    let systems = [System::Visual, System::DefaultMode, System::Visual, System::DefaultMode];
    Atlas::new(
        centres
            .iter()
            .zip(systems)
            .enumerate()
            .map(|(i, (&c, s))| AtlasPoint {
                id: i as u32 + 1,
                position: world(c),
                system: Some(s),
                color: [0, 0, 0],
            })
            .collect(),
    )
}

/// Framewise displacement with spikes at the given frames.
pub fn fd_with_spikes(n: usize, spikes: &[usize]) -> Array1<f64> {
    let mut fd = Array1::from_elem(n, 0.05);
    for &t in spikes {
        fd[t] = 0.9;
    }
    fd
}

/// A whole-volume subject with two functional communities.
///
/// - x ≤ 1: CSF, x ≥ 10: white matter, otherwise gray matter.
/// - Gray-matter voxels with `y < 6` follow a 0.04 Hz source, the rest a
///   0.025 Hz source; each voxel adds its own noise.
/// - Frames at `spikes` carry a large motion artefact.
pub fn synthetic_subject(n_frames: usize, spikes: &[usize], seed: u64) -> SubjectInput {
    let mut noise = Noise::new(seed);
    let [nx, ny, nz] = DIMS;

    let s1 = sine(n_frames, 0.04, TR, 1.0, 0.3);
    let s2 = sine(n_frames, 0.025, TR, 1.0, 1.1);
    let drift: Vec<f64> = (0..n_frames).map(|t| 0.01 * t as f64).collect();

    let fd = fd_with_spikes(n_frames, spikes);
    let mut motion = Array2::<f64>::zeros((n_frames, 6));
    for t in 0..n_frames {
        for c in 0..6 {
            motion[[t, c]] = 0.02 * noise.next();
        }
    }

    let mut bold = Array4::<f64>::zeros((nx, ny, nz, n_frames));
    let mut tissue = Array3::<i32>::zeros((nx, ny, nz));
    for x in 0..nx {
        for y in 0..ny {
            for z in 0..nz {
                let label = if x <= 1 { 1 } else if x >= 10 { 3 } else { 2 };
                tissue[[x, y, z]] = label;
                let src = if y < 6 { &s1 } else { &s2 };
                for t in 0..n_frames {
                    let signal = if label == 2 { src[t] } else { 0.0 };
                    let artefact = if fd[t] > 0.2 { 25.0 } else { 0.0 };
                    bold[[x, y, z, t]] =
                        100.0 + drift[t] + signal + artefact + 0.3 * noise.next();
                }
            }
        }
    }

    let mask = Array3::from_elem((nx, ny, nz), true);
    let series = TimeSeriesMatrix::from_volume(&bold, &mask, [VOXEL_MM; 3])
        .expect("mask matches volume");
    SubjectInput { series, motion, fd, tissue }
}
