//! Motion-based frame scrubbing.
//!
//! Framewise displacement (FD) is defined between consecutive frames, so an
//! excessive value contaminates both endpoints of the transition: frame `t`
//! and its successor `t + 1` are marked bad.
//!
//! When no frame exceeds the threshold, frame 0 is still marked bad.  This
//! keeps compatibility with established pipelines that always discard the
//! first frame; it is a convention, not a requirement of the method.
use ndarray::Array1;

/// Good/bad classification of every frame, plus the FD values it came from.
///
/// Created once by [`detect_bad_frames`] and read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameQuality {
    good: Vec<bool>,
    displacement: Array1<f64>,
    threshold: f64,
}

impl FrameQuality {
    /// Total number of frames.
    #[inline]
    pub fn n_frames(&self) -> usize {
        self.good.len()
    }

    #[inline]
    pub fn is_good(&self, frame: usize) -> bool {
        self.good[frame]
    }

    /// Per-frame mask, `true` = good.
    pub fn mask(&self) -> &[bool] {
        &self.good
    }

    /// Ascending indices of good frames.
    pub fn good_frames(&self) -> Vec<usize> {
        (0..self.good.len()).filter(|&t| self.good[t]).collect()
    }

    /// Ascending indices of bad frames.  Never empty.
    pub fn bad_frames(&self) -> Vec<usize> {
        (0..self.good.len()).filter(|&t| !self.good[t]).collect()
    }

    pub fn n_good(&self) -> usize {
        self.good.iter().filter(|&&g| g).count()
    }

    pub fn displacement(&self) -> &Array1<f64> {
        &self.displacement
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

/// Classify frames from their framewise displacement.
///
/// A frame is bad when `fd[t] > threshold` or when `fd[t - 1] > threshold`.
/// A NaN or infinite displacement counts as exceeding the threshold, so a
/// missing FD value (often at frame 0) scrubs the frame and its successor.
/// If that leaves every frame good, frame 0 is marked bad.  For a non-empty
/// input the bad set is therefore never empty.
///
/// ```
/// use fcnet::artifact::detect_bad_frames;
///
/// let fd = [0.0, 0.0, 0.0, 0.3, 0.0, 0.0, 0.0, 0.3, 0.0, 0.0];
/// let q = detect_bad_frames(&fd, 0.2);
/// assert_eq!(q.bad_frames(), vec![3, 4, 7, 8]);
/// assert_eq!(q.good_frames(), vec![0, 1, 2, 5, 6, 9]);
/// ```
pub fn detect_bad_frames(fd: &[f64], threshold: f64) -> FrameQuality {
    let n = fd.len();
    let mut good = vec![true; n];

    for (t, &d) in fd.iter().enumerate() {
        if !d.is_finite() || d > threshold {
            good[t] = false;
            if t + 1 < n {
                good[t + 1] = false;
            }
        }
    }

    if n > 0 && good.iter().all(|&g| g) {
        good[0] = false;
    }

    FrameQuality {
        good,
        displacement: Array1::from(fd.to_vec()),
        threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successor_of_spike_is_bad() {
        let q = detect_bad_frames(&[0.0, 0.9, 0.0, 0.0], 0.5);
        assert_eq!(q.bad_frames(), vec![1, 2]);
    }

    #[test]
    fn spike_on_last_frame_stays_in_range() {
        let q = detect_bad_frames(&[0.0, 0.0, 0.0, 0.9], 0.5);
        assert_eq!(q.bad_frames(), vec![3]);
        assert_eq!(q.n_frames(), 4);
    }

    #[test]
    fn quiet_run_still_drops_first_frame() {
        let q = detect_bad_frames(&[0.01; 6], 0.2);
        assert_eq!(q.bad_frames(), vec![0]);
        assert_eq!(q.n_good(), 5);
    }

    #[test]
    fn value_equal_to_threshold_is_good() {
        let q = detect_bad_frames(&[0.0, 0.2, 0.0, 0.5], 0.2);
        assert!(q.is_good(1));
        assert!(q.is_good(2));
        assert_eq!(q.bad_frames(), vec![3]);
    }

    #[test]
    fn missing_displacement_is_bad() {
        let q = detect_bad_frames(&[f64::NAN, 0.0, 0.0, 0.0, f64::NAN, 0.0], 0.2);
        assert_eq!(q.bad_frames(), vec![0, 1, 4, 5]);
    }

    #[test]
    fn empty_input_yields_empty_quality() {
        let q = detect_bad_frames(&[], 0.2);
        assert_eq!(q.n_frames(), 0);
        assert!(q.bad_frames().is_empty());
    }
}
