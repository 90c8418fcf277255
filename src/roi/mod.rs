//! Region-of-interest aggregation.
//!
//! - [`atlas`]: fixed-schema atlas records and the [`System`] label set.
//! - [`map`]: the injected reference → voxel [`CoordinateMap`].
//! - [`aggregate`]: sphere rasterisation, ROI and per-system time courses.

pub mod aggregate;
pub mod atlas;
pub mod map;

pub use aggregate::{
    rasterize_rois, roi_time_series, sphere_voxels, system_time_series, Roi, RoiSet, SystemSignal,
};
pub use atlas::{Atlas, AtlasPoint, System};
pub use map::{AffineMap, CoordinateMap};
