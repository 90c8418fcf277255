//! Temporal band-pass filtering.
//!
//! - [`bandpass`]: reflect-limited padding + FFT brick-wall passband
//!   (default 0.009–0.08 Hz), applied column by column.

pub mod bandpass;

pub use bandpass::{bandpass_columns, BandPass};
