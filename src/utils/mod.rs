//! Small helpers shared across the crate: percentage/proportion conversion
//! and the empirical profile sampler for novel cell types.

pub mod rng;

/// Converts a proportion in `[0, 1]` to a percentage rounded to `precision`
/// decimal places.
///
/// The deconvolution output can contain tiny negative values; those clamp
/// to exactly `+0.0` (never `-0.0`).
pub fn convert_to_percent(
    value: f64,
    precision: i32,
) -> f64 {
    let scale = 10f64.powi(precision);
    let percent = (value * 100.0 * scale).round() / scale;
    percent.max(0.0).abs()
}

/// Converts a percentage in `[0, 100]` to a proportion.
pub fn convert_to_proportion(percent: f64) -> f64 {
    percent * 0.01
}
