//! Per-year reduction of a grid into bounded intensities.
//!
//! 1. time-mean per cell over the valid samples only
//! 2. cells with no valid sample are dropped
//! 3. `local_max` = percentile of the surviving means (linear interpolation
//!    between closest ranks, `rank = p * (n - 1)`)
//! 4. intensity = min(mean / local_max, 1.0), or 0 everywhere when
//!    `local_max` is 0
//!
//! Intensities are relative to their own year; raw magnitudes are not
//! comparable across artifacts.

use serde::{Deserialize, Serialize};

use crate::grid::GridSampleSet;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregatedCell {
    pub lat: f64,
    pub lon: f64,
    pub mean: f64,
}

/// Serialized positionally as `[lat, lon, intensity]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct IntensityPoint {
    pub lat: f64,
    pub lon: f64,
    pub intensity: f64,
}

impl From<[f64; 3]> for IntensityPoint {
    fn from(v: [f64; 3]) -> Self {
        Self { lat: v[0], lon: v[1], intensity: v[2] }
    }
}

impl From<IntensityPoint> for [f64; 3] {
    fn from(p: IntensityPoint) -> Self {
        [p.lat, p.lon, p.intensity]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct YearArtifact {
    pub year: String,
    pub local_max: f64,
    /// Grid cells before dropping the all-missing ones.
    pub cells: usize,
    pub points: Vec<IntensityPoint>,
}

/// Arithmetic mean of the valid samples; `None` when there are none.
pub fn time_mean(samples: &[Option<f64>]) -> Option<f64> {
    let (sum, n) = samples
        .iter()
        .flatten()
        .filter(|v| !v.is_nan())
        .fold((0.0_f64, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        None
    } else {
        Some(sum / n as f64)
    }
}

/// Means of the cells with a finite mean. A sum that overflows is treated
/// like a cell with no valid samples.
pub fn time_means(grid: &GridSampleSet) -> Vec<AggregatedCell> {
    grid.cells
        .iter()
        .filter_map(|c| {
            time_mean(&c.samples)
                .filter(|m| m.is_finite())
                .map(|mean| AggregatedCell { lat: c.lat, lon: c.lon, mean })
        })
        .collect()
}

/// Percentile with linear interpolation between closest ranks.
/// Returns 0 for an empty slice.
pub fn percentile_linear(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut v: Vec<f64> = values.to_vec();
    v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let rank = (v.len() - 1) as f64 * p.clamp(0.0, 1.0);
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    v[lo] + (v[hi] - v[lo]) * frac
}

/// Upper clamp only; negative means stay negative. A zero or non-finite
/// `local_max` gives 0.
pub fn intensity(mean: f64, local_max: f64) -> f64 {
    if local_max == 0.0 || !local_max.is_finite() {
        return 0.0;
    }
    (mean / local_max).min(1.0)
}

pub fn normalize(cells: &[AggregatedCell], p: f64) -> (f64, Vec<IntensityPoint>) {
    let means: Vec<f64> = cells.iter().map(|c| c.mean).filter(|m| m.is_finite()).collect();
    let local_max = match percentile_linear(&means, p) {
        m if m.is_finite() => m,
        _ => 0.0,
    };
    let points = cells
        .iter()
        .map(|c| IntensityPoint {
            lat: c.lat,
            lon: c.lon,
            intensity: intensity(c.mean, local_max),
        })
        .collect();
    (local_max, points)
}

pub fn aggregate_year(year: &str, grid: &GridSampleSet, p: f64) -> YearArtifact {
    let cells = time_means(grid);
    let (local_max, points) = normalize(&cells, p);
    YearArtifact {
        year: year.to_string(),
        local_max,
        cells: grid.len(),
        points,
    }
}
