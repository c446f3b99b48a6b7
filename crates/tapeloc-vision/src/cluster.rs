//! Left/right tape border estimate from segment x-endpoints.
//!
//! All x-endpoints of the surviving segments are pooled and split once around
//! their mean: values below it form the left border, the rest the right
//! border. The center is the midpoint of the two border means.
//!
//! The split is not iterated. It assumes the endpoints already fall into two
//! separated x-ranges (the two edges of one strip of tape); an uneven number
//! of segments per side shifts the split point and can misassign endpoints.
//! Downstream correction coefficients are fitted against this behavior.

use serde::{Deserialize, Serialize};
use tapeloc_core::LineSegment;

/// Result of the lateral split. Numeric fields are 0 when `valid` is false.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LateralCenter {
    pub pixel_center: f64,
    /// Mean of the endpoints on the left of the split.
    pub left_mean: f64,
    /// Mean of the endpoints on the right of the split.
    pub right_mean: f64,
    /// Number of pooled x-endpoints (two per segment).
    pub endpoints: usize,
    pub valid: bool,
}

impl LateralCenter {
    pub fn invalid(endpoints: usize) -> Self {
        Self {
            endpoints,
            ..Self::default()
        }
    }

    /// Pixel center when the split succeeded.
    pub fn center(&self) -> Option<f64> {
        self.valid.then_some(self.pixel_center)
    }
}

pub fn estimate_lateral_center(segments: &[LineSegment]) -> LateralCenter {
    let xs: Vec<f64> = segments
        .iter()
        .flat_map(|s| s.x_endpoints())
        .map(f64::from)
        .collect();
    if xs.is_empty() {
        return LateralCenter::invalid(0);
    }

    let split = xs.iter().sum::<f64>() / xs.len() as f64;

    let (mut left_sum, mut left_n) = (0.0, 0usize);
    let (mut right_sum, mut right_n) = (0.0, 0usize);
    for &x in &xs {
        if x < split {
            left_sum += x;
            left_n += 1;
        } else {
            right_sum += x;
            right_n += 1;
        }
    }

    if left_n == 0 || right_n == 0 {
        log::debug!(
            "lateral split degenerate: {left_n} left, {right_n} right of {split:.1}"
        );
        return LateralCenter::invalid(xs.len());
    }

    let left_mean = left_sum / left_n as f64;
    let right_mean = right_sum / right_n as f64;
    let pixel_center = (left_mean + right_mean) / 2.0;
    if !pixel_center.is_finite() {
        return LateralCenter::invalid(xs.len());
    }

    LateralCenter {
        pixel_center,
        left_mean,
        right_mean,
        endpoints: xs.len(),
        valid: true,
    }
}
