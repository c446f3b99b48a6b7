//! Frame to binary edge map.
//!
//! - Grayscale conversion for multi-channel frames.
//! - 3×3 Sobel gradients with border clamping.
//! - Non-maximum suppression along the gradient direction, quantized to 4 sectors.
//! - Two-threshold hysteresis: pixels above `high` seed edges, pixels above
//!   `low` are kept when 8-connected to a seed.
//!
//! Complexity: O(W·H); memory: three float buffers plus the output mask.

use crate::error::VisionError;
use crate::params::EdgeParams;
use tapeloc_core::{FrameView, GrayImage};

#[cfg(feature = "tracing")]
use tracing::instrument;

type Kernel3 = [[f32; 3]; 3];

const SOBEL_KERNEL_X: Kernel3 = [[-1.0, 0.0, 1.0], [-2.0, 0.0, 2.0], [-1.0, 0.0, 1.0]];
const SOBEL_KERNEL_Y: Kernel3 = [[-1.0, -2.0, -1.0], [0.0, 0.0, 0.0], [1.0, 2.0, 1.0]];

const EDGE: u8 = 255;

/// Binary edge map, row-major, `255` for edge pixels and `0` elsewhere.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdgeMap {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl EdgeMap {
    /// Empty map of the given size.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    /// Build a map from explicit edge pixel coordinates; out-of-bounds points are ignored.
    pub fn from_points(
        width: usize,
        height: usize,
        points: impl IntoIterator<Item = (usize, usize)>,
    ) -> Self {
        let mut map = Self::new(width, height);
        for (x, y) in points {
            if x < width && y < height {
                map.data[y * width + x] = EDGE;
            }
        }
        map
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn is_edge(&self, x: usize, y: usize) -> bool {
        self.data[y * self.width + x] != 0
    }

    /// Number of edge pixels.
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.data.iter().all(|&v| v == 0)
    }

    /// Edge pixel coordinates in row-major order.
    pub fn points(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let w = self.width.max(1);
        self.data
            .iter()
            .enumerate()
            .filter(|(_, &v)| v != 0)
            .map(move |(idx, _)| (idx % w, idx / w))
    }

    pub(crate) fn raw(&self) -> &[u8] {
        &self.data
    }

    /// Displayable copy of the map.
    pub fn to_image(&self) -> GrayImage {
        GrayImage {
            width: self.width,
            height: self.height,
            data: self.data.clone(),
        }
    }
}

struct Gradients {
    gx: Vec<f32>,
    gy: Vec<f32>,
    mag: Vec<f32>,
}

fn sobel_gradients(gray: &GrayImage, l2: bool) -> Gradients {
    let w = gray.width;
    let h = gray.height;
    let mut gx = vec![0.0f32; w * h];
    let mut gy = vec![0.0f32; w * h];
    let mut mag = vec![0.0f32; w * h];

    for y in 0..h {
        let y_idx = [y.saturating_sub(1), y, (y + 1).min(h - 1)];
        for x in 0..w {
            let x_idx = [x.saturating_sub(1), x, (x + 1).min(w - 1)];

            let mut sum_x = 0.0;
            let mut sum_y = 0.0;
            for (ky, &yy) in y_idx.iter().enumerate() {
                for (kx, &xx) in x_idx.iter().enumerate() {
                    let sample = gray.get(xx, yy) as f32;
                    sum_x += sample * SOBEL_KERNEL_X[ky][kx];
                    sum_y += sample * SOBEL_KERNEL_Y[ky][kx];
                }
            }

            let idx = y * w + x;
            gx[idx] = sum_x;
            gy[idx] = sum_y;
            mag[idx] = if l2 {
                (sum_x * sum_x + sum_y * sum_y).sqrt()
            } else {
                sum_x.abs() + sum_y.abs()
            };
        }
    }

    Gradients { gx, gy, mag }
}

/// Keep only local maxima across the edge; everything else becomes 0.
///
/// The comparison is strict on the "previous" neighbor and non-strict on the
/// "next" one, so a symmetric step (two equal magnitudes side by side) still
/// leaves a single-pixel edge.
fn suppress_non_maxima(grad: &Gradients, w: usize, h: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; w * h];
    if w < 3 || h < 3 {
        return out;
    }

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let idx = y * w + x;
            let m = grad.mag[idx];
            if m <= 0.0 {
                continue;
            }

            let mut angle_deg = grad.gy[idx].atan2(grad.gx[idx]).to_degrees();
            if angle_deg < 0.0 {
                angle_deg += 180.0;
            }

            // (previous, next) along the gradient, image y pointing down
            let (prev, next) = if !(22.5..157.5).contains(&angle_deg) {
                (idx - 1, idx + 1)
            } else if angle_deg < 67.5 {
                (idx - w - 1, idx + w + 1)
            } else if angle_deg < 112.5 {
                (idx - w, idx + w)
            } else {
                (idx - w + 1, idx + w - 1)
            };

            if m > grad.mag[prev] && m >= grad.mag[next] {
                out[idx] = m;
            }
        }
    }
    out
}

fn hysteresis(nms: &[f32], w: usize, h: usize, low: f32, high: f32) -> Vec<u8> {
    let mut out = vec![0u8; w * h];
    let mut stack = Vec::new();

    for seed in 0..nms.len() {
        if out[seed] != 0 || nms[seed] <= high {
            continue;
        }
        out[seed] = EDGE;
        stack.push(seed);

        while let Some(idx) = stack.pop() {
            let x = idx % w;
            let y = idx / w;
            for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                    let n = ny * w + nx;
                    if out[n] == 0 && nms[n] > low {
                        out[n] = EDGE;
                        stack.push(n);
                    }
                }
            }
        }
    }
    out
}

/// Edge detection on an already-grayscale image. Thresholds are not re-validated.
pub(crate) fn edges_from_gray(gray: &GrayImage, params: &EdgeParams) -> EdgeMap {
    let w = gray.width;
    let h = gray.height;
    if w < 3 || h < 3 {
        return EdgeMap::new(w, h);
    }

    let grad = sobel_gradients(gray, params.l2_gradient);
    let nms = suppress_non_maxima(&grad, w, h);
    EdgeMap {
        width: w,
        height: h,
        data: hysteresis(&nms, w, h, params.low, params.high),
    }
}

/// Convert a camera frame into a binary edge map.
///
/// Fails with [`VisionError::InvalidCalibration`] when `low > high` or a
/// threshold is negative.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(frame, params), fields(width = frame.width(), height = frame.height()))
)]
pub fn extract_edges(frame: &FrameView<'_>, params: &EdgeParams) -> Result<EdgeMap, VisionError> {
    params.validate()?;
    let gray = frame.to_gray();
    Ok(edges_from_gray(&gray, params))
}
