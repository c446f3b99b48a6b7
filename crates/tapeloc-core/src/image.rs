//! Camera frames and grayscale buffers.

use serde::{Deserialize, Serialize};

/// Frame validation errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("unsupported channel count {0} (expected 1, 3 or 4)")]
    UnsupportedChannels(usize),
    #[error("invalid frame buffer length (expected {expected} bytes, got {got})")]
    BufferLength { expected: usize, got: usize },
    #[error("invalid frame dimensions (width={width}, height={height})")]
    Dimensions { width: usize, height: usize },
}

/// Borrowed, row-major interleaved camera frame.
///
/// The pipeline only reads from the view for the duration of one call and
/// never keeps it past that call.
#[derive(Clone, Copy, Debug)]
pub struct FrameView<'a> {
    width: usize,
    height: usize,
    channels: usize,
    data: &'a [u8],
}

impl<'a> FrameView<'a> {
    /// Validate and wrap an interleaved pixel buffer (`len == width * height * channels`).
    pub fn new(
        width: usize,
        height: usize,
        channels: usize,
        data: &'a [u8],
    ) -> Result<Self, FrameError> {
        if !matches!(channels, 1 | 3 | 4) {
            return Err(FrameError::UnsupportedChannels(channels));
        }
        let expected = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(channels))
            .ok_or(FrameError::Dimensions { width, height })?;
        if data.len() != expected {
            return Err(FrameError::BufferLength {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Single-channel view over a grayscale image.
    pub fn from_gray(img: &'a GrayImage) -> Self {
        Self {
            width: img.width,
            height: img.height,
            channels: 1,
            data: &img.data,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Convert to an owned grayscale image.
    ///
    /// Multi-channel frames are interpreted as RGB(A) and reduced with BT.601
    /// luma weights; alpha is ignored.
    pub fn to_gray(&self) -> GrayImage {
        if self.channels == 1 {
            return GrayImage {
                width: self.width,
                height: self.height,
                data: self.data.to_vec(),
            };
        }

        let data = self
            .data
            .chunks_exact(self.channels)
            .map(|px| {
                let luma = 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32;
                luma.round().clamp(0.0, 255.0) as u8
            })
            .collect();

        GrayImage {
            width: self.width,
            height: self.height,
            data,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    /// Black image of the given size.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: u8) {
        self.data[y * self.width + x] = v;
    }
}
