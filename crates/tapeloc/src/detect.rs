//! Run the tape detector on `image` buffers.

use std::path::Path;

use image::{DynamicImage, GrayImage, RgbImage};
use tapeloc_core::{FrameView, GrayImage as EdgeImage};
use tapeloc_vision::{FrameReport, LandmarkPipeline, TapeDetector, VisionError};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Errors produced by the image helpers.
#[derive(thiserror::Error, Debug)]
pub enum DetectError {
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Vision(#[from] VisionError),
}

/// View an 8-bit grayscale image as a camera frame.
pub fn gray_frame(img: &GrayImage) -> Result<FrameView<'_>, VisionError> {
    Ok(FrameView::new(
        img.width() as usize,
        img.height() as usize,
        1,
        img.as_raw(),
    )?)
}

/// View an RGB image as a camera frame.
pub fn rgb_frame(img: &RgbImage) -> Result<FrameView<'_>, VisionError> {
    Ok(FrameView::new(
        img.width() as usize,
        img.height() as usize,
        3,
        img.as_raw(),
    )?)
}

/// Latch the detector's frame size on first use.
fn ensure_initialized(detector: &TapeDetector, width: u32, height: u32) -> Result<(), VisionError> {
    if detector.frame_size().is_none() {
        detector.initialize(width as usize, height as usize)?;
    }
    Ok(())
}

/// Run `f` on a frame view of `img`. 8-bit grayscale images are viewed in
/// place; everything else goes through an RGB copy.
fn with_frame<T>(
    detector: &TapeDetector,
    img: &DynamicImage,
    f: impl FnOnce(&FrameView<'_>) -> Result<T, VisionError>,
) -> Result<T, DetectError> {
    ensure_initialized(detector, img.width(), img.height())?;
    let out = match img {
        DynamicImage::ImageLuma8(gray) => f(&gray_frame(gray)?)?,
        other => {
            let rgb = other.to_rgb8();
            f(&rgb_frame(&rgb)?)?
        }
    };
    Ok(out)
}

/// Run the full pipeline on an image without publishing the estimate.
///
/// The detector's frame size is latched from the first image it sees.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(detector, img), fields(width = img.width(), height = img.height()))
)]
pub fn detect_image(detector: &TapeDetector, img: &DynamicImage) -> Result<FrameReport, DetectError> {
    with_frame(detector, img, |frame| detector.detect(frame))
}

/// [`detect_image`] plus the frame's edge map, from a single pipeline run.
pub fn detect_image_with_edges(
    detector: &TapeDetector,
    img: &DynamicImage,
) -> Result<(FrameReport, GrayImage), DetectError> {
    let (report, edges) = with_frame(detector, img, |frame| detector.detect_with_edges(frame))?;
    Ok((report, to_image(&edges.to_image())))
}

/// Process an image like a camera frame: publish the estimate and return the
/// edge map as an image.
pub fn process_image(detector: &TapeDetector, img: &DynamicImage) -> Result<GrayImage, DetectError> {
    let edges = with_frame(detector, img, |frame| detector.process_frame(frame))?;
    Ok(to_image(&edges))
}

/// Convert a core grayscale buffer into an `image::GrayImage`.
pub fn to_image(gray: &EdgeImage) -> GrayImage {
    GrayImage::from_fn(gray.width as u32, gray.height as u32, |x, y| {
        image::Luma([gray.get(x as usize, y as usize)])
    })
}

pub fn load_image(path: impl AsRef<Path>) -> Result<DynamicImage, DetectError> {
    Ok(image::open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tapeloc_vision::CalibrationParams;

    fn tape_image() -> DynamicImage {
        let img = RgbImage::from_fn(320, 240, |x, _| {
            if (100..140).contains(&x) {
                image::Rgb([240, 240, 240])
            } else {
                image::Rgb([40, 40, 40])
            }
        });
        DynamicImage::ImageRgb8(img)
    }

    fn params() -> CalibrationParams {
        let mut p = CalibrationParams::default();
        p.hough.min_votes = 30;
        p.hough.max_gap = 10;
        p.filter.max_x_dist = 20.0;
        p
    }

    #[test]
    fn detects_tape_in_rgb_image() {
        let detector = TapeDetector::new(params()).expect("detector");
        let report = detect_image(&detector, &tape_image()).expect("detect");
        assert!(report.estimate.valid);
        assert!((report.estimate.pixel_center - 119.0).abs() <= 0.5);
        assert_eq!(detector.frame_size(), Some((320, 240)));
    }

    #[test]
    fn process_image_publishes_and_returns_edges() {
        let detector = TapeDetector::new(params()).expect("detector");
        let reader = detector.estimates();
        let edges = process_image(&detector, &tape_image()).expect("process");
        assert_eq!(edges.dimensions(), (320, 240));
        assert_eq!(edges.get_pixel(99, 120).0, [255]);
        assert_eq!(edges.get_pixel(120, 120).0, [0]);
        assert!(reader.get().valid);
    }

    #[test]
    fn grayscale_image_is_viewed_in_place() {
        let gray = DynamicImage::ImageLuma8(tape_image().to_luma8());
        let detector = TapeDetector::new(params()).expect("detector");
        let from_gray = detect_image(&detector, &gray).expect("gray");
        let from_rgb = detect_image(&detector, &tape_image()).expect("rgb");
        assert!(from_gray.estimate.valid);
        assert_eq!(from_gray.estimate, from_rgb.estimate);
    }

    #[test]
    fn edges_come_with_the_report() {
        let detector = TapeDetector::new(params()).expect("detector");
        let reader = detector.estimates();
        let (report, edges) = detect_image_with_edges(&detector, &tape_image()).expect("detect");
        assert!(report.estimate.valid);
        assert_eq!(edges.get_pixel(99, 120).0, [255]);
        assert_eq!(edges.get_pixel(139, 120).0, [255]);
        let edge_pixels = edges.pixels().filter(|p| p.0[0] != 0).count();
        assert_eq!(edge_pixels, report.diagnostics.edge_pixels);
        assert!(!reader.get().valid);
    }

    #[test]
    fn size_change_is_rejected() {
        let detector = TapeDetector::new(params()).expect("detector");
        detect_image(&detector, &tape_image()).expect("first");
        let small = DynamicImage::ImageLuma8(GrayImage::new(64, 48));
        assert!(matches!(
            detect_image(&detector, &small),
            Err(DetectError::Vision(VisionError::FrameSizeMismatch { .. }))
        ));
    }
}
