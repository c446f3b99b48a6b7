//! Per-frame tape detection pipeline.

use std::sync::OnceLock;
use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tapeloc_core::{
    snapshot_slot, FrameError, FrameView, GrayImage, LineSegment, SnapshotReader, SnapshotWriter,
};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::angle::{LandmarkAngleEstimator, LandmarkEstimate};
use crate::cluster::{estimate_lateral_center, LateralCenter};
use crate::edges::{edges_from_gray, EdgeMap};
use crate::error::VisionError;
use crate::filter::filter_segments;
use crate::hough::detect_segments;
use crate::params::CalibrationParams;

/// Capability interface of a landmark pipeline driven by a camera callback.
pub trait LandmarkPipeline {
    /// Process one frame, publish its estimate and return an image for display.
    fn process_frame(&self, frame: &FrameView<'_>) -> Result<GrayImage, VisionError>;

    /// Most recently published estimate.
    fn latest_estimate(&self) -> LandmarkEstimate;
}

/// Wall-clock time spent in each stage, milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StageTimings {
    pub edges_ms: f64,
    pub segments_ms: f64,
    pub estimate_ms: f64,
    pub total_ms: f64,
}

/// Observability counters for one frame. No behavioral effect.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameDiagnostics {
    pub edge_pixels: usize,
    pub raw_segments: usize,
    pub kept_segments: usize,
    pub timings: StageTimings,
}

/// Everything computed for one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    pub estimate: LandmarkEstimate,
    pub center: LateralCenter,
    /// Segments that passed the orientation gate.
    pub segments: Vec<LineSegment>,
    pub diagnostics: FrameDiagnostics,
}

#[derive(Debug)]
struct Stages {
    params: CalibrationParams,
    angle: LandmarkAngleEstimator,
}

impl Stages {
    fn build(params: CalibrationParams) -> Result<Self, VisionError> {
        params.validate()?;
        let angle = LandmarkAngleEstimator::new(params.angle.clone())?;
        Ok(Self { params, angle })
    }
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1e3
}

/// The tape detector.
///
/// Lifecycle: [`TapeDetector::new`] validates the calibration,
/// [`TapeDetector::initialize`] fixes the frame size once, then frames are
/// fed through [`LandmarkPipeline::process_frame`] (or the side-effect free
/// [`TapeDetector::detect`]). Estimates are published through a single-writer
/// snapshot slot; [`TapeDetector::estimates`] hands out reader handles for
/// other threads.
///
/// `process_frame` may be called from several threads. Publication is
/// serialized, so [`TapeDetector::last_frame`] always pairs an estimate with
/// the diagnostics of the same frame.
#[derive(Debug)]
pub struct TapeDetector {
    stages: SnapshotWriter<Stages>,
    frame_size: OnceLock<(usize, usize)>,
    estimate: SnapshotWriter<LandmarkEstimate>,
    last: Mutex<Option<(LandmarkEstimate, FrameDiagnostics)>>,
}

impl TapeDetector {
    pub fn new(params: CalibrationParams) -> Result<Self, VisionError> {
        let stages = Stages::build(params)?;
        let (stages, _) = snapshot_slot(stages);
        let (estimate, _) = snapshot_slot(LandmarkEstimate::invalid());
        Ok(Self {
            stages,
            frame_size: OnceLock::new(),
            estimate,
            last: Mutex::new(None),
        })
    }

    /// Fix the frame size. Must be called exactly once, before the first frame.
    pub fn initialize(&self, width: usize, height: usize) -> Result<(), VisionError> {
        if width == 0 || height == 0 {
            return Err(FrameError::Dimensions { width, height }.into());
        }
        self.frame_size.set((width, height)).map_err(|_| {
            let (width, height) = self.frame_size.get().copied().unwrap_or_default();
            VisionError::AlreadyInitialized { width, height }
        })?;
        log::info!("tape detector initialized for {width}x{height} frames");
        Ok(())
    }

    pub fn frame_size(&self) -> Option<(usize, usize)> {
        self.frame_size.get().copied()
    }

    /// Current calibration snapshot.
    pub fn params(&self) -> CalibrationParams {
        self.stages.current().params.clone()
    }

    /// Swap in a new calibration. Frames already in progress finish with the
    /// previous one; an invalid calibration leaves the current one in place.
    pub fn reconfigure(&self, params: CalibrationParams) -> Result<(), VisionError> {
        let stages = Stages::build(params)?;
        self.stages.publish(stages);
        log::info!("tape detector reconfigured");
        Ok(())
    }

    /// Reader handle onto the published estimates.
    pub fn estimates(&self) -> SnapshotReader<LandmarkEstimate> {
        self.estimate.reader()
    }

    /// Diagnostics of the most recent [`LandmarkPipeline::process_frame`] call.
    pub fn last_diagnostics(&self) -> Option<FrameDiagnostics> {
        (*self.last.lock()).map(|(_, diagnostics)| diagnostics)
    }

    /// Estimate and diagnostics of the most recently published frame.
    pub fn last_frame(&self) -> Option<(LandmarkEstimate, FrameDiagnostics)> {
        *self.last.lock()
    }

    fn check_frame(&self, frame: &FrameView<'_>) -> Result<usize, VisionError> {
        let (width, height) = self.frame_size().ok_or(VisionError::NotInitialized)?;
        if frame.width() != width || frame.height() != height {
            return Err(VisionError::FrameSizeMismatch {
                width,
                height,
                got_width: frame.width(),
                got_height: frame.height(),
            });
        }
        Ok(width)
    }

    /// Like [`TapeDetector::detect`], also returning the frame's edge map.
    pub fn detect_with_edges(
        &self,
        frame: &FrameView<'_>,
    ) -> Result<(FrameReport, EdgeMap), VisionError> {
        let width = self.check_frame(frame)?;
        let stages = self.stages.current();
        let params = &stages.params;

        let start = Instant::now();
        let edges = edges_from_gray(&frame.to_gray(), &params.edges);
        let edges_ms = elapsed_ms(start);

        let t = Instant::now();
        let mut raw_segments = 0usize;
        let kept: Vec<LineSegment> = filter_segments(
            detect_segments(&edges, &params.hough).inspect(|_| raw_segments += 1),
            &params.filter,
        )
        .collect();
        let segments_ms = elapsed_ms(t);

        let t = Instant::now();
        let center = estimate_lateral_center(&kept);
        let estimate = stages.angle.estimate(center.center(), width);
        let estimate_ms = elapsed_ms(t);

        let diagnostics = FrameDiagnostics {
            edge_pixels: edges.count(),
            raw_segments,
            kept_segments: kept.len(),
            timings: StageTimings {
                edges_ms,
                segments_ms,
                estimate_ms,
                total_ms: elapsed_ms(start),
            },
        };
        log::debug!(
            "frame: {} edge px, {}/{} segments kept, valid={} center={:.1} angle={:.2}",
            diagnostics.edge_pixels,
            diagnostics.kept_segments,
            diagnostics.raw_segments,
            estimate.valid,
            estimate.pixel_center,
            estimate.angle_degrees
        );

        Ok((
            FrameReport {
                estimate,
                center,
                segments: kept,
                diagnostics,
            },
            edges,
        ))
    }

    /// Run the full pipeline on one frame without publishing anything.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, frame), fields(width = frame.width(), height = frame.height()))
    )]
    pub fn detect(&self, frame: &FrameView<'_>) -> Result<FrameReport, VisionError> {
        self.detect_with_edges(frame).map(|(report, _)| report)
    }
}

impl LandmarkPipeline for TapeDetector {
    /// Runs [`TapeDetector::detect`], publishes the estimate and returns the edge image.
    fn process_frame(&self, frame: &FrameView<'_>) -> Result<GrayImage, VisionError> {
        let (report, edges) = self.detect_with_edges(frame)?;
        let mut last = self.last.lock();
        self.estimate.publish(report.estimate);
        *last = Some((report.estimate, report.diagnostics));
        Ok(edges.to_image())
    }

    fn latest_estimate(&self) -> LandmarkEstimate {
        *self.estimate.current()
    }
}
