//! Consumer-side view of the two estimate streams.
//!
//! The camera callback publishes [`LandmarkEstimate`]s and the control loop
//! publishes [`Pose2D`]s, each through its own single-writer slot. A
//! consumer reads both without coordinating with either producer.

use serde::{Deserialize, Serialize};
use tapeloc_core::{Pose2D, SnapshotReader};
use tapeloc_vision::LandmarkEstimate;

/// Most recent pose and landmark estimate, read at one instant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalizationState {
    pub pose: Pose2D,
    pub landmark: LandmarkEstimate,
}

impl LocalizationState {
    /// Landmark correction to apply: 0 unless the estimate is valid.
    ///
    /// Whether to hold the last valid correction is up to the consumer.
    pub fn correction(&self) -> f64 {
        self.landmark.effective_correction()
    }
}

/// Something that acts on localization output, e.g. a drive-correction layer.
pub trait PoseCorrectionConsumer {
    fn consume(&mut self, state: &LocalizationState);
}

impl<F> PoseCorrectionConsumer for F
where
    F: FnMut(&LocalizationState),
{
    fn consume(&mut self, state: &LocalizationState) {
        self(state)
    }
}

/// Reader pair over a localizer's poses and a detector's estimates.
#[derive(Clone, Debug)]
pub struct LocalizationSource {
    poses: SnapshotReader<Pose2D>,
    landmarks: SnapshotReader<LandmarkEstimate>,
}

impl LocalizationSource {
    pub fn new(poses: SnapshotReader<Pose2D>, landmarks: SnapshotReader<LandmarkEstimate>) -> Self {
        Self { poses, landmarks }
    }

    pub fn snapshot(&self) -> LocalizationState {
        LocalizationState {
            pose: self.poses.get(),
            landmark: self.landmarks.get(),
        }
    }

    /// Read a snapshot and hand it to `consumer`.
    pub fn feed<C>(&self, consumer: &mut C) -> LocalizationState
    where
        C: PoseCorrectionConsumer + ?Sized,
    {
        let state = self.snapshot();
        consumer.consume(&state);
        state
    }
}
