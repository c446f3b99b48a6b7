use nalgebra::{Rotation2, Vector2};
use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, TAU};

/// Planar pose in a fixed world frame. Heading is in radians, normalized to `[0, 2π)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose2D {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
}

impl Pose2D {
    pub const fn new(x: f64, y: f64, heading: f64) -> Self {
        Self { x, y, heading }
    }

    /// Rotate a robot-frame vector into the world frame.
    #[inline]
    pub fn rotate(&self, v: Vector2<f64>) -> Vector2<f64> {
        Rotation2::new(self.heading) * v
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.heading.is_finite()
    }
}

/// Wrap an angle into `[0, 2π)`.
pub fn angle_norm(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

/// Wrap an angle difference into `[-π, π)`.
pub fn angle_norm_delta(delta: f64) -> f64 {
    let mut d = angle_norm(delta);
    if d >= PI {
        d -= TAU;
    }
    d
}
