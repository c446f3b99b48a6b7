//! Wrap-safe encoder position and overflow-corrected velocity.
//!
//! Hardware reports a 32-bit tick counter, which wraps on overflow, and a
//! velocity register that only holds 16 bits. Positions are unwrapped into an
//! `i64`; velocities above the 16-bit range are reconstructed from the
//! truncated register using the fact that the hub measures velocity over a
//! 50 ms window (so true velocities are multiples of 20 ticks/s) and a
//! finite-difference estimate to pick the remaining upper bits.

use serde::{Deserialize, Serialize};

use crate::calibration::VelocityMode;
use crate::error::OdometryError;

const CPS_STEP: f64 = 65_536.0;

/// One hardware read of a tracking wheel encoder.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EncoderSample {
    pub ticks: i32,
    /// Hardware velocity register, ticks/s, if the driver supplies one.
    pub raw_velocity: Option<i32>,
    /// Read time, seconds.
    pub timestamp: f64,
}

impl EncoderSample {
    pub fn new(ticks: i32, timestamp: f64) -> Self {
        Self {
            ticks,
            raw_velocity: None,
            timestamp,
        }
    }

    pub fn with_raw_velocity(mut self, velocity: i32) -> Self {
        self.raw_velocity = Some(velocity);
        self
    }
}

/// Unwrapped encoder state after one sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EncoderReading {
    /// Direction-corrected, unwrapped position, ticks.
    pub position: i64,
    /// Direction-corrected velocity, ticks/s.
    pub velocity: Option<f64>,
}

/// Recover a velocity whose upper bits were lost in a 16-bit register.
///
/// The low 16 bits of `input` are kept, `((low % 20) / 4)` recovers the
/// upper bits modulo 5, and the remaining multiple of `5 · 2^16` is chosen
/// nearest to `estimate`.
pub fn inverse_overflow(input: f64, estimate: f64) -> f64 {
    let low = (input as i64) & 0xffff;
    let mut real = low as f64 + ((low % 20) / 4) as f64 * CPS_STEP;
    real += ((estimate - real) / (5.0 * CPS_STEP)).round() * 5.0 * CPS_STEP;
    real
}

fn median3(v: [f64; 3]) -> f64 {
    let [a, b, c] = v;
    a.max(b).min(a.min(b).max(c))
}

/// Per-wheel encoder bookkeeping.
#[derive(Clone, Debug)]
pub struct EncoderTracker {
    wheel: &'static str,
    sign: i64,
    mode: VelocityMode,
    last_ticks: Option<i32>,
    last_change: f64,
    position: i64,
    estimates: [f64; 3],
    next_estimate: usize,
}

impl EncoderTracker {
    pub fn new(wheel: &'static str, reversed: bool, mode: VelocityMode) -> Self {
        Self {
            wheel,
            sign: if reversed { -1 } else { 1 },
            mode,
            last_ticks: None,
            last_change: 0.0,
            position: 0,
            estimates: [0.0; 3],
            next_estimate: 0,
        }
    }

    /// Current unwrapped position, ticks.
    pub fn position(&self) -> i64 {
        self.position
    }

    /// Median of the three most recent finite-difference velocities, ticks/s.
    pub fn velocity_estimate(&self) -> f64 {
        median3(self.estimates)
    }

    pub fn update(&mut self, sample: &EncoderSample) -> Result<EncoderReading, OdometryError> {
        match self.last_ticks {
            None => {
                self.position = self.sign * sample.ticks as i64;
                self.last_change = sample.timestamp;
            }
            Some(last) if last != sample.ticks => {
                let delta = self.sign * sample.ticks.wrapping_sub(last) as i64;
                self.position += delta;
                let dt = sample.timestamp - self.last_change;
                if dt > 0.0 {
                    self.estimates[self.next_estimate] = delta as f64 / dt;
                    self.next_estimate = (self.next_estimate + 1) % 3;
                }
                self.last_change = sample.timestamp;
            }
            Some(_) => {}
        }
        self.last_ticks = Some(sample.ticks);

        let raw = sample.raw_velocity.map(|v| (self.sign * v as i64) as f64);
        let velocity = match (self.mode, raw) {
            (VelocityMode::Raw, raw) => raw,
            (VelocityMode::Corrected, Some(raw)) => {
                Some(inverse_overflow(raw, self.velocity_estimate()))
            }
            (VelocityMode::Corrected, None) => {
                return Err(OdometryError::MissingVelocity { wheel: self.wheel })
            }
        };

        Ok(EncoderReading {
            position: self.position,
            velocity,
        })
    }
}
