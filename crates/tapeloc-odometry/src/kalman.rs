use crate::calibration::NoiseParams;

/// One-dimensional Kalman filter with scalar state, control and measurement models.
///
/// The first measurement seeds the state (`x = z / c`, `cov = q / c²`); each
/// later one runs a predict/correct step.
#[derive(Clone, Debug, PartialEq)]
pub struct ScalarKalman {
    a: f64,
    b: f64,
    c: f64,
    process_noise: f64,
    measurement_noise: f64,
    state: Option<(f64, f64)>,
}

impl ScalarKalman {
    /// Constant-state model (`a = 1`, `b = 0`, `c = 1`).
    pub fn new(process_noise: f64, measurement_noise: f64) -> Self {
        Self::with_model(1.0, 0.0, 1.0, process_noise, measurement_noise)
    }

    pub fn with_model(a: f64, b: f64, c: f64, process_noise: f64, measurement_noise: f64) -> Self {
        Self {
            a,
            b,
            c,
            process_noise,
            measurement_noise,
            state: None,
        }
    }

    pub fn from_noise(noise: &NoiseParams) -> Self {
        Self::new(noise.process, noise.measurement)
    }

    /// Filter a measurement with no control input.
    pub fn filter(&mut self, measurement: f64) -> f64 {
        self.filter_with_input(measurement, 0.0)
    }

    pub fn filter_with_input(&mut self, measurement: f64, input: f64) -> f64 {
        let (x, cov) = match self.state {
            None => (
                measurement / self.c,
                self.measurement_noise / (self.c * self.c),
            ),
            Some((x, cov)) => {
                let pred_x = self.a * x + self.b * input;
                let pred_cov = self.a * cov * self.a + self.process_noise;
                let gain =
                    pred_cov * self.c / (self.c * pred_cov * self.c + self.measurement_noise);
                (
                    pred_x + gain * (measurement - self.c * pred_x),
                    pred_cov - gain * self.c * pred_cov,
                )
            }
        };
        self.state = Some((x, cov));
        x
    }

    /// Current state estimate, `None` before the first measurement.
    pub fn estimate(&self) -> Option<f64> {
        self.state.map(|(x, _)| x)
    }

    pub fn covariance(&self) -> Option<f64> {
        self.state.map(|(_, cov)| cov)
    }

    /// Forget the state; the next measurement seeds it again.
    pub fn reset(&mut self) {
        self.state = None;
    }
}
