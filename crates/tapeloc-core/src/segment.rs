use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Straight line segment between two pixel positions.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineSegment {
    pub p0: Point2<f32>,
    pub p1: Point2<f32>,
}

impl LineSegment {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            p0: Point2::new(x0, y0),
            p1: Point2::new(x1, y1),
        }
    }

    /// Signed horizontal extent `x1 - x0`.
    #[inline]
    pub fn dx(&self) -> f32 {
        self.p1.x - self.p0.x
    }

    /// Signed vertical extent `y1 - y0`.
    #[inline]
    pub fn dy(&self) -> f32 {
        self.p1.y - self.p0.y
    }

    #[inline]
    pub fn length(&self) -> f32 {
        (self.p1 - self.p0).norm()
    }

    /// Both x-endpoints, in `p0, p1` order.
    #[inline]
    pub fn x_endpoints(&self) -> [f32; 2] {
        [self.p0.x, self.p1.x]
    }
}
