//! Probabilistic line transform.
//!
//! Edge pixels are visited in a random (seeded) order. Each visited pixel
//! votes into an angle/offset accumulator; as soon as one of its bins reaches
//! `min_votes`, the corresponding line is walked in both directions from the
//! pixel with 16-bit fixed-point stepping along its dominant axis. The walk
//! bridges holes of up to `max_gap` pixels. Every pixel on the walked line is
//! removed from the mask; if the extent reaches `min_length` the line is
//! emitted and its pixels' votes are withdrawn.
//!
//! [`ProbabilisticHough`] is an iterator: segments are produced lazily, each
//! call to `next` resumes the pixel scan where the previous one stopped.

use std::f32::consts::PI;
use std::iter::FusedIterator;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tapeloc_core::LineSegment;

use crate::edges::EdgeMap;
use crate::params::HoughParams;

const SHIFT: i64 = 16;

/// Lazy, finite, non-restartable segment stream over one edge map.
///
/// Owns a working copy of the edge mask; the source map can be dropped.
pub struct ProbabilisticHough {
    width: usize,
    height: usize,
    mask: Vec<u8>,
    pending: Vec<(usize, usize)>,
    accum: Vec<i32>,
    num_rho: usize,
    trig: Vec<(f32, f32)>,
    rng: StdRng,
    min_votes: i32,
    min_length: i64,
    max_gap: i64,
}

/// Start a segment stream over `edges`.
pub fn detect_segments(edges: &EdgeMap, params: &HoughParams) -> ProbabilisticHough {
    ProbabilisticHough::new(edges, params)
}

impl ProbabilisticHough {
    pub fn new(edges: &EdgeMap, params: &HoughParams) -> Self {
        let width = edges.width();
        let height = edges.height();

        let theta = params.theta_deg.to_radians();
        let num_angle = ((PI / theta).round() as usize).max(1);
        let num_rho = ((((width + height) * 2 + 1) as f32 / params.rho).round() as usize).max(1);
        let irho = 1.0 / params.rho;
        let trig = (0..num_angle)
            .map(|n| {
                let t = n as f32 * theta;
                (t.cos() * irho, t.sin() * irho)
            })
            .collect();

        let pending: Vec<(usize, usize)> = edges.points().collect();
        let accum = if pending.is_empty() {
            Vec::new()
        } else {
            vec![0; num_angle * num_rho]
        };

        Self {
            width,
            height,
            mask: edges.raw().to_vec(),
            pending,
            accum,
            num_rho,
            trig,
            rng: StdRng::seed_from_u64(params.seed),
            min_votes: params.min_votes.min(i32::MAX as u32) as i32,
            min_length: params.min_length as i64,
            max_gap: params.max_gap as i64,
        }
    }

    /// Edge pixels not yet visited.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    /// Accumulator cell of `(x, y)` at angle `n`, or `None` when the offset
    /// falls outside the `num_rho` bins (coarse `rho` on a small frame).
    #[inline]
    fn rho_index(&self, n: usize, x: usize, y: usize) -> Option<usize> {
        let (c, s) = self.trig[n];
        let r = (x as f32 * c + y as f32 * s).round() as i64 + (self.num_rho as i64 - 1) / 2;
        (0..self.num_rho as i64)
            .contains(&r)
            .then(|| n * self.num_rho + r as usize)
    }

    fn vote(&mut self, x: usize, y: usize, delta: i32) -> (i32, usize) {
        let mut max_val = self.min_votes - 1;
        let mut max_n = 0;
        for n in 0..self.trig.len() {
            let Some(idx) = self.rho_index(n, x, y) else {
                continue;
            };
            self.accum[idx] += delta;
            let val = self.accum[idx];
            if max_val < val {
                max_val = val;
                max_n = n;
            }
        }
        (max_val, max_n)
    }

    #[inline]
    fn pixel(&self, horizontal: bool, px: i64, py: i64) -> Option<(usize, usize)> {
        let (j, i) = if horizontal {
            (px, py >> SHIFT)
        } else {
            (px >> SHIFT, py)
        };
        if j < 0 || i < 0 || j >= self.width as i64 || i >= self.height as i64 {
            return None;
        }
        Some((j as usize, i as usize))
    }

    /// Try to grow a segment through `(x, y)`.
    fn grow(&mut self, x: usize, y: usize) -> Option<LineSegment> {
        if self.mask[y * self.width + x] == 0 {
            return None;
        }

        let (votes, max_n) = self.vote(x, y, 1);
        if votes < self.min_votes {
            return None;
        }

        // Line direction; step one pixel along the dominant axis.
        let (c, s) = self.trig[max_n];
        let a = -s;
        let b = c;
        let one = 1i64 << SHIFT;
        let horizontal = a.abs() > b.abs();
        let (x0, y0, dx0, dy0) = if horizontal {
            (
                x as i64,
                ((y as i64) << SHIFT) + (one >> 1),
                if a > 0.0 { 1 } else { -1 },
                (b * one as f32 / a.abs()).round() as i64,
            )
        } else {
            (
                ((x as i64) << SHIFT) + (one >> 1),
                y as i64,
                (a * one as f32 / b.abs()).round() as i64,
                if b > 0.0 { 1 } else { -1 },
            )
        };

        let mut line_end = [(x, y); 2];
        for (k, end) in line_end.iter_mut().enumerate() {
            let (dx, dy) = if k == 0 { (dx0, dy0) } else { (-dx0, -dy0) };
            let (mut px, mut py) = (x0, y0);
            let mut gap = 0;
            while let Some((j, i)) = self.pixel(horizontal, px, py) {
                if self.mask[i * self.width + j] != 0 {
                    gap = 0;
                    *end = (j, i);
                } else {
                    gap += 1;
                    if gap > self.max_gap {
                        break;
                    }
                }
                px += dx;
                py += dy;
            }
        }

        let extent_x = (line_end[1].0 as i64 - line_end[0].0 as i64).abs();
        let extent_y = (line_end[1].1 as i64 - line_end[0].1 as i64).abs();
        let good = extent_x >= self.min_length || extent_y >= self.min_length;

        for (k, &end) in line_end.iter().enumerate() {
            let (dx, dy) = if k == 0 { (dx0, dy0) } else { (-dx0, -dy0) };
            let (mut px, mut py) = (x0, y0);
            while let Some((j, i)) = self.pixel(horizontal, px, py) {
                let idx = i * self.width + j;
                if self.mask[idx] != 0 {
                    if good {
                        self.vote(j, i, -1);
                    }
                    self.mask[idx] = 0;
                }
                if (j, i) == end {
                    break;
                }
                px += dx;
                py += dy;
            }
        }

        good.then(|| {
            LineSegment::new(
                line_end[0].0 as f32,
                line_end[0].1 as f32,
                line_end[1].0 as f32,
                line_end[1].1 as f32,
            )
        })
    }
}

impl Iterator for ProbabilisticHough {
    type Item = LineSegment;

    fn next(&mut self) -> Option<LineSegment> {
        while !self.pending.is_empty() {
            let pick = self.rng.random_range(0..self.pending.len());
            let (x, y) = self.pending.swap_remove(pick);
            if let Some(segment) = self.grow(x, y) {
                return Some(segment);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.pending.len()))
    }
}

impl FusedIterator for ProbabilisticHough {}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(min_votes: u32, min_length: u32, max_gap: u32) -> HoughParams {
        HoughParams {
            min_votes,
            min_length,
            max_gap,
            ..HoughParams::default()
        }
    }

    fn sorted_by_y(seg: LineSegment) -> LineSegment {
        if seg.p0.y <= seg.p1.y {
            seg
        } else {
            LineSegment {
                p0: seg.p1,
                p1: seg.p0,
            }
        }
    }

    #[test]
    fn empty_map_yields_nothing() {
        let edges = EdgeMap::new(64, 48);
        let mut stream = detect_segments(&edges, &HoughParams::default());
        assert!(stream.next().is_none());
        assert!(stream.next().is_none());
    }

    #[test]
    fn finds_single_vertical_line() {
        let edges = EdgeMap::from_points(40, 80, (5..=64).map(|y| (10, y)));
        let segments: Vec<_> = detect_segments(&edges, &params(10, 30, 3)).collect();
        assert_eq!(segments.len(), 1);
        assert_eq!(
            sorted_by_y(segments[0]),
            LineSegment::new(10.0, 5.0, 10.0, 64.0)
        );
    }

    #[test]
    fn bridges_gaps_up_to_max_gap() {
        let points = (5..=34).chain(39..=68).map(|y| (10, y));
        let edges = EdgeMap::from_points(40, 80, points);
        let segments: Vec<_> = detect_segments(&edges, &params(10, 30, 5)).collect();
        assert_eq!(segments.len(), 1);
        assert_eq!(
            sorted_by_y(segments[0]),
            LineSegment::new(10.0, 5.0, 10.0, 68.0)
        );
    }

    #[test]
    fn short_lines_are_consumed_without_output() {
        let edges = EdgeMap::from_points(40, 80, (5..=24).map(|y| (10, y)));
        let mut stream = detect_segments(&edges, &params(10, 30, 3));
        assert!(stream.next().is_none());
        assert_eq!(stream.remaining(), 0);
    }

    #[test]
    fn finds_two_parallel_lines() {
        let points = (5..=64).flat_map(|y| [(10, y), (30, y)]);
        let edges = EdgeMap::from_points(40, 80, points);
        let mut xs: Vec<f32> = detect_segments(&edges, &params(10, 30, 3))
            .map(|s| {
                assert_eq!(s.dx(), 0.0);
                assert_eq!(s.dy().abs(), 59.0);
                s.p0.x
            })
            .collect();
        xs.sort_by(f32::total_cmp);
        assert_eq!(xs, vec![10.0, 30.0]);
    }

    #[test]
    fn finds_horizontal_line() {
        let edges = EdgeMap::from_points(90, 30, (3..=82).map(|x| (x, 12)));
        let segments: Vec<_> = detect_segments(&edges, &params(60, 50, 2)).collect();
        assert_eq!(segments.len(), 1);
        let s = segments[0];
        assert_eq!(s.dy(), 0.0);
        assert_eq!(s.dx().abs(), 79.0);
        assert_eq!(s.p0.y, 12.0);
    }

    #[test]
    fn coarse_rho_skips_out_of_range_bins() {
        let edges = EdgeMap::from_points(80, 80, (5..=64).map(|y| (79, y)));
        let p = HoughParams {
            rho: 150.0,
            ..params(10, 30, 3)
        };
        p.validate().expect("valid params");
        let segments: Vec<_> = detect_segments(&edges, &p).collect();
        assert_eq!(segments.len(), 1);
        assert_eq!(
            sorted_by_y(segments[0]),
            LineSegment::new(79.0, 5.0, 79.0, 64.0)
        );
    }

    #[test]
    fn same_seed_same_segments() {
        let points = (5..=64).flat_map(|y| [(10, y), (30, y), (y / 2, y)]);
        let edges = EdgeMap::from_points(40, 80, points);
        let p = params(10, 20, 2);
        let a: Vec<_> = detect_segments(&edges, &p).collect();
        let b: Vec<_> = detect_segments(&edges, &p).collect();
        assert_eq!(a, b);
    }
}
