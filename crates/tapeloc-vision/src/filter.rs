use crate::params::SegmentFilterParams;
use tapeloc_core::LineSegment;

/// Keep near-vertical segments: `|Δy| > min_y_dist` and `|Δx| < max_x_dist`.
///
/// Both comparisons are strict. Input order is preserved.
pub fn filter_segments<I>(
    segments: I,
    params: &SegmentFilterParams,
) -> impl Iterator<Item = LineSegment>
where
    I: IntoIterator<Item = LineSegment>,
{
    let max_x = params.max_x_dist;
    let min_y = params.min_y_dist;
    segments
        .into_iter()
        .filter(move |s| s.dy().abs() > min_y && s.dx().abs() < max_x)
}
