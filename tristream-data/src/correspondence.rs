//! Color-to-depth temporal correspondence.
//!
//! Each color frame is aligned against the depth frame that was current when
//! it was captured: the last depth frame whose timestamp is strictly earlier.

use crate::types::Ticks;

/// How a depth frame was chosen for a color frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// The depth frame strictly precedes the color frame.
    Preceding,
    /// No depth frame precedes the color frame; the last depth frame of the
    /// session was used instead.
    LastFrameFallback,
}

/// Depth frame selected for a color frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthMatch {
    pub index: usize,
    pub kind: MatchKind,
}

/// Find the depth frame that precedes a color frame captured at `color`.
///
/// `depth` must be non-decreasing. Returns the largest `j` with
/// `depth[j] < color`. Equal timestamps do not count as preceding.
///
/// When every depth timestamp is at or after `color`, the *last* depth frame
/// is returned (not the first). This pairs an early color frame with the end
/// of the session, which is geometrically odd but is the established
/// behaviour of the capture tool; it is reported as
/// [`MatchKind::LastFrameFallback`] so callers can tell.
///
/// Returns `None` when the depth stream is empty.
pub fn nearest_preceding_depth(depth: &[Ticks], color: Ticks) -> Option<DepthMatch> {
    if depth.is_empty() {
        return None;
    }

    let preceding = depth.partition_point(|&t| t < color);
    let m = match preceding.checked_sub(1) {
        Some(index) => DepthMatch {
            index,
            kind: MatchKind::Preceding,
        },
        None => DepthMatch {
            index: depth.len() - 1,
            kind: MatchKind::LastFrameFallback,
        },
    };
    Some(m)
}

/// Resolve every color frame against the depth stream.
///
/// Entry `i` is the match for `color[i]`.
pub fn correspondence_map(depth: &[Ticks], color: &[Ticks]) -> Vec<Option<DepthMatch>> {
    color
        .iter()
        .map(|&t| nearest_preceding_depth(depth, t))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticks(values: &[i64]) -> Vec<Ticks> {
        values.iter().copied().map(Ticks::new).collect()
    }

    #[test]
    fn test_picks_nearest_preceding() {
        let depth = ticks(&[10, 20, 30]);
        let m = nearest_preceding_depth(&depth, Ticks::new(25)).unwrap();
        assert_eq!(m.index, 1);
        assert_eq!(m.kind, MatchKind::Preceding);
    }

    #[test]
    fn test_before_all_depth_falls_back_to_last() {
        let depth = ticks(&[10, 20, 30]);
        let m = nearest_preceding_depth(&depth, Ticks::new(5)).unwrap();
        assert_eq!(m.index, 2);
        assert_eq!(m.kind, MatchKind::LastFrameFallback);
    }

    #[test]
    fn test_after_all_depth_picks_last() {
        let depth = ticks(&[10, 20, 30]);
        let m = nearest_preceding_depth(&depth, Ticks::new(35)).unwrap();
        assert_eq!(m.index, 2);
        assert_eq!(m.kind, MatchKind::Preceding);
    }

    #[test]
    fn test_equal_timestamp_is_not_preceding() {
        let depth = ticks(&[10, 20, 30]);
        assert_eq!(nearest_preceding_depth(&depth, Ticks::new(20)).unwrap().index, 0);
        // Equal to the first entry: nothing precedes, so fall back.
        let m = nearest_preceding_depth(&depth, Ticks::new(10)).unwrap();
        assert_eq!(m.index, 2);
        assert_eq!(m.kind, MatchKind::LastFrameFallback);
    }

    #[test]
    fn test_duplicate_depth_timestamps() {
        let depth = ticks(&[10, 20, 20, 30]);
        assert_eq!(nearest_preceding_depth(&depth, Ticks::new(25)).unwrap().index, 2);
        assert_eq!(nearest_preceding_depth(&depth, Ticks::new(20)).unwrap().index, 0);
    }

    #[test]
    fn test_empty_depth_has_no_correspondence() {
        assert_eq!(nearest_preceding_depth(&[], Ticks::new(25)), None);
    }

    #[test]
    fn test_single_depth_frame() {
        let depth = ticks(&[10]);
        assert_eq!(nearest_preceding_depth(&depth, Ticks::new(11)).unwrap().index, 0);
        assert_eq!(nearest_preceding_depth(&depth, Ticks::new(9)).unwrap().index, 0);
    }

    #[test]
    fn test_map_over_color_stream() {
        let depth = ticks(&[10, 20, 30]);
        let color = ticks(&[5, 15, 31]);
        let indices: Vec<Option<usize>> = correspondence_map(&depth, &color)
            .into_iter()
            .map(|m| m.map(|m| m.index))
            .collect();
        assert_eq!(indices, vec![Some(2), Some(0), Some(2)]);

        assert!(correspondence_map(&[], &color).iter().all(Option::is_none));
    }

    #[test]
    fn test_matches_linear_scan() {
        // Strict "<" scan over a sorted series with repeats.
        let depth = ticks(&[3, 3, 7, 9, 9, 9, 14]);
        for t in 0..18 {
            let scan = depth.iter().rposition(|d| d.as_ticks() < t).unwrap_or(depth.len() - 1);
            let got = nearest_preceding_depth(&depth, Ticks::new(t)).unwrap();
            assert_eq!(got.index, scan, "color timestamp {t}");
        }
    }
}
