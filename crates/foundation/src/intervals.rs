use crate::clock::PlaybackDirection;
use crate::time::{Time, TimeSpan};

/// A sorted collection of non-overlapping time spans.
///
/// This is the timeline of a time-dynamic dataset: one span per available
/// imagery step. Spans are kept sorted by start; construction rejects
/// overlaps so that `index_of` has a unique answer.
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalCollection {
    spans: Vec<TimeSpan>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IntervalError {
    Overlap { earlier: usize, later: usize },
    Inverted { index: usize },
}

impl std::fmt::Display for IntervalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntervalError::Overlap { earlier, later } => {
                write!(f, "interval {later} overlaps interval {earlier}")
            }
            IntervalError::Inverted { index } => {
                write!(f, "interval {index} ends before it starts")
            }
        }
    }
}

impl std::error::Error for IntervalError {}

impl IntervalCollection {
    pub fn new(mut spans: Vec<TimeSpan>) -> Result<Self, IntervalError> {
        spans.sort_by(|a, b| {
            a.start
                .0
                .partial_cmp(&b.start.0)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for (i, span) in spans.iter().enumerate() {
            if span.end.0 < span.start.0 {
                return Err(IntervalError::Inverted { index: i });
            }
            if i > 0 && span.start.0 < spans[i - 1].end.0 {
                return Err(IntervalError::Overlap {
                    earlier: i - 1,
                    later: i,
                });
            }
        }
        Ok(Self { spans })
    }

    pub fn empty() -> Self {
        Self { spans: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<TimeSpan> {
        self.spans.get(index).copied()
    }

    /// Binary search for the span containing `time`.
    ///
    /// `Ok(i)` means span `i` contains the time. `Err(i)` means no span
    /// does, and `i` is the index of the first span starting after `time`
    /// (possibly `len()`), mirroring `slice::binary_search`.
    pub fn index_of(&self, time: Time) -> Result<usize, usize> {
        let insertion = self
            .spans
            .partition_point(|span| span.start.0 <= time.0);
        if insertion > 0 && self.spans[insertion - 1].contains(time) {
            Ok(insertion - 1)
        } else {
            Err(insertion)
        }
    }

    /// Steps from span `index` to its neighbour in playback direction.
    pub fn next_index(&self, index: usize, direction: PlaybackDirection) -> Option<usize> {
        match direction {
            PlaybackDirection::Forward => {
                let next = index + 1;
                (next < self.spans.len()).then_some(next)
            }
            PlaybackDirection::Backward => index.checked_sub(1),
        }
    }

    /// Nearest span index for a time outside every span, in playback
    /// direction. Used to prefetch when the clock sits in a gap or before
    /// the first span.
    pub fn nearest_index_from(
        &self,
        insertion: usize,
        direction: PlaybackDirection,
    ) -> Option<usize> {
        match direction {
            PlaybackDirection::Forward => (insertion < self.spans.len()).then_some(insertion),
            PlaybackDirection::Backward => insertion.checked_sub(1),
        }
    }

    /// Snaps a time to the nearest span boundary.
    ///
    /// Before the first span: its start. After the last: its end. Inside a
    /// span: that span's start. In a gap: the nearer of the two
    /// neighbouring starts.
    pub fn snap_nearest(&self, time: Time) -> Option<Time> {
        if self.spans.is_empty() {
            return None;
        }
        match self.index_of(time) {
            Ok(i) => Some(self.spans[i].start),
            Err(insertion) => {
                if insertion == 0 {
                    Some(self.spans[0].start)
                } else if insertion == self.spans.len() {
                    Some(self.spans[self.spans.len() - 1].end)
                } else {
                    let prev = self.spans[insertion - 1].start;
                    let next = self.spans[insertion].start;
                    if time.0 - prev.0 < next.0 - time.0 {
                        Some(prev)
                    } else {
                        Some(next)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{IntervalCollection, IntervalError};
    use crate::clock::PlaybackDirection;
    use crate::time::{Time, TimeSpan};

    fn span(a: f64, b: f64) -> TimeSpan {
        TimeSpan::new(Time(a), Time(b))
    }

    fn decade() -> IntervalCollection {
        IntervalCollection::new(vec![span(0.0, 10.0), span(10.0, 20.0), span(30.0, 40.0)])
            .expect("valid spans")
    }

    #[test]
    fn index_of_finds_containing_span() {
        let c = decade();
        assert_eq!(c.index_of(Time(5.0)), Ok(0));
        assert_eq!(c.index_of(Time(10.0)), Ok(1));
        assert_eq!(c.index_of(Time(35.0)), Ok(2));
    }

    #[test]
    fn index_of_reports_insertion_point_in_gaps() {
        let c = decade();
        assert_eq!(c.index_of(Time(-1.0)), Err(0));
        assert_eq!(c.index_of(Time(25.0)), Err(2));
        assert_eq!(c.index_of(Time(45.0)), Err(3));
    }

    #[test]
    fn construction_rejects_overlap() {
        let err = IntervalCollection::new(vec![span(0.0, 10.0), span(5.0, 15.0)]).unwrap_err();
        assert_eq!(err, IntervalError::Overlap { earlier: 0, later: 1 });
    }

    #[test]
    fn construction_sorts_input() {
        let c = IntervalCollection::new(vec![span(10.0, 20.0), span(0.0, 10.0)]).expect("sorts");
        assert_eq!(c.get(0), Some(span(0.0, 10.0)));
    }

    #[test]
    fn next_index_follows_direction() {
        let c = decade();
        assert_eq!(c.next_index(0, PlaybackDirection::Forward), Some(1));
        assert_eq!(c.next_index(2, PlaybackDirection::Forward), None);
        assert_eq!(c.next_index(1, PlaybackDirection::Backward), Some(0));
        assert_eq!(c.next_index(0, PlaybackDirection::Backward), None);
    }

    #[test]
    fn snap_nearest_boundaries_and_gaps() {
        let c = decade();
        assert_eq!(c.snap_nearest(Time(-5.0)), Some(Time(0.0)));
        assert_eq!(c.snap_nearest(Time(100.0)), Some(Time(40.0)));
        // Gap (20, 30): 21 is nearer the previous start, 29 the next.
        assert_eq!(c.snap_nearest(Time(21.0)), Some(Time(10.0)));
        assert_eq!(c.snap_nearest(Time(29.0)), Some(Time(30.0)));
        assert_eq!(c.snap_nearest(Time(5.0)), Some(Time(0.0)));
        assert_eq!(IntervalCollection::empty().snap_nearest(Time(0.0)), None);
    }
}
