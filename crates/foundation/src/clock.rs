use crate::time::Time;

/// Snapshot of the shared playback clock.
///
/// The clock itself is owned by the host application; the engine only ever
/// reads `current_time` and the sign of `multiplier` (which gives the
/// playback direction used for prefetching).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Clock {
    pub current_time: Time,
    pub multiplier: f64,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PlaybackDirection {
    Forward,
    Backward,
}

impl Clock {
    pub fn new(current_time: Time) -> Self {
        Self {
            current_time,
            multiplier: 1.0,
        }
    }

    pub fn with_multiplier(current_time: Time, multiplier: f64) -> Self {
        Self {
            current_time,
            multiplier,
        }
    }

    pub fn direction(&self) -> PlaybackDirection {
        if self.multiplier < 0.0 {
            PlaybackDirection::Backward
        } else {
            PlaybackDirection::Forward
        }
    }
}
