use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::backend::TileError;

/// Tile failure policy.
///
/// The counts and flags are plain configuration: the defaults mirror the
/// long-standing behavior of the system this replaces, not any derived
/// SLA.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileRetryPolicy {
    /// Retries per tile before the whole layer is failed.
    pub max_retries: u32,
    /// When false, a 404 means "no data for this tile" and is dropped.
    pub treat_404_as_error: bool,
    /// When false, a 403 is dropped the same way a 404 is.
    pub treat_403_as_error: bool,
    /// When true, failures with no HTTP status (transport errors) are
    /// dropped instead of failing the layer.
    pub ignore_unknown_tile_errors: bool,
}

impl Default for TileRetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            treat_404_as_error: false,
            treat_403_as_error: false,
            ignore_unknown_tile_errors: false,
        }
    }
}

/// What the renderer should do with a failed tile.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TileDisposition {
    /// Fetch the tile again.
    Retry,
    /// Stop fetching this tile and render it as empty; not an error.
    GiveUp,
    /// Stop fetching; the layer as a whole is being failed.
    FailLayer,
}

/// Per-tile failure bookkeeping for one scheduler.
///
/// Counts survive across ticks but are cleared whenever the layer is
/// re-shown, so a manual re-show retries from scratch.
#[derive(Debug, Default)]
pub struct TileRetryTracker {
    counts: BTreeMap<(u64, u32, u32, u32), u32>,
}

impl TileRetryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }

    /// Classifies one failure report.
    ///
    /// Client errors are never retried: an ignorable 404/403 gives up
    /// silently, any other 4xx fails the layer at once (asking again will
    /// not help). Server errors (5xx) retry up to the policy's limit.
    /// Status-less failures either give up (when ignored by policy) or
    /// fail the layer.
    pub fn classify(&mut self, policy: &TileRetryPolicy, error: &TileError) -> TileDisposition {
        match error.status {
            Some(404) if !policy.treat_404_as_error => TileDisposition::GiveUp,
            Some(403) if !policy.treat_403_as_error => TileDisposition::GiveUp,
            Some(status) if (400..500).contains(&status) => TileDisposition::FailLayer,
            Some(status) if (500..600).contains(&status) => self.count_retry(error, policy),
            Some(_) => TileDisposition::FailLayer,
            None => {
                if policy.ignore_unknown_tile_errors {
                    TileDisposition::GiveUp
                } else {
                    TileDisposition::FailLayer
                }
            }
        }
    }

    fn count_retry(&mut self, error: &TileError, policy: &TileRetryPolicy) -> TileDisposition {
        let key = (error.layer.0, error.x, error.y, error.level);
        let count = self.counts.entry(key).or_insert(0);
        *count += 1;
        if *count > policy.max_retries {
            TileDisposition::FailLayer
        } else {
            TileDisposition::Retry
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{TileDisposition, TileRetryPolicy, TileRetryTracker};
    use crate::backend::{LayerHandle, TileError};

    fn error(status: Option<u16>) -> TileError {
        TileError {
            layer: LayerHandle(1),
            x: 3,
            y: 5,
            level: 7,
            status,
        }
    }

    #[test]
    fn ignorable_statuses_give_up_silently() {
        let mut tracker = TileRetryTracker::new();
        let policy = TileRetryPolicy::default();
        for _ in 0..10 {
            assert_eq!(
                tracker.classify(&policy, &error(Some(404))),
                TileDisposition::GiveUp
            );
        }
        assert_eq!(
            tracker.classify(&policy, &error(Some(403))),
            TileDisposition::GiveUp
        );
    }

    #[test]
    fn ignorable_statuses_fail_when_treated_as_errors() {
        let mut tracker = TileRetryTracker::new();
        let policy = TileRetryPolicy {
            treat_404_as_error: true,
            ..TileRetryPolicy::default()
        };
        assert_eq!(
            tracker.classify(&policy, &error(Some(404))),
            TileDisposition::FailLayer
        );
    }

    #[test]
    fn server_errors_retry_until_exhausted() {
        let mut tracker = TileRetryTracker::new();
        let policy = TileRetryPolicy::default();
        for _ in 0..3 {
            assert_eq!(
                tracker.classify(&policy, &error(Some(500))),
                TileDisposition::Retry
            );
        }
        assert_eq!(
            tracker.classify(&policy, &error(Some(500))),
            TileDisposition::FailLayer
        );
    }

    #[test]
    fn retry_counts_are_per_tile() {
        let mut tracker = TileRetryTracker::new();
        let policy = TileRetryPolicy { max_retries: 1, ..TileRetryPolicy::default() };
        let other = TileError { x: 99, ..error(Some(503)) };
        assert_eq!(tracker.classify(&policy, &error(Some(503))), TileDisposition::Retry);
        assert_eq!(tracker.classify(&policy, &other), TileDisposition::Retry);
        assert_eq!(
            tracker.classify(&policy, &error(Some(503))),
            TileDisposition::FailLayer
        );
    }

    #[test]
    fn clear_resets_counts() {
        let mut tracker = TileRetryTracker::new();
        let policy = TileRetryPolicy { max_retries: 1, ..TileRetryPolicy::default() };
        let _ = tracker.classify(&policy, &error(Some(500)));
        tracker.clear();
        assert_eq!(
            tracker.classify(&policy, &error(Some(500))),
            TileDisposition::Retry
        );
    }

    #[test]
    fn unknown_errors_follow_the_ignore_flag() {
        let mut tracker = TileRetryTracker::new();
        assert_eq!(
            tracker.classify(&TileRetryPolicy::default(), &error(None)),
            TileDisposition::FailLayer
        );
        let ignoring = TileRetryPolicy {
            ignore_unknown_tile_errors: true,
            ..TileRetryPolicy::default()
        };
        assert_eq!(
            tracker.classify(&ignoring, &error(None)),
            TileDisposition::GiveUp
        );
    }
}
