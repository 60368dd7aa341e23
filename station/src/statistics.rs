//! Last-known-good views over backend reads.
//!
//! Statistics and the recent-scans feed are refreshed independently of the
//! scans that change them. A failed refresh marks the view stale and keeps
//! the previous value instead of resetting it.

use crate::error::ApiError;
use chrono::{DateTime, Utc};

/// A remotely sourced value with staleness tracking
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteView<T> {
    /// Last successfully fetched value
    pub value: T,
    /// The most recent refresh failed; `value` may be out of date
    pub stale: bool,
    /// Error of the most recent failed refresh
    pub last_error: Option<ApiError>,
    /// When `value` was last fetched
    pub refreshed_at: Option<DateTime<Utc>>,
    /// A refresh is in flight
    pub loading: bool,
    generation: u64,
}

impl<T: Default> Default for RemoteView<T> {
    fn default() -> Self {
        Self {
            value: T::default(),
            stale: false,
            last_error: None,
            refreshed_at: None,
            loading: false,
            generation: 0,
        }
    }
}

impl<T: Default> RemoteView<T> {
    /// Forget everything, e.g. when the selection the view describes changes
    ///
    /// Refreshes requested before the reset are ignored when they land.
    pub fn reset(&mut self) {
        let generation = self.generation + 1;
        *self = Self::default();
        self.generation = generation;
    }
}

impl<T> RemoteView<T> {
    /// Mark a refresh as started, returning the token its result must carry
    pub fn begin_refresh(&mut self) -> u64 {
        self.loading = true;
        self.generation
    }

    /// Apply a refresh result
    ///
    /// Returns `false` when the result belongs to an earlier selection and
    /// was ignored.
    pub fn apply(&mut self, token: u64, result: Result<T, ApiError>, now: DateTime<Utc>) -> bool {
        if token != self.generation {
            return false;
        }
        self.loading = false;
        match result {
            Ok(value) => {
                self.value = value;
                self.stale = false;
                self.last_error = None;
                self.refreshed_at = Some(now);
            },
            Err(error) => {
                self.stale = true;
                self.last_error = Some(error);
            },
        }
        true
    }

    /// Current selection token
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResourceStatistics;

    fn stats(count: u64) -> ResourceStatistics {
        ResourceStatistics {
            count,
            today: count,
            unique_attendees: count,
        }
    }

    #[test]
    fn failure_keeps_last_known_value() {
        let mut view = RemoteView::<ResourceStatistics>::default();
        let now = Utc::now();

        let token = view.begin_refresh();
        assert!(view.apply(token, Ok(stats(7)), now));

        let token = view.begin_refresh();
        assert!(view.apply(token, Err(ApiError::Transport("timeout".to_string())), now));

        assert_eq!(view.value, stats(7));
        assert!(view.stale);
        assert!(!view.loading);
        assert_eq!(view.refreshed_at, Some(now));
        assert!(view.last_error.is_some());
    }

    #[test]
    fn success_clears_staleness() {
        let mut view = RemoteView::<ResourceStatistics>::default();
        let now = Utc::now();

        let token = view.begin_refresh();
        view.apply(token, Err(ApiError::rejected("down")), now);
        assert!(view.stale);

        let token = view.begin_refresh();
        view.apply(token, Ok(stats(1)), now);
        assert!(!view.stale);
        assert_eq!(view.last_error, None);
    }

    #[test]
    fn results_from_before_reset_are_ignored() {
        let mut view = RemoteView::<Vec<u32>>::default();
        let token = view.begin_refresh();

        view.reset();

        assert!(!view.apply(token, Ok(vec![1, 2, 3]), Utc::now()));
        assert!(view.value.is_empty());
        assert_eq!(view.generation(), token + 1);
    }
}
