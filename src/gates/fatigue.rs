//! Per-reviewer review rate limiting.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_REVIEWS_BEFORE_BREAK: u32 = 50;

/// Rolling-window counters carried on each review session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FatigueState {
    pub session_start: DateTime<Utc>,
    pub reviews_this_window: u32,
    pub next_allowed_review_time: Option<DateTime<Utc>>,
}

impl FatigueState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            session_start: now,
            reviews_this_window: 0,
            next_allowed_review_time: None,
        }
    }

    /// End of the current break, if one is still running at `now`.
    pub fn break_until(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.next_allowed_review_time.filter(|until| now < *until)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatigueThrottle {
    pub max_reviews_before_break: u32,
    pub session_window: Duration,
    pub min_break: Duration,
}

impl Default for FatigueThrottle {
    fn default() -> Self {
        Self {
            max_reviews_before_break: DEFAULT_MAX_REVIEWS_BEFORE_BREAK,
            session_window: Duration::hours(1),
            min_break: Duration::minutes(15),
        }
    }
}

impl FatigueThrottle {
    pub fn new(max_reviews_before_break: u32, session_window: Duration, min_break: Duration) -> Self {
        Self {
            max_reviews_before_break,
            session_window,
            min_break,
        }
    }

    /// Count one review attempt at `now`. Returns true when a break is required.
    ///
    /// A session already inside a break is refused without using up a slot.
    pub fn check_and_advance(&self, state: &mut FatigueState, now: DateTime<Utc>) -> bool {
        if state.break_until(now).is_some() {
            return true;
        }

        if now - state.session_start > self.session_window {
            state.session_start = now;
            state.reviews_this_window = 0;
        }

        if state.reviews_this_window >= self.max_reviews_before_break {
            let until = now
                .checked_add_signed(self.min_break)
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            tracing::info!(%until, reviews = state.reviews_this_window, "Review break required");
            state.next_allowed_review_time = Some(until);
            state.reviews_this_window = 0;
            state.session_start = until;
            return true;
        }

        state.reviews_this_window += 1;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_break_after_max_reviews_and_until_expiry() {
        let throttle = FatigueThrottle::default();
        let t0 = Utc::now();
        let mut state = FatigueState::new(t0);

        for i in 0..50 {
            let now = t0 + Duration::seconds(i);
            assert!(!throttle.check_and_advance(&mut state, now), "review {i}");
        }

        let now = t0 + Duration::seconds(50);
        assert!(throttle.check_and_advance(&mut state, now));
        let until = state.next_allowed_review_time.unwrap();
        assert_eq!(until, now + Duration::minutes(15));

        assert!(throttle.check_and_advance(&mut state, until - Duration::milliseconds(1)));
        assert_eq!(state.reviews_this_window, 0);

        assert!(!throttle.check_and_advance(&mut state, until));
        assert_eq!(state.reviews_this_window, 1);
    }

    #[test]
    fn test_window_expiry_resets_counter() {
        let throttle = FatigueThrottle::new(3, Duration::minutes(10), Duration::minutes(5));
        let t0 = Utc::now();
        let mut state = FatigueState::new(t0);

        for _ in 0..3 {
            assert!(!throttle.check_and_advance(&mut state, t0));
        }
        let later = t0 + Duration::minutes(11);
        assert!(!throttle.check_and_advance(&mut state, later));
        assert_eq!(state.session_start, later);
        assert_eq!(state.reviews_this_window, 1);
    }

    #[test]
    fn test_huge_break_saturates_instead_of_overflowing() {
        let throttle = FatigueThrottle::new(1, Duration::hours(1), Duration::MAX);
        let t0 = Utc::now();
        let mut state = FatigueState::new(t0);

        assert!(!throttle.check_and_advance(&mut state, t0));
        assert!(throttle.check_and_advance(&mut state, t0));
        assert_eq!(state.next_allowed_review_time, Some(DateTime::<Utc>::MAX_UTC));
        assert!(throttle.check_and_advance(&mut state, t0 + Duration::days(365)));
    }

    #[test]
    fn test_break_until_ignores_expired_breaks() {
        let t0 = Utc::now();
        let mut state = FatigueState::new(t0);
        state.next_allowed_review_time = Some(t0 + Duration::minutes(1));
        assert!(state.break_until(t0).is_some());
        assert!(state.break_until(t0 + Duration::minutes(1)).is_none());
    }
}
