//! Idle timeout state machine.
//!
//! ```text
//!   Active --(idle >= W)--> Warning --(idle >= L)--> Expired
//!     ^  \__activity__/        |
//!     |________extend__________|
//! ```
//!
//! The timer never reads a clock itself: every operation takes `now`, and
//! state only changes when an operation is applied. Whichever of `tick` and
//! `extend` is applied first wins.

use std::time::{Duration, Instant};

use thiserror::Error;

/// Idle time before the warning prompt (25 minutes)
pub const DEFAULT_WARNING_AFTER_SECS: u64 = 25 * 60;

/// Idle time before forced logout (30 minutes)
pub const DEFAULT_LOGOUT_AFTER_SECS: u64 = 30 * 60;

/// Activity closer together than this only resets the timer once
pub const DEFAULT_ACTIVITY_DEBOUNCE_MS: u64 = 1000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    #[error("Logout threshold ({logout}s) must be greater than warning threshold ({warning}s)")]
    InvalidThresholds { warning: u64, logout: u64 },

    #[error("Session has already expired")]
    Expired,
}

/// Warning and logout thresholds, `logout_after > warning_after`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    warning_after: Duration,
    logout_after: Duration,
    activity_debounce: Duration,
}

impl TimeoutPolicy {
    pub fn new(warning_after: Duration, logout_after: Duration) -> Result<Self, TimerError> {
        if logout_after <= warning_after {
            return Err(TimerError::InvalidThresholds {
                warning: warning_after.as_secs(),
                logout: logout_after.as_secs(),
            });
        }
        Ok(Self {
            warning_after,
            logout_after,
            activity_debounce: Duration::from_millis(DEFAULT_ACTIVITY_DEBOUNCE_MS),
        })
    }

    pub fn from_secs(warning_after: u64, logout_after: u64) -> Result<Self, TimerError> {
        Self::new(
            Duration::from_secs(warning_after),
            Duration::from_secs(logout_after),
        )
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.activity_debounce = debounce;
        self
    }

    pub fn warning_after(&self) -> Duration {
        self.warning_after
    }

    pub fn logout_after(&self) -> Duration {
        self.logout_after
    }

    /// Length of the countdown shown in the warning prompt
    pub fn warning_window(&self) -> Duration {
        self.logout_after - self.warning_after
    }
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            warning_after: Duration::from_secs(DEFAULT_WARNING_AFTER_SECS),
            logout_after: Duration::from_secs(DEFAULT_LOGOUT_AFTER_SECS),
            activity_debounce: Duration::from_millis(DEFAULT_ACTIVITY_DEBOUNCE_MS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Active,
    Warning,
    /// Terminal
    Expired,
}

/// Transition produced by `tick`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    WarningStarted { remaining_secs: u64 },
    Expired,
}

#[derive(Debug, Clone)]
pub struct IdleTimer {
    policy: TimeoutPolicy,
    last_activity_at: Instant,
    state: TimerState,
}

impl IdleTimer {
    pub fn new(policy: TimeoutPolicy, now: Instant) -> Self {
        Self {
            policy,
            last_activity_at: now,
            state: TimerState::Active,
        }
    }

    pub fn policy(&self) -> &TimeoutPolicy {
        &self.policy
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn last_activity_at(&self) -> Instant {
        self.last_activity_at
    }

    /// When the session will expire if nothing else happens
    pub fn expires_at(&self) -> Instant {
        self.last_activity_at + self.policy.logout_after
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity_at)
    }

    /// Advance to `now`, returning the transition if one happened.
    pub fn tick(&mut self, now: Instant) -> Option<TimerEvent> {
        if self.state == TimerState::Expired {
            return None;
        }

        let elapsed = self.elapsed(now);
        if elapsed >= self.policy.logout_after {
            self.state = TimerState::Expired;
            return Some(TimerEvent::Expired);
        }
        if elapsed >= self.policy.warning_after && self.state == TimerState::Active {
            self.state = TimerState::Warning;
            return Some(TimerEvent::WarningStarted {
                remaining_secs: self.time_remaining(now),
            });
        }
        None
    }

    /// User interaction. Only resets the timer while `Active` and before the
    /// warning threshold, even if no `tick` has run yet to raise it; past
    /// that point only `extend` brings the session back.
    ///
    /// Returns whether the reset was applied.
    pub fn record_activity(&mut self, now: Instant) -> bool {
        if self.state != TimerState::Active {
            return false;
        }
        let elapsed = self.elapsed(now);
        if elapsed >= self.policy.warning_after {
            return false;
        }
        if elapsed < self.policy.activity_debounce {
            return false;
        }
        self.last_activity_at = now;
        true
    }

    /// Explicit "extend session": back to `Active` with a full idle budget.
    pub fn extend(&mut self, now: Instant) -> Result<(), TimerError> {
        if self.state == TimerState::Expired {
            return Err(TimerError::Expired);
        }
        self.last_activity_at = now;
        self.state = TimerState::Active;
        Ok(())
    }

    /// Whole seconds until logout, rounded up; 0 once expired.
    pub fn time_remaining(&self, now: Instant) -> u64 {
        if self.state == TimerState::Expired {
            return 0;
        }
        let remaining = self.policy.logout_after.saturating_sub(self.elapsed(now));
        let secs = remaining.as_secs();
        if remaining.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }
}
