//! Per-identity lockout state machine.
//!
//! The state is persisted on the identity row (`failed_login_attempts`,
//! `locked_until`); this module only decides transitions. Stores apply
//! [`LockoutPolicy::register_failure`] while holding the row lock so that
//! concurrent failures for one account are never lost.

use chrono::{DateTime, Duration, Utc};

/// Failed attempts that trigger a lock.
pub const DEFAULT_LOCKOUT_THRESHOLD: u32 = 5;

/// How long a lock lasts.
pub const DEFAULT_LOCKOUT_MINUTES: i64 = 30;

/// Lockout state of one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockoutState {
    Unlocked { attempts: u32 },
    Locked { until: DateTime<Utc> },
}

impl LockoutState {
    /// Fold an expired lock back into `Unlocked(0)`.
    pub fn normalize(self, now: DateTime<Utc>) -> Self {
        match self {
            LockoutState::Locked { until } if now >= until => {
                LockoutState::Unlocked { attempts: 0 }
            }
            other => other,
        }
    }

    /// Persisted column values: `(failed_login_attempts, locked_until)`.
    ///
    /// A lock keeps the attempt count that caused it so the row still shows
    /// why it is locked; it is cleared again by [`normalize`](Self::normalize).
    pub fn to_columns(self, threshold: u32) -> (u32, Option<DateTime<Utc>>) {
        match self {
            LockoutState::Unlocked { attempts } => (attempts, None),
            LockoutState::Locked { until } => (threshold, Some(until)),
        }
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, LockoutState::Locked { .. })
    }
}

/// Outcome of checking a login attempt against the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptGate {
    /// Evaluate the password normally.
    Proceed,
    /// Reject without looking at the password.
    Locked { until: DateTime<Utc> },
}

/// Threshold and duration for account lockout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    pub threshold: u32,
    pub duration: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_LOCKOUT_THRESHOLD,
            duration: Duration::minutes(DEFAULT_LOCKOUT_MINUTES),
        }
    }
}

impl LockoutPolicy {
    /// Decide whether an attempt may proceed to the password check.
    pub fn gate(&self, state: LockoutState, now: DateTime<Utc>) -> AttemptGate {
        match state.normalize(now) {
            LockoutState::Locked { until } => AttemptGate::Locked { until },
            LockoutState::Unlocked { .. } => AttemptGate::Proceed,
        }
    }

    /// Transition after a failed password check.
    ///
    /// An active lock is returned untouched; an expired one counts from zero.
    pub fn register_failure(&self, state: LockoutState, now: DateTime<Utc>) -> LockoutState {
        match state.normalize(now) {
            locked @ LockoutState::Locked { .. } => locked,
            LockoutState::Unlocked { attempts } => {
                let attempts = attempts.saturating_add(1);
                if attempts >= self.threshold {
                    LockoutState::Locked {
                        until: now + self.duration,
                    }
                } else {
                    LockoutState::Unlocked { attempts }
                }
            }
        }
    }

    /// Transition after a successful login, from any state.
    pub fn register_success(&self) -> LockoutState {
        LockoutState::Unlocked { attempts: 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn five_failures_lock_for_thirty_minutes() {
        let policy = LockoutPolicy::default();
        let mut state = LockoutState::Unlocked { attempts: 0 };
        for expected in 1..5 {
            state = policy.register_failure(state, now());
            assert_eq!(state, LockoutState::Unlocked { attempts: expected });
        }
        state = policy.register_failure(state, now());
        assert_eq!(
            state,
            LockoutState::Locked {
                until: now() + Duration::minutes(30)
            }
        );
    }

    #[test]
    fn locked_state_rejects_until_expiry() {
        let policy = LockoutPolicy::default();
        let until = now() + Duration::minutes(30);
        let state = LockoutState::Locked { until };

        assert_eq!(policy.gate(state, now()), AttemptGate::Locked { until });
        assert_eq!(
            policy.gate(state, until - Duration::seconds(1)),
            AttemptGate::Locked { until }
        );
        assert_eq!(policy.gate(state, until), AttemptGate::Proceed);
    }

    #[test]
    fn failure_while_locked_leaves_lock_untouched() {
        let policy = LockoutPolicy::default();
        let until = now() + Duration::minutes(10);
        let state = LockoutState::Locked { until };
        assert_eq!(policy.register_failure(state, now()), state);
    }

    #[test]
    fn failure_after_expired_lock_counts_from_one() {
        let policy = LockoutPolicy::default();
        let state = LockoutState::Locked {
            until: now() - Duration::seconds(1),
        };
        assert_eq!(
            policy.register_failure(state, now()),
            LockoutState::Unlocked { attempts: 1 }
        );
    }

    #[test]
    fn success_resets_from_any_state() {
        let policy = LockoutPolicy::default();
        assert_eq!(
            policy.register_success(),
            LockoutState::Unlocked { attempts: 0 }
        );
    }

    #[test]
    fn column_mapping() {
        let until = now();
        assert_eq!(
            LockoutState::Unlocked { attempts: 3 }.to_columns(5),
            (3, None)
        );
        assert_eq!(
            LockoutState::Locked { until }.to_columns(5),
            (5, Some(until))
        );
    }

    #[test]
    fn custom_threshold() {
        let policy = LockoutPolicy {
            threshold: 2,
            duration: Duration::minutes(1),
        };
        let state = policy.register_failure(LockoutState::Unlocked { attempts: 0 }, now());
        let state = policy.register_failure(state, now());
        assert!(state.is_locked());
    }
}
