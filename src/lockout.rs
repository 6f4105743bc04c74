//! Account Lockout Policy
//!
//! Pure decision logic over the attempt history carried on a [`User`]
//! record. Callers mutate a loaded record through these functions and then
//! persist it; nothing here touches storage or the clock directly, which
//! keeps the policy deterministic under test.

use crate::models::User;
use chrono::{DateTime, Duration, Utc};

/// Lockout thresholds, taken from [`crate::config::AuthConfig`]
#[derive(Debug, Clone, Copy)]
pub struct LockoutPolicy {
    /// Consecutive failures that trip a lock
    pub max_attempts: i32,
    /// How long a tripped lock holds, in seconds
    pub lockout_duration: i64,
}

impl LockoutPolicy {
    pub fn new(max_attempts: i32, lockout_duration: i64) -> Self {
        Self {
            max_attempts,
            lockout_duration,
        }
    }
}

/// Whether the record is locked at `now`.
///
/// A `lock_until` in the past is equivalent to "not locked": locks expire
/// lazily and every consumer re-derives this predicate on read rather than
/// relying on the stored field having been swept.
pub fn is_locked(user: &User, now: DateTime<Utc>) -> bool {
    user.lock_until.map_or(false, |until| until > now)
}

/// Register a failed password check.
///
/// Returns `true` when this failure tripped the lock. A lock that has
/// already elapsed is treated as cleared and the counter restarts at 1
/// instead of incrementing the stale count.
pub fn record_failure(user: &mut User, now: DateTime<Utc>, policy: &LockoutPolicy) -> bool {
    if user.lock_until.is_some() && !is_locked(user, now) {
        user.lock_until = None;
        user.login_attempts = 1;
        return false;
    }

    user.login_attempts += 1;

    if user.lock_until.is_none() && user.login_attempts >= policy.max_attempts {
        // The counter is deliberately not reset when the lock trips.
        user.lock_until = Some(now + Duration::seconds(policy.lockout_duration));
        return true;
    }

    false
}

/// Register a successful password check: both counter and lock clear
/// unconditionally.
pub fn record_success(user: &mut User) {
    user.login_attempts = 0;
    user.lock_until = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{UserRole, UserStatus};
    use uuid::Uuid;

    fn policy() -> LockoutPolicy {
        LockoutPolicy::new(5, 7200)
    }

    fn user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "a@x.com".to_string(),
            password_hash: "hash".to_string(),
            role: UserRole::User,
            status: UserStatus::Active,
            first_name: None,
            last_name: None,
            university: None,
            graduation_year: None,
            phone: None,
            linkedin_url: None,
            refresh_tokens: Vec::new(),
            login_attempts: 0,
            lock_until: None,
            last_login: None,
            password_reset_token: None,
            password_reset_expires: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_fifth_failure_trips_lock() {
        let mut u = user();
        let now = Utc::now();

        for i in 1..=4 {
            assert!(!record_failure(&mut u, now, &policy()));
            assert_eq!(u.login_attempts, i);
            assert!(!is_locked(&u, now));
        }

        assert!(record_failure(&mut u, now, &policy()));
        assert_eq!(u.login_attempts, 5);
        assert!(is_locked(&u, now));
        // Lock holds for the configured duration, not longer.
        assert!(is_locked(&u, now + Duration::seconds(7199)));
        assert!(!is_locked(&u, now + Duration::seconds(7201)));
    }

    #[test]
    fn test_counter_not_reset_when_lock_trips() {
        let mut u = user();
        let now = Utc::now();
        for _ in 0..5 {
            record_failure(&mut u, now, &policy());
        }
        assert_eq!(u.login_attempts, 5);
        assert!(u.lock_until.is_some());
    }

    #[test]
    fn test_failure_while_locked_does_not_extend_lock() {
        let mut u = user();
        let now = Utc::now();
        for _ in 0..5 {
            record_failure(&mut u, now, &policy());
        }
        let locked_until = u.lock_until;

        assert!(!record_failure(&mut u, now + Duration::minutes(1), &policy()));
        assert_eq!(u.lock_until, locked_until);
        assert_eq!(u.login_attempts, 6);
    }

    #[test]
    fn test_expired_lock_restarts_counter_at_one() {
        let mut u = user();
        let now = Utc::now();
        for _ in 0..5 {
            record_failure(&mut u, now, &policy());
        }

        // Next failure after the lock elapses restarts at 1, not 6.
        let later = now + Duration::seconds(7201);
        assert!(!record_failure(&mut u, later, &policy()));
        assert_eq!(u.login_attempts, 1);
        assert!(u.lock_until.is_none());
        assert!(!is_locked(&u, later));
    }

    #[test]
    fn test_success_clears_counter_and_lock() {
        let mut u = user();
        let now = Utc::now();
        for _ in 0..5 {
            record_failure(&mut u, now, &policy());
        }

        record_success(&mut u);
        assert_eq!(u.login_attempts, 0);
        assert!(u.lock_until.is_none());
    }

    #[test]
    fn test_stale_lock_is_not_locked_on_read() {
        let mut u = user();
        let now = Utc::now();
        u.lock_until = Some(now - Duration::seconds(1));
        assert!(!is_locked(&u, now));
    }
}
