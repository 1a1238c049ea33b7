//! Rate limiting (§5): a global leaky bucket bounding total command
//! invocations per minute per process, plus a per-admin cooldown for
//! administrative commands. Grounded on `rate_limit.rs`'s
//! fixed-window memory counter (`(count, expiry)` per key), stripped of
//! its Redis-primary/axum-middleware shape since this process has no
//! HTTP surface and no multi-process state to share.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::models::MemberId;

/// Outcome of a rate-limit check, carrying enough to build a cooldown
/// error message for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitOutcome {
    Admitted,
    Rejected { retry_after: Duration },
}

struct Window {
    count: u32,
    expiry: Instant,
}

/// Global leaky bucket: at most `limit_per_minute` admissions per rolling
/// one-minute window, shared across the whole process (§5 "per process").
pub struct RateLimiter {
    limit_per_minute: u32,
    window: Mutex<Option<Window>>,
    admin_cooldown: Duration,
    admin_last_use: Mutex<HashMap<MemberId, Instant>>,
}

impl RateLimiter {
    pub fn new(limit_per_minute: u32, admin_cooldown: Duration) -> Self {
        Self {
            limit_per_minute,
            window: Mutex::new(None),
            admin_cooldown,
            admin_last_use: Mutex::new(HashMap::new()),
        }
    }

    /// Checks and consumes one slot of the global bucket. Resets the
    /// window once its minute has elapsed rather than draining gradually;
    /// this matches the fixed-window counter the original memory
    /// fallback already used.
    pub fn check_global(&self) -> RateLimitOutcome {
        let now = Instant::now();
        let mut guard = self.window.lock().expect("lock poisoned");
        match guard.as_mut() {
            Some(window) if now < window.expiry => {
                if window.count >= self.limit_per_minute {
                    RateLimitOutcome::Rejected { retry_after: window.expiry - now }
                } else {
                    window.count += 1;
                    RateLimitOutcome::Admitted
                }
            }
            _ => {
                *guard = Some(Window { count: 1, expiry: now + Duration::from_secs(60) });
                RateLimitOutcome::Admitted
            }
        }
    }

    /// Checks and, if admitted, stamps the per-admin cooldown for
    /// administrative commands (§5 "additional per-user cooldown").
    pub fn check_admin_cooldown(&self, admin: MemberId) -> RateLimitOutcome {
        let now = Instant::now();
        let mut guard = self.admin_last_use.lock().expect("lock poisoned");
        match guard.get(&admin) {
            Some(&last) if now.duration_since(last) < self.admin_cooldown => {
                let remaining = self.admin_cooldown - now.duration_since(last);
                RateLimitOutcome::Rejected { retry_after: remaining }
            }
            _ => {
                guard.insert(admin, now);
                RateLimitOutcome::Admitted
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_the_configured_limit_then_rejects() {
        let limiter = RateLimiter::new(2, Duration::from_secs(300));
        assert_eq!(limiter.check_global(), RateLimitOutcome::Admitted);
        assert_eq!(limiter.check_global(), RateLimitOutcome::Admitted);
        match limiter.check_global() {
            RateLimitOutcome::Rejected { .. } => {}
            RateLimitOutcome::Admitted => panic!("expected the third invocation to be rejected"),
        }
    }

    #[test]
    fn admin_cooldown_blocks_a_second_invocation_within_the_window() {
        let limiter = RateLimiter::new(1000, Duration::from_secs(300));
        let admin = MemberId(7);
        assert_eq!(limiter.check_admin_cooldown(admin), RateLimitOutcome::Admitted);
        match limiter.check_admin_cooldown(admin) {
            RateLimitOutcome::Rejected { .. } => {}
            RateLimitOutcome::Admitted => panic!("expected the second invocation to hit cooldown"),
        }
    }

    #[test]
    fn distinct_admins_have_independent_cooldowns() {
        let limiter = RateLimiter::new(1000, Duration::from_secs(300));
        assert_eq!(limiter.check_admin_cooldown(MemberId(1)), RateLimitOutcome::Admitted);
        assert_eq!(limiter.check_admin_cooldown(MemberId(2)), RateLimitOutcome::Admitted);
    }
}
