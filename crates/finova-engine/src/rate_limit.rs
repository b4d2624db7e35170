//! Per-user fixed-window rate limiter for write operations

use crate::config::RateLimitSettings;
use dashmap::DashMap;
use finova_common::{FinovaError, Result, UserId};

/// Limiter state for one user
struct WindowState {
    count: u32,
    window_start: i64,
}

pub struct RateLimiter {
    max_ops: u32,
    window_ms: i64,
    windows: DashMap<UserId, WindowState>,
}

impl RateLimiter {
    pub fn new(settings: &RateLimitSettings) -> Self {
        Self {
            max_ops: settings.max_ops_per_window,
            window_ms: (settings.window_secs as i64).saturating_mul(1_000).max(1),
            windows: DashMap::new(),
        }
    }

    /// Count one write for `user_id` at `now`
    pub fn check(&self, user_id: &UserId, now: i64) -> Result<()> {
        let mut state = self
            .windows
            .entry(user_id.clone())
            .or_insert_with(|| WindowState {
                count: 0,
                window_start: now,
            });

        // Reset window if expired
        if now - state.window_start >= self.window_ms {
            state.count = 0;
            state.window_start = now;
        }

        if state.count >= self.max_ops {
            let retry_after_ms = (state.window_start + self.window_ms - now).max(1) as u64;
            return Err(FinovaError::RateLimited { retry_after_ms });
        }

        state.count += 1;
        Ok(())
    }
}
