//! Work Budget
//!
//! Caps how many work units run per window (an hour by default). The window
//! starts with the first unit and resets once it has elapsed.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Length of the default budget window
pub const HOURLY: Duration = Duration::from_secs(3600);

/// Counter of work units spent in the current window
#[derive(Debug)]
pub struct WorkBudget {
    /// Window length
    window: Duration,

    /// Usage in the current window
    state: Mutex<BudgetWindow>,
}

#[derive(Debug, Clone, Copy)]
struct BudgetWindow {
    /// Units spent since the window opened
    used: u32,

    /// When the current window closes
    resets_at: Instant,
}

impl WorkBudget {
    /// Budget with an hourly window
    pub fn hourly() -> Self {
        Self::with_window(HOURLY)
    }

    /// Budget with a custom window length
    pub fn with_window(window: Duration) -> Self {
        Self {
            window,
            state: Mutex::new(BudgetWindow {
                used: 0,
                resets_at: Instant::now() + window,
            }),
        }
    }

    /// Spend one unit if `limit` allows it. `None` means unlimited.
    pub fn try_acquire(&self, limit: Option<u32>) -> bool {
        let mut state = self.state.lock();
        let now = Instant::now();

        if now >= state.resets_at {
            state.used = 0;
            state.resets_at = now + self.window;
        }

        if let Some(limit) = limit {
            if state.used >= limit {
                return false;
            }
        }

        state.used = state.used.saturating_add(1);
        true
    }

    /// Units spent in the current window
    pub fn used(&self) -> u32 {
        let state = self.state.lock();
        if Instant::now() >= state.resets_at {
            0
        } else {
            state.used
        }
    }

    /// Time until the current window closes
    pub fn resets_in(&self) -> Duration {
        self.state
            .lock()
            .resets_at
            .saturating_duration_since(Instant::now())
    }
}

impl Default for WorkBudget {
    fn default() -> Self {
        Self::hourly()
    }
}
