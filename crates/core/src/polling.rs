//! Poll budget and the task completion state machine.
//!
//! A submitted task starts in [`PollState::Polling`] and moves to exactly
//! one terminal state: [`PollState::Complete`] or
//! [`PollState::Failed`]. Terminal states absorb every further input.
//! The async driver lives in the client crate; this module only decides
//! transitions.

use std::time::Duration;

use crate::protocol::TaskStatus;

// ---------------------------------------------------------------------------
// Budget
// ---------------------------------------------------------------------------

/// Default number of poll attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;
/// Default pause between two poll attempts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Upper bound on how long and how often a task is polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollBudget {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollBudget {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl PollBudget {
    /// Worst-case total sleep before the poller gives up.
    ///
    /// No sleep follows the final attempt.
    pub fn max_total_sleep(&self) -> Duration {
        self.interval * self.max_attempts.saturating_sub(1)
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Why polling stopped without completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollFailure {
    /// The attempt budget ran out.
    Timeout,
    /// A poll request failed at the transport level.
    Transport,
    /// The caller cancelled between attempts.
    Cancelled,
}

/// Where a task stands from the poller's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Still waiting; `attempts_made` polls have been issued so far.
    Polling { attempts_made: u32 },
    /// The service reported the task as finished.
    Complete,
    /// Polling ended without a result.
    Failed(PollFailure),
}

impl PollState {
    /// Initial state right after a successful submission.
    ///
    /// A zero-attempt budget is already exhausted.
    pub fn start(budget: &PollBudget) -> Self {
        if budget.max_attempts == 0 {
            PollState::Failed(PollFailure::Timeout)
        } else {
            PollState::Polling { attempts_made: 0 }
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollState::Polling { .. })
    }

    /// Number of polls issued so far, if still polling.
    pub fn attempts_made(&self) -> Option<u32> {
        match self {
            PollState::Polling { attempts_made } => Some(*attempts_made),
            _ => None,
        }
    }

    /// Apply the status returned by one poll attempt.
    pub fn on_status(self, status: &TaskStatus, budget: &PollBudget) -> Self {
        let PollState::Polling { attempts_made } = self else {
            return self;
        };
        let attempts_made = attempts_made + 1;
        if status.is_complete {
            PollState::Complete
        } else if attempts_made >= budget.max_attempts {
            PollState::Failed(PollFailure::Timeout)
        } else {
            PollState::Polling { attempts_made }
        }
    }

    /// A poll request failed. Not retried.
    pub fn on_transport_error(self) -> Self {
        match self {
            PollState::Polling { .. } => PollState::Failed(PollFailure::Transport),
            terminal => terminal,
        }
    }

    /// The caller asked to stop.
    pub fn on_cancel(self) -> Self {
        match self {
            PollState::Polling { .. } => PollState::Failed(PollFailure::Cancelled),
            terminal => terminal,
        }
    }
}
