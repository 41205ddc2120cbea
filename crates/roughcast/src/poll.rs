//! Retry-until-predicate driver, decoupled from any particular timer.
//!
//! The external diagramming library renders on its own schedule without a completion signal, so
//! the page re-runs its selection pass periodically. [`retry_until`] owns that loop; the waiting
//! itself is delegated to a [`Scheduler`] so hosts (and tests) can substitute their own clock, or
//! later an event-driven wake-up.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Cooperative stop signal shared between the poll loop and its host.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

pub trait Scheduler {
    fn wait(&mut self, period: Duration);
}

/// Blocks the current thread for each period.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadScheduler;

impl Scheduler for ThreadScheduler {
    fn wait(&mut self, period: Duration) {
        std::thread::sleep(period);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub period: Duration,
    /// `None` retries for as long as the stop handle allows.
    pub max_attempts: Option<usize>,
}

impl RetryPolicy {
    pub fn every(period: Duration) -> Self {
        Self {
            period,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    Satisfied { attempts: usize },
    Stopped { attempts: usize },
    Exhausted { attempts: usize },
}

impl RetryOutcome {
    pub fn attempts(self) -> usize {
        match self {
            Self::Satisfied { attempts } | Self::Stopped { attempts } | Self::Exhausted { attempts } => {
                attempts
            }
        }
    }
}

/// Runs `attempt` immediately and then once per period until it returns `true`, the stop handle
/// fires, or the policy's attempt budget is spent. `attempt` receives the 1-based attempt number.
pub fn retry_until<S, F>(
    policy: &RetryPolicy,
    scheduler: &mut S,
    stop: &StopHandle,
    mut attempt: F,
) -> RetryOutcome
where
    S: Scheduler + ?Sized,
    F: FnMut(usize) -> bool,
{
    let mut attempts = 0usize;
    loop {
        if stop.is_stopped() {
            return RetryOutcome::Stopped { attempts };
        }
        attempts += 1;
        if attempt(attempts) {
            return RetryOutcome::Satisfied { attempts };
        }
        if policy.max_attempts.is_some_and(|max| attempts >= max) {
            return RetryOutcome::Exhausted { attempts };
        }
        scheduler.wait(policy.period);
    }
}
