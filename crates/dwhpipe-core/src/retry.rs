//! Fixed-interval polling against a remote resource
//!
//! [`poll_until`] repeatedly fetches the current state of something the
//! provider changes asynchronously, and stops when:
//! - the state satisfies the caller's predicate,
//! - the resource is reported absent,
//! - the fetch itself fails, or
//! - the attempt budget of the [`RetryPolicy`] is spent.
//!
//! Sleeping goes through the [`Sleeper`] trait so tests can count naps
//! instead of waiting for them.

use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::debug;

/// How often and how long to poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Pause between two fetches
    pub interval: Duration,

    /// Upper bound on fetches (always at least one)
    pub max_attempts: u32,

    /// Whether a vanished resource ends the wait successfully
    pub absent_is_success: bool,
}

impl RetryPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
            absent_is_success: false,
        }
    }

    /// Derive the attempt count from a total wait budget
    ///
    /// A 900s budget at a 30s interval gives 30 attempts.
    pub fn from_budget(total: Duration, interval: Duration) -> Self {
        let attempts = if interval.is_zero() {
            1
        } else {
            (total.as_nanos() / interval.as_nanos()).min(u32::MAX as u128) as u32
        };
        Self::new(interval, attempts)
    }

    /// Treat "not found" as the goal, as when waiting for a deletion
    pub fn with_absent_as_success(mut self, absent_is_success: bool) -> Self {
        self.absent_is_success = absent_is_success;
        self
    }

    /// Longest time spent sleeping before the budget runs out
    pub fn max_wait(&self) -> Duration {
        self.interval * self.max_attempts.saturating_sub(1)
    }
}

/// How a poll ended
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T, E> {
    /// The predicate matched this observation
    Reached(T),

    /// The resource was not found; `success` mirrors the policy
    Absent { last: Option<T>, success: bool },

    /// Budget spent without a match
    Exhausted(Option<T>),

    /// A fetch failed for a reason other than absence
    Failed { last: Option<T>, error: E },
}

impl<T, E> PollOutcome<T, E> {
    pub fn is_success(&self) -> bool {
        match self {
            Self::Reached(_) => true,
            Self::Absent { success, .. } => *success,
            Self::Exhausted(_) | Self::Failed { .. } => false,
        }
    }

    /// The matching observation, if the predicate was met
    pub fn reached(self) -> Option<T> {
        match self {
            Self::Reached(value) => Some(value),
            _ => None,
        }
    }

    /// The most recent observation, matching or not
    pub fn last(&self) -> Option<&T> {
        match self {
            Self::Reached(value) => Some(value),
            Self::Absent { last, .. } | Self::Exhausted(last) | Self::Failed { last, .. } => {
                last.as_ref()
            }
        }
    }

    pub fn into_last(self) -> Option<T> {
        match self {
            Self::Reached(value) => Some(value),
            Self::Absent { last, .. } | Self::Exhausted(last) | Self::Failed { last, .. } => last,
        }
    }
}

/// Result of [`poll_until`] together with the number of fetches made
#[derive(Debug, Clone, PartialEq)]
pub struct Polled<T, E> {
    pub outcome: PollOutcome<T, E>,
    pub attempts: u32,
}

/// Something that can pause the current task
#[async_trait::async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait::async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Records requested naps and returns immediately
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    naps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every duration passed to `sleep`, in order
    pub async fn naps(&self) -> Vec<Duration> {
        self.naps.lock().await.clone()
    }

    pub async fn nap_count(&self) -> usize {
        self.naps.lock().await.len()
    }

    /// Simulated time spent sleeping
    pub async fn total(&self) -> Duration {
        self.naps.lock().await.iter().sum()
    }
}

#[async_trait::async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.naps.lock().await.push(duration);
    }
}

/// Fetch until `is_done` holds, the resource vanishes, a fetch fails, or the
/// policy's attempts are spent.
///
/// `fetch` returns `Ok(None)` when the resource does not exist. No sleep
/// follows the final attempt.
pub async fn poll_until<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    mut fetch: F,
    mut is_done: P,
) -> Polled<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
    P: FnMut(&T) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last = None;

    for attempt in 1..=max_attempts {
        match fetch().await {
            Ok(Some(value)) => {
                if is_done(&value) {
                    debug!(attempt, "poll target reached");
                    return Polled {
                        outcome: PollOutcome::Reached(value),
                        attempts: attempt,
                    };
                }
                last = Some(value);
            }
            Ok(None) => {
                debug!(attempt, success = policy.absent_is_success, "polled resource is absent");
                return Polled {
                    outcome: PollOutcome::Absent {
                        last,
                        success: policy.absent_is_success,
                    },
                    attempts: attempt,
                };
            }
            Err(error) => {
                debug!(attempt, "poll fetch failed");
                return Polled {
                    outcome: PollOutcome::Failed { last, error },
                    attempts: attempt,
                };
            }
        }

        if attempt < max_attempts {
            debug!(
                attempt,
                max_attempts,
                interval_secs = policy.interval.as_secs(),
                "poll target not reached yet"
            );
            sleeper.sleep(policy.interval).await;
        }
    }

    Polled {
        outcome: PollOutcome::Exhausted(last),
        attempts: max_attempts,
    }
}
