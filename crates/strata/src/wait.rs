//! Wait Mechanisms
//!
//! Bounded polling used by the synchronization step and by the recovery
//! engine's inter-attempt delay. Nothing here sleeps without a bound: every
//! loop checks its own timeout and the caller's overall [`Deadline`] before
//! each iteration.
//!
//! ## Toyota Way Application
//!
//! - **Heijunka**: Fixed polling intervals for predictable test timing
//! - **Jidoka**: Stop at the deadline instead of waiting forever

use crate::result::{StrataError, StrataResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for wait operations (5 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 5_000;

/// Default polling interval (50ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Smallest polling interval honoured, whatever is configured
pub const MIN_POLL_INTERVAL_MS: u64 = 1;

// =============================================================================
// CONDITIONS
// =============================================================================

/// Observable condition the synchronization step polls for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Element exists
    Present,
    /// Element exists and is visible
    Visible,
    /// Element exists and is enabled
    Enabled,
    /// Element text equals the value
    TextEquals(String),
    /// Element text contains the value
    TextContains(String),
    /// Collection has exactly this many members
    Count(usize),
    /// Element does not exist
    Absent,
}

impl Condition {
    /// Whether a timeout on this condition means "transient not-found"
    ///
    /// Presence-style conditions that time out are eligible for recovery;
    /// the others already observed the element and report a mismatch.
    #[must_use]
    pub const fn timeout_is_not_found(&self) -> bool {
        matches!(self, Self::Present | Self::Visible)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present => f.write_str("present"),
            Self::Visible => f.write_str("visible"),
            Self::Enabled => f.write_str("enabled"),
            Self::TextEquals(text) => write!(f, "text == {text:?}"),
            Self::TextContains(text) => write!(f, "text contains {text:?}"),
            Self::Count(n) => write!(f, "count == {n}"),
            Self::Absent => f.write_str("absent"),
        }
    }
}

// =============================================================================
// WAIT OPTIONS
// =============================================================================

/// Options for wait operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitOptions {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WaitOptions {
    /// Create new wait options with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get poll interval as Duration, never below the minimum
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(MIN_POLL_INTERVAL_MS))
    }
}

// =============================================================================
// DEADLINE
// =============================================================================

/// Wall-clock bound checked cooperatively before each attempt and poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
    budget: Duration,
}

impl Deadline {
    /// Deadline `budget` from now
    #[must_use]
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
        }
    }

    /// Time left, zero once expired
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// Whether the deadline has passed
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// The full budget this deadline was created with
    #[must_use]
    pub const fn budget(&self) -> Duration {
        self.budget
    }

    /// Fail with a timeout if expired
    pub fn check(&self) -> StrataResult<()> {
        if self.is_expired() {
            Err(StrataError::Timeout {
                ms: duration_ms(self.budget),
            })
        } else {
            Ok(())
        }
    }

    /// Sleep for `delay`, cut short at the deadline
    pub fn sleep(&self, delay: Duration) {
        let bounded = delay.min(self.remaining());
        if !bounded.is_zero() {
            std::thread::sleep(bounded);
        }
    }

    /// The earlier of this deadline and one `budget` from now
    #[must_use]
    pub fn min_with(&self, budget: Duration) -> Self {
        let other = Self::after(budget);
        if other.at < self.at {
            other
        } else {
            *self
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// =============================================================================
// POLLING
// =============================================================================

/// Result of a wait operation
#[derive(Debug, Clone, PartialEq)]
pub struct WaitResult<T> {
    /// Observed value that satisfied the condition
    pub value: T,
    /// Time spent waiting
    pub elapsed: Duration,
    /// Number of probes performed
    pub polls: u32,
}

/// Outcome of one probe
#[derive(Debug, Clone, PartialEq)]
pub enum Poll<T> {
    /// Condition satisfied
    Ready(T),
    /// Not yet; keep polling
    Pending,
}

/// Why a wait gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitTimeout {
    /// Time spent waiting
    pub elapsed: Duration,
    /// Number of probes performed
    pub polls: u32,
}

/// Poll `probe` until it is ready, the wait times out, or `deadline` passes
///
/// The probe always runs at least once. Probe errors abort the wait
/// immediately.
pub fn poll_until<T, F>(
    options: &WaitOptions,
    deadline: &Deadline,
    mut probe: F,
) -> StrataResult<Result<WaitResult<T>, WaitTimeout>>
where
    F: FnMut() -> StrataResult<Poll<T>>,
{
    let start = Instant::now();
    let bound = deadline.min_with(options.timeout());
    let mut polls = 0;
    loop {
        polls += 1;
        if let Poll::Ready(value) = probe()? {
            return Ok(Ok(WaitResult {
                value,
                elapsed: start.elapsed(),
                polls,
            }));
        }
        if bound.is_expired() {
            return Ok(Err(WaitTimeout {
                elapsed: start.elapsed(),
                polls,
            }));
        }
        bound.sleep(options.poll_interval());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    mod options_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let options = WaitOptions::default();
            assert_eq!(options.timeout(), Duration::from_millis(5_000));
            assert_eq!(options.poll_interval(), Duration::from_millis(50));
        }

        #[test]
        fn test_poll_interval_floor() {
            let options = WaitOptions::new().with_poll_interval(0);
            assert_eq!(options.poll_interval(), Duration::from_millis(1));
        }

        #[test]
        fn test_deserialize_partial() {
            let options: WaitOptions = serde_json::from_str(r#"{"timeout_ms": 200}"#).unwrap();
            assert_eq!(options.timeout_ms, 200);
            assert_eq!(options.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        }
    }

    mod deadline_tests {
        use super::*;

        #[test]
        fn test_expired_deadline() {
            let deadline = Deadline::after(Duration::ZERO);
            assert!(deadline.is_expired());
            assert_eq!(deadline.remaining(), Duration::ZERO);
            assert!(matches!(deadline.check(), Err(StrataError::Timeout { ms: 0 })));
        }

        #[test]
        fn test_min_with_picks_earlier() {
            let long = Deadline::after(Duration::from_secs(60));
            let short = long.min_with(Duration::from_millis(10));
            assert!(short.remaining() <= Duration::from_millis(10));
            let same = short.min_with(Duration::from_secs(60));
            assert_eq!(same, short);
        }

        #[test]
        fn test_sleep_is_bounded() {
            let deadline = Deadline::after(Duration::from_millis(5));
            let start = Instant::now();
            deadline.sleep(Duration::from_secs(5));
            assert!(start.elapsed() < Duration::from_secs(1));
        }
    }

    mod poll_tests {
        use super::*;

        #[test]
        fn test_ready_after_some_polls() {
            let options = WaitOptions::new().with_timeout(1_000).with_poll_interval(1);
            let deadline = Deadline::after(Duration::from_secs(5));
            let mut calls = 0;
            let result = poll_until(&options, &deadline, || {
                calls += 1;
                Ok(if calls >= 3 { Poll::Ready(calls) } else { Poll::Pending })
            })
            .unwrap()
            .unwrap();
            assert_eq!(result.value, 3);
            assert_eq!(result.polls, 3);
        }

        #[test]
        fn test_times_out() {
            let options = WaitOptions::new().with_timeout(20).with_poll_interval(5);
            let deadline = Deadline::after(Duration::from_secs(5));
            let result = poll_until::<(), _>(&options, &deadline, || Ok(Poll::Pending)).unwrap();
            let timeout = result.unwrap_err();
            assert!(timeout.polls >= 1);
            assert!(timeout.elapsed >= Duration::from_millis(20));
        }

        #[test]
        fn test_overall_deadline_caps_wait() {
            let options = WaitOptions::new().with_timeout(60_000).with_poll_interval(5);
            let deadline = Deadline::after(Duration::from_millis(20));
            let start = Instant::now();
            let result = poll_until::<(), _>(&options, &deadline, || Ok(Poll::Pending)).unwrap();
            assert!(result.is_err());
            assert!(start.elapsed() < Duration::from_secs(5));
        }

        #[test]
        fn test_probe_error_aborts() {
            let options = WaitOptions::new().with_timeout(1_000);
            let deadline = Deadline::after(Duration::from_secs(5));
            let mut calls = 0;
            let result = poll_until::<(), _>(&options, &deadline, || {
                calls += 1;
                Err(StrataError::assertion("boom"))
            });
            assert!(result.is_err());
            assert_eq!(calls, 1);
        }

        #[test]
        fn test_probe_runs_once_even_when_expired() {
            let options = WaitOptions::new().with_timeout(0);
            let deadline = Deadline::after(Duration::ZERO);
            let result = poll_until(&options, &deadline, || Ok(Poll::Ready(7))).unwrap();
            assert_eq!(result.unwrap().value, 7);
        }
    }

    #[test]
    fn test_condition_classification() {
        assert!(Condition::Present.timeout_is_not_found());
        assert!(Condition::Visible.timeout_is_not_found());
        assert!(!Condition::Absent.timeout_is_not_found());
        assert!(!Condition::TextEquals("x".into()).timeout_is_not_found());
        assert_eq!(Condition::Count(3).to_string(), "count == 3");
    }
}
