//! Engine Configuration
//!
//! Retry budgets, delays, timeouts and the viewport breakpoint table are
//! supplied by the caller; the engine only reads them.

use crate::capabilities::BreakpointTable;
use crate::result::{StrataError, StrataResult};
use crate::wait::WaitOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default attempts each node contributes to recovery
pub const DEFAULT_MAX_ATTEMPTS_PER_NODE: u32 = 3;

/// Default delay between recovery attempts (100ms)
pub const DEFAULT_INTER_ATTEMPT_DELAY_MS: u64 = 100;

/// Default wall-clock bound for one interaction (30 seconds)
pub const DEFAULT_OVERALL_TIMEOUT_MS: u64 = 30_000;

/// How per-node retry budgets combine along the ancestor chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetCombination {
    /// Every ancestor retry re-arms the budgets below it (product of budgets)
    #[default]
    Multiplicative,
    /// Budgets are spent once; escalation does not re-arm lower levels
    Additive,
}

impl BudgetCombination {
    /// Upper bound on low-level attempts for a path of per-node budgets
    ///
    /// Multiplicative: the product of budgets. Additive: the first attempt
    /// plus every node's retries, `1 + sum(b - 1)`.
    #[must_use]
    pub fn max_attempts(&self, budgets: &[u32]) -> u64 {
        if budgets.is_empty() {
            return 1;
        }
        match self {
            Self::Multiplicative => budgets
                .iter()
                .map(|b| u64::from(*b))
                .fold(1_u64, u64::saturating_mul),
            Self::Additive => {
                1 + budgets
                    .iter()
                    .map(|b| u64::from(b.saturating_sub(1)))
                    .sum::<u64>()
            }
        }
    }
}

/// Configuration consumed by the execution and recovery engines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Attempts each node contributes before escalating to its parent
    pub max_attempts_per_node: u32,
    /// Delay between recovery attempts in milliseconds
    pub inter_attempt_delay_ms: u64,
    /// Wall-clock bound for one interaction in milliseconds
    pub overall_timeout_ms: u64,
    /// Synchronization step timing
    pub wait: WaitOptions,
    /// Viewport breakpoint table
    pub breakpoints: BreakpointTable,
    /// Budget combination along the ancestor chain
    pub budget_combination: BudgetCombination,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_attempts_per_node: DEFAULT_MAX_ATTEMPTS_PER_NODE,
            inter_attempt_delay_ms: DEFAULT_INTER_ATTEMPT_DELAY_MS,
            overall_timeout_ms: DEFAULT_OVERALL_TIMEOUT_MS,
            wait: WaitOptions::default(),
            breakpoints: BreakpointTable::default(),
            budget_combination: BudgetCombination::default(),
        }
    }
}

impl EngineConfig {
    /// Create a config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Short timeouts and no delay, for tests against mock backends
    #[must_use]
    pub fn fast() -> Self {
        Self {
            inter_attempt_delay_ms: 0,
            overall_timeout_ms: 5_000,
            wait: WaitOptions::new().with_timeout(50).with_poll_interval(1),
            ..Self::default()
        }
    }

    /// Parse and validate a YAML config
    pub fn from_yaml(yaml: &str) -> StrataResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON config
    pub fn from_json(json: &str) -> StrataResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file, choosing the format by extension
    pub fn from_path(path: impl AsRef<Path>) -> StrataResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&text),
            Some("yaml" | "yml") => Self::from_yaml(&text),
            other => Err(StrataError::config(format!(
                "unsupported config extension {:?} for {}",
                other.unwrap_or(""),
                path.display()
            ))),
        }
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> StrataResult<()> {
        if self.max_attempts_per_node == 0 {
            return Err(StrataError::config("max_attempts_per_node must be at least 1"));
        }
        if self.wait.poll_interval_ms == 0 {
            return Err(StrataError::config("wait.poll_interval_ms must be positive"));
        }
        if self.wait.poll_interval_ms > self.wait.timeout_ms {
            return Err(StrataError::config(format!(
                "wait.poll_interval_ms ({}) exceeds wait.timeout_ms ({})",
                self.wait.poll_interval_ms, self.wait.timeout_ms
            )));
        }
        if self.overall_timeout_ms == 0 {
            return Err(StrataError::config("overall_timeout_ms must be positive"));
        }
        self.breakpoints.validate()
    }

    /// Set the per-node attempt budget
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts_per_node = attempts;
        self
    }

    /// Set the inter-attempt delay
    #[must_use]
    pub const fn with_inter_attempt_delay(mut self, delay_ms: u64) -> Self {
        self.inter_attempt_delay_ms = delay_ms;
        self
    }

    /// Set the overall timeout
    #[must_use]
    pub const fn with_overall_timeout(mut self, timeout_ms: u64) -> Self {
        self.overall_timeout_ms = timeout_ms;
        self
    }

    /// Set synchronization timing
    #[must_use]
    pub const fn with_wait(mut self, wait: WaitOptions) -> Self {
        self.wait = wait;
        self
    }

    /// Set the breakpoint table
    #[must_use]
    pub fn with_breakpoints(mut self, breakpoints: BreakpointTable) -> Self {
        self.breakpoints = breakpoints;
        self
    }

    /// Set the budget combination
    #[must_use]
    pub const fn with_budget_combination(mut self, combination: BudgetCombination) -> Self {
        self.budget_combination = combination;
        self
    }

    /// Inter-attempt delay as Duration
    #[must_use]
    pub const fn inter_attempt_delay(&self) -> Duration {
        Duration::from_millis(self.inter_attempt_delay_ms)
    }

    /// Overall timeout as Duration
    #[must_use]
    pub const fn overall_timeout(&self) -> Duration {
        Duration::from_millis(self.overall_timeout_ms)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;

    mod combination_tests {
        use super::*;

        #[test]
        fn test_multiplicative_is_product() {
            assert_eq!(BudgetCombination::Multiplicative.max_attempts(&[3, 3, 3]), 27);
            assert_eq!(BudgetCombination::Multiplicative.max_attempts(&[2, 5]), 10);
        }

        #[test]
        fn test_additive_is_sum_of_retries() {
            assert_eq!(BudgetCombination::Additive.max_attempts(&[3, 3, 3]), 7);
            assert_eq!(BudgetCombination::Additive.max_attempts(&[3]), 3);
        }

        #[test]
        fn test_empty_path_allows_one_attempt() {
            assert_eq!(BudgetCombination::Multiplicative.max_attempts(&[]), 1);
            assert_eq!(BudgetCombination::Additive.max_attempts(&[]), 1);
        }
    }

    mod loading_tests {
        use super::*;

        #[test]
        fn test_defaults_are_valid() {
            assert!(EngineConfig::default().validate().is_ok());
            assert!(EngineConfig::fast().validate().is_ok());
        }

        #[test]
        fn test_from_yaml_partial() {
            let config = EngineConfig::from_yaml(
                "max_attempts_per_node: 2\nbudget_combination: additive\nwait:\n  timeout_ms: 1000\n",
            )
            .unwrap();
            assert_eq!(config.max_attempts_per_node, 2);
            assert_eq!(config.budget_combination, BudgetCombination::Additive);
            assert_eq!(config.wait.timeout_ms, 1000);
            assert_eq!(config.wait.poll_interval_ms, 50);
            assert_eq!(config.overall_timeout_ms, DEFAULT_OVERALL_TIMEOUT_MS);
        }

        #[test]
        fn test_from_json_custom_breakpoints() {
            let config = EngineConfig::from_json(
                r#"{"breakpoints": [{"name": "phone", "min_width": 0}, {"name": "wide", "min_width": 1000}]}"#,
            )
            .unwrap();
            assert_eq!(config.breakpoints.classify(1200), "wide");
        }

        #[test]
        fn test_rejects_zero_budget() {
            assert!(EngineConfig::from_yaml("max_attempts_per_node: 0").is_err());
        }

        #[test]
        fn test_rejects_poll_longer_than_timeout() {
            let config = EngineConfig::default()
                .with_wait(WaitOptions::new().with_timeout(10).with_poll_interval(100));
            assert!(config.validate().is_err());
        }

        #[test]
        fn test_from_path() {
            let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
            writeln!(file, "inter_attempt_delay_ms: 0").unwrap();
            let config = EngineConfig::from_path(file.path()).unwrap();
            assert_eq!(config.inter_attempt_delay(), Duration::ZERO);
        }

        #[test]
        fn test_from_path_unknown_extension() {
            let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
            let err = EngineConfig::from_path(file.path()).unwrap_err();
            assert!(matches!(err, StrataError::Config { .. }));
        }

        #[test]
        fn test_from_path_missing_file() {
            let err = EngineConfig::from_path("/nonexistent/strata.yaml").unwrap_err();
            assert!(matches!(err, StrataError::Io(_)));
        }
    }
}
