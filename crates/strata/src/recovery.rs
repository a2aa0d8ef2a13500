//! Retry & Recovery Engine
//!
//! Layers bounded, hierarchy-aware retries over the execution pipeline.
//! The policy is an explicit state machine: an attempt ledger over the
//! target's ancestor chain, the error class reported by
//! [`StrataError::class`], and an escalation anchor.
//!
//! ```text
//!   attempt ──ok──────────────────────────────► Succeeded
//!      │
//!      ├─ structural / non-recoverable / assertion ──► FailedNonRecoverable
//!      │
//!      └─ recoverable ─► charge ledger ─┬─ exhausted ─► FailedRecoverableExhausted
//!                                       └─ retry from parent of charged level
//! ```
//!
//! ## Toyota Way Application
//!
//! - **Jidoka**: Non-recoverable failures stop the line on the first attempt
//! - **Kaizen**: Every failed attempt is recorded in the report for diagnosis

use crate::capabilities::Capabilities;
use crate::config::{BudgetCombination, EngineConfig};
use crate::pipeline::{ExecutionPipeline, Operation, Outcome};
use crate::result::{ErrorClass, RecoverableKind, StrataError};
use crate::structure::{Node, NodeId, NodeRef, StructureTree};
use crate::wait::Deadline;
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, info_span, warn};

// =============================================================================
// RETRY LEDGER
// =============================================================================

/// Ledger decision after a recoverable failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charge {
    /// Retry, re-walking from the parent of this level
    RetryFrom(NodeId),
    /// Every budget on the path is spent
    Exhausted,
}

/// Per-node attempt counters along a target's ancestor chain
///
/// Levels run target-first up to, excluding, the surface root. Each level
/// carries its own budget. Charging a level that has spent its budget
/// carries into the level above, like an odometer.
#[derive(Debug, Clone)]
pub struct RetryLedger {
    levels: Vec<NodeId>,
    budgets: Vec<u32>,
    spent: Vec<u32>,
    combination: BudgetCombination,
}

impl RetryLedger {
    /// Create a ledger for `target`
    #[must_use]
    pub fn new(tree: &StructureTree, target: NodeId, config: &EngineConfig) -> Self {
        let mut levels = tree.path_to_root(target);
        if levels.is_empty() {
            levels.push(target);
        }
        let budgets: Vec<u32> = levels
            .iter()
            .map(|node| {
                tree.get(*node)
                    .ok()
                    .and_then(Node::retry_budget)
                    .unwrap_or(config.max_attempts_per_node)
                    .max(1)
            })
            .collect();
        Self {
            spent: vec![0; levels.len()],
            levels,
            budgets,
            combination: config.budget_combination,
        }
    }

    /// Levels, target first
    #[must_use]
    pub fn levels(&self) -> &[NodeId] {
        &self.levels
    }

    /// Budget of each level, target first
    #[must_use]
    pub fn budgets(&self) -> &[u32] {
        &self.budgets
    }

    /// Upper bound on attempts before exhaustion
    #[must_use]
    pub fn max_attempts(&self) -> u64 {
        self.combination.max_attempts(&self.budgets)
    }

    /// Record a recoverable failure at `failing` and decide what happens next
    ///
    /// A failure at a node off the path is charged to the target level.
    pub fn charge(&mut self, failing: NodeId) -> Charge {
        let mut level = self
            .levels
            .iter()
            .position(|node| *node == failing)
            .unwrap_or(0);
        while level < self.levels.len() {
            match self.combination {
                BudgetCombination::Multiplicative => {
                    for lower in &mut self.spent[..level] {
                        *lower = 0;
                    }
                }
                BudgetCombination::Additive => {
                    if self.spent[level] >= self.budgets[level] {
                        level += 1;
                        continue;
                    }
                }
            }
            self.spent[level] += 1;
            if self.spent[level] < self.budgets[level] {
                return Charge::RetryFrom(self.levels[level]);
            }
            if self.combination == BudgetCombination::Multiplicative {
                self.spent[level] = 0;
            }
            level += 1;
        }
        Charge::Exhausted
    }
}

// =============================================================================
// REPORTING
// =============================================================================

/// Terminal state of one interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalState {
    /// The operation completed
    Succeeded,
    /// Only recoverable failures occurred, and the budget or deadline ran out
    FailedRecoverableExhausted,
    /// A failure that is never retried occurred
    FailedNonRecoverable,
}

impl fmt::Display for TerminalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Succeeded => "succeeded",
            Self::FailedRecoverableExhausted => "failed (recoverable exhausted)",
            Self::FailedNonRecoverable => "failed (non-recoverable)",
        };
        f.write_str(name)
    }
}

/// Why recovery stopped retrying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustionReason {
    /// Every attempt budget along the path was spent
    Budget,
    /// The overall timeout elapsed
    Deadline,
}

impl fmt::Display for ExhaustionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Budget => f.write_str("retry budget exhausted"),
            Self::Deadline => f.write_str("overall timeout elapsed"),
        }
    }
}

/// One failed attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    /// Attempt number, starting at 1
    pub attempt: u32,
    /// Structural path of the failing node
    pub path: String,
    /// Error class
    pub class: ErrorClass,
    /// Recoverable kind, if any
    pub kind: Option<RecoverableKind>,
    /// Path the next attempt re-walked from, if it was retried
    pub anchor: Option<String>,
    /// Error message
    pub message: String,
}

/// Diagnostic record of one interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    /// How the interaction ended
    pub state: TerminalState,
    /// Pipeline attempts made
    pub attempts: u32,
    /// Invalidate-and-retry cycles performed
    pub recoveries: u32,
    /// Failed attempts, oldest first
    pub history: Vec<AttemptRecord>,
    /// Wall-clock time spent
    pub elapsed: Duration,
}

/// Final failure surfaced to the caller
#[derive(Debug, Error)]
pub enum FinalError {
    /// Recoverable failures only, but nothing left to spend
    #[error("{reason} at {path} after {attempts} attempts: {source}")]
    RecoverableExhausted {
        /// Path of the last failing node
        path: String,
        /// Attempts made
        attempts: u32,
        /// Budget or deadline
        reason: ExhaustionReason,
        /// Last recoverable failure
        source: Box<StrataError>,
    },

    /// A failure that is never retried
    #[error("failed at {path} on attempt {attempts}: {source}")]
    NonRecoverable {
        /// Path of the failing node
        path: String,
        /// Attempts made
        attempts: u32,
        /// The failure
        source: Box<StrataError>,
    },
}

impl FinalError {
    /// Wrap a failure that is surfaced without retry
    #[must_use]
    pub fn non_recoverable(path: impl Into<String>, attempts: u32, source: StrataError) -> Self {
        Self::NonRecoverable {
            path: path.into(),
            attempts,
            source: Box::new(source),
        }
    }

    /// Path of the failing node
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::RecoverableExhausted { path, .. } | Self::NonRecoverable { path, .. } => path,
        }
    }

    /// Attempts made before giving up
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::RecoverableExhausted { attempts, .. } | Self::NonRecoverable { attempts, .. } => {
                *attempts
            }
        }
    }

    /// Underlying failure
    #[must_use]
    pub fn cause(&self) -> &StrataError {
        match self {
            Self::RecoverableExhausted { source, .. } | Self::NonRecoverable { source, .. } => source,
        }
    }

    /// Class of the underlying failure
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        self.cause().class()
    }

    /// Whether the budget or deadline ran out on recoverable failures
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        matches!(self, Self::RecoverableExhausted { .. })
    }
}

/// Result of one interaction plus its diagnostic report
#[derive(Debug)]
pub struct RecoveryRun {
    /// Outcome or final failure
    pub result: Result<Outcome, FinalError>,
    /// What happened along the way
    pub report: RecoveryReport,
}

impl RecoveryRun {
    /// Discard the report
    pub fn into_result(self) -> Result<Outcome, FinalError> {
        self.result
    }
}

// =============================================================================
// ENGINE
// =============================================================================

/// Bounded retry policy over the execution pipeline
#[derive(Debug, Clone, Copy)]
pub struct RecoveryEngine<'c> {
    config: &'c EngineConfig,
}

impl<'c> RecoveryEngine<'c> {
    /// Create an engine reading budgets and delays from `config`
    #[must_use]
    pub const fn new(config: &'c EngineConfig) -> Self {
        Self { config }
    }

    /// Run `operation` on `node`, recovering from transient failures
    pub fn run_with_recovery(
        &self,
        pipeline: &mut ExecutionPipeline<'_>,
        node: NodeRef,
        operation: &Operation,
        capabilities: &Capabilities,
        deadline: &Deadline,
    ) -> RecoveryRun {
        let tree = pipeline.tree();
        let target = node.node;
        let target_path = tree.path(target);
        let span = info_span!("recovery", node = %target_path, operation = %operation);
        let _guard = span.enter();

        let started = Instant::now();
        let mut ledger = RetryLedger::new(tree, target, self.config);
        let mut attempts = 0_u32;
        let mut recoveries = 0_u32;
        let mut history = Vec::new();
        let mut last: Option<StrataError> = None;

        let result = loop {
            if deadline.is_expired() {
                if let Some(previous) = last.take() {
                    warn!(attempts, "overall timeout elapsed during recovery");
                    break Err(FinalError::RecoverableExhausted {
                        path: previous.path().map_or_else(|| target_path.clone(), str::to_string),
                        attempts,
                        reason: ExhaustionReason::Deadline,
                        source: Box::new(previous),
                    });
                }
            }

            attempts += 1;
            let err = match pipeline.execute(node, operation, capabilities, deadline) {
                Ok(outcome) => {
                    debug!(attempts, recoveries, "attempt succeeded");
                    break Ok(outcome);
                }
                Err(err) => err,
            };

            let class = err.class();
            let path = err.path().map_or_else(|| target_path.clone(), str::to_string);
            let mut record = AttemptRecord {
                attempt: attempts,
                path: path.clone(),
                class,
                kind: err.recoverable_kind(),
                anchor: None,
                message: err.to_string(),
            };

            if class != ErrorClass::Recoverable {
                warn!(attempts, class = %class, error = %err, "failure is not retried");
                history.push(record);
                break Err(FinalError::non_recoverable(path, attempts, err));
            }

            let failing = err.failing_node().unwrap_or(target);
            let level = match ledger.charge(failing) {
                Charge::RetryFrom(level) => level,
                Charge::Exhausted => {
                    warn!(attempts, max = ledger.max_attempts(), error = %err, "retry budget exhausted");
                    history.push(record);
                    break Err(FinalError::RecoverableExhausted {
                        path,
                        attempts,
                        reason: ExhaustionReason::Budget,
                        source: Box::new(err),
                    });
                }
            };

            let anchor = tree.get(level).ok().and_then(Node::parent).unwrap_or(level);
            Self::invalidate(pipeline, tree, &err, failing, anchor);
            recoveries += 1;
            record.anchor = Some(tree.path(anchor));
            debug!(
                attempts,
                failing = %path,
                anchor = %tree.path(anchor),
                kind = ?err.recoverable_kind(),
                "recovering"
            );
            history.push(record);
            last = Some(err);
            deadline.sleep(self.config.inter_attempt_delay());
        };

        let state = match &result {
            Ok(_) => TerminalState::Succeeded,
            Err(FinalError::RecoverableExhausted { .. }) => TerminalState::FailedRecoverableExhausted,
            Err(FinalError::NonRecoverable { .. }) => TerminalState::FailedNonRecoverable,
        };
        info!(state = %state, attempts, recoveries, "interaction finished");
        RecoveryRun {
            result,
            report: RecoveryReport {
                state,
                attempts,
                recoveries,
                history,
                elapsed: started.elapsed(),
            },
        }
    }

    /// Drop state the next attempt must rebuild
    fn invalidate(
        pipeline: &mut ExecutionPipeline<'_>,
        tree: &StructureTree,
        err: &StrataError,
        failing: NodeId,
        anchor: NodeId,
    ) {
        let dropped = pipeline.drop_handles(anchor);
        debug!(dropped, anchor = %tree.path(anchor), "dropped resolved handles");

        if err.recoverable_kind().is_some_and(|k| k.is_scope_related()) {
            let scope = err
                .affected_scope()
                .or_else(|| tree.enclosing_boundary(failing));
            pipeline.invalidate_scope(scope);
        }
        // boundaries being re-walked must be re-entered, not reused
        if let Some(boundary) = pipeline
            .active_chain()
            .into_iter()
            .find(|b| tree.is_ancestor_or_self(anchor, *b))
        {
            pipeline.invalidate_scope(Some(boundary));
        }
    }
}
