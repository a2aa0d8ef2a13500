//! Interaction Session
//!
//! A [`Session`] owns one structural tree instance together with its backend,
//! scope manager, handle cache and configuration. Every interaction runs
//! through the pipeline under the recovery engine, then returns to the scope
//! that was active before it.
//!
//! Sessions share nothing; run one per test flow.
//!
//! # Example
//!
//! ```
//! use strata::prelude::*;
//!
//! let mut tree = StructureTree::new("login");
//! let form = tree.component(NodeId::ROOT, "form", "form#login").unwrap();
//! let submit = tree.target(form, "submit", Selector::test_id("submit")).unwrap();
//!
//! let mut backend = MockBackend::new();
//! backend.add_element(Selector::css("form#login"));
//! backend.add_element(Selector::test_id("submit"));
//!
//! let mut session = Session::new(tree, backend, EngineConfig::fast());
//! session.node(submit).click().unwrap();
//! assert!(session.backend().was_called("act:"));
//! ```

use crate::capabilities::Capabilities;
use crate::config::EngineConfig;
use crate::context::ContextManager;
use crate::driver::{Action, Backend, ElementHandle, Property};
use crate::pipeline::{ExecutionPipeline, HandleCache, Operation, Outcome};
use crate::recovery::{FinalError, RecoveryEngine, RecoveryReport, RecoveryRun, TerminalState};
use crate::result::{StrataError, StrataResult};
use crate::structure::{NodeId, NodeRef, StructureTree};
use crate::wait::{Condition, Deadline, WaitOptions};
use serde_json::Value;
use std::time::Duration;
use tracing::{info_span, warn};

/// One structural tree instance bound to one backend
#[derive(Debug)]
pub struct Session<B: Backend> {
    tree: StructureTree,
    backend: B,
    context: ContextManager,
    handles: HandleCache,
    config: EngineConfig,
    last_report: Option<RecoveryReport>,
}

impl<B: Backend> Session<B> {
    /// Create a session
    #[must_use]
    pub fn new(tree: StructureTree, backend: B, config: EngineConfig) -> Self {
        Self {
            tree,
            backend,
            context: ContextManager::new(),
            handles: HandleCache::new(),
            config,
            last_report: None,
        }
    }

    /// Structural tree
    #[must_use]
    pub const fn tree(&self) -> &StructureTree {
        &self.tree
    }

    /// Structural tree, for declaring more nodes
    pub fn tree_mut(&mut self) -> &mut StructureTree {
        &mut self.tree
    }

    /// Backend
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Backend, mutably
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Engine configuration
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Scope manager
    #[must_use]
    pub const fn context(&self) -> &ContextManager {
        &self.context
    }

    /// Report of the most recent interaction
    #[must_use]
    pub const fn last_report(&self) -> Option<&RecoveryReport> {
        self.last_report.as_ref()
    }

    /// Current capabilities as seen by the resolver
    pub fn capabilities(&mut self) -> StrataResult<Capabilities> {
        let snapshot = self.backend.capabilities().map_err(|e| {
            StrataError::non_recoverable(self.tree.path(NodeId::ROOT), e.to_string())
        })?;
        Ok(Capabilities::from_snapshot(&snapshot, &self.config.breakpoints))
    }

    /// Cursor over one node
    pub fn node(&mut self, node: NodeId) -> NodeCursor<'_, B> {
        NodeCursor {
            session: self,
            node,
        }
    }

    /// Cursor over the node at a slash-separated path below the root
    pub fn node_at(&mut self, path: &str) -> StrataResult<NodeCursor<'_, B>> {
        let node = self.tree.find_path(path).ok_or_else(|| {
            StrataError::structural(
                format!("{}/{path}", self.tree.path(NodeId::ROOT)),
                "no node declared at this path",
            )
        })?;
        Ok(self.node(node))
    }

    /// Perform an operation on a node of this session's tree
    pub fn perform(&mut self, node: NodeId, operation: Operation) -> Result<Outcome, FinalError> {
        let node = self.tree.node_ref(node);
        self.perform_at(node, &operation, self.config.wait)
            .into_result()
    }

    /// Perform an operation, then verify the outcome once
    ///
    /// An error from `check` is the caller's own verdict and is surfaced
    /// immediately; it never triggers recovery.
    pub fn perform_checked<T, F>(
        &mut self,
        node: NodeId,
        operation: Operation,
        check: F,
    ) -> Result<T, FinalError>
    where
        F: FnOnce(&Outcome) -> StrataResult<T>,
    {
        let outcome = self.perform(node, operation)?;
        check(&outcome).map_err(|err| {
            let attempts = self.last_report.as_ref().map_or(1, |r| r.attempts);
            FinalError::non_recoverable(self.tree.path(node), attempts, err)
        })
    }

    /// Wait until `condition` holds for `node`, within `timeout_ms`
    pub fn wait_for(
        &mut self,
        node: NodeId,
        condition: Condition,
        timeout_ms: u64,
    ) -> Result<Outcome, FinalError> {
        let node = self.tree.node_ref(node);
        let wait = self.config.wait.with_timeout(timeout_ms);
        self.perform_at(node, &Operation::WaitFor(condition), wait)
            .into_result()
    }

    /// Perform an operation on a node reference, returning the full report
    ///
    /// References from another tree are rejected structurally.
    pub fn perform_at(
        &mut self,
        node: NodeRef,
        operation: &Operation,
        wait: WaitOptions,
    ) -> RecoveryRun {
        let path = self.tree.path(node.node);
        let span = info_span!("interaction", node = %path, operation = %operation, backend = self.backend.name());
        let _guard = span.enter();

        let deadline = Deadline::after(self.config.overall_timeout());
        self.handles.clear();
        let capabilities = match self.capabilities() {
            Ok(capabilities) => capabilities,
            Err(err) => return self.finish(Self::failed_before_start(path, err)),
        };

        let snapshot = self.context.snapshot();
        let mut pipeline = ExecutionPipeline::new(
            &self.tree,
            &mut self.backend,
            &mut self.context,
            &mut self.handles,
        )
        .with_wait(wait);
        let run = RecoveryEngine::new(&self.config).run_with_recovery(
            &mut pipeline,
            node,
            operation,
            &capabilities,
            &deadline,
        );

        if let Err(err) = pipeline.restore_scope(&snapshot, &capabilities) {
            warn!(error = %err, "could not restore interaction scope; invalidating all scopes");
            pipeline.invalidate_scope(None);
        }
        self.finish(run)
    }

    fn finish(&mut self, run: RecoveryRun) -> RecoveryRun {
        self.last_report = Some(run.report.clone());
        run
    }

    fn failed_before_start(path: String, err: StrataError) -> RecoveryRun {
        let report = RecoveryReport {
            state: TerminalState::FailedNonRecoverable,
            attempts: 0,
            recoveries: 0,
            history: Vec::new(),
            elapsed: Duration::ZERO,
        };
        RecoveryRun {
            result: Err(FinalError::non_recoverable(path, 0, err)),
            report,
        }
    }
}

/// Interaction helpers bound to one node
#[derive(Debug)]
pub struct NodeCursor<'s, B: Backend> {
    session: &'s mut Session<B>,
    node: NodeId,
}

impl<B: Backend> NodeCursor<'_, B> {
    /// Node this cursor points at
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.node
    }

    /// Perform an operation
    pub fn perform(&mut self, operation: Operation) -> Result<Outcome, FinalError> {
        self.session.perform(self.node, operation)
    }

    /// Wait for a condition
    pub fn wait_for(&mut self, condition: Condition, timeout_ms: u64) -> Result<Outcome, FinalError> {
        self.session.wait_for(self.node, condition, timeout_ms)
    }

    /// Resolve to an element handle
    pub fn lookup(&mut self) -> Result<ElementHandle, FinalError> {
        match self.perform(Operation::Lookup)? {
            Outcome::Handle(handle) => Ok(handle.element),
            Outcome::Handles(mut handles) if !handles.is_empty() => Ok(handles.swap_remove(0)),
            other => Err(self.unexpected(&other)),
        }
    }

    /// Click
    pub fn click(&mut self) -> Result<(), FinalError> {
        self.perform(Operation::Act(Action::Click)).map(|_| ())
    }

    /// Replace the value with `text`
    pub fn fill(&mut self, text: impl Into<String>) -> Result<(), FinalError> {
        self.perform(Operation::Act(Action::Fill(text.into())))
            .map(|_| ())
    }

    /// Read a property
    pub fn read(&mut self, property: Property) -> Result<Value, FinalError> {
        self.perform(Operation::Read(property))
            .map(Outcome::into_value)
    }

    /// Text content
    pub fn text(&mut self) -> Result<String, FinalError> {
        let value = self.read(Property::Text)?;
        Ok(value
            .as_str()
            .map_or_else(|| value.to_string(), str::to_string))
    }

    /// Whether the element is visible
    pub fn is_visible(&mut self) -> Result<bool, FinalError> {
        let value = self.read(Property::Visible)?;
        Ok(value.as_bool().unwrap_or(false))
    }

    /// Number of collection members
    pub fn count(&mut self) -> Result<usize, FinalError> {
        let value = self.read(Property::Count)?;
        value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| self.unexpected(&Outcome::Value(value)))
    }

    fn unexpected(&self, outcome: &Outcome) -> FinalError {
        let path = self.session.tree.path(self.node);
        FinalError::non_recoverable(
            path.clone(),
            1,
            StrataError::non_recoverable(path, format!("unexpected outcome {outcome:?}")),
        )
    }
}
