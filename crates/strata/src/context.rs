//! Interaction Scope Management
//!
//! Tracks the active interaction scope as a stack of entered context
//! boundaries. One manager exists per structural-tree instance and is driven
//! by exactly one logical flow; it holds no retry policy of its own.
//!
//! ```text
//!   Idle ──ensure──► InScope(default) ──push──► InScope(A) ──push──► InScope(B)
//!                          ▲                        │                   │
//!                          └────────pop─────────────┴───────pop─────────┘
//! ```
//!
//! Entry always switches root-to-target, restore always target-to-root.

use crate::driver::{Backend, ElementHandle, ScopeTarget, ScopeToken};
use crate::result::{StrataError, StrataResult};
use crate::structure::{NodeId, StructureTree};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Callback that locates a context boundary element inside the given scope
pub type LocateBoundary<'a> =
    dyn FnMut(&mut dyn Backend, NodeId, &ScopeToken) -> StrataResult<ElementHandle> + 'a;

/// Scope manager state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// No scope selected yet
    Idle,
    /// Inside the scope of a boundary, `None` for the default scope
    InScope(Option<NodeId>),
}

/// Currently active scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveScope {
    /// Boundary that opened the scope, `None` for the default scope
    pub boundary: Option<NodeId>,
    /// Backend token of the scope
    pub token: ScopeToken,
    /// Number of boundaries entered
    pub depth: usize,
}

/// Scope chain to return to after an interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeSnapshot {
    chain: Vec<NodeId>,
}

impl ScopeSnapshot {
    /// Boundaries of the snapshot, root-to-leaf
    #[must_use]
    pub fn chain(&self) -> &[NodeId] {
        &self.chain
    }
}

#[derive(Debug, Clone)]
struct ScopeFrame {
    boundary: NodeId,
    handle: ElementHandle,
    token: ScopeToken,
}

/// Stack-disciplined interaction scope tracker
#[derive(Debug)]
pub struct ContextManager {
    started: bool,
    stack: Vec<ScopeFrame>,
    default_token: ScopeToken,
    boundary_handles: HashMap<NodeId, ElementHandle>,
    needs_rebuild: bool,
    switches: u64,
}

impl Default for ContextManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextManager {
    /// Create an idle context manager
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: false,
            stack: Vec::new(),
            default_token: ScopeToken::default_scope(),
            boundary_handles: HashMap::new(),
            needs_rebuild: false,
            switches: 0,
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> ContextState {
        if self.started {
            ContextState::InScope(self.stack.last().map(|f| f.boundary))
        } else {
            ContextState::Idle
        }
    }

    /// Currently active scope
    #[must_use]
    pub fn active(&self) -> ActiveScope {
        ActiveScope {
            boundary: self.stack.last().map(|f| f.boundary),
            token: self.current_token(),
            depth: self.stack.len(),
        }
    }

    /// Boundaries currently entered, root-to-leaf
    #[must_use]
    pub fn chain(&self) -> Vec<NodeId> {
        self.stack.iter().map(|f| f.boundary).collect()
    }

    /// Capture the active chain so it can be restored later
    #[must_use]
    pub fn snapshot(&self) -> ScopeSnapshot {
        ScopeSnapshot {
            chain: self.chain(),
        }
    }

    /// Total backend scope switches issued by this manager
    #[must_use]
    pub const fn switch_count(&self) -> u64 {
        self.switches
    }

    /// Whether the next `ensure` rebuilds the chain from the root
    #[must_use]
    pub const fn needs_rebuild(&self) -> bool {
        self.needs_rebuild
    }

    /// Make `required` (boundaries root-to-leaf) the active scope chain
    ///
    /// No backend call is made when the chain is already active. Otherwise
    /// the manager pops back to the nearest common ancestor, then pushes
    /// forward one boundary at a time.
    pub fn ensure(
        &mut self,
        tree: &StructureTree,
        required: &[NodeId],
        backend: &mut dyn Backend,
        locate: &mut LocateBoundary<'_>,
    ) -> StrataResult<ActiveScope> {
        self.started = true;
        if self.needs_rebuild {
            self.rebuild(tree, backend)?;
        }

        let common = self
            .stack
            .iter()
            .zip(required)
            .take_while(|(frame, wanted)| frame.boundary == **wanted)
            .count();
        if common == self.stack.len() && common == required.len() {
            return Ok(self.active());
        }

        while self.stack.len() > common {
            self.pop(tree, backend)?;
        }
        for &boundary in &required[common..] {
            self.push(tree, boundary, backend, locate)?;
        }
        Ok(self.active())
    }

    /// Return to the chain captured by [`ContextManager::snapshot`]
    pub fn restore(
        &mut self,
        tree: &StructureTree,
        previous: &ScopeSnapshot,
        backend: &mut dyn Backend,
        locate: &mut LocateBoundary<'_>,
    ) -> StrataResult<()> {
        if self.chain() == previous.chain {
            return Ok(());
        }
        debug!(
            from = self.stack.len(),
            to = previous.chain.len(),
            "restoring interaction scope"
        );
        self.ensure(tree, &previous.chain, backend, locate)
            .map(|_| ())
    }

    /// Drop cached scope state for `scope` and everything nested in it
    ///
    /// `None` invalidates every scope. The next [`ContextManager::ensure`]
    /// rebuilds the chain from the root instead of trusting cached tokens.
    pub fn invalidate(&mut self, tree: &StructureTree, scope: Option<NodeId>) {
        match scope {
            Some(boundary) => {
                for node in tree.subtree(boundary) {
                    let _ = self.boundary_handles.remove(&node);
                }
            }
            None => self.boundary_handles.clear(),
        }
        debug!(scope = ?scope.map(|b| tree.path(b)), "scope invalidated");
        self.needs_rebuild = true;
    }

    fn current_token(&self) -> ScopeToken {
        self.stack
            .last()
            .map_or_else(|| self.default_token.clone(), |f| f.token.clone())
    }

    fn rebuild(&mut self, tree: &StructureTree, backend: &mut dyn Backend) -> StrataResult<()> {
        debug!(depth = self.stack.len(), "rebuilding scope chain from root");
        let node = self.stack.first().map_or(tree.root(), |f| f.boundary);
        self.stack.clear();
        let token = self.switch(tree, backend, &ScopeTarget::Default, node)?;
        self.default_token = token;
        self.needs_rebuild = false;
        Ok(())
    }

    fn pop(&mut self, tree: &StructureTree, backend: &mut dyn Backend) -> StrataResult<()> {
        let Some(left) = self.stack.pop() else {
            return Ok(());
        };
        let target = self
            .stack
            .last()
            .map_or(ScopeTarget::Default, |f| ScopeTarget::Boundary(f.handle.clone()));
        let token = self.switch(tree, backend, &target, left.boundary)?;
        match self.stack.last_mut() {
            Some(frame) => frame.token = token,
            None => self.default_token = token,
        }
        Ok(())
    }

    fn push(
        &mut self,
        tree: &StructureTree,
        boundary: NodeId,
        backend: &mut dyn Backend,
        locate: &mut LocateBoundary<'_>,
    ) -> StrataResult<()> {
        let handle = match self.boundary_handles.get(&boundary) {
            Some(handle) => handle.clone(),
            None => {
                let outer = self.current_token();
                let handle = locate(&mut *backend, boundary, &outer)?;
                let _ = self.boundary_handles.insert(boundary, handle.clone());
                handle
            }
        };
        let target = ScopeTarget::Boundary(handle.clone());
        let token = self.switch(tree, backend, &target, boundary)?;
        self.stack.push(ScopeFrame {
            boundary,
            handle,
            token,
        });
        Ok(())
    }

    fn switch(
        &mut self,
        tree: &StructureTree,
        backend: &mut dyn Backend,
        target: &ScopeTarget,
        node: NodeId,
    ) -> StrataResult<ScopeToken> {
        self.switches += 1;
        debug!(target = %target, node = %tree.path(node), "switching scope");
        backend.switch_scope(target).map_err(|err| {
            warn!(target = %target, error = %err, "scope switch failed");
            let _ = self.boundary_handles.remove(&node);
            self.needs_rebuild = true;
            StrataError::from_backend(err, node, tree.path(node), Some(node))
        })
    }
}
