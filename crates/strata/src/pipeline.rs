//! Execution Resolution Pipeline
//!
//! Turns a structural node plus an operation into backend calls through a
//! fixed sequence of gates. Failure at any gate aborts the attempt; the
//! pipeline itself never retries.
//!
//! ```text
//!   validate ─► resolve locators ─► enter scope ─► lookup ─► synchronize ─► act / read
//! ```
//!
//! Every locator on the node's path is resolved before the first backend
//! call, so a missing branch is reported without touching the backend.
//! Lookups are anchored on the nearest ancestor's resolved handle, falling
//! back to the scope root only at a surface root or context boundary.

use crate::capabilities::Capabilities;
use crate::context::{ContextManager, ScopeSnapshot};
use crate::driver::{
    Action, Backend, BackendError, BackendErrorKind, ElementHandle, Property, ScopeToken, SearchRoot,
};
use crate::locator::{resolve, Selector};
use crate::result::{RecoverableKind, StrataError, StrataResult};
use crate::structure::{Node, NodeId, NodeKind, NodeRef, StructureTree};
use crate::wait::{poll_until, Condition, Deadline, Poll, WaitOptions};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::time::Instant;
use tracing::debug;

// =============================================================================
// OPERATIONS
// =============================================================================

/// What to do with a node once it is resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Resolve the node to a handle (or handles, for a collection)
    Lookup,
    /// Perform an action through the resolved handle
    Act(Action),
    /// Read a property through the resolved handle
    Read(Property),
    /// Poll until a condition holds
    WaitFor(Condition),
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lookup => f.write_str("lookup"),
            Self::Act(action) => write!(f, "act:{}", action.name()),
            Self::Read(property) => write!(f, "read:{property}"),
            Self::WaitFor(condition) => write!(f, "wait_for:{condition}"),
        }
    }
}

/// Successful result of one execution
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Resolved handle of a single target
    Handle(ResolvedHandle),
    /// Members of a collection
    Handles(Vec<ElementHandle>),
    /// Value returned by an action, a read or a satisfied condition
    Value(Value),
}

impl Outcome {
    /// Resolved handle, if the outcome is one
    #[must_use]
    pub const fn handle(&self) -> Option<&ResolvedHandle> {
        match self {
            Self::Handle(handle) => Some(handle),
            _ => None,
        }
    }

    /// Returned value, if the outcome is one
    #[must_use]
    pub const fn value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Convert to a JSON value
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Handle(handle) => Value::String(handle.element.id),
            Self::Handles(handles) => {
                Value::Array(handles.into_iter().map(|h| Value::String(h.id)).collect())
            }
            Self::Value(value) => value,
        }
    }
}

// =============================================================================
// RESOLVED HANDLES
// =============================================================================

/// A backend handle bound to one node, one scope and one point in time
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedHandle {
    /// Node the handle belongs to
    pub node: NodeId,
    /// Backend element
    pub element: ElementHandle,
    /// Scope the element was found in
    pub scope: ScopeToken,
    /// When the lookup happened
    pub resolved_at: Instant,
}

/// Node-local cache of resolved handles for one tree instance
///
/// A handle recorded under a different scope token than the active one is
/// treated as absent.
#[derive(Debug, Default)]
pub struct HandleCache {
    entries: HashMap<NodeId, ResolvedHandle>,
}

impl HandleCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle of `node` if it was resolved in `scope`
    #[must_use]
    pub fn get(&self, node: NodeId, scope: &ScopeToken) -> Option<&ResolvedHandle> {
        self.entries.get(&node).filter(|h| &h.scope == scope)
    }

    /// Whether any handle is cached for `node`
    #[must_use]
    pub fn contains(&self, node: NodeId) -> bool {
        self.entries.contains_key(&node)
    }

    /// Record a handle
    pub fn insert(&mut self, handle: ResolvedHandle) {
        let _ = self.entries.insert(handle.node, handle);
    }

    /// Forget one node's handle
    pub fn remove(&mut self, node: NodeId) -> Option<ResolvedHandle> {
        self.entries.remove(&node)
    }

    /// Forget `anchor` and everything beneath it, returning how many were dropped
    pub fn drop_subtree(&mut self, tree: &StructureTree, anchor: NodeId) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|node, _| !tree.is_ancestor_or_self(anchor, *node));
        before - self.entries.len()
    }

    /// Forget everything
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of cached handles
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// PIPELINE
// =============================================================================

/// Concrete selectors for a node and its ancestors under one capability set
#[derive(Debug, Default)]
struct ResolvedPath {
    selectors: HashMap<NodeId, Selector>,
}

impl ResolvedPath {
    fn resolve(tree: &StructureTree, node: NodeId, capabilities: &Capabilities) -> StrataResult<Self> {
        let start = tree.get(node)?;
        let mut selectors = HashMap::new();
        for member in std::iter::once(start).chain(tree.ancestors(node)) {
            if let Some(declaration) = member.locator() {
                let selector = resolve(declaration, capabilities)
                    .map_err(|e| StrataError::structural(member.path(), e.to_string()))?;
                let _ = selectors.insert(member.id(), selector.clone());
            }
        }
        Ok(Self { selectors })
    }

    fn selector(&self, tree: &StructureTree, node: NodeId) -> StrataResult<&Selector> {
        self.selectors.get(&node).ok_or_else(|| {
            let kind = tree.get(node).map_or(NodeKind::Component, Node::kind);
            StrataError::structural(tree.path(node), format!("{kind} has no locator to look up"))
        })
    }
}

/// Runs one attempt of one operation against one node
#[derive(Debug)]
pub struct ExecutionPipeline<'a> {
    tree: &'a StructureTree,
    backend: &'a mut dyn Backend,
    context: &'a mut ContextManager,
    handles: &'a mut HandleCache,
    wait: WaitOptions,
}

impl<'a> ExecutionPipeline<'a> {
    /// Create a pipeline over one tree instance and its state
    #[must_use]
    pub fn new(
        tree: &'a StructureTree,
        backend: &'a mut dyn Backend,
        context: &'a mut ContextManager,
        handles: &'a mut HandleCache,
    ) -> Self {
        Self {
            tree,
            backend,
            context,
            handles,
            wait: WaitOptions::default(),
        }
    }

    /// Set the synchronization timing
    #[must_use]
    pub fn with_wait(mut self, wait: WaitOptions) -> Self {
        self.wait = wait;
        self
    }

    /// Tree this pipeline executes against
    #[must_use]
    pub const fn tree(&self) -> &'a StructureTree {
        self.tree
    }

    /// Boundaries currently entered
    #[must_use]
    pub fn active_chain(&self) -> Vec<NodeId> {
        self.context.chain()
    }

    /// Drop resolved handles for `anchor` and its subtree
    pub fn drop_handles(&mut self, anchor: NodeId) -> usize {
        self.handles.drop_subtree(self.tree, anchor)
    }

    /// Invalidate a scope (or all scopes) in the context manager
    pub fn invalidate_scope(&mut self, scope: Option<NodeId>) {
        self.context.invalidate(self.tree, scope);
    }

    /// Execute one attempt
    pub fn execute(
        &mut self,
        node: NodeRef,
        operation: &Operation,
        capabilities: &Capabilities,
        deadline: &Deadline,
    ) -> StrataResult<Outcome> {
        let tree = self.tree;

        // 1. structural validation
        let target = tree.validate(node)?;
        check_operation(target, operation)?;
        let id = target.id();
        let kind = target.kind();

        // 3. locator resolution, ahead of any backend call
        let plan = ResolvedPath::resolve(tree, id, capabilities)?;
        deadline.check()?;

        // 2. context resolution
        let chain = tree.boundary_chain(id);
        let mut walker = Walker {
            tree,
            plan: &plan,
            handles: &mut *self.handles,
        };
        let active = self.context.ensure(
            tree,
            &chain,
            &mut *self.backend,
            &mut |backend, boundary, token| {
                walker.resolve(backend, boundary, token).map(|h| h.element)
            },
        )?;
        let scope = active.token;
        debug!(node = %target.path(), scope = %scope, operation = %operation, "executing");

        // 4-6. lookup, synchronization, interaction
        let backend = &mut *self.backend;
        match operation {
            Operation::Lookup if kind == NodeKind::LeafCollection => {
                Ok(Outcome::Handles(walker.find_all(backend, id, &scope)?))
            }
            Operation::Lookup => Ok(Outcome::Handle(walker.resolve(backend, id, &scope)?)),
            Operation::Act(action) => {
                let handle = walker.resolve(backend, id, &scope)?;
                debug!(node = %target.path(), element = %handle.element, action = action.name(), "acting");
                backend
                    .act(&handle.element, action)
                    .map(Outcome::Value)
                    .map_err(|e| backend_failure(tree, e, id))
            }
            Operation::Read(Property::Count) => {
                let members = walker.find_all(backend, id, &scope)?;
                Ok(Outcome::Value(Value::from(members.len())))
            }
            Operation::Read(property) => {
                let handle = walker.resolve(backend, id, &scope)?;
                backend
                    .read(&handle.element, property)
                    .map(Outcome::Value)
                    .map_err(|e| backend_failure(tree, e, id))
            }
            Operation::WaitFor(condition) => synchronize(
                &mut walker,
                backend,
                &self.wait,
                id,
                condition,
                &scope,
                deadline,
            ),
        }
    }

    /// Return to a scope chain captured before the interaction
    pub fn restore_scope(
        &mut self,
        snapshot: &ScopeSnapshot,
        capabilities: &Capabilities,
    ) -> StrataResult<()> {
        let tree = self.tree;
        let plan = match snapshot.chain().last() {
            Some(&deepest) => ResolvedPath::resolve(tree, deepest, capabilities)?,
            None => ResolvedPath::default(),
        };
        let mut walker = Walker {
            tree,
            plan: &plan,
            handles: &mut *self.handles,
        };
        self.context.restore(
            tree,
            snapshot,
            &mut *self.backend,
            &mut |backend, boundary, token| {
                walker.resolve(backend, boundary, token).map(|h| h.element)
            },
        )
    }
}

fn check_operation(target: &Node, operation: &Operation) -> StrataResult<()> {
    let collection = target.kind() == NodeKind::LeafCollection;
    let problem = match operation {
        Operation::Act(action) if collection => {
            Some(format!("cannot {} a collection; pick a member first", action.name()))
        }
        Operation::Read(Property::Count) | Operation::WaitFor(Condition::Count(_))
            if !collection =>
        {
            Some(format!("{} is not a collection", target.kind()))
        }
        Operation::Read(property) if collection && *property != Property::Count => {
            Some(format!("cannot read {property} of a collection"))
        }
        _ => None,
    };
    problem.map_or(Ok(()), |message| Err(StrataError::structural(target.path(), message)))
}

fn backend_failure(tree: &StructureTree, err: BackendError, node: NodeId) -> StrataError {
    debug!(node = %tree.path(node), error = %err, "backend failure");
    StrataError::from_backend(err, node, tree.path(node), tree.enclosing_boundary(node))
}

fn not_found(tree: &StructureTree, node: NodeId) -> StrataError {
    StrataError::recoverable(
        RecoverableKind::NotFound,
        node,
        tree.path(node),
        "element not found",
    )
    .with_scope(tree.enclosing_boundary(node))
}

// =============================================================================
// LOOKUP
// =============================================================================

/// Walks a node's ancestor chain, reusing cached handles where valid
struct Walker<'p> {
    tree: &'p StructureTree,
    plan: &'p ResolvedPath,
    handles: &'p mut HandleCache,
}

impl Walker<'_> {
    /// Where to search for `node`, plus the ancestor whose handle roots it
    fn search_root(
        &mut self,
        backend: &mut dyn Backend,
        node: NodeId,
        scope: &ScopeToken,
    ) -> StrataResult<(SearchRoot, Option<NodeId>)> {
        let tree = self.tree;
        for ancestor in tree.ancestors(node) {
            if ancestor.kind().enters_scope() {
                break;
            }
            if ancestor.locator().is_some() {
                let handle = self.resolve(backend, ancestor.id(), scope)?;
                return Ok((SearchRoot::Element(handle.element), Some(ancestor.id())));
            }
        }
        Ok((SearchRoot::Scope(scope.clone()), None))
    }

    /// Attribute a failed search to the right level
    ///
    /// A stale search root is charged to the path node directly beneath it,
    /// so recovery drops the root's handle even across locator-less containers.
    fn search_failure(&self, err: BackendError, node: NodeId, anchor: Option<NodeId>) -> StrataError {
        let tree = self.tree;
        let charged = match anchor {
            Some(anchor) if err.kind == BackendErrorKind::Stale => std::iter::once(node)
                .chain(tree.ancestors(node).map(Node::id))
                .find(|id| tree.get(*id).ok().and_then(Node::parent) == Some(anchor))
                .unwrap_or(node),
            _ => node,
        };
        backend_failure(tree, err, charged)
    }

    fn find(
        &mut self,
        backend: &mut dyn Backend,
        node: NodeId,
        scope: &ScopeToken,
    ) -> StrataResult<Option<ResolvedHandle>> {
        if let Some(cached) = self.handles.get(node, scope) {
            return Ok(Some(cached.clone()));
        }
        let tree = self.tree;
        let plan = self.plan;
        let selector = plan.selector(tree, node)?;
        let (root, anchor) = self.search_root(backend, node, scope)?;
        debug!(node = %tree.path(node), root = %root, selector = %selector, "lookup");
        let found = backend
            .find(&root, selector)
            .map_err(|e| self.search_failure(e, node, anchor))?;
        Ok(found.map(|element| {
            let handle = ResolvedHandle {
                node,
                element,
                scope: scope.clone(),
                resolved_at: Instant::now(),
            };
            self.handles.insert(handle.clone());
            handle
        }))
    }

    fn resolve(
        &mut self,
        backend: &mut dyn Backend,
        node: NodeId,
        scope: &ScopeToken,
    ) -> StrataResult<ResolvedHandle> {
        let tree = self.tree;
        self.find(backend, node, scope)?
            .ok_or_else(|| not_found(tree, node))
    }

    fn find_all(
        &mut self,
        backend: &mut dyn Backend,
        node: NodeId,
        scope: &ScopeToken,
    ) -> StrataResult<Vec<ElementHandle>> {
        let tree = self.tree;
        let plan = self.plan;
        let selector = plan.selector(tree, node)?;
        let (root, anchor) = self.search_root(backend, node, scope)?;
        debug!(node = %tree.path(node), root = %root, selector = %selector, "collection lookup");
        backend
            .find_all(&root, selector)
            .map_err(|e| self.search_failure(e, node, anchor))
    }
}

// =============================================================================
// SYNCHRONIZATION
// =============================================================================

fn synchronize(
    walker: &mut Walker<'_>,
    backend: &mut dyn Backend,
    wait: &WaitOptions,
    node: NodeId,
    condition: &Condition,
    scope: &ScopeToken,
    deadline: &Deadline,
) -> StrataResult<Outcome> {
    let tree = walker.tree;
    // ancestor NotFound from the latest poll, if that is what kept it pending
    let mut missing: Option<StrataError> = None;
    let waited = poll_until(wait, deadline, || {
        let _ = walker.handles.remove(node);
        match probe(walker, &mut *backend, node, condition, scope) {
            Err(err) if is_missing_ancestor(&err, node) => match condition {
                Condition::Absent => Ok(Poll::Ready(Value::Bool(true))),
                Condition::Count(0) => Ok(Poll::Ready(Value::from(0))),
                _ => {
                    missing = Some(err);
                    Ok(Poll::Pending)
                }
            },
            polled => {
                missing = None;
                polled
            }
        }
    })?;
    match waited {
        Ok(satisfied) => {
            debug!(node = %tree.path(node), condition = %condition, polls = satisfied.polls, "condition met");
            Ok(Outcome::Value(satisfied.value))
        }
        Err(timeout) => {
            let message = format!(
                "condition `{condition}` not met within {}ms ({} polls)",
                timeout.elapsed.as_millis(),
                timeout.polls
            );
            if !condition.timeout_is_not_found() {
                return Err(StrataError::non_recoverable(tree.path(node), message));
            }
            let at = missing.as_ref().and_then(StrataError::failing_node).unwrap_or(node);
            Err(StrataError::recoverable(RecoverableKind::NotFound, at, tree.path(at), message)
                .with_scope(tree.enclosing_boundary(at)))
        }
    }
}

fn is_missing_ancestor(err: &StrataError, node: NodeId) -> bool {
    err.recoverable_kind() == Some(RecoverableKind::NotFound)
        && err.failing_node().is_some_and(|failing| failing != node)
}

fn probe(
    walker: &mut Walker<'_>,
    backend: &mut dyn Backend,
    node: NodeId,
    condition: &Condition,
    scope: &ScopeToken,
) -> StrataResult<Poll<Value>> {
    let tree = walker.tree;
    let read = |backend: &mut dyn Backend, handle: &ResolvedHandle, property: &Property| {
        backend
            .read(&handle.element, property)
            .map_err(|e| backend_failure(tree, e, node))
    };

    if let Condition::Count(expected) = condition {
        let found = walker.find_all(backend, node, scope)?.len();
        return Ok(if found == *expected {
            Poll::Ready(Value::from(found))
        } else {
            Poll::Pending
        });
    }

    let Some(handle) = walker.find(backend, node, scope)? else {
        return Ok(if *condition == Condition::Absent {
            Poll::Ready(Value::Bool(true))
        } else {
            Poll::Pending
        });
    };

    let ready = match condition {
        Condition::Present => true,
        Condition::Absent => false,
        Condition::Visible => read(backend, &handle, &Property::Visible)? == Value::Bool(true),
        Condition::Enabled => read(backend, &handle, &Property::Enabled)? == Value::Bool(true),
        Condition::TextEquals(expected) => {
            let text = read(backend, &handle, &Property::Text)?;
            if text.as_str() == Some(expected.as_str()) {
                return Ok(Poll::Ready(text));
            }
            false
        }
        Condition::TextContains(needle) => {
            let text = read(backend, &handle, &Property::Text)?;
            if text.as_str().is_some_and(|t| t.contains(needle.as_str())) {
                return Ok(Poll::Ready(text));
            }
            false
        }
        Condition::Count(_) => false,
    };
    Ok(if ready {
        Poll::Ready(Value::Bool(true))
    } else {
        Poll::Pending
    })
}
