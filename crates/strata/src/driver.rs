//! Backend - Abstract Automation Engine Trait
//!
//! The engine core talks to exactly one interface. Concrete adapters
//! (WebDriver, CDP, Appium, desktop accessibility APIs) implement it; the
//! engine never sees their types.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  Backend (trait)                                              │
//! ├───────────────────────────────────────────────────────────────┤
//! │  find / find_all     selector within a scope or element       │
//! │  act / read          interaction through a resolved handle    │
//! │  switch_scope        enter a context boundary or go back      │
//! │  capabilities        platform / os / viewport snapshot        │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`MockBackend`] is a scripted, call-recording implementation for tests.

use crate::capabilities::DeviceSnapshot;
use crate::locator::Selector;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use thiserror::Error;

/// Opaque backend reference to one element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Backend-assigned element identifier
    pub id: String,
}

impl ElementHandle {
    /// Create a new element handle
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Opaque backend identifier of an interaction scope
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeToken(String);

impl ScopeToken {
    const DEFAULT: &'static str = "default";

    /// Create a scope token
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Token of the default (top-level) scope
    #[must_use]
    pub fn default_scope() -> Self {
        Self(Self::DEFAULT.to_string())
    }

    /// Whether this is the default scope
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.0 == Self::DEFAULT
    }

    /// Raw token
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ScopeToken {
    fn default() -> Self {
        Self::default_scope()
    }
}

impl fmt::Display for ScopeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a lookup is anchored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchRoot {
    /// The document root of an interaction scope
    Scope(ScopeToken),
    /// Beneath a previously resolved element
    Element(ElementHandle),
}

impl fmt::Display for SearchRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scope(token) => write!(f, "scope:{token}"),
            Self::Element(handle) => write!(f, "element:{handle}"),
        }
    }
}

/// Scope to switch into
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeTarget {
    /// The default top-level scope
    Default,
    /// The scope opened by a context boundary element
    Boundary(ElementHandle),
}

impl fmt::Display for ScopeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default"),
            Self::Boundary(handle) => write!(f, "boundary:{handle}"),
        }
    }
}

/// Interaction performed through a resolved handle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Click or tap
    Click,
    /// Replace the element's value with text
    Fill(String),
    /// Clear the element's value
    Clear,
    /// Move the pointer over the element
    Hover,
    /// Press a key while the element has focus
    Press(String),
    /// Backend-specific action
    Custom {
        /// Action name
        name: String,
        /// Action arguments
        args: Vec<Value>,
    },
}

impl Action {
    /// Action name for logs and call history
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Click => "click",
            Self::Fill(_) => "fill",
            Self::Clear => "clear",
            Self::Hover => "hover",
            Self::Press(_) => "press",
            Self::Custom { name, .. } => name,
        }
    }
}

/// Observable element property
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Property {
    /// Text content
    Text,
    /// Form value
    Value,
    /// Visibility
    Visible,
    /// Enabled state
    Enabled,
    /// Named attribute
    Attribute(String),
    /// Number of members in a collection
    Count,
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Value => f.write_str("value"),
            Self::Visible => f.write_str("visible"),
            Self::Enabled => f.write_str("enabled"),
            Self::Attribute(name) => write!(f, "attribute:{name}"),
            Self::Count => f.write_str("count"),
        }
    }
}

/// Backend failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendErrorKind {
    /// Handle refers to an element no longer attached
    Stale,
    /// The active scope no longer exists
    ScopeGone,
    /// Transient inconsistency (element moving, intercepted click, ...)
    Transient,
    /// Anything else; never retried
    Fatal,
}

/// Error reported by a backend adapter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind:?}: {message}")]
pub struct BackendError {
    /// Failure category
    pub kind: BackendErrorKind,
    /// Backend message
    pub message: String,
}

impl BackendError {
    /// Create a backend error
    #[must_use]
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Stale handle
    #[must_use]
    pub fn stale(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Stale, message)
    }

    /// Scope vanished
    #[must_use]
    pub fn scope_gone(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::ScopeGone, message)
    }

    /// Transient inconsistency
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Transient, message)
    }

    /// Fatal error
    #[must_use]
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Fatal, message)
    }
}

/// Result type for backend calls
pub type BackendResult<T> = Result<T, BackendError>;

/// Abstract automation engine
///
/// Implementations are used from exactly one logical flow at a time, so
/// every call takes `&mut self`.
pub trait Backend: fmt::Debug {
    /// Find the first element matching `selector` beneath `root`
    fn find(&mut self, root: &SearchRoot, selector: &Selector)
        -> BackendResult<Option<ElementHandle>>;

    /// Find every element matching `selector` beneath `root`
    fn find_all(&mut self, root: &SearchRoot, selector: &Selector)
        -> BackendResult<Vec<ElementHandle>>;

    /// Perform an action on an element
    fn act(&mut self, handle: &ElementHandle, action: &Action) -> BackendResult<Value>;

    /// Read a property of an element
    fn read(&mut self, handle: &ElementHandle, property: &Property) -> BackendResult<Value>;

    /// Switch the active interaction scope
    fn switch_scope(&mut self, target: &ScopeTarget) -> BackendResult<ScopeToken>;

    /// Current platform / os / viewport snapshot
    fn capabilities(&mut self) -> BackendResult<DeviceSnapshot>;

    /// Adapter name for logs
    fn name(&self) -> &str {
        "backend"
    }
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn find(
        &mut self,
        root: &SearchRoot,
        selector: &Selector,
    ) -> BackendResult<Option<ElementHandle>> {
        (**self).find(root, selector)
    }

    fn find_all(
        &mut self,
        root: &SearchRoot,
        selector: &Selector,
    ) -> BackendResult<Vec<ElementHandle>> {
        (**self).find_all(root, selector)
    }

    fn act(&mut self, handle: &ElementHandle, action: &Action) -> BackendResult<Value> {
        (**self).act(handle, action)
    }

    fn read(&mut self, handle: &ElementHandle, property: &Property) -> BackendResult<Value> {
        (**self).read(handle, property)
    }

    fn switch_scope(&mut self, target: &ScopeTarget) -> BackendResult<ScopeToken> {
        (**self).switch_scope(target)
    }

    fn capabilities(&mut self) -> BackendResult<DeviceSnapshot> {
        (**self).capabilities()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

// =============================================================================
// MOCK BACKEND
// =============================================================================

/// Scripted outcome of one `find` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FindOutcome {
    /// Behave normally (return the registered element, if any)
    Found,
    /// Report not found regardless of registration
    NotFound,
    /// Fail with a backend error
    Fail(BackendErrorKind),
}

/// Mock backend for unit testing
#[derive(Debug)]
pub struct MockBackend {
    /// Device snapshot returned by `capabilities`
    pub snapshot: DeviceSnapshot,
    /// Call history for verification
    pub call_history: Vec<String>,
    elements: HashMap<Selector, Vec<ElementHandle>>,
    find_script: HashMap<Selector, VecDeque<FindOutcome>>,
    act_script: HashMap<String, VecDeque<BackendErrorKind>>,
    switch_script: VecDeque<Option<BackendErrorKind>>,
    properties: HashMap<(String, Property), VecDeque<Value>>,
    next_element: usize,
    next_scope: usize,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create new mock backend reporting a desktop web browser
    #[must_use]
    pub fn new() -> Self {
        Self::with_snapshot(DeviceSnapshot::desktop_web())
    }

    /// Create a mock backend reporting the given device
    #[must_use]
    pub fn with_snapshot(snapshot: DeviceSnapshot) -> Self {
        Self {
            snapshot,
            call_history: Vec::new(),
            elements: HashMap::new(),
            find_script: HashMap::new(),
            act_script: HashMap::new(),
            switch_script: VecDeque::new(),
            properties: HashMap::new(),
            next_element: 0,
            next_scope: 0,
        }
    }

    /// Register an element matched by `selector`
    pub fn add_element(&mut self, selector: Selector) -> ElementHandle {
        self.next_element += 1;
        let handle = ElementHandle::new(format!("el-{}", self.next_element));
        self.elements
            .entry(selector)
            .or_default()
            .push(handle.clone());
        handle
    }

    /// Register `count` elements matched by `selector`
    pub fn add_elements(&mut self, selector: &Selector, count: usize) -> Vec<ElementHandle> {
        (0..count)
            .map(|_| self.add_element(selector.clone()))
            .collect()
    }

    /// Remove every element matched by `selector`
    pub fn remove_elements(&mut self, selector: &Selector) {
        let _ = self.elements.remove(selector);
    }

    /// Queue scripted outcomes for finds of `selector`
    pub fn script_find(&mut self, selector: &Selector, outcomes: impl IntoIterator<Item = FindOutcome>) {
        self.find_script
            .entry(selector.clone())
            .or_default()
            .extend(outcomes);
    }

    /// Queue failures for actions on an element
    pub fn script_act(
        &mut self,
        handle: &ElementHandle,
        failures: impl IntoIterator<Item = BackendErrorKind>,
    ) {
        self.act_script
            .entry(handle.id.clone())
            .or_default()
            .extend(failures);
    }

    /// Queue failures for scope switches
    pub fn script_switch(&mut self, failures: impl IntoIterator<Item = BackendErrorKind>) {
        self.switch_script.extend(failures.into_iter().map(Some));
    }

    /// Queue per-switch outcomes; `None` lets that switch succeed
    pub fn script_switch_outcomes(
        &mut self,
        outcomes: impl IntoIterator<Item = Option<BackendErrorKind>>,
    ) {
        self.switch_script.extend(outcomes);
    }

    /// Set a property value
    pub fn set_property(&mut self, handle: &ElementHandle, property: Property, value: Value) {
        self.set_property_sequence(handle, property, [value]);
    }

    /// Set successive property values; the last one sticks
    pub fn set_property_sequence(
        &mut self,
        handle: &ElementHandle,
        property: Property,
        values: impl IntoIterator<Item = Value>,
    ) {
        let _ = self
            .properties
            .insert((handle.id.clone(), property), values.into_iter().collect());
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> &[String] {
        &self.call_history
    }

    /// Number of recorded calls starting with `prefix`
    #[must_use]
    pub fn count_calls(&self, prefix: &str) -> usize {
        self.call_history
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    /// Number of scope switches performed
    #[must_use]
    pub fn switch_count(&self) -> usize {
        self.count_calls("switch:")
    }

    /// Number of single-element lookups performed
    #[must_use]
    pub fn find_count(&self) -> usize {
        self.count_calls("find:")
    }

    /// Number of lookups of one selector
    #[must_use]
    pub fn find_count_for(&self, selector: &Selector) -> usize {
        let suffix = format!(" {selector}");
        self.call_history
            .iter()
            .filter(|c| (c.starts_with("find:") || c.starts_with("find_all:")) && c.ends_with(&suffix))
            .count()
    }

    /// Check if method was called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.call_history.iter().any(|c| c.starts_with(method))
    }

    fn next_find_outcome(&mut self, selector: &Selector) -> FindOutcome {
        self.find_script
            .get_mut(selector)
            .and_then(VecDeque::pop_front)
            .unwrap_or(FindOutcome::Found)
    }

    fn scripted_error(kind: BackendErrorKind, what: &str) -> BackendError {
        BackendError::new(kind, format!("scripted failure during {what}"))
    }
}

impl Backend for MockBackend {
    fn find(
        &mut self,
        root: &SearchRoot,
        selector: &Selector,
    ) -> BackendResult<Option<ElementHandle>> {
        self.call_history.push(format!("find:{root} {selector}"));
        match self.next_find_outcome(selector) {
            FindOutcome::Found => Ok(self
                .elements
                .get(selector)
                .and_then(|found| found.first())
                .cloned()),
            FindOutcome::NotFound => Ok(None),
            FindOutcome::Fail(kind) => Err(Self::scripted_error(kind, "find")),
        }
    }

    fn find_all(
        &mut self,
        root: &SearchRoot,
        selector: &Selector,
    ) -> BackendResult<Vec<ElementHandle>> {
        self.call_history.push(format!("find_all:{root} {selector}"));
        match self.next_find_outcome(selector) {
            FindOutcome::Found => Ok(self.elements.get(selector).cloned().unwrap_or_default()),
            FindOutcome::NotFound => Ok(Vec::new()),
            FindOutcome::Fail(kind) => Err(Self::scripted_error(kind, "find_all")),
        }
    }

    fn act(&mut self, handle: &ElementHandle, action: &Action) -> BackendResult<Value> {
        self.call_history
            .push(format!("act:{handle} {}", action.name()));
        if let Some(kind) = self
            .act_script
            .get_mut(&handle.id)
            .and_then(VecDeque::pop_front)
        {
            return Err(Self::scripted_error(kind, "act"));
        }
        if let Action::Fill(text) = action {
            self.set_property(handle, Property::Value, Value::String(text.clone()));
        }
        Ok(Value::Null)
    }

    fn read(&mut self, handle: &ElementHandle, property: &Property) -> BackendResult<Value> {
        self.call_history.push(format!("read:{handle} {property}"));
        let key = (handle.id.clone(), property.clone());
        if let Some(values) = self.properties.get_mut(&key) {
            let value = if values.len() > 1 {
                values.pop_front()
            } else {
                values.front().cloned()
            };
            if let Some(value) = value {
                return Ok(value);
            }
        }
        Ok(match property {
            Property::Visible | Property::Enabled => Value::Bool(true),
            Property::Text | Property::Value => Value::String(String::new()),
            Property::Attribute(_) | Property::Count => Value::Null,
        })
    }

    fn switch_scope(&mut self, target: &ScopeTarget) -> BackendResult<ScopeToken> {
        self.call_history.push(format!("switch:{target}"));
        if let Some(kind) = self.switch_script.pop_front().flatten() {
            return Err(Self::scripted_error(kind, "switch_scope"));
        }
        match target {
            ScopeTarget::Default => Ok(ScopeToken::default_scope()),
            ScopeTarget::Boundary(handle) => {
                self.next_scope += 1;
                Ok(ScopeToken::new(format!("scope-{}-{handle}", self.next_scope)))
            }
        }
    }

    fn capabilities(&mut self) -> BackendResult<DeviceSnapshot> {
        self.call_history.push("capabilities".to_string());
        Ok(self.snapshot.clone())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
