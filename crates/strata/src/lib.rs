//! Strata: Structural Test Automation
//!
//! Tests address UI elements through a declared structural tree instead of
//! raw selectors. Locators are resolved late, against the capabilities of
//! the device actually under test, and every interaction runs inside a
//! bounded recovery loop that retries transient failures from the right
//! level of the hierarchy.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    STRATA Architecture                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Structure  │    │ Recovery   │    │ Execution  │            │
//! │   │ Tree +     │───►│ Engine     │───►│ Pipeline   │            │
//! │   │ Locators   │    │ (ledger)   │    │            │            │
//! │   └────────────┘    └────────────┘    └─────┬──────┘            │
//! │                                             │                   │
//! │                     ┌────────────┐    ┌─────▼──────┐            │
//! │                     │ Backend    │◄───│ Context    │            │
//! │                     │ (driver)   │    │ Manager    │            │
//! │                     └────────────┘    └────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use strata::prelude::*;
//!
//! let mut tree = StructureTree::new("shop");
//! let menu = tree
//!     .target(
//!         NodeId::ROOT,
//!         "menu",
//!         LocatorDeclaration::dimensioned()
//!             .viewport("xs", Selector::css("button.burger"))
//!             .viewport("default", Selector::css("nav.menu")),
//!     )
//!     .unwrap();
//!
//! let mut backend = MockBackend::new();
//! backend.add_element(Selector::css("nav.menu"));
//!
//! let mut session = Session::new(tree, backend, EngineConfig::fast());
//! session.node(menu).click().unwrap();
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

/// Device capabilities and viewport breakpoints
pub mod capabilities;

/// Engine configuration
pub mod config;

/// Scope (context) management
#[allow(clippy::missing_errors_doc, clippy::doc_markdown)]
pub mod context;

/// Backend interface and scripted mock backend
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::doc_markdown
)]
pub mod driver;

/// Locator declarations and deferred resolution
pub mod locator;

/// Tracing subscriber setup
pub mod logging;

/// Page Object Model
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
pub mod page_object;

/// Execution pipeline
#[allow(clippy::missing_errors_doc, clippy::doc_markdown)]
pub mod pipeline;

/// Bounded, hierarchy-aware recovery
#[allow(clippy::missing_errors_doc, clippy::cast_precision_loss)]
pub mod recovery;

/// Error types
pub mod result;

/// Interaction sessions
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
pub mod session;

/// Structural tree
pub mod structure;

/// Synchronization and deadlines
#[allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::doc_markdown
)]
pub mod wait;

pub use capabilities::{Breakpoint, BreakpointTable, Capabilities, DeviceSnapshot};
pub use config::{BudgetCombination, EngineConfig};
pub use context::{ActiveScope, ContextManager, ContextState, ScopeSnapshot};
pub use driver::{
    Action, Backend, BackendError, BackendErrorKind, BackendResult, ElementHandle, FindOutcome,
    MockBackend, Property, ScopeTarget, ScopeToken, SearchRoot,
};
pub use locator::{
    resolve, resolve_traced, DeclarationBuilder, Dimension, DimensionedLocator,
    LocatorDeclaration, Resolution, ResolutionError, Selector, DEFAULT_VIEWPORT_KEY,
};
pub use page_object::{NodeDefinition, PageBuilder, PageDefinition, PageObject};
pub use pipeline::{ExecutionPipeline, HandleCache, Operation, Outcome, ResolvedHandle};
pub use recovery::{
    AttemptRecord, Charge, ExhaustionReason, FinalError, RecoveryEngine, RecoveryReport,
    RecoveryRun, RetryLedger, TerminalState,
};
pub use result::{ErrorClass, RecoverableKind, StrataError, StrataResult};
pub use session::{NodeCursor, Session};
pub use structure::{Node, NodeId, NodeKind, NodeRef, StructureTree, TreeId};
pub use wait::{Condition, Deadline, WaitOptions, DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::capabilities::{BreakpointTable, Capabilities, DeviceSnapshot};
    pub use super::config::{BudgetCombination, EngineConfig};
    pub use super::driver::{
        Action, Backend, BackendError, BackendErrorKind, ElementHandle, FindOutcome, MockBackend,
        Property,
    };
    pub use super::locator::{LocatorDeclaration, Selector};
    pub use super::page_object::{PageBuilder, PageDefinition, PageObject};
    pub use super::pipeline::{Operation, Outcome};
    pub use super::recovery::{FinalError, RecoveryReport, TerminalState};
    pub use super::result::{ErrorClass, RecoverableKind, StrataError, StrataResult};
    pub use super::session::Session;
    pub use super::structure::{NodeId, NodeKind, StructureTree};
    pub use super::wait::{Condition, WaitOptions};
}
