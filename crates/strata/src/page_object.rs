//! Page Object Model Support
//!
//! Authors describe a surface once, as a page object, and get a
//! [`StructureTree`] out of it. Two authoring styles produce the same tree:
//! the fluent [`PageBuilder`] and a serde-loaded [`PageDefinition`].
//!
//! ## Toyota Way Application:
//! - **Poka-Yoke**: Declaration errors surface when the page is built, not mid-test
//! - **Muda**: Reduce duplication by encapsulating page structure
//! - **Genchi Genbutsu**: Page objects reflect actual page structure
//!
//! # Example
//!
//! ```
//! use strata::prelude::*;
//!
//! struct CheckoutPage;
//!
//! impl PageObject for CheckoutPage {
//!     fn surface_name(&self) -> &str {
//!         "checkout"
//!     }
//!
//!     fn declare(&self, page: &mut PageBuilder) {
//!         page.boundary("payment", "iframe#pay", |frame| {
//!             frame.target("number", "input[name=number]");
//!         })
//!         .collection("errors", ".error");
//!     }
//! }
//!
//! let tree = CheckoutPage.build_tree().unwrap();
//! assert!(tree.find_path("payment/number").is_some());
//! ```

use crate::locator::LocatorDeclaration;
use crate::result::{StrataError, StrataResult};
use crate::structure::{NodeId, NodeKind, StructureTree};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Trait for page objects representing a page, screen or component surface
pub trait PageObject {
    /// Name of the surface root
    fn surface_name(&self) -> &str;

    /// Locator of the surface root itself, if it has one
    fn surface_locator(&self) -> Option<LocatorDeclaration> {
        None
    }

    /// Declare the nodes of this surface
    fn declare(&self, page: &mut PageBuilder);

    /// Get the page name for logging/debugging
    fn page_name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Build the structural tree for this page
    fn build_tree(&self) -> StrataResult<StructureTree> {
        let mut page = match self.surface_locator() {
            Some(locator) => PageBuilder::with_root_locator(self.surface_name(), locator),
            None => PageBuilder::new(self.surface_name()),
        };
        self.declare(&mut page);
        page.build()
    }
}

/// Fluent builder declaring nodes into a structural tree
///
/// Declarations nest through closures. The first declaration error is kept
/// and returned by [`PageBuilder::build`]; later calls become no-ops.
#[derive(Debug)]
pub struct PageBuilder {
    tree: StructureTree,
    parents: Vec<NodeId>,
    last: Option<NodeId>,
    error: Option<StrataError>,
}

impl PageBuilder {
    /// Create a new page builder for a surface
    #[must_use]
    pub fn new(surface: impl Into<String>) -> Self {
        Self::from_tree(StructureTree::new(surface))
    }

    /// Create a builder whose surface root carries a locator
    ///
    /// An invalid locator is reported by [`PageBuilder::build`].
    #[must_use]
    pub fn with_root_locator(surface: impl Into<String>, locator: impl Into<LocatorDeclaration>) -> Self {
        let surface = surface.into();
        match StructureTree::with_root_locator(surface.clone(), locator.into()) {
            Ok(tree) => Self::from_tree(tree),
            Err(err) => {
                let mut page = Self::new(surface);
                page.error = Some(err);
                page
            }
        }
    }

    /// Continue declaring into an existing tree
    #[must_use]
    pub fn from_tree(tree: StructureTree) -> Self {
        Self {
            tree,
            parents: vec![NodeId::ROOT],
            last: None,
            error: None,
        }
    }

    /// Declare a component and the nodes inside it
    pub fn component(
        &mut self,
        name: impl Into<String>,
        locator: impl Into<LocatorDeclaration>,
        body: impl FnOnce(&mut Self),
    ) -> &mut Self {
        self.nested(name.into(), NodeKind::Component, Some(locator.into()), body)
    }

    /// Declare a locator-less group and the nodes inside it
    pub fn group(&mut self, name: impl Into<String>, body: impl FnOnce(&mut Self)) -> &mut Self {
        self.nested(name.into(), NodeKind::Component, None, body)
    }

    /// Declare a context boundary and the nodes inside its scope
    pub fn boundary(
        &mut self,
        name: impl Into<String>,
        locator: impl Into<LocatorDeclaration>,
        body: impl FnOnce(&mut Self),
    ) -> &mut Self {
        self.nested(name.into(), NodeKind::ContextBoundary, Some(locator.into()), body)
    }

    /// Declare a leaf target
    pub fn target(&mut self, name: impl Into<String>, locator: impl Into<LocatorDeclaration>) -> &mut Self {
        let _ = self.declare(name.into(), NodeKind::LeafTarget, Some(locator.into()));
        self
    }

    /// Declare a leaf collection
    pub fn collection(
        &mut self,
        name: impl Into<String>,
        locator: impl Into<LocatorDeclaration>,
    ) -> &mut Self {
        let _ = self.declare(name.into(), NodeKind::LeafCollection, Some(locator.into()));
        self
    }

    /// Override the retry budget of the most recently declared node
    pub fn retry_budget(&mut self, budget: u32) -> &mut Self {
        if self.error.is_some() {
            return self;
        }
        let result = match self.last {
            Some(node) => self.tree.set_retry_budget(node, budget),
            None => Err(StrataError::config("retry budget set before any node was declared")),
        };
        if let Err(err) = result {
            self.error = Some(err);
        }
        self
    }

    /// Most recently declared node
    #[must_use]
    pub const fn last(&self) -> Option<NodeId> {
        self.last
    }

    /// Finish, returning the tree or the first declaration error
    pub fn build(self) -> StrataResult<StructureTree> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.tree),
        }
    }

    fn declare(
        &mut self,
        name: String,
        kind: NodeKind,
        locator: Option<LocatorDeclaration>,
    ) -> Option<NodeId> {
        if self.error.is_some() {
            return None;
        }
        let parent = self.parents.last().copied().unwrap_or(NodeId::ROOT);
        match self.tree.declare(parent, name, kind, locator) {
            Ok(node) => {
                self.last = Some(node);
                Some(node)
            }
            Err(err) => {
                self.error = Some(err);
                None
            }
        }
    }

    fn nested(
        &mut self,
        name: String,
        kind: NodeKind,
        locator: Option<LocatorDeclaration>,
        body: impl FnOnce(&mut Self),
    ) -> &mut Self {
        if let Some(node) = self.declare(name, kind, locator) {
            self.parents.push(node);
            body(self);
            let _ = self.parents.pop();
            self.last = Some(node);
        }
        self
    }
}

// =============================================================================
// DATA-DRIVEN PAGES
// =============================================================================

/// A page described in YAML or JSON
///
/// ```yaml
/// surface: checkout
/// nodes:
///   - name: payment
///     kind: context_boundary
///     locator: iframe#pay
///     children:
///       - name: number
///         kind: leaf_target
///         locator:
///           platform:
///             web: input[name=number]
///             ios: { accessibility_id: card-number }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDefinition {
    /// Surface root name
    pub surface: String,
    /// Surface root locator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<LocatorDeclaration>,
    /// Top-level nodes
    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,
}

/// One node of a [`PageDefinition`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDefinition {
    /// Node name
    pub name: String,
    /// Node kind
    pub kind: NodeKind,
    /// Locator declaration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<LocatorDeclaration>,
    /// Retry budget override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_budget: Option<u32>,
    /// Nested nodes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeDefinition>,
}

impl PageDefinition {
    /// Parse a page from YAML
    pub fn from_yaml(yaml: &str) -> StrataResult<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Parse a page from JSON
    pub fn from_json(json: &str) -> StrataResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a page file, choosing the format by extension
    pub fn from_path(path: impl AsRef<Path>) -> StrataResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&text),
            Some("yaml" | "yml") => Self::from_yaml(&text),
            _ => Err(StrataError::config(format!(
                "unsupported page file {}",
                path.display()
            ))),
        }
    }
}

impl NodeDefinition {
    fn declare_into(&self, page: &mut PageBuilder) {
        match self.kind {
            NodeKind::LeafTarget | NodeKind::LeafCollection if !self.children.is_empty() => {
                if page.error.is_none() {
                    page.error = Some(StrataError::structural(
                        self.name.clone(),
                        "leaf nodes cannot have children",
                    ));
                }
            }
            kind => {
                let _ = page.nested(self.name.clone(), kind, self.locator.clone(), |inner| {
                    if let Some(budget) = self.retry_budget {
                        let _ = inner.retry_budget(budget);
                    }
                    for child in &self.children {
                        child.declare_into(inner);
                    }
                });
            }
        }
    }
}

impl PageObject for PageDefinition {
    fn surface_name(&self) -> &str {
        &self.surface
    }

    fn surface_locator(&self) -> Option<LocatorDeclaration> {
        self.locator.clone()
    }

    fn declare(&self, page: &mut PageBuilder) {
        for node in &self.nodes {
            node.declare_into(page);
        }
    }
}
