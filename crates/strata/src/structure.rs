//! Structural Tree
//!
//! The system under test is modeled as an append-only tree of typed nodes
//! stored in an arena. Node identity and parent links are fixed at
//! declaration; the live UI changing underneath is handled purely by
//! dropping resolved handles, never by reshaping the tree.
//!
//! ```text
//! Root (surface)
//!  ├── Component "header"
//!  │    └── LeafTarget "login"
//!  └── ContextBoundary "payment-frame"
//!       └── Component "card-form"
//!            ├── LeafTarget "number"
//!            └── LeafCollection "errors"
//! ```

use crate::locator::LocatorDeclaration;
use crate::result::{StrataError, StrataResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Path separator used in diagnostic paths
pub const PATH_SEPARATOR: char = '/';

/// Stable index of a node inside its tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    /// The surface root of every tree
    pub const ROOT: Self = Self(0);

    /// Create a node id from an arena index
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        Self(index)
    }

    /// Arena index
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of one structural-tree instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TreeId(Uuid);

impl TreeId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A node reference that carries the identity of the tree it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
    /// Owning tree
    pub tree: TreeId,
    /// Node within the tree
    pub node: NodeId,
}

/// Node kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Page or screen surface root
    Root,
    /// Reusable component grouping other nodes
    Component,
    /// Nested interaction scope (embedded document, native surface)
    ContextBoundary,
    /// Single interactable target
    LeafTarget,
    /// Collection of similar targets
    LeafCollection,
}

impl NodeKind {
    /// Whether entering this node enters a new interaction scope
    #[must_use]
    pub const fn enters_scope(&self) -> bool {
        matches!(self, Self::Root | Self::ContextBoundary)
    }

    /// Whether nodes may be declared beneath this kind
    #[must_use]
    pub const fn accepts_children(&self) -> bool {
        !matches!(self, Self::LeafTarget | Self::LeafCollection)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Root => "root",
            Self::Component => "component",
            Self::ContextBoundary => "context-boundary",
            Self::LeafTarget => "leaf-target",
            Self::LeafCollection => "leaf-collection",
        };
        f.write_str(name)
    }
}

/// A structural node
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    kind: NodeKind,
    name: String,
    locator: Option<LocatorDeclaration>,
    parent: Option<NodeId>,
    path: String,
    depth: usize,
    retry_budget: Option<u32>,
}

impl Node {
    /// Node identity
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    /// Node kind
    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Declared name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Locator declaration, absent for pure containers
    #[must_use]
    pub const fn locator(&self) -> Option<&LocatorDeclaration> {
        self.locator.as_ref()
    }

    /// Parent node, `None` for the root
    #[must_use]
    pub const fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Human-readable path from the root
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Distance from the root
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Per-node retry budget override
    #[must_use]
    pub const fn retry_budget(&self) -> Option<u32> {
        self.retry_budget
    }
}

/// Append-only arena of structural nodes rooted at one surface
///
/// A clone is a separate tree instance with its own identity, so node
/// references taken from one never validate against the other.
#[derive(Debug)]
pub struct StructureTree {
    id: TreeId,
    nodes: Vec<Node>,
    children: HashMap<(NodeId, String), NodeId>,
    live: bool,
}

impl Clone for StructureTree {
    fn clone(&self) -> Self {
        Self {
            id: TreeId::new(),
            nodes: self.nodes.clone(),
            children: self.children.clone(),
            live: self.live,
        }
    }
}

impl StructureTree {
    /// Create a tree with a surface root
    #[must_use]
    pub fn new(surface: impl Into<String>) -> Self {
        let name = surface.into();
        let root = Node {
            id: NodeId::ROOT,
            kind: NodeKind::Root,
            path: name.clone(),
            name,
            locator: None,
            parent: None,
            depth: 0,
            retry_budget: None,
        };
        Self {
            id: TreeId::new(),
            nodes: vec![root],
            children: HashMap::new(),
            live: true,
        }
    }

    /// Create a tree whose root carries a locator (e.g. a native screen marker)
    ///
    /// # Errors
    ///
    /// Structural error when the locator is empty or mixes dimensions.
    pub fn with_root_locator(
        surface: impl Into<String>,
        locator: LocatorDeclaration,
    ) -> StrataResult<Self> {
        let mut tree = Self::new(surface);
        locator
            .validate()
            .map_err(|e| StrataError::structural(tree.nodes[0].path.clone(), e.to_string()))?;
        tree.nodes[0].locator = Some(locator);
        Ok(tree)
    }

    /// Tree identity
    #[must_use]
    pub const fn id(&self) -> TreeId {
        self.id
    }

    /// Root node id
    #[must_use]
    pub const fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Number of declared nodes, root included
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether only the root is declared
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Whether the owning surface is still live
    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.live
    }

    /// Discard the surface; every later execution against it fails structurally
    pub fn discard(&mut self) {
        self.live = false;
    }

    /// Reference to a node of this tree
    #[must_use]
    pub const fn node_ref(&self, node: NodeId) -> NodeRef {
        NodeRef {
            tree: self.id,
            node,
        }
    }

    /// Declare a child node, or return the existing one with the same name
    ///
    /// Declaration is lazy and idempotent: the first access creates the node,
    /// later accesses return it unchanged.
    pub fn declare(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        kind: NodeKind,
        locator: Option<LocatorDeclaration>,
    ) -> StrataResult<NodeId> {
        let name = name.into();
        let parent_node = self.get(parent)?;
        if let Some(existing) = self.children.get(&(parent, name.clone())) {
            let node = &self.nodes[existing.index()];
            if node.kind != kind {
                return Err(StrataError::structural(
                    node.path.clone(),
                    format!("already declared as {}, not {kind}", node.kind),
                ));
            }
            return Ok(*existing);
        }
        if !parent_node.kind.accepts_children() {
            return Err(StrataError::structural(
                parent_node.path.clone(),
                format!("{} nodes cannot contain '{name}'", parent_node.kind),
            ));
        }
        if kind == NodeKind::Root {
            return Err(StrataError::structural(
                parent_node.path.clone(),
                format!("'{name}' cannot be declared as a nested root"),
            ));
        }
        if name.is_empty() || name.contains(PATH_SEPARATOR) {
            return Err(StrataError::structural(
                parent_node.path.clone(),
                format!("invalid node name '{name}'"),
            ));
        }
        if let Some(decl) = &locator {
            decl.validate().map_err(|e| {
                StrataError::structural(
                    format!("{}{PATH_SEPARATOR}{name}", parent_node.path),
                    e.to_string(),
                )
            })?;
        }

        let id = NodeId(self.nodes.len());
        let node = Node {
            id,
            kind,
            path: format!("{}{PATH_SEPARATOR}{name}", parent_node.path),
            depth: parent_node.depth + 1,
            name: name.clone(),
            locator,
            parent: Some(parent),
            retry_budget: None,
        };
        self.nodes.push(node);
        let _ = self.children.insert((parent, name), id);
        Ok(id)
    }

    /// Declare a component
    pub fn component(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        locator: impl Into<LocatorDeclaration>,
    ) -> StrataResult<NodeId> {
        self.declare(parent, name, NodeKind::Component, Some(locator.into()))
    }

    /// Declare a locator-less grouping component
    pub fn container(&mut self, parent: NodeId, name: impl Into<String>) -> StrataResult<NodeId> {
        self.declare(parent, name, NodeKind::Component, None)
    }

    /// Declare a context boundary
    pub fn boundary(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        locator: impl Into<LocatorDeclaration>,
    ) -> StrataResult<NodeId> {
        self.declare(parent, name, NodeKind::ContextBoundary, Some(locator.into()))
    }

    /// Declare a leaf target
    pub fn target(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        locator: impl Into<LocatorDeclaration>,
    ) -> StrataResult<NodeId> {
        self.declare(parent, name, NodeKind::LeafTarget, Some(locator.into()))
    }

    /// Declare a leaf collection
    pub fn collection(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        locator: impl Into<LocatorDeclaration>,
    ) -> StrataResult<NodeId> {
        self.declare(parent, name, NodeKind::LeafCollection, Some(locator.into()))
    }

    /// Override the retry budget a node contributes to recovery
    pub fn set_retry_budget(&mut self, node: NodeId, budget: u32) -> StrataResult<()> {
        if budget == 0 {
            return Err(StrataError::config("retry budget must be at least 1"));
        }
        self.get(node)?;
        self.nodes[node.index()].retry_budget = Some(budget);
        Ok(())
    }

    /// Look up a node
    pub fn get(&self, node: NodeId) -> StrataResult<&Node> {
        self.nodes.get(node.index()).ok_or_else(|| {
            StrataError::structural(
                format!("{}{PATH_SEPARATOR}?", self.nodes[0].path),
                format!("node {node} is not part of this tree"),
            )
        })
    }

    /// Child by name
    #[must_use]
    pub fn child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.children.get(&(parent, name.to_string())).copied()
    }

    /// Find a node by its slash-separated path below the root
    #[must_use]
    pub fn find_path(&self, path: &str) -> Option<NodeId> {
        path.split(PATH_SEPARATOR)
            .filter(|segment| !segment.is_empty())
            .try_fold(NodeId::ROOT, |node, segment| self.child(node, segment))
    }

    /// Diagnostic path of a node, or a placeholder for foreign ids
    #[must_use]
    pub fn path(&self, node: NodeId) -> String {
        self.get(node)
            .map_or_else(|_| format!("<unknown {node}>"), |n| n.path.clone())
    }

    /// Confirm a reference belongs to this live tree
    pub fn validate(&self, node: NodeRef) -> StrataResult<&Node> {
        if node.tree != self.id {
            return Err(StrataError::structural(
                format!("<tree {}>", node.tree),
                format!("node {} belongs to a different surface", node.node),
            ));
        }
        let resolved = self.get(node.node)?;
        if !self.live {
            return Err(StrataError::structural(
                resolved.path.clone(),
                "surface has been discarded",
            ));
        }
        Ok(resolved)
    }

    /// Ancestors of a node, nearest first, root last
    pub fn ancestors(&self, node: NodeId) -> impl Iterator<Item = &Node> + '_ {
        let start = self.nodes.get(node.index()).and_then(|n| n.parent);
        std::iter::successors(start.map(|id| &self.nodes[id.index()]), move |n| {
            n.parent.map(|id| &self.nodes[id.index()])
        })
    }

    /// Context boundaries strictly above a node, root-to-leaf order
    ///
    /// A boundary itself is located in its parent's scope, so it is not part
    /// of its own chain.
    #[must_use]
    pub fn boundary_chain(&self, node: NodeId) -> Vec<NodeId> {
        let mut chain: Vec<NodeId> = self
            .ancestors(node)
            .filter(|n| n.kind == NodeKind::ContextBoundary)
            .map(Node::id)
            .collect();
        chain.reverse();
        chain
    }

    /// Nearest enclosing context boundary, if any
    #[must_use]
    pub fn enclosing_boundary(&self, node: NodeId) -> Option<NodeId> {
        self.ancestors(node)
            .find(|n| n.kind == NodeKind::ContextBoundary)
            .map(Node::id)
    }

    /// Nodes from `node` up to, excluding, the root
    #[must_use]
    pub fn path_to_root(&self, node: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        if node == NodeId::ROOT || self.get(node).is_err() {
            return path;
        }
        path.push(node);
        path.extend(
            self.ancestors(node)
                .filter(|n| n.kind != NodeKind::Root)
                .map(Node::id),
        );
        path
    }

    /// Whether `ancestor` is `node` or lies above it
    #[must_use]
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        ancestor == node || self.ancestors(node).any(|n| n.id == ancestor)
    }

    /// `node` and every node declared beneath it
    #[must_use]
    pub fn subtree(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .iter()
            .map(Node::id)
            .filter(|id| self.is_ancestor_or_self(node, *id))
            .collect()
    }

    /// All nodes in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.iter()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn checkout() -> (StructureTree, NodeId, NodeId, NodeId) {
        let mut tree = StructureTree::new("checkout");
        let frame = tree.boundary(NodeId::ROOT, "payment", "iframe#pay").unwrap();
        let form = tree.component(frame, "card-form", "form.card").unwrap();
        let number = tree.target(form, "number", "input[name=number]").unwrap();
        (tree, frame, form, number)
    }

    mod declare_tests {
        use super::*;

        #[test]
        fn test_paths_and_depth() {
            let (tree, frame, form, number) = checkout();
            assert_eq!(tree.path(frame), "checkout/payment");
            assert_eq!(tree.path(number), "checkout/payment/card-form/number");
            assert_eq!(tree.get(form).unwrap().depth(), 2);
            assert_eq!(tree.get(number).unwrap().parent(), Some(form));
            assert_eq!(tree.len(), 4);
        }

        #[test]
        fn test_declare_is_idempotent() {
            let (mut tree, _, form, number) = checkout();
            let again = tree.target(form, "number", "input#other").unwrap();
            assert_eq!(again, number);
            assert_eq!(tree.len(), 4);
        }

        #[test]
        fn test_redeclare_with_other_kind_fails() {
            let (mut tree, _, form, _) = checkout();
            let err = tree.collection(form, "number", "input").unwrap_err();
            assert!(err.to_string().contains("already declared"));
        }

        #[test]
        fn test_leaf_rejects_children() {
            let (mut tree, _, _, number) = checkout();
            assert!(tree.target(number, "inner", "span").is_err());
        }

        #[test]
        fn test_nested_root_rejected() {
            let mut tree = StructureTree::new("home");
            assert!(tree
                .declare(NodeId::ROOT, "again", NodeKind::Root, None)
                .is_err());
        }

        #[test]
        fn test_invalid_name_rejected() {
            let mut tree = StructureTree::new("home");
            assert!(tree.container(NodeId::ROOT, "a/b").is_err());
            assert!(tree.container(NodeId::ROOT, "").is_err());
        }

        #[test]
        fn test_invalid_declaration_rejected() {
            let mut tree = StructureTree::new("home");
            let empty = LocatorDeclaration::dimensioned().build();
            assert!(tree.target(NodeId::ROOT, "x", empty).is_err());
        }

        #[test]
        fn test_retry_budget_override() {
            let (mut tree, frame, _, _) = checkout();
            tree.set_retry_budget(frame, 5).unwrap();
            assert_eq!(tree.get(frame).unwrap().retry_budget(), Some(5));
            assert!(tree.set_retry_budget(frame, 0).is_err());
        }
    }

    mod navigation_tests {
        use super::*;

        #[test]
        fn test_boundary_chain_excludes_self() {
            let (mut tree, frame, form, number) = checkout();
            let inner = tree.boundary(form, "3ds", "iframe#challenge").unwrap();
            let code = tree.target(inner, "code", "input").unwrap();
            assert_eq!(tree.boundary_chain(number), vec![frame]);
            assert_eq!(tree.boundary_chain(frame), Vec::<NodeId>::new());
            assert_eq!(tree.boundary_chain(inner), vec![frame]);
            assert_eq!(tree.boundary_chain(code), vec![frame, inner]);
            assert_eq!(tree.enclosing_boundary(code), Some(inner));
        }

        #[test]
        fn test_path_to_root_excludes_root() {
            let (tree, frame, form, number) = checkout();
            assert_eq!(tree.path_to_root(number), vec![number, form, frame]);
            assert!(tree.path_to_root(NodeId::ROOT).is_empty());
        }

        #[test]
        fn test_find_path() {
            let (tree, _, _, number) = checkout();
            assert_eq!(tree.find_path("payment/card-form/number"), Some(number));
            assert_eq!(tree.find_path(""), Some(NodeId::ROOT));
            assert_eq!(tree.find_path("payment/missing"), None);
        }

        #[test]
        fn test_subtree() {
            let (tree, frame, form, number) = checkout();
            assert_eq!(tree.subtree(form), vec![form, number]);
            assert_eq!(tree.subtree(frame).len(), 3);
        }
    }

    mod validation_tests {
        use super::*;

        #[test]
        fn test_validate_own_node() {
            let (tree, _, _, number) = checkout();
            assert!(tree.validate(tree.node_ref(number)).is_ok());
        }

        #[test]
        fn test_foreign_tree_rejected() {
            let (tree, _, _, number) = checkout();
            let (other, _, _, _) = checkout();
            let err = other.validate(tree.node_ref(number)).unwrap_err();
            assert!(err.to_string().contains("different surface"));
        }

        #[test]
        fn test_discarded_tree_rejected() {
            let (mut tree, _, _, number) = checkout();
            let node = tree.node_ref(number);
            tree.discard();
            assert!(!tree.is_live());
            assert!(tree.validate(node).is_err());
        }

        #[test]
        fn test_clone_is_a_separate_instance() {
            let (tree, _, _, number) = checkout();
            let mut copy = tree.clone();
            assert_ne!(copy.id(), tree.id());
            assert_eq!(copy.len(), tree.len());
            assert!(copy.validate(tree.node_ref(number)).is_err());
            assert!(copy.validate(copy.node_ref(number)).is_ok());
            copy.discard();
            assert!(tree.validate(tree.node_ref(number)).is_ok());
        }

        #[test]
        fn test_root_locator_is_validated() {
            let tree = StructureTree::with_root_locator("home", LocatorDeclaration::css("#home")).unwrap();
            assert!(tree.get(NodeId::ROOT).unwrap().locator().is_some());

            let empty = LocatorDeclaration::dimensioned().build();
            let err = StructureTree::with_root_locator("home", empty).unwrap_err();
            assert!(err.to_string().contains("no platform"));

            let mixed = LocatorDeclaration::dimensioned()
                .platform("web", "#web")
                .viewport("default", "#any")
                .build();
            assert!(StructureTree::with_root_locator("home", mixed).is_err());
        }

        #[test]
        fn test_out_of_range_rejected() {
            let (tree, _, _, _) = checkout();
            let bogus = tree.node_ref(NodeId::from_index(99));
            assert!(tree.validate(bogus).is_err());
        }
    }
}
