//! Locator declarations and their resolution to concrete selectors.
//!
//! A declaration is either a single static selector or a mapping keyed by
//! resolution dimension (platform, operating system, viewport breakpoint).
//! Resolution is pure: the same declaration and capabilities always produce
//! the same selector, and no backend is consulted.
//!
//! # Resolution rules
//!
//! - Static declarations are returned unchanged.
//! - Dimensions are consulted in fixed priority: platform, os, viewport.
//! - Only the viewport dimension falls back, to a key literally named
//!   `default`. A missing platform or os branch is a structural error.
//!
//! ```text
//! platform:
//!   web:
//!     viewport:
//!       default: "#menu"
//!       md: "nav .menu"
//! ```

use crate::capabilities::Capabilities;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Viewport key used when no exact breakpoint branch exists
pub const DEFAULT_VIEWPORT_KEY: &str = "default";

/// Concrete selector handed to a backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "SelectorRepr", into = "SelectorRepr")]
pub enum Selector {
    /// CSS selector (e.g., "button.primary")
    Css(String),
    /// XPath selector
    XPath(String),
    /// Text content selector
    Text(String),
    /// Test ID selector (data-testid attribute)
    TestId(String),
    /// Accessibility identifier (native and mobile surfaces)
    AccessibilityId(String),
}

impl Selector {
    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create an XPath selector
    #[must_use]
    pub fn xpath(selector: impl Into<String>) -> Self {
        Self::XPath(selector.into())
    }

    /// Create a text selector
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Create a test ID selector
    #[must_use]
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::TestId(id.into())
    }

    /// Create an accessibility ID selector
    #[must_use]
    pub fn accessibility_id(id: impl Into<String>) -> Self {
        Self::AccessibilityId(id.into())
    }

    /// Selector strategy name
    #[must_use]
    pub const fn strategy(&self) -> &'static str {
        match self {
            Self::Css(_) => "css",
            Self::XPath(_) => "xpath",
            Self::Text(_) => "text",
            Self::TestId(_) => "test_id",
            Self::AccessibilityId(_) => "accessibility_id",
        }
    }

    /// Raw selector value
    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::Css(v)
            | Self::XPath(v)
            | Self::Text(v)
            | Self::TestId(v)
            | Self::AccessibilityId(v) => v,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.strategy(), self.value())
    }
}

/// On-disk form: a bare string is CSS, a single-key map names the strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum SelectorRepr {
    Plain(String),
    Tagged(TaggedSelector),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TaggedSelector {
    Css(String),
    #[serde(rename = "xpath")]
    XPath(String),
    Text(String),
    TestId(String),
    AccessibilityId(String),
}

impl From<SelectorRepr> for Selector {
    fn from(repr: SelectorRepr) -> Self {
        match repr {
            SelectorRepr::Plain(css) | SelectorRepr::Tagged(TaggedSelector::Css(css)) => {
                Self::Css(css)
            }
            SelectorRepr::Tagged(TaggedSelector::XPath(v)) => Self::XPath(v),
            SelectorRepr::Tagged(TaggedSelector::Text(v)) => Self::Text(v),
            SelectorRepr::Tagged(TaggedSelector::TestId(v)) => Self::TestId(v),
            SelectorRepr::Tagged(TaggedSelector::AccessibilityId(v)) => Self::AccessibilityId(v),
        }
    }
}

impl From<Selector> for SelectorRepr {
    fn from(selector: Selector) -> Self {
        match selector {
            Selector::Css(v) => Self::Plain(v),
            Selector::XPath(v) => Self::Tagged(TaggedSelector::XPath(v)),
            Selector::Text(v) => Self::Tagged(TaggedSelector::Text(v)),
            Selector::TestId(v) => Self::Tagged(TaggedSelector::TestId(v)),
            Selector::AccessibilityId(v) => Self::Tagged(TaggedSelector::AccessibilityId(v)),
        }
    }
}

/// Resolution dimension, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    /// Platform family
    Platform,
    /// Operating system
    Os,
    /// Viewport breakpoint
    Viewport,
}

impl Dimension {
    /// All dimensions in resolution priority
    pub const PRIORITY: [Self; 3] = [Self::Platform, Self::Os, Self::Viewport];

    /// Declaration key for this dimension
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::Platform => "platform",
            Self::Os => "os",
            Self::Viewport => "viewport",
        }
    }

    /// Whether this dimension falls back to [`DEFAULT_VIEWPORT_KEY`]
    #[must_use]
    pub const fn has_fallback(&self) -> bool {
        matches!(self, Self::Viewport)
    }

    fn capability<'a>(&self, caps: &'a Capabilities) -> Option<&'a str> {
        match self {
            Self::Platform => Some(caps.platform.as_str()),
            Self::Os => caps.os.as_deref(),
            Self::Viewport => caps.viewport.as_deref(),
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Branches of one dimension, keyed by capability value
pub type Branches = BTreeMap<String, LocatorDeclaration>;

/// Author-provided description of how to find a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocatorDeclaration {
    /// A single concrete selector
    Static(Selector),
    /// Selector varying by resolution dimension
    Dimensioned(DimensionedLocator),
}

/// Mapping keyed by resolution dimension
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DimensionedLocator {
    /// Branches by platform
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Branches>,
    /// Branches by operating system
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<Branches>,
    /// Branches by viewport breakpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Branches>,
}

impl DimensionedLocator {
    fn branches(&self, dimension: Dimension) -> Option<&Branches> {
        match dimension {
            Dimension::Platform => self.platform.as_ref(),
            Dimension::Os => self.os.as_ref(),
            Dimension::Viewport => self.viewport.as_ref(),
        }
    }

    fn branches_mut(&mut self, dimension: Dimension) -> &mut Branches {
        let slot = match dimension {
            Dimension::Platform => &mut self.platform,
            Dimension::Os => &mut self.os,
            Dimension::Viewport => &mut self.viewport,
        };
        slot.get_or_insert_with(BTreeMap::new)
    }

    /// Highest-priority dimension present at this level
    #[must_use]
    pub fn leading_dimension(&self) -> Option<Dimension> {
        Dimension::PRIORITY
            .into_iter()
            .find(|d| self.branches(*d).is_some())
    }

    /// The one dimension this level declares
    ///
    /// # Errors
    ///
    /// [`ResolutionError::EmptyMapping`] when no dimension is present and
    /// [`ResolutionError::MixedDimensions`] when more than one is.
    pub fn sole_dimension(&self) -> Result<Dimension, ResolutionError> {
        let mut present = Dimension::PRIORITY
            .into_iter()
            .filter(|d| self.branches(*d).is_some());
        let first = present.next().ok_or(ResolutionError::EmptyMapping)?;
        match present.next() {
            Some(second) => Err(ResolutionError::MixedDimensions { first, second }),
            None => Ok(first),
        }
    }
}

/// Why a declaration could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// No branch matches the capability value and no fallback applies
    #[error("no {dimension} branch for '{value}' (declared: {declared})")]
    MissingBranch {
        /// Dimension being resolved
        dimension: Dimension,
        /// Capability value that had no branch
        value: String,
        /// Comma-separated declared keys
        declared: String,
    },
    /// The capability snapshot lacks a value for a declared dimension
    #[error("capabilities do not report a {dimension} value")]
    MissingCapability {
        /// Dimension without a capability value
        dimension: Dimension,
    },
    /// A mapping level declares no dimension at all
    #[error("dimensioned locator declares no platform, os or viewport branches")]
    EmptyMapping,
    /// A mapping level declares more than one dimension
    #[error("dimensioned locator mixes {first} and {second} at one level")]
    MixedDimensions {
        /// Higher-priority dimension
        first: Dimension,
        /// Lower-priority dimension
        second: Dimension,
    },
}

/// Result of a traced resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution<'a> {
    /// Selected concrete selector
    pub selector: &'a Selector,
    /// Branch chosen at each dimension level, outermost first
    pub choices: Vec<(Dimension, String)>,
}

impl LocatorDeclaration {
    /// Create a static CSS declaration
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Static(Selector::css(selector))
    }

    /// Start a dimensioned declaration
    #[must_use]
    pub fn dimensioned() -> DeclarationBuilder {
        DeclarationBuilder::default()
    }

    /// Parse a declaration from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml_ng::Error> {
        serde_yaml_ng::from_str(yaml)
    }

    /// Parse a declaration from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Whether this is a static declaration
    #[must_use]
    pub const fn is_static(&self) -> bool {
        matches!(self, Self::Static(_))
    }

    /// Check every mapping level declares exactly one dimension
    pub fn validate(&self) -> Result<(), ResolutionError> {
        match self {
            Self::Static(_) => Ok(()),
            Self::Dimensioned(map) => {
                let dimension = map.sole_dimension()?;
                map.branches(dimension)
                    .into_iter()
                    .flat_map(BTreeMap::values)
                    .try_for_each(Self::validate)
            }
        }
    }
}

/// Resolve a declaration to a concrete selector
///
/// # Errors
///
/// Returns [`ResolutionError`] when a platform or os branch is missing, when
/// the capabilities lack a declared dimension, or when a mapping level is
/// empty or mixes dimensions.
pub fn resolve<'a>(
    declaration: &'a LocatorDeclaration,
    caps: &Capabilities,
) -> Result<&'a Selector, ResolutionError> {
    resolve_traced(declaration, caps).map(|r| r.selector)
}

/// Resolve a declaration and record the branch chosen at every level
pub fn resolve_traced<'a>(
    declaration: &'a LocatorDeclaration,
    caps: &Capabilities,
) -> Result<Resolution<'a>, ResolutionError> {
    let mut choices = Vec::new();
    let mut current = declaration;
    loop {
        let map = match current {
            LocatorDeclaration::Static(selector) => {
                return Ok(Resolution { selector, choices });
            }
            LocatorDeclaration::Dimensioned(map) => map,
        };
        let dimension = map.sole_dimension()?;
        let branches = map.branches(dimension).ok_or(ResolutionError::EmptyMapping)?;
        let (key, next) = select_branch(dimension, branches, caps)?;
        choices.push((dimension, key.to_string()));
        current = next;
    }
}

fn select_branch<'a>(
    dimension: Dimension,
    branches: &'a Branches,
    caps: &Capabilities,
) -> Result<(&'a str, &'a LocatorDeclaration), ResolutionError> {
    let lookup = |wanted: &str| {
        branches
            .get_key_value(wanted)
            .or_else(|| branches.iter().find(|(key, _)| key.eq_ignore_ascii_case(wanted)))
            .map(|(key, next)| (key.as_str(), next))
    };
    if let Some(found) = dimension.capability(caps).and_then(lookup) {
        return Ok(found);
    }
    if dimension.has_fallback() {
        if let Some(found) = lookup(DEFAULT_VIEWPORT_KEY) {
            return Ok(found);
        }
    }
    match dimension.capability(caps) {
        None => Err(ResolutionError::MissingCapability { dimension }),
        Some(value) => Err(ResolutionError::MissingBranch {
            dimension,
            value: value.to_string(),
            declared: branches.keys().cloned().collect::<Vec<_>>().join(", "),
        }),
    }
}

/// Fluent builder for dimensioned declarations
#[derive(Debug, Clone, Default)]
pub struct DeclarationBuilder {
    map: DimensionedLocator,
}

impl DeclarationBuilder {
    /// Add a platform branch
    #[must_use]
    pub fn platform(self, key: impl Into<String>, branch: impl Into<LocatorDeclaration>) -> Self {
        self.branch(Dimension::Platform, key, branch)
    }

    /// Add an operating system branch
    #[must_use]
    pub fn os(self, key: impl Into<String>, branch: impl Into<LocatorDeclaration>) -> Self {
        self.branch(Dimension::Os, key, branch)
    }

    /// Add a viewport branch
    #[must_use]
    pub fn viewport(self, key: impl Into<String>, branch: impl Into<LocatorDeclaration>) -> Self {
        self.branch(Dimension::Viewport, key, branch)
    }

    /// Add a branch for an arbitrary dimension
    #[must_use]
    pub fn branch(
        mut self,
        dimension: Dimension,
        key: impl Into<String>,
        branch: impl Into<LocatorDeclaration>,
    ) -> Self {
        let _ = self
            .map
            .branches_mut(dimension)
            .insert(key.into(), branch.into());
        self
    }

    /// Finish the declaration
    #[must_use]
    pub fn build(self) -> LocatorDeclaration {
        LocatorDeclaration::Dimensioned(self.map)
    }
}

impl From<Selector> for LocatorDeclaration {
    fn from(selector: Selector) -> Self {
        Self::Static(selector)
    }
}

impl From<&str> for LocatorDeclaration {
    fn from(css: &str) -> Self {
        Self::css(css)
    }
}

impl From<String> for LocatorDeclaration {
    fn from(css: String) -> Self {
        Self::css(css)
    }
}

impl From<DeclarationBuilder> for LocatorDeclaration {
    fn from(builder: DeclarationBuilder) -> Self {
        builder.build()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn web(viewport: &str) -> Capabilities {
        Capabilities::new("web").with_viewport(viewport)
    }

    mod selector_tests {
        use super::*;

        #[test]
        fn test_strategy_and_value() {
            let selector = Selector::test_id("submit");
            assert_eq!(selector.strategy(), "test_id");
            assert_eq!(selector.value(), "submit");
            assert_eq!(selector.to_string(), "test_id=submit");
        }

        #[test]
        fn test_plain_string_deserializes_as_css() {
            let selector: Selector = serde_json::from_str("\"button.primary\"").unwrap();
            assert_eq!(selector, Selector::css("button.primary"));
        }

        #[test]
        fn test_tagged_selector_deserializes() {
            let selector: Selector = serde_json::from_str(r#"{"xpath": "//a"}"#).unwrap();
            assert_eq!(selector, Selector::xpath("//a"));
            let selector: Selector =
                serde_json::from_str(r#"{"accessibility_id": "login"}"#).unwrap();
            assert_eq!(selector, Selector::accessibility_id("login"));
        }

        #[test]
        fn test_css_serializes_as_plain_string() {
            let json = serde_json::to_string(&Selector::css("#id")).unwrap();
            assert_eq!(json, "\"#id\"");
        }
    }

    mod resolve_tests {
        use super::*;

        #[test]
        fn test_static_fast_path() {
            let decl = LocatorDeclaration::css("#login");
            let caps = Capabilities::new("android").with_os("android");
            assert_eq!(resolve(&decl, &caps).unwrap(), &Selector::css("#login"));
        }

        #[test]
        fn test_viewport_exact_and_default() {
            let decl = LocatorDeclaration::dimensioned()
                .platform(
                    "web",
                    LocatorDeclaration::dimensioned()
                        .viewport("default", "A")
                        .viewport("md", "B"),
                )
                .build();
            assert_eq!(resolve(&decl, &web("md")).unwrap(), &Selector::css("B"));
            assert_eq!(resolve(&decl, &web("xs")).unwrap(), &Selector::css("A"));
        }

        #[test]
        fn test_viewport_without_capability_uses_default() {
            let decl = LocatorDeclaration::dimensioned()
                .viewport("default", "A")
                .viewport("lg", "B")
                .build();
            let caps = Capabilities::new("web");
            assert_eq!(resolve(&decl, &caps).unwrap(), &Selector::css("A"));
        }

        #[test]
        fn test_missing_platform_branch() {
            let decl = LocatorDeclaration::dimensioned()
                .platform("web", "#a")
                .platform("android", "~a")
                .build();
            let err = resolve(&decl, &Capabilities::new("ios")).unwrap_err();
            match err {
                ResolutionError::MissingBranch {
                    dimension,
                    value,
                    declared,
                } => {
                    assert_eq!(dimension, Dimension::Platform);
                    assert_eq!(value, "ios");
                    assert_eq!(declared, "android, web");
                }
                other => panic!("unexpected {other:?}"),
            }
        }

        #[test]
        fn test_platform_has_no_default_fallback() {
            let decl = LocatorDeclaration::dimensioned()
                .platform("default", "#a")
                .build();
            assert!(resolve(&decl, &Capabilities::new("web")).is_err());
        }

        #[test]
        fn test_missing_os_capability() {
            let decl = LocatorDeclaration::dimensioned()
                .os("windows", "#w")
                .build();
            assert_eq!(
                resolve(&decl, &Capabilities::new("desktop")).unwrap_err(),
                ResolutionError::MissingCapability {
                    dimension: Dimension::Os
                }
            );
        }

        #[test]
        fn test_empty_mapping() {
            let decl = LocatorDeclaration::dimensioned().build();
            assert_eq!(
                resolve(&decl, &web("md")).unwrap_err(),
                ResolutionError::EmptyMapping
            );
        }

        #[test]
        fn test_platform_before_os_before_viewport() {
            let decl = LocatorDeclaration::dimensioned()
                .platform(
                    "desktop",
                    LocatorDeclaration::dimensioned().os(
                        "windows",
                        LocatorDeclaration::dimensioned()
                            .viewport("default", "win-default")
                            .viewport("xl", "win-xl"),
                    ),
                )
                .build();
            let caps = Capabilities::new("desktop")
                .with_os("windows")
                .with_viewport("xl");
            let resolution = resolve_traced(&decl, &caps).unwrap();
            assert_eq!(resolution.selector, &Selector::css("win-xl"));
            assert_eq!(
                resolution.choices,
                vec![
                    (Dimension::Platform, "desktop".to_string()),
                    (Dimension::Os, "windows".to_string()),
                    (Dimension::Viewport, "xl".to_string()),
                ]
            );
        }

        #[test]
        fn test_nesting_order_does_not_change_outcome() {
            let platform_outer = LocatorDeclaration::dimensioned()
                .platform(
                    "web",
                    LocatorDeclaration::dimensioned()
                        .viewport("default", "wide")
                        .viewport("xs", "narrow"),
                )
                .platform("ios", "~native")
                .build();
            let viewport_outer = LocatorDeclaration::dimensioned()
                .viewport(
                    "default",
                    LocatorDeclaration::dimensioned()
                        .platform("web", "wide")
                        .platform("ios", "~native"),
                )
                .viewport(
                    "xs",
                    LocatorDeclaration::dimensioned()
                        .platform("web", "narrow")
                        .platform("ios", "~native"),
                )
                .build();
            for caps in [web("xs"), web("lg"), Capabilities::new("ios").with_viewport("xs")] {
                assert_eq!(
                    resolve(&platform_outer, &caps).unwrap(),
                    resolve(&viewport_outer, &caps).unwrap()
                );
            }
        }

        #[test]
        fn test_mixed_level_is_rejected() {
            let decl = LocatorDeclaration::dimensioned()
                .viewport("default", "by-viewport")
                .platform("web", "by-platform")
                .build();
            let mixed = ResolutionError::MixedDimensions {
                first: Dimension::Platform,
                second: Dimension::Viewport,
            };
            assert_eq!(resolve(&decl, &web("md")).unwrap_err(), mixed);
            assert_eq!(decl.validate().unwrap_err(), mixed);
        }

        #[test]
        fn test_nested_mixed_level_is_rejected() {
            let decl = LocatorDeclaration::dimensioned()
                .platform(
                    "web",
                    LocatorDeclaration::dimensioned()
                        .os("macos", "#mac")
                        .viewport("default", "#any"),
                )
                .build();
            let caps = web("md").with_os("macos");
            assert!(matches!(
                resolve(&decl, &caps),
                Err(ResolutionError::MixedDimensions {
                    first: Dimension::Os,
                    second: Dimension::Viewport
                })
            ));
        }

        #[test]
        fn test_branch_keys_match_case_insensitively() {
            let decl = LocatorDeclaration::dimensioned()
                .platform("Web", LocatorDeclaration::dimensioned().os("macOS", "#mac"))
                .platform("iOS", "~native")
                .build();
            let caps = Capabilities::new("web").with_os("macos");
            assert_eq!(resolve(&decl, &caps).unwrap(), &Selector::css("#mac"));
            assert_eq!(
                resolve(&decl, &Capabilities::new("ios")).unwrap(),
                &Selector::css("~native")
            );
            let traced = resolve_traced(&decl, &caps).unwrap();
            assert_eq!(traced.choices[0], (Dimension::Platform, "Web".to_string()));
        }

        #[test]
        fn test_os_has_no_default_fallback() {
            let decl = LocatorDeclaration::dimensioned()
                .os("default", "#any")
                .os("windows", "#win")
                .build();
            let caps = Capabilities::new("desktop").with_os("linux");
            match resolve(&decl, &caps).unwrap_err() {
                ResolutionError::MissingBranch {
                    dimension,
                    value,
                    declared,
                } => {
                    assert_eq!(dimension, Dimension::Os);
                    assert_eq!(value, "linux");
                    assert_eq!(declared, "default, windows");
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    mod serde_tests {
        use super::*;

        #[test]
        fn test_yaml_declaration() {
            let yaml = r#"
platform:
  web:
    viewport:
      default: "A"
      md: "B"
  android:
    accessibility_id: "menu"
"#;
            let decl = LocatorDeclaration::from_yaml(yaml).unwrap();
            assert!(decl.validate().is_ok());
            assert_eq!(resolve(&decl, &web("md")).unwrap(), &Selector::css("B"));
            assert_eq!(
                resolve(&decl, &Capabilities::new("android")).unwrap(),
                &Selector::accessibility_id("menu")
            );
        }

        #[test]
        fn test_static_yaml_declaration() {
            let decl = LocatorDeclaration::from_yaml("\"#checkout\"").unwrap();
            assert!(decl.is_static());
        }

        #[test]
        fn test_unknown_dimension_rejected() {
            let result = LocatorDeclaration::from_json(r##"{"locale": {"en": "#a"}}"##);
            assert!(result.is_err());
        }

        #[test]
        fn test_json_round_trip_preserves_resolution() {
            let decl = LocatorDeclaration::dimensioned()
                .platform("web", Selector::test_id("cart"))
                .build();
            let json = serde_json::to_string(&decl).unwrap();
            let back = LocatorDeclaration::from_json(&json).unwrap();
            assert_eq!(decl, back);
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_static_is_identity(
                css in "[a-z#.\\-]{1,20}",
                platform in "(web|ios|android|desktop)",
                viewport in "(xs|sm|md|lg|xl)"
            ) {
                let decl = LocatorDeclaration::css(css.clone());
                let caps = Capabilities::new(platform).with_viewport(viewport);
                prop_assert_eq!(resolve(&decl, &caps).unwrap(), &Selector::css(css));
            }

            #[test]
            fn prop_default_only_viewport_is_constant(viewport in "[a-z]{1,6}") {
                let decl = LocatorDeclaration::dimensioned()
                    .viewport("default", "only")
                    .build();
                prop_assert_eq!(
                    resolve(&decl, &web(&viewport)).unwrap(),
                    &Selector::css("only")
                );
            }

            #[test]
            fn prop_exact_viewport_preferred(viewport in "(xs|sm|md|lg|xl)") {
                let decl = LocatorDeclaration::dimensioned()
                    .viewport("default", "fallback")
                    .viewport(viewport.clone(), "exact")
                    .build();
                prop_assert_eq!(
                    resolve(&decl, &web(&viewport)).unwrap(),
                    &Selector::css("exact")
                );
            }
        }
    }
}
