//! Runtime Capability Snapshots
//!
//! The backend reports what it is driving (platform, operating system,
//! viewport size). The locator resolver works on named dimension values, so
//! the raw viewport width is mapped onto a breakpoint name here.

use crate::result::{StrataError, StrataResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw device description reported by a backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    /// Platform family (e.g. "web", "android", "ios", "desktop")
    pub platform: String,
    /// Operating system, if the backend knows it
    pub os: Option<String>,
    /// Viewport width in CSS pixels
    pub viewport_width: u32,
    /// Viewport height in CSS pixels
    pub viewport_height: u32,
}

impl DeviceSnapshot {
    /// Create a new snapshot
    #[must_use]
    pub fn new(platform: impl Into<String>, viewport_width: u32, viewport_height: u32) -> Self {
        Self {
            platform: platform.into(),
            os: None,
            viewport_width,
            viewport_height,
        }
    }

    /// Set the operating system
    #[must_use]
    pub fn with_os(mut self, os: impl Into<String>) -> Self {
        self.os = Some(os.into());
        self
    }

    /// Desktop web browser at 1920x1080
    #[must_use]
    pub fn desktop_web() -> Self {
        Self::new("web", 1920, 1080).with_os("linux")
    }

    /// Mobile web browser at 393x852
    #[must_use]
    pub fn mobile_web() -> Self {
        Self::new("web", 393, 852).with_os("ios")
    }
}

/// A named viewport breakpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakpoint {
    /// Key used in locator declarations (e.g. "md")
    pub name: String,
    /// Smallest viewport width, inclusive, that falls into this breakpoint
    pub min_width: u32,
}

impl Breakpoint {
    /// Create a new breakpoint
    #[must_use]
    pub fn new(name: impl Into<String>, min_width: u32) -> Self {
        Self {
            name: name.into(),
            min_width,
        }
    }
}

/// Ordered viewport breakpoint table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BreakpointTable {
    breakpoints: Vec<Breakpoint>,
}

impl Default for BreakpointTable {
    fn default() -> Self {
        Self {
            breakpoints: vec![
                Breakpoint::new("xs", 0),
                Breakpoint::new("sm", 576),
                Breakpoint::new("md", 768),
                Breakpoint::new("lg", 992),
                Breakpoint::new("xl", 1200),
                Breakpoint::new("xxl", 1400),
            ],
        }
    }
}

impl BreakpointTable {
    /// Create a table from breakpoints sorted by ascending min width
    pub fn new(breakpoints: Vec<Breakpoint>) -> StrataResult<Self> {
        let table = Self { breakpoints };
        table.validate()?;
        Ok(table)
    }

    /// Check the table is non-empty, starts at zero and is strictly ascending
    pub fn validate(&self) -> StrataResult<()> {
        let Some(first) = self.breakpoints.first() else {
            return Err(StrataError::config("breakpoint table is empty"));
        };
        if first.min_width != 0 {
            return Err(StrataError::config(format!(
                "first breakpoint '{}' must start at width 0",
                first.name
            )));
        }
        for pair in self.breakpoints.windows(2) {
            if pair[1].min_width <= pair[0].min_width {
                return Err(StrataError::config(format!(
                    "breakpoint '{}' is not wider than '{}'",
                    pair[1].name, pair[0].name
                )));
            }
        }
        Ok(())
    }

    /// Name of the breakpoint a viewport width falls into
    #[must_use]
    pub fn classify(&self, width: u32) -> &str {
        self.breakpoints
            .iter()
            .rev()
            .find(|bp| bp.min_width <= width)
            .or_else(|| self.breakpoints.first())
            .map_or("default", |bp| bp.name.as_str())
    }

    /// Breakpoint names in ascending order
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.breakpoints.iter().map(|bp| bp.name.as_str()).collect()
    }
}

/// Dimension values the locator resolver selects branches by
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Platform key, lowercase
    pub platform: String,
    /// Operating system key, lowercase
    pub os: Option<String>,
    /// Viewport breakpoint key
    pub viewport: Option<String>,
}

impl Capabilities {
    /// Create capabilities for a platform
    #[must_use]
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into().to_ascii_lowercase(),
            os: None,
            viewport: None,
        }
    }

    /// Set the operating system
    #[must_use]
    pub fn with_os(mut self, os: impl Into<String>) -> Self {
        self.os = Some(os.into().to_ascii_lowercase());
        self
    }

    /// Set the viewport breakpoint
    #[must_use]
    pub fn with_viewport(mut self, viewport: impl Into<String>) -> Self {
        self.viewport = Some(viewport.into());
        self
    }

    /// Derive resolver capabilities from a backend snapshot
    #[must_use]
    pub fn from_snapshot(snapshot: &DeviceSnapshot, breakpoints: &BreakpointTable) -> Self {
        let caps = Self::new(&snapshot.platform)
            .with_viewport(breakpoints.classify(snapshot.viewport_width));
        match &snapshot.os {
            Some(os) => caps.with_os(os),
            None => caps,
        }
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "platform={} os={} viewport={}",
            self.platform,
            self.os.as_deref().unwrap_or("-"),
            self.viewport.as_deref().unwrap_or("-")
        )
    }
}
