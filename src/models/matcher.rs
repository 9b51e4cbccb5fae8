//! Application matchers for per-application layers.
//!
//! Window identification differs between X11 (WM_CLASS) and the various
//! Wayland compositors (app_id), so a matcher says how to compare rather than
//! assuming plain string equality.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a focused window's class is compared against an application name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppMatcher {
    /// Byte-for-byte equality
    Exact(String),
    /// Equality after case folding
    IgnoreCase(String),
    /// Regular expression search
    Pattern(String),
}

impl AppMatcher {
    /// The string or pattern being matched.
    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::Exact(v) | Self::IgnoreCase(v) | Self::Pattern(v) => v,
        }
    }

    /// Validates the matcher: non-empty, and a compilable regex for patterns.
    pub fn validate(&self) -> Result<()> {
        if self.value().is_empty() {
            anyhow::bail!("Application matcher cannot be empty");
        }
        if let Self::Pattern(pattern) = self {
            if let Err(e) = regex::Regex::new(pattern) {
                anyhow::bail!("Invalid application pattern '{}': {}", pattern, e);
            }
        }
        Ok(())
    }
}

impl fmt::Display for AppMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(v) => write!(f, "{v}"),
            Self::IgnoreCase(v) => write!(f, "{v} (any case)"),
            Self::Pattern(v) => write!(f, "/{v}/"),
        }
    }
}
