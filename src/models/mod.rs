//! Data models for layered keybinding rules.
//!
//! This module contains the in-memory rule set handed to the compiler.
//! Models are independent of file formats and of the daemon.

pub mod layer;
pub mod matcher;
pub mod rule;
pub mod ruleset;

// Re-export all model types
pub use layer::{Layer, Scope};
pub use matcher::AppMatcher;
pub use rule::{Action, BindingRule, FunctionCall, Predicate};
pub use ruleset::{RuleSet, DEFAULT_GLOBAL_LAYER_NAME};
