//! Layers: named, scoped groups of binding rules.

use crate::models::matcher::AppMatcher;
use crate::models::rule::{BindingRule, Predicate};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Where a layer's rules are active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Everywhere
    Global,
    /// Only while the focused window matches
    PerApplication(AppMatcher),
    /// Only while the predicate holds
    Conditional(Predicate),
}

/// A named, ordered collection of rules sharing one activation scope.
///
/// # Validation
///
/// - Name must be non-empty, max 100 characters
/// - Every rule must pass [`BindingRule::validate`]
/// - Scope matcher / predicate must be valid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    /// Human-readable name; for application layers this is the unique key
    pub name: String,
    /// Activation scope
    pub scope: Scope,
    /// Rules in declaration order
    pub rules: Vec<BindingRule>,
}

impl Layer {
    /// Creates an empty global layer.
    pub fn global(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: Scope::Global,
            rules: Vec::new(),
        }
    }

    /// Creates an empty layer for an application, matched exactly by name.
    pub fn application(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            scope: Scope::PerApplication(AppMatcher::Exact(name.clone())),
            name,
            rules: Vec::new(),
        }
    }

    /// Creates an empty conditional layer.
    pub fn conditional(name: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            name: name.into(),
            scope: Scope::Conditional(predicate),
            rules: Vec::new(),
        }
    }

    /// Replaces the application matcher (no-op for other scopes).
    #[must_use]
    pub fn matching(mut self, matcher: AppMatcher) -> Self {
        if matches!(self.scope, Scope::PerApplication(_)) {
            self.scope = Scope::PerApplication(matcher);
        }
        self
    }

    /// Appends a rule.
    #[must_use]
    pub fn with_rule(mut self, rule: BindingRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Appends a rule in place.
    pub fn add_rule(&mut self, rule: BindingRule) {
        self.rules.push(rule);
    }

    /// Returns true if the layer has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Validates name, scope and every rule.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Layer name cannot be empty");
        }
        if self.name.len() > 100 {
            anyhow::bail!(
                "Layer name '{}' exceeds maximum length of 100 characters (got {})",
                self.name,
                self.name.len()
            );
        }

        match &self.scope {
            Scope::Global => {}
            Scope::PerApplication(matcher) => matcher.validate()?,
            Scope::Conditional(predicate) => predicate.validate()?,
        }

        for (idx, rule) in self.rules.iter().enumerate() {
            if let Err(e) = rule.validate() {
                anyhow::bail!("Layer '{}', rule {}: {}", self.name, idx + 1, e);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application_layer_defaults_to_exact_match() {
        let layer = Layer::application("Firefox");
        assert_eq!(
            layer.scope,
            Scope::PerApplication(AppMatcher::Exact("Firefox".to_string()))
        );
        assert!(layer.is_empty());
    }

    #[test]
    fn test_matching_only_changes_application_scope() {
        let app = Layer::application("Code").matching(AppMatcher::IgnoreCase("code".to_string()));
        assert_eq!(
            app.scope,
            Scope::PerApplication(AppMatcher::IgnoreCase("code".to_string()))
        );

        let global = Layer::global("Global").matching(AppMatcher::Exact("x".to_string()));
        assert_eq!(global.scope, Scope::Global);
    }

    #[test]
    fn test_validate_reports_rule_position() {
        let layer = Layer::global("Global")
            .with_rule(BindingRule::new("Cmd+T", "Ctrl+T"))
            .with_rule(BindingRule::new("Cmd+W", ""));

        let err = layer.validate().unwrap_err().to_string();
        assert!(err.contains("rule 2"), "unexpected error: {err}");
    }

    #[test]
    fn test_validate_name() {
        assert!(Layer::global("").validate().is_err());
        assert!(Layer::global("a".repeat(101)).validate().is_err());
        assert!(Layer::global("Global").validate().is_ok());
    }
}
