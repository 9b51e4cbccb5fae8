//! The complete layered keybinding specification.

use crate::models::layer::{Layer, Scope};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Name of the user global layer when none is given.
pub const DEFAULT_GLOBAL_LAYER_NAME: &str = "Global shortcuts";

/// Layered rule specification, before compilation.
///
/// Absence is always an empty collection, never a missing field.
///
/// # Validation
///
/// - Application layer names are non-empty and unique (case-sensitive)
/// - Application layers have `PerApplication` scope
/// - Conditional layers have `Conditional` scope
/// - The global layer has `Global` scope
/// - Every layer passes [`Layer::validate`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Emit the built-in Mac-style defaults first
    pub base_layer_enabled: bool,
    /// Per-application layers, in insertion order
    pub application_layers: Vec<Layer>,
    /// Predicate-scoped layers, in declaration order
    pub conditional_layers: Vec<Layer>,
    /// Unscoped user rules
    pub global_layer: Layer,
    /// Trusted trailing fragment, emitted verbatim
    pub raw_appendix: String,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            base_layer_enabled: true,
            application_layers: Vec::new(),
            conditional_layers: Vec::new(),
            global_layer: Layer::global(DEFAULT_GLOBAL_LAYER_NAME),
            raw_appendix: String::new(),
        }
    }
}

impl RuleSet {
    /// Creates a rule set with no user rules and the base layer toggled.
    #[must_use]
    pub fn new(base_layer_enabled: bool) -> Self {
        Self {
            base_layer_enabled,
            ..Self::default()
        }
    }

    /// Appends an application layer, rejecting duplicate names.
    pub fn add_application_layer(&mut self, layer: Layer) -> Result<()> {
        if !matches!(layer.scope, Scope::PerApplication(_)) {
            anyhow::bail!("Layer '{}' is not scoped to an application", layer.name);
        }
        if self.application_layer(&layer.name).is_some() {
            anyhow::bail!("Duplicate application layer '{}'", layer.name);
        }
        self.application_layers.push(layer);
        Ok(())
    }

    /// Looks up an application layer by its exact name.
    #[must_use]
    pub fn application_layer(&self, name: &str) -> Option<&Layer> {
        self.application_layers.iter().find(|l| l.name == name)
    }

    /// Appends a conditional layer.
    pub fn add_conditional_layer(&mut self, layer: Layer) -> Result<()> {
        if !matches!(layer.scope, Scope::Conditional(_)) {
            anyhow::bail!("Layer '{}' has no condition", layer.name);
        }
        self.conditional_layers.push(layer);
        Ok(())
    }

    /// Iterates every user layer in emission order.
    pub fn user_layers(&self) -> impl Iterator<Item = &Layer> {
        self.application_layers
            .iter()
            .chain(self.conditional_layers.iter())
            .chain(std::iter::once(&self.global_layer))
    }

    /// Total number of user rules across all layers.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.user_layers().map(|l| l.rules.len()).sum()
    }

    /// Validates every structural invariant of the model.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for layer in &self.application_layers {
            if layer.name.is_empty() {
                anyhow::bail!("Application identifier cannot be empty");
            }
            if !seen.insert(layer.name.as_str()) {
                anyhow::bail!("Duplicate application layer '{}'", layer.name);
            }
            if !matches!(layer.scope, Scope::PerApplication(_)) {
                anyhow::bail!("Layer '{}' is not scoped to an application", layer.name);
            }
            layer.validate()?;
        }

        for layer in &self.conditional_layers {
            if !matches!(layer.scope, Scope::Conditional(_)) {
                anyhow::bail!("Layer '{}' has no condition", layer.name);
            }
            layer.validate()?;
        }

        if self.global_layer.scope != Scope::Global {
            anyhow::bail!("Global layer '{}' must have global scope", self.global_layer.name);
        }
        self.global_layer.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::rule::{BindingRule, Predicate};

    #[test]
    fn test_default_enables_base_layer() {
        let rules = RuleSet::default();
        assert!(rules.base_layer_enabled);
        assert!(rules.application_layers.is_empty());
        assert_eq!(rules.global_layer.name, DEFAULT_GLOBAL_LAYER_NAME);
        assert!(rules.raw_appendix.is_empty());
        assert!(rules.validate().is_ok());
    }

    #[test]
    fn test_application_names_are_case_sensitive() {
        let mut rules = RuleSet::new(false);
        rules.add_application_layer(Layer::application("Firefox")).unwrap();
        rules.add_application_layer(Layer::application("firefox")).unwrap();
        assert!(rules.add_application_layer(Layer::application("Firefox")).is_err());
        assert_eq!(rules.application_layers.len(), 2);
    }

    #[test]
    fn test_add_application_layer_rejects_other_scopes() {
        let mut rules = RuleSet::new(false);
        assert!(rules.add_application_layer(Layer::global("Oops")).is_err());
        assert!(rules
            .add_conditional_layer(Layer::application("Firefox"))
            .is_err());
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut rules = RuleSet::new(true);
        for name in ["Zed", "Alacritty", "Firefox"] {
            rules.add_application_layer(Layer::application(name)).unwrap();
        }
        let names: Vec<_> = rules.application_layers.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Zed", "Alacritty", "Firefox"]);
    }

    #[test]
    fn test_validate_catches_duplicates_added_directly() {
        let mut rules = RuleSet::new(true);
        rules.application_layers.push(Layer::application("Kitty"));
        rules.application_layers.push(Layer::application("Kitty"));
        assert!(rules.validate().is_err());
    }

    #[test]
    fn test_validate_empty_identifier() {
        let mut rules = RuleSet::new(true);
        rules.application_layers.push(Layer::application(""));
        assert!(rules.validate().is_err());
    }

    #[test]
    fn test_rule_count_and_user_layers() {
        let mut rules = RuleSet::new(false);
        rules
            .add_application_layer(
                Layer::application("Firefox").with_rule(BindingRule::new("Cmd+T", "Ctrl+T")),
            )
            .unwrap();
        rules
            .add_conditional_layer(
                Layer::conditional("Night", Predicate::Hours { from: 22, to: 6 })
                    .with_rule(BindingRule::new("Cmd+Q", "Esc")),
            )
            .unwrap();
        rules.global_layer.add_rule(BindingRule::new("Cmd+Space", "Alt+F2"));

        assert_eq!(rules.rule_count(), 3);
        let order: Vec<_> = rules.user_layers().map(|l| l.name.as_str()).collect();
        assert_eq!(order, vec!["Firefox", "Night", DEFAULT_GLOBAL_LAYER_NAME]);
    }
}
