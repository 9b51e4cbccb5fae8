//! Trigger and output validation against the key vocabulary.
//!
//! Every rule is checked before anything is emitted so that all problems are
//! reported together instead of one per compile attempt.

// Allow format! appended to String - more readable for building messages
#![allow(clippy::format_push_string)]

use crate::keys::{Combo, ComboError, KeyDb};
use crate::models::{Action, BindingRule, FunctionCall, Layer, RuleSet};
use std::collections::HashSet;

/// Validation result with specific errors and warnings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// Problems that prevent compilation
    pub errors: Vec<RuleError>,
    /// Non-critical findings
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    /// Creates a new empty validation report.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Returns true if there are no errors (warnings are allowed).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Adds an error to the report.
    pub fn add_error(&mut self, error: RuleError) {
        self.errors.push(error);
    }

    /// Adds a warning to the report.
    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Formats the report as a user-friendly message.
    #[must_use]
    pub fn format_message(&self) -> String {
        let mut message = String::new();

        if !self.errors.is_empty() {
            message.push_str(&format!("{} invalid rules:\n", self.errors.len()));
            for (idx, error) in self.errors.iter().enumerate() {
                message.push_str(&format!("  {}. {}\n", idx + 1, error));
            }
        }

        if !self.warnings.is_empty() {
            message.push_str(&format!("{} warnings:\n", self.warnings.len()));
            for (idx, warning) in self.warnings.iter().enumerate() {
                message.push_str(&format!("  {}. {}\n", idx + 1, warning));
            }
        }

        message
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

/// A rule that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleError {
    /// Type of problem
    pub kind: RuleErrorKind,
    /// Name of the layer holding the rule
    pub layer: String,
    /// 1-based rule position within the layer
    pub index: usize,
    /// Trigger as written
    pub trigger: String,
    /// Human-readable description
    pub message: String,
}

impl RuleError {
    fn new(kind: RuleErrorKind, layer: &Layer, index: usize, message: impl Into<String>) -> Self {
        Self {
            kind,
            layer: layer.name.clone(),
            index: index + 1,
            trigger: layer.rules[index].trigger.clone(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RuleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{} #{}] {}: '{}': {}",
            self.layer, self.index, self.kind, self.trigger, self.message
        )
    }
}

/// Types of rule errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleErrorKind {
    /// Trigger is not a valid combo
    InvalidTrigger,
    /// An output combo is not a valid combo
    InvalidOutput,
    /// The action produces no output
    EmptyAction,
}

impl std::fmt::Display for RuleErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTrigger => write!(f, "Invalid Trigger"),
            Self::InvalidOutput => write!(f, "Invalid Output"),
            Self::EmptyAction => write!(f, "Empty Action"),
        }
    }
}

/// Validation warning (non-blocking).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    /// Warning message
    pub message: String,
}

impl ValidationWarning {
    /// Creates a new validation warning
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Output of a rule after its combos were resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ResolvedAction {
    Combos(Vec<Combo>),
    Call(FunctionCall),
}

/// A rule whose trigger and outputs passed validation.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedRule<'a> {
    pub trigger: Combo,
    pub action: ResolvedAction,
    pub source: &'a BindingRule,
}

fn describe(err: &ComboError) -> String {
    match err {
        ComboError::UnknownToken(token) if token.contains('-') => {
            format!("{err} (separate tokens with '+')")
        }
        _ => err.to_string(),
    }
}

/// Resolves every rule of a layer, recording failures in `report`.
pub(crate) fn resolve_layer<'a>(
    keys: &KeyDb,
    layer: &'a Layer,
    report: &mut ValidationReport,
) -> Vec<ResolvedRule<'a>> {
    let mut resolved = Vec::with_capacity(layer.rules.len());
    let mut seen = HashSet::new();

    for (idx, rule) in layer.rules.iter().enumerate() {
        let trigger = match keys.parse_combo(&rule.trigger) {
            Ok(combo) => Some(combo),
            Err(e) => {
                report.add_error(RuleError::new(
                    RuleErrorKind::InvalidTrigger,
                    layer,
                    idx,
                    describe(&e),
                ));
                None
            }
        };

        let action = match &rule.action {
            action if action.is_empty() => {
                report.add_error(RuleError::new(
                    RuleErrorKind::EmptyAction,
                    layer,
                    idx,
                    "action produces no output",
                ));
                None
            }
            Action::Call(call) => Some(ResolvedAction::Call(call.clone())),
            action => {
                let mut combos = Vec::new();
                let mut ok = true;
                for text in action.combos() {
                    match keys.parse_combo(text) {
                        Ok(combo) => combos.push(combo),
                        Err(e) => {
                            ok = false;
                            report.add_error(RuleError::new(
                                RuleErrorKind::InvalidOutput,
                                layer,
                                idx,
                                format!("output '{}': {}", text, describe(&e)),
                            ));
                        }
                    }
                }
                ok.then_some(ResolvedAction::Combos(combos))
            }
        };

        if let (Some(trigger), Some(action)) = (trigger, action) {
            let key = (trigger.to_engine(), rule.predicate.clone());
            if !seen.insert(key) {
                report.add_warning(ValidationWarning::new(format!(
                    "Layer '{}' binds '{}' more than once; the later rule wins",
                    layer.name, trigger
                )));
            }
            resolved.push(ResolvedRule {
                trigger,
                action,
                source: rule,
            });
        }
    }

    resolved
}

/// Checks every user rule of a rule set without emitting anything.
#[must_use]
pub fn validate_rules(keys: &KeyDb, rules: &RuleSet) -> ValidationReport {
    let mut report = ValidationReport::new();
    for layer in rules.user_layers() {
        resolve_layer(keys, layer, &mut report);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BindingRule, Layer, Predicate};

    fn keys() -> &'static KeyDb {
        KeyDb::shared().expect("Failed to load key database")
    }

    #[test]
    fn test_valid_rules() {
        let mut rules = RuleSet::default();
        rules.global_layer.add_rule(BindingRule::new("Cmd+Shift+T", "Ctrl+Shift+T"));
        let report = validate_rules(keys(), &rules);
        assert!(report.is_valid());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_invalid_trigger_reported_with_position() {
        let mut rules = RuleSet::default();
        rules.global_layer.add_rule(BindingRule::new("Cmd+T", "Ctrl+T"));
        rules.global_layer.add_rule(BindingRule::new("Cmd+Hyper", "Ctrl+T"));

        let report = validate_rules(keys(), &rules);
        assert_eq!(report.errors.len(), 1);
        let error = &report.errors[0];
        assert_eq!(error.kind, RuleErrorKind::InvalidTrigger);
        assert_eq!(error.index, 2);
        assert_eq!(error.trigger, "Cmd+Hyper");
    }

    #[test]
    fn test_all_errors_collected() {
        let mut rules = RuleSet::default();
        rules
            .add_application_layer(
                Layer::application("Firefox")
                    .with_rule(BindingRule::new("", "Ctrl+T"))
                    .with_rule(BindingRule::new("Cmd+T", "Ctrl+Nope")),
            )
            .unwrap();
        rules.global_layer.add_rule(BindingRule::new("Cmd++", "Ctrl+T"));

        let report = validate_rules(keys(), &rules);
        assert_eq!(report.errors.len(), 3);
        assert_eq!(report.errors[1].kind, RuleErrorKind::InvalidOutput);
        assert!(report.format_message().contains("3 invalid rules"));
    }

    #[test]
    fn test_dash_hint() {
        let mut rules = RuleSet::default();
        rules.global_layer.add_rule(BindingRule::new("Cmd-T", "Ctrl+T"));
        let report = validate_rules(keys(), &rules);
        assert!(report.errors[0].message.contains("'+'"));
    }

    #[test]
    fn test_empty_actions_rejected() {
        let mut rules = RuleSet::new(false);
        rules.global_layer.add_rule(BindingRule::with_action(
            "Cmd+T",
            Action::Sequence(Vec::new()),
        ));
        rules.global_layer.add_rule(BindingRule::with_action(
            "Cmd+W",
            Action::Call(FunctionCall::Launch(Vec::new())),
        ));
        rules.global_layer.add_rule(BindingRule::new("Cmd+N", "  "));

        let report = validate_rules(keys(), &rules);
        assert_eq!(report.errors.len(), 3);
        assert!(report
            .errors
            .iter()
            .all(|e| e.kind == RuleErrorKind::EmptyAction));
        assert_eq!(report.errors[1].trigger, "Cmd+W");
    }

    #[test]
    fn test_reordered_modifiers_are_duplicates() {
        let mut rules = RuleSet::default();
        rules.global_layer.add_rule(BindingRule::new("Cmd+Shift+T", "Ctrl+Shift+T"));
        rules.global_layer.add_rule(BindingRule::new("Shift+Cmd+T", "Ctrl+T"));

        let report = validate_rules(keys(), &rules);
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].message.contains("Cmd+Shift+t"));
    }

    #[test]
    fn test_duplicate_trigger_warns() {
        let mut rules = RuleSet::default();
        rules.global_layer.add_rule(BindingRule::new("Cmd+T", "Ctrl+T"));
        rules.global_layer.add_rule(BindingRule::new("cmd + t", "Ctrl+N"));
        rules.global_layer.add_rule(
            BindingRule::new("Cmd+T", "Ctrl+W").when(Predicate::Hours { from: 9, to: 17 }),
        );

        let report = validate_rules(keys(), &rules);
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 1);
    }
}
