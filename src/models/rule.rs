//! Binding rules: one trigger mapped to one action, optionally guarded.

use crate::models::matcher::AppMatcher;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Output produced when a trigger fires.
///
/// In rule files an action is written as a single combo string, a list of
/// combo strings (typed in order), or a function call table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Action {
    /// One output combo (e.g., "Ctrl+T")
    Combo(String),
    /// Several combos emitted in order
    Sequence(Vec<String>),
    /// Structured call into the engine's function API
    Call(FunctionCall),
}

impl Action {
    /// Returns true if the action would produce no output.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Combo(combo) => combo.trim().is_empty(),
            Self::Sequence(combos) => {
                combos.is_empty() || combos.iter().any(|c| c.trim().is_empty())
            }
            Self::Call(FunctionCall::Text(text)) => text.is_empty(),
            Self::Call(FunctionCall::Launch(argv)) => {
                argv.first().map_or(true, |program| program.trim().is_empty())
            }
            Self::Call(FunctionCall::SleepMs(_)) => false,
        }
    }

    /// Combo strings this action emits, in order.
    #[must_use]
    pub fn combos(&self) -> Vec<&str> {
        match self {
            Self::Combo(combo) => vec![combo.as_str()],
            Self::Sequence(combos) => combos.iter().map(String::as_str).collect(),
            Self::Call(_) => Vec::new(),
        }
    }
}

/// Engine function calls an action may invoke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionCall {
    /// Type a literal string
    Text(String),
    /// Spawn a program (argv form)
    Launch(Vec<String>),
    /// Pause between outputs
    SleepMs(u64),
}

/// Runtime condition evaluated by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// Focused window class matches
    WindowClass(AppMatcher),
    /// Focused window title matches a regex
    WindowTitle(String),
    /// Local hour is within `[from, to)`; wraps midnight when `from > to`
    Hours {
        /// First active hour (0-23)
        from: u8,
        /// First inactive hour (0-23)
        to: u8,
    },
}

impl Predicate {
    /// Validates patterns and hour ranges.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::WindowClass(matcher) => matcher.validate(),
            Self::WindowTitle(pattern) => {
                if let Err(e) = regex::Regex::new(pattern) {
                    anyhow::bail!("Invalid window title pattern '{}': {}", pattern, e);
                }
                Ok(())
            }
            Self::Hours { from, to } => {
                if *from > 23 || *to > 23 {
                    anyhow::bail!("Hours must be between 0 and 23 (got {}-{})", from, to);
                }
                if from == to {
                    anyhow::bail!("Hour range {}-{} is empty", from, to);
                }
                Ok(())
            }
        }
    }
}

/// A single trigger -> action mapping.
///
/// # Validation
///
/// - `action` must be non-empty (checked here)
/// - `trigger` must be a valid combo (checked by the compiler against the
///   key vocabulary, so every bad trigger is reported together)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingRule {
    /// `+`-joined modifier and key tokens (e.g., "Cmd+Shift+T")
    pub trigger: String,
    /// What the trigger produces
    pub action: Action,
    /// Optional runtime guard
    #[serde(default, rename = "when", skip_serializing_if = "Option::is_none")]
    pub predicate: Option<Predicate>,
}

impl BindingRule {
    /// Creates a rule mapping a trigger to a single output combo.
    pub fn new(trigger: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            trigger: trigger.into(),
            action: Action::Combo(output.into()),
            predicate: None,
        }
    }

    /// Creates a rule with an arbitrary action.
    pub fn with_action(trigger: impl Into<String>, action: Action) -> Self {
        Self {
            trigger: trigger.into(),
            action,
            predicate: None,
        }
    }

    /// Guards this rule with a predicate.
    #[must_use]
    pub fn when(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Trigger split into its tokens, whitespace trimmed.
    #[must_use]
    pub fn trigger_tokens(&self) -> Vec<&str> {
        self.trigger.split('+').map(str::trim).collect()
    }

    /// Checks the invariants that do not need the key vocabulary.
    pub fn validate(&self) -> Result<()> {
        if self.action.is_empty() {
            anyhow::bail!("Rule '{}' has an empty action", self.trigger);
        }
        if let Some(predicate) = &self.predicate {
            predicate.validate()?;
        }
        Ok(())
    }
}
