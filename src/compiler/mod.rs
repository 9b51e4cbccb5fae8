//! Configuration compiler.
//!
//! Turns a [`RuleSet`] plus the detected [`PlatformFacts`] into one
//! configuration script for the remapping engine. Output order is fixed:
//! preamble, session facts, base layer, application layers, conditional
//! layers, global layer, raw appendix. The same inputs always produce the
//! same bytes.

pub mod defaults;
pub mod emitter;
pub mod validator;

use crate::keys::KeyDb;
use crate::models::{Layer, Predicate, RuleSet, Scope};
use crate::platform::PlatformFacts;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt::Write;
use thiserror::Error;
use validator::{resolve_layer, ResolvedRule};

pub use defaults::{base_layer, BASE_LAYER_NAME};
pub use validator::{RuleError, RuleErrorKind, ValidationReport, ValidationWarning};

/// Fixed header of every artifact.
const PREAMBLE: &str = "\
# Generated by macmap. Do not edit: this file is rewritten on every compile.
# Edit rules.toml instead.

import re
from datetime import datetime

from xwaykeyz.models import *
from xwaykeyz.config_api import *
";

const APPENDIX_MARKER: &str = "\
# ---------------------------------------------------------------------------
# User appendix: trusted and emitted verbatim, never parsed or validated.
# ---------------------------------------------------------------------------
";

/// Compiled configuration text and its fingerprints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledArtifact {
    /// The configuration script
    pub text: String,
    /// SHA-256 of `text`, lowercase hex
    pub digest: String,
    /// SHA-256 of the canonical JSON of the inputs, lowercase hex
    pub generated_from: String,
}

/// Why compilation failed.
#[derive(Debug, Clone, Error)]
pub enum CompileError {
    /// One or more rules failed syntactic validation
    #[error("{}", .0.format_message().trim_end())]
    InvalidRules(ValidationReport),
    /// The embedded key vocabulary could not be loaded
    #[error("failed to load key vocabulary: {0}")]
    Vocabulary(String),
    /// The inputs could not be serialized for fingerprinting
    #[error("failed to fingerprint compile inputs: {0}")]
    Fingerprint(String),
}

/// SHA-256 of `bytes` as lowercase hex.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[derive(Serialize)]
struct Inputs<'a> {
    rules: &'a RuleSet,
    facts: &'a PlatformFacts,
}

/// Compiler bound to a key vocabulary.
#[derive(Debug, Clone, Copy)]
pub struct ConfigurationCompiler<'k> {
    keys: &'k KeyDb,
}

impl ConfigurationCompiler<'static> {
    /// Compiler over the embedded vocabulary.
    pub fn shared() -> Result<Self, CompileError> {
        KeyDb::shared()
            .map(Self::new)
            .map_err(|e| CompileError::Vocabulary(format!("{e:#}")))
    }
}

impl<'k> ConfigurationCompiler<'k> {
    /// Creates a compiler using `keys` to validate combos.
    #[must_use]
    pub const fn new(keys: &'k KeyDb) -> Self {
        Self { keys }
    }

    /// Validates every user rule without emitting anything.
    #[must_use]
    pub fn validate(&self, rules: &RuleSet) -> ValidationReport {
        validator::validate_rules(self.keys, rules)
    }

    /// Compiles `rules` for the session described by `facts`.
    ///
    /// Fails only when a trigger or output combo is invalid; every invalid
    /// rule is listed in the returned report.
    pub fn compile(
        &self,
        rules: &RuleSet,
        facts: &PlatformFacts,
    ) -> Result<CompiledArtifact, CompileError> {
        let mut report = ValidationReport::new();

        let base = rules.base_layer_enabled.then(defaults::base_layer);
        let base_rules = base
            .as_ref()
            .map(|layer| resolve_layer(self.keys, layer, &mut report));
        let app_rules: Vec<_> = rules
            .application_layers
            .iter()
            .map(|layer| resolve_layer(self.keys, layer, &mut report))
            .collect();
        let cond_rules: Vec<_> = rules
            .conditional_layers
            .iter()
            .map(|layer| resolve_layer(self.keys, layer, &mut report))
            .collect();
        let global_rules = resolve_layer(self.keys, &rules.global_layer, &mut report);

        if !report.is_valid() {
            return Err(CompileError::InvalidRules(report));
        }

        let mut text = String::from(PREAMBLE);
        emit_session(&mut text, facts);

        if let (Some(layer), Some(resolved)) = (&base, &base_rules) {
            emit_base(&mut text, layer, resolved);
        }
        for (layer, resolved) in rules.application_layers.iter().zip(&app_rules) {
            emit_scoped(&mut text, layer, resolved);
        }
        for (layer, resolved) in rules.conditional_layers.iter().zip(&cond_rules) {
            emit_scoped(&mut text, layer, resolved);
        }
        emit_scoped(&mut text, &rules.global_layer, &global_rules);

        if !rules.raw_appendix.is_empty() {
            text.push('\n');
            text.push_str(APPENDIX_MARKER);
            text.push_str(&rules.raw_appendix);
        }

        let inputs = serde_json::to_vec(&Inputs { rules, facts })
            .map_err(|e| CompileError::Fingerprint(e.to_string()))?;

        Ok(CompiledArtifact {
            digest: sha256_hex(text.as_bytes()),
            generated_from: sha256_hex(&inputs),
            text,
        })
    }
}

/// Compiles with the embedded vocabulary.
pub fn compile(rules: &RuleSet, facts: &PlatformFacts) -> Result<CompiledArtifact, CompileError> {
    ConfigurationCompiler::shared()?.compile(rules, facts)
}

fn emit_session(out: &mut String, facts: &PlatformFacts) {
    use emitter::string_literal;

    let caps: Vec<String> = facts
        .capabilities
        .iter()
        .map(|c| string_literal(c))
        .collect();
    let caps = if caps.is_empty() {
        "frozenset()".to_string()
    } else {
        format!("frozenset({{{}}})", caps.join(", "))
    };

    let _ = write!(
        out,
        "\n# Session\n\
         SESSION_TYPE = {}\n\
         DESKTOP_ENV = {}\n\
         COMPOSITOR = {}\n\
         ARCH = {}\n\
         CAPABILITIES = {}\n\
         COMPATIBILITY_MODE = {}\n\
         \n\
         environ_api(session_type=SESSION_TYPE, wl_compositor=COMPOSITOR, wl_desktop_env=DESKTOP_ENV)\n",
        string_literal(facts.display_server.as_str()),
        string_literal(&facts.desktop_environment),
        string_literal(&facts.compositor),
        string_literal(facts.architecture.as_str()),
        caps,
        if facts.compatibility_mode { "True" } else { "False" },
    );
}

fn emit_base(out: &mut String, layer: &Layer, resolved: &[ResolvedRule<'_>]) {
    let _ = writeln!(out, "\n# Built-in Mac-style bindings");
    let _ = writeln!(out, "keymap({}, {{", emitter::string_literal(&layer.name));
    for (idx, rule) in resolved.iter().enumerate() {
        let _ = write!(
            out,
            "    {}: {},",
            emitter::combo(&rule.trigger),
            emitter::action(&rule.action)
        );
        if let Some(desc) = defaults::description(idx) {
            let _ = write!(out, "  # {desc}");
        }
        out.push('\n');
    }
    out.push_str("})\n");
}

/// Emits a user layer: one block for unguarded rules, then one block per
/// distinct rule predicate in first-seen order.
fn emit_scoped(out: &mut String, layer: &Layer, resolved: &[ResolvedRule<'_>]) {
    let (title, heading, scope_condition) = match &layer.scope {
        Scope::PerApplication(matcher) => (
            format!("App: {}", layer.name),
            "Application layer",
            Some(emitter::matcher_condition(matcher)),
        ),
        Scope::Conditional(predicate) => (
            layer.name.clone(),
            "Conditional layer",
            Some(emitter::predicate_condition(predicate)),
        ),
        Scope::Global => (layer.name.clone(), "Global layer", None),
    };

    let _ = write!(out, "\n# {} {}", heading, emitter::string_literal(&layer.name));
    if let Some(cond) = &scope_condition {
        let _ = write!(out, " when {cond}");
    }
    if resolved.is_empty() {
        out.push_str(": no bindings\n");
        return;
    }
    out.push('\n');

    let mut groups: Vec<(Option<&Predicate>, Vec<&ResolvedRule<'_>>)> = vec![(None, Vec::new())];
    for rule in resolved {
        let predicate = rule.source.predicate.as_ref();
        match groups.iter_mut().find(|(p, _)| *p == predicate) {
            Some((_, members)) => members.push(rule),
            None => groups.push((predicate, vec![rule])),
        }
    }

    for (predicate, members) in groups {
        if members.is_empty() {
            continue;
        }
        let mut conditions: Vec<String> = scope_condition.iter().cloned().collect();
        let block_title = match predicate {
            Some(p) => {
                conditions.push(emitter::predicate_condition(p));
                format!("{title} / {}", emitter::predicate_label(p))
            }
            None => title.clone(),
        };
        emit_block(out, &block_title, &members, &conditions);
    }
}

fn emit_block(out: &mut String, title: &str, rules: &[&ResolvedRule<'_>], conditions: &[String]) {
    let _ = writeln!(out, "keymap({}, {{", emitter::string_literal(title));
    for rule in rules {
        let _ = writeln!(
            out,
            "    {}: {},",
            emitter::combo(&rule.trigger),
            emitter::action(&rule.action)
        );
    }
    if conditions.is_empty() {
        out.push_str("})\n");
    } else {
        let _ = writeln!(out, "}}, when={})", emitter::lambda(conditions));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Action, AppMatcher, BindingRule, FunctionCall};
    use crate::platform::{Architecture, DisplayServer};
    use std::collections::BTreeSet;

    fn facts() -> PlatformFacts {
        PlatformFacts {
            architecture: Architecture::X86_64,
            display_server: DisplayServer::Wayland,
            compositor: "sway".to_string(),
            desktop_environment: "sway".to_string(),
            capabilities: BTreeSet::from(["window-context".to_string()]),
            compatibility_mode: false,
        }
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_empty_rule_set_compiles() {
        let artifact = compile(&RuleSet::new(false), &facts()).unwrap();
        assert!(artifact.text.starts_with(PREAMBLE));
        assert!(!artifact.text.contains("keymap("));
        assert!(artifact.text.contains("no bindings"));
        assert_eq!(artifact.digest.len(), 64);
        assert_eq!(artifact.generated_from.len(), 64);
    }

    #[test]
    fn test_session_block() {
        let artifact = compile(&RuleSet::new(false), &facts()).unwrap();
        assert!(artifact.text.contains("SESSION_TYPE = \"wayland\""));
        assert!(artifact.text.contains("COMPOSITOR = \"sway\""));
        assert!(artifact
            .text
            .contains("CAPABILITIES = frozenset({\"window-context\"})"));
        assert!(artifact.text.contains("COMPATIBILITY_MODE = False"));
    }

    #[test]
    fn test_base_layer_emitted_with_comments() {
        let artifact = compile(&RuleSet::default(), &facts()).unwrap();
        assert!(artifact
            .text
            .contains("    C(\"Super-a\"): C(\"C-a\"),  # Select all\n"));
        assert!(artifact.text.contains("C(\"Super-q\"): C(\"Alt-f4\")"));
    }

    #[test]
    fn test_predicate_rules_get_own_block() {
        let mut rules = RuleSet::new(false);
        rules
            .add_application_layer(
                Layer::application("Firefox")
                    .with_rule(BindingRule::new("Cmd+T", "Ctrl+T"))
                    .with_rule(
                        BindingRule::with_action(
                            "Cmd+Y",
                            Action::Call(FunctionCall::Text("hi".to_string())),
                        )
                        .when(Predicate::Hours { from: 9, to: 17 }),
                    ),
            )
            .unwrap();

        let text = compile(&rules, &facts()).unwrap().text;
        assert!(text.contains(
            "keymap(\"App: Firefox\", {\n    C(\"Super-t\"): C(\"C-t\"),\n}, when=lambda ctx: ctx.wm_class == \"Firefox\")"
        ));
        assert!(text.contains(
            "keymap(\"App: Firefox / hours 09-17\", {\n    C(\"Super-y\"): ST(\"hi\"),\n}, when=lambda ctx: (ctx.wm_class == \"Firefox\") and (9 <= datetime.now().hour < 17))"
        ));
    }

    #[test]
    fn test_sequence_output() {
        let mut rules = RuleSet::new(false);
        rules.global_layer.add_rule(BindingRule::with_action(
            "Cmd+Shift+K",
            Action::Sequence(vec!["Ctrl+K".to_string(), "Ctrl+U".to_string()]),
        ));
        let text = compile(&rules, &facts()).unwrap().text;
        assert!(text.contains("C(\"Super-Shift-k\"): [C(\"C-k\"), C(\"C-u\")],"));
    }

    #[test]
    fn test_invalid_trigger_fails_with_report() {
        let mut rules = RuleSet::new(true);
        rules
            .add_application_layer(
                Layer::application("Kitty")
                    .matching(AppMatcher::IgnoreCase("kitty".to_string()))
                    .with_rule(BindingRule::new("Cmd+Banana", "Ctrl+T")),
            )
            .unwrap();

        match compile(&rules, &facts()) {
            Err(CompileError::InvalidRules(report)) => {
                assert_eq!(report.errors.len(), 1);
                assert_eq!(report.errors[0].layer, "Kitty");
            }
            other => panic!("expected InvalidRules, got {other:?}"),
        }
    }

    #[test]
    fn test_appendix_verbatim_and_last() {
        let mut rules = RuleSet::new(false);
        rules.raw_appendix = "keymap(\"raw\", {})  # not parsed".to_string();
        let text = compile(&rules, &facts()).unwrap().text;
        assert!(text.ends_with("keymap(\"raw\", {})  # not parsed"));
        assert!(text.contains(APPENDIX_MARKER));
    }

    #[test]
    fn test_generated_from_tracks_facts() {
        let rules = RuleSet::default();
        let a = compile(&rules, &facts()).unwrap();
        let mut other = facts();
        other.display_server = DisplayServer::X11;
        let b = compile(&rules, &other).unwrap();
        assert_ne!(a.generated_from, b.generated_from);
        assert_ne!(a.digest, b.digest);
    }
}
