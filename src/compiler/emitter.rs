//! Text emission helpers for the engine's Python configuration syntax.
//!
//! Every user-provided string reaches the output through [`string_literal`].

use crate::compiler::validator::ResolvedAction;
use crate::keys::Combo;
use crate::models::{AppMatcher, FunctionCall, Predicate};
use std::fmt::Write;

/// Quotes `value` as a double-quoted Python string literal.
#[must_use]
pub fn string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// `C("Super-Shift-t")`
#[must_use]
pub fn combo(combo: &Combo) -> String {
    format!("C({})", string_literal(&combo.to_engine()))
}

/// Right-hand side of a mapping entry.
pub(crate) fn action(action: &ResolvedAction) -> String {
    match action {
        ResolvedAction::Combos(combos) if combos.len() == 1 => combo(&combos[0]),
        ResolvedAction::Combos(combos) => {
            let items: Vec<String> = combos.iter().map(combo).collect();
            format!("[{}]", items.join(", "))
        }
        ResolvedAction::Call(FunctionCall::Text(text)) => format!("ST({})", string_literal(text)),
        ResolvedAction::Call(FunctionCall::Launch(argv)) => {
            let items: Vec<String> = argv.iter().map(|a| string_literal(a)).collect();
            format!("launch([{}])", items.join(", "))
        }
        ResolvedAction::Call(FunctionCall::SleepMs(ms)) => {
            format!("sleep({}.{:03})", ms / 1000, ms % 1000)
        }
    }
}

/// Boolean expression over the engine's window context.
#[must_use]
pub fn matcher_condition(matcher: &AppMatcher) -> String {
    match matcher {
        AppMatcher::Exact(name) => format!("ctx.wm_class == {}", string_literal(name)),
        AppMatcher::IgnoreCase(name) => format!(
            "ctx.wm_class.casefold() == {}",
            string_literal(&name.to_lowercase())
        ),
        AppMatcher::Pattern(pattern) => {
            format!("re.search({}, ctx.wm_class)", string_literal(pattern))
        }
    }
}

/// Boolean expression for a runtime predicate.
#[must_use]
pub fn predicate_condition(predicate: &Predicate) -> String {
    match predicate {
        Predicate::WindowClass(matcher) => matcher_condition(matcher),
        Predicate::WindowTitle(pattern) => {
            format!("re.search({}, ctx.wm_name)", string_literal(pattern))
        }
        Predicate::Hours { from, to } if from < to => {
            format!("{from} <= datetime.now().hour < {to}")
        }
        Predicate::Hours { from, to } => {
            format!("(datetime.now().hour >= {from} or datetime.now().hour < {to})")
        }
    }
}

/// Short label used to name predicate blocks.
#[must_use]
pub fn predicate_label(predicate: &Predicate) -> String {
    match predicate {
        Predicate::WindowClass(matcher) => format!("class {matcher}"),
        Predicate::WindowTitle(pattern) => format!("title /{pattern}/"),
        Predicate::Hours { from, to } => format!("hours {from:02}-{to:02}"),
    }
}

/// `lambda ctx: ...` joining all conditions with `and`.
#[must_use]
pub fn lambda(conditions: &[String]) -> String {
    match conditions {
        [single] => format!("lambda ctx: {single}"),
        many => {
            let parts: Vec<String> = many.iter().map(|c| format!("({c})")).collect();
            format!("lambda ctx: {}", parts.join(" and "))
        }
    }
}
