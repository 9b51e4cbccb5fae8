//! Engine key vocabulary and combo parsing.
//!
//! The vocabulary is embedded in the binary at compile time and loaded once.
//! It defines every modifier and key token a trigger or output combo may use,
//! plus how each token is spelled in the engine's own combo syntax.

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

/// Individual key definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDefinition {
    /// Engine key name (e.g., "a", "left_brace")
    pub code: String,
    /// Display name (e.g., "A", "Left Bracket")
    pub name: String,
    /// Optional description
    #[serde(default)]
    pub description: Option<String>,
    /// Optional regex pattern for families of keys (e.g., F1-F24)
    #[serde(default)]
    pub pattern: Option<String>,
    /// Alternative spellings accepted in rule files
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Modifier definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierDefinition {
    /// Canonical Mac-style name (e.g., "Cmd")
    pub name: String,
    /// Spelling in the engine's combo syntax (e.g., "Super")
    pub emit: String,
    /// Accepted spellings, lowercase
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Database schema from keys.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct KeyDatabase {
    version: String,
    modifiers: Vec<ModifierDefinition>,
    keys: Vec<KeyDefinition>,
}

/// Key vocabulary with O(1) token lookup.
#[derive(Debug, Clone)]
pub struct KeyDb {
    keys: Vec<KeyDefinition>,
    /// Declaration order is the canonical modifier order
    modifiers: Vec<ModifierDefinition>,
    /// Lowercase key token or alias -> index into `keys`
    key_lookup: HashMap<String, usize>,
    /// Lowercase modifier token or alias -> index into `modifiers`
    modifier_lookup: HashMap<String, usize>,
    /// Compiled patterns for key families
    patterns: Vec<Regex>,
}

static SHARED: OnceLock<KeyDb> = OnceLock::new();

impl KeyDb {
    /// Loads the vocabulary from the embedded JSON file.
    pub fn load() -> Result<Self> {
        let json_data = include_str!("keys.json");
        let db: KeyDatabase =
            serde_json::from_str(json_data).context("Failed to parse embedded keys.json")?;

        let mut key_lookup = HashMap::new();
        let mut patterns = Vec::new();
        for (idx, key) in db.keys.iter().enumerate() {
            key_lookup.insert(key.code.to_lowercase(), idx);
            for alias in &key.aliases {
                key_lookup.insert(alias.to_lowercase(), idx);
            }
            if let Some(pattern) = &key.pattern {
                let regex = Regex::new(pattern)
                    .with_context(|| format!("Invalid key pattern for {}", key.code))?;
                patterns.push(regex);
            }
        }

        let mut modifier_lookup = HashMap::new();
        for (idx, modifier) in db.modifiers.iter().enumerate() {
            modifier_lookup.insert(modifier.name.to_lowercase(), idx);
            for alias in &modifier.aliases {
                modifier_lookup.insert(alias.to_lowercase(), idx);
            }
        }

        Ok(Self {
            keys: db.keys,
            modifiers: db.modifiers,
            key_lookup,
            modifier_lookup,
            patterns,
        })
    }

    /// Returns the process-wide vocabulary, loading it on first use.
    pub fn shared() -> Result<&'static Self> {
        if let Some(db) = SHARED.get() {
            return Ok(db);
        }
        let db = Self::load()?;
        Ok(SHARED.get_or_init(|| db))
    }

    /// Resolves a key token to its engine name.
    ///
    /// Returns `None` for modifiers and unknown tokens.
    #[must_use]
    pub fn resolve_key(&self, token: &str) -> Option<String> {
        let lower = token.to_lowercase();
        if let Some(idx) = self.key_lookup.get(&lower) {
            return self.keys.get(*idx).map(|k| k.code.clone());
        }
        if self.patterns.iter().any(|p| p.is_match(&lower)) {
            return Some(lower);
        }
        None
    }

    /// Resolves a modifier token.
    #[must_use]
    pub fn resolve_modifier(&self, token: &str) -> Option<&ModifierDefinition> {
        self.modifier_index(token).and_then(|idx| self.modifiers.get(idx))
    }

    fn modifier_index(&self, token: &str) -> Option<usize> {
        self.modifier_lookup.get(&token.to_lowercase()).copied()
    }

    /// Returns true if the token is a known key (not a modifier).
    #[must_use]
    pub fn is_key(&self, token: &str) -> bool {
        self.resolve_key(token).is_some()
    }

    /// Parses a `+`-joined combo such as `Cmd+Shift+T`.
    ///
    /// Modifiers are put into vocabulary order, so `Shift+Cmd+T` and
    /// `Cmd+Shift+T` yield the same combo.
    pub fn parse_combo(&self, text: &str) -> Result<Combo, ComboError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ComboError::Empty);
        }

        let tokens: Vec<&str> = trimmed.split('+').map(str::trim).collect();
        let Some((last, leading)) = tokens.split_last() else {
            return Err(ComboError::Empty);
        };

        let mut indices: Vec<usize> = Vec::with_capacity(leading.len());
        for token in leading {
            if token.is_empty() {
                return Err(ComboError::EmptyToken);
            }
            let Some(idx) = self.modifier_index(token) else {
                if self.is_key(token) {
                    return Err(ComboError::KeyBeforeModifier((*token).to_string()));
                }
                return Err(ComboError::UnknownToken((*token).to_string()));
            };
            if indices.contains(&idx) {
                let name = self.modifiers[idx].name.clone();
                return Err(ComboError::DuplicateModifier(name));
            }
            indices.push(idx);
        }
        indices.sort_unstable();
        let modifiers = indices
            .into_iter()
            .map(|idx| Modifier {
                name: self.modifiers[idx].name.clone(),
                emit: self.modifiers[idx].emit.clone(),
            })
            .collect();

        if last.is_empty() {
            return Err(ComboError::EmptyToken);
        }
        match self.resolve_key(last) {
            Some(key) => Ok(Combo { modifiers, key }),
            None if self.resolve_modifier(last).is_some() => Err(ComboError::MissingKey),
            None => Err(ComboError::UnknownToken((*last).to_string())),
        }
    }
}

/// A resolved modifier inside a combo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modifier {
    /// Canonical Mac-style name
    pub name: String,
    /// Engine spelling
    pub emit: String,
}

/// A validated key combination: zero or more modifiers and one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Combo {
    /// Modifiers in canonical order
    pub modifiers: Vec<Modifier>,
    /// Engine key name
    pub key: String,
}

impl Combo {
    /// Spells the combo in the engine's dash syntax (e.g., `Super-Shift-t`).
    #[must_use]
    pub fn to_engine(&self) -> String {
        let mut out = String::new();
        for modifier in &self.modifiers {
            out.push_str(&modifier.emit);
            out.push('-');
        }
        out.push_str(&self.key);
        out
    }
}

impl fmt::Display for Combo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for modifier in &self.modifiers {
            write!(f, "{}+", modifier.name)?;
        }
        write!(f, "{}", self.key)
    }
}

/// Why a combo string failed syntactic validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComboError {
    /// Nothing but whitespace
    #[error("combo is empty")]
    Empty,
    /// `Cmd++T` or a trailing `+`
    #[error("combo contains an empty token")]
    EmptyToken,
    /// Token not in the vocabulary
    #[error("unknown key token '{0}'")]
    UnknownToken(String),
    /// Only modifiers, no final key
    #[error("combo has modifiers but no key")]
    MissingKey,
    /// A key where a modifier was expected
    #[error("key '{0}' must be the last token")]
    KeyBeforeModifier(String),
    /// The same modifier twice
    #[error("modifier '{0}' appears more than once")]
    DuplicateModifier(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> &'static KeyDb {
        KeyDb::shared().expect("Failed to load key database")
    }

    #[test]
    fn test_load_database() {
        let db = KeyDb::load().unwrap();
        assert!(db.modifiers.len() >= 4);
        assert!(('a'..='z').all(|c| db.is_key(&c.to_string())));
        assert!(db.is_key("up"));
    }

    #[test]
    fn test_resolve_key_aliases() {
        assert_eq!(db().resolve_key("Return").as_deref(), Some("enter"));
        assert_eq!(db().resolve_key("[").as_deref(), Some("left_brace"));
        assert_eq!(db().resolve_key("PgUp").as_deref(), Some("page_up"));
        assert_eq!(db().resolve_key("T").as_deref(), Some("t"));
    }

    #[test]
    fn test_resolve_function_key_pattern() {
        assert_eq!(db().resolve_key("F13").as_deref(), Some("f13"));
        assert_eq!(db().resolve_key("f24").as_deref(), Some("f24"));
        assert!(db().resolve_key("f25").is_none());
        assert!(db().resolve_key("f0").is_none());
    }

    #[test]
    fn test_modifiers_are_not_keys() {
        assert!(!db().is_key("Cmd"));
        assert_eq!(db().resolve_modifier("Option").unwrap().emit, "Alt");
        assert_eq!(db().resolve_modifier("command").unwrap().name, "Cmd");
    }

    #[test]
    fn test_parse_combo() {
        let combo = db().parse_combo("Cmd+Shift+T").unwrap();
        assert_eq!(combo.key, "t");
        assert_eq!(combo.to_engine(), "Super-Shift-t");
        assert_eq!(combo.to_string(), "Cmd+Shift+t");

        let reordered = db().parse_combo("Shift+Cmd+T").unwrap();
        assert_eq!(reordered, combo);
        assert_eq!(reordered.to_engine(), "Super-Shift-t");

        let bare = db().parse_combo("esc").unwrap();
        assert!(bare.modifiers.is_empty());
        assert_eq!(bare.to_engine(), "esc");
    }

    #[test]
    fn test_parse_combo_errors() {
        assert_eq!(db().parse_combo("  "), Err(ComboError::Empty));
        assert_eq!(db().parse_combo("Cmd++T"), Err(ComboError::EmptyToken));
        assert_eq!(db().parse_combo("Cmd+"), Err(ComboError::EmptyToken));
        assert_eq!(db().parse_combo("Cmd+Shift"), Err(ComboError::MissingKey));
        assert_eq!(
            db().parse_combo("Hyper+T"),
            Err(ComboError::UnknownToken("Hyper".to_string()))
        );
        assert_eq!(
            db().parse_combo("T+Cmd"),
            Err(ComboError::KeyBeforeModifier("T".to_string()))
        );
        assert_eq!(
            db().parse_combo("Cmd+Super+T"),
            Err(ComboError::DuplicateModifier("Cmd".to_string()))
        );
    }
}
