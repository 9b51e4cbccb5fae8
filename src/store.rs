//! Rule set sources.
//!
//! The daemon reads its [`RuleSet`] through [`RuleSetSource`]. The default
//! source is a TOML file; a missing file means the built-in defaults only.
//! Sources also report changes so the daemon can hot-reload.

use crate::config::Config;
use crate::constants::{RULES_FILE_NAME, SYSTEM_RULES_PATH};
use crate::models::{AppMatcher, BindingRule, Layer, Predicate, RuleSet};
use crate::models::ruleset::DEFAULT_GLOBAL_LAYER_NAME;
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Somewhere a [`RuleSet`] can be read from.
pub trait RuleSetSource: Send + Sync {
    /// Reads and validates the current rule set.
    ///
    /// Errors are recoverable: the caller keeps its previous rules.
    fn load(&self) -> Result<RuleSet>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;

    /// Sends `()` on `changes` whenever the source may have changed.
    ///
    /// Notifications stop when the returned guard is dropped. Bursts are not
    /// coalesced here.
    fn watch(&self, changes: mpsc::UnboundedSender<()>) -> Result<SourceWatch>;
}

/// Keeps a [`RuleSetSource::watch`] subscription alive.
#[derive(Default)]
pub struct SourceWatch {
    watcher: Option<RecommendedWatcher>,
}

impl std::fmt::Debug for SourceWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceWatch")
            .field("active", &self.watcher.is_some())
            .finish()
    }
}

/// On-disk layout of `rules.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleFile {
    #[serde(default = "default_true")]
    base_layer: bool,
    #[serde(default)]
    appendix: String,
    #[serde(default)]
    global: GlobalSection,
    #[serde(default)]
    application: Vec<ApplicationSection>,
    #[serde(default)]
    conditional: Vec<ConditionalSection>,
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct GlobalSection {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    bindings: Vec<BindingRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ApplicationSection {
    name: String,
    #[serde(default, rename = "match")]
    matcher: Option<AppMatcher>,
    #[serde(default)]
    bindings: Vec<BindingRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConditionalSection {
    name: String,
    when: Predicate,
    #[serde(default)]
    bindings: Vec<BindingRule>,
}

impl RuleFile {
    fn into_rule_set(self) -> Result<RuleSet> {
        let mut rules = RuleSet::new(self.base_layer);
        rules.raw_appendix = self.appendix;

        rules.global_layer = Layer::global(
            self.global
                .name
                .unwrap_or_else(|| DEFAULT_GLOBAL_LAYER_NAME.to_string()),
        );
        rules.global_layer.rules = self.global.bindings;

        for app in self.application {
            let mut layer = Layer::application(app.name);
            if let Some(matcher) = app.matcher {
                layer = layer.matching(matcher);
            }
            layer.rules = app.bindings;
            rules.add_application_layer(layer)?;
        }

        for cond in self.conditional {
            let mut layer = Layer::conditional(cond.name, cond.when);
            layer.rules = cond.bindings;
            rules.add_conditional_layer(layer)?;
        }

        rules.validate()?;
        Ok(rules)
    }
}

/// Parses and validates rule file contents.
pub fn parse_rules(content: &str) -> Result<RuleSet> {
    let file: RuleFile = toml::from_str(content).context("Failed to parse rules")?;
    file.into_rule_set()
}

/// A `rules.toml` file.
///
/// When the file does not exist and was not explicitly requested, loading
/// yields [`RuleSet::default`].
#[derive(Debug, Clone)]
pub struct TomlRuleStore {
    path: PathBuf,
    required: bool,
}

impl TomlRuleStore {
    /// Store for an explicitly chosen file; a missing file is an error.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            required: true,
        }
    }

    /// Finds the rules file.
    ///
    /// Lookup order: the override, the user config dir, then the system-wide
    /// file. If none exist the user path is watched for creation.
    pub fn locate(override_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = override_path {
            return Ok(Self::new(path));
        }

        let user = Config::config_dir()?.join(RULES_FILE_NAME);
        let system = PathBuf::from(SYSTEM_RULES_PATH);

        let path = if user.exists() || !system.exists() {
            user
        } else {
            system
        };

        Ok(Self {
            path,
            required: false,
        })
    }

    /// Path this store reads.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RuleSetSource for TomlRuleStore {
    fn load(&self) -> Result<RuleSet> {
        if !self.path.exists() {
            if self.required {
                anyhow::bail!("Rules file not found: {}", self.path.display());
            }
            return Ok(RuleSet::default());
        }

        let content = fs::read_to_string(&self.path)
            .context(format!("Failed to read rules file: {}", self.path.display()))?;

        parse_rules(&content).context(format!("Invalid rules file: {}", self.path.display()))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn watch(&self, changes: mpsc::UnboundedSender<()>) -> Result<SourceWatch> {
        let file_name = self
            .path
            .file_name()
            .map(ToOwned::to_owned)
            .context("Rules path has no file name")?;
        // Editors save through a temp file and rename, so watch the directory
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else {
                return;
            };
            let relevant = matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
            ) && event
                .paths
                .iter()
                .any(|p| p.file_name() == Some(file_name.as_os_str()));
            if relevant {
                let _ = changes.send(());
            }
        })
        .context("Failed to create file watcher")?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .context(format!("Failed to watch {}", dir.display()))?;

        Ok(SourceWatch {
            watcher: Some(watcher),
        })
    }
}

/// In-memory source whose contents can be swapped at runtime.
///
/// Clones share state. Each update notifies every watcher.
#[derive(Debug, Clone)]
pub struct SharedRuleSource {
    inner: Arc<Mutex<SharedState>>,
}

#[derive(Debug)]
struct SharedState {
    rules: std::result::Result<RuleSet, String>,
    watchers: Vec<mpsc::UnboundedSender<()>>,
}

impl SharedRuleSource {
    /// Creates a source holding `rules`.
    #[must_use]
    pub fn new(rules: RuleSet) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SharedState {
                rules: Ok(rules),
                watchers: Vec::new(),
            })),
        }
    }

    /// Replaces the rule set.
    pub fn set(&self, rules: RuleSet) {
        self.update(Ok(rules));
    }

    /// Makes subsequent loads fail with `message`.
    pub fn fail(&self, message: impl Into<String>) {
        self.update(Err(message.into()));
    }

    fn update(&self, rules: std::result::Result<RuleSet, String>) {
        let mut state = self.lock();
        state.rules = rules;
        state.watchers.retain(|tx| tx.send(()).is_ok());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SharedState> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl RuleSetSource for SharedRuleSource {
    fn load(&self) -> Result<RuleSet> {
        let state = self.lock();
        match &state.rules {
            Ok(rules) => Ok(rules.clone()),
            Err(message) => anyhow::bail!("{message}"),
        }
    }

    fn describe(&self) -> String {
        "in-memory rules".to_string()
    }

    fn watch(&self, changes: mpsc::UnboundedSender<()>) -> Result<SourceWatch> {
        self.lock().watchers.push(changes);
        Ok(SourceWatch::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Action, FunctionCall, Scope};
    use tempfile::TempDir;

    const SAMPLE: &str = r##"
appendix = "# custom"

[global]
bindings = [
  { trigger = "Cmd+Space", action = { launch = ["rofi", "-show", "drun"] } },
]

[[application]]
name = "Firefox"
bindings = [
  { trigger = "Cmd+T", action = "Ctrl+T" },
  { trigger = "Cmd+Shift+K", action = ["Ctrl+K", "Ctrl+U"] },
  { trigger = "Cmd+Y", action = { text = "hi" }, when = { hours = { from = 9, to = 17 } } },
]

[[application]]
name = "Code"
match = { ignore_case = "code" }

[[conditional]]
name = "Terminals"
when = { window_class = { pattern = "(?i)term" } }
bindings = [{ trigger = "Cmd+C", action = "Ctrl+Shift+C" }]
"##;

    #[test]
    fn test_parse_full_file() {
        let rules = parse_rules(SAMPLE).unwrap();
        assert!(rules.base_layer_enabled);
        assert_eq!(rules.raw_appendix, "# custom");
        assert_eq!(rules.global_layer.name, DEFAULT_GLOBAL_LAYER_NAME);
        assert_eq!(
            rules.global_layer.rules[0].action,
            Action::Call(FunctionCall::Launch(vec![
                "rofi".to_string(),
                "-show".to_string(),
                "drun".to_string()
            ]))
        );

        assert_eq!(rules.application_layers.len(), 2);
        let firefox = &rules.application_layers[0];
        assert_eq!(firefox.rules.len(), 3);
        assert_eq!(
            firefox.rules[2].predicate,
            Some(Predicate::Hours { from: 9, to: 17 })
        );
        assert_eq!(
            rules.application_layers[1].scope,
            Scope::PerApplication(AppMatcher::IgnoreCase("code".to_string()))
        );

        assert_eq!(rules.conditional_layers.len(), 1);
        assert_eq!(
            rules.conditional_layers[0].scope,
            Scope::Conditional(Predicate::WindowClass(AppMatcher::Pattern(
                "(?i)term".to_string()
            )))
        );
    }

    #[test]
    fn test_empty_file_is_defaults() {
        assert_eq!(parse_rules("").unwrap(), RuleSet::default());
    }

    #[test]
    fn test_base_layer_toggle() {
        let rules = parse_rules("base_layer = false").unwrap();
        assert!(!rules.base_layer_enabled);
    }

    #[test]
    fn test_duplicate_application_rejected() {
        let content = r#"
[[application]]
name = "Kitty"
[[application]]
name = "Kitty"
"#;
        let err = format!("{:#}", parse_rules(content).unwrap_err());
        assert!(err.contains("Duplicate"), "unexpected error: {err}");
    }

    #[test]
    fn test_empty_action_rejected() {
        let content = r#"
[global]
bindings = [{ trigger = "Cmd+T", action = "" }]
"#;
        assert!(parse_rules(content).is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(parse_rules("base_layers = true").is_err());
    }

    #[test]
    fn test_store_missing_optional_file() {
        let temp = TempDir::new().unwrap();
        let store = TomlRuleStore {
            path: temp.path().join("rules.toml"),
            required: false,
        };
        assert_eq!(store.load().unwrap(), RuleSet::default());
    }

    #[test]
    fn test_store_missing_required_file() {
        let temp = TempDir::new().unwrap();
        let store = TomlRuleStore::new(temp.path().join("rules.toml"));
        assert!(store.load().is_err());
    }

    #[test]
    fn test_store_reads_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("rules.toml");
        fs::write(&path, SAMPLE).unwrap();

        let store = TomlRuleStore::locate(Some(&path)).unwrap();
        assert_eq!(store.path(), path);
        assert_eq!(store.load().unwrap().application_layers.len(), 2);
    }

    #[tokio::test]
    async fn test_store_watch_reports_rewrite() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("rules.toml");
        fs::write(&path, "base_layer = true").unwrap();

        let store = TomlRuleStore::new(&path);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _watch = store.watch(tx).unwrap();

        fs::write(temp.path().join("unrelated.txt"), "x").unwrap();
        fs::write(&path, "base_layer = false").unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .expect("no change notification")
            .unwrap();
    }

    #[test]
    fn test_store_watch_needs_directory() {
        let temp = TempDir::new().unwrap();
        let store = TomlRuleStore::new(temp.path().join("missing").join("rules.toml"));
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(store.watch(tx).is_err());
    }

    #[test]
    fn test_shared_source_updates() {
        let source = SharedRuleSource::new(RuleSet::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _watch = source.watch(tx).unwrap();
        assert!(rx.try_recv().is_err());

        source.set(RuleSet::new(false));
        assert!(!source.load().unwrap().base_layer_enabled);
        assert!(rx.try_recv().is_ok());

        source.fail("disk on fire");
        assert!(source.load().is_err());
        assert!(rx.try_recv().is_ok());
    }
}
