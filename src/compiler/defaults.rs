//! Built-in Mac-style default bindings.

use crate::models::{BindingRule, Layer};

/// Name of the built-in layer in the emitted configuration.
pub const BASE_LAYER_NAME: &str = "Mac-style defaults";

/// (trigger, output, description)
const BASE_BINDINGS: &[(&str, &str, &str)] = &[
    // Editing
    ("Cmd+A", "Ctrl+A", "Select all"),
    ("Cmd+C", "Ctrl+C", "Copy"),
    ("Cmd+V", "Ctrl+V", "Paste"),
    ("Cmd+X", "Ctrl+X", "Cut"),
    ("Cmd+Z", "Ctrl+Z", "Undo"),
    ("Cmd+Shift+Z", "Ctrl+Y", "Redo"),
    ("Cmd+S", "Ctrl+S", "Save"),
    ("Cmd+O", "Ctrl+O", "Open"),
    ("Cmd+N", "Ctrl+N", "New"),
    ("Cmd+P", "Ctrl+P", "Print"),
    ("Cmd+F", "Ctrl+F", "Find"),
    ("Cmd+G", "Ctrl+G", "Find next"),
    ("Cmd+Shift+G", "Ctrl+Shift+G", "Find previous"),
    ("Cmd+H", "Ctrl+H", "Replace"),
    // Line and document navigation
    ("Cmd+Left", "Home", "Beginning of line"),
    ("Cmd+Right", "End", "End of line"),
    ("Cmd+Up", "Ctrl+Home", "Beginning of document"),
    ("Cmd+Down", "Ctrl+End", "End of document"),
    ("Cmd+Shift+Left", "Shift+Home", "Select to beginning of line"),
    ("Cmd+Shift+Right", "Shift+End", "Select to end of line"),
    ("Cmd+Shift+Up", "Ctrl+Shift+Home", "Select to beginning"),
    ("Cmd+Shift+Down", "Ctrl+Shift+End", "Select to end"),
    // Word navigation
    ("Alt+Left", "Ctrl+Left", "Previous word"),
    ("Alt+Right", "Ctrl+Right", "Next word"),
    ("Alt+Shift+Left", "Ctrl+Shift+Left", "Select previous word"),
    ("Alt+Shift+Right", "Ctrl+Shift+Right", "Select next word"),
    // Windows and tabs
    ("Cmd+W", "Ctrl+W", "Close window/tab"),
    ("Cmd+Shift+W", "Ctrl+Shift+W", "Close window"),
    ("Cmd+T", "Ctrl+T", "New tab"),
    ("Cmd+Shift+T", "Ctrl+Shift+T", "Reopen closed tab"),
    ("Cmd+Tab", "Ctrl+Tab", "Next tab"),
    ("Cmd+Shift+Tab", "Ctrl+Shift+Tab", "Previous tab"),
    ("Cmd+1", "Ctrl+1", "Switch to tab 1"),
    ("Cmd+2", "Ctrl+2", "Switch to tab 2"),
    ("Cmd+3", "Ctrl+3", "Switch to tab 3"),
    ("Cmd+4", "Ctrl+4", "Switch to tab 4"),
    ("Cmd+5", "Ctrl+5", "Switch to tab 5"),
    ("Cmd+6", "Ctrl+6", "Switch to tab 6"),
    ("Cmd+7", "Ctrl+7", "Switch to tab 7"),
    ("Cmd+8", "Ctrl+8", "Switch to tab 8"),
    ("Cmd+9", "Ctrl+9", "Switch to tab 9"),
    // Application and system
    ("Cmd+Q", "Alt+F4", "Quit application"),
    ("Cmd+M", "Alt+F9", "Minimize window"),
    ("Cmd+Shift+M", "Alt+F10", "Maximize window"),
    ("Cmd+Space", "Alt+F2", "Application launcher"),
    ("Cmd+Shift+Space", "Alt+F1", "System menu"),
];

/// The built-in layer as a regular global layer.
#[must_use]
pub fn base_layer() -> Layer {
    let mut layer = Layer::global(BASE_LAYER_NAME);
    for (trigger, output, _) in BASE_BINDINGS {
        layer.add_rule(BindingRule::new(*trigger, *output));
    }
    layer
}

/// Description of the nth base binding, emitted as a trailing comment.
pub(crate) fn description(index: usize) -> Option<&'static str> {
    BASE_BINDINGS.get(index).map(|(_, _, desc)| *desc)
}

/// Triggers of every base binding, as written.
#[must_use]
pub fn base_triggers() -> Vec<&'static str> {
    BASE_BINDINGS.iter().map(|(trigger, _, _)| *trigger).collect()
}
