//! Name tables for desktop and compositor identification.

/// Session identifier fragments (lowercase) mapped to normalised desktop names.
///
/// Checked in order; the first fragment contained in the raw value wins.
const DESKTOP_NAMES: &[(&str, &str)] = &[
    ("budgie", "budgie"),
    ("cinnamon", "cinnamon"),
    ("cosmic", "cosmic"),
    ("cutefish", "cutefish"),
    ("deepin", "deepin"),
    ("dde", "dde"),
    ("enlightenment", "enlightenment"),
    ("gnome", "gnome"),
    ("hyprland", "hyprland"),
    ("i3", "i3"),
    ("icewm", "icewm"),
    ("kde", "kde"),
    ("plasma", "kde"),
    ("lxde", "lxde"),
    ("lxqt", "lxqt"),
    ("mate", "mate"),
    ("miracle-wm", "miracle-wm"),
    ("miriway", "miriway"),
    ("niri", "niri"),
    ("pantheon", "pantheon"),
    ("pop", "pop"),
    ("qtile", "qtile"),
    ("sway", "sway"),
    ("trinity", "trinity"),
    ("ukui", "ukui"),
    ("unity", "unity"),
    ("ubuntu", "gnome"),
    ("wayfire", "wayfire"),
    ("windowmaker", "wmaker"),
    ("xfce", "xfce"),
    ("zorin", "gnome"),
];

/// Environment variables that identify a running compositor.
pub const COMPOSITOR_SOCKETS: &[(&str, &str)] = &[
    ("HYPRLAND_INSTANCE_SIGNATURE", "hyprland"),
    ("SWAYSOCK", "sway"),
    ("NIRI_SOCKET", "niri"),
    ("I3SOCK", "i3"),
];

/// Compositor or window manager implied by a desktop.
const DESKTOP_COMPOSITORS: &[(&str, &str)] = &[
    ("budgie", "budgie-wm"),
    ("cinnamon", "muffin"),
    ("cosmic", "cosmic-comp"),
    ("dde", "deepin-kwin"),
    ("deepin", "deepin-kwin"),
    ("enlightenment", "enlightenment"),
    ("gnome", "mutter"),
    ("hyprland", "hyprland"),
    ("i3", "i3"),
    ("kde", "kwin"),
    ("lxde", "openbox"),
    ("mate", "marco"),
    ("miracle-wm", "miracle-wm"),
    ("niri", "niri"),
    ("pantheon", "gala"),
    ("pop", "mutter"),
    ("qtile", "qtile"),
    ("sway", "sway"),
    ("unity", "compiz"),
    ("wayfire", "wayfire"),
    ("xfce", "xfwm4"),
];

/// Wayland compositors implementing `wlr-layer-shell`.
pub const LAYER_SHELL_COMPOSITORS: &[&str] = &[
    "cosmic-comp",
    "hyprland",
    "kwin",
    "labwc",
    "miracle-wm",
    "niri",
    "qtile",
    "river",
    "sway",
    "wayfire",
];

/// Wayland compositors the engine can query for the focused window.
pub const WINDOW_CONTEXT_COMPOSITORS: &[&str] = &[
    "cosmic-comp",
    "hyprland",
    "kwin",
    "miracle-wm",
    "mutter",
    "niri",
    "qtile",
    "sway",
    "wayfire",
];

/// Wayland desktops without a status notifier tray out of the box.
pub const TRAYLESS_DESKTOPS: &[&str] = &["gnome"];

/// Normalises a raw session identifier, if it is a known desktop.
pub fn normalize_desktop(raw: &str) -> Option<&'static str> {
    let raw = raw.trim().to_ascii_lowercase();
    DESKTOP_NAMES
        .iter()
        .find(|(needle, _)| raw == *needle)
        .or_else(|| DESKTOP_NAMES.iter().find(|(needle, _)| raw.contains(needle)))
        .map(|(_, name)| *name)
}

/// Compositor implied by a normalised desktop name.
pub fn compositor_for_desktop(desktop: &str) -> Option<&'static str> {
    DESKTOP_COMPOSITORS
        .iter()
        .find(|(name, _)| *name == desktop)
        .map(|(_, compositor)| *compositor)
}
