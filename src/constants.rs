//! Crate-wide constants
//!
//! Well-known setting keys, file locations and X11 atom names, kept in one
//! place so the sources and the service agree on them.

/// Change notification timing
pub mod timing {
    /// Quiet period before a burst of changes is reported (milliseconds)
    pub const DEBOUNCE_MS: u64 = 400;

    /// Longest accepted quiet period, one day (milliseconds)
    pub const MAX_DEBOUNCE_MS: u64 = 24 * 60 * 60 * 1000;
}

/// Environment variables consulted when classifying the desktop
pub mod env {
    /// Modern self-reported desktop name
    pub const XDG_CURRENT_DESKTOP: &str = "XDG_CURRENT_DESKTOP";

    /// Set by KDE for full sessions
    pub const KDE_FULL_SESSION: &str = "KDE_FULL_SESSION";

    /// Legacy GNOME session marker
    pub const GNOME_DESKTOP_SESSION_ID: &str = "GNOME_DESKTOP_SESSION_ID";

    /// Legacy MATE session marker
    pub const MATE_DESKTOP_SESSION_ID: &str = "MATE_DESKTOP_SESSION_ID";

    /// Generic session name set by display managers
    pub const DESKTOP_SESSION: &str = "DESKTOP_SESSION";

    /// Per-user config base directory
    pub const XDG_CONFIG_HOME: &str = "XDG_CONFIG_HOME";

    /// Colon-separated system config directories
    pub const XDG_CONFIG_DIRS: &str = "XDG_CONFIG_DIRS";

    /// Home directory, used when nothing better is known
    pub const HOME: &str = "HOME";

    /// Log verbosity for the binary
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
}

/// Settings-broadcast protocol keys
pub mod xsettings {
    /// Icon theme name published by XSettings managers
    pub const ICON_THEME_NAME: &str = "Net/IconThemeName";

    /// Selection owned by the manager, suffixed with the screen number
    pub const SELECTION_PREFIX: &str = "_XSETTINGS_S";

    /// Property on the manager window holding the serialized settings
    pub const SETTINGS_PROPERTY: &[u8] = b"_XSETTINGS_SETTINGS";

    /// Client message type broadcast when a manager takes a selection
    pub const MANAGER: &[u8] = b"MANAGER";
}

/// File-backed settings (Razor-qt style config)
pub mod file {
    /// Config path relative to each XDG config directory
    pub const RELATIVE_PATH: &str = "razor/razor.conf";

    /// Key holding the icon theme name
    pub const ICON_THEME_KEY: &str = "icon_theme";

    /// Theme used when no config file provides one
    pub const FALLBACK_THEME: &str = "oxygen";

    /// System config directory used when `XDG_CONFIG_DIRS` is unset
    pub const DEFAULT_SYSTEM_CONFIG_DIR: &str = "/etc/xdg";

    /// Section QSettings-style writers use for keys outside any section
    pub const GENERAL_SECTION: &str = "General";
}
