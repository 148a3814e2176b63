//! Desktop environment detection from process environment variables

use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use crate::constants::env;

/// Read-only view of environment variables
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var_os(key).map(|v| v.to_string_lossy().into_owned())
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Desktop environment tag, derived once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DesktopEnvironment {
    Lxde,
    Gnome,
    Mate,
    Xfce,
    Razor,
    Kde,
    /// Self-reported name that matches none of the known tags
    Other(String),
    Unknown,
}

impl DesktopEnvironment {
    /// Map a self-reported name to a tag. Comparison is case-sensitive.
    pub fn from_reported(name: &str) -> Self {
        match name {
            "LXDE" => Self::Lxde,
            "GNOME" => Self::Gnome,
            "MATE" | "Mate" => Self::Mate,
            "XFCE" => Self::Xfce,
            "Razor" => Self::Razor,
            "KDE" => Self::Kde,
            other => Self::Other(other.to_string()),
        }
    }

    /// Desktops whose settings are published over XSettings
    pub fn uses_xsettings(&self) -> bool {
        matches!(self, Self::Lxde | Self::Gnome | Self::Mate | Self::Xfce)
    }

    /// Desktops whose settings live in a Razor-style config file
    pub fn uses_config_file(&self) -> bool {
        matches!(self, Self::Razor)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Lxde => "LXDE",
            Self::Gnome => "GNOME",
            Self::Mate => "MATE",
            Self::Xfce => "XFCE",
            Self::Razor => "Razor",
            Self::Kde => "KDE",
            Self::Other(name) => name,
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for DesktopEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify the running desktop.
///
/// `XDG_CURRENT_DESKTOP` wins when set and non-empty. Otherwise the legacy
/// session markers are checked in a fixed order, first present wins:
/// `KDE_FULL_SESSION`, `GNOME_DESKTOP_SESSION_ID`, `MATE_DESKTOP_SESSION_ID`,
/// then a `DESKTOP_SESSION` prefix match for gnome/xfce.
pub fn classify(vars: &dyn EnvSource) -> DesktopEnvironment {
    if let Some(name) = vars.var(env::XDG_CURRENT_DESKTOP).filter(|n| !n.is_empty()) {
        let de = DesktopEnvironment::from_reported(&name);
        debug!(reported = %name, desktop = %de, "Desktop self-reported");
        return de;
    }

    let de = if vars.var(env::KDE_FULL_SESSION).is_some() {
        DesktopEnvironment::Kde
    } else if vars.var(env::GNOME_DESKTOP_SESSION_ID).is_some() {
        DesktopEnvironment::Gnome
    } else if vars.var(env::MATE_DESKTOP_SESSION_ID).is_some() {
        DesktopEnvironment::Mate
    } else if let Some(session) = vars.var(env::DESKTOP_SESSION) {
        classify_session_name(&session)
    } else {
        DesktopEnvironment::Unknown
    };
    debug!(desktop = %de, "Desktop detected from legacy session variables");
    de
}

fn classify_session_name(session: &str) -> DesktopEnvironment {
    let lower = session.to_ascii_lowercase();
    if lower.starts_with("gnome") {
        DesktopEnvironment::Gnome
    } else if lower.starts_with("xfce") {
        DesktopEnvironment::Xfce
    } else {
        DesktopEnvironment::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::env_of;

    #[test]
    fn test_current_desktop_used_literally() {
        let vars = env_of(&[("XDG_CURRENT_DESKTOP", "LXDE")]);
        assert_eq!(classify(&vars), DesktopEnvironment::Lxde);

        let vars = env_of(&[("XDG_CURRENT_DESKTOP", "Razor")]);
        assert_eq!(classify(&vars), DesktopEnvironment::Razor);
    }

    #[test]
    fn test_current_desktop_overrides_legacy_variables() {
        let vars = env_of(&[
            ("XDG_CURRENT_DESKTOP", "XFCE"),
            ("KDE_FULL_SESSION", "true"),
            ("GNOME_DESKTOP_SESSION_ID", "this-is-deprecated"),
        ]);
        assert_eq!(classify(&vars), DesktopEnvironment::Xfce);
    }

    #[test]
    fn test_current_desktop_is_case_sensitive() {
        let vars = env_of(&[("XDG_CURRENT_DESKTOP", "gnome")]);
        let de = classify(&vars);
        assert_eq!(de, DesktopEnvironment::Other("gnome".into()));
        assert!(!de.uses_xsettings());
        assert_eq!(de.to_string(), "gnome");
    }

    #[test]
    fn test_empty_current_desktop_falls_through() {
        let vars = env_of(&[("XDG_CURRENT_DESKTOP", ""), ("MATE_DESKTOP_SESSION_ID", "1")]);
        assert_eq!(classify(&vars), DesktopEnvironment::Mate);
    }

    #[test]
    fn test_legacy_order_kde_before_gnome_before_mate() {
        let vars = env_of(&[
            ("MATE_DESKTOP_SESSION_ID", "1"),
            ("GNOME_DESKTOP_SESSION_ID", "1"),
            ("KDE_FULL_SESSION", "true"),
        ]);
        assert_eq!(classify(&vars), DesktopEnvironment::Kde);

        let vars = env_of(&[("MATE_DESKTOP_SESSION_ID", "1"), ("GNOME_DESKTOP_SESSION_ID", "1")]);
        assert_eq!(classify(&vars), DesktopEnvironment::Gnome);
    }

    #[test]
    fn test_legacy_marker_presence_is_enough() {
        // Present but empty still counts for the legacy markers
        let vars = env_of(&[("KDE_FULL_SESSION", "")]);
        assert_eq!(classify(&vars), DesktopEnvironment::Kde);
    }

    #[test]
    fn test_desktop_session_branch_updates_tag() {
        let vars = env_of(&[("DESKTOP_SESSION", "gnome")]);
        assert_eq!(classify(&vars), DesktopEnvironment::Gnome);

        let vars = env_of(&[("DESKTOP_SESSION", "GNOME-Classic")]);
        assert_eq!(classify(&vars), DesktopEnvironment::Gnome);

        let vars = env_of(&[("DESKTOP_SESSION", "xfce")]);
        assert_eq!(classify(&vars), DesktopEnvironment::Xfce);

        let vars = env_of(&[("DESKTOP_SESSION", "Xfce Session")]);
        assert_eq!(classify(&vars), DesktopEnvironment::Xfce);
    }

    #[test]
    fn test_desktop_session_unrecognized_is_unknown() {
        let vars = env_of(&[("DESKTOP_SESSION", "openbox")]);
        assert_eq!(classify(&vars), DesktopEnvironment::Unknown);
    }

    #[test]
    fn test_nothing_set_is_unknown() {
        assert_eq!(classify(&HashMap::<String, String>::new()), DesktopEnvironment::Unknown);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let vars = env_of(&[("GNOME_DESKTOP_SESSION_ID", "1"), ("DESKTOP_SESSION", "xfce")]);
        let first = classify(&vars);
        for _ in 0..10 {
            assert_eq!(classify(&vars), first);
        }
    }

    #[test]
    fn test_source_selection_flags() {
        for de in [
            DesktopEnvironment::Lxde,
            DesktopEnvironment::Gnome,
            DesktopEnvironment::Mate,
            DesktopEnvironment::Xfce,
        ] {
            assert!(de.uses_xsettings(), "{de} should use xsettings");
            assert!(!de.uses_config_file());
        }
        assert!(DesktopEnvironment::Razor.uses_config_file());
        assert!(!DesktopEnvironment::Kde.uses_xsettings());
        assert!(!DesktopEnvironment::Kde.uses_config_file());
        assert!(!DesktopEnvironment::Unknown.uses_xsettings());
    }

    #[test]
    fn test_mate_spellings() {
        assert_eq!(DesktopEnvironment::from_reported("MATE"), DesktopEnvironment::Mate);
        assert_eq!(DesktopEnvironment::from_reported("Mate"), DesktopEnvironment::Mate);
    }
}
