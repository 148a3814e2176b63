//! Cross-desktop appearance settings with debounced change notification
//!
//! Detects the running desktop environment, reads the icon theme name from
//! wherever that desktop keeps it (XSettings or a config file), and reports
//! changes once per burst.

#![forbid(unsafe_code)]

pub mod collaborators;
pub mod config;
pub mod constants;
pub mod debounce;
pub mod environment;
pub mod error;
pub mod service;
pub mod source;
pub mod x11_utils;
pub mod xsettings;

#[cfg(test)]
mod test_support;

pub use collaborators::{GlobalIconTheme, IconThemeRegistry, NoWindows, TopLevelWindows};
pub use config::{FileSourceOptions, SettingsOptions, XdgDirs};
pub use debounce::ChangeDebouncer;
pub use environment::{DesktopEnvironment, EnvSource, ProcessEnv, classify};
pub use error::SourceError;
pub use service::{Collaborators, DesktopSettingsService};
pub use xsettings::{ProtocolConnector, X11Connector};
