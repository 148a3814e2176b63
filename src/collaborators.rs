//! Host-side collaborators the service applies changes to
//!
//! Both are injected into [`crate::DesktopSettingsService`] so the service
//! can be driven without a windowing system.

use std::sync::Mutex;
use tracing::info;
use x11rb::protocol::xproto::Window;

/// Receives the icon theme name whenever the service applies a new value
pub trait IconThemeRegistry {
    fn set_active_theme_name(&self, name: &str);
}

/// The host application's open top-level windows
pub trait TopLevelWindows {
    fn top_level_windows(&self) -> Vec<Window>;
    fn request_redraw(&self, window: Window);
}

static ACTIVE_THEME: Mutex<String> = Mutex::new(String::new());

/// Process-wide icon theme name
#[derive(Debug, Default, Clone, Copy)]
pub struct GlobalIconTheme;

impl GlobalIconTheme {
    pub fn active_theme_name() -> String {
        ACTIVE_THEME
            .lock()
            .map(|name| name.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl IconThemeRegistry for GlobalIconTheme {
    fn set_active_theme_name(&self, name: &str) {
        let mut active = ACTIVE_THEME.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if *active != name {
            info!(theme = %name, previous = %active, "Active icon theme changed");
            *active = name.to_string();
        }
    }
}

/// Host without windows of its own
#[derive(Debug, Default, Clone, Copy)]
pub struct NoWindows;

impl TopLevelWindows for NoWindows {
    fn top_level_windows(&self) -> Vec<Window> {
        Vec::new()
    }

    fn request_redraw(&self, _window: Window) {}
}
