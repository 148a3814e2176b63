//! Desktop settings service
//!
//! Classifies the desktop once, picks the matching source, and turns the
//! source's raw change reports into one debounced notification per burst.
//! Everything runs on the host's event-loop thread: the host forwards raw
//! events and asks the service to run due timers.

use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use x11rb::protocol::Event;

use crate::collaborators::{IconThemeRegistry, TopLevelWindows};
use crate::config::{SettingsOptions, XdgDirs};
use crate::debounce::ChangeDebouncer;
use crate::environment::{DesktopEnvironment, EnvSource, classify};
use crate::error::SourceError;
use crate::source::{ChangeSink, FileSource, ProtocolSource, SettingSource};
use crate::xsettings::ProtocolConnector;

/// Host-side dependencies handed to the service at construction
pub struct Collaborators {
    pub icon_themes: Rc<dyn IconThemeRegistry>,
    pub windows: Rc<dyn TopLevelWindows>,
    /// Opens the XSettings connection for desktops that publish over it
    pub protocol: Option<Box<dyn ProtocolConnector>>,
}

pub type ChangeHandler = Box<dyn FnMut(&str)>;

enum ActiveSource {
    Protocol(ProtocolSource),
    File(FileSource),
    /// KDE and unrecognised desktops: empty value, no watching
    Unsupported,
}

impl ActiveSource {
    fn as_source(&self) -> Option<&dyn SettingSource> {
        match self {
            Self::Protocol(source) => Some(source),
            Self::File(source) => Some(source),
            Self::Unsupported => None,
        }
    }

    fn as_source_mut(&mut self) -> Option<&mut dyn SettingSource> {
        match self {
            Self::Protocol(source) => Some(source),
            Self::File(source) => Some(source),
            Self::Unsupported => None,
        }
    }
}

/// Routes source change reports into the debouncer. Without a fixed `now`
/// the clock is read when the change arrives.
struct DebounceSink<'a> {
    debouncer: &'a mut ChangeDebouncer,
    now: Option<Instant>,
}

impl ChangeSink for DebounceSink<'_> {
    fn value_changed(&mut self) {
        self.debouncer.notify(self.now.unwrap_or_else(Instant::now));
    }
}

pub struct DesktopSettingsService {
    desktop: DesktopEnvironment,
    source: ActiveSource,
    debouncer: ChangeDebouncer,
    icon_themes: Rc<dyn IconThemeRegistry>,
    windows: Rc<dyn TopLevelWindows>,
    handlers: Vec<ChangeHandler>,
    running: bool,
}

impl DesktopSettingsService {
    /// Classify the desktop, open its source, fetch the initial value and
    /// start watching. Source failures only degrade the value.
    pub fn initialize(vars: &dyn EnvSource, collaborators: Collaborators, options: &SettingsOptions) -> Self {
        let desktop = classify(vars);

        let mut source = if desktop.uses_xsettings() {
            match &collaborators.protocol {
                Some(connector) => ActiveSource::Protocol(ProtocolSource::new(&options.protocol_key, connector.as_ref())),
                None => {
                    let error = SourceError::SourceUnavailable("no settings protocol connector".into());
                    warn!(desktop = %desktop, error = %error, "Icon theme stays empty");
                    ActiveSource::Unsupported
                }
            }
        } else if desktop.uses_config_file() {
            ActiveSource::File(FileSource::new(&XdgDirs::from_env(vars), &options.file_source))
        } else {
            match desktop {
                // Reading KDE's own config files is not implemented
                DesktopEnvironment::Kde => info!("KDE settings are not read, icon theme stays empty"),
                _ => debug!(desktop = %desktop, error = %SourceError::ClassificationAmbiguous, "No settings source"),
            }
            ActiveSource::Unsupported
        };

        if let Some(source) = source.as_source_mut()
            && let Err(e) = source.start_watching()
        {
            warn!(desktop = %desktop, error = %e, "Change notifications disabled");
        }

        let service = Self {
            desktop,
            source,
            debouncer: ChangeDebouncer::new(options.debounce()),
            icon_themes: collaborators.icon_themes,
            windows: collaborators.windows,
            handlers: Vec::new(),
            running: true,
        };

        service.icon_themes.set_active_theme_name(service.current_icon_theme_name());
        info!(
            desktop = %service.desktop,
            icon_theme = %service.current_icon_theme_name(),
            "Desktop settings initialized"
        );
        service
    }

    pub fn current_icon_theme_name(&self) -> &str {
        self.source.as_source().map(|s| s.current_value()).unwrap_or_default()
    }

    pub fn current_desktop_environment(&self) -> &DesktopEnvironment {
        &self.desktop
    }

    /// Register a handler run once per debounced change batch, with the
    /// icon theme name as it stands after the batch
    pub fn on_changed(&mut self, handler: impl FnMut(&str) + 'static) {
        self.handlers.push(Box::new(handler));
    }

    /// Offer a raw X11 event. Must be called for every event the host
    /// receives, on the event-loop thread.
    pub fn forward_platform_event(&mut self, event: &Event) -> bool {
        self.forward_platform_event_at(event, Instant::now())
    }

    pub fn forward_platform_event_at(&mut self, event: &Event, now: Instant) -> bool {
        if !self.running {
            return false;
        }
        match &mut self.source {
            ActiveSource::Protocol(source) => {
                let mut sink = DebounceSink { debouncer: &mut self.debouncer, now: Some(now) };
                source.process_event(event, &mut sink)
            }
            _ => false,
        }
    }

    /// Offer a single file-watch event
    pub fn forward_file_event(&mut self, event: &notify::Event, now: Instant) -> bool {
        if !self.running {
            return false;
        }
        match &mut self.source {
            ActiveSource::File(source) => {
                let mut sink = DebounceSink { debouncer: &mut self.debouncer, now: Some(now) };
                source.handle_event(event, &mut sink)
            }
            _ => false,
        }
    }

    /// Handle file-watch events queued by the watcher
    pub fn dispatch_file_events(&mut self, now: Instant) -> usize {
        if !self.running {
            return 0;
        }
        match &mut self.source {
            ActiveSource::File(source) => {
                let mut sink = DebounceSink { debouncer: &mut self.debouncer, now: Some(now) };
                source.dispatch_pending(&mut sink)
            }
            _ => 0,
        }
    }

    /// True while a file watch is armed, so [`Self::wait_file_events`] can block
    pub fn is_watching_files(&self) -> bool {
        self.running && matches!(&self.source, ActiveSource::File(source) if source.is_watching())
    }

    /// Block up to `timeout` for file-watch events and handle them
    pub fn wait_file_events(&mut self, timeout: Duration) -> usize {
        if !self.running {
            return 0;
        }
        match &mut self.source {
            ActiveSource::File(source) => {
                let mut sink = DebounceSink { debouncer: &mut self.debouncer, now: None };
                source.wait_pending(timeout, &mut sink)
            }
            _ => 0,
        }
    }

    /// Emit the debounced notification if it is due. Returns true if it fired.
    pub fn dispatch_timers(&mut self, now: Instant) -> bool {
        if !self.debouncer.fire_if_due(now) {
            return false;
        }
        self.emit_changed();
        true
    }

    /// Queued file events, then due timers
    pub fn dispatch(&mut self, now: Instant) -> bool {
        self.dispatch_file_events(now);
        self.dispatch_timers(now)
    }

    /// How long the host may wait before calling [`Self::dispatch_timers`]
    pub fn next_timeout(&self, now: Instant) -> Option<Duration> {
        self.debouncer.time_until_due(now)
    }

    pub fn is_change_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    fn emit_changed(&mut self) {
        let name = self.current_icon_theme_name().to_string();
        info!(icon_theme = %name, handlers = self.handlers.len(), "Desktop settings changed");

        self.icon_themes.set_active_theme_name(&name);
        for handler in &mut self.handlers {
            handler(&name);
        }
        for window in self.windows.top_level_windows() {
            self.windows.request_redraw(window);
        }
    }

    /// Stop the source and drop any pending notification. Idempotent.
    pub fn shutdown(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        if let Some(source) = self.source.as_source_mut() {
            source.stop();
        }
        self.debouncer.cancel();
        info!(desktop = %self.desktop, "Desktop settings service shut down");
    }
}

impl Drop for DesktopSettingsService {
    fn drop(&mut self) {
        self.shutdown();
    }
}
