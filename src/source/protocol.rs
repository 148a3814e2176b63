use tracing::{debug, info, warn};
use x11rb::protocol::Event;
use x11rb::protocol::xproto::{EventMask, Window};

use super::{ChangeCounter, ChangeSink, SettingSource};
use crate::error::SourceError;
use crate::x11_utils::event_window;
use crate::xsettings::{ProtocolConnector, Setting, SettingAction, SettingsProtocol, XSettingsHandler};

/// Icon theme published over a settings-broadcast protocol (XSettings)
pub struct ProtocolSource {
    key: String,
    protocol: Option<Box<dyn SettingsProtocol>>,
    state: ProtocolState,
}

#[derive(Debug, Default)]
struct ProtocolState {
    value: String,
    /// Windows the protocol layer wants raw events for. A handful at most,
    /// so membership is a linear scan.
    watched: Vec<Window>,
}

/// Handler for one protocol call: updates the state and forwards changes
/// of the watched key to the sink
struct Dispatch<'a> {
    key: &'a str,
    state: &'a mut ProtocolState,
    sink: &'a mut dyn ChangeSink,
}

impl XSettingsHandler for Dispatch<'_> {
    fn setting_changed(&mut self, name: &str, action: SettingAction, setting: Option<&Setting>) {
        if name != self.key {
            return;
        }
        match action {
            SettingAction::Deleted => self.state.value.clear(),
            SettingAction::New | SettingAction::Changed => {
                self.state.value = setting.and_then(Setting::as_str).unwrap_or_default().to_string();
            }
        }
        info!(key = %name, action = ?action, value = %self.state.value, "Watched setting changed");
        self.sink.value_changed();
    }

    fn watch(&mut self, window: Window, is_start: bool, _mask: EventMask) {
        let watched = &mut self.state.watched;
        if is_start {
            if !watched.contains(&window) {
                watched.push(window);
            }
        } else if let Some(pos) = watched.iter().position(|w| *w == window) {
            watched.remove(pos);
        }
        debug!(window = window, start = is_start, watched = watched.len(), "Protocol watch updated");
    }
}

impl ProtocolSource {
    /// Connect and fetch the initial value of `key`. A failed connection or
    /// an absent key leaves the value empty.
    pub fn new(key: &str, connector: &dyn ProtocolConnector) -> Self {
        let mut state = ProtocolState::default();
        let mut initial = ChangeCounter::default();
        let connected = connector.connect(&mut Dispatch { key, state: &mut state, sink: &mut initial });

        let protocol = match connected {
            Ok(protocol) => Some(protocol),
            Err(e) => {
                let error = SourceError::SourceUnavailable(format!("{e:#}"));
                warn!(error = %error, "Settings protocol unavailable, icon theme stays empty");
                state.watched.clear();
                None
            }
        };

        if let Some(protocol) = &protocol {
            match protocol.setting(key) {
                Some(setting) => {
                    state.value = setting.as_str().unwrap_or_default().to_string();
                }
                None => {
                    debug!(error = %SourceError::KeyAbsent(key.to_string()), "Initial query found nothing");
                    state.value.clear();
                }
            }
        }

        info!(key = %key, value = %state.value, connected = protocol.is_some(), "Protocol source ready");
        Self { key: key.to_string(), protocol, state }
    }

    pub fn is_connected(&self) -> bool {
        self.protocol.is_some()
    }

    pub fn watched_handles(&self) -> &[Window] {
        &self.state.watched
    }

    /// Offer a raw platform event. Returns true only when the event targets a
    /// watched handle and the protocol layer consumed it.
    pub fn process_event(&mut self, event: &Event, sink: &mut dyn ChangeSink) -> bool {
        let Some(protocol) = self.protocol.as_mut() else {
            return false;
        };
        let Some(window) = event_window(event) else {
            return false;
        };
        if !self.state.watched.contains(&window) {
            return false;
        }

        let mut dispatch = Dispatch { key: &self.key, state: &mut self.state, sink };
        protocol.process_event(event, &mut dispatch)
    }
}

impl SettingSource for ProtocolSource {
    fn current_value(&self) -> &str {
        &self.state.value
    }

    fn start_watching(&mut self) -> Result<(), SourceError> {
        // Callbacks are registered when connecting; without a connection
        // there is nothing to watch.
        if self.protocol.is_some() {
            Ok(())
        } else {
            Err(SourceError::WatchSetupFailed("no settings protocol connection".into()))
        }
    }

    fn stop(&mut self) {
        if let Some(mut protocol) = self.protocol.take() {
            let mut ignored = ChangeCounter::default();
            protocol.close(&mut Dispatch { key: &self.key, state: &mut self.state, sink: &mut ignored });
            debug!("Protocol source stopped");
        }
        self.state.watched.clear();
    }
}
