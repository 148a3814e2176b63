//! In-memory stand-ins for the X server and the host application

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use x11rb::protocol::Event;
use x11rb::protocol::xproto::{
    EventMask, PROPERTY_NOTIFY_EVENT, Property, PropertyNotifyEvent, Window,
};

use crate::collaborators::{IconThemeRegistry, TopLevelWindows};
use crate::xsettings::{
    ProtocolConnector, Setting, SettingValue, SettingsProtocol, SettingsTable, XSettingsHandler,
    notify_differences,
};

pub(crate) const FAKE_ROOT: Window = 0x100;
pub(crate) const FAKE_MANAGER: Window = 0x200;

pub(crate) fn string_setting(name: &str, value: &str) -> Setting {
    Setting {
        name: name.to_string(),
        value: SettingValue::String(value.to_string()),
        last_change_serial: 0,
    }
}

pub(crate) fn property_notify(window: Window) -> Event {
    Event::PropertyNotify(PropertyNotifyEvent {
        response_type: PROPERTY_NOTIFY_EVENT,
        sequence: 0,
        window,
        atom: 1,
        time: 0,
        state: Property::NEW_VALUE,
    })
}

pub(crate) fn env_of(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// What the fake manager publishes. A staged table becomes current on the
/// next PropertyNotify for the manager window.
#[derive(Debug, Default)]
pub(crate) struct FakeBroadcast {
    pub current: SettingsTable,
    pub staged: Option<SettingsTable>,
    pub closes: usize,
}

impl FakeBroadcast {
    pub fn stage_string(&mut self, name: &str, value: &str) {
        let mut next = self.staged.take().unwrap_or_else(|| self.current.clone());
        next.insert(name.to_string(), string_setting(name, value));
        self.staged = Some(next);
    }

    pub fn stage_delete(&mut self, name: &str) {
        let mut next = self.staged.take().unwrap_or_else(|| self.current.clone());
        next.remove(name);
        self.staged = Some(next);
    }
}

pub(crate) struct FakeConnector {
    pub broadcast: Rc<RefCell<FakeBroadcast>>,
    fail: bool,
}

impl FakeConnector {
    pub fn with_string(name: &str, value: &str) -> Self {
        let mut broadcast = FakeBroadcast::default();
        broadcast.current.insert(name.to_string(), string_setting(name, value));
        Self { broadcast: Rc::new(RefCell::new(broadcast)), fail: false }
    }

    pub fn failing() -> Self {
        Self { broadcast: Rc::default(), fail: true }
    }
}

impl ProtocolConnector for FakeConnector {
    fn connect(&self, handler: &mut dyn XSettingsHandler) -> anyhow::Result<Box<dyn SettingsProtocol>> {
        if self.fail {
            anyhow::bail!("cannot open display");
        }
        handler.watch(FAKE_ROOT, true, EventMask::STRUCTURE_NOTIFY);
        handler.watch(FAKE_MANAGER, true, EventMask::PROPERTY_CHANGE);
        notify_differences(&SettingsTable::new(), &self.broadcast.borrow().current, handler);
        Ok(Box::new(FakeProtocol { broadcast: Rc::clone(&self.broadcast), closed: false }))
    }
}

struct FakeProtocol {
    broadcast: Rc<RefCell<FakeBroadcast>>,
    closed: bool,
}

impl SettingsProtocol for FakeProtocol {
    fn setting(&self, name: &str) -> Option<Setting> {
        self.broadcast.borrow().current.get(name).cloned()
    }

    fn process_event(&mut self, event: &Event, handler: &mut dyn XSettingsHandler) -> bool {
        match event {
            Event::PropertyNotify(ev) if ev.window == FAKE_MANAGER => {
                let mut broadcast = self.broadcast.borrow_mut();
                if let Some(next) = broadcast.staged.take() {
                    let old = std::mem::replace(&mut broadcast.current, next);
                    notify_differences(&old, &broadcast.current, handler);
                }
                true
            }
            _ => false,
        }
    }

    fn close(&mut self, handler: &mut dyn XSettingsHandler) {
        if self.closed {
            return;
        }
        handler.watch(FAKE_ROOT, false, EventMask::STRUCTURE_NOTIFY);
        handler.watch(FAKE_MANAGER, false, EventMask::PROPERTY_CHANGE);
        self.broadcast.borrow_mut().closes += 1;
        self.closed = true;
    }
}

/// Shared log of everything the host collaborators were asked to do
pub(crate) type HostLog = Rc<RefCell<Vec<String>>>;

pub(crate) struct RecordingRegistry {
    pub log: HostLog,
}

impl IconThemeRegistry for RecordingRegistry {
    fn set_active_theme_name(&self, name: &str) {
        self.log.borrow_mut().push(format!("theme:{name}"));
    }
}

pub(crate) struct RecordingWindows {
    pub windows: Vec<Window>,
    pub log: HostLog,
}

impl TopLevelWindows for RecordingWindows {
    fn top_level_windows(&self) -> Vec<Window> {
        self.windows.clone()
    }

    fn request_redraw(&self, window: Window) {
        self.log.borrow_mut().push(format!("redraw:{window}"));
    }
}
