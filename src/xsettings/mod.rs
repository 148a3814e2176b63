//! XSettings client side
//!
//! XSettings managers publish small typed key/value settings on a window
//! property and announce changes through X11 events. `client` talks to the
//! X server, `wire` decodes the property payload.
//!
//! Callbacks go through a single [`XSettingsHandler`] passed into each call
//! that may produce notifications, so the handler can borrow whatever state
//! it updates for exactly that call.

pub mod client;
pub mod wire;

pub use client::{SettingsServer, X11Connector, X11Server, XSettingsClient};

use std::collections::BTreeMap;
use x11rb::protocol::Event;
use x11rb::protocol::xproto::{EventMask, Window};

/// 16-bit per channel color, as carried by the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub red: u16,
    pub green: u16,
    pub blue: u16,
    pub alpha: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingValue {
    Int(i32),
    String(String),
    Color(Rgba),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Setting {
    pub name: String,
    pub value: SettingValue,
    /// Manager serial at which this setting last changed
    pub last_change_serial: u32,
}

impl Setting {
    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            SettingValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Two settings are the same when their values match; serials are ignored
    pub fn same_value(&self, other: &Setting) -> bool {
        self.value == other.value
    }
}

/// Setting table keyed by name
pub type SettingsTable = BTreeMap<String, Setting>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingAction {
    New,
    Changed,
    Deleted,
}

/// Receives notifications from the protocol layer
pub trait XSettingsHandler {
    /// A setting appeared, changed value, or disappeared. `setting` is `None`
    /// only for [`SettingAction::Deleted`].
    fn setting_changed(&mut self, name: &str, action: SettingAction, setting: Option<&Setting>);

    /// The protocol layer starts or stops needing raw events for `window`
    fn watch(&mut self, window: Window, is_start: bool, mask: EventMask);
}

/// An open settings-broadcast connection
pub trait SettingsProtocol {
    /// Synchronous lookup of one setting
    fn setting(&self, name: &str) -> Option<Setting>;

    /// Offer a raw event; returns true when the protocol consumed it
    fn process_event(&mut self, event: &Event, handler: &mut dyn XSettingsHandler) -> bool;

    /// Release watches. Safe to call more than once.
    fn close(&mut self, handler: &mut dyn XSettingsHandler);
}

/// Opens a [`SettingsProtocol`]. The handler receives the initial watch
/// requests and the initial setting notifications.
pub trait ProtocolConnector {
    fn connect(&self, handler: &mut dyn XSettingsHandler) -> anyhow::Result<Box<dyn SettingsProtocol>>;
}

/// Report the differences between two tables to `handler`
pub fn notify_differences(old: &SettingsTable, new: &SettingsTable, handler: &mut dyn XSettingsHandler) {
    for (name, setting) in new {
        match old.get(name) {
            None => handler.setting_changed(name, SettingAction::New, Some(setting)),
            Some(previous) if !previous.same_value(setting) => {
                handler.setting_changed(name, SettingAction::Changed, Some(setting))
            }
            Some(_) => {}
        }
    }
    for name in old.keys().filter(|name| !new.contains_key(*name)) {
        handler.setting_changed(name, SettingAction::Deleted, None);
    }
}
