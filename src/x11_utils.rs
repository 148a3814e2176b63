use anyhow::{Context, Result};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, error};
use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::protocol::xproto::*;

use crate::collaborators::TopLevelWindows;
use crate::constants::xsettings;

/// Pre-cached XSettings atoms to avoid repeated roundtrips
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XSettingsAtoms {
    /// `_XSETTINGS_S<screen>`, owned by the running manager
    pub selection: Atom,
    /// `_XSETTINGS_SETTINGS`, property and property type on the manager window
    pub settings: Atom,
    /// `MANAGER`, client message type announcing a new selection owner
    pub manager: Atom,
}

impl XSettingsAtoms {
    pub fn new(conn: &impl Connection, screen_num: usize) -> Result<Self> {
        let selection_name = format!("{}{}", xsettings::SELECTION_PREFIX, screen_num);
        Ok(Self {
            selection: intern(conn, selection_name.as_bytes())?,
            settings: intern(conn, xsettings::SETTINGS_PROPERTY)?,
            manager: intern(conn, xsettings::MANAGER)?,
        })
    }
}

fn intern(conn: &impl Connection, name: &[u8]) -> Result<Atom> {
    let printable = String::from_utf8_lossy(name);
    Ok(conn
        .intern_atom(false, name)
        .context(format!("Failed to intern {printable} atom"))?
        .reply()
        .context(format!("Failed to get reply for {printable} atom"))?
        .atom)
}

/// Add `mask` to the events this client already selects on `window`
pub fn add_event_mask(conn: &impl Connection, window: Window, mask: EventMask) -> Result<()> {
    let current = conn
        .get_window_attributes(window)
        .context(format!("Failed to query attributes of window {window}"))?
        .reply()
        .context(format!("Failed to get attributes reply for window {window}"))?
        .your_event_mask;
    conn.change_window_attributes(
        window,
        &ChangeWindowAttributesAux::new().event_mask(current | mask),
    )
    .context(format!("Failed to select events on window {window}"))?;
    Ok(())
}

/// Window an event is addressed to, for the events a settings client sees
pub fn event_window(event: &Event) -> Option<Window> {
    Some(match event {
        Event::PropertyNotify(e) => e.window,
        Event::ClientMessage(e) => e.window,
        Event::DestroyNotify(e) => e.event,
        Event::UnmapNotify(e) => e.event,
        Event::MapNotify(e) => e.event,
        Event::ConfigureNotify(e) => e.event,
        Event::Expose(e) => e.window,
        _ => return None,
    })
}

/// The host's own top-level windows on an X11 connection
pub struct X11WindowSet<C: Connection> {
    conn: Rc<C>,
    windows: RefCell<Vec<Window>>,
}

impl<C: Connection> X11WindowSet<C> {
    pub fn new(conn: Rc<C>) -> Self {
        Self { conn, windows: RefCell::new(Vec::new()) }
    }

    pub fn track(&self, window: Window) {
        let mut windows = self.windows.borrow_mut();
        if !windows.contains(&window) {
            windows.push(window);
        }
    }

    pub fn untrack(&self, window: Window) {
        self.windows.borrow_mut().retain(|w| *w != window);
    }
}

impl<C: Connection> TopLevelWindows for X11WindowSet<C> {
    fn top_level_windows(&self) -> Vec<Window> {
        self.windows.borrow().clone()
    }

    /// Clearing the whole window with exposures on makes the server send an
    /// Expose, which the host repaints like any other damage.
    fn request_redraw(&self, window: Window) {
        let result = self
            .conn
            .clear_area(true, window, 0, 0, 0, 0)
            .context(format!("Failed to request redraw of window {window}"))
            .and_then(|_| self.conn.flush().context("Failed to flush X11 connection after redraw request"));
        match result {
            Ok(()) => debug!(window = window, "Requested redraw"),
            Err(e) => error!(window = window, error = %e, "Redraw request failed"),
        }
    }
}
