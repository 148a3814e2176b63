use anyhow::{Context, Result, bail};
use std::rc::Rc;
use tracing::{debug, info, trace, warn};
use x11rb::NONE;
use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::protocol::xproto::*;

use super::wire::decode_settings;
use super::{ProtocolConnector, Setting, SettingsProtocol, SettingsTable, XSettingsHandler, notify_differences};
use crate::x11_utils::{XSettingsAtoms, add_event_mask};

fn root_mask() -> EventMask {
    EventMask::STRUCTURE_NOTIFY
}

fn manager_mask() -> EventMask {
    EventMask::PROPERTY_CHANGE | EventMask::STRUCTURE_NOTIFY
}

/// The X server requests an XSettings client makes
pub trait SettingsServer {
    fn root(&self) -> Window;

    fn atoms(&self) -> XSettingsAtoms;

    /// Add `mask` to the events selected on the root window
    fn select_root_events(&self, mask: EventMask) -> Result<()>;

    /// Current selection owner, with `mask` selected on it. The lookup and
    /// the select happen under one server grab.
    fn manager_owner(&self, mask: EventMask) -> Result<Option<Window>>;

    /// Raw `_XSETTINGS_SETTINGS` payload of `window`, `None` if unset
    fn settings_property(&self, window: Window) -> Result<Option<Vec<u8>>>;
}

/// [`SettingsServer`] over an x11rb connection
pub struct X11Server<C: Connection> {
    conn: Rc<C>,
    root: Window,
    atoms: XSettingsAtoms,
}

impl<C: Connection> X11Server<C> {
    pub fn new(conn: Rc<C>, screen_num: usize) -> Result<Self> {
        let root = conn
            .setup()
            .roots
            .get(screen_num)
            .map(|screen| screen.root)
            .with_context(|| format!("Screen {screen_num} does not exist"))?;
        let atoms = XSettingsAtoms::new(&*conn, screen_num)?;
        Ok(Self { conn, root, atoms })
    }

    fn select_owner(&self, mask: EventMask) -> Result<Option<Window>> {
        let owner = self
            .conn
            .get_selection_owner(self.atoms.selection)
            .context("Failed to query XSettings selection owner")?
            .reply()
            .context("Failed to get reply for XSettings selection owner")?
            .owner;
        if owner == NONE {
            return Ok(None);
        }
        self.conn
            .change_window_attributes(owner, &ChangeWindowAttributesAux::new().event_mask(mask))
            .context(format!("Failed to select events on manager window {owner}"))?;
        Ok(Some(owner))
    }
}

impl<C: Connection> SettingsServer for X11Server<C> {
    fn root(&self) -> Window {
        self.root
    }

    fn atoms(&self) -> XSettingsAtoms {
        self.atoms
    }

    fn select_root_events(&self, mask: EventMask) -> Result<()> {
        add_event_mask(&*self.conn, self.root, mask)
    }

    fn manager_owner(&self, mask: EventMask) -> Result<Option<Window>> {
        // Grab so the owner cannot vanish between the query and the select
        self.conn.grab_server().context("Failed to grab X server")?;
        let owner = self.select_owner(mask);
        self.conn.ungrab_server().context("Failed to ungrab X server")?;
        self.conn.flush().context("Failed to flush X11 connection")?;
        owner
    }

    fn settings_property(&self, window: Window) -> Result<Option<Vec<u8>>> {
        let reply = self
            .conn
            .get_property(false, window, self.atoms.settings, self.atoms.settings, 0, u32::MAX)
            .context(format!("Failed to query XSettings property on window {window}"))?
            .reply()
            .context(format!("Failed to get XSettings property reply for window {window}"))?;

        if reply.type_ == NONE {
            return Ok(None);
        }
        if reply.type_ != self.atoms.settings || reply.format != 8 {
            bail!("Unexpected XSettings property type={} format={}", reply.type_, reply.format);
        }
        Ok(Some(reply.value))
    }
}

/// Client end of the XSettings protocol for one screen
pub struct XSettingsClient<S: SettingsServer> {
    server: S,
    root: Window,
    atoms: XSettingsAtoms,
    manager_window: Option<Window>,
    settings: SettingsTable,
    closed: bool,
}

impl<S: SettingsServer> XSettingsClient<S> {
    /// Start following the manager on `server`'s screen.
    ///
    /// Asks `handler` to watch the root window, then locates the current
    /// manager (if any) and reports its settings as new.
    pub fn new(server: S, handler: &mut dyn XSettingsHandler) -> Result<Self> {
        let root = server.root();
        let atoms = server.atoms();

        server
            .select_root_events(root_mask())
            .context("Failed to watch root window for manager announcements")?;
        handler.watch(root, true, root_mask());

        let mut client = Self {
            server,
            root,
            atoms,
            manager_window: None,
            settings: SettingsTable::new(),
            closed: false,
        };
        client.check_manager_window(handler)?;
        Ok(client)
    }

    pub fn manager_window(&self) -> Option<Window> {
        self.manager_window
    }

    pub fn settings(&self) -> &SettingsTable {
        &self.settings
    }

    fn check_manager_window(&mut self, handler: &mut dyn XSettingsHandler) -> Result<()> {
        if let Some(old) = self.manager_window.take() {
            handler.watch(old, false, manager_mask());
        }

        let owner = match self.server.manager_owner(manager_mask()) {
            Ok(owner) => owner,
            Err(e) => {
                // No manager to read from: every known setting is gone
                self.read_settings(handler);
                return Err(e);
            }
        };

        match owner {
            Some(window) => {
                info!(window = window, "Found XSettings manager");
                handler.watch(window, true, manager_mask());
            }
            None => debug!("No XSettings manager running"),
        }
        self.manager_window = owner;
        self.read_settings(handler);
        Ok(())
    }

    fn read_settings(&mut self, handler: &mut dyn XSettingsHandler) {
        let fresh = match self.manager_window {
            Some(window) => self.fetch_settings(window).unwrap_or_else(|e| {
                warn!(window = window, error = %e, "Ignoring unreadable XSettings property");
                SettingsTable::new()
            }),
            None => SettingsTable::new(),
        };
        let old = std::mem::replace(&mut self.settings, fresh);
        notify_differences(&old, &self.settings, handler);
    }

    fn fetch_settings(&self, window: Window) -> Result<SettingsTable> {
        let Some(payload) = self.server.settings_property(window)? else {
            return Ok(SettingsTable::new());
        };
        let decoded = decode_settings(&payload).context("Malformed XSettings property")?;
        trace!(serial = decoded.serial, count = decoded.settings.len(), "Read XSettings");
        Ok(decoded.settings)
    }

    fn recheck_manager(&mut self, handler: &mut dyn XSettingsHandler) {
        if let Err(e) = self.check_manager_window(handler) {
            warn!(error = %e, "Failed to locate XSettings manager");
        }
    }
}

/// A `MANAGER` client message on the root announcing our selection
pub fn announces_manager(event: &ClientMessageEvent, root: Window, atoms: &XSettingsAtoms) -> bool {
    event.window == root && event.type_ == atoms.manager && event.data.as_data32()[1] == atoms.selection
}

impl<S: SettingsServer> SettingsProtocol for XSettingsClient<S> {
    fn setting(&self, name: &str) -> Option<Setting> {
        self.settings.get(name).cloned()
    }

    fn process_event(&mut self, event: &Event, handler: &mut dyn XSettingsHandler) -> bool {
        if self.closed {
            return false;
        }
        match event {
            Event::ClientMessage(ev) if announces_manager(ev, self.root, &self.atoms) => {
                debug!("XSettings manager announced");
                self.recheck_manager(handler);
                true
            }
            Event::DestroyNotify(ev) if Some(ev.event) == self.manager_window => {
                debug!(window = ev.event, "XSettings manager window destroyed");
                self.recheck_manager(handler);
                true
            }
            Event::PropertyNotify(ev) if Some(ev.window) == self.manager_window => {
                self.read_settings(handler);
                true
            }
            _ => false,
        }
    }

    fn close(&mut self, handler: &mut dyn XSettingsHandler) {
        if self.closed {
            return;
        }
        handler.watch(self.root, false, root_mask());
        if let Some(window) = self.manager_window.take() {
            handler.watch(window, false, manager_mask());
        }
        self.settings.clear();
        self.closed = true;
        debug!("XSettings client closed");
    }
}

/// Opens XSettings clients on a shared x11rb connection
pub struct X11Connector<C: Connection> {
    conn: Rc<C>,
    screen_num: usize,
}

impl<C: Connection> X11Connector<C> {
    pub fn new(conn: Rc<C>, screen_num: usize) -> Self {
        Self { conn, screen_num }
    }
}

impl<C: Connection + 'static> ProtocolConnector for X11Connector<C> {
    fn connect(&self, handler: &mut dyn XSettingsHandler) -> Result<Box<dyn SettingsProtocol>> {
        let server = X11Server::new(Rc::clone(&self.conn), self.screen_num)?;
        let client = XSettingsClient::new(server, handler)?;
        Ok(Box::new(client))
    }
}
