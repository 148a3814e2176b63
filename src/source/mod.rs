//! Backing stores for the icon theme setting
//!
//! A source owns whatever it needs to read and watch its store. Change
//! notifications leave through a [`ChangeSink`] supplied with each dispatch
//! call, so the source never holds a reference back into the service.

mod file;
mod protocol;

pub use file::FileSource;
pub use protocol::ProtocolSource;

use crate::error::SourceError;

/// Receives one call per observed change of the watched value
pub trait ChangeSink {
    fn value_changed(&mut self);
}

/// Counts changes; useful where no debouncing is wanted
#[derive(Debug, Default)]
pub struct ChangeCounter {
    pub changes: usize,
}

impl ChangeSink for ChangeCounter {
    fn value_changed(&mut self) {
        self.changes += 1;
    }
}

pub trait SettingSource {
    /// Last value fetched or pushed; empty means unset
    fn current_value(&self) -> &str;

    /// Arm change watching. On error the value stays static.
    fn start_watching(&mut self) -> Result<(), SourceError>;

    /// Release watches and connections. Safe to call more than once.
    fn stop(&mut self);
}
