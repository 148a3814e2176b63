use ini::Ini;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{ChangeSink, SettingSource};
use crate::config::{FileSourceOptions, XdgDirs};
use crate::constants::file::GENERAL_SECTION;
use crate::error::SourceError;

/// Icon theme read from a section-less config file (Razor-qt style)
///
/// The value comes from the user file, then the first system directory that
/// provides a non-empty one, then the configured fallback theme. Only the
/// user file is reacted to, and a change re-reads only that file. The watch
/// sits on the file's directory so a rename over the file is still seen.
pub struct FileSource {
    path: PathBuf,
    key: String,
    value: String,
    watcher: Option<RecommendedWatcher>,
    events: Option<Receiver<notify::Result<notify::Event>>>,
}

impl FileSource {
    pub fn new(dirs: &XdgDirs, options: &FileSourceOptions) -> Self {
        let path = dirs.user.join(&options.relative_path);
        let mut value = read_key(&path, &options.key).unwrap_or_else(|e| {
            debug!(path = %path.display(), error = %e, "User config has no value");
            String::new()
        });

        if value.is_empty() {
            value = dirs
                .system
                .iter()
                .map(|dir| dir.join(&options.relative_path))
                .find_map(|candidate| match read_key(&candidate, &options.key) {
                    Ok(v) if !v.is_empty() => {
                        debug!(path = %candidate.display(), value = %v, "Using system config value");
                        Some(v)
                    }
                    Ok(_) => None,
                    Err(e) => {
                        debug!(path = %candidate.display(), error = %e, "System config has no value");
                        None
                    }
                })
                .unwrap_or_default();
        }

        if value.is_empty() {
            info!(fallback = %options.fallback_theme, "No config provides an icon theme, using fallback");
            value = options.fallback_theme.clone();
        }

        Self {
            path,
            key: options.key.clone(),
            value,
            watcher: None,
            events: None,
        }
    }

    /// The user config file, the only path that is watched
    pub fn config_path(&self) -> &Path {
        &self.path
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.is_some()
    }

    /// Handle every file-watch event queued since the last call. Returns the
    /// number of events that changed the value.
    pub fn dispatch_pending(&mut self, sink: &mut dyn ChangeSink) -> usize {
        let Some(events) = self.events.as_ref() else {
            return 0;
        };
        let queued: Vec<_> = events.try_iter().collect();
        self.handle_queued(queued, sink)
    }

    /// Block up to `timeout` for the first file-watch event, then handle it
    /// and everything queued behind it. Returns at once when not watching.
    pub fn wait_pending(&mut self, timeout: Duration, sink: &mut dyn ChangeSink) -> usize {
        let Some(events) = self.events.as_ref() else {
            return 0;
        };
        let Ok(first) = events.recv_timeout(timeout) else {
            return 0;
        };
        let queued: Vec<_> = std::iter::once(first).chain(events.try_iter()).collect();
        self.handle_queued(queued, sink)
    }

    fn handle_queued(&mut self, queued: Vec<notify::Result<notify::Event>>, sink: &mut dyn ChangeSink) -> usize {
        let mut handled = 0;
        for result in queued {
            match result {
                Ok(event) => {
                    if self.handle_event(&event, sink) {
                        handled += 1;
                    }
                }
                Err(e) => warn!(path = %self.path.display(), error = %e, "File watch error"),
            }
        }
        handled
    }

    /// Re-read the user file if `event` concerns it. Fallback locations are
    /// not consulted again.
    pub fn handle_event(&mut self, event: &notify::Event, sink: &mut dyn ChangeSink) -> bool {
        if matches!(event.kind, EventKind::Access(_)) || !event.paths.iter().any(|p| p == &self.path) {
            return false;
        }

        self.value = read_key(&self.path, &self.key).unwrap_or_else(|e| {
            debug!(path = %self.path.display(), error = %e, "Watched config has no value");
            String::new()
        });
        info!(path = %self.path.display(), value = %self.value, kind = ?event.kind, "Config file changed");
        sink.value_changed();
        true
    }
}

impl SettingSource for FileSource {
    fn current_value(&self) -> &str {
        &self.value
    }

    fn start_watching(&mut self) -> Result<(), SourceError> {
        if self.watcher.is_some() {
            return Ok(());
        }

        if !self.path.is_file() {
            return Err(SourceError::WatchSetupFailed(format!("{} does not exist", self.path.display())));
        }
        // Watch the directory; a rename over the file replaces its inode
        let dir = self.path.parent().unwrap_or(&self.path);

        let (tx, rx) = mpsc::channel::<notify::Result<notify::Event>>();
        let mut watcher =
            notify::recommended_watcher(tx).map_err(|e| SourceError::WatchSetupFailed(e.to_string()))?;
        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| SourceError::WatchSetupFailed(format!("{}: {e}", dir.display())))?;

        info!(path = %self.path.display(), dir = %dir.display(), "Watching config file");
        self.watcher = Some(watcher);
        self.events = Some(rx);
        Ok(())
    }

    fn stop(&mut self) {
        if self.watcher.take().is_some() {
            debug!(path = %self.path.display(), "Stopped watching config file");
        }
        self.events = None;
    }
}

/// Read `key` from the section-less part of an INI file. Keys written under
/// an explicit `[General]` header are accepted too.
fn read_key(path: &Path, key: &str) -> Result<String, SourceError> {
    let ini = Ini::load_from_file(path)
        .map_err(|e| SourceError::SourceUnavailable(format!("{}: {e}", path.display())))?;
    ini.section(None::<String>)
        .and_then(|s| s.get(key))
        .or_else(|| ini.section(Some(GENERAL_SECTION)).and_then(|s| s.get(key)))
        .map(str::to_string)
        .ok_or_else(|| SourceError::KeyAbsent(key.to_string()))
}
