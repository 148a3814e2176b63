#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{Level as TraceLevel, info, warn};
use tracing_subscriber::FmtSubscriber;
use x11rb::connection::Connection;
use x11rb::rust_connection::RustConnection;

use xdg_desktop_settings::constants::env;
use xdg_desktop_settings::x11_utils::X11WindowSet;
use xdg_desktop_settings::{
    Collaborators, DesktopSettingsService, GlobalIconTheme, NoWindows, ProcessEnv, ProtocolConnector,
    SettingsOptions, TopLevelWindows, X11Connector,
};

/// Longest a wait that signals cannot interrupt may block
const SIGNAL_CHECK: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(name = "xdg-settings-watch", version, about = "Report the desktop environment and follow icon theme changes")]
struct Args {
    /// JSON file overriding the default options
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the current values and exit
    #[arg(long)]
    once: bool,

    /// X display to connect to (defaults to $DISPLAY)
    #[arg(long)]
    display: Option<String>,

    /// Window to repaint after each change (decimal or 0x-prefixed hex, repeatable)
    #[arg(long = "redraw", value_name = "WINDOW", value_parser = parse_window_id)]
    redraw: Vec<u32>,
}

fn parse_window_id(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid window id {s:?}: {e}"))
}

fn init_logging() -> Result<()> {
    let log_level = match std::env::var(env::LOG_LEVEL)
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[cfg(unix)]
fn register_shutdown_signals(flag: &Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(flag))
            .context(format!("Failed to register handler for signal {signal}"))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn register_shutdown_signals(_flag: &Arc<AtomicBool>) -> Result<()> {
    Ok(())
}

/// Block until the X11 connection is readable, `timeout` passes, or a
/// signal arrives
#[cfg(unix)]
fn wait_for_x11(conn: &RustConnection, timeout: Option<Duration>) -> Result<()> {
    use nix::errno::Errno;
    use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
    use std::os::fd::AsFd;

    let timeout = match timeout {
        // Round up so a sub-millisecond remainder does not spin
        Some(t) => PollTimeout::try_from(t + Duration::from_millis(1)).unwrap_or(PollTimeout::MAX),
        None => PollTimeout::NONE,
    };
    let mut fds = [PollFd::new(conn.stream().as_fd(), PollFlags::POLLIN)];
    match poll(&mut fds, timeout) {
        Ok(_) | Err(Errno::EINTR) => Ok(()),
        Err(e) => Err(e).context("Failed to wait for X11 events"),
    }
}

#[cfg(not(unix))]
fn wait_for_x11(_conn: &RustConnection, timeout: Option<Duration>) -> Result<()> {
    std::thread::sleep(timeout.map_or(SIGNAL_CHECK, |t| t.min(SIGNAL_CHECK)));
    Ok(())
}

fn main() -> Result<()> {
    init_logging()?;
    let args = Args::parse();

    let options = match &args.config {
        Some(path) => SettingsOptions::load(path)?,
        None => SettingsOptions::default(),
    };

    // File-backed desktops work without a display, so X11 is optional
    let x11 = match x11rb::connect(args.display.as_deref()) {
        Ok((conn, screen_num)) => {
            info!(screen = screen_num, "successfully connected to x11");
            Some((Rc::new(conn), screen_num))
        }
        Err(e) => {
            warn!(error = %e, "Could not connect to X11, XSettings unavailable");
            None
        }
    };

    let windows: Rc<dyn TopLevelWindows> = match &x11 {
        Some((conn, _)) => {
            let set = X11WindowSet::new(Rc::clone(conn));
            for window in &args.redraw {
                set.track(*window);
            }
            Rc::new(set)
        }
        None => {
            if !args.redraw.is_empty() {
                warn!(windows = args.redraw.len(), "No X11 connection, --redraw ignored");
            }
            Rc::new(NoWindows)
        }
    };
    let protocol = x11.as_ref().map(|(conn, screen_num)| {
        Box::new(X11Connector::new(Rc::clone(conn), *screen_num)) as Box<dyn ProtocolConnector>
    });

    let mut service = DesktopSettingsService::initialize(
        &ProcessEnv,
        Collaborators { icon_themes: Rc::new(GlobalIconTheme), windows, protocol },
        &options,
    );

    println!(
        "desktop={} icon_theme={}",
        service.current_desktop_environment(),
        service.current_icon_theme_name()
    );
    if args.once {
        return Ok(());
    }

    service.on_changed(|name| println!("icon_theme={name}"));

    let shutdown = Arc::new(AtomicBool::new(false));
    register_shutdown_signals(&shutdown)?;

    while !shutdown.load(Ordering::Relaxed) {
        if let Some((conn, _)) = &x11 {
            while let Some(event) = conn.poll_for_event().context("Lost connection to X11")? {
                service.forward_platform_event(&event);
            }
        }

        service.dispatch(Instant::now());
        if shutdown.load(Ordering::Relaxed) {
            break;
        }

        let due = service.next_timeout(Instant::now());
        if service.is_watching_files() {
            // notify delivers over a channel, which signals do not interrupt
            service.wait_file_events(due.map_or(SIGNAL_CHECK, |t| t.min(SIGNAL_CHECK)));
        } else if let Some((conn, _)) = &x11 {
            wait_for_x11(conn, due)?;
        } else {
            std::thread::sleep(due.map_or(SIGNAL_CHECK, |t| t.min(SIGNAL_CHECK)));
        }
    }

    service.shutdown();
    info!(theme = %GlobalIconTheme::active_theme_name(), "Exiting");
    Ok(())
}
