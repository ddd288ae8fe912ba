//! evilwm
//!
//! A minimalist window manager for X11: no decorations beyond a border,
//! keyboard and mouse driven move and resize, and virtual desktops.

mod config;
mod error;
mod shared;
mod spawn;
mod wm;
mod x11_async;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Args, Config};
use crate::wm::display::DisplayServer;
use crate::wm::x11::X11Display;
use crate::wm::WindowManager;

/// Why the event loop stopped.
enum Exit {
    Quit,
    ConnectionLost,
}

/// Drain every queued X event through the manager.
fn drain(wm: &mut WindowManager<X11Display>) -> crate::error::Result<()> {
    while let Some(event) = wm.display.next_event()? {
        wm.handle_event(event)?;
        if wm.should_quit() {
            break;
        }
    }
    wm.display.flush()
}

async fn run(wm: &mut WindowManager<X11Display>, args: &Args) -> Result<Exit> {
    let stream = x11_async::X11EventStream::new(wm.display.connection())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sighup = signal(SignalKind::hangup())?;

    // Edge-triggered readiness can be missed when a reply read pulls events
    // into the connection's queue, so drain periodically as well.
    let mut fallback = tokio::time::interval(Duration::from_millis(250));
    fallback.tick().await;

    info!("Starting main event loop");
    loop {
        if let Err(e) = drain(wm) {
            error!("X connection failed: {}", e);
            return Ok(Exit::ConnectionLost);
        }
        if wm.should_quit() {
            return Ok(Exit::Quit);
        }

        tokio::select! {
            () = stream.wait_readable() => {}
            _ = fallback.tick() => {}
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
                wm.quit();
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down");
                wm.quit();
            }
            _ = sighup.recv() => {
                info!("Received SIGHUP, reloading configuration");
                match Config::load(args) {
                    Ok(config) => wm.reload(config)?,
                    Err(e) => warn!("Keeping current configuration: {:#}", e),
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "evilwm=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = Config::load(&args).context("Failed to load configuration")?;
    info!("Starting evilwm {}", env!("CARGO_PKG_VERSION"));

    let display = X11Display::connect(config.display.as_deref(), &config.appearance.font)
        .context("Failed to connect to X server")?;
    let mut wm = WindowManager::new(display, config);
    wm.start().context("Failed to take over the display")?;

    match run(&mut wm, &args).await? {
        Exit::Quit => {
            wm.shutdown().context("Failed to release clients")?;
            info!("Bye");
            Ok(())
        }
        Exit::ConnectionLost => anyhow::bail!("lost connection to the X server"),
    }
}
