mod cli;
mod config;
mod error;
mod overlay;
mod watcher;
mod xml;

use std::future::pending;

use anyhow::Result;
use clap::Parser;
use tokio::time::{Instant, MissedTickBehavior};
use tracing_subscriber::EnvFilter;

use cli::Cli;
use config::OverlayConfig;
use overlay::display::{Surface, stdout_surface};
use overlay::{Overlay, Reading};
use watcher::event::WatchEvent;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let mut surface = stdout_surface(cli.format);

    let config = match OverlayConfig::load(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "configuration unavailable");
            surface.show(&Reading::Error {
                text: format!("Error loading config: {err}"),
            })?;
            if !cli.once {
                // Nothing to watch; stay up showing the error like any other failure.
                tokio::signal::ctrl_c().await?;
            }
            surface.finish()?;
            return Ok(());
        }
    };

    let mut overlay = Overlay::new(&config);
    if let Some(reading) = overlay.check() {
        surface.show(reading)?;
    }

    if !cli.once {
        run(&config, &mut overlay, surface.as_mut()).await?;
        tracing::debug!(last = ?overlay.displayed(), "stopped");
    }
    surface.finish()?;
    Ok(())
}

/// Diagnostics go to stderr; stdout is the display surface.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// The event loop: watch events, the fallback poll, the re-arm deadline, Ctrl-C.
async fn run(config: &OverlayConfig, overlay: &mut Overlay, surface: &mut dyn Surface) -> Result<()> {
    let (mut file_watcher, mut events) = match watcher::start_watcher(&config.xml_path) {
        Ok((w, rx)) => (Some(w), Some(rx)),
        Err(err) => {
            tracing::warn!(error = %err, "file watch unavailable, relying on polling");
            (None, None)
        }
    };

    let mut poll = config.poll_interval().map(|period| {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval
    });

    let mut rearm_at: Option<Instant> = None;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            res = &mut shutdown => {
                res?;
                tracing::debug!("shutting down");
                break;
            }
            event = async {
                match events.as_mut() {
                    Some(rx) => rx.recv().await,
                    None => pending().await,
                }
            } => {
                match event {
                    Some(event) => {
                        match &event {
                            WatchEvent::Changed(path) => tracing::debug!(path = %path.display(), "changed"),
                            WatchEvent::Removed(path) => tracing::debug!(path = %path.display(), "removed"),
                        }
                        if let Some(reading) = overlay.check() {
                            surface.show(reading)?;
                        }
                        rearm_at = Some(Instant::now() + config.rearm_delay());
                    }
                    None => {
                        tracing::warn!("watch channel closed, relying on polling");
                        events = None;
                    }
                }
            }
            _ = async {
                match poll.as_mut() {
                    Some(interval) => {
                        interval.tick().await;
                    }
                    None => pending::<()>().await,
                }
            } => {
                if let Some(reading) = overlay.check() {
                    surface.show(reading)?;
                }
                if rearm_at.is_none() && file_watcher.as_ref().is_some_and(|w| w.needs_rearm()) {
                    rearm_at = Some(Instant::now());
                }
            }
            _ = tokio::time::sleep_until(rearm_at.unwrap_or_else(Instant::now)), if rearm_at.is_some() => {
                rearm_at = None;
                if let Some(w) = file_watcher.as_mut() {
                    match w.rearm() {
                        Ok(()) => tracing::trace!(path = ?w.watched_path(), "watch re-armed"),
                        Err(err) => tracing::warn!(error = %err, "re-arming the file watch failed"),
                    }
                }
            }
        }
    }

    Ok(())
}
