//! Daemon wiring: startup checks, the optional bulk pass over existing
//! files, the filesystem watcher, and the event loop.

use crate::dispatch::Dispatcher;
use crate::startup::{ensure_directories, probe_transcoder, StartupError};
use crate::watch::{spawn_watcher, WatchError};
use auto_convert_config::Config;
use notify::RecommendedWatcher;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Capacity of the watcher-to-dispatcher event channel. Bursts beyond this
/// block the watcher callback briefly instead of dropping events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How long shutdown waits for in-flight conversions to finish.
const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("failed to watch input directory: {0}")]
    Watch(#[from] WatchError),
}

/// The media conversion daemon.
///
/// Construction is cheap; all work happens in [`Daemon::run`], which only
/// returns on shutdown or a fatal startup error.
pub struct Daemon {
    config: Arc<Config>,
    dispatcher: Arc<Dispatcher>,
}

impl Daemon {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&config)));
        Self { config, dispatcher }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Run until Ctrl-C.
    pub async fn run(&self) -> Result<(), DaemonError> {
        let (mut event_rx, _watcher) = self.start().await?;

        loop {
            tokio::select! {
                maybe_path = event_rx.recv() => {
                    match maybe_path {
                        Some(path) => self.dispatcher.handle_event(path),
                        None => {
                            tracing::warn!("Watcher channel closed, shutting down");
                            break;
                        }
                    }
                }
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        tracing::error!("Failed to listen for shutdown signal: {}", e);
                    }
                    tracing::info!("Shutdown requested");
                    break;
                }
            }
        }

        self.drain_in_flight().await;
        Ok(())
    }

    /// Startup phase: directory checks, transcoder probe, the bulk pass
    /// over pre-existing files, then watcher registration.
    ///
    /// The watcher is spawned only after the bulk pass completes; the pass
    /// is sequential and can take a long time on large videos, and nothing
    /// drains the event channel until the run loop starts, so a watcher
    /// registered earlier could fill the channel and stall the notify
    /// delivery thread inside `blocking_send`.
    async fn start(
        &self,
    ) -> Result<(mpsc::Receiver<PathBuf>, RecommendedWatcher), DaemonError> {
        ensure_directories(&self.config).await?;
        probe_transcoder(&self.config).await;

        if self.config.watch.process_existing {
            let results = self.dispatcher.run_bulk_pass().await;
            if !results.is_empty() {
                tracing::info!("Bulk pass finished: {} file(s) examined", results.len());
            }
        }

        tracing::info!(
            "Watching {} -> {}",
            self.config.paths.input_dir.display(),
            self.config.paths.output_dir.display()
        );

        let (event_tx, event_rx) = mpsc::channel::<PathBuf>(EVENT_CHANNEL_CAPACITY);
        let watcher = spawn_watcher(&self.config.paths.input_dir, event_tx)?;

        Ok((event_rx, watcher))
    }

    /// Give in-flight conversions a bounded window to finish.
    async fn drain_in_flight(&self) {
        let tracker = self.dispatcher.tracker();
        if tracker.is_empty() {
            return;
        }

        tracing::info!(
            "Waiting for {} in-flight conversion(s) to finish",
            tracker.len()
        );
        let deadline = tokio::time::Instant::now() + SHUTDOWN_DRAIN_TIMEOUT;
        while !tracker.is_empty() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let remaining = tracker.len();
        if remaining > 0 {
            tracing::warn!("Abandoning {} unfinished conversion(s)", remaining);
        }
    }
}
