//! Filesystem event source for the watched input directory.
//!
//! Emits the path of every created or modified entry directly inside the
//! input directory (non-recursive). A single file write commonly raises
//! several modify notifications; deduplication is not attempted here, it is
//! the dispatcher's job via the in-flight tracker.

use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;

/// Error type for watcher setup
#[derive(Debug, Error)]
pub enum WatchError {
    /// Failed to create or register the filesystem watcher
    #[error("Filesystem watcher error: {0}")]
    Notify(#[from] notify::Error),
}

/// Start watching `input_dir` and forward raw event paths into `event_tx`.
///
/// The returned watcher must be kept alive for the watch to stay
/// registered; dropping it stops event delivery and releases the OS watch
/// resources. Events are forwarded from notify's own delivery thread with
/// `blocking_send`, so the channel applies backpressure there rather than
/// dropping paths.
pub fn spawn_watcher(
    input_dir: &Path,
    event_tx: mpsc::Sender<PathBuf>,
) -> Result<RecommendedWatcher, WatchError> {
    let mut watcher = RecommendedWatcher::new(
        move |res: Result<Event, notify::Error>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!("Watch event error: {}", e);
                    return;
                }
            };

            if event.kind.is_create() || event.kind.is_modify() {
                for path in event.paths {
                    // Receiver gone means the daemon is shutting down.
                    if event_tx.blocking_send(path).is_err() {
                        return;
                    }
                }
            }
        },
        NotifyConfig::default(),
    )?;

    watcher.watch(input_dir, RecursiveMode::NonRecursive)?;

    Ok(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn recv_until(
        rx: &mut mpsc::Receiver<PathBuf>,
        wanted: &Path,
        timeout: Duration,
    ) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match tokio::time::timeout(remaining, rx.recv()).await {
                Ok(Some(path)) if path == wanted => return true,
                Ok(Some(_)) => continue,
                Ok(None) | Err(_) => return false,
            }
        }
    }

    #[tokio::test]
    async fn test_created_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let (tx, mut rx) = mpsc::channel(100);
        let _watcher = spawn_watcher(dir.path(), tx).unwrap();

        // Give the backend a moment to register the watch.
        tokio::time::sleep(Duration::from_millis(200)).await;

        let path = dir.path().join("fresh.jpg");
        fs::write(&path, b"not really a jpeg").unwrap();

        assert!(
            recv_until(&mut rx, &path, Duration::from_secs(5)).await,
            "expected a create/modify event for {:?}",
            path
        );
    }

    #[tokio::test]
    async fn test_subdirectory_contents_are_not_reported() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("nested");
        fs::create_dir(&sub).unwrap();

        let (tx, mut rx) = mpsc::channel(100);
        let _watcher = spawn_watcher(dir.path(), tx).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let nested_file = sub.join("deep.jpg");
        fs::write(&nested_file, b"data").unwrap();

        // The watch is non-recursive: nothing for the nested file should arrive.
        assert!(
            !recv_until(&mut rx, &nested_file, Duration::from_millis(600)).await,
            "nested file should not be reported by a non-recursive watch"
        );
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let gone = dir.path().join("does-not-exist");
        let (tx, _rx) = mpsc::channel(1);

        assert!(spawn_watcher(&gone, tx).is_err());
    }
}
