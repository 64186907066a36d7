//! Dispatcher: the pipeline orchestrator.
//!
//! Receives raw watcher events, filters and deduplicates them, and runs one
//! fire-and-forget conversion task per accepted path: stabilize, classify,
//! ensure the class output directory, convert, release. Also provides the
//! startup bulk pass over files already present in the input directory.

use crate::classify::{classify, is_hidden, normalized_suffix, MediaClass};
use crate::convert::ffmpeg::{
    convert_video_to_mp4, mp4_output_path, TranscodeError, TranscodeParams,
};
use crate::convert::image::{convert_image_to_png, png_output_path, ImageConvertError};
use crate::inflight::InFlightTracker;
use crate::stability::{wait_until_stable, StabilitySettings};
use auto_convert_config::Config;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use walkdir::WalkDir;

/// Result of one path's trip through the pipeline.
///
/// Not persisted; used for logging and for the bulk pass summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    /// Output file written.
    Converted(PathBuf),
    /// Destination already existed; converter not invoked.
    SkippedExisting(PathBuf),
    /// File never stabilized within the timeout.
    SkippedUnstable,
    /// No converter for the media class (unreachable after filtering,
    /// handled defensively).
    SkippedUnrecognized,
    /// Conversion failed; reason retained for logging.
    Failed(String),
}

impl ConversionOutcome {
    /// Convert outcome to string for logging
    pub fn as_str(&self) -> &str {
        match self {
            ConversionOutcome::Converted(_) => "converted",
            ConversionOutcome::SkippedExisting(_) => "skipped_existing",
            ConversionOutcome::SkippedUnstable => "skipped_unstable",
            ConversionOutcome::SkippedUnrecognized => "skipped_unrecognized",
            ConversionOutcome::Failed(_) => "failed",
        }
    }
}

/// Pipeline orchestrator.
///
/// Owns the configuration snapshot, the normalized extension sets, and the
/// in-flight tracker. Shared across all per-path tasks behind an `Arc`;
/// nothing here is mutated after construction except the tracker set.
pub struct Dispatcher {
    config: Arc<Config>,
    tracker: Arc<InFlightTracker>,
    image_exts: HashSet<String>,
    video_exts: HashSet<String>,
    stability: StabilitySettings,
    transcode: TranscodeParams,
    /// Optional cap on simultaneous conversions.
    limiter: Option<Arc<Semaphore>>,
    /// A missing transcoder binary is a configuration problem; report it at
    /// error level once, then demote to debug.
    transcoder_missing_reported: AtomicBool,
}

impl Dispatcher {
    pub fn new(config: Arc<Config>) -> Self {
        let limiter = match config.watch.max_concurrent_conversions {
            0 => None,
            max => Some(Arc::new(Semaphore::new(max as usize))),
        };

        Self {
            image_exts: config.image_extensions(),
            video_exts: config.video_extensions(),
            stability: StabilitySettings::from_config(&config),
            transcode: TranscodeParams::from_config(&config),
            tracker: Arc::new(InFlightTracker::new()),
            limiter,
            config,
            transcoder_missing_reported: AtomicBool::new(false),
        }
    }

    /// The in-flight tracker shared with all conversion tasks.
    pub fn tracker(&self) -> &Arc<InFlightTracker> {
        &self.tracker
    }

    /// Filter stage: rejections are silent, the path is not even attempted.
    fn should_ignore(&self, path: &Path) -> bool {
        let known_extension = normalized_suffix(path)
            .map(|suffix| self.image_exts.contains(&suffix) || self.video_exts.contains(&suffix))
            .unwrap_or(false);
        if !known_extension {
            return true;
        }
        if is_hidden(path) {
            return true;
        }
        // Also rejects paths that vanished after the event, and directories
        // whose names happen to carry a media extension.
        if !path.is_file() {
            return true;
        }
        false
    }

    /// Handle one raw watcher event without blocking the event loop.
    ///
    /// Accepted paths get their own spawned task; a path already in flight
    /// is dropped silently, which is what debounces the burst of modify
    /// events a single write produces.
    pub fn handle_event(self: &Arc<Self>, path: PathBuf) {
        if self.should_ignore(&path) {
            return;
        }

        // The tracker is keyed by canonical absolute paths so two spellings
        // of the same file cannot run concurrently.
        let path = match path.canonicalize() {
            Ok(path) => path,
            Err(_) => return, // vanished between filter and here
        };

        let guard = match self.tracker.acquire(&path) {
            Some(guard) => guard,
            None => return, // already in flight
        };

        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = dispatcher.convert_path(&path).await;
            tracing::debug!("{}: {}", outcome.as_str(), path.display());
            drop(guard);
        });
    }

    /// Run the stabilize -> classify -> convert sequence for a path whose
    /// tracker entry the caller already holds.
    pub async fn convert_path(&self, path: &Path) -> ConversionOutcome {
        match wait_until_stable(path, &self.stability).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!("File did not stabilize in time, skipping: {}", path.display());
                return ConversionOutcome::SkippedUnstable;
            }
            Err(e) => {
                tracing::warn!("Stability check failed for {}: {}", path.display(), e);
                return ConversionOutcome::SkippedUnstable;
            }
        }

        // Acquired after stabilization so the cap bounds running
        // conversions; a file stuck growing must not starve the queue by
        // holding a permit through its whole stabilization timeout.
        let _permit = match &self.limiter {
            Some(semaphore) => Some(
                semaphore
                    .clone()
                    .acquire_owned()
                    .await
                    .expect("limiter semaphore should not be closed"),
            ),
            None => None,
        };

        match classify(path, &self.image_exts, &self.video_exts) {
            MediaClass::Image => self.convert_image(path).await,
            MediaClass::Video => self.convert_video(path).await,
            MediaClass::Unrecognized => {
                tracing::debug!("No converter registered for {}", path.display());
                ConversionOutcome::SkippedUnrecognized
            }
        }
    }

    async fn convert_image(&self, path: &Path) -> ConversionOutcome {
        let dest_dir = self.config.image_output_dir();
        if let Err(e) = tokio::fs::create_dir_all(&dest_dir).await {
            tracing::error!("Failed to create {}: {}", dest_dir.display(), e);
            return ConversionOutcome::Failed(e.to_string());
        }

        let output_path = png_output_path(path, &dest_dir);
        if output_path.exists() {
            tracing::info!("Image output already exists, skipping: {}", output_path.display());
            return ConversionOutcome::SkippedExisting(output_path);
        }

        let src = path.to_path_buf();
        let result = tokio::task::spawn_blocking(move || convert_image_to_png(&src, &dest_dir)).await;

        match result {
            Ok(Ok(output)) => {
                tracing::info!(
                    "Converted image to PNG: {} -> {}",
                    file_name(path),
                    file_name(&output)
                );
                ConversionOutcome::Converted(output)
            }
            Ok(Err(ImageConvertError::DestinationExists(output))) => {
                // Defensive guard tripped; behaves like the earlier check.
                tracing::info!("Image output already exists, skipping: {}", output.display());
                ConversionOutcome::SkippedExisting(output)
            }
            Ok(Err(e @ ImageConvertError::Unreadable { .. })) => {
                tracing::error!("{}", e);
                ConversionOutcome::Failed(e.to_string())
            }
            Ok(Err(e)) => {
                tracing::error!("Failed to convert image {}: {}", path.display(), e);
                ConversionOutcome::Failed(e.to_string())
            }
            Err(join_err) => {
                tracing::error!("Image conversion task panicked for {}: {}", path.display(), join_err);
                ConversionOutcome::Failed(join_err.to_string())
            }
        }
    }

    async fn convert_video(&self, path: &Path) -> ConversionOutcome {
        let dest_dir = self.config.video_output_dir();
        if let Err(e) = tokio::fs::create_dir_all(&dest_dir).await {
            tracing::error!("Failed to create {}: {}", dest_dir.display(), e);
            return ConversionOutcome::Failed(e.to_string());
        }

        let output_path = mp4_output_path(path, &dest_dir);
        if output_path.exists() {
            tracing::info!("Video output already exists, skipping: {}", output_path.display());
            return ConversionOutcome::SkippedExisting(output_path);
        }

        let src = path.to_path_buf();
        let params = self.transcode.clone();
        let result =
            tokio::task::spawn_blocking(move || convert_video_to_mp4(&src, &dest_dir, &params))
                .await;

        match result {
            Ok(Ok(output)) => {
                tracing::info!(
                    "Converted video to MP4: {} -> {}",
                    file_name(path),
                    file_name(&output)
                );
                ConversionOutcome::Converted(output)
            }
            Ok(Err(TranscodeError::DestinationExists(output))) => {
                tracing::info!("Video output already exists, skipping: {}", output.display());
                ConversionOutcome::SkippedExisting(output)
            }
            Ok(Err(TranscodeError::BinaryMissing(bin))) => {
                if !self.transcoder_missing_reported.swap(true, Ordering::Relaxed) {
                    tracing::error!(
                        "Transcoder binary '{}' not found; set transcoder.ffmpeg_bin or install ffmpeg",
                        bin
                    );
                } else {
                    tracing::debug!("Transcoder binary '{}' still missing, skipping {}", bin, path.display());
                }
                ConversionOutcome::Failed(format!("transcoder binary '{}' not found", bin))
            }
            Ok(Err(TranscodeError::FfmpegFailed { code, stderr })) => {
                tracing::error!("ffmpeg failed for {} (exit {}): {}", path.display(), code, stderr);
                ConversionOutcome::Failed(stderr)
            }
            Ok(Err(e)) => {
                tracing::error!("Failed to convert video {}: {}", path.display(), e);
                ConversionOutcome::Failed(e.to_string())
            }
            Err(join_err) => {
                tracing::error!("Video conversion task panicked for {}: {}", path.display(), join_err);
                ConversionOutcome::Failed(join_err.to_string())
            }
        }
    }

    /// One-time pass over files already present in the input directory.
    ///
    /// Entries are visited in name order and processed sequentially, so
    /// repeated runs over an unchanged directory are deterministic. Each
    /// file goes through exactly the same filter and pipeline steps as a
    /// live event.
    pub async fn run_bulk_pass(&self) -> Vec<(PathBuf, ConversionOutcome)> {
        let mut results = Vec::new();

        let walker = WalkDir::new(&self.config.paths.input_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();

        for entry in walker.into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.into_path();
            if self.should_ignore(&path) {
                continue;
            }
            let path = match path.canonicalize() {
                Ok(path) => path,
                Err(_) => continue,
            };

            let _guard = match self.tracker.acquire(&path) {
                Some(guard) => guard,
                None => continue,
            };

            tracing::info!("Processing existing file: {}", file_name(&path));
            let outcome = self.convert_path(&path).await;
            results.push((path, outcome));
        }

        results
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
