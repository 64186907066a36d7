//! Video-to-MP4 transcoding via an external ffmpeg process.
//!
//! Builds and executes an ffmpeg command with a fixed codec policy: x264
//! video at a configurable CRF/preset, AAC audio at a fixed bitrate. The
//! tool's stderr is captured for diagnostics; ffmpeg writes its progress
//! and error text there.

use auto_convert_config::Config;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

/// Fixed video codec for all transcodes.
const VIDEO_CODEC: &str = "libx264";
/// Fixed audio codec and bitrate.
const AUDIO_CODEC: &str = "aac";
const AUDIO_BITRATE: &str = "192k";

/// Error type for transcoding operations
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// ffmpeg exited with a nonzero status; diagnostic text captured from stderr
    #[error("ffmpeg failed with exit code {code}: {stderr}")]
    FfmpegFailed { code: i32, stderr: String },

    /// ffmpeg was terminated by a signal
    #[error("ffmpeg was terminated by a signal: {stderr}")]
    FfmpegTerminated { stderr: String },

    /// The transcoder binary could not be located or executed
    #[error("Transcoder binary not found: {0}")]
    BinaryMissing(String),

    /// Destination file already exists; never overwritten
    #[error("Destination already exists: {0}")]
    DestinationExists(PathBuf),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Parameters for a transcode invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeParams {
    /// Path to the ffmpeg binary
    pub ffmpeg_bin: String,
    /// Constant rate factor (lower is higher quality)
    pub video_crf: u32,
    /// x264 preset controlling the encode speed vs quality trade-off
    pub video_preset: String,
}

impl TranscodeParams {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ffmpeg_bin: config.transcoder.ffmpeg_bin.clone(),
            video_crf: config.transcoder.video_crf,
            video_preset: config.transcoder.video_preset.clone(),
        }
    }
}

impl Default for TranscodeParams {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// The destination path for a source file: its stem plus `.mp4`.
pub fn mp4_output_path(src: &Path, dest_dir: &Path) -> PathBuf {
    let stem = src
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest_dir.join(format!("{}.mp4", stem))
}

/// Build the ffmpeg command for one transcode.
///
/// `-y` is passed because the caller has already established that the
/// destination does not exist; it keeps ffmpeg from blocking on a
/// confirmation prompt if the file appears between check and spawn.
pub fn build_ffmpeg_command(params: &TranscodeParams, src: &Path, output: &Path) -> Command {
    let mut cmd = Command::new(&params.ffmpeg_bin);

    cmd.arg("-y");
    cmd.arg("-i").arg(src);
    cmd.arg("-c:v").arg(VIDEO_CODEC);
    cmd.arg("-preset").arg(&params.video_preset);
    cmd.arg("-crf").arg(params.video_crf.to_string());
    cmd.arg("-c:a").arg(AUDIO_CODEC);
    cmd.arg("-b:a").arg(AUDIO_BITRATE);
    cmd.arg(output);

    cmd
}

/// Transcode a source video to MP4 inside `dest_dir`.
///
/// Returns the written output path. On a nonzero exit status the captured
/// stderr is returned in the error and any partially written output file
/// is deleted. A binary that cannot be executed at all is reported as the
/// distinct `BinaryMissing` variant so the caller can surface it as a
/// configuration problem rather than a per-file failure.
pub fn convert_video_to_mp4(
    src: &Path,
    dest_dir: &Path,
    params: &TranscodeParams,
) -> Result<PathBuf, TranscodeError> {
    let output_path = mp4_output_path(src, dest_dir);
    if output_path.exists() {
        return Err(TranscodeError::DestinationExists(output_path));
    }

    let mut cmd = build_ffmpeg_command(params, src, &output_path);

    let output = cmd.output().map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            TranscodeError::BinaryMissing(params.ffmpeg_bin.clone())
        } else {
            TranscodeError::Io(e)
        }
    })?;

    if output.status.success() {
        return Ok(output_path);
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

    // Never leave a partial file behind at the destination.
    if output_path.exists() {
        let _ = std::fs::remove_file(&output_path);
    }

    match output.status.code() {
        Some(code) => Err(TranscodeError::FfmpegFailed { code, stderr }),
        None => Err(TranscodeError::FfmpegTerminated { stderr }),
    }
}
