//! Startup checks run once before the event loop begins.

use auto_convert_config::Config;
use std::io;
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Create a directory the daemon needs, including parents.
///
/// Failure here is fatal: without the input or output tree there is
/// nothing for the daemon to do.
pub async fn ensure_directory(path: &Path) -> Result<(), StartupError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| StartupError::CreateDir {
            path: path.display().to_string(),
            source,
        })
}

/// Create the input directory and both class output directories.
pub async fn ensure_directories(config: &Config) -> Result<(), StartupError> {
    ensure_directory(&config.paths.input_dir).await?;
    ensure_directory(&config.image_output_dir()).await?;
    ensure_directory(&config.video_output_dir()).await?;
    Ok(())
}

/// Probe the configured transcoder binary with `-version`.
///
/// A missing or broken transcoder is worth a loud warning at startup, but
/// it only disables video conversion, so the daemon starts regardless.
pub async fn probe_transcoder(config: &Config) -> bool {
    let result = Command::new(&config.transcoder.ffmpeg_bin)
        .arg("-version")
        .output()
        .await;

    match result {
        Ok(output) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let version_line = stdout.lines().next().unwrap_or("unknown version");
            tracing::info!("Transcoder available: {}", version_line);
            true
        }
        Ok(output) => {
            tracing::warn!(
                "Transcoder '{}' exited with {} during startup probe; video conversion may fail",
                config.transcoder.ffmpeg_bin,
                output.status
            );
            false
        }
        Err(e) => {
            tracing::warn!(
                "Transcoder '{}' is not available ({}); video files will not be converted",
                config.transcoder.ffmpeg_bin,
                e
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_ensure_directory_creates_nested_path() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a/b/c");

        ensure_directory(&nested).await.unwrap();
        assert!(nested.is_dir());

        // Idempotent on an existing directory
        ensure_directory(&nested).await.unwrap();
    }

    #[tokio::test]
    async fn test_ensure_directory_fails_when_path_is_a_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("occupied");
        std::fs::write(&file, b"x").unwrap();

        let err = ensure_directory(&file).await.unwrap_err();
        assert!(err.to_string().contains("occupied"));
    }

    #[tokio::test]
    async fn test_ensure_directories_builds_full_tree() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.input_dir = dir.path().join("in");
        config.paths.output_dir = dir.path().join("out");

        ensure_directories(&config).await.unwrap();

        assert!(dir.path().join("in").is_dir());
        assert!(dir.path().join("out/images").is_dir());
        assert!(dir.path().join("out/videos").is_dir());
    }

    #[tokio::test]
    async fn test_probe_reports_missing_transcoder() {
        let mut config = Config::default();
        config.transcoder.ffmpeg_bin = "/nonexistent/ffmpeg-probe-test".to_string();

        assert!(!probe_transcoder(&config).await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_probe_accepts_working_transcoder() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let bin = dir.path().join("fake-ffmpeg");
        std::fs::write(&bin, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut config = Config::default();
        config.transcoder.ffmpeg_bin = bin.to_string_lossy().into_owned();

        assert!(probe_transcoder(&config).await);
    }
}
