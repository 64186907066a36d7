//! Core configuration structures and loading logic

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Input and output directory configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathsConfig {
    /// Directory watched for new files
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,
    /// Directory receiving converted files
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("input")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
        }
    }
}

/// Media extension configuration
///
/// Entries may be given with or without the leading dot and in any case;
/// they are normalized before matching.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtensionsConfig {
    /// Extensions treated as images
    #[serde(default = "default_image_extensions")]
    pub image: Vec<String>,
    /// Extensions treated as videos
    #[serde(default = "default_video_extensions")]
    pub video: Vec<String>,
}

fn default_image_extensions() -> Vec<String> {
    [
        ".jpg", ".jpeg", ".bmp", ".gif", ".tif", ".tiff", ".webp", ".heic", ".heif",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_video_extensions() -> Vec<String> {
    [".mp4", ".mov", ".mkv", ".avi", ".m4v", ".wmv", ".flv", ".webm"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for ExtensionsConfig {
    fn default() -> Self {
        Self {
            image: default_image_extensions(),
            video: default_video_extensions(),
        }
    }
}

/// External transcoder configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscoderConfig {
    /// Path to the ffmpeg binary (assumed on PATH by default)
    #[serde(default = "default_ffmpeg_bin")]
    pub ffmpeg_bin: String,
    /// Constant rate factor for x264 encoding (lower is higher quality)
    #[serde(default = "default_video_crf")]
    pub video_crf: u32,
    /// x264 preset controlling encode speed vs quality
    #[serde(default = "default_video_preset")]
    pub video_preset: String,
}

fn default_ffmpeg_bin() -> String {
    "ffmpeg".to_string()
}

fn default_video_crf() -> u32 {
    23
}

fn default_video_preset() -> String {
    "medium".to_string()
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: default_ffmpeg_bin(),
            video_crf: default_video_crf(),
            video_preset: default_video_preset(),
        }
    }
}

/// Watch loop and stabilization configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WatchConfig {
    /// Convert files already present in the input directory at startup
    #[serde(default = "default_process_existing")]
    pub process_existing: bool,
    /// Consecutive unchanged-size polls required before a file counts as stable
    #[serde(default = "default_stable_checks")]
    pub stable_checks: u32,
    /// Interval between size polls, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Maximum time to wait for a file to stabilize, in seconds
    #[serde(default = "default_stabilize_timeout_secs")]
    pub stabilize_timeout_secs: u64,
    /// Cap on simultaneous conversions (0 = unbounded)
    #[serde(default)]
    pub max_concurrent_conversions: u32,
}

fn default_process_existing() -> bool {
    true
}

fn default_stable_checks() -> u32 {
    3
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_stabilize_timeout_secs() -> u64 {
    300
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            process_existing: default_process_existing(),
            stable_checks: default_stable_checks(),
            poll_interval_ms: default_poll_interval_ms(),
            stabilize_timeout_secs: default_stabilize_timeout_secs(),
            max_concurrent_conversions: 0,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub extensions: ExtensionsConfig,
    #[serde(default)]
    pub transcoder: TranscoderConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

/// Normalize an extension list into a lookup set.
///
/// Each entry is lower-cased and given a leading dot if absent.
/// Empty entries are dropped.
pub fn normalize_extensions<I, S>(extensions: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalized = HashSet::new();
    for ext in extensions {
        let ext = ext.as_ref().trim();
        if ext.is_empty() {
            continue;
        }
        let lower = ext.to_lowercase();
        if lower.starts_with('.') {
            normalized.insert(lower);
        } else {
            normalized.insert(format!(".{}", lower));
        }
    }
    normalized
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Parses the config file and handles missing optional fields with defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Overrides the following values if environment variables are set:
    /// - AUTO_CONVERT_INPUT_DIR -> paths.input_dir
    /// - AUTO_CONVERT_OUTPUT_DIR -> paths.output_dir
    /// - AUTO_CONVERT_FFMPEG_BIN -> transcoder.ffmpeg_bin
    /// - AUTO_CONVERT_VIDEO_CRF -> transcoder.video_crf
    /// - AUTO_CONVERT_VIDEO_PRESET -> transcoder.video_preset
    /// - AUTO_CONVERT_PROCESS_EXISTING -> watch.process_existing
    /// - AUTO_CONVERT_MAX_CONCURRENT -> watch.max_concurrent_conversions
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("AUTO_CONVERT_INPUT_DIR") {
            if !val.is_empty() {
                self.paths.input_dir = PathBuf::from(val);
            }
        }

        if let Ok(val) = env::var("AUTO_CONVERT_OUTPUT_DIR") {
            if !val.is_empty() {
                self.paths.output_dir = PathBuf::from(val);
            }
        }

        if let Ok(val) = env::var("AUTO_CONVERT_FFMPEG_BIN") {
            if !val.is_empty() {
                self.transcoder.ffmpeg_bin = val;
            }
        }

        if let Ok(val) = env::var("AUTO_CONVERT_VIDEO_CRF") {
            if let Ok(crf) = val.parse::<u32>() {
                self.transcoder.video_crf = crf;
            }
        }

        if let Ok(val) = env::var("AUTO_CONVERT_VIDEO_PRESET") {
            if !val.is_empty() {
                self.transcoder.video_preset = val;
            }
        }

        if let Ok(val) = env::var("AUTO_CONVERT_PROCESS_EXISTING") {
            // Accept "true", "1", "yes" as true; "false", "0", "no" as false
            match val.to_lowercase().as_str() {
                "true" | "1" | "yes" => self.watch.process_existing = true,
                "false" | "0" | "no" => self.watch.process_existing = false,
                _ => {} // Invalid value, keep existing
            }
        }

        if let Ok(val) = env::var("AUTO_CONVERT_MAX_CONCURRENT") {
            if let Ok(max) = val.parse::<u32>() {
                self.watch.max_concurrent_conversions = max;
            }
        }
    }

    /// Load configuration from file and apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Normalized image extension set
    pub fn image_extensions(&self) -> HashSet<String> {
        normalize_extensions(&self.extensions.image)
    }

    /// Normalized video extension set
    pub fn video_extensions(&self) -> HashSet<String> {
        normalize_extensions(&self.extensions.video)
    }

    /// Destination directory for converted images
    pub fn image_output_dir(&self) -> PathBuf {
        self.paths.output_dir.join("images")
    }

    /// Destination directory for converted videos
    pub fn video_output_dir(&self) -> PathBuf {
        self.paths.output_dir.join("videos")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Mutex;

    // Mutex to ensure env var tests don't interfere with each other
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Helper to clear all config-related env vars
    fn clear_env_vars() {
        env::remove_var("AUTO_CONVERT_INPUT_DIR");
        env::remove_var("AUTO_CONVERT_OUTPUT_DIR");
        env::remove_var("AUTO_CONVERT_FFMPEG_BIN");
        env::remove_var("AUTO_CONVERT_VIDEO_CRF");
        env::remove_var("AUTO_CONVERT_VIDEO_PRESET");
        env::remove_var("AUTO_CONVERT_PROCESS_EXISTING");
        env::remove_var("AUTO_CONVERT_MAX_CONCURRENT");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse_toml("").expect("Empty TOML should parse");

        assert_eq!(config.paths.input_dir, PathBuf::from("input"));
        assert_eq!(config.paths.output_dir, PathBuf::from("output"));
        assert_eq!(config.transcoder.ffmpeg_bin, "ffmpeg");
        assert_eq!(config.transcoder.video_crf, 23);
        assert_eq!(config.transcoder.video_preset, "medium");
        assert!(config.watch.process_existing);
        assert_eq!(config.watch.stable_checks, 3);
        assert_eq!(config.watch.poll_interval_ms, 500);
        assert_eq!(config.watch.stabilize_timeout_secs, 300);
        assert_eq!(config.watch.max_concurrent_conversions, 0);
    }

    #[test]
    fn test_default_extension_sets() {
        let config = Config::default();
        let images = config.image_extensions();
        let videos = config.video_extensions();

        assert!(images.contains(".jpg"));
        assert!(images.contains(".heic"));
        assert_eq!(images.len(), 9);
        assert!(videos.contains(".mp4"));
        assert!(videos.contains(".webm"));
        assert_eq!(videos.len(), 8);
        // The target formats themselves are not inputs by default
        assert!(!images.contains(".png"));
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let toml_str = r#"
[paths]
input_dir = "/srv/incoming"

[transcoder]
video_crf = 18
"#;
        let config = Config::parse_toml(toml_str).expect("Partial TOML should parse");

        assert_eq!(config.paths.input_dir, PathBuf::from("/srv/incoming"));
        assert_eq!(config.paths.output_dir, PathBuf::from("output")); // default
        assert_eq!(config.transcoder.video_crf, 18);
        assert_eq!(config.transcoder.video_preset, "medium"); // default
        assert!(config.watch.process_existing); // default
    }

    #[test]
    fn test_output_dir_accessors() {
        let config = Config::parse_toml("[paths]\noutput_dir = \"/data/out\"\n").unwrap();
        assert_eq!(config.image_output_dir(), PathBuf::from("/data/out/images"));
        assert_eq!(config.video_output_dir(), PathBuf::from("/data/out/videos"));
    }

    #[test]
    fn test_extension_override_replaces_defaults() {
        let toml_str = r#"
[extensions]
image = ["JPG", ".Jpeg"]
video = ["mkv"]
"#;
        let config = Config::parse_toml(toml_str).unwrap();
        let images = config.image_extensions();
        let videos = config.video_extensions();

        assert_eq!(images, HashSet::from([".jpg".to_string(), ".jpeg".to_string()]));
        assert_eq!(videos, HashSet::from([".mkv".to_string()]));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        // Every normalized entry is lowercase and dot-prefixed, and
        // normalization is idempotent.
        #[test]
        fn prop_extension_normalization(
            exts in prop::collection::vec("\\.?[a-zA-Z0-9]{0,6}", 0..8),
        ) {
            let normalized = normalize_extensions(&exts);

            for ext in &normalized {
                prop_assert!(ext.starts_with('.'), "missing leading dot: {}", ext);
                prop_assert_eq!(ext.clone(), ext.to_lowercase());
                prop_assert!(ext.len() > 1, "bare dot should not survive: {}", ext);
            }

            let renormalized = normalize_extensions(&normalized);
            prop_assert_eq!(normalized, renormalized);
        }

        #[test]
        fn prop_config_parses_all_sections(
            crf in 0u32..52,
            stable_checks in 1u32..10,
            poll_ms in 1u64..5000,
            timeout_secs in 1u64..1000,
            process_existing in proptest::bool::ANY,
            max_concurrent in 0u32..32,
        ) {
            let toml_str = format!(
                r#"
[paths]
input_dir = "in"
output_dir = "out"

[transcoder]
ffmpeg_bin = "/usr/bin/ffmpeg"
video_crf = {}
video_preset = "veryfast"

[watch]
process_existing = {}
stable_checks = {}
poll_interval_ms = {}
stabilize_timeout_secs = {}
max_concurrent_conversions = {}
"#,
                crf, process_existing, stable_checks, poll_ms, timeout_secs, max_concurrent
            );

            let config = Config::parse_toml(&toml_str).expect("Valid TOML should parse");

            prop_assert_eq!(config.paths.input_dir, PathBuf::from("in"));
            prop_assert_eq!(config.paths.output_dir, PathBuf::from("out"));
            prop_assert_eq!(config.transcoder.ffmpeg_bin, "/usr/bin/ffmpeg");
            prop_assert_eq!(config.transcoder.video_crf, crf);
            prop_assert_eq!(config.transcoder.video_preset, "veryfast");
            prop_assert_eq!(config.watch.process_existing, process_existing);
            prop_assert_eq!(config.watch.stable_checks, stable_checks);
            prop_assert_eq!(config.watch.poll_interval_ms, poll_ms);
            prop_assert_eq!(config.watch.stabilize_timeout_secs, timeout_secs);
            prop_assert_eq!(config.watch.max_concurrent_conversions, max_concurrent);
        }
    }

    #[test]
    fn test_env_overrides_paths_and_transcoder() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env_vars();

        let mut config = Config::default();
        env::set_var("AUTO_CONVERT_INPUT_DIR", "/mnt/drop");
        env::set_var("AUTO_CONVERT_OUTPUT_DIR", "/mnt/done");
        env::set_var("AUTO_CONVERT_FFMPEG_BIN", "/opt/ffmpeg/bin/ffmpeg");
        env::set_var("AUTO_CONVERT_VIDEO_CRF", "28");
        env::set_var("AUTO_CONVERT_VIDEO_PRESET", "veryfast");
        config.apply_env_overrides();
        clear_env_vars();

        assert_eq!(config.paths.input_dir, PathBuf::from("/mnt/drop"));
        assert_eq!(config.paths.output_dir, PathBuf::from("/mnt/done"));
        assert_eq!(config.transcoder.ffmpeg_bin, "/opt/ffmpeg/bin/ffmpeg");
        assert_eq!(config.transcoder.video_crf, 28);
        assert_eq!(config.transcoder.video_preset, "veryfast");
    }

    #[test]
    fn test_env_overrides_process_existing() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env_vars();

        let mut config = Config::default();
        assert!(config.watch.process_existing);

        env::set_var("AUTO_CONVERT_PROCESS_EXISTING", "no");
        config.apply_env_overrides();
        assert!(!config.watch.process_existing);

        env::set_var("AUTO_CONVERT_PROCESS_EXISTING", "1");
        config.apply_env_overrides();
        assert!(config.watch.process_existing);

        // Invalid value keeps current setting
        env::set_var("AUTO_CONVERT_PROCESS_EXISTING", "maybe");
        config.apply_env_overrides();
        assert!(config.watch.process_existing);

        clear_env_vars();
    }

    #[test]
    fn test_env_overrides_invalid_crf_ignored() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env_vars();

        let mut config = Config::default();
        env::set_var("AUTO_CONVERT_VIDEO_CRF", "not-a-number");
        config.apply_env_overrides();
        clear_env_vars();

        assert_eq!(config.transcoder.video_crf, 23);
    }
}
