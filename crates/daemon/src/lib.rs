//! Media conversion daemon library.
//!
//! Watches an input directory, waits for new files to stop growing,
//! and converts them: images become PNG, videos become H.264 MP4 via an
//! external ffmpeg process. Outputs land in per-class subdirectories of
//! the output directory and existing outputs are never overwritten.

pub mod classify;
pub mod convert;
pub mod daemon;
pub mod dispatch;
pub mod inflight;
pub mod stability;
pub mod startup;
pub mod watch;

pub use classify::{classify, normalized_suffix, MediaClass};
pub use convert::ffmpeg::{convert_video_to_mp4, TranscodeError, TranscodeParams};
pub use convert::image::{convert_image_to_png, ImageConvertError};
pub use daemon::{Daemon, DaemonError};
pub use dispatch::{ConversionOutcome, Dispatcher};
pub use inflight::{InFlightGuard, InFlightTracker};
pub use stability::{wait_until_stable, StabilityProbe, StabilitySettings};
pub use startup::{ensure_directories, probe_transcoder, StartupError};
pub use watch::{spawn_watcher, WatchError};
