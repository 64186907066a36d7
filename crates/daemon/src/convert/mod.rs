//! Converter capabilities: image-to-PNG encoding and video-to-MP4 transcoding.

pub mod ffmpeg;
pub mod image;

pub use ffmpeg::{build_ffmpeg_command, convert_video_to_mp4, TranscodeError, TranscodeParams};
pub use image::{convert_image_to_png, ImageConvertError};
