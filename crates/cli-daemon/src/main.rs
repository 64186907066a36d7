//! CLI entry point for the auto-convert daemon.
//!
//! Parses command line arguments, loads the configuration, and runs the
//! daemon until interrupted.

use auto_convert_config::Config;
use auto_convert_daemon::Daemon;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Automated media conversion daemon: images to PNG, videos to MP4
#[derive(Parser, Debug)]
#[command(name = "auto-convertd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (config.toml)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the input directory from the config file
    #[arg(short, long)]
    input_dir: Option<PathBuf>,

    /// Override the output directory from the config file
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Override the transcoder executable from the config file
    #[arg(long)]
    ffmpeg_bin: Option<String>,

    /// Skip the startup pass over files already in the input directory
    #[arg(long, default_value = "false")]
    no_process_existing: bool,
}

fn load_config(args: &Args) -> Result<Config, auto_convert_config::ConfigError> {
    let mut config = if args.config.exists() {
        Config::load(&args.config)?
    } else {
        tracing::info!(
            "Config file {} not found, using defaults",
            args.config.display()
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    };

    if let Some(input_dir) = &args.input_dir {
        config.paths.input_dir = input_dir.clone();
    }
    if let Some(output_dir) = &args.output_dir {
        config.paths.output_dir = output_dir.clone();
    }
    if let Some(ffmpeg_bin) = &args.ffmpeg_bin {
        config.transcoder.ffmpeg_bin = ffmpeg_bin.clone();
    }
    if args.no_process_existing {
        config.watch.process_existing = false;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config_values() {
        let args = Args::try_parse_from([
            "auto-convertd",
            "--config",
            "/nonexistent/config.toml",
            "--input-dir",
            "/data/in",
            "--output-dir",
            "/data/out",
            "--ffmpeg-bin",
            "/opt/ffmpeg/bin/ffmpeg",
            "--no-process-existing",
        ])
        .unwrap();

        let config = load_config(&args).unwrap();
        assert_eq!(config.paths.input_dir, PathBuf::from("/data/in"));
        assert_eq!(config.paths.output_dir, PathBuf::from("/data/out"));
        assert_eq!(config.transcoder.ffmpeg_bin, "/opt/ffmpeg/bin/ffmpeg");
        assert!(!config.watch.process_existing);
    }

    #[test]
    fn test_defaults_survive_when_no_flags_given() {
        let args = Args::try_parse_from(["auto-convertd"]).unwrap();
        assert_eq!(args.config, PathBuf::from("config.toml"));
        assert!(args.ffmpeg_bin.is_none());
        assert!(!args.no_process_existing);
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let daemon = Daemon::new(config);
    if let Err(e) = daemon.run().await {
        tracing::error!("Daemon error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
