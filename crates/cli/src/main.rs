mod bot_commands;
mod config_commands;
mod detect_commands;

use std::{path::PathBuf, sync::Arc, time::Duration};

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    projectp_config::ProjectPConfig,
    projectp_detect::{AdmissionGate, CommandDetector, GatedDetector},
    projectp_media::StagingLayout,
    tracing::{info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(
    name = "projectp",
    about = "Project P: object detection bot for Telegram",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery of ./projectp.toml and friends).
    #[arg(long, global = true, env = "PROJECTP_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for downloaded attachments (overrides config value).
    #[arg(long, global = true)]
    input_dir: Option<PathBuf>,

    /// Directory for annotated results (overrides config value).
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the Telegram bot (default when no subcommand is provided).
    Bot,
    /// Run the detector once on a local file and print the summary.
    Detect {
        /// Photo or video to process.
        path: PathBuf,
        /// Treat the file as a video regardless of its extension.
        #[arg(long)]
        video: bool,
    },
    /// Configuration inspection.
    Config {
        #[command(subcommand)]
        action: Option<config_commands::ConfigAction>,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Effective configuration: file, then environment, then command line.
fn resolve_config(cli: &Cli) -> anyhow::Result<ProjectPConfig> {
    let config = match &cli.config {
        Some(path) => projectp_config::load_config(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => projectp_config::discover_and_load()?,
    };
    Ok(apply_cli_overrides(
        projectp_config::apply_env_overrides(config),
        cli,
    ))
}

fn apply_cli_overrides(mut config: ProjectPConfig, cli: &Cli) -> ProjectPConfig {
    if let Some(dir) = &cli.input_dir {
        config.staging.input_dir = dir.clone();
    }
    if let Some(dir) = &cli.output_dir {
        config.staging.output_dir = dir.clone();
    }
    config
}

fn staging_layout(config: &ProjectPConfig) -> StagingLayout {
    StagingLayout::new(
        &config.staging.input_dir,
        &config.staging.output_dir,
        &config.staging.target_suffix,
    )
}

/// Build the detector behind a fresh admission gate. Called once per process.
fn gated_detector(config: &ProjectPConfig) -> GatedDetector {
    let detector = CommandDetector::new(&config.detector.binary_name)
        .with_binary_path(config.detector.binary_path.clone())
        .with_model_path(config.detector.model_path.clone())
        .with_args(config.detector.args.clone())
        .with_timeout(Duration::from_secs(config.detector.timeout_secs));

    match detector.find_binary() {
        Some(path) => info!(binary = %path.display(), "detector located"),
        None => warn!(
            binary = %config.detector.binary_path.as_deref().unwrap_or(&config.detector.binary_name),
            "detector binary not found; every detection will fail until it is installed"
        ),
    }

    GatedDetector::new(Arc::new(detector), Arc::new(AdmissionGate::new()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "projectp starting");

    let config = resolve_config(&cli)?;

    match cli.command {
        None | Some(Commands::Bot) => bot_commands::run_bot(config).await,
        Some(Commands::Detect { ref path, video }) => {
            detect_commands::run_detect(config, path, video).await
        },
        Some(Commands::Config { action }) => {
            config_commands::handle_config(action.unwrap_or_default(), &config)
        },
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_runs_the_bot() {
        let cli = Cli::try_parse_from(["projectp"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.log_level, "info");
        assert!(!cli.json_logs);
    }

    #[test]
    fn detect_takes_path_and_video_flag() {
        let cli =
            Cli::try_parse_from(["projectp", "detect", "clip.mov", "--video", "--json-logs"])
                .unwrap();
        match cli.command {
            Some(Commands::Detect { path, video }) => {
                assert_eq!(path, PathBuf::from("clip.mov"));
                assert!(video);
            },
            _ => panic!("expected detect"),
        }
        assert!(cli.json_logs);
    }

    #[test]
    fn directory_flags_override_config() {
        let cli = Cli::try_parse_from([
            "projectp",
            "--input-dir",
            "/srv/in",
            "--output-dir",
            "/srv/out",
            "bot",
        ])
        .unwrap();
        let config = apply_cli_overrides(ProjectPConfig::default(), &cli);
        assert_eq!(config.staging.input_dir, PathBuf::from("/srv/in"));
        assert_eq!(config.staging.output_dir, PathBuf::from("/srv/out"));
        assert_eq!(config.staging.target_suffix, "output");
    }

    #[test]
    fn explicit_config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.toml");
        std::fs::write(
            &path,
            "[staging]\ninput_dir = \"uploads\"\n\n[detector]\npercentile = 50.0\n",
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "projectp".to_string(),
            "--config".to_string(),
            path.display().to_string(),
            "config".to_string(),
        ])
        .unwrap();
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.staging.input_dir, PathBuf::from("uploads"));
        assert_eq!(config.detector.percentile, 50.0);
    }
}
