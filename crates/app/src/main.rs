use clap::Parser;
use parlor_app::config::AppConfig;
use parlor_app::runtime;
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;

#[derive(Parser, Debug)]
#[command(name = "parlor", about = "Voice-driven conversational client")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Backend base URL (provisioning, channel, synthesis)
    #[arg(long, env = "PARLOR_SERVER_URL")]
    server_url: Option<String>,

    /// Synthesis voice identifier
    #[arg(long, env = "PARLOR_VOICE")]
    voice: Option<String>,

    /// Directory for log files
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
}

fn init_logging(dir: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(dir)?;
    let file_appender = RollingFileAppender::new(Rotation::DAILY, dir, "parlor.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr.and(non_blocking_file))
        .with_env_filter(log_level)
        .init();
    std::mem::forget(guard);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_dir).map_err(|e| anyhow::anyhow!("logging init failed: {}", e))?;

    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(url) = cli.server_url {
        config.server_url = url;
    }
    if let Some(voice) = cli.voice {
        config.voice = voice;
    }

    tracing::info!("Starting Parlor (server: {})", config.server_url);
    runtime::run_conversation(config).await?;
    tracing::info!("Shutdown complete");
    Ok(())
}
