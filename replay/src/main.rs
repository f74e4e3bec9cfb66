use anyhow::{Context, Result};
use beamplot_config::{ConfigFormat, ConfigSerializer, SessionConfig};
use beamplot_replay::replay;
use beamplot_session::PlotSession;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "beamplot-replay")]
#[command(about = "Replay recorded plot server messages through a plot session", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a newline-delimited JSON file of envelopes
    Run {
        file: PathBuf,

        /// Also print the messages the session would have sent
        #[arg(long)]
        outbound: bool,

        /// Also print rejected messages and edits
        #[arg(long)]
        rejections: bool,
    },
    /// Print the effective configuration
    Config {
        #[arg(long, value_enum, default_value_t = Format::Yaml)]
        format: Format,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Yaml,
    Json,
    Toml,
}

impl From<Format> for ConfigFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Yaml => ConfigFormat::Yaml,
            Format::Json => ConfigFormat::Json,
            Format::Toml => ConfigFormat::Toml,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => SessionConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SessionConfig::default(),
    };

    // Initialize logging
    let level = if cli.debug {
        "debug".to_string()
    } else {
        config.logging.level.to_lowercase()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Run {
            file,
            outbound,
            rejections,
        } => run_replay(&config, file, outbound, rejections).await?,
        Commands::Config { format } => {
            print!("{}", ConfigSerializer::serialize_string(&config, format.into())?);
        }
    }

    Ok(())
}

async fn run_replay(
    config: &SessionConfig,
    file: PathBuf,
    outbound: bool,
    rejections: bool,
) -> Result<()> {
    let input = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;

    let session = PlotSession::from_config(config);
    info!(
        "Replaying {} as client {} ({} plots)",
        file.display(),
        session.uuid(),
        config.client.plot_ids.len()
    );
    for plot_id in &config.client.plot_ids {
        debug!("Plot {} is served at {}", plot_id, config.server.plot_url(session.uuid(), plot_id));
    }

    let report = replay(session, &input).await?;
    println!("{}", serde_json::to_string_pretty(&report.summaries)?);
    if outbound {
        for message in &report.outbound {
            println!("{}", serde_json::to_string(message)?);
        }
    }
    if rejections {
        for rejection in &report.rejections {
            println!("{}", rejection.to_json()?);
        }
    }
    Ok(())
}
