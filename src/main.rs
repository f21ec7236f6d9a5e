use std::path::PathBuf;

use chrono::Utc;
use clap::{Parser, Subcommand};
use spikeguard::{context::AppContextBuilder, supervisor::Supervisor};
use tokio::io::{AsyncBufRead, BufReader};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding app.yaml and preferences.yaml.
    #[arg(long, global = true)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Processes report events until the input ends or a shutdown signal
    /// arrives.
    Run {
        /// Newline-delimited JSON events. Defaults to standard input.
        #[arg(long)]
        events: Option<PathBuf>,
    },
    /// Retires expired spike episodes once.
    Sweep,
    /// Counts reports for an application as of now.
    Record {
        /// The application receiving the reports.
        #[arg(long)]
        application_id: i64,

        /// How many reports to count.
        #[arg(long, default_value_t = 1)]
        count: u64,
    },
}

#[tokio::main]
#[tracing::instrument(level = "info")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    let subscriber =
        FmtSubscriber::builder().with_env_filter(EnvFilter::from_default_env()).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { events } => run(cli.config_dir, events).await?,
        Commands::Sweep => sweep(cli.config_dir).await?,
        Commands::Record { application_id, count } => {
            record(cli.config_dir, application_id, count).await?
        }
    }

    Ok(())
}

async fn build_supervisor(
    config_dir: Option<String>,
) -> Result<Supervisor, Box<dyn std::error::Error>> {
    let context = AppContextBuilder::new(config_dir).build().await?;

    let supervisor = Supervisor::builder()
        .config(context.config)
        .state(context.repo)
        .preferences(context.preferences)
        .build()?;
    Ok(supervisor)
}

async fn run(
    config_dir: Option<String>,
    events: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let supervisor = build_supervisor(config_dir).await?;

    let input: Box<dyn AsyncBufRead + Unpin + Send> = match events {
        Some(path) => {
            tracing::info!(path = %path.display(), "Reading events from file.");
            Box::new(BufReader::new(tokio::fs::File::open(path).await?))
        }
        None => {
            tracing::info!("Reading events from standard input.");
            Box::new(BufReader::new(tokio::io::stdin()))
        }
    };

    tracing::info!("Supervisor initialized, starting spike detection...");
    supervisor.run(input).await?;
    Ok(())
}

async fn sweep(config_dir: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let supervisor = build_supervisor(config_dir).await?;
    let retired = supervisor.sweep().await?;
    println!("Retired {retired} expired spike episode(s).");
    Ok(())
}

async fn record(
    config_dir: Option<String>,
    application_id: i64,
    count: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let context = AppContextBuilder::new(config_dir).build().await?;
    let total = context.repo.record_reports(application_id, Utc::now(), count).await?;
    println!("Application {application_id} has {total} report(s) today.");
    context.repo.close().await;
    Ok(())
}
