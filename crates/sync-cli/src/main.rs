use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use sync_config::SyncDaemonConfig;
use sync_core::{CancelToken, Transport};
use sync_engine::{check_status, watch_for_shutdown_signal, Daemon, IndexStore};
use sync_remote::HttpTransport;

#[derive(Parser)]
#[command(name = "youlab-sync", version, about = "Bidirectional file sync daemon")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the sync daemon until a shutdown signal is received
    Run,
    /// Report remote reachability and file counts without starting the daemon
    Status,
}

fn find_config() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("YOULAB_SYNC_CONFIG") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let cwd_config = PathBuf::from("youlab-sync.yaml");
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    if let Some(home) = dirs_next::home_dir() {
        let home_config = home.join(".config/youlab-sync/config.yaml");
        if home_config.exists() {
            return Some(home_config);
        }
    }

    None
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let cli = Cli::parse();

    let config_path = cli.config.or_else(find_config).ok_or(
        "No configuration file found. Use --config, set YOULAB_SYNC_CONFIG, or create youlab-sync.yaml",
    )?;

    let config = SyncDaemonConfig::from_file(&config_path)?;
    config.validate_or_err()?;

    match cli.command {
        Commands::Run => run_daemon(config).await?,
        Commands::Status => print_status(config).await?,
    }

    Ok(())
}

async fn run_daemon(config: SyncDaemonConfig) -> Result<(), Box<dyn std::error::Error>> {
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&config.server)?);
    let daemon = Daemon::new(config, transport);
    let cancel = daemon.cancel_token();

    let signal_task = tokio::spawn(watch_for_shutdown_signal(cancel));
    daemon.run().await?;
    signal_task.abort();

    Ok(())
}

async fn print_status(config: SyncDaemonConfig) -> Result<(), Box<dyn std::error::Error>> {
    let transport = HttpTransport::new(&config.server)?;
    let index = IndexStore::new(&config.sync.local_folder).load(&config.server.user_id);
    let cancel = CancelToken::new();

    let report = check_status(&transport, &config.server.user_id, index.len(), &cancel).await;

    println!("youlab-sync status");
    println!("===================");
    println!("user:            {}", report.user_id);
    println!("remote reachable: {}", report.reachable);
    match report.remote_file_count {
        Some(count) => println!("remote files:    {count}"),
        None => println!("remote files:    unknown"),
    }
    println!("indexed files:   {}", report.indexed_file_count);
    if let Some(error) = report.error {
        println!("last error:      {error}");
    }

    Ok(())
}
