use colored::*;
use eyre::{Context, Result};
use log::{error, info};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use drover::agent::Agent;
use drover::cli::{parse_args, Parsed};
use drover::config::{ConfigManager, ConfigurationManager, FileSettingsStore, MetadataCell};
use drover::domain::AgentSettings;
use drover::error::DroverError;
use drover::executor::LocalJobExecutor;
use drover::service;
use drover::source::BrokerMessageSource;
use drover::updater::PackageUpdater;

fn setup_logging() -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("drover")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("drover.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn build_agent(shutdown: CancellationToken) -> Agent {
    let root = FileSettingsStore::default_root();
    let store = Arc::new(FileSettingsStore::new(&root));
    let config = Arc::new(ConfigurationManager::new(store.clone(), &root));

    // `run` loads the real settings; configure/remove never touch them.
    let settings = config.load_settings().unwrap_or_else(|e| {
        info!("No usable settings yet ({e}); collaborators start from defaults");
        AgentSettings::default()
    });

    let metadata = Arc::new(MetadataCell::new());
    let executor = Arc::new(LocalJobExecutor::new(metadata.clone()));
    let source = Arc::new(BrokerMessageSource::new(
        settings.clone(),
        service::host_name(),
    ));
    let updater = Arc::new(PackageUpdater::new(settings));

    Agent::new(config, store, source, executor, updater, metadata, shutdown)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging first
    setup_logging().context("Failed to setup logging")?;

    // Parse CLI arguments, honoring the informational early exits
    let cli = match parse_args(std::env::args_os()) {
        Parsed::Command(cli) => cli,
        Parsed::Exit(code) => std::process::exit(code.exit_code()),
    };

    // Ctrl-C fans out through one cancellation token
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
            signal_token.cancel();
        }
    });

    let agent = build_agent(shutdown);

    let code = match agent.execute(&cli).await {
        Ok(code) => {
            if !code.is_success() {
                eprintln!("{}", format!("Agent exited: {code:?}").yellow());
            }
            code
        }
        Err(DroverError::Canceled) => {
            info!("Agent run canceled");
            println!("{}", "Canceled".yellow());
            std::process::exit(1);
        }
        Err(e) => {
            error!("Agent failed: {e}");
            eprintln!("{} {e}", "Error:".red());
            std::process::exit(1);
        }
    };

    std::process::exit(code.exit_code());
}
