//! tagwatch CLI
//!
//! Runs the poller and the read service, or one of them, from a TOML config.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tagwatch::{
    config::load_all,
    error::Result,
    models::{Config, CycleOutcome, ProjectId},
    pipeline::{Poller, command_channel, spawn_ticker},
    services::{TwitterSearchClient, serve},
    storage::{LocalStorage, RecordStore},
};

/// tagwatch - hashtag project tracker
#[derive(Parser, Debug)]
#[command(name = "tagwatch", version, about = "Tracks project hashtags from allow-listed accounts")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the data directory from the config
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll on the configured interval and serve records until Ctrl-C
    Run,

    /// Run a single poll cycle and exit
    Poll {
        /// Start from this cursor instead of 0
        #[arg(long, default_value_t = 0)]
        since_id: u64,
    },

    /// Serve stored records only
    Serve,

    /// Validate the configuration file
    Validate,

    /// List stored projects
    Info,

    /// Print the post ids stored for a project (ID12345678 or 12345678)
    Show { project: String },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // `debug = true` in the config turns on verbose logging too.
    let debug = Config::load(&cli.config).map(|c| c.debug).unwrap_or(false);
    init_logging(cli.verbose || debug);

    let mut config = load_all(&cli.config).inspect_err(|e| log::error!("{}", e))?;

    if let Some(dir) = cli.data_dir {
        config.storage.data_dir = dir;
    }
    log::debug!("Loaded configuration from {}", cli.config.display());

    let storage = LocalStorage::new(&config.storage.data_dir);

    match cli.command {
        Command::Run => run(config, storage).await?,

        Command::Poll { since_id } => {
            let client = Arc::new(TwitterSearchClient::new(&config.api)?);
            let mut poller = Poller::new(&config, client, Arc::new(storage)).with_cursor(since_id);
            let report = poller.run_cycle().await;

            println!("{}", serde_json::to_string_pretty(&report)?);
            if report.outcome == CycleOutcome::Failed {
                log::error!("Poll cycle failed");
                std::process::exit(1);
            }
        }

        Command::Serve => {
            let (stop, stop_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::info!("Shutdown requested");
                    let _ = stop.send(true);
                }
            });
            serve(&config.server, config.storage.data_dir.clone(), stop_rx).await?;
        }

        Command::Validate => {
            log::info!("✓ Config OK");
            log::info!("  hashtag: {}", config.poller.hashtag);
            log::info!(
                "  every {}s, {} posts per page",
                config.poller.interval_secs,
                config.poller.page_size
            );
            if let Some(cap) = config.poller.max_pages {
                log::info!("  at most {} pages per cycle", cap);
            }
            log::info!("  allowlist: {} handles", config.allowlist_set().len());
            log::info!("  data dir: {}", config.storage.data_dir.display());
            log::info!("  server: {}", config.server.bind_addr());
        }

        Command::Info => {
            let projects = storage.list_projects().await?;
            log::info!("Data directory: {}", storage.root().display());
            if projects.is_empty() {
                log::info!("No projects stored yet.");
            }
            for project in projects {
                match storage.read(&project).await {
                    Ok(ids) => println!("ID{}\t{}", project, ids.unwrap_or_default().len()),
                    Err(e) => log::warn!("ID{}: unreadable: {}", project, e),
                }
            }
        }

        Command::Show { project } => {
            let project: ProjectId = project.parse()?;
            match storage.read(&project).await? {
                Some(ids) => println!("{}", serde_json::to_string_pretty(&ids)?),
                None => {
                    log::error!("No record for ID{}", project);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

/// Poller, ticker and read service until Ctrl-C.
async fn run(config: Config, storage: LocalStorage) -> Result<()> {
    let client = Arc::new(TwitterSearchClient::new(&config.api)?);
    let poller = Poller::new(&config, client, Arc::new(storage));

    let (stop, stop_rx) = watch::channel(false);
    let (commands, receiver) = command_channel();

    let ticker = spawn_ticker(config.poller.interval(), commands, stop_rx.clone());
    let poll_task = tokio::spawn(poller.run(receiver, stop_rx.clone()));
    let mut server_task = tokio::spawn({
        let server = config.server.clone();
        let data_dir = config.storage.data_dir.clone();
        async move { serve(&server, data_dir, stop_rx).await }
    });

    log::info!(
        "Polling '{}' every {}s",
        config.poller.hashtag,
        config.poller.interval_secs
    );

    // A server that fails to bind ends the whole process.
    let server_exit = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            log::info!("Shutdown requested; waiting for the current cycle");
            None
        }
        joined = &mut server_task => Some(joined),
    };
    let _ = stop.send(true);

    let _ = ticker.await;
    match poll_task.await {
        Ok(poller) => log::info!("Final cursor: {}", poller.cursor()),
        Err(e) => log::error!("Poller task failed: {}", e),
    }

    let joined = match server_exit {
        Some(joined) => joined,
        None => server_task.await,
    };
    match joined {
        Ok(result) => result?,
        Err(e) => log::error!("Server task failed: {}", e),
    }

    Ok(())
}
