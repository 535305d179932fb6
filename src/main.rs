//! shardkv - an in-memory key/value store with WAL durability and
//! single-master replication.

use clap::Parser;
use shardkv_core::Engine;
use shardkv_server::config::ReplicaType;
use shardkv_server::{replication, server, Config, ConnectionSemaphore};
use shardkv_storage::{Role, Storage};
use shardkv_wal::Wal;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[derive(Parser)]
#[command(name = "shardkv")]
struct Args {
    /// Path to the YAML config file. Missing-but-unspecified is not fatal;
    /// missing-and-explicit is.
    #[arg(long = "config-path")]
    config_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let (config_path, path_explicit) = match args.config_path {
        Some(path) => (path, true),
        None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
    };

    let config = match Config::load(&config_path, path_explicit) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load config: {err}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("starting shardkv");
    tracing::info!("  bind address: {}", config.network.address);
    tracing::info!("  data directory: {}", config.wal.data_directory.display());
    tracing::info!("  replica type: {:?}", config.replication.replica_type);

    let max_message_size = config.network.max_message_size_bytes()? as usize;
    let idle_timeout = config.network.idle_timeout_duration()?;
    let sync_interval = config.replication.sync_interval_duration()?;
    let wal_settings = config.wal.to_wal_settings()?;

    let engine = Arc::new(Engine::new(config.engine.partitions_number as usize));
    let wal = Some(Wal::open(wal_settings)?);
    let role = match config.replication.replica_type {
        ReplicaType::Master => Role::Master,
        ReplicaType::Slave => Role::Slave,
        ReplicaType::Standalone => Role::Standalone,
    };
    let storage = Storage::new(engine, wal, role);

    tracing::info!("replaying WAL");
    storage.replay_wal().await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let listener = TcpListener::bind(&config.network.address).await?;
    let semaphore = Arc::new(ConnectionSemaphore::new(config.network.max_connections));
    let server_handle = tokio::spawn(server::run(
        listener,
        storage.clone(),
        semaphore,
        max_message_size,
        idle_timeout,
        shutdown_rx.clone(),
    ));

    let replication_handle: Option<tokio::task::JoinHandle<()>> = match role {
        Role::Master => {
            let listener = TcpListener::bind(&config.replication.master_address).await?;
            let data_directory = config.wal.data_directory.clone();
            let shutdown_rx = shutdown_rx.clone();
            Some(tokio::spawn(async move {
                if let Err(err) =
                    replication::master::run(listener, data_directory, shutdown_rx).await
                {
                    tracing::error!(error = %err, "replication master stopped");
                }
            }))
        }
        Role::Slave => {
            let (tx, rx) = mpsc::unbounded_channel();
            let storage = storage.clone();
            let consumer_shutdown = shutdown_rx.clone();
            tokio::spawn(storage.run_replication_consumer(rx, consumer_shutdown));

            let master_address = config.replication.master_address.clone();
            let local_dir = config.wal.data_directory.clone();
            let shutdown_rx = shutdown_rx.clone();
            Some(tokio::spawn(async move {
                replication::slave::run(master_address, local_dir, sync_interval, tx, shutdown_rx)
                    .await;
            }))
        }
        Role::Standalone => None,
    };

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sigquit = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::quit())?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("received SIGINT"),
        _ = sigterm.recv() => tracing::info!("received SIGTERM"),
        _ = sigquit.recv() => tracing::info!("received SIGQUIT"),
    }

    tracing::info!("shutting down");
    let _ = shutdown_tx.send(true);
    let _ = server_handle.await;
    if let Some(handle) = replication_handle {
        let _ = handle.await;
    }

    drop(storage);
    tracing::info!("shardkv stopped");
    Ok(())
}
