// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::Parser;
use restory::{
    api::{self, ApiState},
    backup::{BackupStore, FsObjectStore},
    cluster::KubeClusterApi,
    constants::{
        DEFAULT_HISTORY_RETENTION, HTTP_SERVER_BIND_ADDRESS, HTTP_SERVER_PORT,
        TOKIO_WORKER_THREADS,
    },
    engine::{EngineConfig, RestoreEngine},
    merge::ConflictResolver,
    validation::Validator,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Kubernetes backup restore orchestration engine.
#[derive(Parser, Debug)]
#[command(name = "restory", version, about)]
struct Args {
    /// Port for the restore API and Prometheus metrics server
    #[arg(long, env = "RESTORY_PORT", default_value_t = HTTP_SERVER_PORT)]
    port: u16,

    /// Bind address for the HTTP server
    #[arg(long, env = "RESTORY_BIND_ADDRESS", default_value = HTTP_SERVER_BIND_ADDRESS)]
    bind_address: String,

    /// Root directory of the backup object store
    #[arg(long, env = "RESTORY_BACKUP_ROOT", default_value = "/var/lib/restory/backups")]
    backup_root: PathBuf,

    /// Number of finished operations retained in history
    #[arg(long, env = "RESTORY_HISTORY_RETENTION", default_value_t = DEFAULT_HISTORY_RETENTION)]
    history_retention: usize,
}

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("restory-engine")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

/// Initialize logging with custom format
///
/// Respects `RUST_LOG` environment variable if set, otherwise defaults to INFO level.
/// Respects `RUST_LOG_FORMAT` environment variable for output format (json or text).
fn initialize_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!("Starting Restory restore engine");
    debug!("Logging initialized with file and line number tracking");
}

/// Initialize the Kubernetes client from the ambient configuration.
async fn initialize_kube_client() -> Result<kube::Client> {
    debug!("Initializing Kubernetes client");
    let config = kube::Config::infer().await?;
    let client = kube::Client::try_from(config)?;
    info!("Kubernetes client initialized");
    Ok(client)
}

async fn async_main() -> Result<()> {
    initialize_logging();
    let args = Args::parse();

    let client = initialize_kube_client().await?;
    let cluster = Arc::new(KubeClusterApi::new(client));

    info!(
        backup_root = %args.backup_root.display(),
        "Initializing backup object store"
    );
    let backups = Arc::new(BackupStore::new(Arc::new(FsObjectStore::new(
        args.backup_root.clone(),
    ))));

    let validator = Arc::new(Validator::new(
        Arc::clone(&cluster) as Arc<dyn restory::cluster::ClusterApi>,
        Arc::clone(&backups),
    ));

    let engine = RestoreEngine::with_options(
        cluster,
        Arc::clone(&backups),
        Arc::clone(&validator),
        ConflictResolver::default(),
        Arc::new(restory::engine::AllowAllPolicy),
        EngineConfig {
            history_retention: args.history_retention,
        },
    );

    let app = api::router(ApiState {
        engine,
        validator,
        backups,
    });

    let address = format!("{}:{}", args.bind_address, args.port);
    info!(address = %address, "Starting restore API server");
    let listener = tokio::net::TcpListener::bind(&address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Restore API server stopped");
    Ok(())
}

/// Resolve on SIGTERM or ctrl-c so in-flight requests can drain.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received ctrl-c, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
