use anyhow::Context;
use bourse_execution::Memory;
use bourse_server::{
    clock::SystemClock,
    config::{Config, ValidatedConfig},
    store::Store,
    Api, Market,
};
use clap::Parser;
use commonware_runtime::{tokio, Runner};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    port: Option<u16>,

    /// Storage directory (keeps accounts in memory when omitted)
    #[arg(short, long)]
    directory: Option<String>,

    #[arg(short, long)]
    log_level: Option<String>,
}

fn load_config(args: Args) -> anyhow::Result<ValidatedConfig> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(directory) = args.directory {
        config.directory = Some(directory);
    }
    if let Some(log_level) = args.log_level {
        config.log_level = log_level;
    }
    Ok(config.validate()?)
}

fn main() -> anyhow::Result<()> {
    // Parse args
    let config = load_config(Args::parse()).context("invalid configuration")?;

    // Create logger
    let logger = tracing_subscriber::fmt().with_max_level(config.log_level);
    if config.json_logs {
        logger.json().init();
    } else {
        logger.init();
    }

    // Initialize runtime
    let mut cfg = tokio::Config::default()
        .with_tcp_nodelay(Some(true))
        .with_worker_threads(config.worker_threads)
        .with_catch_panics(true);
    if let Some(directory) = &config.directory {
        cfg = cfg.with_storage_directory(directory.clone());
    }
    let executor = tokio::Runner::new(cfg);

    // Start runtime
    executor.start(|context| async move {
        let (store, sequence) = match &config.directory {
            Some(directory) => {
                let (store, sequence) = Store::open(&context).await?;
                info!(?directory, sequence, "opened durable store");
                (store, sequence)
            }
            None => {
                info!("no storage directory configured, keeping accounts in memory");
                (Store::Memory(Memory::default()), 0)
            }
        };

        let market = Arc::new(Market::new(
            store,
            sequence,
            Arc::new(SystemClock::new(context.clone())),
            config.session_ttl,
        ));
        let app = Api::new(market)
            .with_rate_limit(config.rate_limit)
            .router();

        // Start server
        let addr = format!("0.0.0.0:{}", config.port);
        let listener = ::tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        info!("Listening on {}", addr);
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async {
            if let Err(e) = ::tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down");
        })
        .await
        .context("axum server error")?;

        Ok::<(), anyhow::Error>(())
    })
}
