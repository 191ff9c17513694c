#![forbid(unsafe_code)]

use std::process;

use anyhow::Context;
use clap::Parser;
use routebox::{Config, StoreConfig};
use routebox_server::cli::Cli;
use routebox_server::{AppState, router};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const TRACING_TARGET_STARTUP: &str = "routebox::startup";
const TRACING_TARGET_SHUTDOWN: &str = "routebox::shutdown";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        tracing::info!(target: TRACING_TARGET_SHUTDOWN, "routebox stopped");
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SHUTDOWN,
            error = ?error,
            "routebox terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = cli.load().context("failed to load configuration")?;

    let client = reqwest::Client::builder()
        .build()
        .context("failed to create HTTP client")?;
    let state = AppState::from_config(&config, client).context("failed to create cache store")?;
    log_config(&config, &state);

    let addr = config.listen_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(target: TRACING_TARGET_STARTUP, %addr, "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn log_config(config: &Config, state: &AppState) {
    let kind = match &config.store {
        StoreConfig::Redis(_) => "redis",
        StoreConfig::Memory(_) => "memory",
    };
    tracing::info!(
        target: TRACING_TARGET_STARTUP,
        version = env!("CARGO_PKG_VERSION"),
        store = kind,
        store_target = %state.handler().store().target(),
        upstream = %config.upstream.url,
        ttl_secs = config.cache.ttl.as_secs(),
        key_mode = ?config.cache.key_mode,
        probe_timeout_ms = config.health.probe_timeout.as_millis() as u64,
        "starting routebox"
    );
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(target: TRACING_TARGET_SHUTDOWN, %error, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!(target: TRACING_TARGET_SHUTDOWN, %error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!(target: TRACING_TARGET_SHUTDOWN, "shutdown signal received, draining connections");
}
