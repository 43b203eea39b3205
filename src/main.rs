// src/main.rs
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

use ualive::{
    config,
    health::{CheckRunner, ResultStore},
    logging,
    metrics::MetricsRegistry,
    scheduler::Scheduler,
    server::{MetricsHandler, ServerBuilder, StatusHandler},
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load_config().context("Invalid configuration")?;
    logging::init_tracing(&config.log_level)?;

    let schedule = config.schedule()?;
    let bind_addr = config.bind_addr()?;

    let metrics_registry = Arc::new(MetricsRegistry::new()?);
    let metrics = metrics_registry.collector();

    let store = ResultStore::new();
    let runner = Arc::new(CheckRunner::new(store.clone()).with_metrics(metrics.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    if let Some(metrics_addr) = config.metrics_addr()? {
        let handler = MetricsHandler::new(metrics_registry.clone(), config.metrics_path.as_str());
        info!(
            "Metrics server listening on http://{}{}",
            metrics_addr, config.metrics_path
        );
        tokio::spawn(serve(ServerBuilder::new(metrics_addr).with_handler(handler), shutdown_rx.clone()));
    }

    info!("Starting ualive, listening on {}", config.bind);
    info!("Healthcheck resource name is {}", config.resource_name);

    let handler = StatusHandler::new(store, config.resource_name.as_str()).with_metrics(metrics);
    let status_server = tokio::spawn(serve(
        ServerBuilder::new(bind_addr).with_handler(handler),
        shutdown_rx,
    ));

    let command = Arc::new(config.command.clone());
    let timeout = config.timeout();
    let scheduler = Scheduler::start(schedule, move || {
        let runner = runner.clone();
        let command = command.clone();
        async move {
            runner.run_once(&command, timeout).await;
        }
    });

    tokio::select! {
        _ = shutdown_signal() => {}
        joined = status_server => {
            // the status listener only returns early on error
            scheduler.stop();
            return joined.context("status server task failed")?;
        }
    }

    scheduler.stop();
    let _ = shutdown_tx.send(true);
    info!("ualive stopped");
    Ok(())
}

async fn serve<H>(builder: ServerBuilder<H>, mut shutdown_rx: watch::Receiver<bool>) -> Result<()>
where
    H: tower::Service<hyper::Request<hyper::Body>, Response = hyper::Response<hyper::Body>>
        + Send
        + Clone
        + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    let shutdown = async move {
        let _ = shutdown_rx.wait_for(|stop| *stop).await;
    };
    let result = builder.serve_with_shutdown(shutdown).await;
    if let Err(e) = &result {
        error!("HTTP server error: {:#}", e);
    }
    result
}

// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal, exiting");
}
