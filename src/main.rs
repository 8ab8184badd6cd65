// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use clap::Parser;
use poolwatch::{
    config::Settings,
    constants::TOKIO_WORKER_THREADS,
    dns::DnsResolver,
    http,
    output::FileWriter,
    registry::{WatchConfig, WatchRegistry},
    render::RenderEngine,
    source::FileWatcher,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Renders DNS-backed server pool templates and keeps them in sync with DNS.
#[derive(Parser, Debug)]
#[command(name = "poolwatch", version, about)]
struct Cli {
    /// Template source of an ad-hoc watch (e.g. `file:///etc/template.json?period=5s`)
    #[arg(long, value_name = "DSN", requires = "output")]
    source: Option<String>,

    /// Output of the ad-hoc watch (e.g. `file:///etc/config.json?mode=0640`)
    #[arg(long, value_name = "DSN", requires = "source")]
    output: Option<String>,

    /// YAML settings file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Parsed before anything starts so --help and --version exit right away
    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("poolwatch")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    init_tracing();
    info!(version = poolwatch::constants::VERSION, "Starting poolwatch");

    let settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => {
            debug!("No settings file given, using defaults");
            Settings::default()
        }
    };

    let watches = collect_watches(&cli, &settings)?;
    if watches.is_empty() {
        warn!("No watch configured, only the info endpoint will run");
    }

    let nameservers = settings.nameservers()?;
    info!(
        nameservers = ?nameservers,
        transport = ?settings.transport(),
        "Using DNS nameservers"
    );
    let resolver = DnsResolver::new(
        nameservers,
        settings.transport(),
        settings.dns_timeout(),
        settings.dns.max_in_flight,
    );
    let engine = RenderEngine::new(Arc::new(resolver), settings.render_settings());

    let registry = Arc::new(WatchRegistry::new(
        Arc::new(engine),
        Arc::new(FileWriter::new()),
        Arc::new(FileWatcher::new()),
        settings.retry_delay(),
    ));
    registry.start();
    for watch in watches {
        let description = watch.to_string();
        if let Err(e) = registry.register(watch) {
            registry.stop();
            return Err(e).with_context(|| format!("Failed to register watch {description}"));
        }
    }

    let (stop_server, server_stopped) = oneshot::channel::<()>();
    let mut server = settings.server.listen_addr.clone().map(|listen_addr| {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            http::serve(&listen_addr, registry, async {
                let _ = server_stopped.await;
            })
            .await
        })
    });

    tokio::select! {
        result = shutdown_signal() => result?,
        result = server_exit(server.as_mut()) => {
            error!("CRITICAL: Info endpoint exited unexpectedly: {:?}", result);
            registry.stop();
            result?;
            anyhow::bail!("Info endpoint exited unexpectedly without error")
        }
    }

    registry.stop();
    let _ = stop_server.send(());
    if let Some(handle) = server {
        if let Err(e) = handle.await.context("Info endpoint task failed")? {
            warn!(error = %format!("{e:#}"), "Info endpoint did not shut down cleanly");
        }
    }

    info!("Graceful shutdown completed");
    Ok(())
}

/// Initialize logging.
///
/// Respects `RUST_LOG` (default `info`) for filtering and `RUST_LOG_FORMAT`
/// (`json` or `text`, default `text`) for the output format.
fn init_tracing() {
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
}

/// Watches to register: the ad-hoc one from the command line, then the
/// configured ones.
fn collect_watches(cli: &Cli, settings: &Settings) -> Result<Vec<WatchConfig>> {
    let mut watches = Vec::new();

    if let (Some(source), Some(output)) = (&cli.source, &cli.output) {
        let watch = WatchConfig::parse(source, output, settings.check_period())
            .context("Invalid --source or --output")?;
        info!(watch = %watch, "Found command line watch");
        watches.push(watch);
    }

    let configured = settings
        .watch_configs()
        .context("Invalid watch in settings file")?;
    debug!(count = configured.len(), "Found configured watches");
    watches.extend(configured);

    Ok(watches)
}

/// Resolve once SIGINT or SIGTERM is received.
async fn shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Received SIGINT, initiating graceful shutdown...");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
    Ok(())
}

/// Resolve when the info endpoint task ends. Never resolves if it is disabled.
async fn server_exit(server: Option<&mut JoinHandle<Result<()>>>) -> Result<()> {
    match server {
        Some(handle) => handle.await.context("Info endpoint task failed")?,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod main_tests;
