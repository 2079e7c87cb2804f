use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use pgtunnel_db::Registry;
use pgtunnel_db::postgres::PgConnector;
use pgtunnel_server::{AppState, Config, logging, serve, shutdown_signal};
use tokio::net::TcpListener;
use tracing::info;

fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    #[cfg(unix)]
    let _pid_file = if config.foreground {
        None
    } else {
        Some(pgtunnel_server::daemon::daemonize(&config.work_dir, &config.pid_file)?)
    };

    logging::init_logging(config.log_filter.as_deref(), config.log_file.as_deref())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    runtime.block_on(run(config))
}

async fn run(config: Config) -> anyhow::Result<()> {
    let addr = config.listen_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    let mut connector = PgConnector::new();
    if let Some(path) = &config.ssl_root_cert {
        connector = connector.with_ssl_root_cert(path.clone());
    }
    let registry = Arc::new(Registry::new(connector));
    let state = AppState::new(registry, config.ssl_mode);

    info!(ssl_mode = %config.ssl_mode, "pgtunnel {} starting", env!("CARGO_PKG_VERSION"));
    serve(listener, state, shutdown_signal()).await?;
    info!("pgtunnel stopped");
    Ok(())
}
