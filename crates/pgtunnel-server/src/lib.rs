//! pgtunnel: an HTTP endpoint that runs PostgreSQL statements on behalf of
//! the Navicat tunnel client and answers in its binary wire format.
//!
//! A request is decoded by [`request`], executed by [`dispatch`] against a
//! handle from the shared [`pgtunnel_db::Registry`], and encoded by
//! [`response`]. [`server`] wires this into an axum router that answers on
//! every path.

pub mod config;
pub mod daemon;
pub mod dispatch;
pub mod logging;
pub mod request;
pub mod response;
pub mod server;

pub use config::Config;
pub use request::{Action, TunnelRequest};
pub use server::{AppState, CONTENT_TYPE, MAX_BODY_BYTES, create_router, serve};

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to listen for SIGTERM: {err}");
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
    tracing::info!("shutdown signal received");
}
