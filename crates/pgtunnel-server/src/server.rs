//! HTTP surface: one handler for every path.

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::header;
use axum::response::IntoResponse;
use pgtunnel_db::{Connector, Registry, TlsMode};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::request::TunnelRequest;
use crate::response;

/// Content type the tunnel client expects for the binary body.
pub const CONTENT_TYPE: &str = "text/plain; charset=x-user-defined";

/// Largest form body accepted; bulk statement batches exceed axum's 2 MiB default.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// State shared by every request: the registry and the backend TLS mode.
pub struct AppState<C: Connector> {
    registry: Arc<Registry<C>>,
    tls: TlsMode,
}

impl<C: Connector> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            tls: self.tls,
        }
    }
}

impl<C: Connector> AppState<C> {
    pub fn new(registry: Arc<Registry<C>>, tls: TlsMode) -> Self {
        Self { registry, tls }
    }

    pub fn registry(&self) -> &Arc<Registry<C>> {
        &self.registry
    }
}

pub fn create_router<C: Connector>(state: AppState<C>) -> Router {
    Router::new()
        .fallback(tunnel::<C>)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn tunnel<C: Connector>(State(state): State<AppState<C>>, body: Bytes) -> impl IntoResponse {
    let request = TunnelRequest::from_form(&body, state.tls);
    let payload = response::respond(&state.registry, &request).await;
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], payload)
}

/// Serves until `shutdown` resolves, then closes every cached backend handle.
pub async fn serve<C, F>(listener: TcpListener, state: AppState<C>, shutdown: F) -> std::io::Result<()>
where
    C: Connector,
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("listening on http://{addr}");
    }
    let registry = Arc::clone(state.registry());
    let app = create_router(state);
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await;
    registry.shutdown().await;
    served
}
