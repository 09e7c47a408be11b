//! Hub server listener
//!
//! Serves the upgrade endpoint, admits connections through the origin gate,
//! and hands each upgraded socket to a subscriber session.

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Semaphore};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::ingress::IngressAdapter;
use crate::registry::Hub;
use crate::server::config::ServerConfig;
use crate::server::origin::OriginGate;
use crate::server::ws::WsConnection;
use crate::session::{run_session, SessionConfig, SessionContext};
use crate::stats::HubStats;

#[derive(Clone)]
struct AppState {
    hub: Hub,
    origins: Arc<OriginGate>,
    session: SessionConfig,
    connection_semaphore: Option<Arc<Semaphore>>,
}

/// WebSocket fan-out server
pub struct HubServer {
    config: ServerConfig,
    hub: Hub,
    router: JoinHandle<HubStats>,
}

impl HubServer {
    /// Create a server and start its hub
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: ServerConfig) -> Self {
        let (hub, router) = Hub::spawn(config.hub.clone());
        Self {
            config,
            hub,
            router,
        }
    }

    /// Get a reference to the hub
    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Ingress adapter feeding this server's hub
    pub fn ingress(&self) -> IngressAdapter {
        IngressAdapter::new(self.hub.clone())
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the HTTP application
    pub fn app(&self) -> Router {
        let connection_semaphore = if self.config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(self.config.max_connections)))
        } else {
            None
        };

        let state = AppState {
            hub: self.hub.clone(),
            origins: Arc::new(self.config.origins.clone()),
            session: self.config.session.clone(),
            connection_semaphore,
        };

        Router::new()
            .route(&self.config.path, get(upgrade))
            .route_layer(middleware::from_fn_with_state(state.clone(), admit_origin))
            .with_state(state)
    }

    /// Bind the configured address and serve until `shutdown` resolves
    pub async fn run_until<F>(self, shutdown: F) -> Result<HubStats>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    ///
    /// On shutdown the hub stops first, which closes every subscriber. The
    /// listener then gets [`ServerConfig::shutdown_grace`] to finish before
    /// it is dropped. Returns the hub's final statistics.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<HubStats>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, path = %self.config.path, "Hub server listening");

        if self.config.origins.is_allow_all() {
            tracing::warn!("Origin checking disabled, all origins are admitted");
        }

        let app = self.app();
        let hub = self.hub.clone();
        let (stopped_tx, stopped_rx) = oneshot::channel::<()>();

        let signal = async move {
            shutdown.await;
            tracing::info!("Shutdown signal received");
            hub.stop();
            let _ = stopped_tx.send(());
        };

        let server = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .into_future();

        let grace = self.config.shutdown_grace;
        let grace_expired = async move {
            if stopped_rx.await.is_err() {
                std::future::pending::<()>().await;
            }
            tokio::time::sleep(grace).await;
        };

        tokio::select! {
            result = server => result?,
            _ = grace_expired => {
                tracing::warn!(
                    grace_secs = grace.as_secs(),
                    "Grace period elapsed, dropping listener"
                );
            }
        }

        self.hub.stop();

        match tokio::time::timeout(grace, self.router).await {
            Ok(Ok(stats)) => Ok(stats),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Hub router task failed");
                Err(Error::HubClosed)
            }
            Err(_) => {
                tracing::error!("Hub router did not stop in time");
                Err(Error::HubClosed)
            }
        }
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}

fn origin_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
}

async fn admit_origin(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !state.origins.admit(origin_header(request.headers())) {
        return StatusCode::FORBIDDEN.into_response();
    }
    next.run(request).await
}

async fn upgrade(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let peer_addr = connect_info.map(|ConnectInfo(addr)| addr);

    if state.hub.is_closed() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let permit = match state.connection_semaphore {
        Some(ref sem) => match sem.clone().try_acquire_owned() {
            Ok(permit) => Some(permit),
            Err(_) => {
                tracing::warn!(peer = ?peer_addr, "Connection rejected: limit reached");
                return StatusCode::SERVICE_UNAVAILABLE.into_response();
            }
        },
        None => None,
    };

    let context = SessionContext::new(
        state.hub.next_subscriber_id(),
        peer_addr,
        origin_header(&headers).map(str::to_owned),
    );

    tracing::debug!(subscriber_id = %context.id, peer = ?peer_addr, "Upgrading connection");

    let hub = state.hub.clone();
    let session = state.session.clone();
    ws.on_failed_upgrade(|e| tracing::debug!(error = %e, "WebSocket upgrade failed"))
        .on_upgrade(move |socket| async move {
            let _permit = permit;
            run_session(hub, context, WsConnection::new(socket), session).await;
        })
}
