//! WebSocket-Listener – Bindet Socket, akzeptiert Verbindungen
//!
//! Der `RoverServer` stellt einen axum-Router mit einer WebSocket-Route
//! bereit und startet fuer jede Verbindung eine `ClientConnection` im
//! Upgrade-Task. Die Peer-Adresse kommt ueber `ConnectInfo`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::connection::ClientConnection;
use crate::dispatcher::RpcDispatcher;
use crate::error::SignalingResult;
use crate::server_state::RoverState;

#[derive(Clone)]
struct WsZustand {
    dispatcher: Arc<RpcDispatcher>,
    shutdown_rx: watch::Receiver<bool>,
}

/// WebSocket-Server des Rovers
pub struct RoverServer {
    dispatcher: Arc<RpcDispatcher>,
    bind_addr: SocketAddr,
    ws_pfad: String,
}

impl RoverServer {
    pub fn neu(state: Arc<RoverState>, bind_addr: SocketAddr, ws_pfad: impl Into<String>) -> Self {
        Self {
            dispatcher: Arc::new(RpcDispatcher::neu(state)),
            bind_addr,
            ws_pfad: ws_pfad.into(),
        }
    }

    /// Router mit der WebSocket-Route unter `ws_pfad`
    pub fn router(&self, shutdown_rx: watch::Receiver<bool>) -> Router {
        Router::new()
            .route(&self.ws_pfad, get(ws_handler))
            .layer(rover_observability::request_timing_layer())
            .with_state(WsZustand {
                dispatcher: Arc::clone(&self.dispatcher),
                shutdown_rx,
            })
    }

    /// Bindet `bind_addr` und bedient Verbindungen bis zum Shutdown
    pub async fn starten(self, shutdown_rx: watch::Receiver<bool>) -> SignalingResult<()> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        self.bedienen(listener, shutdown_rx).await
    }

    /// Bedient Verbindungen auf einem bereits gebundenen Listener
    pub async fn bedienen(
        self,
        listener: TcpListener,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> SignalingResult<()> {
        let lokale_addr = listener.local_addr()?;
        tracing::info!(adresse = %lokale_addr, pfad = %self.ws_pfad, "WebSocket-Server gestartet");

        let app = self.router(shutdown_rx.clone());
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            while shutdown_rx.changed().await.is_ok() {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        })
        .await?;

        tracing::info!("WebSocket-Server gestoppt");
        Ok(())
    }

    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer_addr): ConnectInfo<SocketAddr>,
    State(zustand): State<WsZustand>,
) -> Response {
    tracing::debug!(peer = %peer_addr, "WebSocket-Upgrade");
    let verbindung = ClientConnection::neu(zustand.dispatcher, peer_addr);
    let shutdown_rx = zustand.shutdown_rx;
    ws.on_upgrade(move |socket| verbindung.verarbeiten(socket, shutdown_rx))
}
