//! Health-Check-Endpunkt
//!
//! Endpoint: `GET /health`
//! Response: JSON mit Status, Version, Uptime, verbundenen Clients und ob
//! der Kollisions-Feed aktuelle Messwerte liefert.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Status des Health-Checks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// Antwort des Health-Check-Endpunkts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub connected_clients: usize,
    pub collision_feed_fresh: bool,
}

type Pruefung<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// Geteilter Zustand fuer den Health-Check-Handler
///
/// Die Abfragen werden von der Server-Verdrahtung gesetzt; das Crate selbst
/// kennt weder Sitzungen noch Sensoren.
#[derive(Clone)]
pub struct HealthState {
    start_time: Arc<Instant>,
    feed_frisch: Pruefung<bool>,
    clients: Pruefung<usize>,
}

impl HealthState {
    pub fn neu(
        feed_frisch: impl Fn() -> bool + Send + Sync + 'static,
        clients: impl Fn() -> usize + Send + Sync + 'static,
    ) -> Self {
        Self {
            start_time: Arc::new(Instant::now()),
            feed_frisch: Arc::new(feed_frisch),
            clients: Arc::new(clients),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Baut die aktuelle Antwort
    pub fn antwort(&self) -> HealthResponse {
        let collision_feed_fresh = (self.feed_frisch)();
        HealthResponse {
            status: if collision_feed_fresh {
                HealthStatus::Healthy
            } else {
                HealthStatus::Degraded
            },
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.uptime_seconds(),
            connected_clients: (self.clients)(),
            collision_feed_fresh,
        }
    }
}

/// Axum-Router fuer den `/health`-Endpunkt
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
}

/// `GET /health` – 200 auch bei degraded (Probe soll nicht failen)
async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.antwort()))
}
