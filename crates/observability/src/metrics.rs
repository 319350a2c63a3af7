//! Prometheus-kompatible Metriken fuer das Rover-Backend
//!
//! Registrierte Metriken:
//! - `rover_connected_clients` – Gauge: Aktuell verbundene Clients
//! - `rover_rpc_calls_total` – Counter: RPC-Aufrufe pro Methode
//! - `rover_rpc_gated_total` – Counter: Durch Killswitch/IP-Sperre verworfene Aufrufe
//! - `rover_safety_stops_total` – Counter: Sicherheitsstopps durch Kollisionen
//! - `rover_killswitch_enabled` – Gauge: 1 wenn der Killswitch aktiv ist
//! - `rover_send_failures_total` – Counter: Fehlgeschlagene Sendeversuche

use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Alle Rover-Metriken
///
/// Clone teilt die Registry und alle Zaehler.
#[derive(Clone)]
pub struct RoverMetrics {
    pub registry: Arc<Registry>,

    // Sitzungen
    pub connected_clients: IntGauge,
    pub send_failures_total: IntCounter,

    // RPC
    pub rpc_calls_total: IntCounterVec,
    pub rpc_gated_total: IntCounterVec,

    // Sicherheit
    pub safety_stops_total: IntCounter,
    pub killswitch_enabled: IntGauge,
}

impl RoverMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let connected_clients = IntGauge::with_opts(Opts::new(
            "rover_connected_clients",
            "Anzahl aktuell verbundener Clients",
        ))?;
        registry.register(Box::new(connected_clients.clone()))?;

        let send_failures_total = IntCounter::with_opts(Opts::new(
            "rover_send_failures_total",
            "Fehlgeschlagene Sendeversuche an Clients",
        ))?;
        registry.register(Box::new(send_failures_total.clone()))?;

        let rpc_calls_total = IntCounterVec::new(
            Opts::new("rover_rpc_calls_total", "RPC-Aufrufe pro Methode"),
            &["method"],
        )?;
        registry.register(Box::new(rpc_calls_total.clone()))?;

        let rpc_gated_total = IntCounterVec::new(
            Opts::new(
                "rover_rpc_gated_total",
                "Durch Killswitch oder IP-Sperre verworfene Aufrufe",
            ),
            &["method"],
        )?;
        registry.register(Box::new(rpc_gated_total.clone()))?;

        let safety_stops_total = IntCounter::with_opts(Opts::new(
            "rover_safety_stops_total",
            "Durch Kollisionen ausgeloeste Stopps",
        ))?;
        registry.register(Box::new(safety_stops_total.clone()))?;

        let killswitch_enabled = IntGauge::with_opts(Opts::new(
            "rover_killswitch_enabled",
            "1 wenn der Killswitch aktiv ist",
        ))?;
        registry.register(Box::new(killswitch_enabled.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            connected_clients,
            send_failures_total,
            rpc_calls_total,
            rpc_gated_total,
            safety_stops_total,
            killswitch_enabled,
        })
    }

    /// Zaehlt einen RPC-Aufruf
    pub fn rpc_aufruf(&self, methode: &str) {
        self.rpc_calls_total.with_label_values(&[methode]).inc();
    }

    /// Zaehlt einen durch das Bewegungs-Gate verworfenen Aufruf
    pub fn rpc_verworfen(&self, methode: &str) {
        self.rpc_gated_total.with_label_values(&[methode]).inc();
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: RoverMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<RoverMetrics>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!(fehler = %err, "Metriken-Export fehlgeschlagen");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
