//! Request-Tracing fuer die HTTP-Router
//!
//! Jede HTTP-Anfrage (WebSocket-Upgrade, `/metrics`, `/health`) bekommt
//! einen Tracing-Span mit Methode und Pfad; Antwortstatus und Dauer werden
//! beim Abschluss geloggt.

use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Erstellt den Tracing-Layer fuer einen Axum-Router
pub fn request_timing_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::DEBUG))
}
