//! System-Handler – Kamerabild, Systemprotokoll, Laufzeit
//!
//! Die Daten kommen von blockierenden Faehigkeiten (Kamera, Dateien). Die
//! Handler antworten sofort mit `null` und liefern das Ergebnis spaeter als
//! Notification an den Aufrufer; die Arbeit laeuft in `spawn_blocking`.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rover_core::ClientId;
use rover_protocol::{methods, JsonRpcRequest, Params};
use serde_json::Value;

use super::aufrufer_id;
use crate::dispatcher::{HandlerErgebnis, RpcKontext};
use crate::server_state::RoverState;

/// Antwort von `getSystemUpTime` wenn die Laufzeit nicht lesbar ist
const LAUFZEIT_FEHLER: &str = "ERROR";

/// Fuehrt `arbeit` blockierend aus und sendet das Ergebnis an `client_id`
fn im_hintergrund(
    state: &Arc<RoverState>,
    client_id: ClientId,
    arbeit: impl FnOnce(&RoverState) -> JsonRpcRequest + Send + 'static,
) {
    let state = Arc::clone(state);
    tokio::spawn(async move {
        let hintergrund = Arc::clone(&state);
        match tokio::task::spawn_blocking(move || arbeit(&hintergrund)).await {
            Ok(nachricht) => {
                state.sitzungen.an_client_senden(client_id, &nachricht);
            }
            Err(e) => {
                tracing::error!(client_id = %client_id, fehler = %e, "Hintergrundaufgabe abgebrochen");
            }
        }
    });
}

/// `getCameraSnapshot(clientId)` → `incomingSnapshot [base64]`
///
/// Schlaegt die Aufnahme fehl, erhaelt der Aufrufer
/// `showErrorNotification`.
pub fn handle_camera_snapshot(state: &Arc<RoverState>, ctx: &RpcKontext, params: &Params) -> HandlerErgebnis {
    let client_id = aufrufer_id(ctx, params, 0);
    im_hintergrund(state, client_id, move |state| match state.kamera.aufnehmen() {
        Ok(bild) => JsonRpcRequest::notification(
            methods::INCOMING_SNAPSHOT,
            vec![Value::String(STANDARD.encode(bild))],
        ),
        Err(e) => {
            tracing::warn!(client_id = %client_id, fehler = %e, "Kamerabild fehlgeschlagen");
            JsonRpcRequest::notification(
                methods::SHOW_ERROR_NOTIFICATION,
                vec![Value::String("Camera snapshot failed".to_string())],
            )
        }
    });
    Ok(Value::Null)
}

/// `getLoggingEntries(clientId, lastLogEntry)`
///
/// `incomingLogEntries [true, eintraege...]` mit allen Eintraegen nach
/// `lastLogEntry`; `[false]` wenn es keine neuen gibt oder der Eintrag
/// unbekannt ist.
pub fn handle_logging_entries(state: &Arc<RoverState>, ctx: &RpcKontext, params: &Params) -> HandlerErgebnis {
    let client_id = aufrufer_id(ctx, params, 0);
    let letzter = params.optionaler_text(1)?.map(str::to_string);

    im_hintergrund(state, client_id, move |state| {
        let params = match state.systemprotokoll.eintraege_nach(letzter.as_deref()) {
            Ok(eintraege) if !eintraege.is_empty() => std::iter::once(Value::Bool(true))
                .chain(eintraege.into_iter().map(Value::String))
                .collect(),
            Ok(_) => vec![Value::Bool(false)],
            Err(e) => {
                tracing::debug!(client_id = %client_id, fehler = %e, "Keine Protokolleintraege");
                vec![Value::Bool(false)]
            }
        };
        JsonRpcRequest::notification(methods::INCOMING_LOG_ENTRIES, params)
    });
    Ok(Value::Null)
}

/// `getSystemUpTime(clientId)` → `incomingSystemUpTime [text | "ERROR"]`
pub fn handle_system_up_time(state: &Arc<RoverState>, ctx: &RpcKontext, params: &Params) -> HandlerErgebnis {
    let client_id = aufrufer_id(ctx, params, 0);
    im_hintergrund(state, client_id, move |state| {
        let text = state.systemprotokoll.laufzeit().unwrap_or_else(|e| {
            tracing::warn!(client_id = %client_id, fehler = %e, "Laufzeit nicht lesbar");
            LAUFZEIT_FEHLER.to_string()
        });
        JsonRpcRequest::notification(methods::INCOMING_SYSTEM_UP_TIME, vec![Value::String(text)])
    });
    Ok(Value::Null)
}
