//! Entwickler-Handler – IP-Sperren und Alarmmeldungen
//!
//! Nach jeder Sperr-Aenderung wird die Fahrerrolle geprueft und alle
//! Clients der betroffenen IP erhalten `setMyBlockingState [ip, bool]`.
//! Die Entwickleransicht aktualisiert sich ueber die Policy-Events.

use std::sync::Arc;

use rover_protocol::{methods, JsonRpcRequest, Params};
use serde_json::Value;

use crate::dispatcher::{HandlerErgebnis, RpcKontext};
use crate::server_state::RoverState;

/// `blockIp(ip)`
pub fn handle_block_ip(state: &Arc<RoverState>, ctx: &RpcKontext, params: &Params) -> HandlerErgebnis {
    let ip = params.text(0)?;
    tracing::info!(client_id = %ctx.client_id, ip = %ip, "blockIp");
    let geaendert = state.policy.ip_sperren(ip);
    sperrzustand_verteilen(state, ip, true);
    Ok(Value::Bool(geaendert))
}

/// `unblockIp(ip)`
pub fn handle_unblock_ip(state: &Arc<RoverState>, ctx: &RpcKontext, params: &Params) -> HandlerErgebnis {
    let ip = params.text(0)?;
    tracing::info!(client_id = %ctx.client_id, ip = %ip, "unblockIp");
    let geaendert = state.policy.ip_freigeben(ip);
    sperrzustand_verteilen(state, ip, false);
    Ok(Value::Bool(geaendert))
}

fn sperrzustand_verteilen(state: &RoverState, ip: &str, gesperrt: bool) {
    if state
        .policy
        .fahrer_freigeben_wenn_gesperrt(&state.fahrer)
        .is_some()
    {
        state.rover_zustand_senden();
    }

    let nachricht = JsonRpcRequest::notification(
        methods::SET_MY_BLOCKING_STATE,
        vec![Value::String(ip.to_string()), Value::Bool(gesperrt)],
    );
    for client_id in state.policy.clients_mit_ip(ip) {
        state.sitzungen.an_client_senden(client_id, &nachricht);
    }
}

/// `distributeAlertNotification(text)` → `showAlertNotification` an alle
pub fn handle_distribute_alert(state: &Arc<RoverState>, ctx: &RpcKontext, params: &Params) -> HandlerErgebnis {
    let text = params.text(0)?;
    tracing::info!(client_id = %ctx.client_id, "Alarmmeldung verteilt");
    state.sitzungen.an_alle_senden(&JsonRpcRequest::notification(
        methods::SHOW_ALERT_NOTIFICATION,
        vec![Value::String(text.to_string())],
    ));
    Ok(Value::Null)
}
