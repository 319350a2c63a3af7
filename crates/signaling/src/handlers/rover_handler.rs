//! Rover-Handler – Ping, Killswitch, Fahrerrolle, Client-Informationen

use std::sync::Arc;

use rover_protocol::Params;
use serde_json::Value;

use super::aufrufer_id;
use crate::dispatcher::{HandlerErgebnis, RpcKontext};
use crate::server_state::RoverState;

/// `ping(sqn)` → `"pong <sqn+1>"`
pub fn handle_ping(_state: &Arc<RoverState>, ctx: &RpcKontext, params: &Params) -> HandlerErgebnis {
    let sqn = params.zahl(0)?;
    tracing::trace!(client_id = %ctx.client_id, sqn, "ping");
    Ok(Value::String(format!("pong {}", sqn.saturating_add(1))))
}

// ---------------------------------------------------------------------------
// Killswitch
// ---------------------------------------------------------------------------

/// `setKillswitch(enabled, message)` – nie gesperrt
pub fn handle_set_killswitch(state: &Arc<RoverState>, ctx: &RpcKontext, params: &Params) -> HandlerErgebnis {
    let aktiv = params.wahrheitswert(0)?;
    let nachricht = params.optionaler_text(1)?;
    tracing::info!(client_id = %ctx.client_id, aktiv, "setKillswitch");

    if state.killswitch.setzen(aktiv, nachricht) {
        state.rover_zustand_senden();
    }
    Ok(Value::Bool(aktiv))
}

/// `getKillswitchState()` → aktueller Zustand als Ergebnis
pub fn handle_get_killswitch_state(state: &Arc<RoverState>, _ctx: &RpcKontext, _params: &Params) -> HandlerErgebnis {
    Ok(Value::Bool(state.killswitch.ist_aktiv()))
}

/// `sendKillswitchState()` → `updateKillswitchEnabled` an den Aufrufer
pub fn handle_send_killswitch_state(state: &Arc<RoverState>, ctx: &RpcKontext, _params: &Params) -> HandlerErgebnis {
    state.killswitch.zustand_senden(ctx.client_id);
    Ok(Value::Null)
}

// ---------------------------------------------------------------------------
// Fahrerrolle
// ---------------------------------------------------------------------------

/// `enterDriverMode(clientId)`
///
/// Clients mit gesperrter IP erhalten die Rolle nicht. Ergebnis: ob der
/// Aufrufer danach Fahrer ist.
pub fn handle_enter_driver_mode(state: &Arc<RoverState>, ctx: &RpcKontext, params: &Params) -> HandlerErgebnis {
    let client_id = aufrufer_id(ctx, params, 0);
    if state.policy.client_gesperrt(client_id) {
        tracing::info!(client_id = %client_id, "Fahrerrolle abgelehnt – IP gesperrt");
        return Ok(Value::Bool(false));
    }

    let vorher = state.fahrer.aktueller_fahrer();
    let erworben = state.fahrer.erwerben(client_id);
    if erworben && vorher != Some(client_id) {
        state.rover_zustand_senden();
    }
    Ok(Value::Bool(erworben))
}

/// `exitDriverMode(clientId)`
pub fn handle_exit_driver_mode(state: &Arc<RoverState>, ctx: &RpcKontext, params: &Params) -> HandlerErgebnis {
    let client_id = aufrufer_id(ctx, params, 0);
    let freigegeben = state.fahrer.freigeben(client_id);
    if freigegeben {
        state.rover_zustand_senden();
    }
    Ok(Value::Bool(freigegeben))
}

// ---------------------------------------------------------------------------
// Client-Informationen
// ---------------------------------------------------------------------------

/// `setClientInformation(clientId, fingerprint, browser, os)`
pub fn handle_set_client_information(state: &Arc<RoverState>, ctx: &RpcKontext, params: &Params) -> HandlerErgebnis {
    let client_id = aufrufer_id(ctx, params, 0);
    let browser = params.text(2)?.to_string();
    let os = params.text(3)?.to_string();
    tracing::debug!(client_id = %client_id, browser = %browser, os = %os, "Client-Informationen");

    let gefunden = state
        .sitzungen
        .client_information_setzen(client_id, Some(browser), Some(os));
    Ok(Value::Bool(gefunden))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rover_core::ClientId;
    use rover_observability::RoverMetrics;
    use rover_protocol::ParamTyp;
    use serde_json::json;

    use crate::registry::NeueSitzung;

    fn kontext(sitzung: &NeueSitzung) -> RpcKontext {
        RpcKontext {
            client_id: sitzung.client_id,
            remote_address: "10.0.0.1".into(),
        }
    }

    fn params(werte: Vec<Value>, schema: &[ParamTyp]) -> Params {
        Params::pruefen(werte, schema).unwrap()
    }

    fn methoden(sitzung: &mut NeueSitzung) -> Vec<Value> {
        let mut liste = Vec::new();
        while let Ok(text) = sitzung.empfaenger.try_recv() {
            liste.push(serde_json::from_str(&text).unwrap());
        }
        liste
    }

    #[test]
    fn ping_antwortet_mit_naechster_sequenz() {
        let state = RoverState::simuliert(RoverMetrics::neu().unwrap());
        let ctx = RpcKontext {
            client_id: ClientId(5000),
            remote_address: "127.0.0.1".into(),
        };
        let p = params(vec![json!(41)], &[ParamTyp::Zahl]);
        assert_eq!(handle_ping(&state, &ctx, &p).unwrap(), json!("pong 42"));
    }

    #[test]
    fn killswitch_setzen_meldet_rover_zustand() {
        let state = RoverState::simuliert(RoverMetrics::neu().unwrap());
        let mut a = state.sitzungen.client_hinzufuegen("10.0.0.1");
        methoden(&mut a);

        let p = params(
            vec![json!(true), json!("Wartung")],
            &[ParamTyp::Wahrheitswert, ParamTyp::OptionalerText],
        );
        handle_set_killswitch(&state, &kontext(&a), &p).unwrap();

        let nachrichten = methoden(&mut a);
        let namen: Vec<&str> = nachrichten
            .iter()
            .map(|n| n["method"].as_str().unwrap())
            .collect();
        assert_eq!(
            namen,
            vec!["updateKillswitchEnabled", "showAlertNotification", "updateRoverState"]
        );
        assert_eq!(nachrichten[2]["params"][0]["isKillswitchEnabled"], true);
        assert_eq!(
            handle_get_killswitch_state(&state, &kontext(&a), &Params::default()).unwrap(),
            json!(true)
        );
    }

    #[test]
    fn killswitch_ohne_nachricht() {
        let state = RoverState::simuliert(RoverMetrics::neu().unwrap());
        let mut a = state.sitzungen.client_hinzufuegen("10.0.0.1");
        methoden(&mut a);

        let p = params(vec![json!(true)], &[ParamTyp::Wahrheitswert, ParamTyp::OptionalerText]);
        handle_set_killswitch(&state, &kontext(&a), &p).unwrap();
        let nachrichten = methoden(&mut a);
        assert_eq!(nachrichten[1]["method"], "showAlertNotification");
        assert_eq!(nachrichten[1]["params"][0], Value::Null);
    }

    #[test]
    fn fahrerrolle_erwerben_und_abgeben() {
        let state = RoverState::simuliert(RoverMetrics::neu().unwrap());
        let mut a = state.sitzungen.client_hinzufuegen("10.0.0.1");
        let b = state.sitzungen.client_hinzufuegen("10.0.0.2");
        methoden(&mut a);

        let id_a = params(vec![json!(a.client_id.inner())], &[ParamTyp::Zahl]);
        let id_b = params(vec![json!(b.client_id.inner())], &[ParamTyp::Zahl]);

        assert_eq!(handle_enter_driver_mode(&state, &kontext(&a), &id_a).unwrap(), json!(true));
        assert_eq!(handle_enter_driver_mode(&state, &kontext(&b), &id_b).unwrap(), json!(false));
        assert_eq!(state.fahrer.aktueller_fahrer(), Some(a.client_id));

        let nachrichten = methoden(&mut a);
        assert_eq!(nachrichten.len(), 1);
        assert_eq!(nachrichten[0]["method"], "updateRoverState");
        assert_eq!(nachrichten[0]["params"][0]["currentDriverId"], 5000);

        // Erneutes Erwerben aendert nichts und sendet nichts
        assert_eq!(handle_enter_driver_mode(&state, &kontext(&a), &id_a).unwrap(), json!(true));
        assert!(methoden(&mut a).is_empty());

        assert_eq!(handle_exit_driver_mode(&state, &kontext(&a), &id_a).unwrap(), json!(true));
        assert_eq!(state.fahrer.aktueller_fahrer(), None);
        assert_eq!(methoden(&mut a)[0]["params"][0]["currentDriverId"], -1);

        assert_eq!(handle_enter_driver_mode(&state, &kontext(&b), &id_b).unwrap(), json!(true));
    }

    #[test]
    fn gesperrter_client_wird_nicht_fahrer() {
        let state = RoverState::simuliert(RoverMetrics::neu().unwrap());
        let a = state.sitzungen.client_hinzufuegen("10.0.0.1");
        state.policy.ip_sperren("10.0.0.1");

        let id_a = params(vec![json!(a.client_id.inner())], &[ParamTyp::Zahl]);
        assert_eq!(handle_enter_driver_mode(&state, &kontext(&a), &id_a).unwrap(), json!(false));
        assert_eq!(state.fahrer.aktueller_fahrer(), None);
    }

    #[test]
    fn client_informationen_werden_gespeichert() {
        let state = RoverState::simuliert(RoverMetrics::neu().unwrap());
        let a = state.sitzungen.client_hinzufuegen("10.0.0.1");
        let p = params(
            vec![json!(a.client_id.inner()), json!("abc123"), json!("Firefox"), json!("Linux")],
            &[ParamTyp::Zahl, ParamTyp::Text, ParamTyp::Text, ParamTyp::Text],
        );
        assert_eq!(handle_set_client_information(&state, &kontext(&a), &p).unwrap(), json!(true));

        let sitzung = state.sitzungen.sitzung(a.client_id).unwrap();
        assert_eq!(sitzung.browser.as_deref(), Some("Firefox"));
        assert_eq!(sitzung.os.as_deref(), Some("Linux"));
    }
}
