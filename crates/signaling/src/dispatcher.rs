//! RPC-Dispatcher – Routet JSON-RPC-Aufrufe an die registrierten Handler
//!
//! Jede Methode wird mit Parameter-Schema, Sperrklasse und Handler-Funktion
//! registriert. Der Dispatcher prueft und dekodiert die Parameter bevor der
//! Handler laeuft; unbekannte Methoden liefern `-32601`.
//!
//! ## Bewegungssperre
//! Methoden mit `Gate::Bewegung` (Fahren, Kopf, Kamera) werden still
//! verworfen (Ergebnis `null`) wenn der Killswitch aktiv ist oder die IP des
//! Aufrufers gesperrt ist. Die Pruefung und der Handler laufen unter der
//! geteilten Sperre des Killswitch.
//!
//! Auf Notifications (ohne `id`) wird nie geantwortet, auch nicht mit
//! Fehlern.

use std::collections::HashMap;
use std::sync::Arc;

use rover_core::ClientId;
use rover_protocol::{Eingehend, JsonRpcError, JsonRpcRequest, JsonRpcResponse, ParamTyp, Params};
use serde_json::Value;

use crate::handlers;
use crate::server_state::RoverState;

/// Rueckgabe eines Handlers
pub type HandlerErgebnis = Result<Value, JsonRpcError>;

/// Signatur aller Methoden-Handler
pub type Handler = fn(&Arc<RoverState>, &RpcKontext, &Params) -> HandlerErgebnis;

/// Sperrklasse einer Methode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Immer erlaubt
    Keins,
    /// Gesperrt durch Killswitch oder gesperrte IP
    Bewegung,
}

/// Registrierter Eintrag einer Methode
#[derive(Clone, Copy)]
pub struct MethodenEintrag {
    pub schema: &'static [ParamTyp],
    pub gate: Gate,
    pub handler: Handler,
}

/// Informationen ueber die aufrufende Verbindung
#[derive(Debug, Clone)]
pub struct RpcKontext {
    pub client_id: ClientId,
    pub remote_address: String,
}

/// Zentraler RPC-Dispatcher
pub struct RpcDispatcher {
    state: Arc<RoverState>,
    methoden: HashMap<&'static str, MethodenEintrag>,
}

impl RpcDispatcher {
    /// Dispatcher mit allen Rover-Methoden
    pub fn neu(state: Arc<RoverState>) -> Self {
        let mut dispatcher = Self::leer(state);
        handlers::registrieren(&mut dispatcher);
        dispatcher
    }

    /// Dispatcher ohne registrierte Methoden
    pub fn leer(state: Arc<RoverState>) -> Self {
        Self {
            state,
            methoden: HashMap::new(),
        }
    }

    /// Registriert eine Methode; ein vorhandener Eintrag wird ersetzt
    pub fn registrieren(
        &mut self,
        name: &'static str,
        schema: &'static [ParamTyp],
        gate: Gate,
        handler: Handler,
    ) {
        if self
            .methoden
            .insert(name, MethodenEintrag { schema, gate, handler })
            .is_some()
        {
            tracing::warn!(method = %name, "Methode doppelt registriert");
        }
    }

    pub fn kennt(&self, name: &str) -> bool {
        self.methoden.contains_key(name)
    }

    pub fn state(&self) -> &Arc<RoverState> {
        &self.state
    }

    /// Verarbeitet einen Textframe; `Some` enthaelt die zu sendende Antwort
    pub fn dispatch_text(&self, text: &str, ctx: &RpcKontext) -> Option<String> {
        let antwort = match Eingehend::parsen(text) {
            Ok(Eingehend::Aufruf(anfrage)) => self.dispatch(anfrage, ctx)?,
            Ok(Eingehend::Antwort) => {
                tracing::trace!(client_id = %ctx.client_id, "Client-Response ignoriert");
                return None;
            }
            Err(fehler) => {
                tracing::debug!(
                    client_id = %ctx.client_id,
                    code = ?fehler.antwort.error.as_ref().map(|e| e.code),
                    "Ungueltiger Frame"
                );
                if fehler.war_notification {
                    return None;
                }
                fehler.antwort
            }
        };

        match antwort.to_json() {
            Ok(json) => Some(json),
            Err(e) => {
                tracing::error!(fehler = %e, "Response nicht serialisierbar");
                None
            }
        }
    }

    /// Verarbeitet einen Aufruf
    ///
    /// Gibt `None` zurueck wenn keine Antwort gesendet werden soll.
    pub fn dispatch(&self, anfrage: JsonRpcRequest, ctx: &RpcKontext) -> Option<JsonRpcResponse> {
        let JsonRpcRequest {
            method, params, id, ..
        } = anfrage;
        tracing::trace!(client_id = %ctx.client_id, method = %method, "RPC empfangen");

        let ergebnis = self.ausfuehren(&method, params, ctx);
        if let Err(e) = &ergebnis {
            tracing::debug!(
                client_id = %ctx.client_id,
                method = %method,
                code = e.code,
                fehler = %e.message,
                "RPC fehlgeschlagen"
            );
        }

        let id = id?;
        Some(match ergebnis {
            Ok(wert) => JsonRpcResponse::erfolg(id, wert),
            Err(e) => JsonRpcResponse::fehler(id, e),
        })
    }

    fn ausfuehren(&self, method: &str, params: Vec<Value>, ctx: &RpcKontext) -> HandlerErgebnis {
        let eintrag = self
            .methoden
            .get(method)
            .copied()
            .ok_or_else(|| JsonRpcError::method_not_found(method))?;
        let params = Params::pruefen(params, eintrag.schema)?;
        self.state.metriken.rpc_aufruf(method);

        match eintrag.gate {
            Gate::Keins => (eintrag.handler)(&self.state, ctx, &params),
            Gate::Bewegung => {
                if self.state.policy.client_gesperrt(ctx.client_id) {
                    tracing::info!(client_id = %ctx.client_id, method = %method, "Bewegung verworfen – IP gesperrt");
                    self.state.metriken.rpc_verworfen(method);
                    return Ok(Value::Null);
                }
                match self
                    .state
                    .killswitch
                    .wenn_frei(|| (eintrag.handler)(&self.state, ctx, &params))
                {
                    Some(ergebnis) => ergebnis,
                    None => {
                        tracing::info!(client_id = %ctx.client_id, method = %method, "Bewegung verworfen – Killswitch aktiv");
                        self.state.metriken.rpc_verworfen(method);
                        Ok(Value::Null)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rover_observability::RoverMetrics;
    use serde_json::json;

    fn echo(_: &Arc<RoverState>, _: &RpcKontext, params: &Params) -> HandlerErgebnis {
        Ok(json!(params.zahl(0)?))
    }

    fn dispatcher() -> (RpcDispatcher, RpcKontext) {
        let state = RoverState::simuliert(RoverMetrics::neu().unwrap());
        let mut d = RpcDispatcher::leer(state);
        d.registrieren("echo", &[ParamTyp::Zahl], Gate::Keins, echo);
        d.registrieren("bewegen", &[ParamTyp::Zahl], Gate::Bewegung, echo);
        let ctx = RpcKontext {
            client_id: ClientId(5000),
            remote_address: "10.0.0.1".into(),
        };
        (d, ctx)
    }

    fn antwort(d: &RpcDispatcher, ctx: &RpcKontext, text: &str) -> Option<Value> {
        d.dispatch_text(text, ctx)
            .map(|t| serde_json::from_str(&t).unwrap())
    }

    #[test]
    fn request_erhaelt_ergebnis() {
        let (d, ctx) = dispatcher();
        let a = antwort(&d, &ctx, r#"{"jsonrpc":"2.0","method":"echo","params":[7],"id":1}"#).unwrap();
        assert_eq!(a["result"], 7);
        assert_eq!(a["id"], 1);
    }

    #[test]
    fn notification_erhaelt_keine_antwort() {
        let (d, ctx) = dispatcher();
        assert!(antwort(&d, &ctx, r#"{"jsonrpc":"2.0","method":"echo","params":[7]}"#).is_none());
        assert!(antwort(&d, &ctx, r#"{"jsonrpc":"2.0","method":"gibtsnicht","params":[]}"#).is_none());
        assert!(antwort(&d, &ctx, r#"{"jsonrpc":"2.0","method":"echo","params":["x"]}"#).is_none());
    }

    #[test]
    fn unbekannte_methode() {
        let (d, ctx) = dispatcher();
        let a = antwort(&d, &ctx, r#"{"jsonrpc":"2.0","method":"fliegen","id":"a"}"#).unwrap();
        assert_eq!(a["error"]["code"], JsonRpcError::METHOD_NOT_FOUND);
        assert_eq!(a["id"], "a");
    }

    #[test]
    fn falsche_parameter() {
        let (d, ctx) = dispatcher();
        let a = antwort(&d, &ctx, r#"{"jsonrpc":"2.0","method":"echo","params":["x"],"id":2}"#).unwrap();
        assert_eq!(a["error"]["code"], JsonRpcError::INVALID_PARAMS);
        let a = antwort(&d, &ctx, r#"{"jsonrpc":"2.0","method":"echo","params":[],"id":3}"#).unwrap();
        assert_eq!(a["error"]["code"], JsonRpcError::INVALID_PARAMS);
    }

    #[test]
    fn kaputtes_json() {
        let (d, ctx) = dispatcher();
        let a = antwort(&d, &ctx, "{nicht json").unwrap();
        assert_eq!(a["error"]["code"], JsonRpcError::PARSE_ERROR);
        assert_eq!(a["id"], Value::Null);
    }

    #[test]
    fn client_response_wird_ignoriert() {
        let (d, ctx) = dispatcher();
        assert!(antwort(&d, &ctx, r#"{"jsonrpc":"2.0","result":"ok","id":9}"#).is_none());
    }

    #[test]
    fn bewegung_bei_killswitch_verworfen() {
        let (d, ctx) = dispatcher();
        d.state().killswitch.setzen(true, None);
        let a = antwort(&d, &ctx, r#"{"jsonrpc":"2.0","method":"bewegen","params":[4],"id":1}"#).unwrap();
        assert_eq!(a["result"], Value::Null);
        assert!(a.get("error").is_none());

        // Ungesperrte Methoden laufen weiter
        let a = antwort(&d, &ctx, r#"{"jsonrpc":"2.0","method":"echo","params":[4],"id":2}"#).unwrap();
        assert_eq!(a["result"], 4);

        let metriken = d.state().metriken.exportieren().unwrap();
        assert!(metriken.contains("rover_rpc_gated_total{method=\"bewegen\"} 1"));
    }

    #[test]
    fn bewegung_bei_gesperrter_ip_verworfen() {
        let (d, ctx) = dispatcher();
        d.state().policy.verbindung_hinzufuegen("10.0.0.1", ctx.client_id);
        d.state().policy.ip_sperren("10.0.0.1");
        let a = antwort(&d, &ctx, r#"{"jsonrpc":"2.0","method":"bewegen","params":[4],"id":1}"#).unwrap();
        assert_eq!(a["result"], Value::Null);

        d.state().policy.ip_freigeben("10.0.0.1");
        let a = antwort(&d, &ctx, r#"{"jsonrpc":"2.0","method":"bewegen","params":[4],"id":1}"#).unwrap();
        assert_eq!(a["result"], 4);
    }
}
