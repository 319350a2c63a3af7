//! JSON-RPC 2.0 Nachrichten
//!
//! Web-Clients senden Requests (mit `id`) und Notifications (ohne `id`) als
//! WebSocket-Textframes. Das Backend antwortet auf Requests mit einer
//! Response und sendet eigene Notifications (`setClientId`,
//! `incomingNotification`, ...) an einzelne oder alle Clients.

use rover_core::ClientId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ProtocolError, ProtocolResult};
use crate::methods;

/// Protokollversion im Feld `jsonrpc`
pub const JSONRPC_VERSION: &str = "2.0";

// ---------------------------------------------------------------------------
// Request / Notification
// ---------------------------------------------------------------------------

/// Request oder Notification
///
/// Die Feldreihenfolge (`method`, `params`, `jsonrpc`) bestimmt die
/// Serialisierung der ausgehenden Notifications und wird von bestehenden
/// Web-Clients so erwartet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub method: String,
    #[serde(default)]
    pub params: Vec<Value>,
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

impl JsonRpcRequest {
    /// Erstellt eine Notification (ohne `id`)
    pub fn notification(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            params,
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: None,
        }
    }

    /// `incomingNotification [text]` – Textnachricht an den Client
    pub fn text_notification(text: impl Into<String>) -> Self {
        Self::notification(
            methods::INCOMING_NOTIFICATION,
            vec![Value::String(text.into())],
        )
    }

    /// `setClientId [id]` – teilt dem Client seine Kennung mit
    pub fn client_id_notification(client_id: ClientId) -> Self {
        Self::notification(methods::SET_CLIENT_ID, vec![Value::from(client_id.inner())])
    }

    /// true wenn keine Antwort erwartet wird
    pub fn ist_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Serialisiert die Nachricht als JSON-Text
    pub fn to_json(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ---------------------------------------------------------------------------
// Response / Error
// ---------------------------------------------------------------------------

/// Fehlerobjekt einer Response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    pub fn neu(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn invalid_request(detail: impl Into<String>) -> Self {
        Self::neu(Self::INVALID_REQUEST, detail)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::neu(
            Self::METHOD_NOT_FOUND,
            format!("Methode nicht gefunden: {method}"),
        )
    }

    pub fn invalid_params(detail: impl Into<String>) -> Self {
        Self::neu(Self::INVALID_PARAMS, detail)
    }

    pub fn internal_error(detail: impl Into<String>) -> Self {
        Self::neu(Self::INTERNAL_ERROR, detail)
    }
}

impl From<ProtocolError> for JsonRpcError {
    fn from(e: ProtocolError) -> Self {
        let code = match &e {
            ProtocolError::Json(_) => Self::PARSE_ERROR,
            ProtocolError::UngueltigeAnfrage(_) => Self::INVALID_REQUEST,
            ProtocolError::ParameterAnzahl { .. } | ProtocolError::ParameterTyp { .. } => {
                Self::INVALID_PARAMS
            }
        };
        Self::neu(code, e.to_string())
    }
}

/// Antwort auf einen Request
///
/// Genau eines der Felder `result` und `error` ist gesetzt. Ein
/// erfolgreiches `null`-Ergebnis wird als `"result": null` serialisiert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Value,
}

impl JsonRpcResponse {
    pub fn erfolg(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn fehler(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(error),
            id,
        }
    }

    pub fn to_json(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ---------------------------------------------------------------------------
// Eingehende Frames
// ---------------------------------------------------------------------------

/// Ergebnis des Parsens eines eingehenden Textframes
#[derive(Debug, Clone, PartialEq)]
pub enum Eingehend {
    /// Request oder Notification
    Aufruf(JsonRpcRequest),
    /// Response eines Clients auf eine Server-Nachricht, wird ignoriert
    Antwort,
}

impl Eingehend {
    /// Parst einen Textframe
    ///
    /// Bei Fehlern wird eine sendefertige Fehler-Response geliefert. Ob sie
    /// gesendet wird entscheidet der Aufrufer: auf Notifications wird nie
    /// geantwortet. Die `id` der Fehler-Response ist `null` wenn sie nicht
    /// ermittelt werden konnte.
    pub fn parsen(text: &str) -> Result<Self, FehlerAntwort> {
        let wert: Value = serde_json::from_str(text).map_err(|e| FehlerAntwort {
            antwort: JsonRpcResponse::fehler(Value::Null, ProtocolError::Json(e).into()),
            war_notification: false,
        })?;

        let objekt = match wert {
            Value::Object(o) => o,
            _ => {
                return Err(FehlerAntwort::ungueltig(
                    Value::Null,
                    false,
                    "Nachricht ist kein JSON-Objekt",
                ))
            }
        };

        Self::aus_objekt(objekt)
    }

    fn aus_objekt(mut objekt: Map<String, Value>) -> Result<Self, FehlerAntwort> {
        let id = objekt.remove("id");
        let war_notification = id.is_none();
        let antwort_id = id.clone().unwrap_or(Value::Null);

        if let Some(id) = &id {
            if !(id.is_string() || id.is_number() || id.is_null()) {
                return Err(FehlerAntwort::ungueltig(
                    Value::Null,
                    false,
                    "id muss String, Zahl oder null sein",
                ));
            }
        }

        match objekt.get("jsonrpc").and_then(Value::as_str) {
            Some(JSONRPC_VERSION) => {}
            _ => {
                return Err(FehlerAntwort::ungueltig(
                    antwort_id,
                    war_notification,
                    "jsonrpc muss \"2.0\" sein",
                ))
            }
        }

        if !objekt.contains_key("method")
            && (objekt.contains_key("result") || objekt.contains_key("error"))
        {
            return Ok(Self::Antwort);
        }

        let method = match objekt.remove("method") {
            Some(Value::String(m)) => m,
            _ => {
                return Err(FehlerAntwort::ungueltig(
                    antwort_id,
                    war_notification,
                    "method fehlt oder ist kein String",
                ))
            }
        };

        let params = match objekt.remove("params") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(a)) => a,
            Some(_) => {
                return Err(FehlerAntwort {
                    antwort: JsonRpcResponse::fehler(
                        antwort_id,
                        JsonRpcError::invalid_params("nur positionale Parameter werden unterstuetzt"),
                    ),
                    war_notification,
                })
            }
        };

        Ok(Self::Aufruf(JsonRpcRequest {
            method,
            params,
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
        }))
    }
}

/// Fehler-Response fuer einen Frame der nicht geparst werden konnte
#[derive(Debug, Clone, PartialEq)]
pub struct FehlerAntwort {
    pub antwort: JsonRpcResponse,
    /// true wenn der Frame als Notification erkannt wurde (keine Antwort senden)
    pub war_notification: bool,
}

impl FehlerAntwort {
    fn ungueltig(id: Value, war_notification: bool, detail: &str) -> Self {
        Self {
            antwort: JsonRpcResponse::fehler(id, JsonRpcError::invalid_request(detail)),
            war_notification,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
