//! Fehlertypen fuer das Protokoll-Crate

use thiserror::Error;

use crate::params::ParamTyp;

/// Fehler beim Lesen oder Pruefen einer JSON-RPC-Nachricht
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Kein gueltiges JSON
    #[error("JSON-Fehler: {0}")]
    Json(#[from] serde_json::Error),

    /// Gueltiges JSON, aber kein gueltiges JSON-RPC-Objekt
    #[error("Ungueltige Anfrage: {0}")]
    UngueltigeAnfrage(String),

    /// Falsche Anzahl positionaler Parameter
    #[error("Falsche Parameteranzahl: erwartet {min}..={max}, erhalten {erhalten}")]
    ParameterAnzahl {
        min: usize,
        max: usize,
        erhalten: usize,
    },

    /// Parameter an Position `index` hat den falschen Typ
    #[error("Parameter {index}: erwartet {erwartet:?}")]
    ParameterTyp { index: usize, erwartet: ParamTyp },
}

impl ProtocolError {
    /// true wenn der Fehler die Parameterliste betrifft (JSON-RPC -32602)
    pub fn ist_parameterfehler(&self) -> bool {
        matches!(
            self,
            Self::ParameterAnzahl { .. } | Self::ParameterTyp { .. }
        )
    }
}

/// Result-Typ fuer das Protokoll-Crate
pub type ProtocolResult<T> = Result<T, ProtocolError>;
