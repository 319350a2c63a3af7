//! Fehlertypen fuer den Signaling-Service

use rover_motion::MotionError;
use rover_protocol::{JsonRpcError, ProtocolError};
use thiserror::Error;

/// Fehlertyp fuer den Signaling-Service
#[derive(Debug, Error)]
pub enum SignalingError {
    /// IO-Fehler (Listener, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Ungueltige JSON-RPC-Nachricht oder Parameter
    #[error("Protokollfehler: {0}")]
    Protokoll(#[from] ProtocolError),

    /// Hardwarefehler aus der Bewegungssteuerung
    #[error("Bewegungsfehler: {0}")]
    Motion(#[from] MotionError),

    /// Interner Fehler
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl SignalingError {
    /// Erstellt einen internen Fehler
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }
}

impl From<SignalingError> for JsonRpcError {
    fn from(e: SignalingError) -> Self {
        match e {
            SignalingError::Protokoll(p) => p.into(),
            andere => JsonRpcError::internal_error(andere.to_string()),
        }
    }
}

/// Result-Typ fuer den Signaling-Service
pub type SignalingResult<T> = Result<T, SignalingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bewegungsfehler_wird_internal_error() {
        let fehler: JsonRpcError =
            SignalingError::from(MotionError::NichtVerfuegbar("servo".into())).into();
        assert_eq!(fehler.code, JsonRpcError::INTERNAL_ERROR);
    }

    #[test]
    fn protokollfehler_behaelt_code() {
        let fehler: JsonRpcError =
            SignalingError::from(ProtocolError::UngueltigeAnfrage("x".into())).into();
        assert_eq!(fehler.code, JsonRpcError::from(ProtocolError::UngueltigeAnfrage("x".into())).code);
    }
}
