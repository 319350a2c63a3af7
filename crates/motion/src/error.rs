//! Fehlertypen der Bewegungssteuerung

use rover_core::RoverError;
use thiserror::Error;

/// Fehler beim Zugriff auf Motoren, Servos, Sensoren oder Kamera
#[derive(Debug, Error)]
pub enum MotionError {
    #[error("Hardware-IO fehlgeschlagen: {0}")]
    Io(#[from] std::io::Error),

    #[error("Geraet nicht verfuegbar: {0}")]
    NichtVerfuegbar(String),

    #[error("Eintrag nicht gefunden: {0}")]
    EintragNichtGefunden(String),
}

pub type MotionResult<T> = Result<T, MotionError>;

impl From<MotionError> for RoverError {
    fn from(e: MotionError) -> Self {
        match e {
            MotionError::Io(io) => RoverError::Hardware(io),
            andere => RoverError::Intern(andere.to_string()),
        }
    }
}
