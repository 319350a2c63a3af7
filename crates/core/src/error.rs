//! Fehlertypen fuer das Rover-Backend
//!
//! Gemeinsamer Fehler fuer Transport und Hardware. Die Crates definieren
//! eigene Fehler und konvertieren bei Bedarf hierher.

use thiserror::Error;

/// Globaler Result-Alias
pub type Result<T> = std::result::Result<T, RoverError>;

/// Crate-uebergreifende Fehler im Rover-System
#[derive(Debug, Error)]
pub enum RoverError {
    // --- Verbindung ---
    #[error("Verbindung getrennt: {0}")]
    Getrennt(String),

    #[error("Senden fehlgeschlagen: {0}")]
    Senden(String),

    // --- Hardware ---
    #[error("Hardwarefehler: {0}")]
    Hardware(#[from] std::io::Error),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        let e = RoverError::Senden("Queue voll".into());
        assert_eq!(e.to_string(), "Senden fehlgeschlagen: Queue voll");
    }

    #[test]
    fn io_fehler_wird_hardwarefehler() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "i2c");
        let e: RoverError = io.into();
        assert!(matches!(e, RoverError::Hardware(_)));
    }
}
