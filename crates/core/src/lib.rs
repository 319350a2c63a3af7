//! rover-core – Gemeinsame Typen, Events und Fehlertypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen Rover-Crates gemeinsam genutzt werden.

pub mod error;
pub mod event;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{Result, RoverError};
pub use event::RoverEvent;
pub use types::ClientId;
