//! Gemeinsame Identifikationstypen fuer das Rover-Backend
//!
//! Client-IDs sind prozessweit eindeutige Ganzzahlen. Das Newtype-Pattern
//! verhindert Verwechslungen mit anderen Zahlen (Geschwindigkeiten, Winkel).

use serde::{Deserialize, Serialize};

/// Eindeutige Client-ID, vergeben von der Session-Registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub u32);

impl ClientId {
    /// Erste vergebene Client-ID eines Prozesses
    pub const ERSTE: ClientId = ClientId(5000);

    /// Gibt den inneren Zahlenwert zurueck
    pub fn inner(&self) -> u32 {
        self.0
    }

    /// Wire-Darstellung einer optionalen ID (`-1` steht fuer "keine")
    pub fn als_wire_wert(id: Option<ClientId>) -> i64 {
        id.map(|id| i64::from(id.0)).unwrap_or(-1)
    }

    /// Liest eine ID aus einem JSON-RPC-Parameter (negative Werte = keine)
    pub fn aus_wire_wert(wert: i64) -> Option<ClientId> {
        u32::try_from(wert).ok().map(ClientId)
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "client:{}", self.0)
    }
}
