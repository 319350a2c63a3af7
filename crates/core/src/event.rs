//! Interne Ereignisse
//!
//! Session-Registry und Connection-Policy melden Aenderungen ueber diese
//! Events. Beobachter (Entwickleransicht, Fahrer-Arbitrierung) abonnieren
//! sie ueber einen tokio-Broadcast-Kanal im Signaling-Crate.

use crate::types::ClientId;
use serde::{Deserialize, Serialize};

/// Alle systemweiten Ereignisse die ueber den Event-Kanal fliessen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoverEvent {
    /// Ein Client hat sich verbunden
    ClientVerbunden { client_id: ClientId, ip: String },
    /// Geschlossene Sitzungen wurden entfernt
    ClientsGetrennt { client_ids: Vec<ClientId> },
    /// Browser/Betriebssystem eines Clients wurden gemeldet
    ClientInformationGeaendert { client_id: ClientId },
    /// Eine IP-Adresse wurde gesperrt
    IpBlockiert { ip: String },
    /// Eine IP-Adresse wurde freigegeben
    IpFreigegeben { ip: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_ist_serde_kompatibel() {
        let event = RoverEvent::ClientsGetrennt {
            client_ids: vec![ClientId(5000), ClientId(5002)],
        };
        let json = serde_json::to_string(&event).unwrap();
        let zurueck: RoverEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(zurueck, event);
    }
}
