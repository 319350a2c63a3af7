//! Connection Policy – IP-Gruppen und IP-Sperren
//!
//! Clients werden nach ihrer IP-Adresse gruppiert. Eine gesperrte IP trennt
//! keine Verbindungen, sondern sperrt Bewegungsbefehle und die
//! Fahrerrolle fuer alle Clients dieser Adresse. Gesperrte Gruppen bleiben
//! auch ohne Clients erhalten, damit neue Verbindungen von dort ebenfalls
//! gesperrt sind.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use rover_core::{ClientId, RoverEvent};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::arbitration::DriverLease;

/// Clients einer IP-Adresse (Ausgabeform fuer die Entwickleransicht)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionGroup {
    pub ip_address: String,
    pub client_ids: Vec<ClientId>,
}

#[derive(Debug, Default)]
struct Gruppe {
    client_ids: BTreeSet<ClientId>,
    gesperrt: bool,
}

#[derive(Debug, Default)]
struct PolicyZustand {
    gruppen: BTreeMap<String, Gruppe>,
    client_ips: HashMap<ClientId, String>,
}

impl PolicyZustand {
    fn gruppen_mit(&self, gesperrt: bool) -> Vec<ConnectionGroup> {
        self.gruppen
            .iter()
            .filter(|(_, g)| g.gesperrt == gesperrt)
            .filter(|(_, g)| gesperrt || !g.client_ids.is_empty())
            .map(|(ip, g)| ConnectionGroup {
                ip_address: ip.clone(),
                client_ids: g.client_ids.iter().copied().collect(),
            })
            .collect()
    }
}

/// IP-basierte Verbindungsrichtlinie
///
/// Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct ConnectionPolicy {
    inner: Arc<PolicyInner>,
}

struct PolicyInner {
    zustand: RwLock<PolicyZustand>,
    events: broadcast::Sender<RoverEvent>,
}

impl ConnectionPolicy {
    pub fn neu(events: broadcast::Sender<RoverEvent>) -> Self {
        Self {
            inner: Arc::new(PolicyInner {
                zustand: RwLock::new(PolicyZustand::default()),
                events,
            }),
        }
    }

    /// Ordnet einen Client seiner IP-Adresse zu
    pub fn verbindung_hinzufuegen(&self, ip: &str, client_id: ClientId) {
        let mut z = self.inner.zustand.write();
        z.gruppen
            .entry(ip.to_string())
            .or_default()
            .client_ids
            .insert(client_id);
        z.client_ips.insert(client_id, ip.to_string());
    }

    /// Entfernt einen Client aus seiner Gruppe
    ///
    /// Leere, nicht gesperrte Gruppen werden entfernt.
    pub fn verbindung_entfernen(&self, client_id: ClientId) {
        let mut z = self.inner.zustand.write();
        let Some(ip) = z.client_ips.remove(&client_id) else {
            return;
        };
        let leer = match z.gruppen.get_mut(&ip) {
            Some(gruppe) => {
                gruppe.client_ids.remove(&client_id);
                gruppe.client_ids.is_empty() && !gruppe.gesperrt
            }
            None => false,
        };
        if leer {
            z.gruppen.remove(&ip);
        }
    }

    /// Sperrt eine IP-Adresse; `true` wenn sie vorher frei war
    pub fn ip_sperren(&self, ip: &str) -> bool {
        let geaendert = {
            let mut z = self.inner.zustand.write();
            let gruppe = z.gruppen.entry(ip.to_string()).or_default();
            !std::mem::replace(&mut gruppe.gesperrt, true)
        };
        if geaendert {
            tracing::info!(ip = %ip, "IP gesperrt");
            let _ = self.inner.events.send(RoverEvent::IpBlockiert { ip: ip.to_string() });
        }
        geaendert
    }

    /// Gibt eine IP-Adresse frei; `true` wenn sie vorher gesperrt war
    pub fn ip_freigeben(&self, ip: &str) -> bool {
        let geaendert = {
            let mut z = self.inner.zustand.write();
            let (geaendert, leer) = match z.gruppen.get_mut(ip) {
                Some(gruppe) => (
                    std::mem::replace(&mut gruppe.gesperrt, false),
                    gruppe.client_ids.is_empty(),
                ),
                None => (false, false),
            };
            if leer {
                z.gruppen.remove(ip);
            }
            geaendert
        };
        if geaendert {
            tracing::info!(ip = %ip, "IP freigegeben");
            let _ = self
                .inner
                .events
                .send(RoverEvent::IpFreigegeben { ip: ip.to_string() });
        }
        geaendert
    }

    pub fn ist_gesperrt(&self, ip: &str) -> bool {
        self.inner
            .zustand
            .read()
            .gruppen
            .get(ip)
            .is_some_and(|g| g.gesperrt)
    }

    /// Prueft die IP des Clients; unbekannte Clients gelten als nicht gesperrt
    pub fn client_gesperrt(&self, client_id: ClientId) -> bool {
        let z = self.inner.zustand.read();
        z.client_ips
            .get(&client_id)
            .and_then(|ip| z.gruppen.get(ip))
            .is_some_and(|g| g.gesperrt)
    }

    pub fn ip_von_client(&self, client_id: ClientId) -> Option<String> {
        self.inner.zustand.read().client_ips.get(&client_id).cloned()
    }

    /// Alle Clients einer IP-Adresse
    pub fn clients_mit_ip(&self, ip: &str) -> Vec<ClientId> {
        self.inner
            .zustand
            .read()
            .gruppen
            .get(ip)
            .map(|g| g.client_ids.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn gesperrte_verbindungen(&self) -> Vec<ConnectionGroup> {
        self.inner.zustand.read().gruppen_mit(true)
    }

    pub fn freie_verbindungen(&self) -> Vec<ConnectionGroup> {
        self.inner.zustand.read().gruppen_mit(false)
    }

    /// Entzieht dem aktuellen Fahrer die Rolle wenn seine IP gesperrt ist
    ///
    /// Liefert den Client dem die Rolle entzogen wurde.
    pub fn fahrer_freigeben_wenn_gesperrt(&self, fahrer: &DriverLease) -> Option<ClientId> {
        let freigegeben = fahrer.freigeben_wenn(|id| self.client_gesperrt(id));
        if let Some(id) = freigegeben {
            tracing::info!(client_id = %id, "Fahrerrolle entzogen – IP gesperrt");
        }
        freigegeben
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
