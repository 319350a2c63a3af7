//! Fahrer-Arbitrierung
//!
//! Genau ein Client darf die Fahrerrolle halten. Die Rolle ist beratend:
//! Fahrbefehle werden nicht gegen sie geprueft, sie dient der Koordination
//! der Web-Clients (`updateRoverState`).
//!
//! ```text
//! Leer --erwerben(A)--> Gehalten(A) --freigeben(A)--> Leer
//!                       Gehalten(A) --erwerben(B)--> Gehalten(A)   (abgelehnt)
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use rover_core::ClientId;

use crate::registry::SessionRegistry;

/// Einzelplatz-Sperre fuer die Fahrerrolle
///
/// Clone teilt den inneren Zustand.
#[derive(Clone, Default)]
pub struct DriverLease {
    inhaber: Arc<Mutex<Option<ClientId>>>,
}

impl DriverLease {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Versucht die Rolle zu erwerben
    ///
    /// `true` wenn `client_id` danach Fahrer ist (auch wenn er es schon war).
    pub fn erwerben(&self, client_id: ClientId) -> bool {
        let mut inhaber = self.inhaber.lock();
        match *inhaber {
            None => {
                *inhaber = Some(client_id);
                tracing::info!(client_id = %client_id, "Fahrerrolle vergeben");
                true
            }
            Some(aktuell) if aktuell == client_id => true,
            Some(aktuell) => {
                tracing::debug!(
                    client_id = %client_id,
                    fahrer = %aktuell,
                    "Fahrerrolle bereits vergeben"
                );
                false
            }
        }
    }

    /// Gibt die Rolle frei wenn `client_id` sie haelt; `true` bei Aenderung
    pub fn freigeben(&self, client_id: ClientId) -> bool {
        self.freigeben_wenn(|id| id == client_id).is_some()
    }

    /// Gibt die Rolle frei wenn `bedingung` fuer den Inhaber zutrifft
    ///
    /// Pruefung und Freigabe laufen unter derselben Sperre.
    pub fn freigeben_wenn(&self, bedingung: impl FnOnce(ClientId) -> bool) -> Option<ClientId> {
        let mut inhaber = self.inhaber.lock();
        match *inhaber {
            Some(id) if bedingung(id) => {
                *inhaber = None;
                tracing::info!(client_id = %id, "Fahrerrolle freigegeben");
                Some(id)
            }
            _ => None,
        }
    }

    /// Aktueller Fahrer, `None` wenn die Rolle frei ist
    pub fn aktueller_fahrer(&self) -> Option<ClientId> {
        *self.inhaber.lock()
    }

    /// Entzieht die Rolle wenn der Inhaber keine Sitzung mehr hat
    pub fn verfuegbarkeit_pruefen(&self, sitzungen: &SessionRegistry) -> Option<ClientId> {
        self.freigeben_wenn(|id| !sitzungen.ist_verbunden(id))
    }
}
