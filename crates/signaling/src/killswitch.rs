//! Killswitch – globale Sperre aller Bewegungsbefehle
//!
//! Zwei Zustaende, `Deaktiviert` (Start) und `Aktiviert`. Beim Aktivieren
//! wird der Rover gestoppt bevor das Flag gesetzt wird.
//!
//! Bewegungsbefehle laufen ueber `wenn_frei`: Pruefung und Ausfuehrung
//! halten die Lesesperre, das Aktivieren braucht die Schreibsperre. Damit
//! kann kein Befehl zwischen "Killswitch frei" und "Motor gesetzt"
//! durchrutschen.

use std::sync::Arc;

use parking_lot::RwLock;
use rover_core::ClientId;
use rover_motion::{DriveController, Fahrergebnis};
use rover_observability::RoverMetrics;
use rover_protocol::{methods, JsonRpcRequest};
use serde_json::Value;

use crate::registry::SessionRegistry;

/// Globaler Killswitch
///
/// Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct Killswitch {
    inner: Arc<KillswitchInner>,
}

struct KillswitchInner {
    aktiv: RwLock<bool>,
    sitzungen: SessionRegistry,
    fahrt: Arc<DriveController>,
    metriken: RoverMetrics,
}

impl Killswitch {
    pub fn neu(sitzungen: SessionRegistry, fahrt: Arc<DriveController>, metriken: RoverMetrics) -> Self {
        metriken.killswitch_enabled.set(0);
        Self {
            inner: Arc::new(KillswitchInner {
                aktiv: RwLock::new(false),
                sitzungen,
                fahrt,
                metriken,
            }),
        }
    }

    pub fn ist_aktiv(&self) -> bool {
        *self.inner.aktiv.read()
    }

    /// Fuehrt `aktion` aus wenn der Killswitch nicht aktiv ist
    ///
    /// Liefert `None` wenn die Aktion gesperrt wurde.
    pub fn wenn_frei<T>(&self, aktion: impl FnOnce() -> T) -> Option<T> {
        let aktiv = self.inner.aktiv.read();
        if *aktiv {
            tracing::trace!("Aktion durch Killswitch gesperrt");
            return None;
        }
        Some(aktion())
    }

    /// Setzt den Killswitch
    ///
    /// Sendet immer `updateKillswitchEnabled [zustand]` an alle Clients und
    /// zusaetzlich `showAlertNotification [nachricht]` wenn sich der Zustand
    /// tatsaechlich geaendert hat. Liefert `true` bei Aenderung.
    pub fn setzen(&self, neu: bool, nachricht: Option<&str>) -> bool {
        let mut aktiv = self.inner.aktiv.write();
        let geaendert = *aktiv != neu;

        if neu && !*aktiv {
            let ergebnis = self.inner.fahrt.stoppen();
            if ergebnis == Fahrergebnis::Fehlgeschlagen {
                tracing::error!("Rover konnte beim Aktivieren des Killswitch nicht gestoppt werden");
            }
        }
        *aktiv = neu;
        self.inner.metriken.killswitch_enabled.set(i64::from(neu));
        tracing::info!(aktiv = neu, geaendert, "Killswitch gesetzt");

        // Unter der Schreibsperre, damit die Clients die Zustaende in der
        // Reihenfolge der Aenderungen sehen
        self.inner.sitzungen.an_alle_senden(&zustand_notification(neu));
        if geaendert {
            self.inner.sitzungen.an_alle_senden(&alarm_notification(nachricht));
        }
        geaendert
    }

    /// Sendet `updateKillswitchEnabled [zustand]` an einen Client
    pub fn zustand_senden(&self, client_id: ClientId) -> bool {
        let aktiv = self.ist_aktiv();
        self.inner
            .sitzungen
            .an_client_senden(client_id, &zustand_notification(aktiv))
    }

    /// Meldet einem neuen Client einen aktiven Killswitch
    pub fn benachrichtigen_wenn_aktiv(&self, client_id: ClientId, nachricht: &str) -> bool {
        if !self.ist_aktiv() {
            return false;
        }
        self.inner
            .sitzungen
            .an_client_senden(client_id, &alarm_notification(Some(nachricht)))
    }
}

fn zustand_notification(aktiv: bool) -> JsonRpcRequest {
    JsonRpcRequest::notification(methods::UPDATE_KILLSWITCH_ENABLED, vec![Value::Bool(aktiv)])
}

fn alarm_notification(nachricht: Option<&str>) -> JsonRpcRequest {
    let param = nachricht.map_or(Value::Null, |n| Value::String(n.to_string()));
    JsonRpcRequest::notification(methods::SHOW_ALERT_NOTIFICATION, vec![param])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ConnectionPolicy;
    use crate::registry::NeueSitzung;
    use rover_motion::{MotorSetting, ProtokollAntrieb};
    use tokio::sync::broadcast;

    struct Aufbau {
        killswitch: Killswitch,
        sitzungen: SessionRegistry,
        fahrt: Arc<DriveController>,
    }

    fn aufbau() -> Aufbau {
        let (events, _) = broadcast::channel(64);
        let metriken = RoverMetrics::neu().unwrap();
        let sitzungen = SessionRegistry::neu(
            ConnectionPolicy::neu(events.clone()),
            events,
            metriken.clone(),
            64,
        );
        let fahrt = Arc::new(DriveController::neu(Arc::new(ProtokollAntrieb::neu())));
        Aufbau {
            killswitch: Killswitch::neu(sitzungen.clone(), fahrt.clone(), metriken),
            sitzungen,
            fahrt,
        }
    }

    fn methoden(sitzung: &mut NeueSitzung) -> Vec<(String, Value)> {
        let mut liste = Vec::new();
        while let Ok(text) = sitzung.empfaenger.try_recv() {
            let v: Value = serde_json::from_str(&text).unwrap();
            liste.push((v["method"].as_str().unwrap().to_string(), v["params"][0].clone()));
        }
        liste
    }

    #[test]
    fn aktivieren_stoppt_und_sendet_beide_nachrichten() {
        let a = aufbau();
        let mut client = a.sitzungen.client_hinzufuegen("10.0.0.1");
        methoden(&mut client);
        a.fahrt.vorwaerts_fahren();

        assert!(a.killswitch.setzen(true, Some("Wartung")));
        assert_eq!(a.fahrt.aktuelles_setting(), MotorSetting::STOPP);
        assert_eq!(
            methoden(&mut client),
            vec![
                ("updateKillswitchEnabled".to_string(), Value::Bool(true)),
                ("showAlertNotification".to_string(), Value::from("Wartung")),
            ]
        );
    }

    #[test]
    fn erneutes_aktivieren_sendet_nur_zustand() {
        let a = aufbau();
        let mut client = a.sitzungen.client_hinzufuegen("10.0.0.1");
        a.killswitch.setzen(true, Some("Wartung"));
        methoden(&mut client);

        assert!(!a.killswitch.setzen(true, Some("nochmal")));
        assert_eq!(
            methoden(&mut client),
            vec![("updateKillswitchEnabled".to_string(), Value::Bool(true))]
        );
    }

    #[test]
    fn gesperrte_aktion_wird_nicht_ausgefuehrt() {
        let a = aufbau();
        a.killswitch.setzen(true, None);

        let ergebnis = a.killswitch.wenn_frei(|| a.fahrt.vorwaerts_fahren());
        assert!(ergebnis.is_none());
        assert_eq!(a.fahrt.aktuelles_setting(), MotorSetting::STOPP);

        assert!(a.killswitch.setzen(false, Some("weiter")));
        assert!(a.killswitch.wenn_frei(|| a.fahrt.vorwaerts_fahren()).is_some());
        assert_eq!(a.fahrt.aktuelles_setting(), MotorSetting::VORWAERTS);
    }

    #[test]
    fn neuer_client_wird_nur_bei_aktivem_killswitch_benachrichtigt() {
        let a = aufbau();
        let mut client = a.sitzungen.client_hinzufuegen("10.0.0.1");
        methoden(&mut client);

        assert!(!a.killswitch.benachrichtigen_wenn_aktiv(client.client_id, "gesperrt"));
        assert!(methoden(&mut client).is_empty());

        a.killswitch.setzen(true, None);
        methoden(&mut client);
        assert!(a.killswitch.benachrichtigen_wenn_aktiv(client.client_id, "gesperrt"));
        assert_eq!(
            methoden(&mut client),
            vec![("showAlertNotification".to_string(), Value::from("gesperrt"))]
        );
    }
}
