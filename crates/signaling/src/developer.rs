//! Entwickleransicht – Beobachter fuer Sitzungs-, Policy- und Kollisionsdaten
//!
//! Zwei Hintergrund-Tasks halten die Web-Clients aktuell:
//!
//! - `entwickleransicht_starten` abonniert die `RoverEvent`s und verteilt
//!   nach jeder Aenderung `updateConnectedUsers [verbunden, gesperrt]`.
//!   Nach entfernten Sitzungen wird zuerst die Fahrerrolle geprueft.
//! - `kollisionsanzeige_starten` folgt dem Kollisions-Feed und verteilt
//!   `updateCollisionInformation` wenn sich die Sensorflags aendern.

use std::sync::Arc;

use rover_core::RoverEvent;
use rover_motion::CollisionSnapshot;
use rover_protocol::{methods, JsonRpcRequest};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::registry::ClientSession;
use crate::server_state::RoverState;

// ---------------------------------------------------------------------------
// Verbundene Benutzer
// ---------------------------------------------------------------------------

/// Anzeigezeile eines Clients in der Entwickleransicht
pub fn anzeigezeile(sitzung: &ClientSession) -> String {
    let zusatz = match (&sitzung.browser, &sitzung.os) {
        (Some(browser), Some(os)) => format!("{browser} {os}"),
        (Some(browser), None) => browser.clone(),
        (None, Some(os)) => os.clone(),
        (None, None) => String::new(),
    };
    format!(
        "IP Address: {}   ClientID: {}  {}",
        sitzung.remote_address,
        sitzung.id.inner(),
        zusatz
    )
}

/// Baut `updateConnectedUsers [zeilen, gesperrte Gruppen]`
pub fn benutzerliste(state: &RoverState) -> JsonRpcRequest {
    let zeilen: Vec<Value> = state
        .sitzungen
        .sitzungen()
        .iter()
        .map(|s| Value::String(anzeigezeile(s)))
        .collect();
    let gesperrt = serde_json::to_value(state.policy.gesperrte_verbindungen()).unwrap_or_else(|e| {
        tracing::error!(fehler = %e, "Gesperrte Verbindungen nicht serialisierbar");
        Value::Array(Vec::new())
    });
    JsonRpcRequest::notification(
        methods::UPDATE_CONNECTED_USERS,
        vec![Value::Array(zeilen), gesperrt],
    )
}

/// Verarbeitet ein Event und aktualisiert alle Clients
pub fn event_verarbeiten(state: &RoverState, event: &RoverEvent) {
    if let RoverEvent::ClientsGetrennt { client_ids } = event {
        tracing::debug!(anzahl = client_ids.len(), "Sitzungen entfernt – Fahrerrolle pruefen");
        if state.fahrer.verfuegbarkeit_pruefen(&state.sitzungen).is_some() {
            state.rover_zustand_senden();
        }
    }
    state.sitzungen.an_alle_senden(&benutzerliste(state));
}

/// Startet den Beobachter der Entwickleransicht
pub fn entwickleransicht_starten(
    state: Arc<RoverState>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let mut events = state.sitzungen.events_abonnieren();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                empfangen = events.recv() => match empfangen {
                    Ok(event) => event_verarbeiten(&state, &event),
                    Err(broadcast::error::RecvError::Lagged(verpasst)) => {
                        tracing::warn!(verpasst, "Entwickleransicht hinkt hinterher");
                        if state.fahrer.verfuegbarkeit_pruefen(&state.sitzungen).is_some() {
                            state.rover_zustand_senden();
                        }
                        state.sitzungen.an_alle_senden(&benutzerliste(&state));
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::debug!("Entwickleransicht beendet");
    })
}

// ---------------------------------------------------------------------------
// Kollisionsanzeige
// ---------------------------------------------------------------------------

/// Nutzlast von `updateCollisionInformation`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KollisionsAnzeige {
    pub front_left: bool,
    pub front_right: bool,
    pub back_left: bool,
    pub back_right: bool,
}

impl From<&CollisionSnapshot> for KollisionsAnzeige {
    fn from(s: &CollisionSnapshot) -> Self {
        Self {
            front_left: s.front_left,
            front_right: s.front_right,
            back_left: s.back_left,
            back_right: s.back_right,
        }
    }
}

fn kollision_senden(state: &RoverState, anzeige: KollisionsAnzeige) {
    match serde_json::to_value(anzeige) {
        Ok(wert) => {
            state.sitzungen.an_alle_senden(&JsonRpcRequest::notification(
                methods::UPDATE_COLLISION_INFORMATION,
                vec![wert],
            ));
        }
        Err(e) => tracing::error!(fehler = %e, "Kollisionsanzeige nicht serialisierbar"),
    }
}

/// Startet die Kollisionsanzeige
///
/// Uebertraegt ausserdem die Sicherheitsstopps der Fahrsteuerung in die
/// Metriken.
pub fn kollisionsanzeige_starten(
    state: Arc<RoverState>,
    mut feed: watch::Receiver<CollisionSnapshot>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut zuletzt = KollisionsAnzeige::from(&*feed.borrow_and_update());
        let mut gezaehlte_stopps = 0u64;
        loop {
            tokio::select! {
                res = feed.changed() => {
                    if res.is_err() {
                        break;
                    }
                    let anzeige = KollisionsAnzeige::from(&*feed.borrow_and_update());
                    if anzeige != zuletzt {
                        zuletzt = anzeige;
                        kollision_senden(&state, anzeige);
                    }

                    let stopps = state.fahrt.sicherheitsstopps();
                    if stopps > gezaehlte_stopps {
                        state.metriken.safety_stops_total.inc_by(stopps - gezaehlte_stopps);
                        gezaehlte_stopps = stopps;
                    }
                }
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::debug!("Kollisionsanzeige beendet");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rover_motion::SensorWerte;
    use rover_observability::RoverMetrics;
    use std::time::Duration;

    use crate::registry::NeueSitzung;

    fn leeren(sitzung: &mut NeueSitzung) -> Vec<Value> {
        let mut liste = Vec::new();
        while let Ok(text) = sitzung.empfaenger.try_recv() {
            liste.push(serde_json::from_str(&text).unwrap());
        }
        liste
    }

    #[test]
    fn anzeigezeile_mit_client_informationen() {
        let state = RoverState::simuliert(RoverMetrics::neu().unwrap());
        let a = state.sitzungen.client_hinzufuegen("10.0.0.1");
        let ohne = state.sitzungen.sitzung(a.client_id).unwrap();
        assert_eq!(anzeigezeile(&ohne), "IP Address: 10.0.0.1   ClientID: 5000  ");

        state
            .sitzungen
            .client_information_setzen(a.client_id, Some("Chrome".into()), Some("Windows".into()));
        let mit = state.sitzungen.sitzung(a.client_id).unwrap();
        assert_eq!(
            anzeigezeile(&mit),
            "IP Address: 10.0.0.1   ClientID: 5000  Chrome Windows"
        );
    }

    #[test]
    fn benutzerliste_enthaelt_gesperrte_gruppen() {
        let state = RoverState::simuliert(RoverMetrics::neu().unwrap());
        let _a = state.sitzungen.client_hinzufuegen("10.0.0.1");
        let _b = state.sitzungen.client_hinzufuegen("10.0.0.2");
        state.policy.ip_sperren("10.0.0.2");

        let liste = serde_json::to_value(benutzerliste(&state)).unwrap();
        assert_eq!(liste["method"], "updateConnectedUsers");
        assert_eq!(liste["params"][0].as_array().unwrap().len(), 2);
        assert_eq!(
            liste["params"][1],
            serde_json::json!([{"ipAddress": "10.0.0.2", "clientIds": [5001]}])
        );
    }

    #[test]
    fn getrennter_fahrer_verliert_rolle() {
        let state = RoverState::simuliert(RoverMetrics::neu().unwrap());
        let fahrer = state.sitzungen.client_hinzufuegen("10.0.0.1");
        let mut zuschauer = state.sitzungen.client_hinzufuegen("10.0.0.2");
        state.fahrer.erwerben(fahrer.client_id);
        leeren(&mut zuschauer);

        fahrer.handle.schliessen();
        let entfernt = state.sitzungen.geschlossene_entfernen();
        event_verarbeiten(&state, &RoverEvent::ClientsGetrennt { client_ids: entfernt });

        assert_eq!(state.fahrer.aktueller_fahrer(), None);
        let n = leeren(&mut zuschauer);
        assert_eq!(n[0]["method"], "updateRoverState");
        assert_eq!(n[0]["params"][0]["currentDriverId"], -1);
        assert_eq!(n[1]["method"], "updateConnectedUsers");
        assert_eq!(n[1]["params"][0].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn entwickleransicht_reagiert_auf_events() {
        let state = RoverState::simuliert(RoverMetrics::neu().unwrap());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = entwickleransicht_starten(Arc::clone(&state), shutdown_rx);

        let mut a = state.sitzungen.client_hinzufuegen("10.0.0.1");
        let nachricht = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let text = a.empfaenger.recv().await.unwrap();
                let v: Value = serde_json::from_str(&text).unwrap();
                if v["method"] == "updateConnectedUsers" {
                    return v;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(
            nachricht["params"][0][0],
            "IP Address: 10.0.0.1   ClientID: 5000  "
        );

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn kollisionsanzeige_nur_bei_aenderung() {
        let state = RoverState::simuliert(RoverMetrics::neu().unwrap());
        let mut a = state.sitzungen.client_hinzufuegen("10.0.0.1");
        leeren(&mut a);

        let (feed_tx, feed_rx) = watch::channel(CollisionSnapshot::frei());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = kollisionsanzeige_starten(Arc::clone(&state), feed_rx, shutdown_rx);

        let vorne = SensorWerte {
            front_left: true,
            ..SensorWerte::default()
        };
        feed_tx.send_replace(CollisionSnapshot::aus_werten(vorne, Utc::now()));

        let text = tokio::time::timeout(Duration::from_secs(2), a.empfaenger.recv())
            .await
            .unwrap()
            .unwrap();
        let v: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["method"], "updateCollisionInformation");
        assert_eq!(
            v["params"][0],
            serde_json::json!({"frontLeft": true, "frontRight": false, "backLeft": false, "backRight": false})
        );

        // Gleiche Flags, nur neuer Zeitstempel -> keine Nachricht
        feed_tx.send_replace(CollisionSnapshot::aus_werten(vorne, Utc::now()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(leeren(&mut a).is_empty());

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
