//! Session Registry – verbundene Clients, IDs und Broadcast
//!
//! Die Registry vergibt Client-IDs, haelt alle Sitzungen in einer
//! geordneten Map und verteilt Notifications an einzelne oder alle Clients.
//!
//! ## Faires Broadcasting
//! `an_alle_senden` durchlaeuft die Clients abwechselnd in aufsteigender und
//! absteigender ID-Reihenfolge (beginnend aufsteigend), damit kein Client
//! unter Dauerlast immer zuerst oder zuletzt beliefert wird. Die Richtung
//! wechselt bei jedem Aufruf, unabhaengig vom Ergebnis.
//!
//! ## Aufraeumen
//! Sitzungen werden nie beim Senden entfernt, nur durch
//! `geschlossene_entfernen` (periodisch und beim Verbindungsende).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rover_core::{ClientId, RoverEvent};
use rover_observability::RoverMetrics;
use rover_protocol::JsonRpcRequest;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

use crate::broadcast::ClientSender;
use crate::policy::ConnectionPolicy;

/// Text der Broadcast-Nachricht bei neuen Verbindungen
const NEUER_CLIENT_TEXT: &str = "new client has connected to server, id: ";

// ---------------------------------------------------------------------------
// Sitzung
// ---------------------------------------------------------------------------

/// Eine verbundene Client-Sitzung
#[derive(Debug, Clone)]
pub struct ClientSession {
    pub id: ClientId,
    pub sender: ClientSender,
    pub remote_address: String,
    pub connected_at: DateTime<Utc>,
    pub browser: Option<String>,
    pub os: Option<String>,
}

/// Ergebnis von `client_hinzufuegen`
pub struct NeueSitzung {
    pub client_id: ClientId,
    /// Handle zum Schliessen der Sitzung beim Verbindungsende
    pub handle: ClientSender,
    /// Empfangsseite der Send-Queue, gelesen vom Verbindungs-Task
    pub empfaenger: mpsc::Receiver<String>,
}

// ---------------------------------------------------------------------------
// SessionRegistry
// ---------------------------------------------------------------------------

/// Registry aller verbundenen Clients
///
/// Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    sitzungen: RwLock<BTreeMap<ClientId, ClientSession>>,
    naechste_id: AtomicU32,
    /// Richtung des naechsten Broadcasts (false = aufsteigend)
    absteigend: AtomicBool,
    queue_groesse: usize,
    policy: ConnectionPolicy,
    events: broadcast::Sender<RoverEvent>,
    metriken: RoverMetrics,
}

impl SessionRegistry {
    pub fn neu(
        policy: ConnectionPolicy,
        events: broadcast::Sender<RoverEvent>,
        metriken: RoverMetrics,
        queue_groesse: usize,
    ) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                sitzungen: RwLock::new(BTreeMap::new()),
                naechste_id: AtomicU32::new(ClientId::ERSTE.inner()),
                absteigend: AtomicBool::new(false),
                queue_groesse,
                policy,
                events,
                metriken,
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Lebenszyklus
    // -----------------------------------------------------------------------

    /// Registriert einen neuen Client
    ///
    /// Vergibt die naechste ID, sendet sie dem Client (`setClientId`),
    /// meldet die Verbindung allen Clients und ordnet sie der IP zu.
    pub fn client_hinzufuegen(&self, remote_address: &str) -> NeueSitzung {
        let client_id = ClientId(self.inner.naechste_id.fetch_add(1, Ordering::SeqCst));
        let (sender, empfaenger) = ClientSender::neu(client_id, self.inner.queue_groesse);

        let anzahl = {
            let mut sitzungen = self.inner.sitzungen.write();
            sitzungen.insert(
                client_id,
                ClientSession {
                    id: client_id,
                    sender: sender.clone(),
                    remote_address: remote_address.to_string(),
                    connected_at: Utc::now(),
                    browser: None,
                    os: None,
                },
            );
            sitzungen.len()
        };
        self.inner.metriken.connected_clients.set(anzahl as i64);
        tracing::info!(client_id = %client_id, ip = %remote_address, "Client registriert");

        self.an_client_senden(client_id, &JsonRpcRequest::client_id_notification(client_id));
        self.text_an_alle(format!("{NEUER_CLIENT_TEXT}{}", client_id.inner()));
        self.inner
            .policy
            .verbindung_hinzufuegen(remote_address, client_id);

        let _ = self.inner.events.send(RoverEvent::ClientVerbunden {
            client_id,
            ip: remote_address.to_string(),
        });

        NeueSitzung {
            client_id,
            handle: sender,
            empfaenger,
        }
    }

    /// Entfernt alle Sitzungen deren Verbindung geschlossen ist
    ///
    /// Feuert `ClientsGetrennt` nur wenn mindestens eine Sitzung entfernt
    /// wurde. Liefert die entfernten IDs.
    pub fn geschlossene_entfernen(&self) -> Vec<ClientId> {
        let (entfernt, anzahl) = {
            let mut sitzungen = self.inner.sitzungen.write();
            let entfernt: Vec<ClientId> = sitzungen
                .values()
                .filter(|s| !s.sender.ist_offen())
                .map(|s| s.id)
                .collect();
            for id in &entfernt {
                sitzungen.remove(id);
            }
            (entfernt, sitzungen.len())
        };

        if entfernt.is_empty() {
            return entfernt;
        }

        for id in &entfernt {
            self.inner.policy.verbindung_entfernen(*id);
        }
        self.inner.metriken.connected_clients.set(anzahl as i64);
        tracing::info!(anzahl = entfernt.len(), "Geschlossene Sitzungen entfernt");

        let _ = self.inner.events.send(RoverEvent::ClientsGetrennt {
            client_ids: entfernt.clone(),
        });
        entfernt
    }

    /// Startet das periodische Aufraeumen bis `shutdown` auf `true` wechselt
    pub fn aufraeumen_starten(
        &self,
        intervall: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut takt = tokio::time::interval(intervall);
            // Der erste Tick kommt sofort
            takt.tick().await;
            loop {
                tokio::select! {
                    _ = takt.tick() => {
                        registry.geschlossene_entfernen();
                    }
                    res = shutdown.changed() => {
                        if res.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("Sitzungs-Aufraeumen beendet");
        })
    }

    /// Speichert Browser und Betriebssystem eines Clients
    pub fn client_information_setzen(
        &self,
        client_id: ClientId,
        browser: Option<String>,
        os: Option<String>,
    ) -> bool {
        let gefunden = match self.inner.sitzungen.write().get_mut(&client_id) {
            Some(sitzung) => {
                sitzung.browser = browser;
                sitzung.os = os;
                true
            }
            None => false,
        };
        if gefunden {
            let _ = self
                .inner
                .events
                .send(RoverEvent::ClientInformationGeaendert { client_id });
        }
        gefunden
    }

    // -----------------------------------------------------------------------
    // Senden
    // -----------------------------------------------------------------------

    /// Sendet eine Notification an alle Clients
    ///
    /// Liefert die IDs in der Reihenfolge in der sie beliefert wurden.
    /// Sendefehler einzelner Clients werden geloggt und unterbrechen die
    /// Verteilung nicht.
    pub fn an_alle_senden(&self, nachricht: &JsonRpcRequest) -> Vec<ClientId> {
        let absteigend = self.inner.absteigend.fetch_xor(true, Ordering::SeqCst);

        let text = match nachricht.to_json() {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(fehler = %e, method = %nachricht.method, "Notification nicht serialisierbar");
                return Vec::new();
            }
        };

        let sitzungen = self.inner.sitzungen.read();
        let reihenfolge: Box<dyn Iterator<Item = &ClientSession> + '_> = if absteigend {
            Box::new(sitzungen.values().rev())
        } else {
            Box::new(sitzungen.values())
        };

        let mut besucht = Vec::with_capacity(sitzungen.len());
        for sitzung in reihenfolge {
            self.zustellen(sitzung, text.clone());
            besucht.push(sitzung.id);
        }
        besucht
    }

    /// Sendet eine Notification an einen Client; `false` wenn unbekannt
    /// oder das Senden fehlschlug
    pub fn an_client_senden(&self, client_id: ClientId, nachricht: &JsonRpcRequest) -> bool {
        let text = match nachricht.to_json() {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(fehler = %e, method = %nachricht.method, "Notification nicht serialisierbar");
                return false;
            }
        };
        match self.inner.sitzungen.read().get(&client_id) {
            Some(sitzung) => self.zustellen(sitzung, text),
            None => {
                tracing::debug!(client_id = %client_id, "Notification an unbekannten Client verworfen");
                false
            }
        }
    }

    /// `incomingNotification [text]` an alle Clients
    pub fn text_an_alle(&self, text: impl Into<String>) -> Vec<ClientId> {
        self.an_alle_senden(&JsonRpcRequest::text_notification(text))
    }

    /// `incomingNotification [text]` an einen Client
    pub fn text_an_client(&self, client_id: ClientId, text: impl Into<String>) -> bool {
        self.an_client_senden(client_id, &JsonRpcRequest::text_notification(text))
    }

    fn zustellen(&self, sitzung: &ClientSession, text: String) -> bool {
        match sitzung.sender.senden(text) {
            Ok(()) => true,
            Err(e) => {
                self.inner.metriken.send_failures_total.inc();
                tracing::warn!(client_id = %sitzung.id, fehler = %e, "Senden an Client fehlgeschlagen");
                false
            }
        }
    }

    // -----------------------------------------------------------------------
    // Abfragen
    // -----------------------------------------------------------------------

    pub fn anzahl_verbunden(&self) -> usize {
        self.inner.sitzungen.read().len()
    }

    pub fn keiner_verbunden(&self) -> bool {
        self.inner.sitzungen.read().is_empty()
    }

    pub fn ist_verbunden(&self, client_id: ClientId) -> bool {
        self.inner.sitzungen.read().contains_key(&client_id)
    }

    /// Momentaufnahme aller Sitzungen, aufsteigend nach ID
    pub fn sitzungen(&self) -> Vec<ClientSession> {
        self.inner.sitzungen.read().values().cloned().collect()
    }

    pub fn sitzung(&self, client_id: ClientId) -> Option<ClientSession> {
        self.inner.sitzungen.read().get(&client_id).cloned()
    }

    /// Neuer Beobachter fuer Sitzungs- und Policy-Events
    pub fn events_abonnieren(&self) -> broadcast::Receiver<RoverEvent> {
        self.inner.events.subscribe()
    }

    pub fn policy(&self) -> &ConnectionPolicy {
        &self.inner.policy
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitration::DriverLease;
    use serde_json::Value;

    fn registry() -> SessionRegistry {
        let (events, _) = broadcast::channel(64);
        let policy = ConnectionPolicy::neu(events.clone());
        SessionRegistry::neu(policy, events, RoverMetrics::neu().unwrap(), 64)
    }

    fn leeren(rx: &mut mpsc::Receiver<String>) -> Vec<Value> {
        let mut nachrichten = Vec::new();
        while let Ok(text) = rx.try_recv() {
            nachrichten.push(serde_json::from_str(&text).unwrap());
        }
        nachrichten
    }

    #[test]
    fn ids_steigen_ab_5000_und_werden_nie_wiederverwendet() {
        let r = registry();
        let a = r.client_hinzufuegen("10.0.0.1");
        let b = r.client_hinzufuegen("10.0.0.1");
        assert_eq!(a.client_id, ClientId(5000));
        assert_eq!(b.client_id, ClientId(5001));

        a.handle.schliessen();
        b.handle.schliessen();
        r.geschlossene_entfernen();
        assert!(r.keiner_verbunden());

        let c = r.client_hinzufuegen("10.0.0.2");
        assert_eq!(c.client_id, ClientId(5002));
    }

    #[test]
    fn neuer_client_erhaelt_id_und_broadcast() {
        let r = registry();
        let mut a = r.client_hinzufuegen("10.0.0.1");
        let nachrichten = leeren(&mut a.empfaenger);

        assert_eq!(nachrichten[0]["method"], "setClientId");
        assert_eq!(nachrichten[0]["params"][0], 5000);
        assert_eq!(nachrichten[1]["method"], "incomingNotification");
        assert_eq!(
            nachrichten[1]["params"][0],
            "new client has connected to server, id: 5000"
        );
        assert_eq!(r.policy().clients_mit_ip("10.0.0.1"), vec![ClientId(5000)]);
    }

    #[test]
    fn entfernt_nur_geschlossene_und_feuert_einmal() {
        let r = registry();
        let mut events = r.events_abonnieren();
        let a = r.client_hinzufuegen("10.0.0.1");
        let b = r.client_hinzufuegen("10.0.0.2");
        while events.try_recv().is_ok() {}

        b.handle.schliessen();
        assert_eq!(r.geschlossene_entfernen(), vec![b.client_id]);
        assert!(r.ist_verbunden(a.client_id));
        assert!(!r.ist_verbunden(b.client_id));
        assert_eq!(r.anzahl_verbunden(), 1);
        assert!(r.policy().clients_mit_ip("10.0.0.2").is_empty());

        assert_eq!(
            events.try_recv().unwrap(),
            RoverEvent::ClientsGetrennt {
                client_ids: vec![b.client_id]
            }
        );
        assert!(events.try_recv().is_err());

        // Nichts zu entfernen -> kein Event
        assert!(r.geschlossene_entfernen().is_empty());
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn broadcast_richtung_wechselt() {
        let r = registry();
        let _a = r.client_hinzufuegen("10.0.0.1");
        let _b = r.client_hinzufuegen("10.0.0.1");
        let _c = r.client_hinzufuegen("10.0.0.1");

        // Jede Registrierung hat einmal gebroadcastet (auf, ab, auf)
        let n = JsonRpcRequest::text_notification("test");
        let ab = vec![ClientId(5002), ClientId(5001), ClientId(5000)];
        let auf = vec![ClientId(5000), ClientId(5001), ClientId(5002)];
        assert_eq!(r.an_alle_senden(&n), ab);
        assert_eq!(r.an_alle_senden(&n), auf);
        assert_eq!(r.an_alle_senden(&n), ab);
    }

    #[test]
    fn erster_broadcast_ist_aufsteigend_und_richtung_wechselt_auch_ohne_clients() {
        let r = registry();
        let n = JsonRpcRequest::text_notification("leer");
        assert!(r.an_alle_senden(&n).is_empty());
        // Der leere Broadcast hat die Richtung gewechselt: naechster absteigend.
        // client_hinzufuegen broadcastet selbst (absteigend), danach aufsteigend.
        let _a = r.client_hinzufuegen("10.0.0.1");
        let _b = r.client_hinzufuegen("10.0.0.1");
        assert_eq!(r.an_alle_senden(&n), vec![ClientId(5001), ClientId(5000)]);
    }

    #[test]
    fn sendefehler_unterbricht_broadcast_nicht() {
        let r = registry();
        let a = r.client_hinzufuegen("10.0.0.1");
        let mut b = r.client_hinzufuegen("10.0.0.1");
        leeren(&mut b.empfaenger);

        drop(a.empfaenger);
        let ids = r.text_an_alle("trotzdem");
        assert_eq!(ids.len(), 2);
        let nachrichten = leeren(&mut b.empfaenger);
        assert_eq!(nachrichten[0]["params"][0], "trotzdem");

        // Sitzung wird beim Senden nicht entfernt
        assert!(r.ist_verbunden(a.client_id));
        assert_eq!(r.geschlossene_entfernen(), vec![a.client_id]);
    }

    #[test]
    fn text_an_client() {
        let r = registry();
        let mut a = r.client_hinzufuegen("10.0.0.1");
        leeren(&mut a.empfaenger);

        assert!(r.text_an_client(a.client_id, "nur fuer dich"));
        assert!(!r.text_an_client(ClientId(4242), "niemand"));
        let nachrichten = leeren(&mut a.empfaenger);
        assert_eq!(nachrichten.len(), 1);
        assert_eq!(nachrichten[0]["method"], "incomingNotification");
    }

    #[test]
    fn client_information_feuert_event() {
        let r = registry();
        let a = r.client_hinzufuegen("10.0.0.1");
        let mut events = r.events_abonnieren();

        assert!(r.client_information_setzen(
            a.client_id,
            Some("Firefox".into()),
            Some("Linux".into())
        ));
        assert_eq!(
            events.try_recv().unwrap(),
            RoverEvent::ClientInformationGeaendert {
                client_id: a.client_id
            }
        );
        let s = r.sitzung(a.client_id).unwrap();
        assert_eq!(s.browser.as_deref(), Some("Firefox"));
        assert!(!r.client_information_setzen(ClientId(1), None, None));
    }

    #[test]
    fn fahrer_verliert_rolle_nach_trennung() {
        let r = registry();
        let lease = DriverLease::neu();
        let a = r.client_hinzufuegen("10.0.0.1");
        lease.erwerben(a.client_id);

        assert_eq!(lease.verfuegbarkeit_pruefen(&r), None);
        a.handle.schliessen();
        r.geschlossene_entfernen();
        assert_eq!(lease.verfuegbarkeit_pruefen(&r), Some(a.client_id));
        assert_eq!(lease.aktueller_fahrer(), None);
    }

    #[tokio::test]
    async fn aufraeumen_laeuft_periodisch() {
        let r = registry();
        let a = r.client_hinzufuegen("10.0.0.1");
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = r.aufraeumen_starten(Duration::from_millis(10), shutdown_rx);

        a.handle.schliessen();
        let mut entfernt = false;
        for _ in 0..100 {
            if r.keiner_verbunden() {
                entfernt = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(entfernt);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
