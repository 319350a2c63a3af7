//! Client-Connection – Verwaltet eine einzelne WebSocket-Verbindung
//!
//! Jede Verbindung bekommt eine `ClientConnection` in einem eigenen
//! tokio-Task. Der Task ist der einzige Schreiber auf den Socket: Antworten
//! des Dispatchers und Notifications aus der Send-Queue der Sitzung werden
//! nacheinander gesendet, nie verschraenkt.
//!
//! ## Lebenszyklus
//! 1. Sitzung registrieren (`setClientId`, Broadcast, Policy)
//! 2. Bei aktivem Killswitch nur diesen Client benachrichtigen
//! 3. Frames dispatchen bis Close, Fehler, Idle-Timeout oder Shutdown
//!
//! Als Aktivitaet zaehlen gelesene und geschriebene Frames, ein Client der
//! nur Broadcasts empfaengt bleibt also verbunden.
//! 4. Sitzung entfernen, Fahrerrolle pruefen, ohne Clients stoppen

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::dispatcher::{RpcDispatcher, RpcKontext};
use crate::registry::NeueSitzung;

/// Verarbeitet eine einzelne WebSocket-Verbindung
pub struct ClientConnection {
    dispatcher: Arc<RpcDispatcher>,
    peer_addr: SocketAddr,
}

impl ClientConnection {
    pub fn neu(dispatcher: Arc<RpcDispatcher>, peer_addr: SocketAddr) -> Self {
        Self {
            dispatcher,
            peer_addr,
        }
    }

    /// Startet die Verbindungs-Verarbeitungsschleife
    ///
    /// Laeuft bis die Verbindung getrennt wird oder ein Shutdown-Signal
    /// eingeht.
    pub async fn verarbeiten(self, socket: WebSocket, mut shutdown_rx: watch::Receiver<bool>) {
        let state = Arc::clone(self.dispatcher.state());
        let ip = self.peer_addr.ip().to_string();
        let idle_timeout = state.config.idle_timeout;

        let NeueSitzung {
            client_id,
            handle,
            mut empfaenger,
        } = state.sitzungen.client_hinzufuegen(&ip);
        tracing::info!(client_id = %client_id, peer = %self.peer_addr, "Neue Verbindung");

        state
            .killswitch
            .benachrichtigen_wenn_aktiv(client_id, &state.config.sperr_nachricht);

        let ctx = RpcKontext {
            client_id,
            remote_address: ip,
        };
        let (mut sink, mut stream) = socket.split();
        let mut letzte_aktivitaet = Instant::now();

        loop {
            tokio::select! {
                // Eingehender Frame vom Client
                frame = stream.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            letzte_aktivitaet = Instant::now();
                            if let Some(antwort) = self.dispatcher.dispatch_text(&text, &ctx) {
                                if let Err(e) = sink.send(Message::Text(antwort)).await {
                                    tracing::warn!(client_id = %client_id, fehler = %e, "Senden fehlgeschlagen");
                                    break;
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            tracing::info!(client_id = %client_id, "Verbindung vom Client getrennt");
                            break;
                        }
                        Some(Ok(_)) => {
                            // Ping/Pong/Binary halten die Verbindung nur am Leben
                            letzte_aktivitaet = Instant::now();
                        }
                        Some(Err(e)) => {
                            tracing::warn!(client_id = %client_id, fehler = %e, "WebSocket-Lesefehler");
                            break;
                        }
                    }
                }

                // Ausgehende Notification aus der Send-Queue
                Some(ausgehend) = empfaenger.recv() => {
                    if let Err(e) = sink.send(Message::Text(ausgehend)).await {
                        tracing::warn!(client_id = %client_id, fehler = %e, "Notification-Senden fehlgeschlagen");
                        break;
                    }
                    letzte_aktivitaet = Instant::now();
                }

                // Idle-Timeout
                _ = tokio::time::sleep_until(letzte_aktivitaet + idle_timeout) => {
                    tracing::info!(client_id = %client_id, "Idle-Timeout – Verbindung wird getrennt");
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }

                // Shutdown-Signal
                res = shutdown_rx.changed() => {
                    if res.is_err() || *shutdown_rx.borrow() {
                        tracing::info!(client_id = %client_id, "Shutdown-Signal – Verbindung wird getrennt");
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        }

        // Cleanup beim Verbindungsende
        handle.schliessen();
        state.sitzungen.geschlossene_entfernen();
        if state.fahrer.verfuegbarkeit_pruefen(&state.sitzungen).is_some() {
            state.rover_zustand_senden();
        }
        if state.sitzungen.keiner_verbunden() {
            tracing::info!("Letzter Client getrennt – Rover wird gestoppt");
            state.fahrt.stoppen();
        }

        tracing::info!(client_id = %client_id, "Verbindungs-Task beendet");
    }
}
