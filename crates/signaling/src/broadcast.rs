//! Ausgehende Nachrichten an einen einzelnen Client
//!
//! Jede Verbindung hat eine begrenzte Send-Queue. Nur der Verbindungs-Task
//! schreibt auf den Socket, damit werden alle Frames an einen Client
//! serialisiert und nie verschraenkt. Alle anderen Komponenten legen
//! Nachrichten ueber `ClientSender` nicht-blockierend in die Queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rover_core::{ClientId, Result, RoverError};
use tokio::sync::mpsc;

/// Handle auf die Send-Queue eines verbundenen Clients
#[derive(Clone, Debug)]
pub struct ClientSender {
    pub client_id: ClientId,
    tx: mpsc::Sender<String>,
    offen: Arc<AtomicBool>,
}

impl ClientSender {
    /// Erstellt Handle und Empfangsseite der Queue
    pub fn neu(client_id: ClientId, queue_groesse: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(queue_groesse.max(1));
        let sender = Self {
            client_id,
            tx,
            offen: Arc::new(AtomicBool::new(true)),
        };
        (sender, rx)
    }

    /// Legt einen Textframe nicht-blockierend in die Queue
    pub fn senden(&self, text: String) -> Result<()> {
        if !self.ist_offen() {
            return Err(RoverError::Getrennt(self.client_id.to_string()));
        }
        self.tx.try_send(text).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                RoverError::Senden(format!("Send-Queue von {} voll", self.client_id))
            }
            mpsc::error::TrySendError::Closed(_) => {
                RoverError::Getrennt(self.client_id.to_string())
            }
        })
    }

    /// true solange die Verbindung nicht geschlossen wurde
    pub fn ist_offen(&self) -> bool {
        self.offen.load(Ordering::Acquire) && !self.tx.is_closed()
    }

    /// Markiert die Verbindung als geschlossen
    ///
    /// Die Sitzung bleibt registriert bis zum naechsten Aufraeumen.
    pub fn schliessen(&self) {
        self.offen.store(false, Ordering::Release);
    }
}
