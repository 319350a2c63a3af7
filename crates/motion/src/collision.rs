//! Kollisionsdaten und periodische Abtastung
//!
//! Der `CollisionFeed` liest den Kollisionssensor in festen Abstaenden und
//! veroeffentlicht jeden Messwert ueber einen `watch`-Kanal. Es zaehlt nur
//! der neueste Wert: langsame Beobachter verpassen Zwischenwerte, blockieren
//! aber nie die Abtastung.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{MotionError, MotionResult};
use crate::hardware::KollisionsSensor;

// ---------------------------------------------------------------------------
// Messwerte
// ---------------------------------------------------------------------------

/// Rohwerte der vier Infrarotsensoren
///
/// `tainted` ist gesetzt wenn die Messung unzuverlaessig ist (z.B.
/// Sonnenlicht ueberstrahlt die Sensoren).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SensorWerte {
    pub front_left: bool,
    pub front_right: bool,
    pub back_left: bool,
    pub back_right: bool,
    pub tainted: bool,
}

/// Ein Messwert des Kollisions-Feeds, wird bei jeder Abtastung ersetzt
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CollisionSnapshot {
    pub front_left: bool,
    pub front_right: bool,
    pub back_left: bool,
    pub back_right: bool,
    pub tainted: bool,
    pub observed_at: DateTime<Utc>,
}

impl CollisionSnapshot {
    pub fn aus_werten(werte: SensorWerte, observed_at: DateTime<Utc>) -> Self {
        Self {
            front_left: werte.front_left,
            front_right: werte.front_right,
            back_left: werte.back_left,
            back_right: werte.back_right,
            tainted: werte.tainted,
            observed_at,
        }
    }

    /// Snapshot ohne Kollision, jetzt beobachtet
    pub fn frei() -> Self {
        Self::aus_werten(SensorWerte::default(), Utc::now())
    }

    pub fn has_collision_front(&self) -> bool {
        self.front_left || self.front_right
    }

    pub fn has_collision_back(&self) -> bool {
        self.back_left || self.back_right
    }

    /// Rohwerte ohne Zeitstempel
    pub fn werte(&self) -> SensorWerte {
        SensorWerte {
            front_left: self.front_left,
            front_right: self.front_right,
            back_left: self.back_left,
            back_right: self.back_right,
            tainted: self.tainted,
        }
    }

    /// Alter des Messwerts relativ zu `jetzt`
    pub fn alter(&self, jetzt: DateTime<Utc>) -> Duration {
        (jetzt - self.observed_at).to_std().unwrap_or(Duration::ZERO)
    }
}

impl Default for CollisionSnapshot {
    fn default() -> Self {
        Self::frei()
    }
}

// ---------------------------------------------------------------------------
// CollisionFeed
// ---------------------------------------------------------------------------

/// Periodischer Produzent von `CollisionSnapshot`s
pub struct CollisionFeed {
    sensor: Arc<dyn KollisionsSensor>,
    intervall: Duration,
    tx: watch::Sender<CollisionSnapshot>,
}

impl CollisionFeed {
    pub fn neu(sensor: Arc<dyn KollisionsSensor>, intervall: Duration) -> Self {
        let (tx, _) = watch::channel(CollisionSnapshot::frei());
        Self {
            sensor,
            intervall,
            tx,
        }
    }

    /// Neuer Beobachter; sieht sofort den aktuellen Wert
    pub fn abonnieren(&self) -> watch::Receiver<CollisionSnapshot> {
        self.tx.subscribe()
    }

    /// Zuletzt veroeffentlichter Messwert
    pub fn aktuell(&self) -> CollisionSnapshot {
        *self.tx.borrow()
    }

    /// Liest den Sensor einmal und veroeffentlicht das Ergebnis
    ///
    /// Der Sensor wird im Blocking-Pool gelesen; das Veroeffentlichen selbst
    /// wartet auf keinen Beobachter.
    pub async fn abtasten(&self) -> MotionResult<CollisionSnapshot> {
        let sensor = Arc::clone(&self.sensor);
        let werte = tokio::task::spawn_blocking(move || sensor.lesen())
            .await
            .map_err(|e| MotionError::NichtVerfuegbar(format!("Sensor-Task: {e}")))??;

        let snapshot = CollisionSnapshot::aus_werten(werte, Utc::now());
        self.tx.send_replace(snapshot);
        Ok(snapshot)
    }

    /// Startet die periodische Abtastung bis `shutdown` auf `true` wechselt
    pub fn starten(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut takt = tokio::time::interval(self.intervall);
            takt.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            tracing::info!(intervall_ms = self.intervall.as_millis() as u64, "Kollisions-Feed gestartet");

            loop {
                tokio::select! {
                    _ = takt.tick() => {
                        if let Err(e) = self.abtasten().await {
                            tracing::warn!(fehler = %e, "Kollisionssensor konnte nicht gelesen werden");
                        }
                    }
                    res = shutdown.changed() => {
                        if res.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::info!("Kollisions-Feed beendet");
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
