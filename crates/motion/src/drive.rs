//! Fahrsteuerung mit Kollisionssperre
//!
//! Alle Aenderungen am aktuellen Motor-Setting laufen durch einen einzigen
//! Mutex, der auch den zuletzt gesehenen `CollisionSnapshot` haelt. Die
//! Sperrentscheidung und das Anwenden auf die Hardware passieren unter
//! derselben Sperre, damit sie immer gegen einen konsistenten Zustand
//! getroffen wird.
//!
//! ## Kollisionssperre
//! - Vorwaerts bei Kollision vorne / rueckwaerts bei Kollision hinten wird
//!   verweigert; statt dessen wird gestoppt.
//! - Drehen auf der Stelle wird nie gesperrt.
//! - Unzuverlaessige Messungen (`tainted`) loesen nie eine Sperre aus.
//! - Jeder neue Snapshot der eine Kollision in aktueller Fahrtrichtung
//!   zeigt, stoppt den Rover sofort (Sicherheitsstopp).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::actuator::Antrieb;
use crate::algorithm::{DifferentialAlgorithmus, FahrAlgorithmus};
use crate::collision::CollisionSnapshot;
use crate::setting::MotorSetting;

/// Standardwert fuer die Skala von Geschwindigkeit und Drehrate
pub const MAX_GESCHWINDIGKEIT: i32 = 1000;

/// Ergebnis eines Fahrbefehls
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fahrergebnis {
    /// Setting wurde angewendet
    Angewendet(MotorSetting),
    /// Kollisionssperre: statt dessen wurde gestoppt
    Verweigert,
    /// Hardwarefehler, das bisherige Setting gilt weiter
    Fehlgeschlagen,
}

struct FahrZustand {
    /// Zuletzt erfolgreich angewendetes Setting
    aktuell: MotorSetting,
    /// Zuletzt empfangener Kollisions-Snapshot
    kollision: CollisionSnapshot,
}

/// Fahrsteuerung des Rovers
pub struct DriveController {
    antrieb: Arc<dyn Antrieb>,
    algorithmus: Box<dyn FahrAlgorithmus>,
    max_geschwindigkeit: i32,
    zustand: Mutex<FahrZustand>,
    sicherheitsstopps: AtomicU64,
}

impl DriveController {
    /// Fahrsteuerung mit `DifferentialAlgorithmus`
    pub fn neu(antrieb: Arc<dyn Antrieb>) -> Self {
        Self::mit_algorithmus(antrieb, Box::new(DifferentialAlgorithmus), MAX_GESCHWINDIGKEIT)
    }

    pub fn mit_algorithmus(
        antrieb: Arc<dyn Antrieb>,
        algorithmus: Box<dyn FahrAlgorithmus>,
        max_geschwindigkeit: i32,
    ) -> Self {
        Self {
            antrieb,
            algorithmus,
            max_geschwindigkeit: max_geschwindigkeit.max(1),
            zustand: Mutex::new(FahrZustand {
                aktuell: MotorSetting::STOPP,
                kollision: CollisionSnapshot::frei(),
            }),
            sicherheitsstopps: AtomicU64::new(0),
        }
    }

    // -----------------------------------------------------------------------
    // Abfragen
    // -----------------------------------------------------------------------

    /// Zuletzt erfolgreich angewendetes Setting
    pub fn aktuelles_setting(&self) -> MotorSetting {
        self.zustand.lock().aktuell
    }

    pub fn letzte_kollision(&self) -> CollisionSnapshot {
        self.zustand.lock().kollision
    }

    /// Anzahl der durch Kollisionen ausgeloesten Stopps seit Start
    pub fn sicherheitsstopps(&self) -> u64 {
        self.sicherheitsstopps.load(Ordering::Relaxed)
    }

    // -----------------------------------------------------------------------
    // Befehle
    // -----------------------------------------------------------------------

    /// Joystick-Fahrt: Winkel in Grad, Geschwindigkeit in Prozent
    pub fn kontinuierlich_fahren(&self, winkel: i32, geschwindigkeit: i32) -> Fahrergebnis {
        let setting = self.algorithmus.berechnen(winkel, geschwindigkeit);
        self.gesperrt_anwenden(setting)
    }

    pub fn vorwaerts_fahren(&self) -> Fahrergebnis {
        self.gesperrt_anwenden(MotorSetting::VORWAERTS)
    }

    pub fn rueckwaerts_fahren(&self) -> Fahrergebnis {
        self.gesperrt_anwenden(MotorSetting::RUECKWAERTS)
    }

    /// Dreht auf der Stelle nach links (ohne Kollisionssperre)
    pub fn links_drehen(&self) -> Fahrergebnis {
        self.ungesperrt_anwenden(MotorSetting::LINKS_DREHEN)
    }

    /// Dreht auf der Stelle nach rechts (ohne Kollisionssperre)
    pub fn rechts_drehen(&self) -> Fahrergebnis {
        self.ungesperrt_anwenden(MotorSetting::RECHTS_DREHEN)
    }

    pub fn stoppen(&self) -> Fahrergebnis {
        self.ungesperrt_anwenden(MotorSetting::STOPP)
    }

    /// Fahrt aus Geschwindigkeit und Drehrate
    ///
    /// Beide Werte liegen auf der Skala `±max_geschwindigkeit`; positive
    /// Drehrate dreht nach links. Links = speed - turn, rechts = speed + turn,
    /// jeweils begrenzt und auf `[-1, 1]` skaliert.
    pub fn fahren(&self, geschwindigkeit: i32, drehrate: i32) -> Fahrergebnis {
        let max = i64::from(self.max_geschwindigkeit);
        let begrenzt = |wert: i64| wert.clamp(-max, max) as f64 / max as f64;

        let speed = i64::from(geschwindigkeit);
        let turn = i64::from(drehrate);
        let setting = MotorSetting::neu(begrenzt(speed - turn), begrenzt(speed + turn));
        self.gesperrt_anwenden(setting)
    }

    // -----------------------------------------------------------------------
    // Kollisionen
    // -----------------------------------------------------------------------

    /// Verarbeitet einen neuen Snapshot; liefert `true` bei Sicherheitsstopp
    pub fn kollision_verarbeiten(&self, snapshot: CollisionSnapshot) -> bool {
        let mut zustand = self.zustand.lock();
        zustand.kollision = snapshot;

        if snapshot.tainted {
            tracing::trace!("Unzuverlaessige Kollisionsmessung ignoriert");
            return false;
        }
        if !blockiert(&snapshot, zustand.aktuell) {
            return false;
        }

        tracing::warn!(
            front = snapshot.has_collision_front(),
            back = snapshot.has_collision_back(),
            "Kollision in Fahrtrichtung – Sicherheitsstopp"
        );
        match self.antrieb.motor_setting_anwenden(MotorSetting::STOPP) {
            Ok(()) => {
                zustand.aktuell = MotorSetting::STOPP;
                self.sicherheitsstopps.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                tracing::error!(fehler = %e, "Rover konnte trotz Kollision nicht gestoppt werden");
                false
            }
        }
    }

    /// Verfolgt einen Kollisions-Feed bis `shutdown` auf `true` wechselt
    pub fn kollisionen_verfolgen(
        self: Arc<Self>,
        mut feed: watch::Receiver<CollisionSnapshot>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    res = feed.changed() => {
                        if res.is_err() {
                            break;
                        }
                        let snapshot = *feed.borrow_and_update();
                        self.kollision_verarbeiten(snapshot);
                    }
                    res = shutdown.changed() => {
                        if res.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("Kollisionsverfolgung beendet");
        })
    }

    // -----------------------------------------------------------------------
    // Intern
    // -----------------------------------------------------------------------

    fn gesperrt_anwenden(&self, setting: MotorSetting) -> Fahrergebnis {
        let mut zustand = self.zustand.lock();
        if blockiert(&zustand.kollision, setting) {
            tracing::info!(
                links = setting.links,
                rechts = setting.rechts,
                "Fahrbefehl verweigert – Kollision in Fahrtrichtung"
            );
            return match self.anwenden(&mut zustand, MotorSetting::STOPP) {
                Fahrergebnis::Angewendet(_) => Fahrergebnis::Verweigert,
                andere => andere,
            };
        }
        self.anwenden(&mut zustand, setting)
    }

    fn ungesperrt_anwenden(&self, setting: MotorSetting) -> Fahrergebnis {
        let mut zustand = self.zustand.lock();
        self.anwenden(&mut zustand, setting)
    }

    fn anwenden(&self, zustand: &mut FahrZustand, setting: MotorSetting) -> Fahrergebnis {
        match self.antrieb.motor_setting_anwenden(setting) {
            Ok(()) => {
                zustand.aktuell = setting;
                Fahrergebnis::Angewendet(setting)
            }
            Err(e) => {
                tracing::error!(fehler = %e, "Motor-Setting konnte nicht angewendet werden");
                Fahrergebnis::Fehlgeschlagen
            }
        }
    }
}

/// true wenn `setting` gegen eine zuverlaessig gemessene Kollision faehrt
fn blockiert(snapshot: &CollisionSnapshot, setting: MotorSetting) -> bool {
    if snapshot.tainted {
        return false;
    }
    (setting.faehrt_vorwaerts() && snapshot.has_collision_front())
        || (setting.faehrt_rueckwaerts() && snapshot.has_collision_back())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
