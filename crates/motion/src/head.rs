//! Kopfsteuerung (Kamera-Servos)
//!
//! Jede Achse wird als Akkumulator gefuehrt. Winkel in Grad werden in
//! Servo-Positionen umgerechnet:
//!
//! ```text
//! delta = (winkel * 3600 * POS_MAX) / 216000
//! ```
//!
//! also Bogensekunden skaliert auf `POS_MAX / (60 * 3600)`, ganzzahlig mit
//! abschneidender Division. Intern wird der ungeteilte Zaehler summiert, so
//! dass mehrere Bewegungen exakt dieselbe Position ergeben wie eine einzige
//! Bewegung um die Winkelsumme.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::actuator::Antrieb;
use crate::error::MotionResult;

pub const POS_MIN: i32 = -1000;
pub const POS_MAX: i32 = 1000;
pub const POS_NEUTRAL: i32 = 0;

/// Nenner der Umrechnung Grad → Position (60 Grad in Bogensekunden)
const NENNER: i64 = 60 * 3600;

/// Servo-Position des Kamerakopfs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct KopfPosition {
    pub horizontal: i32,
    pub vertikal: i32,
}

impl KopfPosition {
    pub const NEUTRAL: Self = Self {
        horizontal: POS_NEUTRAL,
        vertikal: POS_NEUTRAL,
    };
}

/// Umrechnung Grad → Positionsdelta
pub fn grad_in_position(winkel: i32) -> i32 {
    (zaehler(winkel) / NENNER) as i32
}

fn zaehler(winkel: i32) -> i64 {
    i64::from(winkel) * 3600 * i64::from(POS_MAX)
}

/// Akkumulator einer Achse (Zaehler vor der Division)
#[derive(Debug, Clone, Copy)]
struct Achse {
    roh: i64,
}

impl Achse {
    const NEUTRAL: Self = Self {
        roh: POS_NEUTRAL as i64 * NENNER,
    };

    fn bewegt(self, winkel: i32) -> Self {
        let min = i64::from(POS_MIN) * NENNER;
        let max = i64::from(POS_MAX) * NENNER;
        Self {
            roh: (self.roh + zaehler(winkel)).clamp(min, max),
        }
    }

    fn position(self) -> i32 {
        (self.roh / NENNER) as i32
    }
}

#[derive(Debug, Clone, Copy)]
struct KopfZustand {
    horizontal: Achse,
    vertikal: Achse,
}

impl KopfZustand {
    const NEUTRAL: Self = Self {
        horizontal: Achse::NEUTRAL,
        vertikal: Achse::NEUTRAL,
    };

    fn position(&self) -> KopfPosition {
        KopfPosition {
            horizontal: self.horizontal.position(),
            vertikal: self.vertikal.position(),
        }
    }
}

/// Steuert den Kamerakopf
///
/// Eine neue Position wird erst uebernommen wenn der Antrieb sie erfolgreich
/// angewendet hat.
pub struct HeadController {
    antrieb: Arc<dyn Antrieb>,
    zustand: Mutex<KopfZustand>,
}

impl HeadController {
    pub fn neu(antrieb: Arc<dyn Antrieb>) -> Self {
        Self {
            antrieb,
            zustand: Mutex::new(KopfZustand::NEUTRAL),
        }
    }

    pub fn position(&self) -> KopfPosition {
        self.zustand.lock().position()
    }

    pub fn hoch_drehen(&self, winkel: i32) -> MotionResult<KopfPosition> {
        self.bewegen(|z| z.vertikal = z.vertikal.bewegt(betrag(winkel)))
    }

    pub fn runter_drehen(&self, winkel: i32) -> MotionResult<KopfPosition> {
        self.bewegen(|z| z.vertikal = z.vertikal.bewegt(-betrag(winkel)))
    }

    pub fn links_drehen(&self, winkel: i32) -> MotionResult<KopfPosition> {
        self.bewegen(|z| z.horizontal = z.horizontal.bewegt(-betrag(winkel)))
    }

    pub fn rechts_drehen(&self, winkel: i32) -> MotionResult<KopfPosition> {
        self.bewegen(|z| z.horizontal = z.horizontal.bewegt(betrag(winkel)))
    }

    /// Setzt beide Achsen auf die Mittelstellung
    pub fn zuruecksetzen(&self) -> MotionResult<KopfPosition> {
        self.bewegen(|z| *z = KopfZustand::NEUTRAL)
    }

    fn bewegen(&self, aenderung: impl FnOnce(&mut KopfZustand)) -> MotionResult<KopfPosition> {
        let mut zustand = self.zustand.lock();
        let mut neu = *zustand;
        aenderung(&mut neu);

        let position = neu.position();
        if let Err(e) = self.antrieb.kopfposition_anwenden(position) {
            tracing::error!(fehler = %e, "Kopfposition konnte nicht angewendet werden");
            return Err(e);
        }
        *zustand = neu;
        Ok(position)
    }
}

/// |winkel| ohne Ueberlauf bei i32::MIN
fn betrag(winkel: i32) -> i32 {
    winkel.checked_abs().unwrap_or(i32::MAX)
}
