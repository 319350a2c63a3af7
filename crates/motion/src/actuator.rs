//! Antrieb – wendet Motor-Settings und Kopfpositionen an
//!
//! `DriveController` und `HeadController` sprechen nur mit diesem Trait.
//! `HardwareAntrieb` leitet an Motor- und Servotreiber weiter,
//! `ProtokollAntrieb` zeichnet nur auf und kann Fehler simulieren.
//!
//! Ein fehlgeschlagener Aufruf hinterlaesst die Hardware im vorherigen
//! Zustand: schlaegt der zweite Kanal fehl, wird der erste zurueckgesetzt.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{MotionError, MotionResult};
use crate::hardware::{MotorKanal, MotorTreiber, ServoAchse, ServoTreiber};
use crate::head::KopfPosition;
use crate::setting::MotorSetting;

/// Faehigkeit Motoren und Kamerakopf zu bewegen
pub trait Antrieb: Send + Sync {
    fn motor_setting_anwenden(&self, setting: MotorSetting) -> MotionResult<()>;
    fn kopfposition_anwenden(&self, position: KopfPosition) -> MotionResult<()>;
}

// ---------------------------------------------------------------------------
// HardwareAntrieb
// ---------------------------------------------------------------------------

/// Antrieb ueber echte (oder simulierte) Treiber
///
/// Merkt sich den zuletzt vollstaendig angewendeten Wert je Geraet, um bei
/// einem Teilfehler den ersten Kanal zurueckzusetzen.
pub struct HardwareAntrieb {
    motoren: Arc<dyn MotorTreiber>,
    servos: Arc<dyn ServoTreiber>,
    letztes_setting: Mutex<MotorSetting>,
    letzte_position: Mutex<KopfPosition>,
}

impl HardwareAntrieb {
    pub fn neu(motoren: Arc<dyn MotorTreiber>, servos: Arc<dyn ServoTreiber>) -> Self {
        Self {
            motoren,
            servos,
            letztes_setting: Mutex::new(MotorSetting::STOPP),
            letzte_position: Mutex::new(KopfPosition::default()),
        }
    }
}

impl Antrieb for HardwareAntrieb {
    fn motor_setting_anwenden(&self, setting: MotorSetting) -> MotionResult<()> {
        let mut letztes = self.letztes_setting.lock();
        self.motoren
            .geschwindigkeit_setzen(MotorKanal::Links, setting.links)?;
        if let Err(e) = self
            .motoren
            .geschwindigkeit_setzen(MotorKanal::Rechts, setting.rechts)
        {
            if let Err(rueck) = self
                .motoren
                .geschwindigkeit_setzen(MotorKanal::Links, letztes.links)
            {
                tracing::error!(fehler = %rueck, "Linker Motor konnte nicht zurueckgesetzt werden");
            }
            return Err(e);
        }
        *letztes = setting;
        tracing::debug!(links = setting.links, rechts = setting.rechts, "Motor-Setting angewendet");
        Ok(())
    }

    fn kopfposition_anwenden(&self, position: KopfPosition) -> MotionResult<()> {
        let mut letzte = self.letzte_position.lock();
        self.servos
            .position_setzen(ServoAchse::Horizontal, position.horizontal)?;
        if let Err(e) = self
            .servos
            .position_setzen(ServoAchse::Vertikal, position.vertikal)
        {
            if let Err(rueck) = self
                .servos
                .position_setzen(ServoAchse::Horizontal, letzte.horizontal)
            {
                tracing::error!(fehler = %rueck, "Horizontaler Servo konnte nicht zurueckgesetzt werden");
            }
            return Err(e);
        }
        *letzte = position;
        tracing::debug!(
            horizontal = position.horizontal,
            vertikal = position.vertikal,
            "Kopfposition angewendet"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ProtokollAntrieb
// ---------------------------------------------------------------------------

/// Anzahl aufbewahrter Aufrufe je Art, aeltere fallen heraus
pub const PROTOKOLL_KAPAZITAET: usize = 256;

/// Antrieb ohne Hardware der die letzten Aufrufe aufzeichnet
#[derive(Debug, Default)]
pub struct ProtokollAntrieb {
    settings: Mutex<VecDeque<MotorSetting>>,
    positionen: Mutex<VecDeque<KopfPosition>>,
    fehler: AtomicBool,
}

impl ProtokollAntrieb {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Solange aktiv schlaegt jeder Aufruf mit einem IO-Fehler fehl
    pub fn fehler_simulieren(&self, aktiv: bool) {
        self.fehler.store(aktiv, Ordering::SeqCst);
    }

    /// Die letzten angewendeten Settings, aelteste zuerst
    pub fn angewendete_settings(&self) -> Vec<MotorSetting> {
        self.settings.lock().iter().copied().collect()
    }

    pub fn letztes_setting(&self) -> Option<MotorSetting> {
        self.settings.lock().back().copied()
    }

    pub fn angewendete_positionen(&self) -> Vec<KopfPosition> {
        self.positionen.lock().iter().copied().collect()
    }

    fn pruefen(&self) -> MotionResult<()> {
        if self.fehler.load(Ordering::SeqCst) {
            return Err(MotionError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "simulierter Hardwarefehler",
            )));
        }
        Ok(())
    }
}

impl Antrieb for ProtokollAntrieb {
    fn motor_setting_anwenden(&self, setting: MotorSetting) -> MotionResult<()> {
        self.pruefen()?;
        tracing::info!(links = setting.links, rechts = setting.rechts, "Motor-Setting (Protokoll)");
        anhaengen(&mut self.settings.lock(), setting);
        Ok(())
    }

    fn kopfposition_anwenden(&self, position: KopfPosition) -> MotionResult<()> {
        self.pruefen()?;
        tracing::info!(
            horizontal = position.horizontal,
            vertikal = position.vertikal,
            "Kopfposition (Protokoll)"
        );
        anhaengen(&mut self.positionen.lock(), position);
        Ok(())
    }
}

fn anhaengen<T>(historie: &mut VecDeque<T>, eintrag: T) {
    if historie.len() == PROTOKOLL_KAPAZITAET {
        historie.pop_front();
    }
    historie.push_back(eintrag);
}
