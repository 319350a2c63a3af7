//! Motor-Setting fuer den Differentialantrieb

use serde::Serialize;

/// Geschwindigkeit der linken und rechten Antriebsseite, jeweils in `[-1, 1]`
///
/// Positive Werte fahren vorwaerts, negative rueckwaerts. Die Summe beider
/// Seiten bestimmt die Fahrtrichtung die von der Kollisionssperre geprueft
/// wird.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MotorSetting {
    pub links: f64,
    pub rechts: f64,
}

impl MotorSetting {
    pub const STOPP: Self = Self::roh(0.0, 0.0);
    pub const VORWAERTS: Self = Self::roh(1.0, 1.0);
    pub const RUECKWAERTS: Self = Self::roh(-1.0, -1.0);
    pub const LINKS_DREHEN: Self = Self::roh(-1.0, 1.0);
    pub const RECHTS_DREHEN: Self = Self::roh(1.0, -1.0);

    const fn roh(links: f64, rechts: f64) -> Self {
        Self { links, rechts }
    }

    /// Erstellt ein Setting, beide Seiten werden auf `[-1, 1]` begrenzt
    pub fn neu(links: f64, rechts: f64) -> Self {
        Self {
            links: begrenzen(links),
            rechts: begrenzen(rechts),
        }
    }

    pub fn faehrt_vorwaerts(&self) -> bool {
        self.links + self.rechts > 0.0
    }

    pub fn faehrt_rueckwaerts(&self) -> bool {
        self.links + self.rechts < 0.0
    }

    pub fn ist_stillstand(&self) -> bool {
        self.links == 0.0 && self.rechts == 0.0
    }
}

fn begrenzen(wert: f64) -> f64 {
    if wert.is_nan() {
        0.0
    } else {
        wert.clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fahrtrichtung() {
        assert!(MotorSetting::VORWAERTS.faehrt_vorwaerts());
        assert!(MotorSetting::RUECKWAERTS.faehrt_rueckwaerts());
        assert!(!MotorSetting::STOPP.faehrt_vorwaerts());
        assert!(!MotorSetting::STOPP.faehrt_rueckwaerts());
    }

    #[test]
    fn drehen_ist_weder_vor_noch_zurueck() {
        for s in [MotorSetting::LINKS_DREHEN, MotorSetting::RECHTS_DREHEN] {
            assert!(!s.faehrt_vorwaerts());
            assert!(!s.faehrt_rueckwaerts());
            assert!(!s.ist_stillstand());
        }
    }

    #[test]
    fn neu_begrenzt() {
        let s = MotorSetting::neu(3.0, f64::NAN);
        assert_eq!(s, MotorSetting::neu(1.0, 0.0));
        assert_eq!(MotorSetting::neu(-7.0, 0.5).links, -1.0);
    }
}
