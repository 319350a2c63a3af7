//! Fahralgorithmus: Joystick-Eingabe → Motor-Setting

use crate::setting::MotorSetting;

/// Aufloesung der berechneten Werte; glaettet Rundungsfehler von sin/cos
const AUFLOESUNG: f64 = 1e9;

/// Rechnet Winkel und Geschwindigkeit in ein Differential-Setting um
pub trait FahrAlgorithmus: Send + Sync {
    /// `winkel` in Grad (0 = geradeaus, 90 = rechts), `geschwindigkeit` in Prozent
    fn berechnen(&self, winkel: i32, geschwindigkeit: i32) -> MotorSetting;
}

/// Standardalgorithmus fuer einen Differentialantrieb
///
/// Die Richtung wird in einen Einheitsvektor zerlegt (`y` nach vorne,
/// `x` nach rechts). Links = y + x, rechts = y - x; das Ergebnis wird so
/// normiert dass keine Seite ueber 1 liegt und mit der Geschwindigkeit
/// skaliert.
#[derive(Debug, Clone, Copy, Default)]
pub struct DifferentialAlgorithmus;

impl FahrAlgorithmus for DifferentialAlgorithmus {
    fn berechnen(&self, winkel: i32, geschwindigkeit: i32) -> MotorSetting {
        let faktor = f64::from(geschwindigkeit.clamp(0, 100)) / 100.0;
        let bogen = f64::from(winkel).to_radians();
        let y = bogen.cos();
        let x = bogen.sin();

        let links = y + x;
        let rechts = y - x;
        let norm = links.abs().max(rechts.abs()).max(1.0);

        MotorSetting::neu(
            runden(links / norm * faktor),
            runden(rechts / norm * faktor),
        )
    }
}

fn runden(wert: f64) -> f64 {
    (wert * AUFLOESUNG).round() / AUFLOESUNG
}
