//! Hardware-Faehigkeiten des Rovers
//!
//! Motor-PWM, A/D-Wandler der Kollisionssensoren, Servos, Kamera und das
//! Systemprotokoll sind duenne IO-Schichten. Das Backend kennt sie nur ueber
//! diese Traits. Die `Simulierte*`-Typen ersetzen die echte Hardware beim
//! Betrieb ohne Rover und in Tests.
//!
//! Alle Methoden sind blockierend; asynchrone Aufrufer nutzen
//! `tokio::task::spawn_blocking`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};

use crate::collision::SensorWerte;
use crate::error::{MotionError, MotionResult};

// ---------------------------------------------------------------------------
// Kanaele
// ---------------------------------------------------------------------------

/// Antriebsseite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotorKanal {
    Links,
    Rechts,
}

/// Achse des Kamerakopfs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServoAchse {
    Horizontal,
    Vertikal,
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Motortreiber (PWM)
pub trait MotorTreiber: Send + Sync {
    /// Setzt die Geschwindigkeit eines Kanals, `prozent` in `[-1, 1]`
    fn geschwindigkeit_setzen(&self, kanal: MotorKanal, prozent: f64) -> MotionResult<()>;
}

/// Servotreiber des Kamerakopfs
pub trait ServoTreiber: Send + Sync {
    fn position_setzen(&self, achse: ServoAchse, wert: i32) -> MotionResult<()>;
}

/// Kollisionssensoren (Infrarot ueber A/D-Wandler)
pub trait KollisionsSensor: Send + Sync {
    fn lesen(&self) -> MotionResult<SensorWerte>;
}

/// Kamera
pub trait Kamera: Send + Sync {
    /// Nimmt ein Einzelbild auf (JPEG-Bytes)
    fn aufnehmen(&self) -> MotionResult<Vec<u8>>;
}

/// Zugriff auf das Systemprotokoll und die Laufzeit des Rovers
pub trait SystemProtokoll: Send + Sync {
    /// Alle Eintraege nach `letzter`; `None` oder leer liefert alle
    ///
    /// Ist `letzter` nicht (mehr) im Protokoll enthalten, wird
    /// `MotionError::EintragNichtGefunden` geliefert.
    fn eintraege_nach(&self, letzter: Option<&str>) -> MotionResult<Vec<String>>;

    /// Laufzeit des Systems als lesbarer Text
    fn laufzeit(&self) -> MotionResult<String>;
}

/// Eintraege nach dem letzten Vorkommen von `letzter`
fn eintraege_nach_letztem(zeilen: &[String], letzter: Option<&str>) -> MotionResult<Vec<String>> {
    match letzter.filter(|l| !l.is_empty()) {
        None => Ok(zeilen.to_vec()),
        Some(l) => zeilen
            .iter()
            .rposition(|z| z == l)
            .map(|pos| zeilen[pos + 1..].to_vec())
            .ok_or_else(|| MotionError::EintragNichtGefunden(l.to_string())),
    }
}

/// Formatiert eine Laufzeit in Sekunden wie `uptime -p`
pub fn laufzeit_formatieren(sekunden: u64) -> String {
    let tage = sekunden / 86_400;
    let stunden = (sekunden % 86_400) / 3_600;
    let minuten = (sekunden % 3_600) / 60;

    let mut teile = Vec::new();
    if tage > 0 {
        teile.push(format!("{tage} days"));
    }
    if stunden > 0 {
        teile.push(format!("{stunden} hours"));
    }
    teile.push(format!("{minuten} minutes"));
    format!("up {}", teile.join(", "))
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// Motortreiber ohne Hardware, merkt sich den letzten Wert pro Kanal
#[derive(Debug, Default)]
pub struct SimulierterMotor {
    kanaele: Mutex<HashMap<MotorKanal, f64>>,
}

impl SimulierterMotor {
    pub fn neu() -> Self {
        Self::default()
    }

    pub fn geschwindigkeit(&self, kanal: MotorKanal) -> f64 {
        self.kanaele.lock().get(&kanal).copied().unwrap_or(0.0)
    }
}

impl MotorTreiber for SimulierterMotor {
    fn geschwindigkeit_setzen(&self, kanal: MotorKanal, prozent: f64) -> MotionResult<()> {
        tracing::trace!(?kanal, prozent, "Simulierter Motor");
        self.kanaele.lock().insert(kanal, prozent);
        Ok(())
    }
}

/// Servotreiber ohne Hardware
#[derive(Debug, Default)]
pub struct SimulierterServo {
    achsen: Mutex<HashMap<ServoAchse, i32>>,
}

impl SimulierterServo {
    pub fn neu() -> Self {
        Self::default()
    }

    pub fn position(&self, achse: ServoAchse) -> i32 {
        self.achsen.lock().get(&achse).copied().unwrap_or(0)
    }
}

impl ServoTreiber for SimulierterServo {
    fn position_setzen(&self, achse: ServoAchse, wert: i32) -> MotionResult<()> {
        tracing::trace!(?achse, wert, "Simulierter Servo");
        self.achsen.lock().insert(achse, wert);
        Ok(())
    }
}

/// Kollisionssensor dessen Werte von aussen gesetzt werden
#[derive(Debug, Default)]
pub struct SimulierterKollisionsSensor {
    werte: Mutex<SensorWerte>,
}

impl SimulierterKollisionsSensor {
    pub fn neu() -> Self {
        Self::default()
    }

    pub fn setzen(&self, werte: SensorWerte) {
        *self.werte.lock() = werte;
    }
}

impl KollisionsSensor for SimulierterKollisionsSensor {
    fn lesen(&self) -> MotionResult<SensorWerte> {
        Ok(*self.werte.lock())
    }
}

/// Kamera die ein festes Testbild liefert
#[derive(Debug, Clone)]
pub struct SimulierteKamera {
    bild: Vec<u8>,
}

impl SimulierteKamera {
    /// Minimaler JPEG-Rahmen (SOI + EOI)
    pub fn neu() -> Self {
        Self::mit_bild(vec![0xFF, 0xD8, 0xFF, 0xD9])
    }

    pub fn mit_bild(bild: Vec<u8>) -> Self {
        Self { bild }
    }
}

impl Default for SimulierteKamera {
    fn default() -> Self {
        Self::neu()
    }
}

impl Kamera for SimulierteKamera {
    fn aufnehmen(&self) -> MotionResult<Vec<u8>> {
        Ok(self.bild.clone())
    }
}

/// Systemprotokoll im Speicher, Laufzeit seit Erstellung
#[derive(Debug)]
pub struct SpeicherProtokoll {
    zeilen: RwLock<Vec<String>>,
    gestartet: Instant,
}

impl SpeicherProtokoll {
    pub fn neu() -> Self {
        Self {
            zeilen: RwLock::new(Vec::new()),
            gestartet: Instant::now(),
        }
    }

    pub fn eintrag_hinzufuegen(&self, zeile: impl Into<String>) {
        self.zeilen.write().push(zeile.into());
    }
}

impl Default for SpeicherProtokoll {
    fn default() -> Self {
        Self::neu()
    }
}

impl SystemProtokoll for SpeicherProtokoll {
    fn eintraege_nach(&self, letzter: Option<&str>) -> MotionResult<Vec<String>> {
        eintraege_nach_letztem(&self.zeilen.read(), letzter)
    }

    fn laufzeit(&self) -> MotionResult<String> {
        Ok(laufzeit_formatieren(self.gestartet.elapsed().as_secs()))
    }
}

/// Systemprotokoll aus einer Logdatei; Laufzeit aus `/proc/uptime`
#[derive(Debug, Clone)]
pub struct DateiProtokoll {
    pfad: PathBuf,
}

impl DateiProtokoll {
    pub fn neu(pfad: impl Into<PathBuf>) -> Self {
        Self { pfad: pfad.into() }
    }
}

impl SystemProtokoll for DateiProtokoll {
    fn eintraege_nach(&self, letzter: Option<&str>) -> MotionResult<Vec<String>> {
        let inhalt = std::fs::read_to_string(&self.pfad)?;
        let zeilen: Vec<String> = inhalt
            .lines()
            .filter(|z| !z.trim().is_empty())
            .map(str::to_string)
            .collect();
        eintraege_nach_letztem(&zeilen, letzter)
    }

    fn laufzeit(&self) -> MotionResult<String> {
        let inhalt = std::fs::read_to_string("/proc/uptime")?;
        let sekunden = inhalt
            .split_whitespace()
            .next()
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| MotionError::NichtVerfuegbar("/proc/uptime unlesbar".into()))?;
        Ok(laufzeit_formatieren(sekunden as u64))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
