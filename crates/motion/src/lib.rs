//! rover-motion – Bewegungssteuerung des Rovers
//!
//! Enthaelt alles was Motoren und Servos bewegt oder Kollisionsdaten
//! liefert:
//!
//! - `hardware`  – Faehigkeiten der Hardware (Motor, Servo, Sensor, Kamera,
//!   Systemprotokoll) mit simulierten Implementierungen
//! - `actuator`  – `Antrieb`: wendet Motor-Settings und Kopfpositionen an
//! - `setting`   – `MotorSetting` (Differentialantrieb)
//! - `algorithm` – Umrechnung Winkel/Geschwindigkeit → `MotorSetting`
//! - `collision` – `CollisionSnapshot` und der periodische `CollisionFeed`
//! - `drive`     – `DriveController` mit Kollisionssperre
//! - `head`      – `HeadController` fuer den Kamerakopf

pub mod actuator;
pub mod algorithm;
pub mod collision;
pub mod drive;
pub mod error;
pub mod hardware;
pub mod head;
pub mod setting;

pub use actuator::{Antrieb, HardwareAntrieb, ProtokollAntrieb};
pub use algorithm::{DifferentialAlgorithmus, FahrAlgorithmus};
pub use collision::{CollisionFeed, CollisionSnapshot, SensorWerte};
pub use drive::{DriveController, Fahrergebnis};
pub use error::{MotionError, MotionResult};
pub use head::{HeadController, KopfPosition};
pub use setting::MotorSetting;
