//! Gemeinsamer Server-Zustand fuer das Rover-Backend
//!
//! Haelt alle geteilten Services als Arc-Referenzen, die sicher zwischen
//! tokio-Tasks geteilt werden koennen. Jede Verbindung bekommt eine Referenz
//! auf denselben `RoverState`; globale Singletons gibt es nicht.

use std::sync::Arc;
use std::time::Duration;

use rover_core::{ClientId, RoverEvent};
use rover_motion::hardware::{Kamera, SimulierteKamera, SpeicherProtokoll, SystemProtokoll};
use rover_motion::{Antrieb, DriveController, HeadController, ProtokollAntrieb};
use rover_observability::RoverMetrics;
use rover_protocol::{methods, JsonRpcRequest};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::arbitration::DriverLease;
use crate::killswitch::Killswitch;
use crate::policy::ConnectionPolicy;
use crate::registry::SessionRegistry;

/// Kapazitaet des internen Event-Kanals
const EVENT_KAPAZITAET: usize = 256;

/// Konfiguration fuer den Signaling-Service
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Inaktive Verbindungen werden nach dieser Zeit ohne Warnung getrennt
    pub idle_timeout: Duration,
    /// Intervall des Sitzungs-Aufraeumens
    pub aufraeum_intervall: Duration,
    /// Groesse der ausgehenden Queue pro Client
    pub send_queue_groesse: usize,
    /// Text an neue Clients solange der Killswitch aktiv ist
    pub sperr_nachricht: String,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_millis(20_000),
            aufraeum_intervall: Duration::from_millis(20_000),
            send_queue_groesse: 64,
            sperr_nachricht: "The rover is currently blocked by a developer.".to_string(),
        }
    }
}

/// Hardware-Faehigkeiten mit denen der Zustand aufgebaut wird
#[derive(Clone)]
pub struct RoverHardware {
    pub antrieb: Arc<dyn Antrieb>,
    pub kamera: Arc<dyn Kamera>,
    pub systemprotokoll: Arc<dyn SystemProtokoll>,
}

impl RoverHardware {
    /// Rein simulierte Hardware (protokollierender Antrieb)
    pub fn simuliert() -> Self {
        Self::mit_antrieb(Arc::new(ProtokollAntrieb::neu()))
    }

    /// Simulierte Kamera und Protokoll, gegebener Antrieb
    pub fn mit_antrieb(antrieb: Arc<dyn Antrieb>) -> Self {
        Self {
            antrieb,
            kamera: Arc::new(SimulierteKamera::neu()),
            systemprotokoll: Arc::new(SpeicherProtokoll::neu()),
        }
    }
}

/// Nutzlast von `updateRoverState`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoverZustand {
    /// `-1` wenn niemand faehrt
    pub current_driver_id: i64,
    pub is_killswitch_enabled: bool,
}

/// Gemeinsamer Server-Zustand (thread-safe, Arc-geteilt)
pub struct RoverState {
    pub config: Arc<SignalingConfig>,
    pub events: broadcast::Sender<RoverEvent>,
    pub policy: ConnectionPolicy,
    pub sitzungen: SessionRegistry,
    pub fahrer: DriverLease,
    pub killswitch: Killswitch,
    pub fahrt: Arc<DriveController>,
    pub kopf: Arc<HeadController>,
    pub kamera: Arc<dyn Kamera>,
    pub systemprotokoll: Arc<dyn SystemProtokoll>,
    pub metriken: RoverMetrics,
}

impl RoverState {
    /// Baut alle Services und verdrahtet sie miteinander
    pub fn neu(
        config: SignalingConfig,
        hardware: RoverHardware,
        fahrt: Arc<DriveController>,
        metriken: RoverMetrics,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_KAPAZITAET);
        let policy = ConnectionPolicy::neu(events.clone());
        let sitzungen = SessionRegistry::neu(
            policy.clone(),
            events.clone(),
            metriken.clone(),
            config.send_queue_groesse,
        );
        let killswitch = Killswitch::neu(sitzungen.clone(), fahrt.clone(), metriken.clone());
        let kopf = Arc::new(HeadController::neu(hardware.antrieb.clone()));

        Arc::new(Self {
            config: Arc::new(config),
            events,
            policy,
            sitzungen,
            fahrer: DriverLease::neu(),
            killswitch,
            fahrt,
            kopf,
            kamera: hardware.kamera,
            systemprotokoll: hardware.systemprotokoll,
            metriken,
        })
    }

    /// Zustand mit simulierter Hardware und Standard-Konfiguration
    pub fn simuliert(metriken: RoverMetrics) -> Arc<Self> {
        let hardware = RoverHardware::simuliert();
        let fahrt = Arc::new(DriveController::neu(hardware.antrieb.clone()));
        Self::neu(SignalingConfig::default(), hardware, fahrt, metriken)
    }

    pub fn rover_zustand(&self) -> RoverZustand {
        RoverZustand {
            current_driver_id: ClientId::als_wire_wert(self.fahrer.aktueller_fahrer()),
            is_killswitch_enabled: self.killswitch.ist_aktiv(),
        }
    }

    /// Sendet `updateRoverState` an alle Clients
    pub fn rover_zustand_senden(&self) {
        match serde_json::to_value(self.rover_zustand()) {
            Ok(zustand) => {
                self.sitzungen.an_alle_senden(&JsonRpcRequest::notification(
                    methods::UPDATE_ROVER_STATE,
                    vec![zustand],
                ));
            }
            Err(e) => tracing::error!(fehler = %e, "Rover-Zustand nicht serialisierbar"),
        }
    }
}
