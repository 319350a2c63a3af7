//! rover-server – Bibliotheks-Root
//!
//! Verdrahtet Hardware, Bewegungssteuerung, Signaling und Observability und
//! stellt den oeffentlichen Einstiegspunkt fuer Integrationstests bereit.

pub mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use config::{HardwareModus, ServerConfig};
use rover_motion::hardware::{
    DateiProtokoll, SimulierteKamera, SimulierterKollisionsSensor, SimulierterMotor, SimulierterServo,
    SpeicherProtokoll, SystemProtokoll,
};
use rover_motion::{
    Antrieb, CollisionFeed, DifferentialAlgorithmus, DriveController, HardwareAntrieb, ProtokollAntrieb,
};
use rover_observability::{HealthState, RoverMetrics};
use rover_signaling::{
    entwickleransicht_starten, kollisionsanzeige_starten, RoverHardware, RoverServer, RoverState,
};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Ein Messwert gilt als veraltet nach so vielen verpassten Abtastungen
const VERPASSTE_ABTASTUNGEN: u32 = 10;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
    state: Arc<RoverState>,
    feed: Arc<CollisionFeed>,
    sensor: Arc<SimulierterKollisionsSensor>,
}

impl Server {
    /// Baut Hardware und Services aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Result<Self> {
        let metriken = RoverMetrics::neu().context("Metriken konnten nicht registriert werden")?;

        let antrieb: Arc<dyn Antrieb> = match config.hardware.modus {
            HardwareModus::Simulation => Arc::new(HardwareAntrieb::neu(
                Arc::new(SimulierterMotor::neu()),
                Arc::new(SimulierterServo::neu()),
            )),
            HardwareModus::Protokoll => Arc::new(ProtokollAntrieb::neu()),
        };
        let systemprotokoll: Arc<dyn SystemProtokoll> = match &config.hardware.log_datei {
            Some(pfad) => Arc::new(DateiProtokoll::neu(pfad)),
            None => Arc::new(SpeicherProtokoll::neu()),
        };
        let hardware = RoverHardware {
            antrieb: Arc::clone(&antrieb),
            kamera: Arc::new(SimulierteKamera::neu()),
            systemprotokoll,
        };

        let fahrt = Arc::new(DriveController::mit_algorithmus(
            antrieb,
            Box::new(DifferentialAlgorithmus),
            config.antrieb.max_geschwindigkeit,
        ));
        let state = RoverState::neu(config.signaling_config(), hardware, fahrt, metriken);

        let sensor = Arc::new(SimulierterKollisionsSensor::neu());
        let feed = Arc::new(CollisionFeed::neu(
            sensor.clone(),
            config.kollision_abtastintervall(),
        ));

        Ok(Self {
            config,
            state,
            feed,
            sensor,
        })
    }

    pub fn state(&self) -> &Arc<RoverState> {
        &self.state
    }

    /// Simulierter Kollisionssensor (Werte von aussen setzbar)
    pub fn kollisionssensor(&self) -> &Arc<SimulierterKollisionsSensor> {
        &self.sensor
    }

    /// Startet alle Subsysteme und laeuft bis Ctrl-C
    pub async fn starten(self) -> Result<()> {
        let bind = self.config.ws_bind_adresse();
        let listener = TcpListener::bind(&bind)
            .await
            .with_context(|| format!("WebSocket-Adresse '{bind}' nicht bindbar"))?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("Shutdown-Signal empfangen, Server wird beendet"),
                Err(e) => tracing::error!(fehler = %e, "Ctrl-C-Handler fehlgeschlagen"),
            }
            let _ = shutdown_tx.send(true);
        });

        self.laufen(listener, shutdown_rx).await
    }

    /// Laeuft auf `listener` bis `shutdown` auf `true` wechselt
    ///
    /// Reihenfolge:
    /// 1. Kollisions-Feed und Kollisionssperre starten
    /// 2. Entwickleransicht, Kollisionsanzeige, Sitzungs-Aufraeumen starten
    /// 3. Observability-Server starten (falls aktiviert)
    /// 4. WebSocket-Server bedienen
    /// 5. Rover stoppen, Hintergrund-Tasks abwarten
    pub async fn laufen(self, listener: TcpListener, shutdown: watch::Receiver<bool>) -> Result<()> {
        let state = Arc::clone(&self.state);
        tracing::info!(
            rover = %self.config.server.name,
            ws = %self.config.ws_bind_adresse(),
            pfad = %self.config.netzwerk.ws_pfad,
            modus = ?self.config.hardware.modus,
            "Rover startet"
        );

        let mut tasks: Vec<JoinHandle<()>> = vec![
            Arc::clone(&self.feed).starten(shutdown.clone()),
            Arc::clone(&state.fahrt).kollisionen_verfolgen(self.feed.abonnieren(), shutdown.clone()),
            kollisionsanzeige_starten(Arc::clone(&state), self.feed.abonnieren(), shutdown.clone()),
            entwickleransicht_starten(Arc::clone(&state), shutdown.clone()),
            state
                .sitzungen
                .aufraeumen_starten(state.config.aufraeum_intervall, shutdown.clone()),
        ];

        if self.config.observability.aktiviert {
            tasks.push(self.observability_starten(shutdown.clone())?);
        }

        let lokale_addr = listener.local_addr()?;
        let server = RoverServer::neu(Arc::clone(&state), lokale_addr, self.config.netzwerk.ws_pfad.clone());
        let ergebnis = server.bedienen(listener, shutdown).await;

        // Ohne Verbindungen darf der Rover nicht weiterfahren
        state.fahrt.stoppen();
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(fehler = %e, "Hintergrund-Task abgebrochen");
            }
        }
        tracing::info!("Rover gestoppt");

        ergebnis.context("WebSocket-Server fehlgeschlagen")
    }

    fn observability_starten(&self, shutdown: watch::Receiver<bool>) -> Result<JoinHandle<()>> {
        let bind: SocketAddr = self
            .config
            .observability_bind_adresse()
            .parse()
            .context("Ungueltige Observability-Adresse")?;

        let feed = Arc::clone(&self.feed);
        let max_alter = self.config.kollision_abtastintervall() * VERPASSTE_ABTASTUNGEN;
        let max_alter = max_alter.max(Duration::from_secs(1));
        let state = Arc::clone(&self.state);
        let health = HealthState::neu(
            move || feed.aktuell().alter(Utc::now()) <= max_alter,
            move || state.sitzungen.anzahl_verbunden(),
        );

        let metriken = self.state.metriken.clone();
        Ok(tokio::spawn(async move {
            if let Err(e) =
                rover_observability::observability_server_starten(bind, metriken, health, shutdown).await
            {
                tracing::error!(fehler = %e, "Observability-Server fehlgeschlagen");
            }
        }))
    }
}
