//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Rover ohne Konfigurationsdatei
//! lauffaehig ist.

use std::time::Duration;

use rover_signaling::SignalingConfig;
use serde::{Deserialize, Serialize};

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Sitzungs-Einstellungen (Timeouts, Queues)
    pub sitzung: SitzungsEinstellungen,
    /// Antriebs-Einstellungen
    pub antrieb: AntriebsEinstellungen,
    /// Hardware-Auswahl
    pub hardware: HardwareEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Rovers
    pub name: String,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Rover".into(),
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer WebSocket und Observability
    pub bind_adresse: String,
    /// Port des WebSocket-Servers
    pub port: u16,
    /// Pfad der WebSocket-Route
    pub ws_pfad: String,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 8080,
            ws_pfad: "/rover".into(),
        }
    }
}

/// Sitzungs-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SitzungsEinstellungen {
    /// Idle-Timeout einer Verbindung in Millisekunden
    pub timeout_ms: u64,
    /// Intervall des Sitzungs-Aufraeumens in Millisekunden
    pub aufraeum_intervall_ms: u64,
    /// Ausgehende Queue pro Client
    pub send_queue_groesse: usize,
    /// Text an neue Clients solange der Killswitch aktiv ist
    pub sperr_nachricht: String,
}

impl Default for SitzungsEinstellungen {
    fn default() -> Self {
        let signaling = SignalingConfig::default();
        Self {
            timeout_ms: signaling.idle_timeout.as_millis() as u64,
            aufraeum_intervall_ms: signaling.aufraeum_intervall.as_millis() as u64,
            send_queue_groesse: signaling.send_queue_groesse,
            sperr_nachricht: signaling.sperr_nachricht,
        }
    }
}

/// Antriebs-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AntriebsEinstellungen {
    /// Skala von Geschwindigkeit und Drehrate der RPC-Methoden
    pub max_geschwindigkeit: i32,
    /// Abtastintervall des Kollisionssensors in Millisekunden
    pub kollision_abtast_ms: u64,
}

impl Default for AntriebsEinstellungen {
    fn default() -> Self {
        Self {
            max_geschwindigkeit: rover_motion::drive::MAX_GESCHWINDIGKEIT,
            kollision_abtast_ms: 100,
        }
    }
}

/// Hardware-Modus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HardwareModus {
    /// Simulierte Motor-, Servo- und Sensortreiber
    #[default]
    Simulation,
    /// Antrieb der nur aufzeichnet
    Protokoll,
}

/// Hardware-Einstellungen
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareEinstellungen {
    pub modus: HardwareModus,
    /// Logdatei fuer `getLoggingEntries` (leer = In-Memory-Protokoll)
    pub log_datei: Option<String>,
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen (Metriken + Health-Check)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Aktiviert den Observability-Server
    pub aktiviert: bool,
    /// Port fuer Metriken und Health (Standard: 9300)
    pub port: u16,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            port: 9300,
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let config = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str::<Self>(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Self::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
                ))
            }
        };
        config.pruefen()?;
        Ok(config)
    }

    /// Prueft Werte die serde allein nicht abfangen kann
    pub fn pruefen(&self) -> anyhow::Result<()> {
        if !rover_observability::logging::log_level_gueltig(&self.logging.level) {
            anyhow::bail!("Ungueltiges Log-Level '{}'", self.logging.level);
        }
        if !rover_observability::logging::log_format_gueltig(&self.logging.format) {
            anyhow::bail!("Ungueltiges Log-Format '{}'", self.logging.format);
        }
        if !self.netzwerk.ws_pfad.starts_with('/') {
            anyhow::bail!("ws_pfad muss mit '/' beginnen: '{}'", self.netzwerk.ws_pfad);
        }
        if self.antrieb.max_geschwindigkeit <= 0 {
            anyhow::bail!("max_geschwindigkeit muss positiv sein");
        }
        if self.sitzung.send_queue_groesse == 0 {
            anyhow::bail!("send_queue_groesse muss groesser als 0 sein");
        }
        Ok(())
    }

    /// Gibt die vollstaendige Bind-Adresse des WebSocket-Servers zurueck
    pub fn ws_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.port)
    }

    /// Gibt die Bind-Adresse fuer den Observability-Server zurueck
    pub fn observability_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.observability.port)
    }

    pub fn kollision_abtastintervall(&self) -> Duration {
        Duration::from_millis(self.antrieb.kollision_abtast_ms.max(1))
    }

    /// Einstellungen fuer den Signaling-Service
    pub fn signaling_config(&self) -> SignalingConfig {
        SignalingConfig {
            idle_timeout: Duration::from_millis(self.sitzung.timeout_ms),
            aufraeum_intervall: Duration::from_millis(self.sitzung.aufraeum_intervall_ms.max(1)),
            send_queue_groesse: self.sitzung.send_queue_groesse,
            sperr_nachricht: self.sitzung.sperr_nachricht.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ServerConfig::default();
        assert!(cfg.pruefen().is_ok());
        assert_eq!(cfg.netzwerk.port, 8080);
        assert_eq!(cfg.netzwerk.ws_pfad, "/rover");
        assert_eq!(cfg.sitzung.timeout_ms, 20_000);
        assert_eq!(cfg.antrieb.max_geschwindigkeit, 1000);
        assert_eq!(cfg.hardware.modus, HardwareModus::Simulation);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn bind_adressen() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.ws_bind_adresse(), "0.0.0.0:8080");
        assert_eq!(cfg.observability_bind_adresse(), "0.0.0.0:9300");
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [server]
            name = "Testrover"

            [netzwerk]
            port = 9000

            [sitzung]
            timeout_ms = 5000

            [hardware]
            modus = "protokoll"
            log_datei = "/var/log/syslog"
        "#;
        let cfg: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.server.name, "Testrover");
        assert_eq!(cfg.netzwerk.port, 9000);
        assert_eq!(cfg.hardware.modus, HardwareModus::Protokoll);
        assert_eq!(cfg.hardware.log_datei.as_deref(), Some("/var/log/syslog"));
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.netzwerk.ws_pfad, "/rover");
        assert_eq!(cfg.sitzung.aufraeum_intervall_ms, 20_000);

        let signaling = cfg.signaling_config();
        assert_eq!(signaling.idle_timeout, Duration::from_secs(5));
    }

    #[test]
    fn unbekannter_hardware_modus_ist_fehler() {
        let toml = r#"
            [hardware]
            modus = "i2c"
        "#;
        assert!(toml::from_str::<ServerConfig>(toml).is_err());
    }

    #[test]
    fn ungueltige_werte_werden_abgelehnt() {
        let mut cfg = ServerConfig::default();
        cfg.logging.level = "laut".into();
        assert!(cfg.pruefen().is_err());

        let mut cfg = ServerConfig::default();
        cfg.netzwerk.ws_pfad = "rover".into();
        assert!(cfg.pruefen().is_err());

        let mut cfg = ServerConfig::default();
        cfg.antrieb.max_geschwindigkeit = 0;
        assert!(cfg.pruefen().is_err());
    }

    #[test]
    fn fehlende_datei_liefert_standardwerte() {
        let cfg = ServerConfig::laden("/gibt/es/nicht/rover.toml").unwrap();
        assert_eq!(cfg.netzwerk.port, 8080);
    }
}
