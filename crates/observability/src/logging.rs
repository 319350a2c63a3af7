//! Structured Logging via tracing-subscriber
//!
//! Level und Format kommen aus der Konfiguration; `ROVER_LOG_LEVEL` und
//! `ROVER_LOG_FORMAT` ueberschreiben sie. Client-IDs und Methodennamen
//! werden als Felder geloggt (`client_id = %id`, `method = %name`).

use std::str::FromStr;

use tracing_subscriber::{fmt, EnvFilter};

pub const ENV_LEVEL: &str = "ROVER_LOG_LEVEL";
pub const ENV_FORMAT: &str = "ROVER_LOG_FORMAT";

/// Ausgabeformat des Subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            anderes => Err(format!("unbekanntes Log-Format '{anderes}'")),
        }
    }
}

/// Wirksame Logging-Einstellungen nach Umgebungs-Overrides
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEinstellungen {
    /// Filter-Direktive fuer `EnvFilter`, z.B. `info` oder `rover_signaling=debug`
    pub filter: String,
    pub format: LogFormat,
}

impl LogEinstellungen {
    /// Konfigurierte Werte, ueberschrieben durch die Prozessumgebung
    pub fn mit_umgebung(level: &str, format: &str) -> Self {
        Self::mit_overrides(level, format, |name| std::env::var(name).ok())
    }

    /// Wie `mit_umgebung`, die Variablen kommen aber aus `lesen`
    pub fn mit_overrides(level: &str, format: &str, lesen: impl Fn(&str) -> Option<String>) -> Self {
        let filter = lesen(ENV_LEVEL)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| level.to_string());
        let format_text = lesen(ENV_FORMAT).unwrap_or_else(|| format.to_string());
        let format = format_text.parse().unwrap_or_else(|e| {
            eprintln!("{e}, verwende text");
            LogFormat::Text
        });
        Self { filter, format }
    }
}

/// Installiert den globalen Subscriber
///
/// Gibt `false` zurueck wenn bereits einer installiert war (z.B. in Tests).
pub fn logging_initialisieren(level: &str, format: &str) -> bool {
    let einstellungen = LogEinstellungen::mit_umgebung(level, format);
    let filter = EnvFilter::try_new(&einstellungen.filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let ergebnis = match einstellungen.format {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => fmt().with_env_filter(filter).with_target(true).try_init(),
    };
    ergebnis.is_ok()
}

/// Validiert ob ein Log-Level-String gueltig ist.
pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

/// Validiert ob ein Log-Format-String gueltig ist.
pub fn log_format_gueltig(format: &str) -> bool {
    LogFormat::from_str(format).is_ok()
}
