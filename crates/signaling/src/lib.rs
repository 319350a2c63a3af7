//! rover-signaling – WebSocket Control Layer
//!
//! Dieser Crate implementiert Sitzungen, Verbindungs-Policy, Fahrer-
//! Arbitrierung, Killswitch und den JSON-RPC-Dispatch des Rovers.
//!
//! ## Architektur
//!
//! ```text
//! WebSocket Listener (RoverServer)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein Task)
//!     |  Send-Queue -> Socket, Frames -> Dispatcher
//!     |
//!     v
//! RpcDispatcher  (Schema-Pruefung, Killswitch/Sperr-Gate)
//!     |
//!     +-- FahrHandler       (Fahren, Drehen, Stopp, Kopf)
//!     +-- RoverHandler      (Ping, Killswitch, Fahrerrolle, Client-Info)
//!     +-- EntwicklerHandler (IP-Sperren, Alarmmeldungen)
//!     +-- SystemHandler     (Kamerabild, Systemprotokoll, Laufzeit)
//!
//! SessionRegistry   – Verbundene Clients und ihre Send-Queues
//! ConnectionPolicy  – Clients nach IP gruppiert, gesperrte IPs
//! DriverLease       – Wer darf fahren
//! Killswitch        – Sperrt alle Bewegungsbefehle
//! Entwickleransicht – Benutzerliste und Kollisionsanzeige
//! ```

pub mod arbitration;
pub mod broadcast;
pub mod connection;
pub mod developer;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod killswitch;
pub mod policy;
pub mod registry;
pub mod server_state;
pub mod ws;

// Bequeme Re-Exporte
pub use arbitration::DriverLease;
pub use broadcast::ClientSender;
pub use connection::ClientConnection;
pub use developer::{entwickleransicht_starten, kollisionsanzeige_starten};
pub use dispatcher::{Gate, RpcDispatcher, RpcKontext};
pub use error::{SignalingError, SignalingResult};
pub use killswitch::Killswitch;
pub use policy::{ConnectionGroup, ConnectionPolicy};
pub use registry::{ClientSession, NeueSitzung, SessionRegistry};
pub use server_state::{RoverHardware, RoverState, RoverZustand, SignalingConfig};
pub use ws::RoverServer;
