//! rover-protocol – JSON-RPC 2.0 Protokoll
//!
//! Dieses Crate definiert die Nachrichten die zwischen Web-Client und
//! Rover-Backend ueber die WebSocket-Verbindung ausgetauscht werden:
//! Requests, Notifications, Responses, Methodennamen und die
//! Parameter-Schemata der positionalen Parameterlisten.

pub mod error;
pub mod jsonrpc;
pub mod methods;
pub mod params;

pub use error::{ProtocolError, ProtocolResult};
pub use jsonrpc::{Eingehend, FehlerAntwort, JsonRpcError, JsonRpcRequest, JsonRpcResponse, JSONRPC_VERSION};
pub use params::{ParamTyp, Params};
