//! Fahr-Handler – Antrieb und Kamerakopf
//!
//! Alle Methoden hier sind durch die Bewegungssperre des Dispatchers
//! geschuetzt. Fahrbefehle liefern `true` wenn das Setting angewendet wurde
//! und `false` wenn die Kollisionssperre statt dessen gestoppt hat.
//! Hardwarefehler werden als `-32603` gemeldet.

use std::sync::Arc;

use rover_motion::{Fahrergebnis, KopfPosition, MotionResult};
use rover_protocol::{JsonRpcError, Params};
use serde_json::Value;

use crate::dispatcher::{HandlerErgebnis, RpcKontext};
use crate::error::SignalingError;
use crate::server_state::RoverState;

fn fahrergebnis(ctx: &RpcKontext, ergebnis: Fahrergebnis) -> HandlerErgebnis {
    match ergebnis {
        Fahrergebnis::Angewendet(_) => Ok(Value::Bool(true)),
        Fahrergebnis::Verweigert => {
            tracing::info!(client_id = %ctx.client_id, "Fahrbefehl durch Kollisionssperre verweigert");
            Ok(Value::Bool(false))
        }
        Fahrergebnis::Fehlgeschlagen => Err(JsonRpcError::internal_error(
            "Motor-Setting konnte nicht angewendet werden",
        )),
    }
}

fn kopfergebnis(ergebnis: MotionResult<KopfPosition>) -> HandlerErgebnis {
    let position = ergebnis.map_err(SignalingError::from)?;
    serde_json::to_value(position).map_err(|e| SignalingError::intern(e.to_string()).into())
}

// ---------------------------------------------------------------------------
// Antrieb
// ---------------------------------------------------------------------------

/// `driveForward(speed)`
pub fn handle_drive_forward(state: &Arc<RoverState>, ctx: &RpcKontext, params: &Params) -> HandlerErgebnis {
    let speed = params.zahl_i32(0)?;
    tracing::debug!(client_id = %ctx.client_id, speed, "driveForward");
    fahrergebnis(ctx, state.fahrt.fahren(speed, 0))
}

/// `driveBackward(speed)`
pub fn handle_drive_backward(state: &Arc<RoverState>, ctx: &RpcKontext, params: &Params) -> HandlerErgebnis {
    let speed = params.zahl_i32(0)?;
    tracing::debug!(client_id = %ctx.client_id, speed, "driveBackward");
    fahrergebnis(ctx, state.fahrt.fahren(speed.saturating_neg(), 0))
}

/// `turnLeft(rate)`
pub fn handle_turn_left(state: &Arc<RoverState>, ctx: &RpcKontext, params: &Params) -> HandlerErgebnis {
    let rate = params.zahl_i32(0)?;
    tracing::debug!(client_id = %ctx.client_id, rate, "turnLeft");
    fahrergebnis(ctx, state.fahrt.fahren(0, rate))
}

/// `turnRight(rate)`
pub fn handle_turn_right(state: &Arc<RoverState>, ctx: &RpcKontext, params: &Params) -> HandlerErgebnis {
    let rate = params.zahl_i32(0)?;
    tracing::debug!(client_id = %ctx.client_id, rate, "turnRight");
    fahrergebnis(ctx, state.fahrt.fahren(0, rate.saturating_neg()))
}

/// `stop()`
pub fn handle_stop(state: &Arc<RoverState>, ctx: &RpcKontext, _params: &Params) -> HandlerErgebnis {
    tracing::debug!(client_id = %ctx.client_id, "stop");
    fahrergebnis(ctx, state.fahrt.stoppen())
}

/// `setContinuousDriving(angle, speed)`
pub fn handle_continuous_driving(state: &Arc<RoverState>, ctx: &RpcKontext, params: &Params) -> HandlerErgebnis {
    let winkel = params.zahl_i32(0)?;
    let geschwindigkeit = params.zahl_i32(1)?;
    tracing::trace!(client_id = %ctx.client_id, winkel, geschwindigkeit, "setContinuousDriving");
    fahrergebnis(ctx, state.fahrt.kontinuierlich_fahren(winkel, geschwindigkeit))
}

// ---------------------------------------------------------------------------
// Kamerakopf
// ---------------------------------------------------------------------------

pub fn handle_head_up(state: &Arc<RoverState>, _ctx: &RpcKontext, params: &Params) -> HandlerErgebnis {
    kopfergebnis(state.kopf.hoch_drehen(params.zahl_i32(0)?))
}

pub fn handle_head_down(state: &Arc<RoverState>, _ctx: &RpcKontext, params: &Params) -> HandlerErgebnis {
    kopfergebnis(state.kopf.runter_drehen(params.zahl_i32(0)?))
}

pub fn handle_head_left(state: &Arc<RoverState>, _ctx: &RpcKontext, params: &Params) -> HandlerErgebnis {
    kopfergebnis(state.kopf.links_drehen(params.zahl_i32(0)?))
}

pub fn handle_head_right(state: &Arc<RoverState>, _ctx: &RpcKontext, params: &Params) -> HandlerErgebnis {
    kopfergebnis(state.kopf.rechts_drehen(params.zahl_i32(0)?))
}

/// `resetHeadPosition()`
pub fn handle_head_reset(state: &Arc<RoverState>, _ctx: &RpcKontext, _params: &Params) -> HandlerErgebnis {
    kopfergebnis(state.kopf.zuruecksetzen())
}
