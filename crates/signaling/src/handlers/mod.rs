//! Handler fuer alle JSON-RPC-Methoden
//!
//! Jeder Handler ist fuer eine Methodengruppe zustaendig und hat Zugriff
//! auf den gemeinsamen `RoverState`. `registrieren` traegt alle Methoden mit
//! Parameter-Schema und Sperrklasse in den Dispatcher ein.
//!
//! Parameter `clientId` werden aus Kompatibilitaet mit den Web-Clients
//! angenommen; gehandelt wird immer fuer die aufrufende Verbindung.

pub mod entwickler_handler;
pub mod fahr_handler;
pub mod rover_handler;
pub mod system_handler;

use rover_core::ClientId;
use rover_protocol::{methods, ParamTyp, Params};

use crate::dispatcher::{Gate, RpcDispatcher, RpcKontext};

use ParamTyp::{OptionalerText, Text, Wahrheitswert, Zahl};

/// Traegt alle Rover-Methoden in den Dispatcher ein
pub fn registrieren(d: &mut RpcDispatcher) {
    // Fahren und Kopf
    d.registrieren(methods::DRIVE_FORWARD, &[Zahl], Gate::Bewegung, fahr_handler::handle_drive_forward);
    d.registrieren(methods::DRIVE_BACKWARD, &[Zahl], Gate::Bewegung, fahr_handler::handle_drive_backward);
    d.registrieren(methods::TURN_LEFT, &[Zahl], Gate::Bewegung, fahr_handler::handle_turn_left);
    d.registrieren(methods::TURN_RIGHT, &[Zahl], Gate::Bewegung, fahr_handler::handle_turn_right);
    d.registrieren(methods::STOP, &[], Gate::Bewegung, fahr_handler::handle_stop);
    d.registrieren(
        methods::SET_CONTINUOUS_DRIVING,
        &[Zahl, Zahl],
        Gate::Bewegung,
        fahr_handler::handle_continuous_driving,
    );
    d.registrieren(methods::TURN_HEAD_UP, &[Zahl], Gate::Bewegung, fahr_handler::handle_head_up);
    d.registrieren(methods::TURN_HEAD_DOWN, &[Zahl], Gate::Bewegung, fahr_handler::handle_head_down);
    d.registrieren(methods::TURN_HEAD_LEFT, &[Zahl], Gate::Bewegung, fahr_handler::handle_head_left);
    d.registrieren(methods::TURN_HEAD_RIGHT, &[Zahl], Gate::Bewegung, fahr_handler::handle_head_right);
    d.registrieren(methods::RESET_HEAD_POSITION, &[], Gate::Bewegung, fahr_handler::handle_head_reset);
    d.registrieren(methods::GET_CAMERA_SNAPSHOT, &[Zahl], Gate::Bewegung, system_handler::handle_camera_snapshot);

    // Rover-Zustand
    d.registrieren(methods::PING, &[Zahl], Gate::Keins, rover_handler::handle_ping);
    d.registrieren(
        methods::SET_KILLSWITCH,
        &[Wahrheitswert, OptionalerText],
        Gate::Keins,
        rover_handler::handle_set_killswitch,
    );
    d.registrieren(methods::GET_KILLSWITCH_STATE, &[], Gate::Keins, rover_handler::handle_get_killswitch_state);
    d.registrieren(methods::SEND_KILLSWITCH_STATE, &[], Gate::Keins, rover_handler::handle_send_killswitch_state);
    d.registrieren(methods::ENTER_DRIVER_MODE, &[Zahl], Gate::Keins, rover_handler::handle_enter_driver_mode);
    d.registrieren(methods::EXIT_DRIVER_MODE, &[Zahl], Gate::Keins, rover_handler::handle_exit_driver_mode);
    d.registrieren(
        methods::SET_CLIENT_INFORMATION,
        &[Zahl, Text, Text, Text],
        Gate::Keins,
        rover_handler::handle_set_client_information,
    );

    // Entwickleransicht
    d.registrieren(methods::BLOCK_IP, &[Text], Gate::Keins, entwickler_handler::handle_block_ip);
    d.registrieren(methods::UNBLOCK_IP, &[Text], Gate::Keins, entwickler_handler::handle_unblock_ip);
    d.registrieren(
        methods::DISTRIBUTE_ALERT_NOTIFICATION,
        &[Text],
        Gate::Keins,
        entwickler_handler::handle_distribute_alert,
    );

    // Systemdaten
    d.registrieren(
        methods::GET_LOGGING_ENTRIES,
        &[Zahl, OptionalerText],
        Gate::Keins,
        system_handler::handle_logging_entries,
    );
    d.registrieren(methods::GET_SYSTEM_UP_TIME, &[Zahl], Gate::Keins, system_handler::handle_system_up_time);
}

/// Liefert die ID der aufrufenden Verbindung und loggt abweichende Parameter
pub(crate) fn aufrufer_id(ctx: &RpcKontext, params: &Params, index: usize) -> ClientId {
    if let Ok(wert) = params.zahl(index) {
        if ClientId::aus_wire_wert(wert) != Some(ctx.client_id) {
            tracing::debug!(
                client_id = %ctx.client_id,
                gemeldet = wert,
                "Client meldet abweichende ID"
            );
        }
    }
    ctx.client_id
}
