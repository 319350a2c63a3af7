//! Methodennamen des Rover-Protokolls
//!
//! Client → Server: Methoden die der Dispatcher routet.
//! Server → Client: Notifications die das Backend an Web-Clients sendet.
//! Die Namen sind Teil des Wire-Formats und werden vom Web-Client erwartet.

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

pub const PING: &str = "ping";
pub const DRIVE_FORWARD: &str = "driveForward";
pub const DRIVE_BACKWARD: &str = "driveBackward";
pub const STOP: &str = "stop";
pub const TURN_LEFT: &str = "turnLeft";
pub const TURN_RIGHT: &str = "turnRight";
pub const SET_CONTINUOUS_DRIVING: &str = "setContinuousDriving";
pub const TURN_HEAD_UP: &str = "turnHeadUp";
pub const TURN_HEAD_DOWN: &str = "turnHeadDown";
pub const TURN_HEAD_LEFT: &str = "turnHeadLeft";
pub const TURN_HEAD_RIGHT: &str = "turnHeadRight";
pub const RESET_HEAD_POSITION: &str = "resetHeadPosition";
pub const GET_CAMERA_SNAPSHOT: &str = "getCameraSnapshot";
pub const SET_KILLSWITCH: &str = "setKillswitch";
pub const GET_KILLSWITCH_STATE: &str = "getKillswitchState";
pub const SEND_KILLSWITCH_STATE: &str = "sendKillswitchState";
pub const ENTER_DRIVER_MODE: &str = "enterDriverMode";
pub const EXIT_DRIVER_MODE: &str = "exitDriverMode";
pub const GET_LOGGING_ENTRIES: &str = "getLoggingEntries";
pub const GET_SYSTEM_UP_TIME: &str = "getSystemUpTime";
pub const SET_CLIENT_INFORMATION: &str = "setClientInformation";
pub const BLOCK_IP: &str = "blockIp";
pub const UNBLOCK_IP: &str = "unblockIp";
pub const DISTRIBUTE_ALERT_NOTIFICATION: &str = "distributeAlertNotification";

// ---------------------------------------------------------------------------
// Server -> Client (Notifications)
// ---------------------------------------------------------------------------

pub const INCOMING_NOTIFICATION: &str = "incomingNotification";
pub const SET_CLIENT_ID: &str = "setClientId";
pub const UPDATE_KILLSWITCH_ENABLED: &str = "updateKillswitchEnabled";
pub const SHOW_ALERT_NOTIFICATION: &str = "showAlertNotification";
pub const SHOW_ERROR_NOTIFICATION: &str = "showErrorNotification";
pub const UPDATE_CONNECTED_USERS: &str = "updateConnectedUsers";
pub const UPDATE_ROVER_STATE: &str = "updateRoverState";
pub const UPDATE_COLLISION_INFORMATION: &str = "updateCollisionInformation";
pub const SET_MY_BLOCKING_STATE: &str = "setMyBlockingState";
pub const INCOMING_SNAPSHOT: &str = "incomingSnapshot";
pub const INCOMING_LOG_ENTRIES: &str = "incomingLogEntries";
pub const INCOMING_SYSTEM_UP_TIME: &str = "incomingSystemUpTime";
