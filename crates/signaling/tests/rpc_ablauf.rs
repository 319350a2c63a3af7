//! Integrationstests: kompletter Dispatcher gegen einen `RoverState` mit
//! protokollierendem Antrieb und In-Memory-Sitzungen

use std::sync::Arc;

use chrono::Utc;
use rover_motion::{CollisionSnapshot, DriveController, MotorSetting, ProtokollAntrieb, SensorWerte};
use rover_observability::RoverMetrics;
use rover_signaling::{NeueSitzung, RoverHardware, RoverState, RpcDispatcher, RpcKontext, SignalingConfig};
use serde_json::{json, Value};

struct Aufbau {
    dispatcher: RpcDispatcher,
    state: Arc<RoverState>,
    antrieb: Arc<ProtokollAntrieb>,
}

fn aufbau() -> Aufbau {
    let antrieb = Arc::new(ProtokollAntrieb::neu());
    let fahrt = Arc::new(DriveController::neu(antrieb.clone()));
    let state = RoverState::neu(
        SignalingConfig::default(),
        RoverHardware::mit_antrieb(antrieb.clone()),
        fahrt,
        RoverMetrics::neu().unwrap(),
    );
    Aufbau {
        dispatcher: RpcDispatcher::neu(Arc::clone(&state)),
        state,
        antrieb,
    }
}

fn kontext(sitzung: &NeueSitzung, ip: &str) -> RpcKontext {
    RpcKontext {
        client_id: sitzung.client_id,
        remote_address: ip.to_string(),
    }
}

fn leeren(sitzung: &mut NeueSitzung) -> Vec<Value> {
    let mut liste = Vec::new();
    while let Ok(text) = sitzung.empfaenger.try_recv() {
        liste.push(serde_json::from_str(&text).unwrap());
    }
    liste
}

fn methoden(nachrichten: &[Value]) -> Vec<String> {
    nachrichten
        .iter()
        .filter_map(|n| n["method"].as_str().map(str::to_string))
        .collect()
}

fn aufrufen(d: &RpcDispatcher, ctx: &RpcKontext, method: &str, params: Value) -> Value {
    let text = json!({"jsonrpc": "2.0", "method": method, "params": params, "id": 1}).to_string();
    let antwort = d.dispatch_text(&text, ctx).expect("Antwort erwartet");
    serde_json::from_str(&antwort).unwrap()
}

#[test]
fn fahrerrolle_wechselt_zwischen_clients() {
    let a = aufbau();
    let mut eins = a.state.sitzungen.client_hinzufuegen("10.0.0.1");
    let mut zwei = a.state.sitzungen.client_hinzufuegen("10.0.0.2");
    let (ctx1, ctx2) = (kontext(&eins, "10.0.0.1"), kontext(&zwei, "10.0.0.2"));
    leeren(&mut eins);
    leeren(&mut zwei);

    assert_eq!(aufrufen(&a.dispatcher, &ctx1, "enterDriverMode", json!([5000]))["result"], true);
    assert_eq!(aufrufen(&a.dispatcher, &ctx2, "enterDriverMode", json!([5001]))["result"], false);
    assert_eq!(a.state.rover_zustand().current_driver_id, 5000);

    // Nur die tatsaechliche Vergabe erzeugt updateRoverState
    assert_eq!(methoden(&leeren(&mut zwei)), vec!["updateRoverState"]);

    // Fremde Freigabe aendert nichts
    assert_eq!(aufrufen(&a.dispatcher, &ctx2, "exitDriverMode", json!([5001]))["result"], false);
    assert_eq!(aufrufen(&a.dispatcher, &ctx1, "exitDriverMode", json!([5000]))["result"], true);
    assert_eq!(aufrufen(&a.dispatcher, &ctx2, "enterDriverMode", json!([5001]))["result"], true);

    let n = leeren(&mut eins);
    let zustaende: Vec<i64> = n
        .iter()
        .filter(|v| v["method"] == "updateRoverState")
        .map(|v| v["params"][0]["currentDriverId"].as_i64().unwrap())
        .collect();
    assert_eq!(zustaende, vec![5000, -1, 5001]);
}

#[test]
fn gesperrte_ip_faehrt_nicht_und_wird_fahrer_los() {
    let a = aufbau();
    let fahrer = a.state.sitzungen.client_hinzufuegen("10.0.0.1");
    let entwickler = a.state.sitzungen.client_hinzufuegen("10.0.0.9");
    let ctx_f = kontext(&fahrer, "10.0.0.1");
    let ctx_e = kontext(&entwickler, "10.0.0.9");

    aufrufen(&a.dispatcher, &ctx_f, "enterDriverMode", json!([5000]));
    assert_eq!(aufrufen(&a.dispatcher, &ctx_e, "blockIp", json!(["10.0.0.1"]))["result"], true);
    assert_eq!(a.state.fahrer.aktueller_fahrer(), None);

    let vorher = a.antrieb.angewendete_settings().len();
    let fahrt = aufrufen(&a.dispatcher, &ctx_f, "driveForward", json!([500]));
    assert_eq!(fahrt["result"], Value::Null);
    assert_eq!(a.antrieb.angewendete_settings().len(), vorher);
    assert_eq!(aufrufen(&a.dispatcher, &ctx_f, "enterDriverMode", json!([5000]))["result"], false);

    // Nicht-Bewegungsmethoden bleiben erlaubt
    assert_eq!(aufrufen(&a.dispatcher, &ctx_f, "ping", json!([1]))["result"], "pong 2");

    aufrufen(&a.dispatcher, &ctx_e, "unblockIp", json!(["10.0.0.1"]));
    assert_eq!(aufrufen(&a.dispatcher, &ctx_f, "driveForward", json!([500]))["result"], true);
}

#[test]
fn killswitch_stoppt_sperrt_und_meldet_neuen_clients() {
    let a = aufbau();
    let mut entwickler = a.state.sitzungen.client_hinzufuegen("10.0.0.9");
    let ctx = kontext(&entwickler, "10.0.0.9");

    assert_eq!(aufrufen(&a.dispatcher, &ctx, "driveForward", json!([1000]))["result"], true);
    assert_eq!(a.antrieb.letztes_setting(), Some(MotorSetting::neu(1.0, 1.0)));
    leeren(&mut entwickler);

    let an = aufrufen(&a.dispatcher, &ctx, "setKillswitch", json!([true, "Wartung"]));
    assert_eq!(an["result"], true);
    assert_eq!(a.antrieb.letztes_setting(), Some(MotorSetting::STOPP));
    assert_eq!(
        methoden(&leeren(&mut entwickler)),
        vec!["updateKillswitchEnabled", "showAlertNotification", "updateRoverState"]
    );

    // Kopf, Kamera und Fahren werden still verworfen
    for (method, params) in [
        ("turnHeadUp", json!([10])),
        ("getCameraSnapshot", json!([5000])),
        ("setContinuousDriving", json!([0, 50])),
        ("stop", json!([])),
    ] {
        let antwort = aufrufen(&a.dispatcher, &ctx, method, params);
        assert_eq!(antwort["result"], Value::Null, "{method}");
        assert!(antwort.get("error").is_none(), "{method}");
    }
    assert_eq!(a.antrieb.letztes_setting(), Some(MotorSetting::STOPP));

    let mut neu = a.state.sitzungen.client_hinzufuegen("10.0.0.3");
    a.state
        .killswitch
        .benachrichtigen_wenn_aktiv(neu.client_id, &a.state.config.sperr_nachricht);
    let n = leeren(&mut neu);
    let alarm = n.iter().find(|v| v["method"] == "showAlertNotification").unwrap();
    assert_eq!(alarm["params"][0], a.state.config.sperr_nachricht.as_str());

    // Gleicher Zustand: nur updateKillswitchEnabled, kein Alarm
    leeren(&mut entwickler);
    let nochmal = aufrufen(&a.dispatcher, &ctx, "setKillswitch", json!([true, null]));
    assert_eq!(nochmal["result"], true);
    assert_eq!(methoden(&leeren(&mut entwickler)), vec!["updateKillswitchEnabled"]);

    aufrufen(&a.dispatcher, &ctx, "setKillswitch", json!([false, null]));
    assert_eq!(aufrufen(&a.dispatcher, &ctx, "turnHeadUp", json!([10]))["result"]["vertikal"], 166);
}

#[test]
fn kollision_verweigert_vorwaerts_aber_nicht_drehen() {
    let a = aufbau();
    let sitzung = a.state.sitzungen.client_hinzufuegen("10.0.0.1");
    let ctx = kontext(&sitzung, "10.0.0.1");

    let vorne = SensorWerte {
        front_right: true,
        ..SensorWerte::default()
    };
    a.state
        .fahrt
        .kollision_verarbeiten(CollisionSnapshot::aus_werten(vorne, Utc::now()));

    assert_eq!(aufrufen(&a.dispatcher, &ctx, "driveForward", json!([300]))["result"], false);
    assert_eq!(a.antrieb.letztes_setting(), Some(MotorSetting::STOPP));
    assert_eq!(aufrufen(&a.dispatcher, &ctx, "turnLeft", json!([300]))["result"], true);
    assert_eq!(aufrufen(&a.dispatcher, &ctx, "driveBackward", json!([300]))["result"], true);

    // Unzuverlaessige Messung sperrt nicht
    let geblendet = SensorWerte {
        front_left: true,
        tainted: true,
        ..SensorWerte::default()
    };
    a.state
        .fahrt
        .kollision_verarbeiten(CollisionSnapshot::aus_werten(geblendet, Utc::now()));
    assert_eq!(aufrufen(&a.dispatcher, &ctx, "driveForward", json!([300]))["result"], true);
}

#[test]
fn hardwarefehler_wird_internal_error() {
    let a = aufbau();
    let sitzung = a.state.sitzungen.client_hinzufuegen("10.0.0.1");
    let ctx = kontext(&sitzung, "10.0.0.1");

    a.antrieb.fehler_simulieren(true);
    let fahrt = aufrufen(&a.dispatcher, &ctx, "driveForward", json!([300]));
    assert_eq!(fahrt["error"]["code"], -32603);
    let kopf = aufrufen(&a.dispatcher, &ctx, "turnHeadLeft", json!([30]));
    assert_eq!(kopf["error"]["code"], -32603);

    a.antrieb.fehler_simulieren(false);
    let kopf = aufrufen(&a.dispatcher, &ctx, "resetHeadPosition", json!([]));
    assert_eq!(kopf["result"], json!({"horizontal": 0, "vertikal": 0}));
}

#[test]
fn notifications_bekommen_nie_eine_antwort() {
    let a = aufbau();
    let sitzung = a.state.sitzungen.client_hinzufuegen("10.0.0.1");
    let ctx = kontext(&sitzung, "10.0.0.1");

    for text in [
        r#"{"jsonrpc":"2.0","method":"ping","params":[1]}"#,
        r#"{"jsonrpc":"2.0","method":"unbekannt","params":[]}"#,
        r#"{"jsonrpc":"2.0","method":"driveForward","params":["x"]}"#,
        r#"{"jsonrpc":"2.0","result":true,"id":4}"#,
    ] {
        assert_eq!(a.dispatcher.dispatch_text(text, &ctx), None, "{text}");
    }
}

#[test]
fn metriken_zaehlen_aufrufe_und_verworfene() {
    let a = aufbau();
    let sitzung = a.state.sitzungen.client_hinzufuegen("10.0.0.1");
    let ctx = kontext(&sitzung, "10.0.0.1");

    aufrufen(&a.dispatcher, &ctx, "ping", json!([1]));
    aufrufen(&a.dispatcher, &ctx, "setKillswitch", json!([true, null]));
    aufrufen(&a.dispatcher, &ctx, "driveForward", json!([1]));

    let text = a.state.metriken.exportieren().unwrap();
    assert!(text.contains(r#"rover_rpc_calls_total{method="ping"} 1"#));
    assert!(text.contains(r#"rover_rpc_gated_total{method="driveForward"} 1"#));
    assert!(text.contains("rover_killswitch_enabled 1"));
    assert!(text.contains("rover_connected_clients 1"));
}
