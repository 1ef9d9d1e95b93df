//! In-process stand-ins for bulbs, used by the unit tests.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use crate::light::Light;
use crate::transport::BackoffConfig;

pub(crate) const BULB_MAC: &str = "a8bb5006033d";

/// A schedule for a peer on localhost, which answers well within the
/// first interval.
pub(crate) fn fast_backoff() -> BackoffConfig {
    BackoffConfig {
        first_interval: Duration::from_millis(250),
        max_interval: Duration::from_millis(500),
        max_datagrams: 6,
        timeout: Duration::from_secs(2),
    }
}

/// A bound socket that never answers.
pub(crate) async fn silent_socket() -> UdpSocket {
    UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap()
}

/// The kinds of bulb the fake can impersonate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Model {
    /// RGB bulb on firmware with `getModelConfig`.
    Rgb,
    /// RGB bulb on firmware that only has `getUserConfig`.
    RgbLegacy,
    /// RGB bulb whose model config lacks a kelvin range.
    RgbWithoutKelvin,
    /// Dimmable white bulb without model or user config.
    DimmableWhite,
    Socket,
    Fan,
    /// Fan fixture on firmware that only has `getUserConfig`.
    FanLegacy,
    /// Reports neither a module name nor a type id.
    Unidentified,
    /// Reports a module name without a type token.
    Malformed,
    /// Answers everything with invalid JSON.
    Broken,
}

struct Profile {
    system: Value,
    model: Option<Value>,
    user: Option<Value>,
    power: Option<Value>,
}

fn system_config(module_name: &str, fw_version: &str, drv_conf: [u32; 2]) -> Value {
    json!({
        "mac": BULB_MAC, "homeId": 653906, "roomId": 989983, "rgn": "eu",
        "moduleName": module_name, "fwVersion": fw_version, "groupId": 0,
        "drvConf": drv_conf, "ping": 0
    })
}

impl Model {
    fn profile(self) -> Profile {
        let profile = |system, model, user| Profile {
            system,
            model,
            user,
            power: None,
        };
        match self {
            Model::Rgb | Model::Broken => profile(
                system_config("ESP01_SHRGB_03", "1.25.0", [20, 2]),
                Some(json!({"ps": 1, "pwmFreq": 1000, "wcr": 30, "nowc": 1,
                    "cctRange": [2200, 2700, 4800, 6500], "renderFactor": [171, 255, 75, 255, 43, 85, 0, 0, 0, 0]})),
                None,
            ),
            Model::RgbLegacy => profile(
                system_config("ESP20_SHRGB_01ABI", "1.21.4", [20, 2]),
                None,
                Some(json!({"fadeIn": 0, "fadeOut": 0, "dftDim": 100,
                    "whiteRange": [2700, 6500], "extRange": [2200, 6500]})),
            ),
            Model::RgbWithoutKelvin => profile(
                system_config("ESP01_SHRGB_03", "1.25.0", [20, 2]),
                Some(json!({"wcr": 30, "nowc": 1})),
                None,
            ),
            Model::DimmableWhite => profile(system_config("ESP05_SHDW_21", "1.25.0", [20, 1]), None, None),
            Model::Socket => Profile {
                power: Some(json!({"power": 1234})),
                ..profile(
                    system_config("ESP10_SOCKET_06", "1.25.0", [20, 2]),
                    Some(json!({"wcr": 20, "nowc": 2, "cctRange": [2700, 2700, 2700, 2700]})),
                    None,
                )
            },
            Model::Fan => profile(
                system_config("ESP03_FANDIMS_31", "1.31.32", [20, 1]),
                Some(json!({"wcr": 20, "nowc": 1, "cctRange": [2700, 2700, 2700, 2700], "fanSpeed": 6})),
                None,
            ),
            Model::FanLegacy => profile(
                system_config("ESP03_FANDIMS_31", "1.28.0", [20, 1]),
                None,
                Some(json!({"fadeIn": 0, "fadeOut": 0, "dftDim": 100, "fanSpeed": 10})),
            ),
            Model::Unidentified => profile(json!({"mac": BULB_MAC, "fwVersion": "1.0.0"}), None, None),
            Model::Malformed => profile(system_config("INVALID", "1.0.0", [20, 2]), None, None),
        }
    }
}

/// A UDP peer answering the bulb protocol from canned configuration.
pub(crate) struct FakeBulb {
    addr: SocketAddr,
    pilot: Arc<Mutex<Value>>,
    requests: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl FakeBulb {
    pub(crate) async fn start(model: Model) -> Self {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let addr = socket.local_addr().unwrap();
        let pilot = Arc::new(Mutex::new(json!({
            "mac": "ABCABCABCABC", "rssi": -62, "src": "udp", "state": false, "sceneId": 0,
            "r": 255, "g": 127, "b": 0, "c": 0, "w": 0, "temp": 0, "dimming": 13
        })));
        if matches!(model, Model::Fan | Model::FanLegacy) {
            let mut pilot = pilot.lock().unwrap();
            pilot["fanState"] = json!(0);
            pilot["fanMode"] = json!(1);
            pilot["fanSpeed"] = json!(1);
            pilot["fanRevrs"] = json!(0);
        }
        let requests = Arc::new(AtomicUsize::new(0));
        let task = tokio::spawn(serve(
            socket,
            model,
            Arc::clone(&pilot),
            Arc::clone(&requests),
        ));
        FakeBulb {
            addr,
            pilot,
            requests,
            task,
        }
    }

    pub(crate) fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// A light talking to this bulb.
    pub(crate) fn light(&self) -> Light {
        Light::new(self.addr.ip(), None)
            .with_port(self.addr.port())
            .with_backoff(fast_backoff())
    }

    /// The bulb's current state.
    pub(crate) fn pilot(&self) -> Value {
        self.pilot.lock().unwrap().clone()
    }

    /// Requests received so far.
    pub(crate) fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Drop for FakeBulb {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(
    socket: UdpSocket,
    model: Model,
    pilot: Arc<Mutex<Value>>,
    requests: Arc<AtomicUsize>,
) {
    let profile = model.profile();
    let mut buffer = vec![0u8; 4096];
    loop {
        let Ok((size, from)) = socket.recv_from(&mut buffer).await else {
            return;
        };
        requests.fetch_add(1, Ordering::SeqCst);
        let reply = if model == Model::Broken {
            b"{\"method\": garbage".to_vec()
        } else {
            respond(&buffer[..size], &profile, &pilot).to_string().into_bytes()
        };
        let _ = socket.send_to(&reply, from).await;
    }
}

fn respond(data: &[u8], profile: &Profile, pilot: &Mutex<Value>) -> Value {
    let Ok(request) = serde_json::from_slice::<Value>(data) else {
        return json!({"env": "pro", "error": {"code": -32700, "message": "Parse error"}});
    };
    let method = request["method"].as_str().unwrap_or_default().to_string();
    let ok = |result: Value| json!({"method": method, "env": "pro", "result": result});
    let not_found = || {
        json!({"method": method, "env": "pro",
            "error": {"code": -32601, "message": "Method not found"}})
    };
    let optional = |result: &Option<Value>| match result {
        Some(result) => ok(result.clone()),
        None => not_found(),
    };

    match method.as_str() {
        "getPilot" => ok(pilot.lock().unwrap().clone()),
        "setPilot" | "setState" => {
            let mut pilot = pilot.lock().unwrap();
            if let (Some(state), Some(params)) =
                (pilot.as_object_mut(), request["params"].as_object())
            {
                for (key, value) in params {
                    state.insert(key.clone(), value.clone());
                }
            }
            ok(json!({"success": true}))
        }
        "getSystemConfig" => ok(profile.system.clone()),
        "getModelConfig" => optional(&profile.model),
        "getUserConfig" => optional(&profile.user),
        "getPower" => optional(&profile.power),
        "registration" => ok(json!({"mac": BULB_MAC, "success": true})),
        "reboot" | "reset" => ok(json!({"success": true})),
        _ => not_found(),
    }
}
