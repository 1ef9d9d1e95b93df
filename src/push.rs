//! Push notification support for real-time state updates via syncPilot.
//!
//! Bulbs that received a `registration` request send their state changes
//! (`syncPilot`) and boot announcements (`firstBeat`) to UDP port 38900 of
//! the registering host. One [`PushManager`] owns that port and routes each
//! message to the subscriber for the sending bulb's MAC address.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::discovery::DiscoveredBulb;
use crate::message::{Command, Method};
use crate::pilot::Pilot;
use crate::runtime::{self, AsyncUdpSocket, Instant, JoinHandle, Mutex, UdpSocket};
use crate::transport::source_ip_for;

/// UDP port bulbs push to.
pub const LISTEN_PORT: u16 = 38900;

/// How often each bulb's registration is refreshed.
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(20);

pub type StateCallback = Arc<dyn Fn(Pilot) + Send + Sync + 'static>;
pub type DiscoveryCallback = Arc<dyn Fn(DiscoveredBulb) + Send + Sync + 'static>;

pub(crate) fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn normalize_mac(mac: &str) -> String {
    mac.to_ascii_lowercase()
}

/// Diagnostics for the push manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushDiagnostics {
    pub running: bool,
    pub subscription_count: usize,
    pub time_since_last_push: Option<f64>,
    pub last_error: Option<String>,
}

#[derive(Default)]
struct Shared {
    running: AtomicBool,
    subscriptions: StdMutex<HashMap<String, StateCallback>>,
    discovery_callback: StdMutex<Option<DiscoveryCallback>>,
    last_push: StdMutex<Option<Instant>>,
    last_error: StdMutex<Option<String>>,
}

impl Shared {
    fn dispatch(&self, data: &[u8], addr: SocketAddr) {
        *lock(&self.last_push) = Some(Instant::now());
        if data == b"test" {
            return;
        }
        debug!("{}: PUSH << {}", addr.ip(), String::from_utf8_lossy(data));

        let message: Value = match serde_json::from_slice(data) {
            Ok(message) => message,
            Err(err) => {
                error!(
                    "{}: Sent invalid push message {}: {}",
                    addr.ip(),
                    String::from_utf8_lossy(data),
                    err
                );
                return;
            }
        };

        let method = message
            .get("method")
            .and_then(Value::as_str)
            .and_then(|m| m.parse::<Method>().ok());
        let params = message.get("params").and_then(Value::as_object);
        let mac = params
            .and_then(|p| p.get("mac"))
            .and_then(Value::as_str)
            .map(normalize_mac);

        match (method, mac, params) {
            (Some(Method::SyncPilot), Some(mac), Some(params)) => {
                let callback = lock(&self.subscriptions).get(&mac).cloned();
                match callback {
                    Some(callback) => callback(Pilot::from(params.clone())),
                    None => debug!("{}: No subscriber for {}", addr.ip(), mac),
                }
            }
            (Some(Method::FirstBeat), Some(mac), _) => {
                let callback = lock(&self.discovery_callback).clone();
                if let Some(callback) = callback {
                    callback(DiscoveredBulb::new(addr.ip(), &mac));
                }
            }
            _ => debug!("{}: Ignoring push message: {}", addr.ip(), message),
        }
    }
}

struct Listener {
    task: JoinHandle<()>,
    registration: Command,
    local_addr: Option<SocketAddr>,
}

/// Routes pushed bulb messages to per-MAC subscribers.
///
/// Create one per process and share it (behind an [`Arc`]) with every
/// [`Light`](crate::Light) that should receive push updates.
pub struct PushManager {
    listen_port: u16,
    keep_alive_interval: Duration,
    shared: Arc<Shared>,
    listener: Mutex<Option<Listener>>,
}

impl Default for PushManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PushManager {
    pub fn new() -> Self {
        Self::with_port(LISTEN_PORT)
    }

    /// A manager listening on `port`; 0 picks an ephemeral port.
    pub fn with_port(port: u16) -> Self {
        Self {
            listen_port: port,
            keep_alive_interval: KEEP_ALIVE_INTERVAL,
            shared: Arc::new(Shared::default()),
            listener: Mutex::new(None),
        }
    }

    pub fn with_keep_alive_interval(mut self, interval: Duration) -> Self {
        self.keep_alive_interval = interval;
        self
    }

    pub fn keep_alive_interval(&self) -> Duration {
        self.keep_alive_interval
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn diagnostics(&self) -> PushDiagnostics {
        PushDiagnostics {
            running: self.is_running(),
            subscription_count: lock(&self.shared.subscriptions).len(),
            time_since_last_push: lock(&self.shared.last_push).map(|t| t.elapsed().as_secs_f64()),
            last_error: lock(&self.shared.last_error).clone(),
        }
    }

    /// Route `syncPilot` messages from `mac` to `callback`, replacing any
    /// previous subscriber for that bulb.
    pub fn subscribe<F: Fn(Pilot) + Send + Sync + 'static>(&self, mac: &str, callback: F) {
        lock(&self.shared.subscriptions).insert(normalize_mac(mac), Arc::new(callback));
    }

    /// Drop the subscriber for `mac`, stopping the listener once nobody is
    /// subscribed anymore.
    pub async fn unsubscribe(&self, mac: &str) {
        lock(&self.shared.subscriptions).remove(&normalize_mac(mac));
        self.stop_if_no_subs().await;
    }

    /// Report bulbs announcing themselves with `firstBeat`.
    pub fn set_discovery_callback<F: Fn(DiscoveredBulb) + Send + Sync + 'static>(&self, callback: F) {
        *lock(&self.shared.discovery_callback) = Some(Arc::new(callback));
    }

    /// Start listening, if not already listening.
    ///
    /// `target` is any bulb the host should be reachable from; it selects
    /// the local address advertised in the registration message. Returns
    /// `false` when push is unavailable and callers should poll instead.
    pub async fn start(&self, target: IpAddr) -> bool {
        let mut listener = self.listener.lock().await;
        if listener.is_some() {
            return true;
        }

        let source_ip = match source_ip_for(target) {
            Ok(ip) => ip,
            Err(err) => {
                warn!("Could not determine source ip towards {}, falling back to polling: {}", target, err);
                *lock(&self.shared.last_error) = Some(err.to_string());
                return false;
            }
        };

        let bind: SocketAddr = match source_ip {
            IpAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, self.listen_port).into(),
            IpAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, self.listen_port).into(),
        };
        let socket = match UdpSocket::bind(bind).await {
            Ok(socket) => socket,
            Err(err) => {
                warn!(
                    "Could not listen for push updates on port {}, falling back to polling: {}",
                    self.listen_port, err
                );
                *lock(&self.shared.last_error) = Some(err.to_string());
                return false;
            }
        };
        let local_addr = socket.local_addr().ok();

        let registration = Command::registration(&generate_mac(), &source_ip.to_string(), true);
        self.shared.running.store(true, Ordering::SeqCst);
        let task = runtime::spawn(listen(socket, Arc::downgrade(&self.shared)));
        info!("Listening for push updates on {:?}", local_addr);

        *listener = Some(Listener {
            task,
            registration,
            local_addr,
        });
        true
    }

    /// Stop listening once the last subscriber is gone.
    pub async fn stop_if_no_subs(&self) {
        if lock(&self.shared.subscriptions).is_empty() {
            self.stop().await;
        }
    }

    /// Stop listening and forget the discovery callback. Does nothing
    /// when no listener is running.
    pub async fn stop(&self) {
        let listener = self.listener.lock().await.take();
        if let Some(listener) = listener {
            *lock(&self.shared.discovery_callback) = None;
            listener.task.cancel().await;
            self.shared.running.store(false, Ordering::SeqCst);
            debug!("Stopped push listener on {:?}", listener.local_addr);
        }
    }

    /// The registration request bulbs must receive periodically to keep
    /// pushing to this host, once the listener is running.
    pub async fn registration_message(&self) -> Option<Command> {
        self.listener
            .lock()
            .await
            .as_ref()
            .map(|l| l.registration.clone())
    }

    /// The address the listener is bound to, once it is running.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.lock().await.as_ref().and_then(|l| l.local_addr)
    }
}

async fn listen(socket: UdpSocket, manager: Weak<Shared>) {
    let mut buffer = vec![0u8; 4096];
    loop {
        let received = socket.recv_from(&mut buffer).await;
        let Some(shared) = manager.upgrade() else {
            debug!("Push manager dropped, closing listener");
            return;
        };
        match received {
            Ok((size, addr)) => shared.dispatch(&buffer[..size], addr),
            Err(err) => {
                error!("Push socket error: {}", err);
                *lock(&shared.last_error) = Some(err.to_string());
            }
        }
    }
}

/// A random-looking MAC address identifying this host to the bulbs.
pub(crate) fn generate_mac() -> String {
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!(
        "{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        ((seed >> 40) & 0xFF) as u8,
        ((seed >> 32) & 0xFF) as u8,
        ((seed >> 24) & 0xFF) as u8,
        ((seed >> 16) & 0xFF) as u8,
        ((seed >> 8) & 0xFF) as u8,
        (seed & 0xFF) as u8,
    )
}
