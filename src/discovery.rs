//! Device discovery via UDP broadcast.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use log::{debug, info};
use serde_json::Value;

use crate::errors::Error;
use crate::light::Light;
use crate::message::Command;
use crate::push::normalize_mac;
use crate::runtime::{self, AsyncUdpSocket, Instant, UdpSocket};
use crate::transport::PORT;

type Result<T> = std::result::Result<T, Error>;

/// How often the discovery probe is repeated while waiting for replies.
const PROBE_INTERVAL: Duration = Duration::from_secs(1);

/// A discovered Wiz bulb on the network.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiscoveredBulb {
    /// IP address of the discovered bulb
    pub ip: IpAddr,
    /// MAC address of the discovered bulb, lowercase
    pub mac: String,
}

impl DiscoveredBulb {
    pub fn new(ip: IpAddr, mac: &str) -> Self {
        DiscoveredBulb {
            ip,
            mac: normalize_mac(mac),
        }
    }

    /// Convert this discovered bulb into a [`Light`] instance.
    pub fn into_light(self, name: Option<&str>) -> Light {
        Light::new(self.ip, name).with_mac(&self.mac)
    }
}

/// Discovered bulbs, one per MAC address.
///
/// A bulb that answers several probes, or moves to a new address, keeps a
/// single entry holding its latest address.
#[derive(Debug, Clone, Default)]
pub struct BulbRegistry {
    bulbs_by_mac: HashMap<String, DiscoveredBulb>,
}

impl BulbRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, bulb: DiscoveredBulb) {
        self.bulbs_by_mac.insert(bulb.mac.clone(), bulb);
    }

    pub fn get(&self, mac: &str) -> Option<&DiscoveredBulb> {
        self.bulbs_by_mac.get(&normalize_mac(mac))
    }

    pub fn bulbs(&self) -> Vec<DiscoveredBulb> {
        self.bulbs_by_mac.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.bulbs_by_mac.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bulbs_by_mac.is_empty()
    }
}

/// Discover Wiz bulbs on the local network using UDP broadcast.
///
/// Broadcasts a registration probe once per second and collects the
/// replies until `discovery_timeout` has elapsed.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use wiz_pilot::discover_bulbs;
///
/// # async fn run() -> Result<(), wiz_pilot::Error> {
/// let bulbs = discover_bulbs(Duration::from_secs(5)).await?;
/// println!("Found {} bulbs", bulbs.len());
/// for bulb in bulbs {
///     println!("  {} - {}", bulb.ip, bulb.mac);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn discover_bulbs(discovery_timeout: Duration) -> Result<Vec<DiscoveredBulb>> {
    let target = SocketAddr::from((Ipv4Addr::BROADCAST, PORT));
    discover_bulbs_on(target, discovery_timeout).await
}

/// Discovery against an explicit address, such as a subnet broadcast
/// address or a single host.
pub async fn discover_bulbs_on(
    target: SocketAddr,
    discovery_timeout: Duration,
) -> Result<Vec<DiscoveredBulb>> {
    let socket = UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)))
        .await
        .map_err(|e| Error::socket("bind", e))?;

    socket
        .set_broadcast(true)
        .map_err(|e| Error::socket("set_broadcast", e))?;

    let probe = Command::registration("AAAAAAAAAAAA", "1.2.3.4", false).to_bytes()?;

    let mut registry = BulbRegistry::new();
    let start = Instant::now();
    let mut next_probe = Duration::ZERO;
    let mut buffer = [0u8; 4096];

    while start.elapsed() < discovery_timeout {
        if start.elapsed() >= next_probe {
            debug!("Sending discovery probe to {}", target);
            socket
                .send_to(&probe, target)
                .await
                .map_err(|e| Error::socket("send_to", e))?;
            next_probe += PROBE_INTERVAL;
        }

        let wait = next_probe
            .min(discovery_timeout)
            .saturating_sub(start.elapsed());
        match runtime::timeout(wait, socket.recv_from(&mut buffer)).await {
            Ok(Ok((size, addr))) => {
                if let Some(bulb) = parse_reply(&buffer[..size], addr) {
                    registry.register(bulb);
                }
            }
            Ok(Err(err)) => debug!("Discovery receive failed: {}", err),
            Err(_) => continue,
        }
    }

    for bulb in registry.bulbs() {
        info!("Found bulb {} at {}", bulb.mac, bulb.ip);
    }
    Ok(registry.bulbs())
}

/// A bulb from a registration reply; other traffic yields `None`.
fn parse_reply(data: &[u8], addr: SocketAddr) -> Option<DiscoveredBulb> {
    let message: Value = serde_json::from_slice(data).ok()?;
    let result = message.get("result")?;
    if result.get("success").and_then(Value::as_bool) != Some(true) {
        debug!("{}: Ignoring discovery reply: {}", addr.ip(), message);
        return None;
    }
    let mac = result.get("mac")?.as_str()?;
    Some(DiscoveredBulb::new(addr.ip(), mac))
}
