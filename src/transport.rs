//! Request/response exchange with a single bulb.
//!
//! A request is retransmitted on a growing schedule until the correlated
//! reply arrives or the overall deadline passes. Bulbs drop datagrams
//! freely, so retransmission is the normal case.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use futures::future::{Either, select};
use futures::pin_mut;
use log::{debug, warn};

use crate::errors::Error;
use crate::message::{Command, Method, Response};
use crate::runtime::{self, AsyncUdpSocket, Mutex, UdpSocket};

/// UDP port Wiz bulbs listen on for requests.
pub const PORT: u16 = 38899;

const BUFFER_SIZE: usize = 4096;

/// Retransmission schedule and deadline for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Wait after the first datagram.
    pub first_interval: Duration,
    /// Upper bound for the doubling wait.
    pub max_interval: Duration,
    /// Datagrams sent before giving up on retransmission.
    pub max_datagrams: usize,
    /// Deadline for the whole exchange.
    pub timeout: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        BackoffConfig {
            first_interval: Duration::from_millis(750),
            max_interval: Duration::from_secs(3),
            max_datagrams: 6,
            timeout: Duration::from_secs(13),
        }
    }
}

impl BackoffConfig {
    /// The wait after each datagram.
    ///
    /// ```
    /// use std::time::Duration;
    /// use wiz_pilot::BackoffConfig;
    ///
    /// let waits: Vec<_> = BackoffConfig::default().schedule().collect();
    /// assert_eq!(waits[..3], [Duration::from_millis(750), Duration::from_millis(1500), Duration::from_secs(3)]);
    /// assert_eq!(waits.len(), 6);
    /// ```
    pub fn schedule(&self) -> impl Iterator<Item = Duration> + use<> {
        let max = self.max_interval;
        std::iter::successors(Some(self.first_interval.min(max)), move |wait| {
            Some((*wait * 2).min(max))
        })
        .take(self.max_datagrams)
    }
}

/// The exchange with one bulb.
///
/// The socket is opened on first use and held under a lock for the whole
/// exchange, so requests to the same bulb never interleave.
pub struct Transport {
    addr: SocketAddr,
    config: BackoffConfig,
    socket: Mutex<Option<UdpSocket>>,
}

impl Transport {
    pub fn new(addr: SocketAddr, config: BackoffConfig) -> Self {
        Transport {
            addr,
            config,
            socket: Mutex::new(None),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    async fn open(&self) -> Result<UdpSocket, Error> {
        let local: SocketAddr = match self.addr {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|e| Error::socket("bind", e))?;
        socket
            .connect(self.addr)
            .await
            .map_err(|e| Error::socket("connect", e))?;
        Ok(socket)
    }

    /// Send `command` and wait for the reply carrying the same method.
    pub async fn send(&self, command: &Command) -> Result<Response, Error> {
        let data = command.to_bytes()?;
        let mut guard = self.socket.lock().await;
        let socket = match guard.take() {
            Some(socket) => socket,
            None => self.open().await?,
        };
        let result = self.exchange(&socket, &data, command.method()).await;
        *guard = Some(socket);
        result
    }

    /// Drop the socket. A later request opens a new one.
    pub async fn close(&self) {
        if self.socket.lock().await.take().is_some() {
            debug!("{}: Closed transport", self.addr.ip());
        }
    }

    async fn exchange(
        &self,
        socket: &UdpSocket,
        data: &[u8],
        method: Method,
    ) -> Result<Response, Error> {
        let exchange = async {
            let transmit = self.transmit(socket, data, method);
            let receive = self.receive(socket, method);
            pin_mut!(transmit, receive);
            match select(transmit, receive).await {
                // Out of retransmissions; the last datagram may still be answered.
                Either::Left((Ok(()), receive)) => receive.await,
                Either::Left((Err(err), _)) => Err(err),
                Either::Right((response, _)) => response,
            }
        };

        match runtime::timeout(self.config.timeout, exchange).await {
            Ok(response) => response,
            Err(_) => {
                debug!(
                    "{}: Timed out waiting for {} after {:?}",
                    self.addr.ip(),
                    method,
                    self.config.timeout
                );
                Err(Error::Timeout {
                    ip: self.addr.ip(),
                    method,
                    attempts: self.config.max_datagrams,
                })
            }
        }
    }

    async fn transmit(&self, socket: &UdpSocket, data: &[u8], method: Method) -> Result<(), Error> {
        let mut elapsed = Duration::ZERO;
        for (attempt, wait) in self.config.schedule().enumerate() {
            debug!(
                "{}: >> {} (attempt {}/{}, {:?} elapsed)",
                self.addr.ip(),
                method,
                attempt + 1,
                self.config.max_datagrams,
                elapsed
            );
            socket
                .send(data)
                .await
                .map_err(|e| Error::socket("send", e))?;
            runtime::sleep(wait).await;
            elapsed += wait;
        }
        Ok(())
    }

    async fn receive(&self, socket: &UdpSocket, method: Method) -> Result<Response, Error> {
        let ip = self.addr.ip();
        let mut buffer = vec![0u8; BUFFER_SIZE];
        loop {
            let size = socket
                .recv(&mut buffer)
                .await
                .map_err(|e| Error::socket("receive", e))?;
            let data = &buffer[..size];
            debug!("{}: << {}", ip, String::from_utf8_lossy(data));

            let message = match Response::decode(ip, data) {
                Ok(message) => message,
                Err(err) => {
                    warn!("{}: Failed to decode message: {}", ip, String::from_utf8_lossy(data));
                    return Err(err);
                }
            };
            if !Response::correlates(&message, method) {
                debug!("{}: Ignoring message not answering {}: {}", ip, method, message);
                continue;
            }
            return Response::from_message(method, message);
        }
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("addr", &self.addr)
            .field("config", &self.config)
            .finish()
    }
}

/// The local address the OS would use to reach `target`.
///
/// Connecting a UDP socket sends nothing; it only resolves the route.
pub(crate) fn source_ip_for(target: IpAddr) -> io::Result<IpAddr> {
    let local: SocketAddr = match target {
        IpAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        IpAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    let probe = std::net::UdpSocket::bind(local)?;
    probe.connect((target, PORT))?;
    let ip = probe.local_addr()?.ip();
    if ip.is_unspecified() {
        return Err(io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("no route to {target}"),
        ));
    }
    Ok(ip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBulb, Model, fast_backoff, silent_socket};
    use serde_json::json;

    #[test]
    fn test_default_schedule() {
        let waits: Vec<Duration> = BackoffConfig::default().schedule().collect();
        assert_eq!(
            waits,
            [750, 1500, 3000, 3000, 3000, 3000].map(Duration::from_millis)
        );
    }

    #[test]
    fn test_source_ip_for_loopback() {
        assert_eq!(
            source_ip_for(IpAddr::V4(Ipv4Addr::LOCALHOST)).unwrap(),
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        );
    }

    #[tokio::test]
    async fn test_request_response() {
        let bulb = FakeBulb::start(Model::Rgb).await;
        let transport = Transport::new(bulb.addr(), fast_backoff());
        let response = transport.send(&Command::new(Method::GetPilot)).await.unwrap();
        assert_eq!(response.method(), Method::GetPilot);
        assert_eq!(response.result()["mac"], "ABCABCABCABC");
    }

    #[tokio::test]
    async fn test_method_not_found() {
        let bulb = FakeBulb::start(Model::RgbLegacy).await;
        let transport = Transport::new(bulb.addr(), fast_backoff());
        let err = transport
            .send(&Command::new(Method::GetModelConfig))
            .await
            .unwrap_err();
        assert_eq!(err, Error::MethodNotFound(Method::GetModelConfig));
    }

    #[tokio::test]
    async fn test_garbage_reply_is_connection_error() {
        let bulb = FakeBulb::start(Model::Broken).await;
        let transport = Transport::new(bulb.addr(), fast_backoff());
        let err = transport.send(&Command::new(Method::GetPilot)).await.unwrap_err();
        assert!(matches!(err, Error::InvalidResponse { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn test_timeout_after_full_schedule() {
        let silent = silent_socket().await;
        let config = BackoffConfig {
            first_interval: Duration::from_millis(10),
            max_interval: Duration::from_millis(40),
            max_datagrams: 6,
            timeout: Duration::from_millis(400),
        };
        let transport = Transport::new(silent.local_addr().unwrap(), config);
        let err = transport.send(&Command::new(Method::GetPilot)).await.unwrap_err();
        assert!(err.is_timeout());

        let mut received = 0;
        let mut buffer = [0u8; 512];
        while silent.try_recv(&mut buffer).is_ok() {
            received += 1;
        }
        assert_eq!(received, config.max_datagrams);
    }

    #[tokio::test]
    async fn test_unsolicited_replies_are_skipped() {
        let peer = silent_socket().await;
        let transport = Transport::new(peer.local_addr().unwrap(), fast_backoff());

        let reply = tokio::spawn(async move {
            let mut buffer = [0u8; 512];
            let (_, from) = peer.recv_from(&mut buffer).await.unwrap();
            let stray = json!({"method": "setPilot", "result": {"success": true}});
            peer.send_to(stray.to_string().as_bytes(), from).await.unwrap();
            let answer = json!({"method": "getPilot", "result": {"state": true}});
            peer.send_to(answer.to_string().as_bytes(), from).await.unwrap();
        });

        let response = transport.send(&Command::new(Method::GetPilot)).await.unwrap();
        assert_eq!(response.result(), &json!({"state": true}));
        reply.await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_requests_get_their_own_replies() {
        let bulb = FakeBulb::start(Model::Rgb).await;
        let transport = Transport::new(bulb.addr(), fast_backoff());
        let get_pilot = Command::new(Method::GetPilot);
        let get_system_config = Command::new(Method::GetSystemConfig);

        let (pilot, system) = tokio::join!(
            transport.send(&get_pilot),
            transport.send(&get_system_config)
        );
        let (pilot, system) = (pilot.unwrap(), system.unwrap());
        assert_eq!(pilot.method(), Method::GetPilot);
        assert_eq!(pilot.result()["rssi"], -62);
        assert_eq!(system.method(), Method::GetSystemConfig);
        assert_eq!(system.result()["moduleName"], "ESP01_SHRGB_03");
    }

    #[tokio::test]
    async fn test_retransmission_stops_after_reply() {
        let peer = silent_socket().await;
        let config = BackoffConfig {
            first_interval: Duration::from_millis(50),
            max_interval: Duration::from_millis(100),
            max_datagrams: 6,
            timeout: Duration::from_secs(2),
        };
        let transport = Transport::new(peer.local_addr().unwrap(), config);

        let answer_first = async {
            let mut buffer = [0u8; 512];
            let (_, from) = peer.recv_from(&mut buffer).await.unwrap();
            let answer = json!({"method": "getPilot", "result": {"state": true}});
            peer.send_to(answer.to_string().as_bytes(), from).await.unwrap();
        };
        let command = Command::new(Method::GetPilot);
        let (response, ()) = tokio::join!(transport.send(&command), answer_first);
        assert_eq!(response.unwrap().result(), &json!({"state": true}));

        // Longer than the rest of the schedule would take to fire again.
        tokio::time::sleep(Duration::from_millis(300)).await;
        let mut buffer = [0u8; 512];
        assert!(peer.try_recv(&mut buffer).is_err());
    }

    #[tokio::test]
    async fn test_transport_reopens_after_close() {
        let bulb = FakeBulb::start(Model::Rgb).await;
        let transport = Transport::new(bulb.addr(), fast_backoff());
        transport.send(&Command::new(Method::GetPilot)).await.unwrap();
        transport.close().await;
        transport.send(&Command::new(Method::GetPilot)).await.unwrap();
    }
}
