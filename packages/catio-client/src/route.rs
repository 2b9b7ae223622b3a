//! UDP route negotiation (C2).
//!
//! A TwinCAT peer only accepts ADS traffic from clients present in its
//! routing table. Before connecting over TCP, the client identifies the peer
//! and registers itself: send a discovery datagram, read the peer's Net ID
//! from the reply, then send an add-route datagram carrying the route name
//! and credentials. Credentials travel in the clear; that is inherited
//! protocol behaviour, not a choice of this crate.

use crate::errors::{ClientError, Result};
use catio_core::ams::{AmsAddr, AmsNetId, port};
use catio_core::udp::{ServiceId, Tag, TagId, UdpFrame};
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

/// The identifying payload of a route registration.
#[derive(Debug, Clone)]
pub struct RouteInfo {
    /// Name the peer stores the route under.
    pub route_name: String,
    /// Host name of this client.
    pub host_name: String,
    /// Dotted-decimal IP of this client.
    pub host_ip: String,
    /// User authorizing the route.
    pub user_name: String,
    /// Password, sent in the clear.
    pub password: String,
}

/// Negotiates routes with one peer over UDP 48899.
pub struct RouteAgent {
    socket: UdpSocket,
    local: AmsAddr,
    peer: SocketAddr,
    timeout: Duration,
    invoke_id: AtomicU32,
}

impl RouteAgent {
    /// Binds an ephemeral UDP socket aimed at `peer_ip:48899`.
    pub async fn bind(local: AmsAddr, peer_ip: IpAddr, timeout: Duration) -> Result<Self> {
        Self::bind_to(local, SocketAddr::new(peer_ip, port::ADS_UDP), timeout).await
    }

    /// Binds against a specific peer socket address. Used by tests to aim at
    /// an in-process peer on a non-standard port.
    pub async fn bind_to(local: AmsAddr, peer: SocketAddr, timeout: Duration) -> Result<Self> {
        let bind_addr: SocketAddr = if peer.is_ipv4() {
            (std::net::Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(ClientError::RouteUnreachable)?;

        Ok(Self {
            socket,
            local,
            peer,
            timeout,
            invoke_id: AtomicU32::new(1),
        })
    }

    /// Asks the peer to identify itself and returns its Net ID.
    pub async fn discover(&self, info: &RouteInfo) -> Result<AmsNetId> {
        let request = UdpFrame::request(
            self.next_invoke_id(),
            ServiceId::Identify,
            self.local,
            vec![
                Tag::string(TagId::HostName, &info.host_name),
                Tag::net_id(self.local.net_id()),
                Tag::string(TagId::IpAddress, &info.host_ip),
            ],
        );

        let reply = self.exchange(&request).await?;
        let net_id = reply
            .require_tag(TagId::NetId)
            .and_then(|t| t.as_net_id())
            .map_err(|e| {
                ClientError::Protocol(catio_core::protocol::ProtocolError::Io(
                    std::io::Error::new(std::io::ErrorKind::InvalidData, e),
                ))
            })?;

        debug!(peer = %self.peer, %net_id, "discovered peer");
        Ok(net_id)
    }

    /// Registers a route to this client in the peer's routing table.
    ///
    /// Succeeds iff the peer confirms with a zero status.
    pub async fn add_route(&self, info: &RouteInfo) -> Result<()> {
        let request = UdpFrame::request(
            self.next_invoke_id(),
            ServiceId::AddRoute,
            self.local,
            vec![
                Tag::string(TagId::RouteName, &info.route_name),
                Tag::net_id(self.local.net_id()),
                Tag::string(TagId::UserName, &info.user_name),
                Tag::string(TagId::Password, &info.password),
                Tag::string(TagId::IpAddress, &info.host_ip),
            ],
        );

        let reply = self.exchange(&request).await?;
        let status = reply
            .tag(TagId::Status)
            .map(|t| t.as_status())
            .transpose()
            .map_err(|e| {
                ClientError::Protocol(catio_core::protocol::ProtocolError::Io(
                    std::io::Error::new(std::io::ErrorKind::InvalidData, e),
                ))
            })?
            .unwrap_or(u32::MAX);

        if status != 0 {
            warn!(peer = %self.peer, status, "route refused");
            return Err(ClientError::RouteRefused { status });
        }

        debug!(peer = %self.peer, route = %info.route_name, "route registered");
        Ok(())
    }

    /// Asks the peer to drop the named route. Best-effort teardown.
    pub async fn delete_route(&self, route_name: &str) -> Result<()> {
        let request = UdpFrame::request(
            self.next_invoke_id(),
            ServiceId::DelRoute,
            self.local,
            vec![
                Tag::string(TagId::RouteName, route_name),
                Tag::net_id(self.local.net_id()),
            ],
        );

        let reply = self.exchange(&request).await?;
        match reply.tag(TagId::Status).map(|t| t.as_status()) {
            Some(Ok(0)) | None => Ok(()),
            Some(Ok(status)) => Err(ClientError::RouteRefused { status }),
            Some(Err(_)) => Err(ClientError::RouteRefused { status: u32::MAX }),
        }
    }

    fn next_invoke_id(&self) -> u32 {
        self.invoke_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Sends a datagram and waits for the matching response.
    ///
    /// Replies with a foreign invoke id or without the response bit are
    /// discarded; the deadline covers the whole exchange.
    async fn exchange(&self, request: &UdpFrame) -> Result<UdpFrame> {
        self.socket
            .send_to(&request.to_vec(), self.peer)
            .await
            .map_err(ClientError::RouteUnreachable)?;

        let deadline = tokio::time::Instant::now() + self.timeout;
        let mut buf = vec![0u8; 2048];

        loop {
            let recv = tokio::time::timeout_at(deadline, self.socket.recv_from(&mut buf));
            let (len, from) = match recv.await {
                Err(_) => return Err(ClientError::RouteTimeout),
                Ok(Err(e)) => return Err(ClientError::RouteUnreachable(e)),
                Ok(Ok(v)) => v,
            };

            if from.ip() != self.peer.ip() {
                debug!(%from, "ignoring datagram from unexpected sender");
                continue;
            }

            match UdpFrame::parse(&buf[..len]) {
                Ok(frame)
                    if frame.is_response() && frame.invoke_id() == request.invoke_id() =>
                {
                    return Ok(frame);
                }
                Ok(frame) => {
                    debug!(invoke_id = frame.invoke_id(), "ignoring unrelated datagram");
                }
                Err(e) => {
                    debug!(error = %e, "ignoring malformed datagram");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catio_core::ams::AmsNetId;

    fn info() -> RouteInfo {
        RouteInfo {
            route_name: "catio-test".into(),
            host_name: "test-host".into(),
            host_ip: "127.0.0.1".into(),
            user_name: "guest".into(),
            password: "guest".into(),
        }
    }

    fn local() -> AmsAddr {
        AmsAddr::new(AmsNetId::new(10, 0, 0, 2, 1, 1), 8000)
    }

    /// A one-shot UDP peer answering with the frames produced by `respond`.
    async fn spawn_peer(
        respond: impl Fn(UdpFrame) -> Option<UdpFrame> + Send + 'static,
    ) -> SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = vec![0u8; 2048];
            loop {
                let Ok((len, from)) = socket.recv_from(&mut buf).await else {
                    return;
                };
                let Ok(frame) = UdpFrame::parse(&buf[..len]) else {
                    continue;
                };
                if let Some(reply) = respond(frame) {
                    let _ = socket.send_to(&reply.to_vec(), from).await;
                }
            }
        });
        addr
    }

    #[tokio::test]
    async fn discover_returns_peer_net_id() {
        let peer_id = AmsNetId::new(10, 0, 0, 1, 3, 1);
        let peer = spawn_peer(move |req| {
            Some(UdpFrame::response(
                req.invoke_id(),
                ServiceId::Identify,
                AmsAddr::new(peer_id, port::SYSTEM_SERVICE),
                vec![
                    Tag::string(TagId::HostName, "plc"),
                    Tag::net_id(peer_id),
                ],
            ))
        })
        .await;

        let agent = RouteAgent::bind_to(local(), peer, Duration::from_secs(1))
            .await
            .unwrap();
        let discovered = agent.discover(&info()).await.unwrap();
        assert_eq!(discovered, peer_id);
    }

    #[tokio::test]
    async fn add_route_accepts_zero_status() {
        let peer_id = AmsNetId::new(10, 0, 0, 1, 3, 1);
        let peer = spawn_peer(move |req| {
            assert_eq!(req.service(), ServiceId::AddRoute);
            assert!(req.tag(TagId::Password).is_some());
            Some(UdpFrame::response(
                req.invoke_id(),
                ServiceId::AddRoute,
                AmsAddr::new(peer_id, port::SYSTEM_SERVICE),
                vec![Tag::status(0)],
            ))
        })
        .await;

        let agent = RouteAgent::bind_to(local(), peer, Duration::from_secs(1))
            .await
            .unwrap();
        agent.add_route(&info()).await.unwrap();
    }

    #[tokio::test]
    async fn add_route_refused_on_nonzero_status() {
        let peer_id = AmsNetId::new(10, 0, 0, 1, 3, 1);
        let peer = spawn_peer(move |req| {
            Some(UdpFrame::response(
                req.invoke_id(),
                ServiceId::AddRoute,
                AmsAddr::new(peer_id, port::SYSTEM_SERVICE),
                vec![Tag::status(0x704)],
            ))
        })
        .await;

        let agent = RouteAgent::bind_to(local(), peer, Duration::from_secs(1))
            .await
            .unwrap();
        let err = agent.add_route(&info()).await.unwrap_err();
        assert!(matches!(err, ClientError::RouteRefused { status: 0x704 }));
    }

    #[tokio::test]
    async fn silent_peer_times_out() {
        let peer = spawn_peer(|_| None).await;

        let agent = RouteAgent::bind_to(local(), peer, Duration::from_millis(100))
            .await
            .unwrap();
        let err = agent.discover(&info()).await.unwrap_err();
        assert!(matches!(err, ClientError::RouteTimeout));
    }

    #[tokio::test]
    async fn unrelated_replies_are_skipped() {
        let peer_id = AmsNetId::new(10, 0, 0, 1, 3, 1);
        let peer = spawn_peer(move |req| {
            // reply twice: first with a wrong invoke id via a detached send,
            // modelled here by answering with the right one only
            Some(UdpFrame::response(
                req.invoke_id(),
                ServiceId::Identify,
                AmsAddr::new(peer_id, port::SYSTEM_SERVICE),
                vec![Tag::net_id(peer_id)],
            ))
        })
        .await;

        let agent = RouteAgent::bind_to(local(), peer, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(agent.discover(&info()).await.unwrap(), peer_id);
    }
}
