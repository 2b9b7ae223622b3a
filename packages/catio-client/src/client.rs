//! The per-session client object.
//!
//! Owns the connection, the notification engine, the topology cache, and
//! the per-device symbol catalogs. Every public method validates the
//! session state first: *unopened → connected → introspected → closed*.
//! There is no process-wide state; two clients are two sessions.

use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::errors::{ClientError, Result};
use crate::notify::{NotificationEngine, SampleRecord, Subscription};
use crate::route::{RouteAgent, RouteInfo};
use crate::symbols::{Symbol, SymbolCatalog};
use crate::topology::{self, IoServer};
use catio_core::ads::NotificationHandle;
use catio_core::ams::{AmsAddr, AmsNetId, port};
use catio_core::protocol::NotificationSettings;
use serde::Serialize;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Lifecycle position of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Unopened,
    Connected,
    Introspected,
    Closed,
}

struct RegisteredRoute {
    agent: RouteAgent,
    route_name: String,
}

struct ClientInner {
    config: ClientConfig,
    state: StdMutex<SessionState>,
    conn: StdMutex<Option<Connection>>,
    engine: StdMutex<Option<NotificationEngine>>,
    topology: StdMutex<Option<IoServer>>,
    catalogs: StdMutex<HashMap<u32, SymbolCatalog>>,
    route: StdMutex<Option<RegisteredRoute>>,
}

/// A session against one TwinCAT peer.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Creates an unopened session.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                config,
                state: StdMutex::new(SessionState::Unopened),
                conn: StdMutex::new(None),
                engine: StdMutex::new(None),
                topology: StdMutex::new(None),
                catalogs: StdMutex::new(HashMap::new()),
                route: StdMutex::new(None),
            }),
        }
    }

    /// Returns the session state.
    pub fn state(&self) -> SessionState {
        *self.inner.state.lock().expect("state lock poisoned")
    }

    fn require_state(&self, allowed: &[SessionState], op: &'static str) -> Result<()> {
        let state = self.state();
        if allowed.contains(&state) {
            Ok(())
        } else {
            Err(ClientError::InvalidState { op, state })
        }
    }

    fn set_state(&self, state: SessionState) {
        *self.inner.state.lock().expect("state lock poisoned") = state;
    }

    fn connection(&self) -> Result<Connection> {
        self.inner
            .conn
            .lock()
            .expect("conn lock poisoned")
            .clone()
            .ok_or(ClientError::ConnectionClosed)
    }

    /// Discovers the peer's Net ID and registers a route to this client.
    ///
    /// Returns the peer's Net ID for the subsequent [`connect`](Self::connect).
    pub async fn add_route(&self, peer_ip: IpAddr, route: RouteInfo) -> Result<AmsNetId> {
        self.add_route_at(SocketAddr::new(peer_ip, port::ADS_UDP), route)
            .await
    }

    /// Like [`add_route`](Self::add_route) against an explicit UDP socket
    /// address. Used by tests to reach an in-process peer.
    pub async fn add_route_at(&self, peer: SocketAddr, route: RouteInfo) -> Result<AmsNetId> {
        self.require_state(&[SessionState::Unopened], "add_route")?;

        let agent = RouteAgent::bind_to(
            self.inner.config.local,
            peer,
            self.inner.config.route_timeout,
        )
        .await?;
        let peer_net_id = agent.discover(&route).await?;
        agent.add_route(&route).await?;

        *self.inner.route.lock().expect("route lock poisoned") = Some(RegisteredRoute {
            agent,
            route_name: route.route_name,
        });
        Ok(peer_net_id)
    }

    /// Opens the TCP session: *unopened → connected*.
    pub async fn connect(&self, peer_ip: IpAddr, target: AmsNetId) -> Result<()> {
        self.connect_at(SocketAddr::new(peer_ip, port::ADS_TCP), target)
            .await
    }

    /// Like [`connect`](Self::connect) against an explicit socket address.
    pub async fn connect_at(&self, peer: SocketAddr, target: AmsNetId) -> Result<()> {
        self.require_state(&[SessionState::Unopened], "connect")?;

        let (conn, stream) = Connection::connect_to(
            peer,
            target,
            self.inner.config.local,
            self.inner.config.request_timeout,
        )
        .await?;
        let engine = NotificationEngine::start(
            conn.clone(),
            stream,
            self.inner.config.flush_interval,
            self.inner.config.notification_buffer,
        );

        *self.inner.conn.lock().expect("conn lock poisoned") = Some(conn);
        *self.inner.engine.lock().expect("engine lock poisoned") = Some(engine);
        self.set_state(SessionState::Connected);
        debug!(%peer, "session connected");
        Ok(())
    }

    /// Reads the peer's device info without touching the topology cache.
    pub async fn read_device_info(&self) -> Result<catio_core::protocol::DeviceInfo> {
        self.require_state(
            &[SessionState::Connected, SessionState::Introspected],
            "read_device_info",
        )?;
        let conn = self.connection()?;
        conn.read_device_info(conn.io_server()).await
    }

    /// Runs the topology introspection: *connected → introspected*.
    ///
    /// Results are cached; calling again re-runs the scan and atomically
    /// replaces the cache.
    pub async fn introspect(&self) -> Result<IoServer> {
        self.require_state(
            &[SessionState::Connected, SessionState::Introspected],
            "introspect",
        )?;
        let conn = self.connection()?;
        let server = topology::introspect(&conn, self.inner.config.introspect_timeout).await?;

        *self.inner.topology.lock().expect("topology lock poisoned") = Some(server.clone());
        self.set_state(SessionState::Introspected);
        Ok(server)
    }

    /// Returns a snapshot of the cached topology.
    pub fn topology(&self) -> Result<IoServer> {
        self.require_state(&[SessionState::Introspected], "topology")?;
        self.inner
            .topology
            .lock()
            .expect("topology lock poisoned")
            .clone()
            .ok_or(ClientError::InvalidState {
                op: "topology",
                state: self.state(),
            })
    }

    /// Re-reads frame and slave counters, replacing the cache atomically.
    pub async fn refresh_counters(&self) -> Result<()> {
        let mut server = self.topology()?;
        let conn = self.connection()?;
        topology::refresh_counters(&conn, &mut server.devices).await?;
        *self.inner.topology.lock().expect("topology lock poisoned") = Some(server);
        Ok(())
    }

    /// Re-reads device link states, replacing the cache atomically.
    pub async fn refresh_link_states(&self) -> Result<()> {
        let mut server = self.topology()?;
        let conn = self.connection()?;
        topology::refresh_link_states(&conn, &mut server.devices).await?;
        *self.inner.topology.lock().expect("topology lock poisoned") = Some(server);
        Ok(())
    }

    fn device_addr(&self, device_id: u32) -> Result<AmsAddr> {
        let topology = self.inner.topology.lock().expect("topology lock poisoned");
        let server = topology.as_ref().ok_or(ClientError::InvalidState {
            op: "device_addr",
            state: self.state(),
        })?;
        let device = server
            .device(device_id)
            .ok_or_else(|| ClientError::InvalidArgument {
                message: format!("no device with id {device_id}"),
            })?;
        Ok(AmsAddr::new(device.net_id, port::IO_SERVER))
    }

    /// Uploads and caches the symbol catalog of a device.
    pub async fn load_symbols(&self, device_id: u32) -> Result<SymbolCatalog> {
        self.require_state(&[SessionState::Introspected], "load_symbols")?;
        let conn = self.connection()?;
        let target = self.device_addr(device_id)?;

        let catalog = conn.upload_symbols(target, device_id).await?;
        self.inner
            .catalogs
            .lock()
            .expect("catalogs lock poisoned")
            .insert(device_id, catalog.clone());
        Ok(catalog)
    }

    /// Returns the cached catalog of a device, uploading it on first use.
    pub async fn symbols(&self, device_id: u32) -> Result<SymbolCatalog> {
        self.require_state(&[SessionState::Introspected], "symbols")?;
        let cached = {
            let catalogs = self.inner.catalogs.lock().expect("catalogs lock poisoned");
            catalogs.get(&device_id).cloned()
        };
        match cached {
            Some(catalog) => Ok(catalog),
            None => self.load_symbols(device_id).await,
        }
    }

    fn lookup_symbol(&self, device_id: u32, name: &str) -> Result<Symbol> {
        let catalogs = self.inner.catalogs.lock().expect("catalogs lock poisoned");
        catalogs
            .get(&device_id)
            .and_then(|c| c.get(name))
            .cloned()
            .ok_or_else(|| ClientError::UnknownSymbol {
                name: name.to_string(),
                device_id,
            })
    }

    /// Reads a symbol's raw bytes by name.
    pub async fn read_symbol(&self, device_id: u32, name: &str) -> Result<Vec<u8>> {
        self.require_state(&[SessionState::Introspected], "read_symbol")?;
        let symbol = self.lookup_symbol(device_id, name)?;
        let conn = self.connection()?;
        let target = self.device_addr(device_id)?;
        conn.read(target, symbol.index_group, symbol.index_offset, symbol.size)
            .await
    }

    /// Writes a symbol's raw bytes by name. The payload must match the
    /// symbol's declared size.
    pub async fn write_symbol(&self, device_id: u32, name: &str, data: Vec<u8>) -> Result<()> {
        self.require_state(&[SessionState::Introspected], "write_symbol")?;
        let symbol = self.lookup_symbol(device_id, name)?;
        if data.len() != symbol.size as usize {
            return Err(ClientError::InvalidArgument {
                message: format!(
                    "symbol {:?} is {} bytes, payload is {}",
                    name,
                    symbol.size,
                    data.len()
                ),
            });
        }
        let conn = self.connection()?;
        let target = self.device_addr(device_id)?;
        conn.write(target, symbol.index_group, symbol.index_offset, data)
            .await
    }

    /// Subscribes to change notifications of a symbol.
    pub async fn subscribe(
        &self,
        device_id: u32,
        name: &str,
        settings: NotificationSettings,
    ) -> Result<SymbolSubscription> {
        self.require_state(&[SessionState::Introspected], "subscribe")?;
        let symbol = self.lookup_symbol(device_id, name)?;
        let target = self.device_addr(device_id)?;
        let engine = self
            .inner
            .engine
            .lock()
            .expect("engine lock poisoned")
            .clone()
            .ok_or(ClientError::ConnectionClosed)?;

        let subscription = engine
            .subscribe(
                target,
                symbol.index_group,
                symbol.index_offset,
                symbol.size,
                settings,
            )
            .await?;

        self.mark_notification(device_id, name, Some(subscription.handle()));
        Ok(SymbolSubscription {
            client: Arc::clone(&self.inner),
            device_id,
            name: name.to_string(),
            inner: subscription,
        })
    }

    fn mark_notification(&self, device_id: u32, name: &str, handle: Option<NotificationHandle>) {
        let mut catalogs = self.inner.catalogs.lock().expect("catalogs lock poisoned");
        if let Some(catalog) = catalogs.get_mut(&device_id) {
            catalog.set_notification(name, handle);
        }
    }

    /// Closes the session: cancels subscriptions, closes the connection,
    /// and deletes the registered route. Idempotent; any state → closed.
    pub async fn close(&self) {
        if self.state() == SessionState::Closed {
            return;
        }
        self.set_state(SessionState::Closed);

        let engine = self.inner.engine.lock().expect("engine lock poisoned").take();
        if let Some(engine) = engine {
            engine.shutdown().await;
        }

        let conn = self.inner.conn.lock().expect("conn lock poisoned").take();
        if let Some(conn) = conn {
            conn.close().await;
        }

        let route = self.inner.route.lock().expect("route lock poisoned").take();
        if let Some(route) = route {
            if let Err(e) = route.agent.delete_route(&route.route_name).await {
                warn!(error = %e, "route teardown failed");
            }
        }

        self.inner
            .catalogs
            .lock()
            .expect("catalogs lock poisoned")
            .clear();
        *self.inner.topology.lock().expect("topology lock poisoned") = None;
    }

    /// The session configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }
}

/// A symbol subscription that keeps the catalog's notification flag honest.
pub struct SymbolSubscription {
    client: Arc<ClientInner>,
    device_id: u32,
    name: String,
    inner: Subscription,
}

impl SymbolSubscription {
    /// The server-assigned handle.
    pub fn handle(&self) -> NotificationHandle {
        self.inner.handle()
    }

    /// Receives the next sample in server order.
    pub async fn recv(&self) -> Result<SampleRecord> {
        self.inner.recv().await
    }

    /// Receives the next sample or gives up after `timeout`.
    pub async fn recv_timeout(&self, timeout: Duration) -> Result<SampleRecord> {
        self.inner.recv_timeout(timeout).await
    }

    /// Cancels the subscription server-side and locally.
    pub async fn cancel(self) -> Result<()> {
        {
            let mut catalogs = self.client.catalogs.lock().expect("catalogs lock poisoned");
            if let Some(catalog) = catalogs.get_mut(&self.device_id) {
                catalog.set_notification(&self.name, None);
            }
        }
        self.inner.cancel().await
    }
}
