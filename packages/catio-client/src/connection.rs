//! The framed transport (C3): one TCP connection, one background receiver,
//! arbitrarily many outstanding requests correlated by invoke id.
//!
//! A caller allocates the next invoke id, registers a one-shot response
//! slot, writes its frame under the writer lock, and suspends until the slot
//! resolves. The receiver resolves slots as responses arrive and routes
//! notification frames to the engine's channel. Abandoning a wait removes
//! the slot, so a late response is discarded instead of reaching the wrong
//! requester.

use crate::errors::{ClientError, Result};
use catio_core::ads::{AdsCommand, AdsHeader};
use catio_core::ams::{AmsAddr, AmsNetId, port};
use catio_core::io::{AmsFrame, AmsReader, AmsStream, AmsWriter};
use catio_core::protocol::{DeviceNotification, DeviceNotificationOwned};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

type ResponseSlot = oneshot::Sender<Result<AmsFrame>>;

/// Stream of notification frames the receiver hands to the engine (C7).
pub type NotificationStream = mpsc::UnboundedReceiver<DeviceNotificationOwned>;

struct ConnInner {
    local: AmsAddr,
    target_net_id: AmsNetId,
    request_timeout: Duration,
    invoke_id: AtomicU32,
    closed: AtomicBool,
    pending: StdMutex<HashMap<u32, ResponseSlot>>,
    writer: Mutex<Option<AmsWriter<OwnedWriteHalf>>>,
    recv_task: StdMutex<Option<JoinHandle<()>>>,
}

impl ConnInner {
    /// Fails every pending slot and marks the connection closed.
    ///
    /// Safe to call from both the receiver teardown and `close()`; slots are
    /// drained exactly once because the map is emptied under the lock.
    fn fail_pending(&self, reason: &str) {
        self.closed.store(true, Ordering::SeqCst);
        let drained: Vec<ResponseSlot> = {
            let mut pending = self.pending.lock().expect("pending lock poisoned");
            pending.drain().map(|(_, tx)| tx).collect()
        };
        for tx in drained {
            let _ = tx.send(Err(ClientError::ConnectionLost {
                reason: reason.to_string(),
            }));
        }
    }
}

/// Removes a response slot if the registering caller gives up on it.
struct SlotGuard<'a> {
    inner: &'a ConnInner,
    invoke_id: u32,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.inner.pending.lock() {
            pending.remove(&self.invoke_id);
        }
    }
}

/// A live ADS connection. Cheap to clone; all clones share the socket,
/// the invoke-id counter, and the response-slot table.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnInner>,
}

impl Connection {
    /// Connects to `peer_ip:48898` and spawns the background receiver.
    ///
    /// Returns the connection and the stream of notification frames for the
    /// notification engine. The stream ends when the connection dies.
    pub async fn connect(
        peer_ip: IpAddr,
        target_net_id: AmsNetId,
        local: AmsAddr,
        request_timeout: Duration,
    ) -> Result<(Self, NotificationStream)> {
        let stream = AmsStream::connect((peer_ip, port::ADS_TCP))
            .await
            .map_err(|e| ClientError::ConnectionLost {
                reason: e.to_string(),
            })?;
        Ok(Self::from_stream(stream, target_net_id, local, request_timeout))
    }

    /// Connects to an explicit socket address. Used by tests to reach an
    /// in-process peer on a non-standard port.
    pub async fn connect_to(
        addr: std::net::SocketAddr,
        target_net_id: AmsNetId,
        local: AmsAddr,
        request_timeout: Duration,
    ) -> Result<(Self, NotificationStream)> {
        let stream =
            AmsStream::connect(addr)
                .await
                .map_err(|e| ClientError::ConnectionLost {
                    reason: e.to_string(),
                })?;
        Ok(Self::from_stream(stream, target_net_id, local, request_timeout))
    }

    fn from_stream(
        stream: AmsStream,
        target_net_id: AmsNetId,
        local: AmsAddr,
        request_timeout: Duration,
    ) -> (Self, NotificationStream) {
        let (reader, writer) = stream.into_split();
        let (notif_tx, notif_rx) = mpsc::unbounded_channel();

        let inner = Arc::new(ConnInner {
            local,
            target_net_id,
            request_timeout,
            invoke_id: AtomicU32::new(0),
            closed: AtomicBool::new(false),
            pending: StdMutex::new(HashMap::new()),
            writer: Mutex::new(Some(writer)),
            recv_task: StdMutex::new(None),
        });

        let task = tokio::spawn(receive_loop(reader, Arc::clone(&inner), notif_tx));
        *inner.recv_task.lock().expect("recv task lock poisoned") = Some(task);

        (Self { inner }, notif_rx)
    }

    /// The AMS address this client identifies as.
    pub fn local(&self) -> AmsAddr {
        self.inner.local
    }

    /// The peer's Net ID. Combine with a port to address a service on it.
    pub fn target_net_id(&self) -> AmsNetId {
        self.inner.target_net_id
    }

    /// The peer's I/O server endpoint.
    pub fn io_server(&self) -> AmsAddr {
        AmsAddr::new(self.inner.target_net_id, port::IO_SERVER)
    }

    /// The default per-request deadline.
    pub fn request_timeout(&self) -> Duration {
        self.inner.request_timeout
    }

    /// True once the connection has been closed or lost.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Allocates the next invoke id.
    pub fn next_invoke_id(&self) -> u32 {
        self.inner.invoke_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Sends a request frame and awaits the response with the given invoke
    /// id under the default deadline.
    pub async fn transact(&self, invoke_id: u32, frame: AmsFrame) -> Result<AmsFrame> {
        self.transact_deadline(invoke_id, frame, self.inner.request_timeout)
            .await
    }

    /// Sends a request frame and awaits the response under an explicit
    /// deadline.
    pub async fn transact_deadline(
        &self,
        invoke_id: u32,
        frame: AmsFrame,
        deadline: Duration,
    ) -> Result<AmsFrame> {
        if self.is_closed() {
            return Err(ClientError::ConnectionClosed);
        }

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.inner.pending.lock().expect("pending lock poisoned");
            pending.insert(invoke_id, tx);
        }
        let _guard = SlotGuard {
            inner: &self.inner,
            invoke_id,
        };

        self.write_frame(&frame).await?;

        match tokio::time::timeout(deadline, rx).await {
            Err(_) => Err(ClientError::RequestTimeout {
                context: format!("invoke id {invoke_id}"),
                after: deadline,
            }),
            // the sender only disappears without a value if the receiver
            // tore down between our registration and its drain
            Ok(Err(_)) => Err(ClientError::ConnectionLost {
                reason: "receiver stopped".to_string(),
            }),
            Ok(Ok(result)) => result,
        }
    }

    /// Writes one frame under the writer lock. Frames are atomic on the
    /// wire: one lock acquisition per frame.
    async fn write_frame(&self, frame: &AmsFrame) -> Result<()> {
        let mut slot = self.inner.writer.lock().await;
        let writer = slot.as_mut().ok_or(ClientError::ConnectionClosed)?;
        writer.write_frame(frame).await.map_err(|e| {
            warn!(error = %e, "write failed");
            ClientError::ConnectionLost {
                reason: e.to_string(),
            }
        })
    }

    /// Closes the connection: stops the receiver, drops the socket, and
    /// fails anything still pending with `ConnectionClosed` semantics.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(task) = self
            .inner
            .recv_task
            .lock()
            .expect("recv task lock poisoned")
            .take()
        {
            task.abort();
        }
        *self.inner.writer.lock().await = None;
        self.inner.fail_pending("connection closed locally");
    }
}

/// The single background receiver of a connection.
///
/// Protocol faults seen here are fatal for the connection: a frame that
/// cannot be split into header and body means the stream is desynchronized,
/// and there is no way to find the next frame boundary.
async fn receive_loop(
    mut reader: AmsReader<OwnedReadHalf>,
    inner: Arc<ConnInner>,
    notif_tx: mpsc::UnboundedSender<DeviceNotificationOwned>,
) {
    let reason = loop {
        let frame = match reader.read_frame().await {
            Ok(frame) => frame,
            Err(e) => break e.to_string(),
        };

        let header = match AdsHeader::parse_prefix(frame.payload()) {
            Ok((header, _)) => header,
            Err(e) => break format!("unparseable frame: {e}"),
        };

        if header.command_id() == AdsCommand::DeviceNotification {
            if !header.error_code().is_ok() {
                // never observed from real servers; treated as fatal
                break format!("notification frame carried error {}", header.error_code());
            }
            match DeviceNotification::try_from(&frame) {
                Ok(view) => {
                    let _ = notif_tx.send(view.into_owned());
                }
                Err(e) => break format!("malformed notification: {e}"),
            }
            continue;
        }

        let slot = {
            let mut pending = inner.pending.lock().expect("pending lock poisoned");
            pending.remove(&header.invoke_id())
        };
        match slot {
            Some(tx) => {
                // the requester may have timed out in the meantime
                let _ = tx.send(Ok(frame));
            }
            None => {
                debug!(
                    invoke_id = header.invoke_id(),
                    command = ?header.command_id(),
                    "dropping response with no pending slot"
                );
            }
        }
    };

    debug!(%reason, "receiver stopping");
    inner.fail_pending(&reason);
    *inner.writer.lock().await = None;
    // notif_tx drops here; the engine observes the closed channel
}

#[cfg(test)]
mod tests {
    use super::*;
    use catio_core::ads::AdsReturnCode;
    use catio_core::io::AmsReader as CoreReader;
    use catio_core::protocol::{ReadRequest, ReadResponse, ReadResponseOwned};
    use tokio::net::TcpListener;

    fn local() -> AmsAddr {
        AmsAddr::new(AmsNetId::new(10, 0, 0, 2, 1, 1), 8001)
    }

    fn target_id() -> AmsNetId {
        AmsNetId::new(10, 0, 0, 1, 3, 1)
    }

    async fn connect_pair() -> (Connection, NotificationStream, tokio::net::TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept = tokio::spawn(async move { listener.accept().await.unwrap().0 });
        let (conn, notifs) =
            Connection::connect_to(addr, target_id(), local(), Duration::from_secs(2))
                .await
                .unwrap();
        let server = accept.await.unwrap();
        (conn, notifs, server)
    }

    #[tokio::test]
    async fn responses_matched_by_invoke_id_out_of_order() {
        let (conn, _notifs, server) = connect_pair().await;
        let server_addr = AmsAddr::new(target_id(), port::IO_SERVER);

        // server: read two requests, answer them in reverse order with
        // payloads derived from the invoke id
        let server_task = tokio::spawn(async move {
            let (read_half, write_half) = server.into_split();
            let mut reader = CoreReader::new(read_half);
            let mut writer = AmsWriter::new(write_half);

            let mut invokes = Vec::new();
            for _ in 0..2 {
                let frame = reader.read_frame().await.unwrap();
                let req = ReadRequest::try_from(&frame).unwrap();
                invokes.push((req.header().invoke_id(), *req.header().source()));
            }
            invokes.reverse();
            for (invoke_id, source) in invokes {
                let resp = ReadResponseOwned::new(
                    source,
                    server_addr,
                    invoke_id,
                    AdsReturnCode::Ok,
                    vec![invoke_id as u8],
                );
                writer.write_frame(&resp.to_frame()).await.unwrap();
            }
        });

        let target = AmsAddr::new(target_id(), port::IO_SERVER);
        let mut waiters = Vec::new();
        for _ in 0..2 {
            let conn = conn.clone();
            waiters.push(tokio::spawn(async move {
                let invoke_id = conn.next_invoke_id();
                let req =
                    ReadRequest::new(target, conn.local(), invoke_id, 0xF020, 0, 1).to_frame();
                let frame = conn.transact(invoke_id, req).await.unwrap();
                let resp = ReadResponse::try_from(&frame).unwrap();
                assert_eq!(resp.data(), &[invoke_id as u8]);
            }));
        }
        for waiter in waiters {
            waiter.await.unwrap();
        }
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn peer_disconnect_fails_pending_and_closes() {
        let (conn, _notifs, server) = connect_pair().await;

        let target = AmsAddr::new(target_id(), port::IO_SERVER);
        let invoke_id = conn.next_invoke_id();
        let req = ReadRequest::new(target, conn.local(), invoke_id, 0xF020, 0, 1).to_frame();

        let pending = {
            let conn = conn.clone();
            tokio::spawn(async move { conn.transact(invoke_id, req).await })
        };

        // give the request time to get registered, then kill the peer
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(server);

        let err = pending.await.unwrap().unwrap_err();
        assert!(matches!(err, ClientError::ConnectionLost { .. }));

        // subsequent writes fail fast
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(conn.is_closed());
        let invoke_id = conn.next_invoke_id();
        let req = ReadRequest::new(target, conn.local(), invoke_id, 0xF020, 0, 1).to_frame();
        let err = conn.transact(invoke_id, req).await.unwrap_err();
        assert!(matches!(err, ClientError::ConnectionClosed));
    }

    #[tokio::test]
    async fn timeout_discards_late_response() {
        let (conn, _notifs, server) = connect_pair().await;
        let server_addr = AmsAddr::new(target_id(), port::IO_SERVER);

        let server_task = tokio::spawn(async move {
            let (read_half, write_half) = server.into_split();
            let mut reader = CoreReader::new(read_half);
            let mut writer = AmsWriter::new(write_half);

            let frame = reader.read_frame().await.unwrap();
            let req = ReadRequest::try_from(&frame).unwrap();
            let invoke_id = req.header().invoke_id();
            let source = *req.header().source();

            // answer far too late
            tokio::time::sleep(Duration::from_millis(200)).await;
            let resp =
                ReadResponseOwned::new(source, server_addr, invoke_id, AdsReturnCode::Ok, [1u8]);
            writer.write_frame(&resp.to_frame()).await.unwrap();

            // connection must still be usable: answer the second request
            let frame = reader.read_frame().await.unwrap();
            let req = ReadRequest::try_from(&frame).unwrap();
            let resp = ReadResponseOwned::new(
                *req.header().source(),
                server_addr,
                req.header().invoke_id(),
                AdsReturnCode::Ok,
                [2u8],
            );
            writer.write_frame(&resp.to_frame()).await.unwrap();
        });

        let target = AmsAddr::new(target_id(), port::IO_SERVER);

        let invoke_id = conn.next_invoke_id();
        let req = ReadRequest::new(target, conn.local(), invoke_id, 0xF020, 0, 1).to_frame();
        let err = conn
            .transact_deadline(invoke_id, req, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::RequestTimeout { .. }));

        // the late response for the timed-out id is dropped, not delivered
        let invoke_id = conn.next_invoke_id();
        let req = ReadRequest::new(target, conn.local(), invoke_id, 0xF020, 0, 1).to_frame();
        let frame = conn.transact(invoke_id, req).await.unwrap();
        let resp = ReadResponse::try_from(&frame).unwrap();
        assert_eq!(resp.data(), &[2u8]);

        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn close_is_idempotent_and_fails_writes() {
        let (conn, _notifs, _server) = connect_pair().await;
        conn.close().await;
        conn.close().await;

        let target = AmsAddr::new(target_id(), port::IO_SERVER);
        let invoke_id = conn.next_invoke_id();
        let req = ReadRequest::new(target, conn.local(), invoke_id, 0xF020, 0, 1).to_frame();
        let err = conn.transact(invoke_id, req).await.unwrap_err();
        assert!(matches!(err, ClientError::ConnectionClosed));
    }
}
