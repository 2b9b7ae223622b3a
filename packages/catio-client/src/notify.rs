//! The notification engine (C7): subscription bookkeeping and sample fan-out.
//!
//! The connection's receiver hands decoded notification frames to a single
//! dispatch task here. Samples are buffered raw per handle and decoded on
//! read, so a malformed sample on one handle cannot stall another handle's
//! consumer. Consumers are woken on a flush tick, which bounds delivery lag
//! by the configured interval. A consumer that falls behind loses the
//! oldest samples for its handle and sees an overflow on its next read.

use crate::connection::{Connection, NotificationStream};
use crate::errors::{ClientError, Result};
use catio_core::ads::{IndexGroup, IndexOffset, NotificationHandle, WindowsFileTime};
use catio_core::ams::AmsAddr;
use catio_core::protocol::NotificationSettings;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Why a handle's sample stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseReason {
    Cancelled,
    ConnectionLost,
}

/// One buffered raw sample.
#[derive(Debug, Clone)]
pub struct SampleRecord {
    /// Server-side timestamp of the sample.
    pub timestamp: WindowsFileTime,
    /// Undecoded sample bytes.
    pub data: Vec<u8>,
}

struct HandleQueue {
    samples: VecDeque<SampleRecord>,
    dropped: u64,
    closed: Option<CloseReason>,
}

struct HandleState {
    queue: StdMutex<HandleQueue>,
    wake: Notify,
}

impl HandleState {
    fn new() -> Self {
        Self {
            queue: StdMutex::new(HandleQueue {
                samples: VecDeque::new(),
                dropped: 0,
                closed: None,
            }),
            wake: Notify::new(),
        }
    }

    fn close(&self, reason: CloseReason) {
        let mut queue = self.queue.lock().expect("queue lock poisoned");
        if reason == CloseReason::Cancelled {
            // cancelled subscriptions drop anything still buffered
            queue.samples.clear();
            queue.dropped = 0;
        }
        queue.closed.get_or_insert(reason);
        drop(queue);
        self.wake.notify_waiters();
    }
}

struct EngineInner {
    conn: Connection,
    capacity: usize,
    handles: StdMutex<HashMap<NotificationHandle, Arc<HandleState>>>,
    dispatch_task: StdMutex<Option<JoinHandle<()>>>,
}

/// Subscription registry and sample dispatcher for one connection.
#[derive(Clone)]
pub struct NotificationEngine {
    inner: Arc<EngineInner>,
}

impl NotificationEngine {
    /// Starts the engine over a connection's notification stream.
    pub fn start(conn: Connection, stream: NotificationStream, flush_interval: Duration, capacity: usize) -> Self {
        let inner = Arc::new(EngineInner {
            conn,
            capacity,
            handles: StdMutex::new(HashMap::new()),
            dispatch_task: StdMutex::new(None),
        });

        let task = tokio::spawn(dispatch_loop(Arc::clone(&inner), stream, flush_interval));
        *inner
            .dispatch_task
            .lock()
            .expect("dispatch task lock poisoned") = Some(task);

        Self { inner }
    }

    /// Subscribes to `length` bytes at `(group, offset)` on `target`.
    pub async fn subscribe(
        &self,
        target: AmsAddr,
        group: IndexGroup,
        offset: IndexOffset,
        length: u32,
        settings: NotificationSettings,
    ) -> Result<Subscription> {
        let handle = self
            .inner
            .conn
            .add_notification(target, group, offset, length, settings)
            .await?;

        let state = Arc::new(HandleState::new());
        {
            let mut handles = self.inner.handles.lock().expect("handles lock poisoned");
            handles.insert(handle, Arc::clone(&state));
        }
        debug!(%handle, group, offset, "subscribed");

        Ok(Subscription {
            engine: Arc::clone(&self.inner),
            target,
            handle,
            state,
        })
    }

    /// Returns the number of live subscriptions.
    pub fn active(&self) -> usize {
        self.inner.handles.lock().expect("handles lock poisoned").len()
    }

    /// Cancels every subscription: server-side deletes where the connection
    /// still stands, local teardown regardless.
    pub async fn shutdown(&self) {
        let drained: Vec<(NotificationHandle, Arc<HandleState>)> = {
            let mut handles = self.inner.handles.lock().expect("handles lock poisoned");
            handles.drain().collect()
        };

        let target = self.inner.conn.io_server();
        for (handle, state) in drained {
            if !self.inner.conn.is_closed() {
                if let Err(e) = self.inner.conn.delete_notification(target, handle).await {
                    warn!(%handle, error = %e, "delete-notification failed during shutdown");
                }
            }
            state.close(CloseReason::Cancelled);
        }

        if let Some(task) = self
            .inner
            .dispatch_task
            .lock()
            .expect("dispatch task lock poisoned")
            .take()
        {
            task.abort();
        }
    }
}

/// Routes incoming notification frames into per-handle queues and wakes
/// consumers on a fixed flush cadence.
async fn dispatch_loop(
    inner: Arc<EngineInner>,
    mut stream: NotificationStream,
    flush_interval: Duration,
) {
    let mut tick = tokio::time::interval(flush_interval);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut dirty: Vec<Arc<HandleState>> = Vec::new();

    loop {
        tokio::select! {
            maybe = stream.recv() => {
                let Some(notification) = maybe else {
                    break;
                };
                let handles = inner.handles.lock().expect("handles lock poisoned");
                for stamp in notification.into_stamps() {
                    let timestamp = stamp.timestamp();
                    for sample in stamp.into_samples() {
                        let handle = sample.handle();
                        let Some(state) = handles.get(&handle) else {
                            debug!(%handle, "sample for unknown handle dropped");
                            continue;
                        };
                        let mut queue = state.queue.lock().expect("queue lock poisoned");
                        if queue.samples.len() >= inner.capacity {
                            queue.samples.pop_front();
                            queue.dropped += 1;
                        }
                        queue.samples.push_back(SampleRecord {
                            timestamp,
                            data: sample.into_data(),
                        });
                        drop(queue);
                        if !dirty.iter().any(|d| Arc::ptr_eq(d, state)) {
                            dirty.push(Arc::clone(state));
                        }
                    }
                }
            }
            _ = tick.tick() => {
                for state in dirty.drain(..) {
                    state.wake.notify_waiters();
                }
            }
        }
    }

    // connection gone: every consumer resolves with ConnectionLost
    let drained: Vec<Arc<HandleState>> = {
        let mut handles = inner.handles.lock().expect("handles lock poisoned");
        handles.drain().map(|(_, state)| state).collect()
    };
    for state in drained {
        state.close(CloseReason::ConnectionLost);
    }
    for state in dirty {
        state.wake.notify_waiters();
    }
    debug!("notification dispatch stopped");
}

/// A live subscription: receive samples, then cancel.
pub struct Subscription {
    engine: Arc<EngineInner>,
    target: AmsAddr,
    handle: NotificationHandle,
    state: Arc<HandleState>,
}

impl Subscription {
    /// The server-assigned handle.
    pub fn handle(&self) -> NotificationHandle {
        self.handle
    }

    /// Receives the next sample in server order.
    ///
    /// Returns `NotificationOverflow` once after samples were dropped, then
    /// resumes with the oldest retained sample. Returns `ConnectionLost`
    /// or `ConnectionClosed` when the stream has ended.
    pub async fn recv(&self) -> Result<SampleRecord> {
        loop {
            // register as a waiter before checking the queue, otherwise a
            // flush between the check and the await is lost
            let wake = self.state.wake.notified();
            tokio::pin!(wake);
            wake.as_mut().enable();
            {
                let mut queue = self.state.queue.lock().expect("queue lock poisoned");
                if queue.dropped > 0 {
                    let dropped = std::mem::take(&mut queue.dropped);
                    return Err(ClientError::NotificationOverflow {
                        handle: self.handle,
                        dropped,
                    });
                }
                if let Some(sample) = queue.samples.pop_front() {
                    return Ok(sample);
                }
                match queue.closed {
                    Some(CloseReason::Cancelled) => return Err(ClientError::ConnectionClosed),
                    Some(CloseReason::ConnectionLost) => {
                        return Err(ClientError::ConnectionLost {
                            reason: "notification stream ended".to_string(),
                        });
                    }
                    None => {}
                }
            }
            wake.await;
        }
    }

    /// Receives the next sample or gives up after `timeout`.
    pub async fn recv_timeout(&self, timeout: Duration) -> Result<SampleRecord> {
        match tokio::time::timeout(timeout, self.recv()).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::RequestTimeout {
                context: format!("notification handle {}", self.handle),
                after: timeout,
            }),
        }
    }

    /// Cancels the subscription on the server and locally. Buffered samples
    /// for the handle are dropped.
    pub async fn cancel(self) -> Result<()> {
        {
            let mut handles = self.engine.handles.lock().expect("handles lock poisoned");
            handles.remove(&self.handle);
        }
        self.state.close(CloseReason::Cancelled);

        if self.engine.conn.is_closed() {
            return Ok(());
        }
        self.engine
            .conn
            .delete_notification(self.target, self.handle)
            .await
    }
}
