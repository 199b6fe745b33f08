//! Client Sessions
//!
//! One session per live connection. A session moves through
//! `Created -> Registered -> Active -> Closing -> Closed`:
//!
//! - [`ClientSession`] is `Created`: it owns its outbound queue but the
//!   dispatcher does not know it yet.
//! - [`ClientSession::register`] yields a [`RegisteredSession`].
//! - [`RegisteredSession::run`] drives the reader and writer loops
//!   (`Active`). The first loop to see a terminal condition records a
//!   [`CloseReason`] (`Closing`), which stops the other loop. Both loops
//!   request `Unregister` on the way out, and `run` returns once the
//!   connection is released and the queue discarded (`Closed`).

use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use super::event::DomainEvent;
use super::hub::{ConnectionHub, HubError};
use super::transport::{FrameSink, FrameSource, InboundFrame};

/// Opaque, unique session identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for SessionId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Why a session stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The dispatcher processed an Unregister for it
    Unregistered,
    /// The peer sent a close frame or went away
    PeerClosed,
    /// Reading or writing the connection failed
    TransportError,
    /// Its queue overflowed and the dispatcher evicted it
    SlowConsumer,
    /// Process-wide shutdown
    Shutdown,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            CloseReason::Unregistered => "unregistered",
            CloseReason::PeerClosed => "peer_closed",
            CloseReason::TransportError => "transport_error",
            CloseReason::SlowConsumer => "slow_consumer",
            CloseReason::Shutdown => "shutdown",
        };
        f.write_str(reason)
    }
}

/// Outcome of a non-blocking enqueue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    Full,
    Closed,
}

/// The registry's view of a session
///
/// Holds a sender onto the session's queue and the session's close signal.
/// The session itself (queue receiver and connection) stays with its loops.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    queue: mpsc::Sender<Arc<DomainEvent>>,
    closer: Arc<watch::Sender<Option<CloseReason>>>,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Enqueue without waiting. A closed session refuses silently.
    pub fn try_deliver(&self, event: &Arc<DomainEvent>) -> Delivery {
        if self.is_closed() {
            return Delivery::Closed;
        }

        match self.queue.try_send(Arc::clone(event)) {
            Ok(()) => Delivery::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => Delivery::Full,
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    /// Signal both loops to stop. The first reason recorded wins.
    ///
    /// Returns true if this call closed the session.
    pub fn close(&self, reason: CloseReason) -> bool {
        self.closer.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        })
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        *self.closer.borrow()
    }

    pub fn is_closed(&self) -> bool {
        self.close_reason().is_some()
    }

    /// Whether both handles come from the same `ClientSession`, not merely
    /// the same id
    pub fn is_same_session(&self, other: &SessionHandle) -> bool {
        self.id == other.id && Arc::ptr_eq(&self.closer, &other.closer)
    }
}

/// A session in the `Created` state
pub struct ClientSession {
    handle: SessionHandle,
    queue: mpsc::Receiver<Arc<DomainEvent>>,
    closed: watch::Receiver<Option<CloseReason>>,
}

impl ClientSession {
    /// New session with a fresh identity and a bounded queue
    pub fn new(queue_capacity: usize) -> Self {
        Self::with_id(SessionId::new(), queue_capacity)
    }

    /// New session reusing a known identity
    pub fn with_id(id: SessionId, queue_capacity: usize) -> Self {
        // mpsc::channel rejects a zero capacity
        let (queue_tx, queue_rx) = mpsc::channel(queue_capacity.max(1));
        let (closer, closed) = watch::channel(None);

        Self {
            handle: SessionHandle {
                id,
                queue: queue_tx,
                closer: Arc::new(closer),
            },
            queue: queue_rx,
            closed,
        }
    }

    pub fn id(&self) -> SessionId {
        self.handle.id
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    /// Hand the session to the dispatcher and wait until it is accepted
    ///
    /// Broadcasts processed before this returns are not delivered.
    pub async fn register(self, hub: &ConnectionHub) -> Result<RegisteredSession, HubError> {
        hub.register(self.handle.clone()).await?;

        tracing::debug!(session_id = %self.handle.id, "Session registered");

        Ok(RegisteredSession {
            handle: self.handle,
            queue: self.queue,
            closed: self.closed,
            hub: hub.clone(),
        })
    }
}

/// A session accepted into the registry, ready to run its loops
pub struct RegisteredSession {
    handle: SessionHandle,
    queue: mpsc::Receiver<Arc<DomainEvent>>,
    closed: watch::Receiver<Option<CloseReason>>,
    hub: ConnectionHub,
}

impl RegisteredSession {
    pub fn id(&self) -> SessionId {
        self.handle.id
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    /// Run the reader and writer loops until the session closes
    ///
    /// Only the writer writes to `sink` and only the reader reads from
    /// `source`. Returns the reason the session ended.
    pub async fn run<W, R>(self, sink: W, source: R) -> CloseReason
    where
        W: FrameSink,
        R: FrameSource,
    {
        let RegisteredSession {
            handle,
            queue,
            closed,
            hub,
        } = self;

        tracing::debug!(session_id = %handle.id, "Session active");

        tokio::join!(
            write_loop(&handle, &hub, queue, closed.clone(), sink),
            read_loop(&handle, &hub, closed, source),
        );

        let reason = handle.close_reason().unwrap_or(CloseReason::Unregistered);
        tracing::info!(session_id = %handle.id, reason = %reason, "Session closed");
        reason
    }

    #[cfg(test)]
    pub(crate) fn try_next_event(&mut self) -> Option<Arc<DomainEvent>> {
        self.queue.try_recv().ok()
    }
}

/// Drain the queue onto the wire until the session is closed
async fn write_loop<W: FrameSink>(
    handle: &SessionHandle,
    hub: &ConnectionHub,
    mut queue: mpsc::Receiver<Arc<DomainEvent>>,
    mut closed: watch::Receiver<Option<CloseReason>>,
    mut sink: W,
) {
    let id = handle.id;

    loop {
        tokio::select! {
            biased;
            _ = closed.changed() => break,
            next = queue.recv() => {
                let Some(event) = next else {
                    handle.close(CloseReason::Unregistered);
                    break;
                };

                // Events queued before an Unregister must not reach the wire
                if handle.is_closed() {
                    break;
                }

                let frame = match event.to_frame() {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::error!(session_id = %id, error = %e, "Failed to serialize event");
                        continue;
                    }
                };

                if let Err(e) = sink.send_text(frame).await {
                    tracing::debug!(session_id = %id, error = %e, "Write failed, closing session");
                    handle.close(CloseReason::TransportError);
                    break;
                }
            }
        }
    }

    queue.close();
    let mut discarded = 0usize;
    while queue.try_recv().is_ok() {
        discarded += 1;
    }
    if discarded > 0 {
        tracing::debug!(session_id = %id, discarded, "Discarded undelivered events");
    }

    sink.close().await;
    request_unregister(hub, handle).await;
}

/// Watch the peer for a close or a transport error
async fn read_loop<R: FrameSource>(
    handle: &SessionHandle,
    hub: &ConnectionHub,
    mut closed: watch::Receiver<Option<CloseReason>>,
    mut source: R,
) {
    let id = handle.id;

    loop {
        tokio::select! {
            biased;
            _ = closed.changed() => break,
            frame = source.next_frame() => match frame {
                Some(Ok(InboundFrame::Close)) | None => {
                    tracing::debug!(session_id = %id, "Peer closed connection");
                    handle.close(CloseReason::PeerClosed);
                    break;
                }
                Some(Ok(_)) => {
                    // Server-push only: inbound data frames carry no meaning
                    tracing::trace!(session_id = %id, "Ignoring inbound frame");
                }
                Some(Err(e)) => {
                    tracing::debug!(session_id = %id, error = %e, "Read failed, closing session");
                    handle.close(CloseReason::TransportError);
                    break;
                }
            }
        }
    }

    request_unregister(hub, handle).await;
}

async fn request_unregister(hub: &ConnectionHub, handle: &SessionHandle) {
    if let Err(e) = hub.release(handle.clone()).await {
        tracing::debug!(session_id = %handle.id, error = %e, "Unregister not delivered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::hub::HubConfig;
    use crate::websocket::transport::fake;
    use serde_json::json;
    use std::future;
    use std::time::Duration;
    use tokio::time::timeout;

    fn start_hub() -> ConnectionHub {
        let (hub, dispatcher) = ConnectionHub::new(HubConfig::default());
        tokio::spawn(dispatcher.run(future::pending()));
        hub
    }

    fn event(id: i64) -> DomainEvent {
        DomainEvent::new("Post_Created", json!({"id": id})).unwrap()
    }

    #[test]
    fn test_close_first_reason_wins() {
        let session = ClientSession::new(4);
        let handle = session.handle().clone();

        assert!(!handle.is_closed());
        assert!(handle.close(CloseReason::PeerClosed));
        assert!(!handle.close(CloseReason::SlowConsumer));
        assert_eq!(handle.close_reason(), Some(CloseReason::PeerClosed));
    }

    #[test]
    fn test_try_deliver_reports_full_and_closed() {
        let session = ClientSession::new(1);
        let handle = session.handle().clone();
        let event = Arc::new(event(1));

        assert_eq!(handle.try_deliver(&event), Delivery::Queued);
        assert_eq!(handle.try_deliver(&event), Delivery::Full);

        handle.close(CloseReason::Unregistered);
        assert_eq!(handle.try_deliver(&event), Delivery::Closed);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let session = ClientSession::new(0);
        let event = Arc::new(event(1));
        assert_eq!(session.handle().try_deliver(&event), Delivery::Queued);
    }

    #[tokio::test]
    async fn test_writer_delivers_frames_in_order() {
        let hub = start_hub();
        let session = ClientSession::new(8).register(&hub).await.unwrap();
        let (sink, source, mut peer) = fake::connection();
        let task = tokio::spawn(session.run(sink, source));

        hub.broadcast(event(1), None).await.unwrap();
        hub.broadcast(event(2), None).await.unwrap();

        let first = timeout(Duration::from_secs(1), peer.frames.recv()).await.unwrap();
        let second = timeout(Duration::from_secs(1), peer.frames.recv()).await.unwrap();
        assert_eq!(first.unwrap(), r#"{"type":"Post_Created","payload":{"id":1}}"#);
        assert_eq!(second.unwrap(), r#"{"type":"Post_Created","payload":{"id":2}}"#);

        peer.inbound.send(InboundFrame::Close).unwrap();
        let reason = timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
        assert_eq!(reason, CloseReason::PeerClosed);
        assert!(peer.is_closed());
        assert_eq!(hub.connection_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_inbound_data_frames_are_ignored() {
        let hub = start_hub();
        let session = ClientSession::new(8).register(&hub).await.unwrap();
        let (sink, source, peer) = fake::connection();
        let task = tokio::spawn(session.run(sink, source));

        peer.inbound.send(InboundFrame::Text("hi".to_string())).unwrap();
        peer.inbound.send(InboundFrame::Ping).unwrap();
        peer.inbound.send(InboundFrame::Binary(vec![1, 2])).unwrap();
        assert_eq!(hub.connection_count().await.unwrap(), 1);

        drop(peer);
        let reason = timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
        assert_eq!(reason, CloseReason::PeerClosed);
    }

    #[tokio::test]
    async fn test_write_failure_unregisters() {
        let hub = start_hub();
        let session = ClientSession::new(8).register(&hub).await.unwrap();
        let (sink, source, peer) = fake::connection();
        let fake::Peer { frames, inbound, .. } = peer;
        drop(frames);
        let task = tokio::spawn(session.run(sink, source));

        hub.broadcast(event(1), None).await.unwrap();

        let reason = timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
        assert_eq!(reason, CloseReason::TransportError);
        assert_eq!(hub.connection_count().await.unwrap(), 0);
        drop(inbound);
    }

    #[tokio::test]
    async fn test_queued_events_dropped_after_unregister() {
        let hub = start_hub();
        let session = ClientSession::new(8).register(&hub).await.unwrap();
        let id = session.id();

        hub.broadcast(event(1), None).await.unwrap();
        hub.broadcast(event(2), None).await.unwrap();
        hub.unregister(id).await.unwrap();
        assert_eq!(hub.connection_count().await.unwrap(), 0);

        let (sink, source, mut peer) = fake::connection();
        let reason = timeout(Duration::from_secs(1), session.run(sink, source))
            .await
            .unwrap();

        assert_eq!(reason, CloseReason::Unregistered);
        assert!(peer.frames.try_recv().is_err());
        assert!(peer.is_closed());
    }

    #[tokio::test]
    async fn test_finished_loops_leave_reregistration_alone() {
        let hub = start_hub();
        let id = SessionId::new();
        let first = ClientSession::with_id(id, 8).register(&hub).await.unwrap();
        let (sink, source, _peer) = fake::connection();
        let task = tokio::spawn(first.run(sink, source));

        hub.unregister(id).await.unwrap();
        let mut second = ClientSession::with_id(id, 8).register(&hub).await.unwrap();

        let reason = timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
        assert_eq!(reason, CloseReason::Unregistered);

        hub.broadcast(event(1), None).await.unwrap();
        assert_eq!(hub.session_ids().await.unwrap(), vec![id]);
        assert!(!second.handle().is_closed());
        assert_eq!(second.try_next_event().unwrap().payload()["id"], 1);
    }

    #[test]
    fn test_same_session_needs_same_registration() {
        let id = SessionId::new();
        let first = ClientSession::with_id(id, 4);
        let second = ClientSession::with_id(id, 4);

        assert!(first.handle().is_same_session(&first.handle().clone()));
        assert!(!first.handle().is_same_session(second.handle()));
    }

    #[tokio::test]
    async fn test_shutdown_closes_running_session() {
        let (hub, dispatcher) = ConnectionHub::new(HubConfig::default());
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let dispatcher_task = tokio::spawn(dispatcher.run(async {
            let _ = stop_rx.await;
        }));

        let session = ClientSession::new(8).register(&hub).await.unwrap();
        let (sink, source, peer) = fake::connection();
        let task = tokio::spawn(session.run(sink, source));

        stop_tx.send(()).unwrap();
        dispatcher_task.await.unwrap();

        let reason = timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
        assert_eq!(reason, CloseReason::Shutdown);
        assert!(peer.is_closed());
        assert!(matches!(
            hub.connection_count().await,
            Err(HubError::DispatcherStopped)
        ));
    }
}
