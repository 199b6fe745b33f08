//! WebSocket Connection Hub
//!
//! Registration, unregistration and broadcasts all travel as messages to a
//! single [`Dispatcher`] loop, which owns the [`ConnectionRegistry`] and
//! handles them strictly in arrival order. Producers only hold a cheap
//! [`ConnectionHub`] sender.
//!
//! Fan-out never waits on a recipient: events are pushed onto each
//! session's bounded queue with `try_send`, and a session whose queue is
//! full is closed and dropped from the registry on the spot.

use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use super::event::DomainEvent;
use super::registry::ConnectionRegistry;
use super::session::{CloseReason, Delivery, SessionHandle, SessionId};

/// Configuration for the connection hub
#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    /// Capacity of the dispatcher's inbound control queue
    #[serde(default = "default_control_capacity")]
    pub control_capacity: usize,
    /// Events a session may have pending before it counts as a slow consumer
    #[serde(default = "default_session_queue_capacity")]
    pub session_queue_capacity: usize,
    /// Maximum number of registered sessions
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

fn default_control_capacity() -> usize {
    256
}

fn default_session_queue_capacity() -> usize {
    64
}

fn default_max_sessions() -> usize {
    10_000
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            control_capacity: default_control_capacity(),
            session_queue_capacity: default_session_queue_capacity(),
            max_sessions: default_max_sessions(),
        }
    }
}

/// Requests processed by the dispatcher loop
#[derive(Debug)]
enum ControlMessage {
    Register {
        handle: SessionHandle,
        reply: oneshot::Sender<Result<(), HubError>>,
    },
    Unregister(SessionId),
    /// Sent by a session's own loops; only removes that exact registration
    Release(SessionHandle),
    Broadcast {
        event: Arc<DomainEvent>,
        exclude: Option<SessionId>,
    },
    Members(oneshot::Sender<Vec<SessionId>>),
    Count(oneshot::Sender<usize>),
}

/// Producer side of the hub
///
/// Clone freely; every clone feeds the same dispatcher.
#[derive(Debug, Clone)]
pub struct ConnectionHub {
    control: mpsc::Sender<ControlMessage>,
    config: Arc<HubConfig>,
}

impl ConnectionHub {
    /// Create a hub and the dispatcher that serves it
    ///
    /// Nothing is processed until [`Dispatcher::run`] is awaited.
    pub fn new(config: HubConfig) -> (Self, Dispatcher) {
        let (control_tx, control_rx) = mpsc::channel(config.control_capacity.max(1));
        let config = Arc::new(config);

        let hub = Self {
            control: control_tx,
            config: Arc::clone(&config),
        };
        let dispatcher = Dispatcher {
            control: control_rx,
            registry: ConnectionRegistry::new(),
            config,
        };

        (hub, dispatcher)
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Register a session and wait for the dispatcher's verdict
    pub async fn register(&self, handle: SessionHandle) -> Result<(), HubError> {
        let (reply, verdict) = oneshot::channel();
        self.send(ControlMessage::Register { handle, reply }).await?;
        verdict.await.map_err(|_| HubError::DispatcherStopped)?
    }

    /// Request removal of a session. Unknown ids are ignored.
    pub async fn unregister(&self, id: SessionId) -> Result<(), HubError> {
        self.send(ControlMessage::Unregister(id)).await
    }

    /// Remove `handle`'s own registration, leaving any later registration
    /// of the same id in place
    pub(crate) async fn release(&self, handle: SessionHandle) -> Result<(), HubError> {
        self.send(ControlMessage::Release(handle)).await
    }

    /// Queue an event for every registered session except `exclude`
    ///
    /// Returns once the dispatcher has accepted the request, not when
    /// anyone has received it.
    pub async fn broadcast(
        &self,
        event: DomainEvent,
        exclude: Option<SessionId>,
    ) -> Result<(), HubError> {
        self.send(ControlMessage::Broadcast {
            event: Arc::new(event),
            exclude,
        })
        .await
    }

    /// Ids registered at the moment the dispatcher reaches this request
    pub async fn session_ids(&self) -> Result<Vec<SessionId>, HubError> {
        let (reply, members) = oneshot::channel();
        self.send(ControlMessage::Members(reply)).await?;
        members.await.map_err(|_| HubError::DispatcherStopped)
    }

    pub async fn connection_count(&self) -> Result<usize, HubError> {
        let (reply, count) = oneshot::channel();
        self.send(ControlMessage::Count(reply)).await?;
        count.await.map_err(|_| HubError::DispatcherStopped)
    }

    async fn send(&self, message: ControlMessage) -> Result<(), HubError> {
        self.control
            .send(message)
            .await
            .map_err(|_| HubError::DispatcherStopped)
    }
}

/// The single control loop that owns the registry
pub struct Dispatcher {
    control: mpsc::Receiver<ControlMessage>,
    registry: ConnectionRegistry,
    config: Arc<HubConfig>,
}

impl Dispatcher {
    /// Process control messages until `shutdown` resolves or every
    /// [`ConnectionHub`] is dropped, then close all sessions
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);

        tracing::info!(
            control_capacity = self.config.control_capacity,
            session_queue_capacity = self.config.session_queue_capacity,
            "Hub dispatcher started"
        );

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::info!("Hub dispatcher received shutdown signal");
                    break;
                }
                message = self.control.recv() => match message {
                    Some(message) => self.handle(message),
                    None => {
                        tracing::debug!("All hub handles dropped");
                        break;
                    }
                }
            }
        }

        self.close_all();
        tracing::info!("Hub dispatcher stopped");
    }

    fn handle(&mut self, message: ControlMessage) {
        match message {
            ControlMessage::Register { handle, reply } => {
                let result = self.register(handle);
                // The registering side may have given up; nothing to do then
                let _ = reply.send(result);
            }
            ControlMessage::Unregister(id) => self.unregister(id),
            ControlMessage::Release(handle) => self.release(handle),
            ControlMessage::Broadcast { event, exclude } => self.broadcast(&event, exclude),
            ControlMessage::Members(reply) => {
                let _ = reply.send(self.registry.ids());
            }
            ControlMessage::Count(reply) => {
                let _ = reply.send(self.registry.len());
            }
        }
    }

    fn register(&mut self, handle: SessionHandle) -> Result<(), HubError> {
        if self.registry.len() >= self.config.max_sessions {
            tracing::warn!(
                session_id = %handle.id(),
                limit = self.config.max_sessions,
                "Session limit reached"
            );
            return Err(HubError::TooManySessions(self.config.max_sessions));
        }

        let id = handle.id();
        if let Err(e) = self.registry.add(handle) {
            tracing::error!(session_id = %id, error = %e, "Rejected registration");
            return Err(e);
        }

        tracing::info!(session_id = %id, sessions = self.registry.len(), "WebSocket connected");
        Ok(())
    }

    fn unregister(&mut self, id: SessionId) {
        if let Some(handle) = self.registry.remove(&id) {
            handle.close(CloseReason::Unregistered);
            tracing::info!(session_id = %id, sessions = self.registry.len(), "WebSocket disconnected");
        }
    }

    fn release(&mut self, handle: SessionHandle) {
        let id = handle.id();
        let current = self
            .registry
            .get(&id)
            .is_some_and(|registered| registered.is_same_session(&handle));

        if current {
            self.unregister(id);
        } else {
            tracing::trace!(session_id = %id, "Stale release ignored");
        }
    }

    fn broadcast(&mut self, event: &Arc<DomainEvent>, exclude: Option<SessionId>) {
        let mut delivered = 0usize;

        for handle in self.registry.snapshot() {
            if exclude == Some(handle.id()) {
                continue;
            }

            match handle.try_deliver(event) {
                Delivery::Queued => delivered += 1,
                Delivery::Full => {
                    tracing::warn!(
                        session_id = %handle.id(),
                        capacity = self.config.session_queue_capacity,
                        "Evicting slow consumer"
                    );
                    handle.close(CloseReason::SlowConsumer);
                    self.registry.remove(&handle.id());
                }
                Delivery::Closed => {
                    // Its loops are already on the way out
                    handle.close(CloseReason::Unregistered);
                    self.registry.remove(&handle.id());
                }
            }
        }

        tracing::trace!(
            event_type = %event.event_type(),
            recipients = delivered,
            "Broadcast event"
        );
    }

    fn close_all(&mut self) {
        let sessions = self.registry.drain();
        for handle in &sessions {
            handle.close(CloseReason::Shutdown);
        }

        if !sessions.is_empty() {
            tracing::info!(sessions = sessions.len(), "Closed all sessions");
        }
    }
}

/// Errors that can occur in the connection hub
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Session {0} is already registered")]
    DuplicateSession(SessionId),

    #[error("Too many sessions (limit: {0})")]
    TooManySessions(usize),

    #[error("Hub dispatcher is not running")]
    DispatcherStopped,
}
