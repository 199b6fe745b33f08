//! WebSocket Real-Time Notifications
//!
//! Pushes domain events (currently `Post_Created`) to every live client.
//!
//! ## Architecture
//!
//! - **ConnectionHub / Dispatcher**: one control loop owns the registry and
//!   serializes register, unregister and broadcast requests
//! - **ConnectionRegistry**: the set of registered sessions
//! - **Sessions**: one bounded outbound queue plus a reader and a writer
//!   loop per connection
//! - **Handler**: the axum upgrade route
//!
//! Delivery is best-effort and at-most-once. A client that falls behind by
//! more than its queue capacity is disconnected; a client that reconnects
//! misses whatever was broadcast in between.
//!
//! ## Example
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:8090/api/v1/ws');
//!
//! ws.onmessage = (event) => {
//!   const msg = JSON.parse(event.data);
//!   // {"type": "Post_Created", "payload": {"id": 1, ...}}
//!   console.log(msg.type, msg.payload);
//! };
//! ```

mod event;
mod handler;
mod hub;
mod registry;
mod session;
mod transport;

pub use event::{DomainEvent, POST_CREATED};
pub use handler::websocket_handler;
pub use hub::{ConnectionHub, Dispatcher, HubConfig, HubError};
pub use registry::ConnectionRegistry;
pub use session::{
    ClientSession, CloseReason, Delivery, RegisteredSession, SessionHandle, SessionId,
};
pub use transport::{FrameSink, FrameSource, InboundFrame, TransportError, WsSink, WsSource};
