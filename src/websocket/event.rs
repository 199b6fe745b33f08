//! Domain Events
//!
//! The typed notifications pushed to live clients. Each event becomes
//! exactly one WebSocket text frame: `{"type": "...", "payload": ...}`.

use serde::Serialize;
use serde_json::Value;

use crate::repository::Post;

/// Event type emitted after a post has been persisted
pub const POST_CREATED: &str = "Post_Created";

/// Immutable notification fanned out by the hub
///
/// Events are shared between recipients as `Arc<DomainEvent>`, so nothing
/// mutates them after construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainEvent {
    /// Type discriminator (e.g., "Post_Created")
    #[serde(rename = "type")]
    event_type: String,
    /// Arbitrary JSON body
    payload: Value,
}

impl DomainEvent {
    /// Build an event from any serializable payload
    pub fn new(event_type: impl Into<String>, payload: impl Serialize) -> serde_json::Result<Self> {
        Ok(Self {
            event_type: event_type.into(),
            payload: serde_json::to_value(payload)?,
        })
    }

    /// Event announcing a newly created post
    pub fn post_created(post: &Post) -> serde_json::Result<Self> {
        Self::new(POST_CREATED, post)
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Serialize to the wire frame text
    pub fn to_frame(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
