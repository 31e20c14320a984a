//! The application-level message type delivered to callbacks.

use std::sync::Arc;

use bytes::Bytes;

use crate::qos::QoS;

/// An MQTT application message.
///
/// Immutable once constructed and cheap to clone: the topic is a
/// reference-counted `Arc<str>` and the payload is `Bytes`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub topic: Arc<str>,
    /// Payload bytes; may be empty.
    pub payload: Bytes,
    pub qos: QoS,
    pub retain: bool,
    pub dup: bool,
    /// Packet identifier, present for QoS 1 and 2 deliveries.
    pub packet_id: Option<u16>,
}

impl Message {
    pub fn new(topic: impl Into<Arc<str>>, payload: impl Into<Bytes>, qos: QoS) -> Self {
        Message {
            topic: topic.into(),
            payload: payload.into(),
            qos,
            retain: false,
            dup: false,
            packet_id: None,
        }
    }

    pub fn retain(mut self, retain: bool) -> Self {
        self.retain = retain;
        self
    }

    /// Payload interpreted as UTF-8, with replacement characters for
    /// invalid sequences.
    pub fn payload_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}
