use std::fmt;

use courier_core::{
    message::Message,
    returncode::{ConnectReturnCode, SubscribeReturnCode},
};
use tracing::debug;

/// Outcome of a CONNECT handshake, handed to the connect hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectAck {
    /// Broker resumed a previous session for this client id.
    pub session_present: bool,
    pub return_code: ConnectReturnCode,
}

/// Why a connection ended, handed to the disconnect hook and carried
/// inside `ClientError::ConnectionLost`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// `disconnect()` was called, or all client handles were dropped.
    ClientInitiated,
    /// The broker closed the stream at a packet boundary.
    ServerClosed,
    /// No PINGRESP arrived within the grace window after a PINGREQ.
    KeepAliveTimeout,
    /// The broker sent something the protocol does not allow here.
    Protocol(String),
    /// The transport failed mid-stream.
    Transport(String),
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::ClientInitiated => write!(f, "disconnected by client"),
            DisconnectReason::ServerClosed => write!(f, "connection closed by broker"),
            DisconnectReason::KeepAliveTimeout => write!(f, "keepalive timed out"),
            DisconnectReason::Protocol(detail) => write!(f, "protocol violation: {detail}"),
            DisconnectReason::Transport(detail) => write!(f, "transport failure: {detail}"),
        }
    }
}

/// The lifecycle events a hook can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    Connect,
    Message,
    Publish,
    Subscribe,
    Unsubscribe,
    Disconnect,
}

impl HookKind {
    /// Resolves the wire-facing event names used by the string-keyed
    /// registration API. Unknown names yield `None` so callers can
    /// reject them loudly instead of silently dropping the hook.
    pub fn from_name(name: &str) -> Option<HookKind> {
        match name {
            "on_connect" => Some(HookKind::Connect),
            "on_message" => Some(HookKind::Message),
            "on_publish" => Some(HookKind::Publish),
            "on_subscribe" => Some(HookKind::Subscribe),
            "on_unsubscribe" => Some(HookKind::Unsubscribe),
            "on_disconnect" => Some(HookKind::Disconnect),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            HookKind::Connect => "on_connect",
            HookKind::Message => "on_message",
            HookKind::Publish => "on_publish",
            HookKind::Subscribe => "on_subscribe",
            HookKind::Unsubscribe => "on_unsubscribe",
            HookKind::Disconnect => "on_disconnect",
        }
    }
}

pub type ConnectHook = Box<dyn FnMut(&ConnectAck) + Send>;
pub type MessageHook = Box<dyn FnMut(&Message) + Send>;
pub type AckHook = Box<dyn FnMut(u16) + Send>;
pub type SubscribeHook = Box<dyn FnMut(u16, &[SubscribeReturnCode]) + Send>;
pub type DisconnectHook = Box<dyn FnMut(&DisconnectReason) + Send>;

/// A callback paired with the event it listens for.
pub enum Hook {
    Connect(ConnectHook),
    /// Fallback for messages no filter callback claimed.
    Message(MessageHook),
    /// Fires when a QoS 1 publish is acknowledged or a QoS 2 publish
    /// completes, with the packet id.
    Publish(AckHook),
    Subscribe(SubscribeHook),
    Unsubscribe(AckHook),
    Disconnect(DisconnectHook),
}

impl Hook {
    pub fn kind(&self) -> HookKind {
        match self {
            Hook::Connect(_) => HookKind::Connect,
            Hook::Message(_) => HookKind::Message,
            Hook::Publish(_) => HookKind::Publish,
            Hook::Subscribe(_) => HookKind::Subscribe,
            Hook::Unsubscribe(_) => HookKind::Unsubscribe,
            Hook::Disconnect(_) => HookKind::Disconnect,
        }
    }
}

/// At most one hook per event. Installing over an existing hook
/// replaces it; hooks survive across connect/disconnect cycles.
#[derive(Default)]
pub struct EventRegistry {
    connect: Option<ConnectHook>,
    message: Option<MessageHook>,
    publish: Option<AckHook>,
    subscribe: Option<SubscribeHook>,
    unsubscribe: Option<AckHook>,
    disconnect: Option<DisconnectHook>,
}

impl EventRegistry {
    pub fn install(&mut self, hook: Hook) {
        debug!(event = hook.kind().name(), "hook installed");
        match hook {
            Hook::Connect(f) => self.connect = Some(f),
            Hook::Message(f) => self.message = Some(f),
            Hook::Publish(f) => self.publish = Some(f),
            Hook::Subscribe(f) => self.subscribe = Some(f),
            Hook::Unsubscribe(f) => self.unsubscribe = Some(f),
            Hook::Disconnect(f) => self.disconnect = Some(f),
        }
    }

    /// Returns whether a hook was actually removed.
    pub fn remove(&mut self, kind: HookKind) -> bool {
        let slot = match kind {
            HookKind::Connect => self.connect.take().is_some(),
            HookKind::Message => self.message.take().is_some(),
            HookKind::Publish => self.publish.take().is_some(),
            HookKind::Subscribe => self.subscribe.take().is_some(),
            HookKind::Unsubscribe => self.unsubscribe.take().is_some(),
            HookKind::Disconnect => self.disconnect.take().is_some(),
        };
        debug!(event = kind.name(), removed = slot, "hook removed");
        slot
    }

    pub(crate) fn connected(&mut self, ack: &ConnectAck) {
        if let Some(hook) = self.connect.as_mut() {
            hook(ack);
        }
    }

    /// Returns whether a message hook was present to take the message.
    pub(crate) fn message(&mut self, message: &Message) -> bool {
        match self.message.as_mut() {
            Some(hook) => {
                hook(message);
                true
            }
            None => false,
        }
    }

    pub(crate) fn published(&mut self, packet_id: u16) {
        if let Some(hook) = self.publish.as_mut() {
            hook(packet_id);
        }
    }

    pub(crate) fn subscribed(&mut self, packet_id: u16, codes: &[SubscribeReturnCode]) {
        if let Some(hook) = self.subscribe.as_mut() {
            hook(packet_id, codes);
        }
    }

    pub(crate) fn unsubscribed(&mut self, packet_id: u16) {
        if let Some(hook) = self.unsubscribe.as_mut() {
            hook(packet_id);
        }
    }

    pub(crate) fn disconnected(&mut self, reason: &DisconnectReason) {
        if let Some(hook) = self.disconnect.as_mut() {
            hook(reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;

    #[test]
    fn hook_names_resolve() {
        assert_eq!(HookKind::from_name("on_connect"), Some(HookKind::Connect));
        assert_eq!(HookKind::from_name("on_message"), Some(HookKind::Message));
        assert_eq!(
            HookKind::from_name("on_disconnect"),
            Some(HookKind::Disconnect)
        );
        assert_eq!(HookKind::from_name("on_teardown"), None);
        assert_eq!(HookKind::from_name(""), None);
    }

    #[test]
    fn name_round_trips() {
        for kind in [
            HookKind::Connect,
            HookKind::Message,
            HookKind::Publish,
            HookKind::Subscribe,
            HookKind::Unsubscribe,
            HookKind::Disconnect,
        ] {
            assert_eq!(HookKind::from_name(kind.name()), Some(kind));
        }
    }

    #[test]
    fn install_replaces_previous_hook() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let mut registry = EventRegistry::default();
        let counter = Arc::clone(&first);
        registry.install(Hook::Publish(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })));
        let counter = Arc::clone(&second);
        registry.install(Hook::Publish(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })));

        registry.published(1);
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remove_reports_presence() {
        let mut registry = EventRegistry::default();
        assert!(!registry.remove(HookKind::Message));

        registry.install(Hook::Message(Box::new(|_| {})));
        assert!(registry.remove(HookKind::Message));
        assert!(!registry.remove(HookKind::Message));
    }

    #[test]
    fn message_reports_whether_hook_ran() {
        let mut registry = EventRegistry::default();
        let message = Message::new("a/b", "hi", courier_core::qos::QoS::AtMostOnce);
        assert!(!registry.message(&message));

        registry.install(Hook::Message(Box::new(|_| {})));
        assert!(registry.message(&message));
    }
}
