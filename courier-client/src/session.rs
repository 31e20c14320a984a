//! Per-connection protocol state: lifecycle phase, packet id
//! allocation, in-flight operations and keepalive scheduling.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use courier_core::{message::Message, qos::QoS, returncode::SubscribeReturnCode};
use tokio::sync::{oneshot, watch};
use tracing::{debug, warn};

use crate::error::{ClientError, Result};
use crate::event::DisconnectReason;

/// Lifecycle phase of a client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// TCP/TLS established or in progress, CONNACK not yet accepted.
    Connecting,
    Connected,
    /// DISCONNECT is being sent; no new operations are accepted.
    Disconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnecting => "disconnecting",
        };
        f.write_str(name)
    }
}

/// What a tracked packet id is waiting for.
pub(crate) enum PendingKind {
    /// Outbound publish awaiting PUBACK (QoS 1) or PUBREC (QoS 2).
    Publish {
        qos: QoS,
        ack: oneshot::Sender<Result<()>>,
    },
    /// Outbound QoS 2 publish past PUBREL, awaiting PUBCOMP.
    Release { ack: oneshot::Sender<Result<()>> },
    /// SUBSCRIBE awaiting SUBACK.
    Subscribe {
        response: oneshot::Sender<Result<Vec<SubscribeReturnCode>>>,
    },
    /// UNSUBSCRIBE awaiting UNSUBACK.
    Unsubscribe { response: oneshot::Sender<Result<()>> },
}

impl PendingKind {
    fn describe(&self) -> &'static str {
        match self {
            PendingKind::Publish { .. } => "publish",
            PendingKind::Release { .. } => "release",
            PendingKind::Subscribe { .. } => "subscribe",
            PendingKind::Unsubscribe { .. } => "unsubscribe",
        }
    }

    fn fail(self, reason: &DisconnectReason) {
        let err = || ClientError::ConnectionLost(reason.clone());
        match self {
            PendingKind::Publish { ack, .. } | PendingKind::Release { ack } => {
                let _ = ack.send(Err(err()));
            }
            PendingKind::Subscribe { response } => {
                let _ = response.send(Err(err()));
            }
            PendingKind::Unsubscribe { response } => {
                let _ = response.send(Err(err()));
            }
        }
    }
}

pub(crate) struct PendingOperation {
    pub kind: PendingKind,
    pub created_at: Instant,
}

/// Floor for the PINGRESP grace window so short keepalives do not
/// flap on scheduling jitter.
const GRACE_MIN: Duration = Duration::from_secs(1);

pub(crate) enum KeepaliveEvent {
    Idle,
    SendPing,
    Expired,
}

pub(crate) struct Session {
    state_tx: watch::Sender<ConnectionState>,
    /// Zero disables keepalive entirely.
    keep_alive: Duration,
    next_packet_id: u16,
    pending: HashMap<u16, PendingOperation>,
    /// Inbound QoS 2 messages held until PUBREL, keyed by packet id.
    inbound_release: HashMap<u16, Message>,
    last_sent: Instant,
    /// Set while a PINGREQ is unanswered.
    ping_deadline: Option<Instant>,
}

impl Session {
    pub fn new(state_tx: watch::Sender<ConnectionState>, keep_alive: Duration) -> Self {
        Session {
            state_tx,
            keep_alive,
            next_packet_id: 0,
            pending: HashMap::new(),
            inbound_release: HashMap::new(),
            last_sent: Instant::now(),
            ping_deadline: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Applies a lifecycle transition, ignoring edges the state machine
    /// does not define.
    pub fn transition(&mut self, next: ConnectionState) {
        use ConnectionState::*;

        let current = self.state();
        let legal = matches!(
            (current, next),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Disconnected)
                | (Connected, Disconnecting)
                | (Connected, Disconnected)
                | (Disconnecting, Disconnected)
        );
        if !legal {
            warn!(%current, %next, "ignoring undefined state transition");
            return;
        }

        debug!(%current, %next, "connection state change");
        self.state_tx.send_replace(next);
    }

    /// Hands out the next packet id, wrapping at 65535 and skipping 0
    /// and any id still in flight.
    pub fn alloc_packet_id(&mut self) -> u16 {
        loop {
            self.next_packet_id = self.next_packet_id.wrapping_add(1);
            if self.next_packet_id == 0 {
                continue;
            }
            if !self.pending.contains_key(&self.next_packet_id) {
                return self.next_packet_id;
            }
        }
    }

    pub fn track(&mut self, packet_id: u16, kind: PendingKind) {
        debug!(packet_id, operation = kind.describe(), "operation in flight");
        self.pending.insert(
            packet_id,
            PendingOperation {
                kind,
                created_at: Instant::now(),
            },
        );
    }

    /// Re-registers an operation that advanced a stage, keeping its
    /// original creation time.
    pub fn reinstate(&mut self, packet_id: u16, operation: PendingOperation) {
        self.pending.insert(packet_id, operation);
    }

    /// Takes the operation for `packet_id` if it is of the expected
    /// kind; stray or mismatched acknowledgements leave it untouched.
    pub fn complete(
        &mut self,
        packet_id: u16,
        expected: fn(&PendingKind) -> bool,
    ) -> Option<PendingOperation> {
        match self.pending.get(&packet_id) {
            Some(op) if expected(&op.kind) => self.pending.remove(&packet_id),
            _ => None,
        }
    }

    /// Fails every in-flight operation with `ConnectionLost(reason)`.
    pub fn fail_all_pending(&mut self, reason: &DisconnectReason) {
        for (packet_id, op) in self.pending.drain() {
            debug!(
                packet_id,
                operation = op.kind.describe(),
                "failing in-flight operation"
            );
            op.kind.fail(reason);
        }
        self.inbound_release.clear();
    }

    /// Stores an inbound QoS 2 message until its PUBREL. Returns false
    /// when the id is already held, i.e. a retransmission.
    pub fn store_inbound(&mut self, packet_id: u16, message: Message) -> bool {
        use std::collections::hash_map::Entry;

        match self.inbound_release.entry(packet_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(message);
                true
            }
        }
    }

    pub fn release_inbound(&mut self, packet_id: u16) -> Option<Message> {
        self.inbound_release.remove(&packet_id)
    }

    pub fn mark_sent(&mut self) {
        self.last_sent = Instant::now();
    }

    pub fn note_ping_sent(&mut self) {
        self.ping_deadline = Some(Instant::now() + self.grace());
    }

    pub fn note_ping_answered(&mut self) {
        self.ping_deadline = None;
    }

    fn grace(&self) -> Duration {
        std::cmp::max(self.keep_alive / 2, GRACE_MIN)
    }

    /// When the keepalive timer next needs to run, or `None` when
    /// keepalive is disabled.
    pub fn keepalive_deadline(&self) -> Option<Instant> {
        if self.keep_alive.is_zero() {
            return None;
        }
        Some(match self.ping_deadline {
            Some(deadline) => deadline,
            None => self.last_sent + self.keep_alive,
        })
    }

    /// Decides what the keepalive timer firing at `now` means.
    pub fn keepalive_tick(&self, now: Instant) -> KeepaliveEvent {
        if self.keep_alive.is_zero() {
            return KeepaliveEvent::Idle;
        }
        if let Some(deadline) = self.ping_deadline {
            if now >= deadline {
                return KeepaliveEvent::Expired;
            }
            return KeepaliveEvent::Idle;
        }
        if now >= self.last_sent + self.keep_alive {
            return KeepaliveEvent::SendPing;
        }
        KeepaliveEvent::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_session(keep_alive: Duration) -> (Session, watch::Receiver<ConnectionState>) {
        let (tx, rx) = watch::channel(ConnectionState::Disconnected);
        (Session::new(tx, keep_alive), rx)
    }

    #[test]
    fn full_lifecycle_transitions() {
        let (mut session, rx) = make_session(Duration::ZERO);

        session.transition(ConnectionState::Connecting);
        session.transition(ConnectionState::Connected);
        assert_eq!(*rx.borrow(), ConnectionState::Connected);

        session.transition(ConnectionState::Disconnecting);
        session.transition(ConnectionState::Disconnected);
        assert_eq!(*rx.borrow(), ConnectionState::Disconnected);
    }

    #[test]
    fn undefined_transitions_are_ignored() {
        let (mut session, rx) = make_session(Duration::ZERO);

        session.transition(ConnectionState::Connected);
        assert_eq!(*rx.borrow(), ConnectionState::Disconnected);

        session.transition(ConnectionState::Connecting);
        session.transition(ConnectionState::Disconnecting);
        assert_eq!(*rx.borrow(), ConnectionState::Connecting);
    }

    #[test]
    fn failed_handshake_returns_to_disconnected() {
        let (mut session, rx) = make_session(Duration::ZERO);

        session.transition(ConnectionState::Connecting);
        session.transition(ConnectionState::Disconnected);
        assert_eq!(*rx.borrow(), ConnectionState::Disconnected);
    }

    #[test]
    fn packet_ids_skip_zero_and_in_flight() {
        let (mut session, _rx) = make_session(Duration::ZERO);

        assert_eq!(session.alloc_packet_id(), 1);
        assert_eq!(session.alloc_packet_id(), 2);

        session.next_packet_id = u16::MAX - 1;
        assert_eq!(session.alloc_packet_id(), u16::MAX);
        // Wraps past the reserved id 0.
        assert_eq!(session.alloc_packet_id(), 1);

        let (ack, _rx) = oneshot::channel();
        session.next_packet_id = 4;
        session.track(
            5,
            PendingKind::Publish {
                qos: QoS::AtLeastOnce,
                ack,
            },
        );
        assert_eq!(session.alloc_packet_id(), 6);
    }

    #[test]
    fn complete_checks_operation_kind() {
        let (mut session, _rx) = make_session(Duration::ZERO);
        let (ack, _ack_rx) = oneshot::channel();
        session.track(
            7,
            PendingKind::Publish {
                qos: QoS::AtLeastOnce,
                ack,
            },
        );

        assert!(session
            .complete(7, |k| matches!(k, PendingKind::Subscribe { .. }))
            .is_none());
        assert!(session
            .complete(7, |k| matches!(k, PendingKind::Publish { .. }))
            .is_some());
        assert!(session
            .complete(7, |k| matches!(k, PendingKind::Publish { .. }))
            .is_none());
    }

    #[tokio::test]
    async fn fail_all_pending_resolves_waiters() {
        let (mut session, _rx) = make_session(Duration::ZERO);
        let (ack, ack_rx) = oneshot::channel();
        let (response, response_rx) = oneshot::channel();
        session.track(
            1,
            PendingKind::Publish {
                qos: QoS::AtLeastOnce,
                ack,
            },
        );
        session.track(2, PendingKind::Subscribe { response });

        session.fail_all_pending(&DisconnectReason::ServerClosed);

        assert!(matches!(
            ack_rx.await,
            Ok(Err(ClientError::ConnectionLost(
                DisconnectReason::ServerClosed
            )))
        ));
        assert!(matches!(
            response_rx.await,
            Ok(Err(ClientError::ConnectionLost(
                DisconnectReason::ServerClosed
            )))
        ));
    }

    #[test]
    fn duplicate_inbound_qos2_is_detected() {
        let (mut session, _rx) = make_session(Duration::ZERO);
        let message = Message::new("a/b", "x", QoS::ExactlyOnce);

        assert!(session.store_inbound(9, message.clone()));
        assert!(!session.store_inbound(9, message));

        assert!(session.release_inbound(9).is_some());
        assert!(session.release_inbound(9).is_none());
    }

    #[test]
    fn keepalive_disabled_when_zero() {
        let (session, _rx) = make_session(Duration::ZERO);
        assert!(session.keepalive_deadline().is_none());
        assert!(matches!(
            session.keepalive_tick(Instant::now()),
            KeepaliveEvent::Idle
        ));
    }

    #[test]
    fn keepalive_requests_ping_after_idle_period() {
        let keep_alive = Duration::from_secs(10);
        let (mut session, _rx) = make_session(keep_alive);
        session.last_sent = Instant::now() - keep_alive;

        assert!(matches!(
            session.keepalive_tick(Instant::now()),
            KeepaliveEvent::SendPing
        ));
    }

    #[test]
    fn unanswered_ping_expires_after_grace() {
        let (mut session, _rx) = make_session(Duration::from_secs(10));
        session.ping_deadline = Some(Instant::now() - Duration::from_millis(1));

        assert!(matches!(
            session.keepalive_tick(Instant::now()),
            KeepaliveEvent::Expired
        ));

        session.note_ping_answered();
        assert!(matches!(
            session.keepalive_tick(Instant::now()),
            KeepaliveEvent::Idle
        ));
    }

    #[test]
    fn grace_has_a_floor() {
        let (session, _rx) = make_session(Duration::from_millis(200));
        assert_eq!(session.grace(), Duration::from_secs(1));

        let (session, _rx) = make_session(Duration::from_secs(60));
        assert_eq!(session.grace(), Duration::from_secs(30));
    }
}
