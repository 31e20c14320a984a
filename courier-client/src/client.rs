//! The client facade and the connection task behind it.
//!
//! A connected client is a handle plus a spawned task that owns the
//! socket. The handle sends commands over a channel; the task runs a
//! `select!` loop over inbound frames, commands and the keepalive
//! timer, and resolves in-flight operations as acknowledgements
//! arrive.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use courier_core::{
    message::Message,
    qos::QoS,
    returncode::SubscribeReturnCode,
    topic,
};
use courier_packets::{
    connect::{ConnectPacket, LastWill},
    disconnect::DisconnectPacket,
    pingreq::PingReqPacket,
    puback::PubAckPacket,
    pubcomp::PubCompPacket,
    publish::PublishPacket,
    pubrec::PubRecPacket,
    pubrel::PubRelPacket,
    subscribe::{SubscribePacket, SubscriptionRequest},
    unsubscribe::UnsubscribePacket,
    ControlPacket,
};
use tokio::{
    net::TcpStream,
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time::{sleep_until, timeout, Instant as TokioInstant},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::connection::Connection;
use crate::dispatcher::Callbacks;
use crate::error::{ClientError, Result};
use crate::event::{ConnectAck, DisconnectReason, Hook, HookKind, MessageHook};
use crate::options::{ClientOptions, Credentials};
use crate::session::{
    ConnectionState, KeepaliveEvent, PendingKind, PendingOperation, Session,
};
use crate::tls;

/// Requests from the client handle to the connection task.
enum Command {
    Publish {
        topic: String,
        payload: Bytes,
        qos: QoS,
        retain: bool,
        response: oneshot::Sender<Result<PublishHandle>>,
    },
    Subscribe {
        filters: Vec<(String, QoS)>,
        response: oneshot::Sender<Result<Vec<SubscribeReturnCode>>>,
    },
    Unsubscribe {
        filters: Vec<String>,
        response: oneshot::Sender<Result<()>>,
    },
    Disconnect {
        response: oneshot::Sender<Result<()>>,
    },
}

/// Tracks an accepted publish until the broker acknowledges it.
///
/// For QoS 0 the handle resolves immediately; for QoS 1 it resolves on
/// PUBACK and for QoS 2 on PUBCOMP.
pub struct PublishHandle {
    packet_id: Option<u16>,
    ack: Option<oneshot::Receiver<Result<()>>>,
}

impl PublishHandle {
    fn immediate() -> Self {
        Self {
            packet_id: None,
            ack: None,
        }
    }

    fn pending(packet_id: u16, ack: oneshot::Receiver<Result<()>>) -> Self {
        Self {
            packet_id: Some(packet_id),
            ack: Some(ack),
        }
    }

    /// The packet id assigned to this publish, if any.
    pub fn packet_id(&self) -> Option<u16> {
        self.packet_id
    }

    /// Waits until the broker acknowledged the publish at its QoS
    /// level. Resolves with `ConnectionLost` if the connection drops
    /// first.
    pub async fn wait(self) -> Result<()> {
        match self.ack {
            None => Ok(()),
            Some(rx) => match rx.await {
                Ok(result) => result,
                Err(_) => Err(ClientError::ConnectionLost(DisconnectReason::Transport(
                    "connection task ended".into(),
                ))),
            },
        }
    }
}

struct Link {
    command_tx: mpsc::Sender<Command>,
    worker: Option<JoinHandle<()>>,
}

/// An MQTT 3.1/3.1.1 client.
///
/// Hooks and filter callbacks can be registered before or after
/// connecting and persist across connections.
pub struct MqttClient {
    client_id: String,
    options: ClientOptions,
    callbacks: Arc<Mutex<Callbacks>>,
    state_rx: watch::Receiver<ConnectionState>,
    link: Option<Link>,
}

impl MqttClient {
    pub fn new(options: ClientOptions) -> Self {
        let client_id = options
            .client_id
            .clone()
            .unwrap_or_else(|| format!("courier-{}", Uuid::new_v4().simple()));

        // Replaced with a live channel on each connect.
        let (_state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        Self {
            client_id,
            options,
            callbacks: Arc::new(Mutex::new(Callbacks::default())),
            state_rx,
            link: None,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Installs a lifecycle hook, replacing any previous hook for the
    /// same event.
    pub fn register_hook(&self, hook: Hook) {
        self.callbacks.lock().unwrap().registry.install(hook);
    }

    /// Installs a hook under its string event name, e.g. `"on_message"`.
    /// Unknown names and name/hook mismatches are rejected.
    pub fn register_hook_named(&self, name: &str, hook: Hook) -> Result<()> {
        let kind = HookKind::from_name(name)
            .ok_or_else(|| ClientError::InvalidArgument(format!("unknown event name: {name}")))?;
        if kind != hook.kind() {
            return Err(ClientError::InvalidArgument(format!(
                "hook for {} registered under name {name}",
                hook.kind().name()
            )));
        }
        self.register_hook(hook);
        Ok(())
    }

    /// Returns whether a hook was installed for the event.
    pub fn remove_hook(&self, kind: HookKind) -> bool {
        self.callbacks.lock().unwrap().registry.remove(kind)
    }

    /// Routes messages matching `filter` to `callback` instead of the
    /// catch-all message hook. The filter must be a valid subscription
    /// filter; registering it here does not subscribe to it.
    pub fn filter(&self, filter: &str, callback: MessageHook) -> Result<()> {
        topic::validate_filter(filter)?;
        self.callbacks
            .lock()
            .unwrap()
            .dispatcher
            .add_filter(filter.to_string(), callback);
        Ok(())
    }

    /// Returns whether a callback was registered for `filter`.
    pub fn filter_remove(&self, filter: &str) -> bool {
        self.callbacks
            .lock()
            .unwrap()
            .dispatcher
            .remove_filter(filter)
    }

    /// Connects to the broker and completes the CONNECT handshake.
    ///
    /// On success the connection task is running and the connect hook
    /// has fired. A refused CONNACK yields `ConnectionRefused` and no
    /// retry.
    pub async fn connect(
        &mut self,
        credentials: Option<Credentials>,
        host: &str,
        port: u16,
    ) -> Result<ConnectAck> {
        if self.link.is_some() {
            return Err(ClientError::AlreadyConnected);
        }

        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        self.state_rx = state_rx;
        let mut session = Session::new(
            state_tx,
            Duration::from_secs(u64::from(self.options.keep_alive)),
        );
        session.transition(ConnectionState::Connecting);

        info!(host, port, client_id = %self.client_id, "connecting");
        let mut conn = match self.open_transport(host, port).await {
            Ok(conn) => conn,
            Err(e) => {
                session.transition(ConnectionState::Disconnected);
                return Err(e);
            }
        };

        match self.handshake(&mut conn, credentials).await {
            Ok(ack) => {
                session.mark_sent();
                session.transition(ConnectionState::Connected);
                info!(session_present = ack.session_present, "connected");
                self.callbacks.lock().unwrap().registry.connected(&ack);

                let (command_tx, command_rx) = mpsc::channel(32);
                let callbacks = Arc::clone(&self.callbacks);
                let worker = tokio::spawn(event_loop(conn, session, callbacks, command_rx));
                self.link = Some(Link {
                    command_tx,
                    worker: Some(worker),
                });
                Ok(ack)
            }
            Err(e) => {
                session.transition(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    async fn open_transport(&self, host: &str, port: u16) -> Result<Connection> {
        let tcp = timeout(self.options.connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| ClientError::Timeout)??;

        match &self.options.tls {
            None => Ok(Connection::new(tcp)),
            Some(tls_options) => {
                let (connector, server_name) = tls::build_tls_connector(tls_options, host)?;
                let stream = timeout(self.options.connect_timeout, connector.connect(server_name, tcp))
                    .await
                    .map_err(|_| ClientError::Timeout)?
                    .map_err(|e| ClientError::Tls(e.to_string()))?;
                Ok(Connection::new(stream))
            }
        }
    }

    async fn handshake(
        &self,
        conn: &mut Connection,
        credentials: Option<Credentials>,
    ) -> Result<ConnectAck> {
        let (username, password) = match credentials {
            Some(c) => (Some(c.username), c.password),
            None => (None, None),
        };
        let connect = ConnectPacket {
            version: self.options.protocol_version,
            clean_session: self.options.clean_session,
            keep_alive: self.options.keep_alive,
            client_id: self.client_id.clone(),
            will: self.options.will.as_ref().map(|w| LastWill {
                topic: w.topic.clone(),
                payload: w.payload.clone(),
                qos: w.qos,
                retain: w.retain,
            }),
            username,
            password,
        };
        conn.write_packet(&ControlPacket::Connect(connect)).await?;

        let packet = timeout(self.options.connect_timeout, conn.read_packet())
            .await
            .map_err(|_| ClientError::Timeout)??
            .ok_or_else(|| {
                ClientError::Protocol("connection closed before CONNACK".into())
            })?;

        let connack = match packet {
            ControlPacket::ConnAck(connack) => connack,
            other => {
                return Err(ClientError::Protocol(format!(
                    "expected CONNACK, got {other:?}"
                )))
            }
        };

        if !connack.return_code.is_accepted() {
            return Err(ClientError::ConnectionRefused(connack.return_code));
        }

        Ok(ConnectAck {
            session_present: connack.session_present,
            return_code: connack.return_code,
        })
    }

    async fn send_command(&self, command: Command) -> Result<()> {
        let link = self.link.as_ref().ok_or(ClientError::NotConnected)?;
        link.command_tx
            .send(command)
            .await
            .map_err(|_| ClientError::NotConnected)
    }

    /// Publishes a message. The returned handle resolves once the
    /// broker has acknowledged delivery at the requested QoS.
    pub async fn publish(
        &self,
        topic: &str,
        payload: impl Into<Bytes>,
        qos: QoS,
        retain: bool,
    ) -> Result<PublishHandle> {
        topic::validate_publish_topic(topic)?;

        let (response, rx) = oneshot::channel();
        self.send_command(Command::Publish {
            topic: topic.to_string(),
            payload: payload.into(),
            qos,
            retain,
            response,
        })
        .await?;
        rx.await.map_err(|_| ClientError::NotConnected)?
    }

    /// Subscribes to the given filters, returning one granted QoS (or
    /// failure) per filter, in order.
    pub async fn subscribe(
        &self,
        filters: &[(&str, QoS)],
    ) -> Result<Vec<SubscribeReturnCode>> {
        if filters.is_empty() {
            return Err(ClientError::InvalidArgument(
                "subscribe requires at least one filter".into(),
            ));
        }
        for (filter, _) in filters {
            topic::validate_filter(filter)?;
        }

        let (response, rx) = oneshot::channel();
        self.send_command(Command::Subscribe {
            filters: filters
                .iter()
                .map(|(f, qos)| (f.to_string(), *qos))
                .collect(),
            response,
        })
        .await?;
        self.await_ack(rx).await
    }

    /// Single-filter convenience over [`subscribe`](Self::subscribe).
    pub async fn subscribe_one(&self, filter: &str, qos: QoS) -> Result<SubscribeReturnCode> {
        let mut codes = self.subscribe(&[(filter, qos)]).await?;
        codes
            .pop()
            .ok_or_else(|| ClientError::Protocol("SUBACK carried no return code".into()))
    }

    pub async fn unsubscribe(&self, filters: &[&str]) -> Result<()> {
        if filters.is_empty() {
            return Err(ClientError::InvalidArgument(
                "unsubscribe requires at least one filter".into(),
            ));
        }
        for filter in filters {
            topic::validate_filter(filter)?;
        }

        let (response, rx) = oneshot::channel();
        self.send_command(Command::Unsubscribe {
            filters: filters.iter().map(|f| f.to_string()).collect(),
            response,
        })
        .await?;
        self.await_ack(rx).await
    }

    async fn await_ack<T>(&self, rx: oneshot::Receiver<Result<T>>) -> Result<T> {
        match timeout(self.options.ack_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ClientError::ConnectionLost(DisconnectReason::Transport(
                "connection task ended".into(),
            ))),
            Err(_) => Err(ClientError::Timeout),
        }
    }

    /// Sends DISCONNECT and waits for the connection task to finish.
    /// Idempotent: disconnecting a dead or absent connection succeeds.
    pub async fn disconnect(&mut self) -> Result<()> {
        let link = match self.link.take() {
            Some(link) => link,
            None => return Ok(()),
        };

        let (response, rx) = oneshot::channel();
        let result = if link
            .command_tx
            .send(Command::Disconnect { response })
            .await
            .is_ok()
        {
            match timeout(self.options.ack_timeout, rx).await {
                Ok(Ok(result)) => result,
                // Task exited without responding; already disconnected.
                Ok(Err(_)) | Err(_) => Ok(()),
            }
        } else {
            Ok(())
        };

        if let Some(worker) = link.worker {
            let _ = worker.await;
        }
        result
    }

    /// Runs until the connection ends or the process receives Ctrl-C,
    /// in which case the client disconnects cleanly before returning.
    pub async fn run(&mut self) -> Result<()> {
        let mut worker = {
            let link = self.link.as_mut().ok_or(ClientError::NotConnected)?;
            link.worker.take().ok_or(ClientError::NotConnected)?
        };

        tokio::select! {
            joined = &mut worker => {
                self.link = None;
                joined.map_err(|e| {
                    ClientError::Protocol(format!("connection task failed: {e}"))
                })
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, disconnecting");
                let _ = self.disconnect().await;
                let _ = worker.await;
                Ok(())
            }
        }
    }
}

async fn event_loop(
    mut conn: Connection,
    mut session: Session,
    callbacks: Arc<Mutex<Callbacks>>,
    mut command_rx: mpsc::Receiver<Command>,
) {
    let reason = drive(&mut conn, &mut session, &callbacks, &mut command_rx).await;
    debug!(%reason, "connection ended");

    session.transition(ConnectionState::Disconnected);
    session.fail_all_pending(&reason);
    callbacks.lock().unwrap().registry.disconnected(&reason);
}

/// The connection's main loop. Returns why the connection ended.
async fn drive(
    conn: &mut Connection,
    session: &mut Session,
    callbacks: &Arc<Mutex<Callbacks>>,
    command_rx: &mut mpsc::Receiver<Command>,
) -> DisconnectReason {
    loop {
        let deadline = session.keepalive_deadline().map(TokioInstant::from_std);
        let wake_at = deadline.unwrap_or_else(|| TokioInstant::now() + Duration::from_secs(3600));

        tokio::select! {
            inbound = conn.read_packet() => match inbound {
                Ok(Some(packet)) => {
                    if let Err(e) = handle_packet(packet, conn, session, callbacks).await {
                        return reason_from_error(e);
                    }
                }
                Ok(None) => return DisconnectReason::ServerClosed,
                Err(e) => return reason_from_error(e),
            },

            command = command_rx.recv() => match command {
                Some(Command::Publish { topic, payload, qos, retain, response }) => {
                    match start_publish(conn, session, topic, payload, qos, retain).await {
                        Ok(handle) => {
                            let _ = response.send(Ok(handle));
                        }
                        Err(e) => {
                            let reason = reason_from_error(e);
                            let _ = response.send(Err(ClientError::ConnectionLost(reason.clone())));
                            return reason;
                        }
                    }
                }
                Some(Command::Subscribe { filters, response }) => {
                    if let Err(e) = start_subscribe(conn, session, filters, response).await {
                        return reason_from_error(e);
                    }
                }
                Some(Command::Unsubscribe { filters, response }) => {
                    if let Err(e) = start_unsubscribe(conn, session, filters, response).await {
                        return reason_from_error(e);
                    }
                }
                Some(Command::Disconnect { response }) => {
                    session.transition(ConnectionState::Disconnecting);
                    let result = conn
                        .write_packet(&ControlPacket::Disconnect(DisconnectPacket))
                        .await;
                    let _ = response.send(result);
                    return DisconnectReason::ClientInitiated;
                }
                // Every client handle is gone; shut down cleanly.
                None => {
                    session.transition(ConnectionState::Disconnecting);
                    let _ = conn
                        .write_packet(&ControlPacket::Disconnect(DisconnectPacket))
                        .await;
                    return DisconnectReason::ClientInitiated;
                }
            },

            _ = sleep_until(wake_at), if deadline.is_some() => {
                match session.keepalive_tick(Instant::now()) {
                    KeepaliveEvent::SendPing => {
                        debug!("keepalive elapsed, sending PINGREQ");
                        if let Err(e) = conn
                            .write_packet(&ControlPacket::PingReq(PingReqPacket))
                            .await
                        {
                            return reason_from_error(e);
                        }
                        session.mark_sent();
                        session.note_ping_sent();
                    }
                    KeepaliveEvent::Expired => {
                        warn!("no PINGRESP within grace window, dropping connection");
                        return DisconnectReason::KeepAliveTimeout;
                    }
                    KeepaliveEvent::Idle => {}
                }
            }
        }
    }
}

fn reason_from_error(error: ClientError) -> DisconnectReason {
    match error {
        ClientError::Packet(e) => DisconnectReason::Protocol(e.to_string()),
        ClientError::Protocol(detail) => DisconnectReason::Protocol(detail),
        other => DisconnectReason::Transport(other.to_string()),
    }
}

async fn start_publish(
    conn: &mut Connection,
    session: &mut Session,
    topic: String,
    payload: Bytes,
    qos: QoS,
    retain: bool,
) -> Result<PublishHandle> {
    let packet_id = match qos {
        QoS::AtMostOnce => None,
        _ => Some(session.alloc_packet_id()),
    };

    let packet = PublishPacket {
        dup: false,
        qos,
        retain,
        topic,
        packet_id,
        payload,
    };
    conn.write_packet(&ControlPacket::Publish(packet)).await?;
    session.mark_sent();

    Ok(match packet_id {
        None => PublishHandle::immediate(),
        Some(packet_id) => {
            let (ack, rx) = oneshot::channel();
            session.track(packet_id, PendingKind::Publish { qos, ack });
            PublishHandle::pending(packet_id, rx)
        }
    })
}

async fn start_subscribe(
    conn: &mut Connection,
    session: &mut Session,
    filters: Vec<(String, QoS)>,
    response: oneshot::Sender<Result<Vec<SubscribeReturnCode>>>,
) -> Result<()> {
    let packet_id = session.alloc_packet_id();
    let packet = SubscribePacket {
        packet_id,
        filters: filters
            .into_iter()
            .map(|(filter, qos)| SubscriptionRequest { filter, qos })
            .collect(),
    };
    conn.write_packet(&ControlPacket::Subscribe(packet)).await?;
    session.mark_sent();
    session.track(packet_id, PendingKind::Subscribe { response });
    Ok(())
}

async fn start_unsubscribe(
    conn: &mut Connection,
    session: &mut Session,
    filters: Vec<String>,
    response: oneshot::Sender<Result<()>>,
) -> Result<()> {
    let packet_id = session.alloc_packet_id();
    let packet = UnsubscribePacket { packet_id, filters };
    conn.write_packet(&ControlPacket::Unsubscribe(packet))
        .await?;
    session.mark_sent();
    session.track(packet_id, PendingKind::Unsubscribe { response });
    Ok(())
}

async fn handle_packet(
    packet: ControlPacket,
    conn: &mut Connection,
    session: &mut Session,
    callbacks: &Arc<Mutex<Callbacks>>,
) -> Result<()> {
    match packet {
        ControlPacket::Publish(publish) => {
            handle_inbound_publish(publish, conn, session, callbacks).await
        }

        ControlPacket::PubAck(ack) => {
            let packet_id = ack.packet_id;
            match session.complete(packet_id, |k| {
                matches!(
                    k,
                    PendingKind::Publish {
                        qos: QoS::AtLeastOnce,
                        ..
                    }
                )
            }) {
                Some(PendingOperation {
                    kind: PendingKind::Publish { ack, .. },
                    created_at,
                }) => {
                    debug!(packet_id, elapsed = ?created_at.elapsed(), "publish acknowledged");
                    let _ = ack.send(Ok(()));
                    callbacks.lock().unwrap().registry.published(packet_id);
                }
                _ => warn!(packet_id, "stray PUBACK ignored"),
            }
            Ok(())
        }

        ControlPacket::PubRec(rec) => {
            let packet_id = rec.packet_id;
            match session.complete(packet_id, |k| {
                matches!(
                    k,
                    PendingKind::Publish {
                        qos: QoS::ExactlyOnce,
                        ..
                    }
                )
            }) {
                Some(PendingOperation {
                    kind: PendingKind::Publish { ack, .. },
                    created_at,
                }) => {
                    conn.write_packet(&ControlPacket::PubRel(PubRelPacket { packet_id }))
                        .await?;
                    session.mark_sent();
                    session.reinstate(
                        packet_id,
                        PendingOperation {
                            kind: PendingKind::Release { ack },
                            created_at,
                        },
                    );
                }
                _ => warn!(packet_id, "stray PUBREC ignored"),
            }
            Ok(())
        }

        ControlPacket::PubComp(comp) => {
            let packet_id = comp.packet_id;
            match session.complete(packet_id, |k| matches!(k, PendingKind::Release { .. })) {
                Some(PendingOperation {
                    kind: PendingKind::Release { ack },
                    created_at,
                }) => {
                    debug!(packet_id, elapsed = ?created_at.elapsed(), "publish completed");
                    let _ = ack.send(Ok(()));
                    callbacks.lock().unwrap().registry.published(packet_id);
                }
                _ => warn!(packet_id, "stray PUBCOMP ignored"),
            }
            Ok(())
        }

        ControlPacket::PubRel(rel) => {
            let packet_id = rel.packet_id;
            match session.release_inbound(packet_id) {
                Some(message) => {
                    callbacks.lock().unwrap().dispatch_message(&message);
                }
                None => warn!(packet_id, "PUBREL without held message"),
            }
            conn.write_packet(&ControlPacket::PubComp(PubCompPacket { packet_id }))
                .await?;
            session.mark_sent();
            Ok(())
        }

        ControlPacket::SubAck(suback) => {
            let packet_id = suback.packet_id;
            match session.complete(packet_id, |k| matches!(k, PendingKind::Subscribe { .. })) {
                Some(PendingOperation {
                    kind: PendingKind::Subscribe { response },
                    ..
                }) => {
                    debug!(packet_id, codes = ?suback.return_codes, "subscription acknowledged");
                    callbacks
                        .lock()
                        .unwrap()
                        .registry
                        .subscribed(packet_id, &suback.return_codes);
                    let _ = response.send(Ok(suback.return_codes));
                }
                _ => warn!(packet_id, "stray SUBACK ignored"),
            }
            Ok(())
        }

        ControlPacket::UnsubAck(unsuback) => {
            let packet_id = unsuback.packet_id;
            match session.complete(packet_id, |k| matches!(k, PendingKind::Unsubscribe { .. })) {
                Some(PendingOperation {
                    kind: PendingKind::Unsubscribe { response },
                    ..
                }) => {
                    debug!(packet_id, "unsubscribe acknowledged");
                    callbacks.lock().unwrap().registry.unsubscribed(packet_id);
                    let _ = response.send(Ok(()));
                }
                _ => warn!(packet_id, "stray UNSUBACK ignored"),
            }
            Ok(())
        }

        ControlPacket::PingResp(_) => {
            debug!("PINGRESP received");
            session.note_ping_answered();
            Ok(())
        }

        other => Err(ClientError::Protocol(format!(
            "unexpected packet from broker: {other:?}"
        ))),
    }
}

async fn handle_inbound_publish(
    publish: PublishPacket,
    conn: &mut Connection,
    session: &mut Session,
    callbacks: &Arc<Mutex<Callbacks>>,
) -> Result<()> {
    let message = Message {
        topic: publish.topic.into(),
        payload: publish.payload,
        qos: publish.qos,
        retain: publish.retain,
        dup: publish.dup,
        packet_id: publish.packet_id,
    };

    match message.qos {
        QoS::AtMostOnce => {
            callbacks.lock().unwrap().dispatch_message(&message);
        }
        QoS::AtLeastOnce => {
            // Decode guarantees a packet id at this QoS.
            if let Some(packet_id) = message.packet_id {
                conn.write_packet(&ControlPacket::PubAck(PubAckPacket { packet_id }))
                    .await?;
                session.mark_sent();
            }
            callbacks.lock().unwrap().dispatch_message(&message);
        }
        QoS::ExactlyOnce => {
            if let Some(packet_id) = message.packet_id {
                // Delivery happens on PUBREL; duplicates before then are
                // absorbed here.
                if !session.store_inbound(packet_id, message) {
                    debug!(packet_id, "duplicate QoS 2 publish");
                }
                conn.write_packet(&ControlPacket::PubRec(PubRecPacket { packet_id }))
                    .await?;
                session.mark_sent();
            }
        }
    }
    Ok(())
}
