//! One-shot conveniences: connect, do one thing, disconnect.

use bytes::Bytes;
use courier_core::{message::Message, qos::QoS};
use tokio::sync::mpsc;
use tracing::debug;

use crate::client::MqttClient;
use crate::error::{ClientError, Result};
use crate::event::{DisconnectReason, Hook, MessageHook};
use crate::options::{ClientOptions, Credentials};

/// A message to publish, for the one-shot publish helpers.
#[derive(Debug, Clone)]
pub struct Publication {
    pub topic: String,
    pub payload: Bytes,
    pub qos: QoS,
    pub retain: bool,
}

impl Publication {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            qos: QoS::AtMostOnce,
            retain: false,
        }
    }

    pub fn qos(mut self, qos: QoS) -> Self {
        self.qos = qos;
        self
    }

    pub fn retain(mut self, retain: bool) -> Self {
        self.retain = retain;
        self
    }
}

/// Connects, publishes one message, waits for its acknowledgement and
/// disconnects.
pub async fn publish_single(
    host: &str,
    port: u16,
    credentials: Option<Credentials>,
    options: ClientOptions,
    message: Publication,
) -> Result<()> {
    publish_multiple(host, port, credentials, options, vec![message]).await
}

/// Connects, publishes every message over the single connection, waits
/// for all acknowledgements and disconnects.
pub async fn publish_multiple(
    host: &str,
    port: u16,
    credentials: Option<Credentials>,
    options: ClientOptions,
    messages: Vec<Publication>,
) -> Result<()> {
    let mut client = MqttClient::new(options);
    client.connect(credentials, host, port).await?;

    let mut handles = Vec::with_capacity(messages.len());
    for message in messages {
        let handle = client
            .publish(&message.topic, message.payload, message.qos, message.retain)
            .await?;
        handles.push(handle);
    }
    for handle in handles {
        handle.wait().await?;
    }

    client.disconnect().await
}

/// Connects, subscribes to `filters` and returns once `count` messages
/// arrived, disconnecting before returning. With `ignore_retained`,
/// retained deliveries (the broker replaying stored state on subscribe)
/// do not count. Fails with `ConnectionLost` if the connection drops
/// first.
pub async fn collect(
    host: &str,
    port: u16,
    credentials: Option<Credentials>,
    options: ClientOptions,
    filters: &[(&str, QoS)],
    count: usize,
    ignore_retained: bool,
) -> Result<Vec<Message>> {
    if count == 0 {
        return Ok(Vec::new());
    }

    let mut client = MqttClient::new(options);

    let (message_tx, mut message_rx) = mpsc::channel::<Message>(count);
    client.register_hook(Hook::Message(Box::new(move |message| {
        if message_tx.try_send(message.clone()).is_err() {
            debug!(topic = %message.topic, "collector full, message dropped");
        }
    })));

    let (lost_tx, mut lost_rx) = mpsc::channel::<DisconnectReason>(1);
    client.register_hook(Hook::Disconnect(Box::new(move |reason| {
        let _ = lost_tx.try_send(reason.clone());
    })));

    client.connect(credentials, host, port).await?;
    client.subscribe(filters).await?;

    let mut collected = Vec::with_capacity(count);
    while collected.len() < count {
        tokio::select! {
            message = message_rx.recv() => match message {
                Some(message) if ignore_retained && message.retain => {
                    debug!(topic = %message.topic, "retained message skipped");
                }
                Some(message) => collected.push(message),
                None => unreachable!("collector sender lives in the registry"),
            },
            reason = lost_rx.recv() => {
                let reason = reason.unwrap_or(DisconnectReason::ServerClosed);
                return Err(ClientError::ConnectionLost(reason));
            }
        }
    }

    client.disconnect().await?;
    Ok(collected)
}

/// Connects, subscribes and runs `callback` for every matching message
/// until the connection ends or the process receives Ctrl-C.
pub async fn subscribe_callback(
    host: &str,
    port: u16,
    credentials: Option<Credentials>,
    options: ClientOptions,
    filters: &[(&str, QoS)],
    callback: MessageHook,
) -> Result<()> {
    let mut client = MqttClient::new(options);
    client.register_hook(Hook::Message(callback));
    client.connect(credentials, host, port).await?;
    client.subscribe(filters).await?;
    client.run().await
}
