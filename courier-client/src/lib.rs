//! Courier MQTT Client Library
//!
//! An asynchronous MQTT 3.1/3.1.1 client with callback-based dispatch.
//! Messages are routed to per-filter callbacks, with lifecycle hooks
//! for connect, delivery and disconnect events.
//!
//! # Example
//!
//! ```no_run
//! use courier_client::{ClientOptions, MqttClient, QoS};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = ClientOptions::new().client_id("my-client");
//!     let mut client = MqttClient::new(options);
//!
//!     // Route temperature readings to a callback
//!     client.filter("sensors/+/temp", Box::new(|message| {
//!         println!("{}: {}", message.topic, message.payload_str());
//!     }))?;
//!
//!     client.connect(None, "localhost", 1883).await?;
//!     client.subscribe(&[("sensors/#", QoS::AtLeastOnce)]).await?;
//!
//!     // Publish and wait for the broker's acknowledgement
//!     client
//!         .publish("sensors/attic/temp", "21.5", QoS::AtLeastOnce, false)
//!         .await?
//!         .wait()
//!         .await?;
//!
//!     // Run until Ctrl-C
//!     client.run().await?;
//!     Ok(())
//! }
//! ```

mod client;
mod connection;
mod dispatcher;
mod error;
mod event;
mod helpers;
mod options;
mod session;
mod tls;

pub use client::{MqttClient, PublishHandle};
pub use dispatcher::Dispatcher;
pub use error::{ClientError, Result};
pub use event::{
    AckHook, ConnectAck, ConnectHook, DisconnectHook, DisconnectReason, EventRegistry, Hook,
    HookKind, MessageHook, SubscribeHook,
};
pub use helpers::{collect, publish_multiple, publish_single, subscribe_callback, Publication};
pub use options::{ClientOptions, Credentials, TlsOptions, Will};
pub use session::ConnectionState;

// Re-export commonly used types from courier-core
pub use courier_core::message::Message;
pub use courier_core::protocol::ProtocolVersion;
pub use courier_core::qos::QoS;
pub use courier_core::returncode::{ConnectReturnCode, SubscribeReturnCode};
