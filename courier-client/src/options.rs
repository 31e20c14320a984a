use std::time::Duration;

use bytes::Bytes;
use courier_core::{protocol::ProtocolVersion, qos::QoS};

/// Username and optional password presented in CONNECT.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: Option<Bytes>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<Bytes>) -> Self {
        Self {
            username: username.into(),
            password: Some(password.into()),
        }
    }

    pub fn username_only(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: None,
        }
    }
}

/// Will message the broker publishes if the client drops off
/// ungracefully.
#[derive(Debug, Clone)]
pub struct Will {
    pub topic: String,
    pub payload: Bytes,
    pub qos: QoS,
    pub retain: bool,
}

impl Will {
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

/// TLS configuration for client connections.
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    /// Path to a custom CA certificate file (PEM). If not set, system
    /// root certificates are used.
    pub ca_path: Option<String>,
    /// Client certificate chain (PEM) for mutual TLS. Requires
    /// `key_path`.
    pub cert_path: Option<String>,
    /// Private key (PEM) matching `cert_path`.
    pub key_path: Option<String>,
    /// Skip server certificate verification (insecure, for testing only).
    pub danger_skip_verify: bool,
}

/// Options governing a client's sessions. Host and port are given at
/// `connect()` time so the same options can target several brokers.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub(crate) client_id: Option<String>,
    pub(crate) clean_session: bool,
    pub(crate) keep_alive: u16,
    pub(crate) protocol_version: ProtocolVersion,
    pub(crate) connect_timeout: Duration,
    pub(crate) ack_timeout: Duration,
    pub(crate) will: Option<Will>,
    pub(crate) tls: Option<TlsOptions>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            client_id: None,
            clean_session: true,
            keep_alive: 60,
            protocol_version: ProtocolVersion::default(),
            connect_timeout: Duration::from_secs(30),
            ack_timeout: Duration::from_secs(30),
            will: None,
            tls: None,
        }
    }
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the client identifier. If not set, a random one is
    /// generated.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set the clean session flag. When false the broker keeps
    /// subscription state across connections for this client id.
    pub fn clean_session(mut self, clean: bool) -> Self {
        self.clean_session = clean;
        self
    }

    /// Set the keep-alive interval in seconds. Zero disables keepalive.
    pub fn keep_alive(mut self, seconds: u16) -> Self {
        self.keep_alive = seconds;
        self
    }

    /// Select MQTT 3.1 or 3.1.1. Defaults to 3.1.1.
    pub fn protocol_version(mut self, version: ProtocolVersion) -> Self {
        self.protocol_version = version;
        self
    }

    /// Deadline for TCP/TLS establishment and the CONNACK.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Deadline for SUBACK/UNSUBACK and DISCONNECT completion.
    pub fn ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Set the will message registered with the broker at connect.
    pub fn will(mut self, will: Will) -> Self {
        self.will = Some(will);
        self
    }

    /// Enable TLS with the given settings.
    pub fn tls(mut self, tls: TlsOptions) -> Self {
        self.tls = Some(tls);
        self
    }
}
