//! Shared plumbing for the courier command-line tools.

use clap::Args;
use courier_client::{ClientOptions, Credentials, ProtocolVersion, TlsOptions};
use tracing_subscriber::EnvFilter;

/// Broker connection flags shared by every tool.
#[derive(Args, Debug)]
pub struct ConnectionArgs {
    /// Broker host
    #[arg(short = 'H', long, default_value = "localhost")]
    pub host: String,

    /// Broker port
    #[arg(short = 'p', long, default_value = "1883")]
    pub port: u16,

    /// Client identifier (random if not given)
    #[arg(short = 'i', long)]
    pub client_id: Option<String>,

    /// Username for authentication
    #[arg(short = 'u', long)]
    pub username: Option<String>,

    /// Password for authentication
    #[arg(short = 'P', long)]
    pub password: Option<String>,

    /// Keep-alive interval in seconds (0 disables)
    #[arg(short = 'k', long, default_value = "60")]
    pub keep_alive: u16,

    /// Use MQTT 3.1 instead of 3.1.1
    #[arg(long)]
    pub mqtt31: bool,

    /// Enable TLS
    #[arg(long)]
    pub tls: bool,

    /// Custom CA certificate file (PEM), implies --tls
    #[arg(long)]
    pub cafile: Option<String>,

    /// Client certificate file (PEM) for mutual TLS
    #[arg(long, requires = "key")]
    pub cert: Option<String>,

    /// Client private key file (PEM) for mutual TLS
    #[arg(long, requires = "cert")]
    pub key: Option<String>,

    /// Skip TLS certificate verification (insecure, for testing only)
    #[arg(long)]
    pub insecure: bool,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl ConnectionArgs {
    pub fn to_client_options(&self) -> ClientOptions {
        let mut options = ClientOptions::new().keep_alive(self.keep_alive);
        if let Some(ref client_id) = self.client_id {
            options = options.client_id(client_id.clone());
        }
        if self.mqtt31 {
            options = options.protocol_version(ProtocolVersion::V3_1);
        }
        if self.tls || self.cafile.is_some() || self.insecure {
            options = options.tls(TlsOptions {
                ca_path: self.cafile.clone(),
                cert_path: self.cert.clone(),
                key_path: self.key.clone(),
                danger_skip_verify: self.insecure,
            });
        }
        options
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.username.as_ref().map(|username| match &self.password {
            Some(password) => Credentials::new(username.clone(), password.clone()),
            None => Credentials::username_only(username.clone()),
        })
    }
}

/// Parses the QoS flag shared by the tools.
pub fn parse_qos(qos: u8) -> courier_client::QoS {
    match courier_client::QoS::try_from(qos) {
        Ok(qos) => qos,
        Err(_) => {
            eprintln!("Invalid QoS level: {}. Must be 0, 1, or 2.", qos);
            std::process::exit(1);
        }
    }
}

/// Initializes tracing. `RUST_LOG` overrides the verbosity flags.
pub fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
