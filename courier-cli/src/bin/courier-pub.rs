//! MQTT publish tool - publish one or more messages to a topic.

use std::io::{self, Read};

use clap::Parser;
use courier_cli::{init_logging, parse_qos, ConnectionArgs};
use courier_client::{publish_multiple, Publication};

#[derive(Parser, Debug)]
#[command(name = "courier-pub")]
#[command(about = "Publish messages to an MQTT broker")]
#[command(version)]
struct Args {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Topic to publish to
    #[arg(short = 't', long)]
    topic: String,

    /// Message payload(s); reads one from stdin if not provided
    #[arg(short = 'm', long)]
    message: Vec<String>,

    /// QoS level (0, 1, or 2)
    #[arg(short = 'q', long, default_value = "0")]
    qos: u8,

    /// Retain the message on the broker
    #[arg(short = 'r', long)]
    retain: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.connection.verbose);

    let qos = parse_qos(args.qos);

    let payloads = if args.message.is_empty() {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        vec![buffer]
    } else {
        args.message
    };

    let messages = payloads
        .into_iter()
        .map(|payload| {
            Publication::new(args.topic.clone(), payload)
                .qos(qos)
                .retain(args.retain)
        })
        .collect();

    publish_multiple(
        &args.connection.host,
        args.connection.port,
        args.connection.credentials(),
        args.connection.to_client_options(),
        messages,
    )
    .await?;

    Ok(())
}
