//! MQTT subscribe tool - subscribe to topics and print messages.

use clap::Parser;
use courier_cli::{init_logging, parse_qos, ConnectionArgs};
use courier_client::{subscribe_callback, QoS};

#[derive(Parser, Debug)]
#[command(name = "courier-sub")]
#[command(about = "Subscribe to topics on an MQTT broker")]
#[command(version)]
struct Args {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Topic filter(s) to subscribe to (can be given multiple times)
    #[arg(short = 't', long, required = true)]
    topic: Vec<String>,

    /// QoS level for subscriptions (0, 1, or 2)
    #[arg(short = 'q', long, default_value = "0")]
    qos: u8,

    /// Print the topic name before each message
    #[arg(short = 'T', long)]
    print_topic: bool,

    /// Exit after receiving this many messages
    #[arg(short = 'C', long)]
    count: Option<usize>,

    /// Skip messages the broker replays from its retained store
    #[arg(short = 'R', long)]
    ignore_retained: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.connection.verbose);

    let qos = parse_qos(args.qos);
    let filters: Vec<(&str, QoS)> = args.topic.iter().map(|t| (t.as_str(), qos)).collect();

    if let Some(count) = args.count {
        let messages = courier_client::collect(
            &args.connection.host,
            args.connection.port,
            args.connection.credentials(),
            args.connection.to_client_options(),
            &filters,
            count,
            args.ignore_retained,
        )
        .await?;
        for message in messages {
            print_message(args.print_topic, &message);
        }
        return Ok(());
    }

    let print_topic = args.print_topic;
    let ignore_retained = args.ignore_retained;
    subscribe_callback(
        &args.connection.host,
        args.connection.port,
        args.connection.credentials(),
        args.connection.to_client_options(),
        &filters,
        Box::new(move |message| {
            if ignore_retained && message.retain {
                return;
            }
            print_message(print_topic, message);
        }),
    )
    .await?;

    Ok(())
}

fn print_message(print_topic: bool, message: &courier_client::Message) {
    if print_topic {
        println!("{}: {}", message.topic, message.payload_str());
    } else {
        println!("{}", message.payload_str());
    }
}
