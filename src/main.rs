//! CLI for nsq_bus
//!
//! Operator commands against a live discovery service:
//! - `lookup`: report whether a topic is known
//! - `nodes`: list live broker nodes
//! - `ensure-topic`: create a topic on the first live node if it is unknown
//! - `publish`: publish a JSON payload through nsqd's HTTP API, optionally
//!   asking for a reply
//! - `listen`: consume a topic on a channel, print each payload and answer
//!   requests with the payload they carried

use std::sync::Arc;

use clap::{Parser, Subcommand};
use nsq_bus::config::load_config;
use nsq_bus::discovery::{DiscoveryClient, TopicLookup};
use nsq_bus::provision::{Provisioned, TopicProvisioner};
use nsq_bus::utils::logging;
use nsq_bus::{
    BoxError, Emitter, EmitterConfig, Envelope, HttpEmitter, Listener, ListenerConfig, NsqConfig,
    NsqConsumerFactory,
};
use serde_json::Value;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "nsq-bus")]
struct Cli {
    /// Discovery service address (default: first configured address)
    #[arg(long, global = true)]
    lookupd: Option<String>,

    /// nsqd HTTP address used for publishing (default: configured emitter address)
    #[arg(long, global = true)]
    nsqd: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Report whether a topic is known to the discovery service
    Lookup {
        #[arg(long)]
        topic: String,
    },
    /// List the broker nodes registered with the discovery service
    Nodes,
    /// Create a topic on the first live broker node unless it already exists
    EnsureTopic {
        #[arg(long)]
        topic: String,
    },
    /// Publish a JSON payload to a topic
    Publish {
        #[arg(long)]
        topic: String,
        /// Payload as JSON, e.g. '{"id": 1}'
        #[arg(long)]
        payload: String,
        /// Topic the receiver should publish its result to
        #[arg(long)]
        reply_to: Option<String>,
    },
    /// Consume a topic, printing payloads and echoing them to `replyTo`
    Listen {
        #[arg(long)]
        topic: String,
        #[arg(long)]
        channel: String,
        #[arg(long, default_value_t = 1)]
        concurrency: usize,
        /// Create the topic first if the discovery service does not know it
        #[arg(long)]
        create: bool,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("nsq-bus failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let settings = load_config()?;
    logging::init(&settings.logging.level);

    let lookupd = cli
        .lookupd
        .unwrap_or_else(|| settings.discovery.primary_address().to_string());
    let client = DiscoveryClient::new(settings.discovery.request_timeout())?;
    let mut emitter_config = EmitterConfig::from(&settings.emitter);
    if let Some(nsqd) = cli.nsqd {
        emitter_config.address = nsqd;
    }

    match cli.command {
        Command::Lookup { topic } => match client.lookup_topic(&lookupd, &topic).await? {
            TopicLookup::Found => println!("{topic}: exists"),
            TopicLookup::NotFound => println!("{topic}: not found"),
        },
        Command::Nodes => {
            for node in client.nodes(&lookupd).await? {
                println!("{node}");
            }
        }
        Command::EnsureTopic { topic } => {
            match TopicProvisioner::new(client)
                .ensure_topic(&lookupd, &topic)
                .await?
            {
                Provisioned::AlreadyExists => println!("{topic}: already exists"),
                Provisioned::Created { node } => println!("{topic}: created on {node}"),
            }
        }
        Command::Publish {
            topic,
            payload,
            reply_to,
        } => {
            let payload: Value = serde_json::from_str(&payload)?;
            let emitter = HttpEmitter::new(emitter_config)?;
            match reply_to {
                Some(reply_to) => emitter.request(&topic, &payload, &reply_to).await?,
                None => emitter.publish(&topic, &payload).await?,
            }
            println!("{topic}: published");
        }
        Command::Listen {
            topic,
            channel,
            concurrency,
            create,
        } => {
            let factory = NsqConsumerFactory::new(NsqConfig {
                request_timeout: settings.discovery.request_timeout(),
                ..NsqConfig::default()
            })?;
            let listener =
                Listener::with_emitter(factory, Arc::new(HttpEmitter::new(emitter_config)?));
            let mut addresses = settings.discovery.addresses.clone();
            addresses.retain(|a| a != &lookupd);
            addresses.insert(0, lookupd);

            listener
                .on(ListenerConfig::new(&topic, &channel)
                    .handler(|envelope: Envelope| async move {
                        println!("{} {}", envelope.id, envelope.payload);
                        Ok::<_, BoxError>(envelope.payload)
                    })
                    .discovery_addresses(addresses)
                    .concurrency(concurrency)
                    .auto_create_topic(create)
                    .request_timeout(settings.discovery.request_timeout()))
                .await?;

            info!(%topic, %channel, "listening, ctrl-c to stop");
            tokio::signal::ctrl_c().await?;
        }
    }

    Ok(())
}
