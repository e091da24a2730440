use std::io::Read;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use gke_notify::webhook::HttpWebhookSender;
use gke_notify::{
    config, interpret, logging, server, Dispatcher, Interpretation, InvocationContext, MemorySecretStore,
    NotificationEvent, NotifierConfig,
};

#[derive(Parser)]
#[command(
    name = "gke-notify",
    version,
    about = "Relay GKE cluster upgrade notifications to a Slack webhook"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Handle a single event read from a file or stdin
    Handle {
        /// Event JSON file, `-` for stdin
        #[arg(short, long, default_value = "-")]
        event: PathBuf,
        /// Message id to log (defaults to the event's messageId)
        #[arg(long)]
        event_id: Option<String>,
        /// Publish time to log (defaults to the event's publishTime)
        #[arg(long)]
        timestamp: Option<String>,
        /// Post to this URL instead of reading the secret from Secret Manager
        #[arg(long, env = "WEBHOOK_URL")]
        webhook_url: Option<String>,
    },
    /// Print the message an event would produce without sending it
    Render {
        /// Event JSON file, `-` for stdin
        #[arg(short, long, default_value = "-")]
        event: PathBuf,
        /// Destination channel written into the message
        #[arg(long, env = "SLACK_NOTIFICATION_CHANNEL", default_value = "#gke-notifications")]
        channel: String,
    },
    /// Serve a Pub/Sub push endpoint
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        #[arg(long, env = "PORT", default_value_t = 8080)]
        port: u16,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("gke-notify: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Handle {
            event,
            event_id,
            timestamp,
            webhook_url,
        } => {
            let config = match webhook_url {
                Some(_) => NotifierConfig::from_env_with_defaults(config::LOCAL_DEFAULTS),
                None => NotifierConfig::from_env(),
            }
            .context("loading configuration")?;
            logging::init(config.cloud_logging_enabled);

            let event = read_event(&event)?;
            let mut ctx = InvocationContext::from_event(&event);
            if let Some(id) = event_id {
                ctx.event_id = id;
            }
            if let Some(ts) = timestamp {
                ctx.timestamp = ts;
            }

            let dispatcher = match webhook_url {
                Some(url) => local_dispatcher(config, url)?,
                None => Dispatcher::from_config(config)?,
            };

            let outcome = dispatcher.handle(&event, &ctx).await;
            println!("{:?}", outcome);
            if outcome.is_failed() {
                anyhow::bail!("invocation {} failed", ctx.event_id);
            }
            Ok(())
        }
        Commands::Render { event, channel } => {
            logging::init(false);

            let event = read_event(&event)?;
            match interpret(&event, &channel)? {
                Interpretation::Message(message) => {
                    println!("{}", serde_json::to_string_pretty(&message)?);
                }
                Interpretation::Skip(reason) => println!("skipped: {}", reason),
            }
            Ok(())
        }
        Commands::Serve { host, port } => {
            let config = NotifierConfig::from_env().context("loading configuration")?;
            logging::init(config.cloud_logging_enabled);

            let addr: SocketAddr = format!("{}:{}", host, port)
                .parse()
                .with_context(|| format!("invalid listen address {}:{}", host, port))?;
            let dispatcher = Arc::new(Dispatcher::from_config(config)?);
            server::serve(addr, dispatcher).await?;
            Ok(())
        }
    }
}

/// Dispatcher that posts to a fixed URL, for local runs
fn local_dispatcher(config: NotifierConfig, url: String) -> anyhow::Result<Dispatcher> {
    let secrets = MemorySecretStore::new().with_secret(
        config.project_id.clone(),
        config.slack_secret_name.clone(),
        url,
    );
    let client = reqwest::Client::builder()
        .timeout(config.http_timeout())
        .build()?;
    Ok(Dispatcher::new(
        config,
        Arc::new(secrets),
        Arc::new(HttpWebhookSender::new(client)),
    ))
}

fn read_event(path: &Path) -> anyhow::Result<NotificationEvent> {
    let raw = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading event from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("reading event file {}", path.display()))?
    };
    serde_json::from_str(&raw).context("parsing event JSON")
}
