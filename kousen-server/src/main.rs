// File: kousen-server/src/main.rs

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use kousen_common::models::MessageEvent;
use kousen_common::traits::GatewayClient;
use kousen_core::gateway::DiscordGateway;
use kousen_core::{Bot, BotConfig};

mod console;
mod demo;

use console::{ConsoleClient, CONSOLE_CHANNEL};
use demo::{install_bot_hooks, DemoModule};

#[derive(Parser, Debug, Clone)]
#[command(name = "kousen")]
#[command(author, version, about = "kousen - prefix command bot")]
struct Args {
    /// Mode: "console" or "discord"
    #[arg(long, default_value = "console")]
    mode: String,

    /// Command prefix, used when no config file is given
    #[arg(long, default_value = "!")]
    prefix: String,

    /// JSON bot config; overrides --prefix
    #[arg(long)]
    config: Option<PathBuf>,

    /// Discord bot token. Falls back to DISCORD_TOKEN.
    #[arg(long)]
    token: Option<String>,
}

fn init_tracing() {
    let filter = EnvFilter::from_default_env()
        .add_directive("kousen=info".parse().unwrap_or_default());
    let sub = fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(sub)
        .expect("Failed to set global subscriber");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    init_tracing();
    let args = Args::parse();
    info!("kousen starting. mode={}, config={:?}", args.mode, args.config);

    match args.mode.as_str() {
        "console" => {
            if let Err(e) = run_console(args).await {
                error!("Console error: {:?}", e);
            }
        }
        "discord" => {
            if let Err(e) = run_discord(args).await {
                error!("Discord error: {:?}", e);
            }
        }
        other => {
            error!("Invalid mode '{}'. Use --mode=console or --mode=discord.", other);
        }
    }
    info!("Main finished. Goodbye!");
    Ok(())
}

fn build_bot(args: &Args, client: Arc<dyn GatewayClient>) -> anyhow::Result<Arc<Bot>> {
    let builder = match &args.config {
        Some(path) => BotConfig::from_file(path)?.into_builder(client)?,
        None => Bot::builder(client).prefix(args.prefix.as_str()),
    };
    let bot = builder.build()?;
    install_bot_hooks(&bot);
    Ok(bot)
}

async fn run_console(args: Args) -> anyhow::Result<()> {
    let bot = build_bot(&args, Arc::new(ConsoleClient::new()))?;
    bot.setup_mention_prefixes().await?;
    bot.load_module(Arc::new(DemoModule)).await?;

    let (tx, rx) = mpsc::unbounded_channel::<MessageEvent>();
    let event_loop = tokio::spawn(bot.clone().run(rx));
    info!("Reading commands from stdin. Ctrl-D to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let event = MessageEvent::new(CONSOLE_CHANNEL, ConsoleClient::console_author(), line);
        if tx.send(event).is_err() {
            warn!("Event loop stopped, no longer reading input.");
            break;
        }
    }

    drop(tx);
    event_loop.await?;
    bot.unload_module("demo").await?;
    Ok(())
}

async fn run_discord(args: Args) -> anyhow::Result<()> {
    let token = match args.token.clone() {
        Some(token) => token,
        None => std::env::var("DISCORD_TOKEN")
            .map_err(|_| anyhow::anyhow!("no --token given and DISCORD_TOKEN is not set"))?,
    };

    let (http, cache, client) = DiscordGateway::client(token.clone());
    let bot = build_bot(&args, Arc::new(client))?;
    bot.load_module(Arc::new(DemoModule)).await?;

    let gateway = DiscordGateway::connect(token, http, cache, bot.clone()).await?;
    info!("Connected to Discord. Ctrl-C to stop.");

    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received, shutting down.");
    gateway.disconnect().await;
    Ok(())
}
