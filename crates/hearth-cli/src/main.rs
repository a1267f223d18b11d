use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use hearth_common::{APP_NAME, HearthConfig, logging};
use hearth_comms::{TelegramBot, TelegramClient};
use hearth_gateway::{Channel, Gateway, ReminderScheduler, Reply, SessionKey};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

const REMINDER_TICK: Duration = Duration::from_secs(30);

#[derive(Debug, Parser)]
#[command(name = "hearth", about = "Hearth personal dashboard CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate local setup and generate default config if missing.
    Doctor,
    /// Interactive chat session in the terminal.
    Chat,
    /// Web dashboard commands.
    Web {
        #[command(subcommand)]
        command: WebCommand,
    },
    /// Telegram bot commands.
    Telegram {
        #[command(subcommand)]
        command: TelegramCommand,
    },
}

#[derive(Debug, Subcommand)]
enum WebCommand {
    /// Serve the local dashboard.
    Serve {
        /// Defaults to `web.bind_addr` from the config.
        #[arg(long)]
        bind: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum TelegramCommand {
    /// Validate the configured bot token with the Telegram API.
    Status,
    /// Long-poll for messages until interrupted.
    Run,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Some(Command::Doctor) => doctor(),
        Some(Command::Chat) => chat(),
        Some(Command::Web { command }) => web(command),
        Some(Command::Telegram { command }) => telegram(command),
        None => {
            println!("{APP_NAME} CLI ready.");
            println!("Run `hearth doctor` to generate and validate local config.");
            Ok(())
        }
    }
}

fn load_initialized_config() -> Result<HearthConfig> {
    let (config, _, _) = HearthConfig::load_or_create()?;
    config.validate_and_prepare()?;
    logging::init(&config.log_level);
    Ok(config)
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .with_context(|| "failed to build tokio runtime")
}

async fn build_gateway(config: &HearthConfig) -> Result<Arc<Gateway>> {
    let store = hearth_store::open(config).with_context(|| "failed to open record store")?;
    let gateway = Gateway::from_config(config, store)?;
    gateway
        .sync()
        .refresh()
        .await
        .with_context(|| "failed to load records from store")?;
    Ok(Arc::new(gateway))
}

fn doctor() -> Result<()> {
    let (config, path, created) = HearthConfig::load_or_create()?;
    config.validate_and_prepare()?;
    logging::init(&config.log_level);
    let store = hearth_store::open(&config)?;

    println!("{APP_NAME} doctor: OK");
    println!("config: {}", path.display());
    println!("data_dir: {}", config.data_dir.display());
    println!("store: {}", store.backend_name());
    println!("db: {}", config.db_path().display());
    println!(
        "decoder: {}",
        config
            .decoder
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|endpoint| !endpoint.is_empty())
            .unwrap_or("keyword")
    );
    println!("telegram_enabled: {}", config.telegram.enabled);
    println!("created_config: {created}");
    Ok(())
}

fn print_reply(reply: &Reply) {
    println!("{}", reply.text);
    for (idx, choice) in reply.choices.iter().enumerate() {
        println!("  [{}] {}", idx + 1, choice.label);
    }
}

fn chat() -> Result<()> {
    let config = load_initialized_config()?;
    runtime()?.block_on(async {
        let gateway = build_gateway(&config).await?;
        let key = SessionKey::new(Channel::Cli, "local");
        let mut scheduler = ReminderScheduler::new();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut tick = tokio::time::interval(REMINDER_TICK);
        let mut last: Option<Reply> = None;

        println!("{APP_NAME} chat. Type /help for commands, Ctrl-D to quit.");
        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }
                    // A number picks from the last reply's choices.
                    let picked = input
                        .parse::<usize>()
                        .ok()
                        .and_then(|n| last.as_ref()?.choices.get(n.checked_sub(1)?))
                        .map(|choice| choice.value.clone());
                    let reply = match picked {
                        Some(value) => gateway.handle_choice(&key, &value).await,
                        None => gateway.handle_text(&key, input).await,
                    };
                    print_reply(&reply);
                    last = Some(reply);
                }
                _ = tick.tick() => {
                    let ledger = match gateway.view() {
                        Ok(ledger) => ledger,
                        Err(err) => {
                            warn!(error = %err, "reminder check skipped");
                            continue;
                        }
                    };
                    for reminder in scheduler.due(&ledger, Local::now().naive_local()) {
                        println!("⏰ Reminder: {} ({}). Type \"done {}\" to tick it off.",
                            reminder.title, reminder.due_label(), reminder.title);
                    }
                }
            }
        }
        Ok(())
    })
}

fn web(command: WebCommand) -> Result<()> {
    let config = load_initialized_config()?;

    match command {
        WebCommand::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.web.bind_addr.clone());
            println!("web_status: starting");
            println!("bind: {bind}");
            println!("db: {}", config.db_path().display());
            runtime()?.block_on(async {
                let gateway = build_gateway(&config).await?;
                hearth_web::serve(&bind, gateway).await
            })?;
        }
    }
    Ok(())
}

fn telegram(command: TelegramCommand) -> Result<()> {
    let config = load_initialized_config()?;

    let token = std::env::var("TELEGRAM_BOT_TOKEN")
        .ok()
        .or(config.telegram.token.clone())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "telegram token missing: set TELEGRAM_BOT_TOKEN or config.telegram.token"
            )
        })?;
    let timeout = Duration::from_secs(config.telegram.poll_timeout_secs + 10);
    let client = TelegramClient::new(&token, timeout)?;

    runtime()?.block_on(async {
        match command {
            TelegramCommand::Status => {
                let me = client.get_me().await?;
                println!("telegram_status: ok");
                println!("bot_id: {}", me.id);
                println!("bot_username: {}", me.username.as_deref().unwrap_or("<none>"));
            }
            TelegramCommand::Run => {
                if !config.telegram.enabled {
                    anyhow::bail!(
                        "telegram is disabled: set telegram.enabled = true in the config"
                    );
                }
                let gateway = build_gateway(&config).await?;
                let mut bot = TelegramBot::new(client, gateway, &config.telegram);
                println!("telegram_status: polling");
                bot.run().await?;
            }
        }
        Ok(())
    })
}
