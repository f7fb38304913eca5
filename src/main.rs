use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;

use cistbot::application::errors::{BotError, ConfigError};
use cistbot::application::messaging::ChatWorkers;
use cistbot::application::services::MessageService;
use cistbot::domain::entities::{Message, User, UserId};
use cistbot::domain::traits::Bot;
use cistbot::infrastructure::adapters::{ConsoleAdapter, TelegramAdapter};
use cistbot::infrastructure::config::{Config, DEFAULT_ADMIN};

#[derive(Parser)]
#[command(name = "cistbot")]
#[command(about = "A chat assistant with intents, access tiers and guided conversations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Bot token (overrides config and BOT_TOKEN)
    #[arg(short, long)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot
    Run {
        /// Chat on stdin/stdout instead of Telegram
        #[arg(long)]
        console: bool,

        /// User id the console session speaks as (default: first admin)
        #[arg(long)]
        user_id: Option<UserId>,
    },
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { console, user_id } => {
            if let Err(e) = run_bot(&cli.config, cli.token, console, user_id) {
                tracing::error!("{}", e);
                std::process::exit(1);
            }
        }
        Commands::Version => {
            println!("cistbot v{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::InitConfig => {
            init_config();
        }
    }
}

fn load_config(config_path: &str, token_override: Option<String>) -> Result<Config, ConfigError> {
    let mut config = if std::path::Path::new(config_path).exists() {
        Config::load(config_path)?
    } else {
        tracing::error!("Config {} not found, using defaults", config_path);
        Config::default()
    };

    config.apply_env();
    if let Some(token) = token_override {
        config.telegram.token = Some(token);
    }
    Ok(config)
}

fn run_bot(
    config_path: &str,
    token_override: Option<String>,
    console: bool,
    user_id: Option<UserId>,
) -> Result<(), BotError> {
    let config = load_config(config_path, token_override)?;
    tracing::info!("Starting cistbot: {}", config.bot.name);

    if config.telegram.token.is_some() && !console && config.has_placeholder_admins() {
        return Err(BotError::Configuration(format!(
            "Refusing to serve Telegram with the placeholder admin {}; set auth.admins in {} (see `cistbot init-config`)",
            DEFAULT_ADMIN, config_path
        )));
    }

    let rt = tokio::runtime::Runtime::new().map_err(|e| BotError::Internal(e.to_string()))?;

    match config.telegram.token.clone() {
        Some(token) if !console => rt.block_on(run_telegram_bot(config, token)),
        _ => {
            if !console {
                tracing::info!("No Telegram token configured, falling back to console");
            }
            let user_id = user_id.or_else(|| config.auth.admins.first().copied()).unwrap_or_default();
            rt.block_on(run_console_bot(config, user_id))
        }
    }
}

async fn run_telegram_bot(config: Config, token: String) -> Result<(), BotError> {
    let mut bot = TelegramAdapter::new(token);
    bot.fetch_bot_info().await?;

    let info = bot.bot_info();
    tracing::info!("Bot started: @{}", info.username);

    let dispatcher = Arc::new(config.build_dispatcher(Some(&info.username))?);

    // Register bot commands with Telegram
    if let Err(e) = bot.register_commands(dispatcher.registry(), &config.bot.command_prefix).await {
        tracing::warn!("Failed to register commands: {}", e);
    }

    bot.start().await?;
    let service = Arc::new(MessageService::new(bot.clone(), dispatcher));
    let mut workers = ChatWorkers::new(service);

    let initial = Duration::from_secs(config.telegram.retry_initial_secs.max(1));
    let max = Duration::from_secs(config.telegram.retry_max_secs).max(initial);
    let mut delay = initial;
    let mut offset: i64 = 0;

    tracing::info!("Starting message loop...");

    loop {
        let polled = tokio::select! {
            polled = bot.get_updates(offset, config.telegram.poll_timeout_secs) => polled,
            _ = tokio::signal::ctrl_c() => break,
        };

        match polled {
            Ok(updates) => {
                delay = initial;
                if !updates.is_empty() {
                    tracing::debug!("Received {} updates", updates.len());
                }
                for update in &updates {
                    if let Some(message) = update.to_message() {
                        workers.try_submit(message);
                    }
                }
                offset = TelegramAdapter::get_next_offset(&updates, offset);
            }
            Err(e) => {
                tracing::error!("Failed to get updates: {} (retrying in {:?})", e, delay);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = tokio::signal::ctrl_c() => break,
                }
                delay = (delay * 2).min(max);
            }
        }
    }

    tracing::info!("Shutting down, draining {} chat queues", workers.active_chats());
    workers.shutdown().await;
    Ok(())
}

async fn run_console_bot(config: Config, user_id: UserId) -> Result<(), BotError> {
    let dispatcher = Arc::new(config.build_dispatcher(None)?);
    let bot = ConsoleAdapter::new();
    bot.start().await?;

    let tier = dispatcher.auth().access_tier(user_id);
    println!("cistbot console (user {}, tier {}). Ctrl-D to quit.", user_id, tier);

    let service = MessageService::new(bot, dispatcher);
    let sender = User::new(user_id).with_username("console");
    let mut lines = ConsoleAdapter::input();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => return Err(BotError::Internal(format!("Failed to read stdin: {}", e))),
        };
        if line.trim().is_empty() {
            continue;
        }

        let message = Message::from_text(user_id, sender.clone(), line).with_platform("console");
        if let Some(id) = service.process(message).await? {
            tracing::debug!("Delivered {}", id);
        }
    }

    Ok(())
}

fn init_config() {
    match Config::default().to_yaml() {
        Ok(yaml) => println!("{}", yaml),
        Err(e) => {
            eprintln!("Failed to render config: {}", e);
            std::process::exit(1);
        }
    }
}
