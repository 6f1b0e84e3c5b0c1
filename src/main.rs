//! XAU/USD Trading Assistant Notification Bot
//!
//! Daemon entry point: wires the Telegram transport, subscriber store,
//! command surface and scheduling loop together.

use clap::{Parser, Subcommand};
use goldwatch_bot::{
    commands::CommandRouter,
    config::Config,
    dispatch::Dispatcher,
    producers::{AnalysisClient, ProducerSet},
    scheduler::{Scheduler, DEFAULT_MAX_RETRIES},
    store::SubscriberStore,
    telegram::{TelegramApi, UpdateListener},
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "goldwatch-bot")]
#[command(about = "XAU/USD trading assistant notification bot")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the notification daemon
    Run,
    /// List registered subscribers
    Users,
    /// Send a test notification to every registered chat
    TestNotify,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Run => run_daemon(config).await,
        Commands::Users => list_users(config),
        Commands::TestNotify => test_notify(config).await,
    }
}

async fn run_daemon(config: Config) -> anyhow::Result<()> {
    tracing::info!("Starting XAU/USD notification bot");

    std::fs::create_dir_all(&config.data_dir)?;

    let store = Arc::new(SubscriberStore::load(config.users_file()));
    let api = Arc::new(TelegramApi::new(config.bot_token.clone()));
    let dispatcher = Arc::new(Dispatcher::new(api.clone()));
    let analysis = Arc::new(AnalysisClient::new(config.analysis_base_url.clone()));
    let producers = ProducerSet::from_client(analysis);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Inbound commands
    let router = Arc::new(CommandRouter::new(
        store.clone(),
        dispatcher.clone(),
        producers.clone(),
    ));
    let listener = Arc::new(UpdateListener::new(api, router));
    {
        let listener = listener.clone();
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            listener.start_polling(shutdown).await;
        });
    }
    tracing::info!("Telegram command listener started");

    // Ctrl-C flips the shutdown flag; the scheduler finishes its in-flight
    // cycle before returning
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Stop signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    let scheduler = Scheduler::new(
        store,
        dispatcher,
        producers.checks.clone(),
        producers.reports.clone(),
        config.check_interval(),
        config.eod_report_time.clone(),
        shutdown_rx,
    );

    scheduler.run_supervised(DEFAULT_MAX_RETRIES).await?;
    Ok(())
}

fn list_users(config: Config) -> anyhow::Result<()> {
    let store = SubscriberStore::load(config.users_file());
    let users = store.all();

    if users.is_empty() {
        println!("No registered subscribers.");
        return Ok(());
    }

    println!("\n👥 {} registered subscriber(s):\n", users.len());
    for user in users {
        println!(
            "{:>12}  {:<20}  since {}  [price {} | signal {} | news {} | eod {}]",
            user.chat_id,
            user.username.as_deref().unwrap_or("-"),
            user.registered_at.format("%Y-%m-%d"),
            on_off(user.settings.price_alerts),
            on_off(user.settings.signal_alerts),
            on_off(user.settings.news_alerts),
            on_off(user.settings.eod_reports),
        );
    }
    Ok(())
}

async fn test_notify(config: Config) -> anyhow::Result<()> {
    let store = SubscriberStore::load(config.users_file());
    let chat_ids: Vec<i64> = store.all().iter().map(|u| u.chat_id).collect();

    if chat_ids.is_empty() {
        println!("No registered subscribers to notify.");
        return Ok(());
    }

    let api = Arc::new(TelegramApi::new(config.bot_token.clone()));
    let dispatcher = Dispatcher::new(api);
    let report = dispatcher
        .deliver_text(
            &chat_ids,
            "🧪 Test notification\n\nIf you see this, Telegram delivery is working!",
        )
        .await;

    println!(
        "✅ Sent to {}/{} subscriber(s)",
        report.success_count,
        chat_ids.len()
    );
    for failure in &report.failures {
        println!("  ❌ chat {}: {}", failure.chat_id, failure.cause);
    }
    Ok(())
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}
