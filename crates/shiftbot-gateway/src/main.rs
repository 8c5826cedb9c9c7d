use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use shiftbot_core::config::ShiftbotConfig;
use shiftbot_scheduler::{DispatchScheduler, DispatchSettings};
use shiftbot_telegram::{TelegramAdapter, TelegramTransport};

mod app;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("SHIFTBOT_GIT_SHA"), ")");

#[derive(Parser)]
#[command(name = "shiftbot", version = VERSION, about = "Shift report bot for Telegram")]
struct Cli {
    /// Config file (default: SHIFTBOT_CONFIG, then ~/.shiftbot/shiftbot.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the bot and the dispatch scheduler (default)
    Run,
    /// Print the shift on duty at an instant (default: now)
    Shift {
        /// RFC 3339 instant, e.g. 2024-10-27T02:30:00+01:00
        #[arg(long, value_parser = parse_instant)]
        at: Option<DateTime<Utc>>,
    },
    /// Print the next scheduled dispatch after an instant (default: now)
    NextFire {
        #[arg(long, value_parser = parse_instant)]
        from: Option<DateTime<Utc>>,
    },
}

fn parse_instant(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 instant: {e}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "shiftbot=info,shiftbot_core=info,shiftbot_store=info,shiftbot_scheduler=info,shiftbot_telegram=info".into()
            }),
        )
        .init();

    let cli = Cli::parse();
    let config = ShiftbotConfig::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::Shift { at } => {
            let status = app::shift_status(&config, at.unwrap_or_else(Utc::now))?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
        Command::NextFire { from } => {
            match app::next_fire(&config, from.unwrap_or_else(Utc::now))? {
                Some((local, utc)) => println!("{local} ({utc})"),
                None => println!("no dispatch times configured"),
            }
            Ok(())
        }
    }
}

async fn run(config: ShiftbotConfig) -> anyhow::Result<()> {
    config.validate()?;
    info!(version = VERSION, "starting shiftbot");

    let state = app::AppState::open(config)?;
    let adapter = TelegramAdapter::new(&state.config.telegram, Arc::new(state.bot_context()))?;

    let transport = Arc::new(TelegramTransport::new(adapter.bot()));
    let scheduler = DispatchScheduler::new(
        state.dispatch_deps(transport),
        state.schedule.clone(),
        DispatchSettings::from_config(&state.config.dispatch),
    );
    if let Some(next) = scheduler.next_fire() {
        info!(next = %next, "first dispatch");
    }

    // spawn scheduler loop in background; stopped once the dispatcher returns
    let cancel = CancellationToken::new();
    let scheduler_task = tokio::spawn(scheduler.run(cancel.clone()));

    let result = adapter.run().await;

    cancel.cancel();
    if let Err(e) = scheduler_task.await {
        error!("scheduler task failed: {e}");
    }
    info!("shiftbot stopped");
    Ok(result?)
}
