use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;

mod clock;
mod config;
mod db;
mod error;
mod logging;
mod models;
mod reminder;
mod service;
mod store;
mod streak;
mod week;

use crate::clock::{Clock, ReferenceClock};
use crate::config::Config;
use crate::db::{PgReminderLedger, PgStreakStore};
use crate::models::{StreakKey, StreakView};
use crate::reminder::{CsvOutbox, Notifier, SmtpNotifier};
use crate::service::StreakService;

#[derive(Parser)]
#[command(name = "habit-streaks")]
#[command(about = "Daily diet and exercise streak tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Target {
    /// Numeric user id issued by the identity service
    #[arg(long)]
    user: String,
    /// Habit to track: diet or exercise
    #[arg(long)]
    habit: String,
}

impl Target {
    fn key(&self) -> anyhow::Result<StreakKey> {
        Ok(StreakKey::parse(&self.user, &self.habit)?)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load demo users and streaks
    Seed,
    /// Print the current streak (creates an empty one on first use)
    Show(Target),
    /// Mark today's habit as completed
    Done(Target),
    /// Reset a streak to zero
    Reset(Target),
    /// Show this week's completed days
    Week(Target),
    /// Send the daily reminder emails
    Remind {
        /// Keep running and send on the configured schedule
        #[arg(long)]
        watch: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env().context("invalid configuration")?;
    logging::init(config.log_format)?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;

    let clock = ReferenceClock::new(config.utc_offset);
    let streaks = StreakService::new(
        PgStreakStore::new(pool.clone()),
        clock,
        config.write_attempts,
    );

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool, clock.today()).await?;
            println!("Seed data inserted.");
        }
        Commands::Show(target) => {
            let record = streaks.get_streak(target.key()?).await?;
            print_json(&StreakView::plain(record))?;
        }
        Commands::Done(target) => {
            let outcome = streaks.mark_done(target.key()?).await?;
            print_json(&StreakView::from(outcome))?;
        }
        Commands::Reset(target) => {
            let record = streaks.reset(target.key()?).await?;
            print_json(&StreakView::with_message(
                record,
                "Streak reset successfully!",
            ))?;
        }
        Commands::Week(target) => {
            let key = target.key()?;
            let view = streaks.week(key).await?;
            let title = format!("Weekly progress: {}", key.habit);
            print!("{}", week::render_week(&title, &view));
        }
        Commands::Remind { watch } => {
            let notifier = build_notifier(&config)?;
            let ledger = Arc::new(PgReminderLedger::new(pool));
            if watch {
                reminder::watch(ledger, clock, notifier, &config.reminder.schedule).await?;
            } else {
                match reminder::run_sweep(ledger.as_ref(), &clock, notifier.as_ref()).await? {
                    Some(summary) => println!(
                        "Sent {} reminders ({} failed).",
                        summary.sent, summary.failed
                    ),
                    None => println!("Reminders already sent today."),
                }
            }
        }
    }

    Ok(())
}

fn build_notifier(config: &Config) -> anyhow::Result<Arc<dyn Notifier>> {
    let reminder = &config.reminder;
    let notifier: Arc<dyn Notifier> = match &reminder.smtp {
        Some(smtp) => Arc::new(
            SmtpNotifier::new(&reminder.from, smtp).context("failed to set up SMTP transport")?,
        ),
        None => Arc::new(CsvOutbox::open(&reminder.outbox).with_context(|| {
            format!("failed to open outbox {}", reminder.outbox.display())
        })?),
    };
    Ok(notifier)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
