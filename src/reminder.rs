use std::fs::OpenOptions;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Serialize;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::clock::{Clock, ReferenceClock};
use crate::config::SmtpConfig;
use crate::error::ReminderError;
use crate::models::{Contact, HabitType, Reminder};

const SUBJECT: &str = "Your Daily Streak Reminder";
const BODY: &str = "Don't forget to complete today's challenge!";

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, reminder: &Reminder) -> Result<(), ReminderError>;
}

pub struct SmtpNotifier {
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpNotifier {
    pub fn new(from: &str, smtp: &SmtpConfig) -> Result<Self, ReminderError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)?
            .credentials(Credentials::new(
                smtp.username.clone(),
                smtp.password.clone(),
            ))
            .build();
        Ok(Self {
            from: parse_mailbox(from)?,
            transport,
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, reminder: &Reminder) -> Result<(), ReminderError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(&reminder.email)?)
            .subject(reminder.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(reminder.body.to_string())?;
        self.transport.send(message).await?;
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, ReminderError> {
    address.parse().map_err(|source| ReminderError::Address {
        address: address.to_string(),
        source,
    })
}

#[derive(Debug, Serialize)]
struct OutboxRow<'a> {
    message_id: Uuid,
    queued_at: String,
    user_id: i64,
    email: &'a str,
    subject: &'a str,
    body: &'a str,
}

/// Appends reminders to a CSV file for delivery by an external mailer.
pub struct CsvOutbox {
    writer: Mutex<csv::Writer<std::fs::File>>,
}

impl CsvOutbox {
    pub fn open(path: &Path) -> Result<Self, ReminderError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(csv::Error::from)?;
        let empty = file.metadata().map_err(csv::Error::from)?.len() == 0;
        let writer = csv::WriterBuilder::new()
            .has_headers(empty)
            .from_writer(file);
        Ok(Self {
            writer: Mutex::new(writer),
        })
    }
}

#[async_trait]
impl Notifier for CsvOutbox {
    async fn send(&self, reminder: &Reminder) -> Result<(), ReminderError> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| ReminderError::OutboxPoisoned)?;
        writer.serialize(OutboxRow {
            message_id: Uuid::new_v4(),
            queued_at: Utc::now().to_rfc3339(),
            user_id: reminder.user_id,
            email: &reminder.email,
            subject: reminder.subject,
            body: reminder.body,
        })?;
        writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }
}

/// A reminder is due unless the user has already completed every habit today.
pub fn plan_reminders(contacts: &[Contact]) -> Vec<Reminder> {
    contacts
        .iter()
        .filter(|contact| {
            !HabitType::ALL
                .iter()
                .all(|habit| contact.completed_today.contains(habit))
        })
        .map(|contact| Reminder {
            user_id: contact.user_id,
            email: contact.email.clone(),
            subject: SUBJECT,
            body: BODY,
        })
        .collect()
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    pub sent: usize,
    pub failed: usize,
}

/// Sends every reminder; one recipient failing does not stop the rest.
pub async fn dispatch(notifier: &dyn Notifier, reminders: &[Reminder]) -> SweepSummary {
    let mut summary = SweepSummary::default();

    for reminder in reminders {
        match notifier.send(reminder).await {
            Ok(()) => summary.sent += 1,
            Err(err) => {
                warn!(user_id = reminder.user_id, email = %reminder.email, error = %err, "failed to send reminder");
                summary.failed += 1;
            }
        }
    }

    summary
}

/// Persistence the daily sweep needs: who to remind, and a once-per-day claim.
#[async_trait]
pub trait ReminderLedger: Send + Sync {
    /// Every registered user with the habits they have already completed on `day`.
    async fn contacts(&self, day: NaiveDate) -> anyhow::Result<Vec<Contact>>;

    /// Claims `day` for this run. Returns false when another run already has it.
    async fn claim(&self, day: NaiveDate) -> anyhow::Result<bool>;

    async fn finish(&self, day: NaiveDate, summary: SweepSummary) -> anyhow::Result<()>;
}

/// Runs the sweep for the clock's current day, unless that day was already claimed.
///
/// Contacts are loaded before the claim, so a failed lookup leaves the day open
/// for the next attempt.
pub async fn run_sweep(
    ledger: &dyn ReminderLedger,
    clock: &dyn Clock,
    notifier: &dyn Notifier,
) -> anyhow::Result<Option<SweepSummary>> {
    let today = clock.today();
    let contacts = ledger.contacts(today).await?;
    if !ledger.claim(today).await? {
        info!(%today, "reminder sweep already ran today");
        return Ok(None);
    }

    let reminders = plan_reminders(&contacts);
    info!(%today, users = contacts.len(), due = reminders.len(), "running daily reminder sweep");

    let summary = dispatch(notifier, &reminders).await;
    ledger.finish(today, summary).await?;
    info!(%today, sent = summary.sent, failed = summary.failed, "reminder sweep finished");

    Ok(Some(summary))
}

/// Runs the sweep on `schedule` (six-field cron in the clock's offset) until Ctrl-C.
pub async fn watch(
    ledger: Arc<dyn ReminderLedger>,
    clock: ReferenceClock,
    notifier: Arc<dyn Notifier>,
    schedule: &str,
) -> anyhow::Result<()> {
    let mut scheduler = JobScheduler::new().await?;
    let job = Job::new_async_tz(schedule, clock.offset(), move |job_id, _| {
        let ledger = Arc::clone(&ledger);
        let notifier = Arc::clone(&notifier);
        Box::pin(async move {
            if let Err(err) = run_sweep(ledger.as_ref(), &clock, notifier.as_ref()).await {
                error!(%job_id, error = %err, "reminder sweep failed");
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;
    info!(schedule, "reminder scheduler started");

    tokio::signal::ctrl_c().await?;
    scheduler.shutdown().await?;
    info!("reminder scheduler stopped");
    Ok(())
}
