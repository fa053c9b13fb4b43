use anyhow::Context;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::error::StreakError;
use crate::models::{Contact, HabitType, StreakKey, StreakRecord};
use crate::reminder::{ReminderLedger, SweepSummary};
use crate::store::{StreakStore, WriteGuard};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool, today: NaiveDate) -> anyhow::Result<()> {
    let users = vec![
        (1_i64, "avery.lee@example.com"),
        (2_i64, "jules.moreno@example.com"),
        (3_i64, "kiara.patel@example.com"),
    ];

    for (id, email) in users {
        sqlx::query(
            r#"
            INSERT INTO nutritrack.users (id, email)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET email = EXCLUDED.email
            "#,
        )
        .bind(id)
        .bind(email)
        .execute(pool)
        .await?;
    }

    let streaks = vec![
        (1_i64, HabitType::Diet, 5, 7, Some(today - Duration::days(1))),
        (1_i64, HabitType::Exercise, 2, 2, Some(today)),
        (2_i64, HabitType::Diet, 3, 10, Some(today - Duration::days(4))),
        (3_i64, HabitType::Exercise, 0, 4, None),
    ];

    for (user_id, habit, current, longest, last_completed) in streaks {
        sqlx::query(
            r#"
            INSERT INTO nutritrack.user_streaks
            (user_id, habit_type, current_streak, longest_streak, last_completed_date)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, habit_type) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(habit.as_str())
        .bind(current)
        .bind(longest)
        .bind(last_completed)
        .execute(pool)
        .await?;
    }

    Ok(())
}

/// Postgres-backed [`StreakStore`].
#[derive(Debug, Clone)]
pub struct PgStreakStore {
    pool: PgPool,
}

impl PgStreakStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StreakStore for PgStreakStore {
    async fn get_or_create(&self, key: StreakKey) -> Result<StreakRecord, StreakError> {
        sqlx::query(
            r#"
            INSERT INTO nutritrack.user_streaks (user_id, habit_type)
            VALUES ($1, $2)
            ON CONFLICT (user_id, habit_type) DO NOTHING
            "#,
        )
        .bind(key.user_id)
        .bind(key.habit.as_str())
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(
            r#"
            SELECT current_streak, longest_streak, last_completed_date
            FROM nutritrack.user_streaks
            WHERE user_id = $1 AND habit_type = $2
            "#,
        )
        .bind(key.user_id)
        .bind(key.habit.as_str())
        .fetch_one(&self.pool)
        .await?;

        record_from_row(key, &row)
    }

    async fn write(
        &self,
        key: StreakKey,
        record: &StreakRecord,
        guard: WriteGuard,
    ) -> Result<(), StreakError> {
        let (unconditional, expected) = match guard {
            WriteGuard::Any => (true, None),
            WriteGuard::LastCompleted(expected) => (false, expected),
        };

        let result = sqlx::query(
            r#"
            INSERT INTO nutritrack.user_streaks AS s
            (user_id, habit_type, current_streak, longest_streak, last_completed_date)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, habit_type) DO UPDATE
            SET current_streak = EXCLUDED.current_streak,
                longest_streak = EXCLUDED.longest_streak,
                last_completed_date = EXCLUDED.last_completed_date,
                updated_at = now()
            WHERE $6 OR s.last_completed_date IS NOT DISTINCT FROM $7
            "#,
        )
        .bind(key.user_id)
        .bind(key.habit.as_str())
        .bind(to_column(key, record.current_streak)?)
        .bind(to_column(key, record.longest_streak)?)
        .bind(record.last_completed_date)
        .bind(unconditional)
        .bind(expected)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StreakError::Conflict { key });
        }

        Ok(())
    }
}

fn record_from_row(key: StreakKey, row: &PgRow) -> Result<StreakRecord, StreakError> {
    let current: i32 = row.try_get("current_streak")?;
    let longest: i32 = row.try_get("longest_streak")?;
    Ok(StreakRecord {
        current_streak: from_column(key, "current_streak", current)?,
        longest_streak: from_column(key, "longest_streak", longest)?,
        last_completed_date: row.try_get("last_completed_date")?,
    })
}

fn from_column(key: StreakKey, column: &str, value: i32) -> Result<u32, StreakError> {
    u32::try_from(value).map_err(|_| StreakError::CorruptRow {
        key,
        detail: format!("{column} is negative ({value})"),
    })
}

fn to_column(key: StreakKey, value: u32) -> Result<i32, StreakError> {
    i32::try_from(value).map_err(|_| StreakError::CorruptRow {
        key,
        detail: format!("streak length {value} exceeds the column range"),
    })
}

/// Postgres-backed [`ReminderLedger`] over `users`, `user_streaks` and `reminder_runs`.
#[derive(Debug, Clone)]
pub struct PgReminderLedger {
    pool: PgPool,
}

impl PgReminderLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReminderLedger for PgReminderLedger {
    async fn contacts(&self, day: NaiveDate) -> anyhow::Result<Vec<Contact>> {
        let rows = sqlx::query(
            r#"
            SELECT u.id, u.email,
                   COALESCE(
                       array_agg(s.habit_type) FILTER (WHERE s.last_completed_date = $1),
                       ARRAY[]::TEXT[]
                   ) AS completed
            FROM nutritrack.users u
            LEFT JOIN nutritrack.user_streaks s ON s.user_id = u.id
            GROUP BY u.id, u.email
            ORDER BY u.id
            "#,
        )
        .bind(day)
        .fetch_all(&self.pool)
        .await
        .context("failed to load reminder contacts")?;

        let mut contacts = Vec::with_capacity(rows.len());
        for row in rows {
            let completed: Vec<String> = row.get("completed");
            let completed_today = completed
                .iter()
                .map(|habit| habit.parse::<HabitType>())
                .collect::<Result<Vec<_>, _>>()?;

            contacts.push(Contact {
                user_id: row.get("id"),
                email: row.get("email"),
                completed_today,
            });
        }

        Ok(contacts)
    }

    async fn claim(&self, day: NaiveDate) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO nutritrack.reminder_runs (run_date)
            VALUES ($1)
            ON CONFLICT (run_date) DO NOTHING
            "#,
        )
        .bind(day)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn finish(&self, day: NaiveDate, summary: SweepSummary) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE nutritrack.reminder_runs
            SET sent_count = $2, failed_count = $3
            WHERE run_date = $1
            "#,
        )
        .bind(day)
        .bind(i32::try_from(summary.sent)?)
        .bind(i32::try_from(summary.failed)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
