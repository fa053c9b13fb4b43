use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::StreakError;
use crate::models::{MarkOutcome, MarkStatus, StreakKey, StreakRecord};
use crate::store::{StreakStore, WriteGuard};
use crate::streak::{self, Decision};
use crate::week::{self, WeekView};

pub struct StreakService<S, C> {
    store: S,
    clock: C,
    max_attempts: u32,
}

impl<S: StreakStore, C: Clock> StreakService<S, C> {
    pub fn new(store: S, clock: C, max_attempts: u32) -> Self {
        Self {
            store,
            clock,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Current state for `key`.
    ///
    /// Not read-only: the first lookup of a key persists its zero record.
    pub async fn get_streak(&self, key: StreakKey) -> Result<StreakRecord, StreakError> {
        self.store.get_or_create(key).await
    }

    /// Records today's completion, at most once per canonical day.
    ///
    /// A lost race on the conditional write re-runs the whole
    /// read-decide-write sequence, so concurrent calls apply one increment.
    pub async fn mark_done(&self, key: StreakKey) -> Result<MarkOutcome, StreakError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_mark_done(key).await {
                Err(StreakError::Conflict { .. }) if attempt >= self.max_attempts => {
                    return Err(StreakError::RetriesExhausted {
                        key,
                        attempts: attempt,
                    });
                }
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    warn!(user_id = key.user_id, habit = %key.habit, attempt, error = %err, "retrying streak update");
                }
                result => return result,
            }
        }
    }

    async fn try_mark_done(&self, key: StreakKey) -> Result<MarkOutcome, StreakError> {
        let today = self.clock.today();
        let record = self.store.get_or_create(key).await?;

        match streak::evaluate(today, &record) {
            Decision::AlreadyDone => {
                debug!(user_id = key.user_id, habit = %key.habit, %today, "habit already completed today");
                Ok(MarkOutcome {
                    record,
                    status: MarkStatus::AlreadyDone,
                })
            }
            Decision::Advance(next) => {
                self.store
                    .write(key, &next, WriteGuard::LastCompleted(record.last_completed_date))
                    .await?;
                info!(
                    user_id = key.user_id,
                    habit = %key.habit,
                    current = next.current_streak,
                    longest = next.longest_streak,
                    "streak updated"
                );
                Ok(MarkOutcome {
                    record: next,
                    status: MarkStatus::Updated,
                })
            }
        }
    }

    /// Zeroes the streak regardless of its current state.
    pub async fn reset(&self, key: StreakKey) -> Result<StreakRecord, StreakError> {
        let zero = StreakRecord::zero();
        self.store.write(key, &zero, WriteGuard::Any).await?;
        info!(user_id = key.user_id, habit = %key.habit, "streak reset");
        Ok(zero)
    }

    /// Monday-to-Sunday view of the current week, judged by the same clock as `mark_done`.
    pub async fn week(&self, key: StreakKey) -> Result<WeekView, StreakError> {
        let record = self.store.get_or_create(key).await?;
        Ok(week::week_view(&record, self.clock.today()))
    }
}
