use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::StreakError;
use crate::models::{StreakKey, StreakRecord};

/// Precondition attached to a streak write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteGuard {
    /// Overwrite whatever is stored.
    Any,
    /// Apply only if the stored `last_completed_date` still equals this value,
    /// otherwise fail with [`StreakError::Conflict`].
    LastCompleted(Option<NaiveDate>),
}

#[async_trait]
pub trait StreakStore: Send + Sync {
    /// Returns the stored record, persisting a zero record first if the key has none.
    async fn get_or_create(&self, key: StreakKey) -> Result<StreakRecord, StreakError>;

    /// Upserts all mutable fields for `key` in one atomic step.
    async fn write(
        &self,
        key: StreakKey,
        record: &StreakRecord,
        guard: WriteGuard,
    ) -> Result<(), StreakError>;
}
