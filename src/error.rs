use thiserror::Error;

use crate::models::StreakKey;

// Postgres SQLSTATE for foreign_key_violation.
const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Debug, Error)]
pub enum StreakError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(#[source] sqlx::Error),

    #[error("streak {key} was modified concurrently")]
    Conflict { key: StreakKey },

    #[error("stored streak {key} is corrupt: {detail}")]
    CorruptRow { key: StreakKey, detail: String },

    #[error("streak {key} is still contended after {attempts} attempts")]
    RetriesExhausted { key: StreakKey, attempts: u32 },
}

impl StreakError {
    /// Whether re-running the whole read-decide-write sequence may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StreakError::Conflict { .. } | StreakError::Storage(_))
    }
}

impl From<sqlx::Error> for StreakError {
    fn from(err: sqlx::Error) -> Self {
        let unknown_user = err
            .as_database_error()
            .and_then(|db| db.code())
            .is_some_and(|code| code == FOREIGN_KEY_VIOLATION);
        if unknown_user {
            StreakError::Validation("user is not registered".to_string())
        } else {
            StreakError::Storage(err)
        }
    }
}

#[derive(Debug, Error)]
pub enum ReminderError {
    #[error("invalid address '{address}': {source}")]
    Address {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },

    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("smtp delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("outbox write failed: {0}")]
    Outbox(#[from] csv::Error),

    #[error("outbox lock poisoned")]
    OutboxPoisoned,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be set")]
    Missing { name: &'static str },

    #[error("{name} has invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}
