use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::StreakError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HabitType {
    Diet,
    Exercise,
}

impl HabitType {
    pub const ALL: [HabitType; 2] = [HabitType::Diet, HabitType::Exercise];

    pub fn as_str(self) -> &'static str {
        match self {
            HabitType::Diet => "diet",
            HabitType::Exercise => "exercise",
        }
    }
}

impl fmt::Display for HabitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HabitType {
    type Err = StreakError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "diet" => Ok(HabitType::Diet),
            "exercise" => Ok(HabitType::Exercise),
            other => Err(StreakError::Validation(format!(
                "unknown habit type '{other}', expected diet or exercise"
            ))),
        }
    }
}

/// Identifies one streak row: a user and one of their habits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreakKey {
    pub user_id: i64,
    pub habit: HabitType,
}

impl StreakKey {
    /// Validates raw boundary input before anything touches storage.
    pub fn parse(user_id: &str, habit: &str) -> Result<Self, StreakError> {
        let user_id = user_id
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|id| *id > 0)
            .ok_or_else(|| {
                StreakError::Validation(format!("user id '{user_id}' must be a positive integer"))
            })?;
        let habit = habit.trim().parse()?;
        Ok(Self { user_id, habit })
    }
}

impl fmt::Display for StreakKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.user_id, self.habit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakRecord {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_completed_date: Option<NaiveDate>,
}

impl StreakRecord {
    pub fn zero() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkStatus {
    Updated,
    AlreadyDone,
}

impl MarkStatus {
    pub fn message(self) -> &'static str {
        match self {
            MarkStatus::Updated => "Streak updated successfully!",
            MarkStatus::AlreadyDone => "Already completed today!",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkOutcome {
    pub record: StreakRecord,
    pub status: MarkStatus,
}

/// Response body shape shared by every boundary operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakView {
    #[serde(flatten)]
    pub record: StreakRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

impl StreakView {
    pub fn plain(record: StreakRecord) -> Self {
        Self {
            record,
            message: None,
        }
    }

    pub fn with_message(record: StreakRecord, message: &'static str) -> Self {
        Self {
            record,
            message: Some(message),
        }
    }
}

impl From<MarkOutcome> for StreakView {
    fn from(outcome: MarkOutcome) -> Self {
        Self::with_message(outcome.record, outcome.status.message())
    }
}

#[derive(Debug, Clone)]
pub struct Contact {
    pub user_id: i64,
    pub email: String,
    pub completed_today: Vec<HabitType>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub user_id: i64,
    pub email: String,
    pub subject: &'static str,
    pub body: &'static str,
}
