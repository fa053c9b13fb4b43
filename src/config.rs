use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{FixedOffset, Offset, Utc};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct ReminderConfig {
    pub schedule: String,
    pub from: String,
    pub smtp: Option<SmtpConfig>,
    pub outbox: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub utc_offset: FixedOffset,
    pub write_attempts: u32,
    pub log_format: LogFormat,
    pub reminder: ReminderConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing {
            name: "DATABASE_URL",
        })?;
        let max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5)?;
        let write_attempts = parse_or(&lookup, "STREAK_WRITE_ATTEMPTS", 3)?;
        if write_attempts == 0 {
            return Err(invalid("STREAK_WRITE_ATTEMPTS", "0", "must be at least 1"));
        }

        let utc_offset = match lookup("STREAK_UTC_OFFSET") {
            Some(value) => parse_utc_offset(&value)
                .ok_or_else(|| invalid("STREAK_UTC_OFFSET", &value, "expected ±HH:MM"))?,
            None => Utc.fix(),
        };

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => return Err(invalid("LOG_FORMAT", other, "expected pretty or json")),
        };

        let smtp = match lookup("SMTP_HOST") {
            Some(host) => Some(SmtpConfig {
                host,
                username: lookup("SMTP_USERNAME").ok_or(ConfigError::Missing {
                    name: "SMTP_USERNAME",
                })?,
                password: lookup("SMTP_PASSWORD").ok_or(ConfigError::Missing {
                    name: "SMTP_PASSWORD",
                })?,
            }),
            None => None,
        };
        let from = match (lookup("REMINDER_FROM"), &smtp) {
            (Some(from), _) => from,
            (None, Some(smtp)) => smtp.username.clone(),
            (None, None) => "reminders@localhost".to_string(),
        };

        Ok(Self {
            database_url,
            max_connections,
            utc_offset,
            write_attempts,
            log_format,
            reminder: ReminderConfig {
                schedule: lookup("REMINDER_SCHEDULE")
                    .unwrap_or_else(|| "0 0 9 * * *".to_string()),
                from,
                smtp,
                outbox: lookup("REMINDER_OUTBOX")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("reminders-outbox.csv")),
            },
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|err: T::Err| invalid(name, &value, &err.to_string())),
        None => Ok(default),
    }
}

fn invalid(name: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Parses `+HH:MM`, `-HH:MM` or `Z` into a fixed offset.
pub fn parse_utc_offset(value: &str) -> Option<FixedOffset> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("z") {
        return Some(Utc.fix());
    }

    let (sign, rest) = match value.as_bytes().first()? {
        b'+' => (1, &value[1..]),
        b'-' => (-1, &value[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':')?;
    let two_digits = |part: &str| part.len() == 2 && part.bytes().all(|b| b.is_ascii_digit());
    if !two_digits(hours) || !two_digits(minutes) {
        return None;
    }
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 14 || minutes >= 60 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn parses_offsets() {
        assert_eq!(parse_utc_offset("+05:30").unwrap().local_minus_utc(), 19_800);
        assert_eq!(parse_utc_offset("-08:00").unwrap().local_minus_utc(), -28_800);
        assert_eq!(parse_utc_offset("Z").unwrap().local_minus_utc(), 0);
        assert!(parse_utc_offset("05:30").is_none());
        assert!(parse_utc_offset("+5:30").is_none());
        assert!(parse_utc_offset("+15:00").is_none());
        assert!(parse_utc_offset("+01:75").is_none());
        assert!(parse_utc_offset("+-1:00").is_none());
        assert!(parse_utc_offset("+01:-5").is_none());
        assert!(parse_utc_offset("++1:00").is_none());
    }

    #[test]
    fn defaults_apply_with_only_database_url() {
        let config = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://x")])).unwrap();

        assert_eq!(config.max_connections, 5);
        assert_eq!(config.write_attempts, 3);
        assert_eq!(config.utc_offset.local_minus_utc(), 0);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.reminder.schedule, "0 0 9 * * *");
        assert!(config.reminder.smtp.is_none());
        assert_eq!(config.reminder.outbox, PathBuf::from("reminders-outbox.csv"));
    }

    #[test]
    fn missing_database_url_is_reported() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { name: "DATABASE_URL" }));
    }

    #[test]
    fn rejects_bad_values() {
        for (name, value) in [
            ("STREAK_UTC_OFFSET", "IST"),
            ("STREAK_UTC_OFFSET", "+-1:00"),
            ("STREAK_WRITE_ATTEMPTS", "0"),
            ("DATABASE_MAX_CONNECTIONS", "many"),
            ("LOG_FORMAT", "xml"),
        ] {
            let result =
                Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://x"), (name, value)]));
            assert!(
                matches!(result, Err(ConfigError::Invalid { .. })),
                "{name}={value} should be rejected"
            );
        }
    }

    #[test]
    fn smtp_requires_credentials_and_defaults_sender() {
        let partial = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("SMTP_HOST", "smtp.gmail.com"),
        ]));
        assert!(matches!(
            partial,
            Err(ConfigError::Missing { name: "SMTP_USERNAME" })
        ));

        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("SMTP_HOST", "smtp.gmail.com"),
            ("SMTP_USERNAME", "coach@example.com"),
            ("SMTP_PASSWORD", "secret"),
        ]))
        .unwrap();
        assert_eq!(config.reminder.from, "coach@example.com");
    }
}
