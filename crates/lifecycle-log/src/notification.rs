//! Notification bookkeeping.
//!
//! Only whether a notification was attempted and whether it succeeded is
//! recorded here; delivery itself happens elsewhere. Attempts are appended
//! to their own ledger so lifecycle events stay immutable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Channel a notification is sent through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    Email,
    Sms,
    Push,
}

impl NotificationChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationChannel::Email => "email",
            NotificationChannel::Sms => "sms",
            NotificationChannel::Push => "push",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "email" => Some(NotificationChannel::Email),
            "sms" => Some(NotificationChannel::Sms),
            "push" => Some(NotificationChannel::Push),
            _ => None,
        }
    }
}

impl std::fmt::Display for NotificationChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One notification attempt, as appended to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationOutcome {
    pub succeeded: bool,
    pub attempted_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl NotificationOutcome {
    pub fn delivered() -> Self {
        Self {
            succeeded: true,
            attempted_at: Utc::now(),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            attempted_at: Utc::now(),
            error: Some(error.into()),
        }
    }
}

/// Per-channel view of the latest attempt, attached to events on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub attempted: bool,
    pub succeeded: bool,
    pub attempted_at: Option<DateTime<Utc>>,
}

impl From<&NotificationOutcome> for NotificationRecord {
    fn from(outcome: &NotificationOutcome) -> Self {
        Self {
            attempted: true,
            succeeded: outcome.succeeded,
            attempted_at: Some(outcome.attempted_at),
        }
    }
}
