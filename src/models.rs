//! Data models shared by the pipeline stages
//!
//! Landed rows stay opaque text until the database casts them, so the only
//! typed record here is the reporting row read back from the dbt view.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::config::AppConfig;
use crate::schema::{self, TableDef};

/// The two spreadsheet exports the pipeline lands and loads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    /// WhatsApp messages export
    Messages,
    /// Delivery statuses export
    Statuses,
}

impl Dataset {
    /// Both datasets in fetch order
    pub const ALL: [Self; 2] = [Self::Messages, Self::Statuses];

    /// Destination table definition
    #[must_use]
    pub const fn table(self) -> TableDef {
        match self {
            Self::Messages => schema::messages::DEF,
            Self::Statuses => schema::statuses::DEF,
        }
    }

    /// Landed file prefix from configuration
    #[must_use]
    pub fn prefix(self, config: &AppConfig) -> &str {
        match self {
            Self::Messages => &config.fetch.messages_prefix,
            Self::Statuses => &config.fetch.statuses_prefix,
        }
    }

    /// Export URL from configuration
    #[must_use]
    pub fn url(self, config: &AppConfig) -> &str {
        match self {
            Self::Messages => &config.fetch.messages_url,
            Self::Statuses => &config.fetch.statuses_url,
        }
    }

    /// Name used for stage labels in logs and metrics
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Messages => "messages",
            Self::Statuses => "statuses",
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dataset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "messages" => Ok(Self::Messages),
            "statuses" => Ok(Self::Statuses),
            other => Err(format!("unknown dataset: {other} (expected messages or statuses)")),
        }
    }
}

/// A TSV file written by the fetch stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandedFile {
    /// Location of the file
    pub path: PathBuf,
    /// Data rows written (header excluded)
    pub rows: usize,
    /// Fully empty rows that were discarded
    pub dropped: usize,
}

/// Outcome of loading one landed file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Destination table
    pub table: String,
    /// File that was loaded
    pub file: PathBuf,
    /// Rows copied into the table
    pub rows: u64,
}

/// Message direction as exported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Sent by a contact
    Inbound,
    /// Sent to a contact
    Outbound,
}

impl Direction {
    /// Parse the exported value; anything else maps to `None`
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "inbound" => Some(Self::Inbound),
            "outbound" => Some(Self::Outbound),
            _ => None,
        }
    }
}

/// One row of `int_messages_with_status_history`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessageStatusRow {
    /// When the message was created
    pub message_created_at: Option<DateTime<Utc>>,
    /// Pseudonymised sender
    pub masked_sender: Option<String>,
    /// Pseudonymised recipients
    pub masked_addressees: Option<String>,
    /// `None` for values other than inbound/outbound
    pub direction: Option<Direction>,
    /// When the message reached `sent`, if it did
    pub sent_at: Option<DateTime<Utc>>,
    /// When the message reached `delivered`, if it did
    pub delivered_at: Option<DateTime<Utc>>,
    /// When the message reached `read`, if it did
    pub read_at: Option<DateTime<Utc>>,
    /// When the message reached `failed`, if it did
    pub failed_at: Option<DateTime<Utc>>,
}

impl MessageStatusRow {
    /// Outbound and not failed
    #[must_use]
    pub fn is_outbound_non_failed(&self) -> bool {
        self.direction == Some(Direction::Outbound) && self.failed_at.is_none()
    }
}

/// Weekly user counts for the trend chart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WeeklyUsers {
    /// Monday of the week
    pub week: NaiveDate,
    /// Distinct senders plus distinct addressees
    pub total_users: usize,
    /// Distinct senders among inbound messages
    pub active_users: usize,
}

/// Status counts for outbound messages created in the last week of data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatusCounts {
    /// Messages with a sent timestamp
    pub sent: usize,
    /// Messages with a delivered timestamp
    pub delivered: usize,
    /// Messages with a read timestamp
    pub read: usize,
    /// Messages with a failed timestamp
    pub failed: usize,
}

impl StatusCounts {
    /// Label/count pairs in display order
    #[must_use]
    pub const fn bars(&self) -> [(&'static str, usize); 4] {
        [
            ("sent", self.sent),
            ("delivered", self.delivered),
            ("read", self.read),
            ("failed", self.failed),
        ]
    }
}
