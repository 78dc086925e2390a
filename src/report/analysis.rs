//! Descriptive statistics over the message/status history view.
//!
//! Everything here is a pure function of the rows read from the view.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

use crate::models::{Direction, MessageStatusRow, StatusCounts, WeeklyUsers};

/// Monday of the week containing `ts` (UTC)
#[must_use]
pub fn week_start(ts: DateTime<Utc>) -> NaiveDate {
    let day = ts.date_naive();
    day - Duration::days(i64::from(day.weekday().num_days_from_monday()))
}

#[derive(Default)]
struct WeekUsers<'a> {
    senders: HashSet<&'a str>,
    addressees: HashSet<&'a str>,
}

/// Total and active users per week.
///
/// `total_users` is distinct senders plus distinct addressees of all rows that
/// week; `active_users` is distinct senders of inbound rows. The two series
/// are computed independently and joined on the total series' weeks, so a
/// week without inbound traffic reports 0 active users.
#[must_use]
pub fn weekly_user_trends(rows: &[MessageStatusRow]) -> Vec<WeeklyUsers> {
    let mut totals: BTreeMap<NaiveDate, WeekUsers<'_>> = BTreeMap::new();
    let mut active: BTreeMap<NaiveDate, HashSet<&str>> = BTreeMap::new();

    for row in rows {
        let Some(created) = row.message_created_at else { continue };
        let week = week_start(created);

        let entry = totals.entry(week).or_default();
        if let Some(sender) = row.masked_sender.as_deref() {
            entry.senders.insert(sender);
        }
        if let Some(addressees) = row.masked_addressees.as_deref() {
            entry.addressees.insert(addressees);
        }

        if row.direction == Some(Direction::Inbound) {
            let senders = active.entry(week).or_default();
            if let Some(sender) = row.masked_sender.as_deref() {
                senders.insert(sender);
            }
        }
    }

    totals
        .into_iter()
        .map(|(week, users)| WeeklyUsers {
            week,
            total_users: users.senders.len() + users.addressees.len(),
            active_users: active.get(&week).map_or(0, HashSet::len),
        })
        .collect()
}

/// Read counts among outbound, non-failed messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadFraction {
    /// Outbound, non-failed messages with a read timestamp
    pub read: usize,
    /// Outbound, non-failed messages
    pub total: usize,
}

impl ReadFraction {
    /// `read / total`, undefined when there are no outbound non-failed messages
    #[must_use]
    pub fn fraction(&self) -> Option<f64> {
        (self.total > 0).then(|| self.read as f64 / self.total as f64)
    }
}

/// Count outbound, non-failed messages and how many of them were read
#[must_use]
pub fn read_fraction(rows: &[MessageStatusRow]) -> ReadFraction {
    rows.iter()
        .filter(|r| r.is_outbound_non_failed())
        .fold(ReadFraction::default(), |mut acc, r| {
            acc.total += 1;
            if r.read_at.is_some() {
                acc.read += 1;
            }
            acc
        })
}

/// One-line summary of the read fraction
#[must_use]
pub fn read_fraction_text(fraction: &ReadFraction) -> String {
    match fraction.fraction() {
        Some(value) => format!(
            "Fraction of non-failed outbound messages that were read: {:.2}%",
            value * 100.0
        ),
        None => "Fraction of non-failed outbound messages that were read: undefined (no non-failed outbound messages)"
            .to_string(),
    }
}

/// Seconds from send to read for outbound, non-failed messages that were read
/// and have a send timestamp
#[must_use]
pub fn time_to_read_seconds(rows: &[MessageStatusRow]) -> Vec<f64> {
    rows.iter()
        .filter(|r| r.is_outbound_non_failed())
        .filter_map(|r| match (r.sent_at, r.read_at) {
            (Some(sent), Some(read)) => Some((read - sent).num_milliseconds() as f64 / 1000.0),
            _ => None,
        })
        .collect()
}

/// Status counts for outbound messages created within 7 days of the newest
/// message in the dataset (not of the current time)
#[must_use]
pub fn last_week_status_counts(rows: &[MessageStatusRow]) -> StatusCounts {
    let Some(newest) = rows.iter().filter_map(|r| r.message_created_at).max() else {
        return StatusCounts::default();
    };
    let cutoff = newest - Duration::days(7);

    rows.iter()
        .filter(|r| r.direction == Some(Direction::Outbound))
        .filter(|r| r.message_created_at.is_some_and(|created| created >= cutoff))
        .fold(StatusCounts::default(), |mut counts, r| {
            counts.sent += usize::from(r.sent_at.is_some());
            counts.delivered += usize::from(r.delivered_at.is_some());
            counts.read += usize::from(r.read_at.is_some());
            counts.failed += usize::from(r.failed_at.is_some());
            counts
        })
}

/// A histogram bucket `[start, end)`; the last bucket also holds `end`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bin {
    /// Inclusive lower edge
    pub start: f64,
    /// Upper edge
    pub end: f64,
    /// Values in the bucket
    pub count: usize,
}

/// Split values into `bins` equal-width buckets between their min and max
#[must_use]
pub fn histogram_bins(values: &[f64], bins: usize) -> Vec<Bin> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    // All values equal: one bucket of width 1 centred on them
    if (max - min).abs() < f64::EPSILON {
        return vec![Bin {
            start: min - 0.5,
            end: min + 0.5,
            count: values.len(),
        }];
    }

    let width = (max - min) / bins as f64;
    let mut out: Vec<Bin> = (0..bins)
        .map(|i| Bin {
            start: (i as f64).mul_add(width, min),
            end: ((i + 1) as f64).mul_add(width, min),
            count: 0,
        })
        .collect();

    for value in values {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let index = (((value - min) / width) as usize).min(bins - 1);
        out[index].count += 1;
    }
    out
}
