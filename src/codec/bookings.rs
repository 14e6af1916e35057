//! Bookings and recent call history.
//!
//! Both are parsed from command responses only; there are no scheduling rules
//! beyond the one-shot "meeting starting soon" reminder.

use crate::protocol::json;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

pub const CMD_BOOKINGS_LIST: &str = "xCommand Bookings List Days: 1 DayOffset: 0";
pub const CMD_CALL_HISTORY: &str = "xCommand CallHistory Recents Limit: 20 Order: OccurrenceTime";

fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Booking {
    pub id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub organizer: String,
    pub dial_number: Option<String>,
}

impl Booking {
    fn parse(item: &Value) -> Option<Self> {
        let id = json::text(item, &["Id"]).or_else(|| json::id_of(item))?;
        let start = parse_time(&json::text(item, &["Time", "StartTime"])?)?;
        let end = parse_time(&json::text(item, &["Time", "EndTime"])?)?;
        let first = json::text(item, &["Organizer", "FirstName"]).unwrap_or_default();
        let last = json::text(item, &["Organizer", "LastName"]).unwrap_or_default();
        Some(Self {
            id,
            title: json::text(item, &["Title"]).unwrap_or_default(),
            start,
            end,
            organizer: format!("{} {}", first, last).trim().to_string(),
            dial_number: json::text(item, &["DialInfo", "Calls", "Call", "Number"])
                .filter(|n| !n.is_empty()),
        })
    }

    pub fn is_in_progress(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now < self.end
    }
}

/// Parse `BookingsListResult`. Entries that lack an id or valid times are skipped.
pub fn parse_bookings(result: &Value) -> Vec<Booking> {
    let mut out: Vec<Booking> = json::items(result, &["Booking"])
        .into_iter()
        .filter_map(|item| {
            let b = Booking::parse(item);
            if b.is_none() {
                log::debug!("skipping booking without id or times");
            }
            b
        })
        .collect();
    out.sort_by_key(|b| b.start);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OccurrenceType {
    Placed,
    Received,
    Missed,
    Unknown,
}

impl OccurrenceType {
    pub fn from_wire(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "placed" => OccurrenceType::Placed,
            "received" => OccurrenceType::Received,
            "missed" | "unacknowledgedmissed" | "acknowledgedmissed" => OccurrenceType::Missed,
            _ => OccurrenceType::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallHistoryEntry {
    pub id: String,
    pub name: String,
    pub number: String,
    pub occurrence: OccurrenceType,
    pub start: Option<DateTime<Utc>>,
}

/// Parse `CallHistoryRecentsResult.Entry[]`.
pub fn parse_call_history(result: &Value) -> Vec<CallHistoryEntry> {
    json::items(result, &["Entry"])
        .into_iter()
        .filter_map(|e| {
            Some(CallHistoryEntry {
                id: json::text(e, &["CallHistoryId"]).or_else(|| json::id_of(e))?,
                name: json::text(e, &["DisplayName"]).unwrap_or_default(),
                number: json::text(e, &["CallbackNumber"]).unwrap_or_default(),
                occurrence: json::text(e, &["OccurrenceType"])
                    .map(|s| OccurrenceType::from_wire(&s))
                    .unwrap_or(OccurrenceType::Unknown),
                start: json::text(e, &["LastOccurrenceStartTime"]).and_then(|s| parse_time(&s)),
            })
        })
        .collect()
}

/// Today's bookings plus the set already warned about.
#[derive(Debug, Default)]
pub struct BookingSchedule {
    bookings: Vec<Booking>,
    warned: HashSet<String>,
}

impl BookingSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bookings(&self) -> &[Booking] {
        &self.bookings
    }

    /// Replace the list. Warnings already given for bookings that survive are kept.
    pub fn replace(&mut self, bookings: Vec<Booking>) -> bool {
        if bookings == self.bookings {
            return false;
        }
        self.warned.retain(|id| bookings.iter().any(|b| &b.id == id));
        self.bookings = bookings;
        true
    }

    /// Bookings starting within `warning` of `now` that have not been reported yet.
    pub fn due_warnings(&mut self, now: DateTime<Utc>, warning: Duration) -> Vec<Booking> {
        let mut due = Vec::new();
        for b in &self.bookings {
            let until = b.start - now;
            if until > Duration::zero() && until <= warning && self.warned.insert(b.id.clone()) {
                due.push(b.clone());
            }
        }
        due
    }

    pub fn current(&self, now: DateTime<Utc>) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.is_in_progress(now))
    }
}
