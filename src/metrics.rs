//! Process-wide protocol counters.
//!
//! Cheap relaxed atomics bumped from the inbound worker and the send path. The CLI
//! `smoketest` command prints a snapshot; nothing else depends on exact values.
use std::sync::atomic::{AtomicU64, Ordering};

static LINES_RECEIVED: AtomicU64 = AtomicU64::new(0);
static MESSAGES_DISPATCHED: AtomicU64 = AtomicU64::new(0);
static PARSE_ERRORS: AtomicU64 = AtomicU64::new(0);
static PROTOCOL_ERRORS: AtomicU64 = AtomicU64::new(0);
static COMMANDS_SENT: AtomicU64 = AtomicU64::new(0);
static RECONNECTS: AtomicU64 = AtomicU64::new(0);
static REQUESTS_EXPIRED: AtomicU64 = AtomicU64::new(0);

pub fn inc_lines_received() {
    LINES_RECEIVED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_messages_dispatched() {
    MESSAGES_DISPATCHED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_parse_errors() {
    PARSE_ERRORS.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_protocol_errors() {
    PROTOCOL_ERRORS.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_commands_sent() {
    COMMANDS_SENT.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_reconnects() {
    RECONNECTS.fetch_add(1, Ordering::Relaxed);
}
pub fn add_requests_expired(n: u64) {
    REQUESTS_EXPIRED.fetch_add(n, Ordering::Relaxed);
}

#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Snapshot {
    pub lines_received: u64,
    pub messages_dispatched: u64,
    pub parse_errors: u64,
    pub protocol_errors: u64,
    pub commands_sent: u64,
    pub reconnects: u64,
    pub requests_expired: u64,
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        lines_received: LINES_RECEIVED.load(Ordering::Relaxed),
        messages_dispatched: MESSAGES_DISPATCHED.load(Ordering::Relaxed),
        parse_errors: PARSE_ERRORS.load(Ordering::Relaxed),
        protocol_errors: PROTOCOL_ERRORS.load(Ordering::Relaxed),
        commands_sent: COMMANDS_SENT.load(Ordering::Relaxed),
        reconnects: RECONNECTS.load(Ordering::Relaxed),
        requests_expired: REQUESTS_EXPIRED.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_monotonic() {
        let before = snapshot();
        inc_parse_errors();
        inc_commands_sent();
        add_requests_expired(3);
        let after = snapshot();
        // other tests run concurrently, so only lower bounds hold
        assert!(after.parse_errors >= before.parse_errors + 1);
        assert!(after.commands_sent >= before.commands_sent + 1);
        assert!(after.requests_expired >= before.requests_expired + 3);
    }
}
