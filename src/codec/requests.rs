//! Response correlation.
//!
//! Requests sent with a `|resultid="<tag>"` suffix come back with a top-level
//! `ResultId`. Two structures track outstanding tags; both are shared between the
//! inbound worker and request-issuing callers, so they sit behind a mutex.
//!
//! * [`RequestTable`]: tag → oneshot reply, swept after a fixed timeout.
//! * [`SearchTagQueue`]: FIFO of directory-search tags. A response for a tag
//!   discards every older tag still queued (those searches were superseded).

use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// Opaque correlation tag (32 lowercase hex digits).
pub fn new_tag() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// `<request>|resultid="<tag>"`
pub fn tagged(request: &str, tag: &str) -> String {
    format!("{}|resultid=\"{}\"", request, tag)
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct PendingRequest {
    reply: oneshot::Sender<Value>,
    created: Instant,
}

pub struct RequestTable {
    pending: Mutex<HashMap<String, PendingRequest>>,
    timeout: Duration,
}

impl RequestTable {
    pub fn new(timeout: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Allocate a fresh tag and its reply channel.
    pub fn register(&self) -> (String, oneshot::Receiver<Value>) {
        let tag = new_tag();
        let rx = self.insert(&tag);
        (tag, rx)
    }

    /// Register a caller-chosen tag. An existing entry under the same tag is
    /// replaced; its receiver observes cancellation.
    pub fn insert(&self, tag: &str) -> oneshot::Receiver<Value> {
        let (tx, rx) = oneshot::channel();
        let previous = lock(&self.pending).insert(
            tag.to_string(),
            PendingRequest {
                reply: tx,
                created: Instant::now(),
            },
        );
        if previous.is_some() {
            log::debug!("replaced pending request for tag {}", tag);
        }
        rx
    }

    pub fn contains(&self, tag: &str) -> bool {
        lock(&self.pending).contains_key(tag)
    }

    /// Deliver a response. Returns false when no live entry matches the tag.
    pub fn resolve(&self, tag: &str, payload: Value) -> bool {
        let entry = lock(&self.pending).remove(tag);
        match entry {
            Some(p) => {
                if p.reply.send(payload).is_err() {
                    log::debug!("requester for tag {} went away before the reply", tag);
                }
                true
            }
            None => false,
        }
    }

    /// Drop the entry without a payload; the waiting receiver sees cancellation.
    pub fn fail(&self, tag: &str) -> bool {
        lock(&self.pending).remove(tag).is_some()
    }

    /// Drop entries older than the timeout. Returns how many were removed.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let mut pending = lock(&self.pending);
        let before = pending.len();
        let timeout = self.timeout;
        pending.retain(|_, p| now.saturating_duration_since(p.created) < timeout);
        let removed = before - pending.len();
        if removed > 0 {
            log::debug!("expired {} pending tagged request(s)", removed);
            crate::metrics::add_requests_expired(removed as u64);
        }
        removed
    }

    pub fn len(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancel every outstanding request (connection lost).
    pub fn clear(&self) {
        lock(&self.pending).clear();
    }
}

#[derive(Default)]
pub struct SearchTagQueue {
    tags: Mutex<VecDeque<String>>,
}

impl SearchTagQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate and enqueue a fresh search tag.
    pub fn push_new(&self) -> String {
        let tag = new_tag();
        lock(&self.tags).push_back(tag.clone());
        tag
    }

    /// Match a response tag against the queue head. Older tags are dequeued and
    /// discarded until the match. A tag that is not queued at all is stale and
    /// leaves the queue untouched.
    pub fn match_response(&self, tag: &str) -> bool {
        let mut tags = lock(&self.tags);
        if !tags.iter().any(|t| t == tag) {
            return false;
        }
        while let Some(head) = tags.pop_front() {
            if head == tag {
                return true;
            }
            log::debug!("discarding superseded search tag {}", head);
        }
        false
    }

    pub fn contains(&self, tag: &str) -> bool {
        lock(&self.tags).iter().any(|t| t == tag)
    }

    pub fn len(&self) -> usize {
        lock(&self.tags).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        lock(&self.tags).clear();
    }
}
